use crate::calendar::{Calendar, CalendarId};
use crate::day::Day;
use crate::error::{PlanError, PlanResult};
use crate::fields::{CalendarField, DayField, FieldValue, ResourceField, TaskField};
use crate::metadata::ScheduleOptions;
use crate::plan::Plan;
use crate::resource::Resource;
use crate::task::{Task, TaskType};
use crate::validation::ValidationResult;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// JSON definition of a plan. Sections left out keep the plan defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanConfig {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub default_calendar: Option<String>,
    pub options: Option<ScheduleOptions>,
    pub days: Vec<DayConfig>,
    pub calendars: Vec<CalendarConfig>,
    pub resources: Vec<ResourceConfig>,
    pub tasks: Vec<TaskConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DayConfig {
    pub name: String,
    #[serde(default)]
    pub work: Option<f64>,
    /// `09:00-13:00, 14:00-18:00`
    #[serde(default)]
    pub periods: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarConfig {
    pub name: String,
    #[serde(default)]
    pub anchor: Option<NaiveDate>,
    /// Day-type names, one per cycle entry.
    #[serde(default)]
    pub cycle: Vec<String>,
    /// Date to day-type name.
    #[serde(default)]
    pub exceptions: BTreeMap<NaiveDate, String>,
    #[serde(default)]
    pub hours_per_day: Option<f64>,
    #[serde(default)]
    pub days_per_week: Option<f64>,
    #[serde(default)]
    pub days_per_month: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceConfig {
    pub initials: Option<String>,
    pub name: Option<String>,
    pub org: Option<String>,
    pub group: Option<String>,
    pub role: Option<String>,
    pub alias: Option<String>,
    pub comment: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub availability: Option<f64>,
    pub calendar: Option<String>,
}

/// One task row. Rows are numbered from 1 in list order; a task without a
/// title is a blank row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub duration: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub work: Option<String>,
    pub predecessors: Option<String>,
    pub resources: Option<String>,
    pub priority: Option<i64>,
    pub deadline: Option<NaiveDateTime>,
    pub comment: Option<String>,
    pub indent: i32,
}

/// Validate through the trial path, then commit, tagging failures with `what`.
fn set<F>(what: &str, mut setter: F) -> PlanResult<()>
where
    F: FnMut(bool) -> ValidationResult,
{
    setter(false)
        .and_then(|()| setter(true))
        .map_err(|err| PlanError::Validation(err.context(what)))
}

impl PlanConfig {
    pub fn from_json_str(text: &str) -> PlanResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> PlanResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Build a fresh plan from this definition.
    pub fn to_plan(&self) -> PlanResult<Plan> {
        let mut plan = match self.start {
            Some(start) => Plan::new_with_start(start)?,
            None => Plan::initialise()?,
        };
        self.apply(&mut plan)?;
        Ok(plan)
    }

    /// Apply every section to `plan` through its field setters.
    pub fn apply(&self, plan: &mut Plan) -> PlanResult<()> {
        if let Some(title) = &self.title {
            plan.set_title(title.clone())?;
        }
        if let Some(notes) = &self.notes {
            plan.set_notes(notes.clone())?;
        }

        for day in &self.days {
            apply_day(plan, day)?;
        }
        for calendar in &self.calendars {
            apply_calendar(plan, calendar)?;
        }
        if let Some(name) = &self.default_calendar {
            let id = plan.find_calendar(name)?;
            plan.set_default_calendar(id)?;
        }
        if let Some(options) = &self.options {
            plan.set_options(options.clone())?;
        }
        if let Some(start) = self.start {
            plan.set_default_start(start)?;
        }

        for resource in &self.resources {
            apply_resource(plan, resource)?;
        }

        let first_row = plan.tasks().len();
        for task in &self.tasks {
            apply_task(plan, task)?;
        }
        // predecessors last, so forward references resolve
        for (offset, task) in self.tasks.iter().enumerate() {
            if let Some(preds) = &task.predecessors {
                let row = first_row + offset;
                set(&format!("task {row}"), |commit| {
                    plan.set_task_value(row, TaskField::Predecessors, preds.as_str().into(), commit)
                })?;
            }
        }

        debug!(
            days = plan.days().len(),
            calendars = plan.calendars().len(),
            resources = plan.resources().len(),
            tasks = plan.tasks().len(),
            "plan configuration applied"
        );
        Ok(())
    }
}

fn apply_day(plan: &mut Plan, config: &DayConfig) -> PlanResult<()> {
    let what = format!("day '{}'", config.name);
    let id = match plan.find_day(&config.name) {
        Ok(id) => id,
        Err(_) => {
            let work = if config.periods.is_some() { 1.0 } else { 0.0 };
            let day = Day::new(config.name.as_str(), work, Vec::new())
                .map_err(|err| PlanError::Validation(err.context(&what)))?;
            let id = plan.add_day(day);
            set(&what, |commit| {
                plan.set_day_value(id, DayField::Name, config.name.as_str().into(), commit)
            })?;
            id
        }
    };
    if let Some(work) = config.work {
        set(&what, |commit| plan.set_day_value(id, DayField::Work, work.into(), commit))?;
    }
    if let Some(periods) = &config.periods {
        set(&what, |commit| {
            plan.set_day_value(id, DayField::Periods, periods.as_str().into(), commit)
        })?;
    }
    Ok(())
}

fn apply_calendar(plan: &mut Plan, config: &CalendarConfig) -> PlanResult<()> {
    let what = format!("calendar '{}'", config.name);
    let id = match plan.find_calendar(&config.name) {
        Ok(id) => id,
        Err(_) => {
            let template = plan.calendars().get(CalendarId(0))?.clone();
            let id = plan.add_calendar(Calendar::new(
                config.name.clone(),
                template.anchor(),
                template.normal().to_vec(),
            ));
            set(&what, |commit| {
                plan.set_calendar_value(id, CalendarField::Name, config.name.as_str().into(), commit)
            })?;
            id
        }
    };

    if let Some(anchor) = config.anchor {
        set(&what, |commit| {
            plan.set_calendar_value(id, CalendarField::Anchor, anchor.into(), commit)
        })?;
    }
    if !config.cycle.is_empty() {
        let length = config.cycle.len() as i64;
        set(&what, |commit| {
            plan.set_calendar_value(id, CalendarField::CycleLength, length.into(), commit)
        })?;
        for (idx, day) in config.cycle.iter().enumerate() {
            set(&what, |commit| {
                plan.set_calendar_value(id, CalendarField::CycleDay(idx), day.as_str().into(), commit)
            })?;
        }
    }
    for (date, day) in &config.exceptions {
        set(&what, |commit| {
            plan.set_calendar_value(id, CalendarField::Exception(*date), day.as_str().into(), commit)
        })?;
    }

    let conversions = [
        (CalendarField::HoursPerDay, config.hours_per_day),
        (CalendarField::DaysPerWeek, config.days_per_week),
        (CalendarField::DaysPerMonth, config.days_per_month),
    ];
    for (field, value) in conversions {
        if let Some(value) = value {
            set(&what, |commit| plan.set_calendar_value(id, field, value.into(), commit))?;
        }
    }
    Ok(())
}

fn apply_resource(plan: &mut Plan, config: &ResourceConfig) -> PlanResult<()> {
    let calendar = plan.metadata().default_calendar;
    let id = plan.add_resource(Resource::blank(calendar));
    let what = format!("resource {}", id.0 + 1);

    let texts = [
        (ResourceField::Initials, &config.initials),
        (ResourceField::Name, &config.name),
        (ResourceField::Org, &config.org),
        (ResourceField::Group, &config.group),
        (ResourceField::Role, &config.role),
        (ResourceField::Alias, &config.alias),
        (ResourceField::Comment, &config.comment),
        (ResourceField::Calendar, &config.calendar),
    ];
    for (field, value) in texts {
        if let Some(text) = value {
            set(&what, |commit| {
                plan.set_resource_value(id, field, text.as_str().into(), commit)
            })?;
        }
    }
    if let Some(start) = config.start {
        set(&what, |commit| {
            plan.set_resource_value(id, ResourceField::Start, start.into(), commit)
        })?;
    }
    if let Some(end) = config.end {
        set(&what, |commit| plan.set_resource_value(id, ResourceField::End, end.into(), commit))?;
    }
    if let Some(availability) = config.availability {
        set(&what, |commit| {
            plan.set_resource_value(id, ResourceField::Availability, availability.into(), commit)
        })?;
    }
    Ok(())
}

fn apply_task(plan: &mut Plan, config: &TaskConfig) -> PlanResult<()> {
    let row = plan.add_task(Task::blank());
    let what = format!("task {row}");

    let mut values: Vec<(TaskField, FieldValue)> = Vec::new();
    if let Some(title) = &config.title {
        values.push((TaskField::Title, title.as_str().into()));
    }
    if let Some(kind) = config.task_type {
        values.push((TaskField::Type, kind.into()));
    }
    if let Some(duration) = &config.duration {
        values.push((TaskField::Duration, duration.as_str().into()));
    }
    if let Some(start) = config.start {
        values.push((TaskField::Start, start.into()));
    }
    if let Some(end) = config.end {
        values.push((TaskField::End, end.into()));
    }
    if let Some(work) = &config.work {
        values.push((TaskField::Work, work.as_str().into()));
    }
    if let Some(resources) = &config.resources {
        values.push((TaskField::Resources, resources.as_str().into()));
    }
    if let Some(priority) = config.priority {
        values.push((TaskField::Priority, priority.into()));
    }
    if let Some(deadline) = config.deadline {
        values.push((TaskField::Deadline, deadline.into()));
    }
    if let Some(comment) = &config.comment {
        values.push((TaskField::Comment, comment.as_str().into()));
    }
    for (field, value) in values {
        set(&what, |commit| plan.set_task_value(row, field, value.clone(), commit))?;
    }

    if config.indent != 0 {
        set(&what, |commit| plan.set_task_indent(row, config.indent, commit))?;
    }
    Ok(())
}
