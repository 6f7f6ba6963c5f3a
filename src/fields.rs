//! Field-level access to plan entities.
//!
//! Every setter takes a `commit` flag: `false` only validates the new value,
//! `true` validates and then applies it. A rejected value leaves the plan
//! untouched either way.

use crate::calendar::{Calendar, CalendarId};
use crate::day::{Day, DayId, DayWorkPeriod, TimeOfDay};
use crate::graph::DependencyGraph;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId};
use crate::task::{Predecessors, Task, TaskResources, TaskType};
use crate::timespan::TimeSpan;
use crate::validation::{self, ValidationError, ValidationResult};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// A loosely typed value exchanged with editors and loaders.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Empty,
    Text(String),
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(TimeOfDay),
    Span(TimeSpan),
    TaskType(TaskType),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Date(date) => write!(f, "{date}"),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            FieldValue::Time(time) => write!(f, "{time}"),
            FieldValue::Span(span) => write!(f, "{span}"),
            FieldValue::TaskType(kind) => write!(f, "{kind}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Empty, Into::into)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::DateTime(value)
    }
}

impl From<TimeOfDay> for FieldValue {
    fn from(value: TimeOfDay) -> Self {
        FieldValue::Time(value)
    }
}

impl From<TimeSpan> for FieldValue {
    fn from(value: TimeSpan) -> Self {
        FieldValue::Span(value)
    }
}

impl From<TaskType> for FieldValue {
    fn from(value: TaskType) -> Self {
        FieldValue::TaskType(value)
    }
}

impl FieldValue {
    fn text(&self) -> Result<&str, ValidationError> {
        match self {
            FieldValue::Text(text) => Ok(text),
            other => Err(not_a("text", other)),
        }
    }

    fn optional_text(&self) -> Option<String> {
        match self {
            FieldValue::Empty => None,
            other => Some(other.to_string()).filter(|text| !text.is_empty()),
        }
    }

    fn number(&self) -> Result<f64, ValidationError> {
        match self {
            FieldValue::Number(n) => Ok(*n),
            FieldValue::Integer(n) => Ok(*n as f64),
            FieldValue::Text(text) => text.trim().parse().map_err(|_| not_a("number", self)),
            other => Err(not_a("number", other)),
        }
    }

    fn integer(&self) -> Result<i64, ValidationError> {
        match self {
            FieldValue::Integer(n) => Ok(*n),
            FieldValue::Text(text) => text.trim().parse().map_err(|_| not_a("integer", self)),
            other => Err(not_a("integer", other)),
        }
    }

    fn date(&self) -> Result<NaiveDate, ValidationError> {
        match self {
            FieldValue::Date(date) => Ok(*date),
            FieldValue::Text(text) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                .map_err(|_| not_a("date", self)),
            other => Err(not_a("date", other)),
        }
    }

    fn is_empty_text(&self) -> bool {
        matches!(self, FieldValue::Text(text) if text.trim().is_empty())
    }

    fn optional_date(&self) -> Result<Option<NaiveDate>, ValidationError> {
        match self {
            FieldValue::Empty => Ok(None),
            other if other.is_empty_text() => Ok(None),
            other => other.date().map(Some),
        }
    }

    fn optional_date_time(&self) -> Result<Option<NaiveDateTime>, ValidationError> {
        match self {
            FieldValue::Empty => Ok(None),
            other if other.is_empty_text() => Ok(None),
            FieldValue::DateTime(dt) => Ok(Some(*dt)),
            FieldValue::Date(date) => Ok(Some(crate::calendar::at(*date, 0))),
            FieldValue::Text(text) => parse_date_time(text.trim())
                .map(Some)
                .ok_or_else(|| not_a("Date-time", self)),
            other => Err(not_a("Date-time", other)),
        }
    }

    fn time(&self) -> Result<TimeOfDay, ValidationError> {
        match self {
            FieldValue::Time(time) => Ok(*time),
            FieldValue::Text(text) => text.parse(),
            other => Err(not_a("time", other)),
        }
    }

    fn span(&self) -> Result<TimeSpan, ValidationError> {
        match self {
            FieldValue::Span(span) => Ok(*span),
            FieldValue::Text(text) => {
                TimeSpan::parse(text).map_err(|err| ValidationError::new(err.to_string()))
            }
            other => Err(not_a("time-span", other)),
        }
    }

    fn optional_span(&self) -> Result<Option<TimeSpan>, ValidationError> {
        match self {
            FieldValue::Empty => Ok(None),
            other => other.span().map(Some),
        }
    }

    fn task_type(&self) -> Result<TaskType, ValidationError> {
        match self {
            FieldValue::TaskType(kind) => Ok(*kind),
            FieldValue::Text(text) => {
                TaskType::from_label(text).ok_or_else(|| not_a("task-type", self))
            }
            other => Err(not_a("task-type", other)),
        }
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// `2024-01-05 09:30`, `2024-01-05T09:30:00` or a bare date at midnight.
fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(|date| crate::calendar::at(date, 0))
        })
}

fn not_a(kind: &str, value: &FieldValue) -> ValidationError {
    ValidationError::new(format!("Not {kind}: {value}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayField {
    Name,
    Work,
    NumberOfPeriods,
    PeriodStart(usize),
    PeriodEnd(usize),
    /// All periods as text, e.g. `09:00-13:00, 14:00-18:00`.
    Periods,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarField {
    Name,
    Anchor,
    CycleLength,
    /// Day-type name of one cycle entry.
    CycleDay(usize),
    HoursPerDay,
    DaysPerWeek,
    DaysPerMonth,
    /// Day-type name for a date override; `Empty` clears it.
    Exception(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceField {
    Initials,
    Name,
    Org,
    Group,
    Role,
    Alias,
    Comment,
    Start,
    End,
    Availability,
    /// Calendar by name.
    Calendar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Title,
    Duration,
    Start,
    End,
    Work,
    Predecessors,
    Resources,
    Type,
    Priority,
    Deadline,
    Comment,
}

impl TaskField {
    pub const ALL: [TaskField; 11] = [
        TaskField::Title,
        TaskField::Duration,
        TaskField::Start,
        TaskField::End,
        TaskField::Work,
        TaskField::Predecessors,
        TaskField::Resources,
        TaskField::Type,
        TaskField::Priority,
        TaskField::Deadline,
        TaskField::Comment,
    ];

    /// Whether an editor should accept input for this field given the task's type.
    pub fn is_editable(self, task_type: TaskType) -> bool {
        match self {
            TaskField::Duration => task_type.duration_editable(),
            TaskField::Start => task_type.start_editable(),
            TaskField::End => task_type.end_editable(),
            TaskField::Work => task_type.work_editable(),
            _ => true,
        }
    }
}

fn parse_periods(text: &str) -> Result<Vec<DayWorkPeriod>, ValidationError> {
    text.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (start, end) = part
                .split_once('-')
                .ok_or_else(|| ValidationError::new(format!("Not period: '{}'", part.trim())))?;
            DayWorkPeriod::new(start.parse()?, end.parse()?)
        })
        .collect()
}

fn not_found(kind: &str, id: usize) -> ValidationError {
    ValidationError::new(format!("{kind} {id} not found"))
}

impl Plan {
    pub fn day_value(&self, id: DayId, field: DayField) -> Result<FieldValue, ValidationError> {
        let day = self.days().get(id).map_err(|_| not_found("Day", id.0))?;
        let period = |idx: usize| {
            day.periods()
                .get(idx)
                .copied()
                .ok_or_else(|| ValidationError::new(format!("Period {idx} not found")))
        };
        Ok(match field {
            DayField::Name => day.name().into(),
            DayField::Work => day.work().into(),
            DayField::NumberOfPeriods => (day.periods().len() as i64).into(),
            DayField::PeriodStart(idx) => period(idx)?.start.into(),
            DayField::PeriodEnd(idx) => period(idx)?.end.into(),
            DayField::Periods => day
                .periods()
                .iter()
                .map(|p| format!("{}-{}", p.start, p.end))
                .collect::<Vec<_>>()
                .join(", ")
                .into(),
        })
    }

    pub fn set_day_value(
        &mut self,
        id: DayId,
        field: DayField,
        value: FieldValue,
        commit: bool,
    ) -> ValidationResult {
        let current = self.days().get(id).map_err(|_| not_found("Day", id.0))?;
        let mut day = current.clone();
        match field {
            DayField::Name => {
                let name = validation::clean(value.text()?);
                validation::check_name_length(&name, Day::MAX_NAME)?;
                validation::check_unique(&name, self.days().names(), Some(id.0), "day")?;
                day.set_name(name);
            }
            DayField::Work => {
                let work = value.number()?;
                validation::check_range(work, 0.0, Day::MAX_WORK)?;
                day.set_work(work);
            }
            DayField::NumberOfPeriods => {
                let count = value.integer()?;
                if !(0..=12).contains(&count) {
                    return Err(ValidationError::new("Value not between 0 and 12"));
                }
                let periods = day.extended_periods(count as usize);
                if periods.len() != count as usize {
                    return Err(ValidationError::new(format!(
                        "No room for {count} periods after {}",
                        day.periods().last().map_or("00:00".to_string(), |p| p.end.to_string())
                    )));
                }
                day.set_periods(periods);
            }
            DayField::PeriodStart(idx) | DayField::PeriodEnd(idx) => {
                let time = value.time()?;
                let mut periods = day.periods().to_vec();
                let period = periods
                    .get_mut(idx)
                    .ok_or_else(|| ValidationError::new(format!("Period {idx} not found")))?;
                let (start, end) = match field {
                    DayField::PeriodStart(_) => (time, period.end),
                    _ => (period.start, time),
                };
                *period = DayWorkPeriod::new(start, end)?;
                Day::check_periods(&periods)?;
                day.set_periods(periods);
            }
            DayField::Periods => {
                let periods = match &value {
                    FieldValue::Empty => Vec::new(),
                    other => parse_periods(other.text()?)?,
                };
                Day::check_periods(&periods)?;
                day.set_periods(periods);
            }
        }
        if commit {
            if let Ok(slot) = self.days_mut().get_mut(id) {
                *slot = day;
            }
        }
        Ok(())
    }

    pub fn calendar_value(
        &self,
        id: CalendarId,
        field: CalendarField,
    ) -> Result<FieldValue, ValidationError> {
        let cal = self
            .calendars()
            .get(id)
            .map_err(|_| not_found("Calendar", id.0))?;
        let day_name = |day: DayId| -> Result<FieldValue, ValidationError> {
            self.days()
                .get(day)
                .map(|d| d.name().into())
                .map_err(|_| not_found("Day", day.0))
        };
        Ok(match field {
            CalendarField::Name => cal.name().into(),
            CalendarField::Anchor => cal.anchor().into(),
            CalendarField::CycleLength => (cal.cycle_length() as i64).into(),
            CalendarField::CycleDay(idx) => match cal.normal().get(idx) {
                Some(day) => day_name(*day)?,
                None => return Err(ValidationError::new(format!("Cycle day {idx} not found"))),
            },
            CalendarField::HoursPerDay => cal.hours_per_day().into(),
            CalendarField::DaysPerWeek => cal.days_per_week().into(),
            CalendarField::DaysPerMonth => cal.days_per_month().into(),
            CalendarField::Exception(date) => match cal.exceptions().get(&date) {
                Some(day) => day_name(*day)?,
                None => FieldValue::Empty,
            },
        })
    }

    pub fn set_calendar_value(
        &mut self,
        id: CalendarId,
        field: CalendarField,
        value: FieldValue,
        commit: bool,
    ) -> ValidationResult {
        let current = self
            .calendars()
            .get(id)
            .map_err(|_| not_found("Calendar", id.0))?;
        let mut cal: Calendar = current.clone();
        let lookup_day = |name: &str| {
            self.days()
                .find_by_name(name)
                .map_err(|_| ValidationError::new(format!("Day '{name}' not found")))
        };
        match field {
            CalendarField::Name => {
                let name = validation::clean(value.text()?);
                validation::check_name_length(&name, Calendar::MAX_NAME)?;
                validation::check_unique(&name, self.calendars().names(), Some(id.0), "calendar")?;
                cal.set_name(name);
            }
            CalendarField::Anchor => cal.set_anchor(value.date()?),
            CalendarField::CycleLength => {
                let length = value.integer()?;
                if length < 1 || length > Calendar::MAX_CYCLE as i64 {
                    return Err(ValidationError::new(format!(
                        "Value not between 1 and {}",
                        Calendar::MAX_CYCLE
                    )));
                }
                let normal = cal.resized_cycle(length as usize);
                cal.set_normal(normal);
            }
            CalendarField::CycleDay(idx) => {
                let day = lookup_day(value.text()?)?;
                let mut normal = cal.normal().to_vec();
                let slot = normal
                    .get_mut(idx)
                    .ok_or_else(|| ValidationError::new(format!("Cycle day {idx} not found")))?;
                *slot = day;
                cal.set_normal(normal);
            }
            CalendarField::HoursPerDay => {
                let hours = value.number()?;
                validation::check_range(hours, 0.01, 24.0)?;
                cal.set_conversions(hours, cal.days_per_week(), cal.days_per_month());
            }
            CalendarField::DaysPerWeek => {
                let days = value.number()?;
                validation::check_range(days, 0.01, 7.0)?;
                cal.set_conversions(cal.hours_per_day(), days, cal.days_per_month());
            }
            CalendarField::DaysPerMonth => {
                let days = value.number()?;
                validation::check_range(days, 0.01, 31.0)?;
                cal.set_conversions(cal.hours_per_day(), cal.days_per_week(), days);
            }
            CalendarField::Exception(date) => match value {
                FieldValue::Empty => {
                    cal.remove_exception(date);
                }
                ref other => {
                    let day = lookup_day(other.text()?)?;
                    cal.add_exception(date, day);
                }
            },
        }
        if commit {
            if let Ok(slot) = self.calendars_mut().get_mut(id) {
                *slot = cal;
            }
        }
        Ok(())
    }

    pub fn resource_value(
        &self,
        id: ResourceId,
        field: ResourceField,
    ) -> Result<FieldValue, ValidationError> {
        let res = self
            .resources()
            .get(id)
            .map_err(|_| not_found("Resource", id.0))?;
        Ok(match field {
            ResourceField::Initials => res.initials.as_deref().into(),
            ResourceField::Name => res.name.as_deref().into(),
            ResourceField::Org => res.org.as_deref().into(),
            ResourceField::Group => res.group.as_deref().into(),
            ResourceField::Role => res.role.as_deref().into(),
            ResourceField::Alias => res.alias.as_deref().into(),
            ResourceField::Comment => res.comment.as_deref().into(),
            ResourceField::Start => res.start.into(),
            ResourceField::End => res.end.into(),
            ResourceField::Availability => res.availability.into(),
            ResourceField::Calendar => self
                .calendars()
                .get(res.calendar)
                .map(|cal| cal.name().into())
                .map_err(|_| not_found("Calendar", res.calendar.0))?,
        })
    }

    pub fn set_resource_value(
        &mut self,
        id: ResourceId,
        field: ResourceField,
        value: FieldValue,
        commit: bool,
    ) -> ValidationResult {
        let current = self
            .resources()
            .get(id)
            .map_err(|_| not_found("Resource", id.0))?;
        let mut res: Resource = current.clone();
        let cleaned = value.optional_text().map(|text| validation::clean(&text));
        match field {
            ResourceField::Initials => {
                if let Some(initials) = &cleaned {
                    self.resources().check_initials(initials, Some(id))?;
                }
                res.initials = cleaned;
            }
            ResourceField::Name => res.name = cleaned,
            ResourceField::Org => res.org = cleaned,
            ResourceField::Group => res.group = cleaned,
            ResourceField::Role => res.role = cleaned,
            ResourceField::Alias => res.alias = cleaned,
            ResourceField::Comment => res.comment = value.optional_text(),
            ResourceField::Start => res.start = value.optional_date()?,
            ResourceField::End => res.end = value.optional_date()?,
            ResourceField::Availability => {
                let availability = value.number()?;
                validation::check_range(availability, 0.0, 9999.0)?;
                res.availability = availability;
            }
            ResourceField::Calendar => {
                let name = value.text()?;
                res.calendar = self
                    .calendars()
                    .find_by_name(name)
                    .map_err(|_| ValidationError::new(format!("Calendar '{name}' not found")))?;
            }
        }
        if let (Some(start), Some(end)) = (res.start, res.end) {
            if start > end {
                return Err(ValidationError::new("Start date is after end date"));
            }
        }
        if commit {
            if let Ok(slot) = self.resources_mut().get_mut(id) {
                *slot = res;
            }
        }
        Ok(())
    }

    pub fn task_value(&self, row: usize, field: TaskField) -> Result<FieldValue, ValidationError> {
        let task = self.tasks().get(row).map_err(|_| not_found("Task", row))?;
        Ok(match field {
            TaskField::Title => task.title.as_deref().into(),
            TaskField::Duration => task.duration.into(),
            TaskField::Start => task.start.into(),
            TaskField::End => task.end.into(),
            TaskField::Work => task.work.into(),
            TaskField::Predecessors => task.predecessors.to_string().into(),
            TaskField::Resources => task.resources.to_string().into(),
            TaskField::Type => task.task_type.into(),
            TaskField::Priority => i64::from(task.priority).into(),
            TaskField::Deadline => task.deadline.into(),
            TaskField::Comment => task.comment.as_deref().into(),
        })
    }

    pub fn set_task_value(
        &mut self,
        row: usize,
        field: TaskField,
        value: FieldValue,
        commit: bool,
    ) -> ValidationResult {
        let current = self.tasks().get(row).map_err(|_| not_found("Task", row))?;
        let mut task: Task = current.clone();
        let mut structural = false;
        match field {
            TaskField::Title => {
                task.title = value.optional_text().map(|text| validation::clean(&text));
                structural = task.is_blank() != current.is_blank();
            }
            TaskField::Duration => task.duration = value.span()?,
            TaskField::Start => task.start = value.optional_date_time()?,
            TaskField::End => task.end = value.optional_date_time()?,
            TaskField::Work => task.work = value.optional_span()?,
            TaskField::Predecessors => {
                let preds = match &value {
                    FieldValue::Empty => Predecessors::default(),
                    other => Predecessors::parse(other.text()?)?,
                };
                self.check_predecessors(row, &preds)?;
                task.predecessors = preds;
            }
            TaskField::Resources => {
                task.resources = match &value {
                    FieldValue::Empty => TaskResources::default(),
                    other => TaskResources::parse(other.text()?)?,
                };
            }
            TaskField::Type => task.task_type = value.task_type()?,
            TaskField::Priority => {
                let priority = value.integer()?;
                if priority < 0 || priority > i64::from(Task::MAX_PRIORITY) {
                    return Err(ValidationError::new(format!(
                        "Value not between 0 and {}",
                        Task::MAX_PRIORITY
                    )));
                }
                task.priority = priority as u32;
            }
            TaskField::Deadline => task.deadline = value.optional_date_time()?,
            TaskField::Comment => task.comment = value.optional_text(),
        }
        if commit {
            let tasks = self.tasks_mut();
            if tasks.replace(row, task).is_ok() && structural {
                tasks.update_summary_markers();
            }
        }
        Ok(())
    }

    /// Set a row's indent directly. A row may sit at most one level deeper
    /// than the nearest non-blank row above it, and the next non-blank row
    /// may sit at most one level deeper than it.
    pub fn set_task_indent(&mut self, row: usize, indent: i32, commit: bool) -> ValidationResult {
        if row == 0 {
            return Err(ValidationError::new("Project row indent is fixed"));
        }
        self.tasks().get(row).map_err(|_| not_found("Task", row))?;
        let above = self
            .tasks()
            .iter()
            .take(row)
            .filter(|(_, task)| !task.is_blank())
            .last()
            .map_or(-1, |(_, task)| task.indent);
        if indent < 0 || indent > above + 1 {
            return Err(ValidationError::new(format!(
                "Indent {indent} not between 0 and {}",
                above + 1
            )));
        }
        let below = self
            .tasks()
            .iter()
            .skip(row + 1)
            .find(|(_, task)| !task.is_blank());
        if let Some((below_row, below)) = below {
            if below.indent > indent + 1 {
                return Err(ValidationError::new(format!(
                    "Indent {indent} leaves row {below_row} more than one level deeper"
                )));
            }
        }
        if commit {
            let tasks = self.tasks_mut();
            if let Ok(task) = tasks.get_mut(row) {
                task.indent = indent;
            }
            tasks.update_summary_markers();
        }
        Ok(())
    }

    /// Predecessor ids must name other non-blank rows and keep the graph acyclic.
    fn check_predecessors(&self, row: usize, preds: &Predecessors) -> ValidationResult {
        for pred in preds.iter() {
            if pred.task == row {
                return Err(ValidationError::new(format!(
                    "Predecessor {} refers to this task",
                    pred.task
                )));
            }
            if !self.tasks().is_valid_reference(pred.task) {
                return Err(ValidationError::new(format!(
                    "Predecessor {} is not a task",
                    pred.task
                )));
            }
        }

        let mut trial = self.tasks().clone();
        if let Ok(task) = trial.get_mut(row) {
            task.predecessors = preds.clone();
        }
        DependencyGraph::build(&trial)
            .check_acyclic()
            .map_err(|_| ValidationError::new("Circular reference in predecessors"))
    }
}
