use crate::calculations::{ForwardPass, TaskFailure};
use crate::calendar::{Calendar, CalendarId, CalendarView, Calendars, at};
use crate::day::{Day, DayId, Days};
use crate::error::PlanResult;
use crate::graph::DependencyGraph;
use crate::metadata::{PlanMetadata, ScheduleOptions};
use crate::resource::{Resource, ResourceId, Resources};
use crate::task::Task;
use crate::tasks::Tasks;
use crate::timespan::TimeSpan;
use crate::validation::{self, ValidationError};
use crate::work::Work;
use chrono::{Local, NaiveDateTime};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Read-only view of the registries a schedule run works against.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub days: &'a Days,
    pub calendars: &'a Calendars,
    pub resources: &'a Resources,
    pub default_calendar: CalendarId,
    pub default_start: NaiveDateTime,
    pub options: &'a ScheduleOptions,
}

impl<'a> PlanContext<'a> {
    pub fn calendar_view(&self, id: CalendarId) -> PlanResult<CalendarView<'a>> {
        self.calendars.get(id)?.view(self.days)
    }
}

/// Outcome of one [`Plan::schedule`] run.
#[derive(Debug, Default)]
pub struct ScheduleReport {
    pub scheduled: usize,
    pub failures: Vec<TaskFailure>,
    pub efforts: usize,
    /// Rows moved or stretched by resource leveling.
    pub leveled: Vec<usize>,
}

impl ScheduleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    metadata: PlanMetadata,
    days: Days,
    calendars: Calendars,
    resources: Resources,
    tasks: Tasks,
    work: Work,
}

impl Plan {
    /// Default day-types and calendar, starting at the first working instant of today.
    pub fn initialise() -> PlanResult<Self> {
        let today = Local::now().date_naive();
        Self::new_with_start(at(today, 0))
    }

    /// Default day-types and calendar, with the default start snapped onto
    /// working time at or after `start`.
    pub fn new_with_start(start: NaiveDateTime) -> PlanResult<Self> {
        let days = Days::defaults()?;
        let calendars = Calendars::defaults(&days)?;
        let mut plan = Self {
            metadata: PlanMetadata::default(),
            days,
            calendars,
            resources: Resources::new(),
            tasks: Tasks::new(),
            work: Work::new(),
        };
        plan.set_default_start(start)?;
        Ok(plan)
    }

    pub fn metadata(&self) -> &PlanMetadata {
        &self.metadata
    }

    pub fn days(&self) -> &Days {
        &self.days
    }

    pub fn calendars(&self) -> &Calendars {
        &self.calendars
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn tasks(&self) -> &Tasks {
        &self.tasks
    }

    pub fn work(&self) -> &Work {
        &self.work
    }

    pub(crate) fn days_mut(&mut self) -> &mut Days {
        &mut self.days
    }

    pub(crate) fn calendars_mut(&mut self) -> &mut Calendars {
        &mut self.calendars
    }

    pub(crate) fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut Tasks {
        &mut self.tasks
    }

    pub fn default_start(&self) -> NaiveDateTime {
        self.metadata
            .default_start
            .unwrap_or_else(|| at(Local::now().date_naive(), 0))
    }

    pub fn default_calendar(&self) -> PlanResult<CalendarView<'_>> {
        self.calendars
            .get(self.metadata.default_calendar)?
            .view(&self.days)
    }

    pub fn context(&self) -> PlanContext<'_> {
        PlanContext {
            days: &self.days,
            calendars: &self.calendars,
            resources: &self.resources,
            default_calendar: self.metadata.default_calendar,
            default_start: self.default_start(),
            options: &self.metadata.options,
        }
    }

    fn update_metadata_with<F>(&mut self, mutator: F) -> PlanResult<()>
    where
        F: FnOnce(&mut PlanMetadata),
    {
        let mut metadata = self.metadata.clone();
        mutator(&mut metadata);
        self.set_metadata(metadata)
    }

    /// Replace the metadata, snapping the default start onto the default calendar.
    pub fn set_metadata(&mut self, mut metadata: PlanMetadata) -> PlanResult<()> {
        let view = self
            .calendars
            .get(metadata.default_calendar)?
            .view(&self.days)?;
        if let Some(start) = metadata.default_start {
            metadata.default_start = Some(view.work_up(start)?);
        }
        self.metadata = metadata;
        Ok(())
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> PlanResult<()> {
        let title = title.into();
        self.update_metadata_with(|metadata| metadata.title = title)
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) -> PlanResult<()> {
        let notes = notes.into();
        self.update_metadata_with(|metadata| metadata.notes = notes)
    }

    pub fn set_default_start(&mut self, start: NaiveDateTime) -> PlanResult<()> {
        self.update_metadata_with(|metadata| metadata.default_start = Some(start))
    }

    pub fn set_default_calendar(&mut self, calendar: CalendarId) -> PlanResult<()> {
        self.update_metadata_with(|metadata| metadata.default_calendar = calendar)
    }

    pub fn set_options(&mut self, options: ScheduleOptions) -> PlanResult<()> {
        self.update_metadata_with(|metadata| metadata.options = options)
    }

    pub fn add_day(&mut self, day: Day) -> DayId {
        self.days.push(day)
    }

    pub fn add_calendar(&mut self, calendar: Calendar) -> CalendarId {
        self.calendars.push(calendar)
    }

    pub fn add_resource(&mut self, resource: Resource) -> ResourceId {
        self.resources.push(resource)
    }

    /// A usable resource on the default calendar. The initials are cleaned and
    /// checked like an edit of the initials field.
    pub fn add_resource_named(&mut self, initials: &str) -> Result<ResourceId, ValidationError> {
        let initials = validation::clean(initials);
        self.resources.check_initials(&initials, None)?;
        let calendar = self.metadata.default_calendar;
        Ok(self.resources.push(Resource::new(initials, calendar)))
    }

    pub fn add_task(&mut self, task: Task) -> usize {
        self.tasks.push(task)
    }

    pub fn insert_task(&mut self, row: usize, task: Task) -> PlanResult<()> {
        self.tasks.insert(row, task)
    }

    pub fn remove_task(&mut self, row: usize) -> PlanResult<Task> {
        self.tasks.remove(row)
    }

    pub fn indent_tasks(&mut self, rows: &BTreeSet<usize>) -> BTreeSet<usize> {
        self.tasks.indent(rows)
    }

    pub fn outdent_tasks(&mut self, rows: &BTreeSet<usize>) -> BTreeSet<usize> {
        self.tasks.outdent(rows)
    }

    /// Empty the effort ledger and forget every computed (not user-fixed) work value.
    pub fn clear_work(&mut self) {
        self.work.clear();
        for row in 1..self.tasks.len() {
            if let Ok(task) = self.tasks.get_mut(row) {
                if !task.is_blank() && !task.task_type.work_editable() {
                    task.work = None;
                }
            }
        }
    }

    /// Recompute start, end, and work of every task and rebuild the effort ledger.
    ///
    /// A dependency cycle aborts the run before anything changes. Tasks that
    /// fail individually keep their previous values and are listed in the report.
    pub fn schedule(&mut self) -> PlanResult<ScheduleReport> {
        let outcome = {
            let ctx = self.context();
            let graph = DependencyGraph::build(&self.tasks);
            ForwardPass::new(&ctx, &self.tasks, &graph)
                .execute()
                .inspect_err(|err| warn!(error = %err, "schedule aborted"))?
        };

        let mut leveled = Vec::new();
        for (row, done) in &outcome.scheduled {
            let task = self.tasks.get_mut(*row)?;
            task.start = Some(done.start);
            task.end = Some(done.end);
            if !task.task_type.duration_editable() {
                task.duration = done.duration;
            }
            if !task.task_type.work_editable() {
                task.work = Some(done.work);
            }
            if done.leveled {
                leveled.push(*row);
            }
        }
        self.work = outcome.work;
        self.roll_up_summaries();

        let report = ScheduleReport {
            scheduled: outcome.scheduled.len(),
            failures: outcome.failures,
            efforts: self.work.len(),
            leveled,
        };
        info!(
            tasks = report.scheduled,
            failures = report.failures.len(),
            efforts = report.efforts,
            leveled = report.leveled.len(),
            "schedule complete"
        );
        Ok(report)
    }

    /// Summary start/end span their leaves; work is the leaves' total.
    fn roll_up_summaries(&mut self) {
        let view = match self
            .calendars
            .get(self.metadata.default_calendar)
            .and_then(|cal| cal.view(&self.days))
        {
            Ok(view) => view,
            Err(err) => {
                warn!(error = %err, "summary roll-up skipped");
                return;
            }
        };

        let summaries: Vec<usize> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.is_summary())
            .map(|(row, _)| row)
            .collect();
        for row in summaries {
            let leaves = self.tasks.leaves_of(row);
            let mut start: Option<NaiveDateTime> = None;
            let mut end: Option<NaiveDateTime> = None;
            let mut work_days = 0.0;
            let mut has_work = false;
            for leaf in leaves {
                let Ok(task) = self.tasks.get(leaf) else {
                    continue;
                };
                if let Some(s) = task.start {
                    start = Some(start.map_or(s, |cur| cur.min(s)));
                }
                if let Some(e) = task.end {
                    end = Some(end.map_or(e, |cur| cur.max(e)));
                }
                if let Some(w) = task.work {
                    work_days += view.span_in_days(w);
                    has_work = true;
                }
            }
            let Ok(summary) = self.tasks.get_mut(row) else {
                continue;
            };
            match (start, end) {
                (Some(s), Some(e)) => {
                    summary.start = Some(s);
                    summary.end = Some(e);
                    summary.duration = TimeSpan::days(view.working_days_between(s, e));
                }
                _ => {
                    summary.start = None;
                    summary.end = None;
                }
            }
            summary.work = has_work.then(|| TimeSpan::days(work_days));
        }
    }

    /// Earliest start of any non-blank leaf task.
    pub fn earliest_task_start(&self) -> Option<NaiveDateTime> {
        self.leaf_tasks().filter_map(|task| task.start).min()
    }

    /// Latest end of any non-blank leaf task.
    pub fn latest_task_end(&self) -> Option<NaiveDateTime> {
        self.leaf_tasks().filter_map(|task| task.end).max()
    }

    pub fn not_blank_tasks(&self) -> usize {
        self.tasks.not_blank_count()
    }

    pub fn not_blank_resources(&self) -> usize {
        self.resources.not_blank_count()
    }

    /// Rows whose resource list names `tag`.
    pub fn tasks_using_tag(&self, tag: &str) -> Vec<usize> {
        self.tasks
            .not_blank()
            .filter(|(_, task)| task.resources.contains_tag(tag))
            .map(|(row, _)| row)
            .collect()
    }

    /// Rows whose computed end falls after their deadline.
    pub fn late_tasks(&self) -> Vec<usize> {
        self.tasks
            .not_blank()
            .filter(|(_, task)| task.is_late())
            .map(|(row, _)| row)
            .collect()
    }

    pub fn task(&self, row: usize) -> PlanResult<&Task> {
        self.tasks.get(row)
    }

    pub fn find_calendar(&self, name: &str) -> PlanResult<CalendarId> {
        self.calendars.find_by_name(name)
    }

    pub fn find_day(&self, name: &str) -> PlanResult<DayId> {
        self.days.find_by_name(name)
    }

    fn leaf_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .not_blank()
            .filter(|(_, task)| !task.is_summary())
            .map(|(_, task)| task)
    }
}
