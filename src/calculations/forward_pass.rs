use crate::calculations::leveling::{self, Demand, Placement};
use crate::calendar::CalendarView;
use crate::error::{PlanError, PlanResult};
use crate::graph::DependencyGraph;
use crate::plan::PlanContext;
use crate::task::{Task, TaskType};
use crate::tasks::Tasks;
use crate::timespan::TimeSpan;
use crate::validation::EPSILON;
use crate::work::Work;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// Computed values for one leaf task.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration: TimeSpan,
    pub work: TimeSpan,
    pub leveled: bool,
}

#[derive(Debug)]
pub enum FailureCause {
    Error(PlanError),
    /// A task this one depends on could not be scheduled.
    Predecessor(usize),
}

#[derive(Debug)]
pub struct TaskFailure {
    pub task: usize,
    pub cause: FailureCause,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            FailureCause::Error(err) => write!(f, "task {}: {err}", self.task),
            FailureCause::Predecessor(pred) => {
                write!(f, "task {}: predecessor {pred} could not be scheduled", self.task)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct PassOutcome {
    pub scheduled: BTreeMap<usize, ScheduledTask>,
    pub failures: Vec<TaskFailure>,
    pub work: Work,
}

/// Earliest start and end a task's predecessors allow.
struct Bounds {
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
}

/// Walks leaf tasks in dependency/priority order computing start, end, and
/// work, and builds a fresh effort ledger along the way.
pub struct ForwardPass<'a> {
    ctx: &'a PlanContext<'a>,
    tasks: &'a Tasks,
    graph: &'a DependencyGraph,
}

impl<'a> ForwardPass<'a> {
    pub fn new(ctx: &'a PlanContext<'a>, tasks: &'a Tasks, graph: &'a DependencyGraph) -> Self {
        Self { ctx, tasks, graph }
    }

    /// Fails only for a cyclic graph; per-task problems land in the outcome.
    pub fn execute(&self) -> PlanResult<PassOutcome> {
        let order = self.graph.schedule_order(self.tasks)?;
        let mut outcome = PassOutcome::default();
        let mut failed: BTreeSet<usize> = BTreeSet::new();

        for row in order {
            let blocked = self
                .graph
                .constraints_of(row)
                .iter()
                .map(|c| c.from)
                .find(|from| failed.contains(from));
            if let Some(pred) = blocked {
                warn!(task = row, predecessor = pred, "skipping task after failed predecessor");
                failed.insert(row);
                outcome.failures.push(TaskFailure {
                    task: row,
                    cause: FailureCause::Predecessor(pred),
                });
                continue;
            }

            match self.schedule_task(row, &outcome.scheduled, &mut outcome.work) {
                Ok(done) => {
                    debug!(task = row, start = %done.start, end = %done.end, "scheduled task");
                    outcome.scheduled.insert(row, done);
                }
                Err(err) => {
                    warn!(task = row, error = %err, "task could not be scheduled");
                    outcome.work.release(row);
                    failed.insert(row);
                    outcome.failures.push(TaskFailure {
                        task: row,
                        cause: FailureCause::Error(err),
                    });
                }
            }
        }
        Ok(outcome)
    }

    fn schedule_task(
        &self,
        row: usize,
        done: &BTreeMap<usize, ScheduledTask>,
        work: &mut Work,
    ) -> PlanResult<ScheduledTask> {
        let task = self.tasks.get(row)?;
        let view = self.ctx.calendar_view(self.ctx.default_calendar)?;
        let bounds = self.bounds(row, &view, done)?;
        let demands = leveling::resolve_demands(self.ctx, row, task);
        let level = self.ctx.options.level_resources && !demands.is_empty();

        match task.task_type {
            TaskType::AsapFixedDuration => {
                let duration = non_negative(task.duration);
                let mut earliest = bounds.start;
                if let Some(min_end) = bounds.end {
                    earliest = earliest.max(view.add_span(min_end, duration.negate())?);
                }
                let place = |from: NaiveDateTime| -> PlanResult<(NaiveDateTime, NaiveDateTime)> {
                    let start = view.work_up(from)?;
                    Ok((start, view.add_span(start, duration)?))
                };
                let placement = if level {
                    leveling::slide_duration(work, self.ctx, row, &demands, earliest, place)?
                } else {
                    let (start, end) = place(earliest)?;
                    leveling::reserve_all(work, self.ctx, row, &demands, start, end)?;
                    unmoved(start, end)
                };
                self.finish(row, task, &view, &demands, placement, work)
            }

            TaskType::AsapFixedWork => {
                let work_days = view.span_in_days(fixed_work(task)).max(0.0);
                let elapsed = work_days / demand_rate(&demands);
                let mut earliest = bounds.start;
                if let Some(min_end) = bounds.end {
                    earliest = earliest.max(view.add_work(min_end, -elapsed)?);
                }
                let earliest = view.work_up(earliest)?;
                let placement = if level {
                    leveling::fill_work(work, self.ctx, &view, row, &demands, earliest, work_days)?
                } else {
                    let end = view.add_work(earliest, elapsed)?;
                    leveling::reserve_all(work, self.ctx, row, &demands, earliest, end)?;
                    unmoved(earliest, end)
                };
                self.finish(row, task, &view, &demands, placement, work)
            }

            TaskType::StartOnWork => {
                let work_days = view.span_in_days(fixed_work(task)).max(0.0);
                let start = self.fixed_start(task);
                self.warn_if_early(row, start, &bounds);
                let end = view.add_work(start, work_days / demand_rate(&demands))?;
                leveling::reserve_all(work, self.ctx, row, &demands, start, end)?;
                self.finish(row, task, &view, &demands, unmoved(start, end), work)
            }

            TaskType::StartOnDuration => {
                let start = self.fixed_start(task);
                let end = view.add_span(start, non_negative(task.duration))?;
                self.warn_if_early(row, start, &bounds);
                if bounds.end.is_some_and(|min_end| end < min_end) {
                    warn!(task = row, "fixed task ends before its predecessors allow");
                }
                leveling::reserve_all(work, self.ctx, row, &demands, start, end)?;
                self.finish(row, task, &view, &demands, unmoved(start, end), work)
            }

            TaskType::FixedPeriod => {
                let start = self.fixed_start(task);
                let end = match task.end {
                    Some(end) if end >= start => end,
                    Some(_) => {
                        warn!(task = row, "fixed period ends before it starts");
                        start
                    }
                    None => view.add_span(start, non_negative(task.duration))?,
                };
                self.warn_if_early(row, start, &bounds);
                leveling::reserve_all(work, self.ctx, row, &demands, start, end)?;
                self.finish(row, task, &view, &demands, unmoved(start, end), work)
            }
        }
    }

    fn bounds(
        &self,
        row: usize,
        view: &CalendarView<'_>,
        done: &BTreeMap<usize, ScheduledTask>,
    ) -> PlanResult<Bounds> {
        let mut bounds = Bounds {
            start: self.ctx.default_start,
            end: None,
        };
        for constraint in self.graph.constraints_of(row) {
            let Some(pred) = done.get(&constraint.from) else {
                continue;
            };
            let base = if constraint.kind.from_predecessor_start() {
                pred.start
            } else {
                pred.end
            };
            let point = view.add_span(base, constraint.lag)?;
            if constraint.kind.constrains_end() {
                bounds.end = Some(bounds.end.map_or(point, |end| end.max(point)));
            } else {
                bounds.start = bounds.start.max(point);
            }
        }
        Ok(bounds)
    }

    fn finish(
        &self,
        row: usize,
        task: &Task,
        view: &CalendarView<'_>,
        demands: &[Demand],
        placement: Placement,
        work: &Work,
    ) -> PlanResult<ScheduledTask> {
        let Placement { start, end, leveled } = placement;
        let duration = if task.task_type.duration_editable() {
            task.duration
        } else {
            TimeSpan::days(view.working_days_between(start, end))
        };
        let computed_work = if task.task_type.work_editable() {
            fixed_work(task)
        } else if demands.is_empty() {
            view.work_between(start, end)
        } else {
            work.work_for(row, self.ctx)?
        };
        if leveled {
            debug!(task = row, "task moved by resource leveling");
        }
        Ok(ScheduledTask {
            start,
            end,
            duration,
            work: computed_work,
            leveled,
        })
    }

    fn fixed_start(&self, task: &Task) -> NaiveDateTime {
        task.start.unwrap_or(self.ctx.default_start)
    }

    fn warn_if_early(&self, row: usize, start: NaiveDateTime, bounds: &Bounds) {
        if start < bounds.start {
            warn!(
                task = row,
                start = %start,
                allowed = %bounds.start,
                "fixed task starts before its predecessors allow"
            );
        }
    }
}

fn unmoved(start: NaiveDateTime, end: NaiveDateTime) -> Placement {
    Placement {
        start,
        end,
        leveled: false,
    }
}

fn non_negative(span: TimeSpan) -> TimeSpan {
    if span.is_negative() {
        TimeSpan::new(0.0, span.unit())
    } else {
        span
    }
}

/// Combined quantity a work-driven task progresses at; one with no resources.
fn demand_rate(demands: &[Demand]) -> f64 {
    let rate: f64 = demands.iter().map(|d| d.quantity).sum();
    if rate > EPSILON { rate } else { 1.0 }
}

/// Work a work-driven task must deliver; falls back to its duration when unset.
fn fixed_work(task: &Task) -> TimeSpan {
    task.work.unwrap_or(task.duration)
}
