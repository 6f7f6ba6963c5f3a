use crate::error::PlanResult;
use crate::plan::PlanContext;
use crate::resource::{Resource, ResourceId, Resources};
use crate::timespan::TimeSpan;
use crate::validation::EPSILON;
use chrono::NaiveDateTime;
use serde::Serialize;

/// A quantity of one resource committed to one task over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Effort {
    pub task: usize,
    pub resource: ResourceId,
    pub quantity: f64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Effort {
    pub fn covers(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start < end && start < self.end
    }
}

/// Committed quantity of a resource at an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Usage {
    pub total: f64,
    /// Earliest effort boundary after the instant, `None` when usage never changes again.
    pub next_change: Option<NaiveDateTime>,
}

/// Ledger of resource effort for one schedule run.
#[derive(Debug, Clone, Default)]
pub struct Work {
    efforts: Vec<Effort>,
}

impl Work {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn efforts(&self) -> &[Effort] {
        &self.efforts
    }

    pub fn len(&self) -> usize {
        self.efforts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.efforts.is_empty()
    }

    pub fn efforts_for_task(&self, task: usize) -> impl Iterator<Item = &Effort> {
        self.efforts.iter().filter(move |effort| effort.task == task)
    }

    /// Empty the ledger.
    pub fn clear(&mut self) {
        self.efforts.clear();
    }

    /// Record `quantity` of `resource` for `task` over `[start, end)`.
    ///
    /// The interval is clamped to the resource's availability range and the
    /// quantity to the smallest free capacity over the clamped interval.
    /// Returns the accepted effort, or `None` when nothing could be accepted.
    pub fn reserve(
        &mut self,
        resources: &Resources,
        task: usize,
        resource: ResourceId,
        quantity: f64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> PlanResult<Option<Effort>> {
        let res = resources.get(resource)?;
        if quantity <= EPSILON || end <= start || res.is_blank() {
            return Ok(None);
        }
        let Some((start, end)) = res.clamp_interval(start, end) else {
            return Ok(None);
        };

        let quantity = quantity.min(self.free_capacity(res, resource, start, end));
        if quantity <= EPSILON {
            return Ok(None);
        }

        let effort = Effort {
            task,
            resource,
            quantity,
            start,
            end,
        };
        self.efforts.push(effort.clone());
        Ok(Some(effort))
    }

    pub fn usage_at(&self, resource: ResourceId, instant: NaiveDateTime) -> Usage {
        let mut total = 0.0;
        let mut next_change: Option<NaiveDateTime> = None;
        for effort in self.efforts.iter().filter(|e| e.resource == resource) {
            if effort.covers(instant) {
                total += effort.quantity;
            }
            for boundary in [effort.start, effort.end] {
                if boundary > instant && next_change.is_none_or(|next| boundary < next) {
                    next_change = Some(boundary);
                }
            }
        }
        Usage { total, next_change }
    }

    /// Highest committed quantity at any instant of `[start, end)`.
    pub fn peak_usage(&self, resource: ResourceId, start: NaiveDateTime, end: NaiveDateTime) -> f64 {
        // usage only rises at effort starts, so those plus `start` are the candidates
        let overlapping: Vec<&Effort> = self
            .efforts
            .iter()
            .filter(|e| e.resource == resource && e.overlaps(start, end))
            .collect();
        std::iter::once(start)
            .chain(overlapping.iter().map(|e| e.start).filter(|s| *s > start))
            .map(|instant| {
                overlapping
                    .iter()
                    .filter(|e| e.covers(instant))
                    .map(|e| e.quantity)
                    .sum::<f64>()
            })
            .fold(0.0, f64::max)
    }

    pub fn free_capacity(
        &self,
        res: &Resource,
        resource: ResourceId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> f64 {
        (res.availability - self.peak_usage(resource, start, end)).max(0.0)
    }

    /// Work recorded for `task`: each effort's calendar work scaled by its quantity.
    pub fn work_for(&self, task: usize, ctx: &PlanContext<'_>) -> PlanResult<TimeSpan> {
        let mut work_days = 0.0;
        for effort in self.efforts_for_task(task) {
            let res = ctx.resources.get(effort.resource)?;
            let view = ctx.calendar_view(res.calendar)?;
            work_days += view.work_days_between(effort.start, effort.end) * effort.quantity;
        }
        Ok(TimeSpan::days(work_days))
    }

    /// Drop every effort of `task`.
    pub(crate) fn release(&mut self, task: usize) {
        self.efforts.retain(|effort| effort.task != task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarId;
    use chrono::NaiveDate;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn single(availability: f64) -> (Resources, ResourceId) {
        let mut resources = Resources::new();
        let mut res = Resource::new("AB", CalendarId(0));
        res.availability = availability;
        let id = resources.push(res);
        (resources, id)
    }

    #[test]
    fn reserve_clamps_quantity_to_free_capacity() {
        let (resources, id) = single(1.0);
        let mut work = Work::new();
        work.reserve(&resources, 1, id, 0.75, dt(6, 9), dt(6, 18)).unwrap();
        let second = work
            .reserve(&resources, 2, id, 1.0, dt(6, 12), dt(6, 20))
            .unwrap()
            .unwrap();
        assert!((second.quantity - 0.25).abs() < 1e-9);
        assert!(work.reserve(&resources, 3, id, 1.0, dt(6, 13), dt(6, 14)).unwrap().is_none());
        // only the first effort overlaps this slot
        let third = work
            .reserve(&resources, 3, id, 1.0, dt(6, 10), dt(6, 11))
            .unwrap()
            .unwrap();
        assert!((third.quantity - 0.25).abs() < 1e-9);
    }

    #[test]
    fn reserve_uses_peak_inside_interval_not_just_at_start() {
        let (resources, id) = single(1.0);
        let mut work = Work::new();
        work.reserve(&resources, 1, id, 1.0, dt(6, 14), dt(6, 16)).unwrap();
        // starts while free, but runs into a fully used slot
        assert!(work.reserve(&resources, 2, id, 1.0, dt(6, 9), dt(6, 18)).unwrap().is_none());
    }

    #[test]
    fn usage_reports_next_boundary() {
        let (resources, id) = single(2.0);
        let mut work = Work::new();
        work.reserve(&resources, 1, id, 1.0, dt(6, 9), dt(6, 13)).unwrap();
        work.reserve(&resources, 2, id, 1.0, dt(6, 15), dt(6, 18)).unwrap();

        let usage = work.usage_at(id, dt(6, 10));
        assert_eq!(usage.total, 1.0);
        assert_eq!(usage.next_change, Some(dt(6, 13)));

        let idle = work.usage_at(id, dt(6, 13));
        assert_eq!(idle.total, 0.0);
        assert_eq!(idle.next_change, Some(dt(6, 15)));
        assert_eq!(work.usage_at(id, dt(6, 18)).next_change, None);
    }

    #[test]
    fn blank_or_out_of_range_resources_accept_nothing() {
        let mut resources = Resources::new();
        let blank = resources.push(Resource::blank(CalendarId(0)));
        let mut res = Resource::new("CD", CalendarId(0));
        res.end = NaiveDate::from_ymd_opt(2025, 1, 3);
        let retired = resources.push(res);

        let mut work = Work::new();
        assert!(work.reserve(&resources, 1, blank, 1.0, dt(6, 9), dt(6, 18)).unwrap().is_none());
        assert!(work.reserve(&resources, 1, retired, 1.0, dt(6, 9), dt(6, 18)).unwrap().is_none());
        assert!(work.is_empty());
    }
}
