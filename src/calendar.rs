use crate::day::{Day, DayId, Days, MS_PER_DAY};
use crate::error::{PlanError, PlanResult};
use crate::timespan::{TimeSpan, TimeUnit};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const UNIT_EPSILON: f64 = 1e-9;

/// Handle of a calendar within the plan's calendar registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarId(pub usize);

/// A repeating cycle of day-types anchored at a date, with per-date exceptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    name: String,
    anchor: NaiveDate,
    normal: Vec<DayId>,
    exceptions: BTreeMap<NaiveDate, DayId>,
    hours_per_day: f64,
    days_per_week: f64,
    days_per_month: f64,
}

impl Calendar {
    pub const MAX_NAME: usize = 40;
    pub const MAX_CYCLE: usize = 99;

    pub fn new(name: impl Into<String>, anchor: NaiveDate, normal: Vec<DayId>) -> Self {
        Self {
            name: name.into(),
            anchor,
            normal,
            exceptions: BTreeMap::new(),
            hours_per_day: 8.0,
            days_per_week: 5.0,
            days_per_month: 21.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn normal(&self) -> &[DayId] {
        &self.normal
    }

    pub fn exceptions(&self) -> &BTreeMap<NaiveDate, DayId> {
        &self.exceptions
    }

    pub fn cycle_length(&self) -> usize {
        self.normal.len()
    }

    pub fn hours_per_day(&self) -> f64 {
        self.hours_per_day
    }

    pub fn days_per_week(&self) -> f64 {
        self.days_per_week
    }

    pub fn days_per_month(&self) -> f64 {
        self.days_per_month
    }

    pub fn add_exception(&mut self, date: NaiveDate, day: DayId) {
        self.exceptions.insert(date, day);
    }

    pub fn remove_exception(&mut self, date: NaiveDate) -> Option<DayId> {
        self.exceptions.remove(&date)
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_anchor(&mut self, anchor: NaiveDate) {
        self.anchor = anchor;
    }

    pub(crate) fn set_normal(&mut self, normal: Vec<DayId>) {
        self.normal = normal;
    }

    pub(crate) fn set_conversions(&mut self, hours_per_day: f64, days_per_week: f64, days_per_month: f64) {
        self.hours_per_day = hours_per_day;
        self.days_per_week = days_per_week;
        self.days_per_month = days_per_month;
    }

    /// Day-type id in effect on `date`: an exception if present, otherwise
    /// the cycle entry `(date - anchor) mod cycle_length`.
    pub fn day_id_for(&self, date: NaiveDate) -> Option<DayId> {
        if let Some(day) = self.exceptions.get(&date) {
            return Some(*day);
        }
        if self.normal.is_empty() {
            return None;
        }
        let offset = (date - self.anchor).num_days();
        let index = offset.rem_euclid(self.normal.len() as i64) as usize;
        Some(self.normal[index])
    }

    /// Cycle with a normal length extended by repeating the last day, or truncated.
    pub fn resized_cycle(&self, length: usize) -> Vec<DayId> {
        let mut normal = self.normal.clone();
        if let Some(last) = normal.last().copied() {
            normal.resize(length, last);
        } else {
            normal.truncate(length);
        }
        normal
    }

    /// Resolve against the day registry into a view usable for working-time
    /// arithmetic. Fails for an empty cycle, dangling day references, or a
    /// cycle without any working day.
    pub fn view<'a>(&'a self, days: &'a Days) -> PlanResult<CalendarView<'a>> {
        if self.normal.is_empty() {
            return Err(PlanError::invalid_calendar(&self.name, "normal cycle is empty"));
        }
        let cycle = self
            .normal
            .iter()
            .map(|id| days.get(*id))
            .collect::<PlanResult<Vec<_>>>()?;
        if !cycle.iter().any(|day| day.is_working()) {
            return Err(PlanError::invalid_calendar(
                &self.name,
                "normal cycle has no working day",
            ));
        }
        let exceptions = self
            .exceptions
            .iter()
            .map(|(date, id)| days.get(*id).map(|day| (*date, day)))
            .collect::<PlanResult<BTreeMap<_, _>>>()?;

        let max_idle_days = cycle.len() * (exceptions.len() + 1) + 1;
        Ok(CalendarView {
            calendar: self,
            cycle,
            exceptions,
            max_idle_days,
        })
    }
}

/// What a scan through working time counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measure {
    /// Literal worked milliseconds.
    Millis,
    /// Working-day fractions: every working day counts one across its periods.
    Days,
    /// Working-day fractions weighted by the day-type's work quantity.
    Work,
}

impl Measure {
    fn per_day(self, day: &Day) -> f64 {
        match self {
            Measure::Millis => f64::from(day.work_ms()),
            Measure::Days => 1.0,
            Measure::Work => day.work(),
        }
    }
}

/// A calendar resolved against its day-types.
#[derive(Debug, Clone)]
pub struct CalendarView<'a> {
    calendar: &'a Calendar,
    cycle: Vec<&'a Day>,
    exceptions: BTreeMap<NaiveDate, &'a Day>,
    max_idle_days: usize,
}

impl<'a> CalendarView<'a> {
    pub fn calendar(&self) -> &'a Calendar {
        self.calendar
    }

    pub fn effective_day(&self, date: NaiveDate) -> &'a Day {
        if let Some(day) = self.exceptions.get(&date) {
            return day;
        }
        let offset = (date - self.calendar.anchor).num_days();
        self.cycle[offset.rem_euclid(self.cycle.len() as i64) as usize]
    }

    /// A date is working if its day-type has at least one period.
    pub fn is_working(&self, date: NaiveDate) -> bool {
        self.effective_day(date).is_working()
    }

    /// Work between two instants in days, weighted by each day-type's work quantity.
    pub fn work_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> TimeSpan {
        TimeSpan::days(self.work_days_between(start, end))
    }

    /// Unrounded form of [`CalendarView::work_between`].
    pub fn work_days_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> f64 {
        self.between(start, end, Measure::Work)
    }

    /// Working time between two instants in days, counting each working day as one.
    pub fn working_days_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> f64 {
        self.between(start, end, Measure::Days)
    }

    pub fn working_ms_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> f64 {
        self.between(start, end, Measure::Millis)
    }

    /// Nearest working instant at or after `dt`. Period ends count as working.
    pub fn work_up(&self, dt: NaiveDateTime) -> PlanResult<NaiveDateTime> {
        let mut date = dt.date();
        let mut ms = ms_of_day(dt);
        for _ in 0..=self.max_idle_days {
            let day = self.effective_day(date);
            for period in day.periods() {
                if ms <= period.end.ms() {
                    return Ok(at(date, ms.max(period.start.ms())));
                }
            }
            date = self.next_date(date)?;
            ms = 0;
        }
        Err(self.no_working_time())
    }

    /// Nearest working instant at or before `dt`. Period starts count as working.
    pub fn work_down(&self, dt: NaiveDateTime) -> PlanResult<NaiveDateTime> {
        let mut date = dt.date();
        let mut ms = ms_of_day(dt);
        for _ in 0..=self.max_idle_days {
            let day = self.effective_day(date);
            for period in day.periods().iter().rev() {
                if ms >= period.start.ms() {
                    return Ok(at(date, ms.min(period.end.ms())));
                }
            }
            date = self.prev_date(date)?;
            ms = MS_PER_DAY;
        }
        Err(self.no_working_time())
    }

    /// Map a time within the day's working periods proportionally onto the
    /// whole 24 hours. Non-working days map to midnight.
    pub fn stretch(&self, dt: NaiveDateTime) -> NaiveDateTime {
        let date = dt.date();
        let day = self.effective_day(date);
        let total = day.work_ms();
        if total == 0 {
            return at(date, 0);
        }
        let worked = u64::from(day.worked_ms_before(ms_of_day(dt)));
        let stretched = worked * u64::from(MS_PER_DAY) / u64::from(total);
        at(date, stretched as u32)
    }

    /// Move through working time by `span`: forward when positive, backward when
    /// negative. Second/minute/hour spans are literal working time, larger
    /// units are working-day fractions.
    pub fn add_span(&self, dt: NaiveDateTime, span: TimeSpan) -> PlanResult<NaiveDateTime> {
        let (amount, measure) = self.span_amount(span);
        if amount >= 0.0 {
            self.advance(dt, amount, measure)
        } else {
            self.retreat(dt, -amount, measure)
        }
    }

    /// Advance until `work_days` of weighted work have been covered.
    pub fn add_work(&self, dt: NaiveDateTime, work_days: f64) -> PlanResult<NaiveDateTime> {
        if work_days >= 0.0 {
            self.advance(dt, work_days, Measure::Work)
        } else {
            self.retreat(dt, -work_days, Measure::Work)
        }
    }

    /// Express a span as a number of (work) days using the calendar's
    /// conversion factors.
    pub fn span_in_days(&self, span: TimeSpan) -> f64 {
        let cal = self.calendar;
        let n = span.number();
        match span.unit() {
            TimeUnit::Seconds => n / 3600.0 / cal.hours_per_day,
            TimeUnit::Minutes => n / 60.0 / cal.hours_per_day,
            TimeUnit::Hours => n / cal.hours_per_day,
            TimeUnit::Days => n,
            TimeUnit::Weeks => n * cal.days_per_week,
            TimeUnit::Months => n * cal.days_per_month,
            TimeUnit::Years => n * 12.0 * cal.days_per_month,
        }
    }

    fn span_amount(&self, span: TimeSpan) -> (f64, Measure) {
        let n = span.number();
        match span.unit() {
            TimeUnit::Seconds => (n * 1000.0, Measure::Millis),
            TimeUnit::Minutes => (n * 60_000.0, Measure::Millis),
            TimeUnit::Hours => (n * 3_600_000.0, Measure::Millis),
            _ => (self.span_in_days(span), Measure::Days),
        }
    }

    fn between(&self, start: NaiveDateTime, end: NaiveDateTime, measure: Measure) -> f64 {
        if end <= start {
            return 0.0;
        }
        let mut total_units = 0.0;
        let mut date = start.date();
        let last = end.date();
        while date <= last {
            let day = self.effective_day(date);
            let total = day.work_ms();
            if total > 0 {
                let lo = if date == start.date() { ms_of_day(start) } else { 0 };
                let hi = if date == last { ms_of_day(end) } else { MS_PER_DAY };
                let worked = day.worked_ms_before(hi) - day.worked_ms_before(lo);
                total_units += measure.per_day(day) * f64::from(worked) / f64::from(total);
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        total_units
    }

    fn advance(&self, from: NaiveDateTime, mut amount: f64, measure: Measure) -> PlanResult<NaiveDateTime> {
        if amount <= UNIT_EPSILON {
            return Ok(from);
        }
        let mut date = from.date();
        let mut lo = ms_of_day(from);
        let mut idle = 0;
        loop {
            let day = self.effective_day(date);
            let total = day.work_ms();
            let per_day = measure.per_day(day);
            let done = day.worked_ms_before(lo);
            if total > 0 && per_day > 0.0 && done < total {
                let available = per_day * f64::from(total - done) / f64::from(total);
                if amount <= available + UNIT_EPSILON {
                    let needed = (amount / per_day * f64::from(total)).round() as u32;
                    let target = (done + needed).min(total);
                    return Ok(at(date, day.time_at_worked_up(target)).max(from));
                }
                amount -= available;
                idle = 0;
            } else {
                idle += 1;
                if idle > self.max_idle_days {
                    return Err(self.no_working_time());
                }
            }
            date = self.next_date(date)?;
            lo = 0;
        }
    }

    fn retreat(&self, from: NaiveDateTime, mut amount: f64, measure: Measure) -> PlanResult<NaiveDateTime> {
        if amount <= UNIT_EPSILON {
            return Ok(from);
        }
        let mut date = from.date();
        let mut hi = ms_of_day(from);
        let mut idle = 0;
        loop {
            let day = self.effective_day(date);
            let total = day.work_ms();
            let per_day = measure.per_day(day);
            let done = day.worked_ms_before(hi);
            if total > 0 && per_day > 0.0 && done > 0 {
                let available = per_day * f64::from(done) / f64::from(total);
                if amount <= available + UNIT_EPSILON {
                    let needed = (amount / per_day * f64::from(total)).round() as u32;
                    let target = done.saturating_sub(needed);
                    return Ok(at(date, day.time_at_worked_down(target)).min(from));
                }
                amount -= available;
                idle = 0;
            } else {
                idle += 1;
                if idle > self.max_idle_days {
                    return Err(self.no_working_time());
                }
            }
            date = self.prev_date(date)?;
            hi = MS_PER_DAY;
        }
    }

    fn next_date(&self, date: NaiveDate) -> PlanResult<NaiveDate> {
        date.succ_opt().ok_or_else(|| self.no_working_time())
    }

    fn prev_date(&self, date: NaiveDate) -> PlanResult<NaiveDate> {
        date.pred_opt().ok_or_else(|| self.no_working_time())
    }

    fn no_working_time(&self) -> PlanError {
        PlanError::invalid_calendar(
            self.calendar.name(),
            format!("no working time found within {} days", self.max_idle_days),
        )
    }
}

pub(crate) fn ms_of_day(dt: NaiveDateTime) -> u32 {
    let time = dt.time();
    time.num_seconds_from_midnight() * 1000 + (time.nanosecond() / 1_000_000).min(999)
}

pub(crate) fn at(date: NaiveDate, ms: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::milliseconds(i64::from(ms))
}

/// Registry of the plan's calendars. Ids are stable indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Calendars {
    calendars: Vec<Calendar>,
}

impl Calendars {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `Standard` calendar: two non-working days then five standard work
    /// days, anchored on Saturday 2000-01-01.
    pub fn defaults(days: &Days) -> PlanResult<Self> {
        let off = days.find_by_name("Non working")?;
        let work = days.find_by_name("Standard work day")?;
        let anchor = NaiveDate::from_ymd_opt(2000, 1, 1)
            .ok_or_else(|| PlanError::Config("invalid default anchor".into()))?;
        let mut calendars = Self::new();
        calendars.push(Calendar::new(
            "Standard",
            anchor,
            vec![off, off, work, work, work, work, work],
        ));
        Ok(calendars)
    }

    pub fn push(&mut self, calendar: Calendar) -> CalendarId {
        self.calendars.push(calendar);
        CalendarId(self.calendars.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }

    pub fn get(&self, id: CalendarId) -> PlanResult<&Calendar> {
        self.calendars
            .get(id.0)
            .ok_or_else(|| PlanError::not_found("calendar", format!("#{}", id.0)))
    }

    pub(crate) fn get_mut(&mut self, id: CalendarId) -> PlanResult<&mut Calendar> {
        self.calendars
            .get_mut(id.0)
            .ok_or_else(|| PlanError::not_found("calendar", format!("#{}", id.0)))
    }

    pub fn find_by_name(&self, name: &str) -> PlanResult<CalendarId> {
        self.calendars
            .iter()
            .position(|cal| cal.name == name)
            .map(CalendarId)
            .ok_or_else(|| PlanError::not_found("calendar", name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.calendars.iter().map(Calendar::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CalendarId, &Calendar)> {
        self.calendars
            .iter()
            .enumerate()
            .map(|(idx, cal)| (CalendarId(idx), cal))
    }
}
