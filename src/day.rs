use crate::error::{PlanError, PlanResult};
use crate::validation::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MS_PER_DAY: u32 = 86_400_000;
const MS_PER_HOUR: f64 = 3_600_000.0;

/// Milliseconds since midnight. Unlike `chrono::NaiveTime` this can hold
/// 24:00, the end of a period that runs to midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MS_PER_DAY);

    pub fn from_ms(ms: u32) -> Option<Self> {
        (ms <= MS_PER_DAY).then_some(Self(ms))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour > 24 || minute >= 60 {
            return None;
        }
        Self::from_ms((hour * 60 + minute) * 60_000)
    }

    pub fn from_hours(hours: f64) -> Option<Self> {
        if !hours.is_finite() || hours < 0.0 {
            return None;
        }
        Self::from_ms((hours * MS_PER_HOUR).round() as u32)
    }

    pub fn ms(self) -> u32 {
        self.0
    }

    pub fn hours(self) -> f64 {
        f64::from(self.0) / MS_PER_HOUR
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.0 / 60_000;
        write!(f, "{:02}:{:02}", minutes / 60, minutes % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::new(format!("Not time: '{s}'"));
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = hour.trim().parse().map_err(|_| invalid())?;
        let minute: u32 = minute.trim().parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// A single working period within a day-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWorkPeriod {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl DayWorkPeriod {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::new(format!(
                "Period start {start} not before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn from_hours(start: f64, end: f64) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::new(format!("Period hours {start}-{end} outside day"));
        let start = TimeOfDay::from_hours(start).ok_or_else(invalid)?;
        let end = TimeOfDay::from_hours(end).ok_or_else(invalid)?;
        Self::new(start, end)
    }

    pub fn duration_ms(&self) -> u32 {
        self.end.ms() - self.start.ms()
    }
}

/// Handle of a day-type within the plan's day registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayId(pub usize);

/// A day-type: an abstract work quantity plus the periods worked.
///
/// `work` weights cost and effort ("1.5 equivalent days"); it is not derived
/// from the period lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    name: String,
    work: f64,
    periods: Vec<DayWorkPeriod>,
}

impl Day {
    pub const MAX_NAME: usize = 40;
    pub const MAX_WORK: f64 = 9.99;

    pub fn new(
        name: impl Into<String>,
        work: f64,
        periods: Vec<DayWorkPeriod>,
    ) -> Result<Self, ValidationError> {
        let day = Self {
            name: name.into(),
            work,
            periods,
        };
        crate::validation::check_range(day.work, 0.0, Self::MAX_WORK)?;
        Self::check_periods(&day.periods)?;
        Ok(day)
    }

    /// Build from hour pairs, e.g. `[9.0, 13.0, 14.0, 18.0]`.
    pub fn with_hours(name: &str, work: f64, hours: &[f64]) -> Result<Self, ValidationError> {
        if hours.len() % 2 == 1 {
            return Err(ValidationError::new(format!(
                "Period times must be in pairs ({})",
                hours.len()
            )));
        }
        let periods = hours
            .chunks(2)
            .map(|pair| DayWorkPeriod::from_hours(pair[0], pair[1]))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(name, work, periods)
    }

    /// Periods must be strictly ascending with a gap between neighbours.
    pub fn check_periods(periods: &[DayWorkPeriod]) -> ValidationResult {
        for pair in periods.windows(2) {
            if pair[1].start <= pair[0].end {
                return Err(ValidationError::new(format!(
                    "Period {}-{} overlaps or touches {}-{}",
                    pair[1].start, pair[1].end, pair[0].start, pair[0].end
                )));
            }
        }
        for period in periods {
            if period.start >= period.end {
                return Err(ValidationError::new(format!(
                    "Period start {} not before end {}",
                    period.start, period.end
                )));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn work(&self) -> f64 {
        self.work
    }

    pub fn periods(&self) -> &[DayWorkPeriod] {
        &self.periods
    }

    pub fn is_working(&self) -> bool {
        !self.periods.is_empty()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_work(&mut self, work: f64) {
        self.work = work;
    }

    pub(crate) fn set_periods(&mut self, periods: Vec<DayWorkPeriod>) {
        self.periods = periods;
    }

    /// Total worked milliseconds across all periods.
    pub fn work_ms(&self) -> u32 {
        self.periods.iter().map(DayWorkPeriod::duration_ms).sum()
    }

    /// Worked milliseconds from midnight up to `ms` (a time of day).
    pub fn worked_ms_before(&self, ms: u32) -> u32 {
        self.periods
            .iter()
            .map(|p| ms.clamp(p.start.ms(), p.end.ms()) - p.start.ms())
            .sum()
    }

    /// Time of day at which `worked` milliseconds have been worked. A target
    /// landing on a period boundary resolves to the end of the earlier period.
    pub fn time_at_worked_up(&self, mut worked: u32) -> u32 {
        for period in &self.periods {
            let len = period.duration_ms();
            if worked <= len {
                return period.start.ms() + worked;
            }
            worked -= len;
        }
        self.periods.last().map_or(0, |p| p.end.ms())
    }

    /// As [`Day::time_at_worked_up`] but boundaries resolve to the start of
    /// the later period.
    pub fn time_at_worked_down(&self, mut worked: u32) -> u32 {
        for period in &self.periods {
            let len = period.duration_ms();
            if worked < len {
                return period.start.ms() + worked;
            }
            worked -= len;
        }
        self.periods.last().map_or(0, |p| p.end.ms())
    }

    /// Periods appended after the last existing one when growing the period
    /// count, spaced by a rounded increment that fits in the rest of the day.
    pub fn extended_periods(&self, count: usize) -> Vec<DayWorkPeriod> {
        let mut periods = self.periods.clone();
        if count <= periods.len() {
            periods.truncate(count);
            return periods;
        }

        let added = (count - periods.len()) as f64;
        let used = periods.last().map_or(0.0, |p| p.end.hours());
        let remaining = 24.0 - used;
        let raw = remaining / (1.0 + 2.0 * added);
        let increment = [8.0, 4.0, 2.0, 1.0, 0.5, 10.0 / 60.0, 5.0 / 60.0]
            .into_iter()
            .find(|step| raw >= *step)
            .unwrap_or(1.0 / 60.0);

        let mut start = used + increment;
        while periods.len() < count {
            let end = (start + increment).min(24.0);
            match DayWorkPeriod::from_hours(start, end) {
                Ok(period) => periods.push(period),
                Err(_) => break,
            }
            start += 2.0 * increment;
        }
        periods
    }
}

/// Registry of the plan's day-types. Ids are stable indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Days {
    days: Vec<Day>,
}

impl Days {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard set of day-types used by a freshly initialised plan.
    pub fn defaults() -> Result<Self, ValidationError> {
        let mut days = Self::new();
        days.push(Day::with_hours("Non working", 0.0, &[])?);
        days.push(Day::with_hours("Standard work day", 1.0, &[9.0, 13.0, 14.0, 18.0])?);
        days.push(Day::with_hours("Morning only", 0.5, &[9.0, 13.0])?);
        days.push(Day::with_hours("Evening shift", 0.6, &[18.0, 22.0])?);
        days.push(Day::with_hours("24H day", 1.5, &[0.0, 24.0])?);
        Ok(days)
    }

    pub fn push(&mut self, day: Day) -> DayId {
        self.days.push(day);
        DayId(self.days.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn get(&self, id: DayId) -> PlanResult<&Day> {
        self.days
            .get(id.0)
            .ok_or_else(|| PlanError::not_found("day-type", format!("#{}", id.0)))
    }

    pub(crate) fn get_mut(&mut self, id: DayId) -> PlanResult<&mut Day> {
        self.days
            .get_mut(id.0)
            .ok_or_else(|| PlanError::not_found("day-type", format!("#{}", id.0)))
    }

    pub fn find_by_name(&self, name: &str) -> PlanResult<DayId> {
        self.days
            .iter()
            .position(|day| day.name == name)
            .map(DayId)
            .ok_or_else(|| PlanError::not_found("day-type", name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.days.iter().map(Day::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DayId, &Day)> {
        self.days.iter().enumerate().map(|(idx, day)| (DayId(idx), day))
    }
}
