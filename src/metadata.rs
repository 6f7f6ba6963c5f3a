use crate::calendar::CalendarId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleOptions {
    /// Slide or split tasks so resource demand stays within availability.
    pub level_resources: bool,
    /// Upper bound on slide/split steps per task before accepting a clamped reservation.
    pub max_leveling_steps: usize,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            level_resources: true,
            max_leveling_steps: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub title: String,
    pub notes: String,
    /// Earliest start for tasks without predecessors. Snapped onto working time
    /// of the default calendar when set through the plan.
    pub default_start: Option<NaiveDateTime>,
    pub default_calendar: CalendarId,
    #[serde(default)]
    pub options: ScheduleOptions,
}

impl Default for PlanMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            notes: String::new(),
            default_start: None,
            default_calendar: CalendarId(0),
            options: ScheduleOptions::default(),
        }
    }
}
