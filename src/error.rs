use crate::timespan::TimeSpanParseError;
use crate::validation::ValidationError;
use polars::prelude::PolarsError;
use std::io;
use thiserror::Error;

/// Errors raised by the planning engine.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("calendar '{calendar}' cannot be used for scheduling: {reason}")]
    InvalidCalendar { calendar: String, reason: String },

    #[error("cyclic dependency involving task {task}")]
    CyclicDependency { task: usize },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Parse(#[from] TimeSpanParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataframe conversion error: {0}")]
    DataFrame(#[from] PolarsError),
}

impl PlanError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn invalid_calendar(calendar: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCalendar {
            calendar: calendar.into(),
            reason: reason.into(),
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;
