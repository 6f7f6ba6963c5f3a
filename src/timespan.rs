use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const EQUALITY_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 7] = [
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
        TimeUnit::Weeks,
        TimeUnit::Months,
        TimeUnit::Years,
    ];

    /// Single-letter abbreviation, case-sensitive (`M` minutes, `m` months).
    pub fn abbrev(self) -> char {
        match self {
            TimeUnit::Seconds => 'S',
            TimeUnit::Minutes => 'M',
            TimeUnit::Hours => 'H',
            TimeUnit::Days => 'd',
            TimeUnit::Weeks => 'w',
            TimeUnit::Months => 'm',
            TimeUnit::Years => 'y',
        }
    }

    pub fn from_abbrev(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.abbrev() == c)
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "second",
            TimeUnit::Minutes => "minute",
            TimeUnit::Hours => "hour",
            TimeUnit::Days => "day",
            TimeUnit::Weeks => "week",
            TimeUnit::Months => "month",
            TimeUnit::Years => "year",
        }
    }

    fn decimals(self) -> usize {
        if self == TimeUnit::Seconds { 0 } else { 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time-span '{text}'")]
pub struct TimeSpanParseError {
    text: String,
}

/// A quantity of time with units.
///
/// Seconds are always integral, every other unit is held to two decimal
/// places. Two spans are equal when the units match and the numbers are
/// within 0.001 of each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSpan {
    number: f64,
    unit: TimeUnit,
}

impl Default for TimeSpan {
    fn default() -> Self {
        Self::new(1.0, TimeUnit::Days)
    }
}

impl TimeSpan {
    pub const ZERO_DAYS: TimeSpan = TimeSpan {
        number: 0.0,
        unit: TimeUnit::Days,
    };

    pub fn new(number: f64, unit: TimeUnit) -> Self {
        Self {
            number: round_for(number, unit),
            unit,
        }
    }

    pub fn days(number: f64) -> Self {
        Self::new(number, TimeUnit::Days)
    }

    pub fn parse(text: &str) -> Result<Self, TimeSpanParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let error = || TimeSpanParseError {
            text: text.to_string(),
        };

        let (number_text, unit) = match trimmed.chars().last().and_then(TimeUnit::from_abbrev) {
            Some(unit) => (&trimmed[..trimmed.len() - 1], unit),
            None => (trimmed, TimeUnit::Days),
        };
        let number: f64 = number_text.trim().parse().map_err(|_| error())?;
        if !number.is_finite() {
            return Err(error());
        }
        Ok(Self::new(number, unit))
    }

    pub fn number(&self) -> f64 {
        self.number
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn is_zero(&self) -> bool {
        self.number.abs() < EQUALITY_TOLERANCE
    }

    pub fn is_negative(&self) -> bool {
        self.number < 0.0 && !self.is_zero()
    }

    /// Relabel the number with a new unit, re-rounding for that unit.
    pub fn set_unit(&mut self, unit: TimeUnit) {
        self.unit = unit;
        self.number = round_for(self.number, unit);
    }

    pub fn negate(&self) -> Self {
        Self::new(-self.number, self.unit)
    }

    /// Compact form without the separating space, as used inside predecessor text.
    pub fn to_compact_string(&self) -> String {
        format!("{}{}", format_number(self.number, self.unit), self.unit.abbrev())
    }

    pub fn to_string_long(&self) -> String {
        let number = format_number(self.number, self.unit);
        let plural = if (self.number - 1.0).abs() < EQUALITY_TOLERANCE {
            ""
        } else {
            "s"
        };
        format!("{number} {}{plural}", self.unit.name())
    }
}

impl PartialEq for TimeSpan {
    fn eq(&self, other: &Self) -> bool {
        self.unit == other.unit && (self.number - other.number).abs() < EQUALITY_TOLERANCE
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_number(self.number, self.unit), self.unit.abbrev())
    }
}

impl FromStr for TimeSpan {
    type Err = TimeSpanParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeSpan {
    type Error = TimeSpanParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeSpan> for String {
    fn from(value: TimeSpan) -> Self {
        value.to_string()
    }
}

fn round_for(number: f64, unit: TimeUnit) -> f64 {
    let rounded = match unit {
        TimeUnit::Seconds => number.round(),
        _ => (number * 100.0).round() / 100.0,
    };
    // avoid carrying a negative zero into formatting
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn format_number(number: f64, unit: TimeUnit) -> String {
    let mut text = format!("{:.*}", unit.decimals(), number);
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uses_trailing_unit_letter() {
        let span = TimeSpan::parse("2.5d").unwrap();
        assert_eq!(span.unit(), TimeUnit::Days);
        assert_eq!(span.to_string(), "2.5 d");

        assert_eq!(TimeSpan::parse("90M").unwrap().unit(), TimeUnit::Minutes);
        assert_eq!(TimeSpan::parse("3m").unwrap().unit(), TimeUnit::Months);
        assert_eq!(TimeSpan::parse(" 4 H ").unwrap(), TimeSpan::new(4.0, TimeUnit::Hours));
    }

    #[test]
    fn parse_without_unit_defaults_to_days() {
        assert_eq!(TimeSpan::parse("7").unwrap(), TimeSpan::days(7.0));
    }

    #[test]
    fn blank_text_is_one_day() {
        assert_eq!(TimeSpan::parse("   ").unwrap(), TimeSpan::days(1.0));
        assert_eq!(TimeSpan::parse("").unwrap(), TimeSpan::days(1.0));
    }

    #[test]
    fn malformed_number_is_rejected() {
        assert!(TimeSpan::parse("abc").is_err());
        assert!(TimeSpan::parse("1.2.3d").is_err());
        assert!(TimeSpan::parse("d").is_err());
        assert!(TimeSpan::parse("infd").is_err());
    }

    #[test]
    fn seconds_are_integral_other_units_two_decimals() {
        assert_eq!(TimeSpan::new(12.6, TimeUnit::Seconds).number(), 13.0);
        assert_eq!(TimeSpan::new(1.23456, TimeUnit::Hours).number(), 1.23);
        assert_eq!(TimeSpan::new(2.0, TimeUnit::Seconds).to_string(), "2 S");
    }

    #[test]
    fn set_unit_rounds_when_switching_to_seconds() {
        let mut span = TimeSpan::new(1.75, TimeUnit::Hours);
        span.set_unit(TimeUnit::Seconds);
        assert_eq!(span.number(), 2.0);
        assert_eq!(span.unit(), TimeUnit::Seconds);
    }

    #[test]
    fn long_form_pluralises() {
        assert_eq!(TimeSpan::days(1.0).to_string_long(), "1 day");
        assert_eq!(TimeSpan::days(2.0).to_string_long(), "2 days");
        assert_eq!(TimeSpan::new(0.5, TimeUnit::Weeks).to_string_long(), "0.5 weeks");
    }

    #[test]
    fn negative_numbers_are_permitted() {
        let span = TimeSpan::parse("-2H").unwrap();
        assert!(span.is_negative());
        assert_eq!(span.negate(), TimeSpan::new(2.0, TimeUnit::Hours));
        assert_eq!(span.to_compact_string(), "-2H");
    }

    #[test]
    fn equality_requires_same_unit() {
        assert_ne!(TimeSpan::days(1.0), TimeSpan::new(1.0, TimeUnit::Weeks));
        assert_eq!(TimeSpan::days(1.0004), TimeSpan::days(1.0));
    }

    #[test]
    fn serde_uses_short_text() {
        let json = serde_json::to_string(&TimeSpan::days(2.5)).unwrap();
        assert_eq!(json, "\"2.5 d\"");
        let back: TimeSpan = serde_json::from_str("\"3H\"").unwrap();
        assert_eq!(back, TimeSpan::new(3.0, TimeUnit::Hours));
    }
}
