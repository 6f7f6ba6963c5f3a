use thiserror::Error;

pub(crate) const EPSILON: f64 = 1e-6;

/// Result of a rejected field edit. The message is meant for display at the
/// point of edit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with the entity the edit was aimed at.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        Self::new(format!("{context}: {}", self.message))
    }
}

pub type ValidationResult = Result<(), ValidationError>;

/// Collapse runs of whitespace and trim the ends.
pub(crate) fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn check_name_length(name: &str, max: usize) -> ValidationResult {
    let len = name.chars().count();
    if len < 1 || len > max {
        return Err(ValidationError::new(format!(
            "Name length not between 1 and {max} characters"
        )));
    }
    Ok(())
}

/// Reject `name` if any other entry of `names` (ignoring index `own`) equals it.
pub(crate) fn check_unique<'a, I>(name: &str, names: I, own: Option<usize>, kind: &str) -> ValidationResult
where
    I: IntoIterator<Item = &'a str>,
{
    for (idx, other) in names.into_iter().enumerate() {
        if Some(idx) != own && other == name {
            return Err(ValidationError::new(format!(
                "Name not unique (clash with {kind} {})",
                idx + 1
            )));
        }
    }
    Ok(())
}

pub(crate) fn check_range(value: f64, min: f64, max: f64) -> ValidationResult {
    if !value.is_finite() || value < min - EPSILON || value > max + EPSILON {
        return Err(ValidationError::new(format!(
            "Value not between {min} and {max}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_whitespace() {
        assert_eq!(clean("  Standard   work\tday "), "Standard work day");
    }

    #[test]
    fn unique_ignores_own_slot() {
        let names = ["A", "B", "C"];
        assert!(check_unique("B", names.iter().copied(), Some(1), "day").is_ok());
        let err = check_unique("B", names.iter().copied(), Some(0), "day").unwrap_err();
        assert_eq!(err.message(), "Name not unique (clash with day 2)");
    }

    #[test]
    fn name_length_bounds() {
        assert!(check_name_length("", 40).is_err());
        assert!(check_name_length(&"x".repeat(40), 40).is_ok());
        assert!(check_name_length(&"x".repeat(41), 40).is_err());
    }
}
