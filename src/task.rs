use crate::timespan::TimeSpan;
use crate::validation::{EPSILON, ValidationError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scheduling contract of a task: which of duration/start/end/work the user fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    AsapFixedDuration,
    AsapFixedWork,
    StartOnDuration,
    StartOnWork,
    FixedPeriod,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::AsapFixedDuration,
        TaskType::AsapFixedWork,
        TaskType::StartOnDuration,
        TaskType::StartOnWork,
        TaskType::FixedPeriod,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TaskType::AsapFixedDuration => "ASAP - duration",
            TaskType::AsapFixedWork => "ASAP - work",
            TaskType::StartOnDuration => "Start on - duration",
            TaskType::StartOnWork => "Start on - work",
            TaskType::FixedPeriod => "Fixed period",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    pub fn is_asap(self) -> bool {
        matches!(self, TaskType::AsapFixedDuration | TaskType::AsapFixedWork)
    }

    pub fn duration_editable(self) -> bool {
        matches!(self, TaskType::AsapFixedDuration | TaskType::StartOnDuration)
    }

    pub fn start_editable(self) -> bool {
        matches!(
            self,
            TaskType::StartOnDuration | TaskType::StartOnWork | TaskType::FixedPeriod
        )
    }

    pub fn end_editable(self) -> bool {
        self == TaskType::FixedPeriod
    }

    pub fn work_editable(self) -> bool {
        matches!(self, TaskType::AsapFixedWork | TaskType::StartOnWork)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DependencyType {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub fn code(self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FS",
            DependencyType::StartToStart => "SS",
            DependencyType::FinishToFinish => "FF",
            DependencyType::StartToFinish => "SF",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "FS" => Some(DependencyType::FinishToStart),
            "SS" => Some(DependencyType::StartToStart),
            "FF" => Some(DependencyType::FinishToFinish),
            "SF" => Some(DependencyType::StartToFinish),
            _ => None,
        }
    }

    /// True when the predecessor's start (rather than end) is the reference point.
    pub fn from_predecessor_start(self) -> bool {
        matches!(self, DependencyType::StartToStart | DependencyType::StartToFinish)
    }

    /// True when the constraint limits the successor's end (rather than start).
    pub fn constrains_end(self) -> bool {
        matches!(self, DependencyType::FinishToFinish | DependencyType::StartToFinish)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predecessor {
    pub task: usize,
    pub kind: DependencyType,
    pub lag: TimeSpan,
}

impl Predecessor {
    pub fn finish_to_start(task: usize) -> Self {
        Self {
            task,
            kind: DependencyType::FinishToStart,
            lag: TimeSpan::ZERO_DAYS,
        }
    }

    fn parse(text: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::new(format!("Invalid predecessor '{text}'"));
        let text = text.trim();

        let digits = text.chars().take_while(char::is_ascii_digit).count();
        let task: usize = text[..digits].parse().map_err(|_| invalid())?;
        let mut rest = text[digits..].trim_start();

        let mut kind = DependencyType::FinishToStart;
        if let Some(code) = rest.get(..2).and_then(DependencyType::from_code) {
            kind = code;
            rest = rest[2..].trim_start();
        }

        let lag = if rest.is_empty() {
            TimeSpan::ZERO_DAYS
        } else if rest.starts_with('+') || rest.starts_with('-') {
            TimeSpan::parse(rest).map_err(|_| invalid())?
        } else {
            return Err(invalid());
        };

        Ok(Self { task, kind, lag })
    }
}

impl fmt::Display for Predecessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.task)?;
        if self.kind != DependencyType::FinishToStart {
            f.write_str(self.kind.code())?;
        }
        if !self.lag.is_zero() {
            if !self.lag.is_negative() {
                f.write_str("+")?;
            }
            f.write_str(&self.lag.to_compact_string())?;
        }
        Ok(())
    }
}

/// Dependencies of a task, written as `1, 3SS+2d, 4FF-4H`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Predecessors(Vec<Predecessor>);

impl Predecessors {
    pub fn new(preds: Vec<Predecessor>) -> Self {
        Self(preds)
    }

    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        text.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Predecessor::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predecessor> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depends_on(&self, task: usize) -> bool {
        self.0.iter().any(|pred| pred.task == task)
    }

    /// Remove references to `own`, and to rows `is_valid` rejects.
    pub fn clean(&mut self, own: usize, is_valid: impl Fn(usize) -> bool) {
        self.0.retain(|pred| pred.task != own && is_valid(pred.task));
    }

    /// Shift ids for a row inserted at `row`.
    pub(crate) fn row_inserted(&mut self, row: usize) {
        for pred in &mut self.0 {
            if pred.task >= row {
                pred.task += 1;
            }
        }
    }

    /// Drop references to a removed `row` and shift the ids after it.
    pub(crate) fn row_removed(&mut self, row: usize) {
        self.0.retain(|pred| pred.task != row);
        for pred in &mut self.0 {
            if pred.task > row {
                pred.task -= 1;
            }
        }
    }
}

impl fmt::Display for Predecessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, pred) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{pred}")?;
        }
        Ok(())
    }
}

impl FromStr for Predecessors {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Predecessors {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Predecessors> for String {
    fn from(value: Predecessors) -> Self {
        value.to_string()
    }
}

/// One resource request of a task: a tag and the quantity wanted.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResource {
    pub tag: String,
    pub quantity: f64,
}

impl TaskResource {
    fn parse(text: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::new(format!("Invalid resource '{}'", text.trim()));
        let text = text.trim();

        let (tag, quantity) = match text.find('[') {
            Some(open) => {
                let inner = text[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
                let quantity: f64 = inner.trim().parse().map_err(|_| invalid())?;
                (text[..open].trim(), quantity)
            }
            None => (text, 1.0),
        };
        if tag.is_empty() || !quantity.is_finite() || quantity <= EPSILON {
            return Err(invalid());
        }
        Ok(Self {
            tag: tag.to_string(),
            quantity,
        })
    }
}

impl fmt::Display for TaskResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)?;
        if (self.quantity - 1.0).abs() > EPSILON {
            write!(f, "[{}]", self.quantity)?;
        }
        Ok(())
    }
}

/// Resource requests of a task, written as `AB[0.5], Design`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskResources(Vec<TaskResource>);

impl TaskResources {
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        text.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(TaskResource::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskResource> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.0.iter().any(|res| res.tag == tag)
    }
}

impl fmt::Display for TaskResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, res) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{res}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for TaskResources {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaskResources> for String {
    fn from(value: TaskResources) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// A task without a title is a blank row.
    pub title: Option<String>,
    pub task_type: TaskType,
    pub duration: TimeSpan,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub work: Option<TimeSpan>,
    pub predecessors: Predecessors,
    pub resources: TaskResources,
    pub priority: u32,
    pub deadline: Option<NaiveDateTime>,
    pub comment: Option<String>,
    pub indent: i32,
    pub summary_start: usize,
    /// Last contained row when this task is a summary.
    pub summary_end: Option<usize>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            title: None,
            task_type: TaskType::AsapFixedDuration,
            duration: TimeSpan::days(1.0),
            start: None,
            end: None,
            work: None,
            predecessors: Predecessors::default(),
            resources: TaskResources::default(),
            priority: 100,
            deadline: None,
            comment: None,
            indent: 0,
            summary_start: 0,
            summary_end: None,
        }
    }
}

impl Task {
    pub const MAX_PRIORITY: u32 = 999;

    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_duration(mut self, duration: TimeSpan) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_predecessors(mut self, predecessors: Predecessors) -> Self {
        self.predecessors = predecessors;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.title.is_none()
    }

    pub fn is_summary(&self) -> bool {
        self.summary_end.is_some()
    }

    /// True when the computed end falls after the deadline.
    pub fn is_late(&self) -> bool {
        match (self.end, self.deadline) {
            (Some(end), Some(deadline)) => end > deadline,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timespan::TimeUnit;

    #[test]
    fn editable_fields_follow_task_type() {
        assert!(TaskType::AsapFixedDuration.duration_editable());
        assert!(!TaskType::AsapFixedDuration.start_editable());
        assert!(TaskType::StartOnWork.start_editable());
        assert!(TaskType::StartOnWork.work_editable());
        assert!(TaskType::FixedPeriod.end_editable());
        assert!(!TaskType::FixedPeriod.duration_editable());
    }

    #[test]
    fn predecessor_text_parses_types_and_lags() {
        let preds = Predecessors::parse("1, 3SS+2d, 4ff-4H").unwrap();
        let items: Vec<_> = preds.iter().copied().collect();
        assert_eq!(items[0], Predecessor::finish_to_start(1));
        assert_eq!(items[1].kind, DependencyType::StartToStart);
        assert_eq!(items[1].lag, TimeSpan::days(2.0));
        assert_eq!(items[2].kind, DependencyType::FinishToFinish);
        assert_eq!(items[2].lag, TimeSpan::new(-4.0, TimeUnit::Hours));
        assert_eq!(preds.to_string(), "1, 3SS+2d, 4FF-4H");
    }

    #[test]
    fn predecessor_text_rejects_garbage() {
        assert!(Predecessors::parse("x").is_err());
        assert!(Predecessors::parse("2XY").is_err());
        assert!(Predecessors::parse("2 3").is_err());
        assert!(Predecessors::parse("").unwrap().is_empty());
    }

    #[test]
    fn renumbering_follows_row_edits() {
        let mut preds = Predecessors::parse("1, 3, 5").unwrap();
        preds.row_inserted(3);
        assert_eq!(preds.to_string(), "1, 4, 6");
        preds.row_removed(4);
        assert_eq!(preds.to_string(), "1, 5");
    }

    #[test]
    fn resource_text_defaults_quantity_to_one() {
        let res = TaskResources::parse("AB[0.5], Design").unwrap();
        let items: Vec<_> = res.iter().cloned().collect();
        assert_eq!(items[0].quantity, 0.5);
        assert_eq!(items[1].quantity, 1.0);
        assert!(res.contains_tag("Design"));
        assert_eq!(res.to_string(), "AB[0.5], Design");
        assert!(TaskResources::parse("AB[0]").is_err());
        assert!(TaskResources::parse("[2]").is_err());
    }

    #[test]
    fn late_only_when_end_after_deadline() {
        let mut task = Task::new("Fit out");
        let day = chrono::NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        task.end = day.and_hms_opt(18, 0, 0);
        assert!(!task.is_late());
        task.deadline = day.and_hms_opt(17, 0, 0);
        assert!(task.is_late());
    }
}
