use crate::calendar::{CalendarId, at};
use crate::error::{PlanError, PlanResult};
use crate::validation::{self, ValidationResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Handle of a resource within the plan's resource registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub usize);

/// A person, crew, or piece of equipment that tasks draw effort from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique short identifier. A resource without initials is a blank row.
    pub initials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// First available date, inclusive. Open-ended when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    /// Last available date, inclusive. Open-ended when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    /// Number of units available at any instant.
    pub availability: f64,
    pub calendar: CalendarId,
}

impl Resource {
    pub const MAX_INITIALS: usize = 20;

    pub fn new(initials: impl Into<String>, calendar: CalendarId) -> Self {
        Self {
            initials: Some(initials.into()),
            ..Self::blank(calendar)
        }
    }

    pub fn blank(calendar: CalendarId) -> Self {
        Self {
            initials: None,
            name: None,
            org: None,
            group: None,
            role: None,
            alias: None,
            comment: None,
            start: None,
            end: None,
            availability: 1.0,
            calendar,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.initials.as_deref().is_none_or(str::is_empty)
    }

    /// Instant availability starts, if bounded.
    pub fn available_from(&self) -> Option<NaiveDateTime> {
        self.start.map(|date| at(date, 0))
    }

    /// Instant availability ends (midnight after the inclusive end date), if bounded.
    pub fn available_until(&self) -> Option<NaiveDateTime> {
        self.end.and_then(|date| date.succ_opt()).map(|date| at(date, 0))
    }

    pub fn is_available_at(&self, instant: NaiveDateTime) -> bool {
        self.available_from().is_none_or(|from| instant >= from)
            && self.available_until().is_none_or(|until| instant < until)
    }

    /// Clamp `[start, end)` to the availability range. `None` when nothing is left.
    pub fn clamp_interval(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = match self.available_from() {
            Some(from) => start.max(from),
            None => start,
        };
        let end = match self.available_until() {
            Some(until) => end.min(until),
            None => end,
        };
        (start < end).then_some((start, end))
    }

    /// True when `tag` names this resource by initials, name, org, group, role, or alias.
    pub fn matches_tag(&self, tag: &str) -> bool {
        if self.is_blank() {
            return false;
        }
        [
            &self.initials,
            &self.name,
            &self.org,
            &self.group,
            &self.role,
            &self.alias,
        ]
        .into_iter()
        .any(|field| field.as_deref() == Some(tag))
    }
}

/// Registry of the plan's resources. Ids are stable indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resources {
    resources: Vec<Resource>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: Resource) -> ResourceId {
        self.resources.push(resource);
        ResourceId(self.resources.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: ResourceId) -> PlanResult<&Resource> {
        self.resources
            .get(id.0)
            .ok_or_else(|| PlanError::not_found("resource", format!("#{}", id.0)))
    }

    pub(crate) fn get_mut(&mut self, id: ResourceId) -> PlanResult<&mut Resource> {
        self.resources
            .get_mut(id.0)
            .ok_or_else(|| PlanError::not_found("resource", format!("#{}", id.0)))
    }

    pub fn find_by_initials(&self, initials: &str) -> PlanResult<ResourceId> {
        self.resources
            .iter()
            .position(|res| res.initials.as_deref() == Some(initials))
            .map(ResourceId)
            .ok_or_else(|| PlanError::not_found("resource", initials))
    }

    /// Usable resources matched by `tag`, in registry order.
    pub fn matching(&self, tag: &str) -> Vec<ResourceId> {
        self.iter()
            .filter(|(_, res)| res.matches_tag(tag))
            .map(|(id, _)| id)
            .collect()
    }

    /// Initials must be 1..=20 characters and not used by another resource.
    pub fn check_initials(&self, initials: &str, own: Option<ResourceId>) -> ValidationResult {
        validation::check_name_length(initials, Resource::MAX_INITIALS)?;
        let others = self
            .resources
            .iter()
            .map(|res| res.initials.as_deref().unwrap_or(""));
        validation::check_unique(initials, others, own.map(|id| id.0), "resource")
    }

    pub fn not_blank_count(&self) -> usize {
        self.resources.iter().filter(|res| !res.is_blank()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(idx, res)| (ResourceId(idx), res))
    }
}
