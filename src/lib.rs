pub mod calculations;
pub mod calendar;
pub mod config;
pub mod day;
pub mod error;
pub mod fields;
pub mod graph;
pub mod metadata;
pub mod plan;
pub mod report;
pub mod resource;
pub mod task;
pub mod tasks;
pub mod timespan;
pub mod validation;
pub mod work;

pub use calendar::{Calendar, CalendarId, CalendarView, Calendars};
pub use config::PlanConfig;
pub use day::{Day, DayId, DayWorkPeriod, Days, TimeOfDay};
pub use error::{PlanError, PlanResult};
pub use fields::{CalendarField, DayField, FieldValue, ResourceField, TaskField};
pub use metadata::{PlanMetadata, ScheduleOptions};
pub use plan::{Plan, PlanContext, ScheduleReport};
pub use resource::{Resource, ResourceId, Resources};
pub use task::{DependencyType, Predecessor, Predecessors, Task, TaskResource, TaskResources, TaskType};
pub use tasks::Tasks;
pub use timespan::{TimeSpan, TimeUnit};
pub use validation::{ValidationError, ValidationResult};
pub use work::{Effort, Usage, Work};
