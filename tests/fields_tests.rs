use chrono::NaiveDate;
use work_planner::{
    CalendarField, CalendarId, DayField, FieldValue, Plan, ResourceField, Task, TaskField,
    TaskType, TimeSpan,
};

fn monday_plan() -> Plan {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    Plan::new_with_start(start).unwrap()
}

#[test]
fn trial_validation_leaves_the_plan_untouched() {
    let mut plan = monday_plan();
    plan.add_task(Task::new("A"));
    plan.set_task_value(1, TaskField::Duration, "3d".into(), false)
        .unwrap();
    assert_eq!(plan.task(1).unwrap().duration, TimeSpan::days(1.0));

    plan.set_task_value(1, TaskField::Duration, "3d".into(), true)
        .unwrap();
    assert_eq!(plan.task(1).unwrap().duration, TimeSpan::days(3.0));
}

#[test]
fn rejected_values_report_the_expected_kind() {
    let mut plan = monday_plan();
    plan.add_task(Task::new("A"));

    let err = plan
        .set_task_value(1, TaskField::Priority, "high".into(), true)
        .unwrap_err();
    assert_eq!(err.message(), "Not integer: high");

    let err = plan
        .set_task_value(1, TaskField::Priority, 1000_i64.into(), true)
        .unwrap_err();
    assert_eq!(err.message(), "Value not between 0 and 999");

    let err = plan
        .set_task_value(1, TaskField::Start, "soon".into(), true)
        .unwrap_err();
    assert_eq!(err.message(), "Not Date-time: soon");

    let err = plan
        .set_task_value(1, TaskField::Type, "whenever".into(), true)
        .unwrap_err();
    assert_eq!(err.message(), "Not task-type: whenever");
    assert_eq!(plan.task(1).unwrap().priority, 100);
}

#[test]
fn text_values_are_parsed_per_field() {
    let mut plan = monday_plan();
    plan.add_task(Task::new("A"));
    plan.set_task_value(1, TaskField::Priority, " 250 ".into(), true)
        .unwrap();
    plan.set_task_value(1, TaskField::Deadline, "2024-01-05 17:30".into(), true)
        .unwrap();
    plan.set_task_value(1, TaskField::Type, "Start on - work".into(), true)
        .unwrap();

    let task = plan.task(1).unwrap();
    assert_eq!(task.priority, 250);
    assert_eq!(task.task_type, TaskType::StartOnWork);
    assert_eq!(
        plan.task_value(1, TaskField::Deadline).unwrap().to_string(),
        "2024-01-05 17:30"
    );
}

#[test]
fn predecessors_must_be_real_tasks_without_cycles() {
    let mut plan = monday_plan();
    plan.add_task(Task::new("A"));
    plan.add_task(Task::new("B"));
    plan.add_task(Task::blank());

    assert!(plan.set_task_value(1, TaskField::Predecessors, "1".into(), true).is_err());
    assert!(plan.set_task_value(1, TaskField::Predecessors, "3".into(), true).is_err());
    assert!(plan.set_task_value(1, TaskField::Predecessors, "7".into(), true).is_err());

    plan.set_task_value(2, TaskField::Predecessors, "1".into(), true)
        .unwrap();
    let err = plan
        .set_task_value(1, TaskField::Predecessors, "2".into(), true)
        .unwrap_err();
    assert_eq!(err.message(), "Circular reference in predecessors");
    assert!(plan.task(1).unwrap().predecessors.is_empty());
}

#[test]
fn clearing_a_title_blanks_the_row_and_updates_summaries() {
    let mut plan = monday_plan();
    plan.add_task(Task::new("Phase"));
    plan.add_task(Task::new("A"));
    plan.set_task_indent(2, 1, true).unwrap();
    assert!(plan.task(1).unwrap().is_summary());

    plan.set_task_value(2, TaskField::Title, FieldValue::Empty, true)
        .unwrap();
    assert!(plan.task(2).unwrap().is_blank());
    assert!(!plan.task(1).unwrap().is_summary());
}

#[test]
fn indent_may_not_skip_levels() {
    let mut plan = monday_plan();
    plan.add_task(Task::new("A"));
    plan.add_task(Task::new("B"));
    assert!(plan.set_task_indent(1, 1, false).is_err());
    assert!(plan.set_task_indent(2, 2, false).is_err());
    assert!(plan.set_task_indent(2, 1, false).is_ok());
    assert_eq!(plan.task(2).unwrap().indent, 0);
}

#[test]
fn outdent_may_not_strand_the_row_below() {
    let mut plan = monday_plan();
    plan.add_task(Task::new("A"));
    plan.add_task(Task::new("B"));
    plan.add_task(Task::new("C"));
    plan.set_task_indent(2, 1, true).unwrap();
    plan.set_task_indent(3, 2, true).unwrap();

    let err = plan.set_task_indent(2, 0, false).unwrap_err();
    assert_eq!(err.message(), "Indent 0 leaves row 3 more than one level deeper");
    assert_eq!(plan.task(2).unwrap().indent, 1);

    plan.set_task_indent(3, 1, true).unwrap();
    plan.set_task_indent(2, 0, true).unwrap();
    assert_eq!(plan.task(3).unwrap().indent, 1);
}

#[test]
fn day_periods_are_validated() {
    let mut plan = monday_plan();
    let day = plan.find_day("Standard work day").unwrap();

    let err = plan
        .set_day_value(day, DayField::Periods, "09:00-13:00, 12:00-18:00".into(), true)
        .unwrap_err();
    assert!(err.message().contains("overlaps"));

    plan.set_day_value(day, DayField::Periods, "08:00-12:00, 13:00-17:00".into(), true)
        .unwrap();
    assert_eq!(
        plan.day_value(day, DayField::Periods).unwrap().to_string(),
        "08:00-12:00, 13:00-17:00"
    );
    assert!(plan.set_day_value(day, DayField::NumberOfPeriods, 13_i64.into(), true).is_err());
}

#[test]
fn oversized_period_times_are_rejected() {
    let mut plan = monday_plan();
    let day = plan.find_day("Standard work day").unwrap();
    let err = plan
        .set_day_value(day, DayField::PeriodStart(0), "99999999:00".into(), false)
        .unwrap_err();
    assert_eq!(err.message(), "Not time: '99999999:00'");
    assert!(plan
        .set_day_value(day, DayField::PeriodEnd(1), "25:00".into(), false)
        .is_err());
}

#[test]
fn day_names_are_unique() {
    let mut plan = monday_plan();
    let day = plan.find_day("Morning only").unwrap();
    assert!(plan
        .set_day_value(day, DayField::Name, "Non working".into(), false)
        .is_err());
    plan.set_day_value(day, DayField::Name, "  Half   day ".into(), true)
        .unwrap();
    assert_eq!(plan.days().get(day).unwrap().name(), "Half day");
}

#[test]
fn calendar_cycle_edits() {
    let mut plan = monday_plan();
    let cal = CalendarId(0);
    plan.set_calendar_value(cal, CalendarField::CycleLength, 8_i64.into(), true)
        .unwrap();
    assert_eq!(plan.calendars().get(cal).unwrap().cycle_length(), 8);
    assert_eq!(
        plan.calendar_value(cal, CalendarField::CycleDay(7)).unwrap(),
        FieldValue::Text("Standard work day".to_string())
    );
    assert!(plan
        .set_calendar_value(cal, CalendarField::CycleLength, 0_i64.into(), true)
        .is_err());
    assert!(plan
        .set_calendar_value(cal, CalendarField::CycleDay(0), "Holiday".into(), true)
        .is_err());
    assert!(plan
        .set_calendar_value(cal, CalendarField::HoursPerDay, 25.0_f64.into(), true)
        .is_err());
}

#[test]
fn resource_dates_must_be_ordered() {
    let mut plan = monday_plan();
    let id = plan.add_resource_named("AB").unwrap();
    plan.set_resource_value(id, ResourceField::End, "2024-01-10".into(), true)
        .unwrap();
    let err = plan
        .set_resource_value(id, ResourceField::Start, "2024-02-01".into(), true)
        .unwrap_err();
    assert_eq!(err.message(), "Start date is after end date");

    let other = plan.add_resource_named("CD").unwrap();
    assert!(plan
        .set_resource_value(other, ResourceField::Initials, "AB".into(), false)
        .is_err());
}

#[test]
fn new_resources_get_the_initials_checks() {
    let mut plan = monday_plan();
    plan.add_resource_named(" A  B ").unwrap();
    assert_eq!(plan.resources().find_by_initials("A B").unwrap().0, 0);

    let err = plan.add_resource_named("A B").unwrap_err();
    assert_eq!(err.message(), "Name not unique (clash with resource 1)");
    let err = plan.add_resource_named(&"X".repeat(21)).unwrap_err();
    assert_eq!(err.message(), "Name length not between 1 and 20 characters");
    assert!(plan.add_resource_named("   ").is_err());
    assert_eq!(plan.resources().len(), 1);
}

#[test]
fn editability_follows_task_type() {
    assert!(TaskField::Duration.is_editable(TaskType::AsapFixedDuration));
    assert!(!TaskField::Duration.is_editable(TaskType::AsapFixedWork));
    assert!(TaskField::End.is_editable(TaskType::FixedPeriod));
    assert!(!TaskField::Start.is_editable(TaskType::AsapFixedDuration));
    assert!(TaskField::Work.is_editable(TaskType::StartOnWork));
}
