use chrono::{NaiveDate, NaiveDateTime};
use work_planner::{
    CalendarId, FieldValue, Plan, Resource, ScheduleOptions, Task, TaskField, TaskType, TimeSpan,
};

fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn monday_plan() -> Plan {
    Plan::new_with_start(dt(2024, 1, 1, 0)).unwrap()
}

fn set(plan: &mut Plan, row: usize, field: TaskField, value: impl Into<FieldValue>) {
    let value = value.into();
    plan.set_task_value(row, field, value.clone(), false).unwrap();
    plan.set_task_value(row, field, value, true).unwrap();
}

fn span(plan: &Plan, row: usize) -> (NaiveDateTime, NaiveDateTime) {
    let task = plan.task(row).unwrap();
    (task.start.unwrap(), task.end.unwrap())
}

fn developer(initials: &str) -> Resource {
    let mut res = Resource::new(initials, CalendarId(0));
    res.group = Some("dev".to_string());
    res
}

#[test]
fn higher_priority_takes_the_shared_resource_first() {
    let mut plan = monday_plan();
    plan.add_resource_named("AB").unwrap();
    plan.add_task(Task::new("Routine"));
    plan.add_task(Task::new("Urgent"));
    for row in [1, 2] {
        set(&mut plan, row, TaskField::Resources, "AB");
    }
    set(&mut plan, 2, TaskField::Priority, 500_i64);

    let report = plan.schedule().unwrap();
    assert!(report.is_clean());
    assert_eq!(span(&plan, 2), (dt(2024, 1, 1, 9), dt(2024, 1, 1, 18)));
    assert_eq!(span(&plan, 1), (dt(2024, 1, 1, 18), dt(2024, 1, 2, 18)));
    assert_eq!(report.leveled, vec![1]);
}

#[test]
fn equal_priority_goes_in_row_order() {
    let mut plan = monday_plan();
    plan.add_resource_named("AB").unwrap();
    plan.add_task(Task::new("First"));
    plan.add_task(Task::new("Second"));
    for row in [1, 2] {
        set(&mut plan, row, TaskField::Resources, "AB");
    }

    plan.schedule().unwrap();
    assert_eq!(span(&plan, 1).0, dt(2024, 1, 1, 9));
    assert_eq!(span(&plan, 2).0, dt(2024, 1, 1, 18));
}

#[test]
fn leveling_off_allows_over_allocation() {
    let mut plan = monday_plan();
    plan.set_options(ScheduleOptions {
        level_resources: false,
        ..ScheduleOptions::default()
    })
    .unwrap();
    plan.add_resource_named("AB").unwrap();
    plan.add_task(Task::new("First"));
    plan.add_task(Task::new("Second"));
    for row in [1, 2] {
        set(&mut plan, row, TaskField::Resources, "AB");
    }

    let report = plan.schedule().unwrap();
    assert!(report.leveled.is_empty());
    assert_eq!(span(&plan, 1), span(&plan, 2));
    // the second reservation is clamped to nothing
    assert_eq!(plan.work().len(), 1);
}

#[test]
fn partial_quantities_share_a_resource() {
    let mut plan = monday_plan();
    plan.add_resource_named("AB").unwrap();
    plan.add_task(Task::new("Half"));
    plan.add_task(Task::new("Other half"));
    for row in [1, 2] {
        set(&mut plan, row, TaskField::Resources, "AB[0.5]");
    }

    let report = plan.schedule().unwrap();
    assert!(report.leveled.is_empty());
    assert_eq!(span(&plan, 1), span(&plan, 2));
    assert_eq!(plan.task(1).unwrap().work, Some(TimeSpan::days(0.5)));
}

#[test]
fn work_task_spreads_over_group_members() {
    let mut plan = monday_plan();
    plan.add_resource(developer("AB"));
    plan.add_resource(developer("CD"));
    plan.add_task(Task::new("Build").with_type(TaskType::AsapFixedWork));
    set(&mut plan, 1, TaskField::Work, "2d");
    set(&mut plan, 1, TaskField::Resources, "dev[2]");

    plan.schedule().unwrap();
    let task = plan.task(1).unwrap();
    assert_eq!(span(&plan, 1), (dt(2024, 1, 1, 9), dt(2024, 1, 1, 18)));
    assert_eq!(task.duration, TimeSpan::days(1.0));
    assert_eq!(task.work, Some(TimeSpan::days(2.0)));
    assert_eq!(plan.work().efforts_for_task(1).count(), 2);
}

#[test]
fn work_task_stretches_around_a_busy_resource() {
    let mut plan = monday_plan();
    plan.add_resource_named("AB").unwrap();
    plan.add_task(Task::new("Busy"));
    plan.add_task(Task::new("Effort").with_type(TaskType::AsapFixedWork));
    set(&mut plan, 1, TaskField::Resources, "AB[0.5]");
    set(&mut plan, 1, TaskField::Priority, 900_i64);
    set(&mut plan, 2, TaskField::Work, "1d");
    set(&mut plan, 2, TaskField::Resources, "AB");

    let report = plan.schedule().unwrap();
    // half a day of work fits alongside "Busy" on Monday, the rest on Tuesday morning
    assert_eq!(span(&plan, 2), (dt(2024, 1, 1, 9), dt(2024, 1, 2, 13)));
    assert_eq!(report.leveled, vec![2]);
    assert_eq!(plan.task(2).unwrap().work, Some(TimeSpan::days(1.0)));
}

#[test]
fn start_on_work_keeps_its_start_when_the_resource_is_busy() {
    let mut plan = monday_plan();
    plan.add_resource_named("AB").unwrap();
    plan.add_task(Task::new("Busy"));
    plan.add_task(Task::new("Pinned").with_type(TaskType::StartOnWork));
    set(&mut plan, 1, TaskField::Resources, "AB");
    set(&mut plan, 1, TaskField::Priority, 900_i64);
    set(&mut plan, 2, TaskField::Start, "2024-01-01 09:00");
    set(&mut plan, 2, TaskField::Work, "1d");
    set(&mut plan, 2, TaskField::Resources, "AB");

    let report = plan.schedule().unwrap();
    assert!(report.is_clean());
    assert_eq!(span(&plan, 2), (dt(2024, 1, 1, 9), dt(2024, 1, 1, 18)));
    // AB is fully held by "Busy", so the reservation is clamped to nothing
    assert_eq!(plan.work().efforts_for_task(2).count(), 0);
    assert!(report.leveled.is_empty());
}

fn group_work_span(level_resources: bool) -> (NaiveDateTime, NaiveDateTime) {
    let mut plan = monday_plan();
    plan.set_options(ScheduleOptions {
        level_resources,
        ..ScheduleOptions::default()
    })
    .unwrap();
    plan.add_resource(developer("AB"));
    plan.add_resource(developer("CD"));
    plan.add_task(Task::new("Build").with_type(TaskType::AsapFixedWork));
    set(&mut plan, 1, TaskField::Work, "2d");
    set(&mut plan, 1, TaskField::Resources, "dev[2]");
    plan.schedule().unwrap();
    assert_eq!(plan.work().efforts_for_task(1).count(), 2);
    span(&plan, 1)
}

#[test]
fn uncontended_work_task_ignores_the_leveling_switch() {
    let leveled = group_work_span(true);
    assert_eq!(leveled, (dt(2024, 1, 1, 9), dt(2024, 1, 1, 18)));
    assert_eq!(group_work_span(false), leveled);
}

#[test]
fn resource_outside_its_dates_is_not_used() {
    let mut plan = monday_plan();
    let mut res = Resource::new("AB", CalendarId(0));
    res.start = NaiveDate::from_ymd_opt(2024, 1, 3);
    plan.add_resource(res);
    plan.add_task(Task::new("Effort").with_type(TaskType::AsapFixedWork));
    set(&mut plan, 1, TaskField::Work, "1d");
    set(&mut plan, 1, TaskField::Resources, "AB");

    plan.schedule().unwrap();
    assert_eq!(span(&plan, 1), (dt(2024, 1, 3, 9), dt(2024, 1, 3, 18)));
}

#[test]
fn tasks_using_tag_lists_rows() {
    let mut plan = monday_plan();
    plan.add_resource(developer("AB"));
    plan.add_task(Task::new("One"));
    plan.add_task(Task::new("Two"));
    set(&mut plan, 2, TaskField::Resources, "dev");

    assert_eq!(plan.tasks_using_tag("dev"), vec![2]);
    assert!(plan.tasks_using_tag("AB").is_empty());
}

#[test]
fn clear_work_forgets_computed_work_only() {
    let mut plan = monday_plan();
    plan.add_resource_named("AB").unwrap();
    plan.add_task(Task::new("Computed"));
    plan.add_task(Task::new("Fixed").with_type(TaskType::AsapFixedWork));
    set(&mut plan, 1, TaskField::Resources, "AB");
    set(&mut plan, 2, TaskField::Work, "3d");

    plan.schedule().unwrap();
    assert!(!plan.work().is_empty());
    plan.clear_work();
    assert!(plan.work().is_empty());
    assert_eq!(plan.task(1).unwrap().work, None);
    assert_eq!(plan.task(2).unwrap().work, Some(TimeSpan::days(3.0)));
}
