use chrono::{NaiveDate, NaiveDateTime};
use std::io::Write;
use tempfile::NamedTempFile;
use work_planner::{PlanConfig, PlanError, TaskType, TimeSpan};

fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

const PLAN: &str = r#"{
    "title": "Website",
    "start": "2024-01-01T00:00:00",
    "days": [
        { "name": "Short day", "periods": "10:00-14:00" }
    ],
    "calendars": [
        {
            "name": "Standard",
            "exceptions": { "2024-01-02": "Non working" }
        },
        {
            "name": "Mornings",
            "anchor": "2024-01-01",
            "cycle": ["Short day"]
        }
    ],
    "resources": [
        { "initials": "AB", "name": "Alice", "group": "dev" },
        { "initials": "CD", "calendar": "Mornings", "availability": 0.5 }
    ],
    "tasks": [
        { "title": "Build" },
        { "title": "Design", "indent": 1, "duration": "2d" },
        { "title": "Code", "indent": 1, "type": "asap_fixed_work", "work": "1d",
          "resources": "dev", "predecessors": "2" },
        {},
        { "title": "Launch", "predecessors": "1", "deadline": "2024-01-05T18:00:00" }
    ]
}"#;

#[test]
fn loads_and_schedules_a_plan() {
    let mut plan = PlanConfig::from_json_str(PLAN).unwrap().to_plan().unwrap();
    assert_eq!(plan.metadata().title, "Website");
    assert_eq!(plan.default_start(), dt(2024, 1, 1, 9));
    assert_eq!(plan.not_blank_tasks(), 4);
    assert_eq!(plan.not_blank_resources(), 2);
    assert!(plan.task(1).unwrap().is_summary());
    assert_eq!(plan.task(3).unwrap().task_type, TaskType::AsapFixedWork);

    let report = plan.schedule().unwrap();
    assert!(report.is_clean(), "{:?}", report.failures);

    // Tuesday is an exception, so the two-day design ends on Wednesday
    let design = plan.task(2).unwrap();
    assert_eq!(design.end, Some(dt(2024, 1, 3, 18)));
    let code = plan.task(3).unwrap();
    assert_eq!(code.start, Some(dt(2024, 1, 3, 18)));
    assert_eq!(code.end, Some(dt(2024, 1, 4, 18)));
    assert_eq!(code.work, Some(TimeSpan::days(1.0)));

    let launch = plan.task(5).unwrap();
    assert_eq!(launch.start, Some(dt(2024, 1, 4, 18)));
    assert!(plan.late_tasks().is_empty());
}

#[test]
fn new_day_types_and_calendars_are_registered() {
    let plan = PlanConfig::from_json_str(PLAN).unwrap().to_plan().unwrap();
    let short = plan.find_day("Short day").unwrap();
    assert_eq!(plan.days().get(short).unwrap().work(), 1.0);
    let mornings = plan.find_calendar("Mornings").unwrap();
    assert_eq!(plan.calendars().get(mornings).unwrap().cycle_length(), 1);
    let cd = plan.resources().find_by_initials("CD").unwrap();
    assert_eq!(plan.resources().get(cd).unwrap().calendar, mornings);
}

#[test]
fn reads_from_a_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(PLAN.as_bytes()).unwrap();
    let config = PlanConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.tasks.len(), 5);
}

#[test]
fn invalid_values_are_reported_with_context() {
    let text = r#"{ "tasks": [ { "title": "A", "priority": 1200 } ] }"#;
    let err = PlanConfig::from_json_str(text).unwrap().to_plan().unwrap_err();
    match err {
        PlanError::Validation(err) => {
            assert_eq!(err.message(), "task 1: Value not between 0 and 999")
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn deep_indent_is_rejected() {
    let text = r#"{ "tasks": [ { "title": "A" }, { "title": "B", "indent": 2 } ] }"#;
    let err = PlanConfig::from_json_str(text).unwrap().to_plan().unwrap_err();
    assert!(matches!(err, PlanError::Validation(_)));
}

#[test]
fn cyclic_predecessors_are_rejected() {
    let text = r#"{ "tasks": [
        { "title": "A", "predecessors": "2" },
        { "title": "B", "predecessors": "1" }
    ] }"#;
    let err = PlanConfig::from_json_str(text).unwrap().to_plan().unwrap_err();
    match err {
        PlanError::Validation(err) => assert!(err.message().contains("Circular")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unknown_keys_are_rejected() {
    let text = r#"{ "tasks": [ { "title": "A", "colour": "red" } ] }"#;
    assert!(matches!(
        PlanConfig::from_json_str(text),
        Err(PlanError::Json(_))
    ));
}

#[test]
fn unknown_default_calendar_is_not_found() {
    let text = r#"{ "default_calendar": "Nights" }"#;
    let err = PlanConfig::from_json_str(text).unwrap().to_plan().unwrap_err();
    assert!(matches!(err, PlanError::NotFound { .. }));
}
