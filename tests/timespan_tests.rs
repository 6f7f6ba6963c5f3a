use proptest::prelude::*;
use work_planner::{Predecessors, TaskResources, TimeSpan, TimeUnit};

fn unit() -> impl Strategy<Value = TimeUnit> {
    proptest::sample::select(TimeUnit::ALL.to_vec())
}

proptest! {
    #[test]
    fn display_parses_back(hundredths in -100_000i64..100_000, unit in unit()) {
        let span = TimeSpan::new(hundredths as f64 / 100.0, unit);
        let reparsed = TimeSpan::parse(&span.to_string()).unwrap();
        prop_assert_eq!(reparsed, span);
        let compact = TimeSpan::parse(&span.to_compact_string()).unwrap();
        prop_assert_eq!(compact, span);
    }

    #[test]
    fn seconds_are_whole(number in -1.0e6f64..1.0e6) {
        let span = TimeSpan::new(number, TimeUnit::Seconds);
        prop_assert_eq!(span.number().fract(), 0.0);
    }
}

#[test]
fn long_form_pluralises() {
    assert_eq!(TimeSpan::days(1.0).to_string_long(), "1 day");
    assert_eq!(TimeSpan::new(2.5, TimeUnit::Weeks).to_string_long(), "2.5 weeks");
}

#[test]
fn predecessor_text_is_normalised() {
    let preds = Predecessors::parse(" 3ss+2d,1 , 4FF-4H ").unwrap();
    assert_eq!(preds.to_string(), "3SS+2d, 1, 4FF-4H");
    assert!(preds.depends_on(4));
    assert!(Predecessors::parse("x1").is_err());
    assert!(Predecessors::parse("2XX").is_err());
}

#[test]
fn resource_requests_default_to_one() {
    let res = TaskResources::parse("AB, dev[2.5]").unwrap();
    assert_eq!(res.to_string(), "AB, dev[2.5]");
    let quantities: Vec<f64> = res.iter().map(|r| r.quantity).collect();
    assert_eq!(quantities, vec![1.0, 2.5]);
    assert!(TaskResources::parse("AB[0]").is_err());
    assert!(TaskResources::parse("AB[x]").is_err());
}
