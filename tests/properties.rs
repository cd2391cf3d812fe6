//! # Property Search Test Suite
//!
//! End-to-end checks of the search driver over the default generators:
//! counterexample discovery, enumeration order, determinism, implication
//! filtering, user-registered strategies and report serialization.

use depthcheck::{
    assume, ensure_that, exists, forall, Arity, Draws, EngineResult, Failure, Gen, Pass, Property,
    PropertySet, Reason, Registry, Report, Search, SearchConfig, Strategy, TypeDescriptor, Value,
    Verdict,
};
use std::sync::{Arc, Mutex};

fn is_sorted(xs: &[i64]) -> bool {
    xs.windows(2).all(|w| w[0] <= w[1])
}

/// Reversing a list keeps it sorted, which is false.
fn reverse_sorted() -> Property {
    forall(["List[int]"], |args| {
        let mut xs = args[0].ints()?;
        xs.reverse();
        ensure_that("is_sorted", is_sorted, &xs[..])?;
        Ok(true)
    })
    .named("reverse_sorted")
}

#[test]
fn test_reverse_counterexample_is_smallest() {
    let registry = Registry::with_defaults();
    let search = Search::new(&registry, SearchConfig::default());
    let report = search.check(&reverse_sorted()).unwrap();

    assert_eq!(report.depth, 3);
    let case = report.verdict.counterexample().unwrap();
    assert_eq!(case.values(), vec![&Value::from(vec![-1i64, 0])]);
    assert_eq!(case.arguments[0].ty, "List[int]");
    assert_eq!(
        case.reason,
        Reason::Assertion("is_sorted([0, -1]) is false".to_string())
    );
    // 1 list at depth 1, 6 at depth 2, 8 tried at depth 3
    assert_eq!(report.stats.calls, 15);
}

#[test]
fn test_reverse_holds_below_depth_three() {
    let registry = Registry::with_defaults();
    let search = Search::new(&registry, SearchConfig::default().with_max_depth(2));
    let report = search.check(&reverse_sorted()).unwrap();
    assert_eq!(report.depth, 2);
    assert_eq!(report.verdict, Verdict::Pass(Pass::Exhausted));
}

#[test]
fn test_argument_tuples_follow_priority_order() {
    let registry = Registry::with_defaults();
    let tuples: Vec<(i64, i64)> = registry
        .value_args(&["nat".into(), "nat".into()], 3)
        .unwrap()
        .map(|t| (t[0].clone().unwrap().as_int().unwrap(), t[1].clone().unwrap().as_int().unwrap()))
        .collect();
    assert_eq!(
        tuples,
        [(0, 0), (0, 1), (1, 0), (1, 1), (0, 2), (2, 0), (1, 2), (2, 1), (2, 2)]
    );
}

#[test]
fn test_searches_are_deterministic() {
    let registry = Registry::with_defaults();
    let search = Search::new(&registry, SearchConfig::default());
    let first = search.check(&reverse_sorted()).unwrap();
    let second = search.check(&reverse_sorted()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

    let fresh = Registry::with_defaults();
    let third = Search::new(&fresh, SearchConfig::default())
        .check(&reverse_sorted())
        .unwrap();
    assert_eq!(first, third);
}

#[test]
fn test_implication_filters_before_the_predicate() {
    let registry = Registry::with_defaults();
    let positive = registry
        .implies("positive", |v| Ok(v.as_int()? > 0), "int")
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let prop = forall([positive], move |args| {
        let x = args[0].as_int()?;
        recorded.lock().unwrap().push(x);
        Ok(x > 0)
    });

    let search = Search::new(&registry, SearchConfig::default().with_min_depth(3).with_max_depth(3));
    let report = search.check(&prop).unwrap();
    assert!(report.passed());
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(report.stats.calls, 3);
    // 0, -1, -2, -3 rejected once each
    assert_eq!(report.stats.assumptions_failed, 4);
    assert_eq!(report.stats.rejected("positive->int"), 4);
}

#[test]
fn test_assumptions_inside_predicates() {
    let registry = Registry::with_defaults();
    let prop = forall(["int", "int"], |args| {
        let (x, y) = (args[0].as_int()?, args[1].as_int()?);
        assume(x < y)?;
        Ok(x < y)
    })
    .named("ordered");
    let search = Search::new(&registry, SearchConfig::default().with_max_depth(1));
    let report = search.check(&prop).unwrap();
    assert!(report.passed());
    // of the nine pairs over 0, -1, 1 three are ordered
    assert_eq!(report.stats.calls, 9);
    assert_eq!(report.stats.rejected("ordered"), 6);
}

#[test]
fn test_exhausted_types() {
    let registry = Registry::with_defaults();
    let nothing = registry.from_fn("nothing", |_| Vec::<Value>::new()).unwrap();
    let search = Search::new(&registry, SearchConfig::default().with_max_depth(3));

    let all = search.check(&forall([nothing.clone()], |_| Ok(false))).unwrap();
    assert_eq!(all.verdict, Verdict::Pass(Pass::Exhausted));
    assert_eq!(all.stats.calls, 0);

    let some = search.check(&exists([nothing], |_| Ok(true))).unwrap();
    assert!(matches!(some.verdict, Verdict::Fail(Failure::NoWitness { .. })));
}

#[test]
fn test_check_all_stops_at_first_failure() {
    let registry = Registry::with_defaults();
    let set = PropertySet::new("lists")
        .with(Property::unit().named("trivial"))
        .with(reverse_sorted())
        .with(Property::empty().named("never_checked"));
    let reports = Search::new(&registry, SearchConfig::default())
        .check_all(&set)
        .unwrap();
    let names: Vec<&str> = reports.iter().map(|r| r.property.as_str()).collect();
    assert_eq!(names, ["trivial", "reverse_sorted"]);
    assert!(reports[0].passed());
    assert!(!reports[1].passed());
}

#[test]
fn test_report_serializes_to_json() {
    let registry = Registry::with_defaults();
    let report = Search::new(&registry, SearchConfig::default())
        .check(&reverse_sorted())
        .unwrap();
    let json = report.to_json().unwrap();

    let tree: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(tree["property"], "reverse_sorted");
    assert_eq!(tree["depth"], 3);
    assert_eq!(tree["stats"]["calls"], 15);

    let back: Report = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}

/// Pairs of equal values of one parameter type.
struct Twins;

impl Strategy for Twins {
    fn name(&self) -> String {
        "Twins".to_string()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        Box::new(
            gen.slots(&params[0])
                .map(|draw| draw.map(|v| Value::Tuple(vec![v.clone(), v]))),
        )
    }
}

#[test]
fn test_user_constructor_composes_with_defaults() {
    let registry = Registry::with_defaults();
    registry.resolver().declare("Twins", Arity::Fixed(1));
    registry.register("Twins", Twins, false).unwrap();

    let values: Vec<String> = registry
        .values("Twins[bool]", 1)
        .unwrap()
        .iter()
        .map(|v| v.to_string())
        .collect();
    assert_eq!(values, ["(false, false)", "(true, true)"]);

    let prop = forall(["Twins[nat]"], |args| -> EngineResult<bool> {
        let pair = args[0].as_tuple()?;
        Ok(pair[0] == pair[1])
    });
    let report = Search::new(&registry, SearchConfig::default()).check(&prop).unwrap();
    assert!(report.passed());
    assert_eq!(report.stats.calls, 1 + 2 + 3 + 4 + 5);
}
