use super::filter::{CompareOp, FilterExpr};
use super::{Projection, QueryError, Value};

fn lookup_from<'a>(pairs: &'a [(&'a str, Value)]) -> impl Fn(&str) -> Value + 'a {
    move |name| {
        pairs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)
    }
}

#[test]
fn test_parse_simple_comparison() {
    let expr = FilterExpr::parse("polarity = 1").unwrap();
    assert_eq!(
        expr,
        FilterExpr::Compare {
            column: "polarity".to_string(),
            op: CompareOp::Eq,
            value: Value::Number(1.0),
        }
    );
}

#[test]
fn test_parse_double_equals_is_equality() {
    let single = FilterExpr::parse("compound_id = 'C1'").unwrap();
    let double = FilterExpr::parse("compound_id == 'C1'").unwrap();
    assert_eq!(single, double);
}

#[test]
fn test_parse_all_comparison_operators() {
    for (text, op) in [
        ("!=", CompareOp::Ne),
        ("<", CompareOp::Lt),
        ("<=", CompareOp::Le),
        (">", CompareOp::Gt),
        (">=", CompareOp::Ge),
    ] {
        let expr = FilterExpr::parse(&format!("collision_energy {text} 20")).unwrap();
        assert!(matches!(expr, FilterExpr::Compare { op: parsed, .. } if parsed == op));
    }
}

#[test]
fn test_and_binds_tighter_than_or() {
    let expr = FilterExpr::parse("a = 1 OR b = 2 AND c = 3").unwrap();
    // Must parse as a=1 OR (b=2 AND c=3).
    match expr {
        FilterExpr::Or(left, right) => {
            assert!(matches!(*left, FilterExpr::Compare { .. }));
            assert!(matches!(*right, FilterExpr::And(_, _)));
        }
        other => panic!("expected OR at the root, got {other:?}"),
    }
}

#[test]
fn test_parentheses_override_precedence() {
    let expr = FilterExpr::parse("(a = 1 OR b = 2) AND c = 3").unwrap();
    match expr {
        FilterExpr::And(left, right) => {
            assert!(matches!(*left, FilterExpr::Or(_, _)));
            assert!(matches!(*right, FilterExpr::Compare { .. }));
        }
        other => panic!("expected AND at the root, got {other:?}"),
    }
}

#[test]
fn test_parse_in_list() {
    let expr = FilterExpr::parse("compound_id IN ('C1', 'C2', 'C3')").unwrap();
    assert_eq!(
        expr,
        FilterExpr::In {
            column: "compound_id".to_string(),
            values: vec![
                Value::Text("C1".to_string()),
                Value::Text("C2".to_string()),
                Value::Text("C3".to_string()),
            ],
        }
    );
}

#[test]
fn test_keywords_are_case_insensitive() {
    let expr = FilterExpr::parse("a = 1 and b in (2, 3) or c = true").unwrap();
    assert!(matches!(expr, FilterExpr::Or(_, _)));
}

#[test]
fn test_quoted_strings_accept_both_quote_styles() {
    let single = FilterExpr::parse("name = 'D-Glucose'").unwrap();
    let double = FilterExpr::parse("name = \"D-Glucose\"").unwrap();
    assert_eq!(single, double);
}

#[test]
fn test_parse_negative_and_scientific_numbers() {
    let expr = FilterExpr::parse("polarity = -1 AND precursor_mz < 1.81e2").unwrap();
    let conjuncts = expr.into_conjuncts();
    assert_eq!(
        conjuncts[0],
        FilterExpr::Compare {
            column: "polarity".to_string(),
            op: CompareOp::Eq,
            value: Value::Number(-1.0),
        }
    );
    assert_eq!(
        conjuncts[1],
        FilterExpr::Compare {
            column: "precursor_mz".to_string(),
            op: CompareOp::Lt,
            value: Value::Number(181.0),
        }
    );
}

#[test]
fn test_parse_errors() {
    for input in [
        "",
        "a =",
        "= 1",
        "a ! 1",
        "a = 'unterminated",
        "(a = 1",
        "a IN ()",
        "a IN (1,)",
        "a = 1 extra",
        "a ~ 1",
    ] {
        let err = FilterExpr::parse(input).unwrap_err();
        assert!(
            matches!(err, QueryError::InvalidFilter(_)),
            "input {input:?} should fail to parse"
        );
    }
}

#[test]
fn test_evaluate_comparisons() {
    let row = [
        ("polarity", Value::Int(1)),
        ("collision_energy", Value::Number(20.0)),
        ("compound_id", Value::Text("C1".to_string())),
        ("predicted", Value::Bool(false)),
    ];
    let lookup = lookup_from(&row);

    let cases = [
        ("polarity = 1", true),
        ("polarity != 1", false),
        ("collision_energy >= 20", true),
        ("collision_energy > 20", false),
        ("collision_energy < 35.5", true),
        ("compound_id = 'C1'", true),
        ("compound_id != 'C2'", true),
        ("compound_id IN ('C2', 'C1')", true),
        ("compound_id IN ('C2', 'C3')", false),
        ("predicted = false", true),
        ("polarity = 1 AND compound_id = 'C1'", true),
        ("polarity = -1 OR compound_id = 'C1'", true),
        ("polarity = -1 AND compound_id = 'C1'", false),
    ];
    for (input, expected) in cases {
        let expr = FilterExpr::parse(input).unwrap();
        assert_eq!(expr.evaluate(&lookup), expected, "filter {input:?}");
    }
}

#[test]
fn test_null_cells_never_satisfy_a_clause() {
    let lookup = lookup_from(&[]);
    for input in [
        "missing = 1",
        "missing != 1",
        "missing < 1",
        "missing >= 1",
        "missing IN (1, 2)",
    ] {
        let expr = FilterExpr::parse(input).unwrap();
        assert!(!expr.evaluate(&lookup), "filter {input:?} on a Null cell");
    }
}

#[test]
fn test_integer_cells_compare_against_number_literals() {
    let row = [("spectrum_id", Value::Int(42))];
    let lookup = lookup_from(&row);
    assert!(FilterExpr::parse("spectrum_id = 42").unwrap().evaluate(&lookup));
    assert!(FilterExpr::parse("spectrum_id < 43").unwrap().evaluate(&lookup));
    assert!(!FilterExpr::parse("spectrum_id > 42").unwrap().evaluate(&lookup));
}

#[test]
fn test_conjunct_splitting_stops_at_or() {
    let expr = FilterExpr::parse("a = 1 AND (b = 2 OR c = 3) AND d = 4").unwrap();
    let conjuncts = expr.into_conjuncts();
    assert_eq!(conjuncts.len(), 3);
    assert!(matches!(conjuncts[1], FilterExpr::Or(_, _)));

    let or_expr = FilterExpr::parse("a = 1 OR b = 2").unwrap();
    assert_eq!(or_expr.clone().into_conjuncts(), vec![or_expr]);
}

#[test]
fn test_conjoin_rebuilds_equivalent_expression() {
    let expr = FilterExpr::parse("a = 1 AND b = 2 AND c = 3").unwrap();
    let rebuilt = FilterExpr::conjoin(expr.clone().into_conjuncts()).unwrap();
    let row = [
        ("a", Value::Number(1.0)),
        ("b", Value::Number(2.0)),
        ("c", Value::Number(3.0)),
    ];
    let lookup = lookup_from(&row);
    assert_eq!(expr.evaluate(&lookup), rebuilt.evaluate(&lookup));
    assert!(FilterExpr::conjoin(Vec::new()).is_none());
}

#[test]
fn test_for_each_column_visits_every_reference() {
    let expr = FilterExpr::parse("a = 1 AND (b IN (2) OR a = 3)").unwrap();
    let mut seen = Vec::new();
    expr.for_each_column(&mut |c| seen.push(c.to_string()));
    assert_eq!(seen, vec!["a", "b", "a"]);
}

#[test]
fn test_projection_deduplicates_keeping_first_position() {
    let projection = Projection::columns(["mz", "compound_id", "mz", "polarity"]);
    assert_eq!(
        projection.requested(),
        Some(&["mz".to_string(), "compound_id".to_string(), "polarity".to_string()][..])
    );
    assert!(!projection.is_all());
    assert!(Projection::all().is_all());
}

#[test]
fn test_value_equality_and_ordering() {
    assert!(Value::Int(3).equals(&Value::Number(3.0)));
    assert!(Value::Number(2.5).equals(&Value::Number(2.5)));
    assert!(!Value::Null.equals(&Value::Null));
    assert!(!Value::Text("a".to_string()).equals(&Value::Number(1.0)));

    assert_eq!(
        Value::Text("abc".to_string()).compare(&Value::Text("abd".to_string())),
        Some(std::cmp::Ordering::Less)
    );
    assert_eq!(
        Value::Int(5).compare(&Value::Number(4.5)),
        Some(std::cmp::Ordering::Greater)
    );
    assert_eq!(Value::Null.compare(&Value::Number(1.0)), None);
}
