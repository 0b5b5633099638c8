use flowprobe_core::{FieldPath, FieldPathError, PathSegment};
use serde_json::json;

#[test]
fn parses_dot_and_index_segments() {
    let p = FieldPath::parse("data.tokens[0].value").unwrap();
    assert_eq!(
        p.segments(),
        &[
            PathSegment::Key("data".to_string()),
            PathSegment::Key("tokens".to_string()),
            PathSegment::Index(0),
            PathSegment::Key("value".to_string()),
        ]
    );
    assert_eq!(p.to_string(), "data.tokens[0].value");
}

#[test]
fn parses_leading_and_chained_indices() {
    let p = FieldPath::parse("[1][0].id").unwrap();
    assert_eq!(
        p.segments(),
        &[
            PathSegment::Index(1),
            PathSegment::Index(0),
            PathSegment::Key("id".to_string()),
        ]
    );
}

#[test]
fn rejects_malformed_paths() {
    assert_eq!(FieldPath::parse("  "), Err(FieldPathError::Empty));
    assert!(matches!(
        FieldPath::parse("a..b"),
        Err(FieldPathError::EmptySegment { .. })
    ));
    assert!(matches!(
        FieldPath::parse("a."),
        Err(FieldPathError::EmptySegment { .. })
    ));
    assert!(matches!(
        FieldPath::parse("items[1"),
        Err(FieldPathError::UnterminatedIndex { .. })
    ));
    assert!(matches!(
        FieldPath::parse("items[first]"),
        Err(FieldPathError::InvalidIndex { .. })
    ));
    assert_eq!(
        FieldPath::parse("a[0]b"),
        Err(FieldPathError::MissingSeparator {
            path: "a[0]b".to_string(),
            offset: 4,
        })
    );
    assert!(matches!(
        FieldPath::parse("[0]id"),
        Err(FieldPathError::MissingSeparator { offset: 3, .. })
    ));
}

#[test]
fn resolves_nested_values() {
    let body = json!({
        "data": { "tokens": [ { "value": "abc" }, { "value": "def" } ] },
        "count": 2
    });
    let p = FieldPath::parse("data.tokens[1].value").unwrap();
    assert_eq!(p.resolve(&body), Some(&json!("def")));
    assert_eq!(
        FieldPath::parse("count").unwrap().resolve(&body),
        Some(&json!(2))
    );
}

#[test]
fn resolve_distinguishes_missing_from_null() {
    let body = json!({ "a": null, "list": [] });
    assert_eq!(
        FieldPath::parse("a").unwrap().resolve(&body),
        Some(&serde_json::Value::Null)
    );
    assert_eq!(FieldPath::parse("b").unwrap().resolve(&body), None);
    assert_eq!(FieldPath::parse("list[0]").unwrap().resolve(&body), None);
    assert_eq!(FieldPath::parse("a.b").unwrap().resolve(&body), None);
}
