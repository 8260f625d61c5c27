//! Tests for batch schema inspection.

use bronzeflow::error::IngestError;
use bronzeflow::schema::{FieldKind, inspect};
use serde_json::json;

#[test]
fn fields_reported_in_first_observed_order() {
    let records = vec![json!({"zeta": 1, "alpha": "x", "mid": true})];
    let fields = inspect(&records).unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn later_records_append_new_fields() {
    let records = vec![
        json!({"id": 1}),
        json!({"id": 2, "extra": "late"}),
        json!({"id": 3, "last": false}),
    ];
    let fields = inspect(&records).unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["id", "extra", "last"]);
}

#[test]
fn kind_comes_from_first_non_null_observation() {
    let records = vec![json!({"v": null}), json!({"v": 3}), json!({"v": 4})];
    let fields = inspect(&records).unwrap();
    assert_eq!(fields[0].kind, FieldKind::Integer);
}

#[test]
fn integer_and_float_widen_to_float() {
    let records = vec![json!({"amount": 10}), json!({"amount": 10.5})];
    let fields = inspect(&records).unwrap();
    assert_eq!(fields[0].kind, FieldKind::Float);
}

#[test]
fn conflicting_kinds_widen_to_string() {
    let records = vec![json!({"v": 1}), json!({"v": "one"})];
    let fields = inspect(&records).unwrap();
    assert_eq!(fields[0].kind, FieldKind::String);
}

#[test]
fn null_only_field_defaults_to_string() {
    let records = vec![json!({"v": null}), json!({"v": null})];
    let fields = inspect(&records).unwrap();
    assert_eq!(fields[0].kind, FieldKind::String);
}

#[test]
fn nested_values_are_json_kind() {
    let records = vec![json!({"tags": ["a", "b"], "meta": {"k": 1}})];
    let fields = inspect(&records).unwrap();
    assert_eq!(fields[0].kind, FieldKind::Json);
    assert_eq!(fields[1].kind, FieldKind::Json);
}

#[test]
fn empty_batch_is_schema_unavailable() {
    let err = inspect(&[]).unwrap_err();
    assert!(matches!(err, IngestError::SchemaUnavailable { .. }));
}

#[test]
fn object_free_batch_is_schema_unavailable() {
    let records = vec![json!(42), json!("text")];
    let err = inspect(&records).unwrap_err();
    assert!(matches!(err, IngestError::SchemaUnavailable { .. }));
}

#[test]
fn fieldless_batch_is_schema_unavailable() {
    let records = vec![json!({}), json!({})];
    let err = inspect(&records).unwrap_err();
    assert!(matches!(err, IngestError::SchemaUnavailable { .. }));
}
