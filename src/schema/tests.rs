use super::*;
use arrow::datatypes::DataType;

#[test]
fn test_compound_schema_creation() {
    let schema = create_compound_schema();
    assert_eq!(schema.fields().len(), 8);

    assert!(schema.field_with_name(compound_columns::COMPOUND_ID).is_ok());
    assert!(schema.field_with_name(compound_columns::EXACT_MASS).is_ok());

    let synonyms = schema
        .field_with_name(compound_columns::SYNONYMS)
        .unwrap();
    assert!(matches!(synonyms.data_type(), DataType::List(_)));
}

#[test]
fn test_spectrum_schema_creation() {
    let schema = create_spectrum_schema();
    assert_eq!(schema.fields().len(), 11);

    assert!(schema.field_with_name(spectrum_columns::SPECTRUM_ID).is_ok());
    assert!(schema.field_with_name(spectrum_columns::COMPOUND_ID).is_ok());

    let mz = schema.field_with_name(spectrum_columns::MZ).unwrap();
    assert!(matches!(mz.data_type(), DataType::List(_)));
    let intensity = schema.field_with_name(spectrum_columns::INTENSITY).unwrap();
    assert!(matches!(intensity.data_type(), DataType::List(_)));
}

#[test]
fn test_schema_self_validation() {
    assert!(validate_compound_schema(&create_compound_schema()).is_ok());
    assert!(validate_spectrum_schema(&create_spectrum_schema()).is_ok());
}

#[test]
fn test_validation_rejects_missing_column() {
    let schema = Schema::new(vec![Field::new(
        compound_columns::COMPOUND_ID,
        DataType::Utf8,
        false,
    )]);
    let err = validate_compound_schema(&schema).unwrap_err();
    assert!(matches!(err, SchemaError::MissingColumn { .. }));
}

#[test]
fn test_validation_rejects_type_mismatch() {
    let mut fields: Vec<Field> = create_spectrum_schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields[0] = Field::new(spectrum_columns::SPECTRUM_ID, DataType::Utf8, false);
    let err = validate_spectrum_schema(&Schema::new(fields)).unwrap_err();
    assert!(matches!(err, SchemaError::TypeMismatch { .. }));
}

#[test]
fn test_version_compatibility() {
    assert!(versions_compatible(MZANNOT_FORMAT_VERSION));
    assert!(versions_compatible("1.9.3"));
    assert!(!versions_compatible("2.0.0"));
    assert!(!versions_compatible("0.9.0"));
    assert!(!versions_compatible(""));
    assert!(!versions_compatible("unknown"));
}

#[test]
fn test_column_name_lists_match_schemas() {
    let schema = create_compound_schema();
    for name in compound_column_names() {
        assert!(schema.field_with_name(name).is_ok());
    }
    let schema = create_spectrum_schema();
    for name in spectrum_column_names() {
        assert!(schema.field_with_name(name).is_ok());
    }
}
