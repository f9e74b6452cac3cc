use diptych_error::{
    ConfigError, DiptychError, Entity, ErrorClass, GateBlockedError, MalformedOutputError,
    NotFoundError, ProviderError, ProviderErrorKind, StoreError, StoreErrorKind, ValidationError,
    ValidationErrorKind,
};

#[test]
fn test_provider_and_malformed_output_are_retried() {
    let provider: DiptychError = ProviderError::new(ProviderErrorKind::Http {
        status_code: 400,
        message: "bad request".to_string(),
    })
    .into();
    assert!(provider.should_retry());
    assert_eq!(provider.class(), ErrorClass::Provider);

    let malformed: DiptychError = MalformedOutputError::new("not an object").into();
    assert!(malformed.should_retry());
}

#[test]
fn test_terminal_errors_are_not_retried() {
    let errors: Vec<DiptychError> = vec![
        NotFoundError::new(Entity::Run, ["r1"]).into(),
        ValidationError::new(ValidationErrorKind::EmptyTopicIds).into(),
        GateBlockedError::new(vec!["missing artifact for lang='fr'".to_string()]).into(),
        ConfigError::new("export.root is not configured").into(),
        StoreError::new(StoreErrorKind::InvalidValue {
            column: "runs.status".to_string(),
            value: "paused".to_string(),
        })
        .into(),
    ];
    for err in errors {
        assert!(!err.should_retry(), "{} should be terminal", err);
    }
}

#[test]
fn test_transient_store_errors_are_retried() {
    let err: DiptychError = StoreError::new(StoreErrorKind::Connection("reset".to_string())).into();
    assert!(err.should_retry());
    assert_eq!(err.class(), ErrorClass::Storage);
}

#[test]
fn test_conflict_classification() {
    let slug: DiptychError =
        ValidationError::new(ValidationErrorKind::SlugTaken("hello".to_string())).into();
    assert_eq!(slug.class(), ErrorClass::Conflict);

    let handle: DiptychError =
        ValidationError::new(ValidationErrorKind::MissingJobHandle("b1".to_string())).into();
    assert_eq!(handle.class(), ErrorClass::Conflict);

    let empty: DiptychError = ValidationError::new(ValidationErrorKind::EmptyTopicIds).into();
    assert_eq!(empty.class(), ErrorClass::Validation);
}

#[test]
fn test_summary_omits_location() {
    let err: DiptychError = NotFoundError::new(Entity::Topic, ["t1", "t2"]).into();
    assert_eq!(err.summary(), "topic not found: t1, t2");

    let err: DiptychError = ProviderError::new(ProviderErrorKind::Http {
        status_code: 503,
        message: "overloaded".to_string(),
    })
    .into();
    assert_eq!(err.summary(), "HTTP 503 error: overloaded");
    assert!(err.to_string().contains("at line"));
}

#[test]
fn test_gate_blocked_keeps_every_reason() {
    let reasons = vec![
        "run.status must be 'succeeded' (current: 'running')".to_string(),
        "missing artifact for lang='fr'".to_string(),
        "run.meta.claims_to_verify must be empty or missing".to_string(),
    ];
    let err = GateBlockedError::new(reasons.clone());
    assert_eq!(err.reasons, reasons);
    let wrapped: DiptychError = err.into();
    assert_eq!(wrapped.class(), ErrorClass::GateBlocked);
    assert!(wrapped.summary().contains("claims_to_verify"));
}
