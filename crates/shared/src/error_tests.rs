use super::*;
use rstest::rstest;

#[rstest]
#[case(AppError::NotFound("test".into()), 66)]
#[case(AppError::Validation("test".into()), 65)]
#[case(AppError::PeriodResolution("test".into()), 65)]
#[case(AppError::Configuration("test".into()), 78)]
#[case(AppError::Ledger("test".into()), 74)]
#[case(AppError::Internal("test".into()), 70)]
fn test_app_error_exit_codes(#[case] error: AppError, #[case] expected: i32) {
    assert_eq!(error.exit_code(), expected);
}

#[rstest]
#[case(AppError::NotFound("test".into()), "NOT_FOUND")]
#[case(AppError::Validation("test".into()), "VALIDATION_ERROR")]
#[case(AppError::Configuration("test".into()), "CONFIGURATION_ERROR")]
#[case(AppError::PeriodResolution("test".into()), "PERIOD_RESOLUTION_ERROR")]
#[case(AppError::Ledger("test".into()), "LEDGER_ERROR")]
#[case(AppError::Internal("test".into()), "INTERNAL_ERROR")]
fn test_app_error_error_codes(#[case] error: AppError, #[case] expected: &str) {
    assert_eq!(error.error_code(), expected);
}

#[test]
fn test_app_error_display() {
    assert_eq!(
        format!("{}", AppError::NotFound("msg".into())),
        "Not found: msg"
    );
    assert_eq!(
        format!("{}", AppError::Validation("msg".into())),
        "Validation error: msg"
    );
    assert_eq!(
        format!("{}", AppError::Configuration("msg".into())),
        "Configuration error: msg"
    );
    assert_eq!(
        format!("{}", AppError::PeriodResolution("msg".into())),
        "Period resolution error: msg"
    );
    assert_eq!(
        format!("{}", AppError::Ledger("msg".into())),
        "Ledger error: msg"
    );
    assert_eq!(
        format!("{}", AppError::Internal("msg".into())),
        "Internal error: msg"
    );
}

#[test]
fn test_config_error_maps_to_configuration() {
    let err: AppError = config::ConfigError::Message("bad".into()).into();
    assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
}
