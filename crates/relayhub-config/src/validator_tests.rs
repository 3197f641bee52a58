use super::*;

#[test]
fn test_validate_default_config() {
    let result = ConfigValidator::validate(&Config::default());
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_validate_empty_server_id() {
    let mut config = Config::default();
    config.server.id = "  ".to_string();

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "server.id"));
}

#[test]
fn test_validate_invalid_port() {
    let mut config = Config::default();
    config.server.port = 0;

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "server.port"));
}

#[test]
fn test_validate_zero_timeouts() {
    let mut config = Config::default();
    config.server.read_timeout_secs = 0;
    config.server.write_timeout_secs = 0;

    let result = ConfigValidator::validate(&config);
    assert_eq!(result.errors.len(), 2);
}

#[test]
fn test_validate_low_read_timeout_warning() {
    let mut config = Config::default();
    config.server.read_timeout_secs = 5;
    config.server.write_timeout_secs = 5;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.path == "server.read_timeout_secs"));
}

#[test]
fn test_validate_write_timeout_exceeds_read_timeout() {
    let mut config = Config::default();
    config.server.read_timeout_secs = 20;
    config.server.write_timeout_secs = 60;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.path == "server.write_timeout_secs"));
}

#[test]
fn test_validate_unknown_log_level() {
    let mut config = Config::default();
    config.logging.level = "verbose".to_string();

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "logging.level"));
}

#[test]
fn test_validate_log_level_is_case_insensitive() {
    let mut config = Config::default();
    config.logging.level = "DEBUG".to_string();

    assert!(ConfigValidator::validate(&config).is_valid());
}
