//! Unit tests for `AppError` display format.

use modweaver::AppError;

#[test]
fn display_prefixes_the_failure_domain() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Discovery("bad".into()), "discovery: bad"),
        (AppError::Subscriber("bad".into()), "subscriber: bad"),
        (AppError::Injection("bad".into()), "injection: bad"),
        (AppError::Repository("bad".into()), "repository: bad"),
        (AppError::Resolution("bad".into()), "resolution: bad"),
        (AppError::Compilation("bad".into()), "compilation: bad"),
        (AppError::Streaming("bad".into()), "streaming: bad"),
        (AppError::Session("bad".into()), "session: bad"),
        (AppError::Io("bad".into()), "io: bad"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn io_errors_convert_to_io_variant() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file").into();
    assert_eq!(err, AppError::Io("no such file".into()));
}

#[test]
fn toml_errors_convert_to_config_variant() {
    let parse: Result<toml::Value, toml::de::Error> = toml::from_str("game = [");
    let err: AppError = parse.unwrap_err().into();
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn app_error_implements_std_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(AppError::Streaming("busy".into()));
    assert_eq!(err.to_string(), "streaming: busy");
}
