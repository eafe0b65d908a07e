//! Loading configuration files and wiring the configured components.

use std::{fs, path::Path};

use rstest::rstest;
use serial_test::serial;
use tempfile::TempDir;
use truthframe::{
    Assembler,
    Payload,
    Publisher,
    Registry,
    TruthConfig,
    TruthError,
    config::StoreDriver,
    envelope::EnvelopeSettings,
    publish::{PublishOverrides, Strategy},
};
use truthframe_testing::{LoggerHandle, election_return, logger};

fn write_config(dir: &TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("truthframe.toml");
    fs::write(&path, text).expect("write config");
    path
}

#[rstest]
fn loads_file_and_builds_a_working_pipeline(election_return: Payload) {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
        [envelope]
        prefix = "BAL"

        [publish]
        strategy = "size"
        size = 40

        [codec]
        transport = "base64url+deflate"
        "#,
    );
    let mut config = TruthConfig::from_toml_str(&fs::read_to_string(&path).expect("read")).expect("parse");
    config.apply_overrides_from(|_| None);

    let registry = Registry::with_defaults();
    let suite = config.suite(&registry, EnvelopeSettings::default()).expect("suite");
    let options = config.publish.merge(&PublishOverrides::default());
    assert_eq!(options.by, Strategy::Size);

    let payload = election_return;
    let lines = Publisher::from(suite.clone())
        .publish(&payload, "CFG", &options)
        .expect("publish");
    assert!(lines.iter().all(|line| line.starts_with("BAL|v1|CFG|")));

    let assembler = Assembler::from_suite(config.store.open().expect("store"), suite);
    for line in &lines {
        assembler.ingest_line(line).expect("ingest");
    }
    assert_eq!(assembler.assemble("CFG").expect("payload"), payload);
}

#[test]
fn missing_file_is_a_config_error() {
    let err = TruthConfig::load(Some(Path::new("/nonexistent/truthframe.toml"))).expect_err("missing");
    assert!(matches!(err, TruthError::Config(message) if message.contains("failed to read")));
}

#[test]
fn invalid_file_names_the_path() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "[store]\ndriver = \"sqlite\"\n");
    let err = TruthConfig::load(Some(&path)).expect_err("invalid");
    assert!(matches!(err, TruthError::Config(message) if message.contains("truthframe.toml")));
}

#[test]
fn redis_driver_requires_a_url() {
    let mut config = TruthConfig::default();
    config.store.driver = StoreDriver::Redis;
    assert!(matches!(config.store.open(), Err(TruthError::Config(_))));
}

#[rstest]
#[serial]
fn invalid_overrides_are_logged(mut logger: LoggerHandle) {
    let mut config = TruthConfig::default();
    config.apply_overrides_from(|key| (key == "TRUTH_TTL").then(|| "forever".to_owned()));
    assert_eq!(config.store.ttl_secs, 86_400);
    assert!(logger.contains(log::Level::Warn, "invalid TRUTH_TTL"));
}
