//! Integration tests for logging system

use core_model::{JobKind, SectorKey};
use core_runtime::logging::{init_logging, sector_span, LogFormat, LogLevel, LoggingConfig};
use core_runtime::Error;

// A subscriber can only be installed once per process, so the whole
// lifecycle is covered by a single test.
#[test]
fn test_logging_initializes_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_thread_info(true);

    init_logging(config.clone()).unwrap();

    let span = sector_span(SectorKey(1), 1, JobKind::Sync);
    let _entered = span.enter();
    tracing::info!(taxa = 3, "Logging inside a sector span");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Logging(_))));
}

#[test]
fn test_invalid_filter_fails_before_install() {
    let config = LoggingConfig::default().with_filter("core_assembly=loud");
    assert!(matches!(init_logging(config), Err(Error::Config(msg)) if msg.contains("Invalid log filter")));
}
