#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use queryprom_exporter::config::{self, Driver, MetricKind, UpdateMode, DEFAULT_TIMEOUT};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
driver: clickhouse
metrics:
  - name: rows_total
    resultField: cnt
    querry: "SELECT 1" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
driver: clickhouse
metrics:
  - name: rows_total
    resultField: cnt
    query: "SELECT table, cnt FROM t"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.driver, Driver::ClickHouse);

    let m = &cfg.metrics[0];
    assert_eq!(m.name, "rows_total");
    assert_eq!(m.help, "rows_total");
    assert_eq!(m.timeout, DEFAULT_TIMEOUT);
    assert_eq!(m.kind, MetricKind::Gauge);
    assert_eq!(m.update, UpdateMode::Add);
    assert!(m.labels.is_empty());
}

#[test]
fn full_metric_entry() {
    let ok = r#"
driver: postgre
metrics:
  - name: parts_total
    help: "Active parts per table"
    timeout: 30s
    resultField: parts
    labels:
      env: prod
      cluster: main
    metricType: Counter
    update: set
    query: "SELECT table, count() AS parts FROM system.parts GROUP BY table"
  - name: merges
    timeout: 5
    resultField: n
    metricType: histogram
    query: "SELECT count() AS n FROM system.merges"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.driver, Driver::Postgres);

    let parts = &cfg.metrics[0];
    assert_eq!(parts.timeout, Duration::from_secs(30));
    assert_eq!(parts.kind, MetricKind::Counter);
    assert_eq!(parts.update, UpdateMode::Set);
    assert_eq!(parts.labels.get("env").map(String::as_str), Some("prod"));
    assert_eq!(parts.labels.len(), 2);

    let merges = &cfg.metrics[1];
    assert_eq!(merges.timeout, Duration::from_secs(5));
    // unknown types silently become gauges
    assert_eq!(merges.kind, MetricKind::Gauge);
}

#[test]
fn zero_timeout_is_defaulted() {
    let ok = r#"
driver: clickhouse
metrics:
  - name: m
    timeout: 0
    resultField: cnt
    query: "SELECT 1 AS cnt"
"#;
    let cfg = config::load_from_str(ok).unwrap();
    assert_eq!(cfg.metrics[0].timeout, DEFAULT_TIMEOUT);
}

#[test]
fn unknown_driver_is_fatal() {
    let bad = r#"
driver: mysql
metrics:
  - name: m
    resultField: cnt
    query: "SELECT 1 AS cnt"
"#;
    let err = config::load_from_str(bad).unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DRIVER");
    assert!(err.code().is_startup_fatal());
}

#[test]
fn driver_is_checked_before_metrics() {
    let err = config::load_from_str("driver: oracle\nmetrics: []\n").unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DRIVER");
}

#[test]
fn empty_metrics_is_fatal() {
    let err = config::load_from_str("driver: clickhouse\nmetrics: []\n").unwrap_err();
    assert_eq!(err.code().as_str(), "NO_METRICS_DEFINED");

    let err = config::load_from_str("driver: clickhouse\n").unwrap_err();
    assert_eq!(err.code().as_str(), "NO_METRICS_DEFINED");
}

#[test]
fn required_metric_fields() {
    let cases = [
        ("resultField: cnt\n    query: q", "MISSING_NAME"),
        ("name: m\n    resultField: cnt", "MISSING_QUERY"),
        ("name: m\n    query: q", "MISSING_RESULT_FIELD"),
    ];
    for (body, code) in cases {
        let doc = format!("driver: clickhouse\nmetrics:\n  - {body}\n");
        let err = config::load_from_str(&doc).expect_err(code);
        assert_eq!(err.code().as_str(), code, "for {body:?}");
        assert!(err.code().is_startup_fatal());
    }
}

#[test]
fn bad_timeout_string_fails_parse() {
    let bad = r#"
driver: clickhouse
metrics:
  - name: m
    timeout: "soon"
    resultField: cnt
    query: "SELECT 1 AS cnt"
"#;
    let err = config::load_from_str(bad).unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}
