use fundwatch::core::FundMonitor;
use fundwatch::core::config::AppConfig;
use std::fs;
use tracing::info;

// Adds automatic logging to test
mod test_utils {
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Quote line with the fields the quote provider reads filled in.
    pub fn quote_payload(code: &str, last: f64, change_pct: f64, prev: f64) -> String {
        let mut fields: Vec<String> = (0..45).map(|i| format!("{i}")).collect();
        fields[2] = code.to_string();
        fields[3] = last.to_string();
        fields[4] = prev.to_string();
        fields[5] = prev.to_string();
        fields[32] = change_pct.to_string();
        fields[33] = last.max(prev).to_string();
        fields[34] = last.min(prev).to_string();
        format!("v_s_{code}=\"{}\";", fields.join("~"))
    }

    pub async fn mount_quote(server: &MockServer, code: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/q=s_{code}")))
            .respond_with(response)
            .mount(server)
            .await;
    }

    pub async fn mount_series(server: &MockServer, code: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path_regex(format!("^/chart/hs/time/hs_klines/{code}/1min/")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(server)
            .await;
    }

    pub fn write_config(server_uri: &str, total_weight_ratio: f64) -> tempfile::NamedTempFile {
        let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        let config_content = format!(
            r#"
fund:
  name: "Fund A"
  principal: 16000
  base_hold_earnings: -435.84
  total_weight_ratio: {total_weight_ratio}
  holdings:
    - code: "688619"
      name: "合合信息"
      weight: 0.10
    - code: "688258"
      name: "卓易信息"
      weight: 0.05
refresh_interval_secs: 1
providers:
  quote:
    base_url: {server_uri}
  series:
    base_url: {server_uri}
"#
        );
        std::fs::write(config_file.path(), config_content).expect("Failed to write config file");
        config_file
    }
}

const SERIES_JSON: &str = r#"{"data": [
    ["2024-05-17 09:30", 10.10],
    ["2024-05-17 09:31", 10.15],
    ["2024-05-17 09:32", 10.20]
]}"#;

#[test_log::test(tokio::test)]
async fn test_cycle_with_mock_quotes() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount_quote(
        &mock_server,
        "688619",
        wiremock::ResponseTemplate::new(200)
            .set_body_string(test_utils::quote_payload("688619", 10.2, 2.0, 10.0)),
    )
    .await;
    test_utils::mount_quote(
        &mock_server,
        "688258",
        wiremock::ResponseTemplate::new(200)
            .set_body_string(test_utils::quote_payload("688258", 19.8, -1.0, 20.0)),
    )
    .await;

    let config_file = test_utils::write_config(&mock_server.uri(), 0.15);
    let config = AppConfig::load_from_path(config_file.path()).expect("Config should load");
    let monitor = FundMonitor::from_config(config).expect("Monitor should build");

    let report = monitor.run_cycle(&|| {}).await;
    info!(?report.metrics, "Cycle finished");

    assert_eq!(report.metrics.fund_change_pct, 1.0);
    assert_eq!(report.metrics.real_earnings, 160.0);
    assert_eq!(report.metrics.hold_earnings, -275.84);
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.details[0].last_price, 10.2);
    assert_eq!(report.details[1].previous_close, 20.0);

    monitor.run_cycle(&|| {}).await;
    assert_eq!(monitor.history().await.len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_cycle_survives_failed_quote() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount_quote(
        &mock_server,
        "688619",
        wiremock::ResponseTemplate::new(200)
            .set_body_string(test_utils::quote_payload("688619", 10.2, 2.0, 10.0)),
    )
    .await;
    test_utils::mount_quote(&mock_server, "688258", wiremock::ResponseTemplate::new(503)).await;

    let config_file = test_utils::write_config(&mock_server.uri(), 0.15);
    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let monitor = FundMonitor::from_config(config).unwrap();

    let report = monitor.run_cycle(&|| {}).await;

    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].code, "688258");
    // Computed as if 688258 were flat: 0.10 × 0.02 / 0.15
    assert_eq!(report.metrics.fund_change_pct, 1.33);
    assert_eq!(report.metrics.real_earnings, 213.33);
    assert_eq!(monitor.history().await.len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_series_is_cached_between_calls() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount_series(&mock_server, "688619", SERIES_JSON).await;

    let config_file = test_utils::write_config(&mock_server.uri(), 0.15);
    let mut config = AppConfig::load_from_path(config_file.path()).unwrap();
    config.refresh_interval_secs = 30;
    let monitor = FundMonitor::from_config(config).unwrap();

    let first = monitor.get_series("688619").await;
    let second = monitor.get_series("688619").await;

    assert_eq!(first.series.times(), &["09:30", "09:31", "09:32"]);
    assert!(std::sync::Arc::ptr_eq(&first.series, &second.series));
    // `expect(1)` on the mock is verified when the server drops
}

#[test_log::test(tokio::test)]
async fn test_zero_weight_ratio_fails_before_any_request() {
    let mock_server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::any())
        .respond_with(wiremock::ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config_file = test_utils::write_config(&mock_server.uri(), 0.0);
    let result = fundwatch::run_command(
        fundwatch::AppCommand::Cycle,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;

    let err = result.expect_err("A zero total weight ratio must be rejected");
    assert!(format!("{err:#}").contains("total_weight_ratio must be positive"));
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = wiremock::MockServer::start().await;
    for (code, last, change, prev) in [("688619", 10.2, 2.0, 10.0), ("688258", 19.8, -1.0, 20.0)] {
        test_utils::mount_quote(
            &mock_server,
            code,
            wiremock::ResponseTemplate::new(200)
                .set_body_string(test_utils::quote_payload(code, last, change, prev)),
        )
        .await;
    }
    test_utils::mount_series(&mock_server, "688619", SERIES_JSON).await;

    let config_file = test_utils::write_config(&mock_server.uri(), 0.15);
    let config_path = config_file.path().to_str().unwrap();

    let result = fundwatch::run_command(fundwatch::AppCommand::Cycle, Some(config_path)).await;
    assert!(result.is_ok(), "Cycle failed with: {:?}", result.err());

    // Second cycle lands after the 1s refresh interval
    let result = fundwatch::run_command(
        fundwatch::AppCommand::Watch {
            series: None,
            cycles: Some(2),
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Watch failed with: {:?}", result.err());

    let result = fundwatch::run_command(
        fundwatch::AppCommand::Series {
            code: "688619".to_string(),
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Series failed with: {:?}", result.err());

    fs::remove_file(config_path).ok();
}
