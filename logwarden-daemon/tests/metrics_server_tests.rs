//! Integration tests for metrics server functionality.

use logwarden_core::config::MetricsConfig;
use logwarden_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn test_install_metrics_recorder_rejects_unsupported_endpoint() {
    let config = MetricsConfig {
        endpoint: "/custom".to_owned(),
        ..Default::default()
    };

    let err = metrics_server::install_metrics_recorder(&config).unwrap_err();
    assert!(err.to_string().contains("unsupported metrics endpoint"));
}

#[test]
#[serial]
fn test_invalid_listen_address_is_rejected() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        ..Default::default()
    };

    assert!(metrics_server::listen_addr(&config).is_err());
    assert!(metrics_server::install_metrics_recorder(&config).is_err());
}

#[test]
#[serial]
fn test_listen_addr_combines_host_and_port() {
    let config = MetricsConfig::default();
    let addr = metrics_server::listen_addr(&config).unwrap();
    assert_eq!(addr.to_string(), "127.0.0.1:9100");
}
