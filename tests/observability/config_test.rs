/*!
 * Configuration sources
 */

use pretty_assertions::assert_eq;
use serial_test::serial;
use socket_gateway::{GatewayConfig, SocketGateway};
use std::time::Duration;

#[test]
#[serial]
fn test_env_configures_gateway() {
    std::env::set_var("GATEWAY_NOFILE", "5");
    std::env::set_var("GATEWAY_USER_MEMORY", "4096");
    std::env::set_var("GATEWAY_RCVBUF", "not-a-number");

    let config = GatewayConfig::from_env();
    std::env::remove_var("GATEWAY_NOFILE");
    std::env::remove_var("GATEWAY_USER_MEMORY");
    std::env::remove_var("GATEWAY_RCVBUF");

    assert_eq!(config.nofile, 5);
    assert_eq!(config.user_memory_size, 4096);
    assert_eq!(config.loopback.rcvbuf_entries, GatewayConfig::default().loopback.rcvbuf_entries);

    let (gw, _stack) = SocketGateway::with_loopback(config);
    let proc = gw.spawn_process().unwrap();
    assert_eq!(proc.fds().capacity(), 5);
    assert_eq!(proc.memory().size(), 4096);
}

#[test]
fn test_json_config_roundtrip() {
    let config = GatewayConfig::from_json(
        r#"{"nfile": 10, "loopback": {"block_timeout_ms": 75, "max_sockets": 3}}"#,
    )
    .unwrap();
    assert_eq!(config.nfile, 10);
    assert_eq!(config.loopback.block_timeout(), Some(Duration::from_millis(75)));
    assert_eq!(config.loopback.max_sockets, 3);

    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(GatewayConfig::from_json(&json).unwrap(), config);
}

#[test]
fn test_malformed_json_is_an_error() {
    assert!(GatewayConfig::from_json(r#"{"nofile": "many"}"#).is_err());
}
