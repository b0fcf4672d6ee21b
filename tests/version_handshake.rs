//! End-to-end version handshake, client role (§8 scenario 1).

use ca_proto::{CircuitConfig, CircuitState, Command, Role, VirtualCircuit};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn client_version_request_matches_exact_wire_bytes() {
    let mut client = VirtualCircuit::new(Role::Client, "127.0.0.1:5064", CircuitConfig::default());

    let req = Command::VersionRequest { priority: 0, version: 13 };
    let bytes = client.send(&req).unwrap();

    assert_eq!(
        bytes,
        vec![
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0D, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ]
    );
    assert_eq!(client.state(), CircuitState::AwaitVersion);
}

#[test]
fn feeding_the_version_response_reaches_connected() {
    init_tracing();
    let mut client = VirtualCircuit::new(Role::Client, "127.0.0.1:5064", CircuitConfig::default());
    client.send(&Command::VersionRequest { priority: 0, version: 13 }).unwrap();

    let response_bytes: [u8; 16] = [
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0D, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00,
    ];
    let (command, consumed) = client.next_command(&response_bytes).unwrap().unwrap();
    assert_eq!(consumed, response_bytes.len());
    assert_eq!(command, Command::VersionResponse { version: 13 });
    assert_eq!(client.state(), CircuitState::Connected);
    assert_eq!(client.negotiated_version(), Some(13));
}

#[test]
fn partial_response_bytes_yield_need_data_and_leave_state_unchanged() {
    let mut client = VirtualCircuit::new(Role::Client, "127.0.0.1:5064", CircuitConfig::default());
    client.send(&Command::VersionRequest { priority: 0, version: 13 }).unwrap();

    let short = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0D];
    assert_eq!(client.next_command(&short).unwrap(), None);
    assert_eq!(client.state(), CircuitState::AwaitVersion);
}
