//! Monitor subscribe/cancel lifecycle (§8 scenario 5), including the
//! zero-element EventAddResponse vs. cancel-acknowledgement disambiguation
//! called out in §9.

use ca_proto::dbr::{self, DbrType, Metadata, NativeType, Payload, Value};
use ca_proto::{CircuitConfig, Command, Header, Role, VirtualCircuit};

fn channel_ready(client: &mut VirtualCircuit, server: &mut VirtualCircuit) -> u32 {
    let req = client.send(&Command::VersionRequest { priority: 0, version: 13 }).unwrap();
    server.next_command(&req).unwrap();
    let resp = server.send(&Command::VersionResponse { version: 13 }).unwrap();
    client.next_command(&resp).unwrap();

    let cid = client.new_channel("pv");
    let create = client
        .send(&Command::CreateChanRequest { cid, client_minor_version: 13, name: "pv" })
        .unwrap();
    server.next_command(&create).unwrap();
    let create_resp = server
        .send(&Command::CreateChanResponse {
            native_data_type: DbrType::Double,
            native_data_count: 1,
            cid,
            sid: 42,
        })
        .unwrap();
    client.next_command(&create_resp).unwrap();
    42
}

fn double_payload(value: f64) -> Payload<'static> {
    let bytes: &'static [u8] = Box::leak(dbr::encode_values(&[value]).into_boxed_slice());
    let value = Value::decode(NativeType::Float64, 1, bytes).unwrap();
    Payload { metadata: Metadata::None, value }
}

#[test]
fn event_add_yields_an_immediate_response_and_further_updates() {
    let mut client = VirtualCircuit::new(Role::Client, "peer", CircuitConfig::default());
    let mut server = VirtualCircuit::new(Role::Server, "peer", CircuitConfig::default());
    let sid = channel_ready(&mut client, &mut server);

    let subscriptionid = client.new_subscriptionid();
    let add = Command::EventAddRequest {
        data_type: DbrType::Double,
        data_count: 1,
        sid,
        subscriptionid,
        mask: 1,
    };
    let bytes = client.send(&add).unwrap();
    server.next_command(&bytes).unwrap();

    let initial = Command::EventAddResponse { sid, subscriptionid, payload: double_payload(1.0) };
    let bytes = server.send(&initial).unwrap();
    client.next_command(&bytes).unwrap();

    // A later value-change update uses the same subscriptionid.
    let update = Command::EventAddResponse { sid, subscriptionid, payload: double_payload(2.0) };
    let bytes = server.send(&update).unwrap();
    let (decoded, _) = client.next_command(&bytes).unwrap().unwrap();
    match decoded {
        Command::EventAddResponse { subscriptionid: got, payload, .. } => {
            assert_eq!(got, subscriptionid);
            match payload.value {
                Value::Float64(arr) => assert_eq!(arr.get(0), Some(2.0)),
                other => panic!("wrong value variant: {other:?}"),
            }
        }
        other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn event_cancel_terminal_response_clears_the_subscription() {
    let mut client = VirtualCircuit::new(Role::Client, "peer", CircuitConfig::default());
    let mut server = VirtualCircuit::new(Role::Server, "peer", CircuitConfig::default());
    let sid = channel_ready(&mut client, &mut server);

    let subscriptionid = client.new_subscriptionid();
    let add = Command::EventAddRequest {
        data_type: DbrType::Double,
        data_count: 1,
        sid,
        subscriptionid,
        mask: 1,
    };
    let bytes = client.send(&add).unwrap();
    server.next_command(&bytes).unwrap();
    let initial = Command::EventAddResponse { sid, subscriptionid, payload: double_payload(1.0) };
    let bytes = server.send(&initial).unwrap();
    client.next_command(&bytes).unwrap();

    let cancel = Command::EventCancelRequest { data_type: DbrType::Double, sid, subscriptionid };
    let bytes = client.send(&cancel).unwrap();
    server.next_command(&bytes).unwrap();

    // The terminal acknowledgement is wire-identical to a zero-element
    // EventAddResponse: same command id, zero payload_size.
    let cancel_ack = Command::EventCancelResponse { data_type: DbrType::Double, sid, subscriptionid };
    let bytes = server.send(&cancel_ack).unwrap();
    let (header, _) = Header::decode(&bytes).unwrap().unwrap();
    assert_eq!(header.payload_size, 0);
    let add_response_id = Command::EventAddResponse { sid, subscriptionid, payload: double_payload(0.0) }
        .command_id();
    assert_eq!(header.command, add_response_id as u16);

    let (decoded, _) = client.next_command(&bytes).unwrap().unwrap();
    assert_eq!(
        decoded,
        Command::EventCancelResponse { data_type: DbrType::Double, sid, subscriptionid }
    );
}

#[test]
fn a_genuinely_empty_event_add_response_is_not_mistaken_for_a_cancel_ack() {
    let mut client = VirtualCircuit::new(Role::Client, "peer", CircuitConfig::default());
    let mut server = VirtualCircuit::new(Role::Server, "peer", CircuitConfig::default());
    let sid = channel_ready(&mut client, &mut server);

    let subscriptionid = client.new_subscriptionid();
    let add = Command::EventAddRequest {
        data_type: DbrType::Double,
        data_count: 0,
        sid,
        subscriptionid,
        mask: 1,
    };
    let bytes = client.send(&add).unwrap();
    server.next_command(&bytes).unwrap();

    // No EventCancelRequest has been seen for this subscription, so a
    // zero-length response is just that: a zero-length data update.
    let empty = Command::EventAddResponse { sid, subscriptionid, payload: double_payload(0.0) };
    let bytes = server.send(&empty).unwrap();
    let (decoded, _) = client.next_command(&bytes).unwrap().unwrap();
    assert!(matches!(decoded, Command::EventAddResponse { .. }));
}
