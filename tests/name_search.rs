//! UDP name search framing and the server's reply (§8 scenario 2).

use ca_proto::{Broadcaster, BroadcasterConfig, Command, Role};

#[test]
fn search_datagram_leads_with_version_request_and_has_exact_header_fields() {
    let mut client = Broadcaster::new(Role::Client, BroadcasterConfig::default());
    client.note_pending_search(1, "pv");

    let commands = vec![
        Command::VersionRequest { priority: 0, version: 13 },
        Command::SearchRequest { reply_required: true, minor_version: 13, cid: 1, name: "pv" },
    ];
    let datagrams = client.send(&commands).unwrap();
    assert_eq!(datagrams.len(), 1);

    // VersionRequest header is the first 16 bytes.
    assert_eq!(&datagrams[0][0..2], &0u16.to_be_bytes());

    // SearchRequest header follows immediately.
    let search = &datagrams[0][16..32];
    let payload_size = u16::from_be_bytes([search[2], search[3]]);
    let data_type = u16::from_be_bytes([search[4], search[5]]);
    let data_count = u16::from_be_bytes([search[6], search[7]]);
    let cid = u32::from_be_bytes(search[8..12].try_into().unwrap());
    assert_eq!(payload_size, 8, "\"pv\" NUL-padded from 2 to 8 bytes");
    assert_eq!(data_type, 10, "reply_required => DOREPLY flag of 10");
    assert_eq!(data_count, 13);
    assert_eq!(cid, 1);

    let name_bytes = &datagrams[0][32..40];
    assert_eq!(&name_bytes[..2], b"pv");
    assert!(name_bytes[2..].iter().all(|&b| b == 0));
}

#[test]
fn server_search_response_round_trips_through_recv() {
    let mut server = Broadcaster::new(Role::Server, BroadcasterConfig::default());
    let response = Command::SearchResponse { tcp_port: 5064, cid: 1, minor_version: Some(13) };
    let datagrams = server.send(&[response]).unwrap();
    assert_eq!(datagrams.len(), 1);

    let client = Broadcaster::new(Role::Client, BroadcasterConfig::default());
    let received = client.recv(&datagrams[0], ("192.168.0.10".to_string(), 5064)).unwrap();
    assert_eq!(received.len(), 1);
    match &received[0].command {
        Command::SearchResponse { tcp_port, cid, minor_version } => {
            assert_eq!(*tcp_port, 5064);
            assert_eq!(*cid, 1);
            assert_eq!(*minor_version, Some(13));
        }
        other => panic!("wrong variant: {other:?}"),
    }
    assert_eq!(received[0].address.0, "192.168.0.10");
}

#[test]
fn pending_search_is_tracked_until_completed() {
    let mut client = Broadcaster::new(Role::Client, BroadcasterConfig::default());
    client.note_pending_search(1, "pv");
    assert_eq!(client.pending_search_name(1), Some("pv"));
    assert_eq!(client.complete_search(1), Some("pv".to_string()));
    assert_eq!(client.pending_search_name(1), None);
}
