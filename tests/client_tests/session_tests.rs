//! Session Tests
//!
//! These tests verify, against the mock daemon over plain TCP:
//! - Command/response exchange and typed helpers
//! - Abort on the first error status line
//! - QUIT ends the session
//! - Connection failures

use std::net::TcpListener;
use std::time::Duration;

use vpnd_client::protocol::{ClientEvent, TrafficStats, MAX_LINE_LEN};
use vpnd_client::testing::{MockDaemon, Reply};
use vpnd_client::{Client, ClientConfig, ClientError, Command, SessionState};

// =============================================================================
// Helper Functions
// =============================================================================

fn connect(daemon: &MockDaemon) -> Client {
    Client::connect(&daemon.client_config()).unwrap()
}

// =============================================================================
// Exchange Tests
// =============================================================================

#[test]
fn test_reference_sequence() {
    let daemon = MockDaemon::builder()
        .reply(
            "LIST",
            Reply::ok(["alice 10.52.58.2 fdbf:4dff:a892:1572::1000", "bob 10.52.58.3 fdbf:4dff:a892:1572::1001"]),
        )
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    client.set_ports(&[11940, 11941]).unwrap();

    let conns = client.list().unwrap();
    assert_eq!(conns.len(), 2);
    assert_eq!(conns[0].common_name, "alice");
    assert_eq!(conns[1].ipv4, Some("10.52.58.3".parse().unwrap()));

    assert_eq!(client.disconnect(&["foo", "bar", "baz"]).unwrap(), None);
    client.quit().unwrap();

    assert_eq!(
        daemon.received(),
        [
            "SET_PORTS 11940 11941",
            "LIST",
            "DISCONNECT foo bar baz",
            "QUIT"
        ]
    );
}

#[test]
fn test_send_returns_trimmed_payload() {
    let daemon = MockDaemon::builder()
        .reply("LIST", Reply::ok(["a", "b ", "  c"]))
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    let response = client.send(&Command::List).unwrap();
    assert_eq!(response.lines(), ["a", "b", "c"]);
}

#[test]
fn test_disconnect_returns_count() {
    let daemon = MockDaemon::builder()
        .reply("DISCONNECT", Reply::ok(["2"]))
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    assert_eq!(client.disconnect(&["foo", "bar", "baz"]).unwrap(), Some(2));
    assert_eq!(daemon.received(), ["DISCONNECT foo bar baz"]);
}

#[test]
fn test_disconnect_bad_count_is_not_fatal() {
    let daemon = MockDaemon::builder()
        .reply("DISCONNECT", Reply::ok(["two"]))
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    assert!(matches!(
        client.disconnect(&["foo"]),
        Err(ClientError::InvalidPayload { .. })
    ));
    assert!(client.is_open());
}

#[test]
fn test_send_raw() {
    let daemon = MockDaemon::builder()
        .reply("STATUS", Reply::ok(["up"]))
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    let response = client.send_raw("STATUS verbose").unwrap();
    assert_eq!(response.lines(), ["up"]);
    assert_eq!(daemon.received(), ["STATUS verbose"]);
}

#[test]
fn test_setup_unconfirmed_verb() {
    let daemon = MockDaemon::builder()
        .reply("SETUP", Reply::ok(["done"]))
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    let response = client.setup("cn", &["profile1", "profile2"]).unwrap();
    assert_eq!(response.lines(), ["done"]);
    assert_eq!(daemon.received(), ["SETUP cn profile1 profile2"]);
}

#[test]
fn test_local_channel_notifications() {
    let daemon = MockDaemon::builder()
        .without_defaults()
        .reply("CLIENT_CONNECT", Reply::empty())
        .reply("CLIENT_DISCONNECT", Reply::empty())
        .start()
        .unwrap();

    let event = ClientEvent {
        profile_id: "profile1".into(),
        common_name: "cn".into(),
        time_unix: 1234567890,
        ipv4: "10.52.58.2".parse().unwrap(),
        ipv6: "fdbf:4dff:a892:1572::1000".parse().unwrap(),
    };

    let mut client = connect(&daemon);
    client.client_connect(event.clone()).unwrap();
    client
        .client_disconnect(
            event,
            TrafficStats {
                bytes_received: 605666,
                bytes_sent: 9777056,
                duration_secs: 120,
            },
        )
        .unwrap();

    assert_eq!(
        daemon.received(),
        [
            "CLIENT_CONNECT profile1 cn 1234567890 10.52.58.2 fdbf:4dff:a892:1572::1000",
            "CLIENT_DISCONNECT profile1 cn 1234567890 10.52.58.2 fdbf:4dff:a892:1572::1000 605666 9777056 120",
        ]
    );
}

// =============================================================================
// Fatal Error Tests
// =============================================================================

#[test]
fn test_error_status_fails_session() {
    let daemon = MockDaemon::builder()
        .reply("DISCONNECT", Reply::status("ERROR: bad command"))
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    client.set_ports(&[11940]).unwrap();

    let err = client.disconnect(&["foo"]).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.status_line(), Some("ERROR: bad command"));
    assert_eq!(
        client.state(),
        &SessionState::Failed("ERROR: bad command".to_string())
    );

    // Nothing else goes out once the session has failed
    match client.send(&Command::List) {
        Err(ClientError::SessionFailed(reason)) => assert_eq!(reason, "ERROR: bad command"),
        other => panic!("Expected SessionFailed, got {:?}", other),
    }
    assert!(matches!(
        client.send(&Command::Quit),
        Err(ClientError::SessionFailed(_))
    ));

    assert_eq!(daemon.received(), ["SET_PORTS 11940", "DISCONNECT foo"]);
    assert_eq!(daemon.next_received(Duration::from_millis(100)), None);
}

#[test]
fn test_unknown_verb_gets_not_supported() {
    let daemon = MockDaemon::start().unwrap();
    let mut client = connect(&daemon);

    match client.send_raw("FROBNICATE") {
        Err(ClientError::Protocol { status_line, code }) => {
            assert_eq!(status_line, "ERR: NOT_SUPPORTED");
            assert_eq!(code.as_deref(), Some("NOT_SUPPORTED"));
        }
        other => panic!("Expected Protocol error, got {:?}", other),
    }
    assert!(!client.is_open());
}

#[test]
fn test_invalid_command_keeps_session_open() {
    let daemon = MockDaemon::start().unwrap();
    let mut client = connect(&daemon);

    assert!(matches!(
        client.send_raw("LIST\nQUIT"),
        Err(ClientError::InvalidCommand(_))
    ));
    assert!(client.is_open());
    assert!(daemon.received().is_empty());

    client.list().unwrap();
    assert_eq!(daemon.received(), ["LIST"]);
}

#[test]
fn test_daemon_drops_connection() {
    let daemon = MockDaemon::builder()
        .reply("LIST", Reply::Close)
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    let err = client.list().unwrap_err();
    assert!(
        matches!(err, ClientError::ConnectionClosed | ClientError::Io(_)),
        "unexpected error {:?}",
        err
    );
    assert!(matches!(client.state(), SessionState::Failed(_)));
}

#[test]
fn test_malformed_status_fails_session() {
    let daemon = MockDaemon::builder()
        .reply("LIST", Reply::status("OK: many"))
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    assert!(matches!(
        client.list(),
        Err(ClientError::MalformedStatus(_))
    ));
    assert!(matches!(
        client.send(&Command::List),
        Err(ClientError::SessionFailed(_))
    ));
}

#[test]
fn test_overlong_reply_line_fails_session() {
    let long_line = "x".repeat(MAX_LINE_LEN + 1);
    let daemon = MockDaemon::builder()
        .reply("LIST", Reply::ok([long_line.as_str()]))
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    let err = client.send(&Command::List).unwrap_err();
    assert!(matches!(err, ClientError::LineTooLong { .. }));
    assert!(err.is_fatal());
    assert!(matches!(client.state(), SessionState::Failed(_)));
}

#[test]
fn test_invalid_list_payload_is_not_fatal() {
    let daemon = MockDaemon::builder()
        .reply("LIST", Reply::ok(["alice not-an-address"]))
        .start()
        .unwrap();

    let mut client = connect(&daemon);
    assert!(matches!(
        client.list(),
        Err(ClientError::InvalidPayload { .. })
    ));
    // The exchange itself completed; the session is still usable
    assert!(client.is_open());
    assert_eq!(client.send(&Command::List).unwrap().len(), 1);
}

// =============================================================================
// QUIT Tests
// =============================================================================

#[test]
fn test_quit_closes_session() {
    let daemon = MockDaemon::start().unwrap();
    let mut client = connect(&daemon);

    let response = client.send(&Command::Quit).unwrap();
    assert!(response.is_empty());
    assert_eq!(client.state(), &SessionState::Closed);

    assert!(matches!(
        client.send(&Command::List),
        Err(ClientError::SessionClosed)
    ));
    assert_eq!(daemon.received(), ["QUIT"]);
}

#[test]
fn test_sessions_are_independent() {
    let daemon = MockDaemon::start().unwrap();

    let mut first = connect(&daemon);
    let mut second = connect(&daemon);
    first.set_ports(&[1]).unwrap();
    second.set_ports(&[2]).unwrap();
    first.quit().unwrap();
    second.list().unwrap();
    second.quit().unwrap();

    assert_eq!(
        daemon.received(),
        ["SET_PORTS 1", "SET_PORTS 2", "QUIT", "LIST", "QUIT"]
    );
}

#[test]
fn test_reply_changed_while_running() {
    let daemon = MockDaemon::start().unwrap();
    let mut client = connect(&daemon);

    assert!(client.list().unwrap().is_empty());
    daemon.set_reply("LIST", Reply::ok(["carol 10.0.0.9"]));
    let conns = client.list().unwrap();
    assert_eq!(conns[0].common_name, "carol");
}

// =============================================================================
// Connection Tests
// =============================================================================

#[test]
fn test_connect_refused() {
    // Grab a free port, then close it again
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ClientConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .connect_timeout(Duration::from_secs(1))
        .build();

    match Client::connect(&config) {
        Err(ClientError::Connection { endpoint, .. }) => {
            assert_eq!(endpoint, format!("127.0.0.1:{}", port))
        }
        Err(other) => panic!("Expected Connection error, got {:?}", other),
        Ok(_) => panic!("Expected Connection error, got a client"),
    }
}

#[test]
fn test_read_timeout() {
    // Accepts but never answers
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ClientConfig::builder()
        .host("127.0.0.1")
        .port(addr.port())
        .read_timeout(Some(Duration::from_millis(100)))
        .build();

    let mut client = Client::connect(&config).unwrap();
    let _accepted = listener.accept().unwrap();

    assert!(matches!(client.list(), Err(ClientError::Io(_))));
    assert!(matches!(client.state(), SessionState::Failed(_)));
}
