//! Codec Tests
//!
//! Tests for writing commands and reading status lines and replies.

use std::io::{BufRead, Cursor};

use vpnd_client::protocol::{
    encode_command, encode_error, encode_response, read_response, read_status, write_command,
    Command, ConnectionInfo, Response, Status, MAX_LINE_LEN,
};
use vpnd_client::ClientError;

// =============================================================================
// Helper Functions
// =============================================================================

fn reader(text: &str) -> Cursor<Vec<u8>> {
    Cursor::new(text.as_bytes().to_vec())
}

/// Whatever the codec left unread
fn remaining(cursor: &mut Cursor<Vec<u8>>) -> String {
    let mut rest = String::new();
    while cursor.read_line(&mut rest).unwrap() > 0 {}
    rest
}

// =============================================================================
// Command Encoding Tests
// =============================================================================

#[test]
fn test_encode_command_appends_newline() {
    let bytes = encode_command(&Command::List).unwrap();
    assert_eq!(bytes, b"LIST\n");
}

#[test]
fn test_write_command() {
    let mut out = Vec::new();
    write_command(
        &mut out,
        &Command::SetPorts {
            ports: vec![11940, 11941],
        },
    )
    .unwrap();
    assert_eq!(out, b"SET_PORTS 11940 11941\n");
}

#[test]
fn test_write_command_rejects_newline_without_writing() {
    let mut out = Vec::new();
    let result = write_command(&mut out, &Command::Raw("LIST\nQUIT".into()));
    assert!(matches!(result, Err(ClientError::InvalidCommand(_))));
    assert!(out.is_empty());
}

// =============================================================================
// Status Line Tests
// =============================================================================

#[test]
fn test_status_parse() {
    assert_eq!(Status::parse("OK: 0\n").unwrap(), Status::Ok(0));
    assert_eq!(Status::parse("OK: 12\r\n").unwrap(), Status::Ok(12));
    assert_eq!(
        Status::parse("ERR: NOT_SUPPORTED\n").unwrap(),
        Status::Error("ERR: NOT_SUPPORTED".into())
    );
}

#[test]
fn test_status_prefix_is_exact() {
    // No space after the colon: not a success line
    assert!(!Status::parse("OK:3").unwrap().is_ok());
    assert!(!Status::parse("ok: 3").unwrap().is_ok());
    assert!(!Status::parse(" OK: 3").unwrap().is_ok());
}

#[test]
fn test_status_malformed_count() {
    assert!(matches!(
        Status::parse("OK: abc"),
        Err(ClientError::MalformedStatus(_))
    ));
    assert!(matches!(
        Status::parse("OK: -1"),
        Err(ClientError::MalformedStatus(_))
    ));
}

#[test]
fn test_status_error_code() {
    assert_eq!(
        Status::parse("ERR: INVALID_PORT").unwrap().error_code(),
        Some("INVALID_PORT")
    );
    assert_eq!(Status::parse("ERROR: bad command").unwrap().error_code(), None);
    assert_eq!(Status::Ok(1).error_code(), None);
}

#[test]
fn test_read_status_eof() {
    let mut input = reader("");
    assert!(matches!(
        read_status(&mut input),
        Err(ClientError::ConnectionClosed)
    ));
}

// =============================================================================
// Response Decoding Tests
// =============================================================================

#[test]
fn test_read_response_trims_payload_lines() {
    let mut input = reader("OK: 3\na\nb \n  c\n");
    let response = read_response(&mut input).unwrap();
    assert_eq!(response.lines(), ["a", "b", "c"]);
}

#[test]
fn test_read_response_zero_consumes_nothing_more() {
    let mut input = reader("OK: 0\nnext line\n");
    let response = read_response(&mut input).unwrap();
    assert!(response.is_empty());
    assert_eq!(remaining(&mut input), "next line\n");
}

#[test]
fn test_read_response_error_reads_no_payload() {
    let mut input = reader("ERROR: bad command\npayload 1\npayload 2\n");
    match read_response(&mut input) {
        Err(ClientError::Protocol { status_line, code }) => {
            assert_eq!(status_line, "ERROR: bad command");
            assert_eq!(code, None);
        }
        other => panic!("Expected Protocol error, got {:?}", other),
    }
    assert_eq!(remaining(&mut input), "payload 1\npayload 2\n");
}

#[test]
fn test_read_response_err_code() {
    let mut input = reader("ERR: NOT_SUPPORTED\n");
    let err = read_response(&mut input).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.status_line(), Some("ERR: NOT_SUPPORTED"));
    match err {
        ClientError::Protocol { code, .. } => assert_eq!(code.as_deref(), Some("NOT_SUPPORTED")),
        other => panic!("Expected Protocol error, got {:?}", other),
    }
}

#[test]
fn test_read_response_keeps_empty_lines() {
    let mut input = reader("OK: 4\n\n   \nx\n\t\n");
    let response = read_response(&mut input).unwrap();
    assert_eq!(response.lines(), ["", "", "x", ""]);
}

#[test]
fn test_read_response_exact_count_regardless_of_content() {
    // Payload lines that look like status lines are still payload
    let mut input = reader("OK: 2\nOK: 5\nERR: X\nLEFTOVER\n");
    let response = read_response(&mut input).unwrap();
    assert_eq!(response.lines(), ["OK: 5", "ERR: X"]);
    assert_eq!(remaining(&mut input), "LEFTOVER\n");
}

#[test]
fn test_read_response_truncated() {
    let mut input = reader("OK: 3\na\nb\n");
    match read_response(&mut input) {
        Err(ClientError::TruncatedResponse { expected, received }) => {
            assert_eq!(expected, 3);
            assert_eq!(received, 2);
        }
        other => panic!("Expected TruncatedResponse, got {:?}", other),
    }
}

#[test]
fn test_read_response_crlf() {
    let mut input = reader("OK: 1\r\nvalue\r\n");
    let response = read_response(&mut input).unwrap();
    assert_eq!(response.lines(), ["value"]);
}

#[test]
fn test_read_response_last_line_without_newline() {
    let mut input = reader("OK: 1\nlast");
    let response = read_response(&mut input).unwrap();
    assert_eq!(response.lines(), ["last"]);
}

#[test]
fn test_read_response_rejects_overlong_line() {
    let mut text = String::from("OK: 1\n");
    text.push_str(&"x".repeat(MAX_LINE_LEN + 10));
    text.push('\n');
    let mut input = reader(&text);
    match read_response(&mut input) {
        Err(err @ ClientError::LineTooLong { .. }) => assert!(err.is_fatal()),
        other => panic!("Expected LineTooLong, got {:?}", other),
    }
}

#[test]
fn test_read_consecutive_responses() {
    let mut input = reader("OK: 0\nOK: 1\nalice 10.0.0.2 fd00::2\nOK: 0\n");
    assert!(read_response(&mut input).unwrap().is_empty());
    assert_eq!(read_response(&mut input).unwrap().len(), 1);
    assert!(read_response(&mut input).unwrap().is_empty());
    assert!(matches!(
        read_response(&mut input),
        Err(ClientError::ConnectionClosed)
    ));
}

// =============================================================================
// Response Encoding Tests
// =============================================================================

#[test]
fn test_encode_response_is_readable() {
    let response = Response::new(vec!["a".into(), "b".into()]);
    assert_eq!(encode_response(&response), b"OK: 2\na\nb\n");

    let mut input = Cursor::new(encode_response(&response));
    assert_eq!(read_response(&mut input).unwrap(), response);
}

#[test]
fn test_encode_error() {
    assert_eq!(encode_error("ERR: NOT_SUPPORTED"), b"ERR: NOT_SUPPORTED\n");
}

// =============================================================================
// LIST Payload Tests
// =============================================================================

#[test]
fn test_connection_info_full() {
    let info = ConnectionInfo::parse("alice 10.52.58.2 fdbf:4dff:a892:1572::1000").unwrap();
    assert_eq!(info.common_name, "alice");
    assert_eq!(info.ipv4, Some("10.52.58.2".parse().unwrap()));
    assert_eq!(info.ipv6, Some("fdbf:4dff:a892:1572::1000".parse().unwrap()));
}

#[test]
fn test_connection_info_missing_addresses() {
    let info = ConnectionInfo::parse("bob 10.0.0.3").unwrap();
    assert_eq!(info.ipv6, None);

    let info = ConnectionInfo::parse("carol  fd00::4").unwrap();
    assert_eq!(info.ipv4, None);
    assert_eq!(info.ipv6, Some("fd00::4".parse().unwrap()));

    let info = ConnectionInfo::parse("dave").unwrap();
    assert_eq!((info.ipv4, info.ipv6), (None, None));
}

#[test]
fn test_connection_info_invalid() {
    assert!(ConnectionInfo::parse("").is_err());
    assert!(ConnectionInfo::parse("eve 999.0.0.1 fd00::1").is_err());
    assert!(ConnectionInfo::parse("eve 10.0.0.1 nope").is_err());
    assert!(ConnectionInfo::parse("eve 10.0.0.1 fd00::1 extra").is_err());
}

#[test]
fn test_response_connections() {
    let response = Response::new(vec![
        "alice 10.0.0.2 fd00::2".into(),
        "bob 10.0.0.3 fd00::3".into(),
    ]);
    let conns = response.connections().unwrap();
    assert_eq!(conns.len(), 2);
    assert_eq!(conns[1].common_name, "bob");
}

#[test]
fn test_response_disconnected_count() {
    assert_eq!(Response::empty().disconnected_count().unwrap(), None);
    assert_eq!(
        Response::new(vec!["3".into()]).disconnected_count().unwrap(),
        Some(3)
    );
    assert!(Response::new(vec!["three".into()]).disconnected_count().is_err());
    assert!(Response::new(vec!["1".into(), "2".into()])
        .disconnected_count()
        .is_err());
}
