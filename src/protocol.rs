//! Request/response codec for the newline-delimited text protocol.
//!
//! One request per line: `<verb> <json-payload>`. Decoding and encoding
//! are pure functions; framing (accumulating bytes into lines) lives in
//! the session.
//!
//! ```text
//! set {"args": {"offsets": {...}}}   ->  ok
//! get {"args": ["msgsin", "lags"]}   ->  ok {"msgsin": 12.5, "lags": {...}}
//! quit / bye / empty line            ->  connection closed, no response
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// A decoded request line.
#[derive(Debug)]
pub enum Request {
    /// `set`: metric name -> raw value, applied as one batch.
    Set(Map<String, Value>),
    /// `get`: metric names to look up.
    Get(Vec<String>),
    /// `quit`, `bye`, or an empty line.
    Quit,
    /// Any other verb. Logged and ignored, no response is sent.
    Unknown(String),
}

/// Response to a decoded request.
#[derive(Debug)]
pub enum Response {
    Ok,
    /// `ok <json-map>`: exactly the requested keys, `null` for misses.
    OkValues(Map<String, Value>),
    Error,
}

#[derive(Deserialize)]
struct SetPayload {
    args: Map<String, Value>,
}

#[derive(Deserialize)]
struct GetPayload {
    args: Vec<String>,
}

/// Decode one request line. The line must already have its trailing
/// `\n`/`\r\n` stripped.
pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    if line.is_empty() || line == "quit" || line == "bye" {
        return Ok(Request::Quit);
    }

    let (verb, payload) = match line.split_once(' ') {
        Some((verb, payload)) => (verb, payload.trim_start()),
        None => (line, ""),
    };

    match verb {
        "set" => {
            if payload.is_empty() {
                return Err(ProtocolError::MissingPayload("set"));
            }
            let decoded: SetPayload = serde_json::from_str(payload).map_err(|e| {
                if payload_shape_error(&e) {
                    ProtocolError::ArgsShape {
                        verb: "set",
                        expected: "{\"args\": {name: value, ...}}",
                    }
                } else {
                    ProtocolError::InvalidJson(e)
                }
            })?;
            Ok(Request::Set(decoded.args))
        }
        "get" => {
            if payload.is_empty() {
                return Err(ProtocolError::MissingPayload("get"));
            }
            let decoded: GetPayload = serde_json::from_str(payload).map_err(|e| {
                if payload_shape_error(&e) {
                    ProtocolError::ArgsShape {
                        verb: "get",
                        expected: "{\"args\": [name, ...]}",
                    }
                } else {
                    ProtocolError::InvalidJson(e)
                }
            })?;
            Ok(Request::Get(decoded.args))
        }
        other => Ok(Request::Unknown(other.to_string())),
    }
}

// serde_json reports both syntax and data-model mismatches through one
// error type; classify well-formed-but-wrong-shape separately so the
// session can log it as a distinct cause.
fn payload_shape_error(e: &serde_json::Error) -> bool {
    e.is_data()
}

/// Encode a response as a newline-terminated wire line.
pub fn encode_response(response: &Response) -> String {
    match response {
        Response::Ok => "ok\n".to_string(),
        Response::OkValues(values) => match serde_json::to_string(values) {
            Ok(json) => format!("ok {}\n", json),
            Err(_) => "error\n".to_string(),
        },
        Response::Error => "error\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_set_batch() {
        let req = parse_request(r#"set {"args": {"bytesin": 1024, "msgsize": 77.5}}"#)
            .expect("valid set");
        match req {
            Request::Set(args) => {
                assert_eq!(args.len(), 2);
                assert_eq!(args["bytesin"], json!(1024));
                assert_eq!(args["msgsize"], json!(77.5));
            }
            other => panic!("expected Set, got {:?}", other),
        }
    }

    #[test]
    fn parses_get_names() {
        let req = parse_request(r#"get {"args": ["msgsin", "lags"]}"#).expect("valid get");
        match req {
            Request::Get(names) => assert_eq!(names, vec!["msgsin", "lags"]),
            other => panic!("expected Get, got {:?}", other),
        }
    }

    #[test]
    fn quit_bye_and_empty_all_close() {
        for line in ["", "quit", "bye"] {
            assert!(matches!(parse_request(line), Ok(Request::Quit)), "line {:?}", line);
        }
    }

    #[test]
    fn unknown_verb_is_not_an_error() {
        match parse_request("flush everything") {
            Ok(Request::Unknown(verb)) => assert_eq!(verb, "flush"),
            other => panic!("expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn invalid_json_is_a_protocol_error() {
        let err = parse_request("set {not json").expect_err("must fail");
        assert!(matches!(err, ProtocolError::InvalidJson(_)));
    }

    #[test]
    fn wrong_args_shape_is_flagged() {
        let err = parse_request(r#"get {"args": {"not": "a list"}}"#).expect_err("must fail");
        assert!(matches!(err, ProtocolError::ArgsShape { verb: "get", .. }));
    }

    #[test]
    fn set_without_payload_fails() {
        let err = parse_request("set").expect_err("must fail");
        assert!(matches!(err, ProtocolError::MissingPayload("set")));
    }

    #[test]
    fn encodes_responses() {
        assert_eq!(encode_response(&Response::Ok), "ok\n");
        assert_eq!(encode_response(&Response::Error), "error\n");

        let mut values = Map::new();
        values.insert("x".to_string(), json!(1.5));
        values.insert("y".to_string(), Value::Null);
        assert_eq!(
            encode_response(&Response::OkValues(values)),
            "ok {\"x\":1.5,\"y\":null}\n"
        );
    }
}
