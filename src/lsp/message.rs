//! JSON-RPC 2.0 envelopes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::analysis::AnalyzerError;
use crate::document::DocumentError;

pub const JSONRPC_VERSION: &str = "2.0";

pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const REQUEST_FAILED: i64 = -32803;
}

/// Error object of a failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("method not found: {}", method),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }

    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::new(error_codes::REQUEST_FAILED, message)
    }
}

impl From<DocumentError> for ResponseError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::InvalidPosition { .. } | DocumentError::InvertedRange { .. } => {
                Self::invalid_params(err.to_string())
            }
            DocumentError::AlreadyOpen(_)
            | DocumentError::NotFound(_)
            | DocumentError::StaleVersion { .. } => Self::request_failed(err.to_string()),
        }
    }
}

impl From<AnalyzerError> for ResponseError {
    fn from(err: AnalyzerError) -> Self {
        Self::internal_error(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePayload {
    Result(Value),
    Error(ResponseError),
}

/// Reply to a request, sent or received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

impl Response {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    pub fn error(id: Value, error: ResponseError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Value,
    pub method: String,
    /// `Value::Null` when the message carried no params
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

/// Outbound notification with typed params
#[derive(Debug, Serialize)]
pub(crate) struct OutgoingNotification<'a, P> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> OutgoingNotification<'a, P> {
    pub fn new(method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// A body that could not be turned into a [`Message`]
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Id to answer with, or `None` when no reply should be sent
    pub reply_to: Option<Value>,
    pub error: ResponseError,
}

impl Rejection {
    fn reply(id: Value, error: ResponseError) -> Self {
        Self {
            reply_to: Some(id),
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Response(Response),
}

impl Message {
    pub fn parse(body: &[u8]) -> Result<Self, Rejection> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            Rejection::reply(Value::Null, ResponseError::parse_error(e.to_string()))
        })?;
        let Value::Object(mut object) = value else {
            return Err(Rejection::reply(
                Value::Null,
                ResponseError::invalid_request("message is not a JSON object"),
            ));
        };

        let id = object.remove("id");
        if let Some(id) = &id {
            if !matches!(id, Value::Number(_) | Value::String(_) | Value::Null) {
                return Err(Rejection::reply(
                    Value::Null,
                    ResponseError::invalid_request("id must be a number, string or null"),
                ));
            }
        }

        match object.remove("method") {
            Some(Value::String(method)) => {
                let params = object.remove("params").unwrap_or(Value::Null);
                Ok(match id {
                    Some(id) => Self::Request(Request { id, method, params }),
                    None => Self::Notification(Notification { method, params }),
                })
            }
            Some(_) => Err(Rejection {
                reply_to: id,
                error: ResponseError::invalid_request("method must be a string"),
            }),
            None => parse_response(id, object),
        }
    }
}

fn parse_response(id: Option<Value>, mut object: Map<String, Value>) -> Result<Message, Rejection> {
    let Some(id) = id else {
        return Err(Rejection {
            reply_to: None,
            error: ResponseError::invalid_request("message has neither method nor id"),
        });
    };

    if let Some(error) = object.remove("error") {
        let error = serde_json::from_value(error).map_err(|e| {
            Rejection {
                reply_to: None,
                error: ResponseError::invalid_request(format!("malformed error object: {}", e)),
            }
        })?;
        return Ok(Message::Response(Response::error(id, error)));
    }

    match object.remove("result") {
        Some(result) => Ok(Message::Response(Response::result(id, result))),
        None => Err(Rejection::reply(
            id,
            ResponseError::invalid_request("message has no method, result or error"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(AnalyzerError::Failed("no parse".to_string()), error_codes::INTERNAL_ERROR)]
    #[case(AnalyzerError::Formatting("line 40".to_string()), error_codes::INTERNAL_ERROR)]
    fn analyzer_errors_are_internal_errors(#[case] err: AnalyzerError, #[case] code: i64) {
        let message = err.to_string();
        let response_error = ResponseError::from(err);
        assert_eq!(response_error.code, code);
        assert_eq!(response_error.message, message);
    }

    fn parse(value: Value) -> Result<Message, Rejection> {
        Message::parse(value.to_string().as_bytes())
    }

    #[test]
    fn parse_recognizes_request() {
        let message = parse(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "textDocument/documentSymbol",
            "params": {"textDocument": {"uri": "file:///a.sv"}}
        }))
        .unwrap();

        assert_eq!(
            message,
            Message::Request(Request {
                id: json!(7),
                method: "textDocument/documentSymbol".to_string(),
                params: json!({"textDocument": {"uri": "file:///a.sv"}}),
            })
        );
    }

    #[test]
    fn parse_recognizes_notification_without_params() {
        let message = parse(json!({"jsonrpc": "2.0", "method": "exit"})).unwrap();

        assert_eq!(
            message,
            Message::Notification(Notification {
                method: "exit".to_string(),
                params: Value::Null,
            })
        );
    }

    #[rstest]
    #[case(json!({"jsonrpc": "2.0", "id": "abc", "result": null}), false)]
    #[case(json!({"jsonrpc": "2.0", "id": 3, "error": {"code": -32601, "message": "nope"}}), true)]
    fn parse_recognizes_inbound_response(#[case] value: Value, #[case] is_error: bool) {
        let Message::Response(response) = parse(value).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.is_error(), is_error);
    }

    #[test]
    fn parse_rejects_invalid_json_with_null_id() {
        let rejection = Message::parse(b"{\"jsonrpc\": ").unwrap_err();

        assert_eq!(rejection.reply_to, Some(Value::Null));
        assert_eq!(rejection.error.code, error_codes::PARSE_ERROR);
    }

    #[rstest]
    #[case(json!([1, 2, 3]), Some(Value::Null))]
    #[case(json!({"jsonrpc": "2.0", "id": {"nested": true}, "method": "x"}), Some(Value::Null))]
    #[case(json!({"jsonrpc": "2.0", "id": 4, "method": 12}), Some(json!(4)))]
    #[case(json!({"jsonrpc": "2.0", "id": 5}), Some(json!(5)))]
    #[case(json!({"jsonrpc": "2.0", "method": 12}), None)]
    #[case(json!({"jsonrpc": "2.0"}), None)]
    fn parse_rejects_invalid_requests(#[case] value: Value, #[case] reply_to: Option<Value>) {
        let rejection = parse(value).unwrap_err();

        assert_eq!(rejection.reply_to, reply_to);
        assert_eq!(rejection.error.code, error_codes::INVALID_REQUEST);
    }

    #[test]
    fn response_serializes_result_and_error_exclusively() {
        let ok = serde_json::to_value(Response::result(json!(1), Value::Null)).unwrap();
        let err = serde_json::to_value(Response::error(
            json!("x"),
            ResponseError::method_not_found("foo/bar"),
        ))
        .unwrap();

        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 1, "result": null}));
        assert_eq!(
            err,
            json!({
                "jsonrpc": "2.0",
                "id": "x",
                "error": {"code": -32601, "message": "method not found: foo/bar"}
            })
        );
    }

    #[test]
    fn document_errors_map_to_protocol_codes() {
        let uri = lsp_types::Url::parse("file:///a.sv").unwrap();

        let missing: ResponseError = DocumentError::NotFound(uri.clone()).into();
        let inverted: ResponseError = DocumentError::InvertedRange {
            index: 0,
            start: lsp_types::Position::new(1, 0),
            end: lsp_types::Position::new(0, 0),
        }
        .into();

        assert_eq!(missing.code, error_codes::REQUEST_FAILED);
        assert_eq!(inverted.code, error_codes::INVALID_PARAMS);
    }
}
