//! Status-tagged response envelope.
//!
//! Every stage in the pipeline resolves to an [`Envelope`]: a JSend-style
//! record tagged `success` / `fail` / `error` with an HTTP status code, a
//! human-readable message and an optional data payload. Failures are drawn
//! from a fixed [`Reply`] catalog so no raw error detail ever leaks to a
//! client response; contextual detail is layered on with the `with_*`
//! builders, which replace rather than mutate.
use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Top-level outcome tag mirroring the JSend proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Normal completion (HTTP 2xx/3xx), carries data.
    Success,
    /// Caller error (HTTP 4xx).
    Fail,
    /// Internal failure (HTTP 5xx).
    Error,
}

/// Fixed catalog of named responses. Each entry carries a default status
/// code and message; callers may override the message with contextual detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Created,
    Accepted,
    NoContent,
    Found,
    NotModified,
    Redirect,
    BadRequest,
    NotAuthorized,
    Forbidden,
    NotFound,
    NotAllowed,
    NotAcceptable,
    ServerError,
}

impl Reply {
    pub fn status(self) -> Status {
        match self {
            Reply::Ok
            | Reply::Created
            | Reply::Accepted
            | Reply::NoContent
            | Reply::Found
            | Reply::NotModified
            | Reply::Redirect => Status::Success,
            Reply::BadRequest
            | Reply::NotAuthorized
            | Reply::Forbidden
            | Reply::NotFound
            | Reply::NotAllowed
            | Reply::NotAcceptable => Status::Fail,
            Reply::ServerError => Status::Error,
        }
    }

    pub fn status_code(self) -> u16 {
        match self {
            Reply::Ok => 200,
            Reply::Created => 201,
            Reply::Accepted => 202,
            Reply::NoContent => 204,
            Reply::Found => 302,
            Reply::NotModified => 304,
            Reply::Redirect => 307,
            Reply::BadRequest => 400,
            Reply::NotAuthorized => 401,
            Reply::Forbidden => 403,
            Reply::NotFound => 404,
            Reply::NotAllowed => 405,
            Reply::NotAcceptable => 406,
            Reply::ServerError => 500,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Reply::Ok => "OK",
            Reply::Created => "Item has been created",
            Reply::Accepted => "Authentication accepted",
            Reply::NoContent => "Item has been modified",
            Reply::Found => "Item was found",
            Reply::NotModified => "No modification made",
            Reply::Redirect => "Redirected",
            Reply::BadRequest => "Bad or malformed request",
            Reply::NotAuthorized => "User is unauthorized",
            Reply::Forbidden => "Access is forbidden",
            Reply::NotFound => "Item was not found",
            Reply::NotAllowed => "Method is not allowed",
            Reply::NotAcceptable => "Method is not acceptable",
            Reply::ServerError => "Internal error",
        }
    }
}

/// The uniform response record threaded back through the pipeline and
/// ultimately mapped onto the HTTP response by the transport adapter.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub status: Status,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip)]
    pub header: Option<HashMap<String, String>>,
    #[serde(skip)]
    pub content_type: Option<String>,
}

impl Envelope {
    /// A `success` envelope carrying the given data payload.
    pub fn success(data: Value) -> Self {
        Self::respond(Reply::Ok).with_data(data)
    }

    /// A generic `fail` envelope (400) with a custom message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::respond(Reply::BadRequest).with_message(message)
    }

    /// A generic `error` envelope (500) with a custom message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::respond(Reply::ServerError).with_message(message)
    }

    /// Build an envelope from a catalog entry with its default code/message.
    pub fn respond(reply: Reply) -> Self {
        Self {
            status: reply.status(),
            status_code: reply.status_code(),
            message: reply.message().to_string(),
            data: None,
            header: None,
            content_type: None,
        }
    }

    /// Replace the default message with contextual detail.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// The data payload viewed as a JSON object, if it is one.
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref().and_then(Value::as_object)
    }
}
