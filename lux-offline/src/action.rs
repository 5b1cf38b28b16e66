//! Envelopes exchanged with the storage host.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OfflineError;

/// Name of the storage plugin the host routes the default envelopes to.
pub const LOCALFORAGE_PLUGIN: &str = "localforage";

/// Correlation id linking a request envelope to its reply.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wraps a raw id value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw id value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Command of an envelope.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    /// Store a value under a key.
    SetItem,
    /// Read the value stored under a key.
    GetItem,
    /// Delete the value stored under a key.
    RemoveItem,
    /// Delete every stored value.
    Clear,
    /// List the stored keys.
    Keys,
    /// Configure the storage instance.
    Config,
    /// Successful reply.
    Response,
    /// Failed reply.
    Error,
}

impl Command {
    /// Wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::SetItem => "setItem",
            Command::GetItem => "getItem",
            Command::RemoveItem => "removeItem",
            Command::Clear => "clear",
            Command::Keys => "keys",
            Command::Config => "config",
            Command::Response => "response",
            Command::Error => "error",
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One storage operation, or the reply to one.
///
/// Serialized as `{"plugin": "localforage", "command": "getItem", "args": ["key"], "id": 1}`.
/// Error replies additionally carry `context` and `msg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Storage subsystem the envelope is addressed to.
    #[serde(default)]
    pub plugin: String,
    /// Operation or reply kind.
    pub command: Command,
    /// Ordered operation arguments, or reply values.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Correlation id.
    pub id: RequestId,
    /// Diagnostic payload of an error reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    /// Message of an error reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl Action {
    /// Creates a request envelope.
    pub fn request(
        plugin: impl Into<String>,
        command: Command,
        args: Vec<Value>,
        id: RequestId,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            command,
            args,
            id,
            context: None,
            msg: None,
        }
    }

    /// Creates a successful reply to the request with the given id.
    pub fn response(id: RequestId, args: Vec<Value>) -> Self {
        Self {
            plugin: LOCALFORAGE_PLUGIN.to_string(),
            command: Command::Response,
            args,
            id,
            context: None,
            msg: None,
        }
    }

    /// Creates a failed reply to the request with the given id.
    pub fn error(
        id: RequestId,
        args: Vec<Value>,
        context: Option<Value>,
        msg: Option<String>,
    ) -> Self {
        Self {
            plugin: LOCALFORAGE_PLUGIN.to_string(),
            command: Command::Error,
            args,
            id,
            context,
            msg,
        }
    }
}

/// Envelope received from the host, classified by its command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireMessage")]
pub enum InboundMessage {
    /// The request succeeded, `args` are the resolution values.
    Response {
        /// Id of the request.
        id: RequestId,
        /// Resolution values.
        args: Vec<Value>,
    },
    /// The request failed.
    Error {
        /// Id of the request.
        id: RequestId,
        /// Error arguments.
        args: Vec<Value>,
        /// Diagnostic payload.
        context: Option<Value>,
        /// Error message.
        msg: Option<String>,
    },
    /// Envelope with a command that is not a reply.
    Unrecognized {
        /// Id of the envelope.
        id: RequestId,
        /// Command as received.
        command: String,
    },
}

impl InboundMessage {
    /// Correlation id of the message.
    pub fn id(&self) -> RequestId {
        match self {
            InboundMessage::Response { id, .. }
            | InboundMessage::Error { id, .. }
            | InboundMessage::Unrecognized { id, .. } => *id,
        }
    }

    /// Parses a JSON encoded envelope.
    pub fn from_json(raw: &str) -> Result<Self, OfflineError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Converts a decoded JSON envelope.
    pub fn from_value(value: Value) -> Result<Self, OfflineError> {
        Ok(serde_json::from_value(value)?)
    }
}

impl From<Action> for InboundMessage {
    fn from(action: Action) -> Self {
        let Action {
            command,
            args,
            id,
            context,
            msg,
            ..
        } = action;

        match command {
            Command::Response => InboundMessage::Response { id, args },
            Command::Error => InboundMessage::Error {
                id,
                args,
                context,
                msg,
            },
            other => InboundMessage::Unrecognized {
                id,
                command: other.as_str().to_string(),
            },
        }
    }
}

#[derive(Deserialize)]
struct WireMessage {
    id: RequestId,
    command: String,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    context: Option<Value>,
    #[serde(default)]
    msg: Option<String>,
}

impl From<WireMessage> for InboundMessage {
    fn from(value: WireMessage) -> Self {
        let WireMessage {
            id,
            command,
            args,
            context,
            msg,
        } = value;

        match command.as_str() {
            "response" => InboundMessage::Response { id, args },
            "error" => InboundMessage::Error {
                id,
                args,
                context,
                msg,
            },
            _ => InboundMessage::Unrecognized { id, command },
        }
    }
}
