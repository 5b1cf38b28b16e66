//! Error types used by the crate.

use serde_json::Value;
use thiserror::Error;

use crate::action::RequestId;

/// Error of an offline storage or tile caching operation.
#[derive(Debug, Error)]
pub enum OfflineError {
    /// The storage host replied to a request with an `error` envelope.
    #[error("storage host error: {}", backend_reason(.args, .msg.as_deref()))]
    Backend {
        /// Arguments of the error envelope.
        args: Vec<Value>,
        /// Diagnostic context attached by the host.
        context: Option<Value>,
        /// Human readable message attached by the host.
        msg: Option<String>,
    },
    /// No reply arrived for the request before its deadline.
    #[error("request {id} timed out")]
    Timeout {
        /// Id of the request that timed out.
        id: RequestId,
    },
    /// The request was abandoned before the host replied.
    #[error("request was cancelled")]
    Cancelled,
    /// The envelope could not be handed over to the host.
    #[error("failed to post message to the host: {0}")]
    Transport(String),
    /// A value could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Invalid parameters were given to a builder or a constructor.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Data read from the storage has an unexpected format.
    #[error("invalid stored data: {0}")]
    InvalidData(String),
    /// I/O error (network).
    #[error("failed to load data")]
    IO,
    /// Item not found.
    #[error("item not found")]
    NotFound,
    /// Error interacting with WASM runtime.
    #[error("wasm error: {0:?}")]
    Wasm(Option<String>),
}

fn backend_reason(args: &[Value], msg: Option<&str>) -> String {
    if let Some(msg) = msg {
        return msg.to_string();
    }

    match args.first() {
        Some(Value::String(reason)) => reason.clone(),
        Some(other) => other.to_string(),
        None => "no details".to_string(),
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<reqwest::Error> for OfflineError {
    fn from(value: reqwest::Error) -> Self {
        log::debug!("HTTP request failed: {value}");
        Self::IO
    }
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for OfflineError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        OfflineError::Wasm(Some(format!("{value:?}")))
    }
}

#[cfg(target_arch = "wasm32")]
impl From<js_sys::Object> for OfflineError {
    fn from(value: js_sys::Object) -> Self {
        OfflineError::Wasm(Some(format!("Failed to cast {value:?} into target type")))
    }
}
