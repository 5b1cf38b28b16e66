use crate::action::Action;
use crate::error::OfflineError;
use crate::transport::Transport;

/// Native application hosting the web view.
///
/// In the Android app this is the `window.luxHost` object injected by the WebView, see
/// [`LuxHost`](crate::platform::web::LuxHost). The app answers by calling back into the web view
/// with the JSON encoded reply, which must be passed to
/// [`Inbox::receive_raw`](crate::Inbox::receive_raw).
pub trait NativeHost {
    /// Hands a JSON encoded envelope to the native app.
    fn post_message_to_android(&self, message: &str) -> Result<(), OfflineError>;
}

impl<F> NativeHost for F
where
    F: Fn(&str) -> Result<(), OfflineError>,
{
    fn post_message_to_android(&self, message: &str) -> Result<(), OfflineError> {
        self(message)
    }
}

/// Transport of the Android app. Envelopes are sent to the native host as JSON strings.
#[derive(Debug, Clone)]
pub struct AndroidTransport<H> {
    host: H,
}

impl<H: NativeHost> AndroidTransport<H> {
    /// Creates a transport posting to the given host.
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// Native host of the transport.
    pub fn host(&self) -> &H {
        &self.host
    }
}

impl<H: NativeHost> Transport for AndroidTransport<H> {
    fn post_to_backend(&self, action: &Action) -> Result<(), OfflineError> {
        let message = serde_json::to_string(action)?;
        self.host.post_message_to_android(&message)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use assert_matches::assert_matches;
    use serde_json::{json, Value};

    use super::*;
    use crate::{BridgeConfig, StorageBridge};

    #[tokio::test]
    async fn envelopes_travel_as_json_strings() {
        let sent = Rc::new(RefCell::new(Vec::<String>::new()));
        let host = {
            let sent = sent.clone();
            move |message: &str| -> Result<(), OfflineError> {
                sent.borrow_mut().push(message.to_string());
                Ok(())
            }
        };

        let bridge = StorageBridge::new(AndroidTransport::new(host), BridgeConfig::default());
        let read = bridge.get_item::<String>("offline_mymaps");

        let message = sent.borrow()[0].clone();
        let request: Value = serde_json::from_str(&message).expect("valid JSON");
        assert_eq!(
            request,
            json!({"plugin": "localforage", "command": "getItem", "args": ["offline_mymaps"], "id": 1})
        );

        bridge
            .inbox()
            .receive_raw(r#"{"id": 1, "command": "response", "args": ["stored"]}"#);
        assert_eq!(read.await.expect("get item"), Some("stored".to_string()));
    }

    #[tokio::test]
    async fn host_failure_is_reported() {
        let host = |_: &str| -> Result<(), OfflineError> {
            Err(OfflineError::Transport("luxHost is not defined".into()))
        };

        let bridge = StorageBridge::new(AndroidTransport::new(host), BridgeConfig::default());
        assert_matches!(
            bridge.set_item("k", "v").await,
            Err(OfflineError::Transport(_))
        );
    }
}
