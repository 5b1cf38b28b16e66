use serde_json::Value;

use crate::action::{Action, InboundMessage};
use crate::bridge::Inbox;
use crate::config::TargetOrigin;
use crate::error::OfflineError;
use crate::transport::Transport;

/// Execution context embedding the application, e.g. the Cordova shell around the iframe.
pub trait ParentWindow {
    /// Posts the envelope object to the parent context.
    fn post_message(
        &self,
        action: &Action,
        target_origin: &TargetOrigin,
    ) -> Result<(), OfflineError>;
}

/// Transport of an application running inside an iframe.
///
/// Envelopes are posted to the parent window as structured objects. Replies arrive as `message`
/// events, which must be passed to an [`IframeReceiver`] created with [`IframeTransport::receiver`].
/// [`IframeTransport::with_listener`] does both steps at construction.
#[derive(Debug, Clone)]
pub struct IframeTransport<P> {
    parent: P,
    origin: TargetOrigin,
}

impl<P: ParentWindow> IframeTransport<P> {
    /// Creates a transport talking to the parent window at the given origin.
    pub fn new(parent: P, origin: TargetOrigin) -> Self {
        Self { parent, origin }
    }

    /// Origin envelopes are sent to and replies are accepted from.
    pub fn origin(&self) -> &TargetOrigin {
        &self.origin
    }

    /// Whether a `message` event from `origin` may be processed.
    pub fn accepts_origin(&self, origin: &str) -> bool {
        self.origin.accepts(origin)
    }

    /// Creates a transport and starts listening for replies in one step.
    ///
    /// `listen` receives the [`IframeReceiver`] delivering to `inbox` and must register it with the
    /// message source, returning the handle keeping the registration alive. On wasm32 see
    /// `IframeTransport::listen` in the web platform module.
    pub fn with_listener<L>(
        parent: P,
        origin: TargetOrigin,
        inbox: Inbox,
        listen: impl FnOnce(IframeReceiver) -> Result<L, OfflineError>,
    ) -> Result<(Self, L), OfflineError> {
        let transport = Self::new(parent, origin);
        let listener = listen(transport.receiver(inbox))?;
        Ok((transport, listener))
    }

    /// Creates the receiving half delivering accepted replies to `inbox`.
    pub fn receiver(&self, inbox: Inbox) -> IframeReceiver {
        IframeReceiver {
            inbox,
            origin: self.origin.clone(),
        }
    }
}

impl<P: ParentWindow> Transport for IframeTransport<P> {
    fn post_to_backend(&self, action: &Action) -> Result<(), OfflineError> {
        self.parent.post_message(action, &self.origin)
    }
}

/// Filters `message` events by origin and forwards replies to an [`Inbox`].
#[derive(Debug, Clone)]
pub struct IframeReceiver {
    inbox: Inbox,
    origin: TargetOrigin,
}

impl IframeReceiver {
    /// Processes the data of a `message` event sent from `origin`.
    ///
    /// Events from other origins, and events that are not envelopes, are logged and dropped.
    pub fn receive(&self, origin: &str, data: Value) {
        if !self.origin.accepts(origin) {
            log::warn!(
                "Ignoring message from {origin}, only {} is accepted",
                self.origin.as_str()
            );
            return;
        }

        match InboundMessage::from_value(data) {
            Ok(message) => self.inbox.receive_message(message),
            Err(err) => log::debug!("Message from {origin} is not a storage envelope: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::{BridgeConfig, StorageBridge};

    #[derive(Debug, Clone, Default)]
    struct RecordingParent {
        posted: Rc<RefCell<Vec<(Action, String)>>>,
    }

    impl ParentWindow for RecordingParent {
        fn post_message(
            &self,
            action: &Action,
            target_origin: &TargetOrigin,
        ) -> Result<(), OfflineError> {
            self.posted
                .borrow_mut()
                .push((action.clone(), target_origin.as_str().to_string()));
            Ok(())
        }
    }

    fn iframe_bridge(origin: TargetOrigin) -> (StorageBridge, IframeReceiver, RecordingParent) {
        let parent = RecordingParent::default();
        let transport = IframeTransport::new(parent.clone(), origin);
        let bridge = StorageBridge::new(transport.clone(), BridgeConfig::default());
        let receiver = transport.receiver(bridge.inbox());
        (bridge, receiver, parent)
    }

    #[tokio::test]
    async fn posts_to_configured_origin() {
        let origin = TargetOrigin::exact("https://app.geoportail.lu").expect("valid origin");
        let (bridge, receiver, parent) = iframe_bridge(origin);

        let write = bridge.set_item("offline_mymaps", &json!({"mapId": "x"}));
        let (action, target) = parent.posted.borrow()[0].clone();
        assert_eq!(target, "https://app.geoportail.lu");
        assert_eq!(action.args[0], json!("offline_mymaps"));

        receiver.receive(
            "https://app.geoportail.lu",
            json!({"id": action.id, "command": "response", "args": []}),
        );
        write.await.expect("set item");
    }

    #[tokio::test]
    async fn rejects_messages_from_other_origins() {
        let origin = TargetOrigin::exact("https://app.geoportail.lu").expect("valid origin");
        let (bridge, receiver, parent) = iframe_bridge(origin);

        let read = bridge.get_item::<String>("k");
        let id = parent.posted.borrow()[0].0.id;

        receiver.receive(
            "https://evil.example",
            json!({"id": id, "command": "response", "args": ["forged"]}),
        );
        assert_eq!(bridge.pending_count(), 1);

        receiver.receive(
            "https://app.geoportail.lu",
            json!({"id": id, "command": "response", "args": ["genuine"]}),
        );
        assert_eq!(read.await.expect("get item"), Some("genuine".to_string()));
    }

    #[tokio::test]
    async fn listener_is_registered_on_construction() {
        let inbox = Inbox::default();
        let registered = Rc::new(RefCell::new(None));
        let (transport, ()) = IframeTransport::with_listener(
            RecordingParent::default(),
            TargetOrigin::Any,
            inbox.clone(),
            |receiver| {
                *registered.borrow_mut() = Some(receiver);
                Ok(())
            },
        )
        .expect("listen");
        let parent = transport.parent.clone();
        let bridge = StorageBridge::with_inbox(inbox, transport, BridgeConfig::default());

        let read = bridge.get_item::<i32>("k");
        let id = parent.posted.borrow()[0].0.id;
        let receiver = registered.borrow_mut().take().expect("receiver is registered");
        receiver.receive("null", json!({"id": id, "command": "response", "args": [7]}));
        assert_eq!(read.await.expect("get item"), Some(7));
    }

    #[test]
    fn failed_registration_fails_construction() {
        let result = IframeTransport::with_listener(
            RecordingParent::default(),
            TargetOrigin::Any,
            Inbox::default(),
            |_| Err::<(), _>(OfflineError::Wasm(Some("no window".into()))),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn any_origin_accepts_everything() {
        let (bridge, receiver, parent) = iframe_bridge(TargetOrigin::Any);

        let read = bridge.get_item::<i32>("k");
        let (action, target) = parent.posted.borrow()[0].clone();
        assert_eq!(target, "*");

        receiver.receive("null", json!({"hello": "world"}));
        assert_eq!(bridge.pending_count(), 1);

        receiver.receive(
            "file://",
            json!({"id": action.id, "command": "response", "args": [3]}),
        );
        assert_eq!(read.await.expect("get item"), Some(3));
    }
}
