//! [`StorageBridge`] turns an asynchronous message channel to a storage host into futures.
//!
//! Every call creates an [`Action`] with a fresh id, registers the caller in the table of
//! pending requests and posts the action through a [`Transport`] before returning. The returned
//! future completes when the [`Inbox`] receives a `response` or an `error` with the same id.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::Either;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::action::{Action, Command, InboundMessage, RequestId};
use crate::config::{BridgeConfig, StorageOptions};
use crate::error::OfflineError;
use crate::transport::Transport;

mod pending;

use pending::{PendingGuard, PendingRequests, Reply};

/// Receiving end of a bridge. Transports and host callbacks deliver replies here.
///
/// The inbox can be cloned freely, all clones complete requests of the same bridge.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    pending: Rc<RefCell<PendingRequests>>,
}

impl Inbox {
    /// Completes the request the message replies to.
    ///
    /// Replies for unknown ids (late, duplicated, or timed out) and messages that are not replies
    /// are logged and dropped.
    pub fn receive_message(&self, message: InboundMessage) {
        match message {
            InboundMessage::Response { id, args } => {
                if self.complete(id, Ok(args)) {
                    log::debug!("Response for request {id} is sent to the caller");
                } else {
                    log::warn!("Received response for unknown request {id}, ignoring it");
                }
            }
            InboundMessage::Error {
                id,
                args,
                context,
                msg,
            } => {
                let error = OfflineError::Backend { args, context, msg };
                log::info!("Storage host failed request {id}: {error}");

                if !self.complete(id, Err(error)) {
                    log::warn!("Received error for unknown request {id}, ignoring it");
                }
            }
            InboundMessage::Unrecognized { id, command } => {
                log::warn!("Unrecognized command {command:?} in message {id}, ignoring it");
            }
        }
    }

    /// Parses a JSON encoded envelope and completes the request it replies to.
    pub fn receive_raw(&self, raw: &str) {
        match InboundMessage::from_json(raw) {
            Ok(message) => self.receive_message(message),
            Err(err) => log::error!(
                "Failed to decode message from the host ({} bytes, starting with {:?}): {err}",
                raw.len(),
                message_preview(raw)
            ),
        }
    }

    /// Number of requests waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    fn complete(&self, id: RequestId, reply: Reply) -> bool {
        let sender = self.pending.borrow_mut().take(id);
        match sender {
            Some(sender) => {
                if sender.send(reply).is_err() {
                    log::debug!("Caller of request {id} is not waiting for the reply anymore");
                }
                true
            }
            None => false,
        }
    }
}

const LOGGED_MESSAGE_CHARS: usize = 128;

/// Beginning of a raw message, short enough for a log line.
fn message_preview(raw: &str) -> &str {
    match raw.char_indices().nth(LOGGED_MESSAGE_CHARS) {
        Some((end, _)) => &raw[..end],
        None => raw,
    }
}

/// Key-value storage facade over a [`Transport`].
///
/// Storage calls return immediately after posting their envelope. The returned futures do not
/// borrow the bridge, so they can be awaited later or moved into a spawned task.
///
/// No ordering is guaranteed between two requests beyond what the transport and the host provide.
pub struct StorageBridge {
    inbox: Inbox,
    transport: Box<dyn Transport>,
    next_id: Cell<u64>,
    config: BridgeConfig,
}

impl std::fmt::Debug for StorageBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBridge")
            .field("config", &self.config)
            .field("pending", &self.inbox.pending_count())
            .finish()
    }
}

impl StorageBridge {
    /// Creates a new bridge posting envelopes through the given transport.
    pub fn new(transport: impl Transport + 'static, config: BridgeConfig) -> Self {
        Self::with_inbox(Inbox::default(), transport, config)
    }

    /// Creates a new bridge completing its requests through an existing inbox.
    ///
    /// Useful when the transport has to know the inbox before the bridge exists.
    pub fn with_inbox(
        inbox: Inbox,
        transport: impl Transport + 'static,
        config: BridgeConfig,
    ) -> Self {
        Self {
            inbox,
            transport: Box::new(transport),
            next_id: Cell::new(1),
            config,
        }
    }

    /// Inbox replies to this bridge's requests must be delivered to.
    pub fn inbox(&self) -> Inbox {
        self.inbox.clone()
    }

    /// Configuration of the bridge.
    pub fn bridge_config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Number of requests waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.inbox.pending_count()
    }

    /// Stores `value` under `key`.
    pub fn set_item<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> impl Future<Output = Result<(), OfflineError>> + 'static {
        let request = serde_json::to_value(value)
            .map(|value| self.request(Command::SetItem, vec![Value::from(key), value]));

        async move {
            request?.await?;
            Ok(())
        }
    }

    /// Reads the value stored under `key`. Resolves with `None` if nothing is stored.
    pub fn get_item<T: DeserializeOwned + 'static>(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<T>, OfflineError>> + 'static {
        let request = self.request(Command::GetItem, vec![Value::from(key)]);

        async move {
            let args = request.await?;
            match args.into_iter().next() {
                None | Some(Value::Null) => Ok(None),
                Some(value) => Ok(Some(serde_json::from_value(value)?)),
            }
        }
    }

    /// Deletes the value stored under `key`.
    pub fn remove_item(&self, key: &str) -> impl Future<Output = Result<(), OfflineError>> + 'static {
        let request = self.request(Command::RemoveItem, vec![Value::from(key)]);

        async move {
            request.await?;
            Ok(())
        }
    }

    /// Deletes every stored value.
    pub fn clear(&self) -> impl Future<Output = Result<(), OfflineError>> + 'static {
        let request = self.request(Command::Clear, vec![]);

        async move {
            request.await?;
            Ok(())
        }
    }

    /// Lists the keys of the stored values.
    pub fn keys(&self) -> impl Future<Output = Result<Vec<String>, OfflineError>> + 'static {
        let request = self.request(Command::Keys, vec![]);

        async move {
            let args = request.await?;
            match args.into_iter().next() {
                None | Some(Value::Null) => Ok(vec![]),
                Some(value) => Ok(serde_json::from_value(value)?),
            }
        }
    }

    /// Configures the storage instance of the host.
    pub fn config(
        &self,
        options: &StorageOptions,
    ) -> impl Future<Output = Result<(), OfflineError>> + 'static {
        let request = serde_json::to_value(options)
            .map(|options| self.request(Command::Config, vec![options]));

        async move {
            request?.await?;
            Ok(())
        }
    }

    /// Posts a request and returns the future of its reply values.
    ///
    /// The envelope is posted before this method returns. If the bridge has a request timeout and
    /// no reply arrives in time, the future fails with [`OfflineError::Timeout`]. Dropping the
    /// future forgets the request, a reply arriving later is ignored.
    pub fn request(
        &self,
        command: Command,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<Vec<Value>, OfflineError>> + 'static {
        let id = self.next_request_id();
        let action = Action::request(self.config.plugin(), command, args, id);

        let (sender, receiver) = oneshot::channel();
        self.inbox.pending.borrow_mut().insert(id, sender);
        let guard = PendingGuard::new(id, &self.inbox.pending);

        let posted = self.transport.post_to_backend(&action);
        match &posted {
            Ok(()) => log::debug!("Sent {command} request {id} to the storage host"),
            Err(err) => {
                log::warn!("Failed to send {command} request {id}: {err}");
                self.inbox.pending.borrow_mut().take(id);
            }
        }

        let timeout = self.config.request_timeout();

        async move {
            let _guard = guard;
            posted?;

            let reply = match timeout {
                Some(deadline) => {
                    let sleep = crate::async_runtime::sleep(deadline);
                    futures::pin_mut!(sleep);

                    match futures::future::select(receiver, sleep).await {
                        Either::Left((reply, _)) => reply,
                        Either::Right(((), _)) => {
                            log::warn!("No reply for {command} request {id} after {deadline:?}");
                            return Err(OfflineError::Timeout { id });
                        }
                    }
                }
                None => receiver.await,
            };

            reply.map_err(|_| OfflineError::Cancelled)?
        }
    }

    /// Fails every request still waiting for a reply with [`OfflineError::Cancelled`].
    pub fn cancel_pending(&self) {
        let cancelled = self.inbox.pending.replace(PendingRequests::default());
        if cancelled.len() > 0 {
            log::info!("Cancelling {} pending storage requests", cancelled.len());
        }
    }

    fn next_request_id(&self) -> RequestId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        RequestId::new(id)
    }
}
