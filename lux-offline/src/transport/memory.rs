use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use serde_json::{json, Value};

use crate::action::{Action, Command, InboundMessage, LOCALFORAGE_PLUGIN};
use crate::bridge::{Inbox, StorageBridge};
use crate::config::{BridgeConfig, StorageOptions};
use crate::error::OfflineError;
use crate::transport::Transport;

/// In-process storage host implementing the localforage commands over a map.
///
/// Clones share the same storage. Replies are delivered to the connected [`Inbox`] right away, or
/// queued until [`MemoryHost::flush`] for a host created with [`MemoryHost::deferred`].
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Rc<RefCell<HostState>>,
}

#[derive(Debug, Default)]
struct HostState {
    items: BTreeMap<String, Value>,
    options: Option<StorageOptions>,
    inbox: Option<Inbox>,
    deferred: bool,
    queue: VecDeque<InboundMessage>,
    failing: HashMap<Command, String>,
    received: Vec<Action>,
}

impl MemoryHost {
    /// Creates a host replying to every request immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host queueing its replies until [`MemoryHost::flush`] is called.
    pub fn deferred() -> Self {
        let host = Self::default();
        host.state.borrow_mut().deferred = true;
        host
    }

    /// Sets the inbox replies are delivered to.
    pub fn connect(&self, inbox: Inbox) {
        self.state.borrow_mut().inbox = Some(inbox);
    }

    /// Creates a bridge using this host as its transport.
    pub fn bridge(&self, config: BridgeConfig) -> StorageBridge {
        let bridge = StorageBridge::new(self.clone(), config);
        self.connect(bridge.inbox());
        bridge
    }

    /// Makes every following request with the given command fail with `message`.
    pub fn fail_command(&self, command: Command, message: impl Into<String>) {
        self.state
            .borrow_mut()
            .failing
            .insert(command, message.into());
    }

    /// Delivers the queued replies in the order of the requests. Returns the number of replies.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            let (message, inbox) = {
                let mut state = self.state.borrow_mut();
                let Some(message) = state.queue.pop_front() else {
                    break;
                };
                (message, state.inbox.clone())
            };

            deliver(inbox, message);
            delivered += 1;
        }

        delivered
    }

    /// Number of replies waiting for [`MemoryHost::flush`].
    pub fn queued(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Requests received so far.
    pub fn received(&self) -> Vec<Action> {
        self.state.borrow().received.clone()
    }

    /// Value stored under `key`.
    pub fn stored(&self, key: &str) -> Option<Value> {
        self.state.borrow().items.get(key).cloned()
    }

    /// Stores a value directly, without a request.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.state.borrow_mut().items.insert(key.into(), value);
    }

    /// Options set by the last `config` request.
    pub fn storage_options(&self) -> Option<StorageOptions> {
        self.state.borrow().options.clone()
    }

    fn handle(state: &mut HostState, action: &Action) -> Action {
        let id = action.id;
        let command = action.command;

        if action.plugin != LOCALFORAGE_PLUGIN {
            return Action::error(
                id,
                vec![json!(format!("unknown plugin {}", action.plugin))],
                Some(json!({"plugin": action.plugin})),
                None,
            );
        }

        if let Some(message) = state.failing.get(&command) {
            return Action::error(
                id,
                vec![json!(message)],
                Some(json!({"command": command.as_str(), "args": action.args})),
                None,
            );
        }

        match Self::apply(state, action) {
            Ok(args) => Action::response(id, args),
            Err(reason) => Action::error(
                id,
                vec![json!(reason)],
                Some(json!({"command": command.as_str()})),
                Some(reason),
            ),
        }
    }

    fn apply(state: &mut HostState, action: &Action) -> Result<Vec<Value>, String> {
        let key = || match action.args.first() {
            Some(Value::String(key)) => Ok(key.clone()),
            _ => Err(format!("{} requires a string key", action.command)),
        };

        match action.command {
            Command::SetItem => {
                let value = action.args.get(1).cloned().unwrap_or(Value::Null);
                state.items.insert(key()?, value.clone());
                Ok(vec![value])
            }
            Command::GetItem => Ok(vec![state
                .items
                .get(&key()?)
                .cloned()
                .unwrap_or(Value::Null)]),
            Command::RemoveItem => {
                state.items.remove(&key()?);
                Ok(vec![])
            }
            Command::Clear => {
                state.items.clear();
                Ok(vec![])
            }
            Command::Keys => Ok(vec![json!(state.items.keys().collect::<Vec<_>>())]),
            Command::Config => {
                let options = action.args.first().cloned().unwrap_or(Value::Null);
                let options = serde_json::from_value(options)
                    .map_err(|err| format!("invalid storage options: {err}"))?;
                state.options = Some(options);
                Ok(vec![json!(true)])
            }
            Command::Response | Command::Error => {
                Err(format!("{} is not a storage command", action.command))
            }
        }
    }
}

impl Transport for MemoryHost {
    fn post_to_backend(&self, action: &Action) -> Result<(), OfflineError> {
        let (reply, inbox) = {
            let mut state = self.state.borrow_mut();
            state.received.push(action.clone());

            let reply = InboundMessage::from(Self::handle(&mut state, action));
            if state.deferred {
                state.queue.push_back(reply);
                return Ok(());
            }

            (reply, state.inbox.clone())
        };

        deliver(inbox, reply);
        Ok(())
    }
}

fn deliver(inbox: Option<Inbox>, message: InboundMessage) {
    match inbox {
        Some(inbox) => inbox.receive_message(message),
        None => log::warn!(
            "Memory host is not connected, reply to {} is dropped",
            message.id()
        ),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn deferred_host_replies_on_flush() {
        let host = MemoryHost::deferred();
        let bridge = host.bridge(BridgeConfig::default());

        let write = bridge.set_item("k", "v");
        let read = bridge.get_item::<String>("k");
        assert_eq!(bridge.pending_count(), 2);
        assert_eq!(host.queued(), 2);

        assert_eq!(host.flush(), 2);
        assert_eq!(bridge.pending_count(), 0);
        write.await.expect("set item");
        assert_eq!(read.await.expect("get item"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn failing_command_replies_with_error() {
        let host = MemoryHost::new();
        let bridge = host.bridge(BridgeConfig::default());
        host.fail_command(Command::SetItem, "quota exceeded");

        let error = bridge.set_item("k", &1).await.expect_err("write fails");
        assert_matches!(error, OfflineError::Backend { .. });
        assert_eq!(error.to_string(), "storage host error: quota exceeded");
        assert_eq!(host.stored("k"), None);

        assert_eq!(bridge.get_item::<i32>("k").await.expect("get item"), None);
    }

    #[test]
    fn unknown_plugin_is_rejected() {
        let host = MemoryHost::new();
        let bridge = host.bridge(BridgeConfig::default().with_plugin("sqlite"));

        let result = tokio_test::block_on(bridge.clear());
        assert_matches!(result, Err(OfflineError::Backend { .. }));
        assert_eq!(host.received()[0].plugin, "sqlite");
    }

    #[tokio::test]
    async fn invalid_key_is_rejected() {
        let host = MemoryHost::new();
        let bridge = host.bridge(BridgeConfig::default());

        let result = bridge.request(Command::GetItem, vec![json!(42)]).await;
        assert_matches!(
            result,
            Err(OfflineError::Backend { msg: Some(ref msg), .. }) if msg == "getItem requires a string key"
        );
    }

    #[test]
    fn reply_without_inbox_is_dropped() {
        let host = MemoryHost::new();
        let action = Action::request(
            LOCALFORAGE_PLUGIN,
            Command::SetItem,
            vec![json!("k"), json!(1)],
            crate::RequestId::new(1),
        );

        host.post_to_backend(&action).expect("post");
        assert_eq!(host.stored("k"), Some(json!(1)));
    }
}
