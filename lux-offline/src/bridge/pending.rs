use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures::channel::oneshot::Sender;
use serde_json::Value;

use crate::action::RequestId;
use crate::error::OfflineError;

pub(crate) type Reply = Result<Vec<Value>, OfflineError>;
pub(crate) type ReplySender = Sender<Reply>;

/// Requests waiting for a reply, keyed by request id.
#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    requests: HashMap<RequestId, ReplySender>,
}

impl PendingRequests {
    pub(crate) fn insert(&mut self, id: RequestId, sender: ReplySender) {
        if self.requests.insert(id, sender).is_some() {
            log::error!("Request id {id} was reused while a previous request was in flight");
        }
    }

    /// Removes the request so that it can be completed. Each request can be taken only once.
    pub(crate) fn take(&mut self, id: RequestId) -> Option<ReplySender> {
        self.requests.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }
}

/// Drops the pending entry of a request when the caller stops waiting for it.
pub(crate) struct PendingGuard {
    id: RequestId,
    table: Weak<RefCell<PendingRequests>>,
}

impl PendingGuard {
    pub(crate) fn new(id: RequestId, table: &Rc<RefCell<PendingRequests>>) -> Self {
        Self {
            id,
            table: Rc::downgrade(table),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };

        let Ok(mut table) = table.try_borrow_mut() else {
            log::warn!(
                "Pending requests table is busy, request {} is left in it",
                self.id
            );
            return;
        };

        if table.take(self.id).is_some() {
            log::debug!("Request {} is abandoned before the host replied", self.id);
        }
    }
}
