//! Delivery of envelopes to the storage host.
//!
//! A transport only marshals envelopes. Storage logic lives in the host, promise bookkeeping lives
//! in the [`StorageBridge`](crate::StorageBridge).

use std::rc::Rc;

use crate::action::Action;
use crate::error::OfflineError;

mod android;
mod iframe;
mod memory;

pub use android::{AndroidTransport, NativeHost};
pub use iframe::{IframeReceiver, IframeTransport, ParentWindow};
pub use memory::MemoryHost;

/// Hands request envelopes over to the storage host.
///
/// Replies are not returned from [`Transport::post_to_backend`]. The host delivers them later to
/// the bridge's [`Inbox`](crate::Inbox).
pub trait Transport {
    /// Posts the envelope to the host.
    fn post_to_backend(&self, action: &Action) -> Result<(), OfflineError>;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn post_to_backend(&self, action: &Action) -> Result<(), OfflineError> {
        (**self).post_to_backend(action)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn post_to_backend(&self, action: &Action) -> Result<(), OfflineError> {
        (**self).post_to_backend(action)
    }
}
