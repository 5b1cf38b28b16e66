use std::cell::Cell;
use std::rc::Rc;

use crate::network::NetworkStatus;

/// Whether the application should behave as offline.
///
/// The application is offline when the network is disconnected or when the user asked for the
/// offline mode. Nothing is persisted, the override is reset with every session.
pub struct OfflineState {
    network: Rc<dyn NetworkStatus>,
    offline: Cell<bool>,
}

impl std::fmt::Debug for OfflineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineState")
            .field("disconnected", &self.network.is_disconnected())
            .field("offline", &self.offline.get())
            .finish()
    }
}

impl OfflineState {
    /// Creates a state following the given network signal, with the override unset.
    pub fn new(network: Rc<dyn NetworkStatus>) -> Self {
        Self {
            network,
            offline: Cell::new(false),
        }
    }

    /// Effective offline mode.
    pub fn is_offline(&self) -> bool {
        self.network.is_disconnected() || self.offline.get()
    }

    /// Sets the manual override.
    pub fn set_offline(&self, offline: bool) {
        log::debug!("Offline mode override set to {offline}");
        self.offline.set(offline);
    }
}
