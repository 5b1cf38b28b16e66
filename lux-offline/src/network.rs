use std::cell::Cell;
use std::rc::Rc;

/// Source of the network connectivity signal.
pub trait NetworkStatus {
    /// Whether the device currently has no network connection.
    fn is_disconnected(&self) -> bool;
}

impl<T: NetworkStatus + ?Sized> NetworkStatus for Rc<T> {
    fn is_disconnected(&self) -> bool {
        (**self).is_disconnected()
    }
}

/// Network status set by the embedding application, e.g. from the connectivity events of a
/// native host. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct ManualNetworkStatus {
    disconnected: Rc<Cell<bool>>,
}

impl ManualNetworkStatus {
    /// Creates a status reporting the given connectivity.
    pub fn new(disconnected: bool) -> Self {
        Self {
            disconnected: Rc::new(Cell::new(disconnected)),
        }
    }

    /// Updates the connectivity.
    pub fn set_disconnected(&self, disconnected: bool) {
        if self.disconnected.replace(disconnected) != disconnected {
            log::info!(
                "Network is {}",
                if disconnected { "disconnected" } else { "connected" }
            );
        }
    }
}

impl NetworkStatus for ManualNetworkStatus {
    fn is_disconnected(&self) -> bool {
        self.disconnected.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let status = ManualNetworkStatus::default();
        let observer = status.clone();
        assert!(!observer.is_disconnected());

        status.set_disconnected(true);
        assert!(observer.is_disconnected());
        assert!(Rc::new(observer).is_disconnected());
    }
}
