use std::future::Future;
use std::time::Duration;

/// Runs the future on the current thread without waiting for it.
///
/// On native targets this must be called from inside a `tokio::task::LocalSet`.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_local<T>(future: T)
where
    T: Future<Output = ()> + 'static,
{
    tokio::task::spawn_local(future);
}

#[cfg(target_arch = "wasm32")]
pub fn spawn_local<T>(future: T)
where
    T: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    gloo_timers::future::sleep(duration).await;
}
