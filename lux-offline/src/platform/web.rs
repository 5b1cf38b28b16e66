//! Host integration for the browser, the Android WebView and the Cordova shell.

use async_trait::async_trait;
use bytes::Bytes;
use js_sys::Uint8Array;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{MessageEvent, Request, RequestInit, RequestMode, Response, Window, WorkerGlobalScope};

use crate::action::Action;
use crate::bridge::Inbox;
use crate::config::TargetOrigin;
use crate::error::OfflineError;
use crate::network::NetworkStatus;
use crate::tiles::TileFetcher;
use crate::transport::{IframeReceiver, IframeTransport, NativeHost, ParentWindow};

/// Sets up the console logger and the panic hook.
pub fn init_logging(level: log::Level) -> Result<(), OfflineError> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(level)
        .map_err(|err| OfflineError::Configuration(format!("logger: {err}")))?;

    log::debug!("Logger is initialized");
    Ok(())
}

fn window() -> Result<Window, OfflineError> {
    web_sys::window().ok_or_else(|| OfflineError::Wasm(Some("no global `window` exists".into())))
}

/// Loads tiles with the `fetch` API of the window or of the worker.
#[derive(Debug, Default, Clone)]
pub struct WebTileFetcher {}

impl WebTileFetcher {
    /// Creates a new fetcher.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait(?Send)]
impl TileFetcher for WebTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, OfflineError> {
        let opts = RequestInit::new();
        opts.set_method("GET");
        opts.set_mode(RequestMode::Cors);

        let request = Request::new_with_str_and_init(url, &opts)?;
        let resp_value = if let Some(window) = web_sys::window() {
            JsFuture::from(window.fetch_with_request(&request)).await?
        } else if let Ok(global) = js_sys::global().dyn_into::<WorkerGlobalScope>() {
            JsFuture::from(global.fetch_with_request(&request)).await?
        } else {
            return Err(OfflineError::Wasm(Some(
                "Global object is not available".into(),
            )));
        };

        let resp: Response = resp_value.dyn_into()?;
        if !resp.ok() {
            log::info!("Failed to load {url}: {}", resp.status());
            return Err(OfflineError::IO);
        }

        let bytes_val = JsFuture::from(resp.array_buffer()?).await?;
        let array = Uint8Array::new(&bytes_val);
        Ok(array.to_vec().into())
    }
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = luxHost, js_name = postMessageToAndroid)]
    fn post_message_to_android(message: &str) -> Result<(), JsValue>;
}

/// The `window.luxHost` object injected by the Android application.
#[derive(Debug, Default, Clone, Copy)]
pub struct LuxHost;

impl NativeHost for LuxHost {
    fn post_message_to_android(&self, message: &str) -> Result<(), OfflineError> {
        post_message_to_android(message).map_err(OfflineError::from)
    }
}

/// Receiving half of the Android bridge, called by the application with every reply.
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct AndroidReceiver {
    inbox: Inbox,
}

impl AndroidReceiver {
    /// Creates a receiver delivering replies to `inbox`.
    pub fn new(inbox: Inbox) -> Self {
        Self { inbox }
    }
}

#[wasm_bindgen]
impl AndroidReceiver {
    /// Processes a JSON encoded reply envelope.
    #[wasm_bindgen(js_name = receiveFromAndroid)]
    pub fn receive_from_android(&self, raw: &str) {
        self.inbox.receive_raw(raw);
    }
}

/// The parent of the window the application runs in.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowParent;

impl ParentWindow for WindowParent {
    fn post_message(
        &self,
        action: &Action,
        target_origin: &TargetOrigin,
    ) -> Result<(), OfflineError> {
        let parent = window()?
            .parent()?
            .ok_or_else(|| OfflineError::Wasm(Some("window has no parent".into())))?;
        let value = action
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|err| OfflineError::Wasm(Some(err.to_string())))?;

        parent.post_message(&value, target_origin.as_str())?;
        Ok(())
    }
}

impl IframeTransport<WindowParent> {
    /// Creates a transport posting to the parent window and listening to the `message` events of
    /// this window. Replies are delivered to `inbox` as long as the listener is alive.
    pub fn listen(
        origin: TargetOrigin,
        inbox: Inbox,
    ) -> Result<(Self, WindowMessageListener), OfflineError> {
        Self::with_listener(WindowParent, origin, inbox, WindowMessageListener::new)
    }
}

/// Passes the `message` events of the window to an [`IframeReceiver`] while alive.
pub struct WindowMessageListener {
    window: Window,
    callback: Closure<dyn FnMut(MessageEvent)>,
}

impl WindowMessageListener {
    /// Starts listening.
    pub fn new(receiver: IframeReceiver) -> Result<Self, OfflineError> {
        let window = window()?;
        let callback: Closure<dyn FnMut(MessageEvent)> = Closure::new(move |event: MessageEvent| {
            let data: Value = match serde_wasm_bindgen::from_value(event.data()) {
                Ok(data) => data,
                Err(err) => {
                    log::debug!("Ignoring message event without JSON data: {err}");
                    return;
                }
            };

            receiver.receive(&event.origin(), data);
        });

        window.add_event_listener_with_callback("message", callback.as_ref().unchecked_ref())?;
        Ok(Self { window, callback })
    }
}

impl Drop for WindowMessageListener {
    fn drop(&mut self) {
        if let Err(err) = self
            .window
            .remove_event_listener_with_callback("message", self.callback.as_ref().unchecked_ref())
        {
            log::warn!("Failed to remove message listener: {err:?}");
        }
    }
}

impl std::fmt::Debug for WindowMessageListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowMessageListener").finish_non_exhaustive()
    }
}

/// Connectivity reported by `navigator.onLine`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NavigatorNetworkStatus;

impl NetworkStatus for NavigatorNetworkStatus {
    fn is_disconnected(&self) -> bool {
        web_sys::window()
            .map(|window| !window.navigator().on_line())
            .unwrap_or(false)
    }
}
