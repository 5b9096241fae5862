//! Launches the headed browser and wires the three bridges into its
//! context before any page loads. Grounded in
//! `other_examples/1944b5dd_vibefi-client__src-webview.rs.rs`'s
//! `WebViewBuilder` usage (`with_initialization_script`,
//! `with_ipc_handler`) — the only pack material that hosts third-party
//! page content inside a host-controlled window with pre-document script
//! injection and a host callback surface. `wry`+`tao` is adopted here as
//! the embedded browser engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bridge_api::Error;
use serde_json::Value;
use tao::event_loop::{ControlFlow, EventLoop, EventLoopProxy};
use tao::window::WindowBuilder;
use tokio::runtime::Handle;
use tracing::{info, instrument, warn};
use wry::WebViewBuilder;

use crate::capture_bridge::{
    CAPTURE_BASE_ENDPOINT, CAPTURE_SCRIPT_URL, CaptureBridge, render_capture_install_script,
    render_foreign_script_injection,
};
use crate::dispatcher::RpcDispatcher;
use crate::provider_script;

const VIEWPORT_WIDTH: u32 = 1440;
const VIEWPORT_HEIGHT: u32 = 900;

/// A call posted from the page through `window.ipc.postMessage`, tagged by
/// `kind` so the host routes it to either the RPC dispatcher or the
/// capture bridge.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum HostCall {
    Rpc {
        id: u64,
        method: String,
        params: Value,
    },
    Capture {
        id: u64,
        #[serde(rename = "targetUrl")]
        target_url: String,
        body: String,
    },
}

/// Observable events for the surrounding workflow (session logging); the
/// actual RPC/capture round trip is handled internally.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Dispatched { method: String },
    CaptureSubmitted,
    CaptureInjected,
    CaptureInjectionFailed(String),
    Closed,
}

/// A handle the surrounding workflow holds to fire Stage B of the capture
/// bridge ("on user command", per the capture bridge's contract) once the
/// browser is running. Cloning is cheap; firing after the window has
/// closed is a silent no-op.
#[derive(Clone)]
pub struct CaptureTrigger {
    proxy: EventLoopProxy<LoopEvent>,
}

impl CaptureTrigger {
    pub fn fire(&self) {
        let _ = self.proxy.send_event(LoopEvent::TriggerCapture);
    }
}

/// Owns the browser handle for the lifetime of one session. All
/// host-callable surfaces are wired before the page is created, per the
/// invariant that pre-document injection must see the first page load.
pub struct BrowserRuntime {
    closed: Arc<AtomicBool>,
}

enum LoopEvent {
    Resolve { id: u64, result: Result<Value, String> },
    Observed(RuntimeEvent),
    TriggerCapture,
    InjectForeignScript(Result<String, String>),
    InjectCaptureInstall(Result<String, String>),
}

impl BrowserRuntime {
    /// Builds the event loop, window, and webview, navigates to `url`,
    /// and blocks running the platform event loop until the window is
    /// closed. `dispatcher` answers RPC calls; `capture` answers capture
    /// submissions and observes popup navigation; `capture_id` identifies
    /// the session for Stage B injection. `on_ready` receives a
    /// `CaptureTrigger` once the window exists, for firing Stage B on user
    /// command. Must be called from within a tokio runtime, since RPC
    /// dispatch and capture submission are async.
    #[instrument(skip(dispatcher, capture, on_event, on_ready))]
    pub fn launch(
        url: &str,
        dispatcher: Arc<RpcDispatcher>,
        capture: Arc<CaptureBridge>,
        capture_id: String,
        mut on_event: impl FnMut(RuntimeEvent) + 'static,
        on_ready: impl FnOnce(CaptureTrigger) + 'static,
    ) -> bridge_api::Result<()> {
        let handle = Handle::current();
        let event_loop: EventLoop<LoopEvent> = EventLoop::with_user_event();
        let proxy: EventLoopProxy<LoopEvent> = event_loop.create_proxy();
        let closed = Arc::new(AtomicBool::new(false));

        let window = WindowBuilder::new()
            .with_title("bridge")
            .with_inner_size(tao::dpi::LogicalSize::new(VIEWPORT_WIDTH, VIEWPORT_HEIGHT))
            .build(&event_loop)
            .map_err(|e| {
                tracing::error!(%e, "failed to create browser window");
                Error::BrowserDisconnected
            })?;

        let chain_hex = dispatcher.chain().hex_id();
        let chain_decimal = dispatcher.chain().decimal_id();
        let init_script =
            provider_script::render(dispatcher.wallet_address(), &chain_hex, &chain_decimal);

        let trigger_capture = capture.clone();
        let trigger_handle = handle.clone();
        let trigger_proxy = proxy.clone();

        let ipc_proxy = proxy.clone();
        let nav_capture = capture.clone();
        let popup_capture = capture.clone();
        let webview = WebViewBuilder::new()
            .with_initialization_script(&init_script)
            .with_url(url)
            .with_navigation_handler(move |url: String| {
                nav_capture.observe_navigation(&url);
                true
            })
            .with_new_window_req_handler(move |url: String| {
                popup_capture.observe_navigation(&url);
                true
            })
            .with_ipc_handler(move |req: wry::http::Request<String>| {
                handle_ipc_message(
                    req.body(),
                    dispatcher.clone(),
                    capture.clone(),
                    handle.clone(),
                    ipc_proxy.clone(),
                );
            })
            .build(&window)
            .map_err(|e| {
                tracing::error!(%e, "failed to create webview");
                Error::BrowserDisconnected
            })?;

        info!(%url, "browser runtime launched");
        let runtime_closed = closed.clone();

        on_ready(CaptureTrigger {
            proxy: proxy.clone(),
        });

        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Wait;
            match event {
                tao::event::Event::WindowEvent {
                    event: tao::event::WindowEvent::CloseRequested,
                    ..
                } => {
                    runtime_closed.store(true, Ordering::SeqCst);
                    on_event(RuntimeEvent::Closed);
                    *control_flow = ControlFlow::Exit;
                }
                tao::event::Event::UserEvent(LoopEvent::Resolve { id, result }) => {
                    let script = match result {
                        Ok(value) => format!(
                            "window.__bridgeResolve({id}, {}, null);",
                            serde_json::to_string(&value).unwrap_or_else(|_| "null".into())
                        ),
                        Err(message) => format!(
                            "window.__bridgeResolve({id}, null, {});",
                            serde_json::to_string(&message).unwrap_or_else(|_| "\"error\"".into())
                        ),
                    };
                    if let Err(e) = webview.evaluate_script(&script) {
                        warn!(%e, "failed to deliver host call result to page");
                    }
                }
                tao::event::Event::UserEvent(LoopEvent::Observed(observed)) => {
                    on_event(observed);
                }
                tao::event::Event::UserEvent(LoopEvent::TriggerCapture) => {
                    let capture = trigger_capture.clone();
                    let capture_id = capture_id.clone();
                    let proxy = trigger_proxy.clone();
                    trigger_handle.spawn(async move {
                        match fetch_capture_scripts(&capture, &capture_id).await {
                            Ok((foreign_script, install_script)) => {
                                let _ = proxy
                                    .send_event(LoopEvent::InjectForeignScript(Ok(foreign_script)));
                                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                                let _ = proxy
                                    .send_event(LoopEvent::InjectCaptureInstall(Ok(install_script)));
                            }
                            Err(message) => {
                                let _ = proxy.send_event(LoopEvent::InjectForeignScript(Err(message)));
                            }
                        }
                    });
                }
                tao::event::Event::UserEvent(LoopEvent::InjectForeignScript(outcome)) => match outcome {
                    Ok(script) => {
                        if let Err(e) = webview.evaluate_script(&script) {
                            warn!(%e, "failed to inject capture script");
                            on_event(RuntimeEvent::CaptureInjectionFailed(e.to_string()));
                        }
                    }
                    Err(message) => {
                        warn!(message, "capture script fetch failed");
                        on_event(RuntimeEvent::CaptureInjectionFailed(message));
                    }
                },
                tao::event::Event::UserEvent(LoopEvent::InjectCaptureInstall(outcome)) => match outcome {
                    Ok(script) => {
                        if let Err(e) = webview.evaluate_script(&script) {
                            warn!(%e, "failed to install capture interposer");
                            on_event(RuntimeEvent::CaptureInjectionFailed(e.to_string()));
                        } else {
                            on_event(RuntimeEvent::CaptureInjected);
                        }
                    }
                    Err(message) => {
                        warn!(message, "capture interposer install failed");
                        on_event(RuntimeEvent::CaptureInjectionFailed(message));
                    }
                },
                _ => {}
            }
        });
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Stage B of the capture bridge: fetches the foreign script and renders
/// both halves of the injection — the foreign script itself, evaluated
/// immediately, and the interposer-install snippet, evaluated by the caller
/// after a one-second pause so the foreign script finishes
/// self-initialising first.
async fn fetch_capture_scripts(
    capture: &CaptureBridge,
    capture_id: &str,
) -> Result<(String, String), String> {
    let script_text = capture
        .fetch_capture_script(CAPTURE_SCRIPT_URL)
        .await
        .map_err(|e| e.to_string())?;
    Ok((
        render_foreign_script_injection(&script_text),
        render_capture_install_script(capture_id, CAPTURE_BASE_ENDPOINT),
    ))
}

fn handle_ipc_message(
    raw: &str,
    dispatcher: Arc<RpcDispatcher>,
    capture: Arc<CaptureBridge>,
    handle: Handle,
    proxy: EventLoopProxy<LoopEvent>,
) {
    let call: HostCall = match serde_json::from_str(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!(%e, "malformed host call envelope");
            return;
        }
    };

    handle.spawn(async move {
        match call {
            HostCall::Rpc { id, method, params } => {
                let result = dispatcher
                    .dispatch(&method, &params)
                    .await
                    .map_err(|e| e.to_string());
                let _ = proxy.send_event(LoopEvent::Observed(RuntimeEvent::Dispatched {
                    method: method.clone(),
                }));
                let _ = proxy.send_event(LoopEvent::Resolve { id, result });
            }
            HostCall::Capture { id, target_url, body } => {
                let result = capture
                    .submit_capture(&target_url, &body)
                    .await
                    .map(Value::String)
                    .map_err(|e| e.to_string());
                let _ = proxy.send_event(LoopEvent::Observed(RuntimeEvent::CaptureSubmitted));
                let _ = proxy.send_event(LoopEvent::Resolve { id, result });
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_starts_open() {
        let closed = Arc::new(AtomicBool::new(false));
        let runtime = BrowserRuntime { closed };
        assert!(!runtime.is_closed());
    }

    #[test]
    fn close_is_idempotent() {
        let runtime = BrowserRuntime {
            closed: Arc::new(AtomicBool::new(false)),
        };
        runtime.close();
        runtime.close();
        assert!(runtime.is_closed());
    }

    #[test]
    fn host_call_envelope_parses_rpc_and_capture_variants() {
        let rpc: HostCall =
            serde_json::from_str(r#"{"kind":"rpc","id":1,"method":"eth_chainId","params":[]}"#).unwrap();
        assert!(matches!(rpc, HostCall::Rpc { id: 1, .. }));

        let capture: HostCall = serde_json::from_str(
            r#"{"kind":"capture","id":2,"targetUrl":"https://mcp.figma.com/x","body":"{}"}"#,
        )
        .unwrap();
        assert!(matches!(capture, HostCall::Capture { id: 2, .. }));
    }
}
