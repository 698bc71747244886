//! Native window host: a winit window with a wry webview inside.
//!
//! The page runs the guest bundle from [`crate::guest`]. A tokio task drains
//! the window's bus inbox into a queue the event loop polls; each queued
//! event is handed to the guest with `evaluate_script`. Responses come back
//! through the IPC handler and are published on the bus exactly like those
//! of an in-process page, so the bridge cannot tell the two apart.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use periscope_common::{
    names, response_event_name, BusEvent, ErrorCode, EventBus, HandlerReply, PeriscopeError,
};
use periscope_webview::WebviewRegistry;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};
use wry::{PageLoadEvent, WebView, WebViewBuilder};

use crate::guest::{dispatch_script, init_script, receive, Inbound};
use crate::Host;

const POLL_INTERVAL: Duration = Duration::from_millis(8);
const BLANK_PAGE: &str = "<!DOCTYPE html><html><head><title></title></head><body></body></html>";

/// What the native window shows.
#[derive(Debug, Clone)]
pub struct DesktopOptions {
    pub label: String,
    /// Page to load; a blank page when absent.
    pub url: Option<String>,
    pub title: String,
    pub size: (f64, f64),
}

type Outbox = Arc<Mutex<VecDeque<BusEvent>>>;

struct DesktopApp {
    options: DesktopOptions,
    bus: EventBus,
    windows: WebviewRegistry,
    runtime: Handle,
    outbox: Outbox,
    /// Set by the guest's ready message, cleared when a navigation starts.
    ready: Arc<AtomicBool>,
    window: Option<Window>,
    webview: Option<WebView>,
    should_exit: bool,
}

/// Run the native window on the current thread until it is closed.
///
/// Must be called from the main thread; `runtime` runs everything else.
pub fn run(host: &Host, runtime: Handle, options: DesktopOptions) -> Result<(), PeriscopeError> {
    let event_loop =
        EventLoop::new().map_err(|e| PeriscopeError::Other(format!("event loop: {e}")))?;
    let mut app = DesktopApp {
        options,
        bus: host.bus.clone(),
        windows: host.windows.clone(),
        runtime,
        outbox: Arc::new(Mutex::new(VecDeque::new())),
        ready: Arc::new(AtomicBool::new(false)),
        window: None,
        webview: None,
        should_exit: false,
    };

    info!(label = %app.options.label, "entering native event loop");
    event_loop
        .run_app(&mut app)
        .map_err(|e| PeriscopeError::Other(format!("event loop: {e}")))
}

fn full_bounds(window: &Window) -> wry::Rect {
    let size = window.inner_size();
    wry::Rect {
        position: wry::dpi::Position::Logical(wry::dpi::LogicalPosition::new(0.0, 0.0)),
        size: wry::dpi::Size::Physical(wry::dpi::PhysicalSize::new(size.width, size.height)),
    }
}

impl DesktopApp {
    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<(), String> {
        let (width, height) = self.options.size;
        let attrs = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_inner_size(LogicalSize::new(width, height));
        let window = event_loop
            .create_window(attrs)
            .map_err(|e| format!("failed to create window: {e}"))?;

        let label = self.options.label.clone();
        let ipc_bus = self.bus.clone();
        let ipc_label = label.clone();
        let ipc_ready = Arc::clone(&self.ready);
        let load_ready = Arc::clone(&self.ready);
        let load_label = label.clone();

        let mut builder = WebViewBuilder::new()
            .with_bounds(full_bounds(&window))
            .with_devtools(cfg!(debug_assertions))
            .with_initialization_script(&init_script(&label))
            .with_ipc_handler(move |request| {
                if receive(&ipc_bus, &ipc_label, request.body()) == Inbound::Ready {
                    ipc_ready.store(true, Ordering::Release);
                }
            })
            .with_on_page_load_handler(move |event, url| {
                let state = match event {
                    PageLoadEvent::Started => {
                        load_ready.store(false, Ordering::Release);
                        "started"
                    }
                    PageLoadEvent::Finished => "finished",
                };
                debug!(label = %load_label, url = %url, state, "page load");
            });
        builder = match &self.options.url {
            Some(url) => builder.with_url(url),
            None => builder.with_html(BLANK_PAGE),
        };
        let webview = builder
            .build_as_child(&window)
            .map_err(|e| format!("failed to create webview: {e}"))?;

        let mut inbox = self.bus.attach(&label);
        let outbox = Arc::clone(&self.outbox);
        let forwarder = self.runtime.spawn(async move {
            while let Some(event) = inbox.recv().await {
                outbox
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_back(event);
            }
        });
        self.windows.track(&label, forwarder);

        info!(label = %label, url = ?self.options.url, "native webview window opened");
        self.window = Some(window);
        self.webview = Some(webview);
        Ok(())
    }

    /// Hand queued events to the guest, oldest first. The guest serializes
    /// them itself, so everything ready is dispatched at once.
    fn flush_outbox(&mut self) {
        let Some(webview) = &self.webview else {
            return;
        };
        if !self.ready.load(Ordering::Acquire) {
            return;
        }
        let queued: Vec<BusEvent> = self
            .outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for event in queued {
            if let Err(e) = webview.evaluate_script(&dispatch_script(&event)) {
                warn!(label = %self.options.label, event = %event.name, error = %e, "guest dispatch failed");
                let correlation_id = event
                    .payload
                    .get(names::CORRELATION_ID)
                    .and_then(|v| v.as_str())
                    .map(str::to_owned);
                let reply = HandlerReply::err(
                    Some(ErrorCode::ExecutionError),
                    format!("webview rejected event: {e}"),
                )
                .correlated(correlation_id, &self.options.label);
                self.bus
                    .emit(&response_event_name(&event.name), reply.to_value());
            }
        }
    }

    fn close(&mut self) {
        self.windows.close(&self.options.label);
        self.webview = None;
        self.window = None;
        self.should_exit = true;
    }
}

impl ApplicationHandler for DesktopApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.open(event_loop) {
            error!("{e}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!(label = %self.options.label, "window close requested");
                self.close();
                event_loop.exit();
            }
            WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                if let (Some(window), Some(webview)) = (&self.window, &self.webview) {
                    if let Err(e) = webview.set_bounds(full_bounds(window)) {
                        warn!(error = %e, "failed to resize webview");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
            return;
        }
        self.flush_outbox();
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + POLL_INTERVAL));
    }
}
