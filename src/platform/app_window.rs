use std::sync::Arc;

use super::{Bounds, ForegroundShell, PlatformError};
use crate::core::dom::{Document, ReadyGate};
use crate::core::events::{Event, EventSystem};

/// The one window an app gets. Geometry and attention calls are accepted
/// and ignored with a warning.
pub struct AppWindow {
    document: Arc<Document>,
    ready: ReadyGate,
    events: Arc<EventSystem>,
    shell: Arc<dyn ForegroundShell>,
}

fn unsupported(api: &str) {
    tracing::warn!("{} is not supported on this platform.", api);
}

impl AppWindow {
    pub fn new(document: Arc<Document>, shell: Arc<dyn ForegroundShell>, events: Arc<EventSystem>) -> Self {
        let ready = ReadyGate::new(document.clone());
        Self {
            document,
            ready,
            events,
            shell,
        }
    }

    /// Always empty; there is only ever one window.
    pub fn id(&self) -> &str {
        ""
    }

    /// The live document the page was composed into.
    pub fn content(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn ready_gate(&self) -> &ReadyGate {
        &self.ready
    }

    pub fn events(&self) -> &Arc<EventSystem> {
        &self.events
    }

    pub fn move_to(&self, _left: i32, _top: i32) {
        unsupported("AppWindow.moveTo");
    }

    pub fn resize_to(&self, _width: u32, _height: u32) {
        unsupported("AppWindow.resizeTo");
    }

    pub fn focus(&self) {
        unsupported("AppWindow.focus");
    }

    pub fn maximize(&self) {
        unsupported("AppWindow.maximize");
    }

    pub fn close(&self) {
        unsupported("AppWindow.close");
    }

    pub fn draw_attention(&self) {
        unsupported("AppWindow.drawAttention");
    }

    pub fn clear_attention(&self) {
        unsupported("AppWindow.clearAttention");
    }

    pub fn set_bounds(&self, _bounds: Bounds) {
        unsupported("AppWindow.setBounds");
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::default()
    }

    pub fn hide(&self) {
        if let Err(e) = self.shell.move_to_background() {
            tracing::warn!("AppWindow.hide failed: {}", e);
        }
    }

    pub fn show(&self) {
        match self.shell.bring_to_foreground() {
            Ok(()) => {}
            Err(PlatformError::Unsupported { .. }) => {
                tracing::warn!(
                    "AppWindow.show() not implemented for {}",
                    self.shell.platform_id()
                );
            }
            Err(e) => tracing::warn!("AppWindow.show failed: {}", e),
        }
    }

    /// Minimize and maximize make no sense here; restore is show.
    pub fn restore(&self) {
        self.show();
    }

    pub fn minimize(&self) {
        self.hide();
    }

    pub fn on_bounds_changed<F>(&self, listener: F)
    where
        F: Fn(&Bounds) + Send + Sync + 'static,
    {
        self.events.add_listener("boundschanged", move |event| {
            if let Event::BoundsChanged(bounds) = event {
                listener(bounds);
            }
        });
    }

    pub fn on_closed<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.add_listener("closed", move |event| {
            if matches!(event, Event::Closed) {
                listener();
            }
        });
    }
}

impl std::fmt::Debug for AppWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppWindow")
            .field("url", &self.document.url())
            .field("ready", &self.ready.is_released())
            .field("platform", &self.shell.platform_id())
            .finish()
    }
}
