//! Platform abstraction for the single app window.
//!
//! Mobile shells have no real window manager: there is one full-screen
//! window that can only be sent to the background or brought back. The
//! `ForegroundShell` trait is that whole surface; `AppWindow` layers the
//! desktop-shaped window API on top of it.

mod app_window;
mod registry;

pub use app_window::AppWindow;
pub use registry::{ContextKind, CreateOptions, WindowError, WindowRegistry};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{operation} is not supported on {platform}")]
    Unsupported {
        operation: &'static str,
        platform: String,
    },
    #[error("Shell request failed: {0}")]
    ShellFailed(String),
}

/// Window geometry. Always zero on shells without window management.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// Moves the app between foreground and background.
pub trait ForegroundShell: Send + Sync {
    fn move_to_background(&self) -> Result<(), PlatformError>;

    fn bring_to_foreground(&self) -> Result<(), PlatformError>;

    fn platform_id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Foreground,
    Background,
}

/// Shell for headless runs: tracks visibility in memory.
#[derive(Debug)]
pub struct HeadlessShell {
    visibility: RwLock<Visibility>,
    can_foreground: bool,
}

impl HeadlessShell {
    pub fn new() -> Self {
        Self {
            visibility: RwLock::new(Visibility::Background),
            can_foreground: true,
        }
    }

    /// A shell that can hide but has no way to come back to the foreground.
    pub fn without_foreground() -> Self {
        Self {
            visibility: RwLock::new(Visibility::Background),
            can_foreground: false,
        }
    }

    pub fn visibility(&self) -> Visibility {
        *self.visibility.read()
    }
}

impl Default for HeadlessShell {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundShell for HeadlessShell {
    fn move_to_background(&self) -> Result<(), PlatformError> {
        *self.visibility.write() = Visibility::Background;
        Ok(())
    }

    fn bring_to_foreground(&self) -> Result<(), PlatformError> {
        if !self.can_foreground {
            return Err(PlatformError::Unsupported {
                operation: "bring_to_foreground",
                platform: self.platform_id().to_string(),
            });
        }
        *self.visibility.write() = Visibility::Foreground;
        Ok(())
    }

    fn platform_id(&self) -> &str {
        "headless"
    }
}
