//! Overlay Clicker - a draggable target plus a start/stop button driving a
//! repeating synthetic tap
//!
//! This library provides components for:
//! - Click position tracking (`PositionStore`)
//! - The armed/idle tap loop (`ClickLoop`)
//! - Overlay coordination (drag target, toggle button, tap feedback)
//! - A request/response bridge for the hosting application

pub mod bridge;
pub mod click_loop;
pub mod config;
pub mod events;
pub mod gesture;
pub mod input_listener;
pub mod overlay;
pub mod permissions;
pub mod position;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{AutoClickerBridge, BridgeError, BridgeResult, BridgeValue, ErrorCode};
pub use click_loop::{ClickLoop, ClickerState};
pub use config::Config;
pub use events::{ClickEvent, EventBus, Subscription};
pub use gesture::{GestureHost, TapOutcome, YdotoolGestureHost};
pub use input_listener::{ControlEvent, InputListener};
pub use overlay::{LogOverlayHost, OverlayController, OverlayHost};
pub use permissions::{DesktopPermissions, PermissionHost, PermissionStatus};
pub use position::{ClickPosition, PositionStore};
pub use scheduler::{LooperScheduler, Scheduler};

use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Main error type for Overlay Clicker
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClickerError {
    #[error("Overlay permission not granted")]
    PermissionDenied,

    #[error("Host declined to submit the tap")]
    DispatchRejected,

    #[error("{0}")]
    OperationFailed(String),

    #[error("Failed to access input devices: {0}")]
    InputAccess(String),

    #[error("Failed to send input event: {0}")]
    SendEvent(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ClickResult<T> = Result<T, ClickerError>;

/// Lock a mutex, recovering the data if a panicking thread poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
