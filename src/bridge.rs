//! Request/response surface for the hosting application
//!
//! Every operation resolves with a `BridgeValue` or rejects with an error
//! code and message. Host failures never escape as anything else.

use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::click_loop::ClickLoop;
use crate::config::Config;
use crate::events::EventBus;
use crate::gesture::GestureHost;
use crate::overlay::{OverlayController, OverlayHost};
use crate::permissions::{PermissionHost, PermissionStatus};
use crate::position::{ClickPosition, PositionStore};
use crate::scheduler::Scheduler;
use crate::{lock, ClickResult, ClickerError};

/// Rejection code handed back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    PermissionDenied,
    Error,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::Error => "ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<ClickerError> for BridgeError {
    fn from(err: ClickerError) -> Self {
        let code = match err {
            ClickerError::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::Error,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

/// Successful resolution of a bridge call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeValue {
    Message(String),
    Flag(bool),
}

pub type BridgeResult = Result<BridgeValue, BridgeError>;

fn resolve(operation: &str, result: ClickResult<BridgeValue>) -> BridgeResult {
    result.map_err(|e| {
        error!("{} failed: {}", operation, e);
        BridgeError::from(e)
    })
}

fn message(text: impl Into<String>) -> ClickResult<BridgeValue> {
    Ok(BridgeValue::Message(text.into()))
}

/// Everything that lives exactly as long as the overlay is shown
pub struct OverlaySession {
    position: Arc<PositionStore>,
    click_loop: ClickLoop,
    controller: OverlayController,
}

impl OverlaySession {
    pub fn open(
        config: &Config,
        overlay_host: Arc<dyn OverlayHost>,
        gesture: Arc<dyn GestureHost>,
        scheduler: Arc<dyn Scheduler>,
    ) -> ClickResult<Self> {
        let position = Arc::new(PositionStore::new(config.default_position));
        let events = EventBus::new();
        let click_loop = ClickLoop::new(
            position.clone(),
            gesture,
            scheduler,
            events.clone(),
            config.press_duration,
            config.click_interval,
        );
        let controller = OverlayController::open(
            overlay_host,
            click_loop.clone(),
            position.clone(),
            &events,
            config,
        )?;

        Ok(Self {
            position,
            click_loop,
            controller,
        })
    }

    pub fn controller(&self) -> &OverlayController {
        &self.controller
    }

    pub fn click_loop(&self) -> &ClickLoop {
        &self.click_loop
    }

    pub fn position(&self) -> ClickPosition {
        self.position.get()
    }

    pub fn set_position(&self, x: i32, y: i32) {
        self.position.set(x, y);
    }

    /// Remove the overlay; the click loop ends up idle
    pub fn close(self) {
        self.controller.close();
    }
}

/// Bridge between the hosting application and the clicker
pub struct AutoClickerBridge {
    config: Config,
    permissions: Arc<dyn PermissionHost>,
    overlay_host: Arc<dyn OverlayHost>,
    gesture: Arc<dyn GestureHost>,
    scheduler: Arc<dyn Scheduler>,
    session: Mutex<Option<OverlaySession>>,
}

impl AutoClickerBridge {
    pub fn new(
        config: Config,
        permissions: Arc<dyn PermissionHost>,
        overlay_host: Arc<dyn OverlayHost>,
        gesture: Arc<dyn GestureHost>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            config,
            permissions,
            overlay_host,
            gesture,
            scheduler,
            session: Mutex::new(None),
        }
    }

    pub fn start_overlay(&self) -> BridgeResult {
        resolve("start_overlay", self.try_start_overlay())
    }

    fn try_start_overlay(&self) -> ClickResult<BridgeValue> {
        if !self.permissions.can_draw_overlays()? {
            return Err(ClickerError::PermissionDenied);
        }

        let mut session = lock(&self.session);
        if session.is_some() {
            return message("Overlay service already running");
        }

        *session = Some(OverlaySession::open(
            &self.config,
            self.overlay_host.clone(),
            self.gesture.clone(),
            self.scheduler.clone(),
        )?);
        info!("Overlay service started");
        message("Overlay service started")
    }

    pub fn stop_overlay(&self) -> BridgeResult {
        let session = lock(&self.session).take();
        if let Some(session) = session {
            session.close();
            info!("Overlay service stopped");
        }
        resolve("stop_overlay", message("Overlay service stopped"))
    }

    pub fn request_overlay_permission(&self) -> BridgeResult {
        resolve("request_overlay_permission", self.try_request_overlay())
    }

    fn try_request_overlay(&self) -> ClickResult<BridgeValue> {
        if self.permissions.can_draw_overlays()? {
            return message("Permission already granted");
        }
        self.permissions.open_overlay_settings()?;
        message("Permission request sent")
    }

    pub fn check_overlay_permission(&self) -> BridgeResult {
        resolve(
            "check_overlay_permission",
            self.permissions.can_draw_overlays().map(BridgeValue::Flag),
        )
    }

    pub fn check_accessibility(&self) -> BridgeResult {
        resolve(
            "check_accessibility",
            self.permissions.accessibility_enabled().map(BridgeValue::Flag),
        )
    }

    pub fn request_accessibility(&self) -> BridgeResult {
        let result = self
            .permissions
            .open_accessibility_settings()
            .and_then(|()| message("Accessibility settings opened"));
        resolve("request_accessibility", result)
    }

    pub fn set_click_position(&self, x: i32, y: i32) -> BridgeResult {
        match lock(&self.session).as_ref() {
            Some(session) => {
                session.set_position(x, y);
                debug!("Click position set to ({}, {})", x, y);
            }
            None => debug!("No overlay running, ignoring click position ({}, {})", x, y),
        }
        resolve(
            "set_click_position",
            message(format!("Click position set to: {}, {}", x, y)),
        )
    }

    /// Host interrupted the gesture capability: stop clicking, keep the overlay
    pub fn interrupt_clicking(&self) {
        if let Some(session) = lock(&self.session).as_ref() {
            session.controller().on_clicking_interrupted();
        }
    }

    /// Both permission flags in one query
    pub fn check_permissions(&self) -> Result<PermissionStatus, BridgeError> {
        PermissionStatus::query(self.permissions.as_ref()).map_err(|e| {
            error!("check_permissions failed: {}", e);
            BridgeError::from(e)
        })
    }

    pub fn is_running(&self) -> bool {
        lock(&self.session).is_some()
    }

    /// Run `f` against the live session, if any
    pub fn with_session<R>(&self, f: impl FnOnce(&OverlaySession) -> R) -> Option<R> {
        lock(&self.session).as_ref().map(f)
    }
}

impl Drop for AutoClickerBridge {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.session).take() {
            session.close();
        }
    }
}
