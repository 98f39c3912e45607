//! Permission checks for the overlay and gesture capabilities
//!
//! On the desktop the overlay needs a reachable X11 display (native X11 or
//! XWayland), and gestures need the ydotoold daemon.

use std::path::Path;
use tracing::{debug, info, warn};

use crate::gesture::{ydotool_installed, ydotool_socket_path};
use crate::ClickResult;

/// Trait for hosts that gate the overlay and gesture capabilities
pub trait PermissionHost: Send + Sync {
    /// Whether always-on-top surfaces may be shown
    fn can_draw_overlays(&self) -> ClickResult<bool>;

    /// Whether synthetic gestures may be dispatched
    fn accessibility_enabled(&self) -> ClickResult<bool>;

    /// Point the user at the overlay settings; returns immediately
    fn open_overlay_settings(&self) -> ClickResult<()>;

    /// Point the user at the accessibility settings; returns immediately
    fn open_accessibility_settings(&self) -> ClickResult<()>;
}

/// Snapshot of both capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    pub overlay: bool,
    pub accessibility: bool,
}

impl PermissionStatus {
    pub fn query(host: &dyn PermissionHost) -> ClickResult<Self> {
        Ok(Self {
            overlay: host.can_draw_overlays()?,
            accessibility: host.accessibility_enabled()?,
        })
    }

    pub fn all_granted(&self) -> bool {
        self.overlay && self.accessibility
    }
}

/// Desktop permission checks
pub struct DesktopPermissions {
    /// X11 display name; `None` uses $DISPLAY
    display: Option<String>,
}

impl DesktopPermissions {
    pub fn new() -> Self {
        Self { display: None }
    }

    pub fn with_display(display: impl Into<String>) -> Self {
        Self {
            display: Some(display.into()),
        }
    }
}

impl Default for DesktopPermissions {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionHost for DesktopPermissions {
    fn can_draw_overlays(&self) -> ClickResult<bool> {
        use x11rb::connection::Connection;

        match x11rb::connect(self.display.as_deref()) {
            Ok((conn, screen_num)) => Ok(conn.setup().roots.len() > screen_num),
            Err(e) => {
                debug!("No X11 display: {}", e);
                Ok(false)
            }
        }
    }

    fn accessibility_enabled(&self) -> ClickResult<bool> {
        Ok(ydotool_installed() && Path::new(&ydotool_socket_path()).exists())
    }

    fn open_overlay_settings(&self) -> ClickResult<()> {
        warn!("No X11 display reachable. Set DISPLAY or run inside an X11/XWayland session.");
        Ok(())
    }

    fn open_accessibility_settings(&self) -> ClickResult<()> {
        info!("Gestures need the ydotoold daemon:");
        info!("  sudo systemctl enable --now ydotoold");
        info!("  sudo usermod -aG input $USER");
        Ok(())
    }
}
