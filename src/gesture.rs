//! Tap gesture dispatch
//!
//! The desktop host uses ydotool to move the pointer and press/release the
//! left button via uinput, so it works on Wayland as well as X11.
//! Requires ydotoold daemon to be running: sudo systemctl enable --now ydotoold

use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::position::ClickPosition;
use crate::{ClickResult, ClickerError};

/// How a submitted tap ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Completed,
    Cancelled,
}

/// Completion callback for a submitted tap
pub type TapCallback = Box<dyn FnOnce(TapOutcome) + Send + 'static>;

/// Trait for hosts able to synthesize a single-point tap
pub trait GestureHost: Send + Sync {
    /// Submit a tap at `at`, held for `press`.
    ///
    /// Returns `false` when the host refused the request; `on_done` is then
    /// never invoked. Otherwise `on_done` runs exactly once, possibly on
    /// another thread.
    fn dispatch_tap(&self, at: ClickPosition, press: Duration, on_done: TapCallback) -> bool;
}

// ydotool button codes: 0x00 = left, 0x40 = down, 0x80 = up
const LEFT_DOWN: &str = "0x40";
const LEFT_UP: &str = "0x80";

/// Get the ydotool socket path
pub fn ydotool_socket_path() -> String {
    let uid = unsafe { libc::getuid() };
    format!("/run/user/{}/.ydotool_socket", uid)
}

/// Whether the ydotool binary is on PATH
pub fn ydotool_installed() -> bool {
    Command::new("which")
        .arg("ydotool")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Gesture host that sends synthetic taps via ydotool
pub struct YdotoolGestureHost {
    socket_path: String,
}

impl YdotoolGestureHost {
    /// Create a new YdotoolGestureHost
    ///
    /// Requires ydotool to be installed; the daemon is checked per tap.
    pub fn new() -> ClickResult<Self> {
        if !ydotool_installed() {
            return Err(ClickerError::InputAccess(
                "ydotool not found. Install it: sudo pacman -S ydotool".to_string(),
            ));
        }

        let socket_path = ydotool_socket_path();
        info!("Tap gestures will be sent through {}", socket_path);
        Ok(Self { socket_path })
    }

    fn daemon_ready(&self) -> bool {
        Path::new(&self.socket_path).exists()
    }
}

impl GestureHost for YdotoolGestureHost {
    fn dispatch_tap(&self, at: ClickPosition, press: Duration, on_done: TapCallback) -> bool {
        if !self.daemon_ready() {
            warn!(
                "ydotoold socket {} missing. Start it: sudo systemctl enable --now ydotoold",
                self.socket_path
            );
            return false;
        }

        let socket_path = self.socket_path.clone();
        let spawned = thread::Builder::new()
            .name("tap-gesture".to_string())
            .spawn(move || {
                let outcome = match perform_tap(&socket_path, at, press) {
                    Ok(()) => TapOutcome::Completed,
                    Err(e) => {
                        warn!("Tap at {} cancelled: {}", at, e);
                        TapOutcome::Cancelled
                    }
                };
                on_done(outcome);
            });

        match spawned {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to spawn tap thread: {}", e);
                false
            }
        }
    }
}

fn perform_tap(socket_path: &str, at: ClickPosition, press: Duration) -> ClickResult<()> {
    let x = at.x.to_string();
    let y = at.y.to_string();
    run_ydotool(socket_path, &["mousemove", "--absolute", "-x", &x, "-y", &y])?;

    run_ydotool(socket_path, &["click", LEFT_DOWN])?;
    thread::sleep(press);
    run_ydotool(socket_path, &["click", LEFT_UP])?;

    debug!("Tap sent at {}", at);
    Ok(())
}

/// Run a ydotool command against the given daemon socket
fn run_ydotool(socket_path: &str, args: &[&str]) -> ClickResult<()> {
    let output = Command::new("ydotool")
        .env("YDOTOOL_SOCKET", socket_path)
        .args(args)
        .output()
        .map_err(|e| ClickerError::SendEvent(format!("Failed to run ydotool: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClickerError::SendEvent(format!("ydotool failed: {}", stderr)));
    }

    Ok(())
}
