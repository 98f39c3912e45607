//! Overlay Clicker - repeating tap at a draggable target
//!
//! Shows the target and start/stop button, then taps at the target every
//! interval while armed. F8 toggles clicking, F9 moves the target to the
//! pointer, Ctrl+C exits.

use overlay_clicker::{
    input_listener::{create_event_channel, InputListener},
    AutoClickerBridge, BridgeValue, ClickerError, Config, ControlEvent, DesktopPermissions,
    ErrorCode, LogOverlayHost, LooperScheduler, YdotoolGestureHost,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), ClickerError> {
    let verbose = std::env::args().any(|arg| arg == "-v" || arg == "--verbose");
    let config = Config::default().with_verbose(verbose);

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if config.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(false)
        .compact()
        .init();

    info!("Overlay Clicker starting...");
    config.validate()?;
    info!(
        "Config: interval={:?}, press={:?}, target origin={}",
        config.click_interval, config.press_duration, config.target_origin
    );

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        running_clone.store(false, Ordering::SeqCst);
    })
    .expect("Failed to set Ctrl+C handler");

    let gesture = match YdotoolGestureHost::new() {
        Ok(host) => host,
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };

    let bridge = AutoClickerBridge::new(
        config,
        Arc::new(DesktopPermissions::new()),
        Arc::new(LogOverlayHost::new()),
        Arc::new(gesture),
        Arc::new(LooperScheduler::start()),
    );

    ensure_permissions(&bridge);

    match bridge.start_overlay() {
        Ok(BridgeValue::Message(text)) => info!("{}", text),
        Ok(other) => info!("{:?}", other),
        Err(e) if e.code == ErrorCode::PermissionDenied => {
            error!("{}", e.message);
            return Err(ClickerError::PermissionDenied);
        }
        Err(e) => return Err(ClickerError::OperationFailed(e.message)),
    }

    // Create channel for control events and start listener in background thread
    let (sender, receiver) = create_event_channel();
    let _listener_handle = InputListener::new(sender).start();

    info!("F8: start/stop clicking, F9: move target to pointer, Ctrl+C: exit");

    // Main event loop
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(ControlEvent::Toggle) => {
                bridge.with_session(|session| session.controller().on_control_tap());
            }
            Ok(ControlEvent::MoveTarget(to)) => {
                bridge.with_session(|session| session.controller().drag_center_to(to));
            }
            Err(RecvTimeoutError::Timeout) => {
                // No event, continue loop
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Input listener disconnected");
                break;
            }
        }
    }

    info!("Overlay Clicker shutting down...");
    if let Err(e) = bridge.stop_overlay() {
        warn!("{}", e);
    }

    Ok(())
}

/// Ask for whatever is missing, then re-check once the user had a moment
fn ensure_permissions(bridge: &AutoClickerBridge) {
    let status = match bridge.check_permissions() {
        Ok(status) => status,
        Err(e) => {
            warn!("{}", e);
            return;
        }
    };
    if status.all_granted() {
        return;
    }

    if !status.overlay {
        if let Err(e) = bridge.request_overlay_permission() {
            warn!("{}", e);
        }
    }
    if !status.accessibility {
        if let Err(e) = bridge.request_accessibility() {
            warn!("{}", e);
        }
    }

    thread::sleep(Duration::from_secs(1));
    match bridge.check_permissions() {
        Ok(status) if status.all_granted() => info!("Permissions granted"),
        Ok(status) if !status.accessibility => {
            warn!("Gesture daemon unavailable; taps will be retried until it appears")
        }
        Ok(_) => warn!("Overlay display unavailable; start_overlay will be denied"),
        Err(e) => warn!("{}", e),
    }
}
