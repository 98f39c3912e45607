//! Global hotkey listening using rdev
//!
//! Stands in for touches on the overlay when running on a desktop: one key
//! taps the start/stop button, another drags the target under the pointer.

use rdev::{listen, Event, EventType, Key};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, info};

use crate::position::ClickPosition;

/// User intent picked up by the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Tap the start/stop button
    Toggle,
    /// Drag the target so its centre sits at this point
    MoveTarget(ClickPosition),
}

/// Key bindings for the listener
#[derive(Debug, Clone, Copy)]
pub struct Hotkeys {
    pub toggle: Key,
    pub move_target: Key,
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self {
            toggle: Key::F8,
            move_target: Key::F9,
        }
    }
}

/// Turns raw global input into `ControlEvent`s
pub struct HotkeyMapper {
    hotkeys: Hotkeys,
    pointer: Option<ClickPosition>,
}

impl HotkeyMapper {
    pub fn new(hotkeys: Hotkeys) -> Self {
        Self {
            hotkeys,
            pointer: None,
        }
    }

    pub fn map(&mut self, event_type: &EventType) -> Option<ControlEvent> {
        match *event_type {
            EventType::MouseMove { x, y } => {
                self.pointer = Some(ClickPosition::new(x as i32, y as i32));
                None
            }
            EventType::KeyPress(key) if key == self.hotkeys.toggle => Some(ControlEvent::Toggle),
            EventType::KeyPress(key) if key == self.hotkeys.move_target => {
                // No motion seen yet means we don't know where the pointer is
                self.pointer.map(ControlEvent::MoveTarget)
            }
            _ => None,
        }
    }
}

/// Input listener that captures global keyboard and mouse events
pub struct InputListener {
    /// Sender for control events
    sender: mpsc::Sender<ControlEvent>,
    hotkeys: Hotkeys,
}

impl InputListener {
    /// Create a new InputListener with the given channel sender
    pub fn new(sender: mpsc::Sender<ControlEvent>) -> Self {
        Self {
            sender,
            hotkeys: Hotkeys::default(),
        }
    }

    pub fn with_hotkeys(mut self, hotkeys: Hotkeys) -> Self {
        self.hotkeys = hotkeys;
        self
    }

    /// Start listening for input events in a background thread
    ///
    /// Returns a JoinHandle for the listener thread.
    pub fn start(self) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            info!("Input listener started");

            let sender = self.sender;
            let mut mapper = HotkeyMapper::new(self.hotkeys);

            let callback = move |event: Event| {
                if let Some(control) = mapper.map(&event.event_type) {
                    debug!("Control event: {:?}", control);
                    if let Err(e) = sender.send(control) {
                        error!("Failed to send control event: {}", e);
                    }
                }
            };

            if let Err(e) = listen(callback) {
                error!("Error in input listener: {:?}", e);
            }
        })
    }
}

/// Create a channel for control events and return both ends
pub fn create_event_channel() -> (mpsc::Sender<ControlEvent>, mpsc::Receiver<ControlEvent>) {
    mpsc::channel()
}
