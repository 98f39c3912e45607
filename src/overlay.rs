//! Overlay surfaces: a draggable click target and a start/stop button
//!
//! The controller turns raw touches on the two surfaces into position
//! updates and arm/disarm calls, and pulses the target whenever the click
//! loop announces a tap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

use crate::click_loop::ClickLoop;
use crate::config::{Config, Pulse};
use crate::events::{ClickEvent, EventBus, Subscription};
use crate::position::{ClickPosition, PositionStore};
use crate::{lock, ClickResult, ClickerError};

/// Opaque id of a surface added to an overlay host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Fixed start/stop button
    Control,
    /// Freely repositionable click target
    Target,
}

/// Screen edge a placement origin is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    CenterLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn square(edge: i32) -> Self {
        Self {
            width: edge,
            height: edge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub anchor: Anchor,
    pub origin: ClickPosition,
    /// `None` wraps the content
    pub requested_size: Option<Size>,
}

/// Icon shown on the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonFace {
    Play,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    Down,
    Move,
    Up,
    Other,
}

/// Touch on a surface, in raw screen coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub raw_x: f32,
    pub raw_y: f32,
}

impl TouchEvent {
    pub fn new(action: TouchAction, raw_x: f32, raw_y: f32) -> Self {
        Self {
            action,
            raw_x,
            raw_y,
        }
    }
}

/// Called once with the size a surface actually got after its first layout
pub type LayoutCallback = Box<dyn FnOnce(Size) + Send + 'static>;

/// Trait for hosts that can show always-on-top surfaces
pub trait OverlayHost: Send + Sync {
    fn add_surface(&self, kind: SurfaceKind, placement: Placement) -> ClickResult<SurfaceHandle>;

    fn update_surface_placement(&self, handle: SurfaceHandle, placement: Placement)
        -> ClickResult<()>;

    fn remove_surface(&self, handle: SurfaceHandle) -> ClickResult<()>;

    /// Run `callback` once the surface has been measured
    fn on_laid_out(&self, handle: SurfaceHandle, callback: LayoutCallback);

    fn set_button_face(&self, handle: SurfaceHandle, face: ButtonFace);

    fn set_opacity(&self, handle: SurfaceHandle, alpha: f32);

    /// Start a pulse animation and return without waiting for it
    fn play_pulse(&self, handle: SurfaceHandle, pulse: Pulse);
}

#[derive(Debug, Clone, Copy)]
struct DragAnchor {
    origin: ClickPosition,
    touch_x: f32,
    touch_y: f32,
}

struct TargetView {
    origin: ClickPosition,
    /// From the top-left corner to the centre; placeholder until measured
    center_offset: (i32, i32),
    drag: Option<DragAnchor>,
}

impl TargetView {
    fn center(&self) -> ClickPosition {
        self.origin.offset(self.center_offset.0, self.center_offset.1)
    }
}

struct ControllerShared {
    host: Arc<dyn OverlayHost>,
    click_loop: ClickLoop,
    position: Arc<PositionStore>,
    control: SurfaceHandle,
    target: SurfaceHandle,
    target_size: Size,
    drag_alpha: f32,
    pulse: Pulse,
    armed: Mutex<bool>,
    view: Mutex<TargetView>,
}

impl ControllerShared {
    fn target_placement(&self, origin: ClickPosition) -> Placement {
        Placement {
            anchor: Anchor::TopLeft,
            origin,
            requested_size: Some(self.target_size),
        }
    }

    fn push_position(&self) {
        let center = lock(&self.view).center();
        self.position.set_position(center);
    }

    fn apply_layout(&self, measured: Size) {
        let center = {
            let mut view = lock(&self.view);
            view.center_offset = (measured.width / 2, measured.height / 2);
            view.center()
        };
        debug!(
            "Target measured at {}x{}, centre {}",
            measured.width, measured.height, center
        );
        self.position.set_position(center);
    }
}

/// Owns the two overlay surfaces for one session
pub struct OverlayController {
    shared: Arc<ControllerShared>,
    subscription: Option<Subscription>,
    feedback: Option<thread::JoinHandle<()>>,
    closed: bool,
}

impl OverlayController {
    /// Add both surfaces, push the initial click position and start listening
    /// for tap notifications
    pub fn open(
        host: Arc<dyn OverlayHost>,
        click_loop: ClickLoop,
        position: Arc<PositionStore>,
        events: &EventBus,
        config: &Config,
    ) -> ClickResult<Self> {
        let control = host.add_surface(
            SurfaceKind::Control,
            Placement {
                anchor: Anchor::CenterLeft,
                origin: config.control_offset,
                requested_size: None,
            },
        )?;
        host.set_button_face(control, ButtonFace::Play);

        let target_edge = (config.target_size_dp as f32 * config.density) as i32;
        let target_size = Size::square(target_edge);
        let target = match host.add_surface(
            SurfaceKind::Target,
            Placement {
                anchor: Anchor::TopLeft,
                origin: config.target_origin,
                requested_size: Some(target_size),
            },
        ) {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(cleanup) = host.remove_surface(control) {
                    warn!("Failed to remove control surface: {}", cleanup);
                }
                return Err(e);
            }
        };

        let offset = config.placeholder_center_offset();
        let shared = Arc::new(ControllerShared {
            host: host.clone(),
            click_loop,
            position,
            control,
            target,
            target_size,
            drag_alpha: config.drag_alpha,
            pulse: config.feedback_pulse,
            armed: Mutex::new(false),
            view: Mutex::new(TargetView {
                origin: config.target_origin,
                center_offset: (offset, offset),
                drag: None,
            }),
        });

        // Placeholder first; the measured centre replaces it once layout lands
        shared.push_position();
        let weak = Arc::downgrade(&shared);
        host.on_laid_out(
            target,
            Box::new(move |measured: Size| {
                if let Some(shared) = weak.upgrade() {
                    shared.apply_layout(measured);
                }
            }),
        );

        let subscription = events.subscribe();
        let feedback = match spawn_feedback(shared.clone(), &subscription) {
            Ok(handle) => handle,
            Err(e) => {
                for handle in [control, target] {
                    if let Err(cleanup) = host.remove_surface(handle) {
                        warn!("Failed to remove surface {:?}: {}", handle, cleanup);
                    }
                }
                return Err(e);
            }
        };

        info!("Overlay opened, target at {}", shared.position.get());
        Ok(Self {
            shared,
            subscription: Some(subscription),
            feedback: Some(feedback),
            closed: false,
        })
    }

    /// Handle a touch on the target surface. Returns whether it was consumed.
    pub fn on_target_touch(&self, event: TouchEvent) -> bool {
        let shared = &self.shared;
        match event.action {
            TouchAction::Down => {
                {
                    let mut view = lock(&shared.view);
                    let origin = view.origin;
                    view.drag = Some(DragAnchor {
                        origin,
                        touch_x: event.raw_x,
                        touch_y: event.raw_y,
                    });
                }
                shared.host.set_opacity(shared.target, shared.drag_alpha);
                true
            }
            TouchAction::Move => {
                let (origin, center) = {
                    let mut view = lock(&shared.view);
                    let Some(anchor) = view.drag else {
                        return false;
                    };
                    view.origin = anchor.origin.offset(
                        (event.raw_x - anchor.touch_x) as i32,
                        (event.raw_y - anchor.touch_y) as i32,
                    );
                    (view.origin, view.center())
                };

                if let Err(e) = shared
                    .host
                    .update_surface_placement(shared.target, shared.target_placement(origin))
                {
                    warn!("Failed to move target surface: {}", e);
                }
                shared.position.set_position(center);
                true
            }
            TouchAction::Up => {
                let center = {
                    let mut view = lock(&shared.view);
                    view.drag = None;
                    view.center()
                };
                shared.host.set_opacity(shared.target, 1.0);
                shared.position.set_position(center);
                debug!("Target dropped, click position {}", center);
                true
            }
            TouchAction::Other => false,
        }
    }

    /// Drag the target so that its centre lands on `to`
    pub fn drag_center_to(&self, to: ClickPosition) {
        let from = self.target_center();
        self.on_target_touch(TouchEvent::new(TouchAction::Down, from.x as f32, from.y as f32));
        self.on_target_touch(TouchEvent::new(TouchAction::Move, to.x as f32, to.y as f32));
        self.on_target_touch(TouchEvent::new(TouchAction::Up, to.x as f32, to.y as f32));
    }

    /// Handle a tap on the control surface: flip armed/idle
    pub fn on_control_tap(&self) {
        let shared = &self.shared;
        // Follow the loop, not the face, in case something else stopped it
        let armed = {
            let mut armed = lock(&shared.armed);
            *armed = !shared.click_loop.is_armed();
            *armed
        };

        let face = if armed {
            ButtonFace::Stop
        } else {
            ButtonFace::Play
        };
        shared.host.set_button_face(shared.control, face);

        if armed {
            shared.push_position();
            shared.click_loop.start();
        } else {
            shared.click_loop.stop();
        }
    }

    /// The host took the gesture capability away: stop and show Play again
    pub fn on_clicking_interrupted(&self) {
        let shared = &self.shared;
        shared.click_loop.interrupt();
        *lock(&shared.armed) = false;
        shared.host.set_button_face(shared.control, ButtonFace::Play);
    }

    /// Armed/idle as shown on the control surface
    pub fn shows_armed(&self) -> bool {
        *lock(&self.shared.armed)
    }

    pub fn target_center(&self) -> ClickPosition {
        lock(&self.shared.view).center()
    }

    pub fn target_origin(&self) -> ClickPosition {
        lock(&self.shared.view).origin
    }

    /// Tear the overlay down and stop the click loop
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Dropping the subscription disconnects the feedback thread
        drop(self.subscription.take());
        if let Some(feedback) = self.feedback.take() {
            if feedback.thread().id() != thread::current().id() {
                let _ = feedback.join();
            }
        }

        let shared = &self.shared;
        for handle in [shared.control, shared.target] {
            if let Err(e) = shared.host.remove_surface(handle) {
                warn!("Failed to remove surface {:?}: {}", handle, e);
            }
        }

        shared.click_loop.stop();
        info!("Overlay closed");
    }
}

impl Drop for OverlayController {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn spawn_feedback(
    shared: Arc<ControllerShared>,
    subscription: &Subscription,
) -> ClickResult<thread::JoinHandle<()>> {
    let receiver = subscription.receiver();
    thread::Builder::new()
        .name("tap-feedback".to_string())
        .spawn(move || {
            debug!("Feedback listener started");
            while let Ok(event) = receiver.recv() {
                match event {
                    ClickEvent::TapImminent(_) => {
                        shared.host.play_pulse(shared.target, shared.pulse);
                    }
                }
            }
            debug!("Feedback listener stopped");
        })
        .map_err(|e| ClickerError::OperationFailed(format!("Failed to spawn feedback thread: {}", e)))
}

/// Overlay host for terminals: nothing is drawn, every call is logged and
/// layout is reported immediately with the requested size
#[derive(Default)]
pub struct LogOverlayHost {
    next_id: AtomicU64,
    surfaces: Mutex<HashMap<SurfaceHandle, (SurfaceKind, Placement)>>,
}

impl LogOverlayHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placement(&self, handle: SurfaceHandle) -> Option<Placement> {
        lock(&self.surfaces).get(&handle).map(|(_, placement)| *placement)
    }

    pub fn surface_count(&self) -> usize {
        lock(&self.surfaces).len()
    }
}

impl OverlayHost for LogOverlayHost {
    fn add_surface(&self, kind: SurfaceKind, placement: Placement) -> ClickResult<SurfaceHandle> {
        let handle = SurfaceHandle(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.surfaces).insert(handle, (kind, placement));
        info!("{:?} surface {:?} placed at {}", kind, handle, placement.origin);
        Ok(handle)
    }

    fn update_surface_placement(
        &self,
        handle: SurfaceHandle,
        placement: Placement,
    ) -> ClickResult<()> {
        match lock(&self.surfaces).get_mut(&handle) {
            Some(entry) => {
                entry.1 = placement;
                debug!("Surface {:?} moved to {}", handle, placement.origin);
                Ok(())
            }
            None => Err(ClickerError::OperationFailed(format!(
                "unknown surface {:?}",
                handle
            ))),
        }
    }

    fn remove_surface(&self, handle: SurfaceHandle) -> ClickResult<()> {
        match lock(&self.surfaces).remove(&handle) {
            Some((kind, _)) => {
                info!("{:?} surface {:?} removed", kind, handle);
                Ok(())
            }
            None => Err(ClickerError::OperationFailed(format!(
                "unknown surface {:?}",
                handle
            ))),
        }
    }

    fn on_laid_out(&self, handle: SurfaceHandle, callback: LayoutCallback) {
        let size = self
            .placement(handle)
            .and_then(|placement| placement.requested_size)
            .unwrap_or_default();
        callback(size);
    }

    fn set_button_face(&self, handle: SurfaceHandle, face: ButtonFace) {
        info!("Surface {:?} shows {:?}", handle, face);
    }

    fn set_opacity(&self, handle: SurfaceHandle, alpha: f32) {
        debug!("Surface {:?} opacity {}", handle, alpha);
    }

    fn play_pulse(&self, handle: SurfaceHandle, pulse: Pulse) {
        debug!("Surface {:?} pulses for {:?}", handle, pulse.duration);
    }
}
