//! Test doubles for the host traits

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::Pulse;
use crate::gesture::{GestureHost, TapCallback, TapOutcome};
use crate::overlay::{
    ButtonFace, LayoutCallback, OverlayHost, Placement, Size, SurfaceHandle, SurfaceKind,
};
use crate::permissions::PermissionHost;
use crate::position::ClickPosition;
use crate::scheduler::{Scheduler, Task};
use crate::{lock, ClickResult, ClickerError};

/// Spy scheduler: records posts and cancels, runs tasks only when told to
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Vec<Task>>,
    delays: Mutex<Vec<Duration>>,
    cancels: AtomicUsize,
}

impl ManualScheduler {
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Every delay ever posted, in order
    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.delays).clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Remove the queued tasks without running them
    pub fn take_pending(&self) -> Vec<Task> {
        lock(&self.queue).drain(..).collect()
    }

    /// Run the tasks queued right now; tasks they post wait for the next call
    pub fn fire_all(&self) {
        let tasks: Vec<Task> = lock(&self.queue).drain(..).collect();
        for task in tasks {
            task();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn post_delayed(&self, delay: Duration, task: Task) {
        lock(&self.delays).push(delay);
        lock(&self.queue).push(task);
    }

    fn cancel_pending(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        lock(&self.queue).clear();
    }
}

#[derive(Default)]
struct GestureLog {
    taps: Vec<ClickPosition>,
    in_flight: VecDeque<TapCallback>,
    attempts: usize,
    last_press: Option<Duration>,
}

/// Gesture host whose taps finish only when the test says so
#[derive(Default)]
pub struct ScriptedGesture {
    log: Mutex<GestureLog>,
    refuse: AtomicBool,
}

impl ScriptedGesture {
    pub fn refuse_all(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Positions of accepted taps
    pub fn taps(&self) -> Vec<ClickPosition> {
        lock(&self.log).taps.clone()
    }

    pub fn attempts(&self) -> usize {
        lock(&self.log).attempts
    }

    pub fn last_press(&self) -> Option<Duration> {
        lock(&self.log).last_press
    }

    pub fn complete_next(&self, outcome: TapOutcome) {
        let callback = lock(&self.log).in_flight.pop_front();
        if let Some(callback) = callback {
            callback(outcome);
        }
    }

    pub fn complete_all(&self, outcome: TapOutcome) {
        let callbacks: Vec<_> = lock(&self.log).in_flight.drain(..).collect();
        for callback in callbacks {
            callback(outcome);
        }
    }
}

impl GestureHost for ScriptedGesture {
    fn dispatch_tap(&self, at: ClickPosition, press: Duration, on_done: TapCallback) -> bool {
        let mut log = lock(&self.log);
        log.attempts += 1;
        log.last_press = Some(press);
        if self.refuse.load(Ordering::SeqCst) {
            return false;
        }
        log.taps.push(at);
        log.in_flight.push_back(on_done);
        true
    }
}

/// Gesture host that parks inside `dispatch_tap` until released
pub struct GatedGesture {
    entered_tx: Sender<()>,
    entered_rx: Receiver<()>,
    release_tx: Sender<()>,
    release_rx: Receiver<()>,
    accepted: AtomicUsize,
    in_flight: Mutex<Vec<TapCallback>>,
}

impl Default for GatedGesture {
    fn default() -> Self {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        Self {
            entered_tx,
            entered_rx,
            release_tx,
            release_rx,
            accepted: AtomicUsize::new(0),
            in_flight: Mutex::new(Vec::new()),
        }
    }
}

impl GatedGesture {
    /// Block until some caller is parked inside `dispatch_tap`
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        self.entered_rx.recv_timeout(timeout).is_ok()
    }

    /// Let one parked dispatch return
    pub fn release(&self) {
        let _ = self.release_tx.send(());
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn complete_all(&self, outcome: TapOutcome) {
        let callbacks: Vec<_> = lock(&self.in_flight).drain(..).collect();
        for callback in callbacks {
            callback(outcome);
        }
    }
}

impl GestureHost for GatedGesture {
    fn dispatch_tap(&self, _at: ClickPosition, _press: Duration, on_done: TapCallback) -> bool {
        let _ = self.entered_tx.send(());
        let _ = self.release_rx.recv();
        self.accepted.fetch_add(1, Ordering::SeqCst);
        lock(&self.in_flight).push(on_done);
        true
    }
}

/// Gesture host that completes every tap before returning
#[derive(Default)]
pub struct ImmediateGesture {
    count: AtomicUsize,
}

impl ImmediateGesture {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl GestureHost for ImmediateGesture {
    fn dispatch_tap(&self, _at: ClickPosition, _press: Duration, on_done: TapCallback) -> bool {
        self.count.fetch_add(1, Ordering::SeqCst);
        on_done(TapOutcome::Completed);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostCall {
    Add(SurfaceKind),
    Move(SurfaceHandle, ClickPosition),
    Remove(SurfaceHandle),
    Face(SurfaceHandle, ButtonFace),
    Opacity(SurfaceHandle, f32),
    Pulse(SurfaceHandle),
}

/// Overlay host that records every call and defers layout until asked
#[derive(Default)]
pub struct RecordingOverlay {
    next_id: AtomicU64,
    live: Mutex<HashMap<SurfaceHandle, Placement>>,
    calls: Mutex<Vec<HostCall>>,
    layouts: Mutex<Vec<LayoutCallback>>,
    fail_kind: Option<SurfaceKind>,
    pulses: AtomicUsize,
}

impl RecordingOverlay {
    pub fn failing_on(kind: SurfaceKind) -> Self {
        Self {
            fail_kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }

    pub fn live_surfaces(&self) -> usize {
        lock(&self.live).len()
    }

    pub fn last_placement(&self, handle: SurfaceHandle) -> Option<Placement> {
        lock(&self.live).get(&handle).copied()
    }

    pub fn pulse_count(&self) -> usize {
        self.pulses.load(Ordering::SeqCst)
    }

    /// Report `size` to every pending layout callback
    pub fn finish_layout(&self, size: Size) {
        let callbacks: Vec<_> = lock(&self.layouts).drain(..).collect();
        for callback in callbacks {
            callback(size);
        }
    }

    fn record(&self, call: HostCall) {
        lock(&self.calls).push(call);
    }
}

impl OverlayHost for RecordingOverlay {
    fn add_surface(&self, kind: SurfaceKind, placement: Placement) -> ClickResult<SurfaceHandle> {
        if self.fail_kind == Some(kind) {
            return Err(ClickerError::OperationFailed(format!(
                "window manager refused {:?}",
                kind
            )));
        }
        let handle = SurfaceHandle(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.live).insert(handle, placement);
        self.record(HostCall::Add(kind));
        Ok(handle)
    }

    fn update_surface_placement(
        &self,
        handle: SurfaceHandle,
        placement: Placement,
    ) -> ClickResult<()> {
        lock(&self.live).insert(handle, placement);
        self.record(HostCall::Move(handle, placement.origin));
        Ok(())
    }

    fn remove_surface(&self, handle: SurfaceHandle) -> ClickResult<()> {
        lock(&self.live).remove(&handle);
        self.record(HostCall::Remove(handle));
        Ok(())
    }

    fn on_laid_out(&self, _handle: SurfaceHandle, callback: LayoutCallback) {
        lock(&self.layouts).push(callback);
    }

    fn set_button_face(&self, handle: SurfaceHandle, face: ButtonFace) {
        self.record(HostCall::Face(handle, face));
    }

    fn set_opacity(&self, handle: SurfaceHandle, alpha: f32) {
        self.record(HostCall::Opacity(handle, alpha));
    }

    fn play_pulse(&self, handle: SurfaceHandle, _pulse: Pulse) {
        self.record(HostCall::Pulse(handle));
        self.pulses.fetch_add(1, Ordering::SeqCst);
    }
}

/// Permission host with fixed answers
#[derive(Default)]
pub struct FixedPermissions {
    overlay: AtomicBool,
    accessibility: AtomicBool,
    failure: Option<String>,
    overlay_requests: AtomicUsize,
    accessibility_requests: AtomicUsize,
}

impl FixedPermissions {
    pub fn new(overlay: bool, accessibility: bool) -> Self {
        Self {
            overlay: AtomicBool::new(overlay),
            accessibility: AtomicBool::new(accessibility),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn grant_overlay(&self, granted: bool) {
        self.overlay.store(granted, Ordering::SeqCst);
    }

    pub fn overlay_requests(&self) -> usize {
        self.overlay_requests.load(Ordering::SeqCst)
    }

    pub fn accessibility_requests(&self) -> usize {
        self.accessibility_requests.load(Ordering::SeqCst)
    }

    fn check(&self) -> ClickResult<()> {
        match &self.failure {
            Some(message) => Err(ClickerError::OperationFailed(message.clone())),
            None => Ok(()),
        }
    }
}

impl PermissionHost for FixedPermissions {
    fn can_draw_overlays(&self) -> ClickResult<bool> {
        self.check()?;
        Ok(self.overlay.load(Ordering::SeqCst))
    }

    fn accessibility_enabled(&self) -> ClickResult<bool> {
        self.check()?;
        Ok(self.accessibility.load(Ordering::SeqCst))
    }

    fn open_overlay_settings(&self) -> ClickResult<()> {
        self.check()?;
        self.overlay_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn open_accessibility_settings(&self) -> ClickResult<()> {
        self.check()?;
        self.accessibility_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
