//! Repeating tap loop
//!
//! While armed, exactly one tap is either in flight or waiting on the
//! scheduler. Each finished tap (completed, cancelled or refused by the host)
//! schedules the next one after a fixed interval. There is no retry cap and
//! no backoff: a host that keeps refusing is retried forever until `stop()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::events::{ClickEvent, EventBus};
use crate::gesture::{GestureHost, TapOutcome};
use crate::position::PositionStore;
use crate::scheduler::Scheduler;
use crate::{lock, ClickerError};

/// Armed/idle state of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickerState {
    Idle,
    Armed,
}

struct LoopState {
    state: ClickerState,
    /// Bumped on every arm so delayed cycles from an earlier arming are dropped
    epoch: u64,
    /// A tap has been handed to the host and has not settled yet
    in_flight: bool,
}

impl LoopState {
    fn is_current(&self, epoch: u64) -> bool {
        self.state == ClickerState::Armed && self.epoch == epoch
    }
}

struct LoopInner {
    me: Weak<LoopInner>,
    state: Mutex<LoopState>,
    /// Held from the armed check until the host accepted or refused the tap
    dispatch_gate: Mutex<()>,
    position: Arc<PositionStore>,
    gesture: Arc<dyn GestureHost>,
    scheduler: Arc<dyn Scheduler>,
    events: EventBus,
    press: Duration,
    interval: Duration,
}

/// Handle to the tap loop; clones share the same loop
#[derive(Clone)]
pub struct ClickLoop {
    inner: Arc<LoopInner>,
}

impl ClickLoop {
    pub fn new(
        position: Arc<PositionStore>,
        gesture: Arc<dyn GestureHost>,
        scheduler: Arc<dyn Scheduler>,
        events: EventBus,
        press: Duration,
        interval: Duration,
    ) -> Self {
        let inner = Arc::new_cyclic(|me| LoopInner {
            me: me.clone(),
            state: Mutex::new(LoopState {
                state: ClickerState::Idle,
                epoch: 0,
                in_flight: false,
            }),
            dispatch_gate: Mutex::new(()),
            position,
            gesture,
            scheduler,
            events,
            press,
            interval,
        });
        Self { inner }
    }

    /// Arm the loop and dispatch the first tap right away. No-op when already armed.
    ///
    /// If a tap from an earlier arming is still in flight, its completion
    /// schedules the first tap of this arming instead.
    pub fn start(&self) {
        let (epoch, in_flight) = {
            let mut state = lock(&self.inner.state);
            if state.state == ClickerState::Armed {
                debug!("Click loop already armed");
                return;
            }
            state.state = ClickerState::Armed;
            state.epoch += 1;
            (state.epoch, state.in_flight)
        };

        info!("Clicking started at {}", self.inner.position.get());
        if in_flight {
            debug!("Previous tap still in flight, first tap follows its completion");
            return;
        }
        self.inner.run_cycle(epoch);
    }

    /// Disarm and cancel any scheduled tap. A tap already handed to the host
    /// still finishes, but its completion will not re-arm. Once this returns
    /// no new tap is handed to the host.
    pub fn stop(&self) {
        let _gate = lock(&self.inner.dispatch_gate);
        let mut state = lock(&self.inner.state);
        let was_armed = state.state == ClickerState::Armed;
        state.state = ClickerState::Idle;
        self.inner.scheduler.cancel_pending();
        if was_armed {
            info!("Clicking stopped");
        }
    }

    /// Host interrupted the gesture capability
    pub fn interrupt(&self) {
        debug!("Gesture capability interrupted");
        self.stop();
    }

    pub fn state(&self) -> ClickerState {
        lock(&self.inner.state).state
    }

    pub fn is_armed(&self) -> bool {
        self.state() == ClickerState::Armed
    }

    /// Whether a tap is with the host right now
    pub fn tap_in_flight(&self) -> bool {
        lock(&self.inner.state).in_flight
    }
}

impl LoopInner {
    fn run_cycle(&self, epoch: u64) {
        let _gate = lock(&self.dispatch_gate);

        // Read at dispatch time so drags made while armed take effect on the next tap
        let target = {
            let mut state = lock(&self.state);
            if !state.is_current(epoch) || state.in_flight {
                return;
            }
            state.in_flight = true;
            self.position.get()
        };

        self.events.publish(ClickEvent::TapImminent(target));

        let settled = Arc::new(AtomicBool::new(false));
        let on_done = {
            let settled = settled.clone();
            let me = self.me.clone();
            Box::new(move |outcome: TapOutcome| {
                if settled.swap(true, Ordering::SeqCst) {
                    return;
                }
                trace!("Tap at {} finished: {:?}", target, outcome);
                if let Some(inner) = me.upgrade() {
                    inner.settle();
                }
            })
        };

        if !self.gesture.dispatch_tap(target, self.press, on_done)
            && !settled.swap(true, Ordering::SeqCst)
        {
            debug!(
                "{} at {}, retrying in {:?}",
                ClickerError::DispatchRejected,
                target,
                self.interval
            );
            self.settle();
        }
    }

    /// The in-flight tap is done; queue the next one for whatever arming is current
    fn settle(&self) {
        // Hold the state lock so a concurrent stop() cannot slip between the check and the post
        let mut state = lock(&self.state);
        state.in_flight = false;
        if state.state != ClickerState::Armed {
            return;
        }

        let epoch = state.epoch;
        let me = self.me.clone();
        self.scheduler.post_delayed(
            self.interval,
            Box::new(move || {
                if let Some(inner) = me.upgrade() {
                    inner.run_cycle(epoch);
                }
            }),
        );
    }
}
