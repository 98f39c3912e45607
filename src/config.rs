//! Configuration management for Overlay Clicker

use std::time::Duration;

use crate::position::ClickPosition;
use crate::{ClickResult, ClickerError};

/// Visual pulse played on the target each time a tap fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    pub duration: Duration,
    /// Scale reached at the middle of the pulse (1.0 -> peak -> 1.0)
    pub peak_scale: f32,
    /// Opacity reached at the middle of the pulse (1.0 -> min -> 1.0)
    pub min_alpha: f32,
}

impl Default for Pulse {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(150),
            peak_scale: 1.4,
            min_alpha: 0.5,
        }
    }
}

/// Configuration for the auto-clicker
#[derive(Debug, Clone)]
pub struct Config {
    /// Delay between the end of one tap and the start of the next
    pub click_interval: Duration,

    /// How long each synthetic tap holds the pointer down
    pub press_duration: Duration,

    /// Click position before the overlay reports its own
    pub default_position: ClickPosition,

    /// Initial top-left corner of the draggable target surface
    pub target_origin: ClickPosition,

    /// Requested edge length of the target surface, in density-independent units
    pub target_size_dp: u32,

    /// Pixels per density-independent unit
    pub density: f32,

    /// Offset of the control surface from the centre-left screen edge
    pub control_offset: ClickPosition,

    /// Feedback animation played on every tap
    pub feedback_pulse: Pulse,

    /// Target opacity while it is being dragged
    pub drag_alpha: f32,

    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            click_interval: Duration::from_millis(500),
            press_duration: Duration::from_millis(50),
            default_position: ClickPosition::new(500, 500),
            target_origin: ClickPosition::new(500, 500),
            target_size_dp: 50,
            density: 1.0,
            control_offset: ClickPosition::new(20, 0),
            feedback_pulse: Pulse::default(),
            drag_alpha: 0.7,
            verbose: false,
        }
    }
}

impl Config {
    /// Create a new Config with a custom interval between taps
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.click_interval = interval;
        self
    }

    /// Create a new Config with a custom press duration
    pub fn with_press_duration(mut self, press: Duration) -> Self {
        self.press_duration = press;
        self
    }

    /// Create a new Config with a custom initial target origin
    pub fn with_target_origin(mut self, x: i32, y: i32) -> Self {
        self.target_origin = ClickPosition::new(x, y);
        self
    }

    /// Create a new Config with a custom screen density
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Enable verbose logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Centre offset assumed for the target before the host measures it
    pub fn placeholder_center_offset(&self) -> i32 {
        (self.target_size_dp as f32 / 2.0 * self.density) as i32
    }

    /// Reject values the click loop or overlay cannot work with
    pub fn validate(&self) -> ClickResult<()> {
        if self.click_interval.is_zero() {
            return Err(ClickerError::InvalidConfig(
                "click interval must be non-zero".to_string(),
            ));
        }
        if self.press_duration.is_zero() {
            return Err(ClickerError::InvalidConfig(
                "press duration must be non-zero".to_string(),
            ));
        }
        if self.target_size_dp == 0 {
            return Err(ClickerError::InvalidConfig(
                "target size must be non-zero".to_string(),
            ));
        }
        if self.density.is_nan() || self.density <= 0.0 {
            return Err(ClickerError::InvalidConfig(format!(
                "density must be positive, got {}",
                self.density
            )));
        }
        for (name, alpha) in [
            ("drag alpha", self.drag_alpha),
            ("pulse alpha", self.feedback_pulse.min_alpha),
        ] {
            if alpha.is_nan() || alpha <= 0.0 || alpha > 1.0 {
                return Err(ClickerError::InvalidConfig(format!(
                    "{} must be in (0, 1], got {}",
                    name, alpha
                )));
            }
        }
        Ok(())
    }
}
