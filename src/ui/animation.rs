//! Frame-stepped springs and timed tweens

use std::time::Duration;

/// Integration step; longer frames are split into steps of this size
const MAX_STEP_SECONDS: f64 = 0.001;

/// A spring is at rest once both are under these thresholds
const REST_DISPLACEMENT: f64 = 0.01;
const REST_SPEED: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringConfig {
    pub damping: f64,
    pub stiffness: f64,
    pub mass: f64,
}

impl SpringConfig {
    pub const fn new(damping: f64, stiffness: f64) -> Self {
        Self {
            damping,
            stiffness,
            mass: 1.0,
        }
    }
}

/// Damped spring driving one value toward a target
#[derive(Debug, Clone)]
pub struct Spring {
    config: SpringConfig,
    value: f64,
    velocity: f64,
    target: f64,
}

impl Spring {
    /// Spring resting at `value`
    pub fn new(value: f64, config: SpringConfig) -> Self {
        Self {
            config,
            value,
            velocity: 0.0,
            target: value,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Retarget, keeping the current velocity
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    pub fn is_settled(&self) -> bool {
        self.value == self.target && self.velocity == 0.0
    }

    pub fn step(&mut self, dt: Duration) {
        if self.is_settled() {
            return;
        }

        let SpringConfig {
            damping,
            stiffness,
            mass,
        } = self.config;

        let mut remaining = dt.as_secs_f64();
        while remaining > 0.0 {
            let h = remaining.min(MAX_STEP_SECONDS);
            let displacement = self.value - self.target;
            let acceleration = (-stiffness * displacement - damping * self.velocity) / mass;
            self.velocity += acceleration * h;
            self.value += self.velocity * h;
            remaining -= h;
        }

        if (self.value - self.target).abs() < REST_DISPLACEMENT && self.velocity.abs() < REST_SPEED
        {
            self.value = self.target;
            self.velocity = 0.0;
        }
    }
}

/// Fixed-duration tween with in-out quadratic easing
#[derive(Debug, Clone)]
pub struct Timing {
    from: f64,
    to: f64,
    duration: Duration,
    elapsed: Duration,
}

impl Timing {
    /// Tween resting at `value`
    pub fn new(value: f64, duration: Duration) -> Self {
        Self {
            from: value,
            to: value,
            duration,
            elapsed: duration,
        }
    }

    pub fn value(&self) -> f64 {
        if self.duration.is_zero() {
            return self.to;
        }
        let t = (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0);
        self.from + (self.to - self.from) * ease_in_out_quad(t)
    }

    pub fn target(&self) -> f64 {
        self.to
    }

    /// Restart from the current value; no-op when already heading there
    pub fn set_target(&mut self, target: f64) {
        if target == self.to {
            return;
        }
        self.from = self.value();
        self.to = target;
        self.elapsed = Duration::ZERO;
    }

    pub fn is_settled(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub fn step(&mut self, dt: Duration) {
        self.elapsed = (self.elapsed + dt).min(self.duration);
    }
}

fn ease_in_out_quad(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}
