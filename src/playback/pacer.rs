//! Step pacing: the single suspension point of a playback
//!
//! The scheduler never sleeps directly. It asks a [`Pacer`] to wait out a
//! step and races that wait against cancellation, so swapping the pacer is
//! all it takes to run a catalog faster, slower, or instantly.

use async_trait::async_trait;
use std::time::Duration;

use crate::types::Step;

/// Waits out a step's simulated duration.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait(&self, step: &Step);

    /// Wall time this pacer spends on `step`, for logging.
    fn planned(&self, step: &Step) -> Duration;
}

/// Real-time pacing scaled by a speed multiplier.
///
/// `speed = 2.0` halves every wait, `speed = 0` (or any non-positive or
/// non-finite value) disables waiting entirely.
#[derive(Debug, Clone, Copy)]
pub struct RealtimePacer {
    speed: f64,
}

impl RealtimePacer {
    pub fn new(speed: f64) -> Self {
        Self { speed }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn scale(&self, duration: Duration) -> Duration {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Duration::ZERO;
        }
        if (self.speed - 1.0).abs() < f64::EPSILON {
            return duration;
        }
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let nanos = (duration.as_nanos() as f64 / self.speed).round() as u64;
        Duration::from_nanos(nanos)
    }
}

impl Default for RealtimePacer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl Pacer for RealtimePacer {
    async fn wait(&self, step: &Step) {
        let delay = self.scale(step.duration());
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }

    fn planned(&self, step: &Step) -> Duration {
        self.scale(step.duration())
    }
}

/// Completes every step on the next poll, for tests that only care about
/// ordering. `--speed 0` goes through [`RealtimePacer`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediatePacer;

#[async_trait]
impl Pacer for ImmediatePacer {
    async fn wait(&self, _step: &Step) {
        tokio::task::yield_now().await;
    }

    fn planned(&self, _step: &Step) -> Duration {
        Duration::ZERO
    }
}
