//! Adaptive processing-resolution control.
//!
//! A slow feedback loop nudges the shared processing scale toward a target
//! FPS using a smoothed FPS history, a deadband, and rate-limited
//! micro-adjustments, so quality degrades (and recovers) gradually instead of
//! oscillating.

use crate::constants::{
    ADJUST_INTERVAL_SECS, FPS_COARSE_GAP, FPS_DEADBAND, FPS_WINDOW, SCALE_APPLY_EPS, SCALE_MAX,
    SCALE_MIN, SCALE_STEP, SCALE_STEP_COARSE, TARGET_FPS_CAP, TARGET_FPS_FLOOR,
};
use std::collections::VecDeque;
use std::time::Instant;

/// Feedback controller for the shared processing scale
pub struct AdaptiveScaleController {
    target_fps: f64,
    scale: f64,
    history: VecDeque<f64>,
    last_adjustment: Option<Instant>,
}

impl AdaptiveScaleController {
    /// Create a controller for the given camera frame rate. The target FPS
    /// is `max(min(camera_fps, 15) - 1, 5)`.
    #[must_use]
    pub fn new(camera_fps: f64) -> Self {
        Self {
            target_fps: derive_target(camera_fps),
            scale: SCALE_MAX,
            history: VecDeque::with_capacity(FPS_WINDOW),
            last_adjustment: None,
        }
    }

    /// Current processing scale in [0.4, 1.0]
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Target FPS derived from the camera frame rate
    #[must_use]
    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// Smoothed FPS over the current window, if enough samples exist
    #[must_use]
    pub fn average_fps(&self) -> Option<f64> {
        if self.history.is_empty() {
            return None;
        }
        Some(self.history.iter().sum::<f64>() / self.history.len() as f64)
    }

    /// Re-derive the target when the camera frame rate changes
    pub fn set_camera_fps(&mut self, camera_fps: f64) {
        let target = derive_target(camera_fps);
        if (target - self.target_fps).abs() > f64::EPSILON {
            log::info!("Adaptive scale target changed to {target:.1} fps");
            self.target_fps = target;
            self.history.clear();
        }
    }

    /// Feed one FPS measurement. Adjustments require a full window and at
    /// least five seconds since the previous adjustment.
    pub fn record(&mut self, fps: f64, now: Instant) {
        if !fps.is_finite() || fps < 0.0 {
            return;
        }

        if self.history.len() >= FPS_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(fps);

        if self.history.len() < FPS_WINDOW {
            return;
        }

        match self.last_adjustment {
            None => {
                // Anchor the cadence at the first full window
                self.last_adjustment = Some(now);
                return;
            }
            Some(last) => {
                if now.duration_since(last).as_secs_f64() < ADJUST_INTERVAL_SECS {
                    return;
                }
            }
        }

        let average = self.history.iter().sum::<f64>() / self.history.len() as f64;
        let gap = self.target_fps - average;
        if gap.abs() <= FPS_DEADBAND {
            return;
        }

        let step = if gap.abs() > FPS_COARSE_GAP {
            SCALE_STEP_COARSE
        } else {
            SCALE_STEP
        };
        // Too slow: shrink. Too fast: grow back toward full resolution.
        let proposed = (self.scale - gap.signum() * step).clamp(SCALE_MIN, SCALE_MAX);

        if (proposed - self.scale).abs() <= SCALE_APPLY_EPS {
            return;
        }

        log::debug!(
            "Adaptive scale {:.3} -> {proposed:.3} (avg {average:.1} fps, target {:.1})",
            self.scale,
            self.target_fps
        );
        self.scale = proposed;
        self.last_adjustment = Some(now);

        // Keep half the history for continuity instead of restarting cold
        while self.history.len() > FPS_WINDOW / 2 {
            self.history.pop_front();
        }
    }
}

fn derive_target(camera_fps: f64) -> f64 {
    (camera_fps.min(TARGET_FPS_CAP) - 1.0).max(TARGET_FPS_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn feed(controller: &mut AdaptiveScaleController, fps: f64, seconds: f64, start: Instant) {
        // 10 samples per second
        let steps = (seconds * 10.0) as u32;
        for i in 0..steps {
            let t = start + Duration::from_millis(u64::from(i) * 100);
            controller.record(fps, t);
        }
    }

    #[test]
    fn test_target_derivation() {
        assert_eq!(AdaptiveScaleController::new(30.0).target_fps(), 14.0);
        assert_eq!(AdaptiveScaleController::new(15.0).target_fps(), 14.0);
        assert_eq!(AdaptiveScaleController::new(10.0).target_fps(), 9.0);
        // Floor at 5
        assert_eq!(AdaptiveScaleController::new(3.0).target_fps(), 5.0);
    }

    #[test]
    fn test_constant_target_fps_never_changes_scale() {
        let mut controller = AdaptiveScaleController::new(15.0);
        let initial = controller.scale();
        let start = Instant::now();

        feed(&mut controller, controller.target_fps(), 8.0, start);
        assert!((controller.scale() - initial).abs() < 0.0005);
    }

    #[test]
    fn test_slow_fps_shrinks_scale() {
        let mut controller = AdaptiveScaleController::new(30.0);
        let start = Instant::now();

        // Well below the 14 fps target for over five seconds
        feed(&mut controller, 6.0, 12.0, start);
        assert!(controller.scale() < 1.0);
    }

    #[test]
    fn test_deadband_blocks_small_gaps() {
        let mut controller = AdaptiveScaleController::new(30.0);
        let start = Instant::now();

        // 1.5 fps below target stays inside the 2 fps deadband
        feed(&mut controller, controller.target_fps() - 1.5, 12.0, start);
        assert_eq!(controller.scale(), 1.0);
    }

    #[test]
    fn test_adjustments_are_rate_limited() {
        let mut controller = AdaptiveScaleController::new(30.0);
        let start = Instant::now();

        // 20 seconds of very low fps: at most one adjustment per 5 seconds,
        // and the first window anchors without adjusting
        feed(&mut controller, 5.0, 20.0, start);
        let shrunk = 1.0 - controller.scale();
        assert!(shrunk > 0.0);
        assert!(shrunk <= 4.0 * 0.002 + 1e-9, "shrunk too fast: {shrunk}");
    }

    #[test]
    fn test_scale_clamped_at_floor() {
        let mut controller = AdaptiveScaleController::new(30.0);
        controller.scale = 0.4;
        let start = Instant::now();

        feed(&mut controller, 2.0, 30.0, start);
        assert!(controller.scale() >= 0.4);
    }

    #[test]
    fn test_history_halved_after_adjustment() {
        let mut controller = AdaptiveScaleController::new(30.0);
        let start = Instant::now();
        // The last sample lands exactly at the five-second mark
        feed(&mut controller, 5.0, 6.0, start);

        assert!(controller.scale() < 1.0);
        assert!(controller.history.len() <= FPS_WINDOW / 2);
    }

    #[test]
    fn test_non_finite_fps_ignored() {
        let mut controller = AdaptiveScaleController::new(30.0);
        let now = Instant::now();
        controller.record(f64::NAN, now);
        controller.record(f64::INFINITY, now);
        controller.record(-5.0, now);
        assert!(controller.average_fps().is_none());
    }
}
