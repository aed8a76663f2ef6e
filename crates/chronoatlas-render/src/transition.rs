//! Eased color transitions for solid paint properties.

use chronoatlas_core::shapes::SerializableColor;
use std::time::Duration;

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;

/// Cubic ease-in-out on `0..=1`.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// A color moving from one value to another over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTransition {
    pub from: SerializableColor,
    pub to: SerializableColor,
    start: Instant,
    duration: Duration,
}

impl ColorTransition {
    pub fn new(from: SerializableColor, to: SerializableColor, start: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            start,
            duration,
        }
    }

    /// Linear progress in `0..=1`.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.checked_duration_since(self.start).unwrap_or_default();
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    /// Color at `now`.
    pub fn sample(&self, now: Instant) -> SerializableColor {
        let t = self.progress(now);
        if t >= 1.0 {
            self.to
        } else {
            self.from.lerp(self.to, ease_in_out_cubic(t))
        }
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_endpoints() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-12);
        assert!(ease_in_out_cubic(0.25) < 0.25);
        assert!(ease_in_out_cubic(0.75) > 0.75);
    }

    #[test]
    fn test_transition_samples() {
        let start = Instant::now();
        let black = SerializableColor::rgb(0, 0, 0);
        let white = SerializableColor::rgb(255, 255, 255);
        let tr = ColorTransition::new(black, white, start, Duration::from_millis(300));
        assert_eq!(tr.sample(start), black);
        let mid = tr.sample(start + Duration::from_millis(150));
        assert_eq!(mid, SerializableColor::rgb(128, 128, 128));
        assert!(!tr.is_finished(start + Duration::from_millis(150)));
        assert_eq!(tr.sample(start + Duration::from_millis(300)), white);
        assert!(tr.is_finished(start + Duration::from_millis(400)));
    }

    #[test]
    fn test_zero_duration_is_immediate() {
        let start = Instant::now();
        let tr = ColorTransition::new(
            SerializableColor::rgb(0, 0, 0),
            SerializableColor::rgb(9, 9, 9),
            start,
            Duration::ZERO,
        );
        assert_eq!(tr.sample(start), SerializableColor::rgb(9, 9, 9));
    }
}
