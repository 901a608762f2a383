//! Smoothing of discrete network updates into continuous rendered motion.
//!
//! Every rendered entity carries a confirmed position, a target position,
//! and an interpolation progress in [0, 1]. A new target resets progress
//! to zero with the confirmed position snapped to wherever the entity was
//! rendered that instant, so motion never jumps. There is no extrapolation
//! past the last received target.

use shared::INTERP_RATE;

#[derive(Debug, Clone, Copy)]
pub struct Motion {
    confirmed: (f32, f32),
    target: (f32, f32),
    progress: f32,
    rate: f32,
}

impl Motion {
    pub fn new(x: i32, y: i32) -> Self {
        let pos = (x as f32, y as f32);
        Self {
            confirmed: pos,
            target: pos,
            progress: 1.0,
            rate: INTERP_RATE,
        }
    }

    #[cfg(test)]
    fn with_rate(x: i32, y: i32, rate: f32) -> Self {
        let mut motion = Self::new(x, y);
        motion.rate = rate;
        motion
    }

    /// Adopts a freshly received authoritative position as the new target.
    pub fn set_target(&mut self, x: i32, y: i32) {
        self.confirmed = self.position();
        self.target = (x as f32, y as f32);
        self.progress = 0.0;
    }

    /// Snaps straight to a position with no smoothing (room switches).
    pub fn snap(&mut self, x: i32, y: i32) {
        self.confirmed = (x as f32, y as f32);
        self.target = self.confirmed;
        self.progress = 1.0;
    }

    /// Advances progress by `dt` seconds at the fixed rate, clamped to 1.
    pub fn advance(&mut self, dt: f32) {
        self.progress = (self.progress + dt * self.rate).min(1.0);
    }

    /// The rendered position: linear interpolation from confirmed to
    /// target at the current progress.
    pub fn position(&self) -> (f32, f32) {
        (
            self.confirmed.0 + (self.target.0 - self.confirmed.0) * self.progress,
            self.confirmed.1 + (self.target.1 - self.confirmed.1) * self.progress,
        )
    }

    pub fn target(&self) -> (f32, f32) {
        self.target
    }

    pub fn settled(&self) -> bool {
        self.progress >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_new_target_resets_progress() {
        let mut motion = Motion::new(100, 100);
        assert!(motion.settled());

        motion.set_target(140, 100);
        assert!(!motion.settled());
        let (x, y) = motion.position();
        assert_approx_eq!(x, 100.0);
        assert_approx_eq!(y, 100.0);
    }

    #[test]
    fn test_large_dt_clamps_progress_and_lands_on_target() {
        // dt of 1 at rate 10 overshoots; progress clamps to 1 and the
        // rendered position equals the target exactly.
        let mut motion = Motion::with_rate(0, 0, 10.0);
        motion.set_target(140, 100);
        motion.advance(1.0);

        assert!(motion.settled());
        let (x, y) = motion.position();
        assert_eq!((x, y), (140.0, 100.0));
    }

    #[test]
    fn test_midway_interpolation_is_linear() {
        let mut motion = Motion::with_rate(100, 100, 10.0);
        motion.set_target(140, 100);
        motion.advance(0.05); // progress 0.5

        let (x, y) = motion.position();
        assert_approx_eq!(x, 120.0);
        assert_approx_eq!(y, 100.0);
    }

    #[test]
    fn test_no_extrapolation_past_target() {
        let mut motion = Motion::with_rate(100, 100, 10.0);
        motion.set_target(140, 100);
        motion.advance(5.0);
        motion.advance(5.0);

        let (x, _) = motion.position();
        assert_eq!(x, 140.0);
    }

    #[test]
    fn test_retarget_mid_flight_starts_from_rendered_position() {
        let mut motion = Motion::with_rate(0, 0, 10.0);
        motion.set_target(100, 0);
        motion.advance(0.05); // rendered at (50, 0)

        motion.set_target(0, 0);
        let (x, _) = motion.position();
        assert_approx_eq!(x, 50.0);

        motion.advance(1.0);
        let (x, _) = motion.position();
        assert_eq!(x, 0.0);
    }

    #[test]
    fn test_snap_skips_smoothing() {
        let mut motion = Motion::new(0, 0);
        motion.snap(300, 200);
        assert_eq!(motion.position(), (300.0, 200.0));
        assert!(motion.settled());
    }
}
