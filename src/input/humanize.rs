//! Randomised human timing
//!
//! Every wait and pixel nudge the input layer adds on top of a planned
//! trajectory comes from here, so the ranges live in one place.

use rand::Rng;

/// Button hold between press and release
const MIN_CLICK_HOLD_MS: u64 = 50;
const MAX_CLICK_HOLD_MS: u64 = 80;

/// Gap between typed characters
const MIN_TYPING_GAP_MS: u64 = 40;
const MAX_TYPING_GAP_MS: u64 = 120;

/// Largest post-click tremor in pixels
const MAX_JITTER_PX: i32 = 2;

/// Humanizer for generating realistic timing and positions
pub struct Humanizer {
    rng: rand::rngs::ThreadRng,
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Humanizer {
    pub fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// How long a mouse button stays down
    pub fn click_hold(&mut self) -> u64 {
        self.rng.gen_range(MIN_CLICK_HOLD_MS..=MAX_CLICK_HOLD_MS)
    }

    /// Pause between two typed characters
    pub fn typing_gap(&mut self) -> u64 {
        self.rng.gen_range(MIN_TYPING_GAP_MS..=MAX_TYPING_GAP_MS)
    }

    /// Uniform value in `low..=high`, tolerating swapped bounds
    pub fn between(&mut self, low: u64, high: u64) -> u64 {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        self.rng.gen_range(low..=high)
    }

    /// Uniform float in `low..=high`
    pub fn between_f64(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..=high)
    }

    /// Uniform integer in `low..high`
    pub fn between_i32(&mut self, low: i32, high: i32) -> i32 {
        self.rng.gen_range(low..high)
    }

    /// Random ±1
    pub fn sign(&mut self) -> i32 {
        if self.rng.gen_bool(0.5) {
            1
        } else {
            -1
        }
    }

    /// True with probability `p`
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Post-click tremor; half the time there is none
    pub fn micro_jitter(&mut self) -> Option<(i32, i32)> {
        if !self.chance(0.5) {
            return None;
        }
        let dx = self.rng.gen_range(-MAX_JITTER_PX..=MAX_JITTER_PX);
        let dy = self.rng.gen_range(-MAX_JITTER_PX..=MAX_JITTER_PX);
        Some((dx, dy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_hold_range() {
        let mut humanizer = Humanizer::new();
        for _ in 0..200 {
            let hold = humanizer.click_hold();
            assert!((MIN_CLICK_HOLD_MS..=MAX_CLICK_HOLD_MS).contains(&hold));
        }
    }

    #[test]
    fn test_between_swapped_bounds() {
        let mut humanizer = Humanizer::new();
        for _ in 0..50 {
            let value = humanizer.between(300, 100);
            assert!((100..=300).contains(&value));
        }
        assert_eq!(humanizer.between(7, 7), 7);
    }

    #[test]
    fn test_micro_jitter_bounded() {
        let mut humanizer = Humanizer::new();
        let mut moved = 0;
        for _ in 0..1000 {
            if let Some((dx, dy)) = humanizer.micro_jitter() {
                moved += 1;
                assert!(dx.abs() <= MAX_JITTER_PX && dy.abs() <= MAX_JITTER_PX);
            }
        }
        // Roughly half of the calls should jitter
        assert!((300..700).contains(&moved));
    }
}
