//! Per-frame animation state
//!
//! Animations advance by the wall-clock time elapsed between two render passes, measured on the
//! monotonic clock by a [`FrameClock`]. Nothing here is timer driven: the render loop samples the
//! clock at the start of each pass, which itself only happens when the compositor asked for a
//! new frame.

use std::time::{Duration, Instant};

/// Measures the monotonic time between two render passes
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    /// Start the clock now
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Start the clock at a given instant
    pub fn starting_at(start: Instant) -> Self {
        FrameClock { last: start }
    }

    /// Sample the clock, returning the time elapsed since the previous sample
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    /// Sample the clock at `now`, returning the time elapsed since the previous sample
    ///
    /// An instant older than the previous sample yields a zero duration.
    pub fn tick_at(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;
        elapsed
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds needed to move all of one channel into the next
const CROSSFADE_MS: f32 = 2000.0;

/// A color cycling through red, green and blue
///
/// Two channels are active at any time: the decreasing one hands its intensity over to the
/// next one at a rate of `Δt / 2000ms`. Once the decreasing channel would drop below zero the
/// pair is clamped (the next channel saturated, the decreasing one zeroed) and the cycle moves
/// on to the following pair.
#[derive(Debug, Clone, PartialEq)]
pub struct HueCycle {
    color: [f32; 3],
    dec: usize,
}

impl HueCycle {
    /// Start at pure red, fading into green
    pub fn new() -> Self {
        HueCycle {
            color: [1.0, 0.0, 0.0],
            dec: 0,
        }
    }

    /// Advance the cycle by `elapsed`
    ///
    /// Only whole milliseconds are accounted for.
    pub fn advance(&mut self, elapsed: Duration) {
        let step = elapsed.as_millis() as f32 / CROSSFADE_MS;
        let inc = (self.dec + 1) % 3;
        self.color[inc] += step;
        self.color[self.dec] -= step;
        if self.color[self.dec] < 0.0 {
            self.color[inc] = 1.0;
            self.color[self.dec] = 0.0;
            self.dec = inc;
        }
    }

    /// Current color as `[r, g, b]` in `0.0..=1.0`
    pub fn rgb(&self) -> [f32; 3] {
        self.color
    }

    /// Index of the channel currently fading out
    pub fn fading_channel(&self) -> usize {
        self.dec
    }
}

impl Default for HueCycle {
    fn default() -> Self {
        Self::new()
    }
}

/// A rotation angle advancing at a constant angular speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    degrees: f32,
    degrees_per_second: f32,
}

impl Spin {
    /// A spin starting at zero, turning at `degrees_per_second`
    pub fn new(degrees_per_second: f32) -> Self {
        Spin {
            degrees: 0.0,
            degrees_per_second,
        }
    }

    /// Advance the angle by `elapsed`, wrapping into `0.0..360.0`
    pub fn advance(&mut self, elapsed: Duration) {
        self.degrees = (self.degrees + self.degrees_per_second * elapsed.as_secs_f32()).rem_euclid(360.0);
    }

    /// Current angle in degrees
    pub fn degrees(&self) -> f32 {
        self.degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn hue_starts_red() {
        let hue = HueCycle::new();
        assert_eq!(hue.rgb(), [1.0, 0.0, 0.0]);
        assert_eq!(hue.fading_channel(), 0);
    }

    #[test]
    fn hue_crossfades_linearly() {
        let mut hue = HueCycle::new();
        hue.advance(ms(1000));
        assert_eq!(hue.rgb(), [0.5, 0.5, 0.0]);
        assert_eq!(hue.fading_channel(), 0);
    }

    #[test]
    fn two_seconds_hand_over_one_full_channel() {
        let mut hue = HueCycle::new();
        for _ in 0..4 {
            hue.advance(ms(500));
        }
        assert_eq!(hue.rgb(), [0.0, 1.0, 0.0]);

        // the boundary itself is not a crossing, the next pass moves on to green -> blue
        hue.advance(ms(16));
        assert_eq!(hue.fading_channel(), 1);
        assert_eq!(hue.rgb(), [0.0, 1.0, 0.0]);

        hue.advance(ms(20));
        let [r, g, b] = hue.rgb();
        assert_eq!(r, 0.0);
        assert!((g - 0.99).abs() < 1e-6);
        assert!((b - 0.01).abs() < 1e-6);
    }

    #[test]
    fn overshoot_is_clamped() {
        let mut hue = HueCycle::new();
        hue.advance(ms(2500));
        assert_eq!(hue.rgb(), [0.0, 1.0, 0.0]);
        assert_eq!(hue.fading_channel(), 1);
        assert!(hue.rgb().iter().all(|c| *c >= 0.0));
    }

    #[test]
    fn hue_wraps_back_to_red() {
        let mut hue = HueCycle::new();
        for _ in 0..3 {
            hue.advance(ms(2001));
        }
        assert_eq!(hue.rgb(), [1.0, 0.0, 0.0]);
        assert_eq!(hue.fading_channel(), 0);
    }

    #[test]
    fn sub_millisecond_passes_do_not_move() {
        let mut hue = HueCycle::new();
        hue.advance(Duration::from_micros(900));
        assert_eq!(hue.rgb(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn clock_measures_between_samples() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        assert_eq!(clock.tick_at(start + ms(16)), ms(16));
        assert_eq!(clock.tick_at(start + ms(40)), ms(24));
        assert_eq!(clock.tick_at(start + ms(10)), Duration::ZERO);
    }

    #[test]
    fn spin_wraps() {
        let mut spin = Spin::new(90.0);
        spin.advance(Duration::from_secs(3));
        assert_eq!(spin.degrees(), 270.0);
        spin.advance(Duration::from_secs(2));
        assert_eq!(spin.degrees(), 90.0);
    }
}
