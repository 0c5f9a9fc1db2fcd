//! Fixed-timestep clock using an accumulator pattern.
//!
//! Drivers usually have only wall-clock timestamps at a variable frame
//! rate. `GameClock` converts them into a whole number of fixed ticks and
//! reports the matching seconds to feed `ProgressionEngine::tick`, so the
//! engine sees the same cadence regardless of frame rate.

/// Longest delta accepted from one frame, in seconds. Anything larger
/// (a backgrounded tab, a suspended laptop) is clamped so a single frame
/// cannot trigger a catch-up spiral; the engine's own tick batching stays
/// linear either way.
pub const MAX_FRAME_DELTA_SECS: f64 = 0.5;

pub struct GameClock {
    secs_per_tick: f64,
    /// Accumulated seconds not yet consumed as ticks.
    accumulator: f64,
    /// Total elapsed ticks since creation.
    pub total_ticks: u64,
    /// Timestamp of the last update in seconds, None before the first frame.
    last_timestamp: Option<f64>,
}

impl GameClock {
    /// `ticks_per_sec`: how many engine ticks per real-time second.
    pub fn new(ticks_per_sec: u32) -> Self {
        Self {
            secs_per_tick: 1.0 / ticks_per_sec.max(1) as f64,
            accumulator: 0.0,
            total_ticks: 0,
            last_timestamp: None,
        }
    }

    pub fn secs_per_tick(&self) -> f64 {
        self.secs_per_tick
    }

    /// Feed a wall-clock timestamp in seconds. Returns the number of whole
    /// ticks to process this frame; multiply by [`Self::secs_per_tick`]
    /// for the engine delta.
    pub fn update(&mut self, now_secs: f64) -> u32 {
        let delta = match self.last_timestamp {
            Some(prev) => (now_secs - prev).clamp(0.0, MAX_FRAME_DELTA_SECS),
            None => 0.0,
        };
        self.last_timestamp = Some(now_secs);

        self.accumulator += delta;
        let ticks = (self.accumulator / self.secs_per_tick) as u32;
        self.accumulator -= ticks as f64 * self.secs_per_tick;
        self.total_ticks += ticks as u64;
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_returns_zero_ticks() {
        let mut clock = GameClock::new(10);
        assert_eq!(clock.update(0.0), 0);
    }

    #[test]
    fn one_tick_per_interval() {
        let mut clock = GameClock::new(10); // 0.1s per tick
        clock.update(0.0);
        assert_eq!(clock.update(0.1), 1);
        assert_eq!(clock.total_ticks, 1);
    }

    #[test]
    fn multiple_ticks_accumulated() {
        let mut clock = GameClock::new(10);
        clock.update(0.0);
        assert_eq!(clock.update(0.35), 3); // 3 ticks + 0.05s remainder
    }

    #[test]
    fn remainder_carried_over() {
        let mut clock = GameClock::new(10);
        clock.update(0.0);
        clock.update(0.15); // 1 tick, 0.05s remainder
        assert_eq!(clock.total_ticks, 1);
        assert_eq!(clock.update(0.20), 1); // 0.05s + 0.05s = 1 tick
        assert_eq!(clock.total_ticks, 2);
    }

    #[test]
    fn large_delta_is_clamped() {
        let mut clock = GameClock::new(10);
        clock.update(0.0);
        // 10 seconds away (tab backgrounded) -> clamped to 0.5s = 5 ticks.
        assert_eq!(clock.update(10.0), 5);
    }

    #[test]
    fn backwards_timestamp_yields_no_ticks() {
        let mut clock = GameClock::new(10);
        clock.update(5.0);
        assert_eq!(clock.update(3.0), 0);
    }

    #[test]
    fn steady_sixty_fps_hits_tick_rate() {
        let mut clock = GameClock::new(10);
        clock.update(0.0);
        let mut total = 0u32;
        for i in 1..=60 {
            total += clock.update(i as f64 * (1.0 / 60.0));
        }
        assert!((9..=11).contains(&total), "expected ~10 ticks, got {total}");
    }
}
