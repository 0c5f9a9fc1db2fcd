//! Trade mechanic — the gacha-style roll.
//!
//! The player stakes a cost, the roller picks one of nine tiers, and the
//! payout is the tier multiplier times the stake. All five roller rules
//! are active here.

use rand::Rng;

use super::calc::DerivedRates;
use super::reward::{
    roll_weighted, HardPity, LuckyRoll, RollConfig, RollOutcome, RollState, SoftPity,
    StreakBreaker, Tier,
};

pub const TRADE_TIERS: [Tier; 9] = [
    Tier { label: "Rugged", weight: 30.0, multiplier: 0.0 },
    Tier { label: "Dud", weight: 22.0, multiplier: 0.5 },
    Tier { label: "Break Even", weight: 16.0, multiplier: 1.0 },
    Tier { label: "Small Win", weight: 12.0, multiplier: 2.0 },
    Tier { label: "Solid Flip", weight: 9.0, multiplier: 5.0 },
    Tier { label: "Big Flip", weight: 6.0, multiplier: 10.0 },
    Tier { label: "Moon", weight: 3.0, multiplier: 25.0 },
    Tier { label: "Jackpot", weight: 1.5, multiplier: 100.0 },
    Tier { label: "Generational Wealth", weight: 0.5, multiplier: 500.0 },
];

/// Break-even or better counts as a win.
pub const TRADE_WIN_THRESHOLD: usize = 2;
/// Non-winning rolls before a forced win.
pub const TRADE_HARD_PITY: u32 = 5;
/// Consecutive total losses before the breaker steps in.
pub const TRADE_LOSS_BREAKER: u32 = 7;
/// The very first trade lands here: a solid early hook, not the jackpot.
pub const TRADE_FIRST_ROLL_TIER: usize = 4;

pub const TRADE_CONFIG: RollConfig = RollConfig {
    win_threshold: TRADE_WIN_THRESHOLD,
    first_roll_tier: Some(TRADE_FIRST_ROLL_TIER),
    breaker: Some(StreakBreaker {
        threshold: TRADE_LOSS_BREAKER,
        tiers: (2, 3),
    }),
    hard_pity: Some(HardPity {
        threshold: TRADE_HARD_PITY,
        min_tier: 3,
        max_tier: 5,
    }),
    lucky: Some(LuckyRoll {
        chance: 0.02,
        top_tiers: 3,
    }),
    soft_pity: Some(SoftPity {
        shift_per_roll: 0.06,
        max_shift: 0.5,
        top_tiers: 3,
    }),
};

/// A trade never costs less than this.
pub const TRADE_COST_FLOOR: f64 = 50.0;
/// Otherwise the stake is this many seconds of production.
pub const TRADE_COST_WINDOW_SECS: f64 = 25.0;

/// Stake for the next trade, scaled to the current economy.
pub fn trade_cost(rates: &DerivedRates) -> f64 {
    (rates.production_per_sec * TRADE_COST_WINDOW_SECS).max(TRADE_COST_FLOOR)
}

/// One trade roll. Pure in `(state, rng)`.
pub fn roll_trade(state: &mut RollState, rng: &mut impl Rng) -> RollOutcome {
    roll_weighted(&TRADE_CONFIG, &TRADE_TIERS, state, rng)
}
