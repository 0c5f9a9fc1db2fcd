//! Viral mechanic — per-completed-post bonus rolls.
//!
//! Unlike the trade roller, each tier carries an independent base chance
//! and the best tier is checked first against a cumulative, pity-boosted
//! probability. Pity grows linearly with posts since the last viral hit
//! and is scaled down for the higher tiers so they stay rare.

use rand::Rng;

use super::reward::{RollOutcome, RollRule, RollState};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViralTier {
    pub label: &'static str,
    pub base_chance: f64,
    /// How strongly pity applies to this tier.
    pub pity_scale: f64,
    pub multiplier: f64,
}

/// Ordered worst to best, like every tier table.
pub const VIRAL_TIERS: [ViralTier; 4] = [
    ViralTier { label: "Mini Viral", base_chance: 0.08, pity_scale: 1.0, multiplier: 3.0 },
    ViralTier { label: "Trending", base_chance: 0.03, pity_scale: 0.5, multiplier: 10.0 },
    ViralTier { label: "Blowup", base_chance: 0.01, pity_scale: 0.25, multiplier: 40.0 },
    ViralTier { label: "Main Character", base_chance: 0.002, pity_scale: 0.1, multiplier: 150.0 },
];

/// Pity added per post since the last hit, before tier scaling.
pub const VIRAL_PITY_PER_POST: f64 = 0.002;
/// A single tier's boosted chance never exceeds this.
pub const VIRAL_CHANCE_CAP: f64 = 0.35;
/// Payout base: this many seconds of production (post floor applies).
pub const VIRAL_REWARD_WINDOW_SECS: f64 = 30.0;
/// A top-tier hit starts a production boost of this strength/length.
pub const VIRAL_FRENZY_MULTIPLIER: f64 = 2.0;
pub const VIRAL_FRENZY_SECS: f64 = 30.0;

/// Pity-boosted chance for one tier.
pub fn viral_chance(tier: usize, posts_since_win: u32) -> f64 {
    let t = &VIRAL_TIERS[tier];
    let pity = posts_since_win as f64 * VIRAL_PITY_PER_POST * t.pity_scale;
    (t.base_chance + pity).min(VIRAL_CHANCE_CAP)
}

/// Roll once per completed post. `None` means the post stayed quiet and
/// pity deepens. Pure in `(state, rng)`.
pub fn roll_viral(state: &mut RollState, rng: &mut impl Rng) -> Option<RollOutcome> {
    state.total_rolls += 1;

    let u: f64 = rng.gen();
    let mut cumulative = 0.0;
    for tier in (0..VIRAL_TIERS.len()).rev() {
        cumulative += viral_chance(tier, state.rolls_since_win);
        if u < cumulative {
            state.rolls_since_win = 0;
            state.loss_streak = 0;
            return Some(RollOutcome {
                tier,
                multiplier: VIRAL_TIERS[tier].multiplier,
                rule: RollRule::Weighted,
            });
        }
    }

    state.rolls_since_win += 1;
    None
}

/// Probability that the next roll hits at least one tier.
pub fn total_viral_chance(posts_since_win: u32) -> f64 {
    (0..VIRAL_TIERS.len())
        .map(|t| viral_chance(t, posts_since_win))
        .sum::<f64>()
        .min(1.0)
}
