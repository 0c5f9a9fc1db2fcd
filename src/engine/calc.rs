//! Derived production rates — pure recomputation, never persisted.
//!
//! Everything here is a function of the store snapshot, owned bots,
//! owned upgrades, active boosts and the prestige multiplier. Calling it
//! twice with the same inputs yields bit-identical output; no counter
//! advances as a side effect.

use super::state::{ActiveBoost, BoostKind, BotSlot, UpgradeEffect, UpgradeSlot};
use super::store::Resources;

/// Follower curve constant: production doubles at K^2 followers.
pub const FOLLOWER_CURVE_K: f64 = 250.0;
/// A completed post never rewards less than this much currency.
pub const POST_REWARD_FLOOR: f64 = 10.0;
/// A post's reward equals this many seconds of production, floored.
pub const POST_REWARD_WINDOW_SECS: f64 = 10.0;
/// A keystroke rewards 1/20 of a post, floored.
pub const KEYSTROKE_REWARD_DIVISOR: f64 = 20.0;
pub const KEYSTROKE_REWARD_FLOOR: f64 = 0.5;
/// Impressions gained per post, per unit of post reward.
pub const IMPRESSIONS_PER_REWARD: f64 = 25.0;
/// Followers gained per impression.
pub const FOLLOWER_CONVERT_RATE: f64 = 0.002;

/// Recomputed-on-demand rates. Reconstructible from persisted state at any
/// time; saving these would only invite drift.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DerivedRates {
    /// Passive currency per second, all multipliers applied.
    pub production_per_sec: f64,
    /// Currency for one completed post.
    pub currency_per_post: f64,
    /// Currency for one correct keystroke.
    pub currency_per_keystroke: f64,
    /// Impressions for one completed post.
    pub impressions_per_post: f64,
    /// Followers for one completed post.
    pub followers_per_post: f64,
    /// Follower multiplier x prestige multiplier.
    pub composite_multiplier: f64,
    /// Product of active production boosts. Applied last, never cached
    /// into anything persisted.
    pub event_multiplier: f64,
    /// Additive crit chance from upgrades.
    pub crit_chance_bonus: f64,
}

/// Recompute all derived rates.
///
/// Composition order is fixed: (1) per-bot tier boosts, (2) sum of bot
/// contributions, (3) flat production upgrades, (4) follower multiplier,
/// (5) prestige multiplier, (6) transient boosts. A missing or zero factor
/// contributes identity 1, never 0.
pub fn recalculate(
    resources: &Resources,
    bots: &[BotSlot],
    upgrades: &[UpgradeSlot],
    boosts: &[ActiveBoost],
    prestige_multiplier: f64,
    now: f64,
) -> DerivedRates {
    // (1)+(2): tier boosts apply per bot, before summing.
    let mut base = 0.0;
    for slot in bots {
        let tier_boost = upgrades
            .iter()
            .filter(|u| u.level > 0)
            .filter_map(|u| match u.def.effect {
                UpgradeEffect::BotBoost { target, pct } if target == slot.kind => {
                    Some(pct * u.level as f64)
                }
                _ => None,
            })
            .sum::<f64>();
        base += slot.kind.base_rate() * slot.triangular_units() * (1.0 + tier_boost);
    }

    // (3): flat percentage upgrades, multiplicative on the base rate.
    let mut rate = base;
    for u in upgrades.iter().filter(|u| u.level > 0) {
        if let UpgradeEffect::FlatProduction { pct } = u.def.effect {
            rate *= 1.0 + pct * u.level as f64;
        }
    }

    // (4): follower-derived multiplier on the total.
    let follower_mult = identity_or(1.0 + resources.followers.max(0.0).sqrt() / FOLLOWER_CURVE_K);

    // (5): permanent prestige multiplier.
    let prestige_mult = identity_or(prestige_multiplier);

    // (6): transient boosts last, so they never leak into cached rates.
    let event_mult = identity_or(
        boosts
            .iter()
            .filter(|b| b.kind == BoostKind::Production && b.is_active(now))
            .map(|b| b.magnitude)
            .product(),
    );

    let composite = follower_mult * prestige_mult;
    let production = (rate * composite * event_mult).max(0.0);

    // Per-action rewards scale with production; floors are re-evaluated
    // here on every call, not cached.
    let action_mult = upgrades
        .iter()
        .filter(|u| u.level > 0)
        .fold(1.0, |acc, u| match u.def.effect {
            UpgradeEffect::ActionReward { pct } => acc * (1.0 + pct * u.level as f64),
            _ => acc,
        });
    let currency_per_post =
        (production * POST_REWARD_WINDOW_SECS).max(POST_REWARD_FLOOR) * action_mult;
    let currency_per_keystroke =
        (currency_per_post / KEYSTROKE_REWARD_DIVISOR).max(KEYSTROKE_REWARD_FLOOR);

    let follower_draw = upgrades
        .iter()
        .filter(|u| u.level > 0)
        .fold(1.0, |acc, u| match u.def.effect {
            UpgradeEffect::FollowerDraw { pct } => acc * (1.0 + pct * u.level as f64),
            _ => acc,
        });
    let impressions_per_post = currency_per_post * IMPRESSIONS_PER_REWARD;
    let followers_per_post = impressions_per_post * FOLLOWER_CONVERT_RATE * follower_draw;

    let crit_chance_bonus = upgrades
        .iter()
        .filter(|u| u.level > 0)
        .filter_map(|u| match u.def.effect {
            UpgradeEffect::CritChance { add } => Some(add * u.level as f64),
            _ => None,
        })
        .sum();

    DerivedRates {
        production_per_sec: production,
        currency_per_post,
        currency_per_keystroke,
        impressions_per_post,
        followers_per_post,
        composite_multiplier: composite,
        event_multiplier: event_mult,
        crit_chance_bonus,
    }
}

/// Multiplicative factors default to identity when absent or broken, so a
/// missing input can never silently zero the whole economy.
fn identity_or(factor: f64) -> f64 {
    if factor.is_finite() && factor > 0.0 {
        factor
    } else {
        1.0
    }
}
