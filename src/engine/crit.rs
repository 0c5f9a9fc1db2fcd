//! Critical-hit mechanic — per-correct-keystroke bonus rolls.
//!
//! Two stages: a trigger check whose chance grows with the current combo
//! and an active frenzy window, then a magnitude roll over three tiers.
//! The success streak decays fractionally on misses instead of resetting,
//! so escalation and de-escalation are both smooth.

use rand::Rng;

use super::reward::{weighted_index, RollOutcome, RollRule, RollState, Tier};

pub const CRIT_TIERS: [Tier; 3] = [
    Tier { label: "Crit", weight: 84.0, multiplier: 5.0 },
    Tier { label: "Mega Crit", weight: 13.0, multiplier: 15.0 },
    Tier { label: "Ultra Crit", weight: 3.0, multiplier: 50.0 },
];

pub const CRIT_BASE_CHANCE: f64 = 0.03;
/// Additional chance per combo point.
pub const CRIT_COMBO_BONUS: f64 = 0.001;
/// Combo points counted toward the chance bonus.
pub const CRIT_COMBO_CAP: u32 = 50;
/// Additional chance while a crit-frenzy boost is active.
pub const CRIT_FRENZY_BONUS: f64 = 0.10;
/// Trigger chance ceiling.
pub const CRIT_CHANCE_CAP: f64 = 0.8;
/// Eligible keystrokes before the first-crit guarantee fires.
pub const FIRST_CRIT_AFTER_KEYSTROKES: u64 = 50;
/// Extra payout multiplier per streak point.
pub const CRIT_STREAK_BONUS: f64 = 0.5;
/// Streak retained per non-crit keystroke.
pub const CRIT_STREAK_DECAY: f64 = 0.9;

/// Trigger chance for the next eligible keystroke.
pub fn crit_chance(combo: u32, frenzy_active: bool, upgrade_bonus: f64) -> f64 {
    let combo_bonus = combo.min(CRIT_COMBO_CAP) as f64 * CRIT_COMBO_BONUS;
    let frenzy = if frenzy_active { CRIT_FRENZY_BONUS } else { 0.0 };
    (CRIT_BASE_CHANCE + combo_bonus + frenzy + upgrade_bonus.max(0.0)).clamp(0.0, CRIT_CHANCE_CAP)
}

/// Roll for a crit on one eligible keystroke. `None` means no crit; the
/// streak decays. On a crit the outcome multiplier already includes the
/// streak bonus. Pure in `(state, inputs, rng)`.
pub fn roll_crit(
    state: &mut RollState,
    combo: u32,
    frenzy_active: bool,
    upgrade_bonus: f64,
    rng: &mut impl Rng,
) -> Option<RollOutcome> {
    state.total_rolls += 1;

    // Once per session: if nothing has crit naturally by the threshold,
    // force one. Any crit, natural or forced, consumes the guarantee.
    let forced = !state.guarantee_fired && state.total_rolls >= FIRST_CRIT_AFTER_KEYSTROKES;
    let chance = crit_chance(combo, frenzy_active, upgrade_bonus);
    let triggered = forced || rng.gen_bool(chance.clamp(0.0, 1.0));

    if !triggered {
        state.rolls_since_win += 1;
        state.streak = (state.streak * CRIT_STREAK_DECAY).max(0.0);
        return None;
    }

    state.guarantee_fired = true;
    state.rolls_since_win = 0;

    let weights: Vec<f64> = CRIT_TIERS.iter().map(|t| t.weight).collect();
    let tier = weighted_index(&weights, rng);
    let multiplier = CRIT_TIERS[tier].multiplier + CRIT_STREAK_BONUS * state.streak;
    state.streak += 1.0;

    Some(RollOutcome {
        tier,
        multiplier,
        rule: if forced {
            RollRule::FirstRoll
        } else {
            RollRule::Weighted
        },
    })
}
