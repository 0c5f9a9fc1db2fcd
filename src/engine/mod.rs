//! Progression economy engine — the public surface other subsystems call.
//!
//! `ProgressionEngine` composes the resource store, the production
//! calculator and the three reward mechanics, and guarantees that derived
//! rates are refreshed exactly when an input changed. Everything is
//! synchronous: a call returns only after its mutations and notifications
//! have completed, and within one call the base-reward merge is always
//! applied and announced before any reward-roll bonus.

pub mod calc;
pub mod crit;
pub mod error;
pub mod reward;
pub mod save;
pub mod state;
pub mod store;
pub mod trade;
pub mod viral;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use calc::DerivedRates;
use error::PurchaseError;
use state::{
    ActiveBoost, BoostKind, BotKind, BotSlot, EngineState, Mechanic, PrestigePreserve,
    RewardEvent, UpgradeSlot,
};
use store::{
    ChangeEvent, ChangeSource, ResourceField, ResourcePatch, Resources, SubscriberResult,
    SubscriptionId,
};

/// Lifetime currency needed per prestige point.
pub const PRESTIGE_CURRENCY_PER_POINT: f64 = 1_000_000.0;
/// Permanent production bonus per prestige point.
pub const PRESTIGE_BONUS_PER_POINT: f64 = 0.01;
/// Suggested autosave cadence for the persistence collaborator.
pub const AUTOSAVE_INTERVAL_SECS: f64 = 30.0;

/// Result of one typed character.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypedOutcome {
    pub correct: bool,
    /// Base currency awarded for the keystroke itself.
    pub base_reward: f64,
    pub crit: Option<RewardEvent>,
}

/// Result of one completed post.
#[derive(Clone, Debug, PartialEq)]
pub struct PostOutcome {
    pub reward: f64,
    pub impressions: f64,
    pub followers: f64,
    pub viral: Option<RewardEvent>,
}

/// Result of one trade.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeOutcome {
    pub cost: f64,
    pub payout: f64,
    pub event: RewardEvent,
}

/// Result of a successful bot purchase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BotReceipt {
    pub kind: BotKind,
    pub cost: f64,
    pub owned: u32,
}

pub struct ProgressionEngine {
    state: EngineState,
}

impl Default for ProgressionEngine {
    fn default() -> Self {
        Self::new(42)
    }
}

impl ProgressionEngine {
    pub fn new(seed: u64) -> Self {
        let mut engine = Self {
            state: EngineState::new(seed),
        };
        engine.recalculate();
        engine
    }

    // ── Reads ───────────────────────────────────────────────

    /// Immutable copy of the resource values, for rendering and saving.
    pub fn snapshot(&self) -> Resources {
        self.state.store.get()
    }

    pub fn rates(&self) -> &DerivedRates {
        &self.state.rates
    }

    pub fn bots(&self) -> &[BotSlot] {
        &self.state.bots
    }

    pub fn upgrades(&self) -> &[UpgradeSlot] {
        &self.state.upgrades
    }

    pub fn combo(&self) -> u32 {
        self.state.combo
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.state.elapsed
    }

    pub fn prestige_count(&self) -> u32 {
        self.state.prestige_count
    }

    pub fn prestige_multiplier(&self) -> f64 {
        self.state.prestige_multiplier
    }

    /// Best production rate observed this run (statistics).
    pub fn best_rate(&self) -> f64 {
        self.state.best_rate
    }

    /// Pending reward events, oldest first; clears the journal.
    pub fn drain_events(&mut self) -> Vec<RewardEvent> {
        self.state.drain_events()
    }

    // ── Subscriptions ───────────────────────────────────────

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&ChangeEvent<'_>) -> SubscriberResult + 'static,
    ) -> SubscriptionId {
        self.state.store.subscribe(callback)
    }

    pub fn subscribe_to_field(
        &mut self,
        field: ResourceField,
        callback: impl FnMut(&ChangeEvent<'_>) -> SubscriberResult + 'static,
    ) -> SubscriptionId {
        self.state.store.subscribe_to_field(field, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.state.store.unsubscribe(id)
    }

    // ── Time ────────────────────────────────────────────────

    /// Advance passive production by `delta_seconds`. Batching is linear
    /// in the delta — a backgrounded tab catching up with one huge delta
    /// earns exactly as much as the same time in small deltas. Only whole
    /// currency units are credited; the fraction carries to the next tick.
    pub fn tick(&mut self, delta_seconds: f64) {
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return;
        }
        let s = &mut self.state;
        s.elapsed += delta_seconds;

        let produced = s.rates.production_per_sec * delta_seconds + s.payout_carry;
        let credit = produced.floor();
        s.payout_carry = produced - credit;
        if credit > 0.0 {
            let currency = s.store.get().currency + credit;
            s.store
                .merge(&ResourcePatch::currency(currency), ChangeSource::Tick, true);
        }

        let now = s.elapsed;
        s.boosts.retain(|b| b.is_active(now));
        self.recalculate();
    }

    // ── Actions ─────────────────────────────────────────────

    /// One keystroke. A correct character awards the base reward, extends
    /// the combo, then rolls for a crit; the crit bonus is merged and
    /// announced separately, after the base reward, under its own source
    /// tag. A miss just breaks the combo.
    pub fn record_typed_char(&mut self, correct: bool) -> TypedOutcome {
        if !correct {
            self.state.combo = 0;
            return TypedOutcome::default();
        }
        let s = &mut self.state;
        s.combo += 1;
        let base = s.rates.currency_per_keystroke;

        let res = s.store.get();
        s.store.merge(
            &ResourcePatch {
                currency: Some(res.currency + base),
                keystrokes_typed: Some(res.keystrokes_typed + 1),
                ..Default::default()
            },
            ChangeSource::Typing,
            true,
        );

        let now = s.elapsed;
        let frenzy = s
            .boosts
            .iter()
            .any(|b| b.kind == BoostKind::CritFrenzy && b.is_active(now));
        let combo = s.combo;
        let chance_bonus = s.rates.crit_chance_bonus;
        let rolled = crit::roll_crit(&mut s.crit_roll, combo, frenzy, chance_bonus, &mut s.rng);

        let crit_event = rolled.map(|out| {
            let payout = out.multiplier * base;
            let currency = s.store.get().currency + payout;
            s.store.merge(
                &ResourcePatch::currency(currency),
                ChangeSource::CritBonus,
                true,
            );
            let event = RewardEvent {
                mechanic: Mechanic::Crit,
                tier: out.tier,
                label: crit::CRIT_TIERS[out.tier].label,
                multiplier: out.multiplier,
                payout,
            };
            s.push_event(event.clone());
            event
        });

        TypedOutcome {
            correct: true,
            base_reward: base,
            crit: crit_event,
        }
    }

    /// One completed post. Awards currency, impressions and followers,
    /// then rolls for virality. A top-tier hit also starts a time-boxed
    /// production frenzy.
    pub fn complete_post(&mut self) -> PostOutcome {
        let s = &mut self.state;
        let reward = s.rates.currency_per_post;
        let impressions = s.rates.impressions_per_post;
        let followers = s.rates.followers_per_post;

        let res = s.store.get();
        s.store.merge(
            &ResourcePatch {
                currency: Some(res.currency + reward),
                impressions: Some(res.impressions + impressions),
                followers: Some(res.followers + followers),
                posts_completed: Some(res.posts_completed + 1),
                ..Default::default()
            },
            ChangeSource::Post,
            true,
        );

        let rolled = viral::roll_viral(&mut s.viral_roll, &mut s.rng);
        let viral_event = rolled.map(|out| {
            let base = (s.rates.production_per_sec * viral::VIRAL_REWARD_WINDOW_SECS)
                .max(calc::POST_REWARD_FLOOR);
            let payout = out.multiplier * base;
            let bonus_impressions = out.multiplier * s.rates.impressions_per_post;
            let res = s.store.get();
            s.store.merge(
                &ResourcePatch {
                    currency: Some(res.currency + payout),
                    impressions: Some(res.impressions + bonus_impressions),
                    ..Default::default()
                },
                ChangeSource::ViralBonus,
                true,
            );
            if out.tier == viral::VIRAL_TIERS.len() - 1 {
                s.boosts.push(ActiveBoost {
                    kind: BoostKind::Production,
                    magnitude: viral::VIRAL_FRENZY_MULTIPLIER,
                    expires_at: s.elapsed + viral::VIRAL_FRENZY_SECS,
                });
            }
            let event = RewardEvent {
                mechanic: Mechanic::Viral,
                tier: out.tier,
                label: viral::VIRAL_TIERS[out.tier].label,
                multiplier: out.multiplier,
                payout,
            };
            s.push_event(event.clone());
            event
        });

        // Followers moved, so the follower multiplier did too.
        self.recalculate();

        PostOutcome {
            reward,
            impressions,
            followers,
            viral: viral_event,
        }
    }

    /// Stake currency on a trade and roll the gacha table. The stake is
    /// deducted first; the payout, if any, arrives as a separate
    /// `TradePayout` merge.
    pub fn open_trade(&mut self) -> Result<TradeOutcome, PurchaseError> {
        let s = &mut self.state;
        let cost = trade::trade_cost(&s.rates);
        let res = s.store.get();
        if res.currency < cost {
            return Err(PurchaseError::InsufficientFunds {
                needed: cost,
                available: res.currency,
            });
        }
        s.store.merge(
            &ResourcePatch {
                currency: Some(res.currency - cost),
                trades_opened: Some(res.trades_opened + 1),
                ..Default::default()
            },
            ChangeSource::Purchase,
            true,
        );

        let out = trade::roll_trade(&mut s.trade_roll, &mut s.rng);
        let payout = out.multiplier * cost;
        if payout > 0.0 {
            let currency = s.store.get().currency + payout;
            s.store.merge(
                &ResourcePatch::currency(currency),
                ChangeSource::TradePayout,
                true,
            );
        }
        let event = RewardEvent {
            mechanic: Mechanic::Trade,
            tier: out.tier,
            label: trade::TRADE_TIERS[out.tier].label,
            multiplier: out.multiplier,
            payout,
        };
        s.push_event(event.clone());
        Ok(TradeOutcome {
            cost,
            payout,
            event,
        })
    }

    // ── Purchases ───────────────────────────────────────────

    pub fn purchase_bot(&mut self, kind: BotKind) -> Result<BotReceipt, PurchaseError> {
        let s = &mut self.state;
        let res = s.store.get();
        if res.lifetime_impressions < kind.unlock_threshold() {
            return Err(PurchaseError::Locked {
                threshold: kind.unlock_threshold(),
            });
        }
        let cost = s.bot_slot(kind).cost();
        if res.currency < cost {
            return Err(PurchaseError::InsufficientFunds {
                needed: cost,
                available: res.currency,
            });
        }
        s.store.merge(
            &ResourcePatch::currency(res.currency - cost),
            ChangeSource::Purchase,
            true,
        );
        let slot = s.bot_slot_mut(kind);
        slot.count += 1;
        let owned = slot.count;
        self.recalculate();
        tracing::debug!(bot = kind.id(), cost, owned, "bot purchased");
        Ok(BotReceipt { kind, cost, owned })
    }

    /// Purchase by string id, for collaborators that address bots by name.
    pub fn purchase_bot_by_id(&mut self, id: &str) -> Result<BotReceipt, PurchaseError> {
        let kind =
            BotKind::from_id(id).ok_or_else(|| PurchaseError::UnknownBot(id.to_string()))?;
        self.purchase_bot(kind)
    }

    pub fn purchase_upgrade(&mut self, id: &str) -> Result<(), PurchaseError> {
        let s = &mut self.state;
        let idx = s
            .upgrades
            .iter()
            .position(|u| u.def.id == id)
            .ok_or_else(|| PurchaseError::UnknownUpgrade(id.to_string()))?;
        let res = s.store.get();
        let slot = &s.upgrades[idx];
        if res.lifetime_impressions < slot.def.unlock_threshold {
            return Err(PurchaseError::Locked {
                threshold: slot.def.unlock_threshold,
            });
        }
        if slot.is_maxed() {
            return Err(PurchaseError::MaxLevel(slot.def.max_level));
        }
        let cost = slot.next_cost();
        if res.currency < cost {
            return Err(PurchaseError::InsufficientFunds {
                needed: cost,
                available: res.currency,
            });
        }
        s.store.merge(
            &ResourcePatch::currency(res.currency - cost),
            ChangeSource::Purchase,
            true,
        );
        s.upgrades[idx].level += 1;
        self.recalculate();
        tracing::debug!(upgrade = id, cost, "upgrade purchased");
        Ok(())
    }

    // ── Boosts ──────────────────────────────────────────────

    /// Start a time-boxed boost. Expiry is a timestamp checked at read
    /// time; nothing needs to cancel it.
    pub fn start_boost(&mut self, kind: BoostKind, magnitude: f64, duration_secs: f64) {
        if !magnitude.is_finite() || !duration_secs.is_finite() || duration_secs <= 0.0 {
            return;
        }
        let expires_at = self.state.elapsed + duration_secs;
        self.state.boosts.push(ActiveBoost {
            kind,
            magnitude,
            expires_at,
        });
        self.recalculate();
    }

    // ── Resets ──────────────────────────────────────────────

    /// Prestige: reset the run, keep lifetime statistics and whatever the
    /// caller's preservation set names, and bank a permanent production
    /// multiplier derived from lifetime currency. Returns the multiplier.
    pub fn prestige(&mut self, preserve: PrestigePreserve) -> f64 {
        let s = &mut self.state;
        let res = s.store.get();

        let points = (res.lifetime_currency / PRESTIGE_CURRENCY_PER_POINT)
            .max(0.0)
            .sqrt()
            .floor();
        s.prestige_multiplier = 1.0 + points * PRESTIGE_BONUS_PER_POINT;
        s.prestige_count += 1;

        let next = Resources {
            currency: 0.0,
            followers: if preserve.followers { res.followers } else { 0.0 },
            impressions: 0.0,
            ..res
        };
        s.store.replace(next, ChangeSource::Prestige, true);

        for slot in &mut s.bots {
            slot.count = 0;
        }
        if !preserve.upgrades {
            s.upgrades = state::create_upgrades();
        }
        if !preserve.boosts {
            s.boosts.clear();
        }
        s.trade_roll = Default::default();
        s.crit_roll = Default::default();
        s.viral_roll = Default::default();
        s.combo = 0;
        s.payout_carry = 0.0;
        let _ = s.drain_events();

        self.recalculate();
        tracing::debug!(
            count = self.state.prestige_count,
            multiplier = self.state.prestige_multiplier,
            "prestige reset"
        );
        self.state.prestige_multiplier
    }

    /// Full player-initiated reset. Subscribers stay attached.
    pub fn hard_reset(&mut self) {
        let s = &mut self.state;
        s.store.replace(Resources::default(), ChangeSource::System, true);
        s.bots = BotKind::all().iter().map(|k| BotSlot::new(*k)).collect();
        s.upgrades = state::create_upgrades();
        s.trade_roll = Default::default();
        s.crit_roll = Default::default();
        s.viral_roll = Default::default();
        s.combo = 0;
        s.boosts.clear();
        s.elapsed = 0.0;
        s.payout_carry = 0.0;
        s.prestige_count = 0;
        s.prestige_multiplier = 1.0;
        s.best_rate = 0.0;
        let _ = s.drain_events();
        s.rng = SmallRng::seed_from_u64(s.rng_seed);
        self.recalculate();
    }

    // ── Persistence ─────────────────────────────────────────

    pub fn save_to_json(&self) -> String {
        save::to_json(&self.state)
    }

    /// Load a snapshot into this engine, keeping subscribers attached.
    /// Older compatible versions are default-filled; see `save`.
    pub fn load_from_json(&mut self, data: &str) -> Result<(), error::LoadError> {
        save::load_into(&mut self.state, data)?;
        self.recalculate();
        Ok(())
    }

    pub fn from_json(data: &str) -> Result<Self, error::LoadError> {
        let mut engine = Self::default();
        engine.load_from_json(data)?;
        Ok(engine)
    }

    // ── Internals ───────────────────────────────────────────

    fn recalculate(&mut self) {
        let s = &mut self.state;
        s.rates = calc::recalculate(
            s.store.peek(),
            &s.bots,
            &s.upgrades,
            &s.boosts,
            s.prestige_multiplier,
            s.elapsed,
        );
        if s.rates.production_per_sec > s.best_rate {
            s.best_rate = s.rates.production_per_sec;
        }
    }
}
