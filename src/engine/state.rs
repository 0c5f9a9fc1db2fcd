//! Engine state definitions: bots, upgrades, boosts, reward journal.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::calc::DerivedRates;
use super::reward::RollState;
use super::store::{ResourceStore, Resources};

/// Kinds of bots (automatons that produce currency passively).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotKind {
    ReplyGuy,
    ContentFarm,
    MemeFactory,
    AiGhostwriter,
    BotNet,
}

impl BotKind {
    /// All bot kinds in display order.
    pub fn all() -> &'static [BotKind] {
        &[
            BotKind::ReplyGuy,
            BotKind::ContentFarm,
            BotKind::MemeFactory,
            BotKind::AiGhostwriter,
            BotKind::BotNet,
        ]
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            BotKind::ReplyGuy => "Reply Guy",
            BotKind::ContentFarm => "Content Farm",
            BotKind::MemeFactory => "Meme Factory",
            BotKind::AiGhostwriter => "AI Ghostwriter",
            BotKind::BotNet => "Bot Net",
        }
    }

    /// Stable identifier for collaborators that address bots by string.
    pub fn id(&self) -> &'static str {
        match self {
            BotKind::ReplyGuy => "reply_guy",
            BotKind::ContentFarm => "content_farm",
            BotKind::MemeFactory => "meme_factory",
            BotKind::AiGhostwriter => "ai_ghostwriter",
            BotKind::BotNet => "bot_net",
        }
    }

    pub fn from_id(id: &str) -> Option<BotKind> {
        BotKind::all().iter().copied().find(|k| k.id() == id)
    }

    /// Base cost to buy the first one.
    pub fn base_cost(&self) -> f64 {
        match self {
            BotKind::ReplyGuy => 15.0,
            BotKind::ContentFarm => 100.0,
            BotKind::MemeFactory => 1_100.0,
            BotKind::AiGhostwriter => 12_000.0,
            BotKind::BotNet => 130_000.0,
        }
    }

    /// Base currency per second per unit (before triangular scaling).
    pub fn base_rate(&self) -> f64 {
        match self {
            BotKind::ReplyGuy => 1.0,
            BotKind::ContentFarm => 8.0,
            BotKind::MemeFactory => 47.0,
            BotKind::AiGhostwriter => 260.0,
            BotKind::BotNet => 1_400.0,
        }
    }

    /// Lifetime impressions required before this bot can be bought.
    pub fn unlock_threshold(&self) -> f64 {
        match self {
            BotKind::ReplyGuy => 0.0,
            BotKind::ContentFarm => 500.0,
            BotKind::MemeFactory => 5_000.0,
            BotKind::AiGhostwriter => 50_000.0,
            BotKind::BotNet => 500_000.0,
        }
    }
}

/// Cost growth factor per owned unit, shared by every bot kind.
pub const BOT_COST_GROWTH: f64 = 1.15;

/// One owned bot type.
#[derive(Clone, Debug, PartialEq)]
pub struct BotSlot {
    pub kind: BotKind,
    pub count: u32,
}

impl BotSlot {
    pub fn new(kind: BotKind) -> Self {
        Self { kind, count: 0 }
    }

    /// Current cost to buy the next one.
    pub fn cost(&self) -> f64 {
        self.kind.base_cost() * BOT_COST_GROWTH.powi(self.count as i32)
    }

    /// Triangular unit count: the nth unit contributes n times the base
    /// rate, so owning n units contributes n*(n+1)/2 units in total.
    pub fn triangular_units(&self) -> f64 {
        let n = self.count as f64;
        n * (n + 1.0) / 2.0
    }
}

/// What an upgrade does, matched exhaustively by the production
/// calculator. Effects are data, not callbacks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpgradeEffect {
    /// Multiply total production by (1 + pct) per level.
    FlatProduction { pct: f64 },
    /// Multiply one bot kind's contribution by (1 + pct) per level,
    /// applied before contributions are summed.
    BotBoost { target: BotKind, pct: f64 },
    /// Multiply per-action rewards by (1 + pct) per level.
    ActionReward { pct: f64 },
    /// Add a flat amount to the crit trigger chance per level.
    CritChance { add: f64 },
    /// Multiply followers gained per post by (1 + pct) per level.
    FollowerDraw { pct: f64 },
}

/// Static upgrade definition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpgradeDef {
    pub id: &'static str,
    pub name: &'static str,
    pub base_cost: f64,
    /// Cost multiplier per level already bought.
    pub cost_growth: f64,
    /// 1 for one-shot upgrades.
    pub max_level: u32,
    pub effect: UpgradeEffect,
    /// Lifetime impressions required before this upgrade can be bought.
    pub unlock_threshold: f64,
}

/// An upgrade plus how many levels of it are owned.
#[derive(Clone, Debug, PartialEq)]
pub struct UpgradeSlot {
    pub def: UpgradeDef,
    pub level: u32,
}

impl UpgradeSlot {
    pub fn new(def: UpgradeDef) -> Self {
        Self { def, level: 0 }
    }

    pub fn is_maxed(&self) -> bool {
        self.level >= self.def.max_level
    }

    /// Cost of the next level.
    pub fn next_cost(&self) -> f64 {
        self.def.base_cost * self.def.cost_growth.powi(self.level as i32)
    }
}

/// The upgrade catalog. Order is stable; saves index into it.
pub fn create_upgrades() -> Vec<UpgradeSlot> {
    let defs = [
        UpgradeDef {
            id: "ergonomic_keyboard",
            name: "Ergonomic Keyboard",
            base_cost: 100.0,
            cost_growth: 4.0,
            max_level: 5,
            effect: UpgradeEffect::ActionReward { pct: 0.25 },
            unlock_threshold: 0.0,
        },
        UpgradeDef {
            id: "caffeine_drip",
            name: "Caffeine Drip",
            base_cost: 250.0,
            cost_growth: 5.0,
            max_level: 4,
            effect: UpgradeEffect::FlatProduction { pct: 0.25 },
            unlock_threshold: 0.0,
        },
        UpgradeDef {
            id: "reply_guy_scripts",
            name: "Reply Guy Scripts",
            base_cost: 500.0,
            cost_growth: 1.0,
            max_level: 1,
            effect: UpgradeEffect::BotBoost {
                target: BotKind::ReplyGuy,
                pct: 1.0,
            },
            unlock_threshold: 500.0,
        },
        UpgradeDef {
            id: "content_farm_overtime",
            name: "Content Farm Overtime",
            base_cost: 5_000.0,
            cost_growth: 1.0,
            max_level: 1,
            effect: UpgradeEffect::BotBoost {
                target: BotKind::ContentFarm,
                pct: 1.0,
            },
            unlock_threshold: 2_500.0,
        },
        UpgradeDef {
            id: "clickbait_thumbnails",
            name: "Clickbait Thumbnails",
            base_cost: 1_500.0,
            cost_growth: 6.0,
            max_level: 3,
            effect: UpgradeEffect::FollowerDraw { pct: 0.5 },
            unlock_threshold: 1_000.0,
        },
        UpgradeDef {
            id: "mechanical_switches",
            name: "Mechanical Switches",
            base_cost: 2_000.0,
            cost_growth: 8.0,
            max_level: 3,
            effect: UpgradeEffect::CritChance { add: 0.01 },
            unlock_threshold: 1_000.0,
        },
        UpgradeDef {
            id: "meme_factory_night_shift",
            name: "Meme Factory Night Shift",
            base_cost: 60_000.0,
            cost_growth: 1.0,
            max_level: 1,
            effect: UpgradeEffect::BotBoost {
                target: BotKind::MemeFactory,
                pct: 1.0,
            },
            unlock_threshold: 25_000.0,
        },
        UpgradeDef {
            id: "algorithm_whisperer",
            name: "Algorithm Whisperer",
            base_cost: 250_000.0,
            cost_growth: 10.0,
            max_level: 2,
            effect: UpgradeEffect::FlatProduction { pct: 0.5 },
            unlock_threshold: 100_000.0,
        },
    ];
    defs.into_iter().map(UpgradeSlot::new).collect()
}

/// What a time-boxed boost affects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoostKind {
    /// Multiplies total production while active.
    Production,
    /// Adds to the crit trigger chance while active.
    CritFrenzy,
}

/// A bonus active until a point on the engine's elapsed-seconds clock.
/// Expiry is checked by comparison at read time; there is no timer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveBoost {
    pub kind: BoostKind,
    /// Multiplier for `Production`, additive chance for `CritFrenzy`.
    pub magnitude: f64,
    pub expires_at: f64,
}

impl ActiveBoost {
    pub fn is_active(&self, now: f64) -> bool {
        now < self.expires_at
    }
}

/// Which reward mechanic emitted an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mechanic {
    Trade,
    Crit,
    Viral,
}

/// Structured reward event for the presentation layer. Carries everything
/// needed to animate a payout without recomputing game logic.
#[derive(Clone, Debug, PartialEq)]
pub struct RewardEvent {
    pub mechanic: Mechanic,
    pub tier: usize,
    pub label: &'static str,
    pub multiplier: f64,
    pub payout: f64,
}

/// Journal entries kept before the oldest is dropped.
pub const MAX_EVENTS: usize = 50;

/// Fields preserved across a prestige reset, chosen by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrestigePreserve {
    pub followers: bool,
    pub upgrades: bool,
    pub boosts: bool,
}

/// Full mutable state of one engine instance. Owned, never global: two
/// instances cannot interfere with each other.
pub struct EngineState {
    pub store: ResourceStore,
    pub bots: Vec<BotSlot>,
    pub upgrades: Vec<UpgradeSlot>,
    pub trade_roll: RollState,
    pub crit_roll: RollState,
    pub viral_roll: RollState,
    /// Current consecutive correct keystrokes.
    pub combo: u32,
    pub boosts: Vec<ActiveBoost>,
    /// Game-time seconds since this run started.
    pub elapsed: f64,
    /// Fractional production not yet credited as whole currency units.
    pub payout_carry: f64,
    pub prestige_count: u32,
    /// Permanent production multiplier earned by prestiging. 1.0 = none.
    pub prestige_multiplier: f64,
    /// Best production rate ever observed (statistics).
    pub best_rate: f64,
    pub rates: DerivedRates,
    events: Vec<RewardEvent>,
    pub rng_seed: u64,
    pub rng: SmallRng,
}

impl EngineState {
    pub fn new(seed: u64) -> Self {
        Self {
            store: ResourceStore::new(Resources::default()),
            bots: BotKind::all().iter().map(|k| BotSlot::new(*k)).collect(),
            upgrades: create_upgrades(),
            trade_roll: RollState::default(),
            crit_roll: RollState::default(),
            viral_roll: RollState::default(),
            combo: 0,
            boosts: Vec::new(),
            elapsed: 0.0,
            payout_carry: 0.0,
            prestige_count: 0,
            prestige_multiplier: 1.0,
            best_rate: 0.0,
            rates: DerivedRates::default(),
            events: Vec::new(),
            rng_seed: seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn bot_slot(&self, kind: BotKind) -> &BotSlot {
        // Slots are created for every kind at construction.
        self.bots
            .iter()
            .find(|s| s.kind == kind)
            .expect("slot exists for every BotKind")
    }

    pub fn bot_slot_mut(&mut self, kind: BotKind) -> &mut BotSlot {
        self.bots
            .iter_mut()
            .find(|s| s.kind == kind)
            .expect("slot exists for every BotKind")
    }

    pub fn push_event(&mut self, event: RewardEvent) {
        self.events.push(event);
        if self.events.len() > MAX_EVENTS {
            self.events.remove(0);
        }
    }

    /// Hand pending reward events to the caller and clear the journal.
    pub fn drain_events(&mut self) -> Vec<RewardEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[RewardEvent] {
        &self.events
    }
}
