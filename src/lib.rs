//! Progression economy engine for an incremental typing game.
//!
//! The playable loop: typing feeds a resource economy (currency,
//! followers, impressions) that also grows passively through purchased
//! bots, with three randomized reward mechanics layered on top — a
//! gacha-style trade, per-keystroke critical hits, and viral posts.
//!
//! Rendering, audio, input capture and storage are collaborators; this
//! crate is the embedded core they drive. See [`engine::ProgressionEngine`]
//! for the public surface.

pub mod engine;
pub mod time;

pub use engine::calc::DerivedRates;
pub use engine::error::{LoadError, PurchaseError};
pub use engine::state::{
    BoostKind, BotKind, Mechanic, PrestigePreserve, RewardEvent, UpgradeEffect,
};
pub use engine::store::{ChangeEvent, ChangeSource, ResourceField, Resources};
pub use engine::{BotReceipt, PostOutcome, ProgressionEngine, TradeOutcome, TypedOutcome};
pub use time::GameClock;
