//! Caller-facing failure results. Nothing here is an exceptional
//! condition: can't-afford and unknown-id are normal adverse outcomes the
//! UI renders as a message, and a slightly stale save is repaired rather
//! than rejected.

use thiserror::Error;

/// Why a purchase or trade was refused. The engine state is unchanged
/// whenever one of these comes back.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PurchaseError {
    #[error("insufficient funds: need {needed:.0}, have {available:.0}")]
    InsufficientFunds { needed: f64, available: f64 },
    #[error("unknown bot id `{0}`")]
    UnknownBot(String),
    #[error("unknown upgrade id `{0}`")]
    UnknownUpgrade(String),
    #[error("locked until {threshold:.0} lifetime impressions")]
    Locked { threshold: f64 },
    #[error("already at max level {0}")]
    MaxLevel(u32),
}

/// Why a persisted snapshot could not be loaded at all. Missing fields and
/// out-of-range values are not errors — they are default-filled or
/// repaired, because losing a save is worse than a partially-defaulted
/// one.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unreadable save data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("save version {found} is older than the minimum supported {min}")]
    Incompatible { found: u32, min: u32 },
}
