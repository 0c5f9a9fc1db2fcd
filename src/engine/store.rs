//! Canonical resource values and change notification.
//!
//! The store knows nothing about game rules: it holds numbers, keeps the
//! lifetime mirrors monotonic, and tells subscribers what changed. All
//! mutation goes through [`ResourceStore::merge`] or
//! [`ResourceStore::replace`]; nothing else may touch a lifetime field.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every resource the engine tracks. `lifetime_*` fields mirror their
/// current counterpart and only ever grow: the store advances them by the
/// exact positive delta applied to the current value, never the caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub currency: f64,
    pub lifetime_currency: f64,
    pub followers: f64,
    pub lifetime_followers: f64,
    pub impressions: f64,
    pub lifetime_impressions: f64,
    /// Correct keystrokes ever typed.
    pub keystrokes_typed: u64,
    /// Posts ever completed.
    pub posts_completed: u64,
    /// Trades ever opened.
    pub trades_opened: u64,
}

/// Partial update for [`ResourceStore::merge`]. Only current values are
/// settable; lifetime fields have no slot here, so a caller cannot
/// overwrite them even by accident.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourcePatch {
    pub currency: Option<f64>,
    pub followers: Option<f64>,
    pub impressions: Option<f64>,
    pub keystrokes_typed: Option<u64>,
    pub posts_completed: Option<u64>,
    pub trades_opened: Option<u64>,
}

impl ResourcePatch {
    pub fn currency(value: f64) -> Self {
        Self {
            currency: Some(value),
            ..Self::default()
        }
    }
}

/// Which field a notification refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceField {
    Currency,
    LifetimeCurrency,
    Followers,
    LifetimeFollowers,
    Impressions,
    LifetimeImpressions,
    KeystrokesTyped,
    PostsCompleted,
    TradesOpened,
}

/// Why a merge happened. Lets a caller that triggers two merges in one
/// external call (base reward, then roll bonus) tell the notifications
/// apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeSource {
    Typing,
    Post,
    Purchase,
    Tick,
    TradePayout,
    CritBonus,
    ViralBonus,
    Prestige,
    Load,
    System,
}

/// Passed to every subscriber on dispatch.
pub struct ChangeEvent<'a> {
    pub source: ChangeSource,
    /// Fields whose value differs from before the merge, by value equality.
    pub changed: &'a [ResourceField],
    /// The store contents after the merge.
    pub resources: &'a Resources,
}

/// A subscriber that failed. The store logs it and moves on; one broken
/// observer must not block the rest or the merge that triggered it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

pub type SubscriberResult = Result<(), SubscriberError>;

type SubscriberFn = Box<dyn FnMut(&ChangeEvent<'_>) -> SubscriberResult>;

/// Handle returned by `subscribe*`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct ResourceStore {
    values: Resources,
    subscribers: Vec<(SubscriptionId, SubscriberFn)>,
    field_subscribers: Vec<(SubscriptionId, ResourceField, SubscriberFn)>,
    next_id: u64,
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new(Resources::default())
    }
}

impl ResourceStore {
    pub fn new(values: Resources) -> Self {
        Self {
            values: sanitize(values),
            subscribers: Vec::new(),
            field_subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Immutable copy of all fields. Callers must not try to write changes
    /// back through it; mutation goes through `merge`.
    pub fn get(&self) -> Resources {
        self.values.clone()
    }

    pub(crate) fn peek(&self) -> &Resources {
        &self.values
    }

    /// Apply a partial update. For each current value that increased, the
    /// matching lifetime field advances by the exact delta before any
    /// notification fires. Negative inputs clamp to zero and non-finite
    /// inputs keep the old value; the store never panics on bad input.
    /// `notify = false` suppresses dispatch only — lifetimes still advance.
    pub fn merge(&mut self, patch: &ResourcePatch, source: ChangeSource, notify: bool) {
        let before = self.values.clone();

        if let Some(v) = patch.currency {
            self.values.currency = clamp_value(v, before.currency);
            let delta = self.values.currency - before.currency;
            if delta > 0.0 {
                self.values.lifetime_currency += delta;
            }
        }
        if let Some(v) = patch.followers {
            self.values.followers = clamp_value(v, before.followers);
            let delta = self.values.followers - before.followers;
            if delta > 0.0 {
                self.values.lifetime_followers += delta;
            }
        }
        if let Some(v) = patch.impressions {
            self.values.impressions = clamp_value(v, before.impressions);
            let delta = self.values.impressions - before.impressions;
            if delta > 0.0 {
                self.values.lifetime_impressions += delta;
            }
        }
        if let Some(v) = patch.keystrokes_typed {
            self.values.keystrokes_typed = v;
        }
        if let Some(v) = patch.posts_completed {
            self.values.posts_completed = v;
        }
        if let Some(v) = patch.trades_opened {
            self.values.trades_opened = v;
        }

        debug_assert!(self.values.lifetime_currency >= before.lifetime_currency);
        debug_assert!(self.values.lifetime_followers >= before.lifetime_followers);
        debug_assert!(self.values.lifetime_impressions >= before.lifetime_impressions);

        if notify {
            let changed = changed_fields(&before, &self.values);
            self.dispatch(source, &changed);
        }
    }

    /// Replace the whole value set, e.g. when loading a snapshot. Bypasses
    /// the lifetime-delta rule — the snapshot's lifetime fields are taken
    /// as authoritative (after sanitizing).
    pub fn replace(&mut self, values: Resources, source: ChangeSource, notify: bool) {
        let before = std::mem::replace(&mut self.values, sanitize(values));
        if notify {
            let changed = changed_fields(&before, &self.values);
            self.dispatch(source, &changed);
        }
    }

    /// Register a callback invoked on every notifying merge.
    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&ChangeEvent<'_>) -> SubscriberResult + 'static,
    ) -> SubscriptionId {
        let id = self.alloc_id();
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Register a callback invoked only when `field` changed value.
    pub fn subscribe_to_field(
        &mut self,
        field: ResourceField,
        callback: impl FnMut(&ChangeEvent<'_>) -> SubscriberResult + 'static,
    ) -> SubscriptionId {
        let id = self.alloc_id();
        self.field_subscribers.push((id, field, Box::new(callback)));
        id
    }

    /// Returns true if the id was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len() + self.field_subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.field_subscribers.retain(|(sid, _, _)| *sid != id);
        before != self.subscribers.len() + self.field_subscribers.len()
    }

    fn alloc_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        id
    }

    fn dispatch(&mut self, source: ChangeSource, changed: &[ResourceField]) {
        if changed.is_empty() {
            return;
        }
        let event = ChangeEvent {
            source,
            changed,
            resources: &self.values,
        };
        for (id, callback) in &mut self.subscribers {
            if let Err(err) = callback(&event) {
                tracing::warn!(subscriber = id.0, %err, "subscriber failed, dropping error");
            }
        }
        for (id, field, callback) in &mut self.field_subscribers {
            if !changed.contains(field) {
                continue;
            }
            if let Err(err) = callback(&event) {
                tracing::warn!(subscriber = id.0, %err, "field subscriber failed, dropping error");
            }
        }
    }
}

/// Negative values clamp to zero, non-finite values keep the old one.
fn clamp_value(new: f64, old: f64) -> f64 {
    if new.is_finite() {
        new.max(0.0)
    } else {
        old
    }
}

/// Repair a resource set coming from outside the store: clamp bad numbers
/// and lift any lifetime value below its current counterpart.
pub(crate) fn sanitize(mut values: Resources) -> Resources {
    for v in [
        &mut values.currency,
        &mut values.followers,
        &mut values.impressions,
        &mut values.lifetime_currency,
        &mut values.lifetime_followers,
        &mut values.lifetime_impressions,
    ] {
        if !v.is_finite() || *v < 0.0 {
            *v = 0.0;
        }
    }
    values.lifetime_currency = values.lifetime_currency.max(values.currency);
    values.lifetime_followers = values.lifetime_followers.max(values.followers);
    values.lifetime_impressions = values.lifetime_impressions.max(values.impressions);
    values
}

fn changed_fields(before: &Resources, after: &Resources) -> Vec<ResourceField> {
    let mut changed = Vec::new();
    let mut check_f64 = |field, a: f64, b: f64| {
        if a != b {
            changed.push(field);
        }
    };
    check_f64(ResourceField::Currency, before.currency, after.currency);
    check_f64(
        ResourceField::LifetimeCurrency,
        before.lifetime_currency,
        after.lifetime_currency,
    );
    check_f64(ResourceField::Followers, before.followers, after.followers);
    check_f64(
        ResourceField::LifetimeFollowers,
        before.lifetime_followers,
        after.lifetime_followers,
    );
    check_f64(
        ResourceField::Impressions,
        before.impressions,
        after.impressions,
    );
    check_f64(
        ResourceField::LifetimeImpressions,
        before.lifetime_impressions,
        after.lifetime_impressions,
    );
    if before.keystrokes_typed != after.keystrokes_typed {
        changed.push(ResourceField::KeystrokesTyped);
    }
    if before.posts_completed != after.posts_completed {
        changed.push(ResourceField::PostsCompleted);
    }
    if before.trades_opened != after.trades_opened {
        changed.push(ResourceField::TradesOpened);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn merge_increases_lifetime_by_positive_delta() {
        let mut store = ResourceStore::default();
        store.merge(&ResourcePatch::currency(10.0), ChangeSource::Typing, true);
        assert!((store.get().currency - 10.0).abs() < 1e-9);
        assert!((store.get().lifetime_currency - 10.0).abs() < 1e-9);
    }

    #[test]
    fn spending_does_not_touch_lifetime() {
        let mut store = ResourceStore::default();
        store.merge(&ResourcePatch::currency(20.0), ChangeSource::Typing, true);
        store.merge(&ResourcePatch::currency(5.0), ChangeSource::Purchase, true);
        assert!((store.get().currency - 5.0).abs() < 1e-9);
        assert!((store.get().lifetime_currency - 20.0).abs() < 1e-9);
    }

    #[test]
    fn lifetime_equals_sum_of_positive_deltas() {
        let mut store = ResourceStore::default();
        let deltas = [10.0, -3.0, 7.0, -20.0, 4.5];
        let mut expected = 0.0;
        let mut current: f64 = 0.0;
        for d in deltas {
            let next = (current + d).max(0.0);
            if next > current {
                expected += next - current;
            }
            current = next;
            store.merge(&ResourcePatch::currency(current), ChangeSource::System, true);
        }
        assert!((store.get().lifetime_currency - expected).abs() < 1e-9);
    }

    #[test]
    fn negative_values_clamp_to_zero() {
        let mut store = ResourceStore::default();
        store.merge(&ResourcePatch::currency(10.0), ChangeSource::Typing, true);
        store.merge(&ResourcePatch::currency(-50.0), ChangeSource::System, true);
        assert!((store.get().currency - 0.0).abs() < 1e-9);
        assert!((store.get().lifetime_currency - 10.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_values_keep_old() {
        let mut store = ResourceStore::default();
        store.merge(&ResourcePatch::currency(10.0), ChangeSource::Typing, true);
        store.merge(&ResourcePatch::currency(f64::NAN), ChangeSource::System, true);
        assert!((store.get().currency - 10.0).abs() < 1e-9);
    }

    #[test]
    fn silent_merge_advances_lifetime_without_notifying() {
        let mut store = ResourceStore::default();
        let fired = Rc::new(RefCell::new(0u32));
        let fired2 = fired.clone();
        store.subscribe(move |_| {
            *fired2.borrow_mut() += 1;
            Ok(())
        });
        store.merge(&ResourcePatch::currency(10.0), ChangeSource::System, false);
        assert_eq!(*fired.borrow(), 0);
        assert!((store.get().lifetime_currency - 10.0).abs() < 1e-9);
    }

    #[test]
    fn subscriber_sees_source_and_changed_fields() {
        let mut store = ResourceStore::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        store.subscribe(move |ev| {
            seen2.borrow_mut().push((ev.source, ev.changed.to_vec()));
            Ok(())
        });
        store.merge(&ResourcePatch::currency(3.0), ChangeSource::Typing, true);
        let log = seen.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, ChangeSource::Typing);
        assert!(log[0].1.contains(&ResourceField::Currency));
        assert!(log[0].1.contains(&ResourceField::LifetimeCurrency));
    }

    #[test]
    fn field_subscriber_only_fires_on_value_change() {
        let mut store = ResourceStore::default();
        let fired = Rc::new(RefCell::new(0u32));
        let fired2 = fired.clone();
        store.subscribe_to_field(ResourceField::Followers, move |_| {
            *fired2.borrow_mut() += 1;
            Ok(())
        });
        store.merge(&ResourcePatch::currency(5.0), ChangeSource::Typing, true);
        assert_eq!(*fired.borrow(), 0);
        store.merge(
            &ResourcePatch {
                followers: Some(2.0),
                ..Default::default()
            },
            ChangeSource::Post,
            true,
        );
        assert_eq!(*fired.borrow(), 1);
        // Same value again: no change, no dispatch.
        store.merge(
            &ResourcePatch {
                followers: Some(2.0),
                ..Default::default()
            },
            ChangeSource::Post,
            true,
        );
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn failing_subscriber_does_not_block_others() {
        let mut store = ResourceStore::default();
        let fired = Rc::new(RefCell::new(0u32));
        store.subscribe(|_| Err(SubscriberError("ui went away".into())));
        let fired2 = fired.clone();
        store.subscribe(move |_| {
            *fired2.borrow_mut() += 1;
            Ok(())
        });
        store.merge(&ResourcePatch::currency(1.0), ChangeSource::Typing, true);
        assert_eq!(*fired.borrow(), 1);
        assert!((store.get().currency - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unsubscribe_stops_dispatch() {
        let mut store = ResourceStore::default();
        let fired = Rc::new(RefCell::new(0u32));
        let fired2 = fired.clone();
        let id = store.subscribe(move |_| {
            *fired2.borrow_mut() += 1;
            Ok(())
        });
        store.merge(&ResourcePatch::currency(1.0), ChangeSource::Typing, true);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.merge(&ResourcePatch::currency(2.0), ChangeSource::Typing, true);
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn replace_takes_snapshot_lifetimes_as_authoritative() {
        let mut store = ResourceStore::default();
        store.replace(
            Resources {
                currency: 5.0,
                lifetime_currency: 100.0,
                ..Default::default()
            },
            ChangeSource::Load,
            false,
        );
        assert!((store.get().lifetime_currency - 100.0).abs() < 1e-9);
    }

    #[test]
    fn replace_repairs_lifetime_below_current() {
        let mut store = ResourceStore::default();
        store.replace(
            Resources {
                currency: 50.0,
                lifetime_currency: 10.0,
                ..Default::default()
            },
            ChangeSource::Load,
            false,
        );
        assert!((store.get().lifetime_currency - 50.0).abs() < 1e-9);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_lifetime_never_decreases(values in proptest::collection::vec(-1e9f64..1e9, 1..40)) {
            let mut store = ResourceStore::default();
            let mut prev_lifetime = 0.0;
            for v in values {
                store.merge(&ResourcePatch::currency(v), ChangeSource::System, false);
                let lifetime = store.get().lifetime_currency;
                prop_assert!(lifetime >= prev_lifetime,
                    "lifetime decreased: {} -> {}", prev_lifetime, lifetime);
                prev_lifetime = lifetime;
            }
        }

        #[test]
        fn prop_lifetime_is_sum_of_positive_deltas(values in proptest::collection::vec(0f64..1e6, 1..40)) {
            let mut store = ResourceStore::default();
            let mut expected = 0.0;
            let mut current = 0.0;
            for v in values {
                if v > current {
                    expected += v - current;
                }
                current = v;
                store.merge(&ResourcePatch::currency(v), ChangeSource::System, false);
            }
            let lifetime = store.get().lifetime_currency;
            prop_assert!((lifetime - expected).abs() < 1e-6,
                "expected {}, got {}", expected, lifetime);
        }

        #[test]
        fn prop_current_never_negative(values in proptest::collection::vec(-1e9f64..1e9, 1..40)) {
            let mut store = ResourceStore::default();
            for v in values {
                store.merge(&ResourcePatch::currency(v), ChangeSource::System, false);
                prop_assert!(store.get().currency >= 0.0);
            }
        }
    }
}
