//! セーブ/ロード機能。
//!
//! ## バージョニング方針
//!
//! - `SAVE_VERSION`: 現在のセーブ形式バージョン。フィールド追加時にインクリメントする。
//! - `MIN_COMPATIBLE_VERSION`: 互換性を維持できる最小バージョン。
//!   新フィールドの追加のみの場合はこの値を変えない（旧データを維持できる）。
//!   既存フィールドの意味変更や削除など破壊的変更を行った場合のみインクリメントする。
//!
//! 旧バージョンのセーブデータは、`MIN_COMPATIBLE_VERSION` 以上であれば
//! 不足フィールドにデフォルト値を補完して読み込む。範囲外の値（負の通貨、
//! current を下回る lifetime 等）は拒否せず修復する。セーブを失うより
//! 一部デフォルト化されたセーブの方がましだから。
//!
//! ストレージ自体（localStorage、ファイル等）は外部コラボレータの責務。
//! このモジュールは JSON 文字列との相互変換のみを提供する。

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::error::LoadError;
use super::reward::RollState;
use super::state::{create_upgrades, ActiveBoost, BoostKind, EngineState};
use super::store::{ChangeSource, Resources};

/// セーブデータのフォーマットバージョン。
/// フィールド追加時にインクリメントすること。
pub const SAVE_VERSION: u32 = 2;

/// 互換性を維持できる最小バージョン。
/// この値以上のセーブデータは、不足フィールドをデフォルト値で補完して読み込む。
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

/// シリアライズ用のセーブデータ構造体。
/// 派生レート（DerivedRates）は含まない — 常に再計算で復元する。
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub game: GameSave,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Debug)]
#[serde(default)]
pub struct GameSave {
    resources: Resources,

    /// 各ボットの所有数。BotKind::all() の順。
    bots: Vec<u32>,
    /// 各アップグレードのレベル。create_upgrades() の順。
    upgrade_levels: Vec<u32>,

    trade_roll: RollState,
    crit_roll: RollState,
    viral_roll: RollState,

    combo: u32,
    /// アクティブなブースト: (kind, magnitude, expires_at)。
    /// kind: 0=Production, 1=CritFrenzy。
    boosts: Vec<(u8, f64, f64)>,
    elapsed: f64,
    payout_carry: f64,

    // v2 で追加: 転生データと統計
    prestige_count: u32,
    prestige_multiplier: f64,
    best_rate: f64,

    rng_seed: u64,
}

/// EngineState からセーブ用データを抽出する。
pub fn extract_save(state: &EngineState) -> SaveData {
    SaveData {
        version: SAVE_VERSION,
        game: GameSave {
            resources: state.store.get(),
            bots: state.bots.iter().map(|b| b.count).collect(),
            upgrade_levels: state.upgrades.iter().map(|u| u.level).collect(),
            trade_roll: state.trade_roll.clone(),
            crit_roll: state.crit_roll.clone(),
            viral_roll: state.viral_roll.clone(),
            combo: state.combo,
            boosts: state
                .boosts
                .iter()
                .map(|b| {
                    let kind = match b.kind {
                        BoostKind::Production => 0u8,
                        BoostKind::CritFrenzy => 1,
                    };
                    (kind, b.magnitude, b.expires_at)
                })
                .collect(),
            elapsed: state.elapsed,
            payout_carry: state.payout_carry,
            prestige_count: state.prestige_count,
            prestige_multiplier: state.prestige_multiplier,
            best_rate: state.best_rate,
            rng_seed: state.rng_seed,
        },
    }
}

/// セーブデータを EngineState に復元する。
/// 定義の個数が合わない場合は無視して現行定義の方を使う。
/// 範囲外の値はここで修復する。購読者はそのまま残り、Load ソースで通知される。
pub fn apply_save(state: &mut EngineState, save: &GameSave) {
    // リソース復元（replace が clamp と lifetime 修復を行う）
    state
        .store
        .replace(save.resources.clone(), ChangeSource::Load, true);

    // ボット復元
    for (slot, &count) in state.bots.iter_mut().zip(save.bots.iter()) {
        slot.count = count;
    }

    // アップグレード復元（レベルは max_level に丸める）
    state.upgrades = create_upgrades();
    for (slot, &level) in state.upgrades.iter_mut().zip(save.upgrade_levels.iter()) {
        slot.level = level.min(slot.def.max_level);
    }

    state.trade_roll = sanitize_roll(&save.trade_roll);
    state.crit_roll = sanitize_roll(&save.crit_roll);
    state.viral_roll = sanitize_roll(&save.viral_roll);

    state.combo = save.combo;
    state.boosts = save
        .boosts
        .iter()
        .filter_map(|&(kind, magnitude, expires_at)| {
            let kind = match kind {
                0 => BoostKind::Production,
                1 => BoostKind::CritFrenzy,
                _ => return None,
            };
            if !magnitude.is_finite() || !expires_at.is_finite() {
                return None;
            }
            Some(ActiveBoost {
                kind,
                magnitude,
                expires_at,
            })
        })
        .collect();

    state.elapsed = finite_or_zero(save.elapsed);
    state.payout_carry = finite_or_zero(save.payout_carry).max(0.0);

    state.prestige_count = save.prestige_count;
    // v1 のセーブには無いフィールド。0 のまま使うと経済が消えるので 1 に修復。
    state.prestige_multiplier = if save.prestige_multiplier.is_finite()
        && save.prestige_multiplier >= 1.0
    {
        save.prestige_multiplier
    } else {
        tracing::warn!(
            value = save.prestige_multiplier,
            "prestige multiplier repaired to 1.0"
        );
        1.0
    };
    state.best_rate = finite_or_zero(save.best_rate).max(0.0);

    state.rng_seed = save.rng_seed;
    state.rng = SmallRng::seed_from_u64(save.rng_seed);
}

fn sanitize_roll(roll: &RollState) -> RollState {
    let mut roll = roll.clone();
    if !roll.streak.is_finite() || roll.streak < 0.0 {
        roll.streak = 0.0;
    }
    roll
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// エンジン状態を JSON 文字列にシリアライズする。
pub fn to_json(state: &EngineState) -> String {
    // GameSave は文字列キーのみの plain data なので失敗しない。
    serde_json::to_string(&extract_save(state)).expect("save data serializes")
}

/// JSON 文字列からエンジン状態を復元する。
/// `MIN_COMPATIBLE_VERSION` 未満は `LoadError::Incompatible`、
/// パース不能は `LoadError::Malformed`。それ以外は修復して読み込む。
pub fn load_into(state: &mut EngineState, data: &str) -> Result<(), LoadError> {
    let save_data: SaveData = serde_json::from_str(data)?;

    if save_data.version < MIN_COMPATIBLE_VERSION {
        return Err(LoadError::Incompatible {
            found: save_data.version,
            min: MIN_COMPATIBLE_VERSION,
        });
    }
    if save_data.version < SAVE_VERSION {
        tracing::warn!(
            saved = save_data.version,
            current = SAVE_VERSION,
            "migrating old save, missing fields default-filled"
        );
    }

    apply_save(state, &save_data.game);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::BotKind;

    fn populated_state() -> EngineState {
        let mut state = EngineState::new(9);
        state.store.replace(
            Resources {
                currency: 1_234.5,
                lifetime_currency: 9_999.0,
                followers: 321.0,
                lifetime_followers: 400.0,
                impressions: 10_000.0,
                lifetime_impressions: 25_000.0,
                keystrokes_typed: 4_242,
                posts_completed: 77,
                trades_opened: 12,
            },
            ChangeSource::System,
            false,
        );
        state.bots[0].count = 10;
        state.bots[2].count = 3;
        state.upgrades[0].level = 2;
        state.upgrades[1].level = 1;
        state.trade_roll = RollState {
            rolls_since_win: 3,
            loss_streak: 2,
            streak: 0.0,
            guarantee_fired: true,
            total_rolls: 12,
        };
        state.crit_roll.streak = 4.5;
        state.viral_roll.rolls_since_win = 40;
        state.combo = 17;
        state.boosts.push(ActiveBoost {
            kind: BoostKind::Production,
            magnitude: 2.0,
            expires_at: 99.0,
        });
        state.elapsed = 64.25;
        state.payout_carry = 0.75;
        state.prestige_count = 2;
        state.prestige_multiplier = 1.05;
        state.best_rate = 456.0;
        state.rng_seed = 9;
        state
    }

    #[test]
    fn extract_and_apply_roundtrip() {
        let original = populated_state();
        let json = to_json(&original);

        let mut restored = EngineState::new(0);
        load_into(&mut restored, &json).unwrap();

        let snap = restored.store.get();
        assert!((snap.currency - 1_234.5).abs() < 0.001);
        assert!((snap.lifetime_currency - 9_999.0).abs() < 0.001);
        assert_eq!(snap.keystrokes_typed, 4_242);
        assert_eq!(snap.posts_completed, 77);
        assert_eq!(restored.bots[0].count, 10);
        assert_eq!(restored.bots[2].count, 3);
        assert_eq!(restored.upgrades[0].level, 2);
        assert_eq!(restored.upgrades[1].level, 1);
        assert_eq!(restored.upgrades[2].level, 0);
        assert_eq!(restored.trade_roll, original.trade_roll);
        assert!((restored.crit_roll.streak - 4.5).abs() < 0.001);
        assert_eq!(restored.viral_roll.rolls_since_win, 40);
        assert_eq!(restored.combo, 17);
        assert_eq!(restored.boosts.len(), 1);
        assert_eq!(restored.boosts[0].kind, BoostKind::Production);
        assert!((restored.elapsed - 64.25).abs() < 0.001);
        assert!((restored.payout_carry - 0.75).abs() < 0.001);
        assert_eq!(restored.prestige_count, 2);
        assert!((restored.prestige_multiplier - 1.05).abs() < 0.001);
        assert!((restored.best_rate - 456.0).abs() < 0.001);
        assert_eq!(restored.rng_seed, 9);
    }

    /// load(save(x)) のセーブ表現が一致する（ラウンドトリップ性質）。
    #[test]
    fn save_of_loaded_state_is_identical() {
        let original = populated_state();
        let json = to_json(&original);
        let mut restored = EngineState::new(0);
        load_into(&mut restored, &json).unwrap();
        assert_eq!(extract_save(&original).game, extract_save(&restored).game);
    }

    /// 旧バージョン（フィールドが少ない）のJSONから互換フィールドが復元されることを検証。
    #[test]
    fn migrate_old_version_fills_defaults() {
        // v1 相当の最小限のJSON（転生・統計フィールドが無い）
        let old_json = r#"{
            "version": 1,
            "game": {
                "resources": {
                    "currency": 500.0,
                    "lifetime_currency": 800.0,
                    "followers": 10.0,
                    "impressions": 50.0,
                    "keystrokes_typed": 100
                },
                "bots": [4, 1],
                "upgrade_levels": [1],
                "combo": 3,
                "elapsed": 12.5,
                "rng_seed": 7
            }
        }"#;

        let mut state = EngineState::new(0);
        load_into(&mut state, old_json).unwrap();

        let snap = state.store.get();
        assert!((snap.currency - 500.0).abs() < 0.001);
        assert!((snap.lifetime_currency - 800.0).abs() < 0.001);
        // resources 内の不足フィールドもデフォルト補完（lifetime は修復）
        assert!((snap.lifetime_followers - 10.0).abs() < 0.001);
        assert_eq!(snap.posts_completed, 0);
        assert_eq!(state.bots[0].count, 4);
        assert_eq!(state.bots[1].count, 1);
        assert_eq!(state.bots[2].count, 0);
        assert_eq!(state.upgrades[0].level, 1);
        assert_eq!(state.combo, 3);

        // 旧セーブに存在しないフィールドはデフォルト値。
        // prestige_multiplier はデフォルト 0.0 のままだと経済が死ぬので 1.0 に修復。
        assert_eq!(state.prestige_count, 0);
        assert!((state.prestige_multiplier - 1.0).abs() < 0.001);
        assert!((state.best_rate - 0.0).abs() < 0.001);
        assert_eq!(state.rng_seed, 7);
    }

    /// MIN_COMPATIBLE_VERSION 未満のバージョンは互換性なしと判定される。
    #[test]
    fn version_below_min_compatible_is_rejected() {
        let json = r#"{ "version": 0, "game": {} }"#;
        let mut state = EngineState::new(0);
        let err = load_into(&mut state, json).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Incompatible { found: 0, min: 1 }
        ));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let mut state = EngineState::new(0);
        assert!(matches!(
            load_into(&mut state, "not json at all"),
            Err(LoadError::Malformed(_))
        ));
    }

    /// 未知の追加フィールドは無視される（前方互換）。
    #[test]
    fn unknown_fields_in_json_are_ignored() {
        let json = r#"{
            "version": 2,
            "game": {
                "resources": { "currency": 100.0, "lifetime_currency": 100.0 },
                "future_unknown_field": "should be ignored"
            }
        }"#;
        let mut state = EngineState::new(0);
        load_into(&mut state, json).unwrap();
        assert!((state.store.get().currency - 100.0).abs() < 0.001);
    }

    /// 定義より長い/短いベクタは許容する。
    #[test]
    fn bot_count_length_mismatch_is_tolerated() {
        let json = r#"{
            "version": 2,
            "game": {
                "bots": [1, 2, 3, 4, 5, 6, 7, 8, 9]
            }
        }"#;
        let mut state = EngineState::new(0);
        load_into(&mut state, json).unwrap();
        assert_eq!(state.bots.len(), BotKind::all().len());
        assert_eq!(state.bots[0].count, 1);
        assert_eq!(state.bots[4].count, 5);
    }

    /// 範囲外の値は修復される: 負の通貨は 0、max_level 超えは丸め、
    /// 不正なブースト種別は捨てる。
    #[test]
    fn out_of_range_values_are_repaired() {
        let json = r#"{
            "version": 2,
            "game": {
                "resources": { "currency": -500.0, "lifetime_currency": 100.0 },
                "upgrade_levels": [99],
                "boosts": [[7, 2.0, 10.0], [0, 3.0, 20.0]],
                "prestige_multiplier": -4.0
            }
        }"#;
        let mut state = EngineState::new(0);
        load_into(&mut state, json).unwrap();
        assert!((state.store.get().currency - 0.0).abs() < 0.001);
        assert_eq!(state.upgrades[0].level, state.upgrades[0].def.max_level);
        assert_eq!(state.boosts.len(), 1);
        assert!((state.boosts[0].magnitude - 3.0).abs() < 0.001);
        assert!((state.prestige_multiplier - 1.0).abs() < 0.001);
    }

    #[test]
    fn empty_state_roundtrip() {
        let state = EngineState::new(42);
        let json = to_json(&state);
        let mut restored = EngineState::new(0);
        load_into(&mut restored, &json).unwrap();
        assert!((restored.store.get().currency - 0.0).abs() < 0.001);
        assert_eq!(restored.bots[0].count, 0);
        assert_eq!(restored.rng_seed, 42);
    }
}
