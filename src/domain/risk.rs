//! Position sizing under a per-trade risk budget with protected reserves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::GatetraderError;
use super::position::Side;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPolicy {
    pub max_risk_fraction_per_trade: f64,
    /// Asset -> quantity that is never traded or counted as tradable equity.
    pub protected_reserves: BTreeMap<String, f64>,
    pub max_concurrent_positions: usize,
    /// Sizes are rounded down to a multiple of this.
    pub lot_step: f64,
    /// Initial stop distance as a fraction of entry.
    pub stop_loss_pct: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        RiskPolicy {
            max_risk_fraction_per_trade: 0.04,
            protected_reserves: BTreeMap::new(),
            max_concurrent_positions: 1,
            lot_step: 1e-8,
            stop_loss_pct: 0.02,
        }
    }
}

impl RiskPolicy {
    pub fn with_reserve(mut self, asset: impl Into<String>, quantity: f64) -> Self {
        self.protected_reserves.insert(asset.into(), quantity);
        self
    }

    pub fn reserve_for(&self, asset: &str) -> f64 {
        self.protected_reserves.get(asset).copied().unwrap_or(0.0)
    }

    /// Stop level implied by `stop_loss_pct` for an entry on `side`.
    pub fn implied_stop(&self, entry_price: f64, side: Side) -> f64 {
        match side {
            Side::Long => entry_price * (1.0 - self.stop_loss_pct),
            Side::Short => entry_price * (1.0 + self.stop_loss_pct),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub quantity: f64,
    /// Current price in the account's valuation currency.
    pub price: f64,
}

impl AssetBalance {
    pub fn value(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Held balances by asset.
pub type Holdings = BTreeMap<String, AssetBalance>;

/// Value of the protected part of `holdings`. Only the quantity actually
/// held counts: a reserve larger than the balance protects the whole balance.
pub fn protected_value(policy: &RiskPolicy, holdings: &Holdings) -> f64 {
    policy
        .protected_reserves
        .iter()
        .filter_map(|(asset, reserve)| {
            holdings
                .get(asset)
                .map(|held| held.quantity.min(*reserve).max(0.0) * held.price)
        })
        .sum()
}

pub fn tradable_equity(equity: f64, policy: &RiskPolicy, holdings: &Holdings) -> f64 {
    (equity - protected_value(policy, holdings)).max(0.0)
}

/// Quantity of `asset` above its protected reserve.
pub fn tradable_quantity(policy: &RiskPolicy, asset: &str, holdings: &Holdings) -> f64 {
    let held = holdings.get(asset).map(|b| b.quantity).unwrap_or(0.0);
    (held - policy.reserve_for(asset)).max(0.0)
}

/// Like [`tradable_quantity`], but fails when a reserve leaves nothing to sell.
pub fn sellable_quantity(
    policy: &RiskPolicy,
    asset: &str,
    holdings: &Holdings,
) -> Result<f64, GatetraderError> {
    let held = holdings.get(asset).map(|b| b.quantity).unwrap_or(0.0);
    let reserved = policy.reserve_for(asset);
    let excess = tradable_quantity(policy, asset, holdings);
    if excess <= 0.0 && reserved > 0.0 {
        return Err(GatetraderError::ProtectedReserve {
            asset: asset.to_string(),
            held,
            reserved,
        });
    }
    Ok(excess)
}

pub fn floor_to_lot(quantity: f64, lot_step: f64) -> f64 {
    if lot_step <= 0.0 || !quantity.is_finite() {
        return quantity.max(0.0);
    }
    ((quantity / lot_step).floor() * lot_step).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub size: f64,
    pub risk_amount: f64,
    pub stop_distance: f64,
    pub tradable_equity: f64,
    /// True when the notional cap, not the risk budget, bound the size.
    pub capped: bool,
}

pub fn size_position(
    equity: f64,
    policy: &RiskPolicy,
    entry_price: f64,
    stop_price: f64,
    symbol: &str,
    holdings: &Holdings,
) -> Result<PositionSize, GatetraderError> {
    let stop_distance = (entry_price - stop_price).abs();
    if !(entry_price > 0.0) || !(stop_distance > 0.0) || !stop_distance.is_finite() {
        return Err(GatetraderError::InvalidStop {
            entry_price,
            stop_price,
        });
    }

    let tradable = tradable_equity(equity, policy, holdings);
    let risk_amount = policy.max_risk_fraction_per_trade * tradable;
    let requested = risk_amount / stop_distance;
    let affordable = tradable / entry_price;
    let capped = requested > affordable;

    let size = floor_to_lot(requested.min(affordable), policy.lot_step);
    if size <= 0.0 {
        return Err(GatetraderError::SizingCap {
            symbol: symbol.to_string(),
            requested,
            affordable,
        });
    }

    Ok(PositionSize {
        size,
        risk_amount,
        stop_distance,
        tradable_equity: tradable,
        capped,
    })
}
