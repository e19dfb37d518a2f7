//! Bullion melt value

use crate::catalog::Denomination;

/// Value of the pure silver in a 90% silver coin at `spot_usd` per troy ounce,
/// rounded to cents. `None` for non-silver denominations or a bad spot price.
pub fn silver_melt_value(denomination: Denomination, spot_usd: f64) -> Option<f64> {
    if !spot_usd.is_finite() || spot_usd <= 0.0 {
        return None;
    }
    let ounces = denomination.silver_troy_oz()?;
    Some((ounces * spot_usd * 100.0).round() / 100.0)
}
