//! Field override across every tier of a strategy document.

use serde::Serialize;
use serde_json::value::RawValue;

use crate::document::{StrategyDocument, StrategyField};
use crate::error::StrategyResult;

impl StrategyDocument {
    /// Replace `field` in every tier with `value`. Other fields and tiers are untouched.
    pub fn override_field<T: Serialize>(
        &mut self,
        field: StrategyField,
        value: &T,
    ) -> StrategyResult<()> {
        let raw = serde_json::value::to_raw_value(value)?;
        self.override_raw(field, &raw);
        Ok(())
    }

    pub fn override_raw(&mut self, field: StrategyField, value: &RawValue) {
        for (_, tier) in self.tiers_mut() {
            tier.set_raw(field, value.to_owned());
        }
    }
}

/// Decode `encoded`, override `field` in every tier, and re-encode.
///
/// On a decode failure the error is returned and nothing is produced, so the
/// caller still holds the original text.
pub fn override_strategy<T: Serialize>(
    key: &str,
    encoded: &str,
    field: StrategyField,
    value: &T,
) -> StrategyResult<String> {
    let mut document = StrategyDocument::decode(key, encoded)?;
    document.override_field(field, value)?;
    document.encode()
}
