//! One-time propagation of the network address range.
//!
//! The `_network` document's production tier carries the CIDR block the
//! provider carves resource subnets from. Once it holds a value it is never
//! rewritten, since resources already provisioned inside it would be
//! orphaned by a change.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cloudkeep_core::TIER_PRODUCTION;

use crate::document::{StrategyDocument, StrategyField};
use crate::error::StrategyResult;

/// `createStrategy` of a network tier. Other provider keys ride along untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NetworkCreateStrategy {
    #[serde(rename = "CidrBlock", default)]
    cidr_block: String,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

/// Result of a propagation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CidrOutcome {
    /// Production already carries this range; nothing to do.
    AlreadySet(String),
    /// No parameter yet and the installation is still inside the grace window.
    Waiting,
    /// The document already reflects the value to write.
    Unchanged,
    /// The document to store.
    Updated(StrategyDocument),
}

/// The range stored for `tier`, if the tier and its create strategy exist.
pub fn cidr_block(document: &StrategyDocument, tier: &str) -> StrategyResult<Option<String>> {
    let Some(record) = document.tier(tier) else {
        return Ok(None);
    };
    let create: Option<Option<NetworkCreateStrategy>> =
        record.get(tier, StrategyField::CreateStrategy)?;
    Ok(create.flatten().map(|c| c.cidr_block))
}

/// Write `parameter` into the production tier's range unless one is already set.
///
/// A missing or empty parameter is waited for while the installation is
/// younger than `grace_window`; after that the production tier is written
/// with an empty range and the provider picks its own. An empty range does
/// not count as set, so a parameter that shows up later still lands.
pub fn propagate_cidr(
    document: StrategyDocument,
    parameter: Option<&str>,
    installation_age: Duration,
    grace_window: Duration,
) -> StrategyResult<CidrOutcome> {
    if let Some(current) = cidr_block(&document, TIER_PRODUCTION)?.filter(|c| !c.is_empty()) {
        debug!(cidr = %current, "network range already set");
        return Ok(CidrOutcome::AlreadySet(current));
    }

    let value = parameter.filter(|v| !v.is_empty());
    if value.is_none() && installation_age < grace_window {
        debug!(
            age_secs = installation_age.as_secs(),
            grace_secs = grace_window.as_secs(),
            "waiting for network range parameter"
        );
        return Ok(CidrOutcome::Waiting);
    }
    let value = value.unwrap_or_default();

    let mut document = document;
    let tier = document.tier_or_default(TIER_PRODUCTION);
    let existing: Option<NetworkCreateStrategy> = tier
        .get::<Option<NetworkCreateStrategy>>(TIER_PRODUCTION, StrategyField::CreateStrategy)?
        .flatten();
    if existing.as_ref().is_some_and(|c| c.cidr_block == value) {
        return Ok(CidrOutcome::Unchanged);
    }

    let mut create = existing.unwrap_or_default();
    create.cidr_block = value.to_string();
    tier.set(StrategyField::CreateStrategy, &create)?;
    Ok(CidrOutcome::Updated(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;

    const GRACE: Duration = Duration::from_secs(60);
    const OLD: Duration = Duration::from_secs(3600);
    const NEW: Duration = Duration::from_secs(5);

    fn doc(text: &str) -> StrategyDocument {
        StrategyDocument::decode("_network", text).unwrap()
    }

    fn updated(outcome: CidrOutcome) -> StrategyDocument {
        match outcome {
            CidrOutcome::Updated(doc) => doc,
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[test]
    fn writes_parameter_into_empty_document() {
        let out = propagate_cidr(StrategyDocument::default(), Some("10.1.0.0/16"), NEW, GRACE)
            .unwrap();
        let doc = updated(out);
        assert_eq!(
            cidr_block(&doc, TIER_PRODUCTION).unwrap().as_deref(),
            Some("10.1.0.0/16")
        );
        assert_eq!(
            doc.encode().unwrap(),
            r#"{"production":{"createStrategy":{"CidrBlock":"10.1.0.0/16"}}}"#
        );
    }

    #[test]
    fn never_overwrites_a_set_range() {
        let current = doc(r#"{"production":{"createStrategy":{"CidrBlock":"10.0.0.0/26"}}}"#);
        for param in [Some("10.9.0.0/16"), Some(""), None] {
            let out = propagate_cidr(current.clone(), param, OLD, GRACE).unwrap();
            assert_eq!(out, CidrOutcome::AlreadySet("10.0.0.0/26".to_string()));
        }
    }

    #[test]
    fn waits_inside_grace_window() {
        assert_eq!(
            propagate_cidr(StrategyDocument::default(), None, NEW, GRACE).unwrap(),
            CidrOutcome::Waiting
        );
        assert_eq!(
            propagate_cidr(StrategyDocument::default(), Some(""), NEW, GRACE).unwrap(),
            CidrOutcome::Waiting
        );
    }

    #[test]
    fn gives_up_after_grace_window_with_empty_range() {
        let doc = updated(propagate_cidr(StrategyDocument::default(), None, OLD, GRACE).unwrap());
        assert_eq!(cidr_block(&doc, TIER_PRODUCTION).unwrap().as_deref(), Some(""));

        // Running again converges without another write.
        assert_eq!(
            propagate_cidr(doc, None, OLD, GRACE).unwrap(),
            CidrOutcome::Unchanged
        );
    }

    #[test]
    fn late_parameter_fills_empty_range() {
        let current = doc(r#"{"production":{"createStrategy":{"CidrBlock":""}}}"#);
        let doc = updated(propagate_cidr(current, Some("10.2.0.0/16"), OLD, GRACE).unwrap());
        assert_eq!(
            cidr_block(&doc, TIER_PRODUCTION).unwrap().as_deref(),
            Some("10.2.0.0/16")
        );
    }

    #[test]
    fn preserves_other_tiers_and_keys() {
        let current = doc(
            r#"{"production":{"createStrategy":{"CidrBlock":"","VpcTag":"x"},"deleteStrategy":{}},"development":{"createStrategy":{"CidrBlock":""}}}"#,
        );
        let doc = updated(propagate_cidr(current, Some("10.3.0.0/16"), NEW, GRACE).unwrap());
        assert_eq!(
            doc.tier("production").unwrap().raw(StrategyField::CreateStrategy),
            Some(r#"{"CidrBlock":"10.3.0.0/16","VpcTag":"x"}"#)
        );
        assert_eq!(
            doc.tier("production").unwrap().raw(StrategyField::DeleteStrategy),
            Some("{}")
        );
        assert_eq!(cidr_block(&doc, "development").unwrap().as_deref(), Some(""));
    }

    #[test]
    fn malformed_create_strategy_is_an_error() {
        let current = doc(r#"{"production":{"createStrategy":{"CidrBlock":7}}}"#);
        let err = propagate_cidr(current, Some("10.0.0.0/16"), OLD, GRACE).unwrap_err();
        assert!(matches!(err, StrategyError::MalformedField { .. }));
    }
}
