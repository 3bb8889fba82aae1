//! Allow-list reconcile for a tier's `serviceUpdates`.

use tracing::{debug, warn};

use crate::document::{StrategyDocument, StrategyField};
use crate::error::{StrategyError, StrategyResult};

/// Overwrite `tier`'s service-update list with `allow_list`.
///
/// The stored list is replaced, never merged. Returns the document and
/// whether the stored value changed. A missing tier is created holding only
/// the list; a stored value that is not a string list is replaced.
pub fn set_service_updates(
    mut document: StrategyDocument,
    tier: &str,
    allow_list: &[String],
) -> StrategyResult<(StrategyDocument, bool)> {
    let record = document.tier_or_default(tier);
    match record.get::<Vec<String>>(tier, StrategyField::ServiceUpdates) {
        Ok(Some(current)) if current == allow_list => {
            debug!(%tier, "service updates already match allow-list");
            return Ok((document, false));
        }
        Ok(_) => {}
        Err(StrategyError::MalformedField { source, .. }) => {
            warn!(%tier, error = %source, "replacing malformed service updates");
        }
        Err(e) => return Err(e),
    }

    record.set(StrategyField::ServiceUpdates, &allow_list)?;
    debug!(%tier, updates = ?allow_list, "service updates replaced");
    Ok((document, true))
}
