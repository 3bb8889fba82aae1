//! Decode/encode boundary over the strategy configuration object.
//!
//! The configuration object stores one JSON document per resource kind as
//! text. `StrategyConfig` is the only place that text is parsed or produced;
//! everything above it works on [`StrategyDocument`].

use std::collections::BTreeMap;

use cloudkeep_core::{NETWORK_STRATEGY_KEY, ResourceKind};

use crate::deletion::destructive_delete_strategy;
use crate::document::{StrategyDocument, StrategyField};
use crate::error::StrategyResult;

/// Typed view over a configuration object's key → text data.
pub struct StrategyConfig<'a> {
    data: &'a mut BTreeMap<String, String>,
}

impl<'a> StrategyConfig<'a> {
    pub fn new(data: &'a mut BTreeMap<String, String>) -> Self {
        Self { data }
    }

    fn decode_key(&self, key: &str) -> StrategyResult<Option<StrategyDocument>> {
        self.data
            .get(key)
            .map(|text| StrategyDocument::decode(key, text))
            .transpose()
    }

    fn encode_key(&mut self, key: &str, document: &StrategyDocument) -> StrategyResult<()> {
        let text = document.encode()?;
        self.data.insert(key.to_string(), text);
        Ok(())
    }

    /// The document for `kind`, or `None` if the key is absent.
    pub fn document(&self, kind: ResourceKind) -> StrategyResult<Option<StrategyDocument>> {
        self.decode_key(kind.as_str())
    }

    pub fn set_document(
        &mut self,
        kind: ResourceKind,
        document: &StrategyDocument,
    ) -> StrategyResult<()> {
        self.encode_key(kind.as_str(), document)
    }

    /// The `_network` document, or `None` if the key is absent.
    pub fn network(&self) -> StrategyResult<Option<StrategyDocument>> {
        self.decode_key(NETWORK_STRATEGY_KEY)
    }

    pub fn set_network(&mut self, document: &StrategyDocument) -> StrategyResult<()> {
        self.encode_key(NETWORK_STRATEGY_KEY, document)
    }

    /// Install the destructive delete strategy into every tier of every kind.
    ///
    /// All documents are decoded before any is written, so a malformed one
    /// leaves the data untouched. Absent documents stay absent.
    pub fn override_delete_strategies(&mut self) -> StrategyResult<()> {
        let mut documents = Vec::with_capacity(ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            if let Some(document) = self.document(kind)? {
                documents.push((kind, document));
            }
        }
        for (kind, mut document) in documents {
            let strategy = destructive_delete_strategy(kind)?;
            document.override_raw(StrategyField::DeleteStrategy, &strategy);
            self.set_document(kind, &document)?;
        }
        Ok(())
    }
}
