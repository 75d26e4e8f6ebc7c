//! Override-aware technology registry.
//!
//! Records live in a `Vec` in first-ingest order with a name -> index map,
//! the same layout the item/recipe registry used. Replacing a record keeps
//! its slot, so iteration order is stable across layers.

use crate::diagnostics::Diagnostic;
use crate::record::TechRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a colliding id is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPolicy {
    /// Later layers override earlier ones.
    #[default]
    ReplaceAlways,
    /// First definition sticks.
    InsertIfAbsent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("record has an empty id")]
    EmptyId,

    #[error("{id} is already defined (by {existing_source})")]
    AlreadyPresent { id: String, existing_source: String },
}

#[derive(Debug, Default)]
pub struct TechRegistry {
    records: Vec<TechRecord>,
    index: HashMap<String, usize>,
    areas: Vec<String>,
    categories: Vec<String>,
    generation: u64,
    diagnostics: Vec<Diagnostic>,
}

impl TechRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert or override by id. Returns `false` (and queues a diagnostic)
    /// when the record was dropped.
    pub fn ingest(&mut self, record: TechRecord, policy: IngestPolicy) -> bool {
        let file = record.provenance.file.clone();
        match self.try_ingest(record, policy) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(file = %file, error = %err, "record dropped");
                self.diagnostics.push(Diagnostic::in_file(file, err));
                false
            }
        }
    }

    /// Like [`ingest`](Self::ingest) but returns the error, and the replaced
    /// record on override.
    pub fn try_ingest(
        &mut self,
        record: TechRecord,
        policy: IngestPolicy,
    ) -> Result<Option<TechRecord>, IngestError> {
        if record.id.is_empty() {
            return Err(IngestError::EmptyId);
        }

        let existing = self.index.get(&record.id).copied();
        if let (Some(idx), IngestPolicy::InsertIfAbsent) = (existing, policy) {
            return Err(IngestError::AlreadyPresent {
                id: record.id,
                existing_source: self.records[idx].provenance.source_id.clone(),
            });
        }

        self.note_names(&record);

        let replaced = match existing {
            Some(idx) => {
                tracing::debug!(
                    id = %record.id,
                    from = %self.records[idx].provenance.source_id,
                    to = %record.provenance.source_id,
                    "record overridden"
                );
                Some(std::mem::replace(&mut self.records[idx], record))
            }
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                None
            }
        };

        self.generation += 1;
        Ok(replaced)
    }

    fn note_names(&mut self, record: &TechRecord) {
        if !record.area.is_empty() && !self.areas.contains(&record.area) {
            self.areas.push(record.area.clone());
        }
        for category in &record.category {
            if !self.categories.contains(category) {
                self.categories.push(category.clone());
            }
        }
    }

    /// Drop every record and name table. Only for a full reload.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
        self.areas.clear();
        self.categories.clear();
        self.generation += 1;
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<&TechRecord> {
        self.index.get(id).map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Registry position of an id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in registry iteration order.
    pub fn iter(&self) -> impl Iterator<Item = &TechRecord> {
        self.records.iter()
    }

    pub fn by_area(&self, area: &str) -> Vec<&TechRecord> {
        self.records.iter().filter(|r| r.area == area).collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&TechRecord> {
        self.records
            .iter()
            .filter(|r| r.category.iter().any(|c| c == category))
            .collect()
    }

    pub fn by_tier(&self, tier: u32) -> Vec<&TechRecord> {
        self.records.iter().filter(|r| r.tier == tier).collect()
    }

    /// Area names in first-seen order.
    pub fn areas(&self) -> &[String] {
        &self.areas
    }

    /// Category names in first-seen order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Bumped on every successful mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
