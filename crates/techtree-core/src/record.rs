//! Typed technology records.
//!
//! A [`TechRecord`] is produced by the record builder from one top-level
//! script block and is immutable afterwards; overriding a technology means
//! ingesting a whole new record with the same id.

use serde::{Deserialize, Serialize};
use techtree_script::Statement;

/// Source id used for the base game layer.
pub const BASE_SOURCE_ID: &str = "base";

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Which layer produced a record. Used to resolve overrides and shown in
/// the output shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Path of the file the record came from, as given by the loader.
    pub file: String,
    /// `"base"` or the mod id.
    pub source_id: String,
    /// Human-readable mod name, if known.
    pub source_name: Option<String>,
    /// Position in the load order. Base is 0; later layers win.
    pub load_order: u32,
}

impl Provenance {
    pub fn new(file: impl Into<String>, source_id: impl Into<String>, load_order: u32) -> Self {
        Self {
            file: file.into(),
            source_id: source_id.into(),
            source_name: None,
            load_order,
        }
    }

    /// Provenance for a base-game file.
    pub fn base(file: impl Into<String>) -> Self {
        Self::new(file, BASE_SOURCE_ID, 0)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn is_base(&self) -> bool {
        self.source_id == BASE_SOURCE_ID
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechFlags {
    pub is_starting_tech: bool,
    pub is_rare: bool,
    pub is_dangerous: bool,
}

// ---------------------------------------------------------------------------
// Prerequisites
// ---------------------------------------------------------------------------

/// The prerequisite structure exactly as written, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrereqCondition {
    Tech(String),
    All(Vec<PrereqCondition>),
    Any(Vec<PrereqCondition>),
    Not(Vec<PrereqCondition>),
}

impl PrereqCondition {
    /// Every tech id mentioned anywhere in the condition, in order.
    pub fn mentioned_ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            PrereqCondition::Tech(id) => out.push(id),
            PrereqCondition::All(items)
            | PrereqCondition::Any(items)
            | PrereqCondition::Not(items) => {
                for item in items {
                    item.collect_ids(out);
                }
            }
        }
    }
}

/// Normalized prerequisites.
///
/// `required` holds hard requirements (flat list entries and `AND` members);
/// each `any_of` group is satisfied by any single member; `excluded` ids
/// (from `NOT`) never become graph edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisites {
    pub required: Vec<String>,
    pub any_of: Vec<Vec<String>>,
    pub excluded: Vec<String>,
    /// Present when the source used `AND`/`OR`/`NOT` groups.
    pub condition: Option<PrereqCondition>,
}

impl Prerequisites {
    /// Hard requirements only, from a flat list.
    pub fn required<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prereqs = Self::default();
        for id in ids {
            prereqs.push_required(id.into());
        }
        prereqs
    }

    pub fn push_required(&mut self, id: String) {
        if !self.required.contains(&id) {
            self.required.push(id);
        }
    }

    pub fn push_any_of(&mut self, group: Vec<String>) {
        let mut deduped: Vec<String> = Vec::with_capacity(group.len());
        for id in group {
            if !deduped.contains(&id) {
                deduped.push(id);
            }
        }
        if !deduped.is_empty() {
            self.any_of.push(deduped);
        }
    }

    /// The raw display list: required ids, then OR alternatives, without
    /// duplicates. Includes ids that may not exist in any registry.
    pub fn ids(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for id in self
            .required
            .iter()
            .chain(self.any_of.iter().flatten())
        {
            if !out.contains(&id.as_str()) {
                out.push(id);
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.any_of.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TechRecord
// ---------------------------------------------------------------------------

/// One technology definition, fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechRecord {
    /// Unique key within a registry.
    pub id: String,

    /// Research branch (`physics`, `society`, `engineering`, ...).
    pub area: String,

    pub category: Vec<String>,

    pub tier: u32,

    /// Research cost after variable resolution.
    pub cost: f64,

    /// Base draw weight.
    pub weight: f64,

    pub flags: TechFlags,

    pub prerequisites: Prerequisites,

    /// Number of times the tech can be researched; `-1` means unlimited.
    /// `None` for ordinary one-shot techs.
    pub levels: Option<i64>,

    /// Extra cost per completed level of a repeatable tech.
    pub cost_per_level: Option<f64>,

    pub gateway: Option<String>,

    pub is_reverse_engineerable: bool,

    /// Every nested block the builder does not type (effects, modifiers,
    /// weight modifiers, unlock lists), kept verbatim.
    pub extra: Vec<Statement>,

    pub provenance: Provenance,
}

impl TechRecord {
    /// A record with defaults for every field but the id.
    pub fn new(id: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            id: id.into(),
            area: String::new(),
            category: Vec::new(),
            tier: 0,
            cost: 0.0,
            weight: 0.0,
            flags: TechFlags::default(),
            prerequisites: Prerequisites::default(),
            levels: None,
            cost_per_level: None,
            gateway: None,
            is_reverse_engineerable: true,
            extra: Vec::new(),
            provenance,
        }
    }

    pub fn is_repeatable(&self) -> bool {
        matches!(self.levels, Some(n) if n < 0 || n > 1)
    }

    /// Opaque nested data by key.
    pub fn extra_field(&self, key: &str) -> Option<&Statement> {
        self.extra.iter().find(|s| s.key == key)
    }
}
