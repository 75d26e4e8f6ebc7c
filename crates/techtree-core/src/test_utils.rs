//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::record::{Prerequisites, Provenance, TechRecord};
use crate::registry::{IngestPolicy, TechRegistry};

// ===========================================================================
// Records
// ===========================================================================

/// Base-game record with hard prerequisites only.
pub fn tech(id: &str, required: &[&str]) -> TechRecord {
    let mut record = TechRecord::new(id, Provenance::base(format!("{id}.txt")));
    record.prerequisites = Prerequisites::required(required.iter().copied());
    record
}

/// Record with hard prerequisites and `OR` groups.
pub fn tech_any(id: &str, required: &[&str], groups: &[&[&str]]) -> TechRecord {
    let mut record = tech(id, required);
    for group in groups {
        record
            .prerequisites
            .push_any_of(group.iter().map(|s| s.to_string()).collect());
    }
    record
}

pub fn registry_of(records: Vec<TechRecord>) -> TechRegistry {
    let mut registry = TechRegistry::new();
    for record in records {
        registry.ingest(record, IngestPolicy::ReplaceAlways);
    }
    registry
}

// ===========================================================================
// Generated trees
// ===========================================================================

/// `layers` layers of `width` techs; each tech requires up to `fan_in`
/// techs from the previous layer.
pub fn layered_registry(layers: usize, width: usize, fan_in: usize) -> TechRegistry {
    let mut records = Vec::with_capacity(layers * width);
    for layer in 0..layers {
        for i in 0..width {
            let id = format!("tech_{layer}_{i}");
            let parents: Vec<String> = if layer == 0 {
                Vec::new()
            } else {
                (0..fan_in.min(width))
                    .map(|k| format!("tech_{}_{}", layer - 1, (i + k) % width))
                    .collect()
            };
            let refs: Vec<&str> = parents.iter().map(String::as_str).collect();
            records.push(tech(&id, &refs));
        }
    }
    registry_of(records)
}

/// Script text for the same shape as [`layered_registry`], with a shared
/// cost variable per layer.
pub fn layered_script(layers: usize, width: usize, fan_in: usize) -> String {
    let mut out = String::new();
    for layer in 0..layers {
        out.push_str(&format!("@tier{layer}cost1 = {}\n", (layer + 1) * 100));
    }
    for layer in 0..layers {
        for i in 0..width {
            out.push_str(&format!(
                "tech_{layer}_{i} = {{\n    area = physics\n    tier = {layer}\n    cost = @tier{layer}cost1\n"
            ));
            if layer > 0 {
                out.push_str("    prerequisites = {");
                for k in 0..fan_in.min(width) {
                    out.push_str(&format!(" \"tech_{}_{}\"", layer - 1, (i + k) % width));
                }
                out.push_str(" }\n");
            }
            out.push_str("}\n");
        }
    }
    out
}
