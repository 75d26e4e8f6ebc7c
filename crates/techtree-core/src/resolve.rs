//! Record builder: parse tree to [`TechRecord`].
//!
//! Each typed field is validated and defaulted on its own; a field that
//! cannot be resolved takes its documented fallback and yields a
//! [`ResolutionError`], but the record is always built.

use crate::diagnostics::Diagnostic;
use crate::record::{PrereqCondition, Prerequisites, Provenance, TechRecord};
use techtree_script::parser::is_assignment;
use techtree_script::variables::{tier_from_name, trailing_number};
use techtree_script::{Document, ParseValue, Scalar, Statement, VariableScope, VariableTable};

/// Keys that mark a top-level block as a technology.
pub const TECH_FIELDS: &[&str] = &[
    "area",
    "tier",
    "cost",
    "weight",
    "category",
    "prerequisites",
    "start_tech",
    "is_rare",
    "is_dangerous",
    "levels",
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("{tech}.{field}: variable @{name} could not be resolved, using {fallback}")]
    UnresolvedVariable {
        tech: String,
        field: &'static str,
        name: String,
        fallback: f64,
    },

    #[error("{tech}.{field}: expected {expected}, found {found}")]
    UnexpectedShape {
        tech: String,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{tech}.prerequisites: unsupported group key {key:?}")]
    UnknownPrerequisiteGroup { tech: String, key: String },
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Records pulled out of one document plus every diagnostic raised on the
/// way (lex, parse and resolution).
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<TechRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// `true` when a top-level statement defines a technology.
pub fn is_tech_entry(stmt: &Statement) -> bool {
    if stmt.is_variable_declaration() || !is_assignment(stmt.op) {
        return false;
    }
    match &stmt.value {
        ParseValue::Block(body) => body.iter().any(|s| TECH_FIELDS.contains(&s.key.as_str())),
        _ => false,
    }
}

/// Build every technology in `doc`. Variables declared in the document
/// shadow those in `shared`.
pub fn extract_records(
    doc: &Document,
    shared: Option<&VariableTable>,
    provenance: &Provenance,
) -> Extraction {
    let file = &provenance.file;
    let mut out = Extraction::default();

    if let Some(err) = &doc.lex_error {
        tracing::warn!(file = %file, error = %err, "lex error, keeping entries before it");
        out.diagnostics.push(Diagnostic::in_file(file.clone(), err.clone()));
    }
    for err in &doc.parse_errors {
        tracing::warn!(file = %file, error = %err, "skipped malformed entry");
        out.diagnostics.push(Diagnostic::in_file(file.clone(), err.clone()));
    }

    let local = doc.variables();
    let scope = match shared {
        Some(shared) => VariableScope::with_shared(&local, shared),
        None => VariableScope::new(&local),
    };

    for stmt in doc.entries().filter(|s| is_tech_entry(s)) {
        let Some(body) = stmt.value.as_block() else {
            continue;
        };
        let (record, errors) = build_record(&stmt.key, body, scope, provenance.clone());
        for err in errors {
            tracing::warn!(file = %file, error = %err, "field fallback");
            out.diagnostics.push(Diagnostic::in_file(file.clone(), err));
        }
        out.records.push(record);
    }

    tracing::debug!(
        file = %file,
        records = out.records.len(),
        diagnostics = out.diagnostics.len(),
        "extracted records"
    );
    out
}

/// Build one record from the body of `id = { ... }`.
pub fn build_record(
    id: &str,
    body: &[Statement],
    scope: VariableScope<'_>,
    provenance: Provenance,
) -> (TechRecord, Vec<ResolutionError>) {
    let mut fields = FieldResolver {
        tech: id,
        scope,
        errors: Vec::new(),
    };
    let mut record = TechRecord::new(id, provenance);

    for stmt in body {
        let value = &stmt.value;
        match stmt.key.as_str() {
            "area" => {
                if let Some(area) = fields.text("area", value) {
                    record.area = area;
                }
            }
            "tier" => record.tier = fields.tier(value),
            "cost" => record.cost = fields.number("cost", value),
            "weight" => record.weight = fields.number("weight", value),
            "cost_per_level" => {
                record.cost_per_level = Some(fields.number("cost_per_level", value))
            }
            "levels" => record.levels = Some(fields.number("levels", value) as i64),
            "category" => record.category = fields.text_list("category", value),
            "gateway" => record.gateway = fields.text("gateway", value),
            "start_tech" => record.flags.is_starting_tech = fields.flag("start_tech", value, false),
            "is_rare" => record.flags.is_rare = fields.flag("is_rare", value, false),
            "is_dangerous" => record.flags.is_dangerous = fields.flag("is_dangerous", value, false),
            "is_reverse_engineerable" => {
                record.is_reverse_engineerable = fields.flag("is_reverse_engineerable", value, true)
            }
            "prerequisites" => record.prerequisites = fields.prerequisites(value),
            _ => record.extra.push(stmt.clone()),
        }
    }

    (record, fields.errors)
}

// ---------------------------------------------------------------------------
// Field resolution
// ---------------------------------------------------------------------------

struct FieldResolver<'a> {
    tech: &'a str,
    scope: VariableScope<'a>,
    errors: Vec<ResolutionError>,
}

impl FieldResolver<'_> {
    fn shape(&mut self, field: &'static str, expected: &'static str, found: &ParseValue) {
        self.errors.push(ResolutionError::UnexpectedShape {
            tech: self.tech.to_string(),
            field,
            expected,
            found: found.kind_name(),
        });
    }

    fn unresolved(&mut self, field: &'static str, name: &str, fallback: f64) {
        self.errors.push(ResolutionError::UnresolvedVariable {
            tech: self.tech.to_string(),
            field,
            name: name.to_string(),
            fallback,
        });
    }

    fn text(&mut self, field: &'static str, value: &ParseValue) -> Option<String> {
        match value.as_scalar().and_then(Scalar::as_text) {
            Some(text) => Some(text.to_string()),
            None => {
                self.shape(field, "identifier", value);
                None
            }
        }
    }

    fn text_list(&mut self, field: &'static str, value: &ParseValue) -> Vec<String> {
        match value {
            ParseValue::Scalar(Scalar::String(s) | Scalar::Identifier(s)) => vec![s.clone()],
            ParseValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_text() {
                        Some(text) => out.push(text.to_string()),
                        None => self.shape(field, "identifier", &ParseValue::Scalar(item.clone())),
                    }
                }
                out
            }
            ParseValue::Block(stmts) if stmts.is_empty() => Vec::new(),
            other => {
                self.shape(field, "identifier list", other);
                Vec::new()
            }
        }
    }

    fn flag(&mut self, field: &'static str, value: &ParseValue, default: bool) -> bool {
        match value.as_scalar().and_then(Scalar::as_bool) {
            Some(b) => b,
            None => {
                self.shape(field, "yes/no", value);
                default
            }
        }
    }

    /// Literal or variable; undeclared variables fall back to the name's
    /// trailing digits.
    fn number(&mut self, field: &'static str, value: &ParseValue) -> f64 {
        match value {
            ParseValue::Scalar(Scalar::Number(n)) => *n,
            ParseValue::Scalar(Scalar::Variable(name)) => match self.scope.resolve_number(name) {
                Some(n) => n,
                None => {
                    let fallback = trailing_number(name).map_or(0.0, |n| n as f64);
                    self.unresolved(field, name, fallback);
                    fallback
                }
            },
            ParseValue::Scalar(Scalar::String(s)) if s.parse::<f64>().is_ok() => {
                s.parse().unwrap_or(0.0)
            }
            other => {
                self.shape(field, "number", other);
                0.0
            }
        }
    }

    /// Non-negative integer, literal or variable. Anything else keeps tier 0.
    fn tier(&mut self, value: &ParseValue) -> u32 {
        let n = match value {
            ParseValue::Scalar(Scalar::Number(n)) => *n,
            ParseValue::Scalar(Scalar::Variable(name)) => match self.scope.resolve_number(name) {
                Some(n) => n,
                None => {
                    let fallback =
                        tier_from_name(name).map_or(0, |n| n.min(u32::MAX as u64) as u32);
                    self.unresolved("tier", name, f64::from(fallback));
                    return fallback;
                }
            },
            other => {
                self.shape("tier", "non-negative integer", other);
                return 0;
            }
        };

        match whole_tier(n) {
            Some(tier) => tier,
            None => {
                self.shape("tier", "non-negative integer", value);
                0
            }
        }
    }

    fn prerequisites(&mut self, value: &ParseValue) -> Prerequisites {
        match value {
            ParseValue::Array(items) => {
                let mut prereqs = Prerequisites::default();
                for item in items {
                    match item.as_text() {
                        Some(id) => prereqs.push_required(id.to_string()),
                        None => self.shape(
                            "prerequisites",
                            "tech id",
                            &ParseValue::Scalar(item.clone()),
                        ),
                    }
                }
                prereqs
            }
            ParseValue::Scalar(Scalar::String(id) | Scalar::Identifier(id)) => {
                Prerequisites::required([id.clone()])
            }
            ParseValue::Block(stmts) => {
                let items = self.conditions(stmts);
                let mut prereqs = Prerequisites::default();
                for item in &items {
                    normalize(item, &mut prereqs);
                }
                prereqs.condition = Some(PrereqCondition::All(items));
                prereqs
            }
            other => {
                self.shape("prerequisites", "tech list", other);
                Prerequisites::default()
            }
        }
    }

    /// `AND`/`OR`/`NOT` statements of a prerequisite block.
    fn conditions(&mut self, stmts: &[Statement]) -> Vec<PrereqCondition> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            let children = self.group_members(&stmt.value);
            let condition = match stmt.key.to_ascii_uppercase().as_str() {
                "AND" => PrereqCondition::All(children),
                "OR" => PrereqCondition::Any(children),
                "NOT" | "NOR" => PrereqCondition::Not(children),
                _ => {
                    self.errors.push(ResolutionError::UnknownPrerequisiteGroup {
                        tech: self.tech.to_string(),
                        key: stmt.key.clone(),
                    });
                    continue;
                }
            };
            out.push(condition);
        }
        out
    }

    fn group_members(&mut self, value: &ParseValue) -> Vec<PrereqCondition> {
        match value {
            ParseValue::Array(items) => items
                .iter()
                .filter_map(|s| s.as_text().map(|id| PrereqCondition::Tech(id.to_string())))
                .collect(),
            ParseValue::Block(stmts) => self.conditions(stmts),
            ParseValue::Scalar(Scalar::String(id) | Scalar::Identifier(id)) => {
                vec![PrereqCondition::Tech(id.clone())]
            }
            other => {
                self.shape("prerequisites", "tech group", other);
                Vec::new()
            }
        }
    }
}

fn whole_tier(n: f64) -> Option<u32> {
    (n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX)).then_some(n as u32)
}

/// Fold one condition at requirement level into the normalized sets.
fn normalize(condition: &PrereqCondition, prereqs: &mut Prerequisites) {
    match condition {
        PrereqCondition::Tech(id) => prereqs.push_required(id.clone()),
        PrereqCondition::All(items) => {
            for item in items {
                normalize(item, prereqs);
            }
        }
        PrereqCondition::Any(items) => {
            let mut alternatives = Vec::new();
            for item in items {
                collect_alternatives(item, &mut alternatives, prereqs);
            }
            prereqs.push_any_of(alternatives);
        }
        PrereqCondition::Not(items) => {
            for item in items {
                for id in item.mentioned_ids() {
                    if !prereqs.excluded.iter().any(|e| e == id) {
                        prereqs.excluded.push(id.to_string());
                    }
                }
            }
        }
    }
}

/// Ids inside an `OR`, flattened; a `NOT` nested there still only excludes.
fn collect_alternatives(
    condition: &PrereqCondition,
    alternatives: &mut Vec<String>,
    prereqs: &mut Prerequisites,
) {
    match condition {
        PrereqCondition::Tech(id) => alternatives.push(id.clone()),
        PrereqCondition::All(items) | PrereqCondition::Any(items) => {
            for item in items {
                collect_alternatives(item, alternatives, prereqs);
            }
        }
        PrereqCondition::Not(_) => normalize(condition, prereqs),
    }
}
