//! Per-run context: registry, graph, shared variables and names.
//!
//! A [`TechCatalog`] replaces process-wide state. Ingestion mutates the
//! registry and marks the graph stale; queries go through a
//! [`CatalogView`], which only exists while the graph is current.

use crate::diagnostics::Diagnostic;
use crate::graph::TechGraph;
use crate::names::NameTable;
use crate::output::TechOutput;
use crate::record::{Provenance, TechRecord};
use crate::registry::{IngestPolicy, TechRegistry};
use crate::resolve::{Extraction, extract_records};
use techtree_script::{VariableTable, parse_document};

#[derive(Debug, Default)]
pub struct TechCatalog {
    registry: TechRegistry,
    graph: Option<TechGraph>,
    shared_variables: VariableTable,
    names: NameTable,
    policy: IngestPolicy,
}

impl TechCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: IngestPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> IngestPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: IngestPolicy) {
        self.policy = policy;
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Parse and resolve `text` against the shared variables without
    /// touching the registry. Safe to run on many files at once.
    pub fn extract(&self, text: &str, provenance: &Provenance) -> Extraction {
        extract_records(&parse_document(text), Some(&self.shared_variables), provenance)
    }

    /// Ingest an extraction's records in order and queue its diagnostics.
    /// Returns the records that were accepted.
    pub fn ingest_extraction(&mut self, extraction: Extraction) -> Vec<TechRecord> {
        for diagnostic in extraction.diagnostics {
            self.registry.report(diagnostic);
        }
        let mut accepted = Vec::with_capacity(extraction.records.len());
        for record in extraction.records {
            if self.registry.ingest(record.clone(), self.policy) {
                accepted.push(record);
            }
        }
        accepted
    }

    /// Parse one source text and ingest every technology in it.
    pub fn ingest_text(&mut self, text: &str, provenance: Provenance) -> Vec<TechRecord> {
        let extraction = self.extract(text, &provenance);
        self.ingest_extraction(extraction)
    }

    pub fn ingest_record(&mut self, record: TechRecord) -> bool {
        self.registry.ingest(record, self.policy)
    }

    /// Load a scripted-variables file into the shared table. Later files
    /// override earlier declarations. Returns the number of declarations.
    pub fn declare_variables(&mut self, text: &str, file: &str) -> usize {
        let doc = parse_document(text);
        if let Some(err) = &doc.lex_error {
            tracing::warn!(file = %file, error = %err, "lex error in variables file");
            self.registry.report(Diagnostic::in_file(file, err.clone()));
        }
        for err in &doc.parse_errors {
            tracing::warn!(file = %file, error = %err, "skipped malformed declaration");
            self.registry.report(Diagnostic::in_file(file, err.clone()));
        }
        let declared = doc.variables();
        let count = declared.len();
        self.shared_variables.extend(&declared);
        tracing::debug!(file = %file, count, "declared shared variables");
        count
    }

    pub fn shared_variables(&self) -> &VariableTable {
        &self.shared_variables
    }

    /// Drop all records, variables and the graph. Display names are kept.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.shared_variables.clear();
        self.graph = None;
    }

    /// Pending diagnostics, including graph warnings from the last rebuild.
    pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.registry.drain_diagnostics()
    }

    // -----------------------------------------------------------------------
    // Graph
    // -----------------------------------------------------------------------

    /// Build the graph from the current registry. Its warnings are queued as
    /// diagnostics.
    pub fn rebuild_graph(&mut self) -> &TechGraph {
        let graph = TechGraph::build(&self.registry);
        for warning in graph.warnings() {
            self.registry.report(Diagnostic::new(None, warning.clone()));
        }
        self.graph.insert(graph)
    }

    /// The graph, unless ingestion happened since the last rebuild.
    pub fn graph(&self) -> Option<&TechGraph> {
        self.graph
            .as_ref()
            .filter(|g| g.is_current(&self.registry))
    }

    pub fn registry(&self) -> &TechRegistry {
        &self.registry
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut NameTable {
        &mut self.names
    }

    /// Query view; `None` while the graph is missing or stale.
    pub fn view(&self) -> Option<CatalogView<'_>> {
        Some(CatalogView {
            registry: &self.registry,
            graph: self.graph()?,
            names: &self.names,
        })
    }
}

// ---------------------------------------------------------------------------
// CatalogView
// ---------------------------------------------------------------------------

/// Read-only queries over a registry and its current graph.
#[derive(Debug, Clone, Copy)]
pub struct CatalogView<'a> {
    registry: &'a TechRegistry,
    graph: &'a TechGraph,
    names: &'a NameTable,
}

impl<'a> CatalogView<'a> {
    pub fn graph(&self) -> &'a TechGraph {
        self.graph
    }

    pub fn all(&self) -> Vec<&'a TechRecord> {
        self.registry.iter().collect()
    }

    pub fn get(&self, id: &str) -> Option<&'a TechRecord> {
        self.registry.get(id)
    }

    pub fn by_area(&self, area: &str) -> Vec<&'a TechRecord> {
        self.registry.by_area(area)
    }

    pub fn by_category(&self, category: &str) -> Vec<&'a TechRecord> {
        self.registry.by_category(category)
    }

    pub fn by_tier(&self, tier: u32) -> Vec<&'a TechRecord> {
        self.registry.by_tier(tier)
    }

    pub fn prerequisites(&self, id: &str) -> Vec<&'a str> {
        self.graph.prerequisites(id)
    }

    pub fn dependents(&self, id: &str) -> Vec<&'a str> {
        self.graph.dependents(id)
    }

    pub fn roots(&self) -> Vec<&'a str> {
        self.graph.roots()
    }

    pub fn depth(&self, id: &str) -> Option<u32> {
        self.graph.depth(id)
    }

    pub fn path_to_root(&self, id: &str) -> Vec<&'a str> {
        self.graph.path_to_root(id)
    }

    pub fn display_name(&self, id: &str) -> String {
        self.names.display_name(id)
    }

    /// Case-insensitive substring match on id, display name, area and area
    /// display name. Registry order, unranked.
    pub fn search(&self, query: &str) -> Vec<&'a TechRecord> {
        let needle = query.to_lowercase();
        self.registry
            .iter()
            .filter(|r| {
                r.id.to_lowercase().contains(&needle)
                    || self.names.display_name(&r.id).to_lowercase().contains(&needle)
                    || r.area.to_lowercase().contains(&needle)
                    || (!r.area.is_empty()
                        && self.names.display_name(&r.area).to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn output(&self, id: &str) -> Option<TechOutput> {
        let record = self.registry.get(id)?;
        Some(self.output_for(record))
    }

    pub fn outputs(&self) -> Vec<TechOutput> {
        self.registry.iter().map(|r| self.output_for(r)).collect()
    }

    fn output_for(&self, record: &TechRecord) -> TechOutput {
        let children = self
            .graph
            .dependents(&record.id)
            .into_iter()
            .map(String::from)
            .collect();
        TechOutput::new(record, self.names.display_name(&record.id), children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TECHS: &str = r#"
        tech_a = { area = physics tier = 0 }
        tech_b = {
            area = physics
            tier = 1
            prerequisites = { "tech_a" }
        }
    "#;

    #[test]
    fn ingest_then_query() {
        let mut catalog = TechCatalog::new();
        let records = catalog.ingest_text(TWO_TECHS, Provenance::base("a.txt"));
        assert_eq!(records.len(), 2);

        assert!(catalog.view().is_none());
        catalog.rebuild_graph();
        let view = catalog.view().unwrap();
        assert_eq!(view.roots(), vec!["tech_a"]);
        assert_eq!(view.depth("tech_b"), Some(1));
        assert_eq!(view.path_to_root("tech_b"), vec!["tech_a", "tech_b"]);
        assert_eq!(view.dependents("tech_a"), vec!["tech_b"]);
        assert_eq!(view.all().len(), 2);
        assert_eq!(view.by_tier(1)[0].id, "tech_b");
    }

    #[test]
    fn ingestion_makes_graph_stale() {
        let mut catalog = TechCatalog::new();
        catalog.ingest_text(TWO_TECHS, Provenance::base("a.txt"));
        catalog.rebuild_graph();
        assert!(catalog.graph().is_some());

        catalog.ingest_text("tech_c = { tier = 2 }", Provenance::base("c.txt"));
        assert!(catalog.graph().is_none());
        assert!(catalog.view().is_none());
        assert_eq!(catalog.rebuild_graph().len(), 3);
    }

    #[test]
    fn shared_variables_apply_to_later_files() {
        let mut catalog = TechCatalog::new();
        assert_eq!(catalog.declare_variables("@tier1cost1 = 480", "vars.txt"), 1);
        let records =
            catalog.ingest_text("tech_x = { cost = @tier1cost1 }", Provenance::base("x.txt"));
        assert_eq!(records[0].cost, 480.0);
        assert!(catalog.drain_diagnostics().is_empty());
    }

    #[test]
    fn search_matches_names_and_areas() {
        let mut catalog = TechCatalog::new();
        catalog.ingest_text(
            "tech_lasers_1 = { area = physics } tech_farming = { area = society }",
            Provenance::base("s.txt"),
        );
        catalog.names_mut().insert("tech_farming", "Hydroponics");
        catalog.names_mut().insert("society", "Sociology");
        catalog.rebuild_graph();
        let view = catalog.view().unwrap();

        let ids = |q: &str| view.search(q).iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids("LASER"), vec!["tech_lasers_1"]);
        assert_eq!(ids("hydro"), vec!["tech_farming"]);
        assert_eq!(ids("socio"), vec!["tech_farming"]);
        assert_eq!(ids("phys"), vec!["tech_lasers_1"]);
        assert_eq!(ids("tech").len(), 2);
        assert!(ids("nothing").is_empty());
    }

    #[test]
    fn outputs_carry_children_and_source() {
        let mut catalog = TechCatalog::new();
        catalog.ingest_text(TWO_TECHS, Provenance::base("a.txt"));
        catalog.rebuild_graph();
        let view = catalog.view().unwrap();
        let a = view.output("tech_a").unwrap();
        assert_eq!(a.child_techs, vec!["tech_b"]);
        assert_eq!(a.display_name, "A");
        assert_eq!(a.source.mod_id, "base");
        assert_eq!(view.outputs().len(), 2);
        assert!(view.output("missing").is_none());
    }

    #[test]
    fn rejected_records_are_not_returned() {
        let mut catalog = TechCatalog::with_policy(IngestPolicy::InsertIfAbsent);
        catalog.ingest_text("t = { tier = 1 }", Provenance::base("a.txt"));
        let again = catalog.ingest_text("t = { tier = 2 }", Provenance::new("b.txt", "m", 1));
        assert!(again.is_empty());
        assert_eq!(catalog.registry().get("t").unwrap().tier, 1);
        assert_eq!(catalog.drain_diagnostics().len(), 1);
    }

    #[test]
    fn graph_warnings_become_diagnostics() {
        let mut catalog = TechCatalog::new();
        catalog.ingest_text(
            "tech_y = { prerequisites = { \"tech_missing\" } }",
            Provenance::base("y.txt"),
        );
        catalog.rebuild_graph();
        let view = catalog.view().unwrap();
        assert!(view.prerequisites("tech_y").is_empty());
        assert_eq!(view.get("tech_y").unwrap().prerequisites.ids(), vec!["tech_missing"]);
        assert_eq!(catalog.drain_diagnostics().len(), 1);
    }

    #[test]
    fn clear_resets_everything_but_names() {
        let mut catalog = TechCatalog::new();
        catalog.names_mut().insert("tech_a", "Alpha");
        catalog.declare_variables("@x = 1", "v.txt");
        catalog.ingest_text(TWO_TECHS, Provenance::base("a.txt"));
        catalog.rebuild_graph();
        catalog.clear();
        assert!(catalog.registry().is_empty());
        assert!(catalog.shared_variables().is_empty());
        assert!(catalog.graph().is_none());
        assert_eq!(catalog.names().get("tech_a"), Some("Alpha"));
    }
}
