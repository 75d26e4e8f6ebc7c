//! Layered loading from a playset on disk: base game plus mods, shared
//! scripted variables, manifest formats and stop requests.

mod common;

use common::{cleanup, make_test_dir, write};
use std::path::Path;
use techtree_core::TechCatalog;
use techtree_data::{LoadManifest, StopHandle, ingest_file, load_playset};

const MANIFEST: &str = r#"
policy = "replace_always"

[[sources]]
id = "base"
name = "Base game"
path = "game"

[[sources]]
id = "3001"
name = "Late Overhaul"
path = "mods/overhaul"
load_order = 7

[[sources]]
id = "3000"
name = "Early Tweaks"
path = "mods/tweaks"
"#;

fn build_playset(dir: &Path) {
    write(dir, "playset.toml", MANIFEST);
    write(
        dir,
        "game/common/scripted_variables/00_costs.txt",
        "@tier0cost1 = 100\n@tier1cost1 = 480\n",
    );
    write(
        dir,
        "game/common/technology/00_physics.txt",
        r#"
        tech_a = { area = physics tier = 0 cost = @tier0cost1 }
        tech_b = { area = physics tier = 1 cost = @tier1cost1 prerequisites = { "tech_a" } }
        tech_z = { area = physics tier = 1 cost = @tier1cost1 prerequisites = { "tech_a" } }
        "#,
    );
    write(
        dir,
        "mods/tweaks/common/technology/00_tweaks.txt",
        "tech_z = { area = physics tier = 2 cost = @tier1cost1 prerequisites = { \"tech_b\" } }\n",
    );
    write(
        dir,
        "mods/overhaul/common/scripted_variables/zz_overhaul.txt",
        "@tier1cost1 = 999\n",
    );
    write(
        dir,
        "mods/overhaul/common/technology/50_overhaul.txt",
        r#"
        tech_z = { area = physics tier = 3 cost = @tier1cost1 prerequisites = { "tech_b" } }
        tech_new = { area = engineering tier = 1 prerequisites = { "tech_z" } }
        "#,
    );
}

#[test]
fn highest_load_order_wins() {
    common::init_tracing();
    let dir = make_test_dir("layers");
    build_playset(&dir);

    let manifest = LoadManifest::find(&dir).unwrap().unwrap();
    let mut catalog = TechCatalog::new();
    let report = load_playset(&mut catalog, &manifest, &StopHandle::new());
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.sources_loaded, 3);

    let z = catalog.registry().get("tech_z").unwrap();
    assert_eq!(z.tier, 3);
    assert_eq!(z.provenance.load_order, 7);
    assert_eq!(z.provenance.source_id, "3001");
    assert_eq!(z.cost, 999.0);

    // Base records resolved against the base variables before the override.
    assert_eq!(catalog.registry().get("tech_b").unwrap().cost, 480.0);

    catalog.rebuild_graph();
    let view = catalog.view().unwrap();
    assert_eq!(view.depth("tech_z"), Some(2));
    assert_eq!(
        view.path_to_root("tech_new"),
        vec!["tech_a", "tech_b", "tech_z", "tech_new"]
    );
    let order: Vec<_> = view.all().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(order, vec!["tech_a", "tech_b", "tech_z", "tech_new"]);

    cleanup(&dir);
}

#[test]
fn stop_request_halts_between_files() {
    common::init_tracing();
    let dir = make_test_dir("stop");
    build_playset(&dir);

    let manifest = LoadManifest::find(&dir).unwrap().unwrap();
    let stop = StopHandle::new();
    let remote = stop.clone();
    remote.stop();

    let mut catalog = TechCatalog::new();
    let report = load_playset(&mut catalog, &manifest, &stop);
    assert!(report.stopped);
    assert_eq!(report.sources_loaded, 0);
    assert!(catalog.registry().is_empty());

    cleanup(&dir);
}

#[test]
fn single_file_ingest_uses_given_provenance() {
    common::init_tracing();
    let dir = make_test_dir("single");
    build_playset(&dir);

    let mut catalog = TechCatalog::new();
    let path = dir.join("mods/overhaul/common/technology/50_overhaul.txt");
    let accepted = ingest_file(&mut catalog, &path, "3001", 7).unwrap();
    assert_eq!(accepted, 2);

    // Without shared variables the cost falls back to the name's digits.
    let z = catalog.registry().get("tech_z").unwrap();
    assert_eq!(z.cost, 1.0);
    assert_eq!(z.provenance.load_order, 7);
    assert_eq!(catalog.drain_diagnostics().len(), 1);

    cleanup(&dir);
}
