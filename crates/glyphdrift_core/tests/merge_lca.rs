use glyphdrift_core::digest::sha256_hex;
use glyphdrift_core::merge::interleave_tokens;
use glyphdrift_core::service::evolution_service::{EdgeKind, LineageRole};
use glyphdrift_core::{
    document_service, evolution_service, open_db_in_memory, BranchId, BranchMode, DocumentId,
    EngineConfig, EventKind, MergeStrategy, SqliteEvolutionService,
};
use rusqlite::Connection;
use serde_json::{json, Value};

#[test]
fn sibling_merge_finds_shared_parent() {
    let conn = open_db_in_memory().unwrap();
    let doc = ingest(&conn, "the old road runs west toward the sea");
    let engine = evolution_service(&conn, EngineConfig::default());
    let base = evolve(&engine, None, Some(doc), "natural_drift", json!({}));
    let left = evolve(
        &engine,
        Some(base),
        None,
        "glyph_fusion",
        json!({ "left": "o", "right": "l", "fused": "ǫ" }),
    );
    let right = evolve(
        &engine,
        Some(base),
        None,
        "synthetic_mutation",
        json!({ "seed": 3, "mutation_rate": 1.0 }),
    );

    let merged = engine
        .merge_branches(left, right, MergeStrategy::Interleave, BranchMode::Public)
        .unwrap();
    assert_eq!(merged.lca_branch_id, Some(base));

    let left_text = engine.replay(left, true).unwrap().text;
    let right_text = engine.replay(right, true).unwrap().text;
    let expected = interleave_tokens(&left_text, &right_text);
    assert_eq!(merged.merged_text_hash, sha256_hex(&expected));
    assert_eq!(merged.conflict_semantics.resolution, "interleaved");

    let branch = engine.get_branch(merged.branch_id).unwrap();
    assert_eq!(branch.parent_branch_id, Some(left));
    assert_eq!(branch.root_document_id, Some(doc));
    assert_eq!(branch.state_snapshot.current_text, expected);

    let replay = engine.replay_branch(merged.branch_id, false).unwrap();
    assert_eq!(replay.text_hash, merged.merged_text_hash);
}

#[test]
fn merge_event_records_both_sides() {
    let conn = open_db_in_memory().unwrap();
    let doc = ingest(&conn, "stone and water");
    let engine = evolution_service(&conn, EngineConfig::default());
    let left = evolve(&engine, None, Some(doc), "natural_drift", json!({}));
    let right = evolve(
        &engine,
        None,
        Some(doc),
        "phase_shift",
        json!({ "phase": "peak", "seed": 4 }),
    );

    let merged = engine
        .merge_branches(left, right, MergeStrategy::RightWins, BranchMode::Raw)
        .unwrap();
    assert_eq!(merged.lca_branch_id, None);
    assert_eq!(merged.conflict_semantics.resolution, "right_preferred");

    let timeline = engine.get_timeline(merged.branch_id).unwrap();
    let event = timeline.events.last().unwrap();
    assert_eq!(event.event_type, EventKind::Merge);
    assert_eq!(event.event_payload["strategy"], json!("right_wins"));
    assert_eq!(event.event_payload["seed"], json!(0));
    assert_eq!(
        event.event_payload["left_branch_id"],
        json!(left.to_string())
    );
    assert_eq!(
        event.event_payload["right_branch_id"],
        json!(right.to_string())
    );
    let right_text = engine.replay(right, true).unwrap().text;
    assert_eq!(event.event_payload["right_hash"], json!(sha256_hex(&right_text)));
    assert_eq!(event.event_payload["merged_text"], json!(right_text));
    assert_eq!(
        event.event_payload["conflict_semantics"]["strategy"],
        json!("right_wins")
    );
    assert_eq!(timeline.branch.mode, BranchMode::Raw);
}

#[test]
fn merging_a_branch_with_itself_reports_identical_inputs() {
    let conn = open_db_in_memory().unwrap();
    let doc = ingest(&conn, "echoes in the hall");
    let engine = evolution_service(&conn, EngineConfig::default());
    let tip = evolve(&engine, None, Some(doc), "natural_drift", json!({}));

    let merged = engine
        .merge_branches(tip, tip, MergeStrategy::LeftWins, BranchMode::Public)
        .unwrap();
    assert_eq!(merged.lca_branch_id, Some(tip));
    assert_eq!(merged.conflict_semantics.resolution, "identical_inputs");
    assert_eq!(
        merged.merged_text_hash,
        engine.get_branch(tip).unwrap().state_snapshot.text_hash
    );
}

#[test]
fn lca_is_deepest_shared_ancestor() {
    let conn = open_db_in_memory().unwrap();
    let doc = ingest(&conn, "wind over the heather");
    let engine = evolution_service(&conn, EngineConfig::default());
    let root = evolve(&engine, None, Some(doc), "natural_drift", json!({}));
    let shared = evolve(&engine, Some(root), None, "reverse_drift", json!({}));
    let left = evolve(&engine, Some(shared), None, "natural_drift", json!({}));
    let left_deep = evolve(
        &engine,
        Some(left),
        None,
        "phase_shift",
        json!({ "phase": "rebirth", "seed": 2 }),
    );
    let right = evolve(
        &engine,
        Some(shared),
        None,
        "synthetic_mutation",
        json!({ "seed": 8 }),
    );

    let merged = engine
        .merge_branches(left_deep, right, MergeStrategy::LeftWins, BranchMode::Public)
        .unwrap();
    assert_eq!(merged.lca_branch_id, Some(shared));
}

#[test]
fn visualization_links_merged_lineages() {
    let conn = open_db_in_memory().unwrap();
    let doc = ingest(&conn, "bright rivers and cold stones");
    let engine = evolution_service(&conn, EngineConfig::default());
    let base = evolve(&engine, None, Some(doc), "natural_drift", json!({}));
    let left = evolve(&engine, Some(base), None, "reverse_drift", json!({}));
    let right = evolve(
        &engine,
        Some(base),
        None,
        "phase_shift",
        json!({ "phase": "compression", "seed": 6 }),
    );
    let merged = engine
        .merge_branches(left, right, MergeStrategy::Interleave, BranchMode::Public)
        .unwrap();

    let graph = engine.get_visualization(merged.branch_id).unwrap();
    assert_eq!(graph.summary.tip_branch_id, merged.branch_id);
    assert_eq!(graph.summary.root_document_id, Some(doc));
    assert_eq!(graph.summary.primary_branches, 3);
    assert_eq!(graph.summary.secondary_branches, 1);
    assert_eq!(graph.summary.node_count, 4);
    assert_eq!(graph.summary.merge_count, 1);
    assert_eq!(graph.summary.edge_count, graph.edges.len());

    let event_of = |branch: BranchId| {
        graph
            .nodes
            .iter()
            .find(|node| node.branch_id == branch)
            .map(|node| node.id)
            .unwrap()
    };
    let right_node = graph
        .nodes
        .iter()
        .find(|node| node.branch_id == right)
        .unwrap();
    assert_eq!(right_node.lineage, LineageRole::Secondary);

    let has_edge = |from: BranchId, to: BranchId, kind: EdgeKind| {
        graph
            .edges
            .iter()
            .any(|edge| edge.from == event_of(from) && edge.to == event_of(to) && edge.kind == kind)
    };
    assert!(has_edge(base, left, EdgeKind::Parent));
    assert!(has_edge(left, merged.branch_id, EdgeKind::Parent));
    assert!(has_edge(right, merged.branch_id, EdgeKind::MergeParent));
    assert!(has_edge(base, right, EdgeKind::Parent));
    assert_eq!(graph.edges.len(), 4);
}

#[test]
fn visualization_of_single_branch_has_no_edges() {
    let conn = open_db_in_memory().unwrap();
    let doc = ingest(&conn, "a lone tower");
    let engine = evolution_service(&conn, EngineConfig::default());
    let tip = evolve(&engine, None, Some(doc), "natural_drift", json!({}));

    let graph = engine.get_visualization(tip).unwrap();
    assert_eq!(graph.nodes.len(), 1);
    assert!(graph.edges.is_empty());
    assert_eq!(graph.nodes[0].event_type, EventKind::NaturalDrift);
    assert_eq!(graph.nodes[0].lineage, LineageRole::Primary);
}

fn evolve(
    engine: &SqliteEvolutionService<'_>,
    parent: Option<BranchId>,
    root: Option<DocumentId>,
    event_type: &str,
    payload: Value,
) -> BranchId {
    engine
        .evolve_branch(parent, root, event_type, &payload, BranchMode::Public)
        .unwrap()
        .branch_id
}

fn ingest(conn: &Connection, text: &str) -> DocumentId {
    document_service(conn)
        .ingest_text("fixture", text, false)
        .unwrap()
        .document
        .id
}
