use glyphdrift_core::digest::sha256_hex;
use glyphdrift_core::{document_service, open_db_in_memory, AtomLevel, EngineError, IngestStatus};
use rusqlite::Connection;

const TEXT: &str = "The knight rode north. He wrote at night.\n\nWinter came slowly.";

#[test]
fn ingest_stores_document_and_atoms() {
    let conn = open_db_in_memory().unwrap();
    let service = document_service(&conn);

    let outcome = service.ingest_text("ballad", TEXT, false).unwrap();
    assert_eq!(outcome.status, IngestStatus::Created);
    assert_eq!(outcome.document.title, "ballad");
    assert_eq!(outcome.document.checksum, sha256_hex(TEXT));
    assert_eq!(outcome.document.extracted_text(), TEXT);
    assert_eq!(outcome.atom_count as i64, count_rows(&conn, "atoms"));

    let paragraphs = service
        .list_atoms(outcome.document.id, Some(AtomLevel::Paragraph))
        .unwrap();
    assert_eq!(paragraphs.len(), 2);
    assert_eq!(paragraphs[1].content, "Winter came slowly.");

    let sentences = service
        .list_atoms(outcome.document.id, Some(AtomLevel::Sentence))
        .unwrap();
    let contents: Vec<&str> = sentences.iter().map(|atom| atom.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["The knight rode north.", "He wrote at night.", "Winter came slowly."]
    );

    let words = service
        .list_atoms(outcome.document.id, Some(AtomLevel::Word))
        .unwrap();
    assert_eq!(words.len(), 11);
    let ordinals: Vec<u32> = words.iter().map(|atom| atom.ordinal).collect();
    assert_eq!(ordinals, (1..=11).collect::<Vec<u32>>());

    let glyphs = service
        .list_atoms(outcome.document.id, Some(AtomLevel::GlyphSeed))
        .unwrap();
    assert!(glyphs.iter().all(|atom| atom.content.chars().count() == 1));
}

#[test]
fn reingest_of_same_text_is_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let service = document_service(&conn);

    let first = service.ingest_text("ballad", TEXT, false).unwrap();
    let second = service.ingest_text("renamed", TEXT, false).unwrap();
    assert_eq!(second.status, IngestStatus::Unchanged);
    assert_eq!(second.document.id, first.document.id);
    assert_eq!(second.document.title, "ballad");
    assert_eq!(second.atom_count, first.atom_count);
    assert_eq!(count_rows(&conn, "documents"), 1);
}

#[test]
fn forced_reingest_rebuilds_atoms_in_place() {
    let conn = open_db_in_memory().unwrap();
    let service = document_service(&conn);

    let first = service.ingest_text("ballad", TEXT, false).unwrap();
    let before = service.list_atoms(first.document.id, None).unwrap();
    let forced = service.ingest_text("ballad v2", TEXT, true).unwrap();

    assert_eq!(forced.status, IngestStatus::Replaced);
    assert_eq!(forced.document.id, first.document.id);
    assert_eq!(forced.atom_count, first.atom_count);
    assert_eq!(service.get_document(first.document.id).unwrap().title, "ballad v2");

    let after = service.list_atoms(first.document.id, None).unwrap();
    assert_eq!(after.len(), before.len());
    assert!(after.iter().all(|atom| before.iter().all(|old| old.id != atom.id)));
    assert_eq!(count_rows(&conn, "documents"), 1);
}

#[test]
fn blank_text_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = document_service(&conn);

    let err = service.ingest_text("empty", "  \n\t ", false).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(count_rows(&conn, "documents"), 0);
}

#[test]
fn unknown_document_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = document_service(&conn);
    let missing = uuid::Uuid::new_v4();

    assert!(matches!(
        service.get_document(missing),
        Err(EngineError::NotFound { entity: "document", id }) if id == missing
    ));
    assert!(matches!(
        service.list_atoms(missing, None),
        Err(EngineError::NotFound { .. })
    ));
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}
