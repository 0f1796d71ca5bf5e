//! Tests for hits and dedup keys

use crate::cursor::Cursor;
use crate::hit::{DedupKey, Hit};
use crate::row::RowId;

fn line(object: &str, line: u64) -> RowId {
    RowId::Line {
        object: object.into(),
        line,
    }
}

#[test]
fn test_dedup_key_is_deterministic() {
    let a = DedupKey::derive(&line("a.jsonl", 3), "purchase");
    let b = DedupKey::derive(&line("a.jsonl", 3), "purchase");
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 32);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_dedup_key_depends_on_row_and_event() {
    let base = DedupKey::derive(&line("a.jsonl", 3), "purchase");
    assert_ne!(base, DedupKey::derive(&line("a.jsonl", 4), "purchase"));
    assert_ne!(base, DedupKey::derive(&line("b.jsonl", 3), "purchase"));
    assert_ne!(base, DedupKey::derive(&line("a.jsonl", 3), "refund"));
}

#[test]
fn test_dedup_key_separates_fields() {
    let a = DedupKey::derive(&RowId::Key { key: "ab".into() }, "c");
    let b = DedupKey::derive(&RowId::Key { key: "a".into() }, "bc");
    assert_ne!(a, b);
}

#[test]
fn test_hit_new_derives_key() {
    let row = RowId::Offset { index: 0 };
    let hit = Hit::new("cid", "login", row.clone(), Cursor::Offset { rows: 1 });
    assert_eq!(hit.dedup_key, DedupKey::derive(&row, "login"));
    assert!(hit.params.is_empty());
    assert!(hit.user_id.is_none());
}

#[test]
fn test_same_identity() {
    let a = Hit::new("c1", "e", RowId::Offset { index: 0 }, Cursor::Start);
    let mut b = Hit::new("c1", "f", RowId::Offset { index: 1 }, Cursor::Start);
    assert!(a.same_identity(&b));

    b.user_id = Some("u".into());
    assert!(!a.same_identity(&b));

    let c = Hit::new("c2", "e", RowId::Offset { index: 2 }, Cursor::Start);
    assert!(!a.same_identity(&c));
}
