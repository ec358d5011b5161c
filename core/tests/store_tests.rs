use std::fs;
use tempfile::tempdir;
use termscope_core::collection::field_statistics;
use termscope_core::{fields, Analyzer, Document, IndexError, IndexStore, OpenMode, Posting, StoredDocument};

fn doc(path: &str, text: &str) -> Document {
    Document::new(StoredDocument::with_path(path))
        .with_keyword(fields::PATH, path)
        .with_text(fields::CONTENTS, &Analyzer::new(), text)
}

fn assert_posting_invariants(store: &IndexStore) {
    for field in store.field_names() {
        let terms = store.terms(field).unwrap();
        let mut total = 0u64;
        for (term, postings) in terms.iter() {
            assert_eq!(store.doc_freq(field, term) as usize, postings.len());
            assert!(postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id), "{field}:{term} not sorted");
            total += postings.iter().map(|p| p.freq as u64).sum::<u64>();
        }
        assert_eq!(field_statistics(store, field).sum_total_term_freq as u64, total);
    }
}

#[test]
fn commit_and_reopen() {
    let dir = tempdir().unwrap();
    let mut store = IndexStore::open(dir.path(), OpenMode::Create).unwrap();
    assert!(store.is_fresh());
    store.add_document(doc("a", "apple apple banana")).unwrap();
    store.add_document(doc("b", "apple cherry")).unwrap();
    store.commit().unwrap();
    store.close().unwrap();

    let reopened = IndexStore::open(dir.path(), OpenMode::Append).unwrap();
    assert!(!reopened.is_fresh());
    assert_eq!(reopened.document_count(), 2);
    assert_eq!(reopened.document(1).unwrap().path, "b");
    assert_eq!(reopened.postings(fields::CONTENTS, "apple").unwrap(), &[
        Posting { doc_id: 0, freq: 2 },
        Posting { doc_id: 1, freq: 1 },
    ]);
    assert_posting_invariants(&reopened);
}

#[test]
fn open_modes() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("idx");

    assert!(matches!(IndexStore::open(&root, OpenMode::Append), Err(IndexError::IndexCorruption(_))));

    let mut store = IndexStore::open(&root, OpenMode::CreateOrAppend).unwrap();
    assert!(store.is_fresh());
    store.add_document(doc("a", "one")).unwrap();
    store.close().unwrap();

    let store = IndexStore::open(&root, OpenMode::CreateOrAppend).unwrap();
    assert_eq!(store.document_count(), 1);

    let store = IndexStore::open(&root, OpenMode::Create).unwrap();
    assert_eq!(store.document_count(), 0);
    let store = IndexStore::open(&root, OpenMode::Append).unwrap();
    assert_eq!(store.document_count(), 0);
}

#[test]
fn uncommitted_changes_are_not_visible() {
    let dir = tempdir().unwrap();
    let mut store = IndexStore::open(dir.path(), OpenMode::Create).unwrap();
    store.add_document(doc("a", "one")).unwrap();

    let other = IndexStore::open(dir.path(), OpenMode::Append).unwrap();
    assert_eq!(other.document_count(), 0);

    store.commit().unwrap();
    let other = IndexStore::open(dir.path(), OpenMode::Append).unwrap();
    assert_eq!(other.document_count(), 1);
}

#[test]
fn update_replaces_by_path() {
    let mut store = IndexStore::in_memory();
    store.add_document(doc("a", "old words")).unwrap();
    store.add_document(doc("b", "other")).unwrap();
    store.update_document("a", doc("a", "new words")).unwrap();

    let with_a: Vec<_> = store.documents().iter().filter(|d| d.path == "a").collect();
    assert_eq!(with_a.len(), 1);
    assert_eq!(store.document_count(), 2);
    assert!(store.postings(fields::CONTENTS, "old").is_none());
    assert_eq!(store.postings(fields::CONTENTS, "new").unwrap(), &[Posting { doc_id: 1, freq: 1 }]);
    assert_posting_invariants(&store);
}

#[test]
fn merge_renumbers_and_preserves_order() {
    let mut a = IndexStore::in_memory();
    a.add_document(doc("a0", "apple banana")).unwrap();
    a.add_document(doc("a1", "apple")).unwrap();
    let mut b = IndexStore::in_memory();
    b.add_document(doc("b0", "banana")).unwrap();
    b.add_document(doc("b1", "apple cherry")).unwrap();

    let mut merged = IndexStore::in_memory();
    merged.merge_from(&[&a, &b]).unwrap();

    assert_eq!(merged.document_count(), a.document_count() + b.document_count());
    let ids = |term: &str| -> Vec<u32> {
        merged.postings(fields::CONTENTS, term).unwrap().iter().map(|p| p.doc_id).collect()
    };
    assert_eq!(ids("apple"), vec![0, 1, 3]);
    assert_eq!(ids("banana"), vec![0, 2]);
    assert_eq!(ids("cherry"), vec![3]);
    assert_eq!(merged.document(2).unwrap().path, "b0");
    assert_posting_invariants(&merged);
}

#[test]
fn merge_from_paths_reads_segments() {
    let dir = tempdir().unwrap();
    for (name, text) in [("p0", "red green"), ("p1", "green blue")] {
        let mut s = IndexStore::open(dir.path().join(name), OpenMode::Create).unwrap();
        s.add_document(doc(name, text)).unwrap();
        s.close().unwrap();
    }
    let mut target = IndexStore::in_memory();
    target.add_document(doc("existing", "green")).unwrap();
    target.merge_from_paths(&[dir.path().join("p0"), dir.path().join("p1")]).unwrap();

    assert_eq!(target.document_count(), 3);
    let green: Vec<u32> = target.postings(fields::CONTENTS, "green").unwrap().iter().map(|p| p.doc_id).collect();
    assert_eq!(green, vec![0, 1, 2]);
}

#[test]
fn merge_fails_on_unreadable_segment() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good");
    let mut s = IndexStore::open(&good, OpenMode::Create).unwrap();
    s.add_document(doc("g", "fine")).unwrap();
    s.close().unwrap();

    let bad = dir.path().join("bad");
    let mut s = IndexStore::open(&bad, OpenMode::Create).unwrap();
    s.add_document(doc("b", "broken")).unwrap();
    s.close().unwrap();
    fs::write(bad.join("postings.bin"), b"not bincode").unwrap();

    let mut target = IndexStore::in_memory();
    let err = target.merge_from_paths(&[good, bad]).unwrap_err();
    assert!(matches!(err, IndexError::IndexCorruption(_)));
    assert_eq!(target.document_count(), 0);
}
