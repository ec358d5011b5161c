use criterion::{criterion_group, criterion_main, Criterion};
use termscope_core::tokenizer::tokenize;
use termscope_core::{fields, top_terms, Analyzer, Document, IndexStore, OrderKey, StoredDocument};

const TEXT: &str = "An inverted index maps every term to the documents that contain it. \
Posting lists are sorted by document id, and each posting records how often the term occurs. \
Term vectors span the whole collection and feed cosine similarity and k-means clustering.";

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_paragraph", |b| b.iter(|| tokenize(TEXT)));
}

fn bench_top_terms(c: &mut Criterion) {
    let analyzer = Analyzer::new();
    let mut store = IndexStore::in_memory();
    for i in 0..200 {
        let doc = Document::new(StoredDocument::with_path(format!("doc{i}")))
            .with_text(fields::CONTENTS, &analyzer, &TEXT.repeat(i % 5 + 1));
        store.add_document(doc).expect("in-memory add");
    }
    c.bench_function("top_terms_tfxidf", |b| b.iter(|| top_terms(&store, fields::CONTENTS, 7, OrderKey::TfIdf, 10)));
}

criterion_group!(benches, bench_tokenize, bench_top_terms);
criterion_main!(benches);
