use crate::index::IndexStore;

/// Value reported for every statistic of a field the store does not have.
pub const MISSING: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldStatistics {
    pub field: String,
    /// Documents in the store.
    pub max_doc: i64,
    /// Sum of document frequency over all terms of the field.
    pub sum_doc_freq: i64,
    /// Sum of term frequency over all postings of the field.
    pub sum_total_term_freq: i64,
    /// Documents with at least one term in the field.
    pub doc_count: i64,
}

impl FieldStatistics {
    fn missing(field: &str) -> Self {
        Self { field: field.to_string(), max_doc: MISSING, sum_doc_freq: MISSING, sum_total_term_freq: MISSING, doc_count: MISSING }
    }

    pub fn is_missing(&self) -> bool { self.max_doc == MISSING }
}

pub fn field_statistics(store: &IndexStore, field: &str) -> FieldStatistics {
    let Some(terms) = store.terms(field) else { return FieldStatistics::missing(field) };
    let mut seen = vec![false; store.document_count()];
    let mut sum_doc_freq = 0i64;
    let mut sum_total_term_freq = 0i64;
    for (_, postings) in terms.iter() {
        sum_doc_freq += postings.len() as i64;
        for p in postings {
            sum_total_term_freq += p.freq as i64;
            if let Some(slot) = seen.get_mut(p.doc_id as usize) {
                *slot = true;
            }
        }
    }
    FieldStatistics {
        field: field.to_string(),
        max_doc: store.document_count() as i64,
        sum_doc_freq,
        sum_total_term_freq,
        doc_count: seen.iter().filter(|s| **s).count() as i64,
    }
}

/// Statistics for one field, or for every field of the store when `field` is `None`.
pub fn collection_statistics(store: &IndexStore, field: Option<&str>) -> Vec<FieldStatistics> {
    match field {
        Some(f) => vec![field_statistics(store, f)],
        None => store.field_names().map(|f| field_statistics(store, f)).collect(),
    }
}
