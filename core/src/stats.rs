use crate::error::{IndexError, Result};
use crate::index::{DocId, IndexStore};
use std::cmp::Ordering;

/// `tf * log10(num_docs / df)`. A zero `df` or `num_docs` yields the IEEE
/// result (infinite or NaN) rather than an error.
pub fn tf_idf(tf: f64, df: u32, num_docs: usize) -> f64 {
    tf * (num_docs as f64 / df as f64).log10()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKey {
    Tf,
    Df,
    TfIdf,
}

impl std::str::FromStr for OrderKey {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tf" => Ok(OrderKey::Tf),
            "df" => Ok(OrderKey::Df),
            "tfxidf" => Ok(OrderKey::TfIdf),
            other => Err(IndexError::invalid_argument(format!("order must be 'tf', 'df' or 'tfxidf': {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermStats {
    pub term: String,
    pub tf: u32,
    pub df: u32,
    pub tfxidf: f64,
}

impl TermStats {
    fn key(&self, order: OrderKey) -> f64 {
        match order {
            OrderKey::Tf => self.tf as f64,
            OrderKey::Df => self.df as f64,
            OrderKey::TfIdf => self.tfxidf,
        }
    }
}

/// Statistics of every term of `field` that occurs in `doc_id`, in term order.
pub fn document_terms(store: &IndexStore, field: &str, doc_id: DocId) -> Vec<TermStats> {
    let Some(terms) = store.terms(field) else { return Vec::new() };
    let num_docs = store.document_count();
    terms
        .iter()
        .filter_map(|(term, postings)| {
            let posting = postings.binary_search_by_key(&doc_id, |p| p.doc_id).ok().map(|i| postings[i])?;
            let df = postings.len() as u32;
            Some(TermStats {
                term: term.to_string(),
                tf: posting.freq,
                df,
                tfxidf: tf_idf(posting.freq as f64, df, num_docs),
            })
        })
        .collect()
}

/// The `limit` highest-ranked terms of a document, by descending `order`.
/// Equal keys keep term order.
pub fn top_terms(store: &IndexStore, field: &str, doc_id: DocId, order: OrderKey, limit: usize) -> Vec<TermStats> {
    let mut stats = document_terms(store, field, doc_id);
    stats.sort_by(|a, b| descending(a.key(order), b.key(order)));
    stats.truncate(limit);
    stats
}

/// Descending order for floats where NaN sinks to the end.
pub(crate) fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{fields, Document, StoredDocument};
    use crate::tokenizer::Analyzer;

    fn store(texts: &[&str]) -> IndexStore {
        let mut store = IndexStore::in_memory();
        for (i, text) in texts.iter().enumerate() {
            let doc = Document::new(StoredDocument::with_path(format!("d{i}")))
                .with_text(fields::CONTENTS, &Analyzer::new(), text);
            store.add_document(doc).unwrap();
        }
        store
    }

    #[test]
    fn top_terms_by_tf() {
        let store = store(&["apple apple banana", "apple cherry"]);
        let top = top_terms(&store, fields::CONTENTS, 0, OrderKey::Tf, 10);
        assert_eq!(top.len(), 2);
        assert_eq!((top[0].term.as_str(), top[0].tf, top[0].df), ("apple", 2, 2));
        assert_eq!((top[1].term.as_str(), top[1].tf, top[1].df), ("banana", 1, 1));
        assert_eq!(top[0].tfxidf, 0.0);
        assert!((top[1].tfxidf - 2f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn ties_keep_term_order() {
        let store = store(&["zeta alpha", "other"]);
        let top = top_terms(&store, fields::CONTENTS, 0, OrderKey::TfIdf, 10);
        let names: Vec<&str> = top.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn limit_and_missing_inputs() {
        let store = store(&["a b c d"]);
        assert_eq!(top_terms(&store, fields::CONTENTS, 0, OrderKey::Df, 2).len(), 2);
        assert!(top_terms(&store, "nope", 0, OrderKey::Tf, 5).is_empty());
        assert!(top_terms(&store, fields::CONTENTS, 9, OrderKey::Tf, 5).is_empty());
    }

    #[test]
    fn tf_idf_decreases_with_df() {
        let values: Vec<f64> = (1..10).map(|df| tf_idf(3.0, df, 10)).collect();
        assert!(values.windows(2).all(|w| w[0] > w[1]));
        assert!(tf_idf(1.0, 0, 0).is_nan());
        assert_eq!(tf_idf(1.0, 1, 0), f64::NEG_INFINITY);
    }

    #[test]
    fn order_keywords() {
        assert_eq!("tfxidf".parse::<OrderKey>().unwrap(), OrderKey::TfIdf);
        assert!("idf".parse::<OrderKey>().is_err());
    }
}
