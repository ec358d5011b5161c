use crate::error::{IndexError, Result};
use crate::index::IndexStore;
use crate::stats::{descending, tf_idf};
use std::collections::BTreeMap;

/// Weight given to a (term, document) coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// 1 when the term occurs in the document.
    Binary,
    RawFrequency,
    TfIdf,
}

impl std::str::FromStr for Representation {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bin" => Ok(Representation::Binary),
            "tf" => Ok(Representation::RawFrequency),
            "tfxidf" => Ok(Representation::TfIdf),
            other => Err(IndexError::invalid_argument(format!("representation must be 'bin', 'tf' or 'tfxidf': {other}"))),
        }
    }
}

/// Dense vector with one coordinate per document.
#[derive(Debug, Clone, PartialEq)]
pub struct TermVector(Vec<f64>);

impl TermVector {
    pub fn zeros(len: usize) -> Self { Self(vec![0.0; len]) }

    pub fn as_slice(&self) -> &[f64] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn dot(&self, other: &TermVector) -> f64 {
        self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum()
    }

    pub fn norm(&self) -> f64 { self.dot(self).sqrt() }

    /// Cosine of the angle between two vectors; 0.0 whenever either norm is
    /// zero or the result is not a number.
    pub fn cosine(&self, other: &TermVector) -> f64 {
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            return 0.0;
        }
        let out = self.dot(other) / denom;
        if out.is_nan() { 0.0 } else { out }
    }
}

impl From<Vec<f64>> for TermVector {
    fn from(v: Vec<f64>) -> Self { Self(v) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermSimilarity {
    pub term: String,
    pub similarity: f64,
}

/// One vector per term of a field, sized to the store's document count.
/// Built on demand and never persisted.
#[derive(Debug, Clone)]
pub struct VectorSpaceModel {
    field: String,
    representation: Representation,
    num_docs: usize,
    vectors: BTreeMap<String, TermVector>,
}

impl VectorSpaceModel {
    pub fn build(store: &IndexStore, field: &str, representation: Representation) -> Result<Self> {
        let num_docs = store.document_count();
        let mut vectors = BTreeMap::new();
        if let Some(terms) = store.terms(field) {
            for (term, postings) in terms.iter() {
                let df = postings.len() as u32;
                let mut v = TermVector::zeros(num_docs);
                for p in postings {
                    let slot = v.0.get_mut(p.doc_id as usize).ok_or_else(|| {
                        IndexError::corruption(format!(
                            "term '{term}' has a posting for document {} but the index holds {num_docs}", p.doc_id
                        ))
                    })?;
                    *slot = match representation {
                        Representation::Binary => 1.0,
                        Representation::RawFrequency => p.freq as f64,
                        Representation::TfIdf => tf_idf(p.freq as f64, df, num_docs),
                    };
                }
                vectors.insert(term.to_string(), v);
            }
        }
        Ok(Self { field: field.to_string(), representation, num_docs, vectors })
    }

    pub fn field(&self) -> &str { &self.field }

    pub fn representation(&self) -> Representation { self.representation }

    pub fn dimension(&self) -> usize { self.num_docs }

    pub fn len(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    pub fn vector(&self, term: &str) -> Option<&TermVector> { self.vectors.get(term) }

    /// Terms and vectors in term order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TermVector)> {
        self.vectors.iter().map(|(t, v)| (t.as_str(), v))
    }

    /// Every other term ranked by cosine similarity to `pivot`, most similar
    /// first; equal scores keep term order.
    pub fn rank(&self, pivot: &str, limit: usize) -> Result<Vec<TermSimilarity>> {
        let pivot_vector = self.vector(pivot).ok_or_else(|| IndexError::TermNotFound {
            field: self.field.clone(),
            term: pivot.to_string(),
        })?;
        let mut ranking: Vec<TermSimilarity> = self
            .iter()
            .filter(|(term, _)| *term != pivot)
            .map(|(term, v)| TermSimilarity { term: term.to_string(), similarity: pivot_vector.cosine(v) })
            .collect();
        ranking.sort_by(|a, b| descending(a.similarity, b.similarity));
        ranking.truncate(limit);
        Ok(ranking)
    }
}

/// Build the model for `field` and rank the terms most similar to `pivot`.
pub fn similar_terms(
    store: &IndexStore,
    field: &str,
    representation: Representation,
    pivot: &str,
    limit: usize,
) -> Result<Vec<TermSimilarity>> {
    VectorSpaceModel::build(store, field, representation)?.rank(pivot, limit)
}
