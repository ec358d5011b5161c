//! Inverted-index construction over local document collections, plus
//! term statistics, term-vector similarity and term clustering on top of it.

pub mod builder;
pub mod cluster;
pub mod collection;
pub mod config;
pub mod error;
pub mod index;
pub mod persist;
pub mod report;
pub mod source;
pub mod stats;
pub mod tokenizer;
pub mod vsm;

pub use builder::{BuildReport, IndexBuilder, SourceJob, SourceReport};
pub use cluster::{cluster_terms, KMeans, TermClusters};
pub use collection::{collection_statistics, FieldStatistics};
pub use config::{BuildOptions, IndexConfig, LinePolicy};
pub use error::{IndexError, Result};
pub use index::{fields, DocId, Document, IndexStore, OpenMode, Posting, StoredDocument, Terms};
pub use source::{DocumentSource, ExtensionFilter, FsDocumentSource, MemorySource, SourceDocument};
pub use stats::{top_terms, OrderKey, TermStats};
pub use tokenizer::Analyzer;
pub use vsm::{similar_terms, Representation, TermSimilarity, TermVector, VectorSpaceModel};
