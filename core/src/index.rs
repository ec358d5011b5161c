use crate::error::{IndexError, Result};
use crate::persist::{self, IndexPaths, MetaFile, FORMAT_VERSION};
use crate::tokenizer::Analyzer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

pub type DocId = u32;

/// Field names written by the builder.
pub mod fields {
    pub const PATH: &str = "path";
    pub const CONTENTS: &str = "contents";
    pub const HOSTNAME: &str = "hostname";
    pub const THREAD: &str = "thread";
    pub const CREATION_TIME: &str = "creationTime";
    pub const LAST_ACCESS_TIME: &str = "lastAccessTime";
    pub const LAST_MODIFIED_TIME: &str = "lastModifiedTime";
    pub const CREATION_TIME_COMPACT: &str = "creationTimeLucene";
    pub const LAST_ACCESS_TIME_COMPACT: &str = "lastAccessTimeLucene";
    pub const LAST_MODIFIED_TIME_COMPACT: &str = "lastModifiedTimeLucene";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub freq: u32,
}

/// term -> postings sorted by doc_id
pub type FieldPostings = BTreeMap<String, Vec<Posting>>;

/// Attributes kept verbatim for every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub path: String,
    pub contents: String,
    pub size_kb: f32,
    pub creation_time: String,
    pub last_access_time: String,
    pub last_modified_time: String,
    pub hostname: String,
    pub thread: String,
}

impl StoredDocument {
    pub fn with_path<S: Into<String>>(path: S) -> Self {
        Self { path: path.into(), ..Default::default() }
    }
}

/// A document ready to be added: stored attributes plus the terms of each
/// indexed field, in token order.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub stored: StoredDocument,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl Document {
    pub fn new(stored: StoredDocument) -> Self {
        Self { stored, fields: BTreeMap::new() }
    }

    pub fn path(&self) -> &str { &self.stored.path }

    pub fn with_terms<I, S>(mut self, field: &str, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.entry(field.to_string()).or_default().extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn with_text(self, field: &str, analyzer: &Analyzer, text: &str) -> Self {
        self.with_terms(field, analyzer.analyze(text))
    }

    /// Index the whole value as a single untokenized term.
    pub fn with_keyword(self, field: &str, value: &str) -> Self {
        self.with_terms(field, [value])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Erase any existing store at the path.
    Create,
    /// Fail unless a store already exists.
    Append,
    CreateOrAppend,
}

impl std::str::FromStr for OpenMode {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(OpenMode::Create),
            "append" => Ok(OpenMode::Append),
            "create_or_append" => Ok(OpenMode::CreateOrAppend),
            other => Err(IndexError::invalid_argument(format!(
                "open mode must be 'create', 'append' or 'create_or_append': {other}"
            ))),
        }
    }
}

/// Sorted view over the terms of one field. Copyable, so the sequence can be
/// walked any number of times.
#[derive(Debug, Clone, Copy)]
pub struct Terms<'a> {
    inner: &'a FieldPostings,
}

impl<'a> Terms<'a> {
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a [Posting])> + 'a {
        self.inner.iter().map(|(term, postings)| (term.as_str(), postings.as_slice()))
    }

    pub fn len(&self) -> usize { self.inner.len() }

    pub fn is_empty(&self) -> bool { self.inner.is_empty() }
}

/// Inverted index over a document set: field -> term -> postings, plus the
/// stored attributes of every document.
///
/// Document ids are always `0..document_count()`; deletions renumber the
/// documents that follow so vectors over the collection stay dense.
#[derive(Debug, Default)]
pub struct IndexStore {
    paths: Option<IndexPaths>,
    docs: Vec<StoredDocument>,
    fields: BTreeMap<String, FieldPostings>,
    /// path -> number of documents stored under it
    path_counts: HashMap<String, u32>,
    created_at: String,
    fresh: bool,
    dirty: bool,
    closed: bool,
}

impl IndexStore {
    /// A store with no backing directory; `commit` only clears the dirty flag.
    pub fn in_memory() -> Self {
        Self { fresh: true, created_at: now_rfc3339(), ..Default::default() }
    }

    pub fn open<P: AsRef<Path>>(root: P, mode: OpenMode) -> Result<Self> {
        let paths = IndexPaths::new(root);
        match mode {
            OpenMode::Create => Self::create(paths),
            OpenMode::Append if !paths.exists() => Err(IndexError::corruption(format!(
                "no index found at {}", paths.root.display()
            ))),
            OpenMode::Append => Self::load(paths),
            OpenMode::CreateOrAppend if paths.exists() => Self::load(paths),
            OpenMode::CreateOrAppend => Self::create(paths),
        }
    }

    fn create(paths: IndexPaths) -> Result<Self> {
        std::fs::create_dir_all(&paths.root)?;
        paths.clear()?;
        let mut store = Self { paths: Some(paths), fresh: true, created_at: now_rfc3339(), ..Default::default() };
        store.commit()?;
        Ok(store)
    }

    fn load(paths: IndexPaths) -> Result<Self> {
        let meta = persist::load_meta(&paths)?;
        let docs = persist::load_docs(&paths)?;
        let fields = persist::load_postings(&paths)?;
        if docs.len() != meta.num_docs as usize {
            return Err(IndexError::corruption(format!(
                "meta.json records {} documents but docs.bin holds {}", meta.num_docs, docs.len()
            )));
        }
        let out_of_range = fields.values()
            .flat_map(|terms| terms.values())
            .flatten()
            .any(|p| p.doc_id as usize >= docs.len());
        if out_of_range {
            return Err(IndexError::corruption(format!(
                "posting refers past the last document in {}", paths.root.display()
            )));
        }
        tracing::debug!(root = %paths.root.display(), num_docs = docs.len(), "opened index");
        let mut store = Self { paths: Some(paths), fields, created_at: meta.created_at, ..Default::default() };
        for doc in &docs {
            store.count_path(&doc.path);
        }
        store.docs = docs;
        Ok(store)
    }

    /// True when this handle created the store rather than opening an existing one.
    pub fn is_fresh(&self) -> bool { self.fresh }

    pub fn is_closed(&self) -> bool { self.closed }

    pub fn path(&self) -> Option<&Path> { self.paths.as_ref().map(|p| p.root.as_path()) }

    fn ensure_open(&self) -> Result<()> {
        if self.closed { Err(IndexError::AlreadyClosed) } else { Ok(()) }
    }

    fn count_path(&mut self, path: &str) {
        *self.path_counts.entry(path.to_string()).or_insert(0) += 1;
    }

    pub fn contains_path(&self, path: &str) -> bool { self.path_counts.contains_key(path) }

    pub fn add_document(&mut self, doc: Document) -> Result<DocId> {
        self.ensure_open()?;
        let doc_id = DocId::try_from(self.docs.len())
            .map_err(|_| IndexError::invalid_argument("index is full"))?;
        for (field, terms) in doc.fields {
            if terms.is_empty() {
                continue;
            }
            let mut counts: BTreeMap<String, u32> = BTreeMap::new();
            for term in terms {
                *counts.entry(term).or_insert(0) += 1;
            }
            let field_terms = self.fields.entry(field).or_default();
            for (term, freq) in counts {
                // doc_id is the largest id so far, appending keeps the list sorted
                field_terms.entry(term).or_default().push(Posting { doc_id, freq });
            }
        }
        self.count_path(&doc.stored.path);
        self.docs.push(doc.stored);
        self.dirty = true;
        Ok(doc_id)
    }

    /// Replace every document stored under `key` with `doc`.
    pub fn update_document(&mut self, key: &str, doc: Document) -> Result<DocId> {
        self.delete_by_path(key)?;
        self.add_document(doc)
    }

    /// Remove all documents whose path equals `key`, returning how many went.
    pub fn delete_by_path(&mut self, key: &str) -> Result<usize> {
        self.ensure_open()?;
        if !self.contains_path(key) {
            return Ok(0);
        }
        self.delete_where(|path| path == key)
    }

    /// Remove every document whose path is in `keys` in a single pass over
    /// the postings.
    pub fn delete_by_paths(&mut self, keys: &HashSet<String>) -> Result<usize> {
        self.ensure_open()?;
        if !keys.iter().any(|k| self.contains_path(k)) {
            return Ok(0);
        }
        self.delete_where(|path| keys.contains(path))
    }

    fn delete_where<F: Fn(&str) -> bool>(&mut self, doomed: F) -> Result<usize> {
        let mut remap: Vec<Option<DocId>> = Vec::with_capacity(self.docs.len());
        let mut next: DocId = 0;
        for doc in &self.docs {
            if doomed(&doc.path) {
                self.path_counts.remove(&doc.path);
                remap.push(None);
            } else {
                remap.push(Some(next));
                next += 1;
            }
        }
        let removed = self.docs.len() - next as usize;
        if removed == 0 {
            return Ok(0);
        }

        self.docs.retain(|d| !doomed(&d.path));
        for terms in self.fields.values_mut() {
            for postings in terms.values_mut() {
                postings.retain_mut(|p| match remap[p.doc_id as usize] {
                    Some(id) => {
                        p.doc_id = id;
                        true
                    }
                    None => false,
                });
            }
            terms.retain(|_, postings| !postings.is_empty());
        }
        self.fields.retain(|_, terms| !terms.is_empty());
        self.dirty = true;
        Ok(removed)
    }

    /// Append every document of `others`, shifting their ids past ours.
    pub fn merge_from(&mut self, others: &[&IndexStore]) -> Result<()> {
        self.ensure_open()?;
        for other in others {
            let offset = DocId::try_from(self.docs.len())
                .ok()
                .filter(|base| base.checked_add(other.docs.len() as DocId).is_some())
                .ok_or_else(|| IndexError::invalid_argument("merged index would exceed the document id range"))?;
            for doc in &other.docs {
                self.count_path(&doc.path);
            }
            self.docs.extend(other.docs.iter().cloned());
            for (field, terms) in &other.fields {
                let target = self.fields.entry(field.clone()).or_default();
                for (term, postings) in terms {
                    target.entry(term.clone()).or_default().extend(
                        postings.iter().map(|p| Posting { doc_id: p.doc_id + offset, freq: p.freq }),
                    );
                }
            }
            self.dirty = true;
        }
        Ok(())
    }

    /// Open an existing store as merge input. Any failure to read it is
    /// reported as corruption.
    pub fn open_for_merge<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        IndexStore::open(root, OpenMode::Append).map_err(|e| match e {
            IndexError::IndexCorruption(msg) => IndexError::IndexCorruption(msg),
            other => IndexError::corruption(format!("cannot read {}: {other}", root.display())),
        })
    }

    /// Open each store at `roots` and merge it in. Any store that cannot be
    /// read fails the whole merge before anything is appended.
    pub fn merge_from_paths(&mut self, roots: &[PathBuf]) -> Result<()> {
        let stores = roots.iter().map(IndexStore::open_for_merge).collect::<Result<Vec<_>>>()?;
        let refs: Vec<&IndexStore> = stores.iter().collect();
        self.merge_from(&refs)
    }

    /// Flush pending changes; a no-op for in-memory stores beyond clearing the dirty flag.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        if let Some(paths) = &self.paths {
            persist::save_docs(paths, &self.docs)?;
            persist::save_postings(paths, &self.fields)?;
            let meta = MetaFile {
                num_docs: self.docs.len() as u32,
                fields: self.fields.keys().cloned().collect(),
                created_at: self.created_at.clone(),
                version: FORMAT_VERSION,
            };
            persist::save_meta(paths, &meta)?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Commit and release the store. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.dirty {
            self.commit()?;
        }
        self.closed = true;
        Ok(())
    }

    /// Release the store without writing anything. Later writes and commits
    /// fail with `AlreadyClosed`.
    pub fn abort(&mut self) {
        if !self.closed {
            tracing::warn!(uncommitted = self.dirty, "index store aborted");
        }
        self.dirty = false;
        self.closed = true;
    }

    pub fn document_count(&self) -> usize { self.docs.len() }

    pub fn document(&self, doc_id: DocId) -> Option<&StoredDocument> { self.docs.get(doc_id as usize) }

    pub fn documents(&self) -> &[StoredDocument] { &self.docs }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ { self.fields.keys().map(String::as_str) }

    pub fn terms(&self, field: &str) -> Option<Terms<'_>> {
        self.fields.get(field).map(|inner| Terms { inner })
    }

    pub fn postings(&self, field: &str, term: &str) -> Option<&[Posting]> {
        self.fields.get(field)?.get(term).map(Vec::as_slice)
    }

    pub fn doc_freq(&self, field: &str, term: &str) -> u32 {
        self.postings(field, term).map_or(0, |p| p.len() as u32)
    }

    pub fn total_term_freq(&self, field: &str, term: &str) -> u64 {
        self.postings(field, term).map_or(0, |p| p.iter().map(|p| p.freq as u64).sum())
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
