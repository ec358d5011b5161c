use crate::error::{IndexError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Raw bytes and file attributes of one document, before analysis.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: String,
    pub content: Vec<u8>,
    pub size: u64,
    pub created: SystemTime,
    pub accessed: SystemTime,
    pub modified: SystemTime,
}

impl SourceDocument {
    /// A document with all timestamps set to `at`.
    pub fn new<P: Into<String>, C: Into<Vec<u8>>>(path: P, content: C, at: SystemTime) -> Self {
        let content = content.into();
        Self { path: path.into(), size: content.len() as u64, content, created: at, accessed: at, modified: at }
    }
}

/// Something the builder can hand to one worker: a finite stream of
/// documents. Items that fail to read are yielded as errors and skipped.
pub trait DocumentSource: Send {
    fn name(&self) -> String;

    /// Fails with `SourceUnreadable` when the whole source must be skipped.
    fn check(&self) -> Result<()> { Ok(()) }

    fn documents(&self) -> Box<dyn Iterator<Item = Result<SourceDocument>> + '_>;
}

/// Suffix allow-list; empty means every file passes.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    suffixes: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { suffixes: suffixes.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect() }
    }

    pub fn allows(&self, path: &str) -> bool {
        self.suffixes.is_empty() || self.suffixes.iter().any(|s| path.ends_with(s.as_str()))
    }
}

/// A file or a recursively walked directory tree.
#[derive(Debug, Clone)]
pub struct FsDocumentSource {
    root: PathBuf,
    filter: ExtensionFilter,
}

impl FsDocumentSource {
    pub fn new<P: AsRef<Path>>(root: P, filter: ExtensionFilter) -> Self {
        Self { root: root.as_ref().to_path_buf(), filter }
    }

    pub fn root(&self) -> &Path { &self.root }
}

impl DocumentSource for FsDocumentSource {
    fn name(&self) -> String { self.root.display().to_string() }

    fn check(&self) -> Result<()> {
        let unreadable = |source| IndexError::SourceUnreadable { path: self.root.clone(), source };
        let meta = fs::metadata(&self.root).map_err(unreadable)?;
        if meta.is_dir() {
            fs::read_dir(&self.root).map_err(unreadable)?;
        } else {
            fs::File::open(&self.root).map_err(unreadable)?;
        }
        Ok(())
    }

    fn documents(&self) -> Box<dyn Iterator<Item = Result<SourceDocument>> + '_> {
        let iter = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(e) if e.file_type().is_file() => {
                    let path = e.path().to_string_lossy().into_owned();
                    self.filter.allows(&path).then(|| read_document(e.path()))
                }
                Ok(_) => None,
                Err(e) => {
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    Some(Err(IndexError::document_read(path, e)))
                }
            });
        Box::new(iter)
    }
}

fn read_document(path: &Path) -> Result<SourceDocument> {
    let display = path.to_string_lossy().into_owned();
    let meta = fs::metadata(path).map_err(|e| IndexError::document_read(display.clone(), e))?;
    let content = fs::read(path).map_err(|e| IndexError::document_read(display.clone(), e))?;
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    Ok(SourceDocument {
        path: display,
        size: meta.len(),
        content,
        // filesystems without birth time report the modification time
        created: meta.created().unwrap_or(modified),
        accessed: meta.accessed().unwrap_or(modified),
        modified,
    })
}

/// Documents held in memory, used for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    docs: Vec<SourceDocument>,
}

impl MemorySource {
    pub fn new<S: Into<String>>(name: S, docs: Vec<SourceDocument>) -> Self {
        Self { name: name.into(), docs }
    }
}

impl DocumentSource for MemorySource {
    fn name(&self) -> String { self.name.clone() }

    fn documents(&self) -> Box<dyn Iterator<Item = Result<SourceDocument>> + '_> {
        Box::new(self.docs.iter().cloned().map(Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn walks_tree_and_filters_suffixes() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("sub/b.txt"), "beta").unwrap();
        fs::write(dir.path().join("sub/c.md"), "gamma").unwrap();

        let source = FsDocumentSource::new(dir.path(), ExtensionFilter::new([".txt"]));
        source.check().unwrap();
        let mut paths: Vec<String> = source.documents().map(|d| d.unwrap().path).collect();
        paths.sort();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.txt"));
        assert!(paths[1].ends_with("b.txt"));
    }

    #[test]
    fn missing_root_is_unreadable() {
        let dir = tempdir().unwrap();
        let source = FsDocumentSource::new(dir.path().join("nope"), ExtensionFilter::default());
        assert!(matches!(source.check(), Err(IndexError::SourceUnreadable { .. })));
    }

    #[test]
    fn empty_filter_allows_everything() {
        assert!(ExtensionFilter::default().allows("x.bin"));
        assert!(!ExtensionFilter::new([".txt", ".md"]).allows("x.bin"));
    }
}
