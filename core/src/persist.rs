use crate::error::{IndexError, Result};
use crate::index::{FieldPostings, StoredDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub fields: Vec<String>,
    pub created_at: String,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn postings(&self) -> PathBuf { self.root.join("postings.bin") }

    /// A store exists once its metadata has been committed.
    pub fn exists(&self) -> bool { self.meta().is_file() }

    /// Remove every store file, leaving the directory itself in place.
    pub fn clear(&self) -> Result<()> {
        for file in [self.meta(), self.docs(), self.postings()] {
            if file.exists() {
                fs::remove_file(file)?;
            }
        }
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = target.with_extension("tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(&tmp, target)?;
    Ok(())
}

fn read_all(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path)
        .map_err(|e| IndexError::corruption(format!("cannot open {}: {e}", path.display())))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn save_docs(paths: &IndexPaths, docs: &[StoredDocument]) -> Result<()> {
    create_dir_all(&paths.root)?;
    let bytes = bincode::serialize(docs)?;
    write_atomic(&paths.docs(), &bytes)
}

pub fn load_docs(paths: &IndexPaths) -> Result<Vec<StoredDocument>> {
    let buf = read_all(&paths.docs())?;
    bincode::deserialize(&buf).map_err(|e| IndexError::corruption(format!("docs.bin: {e}")))
}

pub fn save_postings(paths: &IndexPaths, fields: &BTreeMap<String, FieldPostings>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let bytes = bincode::serialize(fields)?;
    write_atomic(&paths.postings(), &bytes)
}

pub fn load_postings(paths: &IndexPaths) -> Result<BTreeMap<String, FieldPostings>> {
    let buf = read_all(&paths.postings())?;
    bincode::deserialize(&buf).map_err(|e| IndexError::corruption(format!("postings.bin: {e}")))
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_string_pretty(meta)?;
    write_atomic(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let buf = read_all(&paths.meta())?;
    let meta: MetaFile = serde_json::from_slice(&buf)
        .map_err(|e| IndexError::corruption(format!("meta.json: {e}")))?;
    if meta.version != FORMAT_VERSION {
        return Err(IndexError::corruption(format!("unsupported index format version {}", meta.version)));
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn meta_roundtrip_and_clear() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        assert!(!paths.exists());
        let meta = MetaFile { num_docs: 3, fields: vec!["contents".into()], created_at: "2024-01-01T00:00:00Z".into(), version: FORMAT_VERSION };
        save_meta(&paths, &meta).unwrap();
        assert!(paths.exists());
        assert_eq!(load_meta(&paths).unwrap().num_docs, 3);
        paths.clear().unwrap();
        assert!(!paths.exists());
    }

    #[test]
    fn garbage_docs_file_is_corruption() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        fs::write(dir.path().join("docs.bin"), b"\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();
        assert!(matches!(load_docs(&paths), Err(IndexError::IndexCorruption(_))));
    }
}
