use crate::error::{IndexError, Result};
use crate::index::OpenMode;
use crate::source::ExtensionFilter;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// What to index, read once from a JSON file and handed to the builder.
///
/// ```json
/// { "docs": ["/data/a", "/data/b"], "partial_indexes": ["/tmp/pa", "/tmp/pb"],
///   "only_files": [".txt"], "only_top_lines": 20 }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexConfig {
    pub docs: Vec<PathBuf>,
    #[serde(default)]
    pub partial_indexes: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub only_files: Option<Vec<String>>,
    #[serde(default)]
    pub only_top_lines: Option<usize>,
    #[serde(default)]
    pub only_bottom_lines: Option<usize>,
}

impl IndexConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            IndexError::invalid_argument(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: IndexConfig = serde_json::from_str(&text).map_err(|e| {
            IndexError::invalid_argument(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.docs.is_empty() {
            return Err(IndexError::invalid_argument("docs not specified"));
        }
        if let Some(partials) = &self.partial_indexes {
            if partials.len() != self.docs.len() {
                return Err(IndexError::invalid_argument(format!(
                    "a partial index must be given for each doc root ({} roots, {} partial indexes)",
                    self.docs.len(),
                    partials.len()
                )));
            }
        }
        Ok(())
    }

    pub fn extension_filter(&self) -> ExtensionFilter {
        ExtensionFilter::new(self.only_files.iter().flatten().cloned())
    }

    pub fn line_policy(&self) -> LinePolicy {
        LinePolicy { top: self.only_top_lines, bottom: self.only_bottom_lines }
    }
}

/// Keep only the first `top` and/or last `bottom` lines of each document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinePolicy {
    pub top: Option<usize>,
    pub bottom: Option<usize>,
}

impl LinePolicy {
    pub fn is_full(&self) -> bool { self.top.is_none() && self.bottom.is_none() }

    /// The bottom window is taken from the lines left after the top window,
    /// so the two never overlap.
    pub fn apply(&self, text: &str) -> String {
        if self.is_full() {
            return text.lines().collect::<Vec<_>>().join("\n");
        }
        let lines: Vec<&str> = text.lines().collect();
        let head = self.top.unwrap_or(0).min(lines.len());
        let rest = &lines[head..];
        let tail = match self.bottom {
            Some(n) => &rest[rest.len().saturating_sub(n)..],
            None => &rest[..0],
        };
        lines[..head].iter().chain(tail.iter()).copied().collect::<Vec<_>>().join("\n")
    }
}

/// How a build run opens its target and schedules work.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: OpenMode,
    pub update: bool,
    /// Upper bound on worker threads; `None` means one per source.
    pub workers: Option<usize>,
    pub partial: bool,
    pub timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { mode: OpenMode::CreateOrAppend, update: false, workers: None, partial: false, timeout: DEFAULT_JOIN_TIMEOUT }
    }
}

impl BuildOptions {
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(IndexError::invalid_argument("number of workers must be greater than 0"));
        }
        Ok(())
    }

    /// min(available parallelism, configured bound, number of sources), at least one.
    pub fn effective_workers(&self, sources: usize) -> usize {
        let bound = self.workers.unwrap_or(usize::MAX);
        num_cpus::get().min(bound).min(sources).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "l1\nl2\nl3\nl4\nl5";

    #[test]
    fn line_policy_windows() {
        assert_eq!(LinePolicy::default().apply(TEXT), TEXT);
        assert_eq!(LinePolicy { top: Some(2), bottom: None }.apply(TEXT), "l1\nl2");
        assert_eq!(LinePolicy { top: None, bottom: Some(2) }.apply(TEXT), "l4\nl5");
        assert_eq!(LinePolicy { top: Some(1), bottom: Some(1) }.apply(TEXT), "l1\nl5");
        assert_eq!(LinePolicy { top: Some(4), bottom: Some(3) }.apply(TEXT), TEXT);
    }

    #[test]
    fn partial_indexes_must_match_roots() {
        let config: IndexConfig = serde_json::from_str(
            r#"{ "docs": ["a", "b"], "partial_indexes": ["pa"] }"#,
        ).unwrap();
        assert!(matches!(config.validate(), Err(IndexError::InvalidArgument(_))));
    }

    #[test]
    fn workers_are_bounded_by_sources() {
        let options = BuildOptions { workers: Some(64), ..Default::default() };
        assert_eq!(options.effective_workers(1), 1);
        assert_eq!(options.effective_workers(0), 1);
        assert!(BuildOptions { workers: Some(0), ..Default::default() }.validate().is_err());
    }
}
