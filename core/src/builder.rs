use crate::config::{BuildOptions, IndexConfig, LinePolicy};
use crate::error::{IndexError, Result};
use crate::index::{fields, Document, IndexStore, OpenMode, StoredDocument};
use crate::source::{DocumentSource, FsDocumentSource, SourceDocument};
use crate::tokenizer::Analyzer;
use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// One document source and, in partial-index mode, the private store its
/// worker writes to.
pub struct SourceJob {
    pub source: Box<dyn DocumentSource>,
    pub partial: Option<PathBuf>,
}

impl SourceJob {
    pub fn shared<S: DocumentSource + 'static>(source: S) -> Self {
        Self { source: Box::new(source), partial: None }
    }

    pub fn partial<S: DocumentSource + 'static, P: Into<PathBuf>>(source: S, store: P) -> Self {
        Self { source: Box::new(source), partial: Some(store.into()) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceReport {
    pub source: String,
    pub worker: String,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub sources: Vec<SourceReport>,
    pub skipped_sources: Vec<String>,
    pub documents: usize,
    pub elapsed: Duration,
}

/// Everything a worker needs besides its source and target.
#[derive(Debug)]
struct IngestSettings {
    analyzer: Analyzer,
    lines: LinePolicy,
    hostname: String,
}

enum Sink {
    Shared { store: Arc<Mutex<IndexStore>>, update: bool },
    Partial(PathBuf),
}

/// Indexes document sources into a store, one worker per source.
pub struct IndexBuilder {
    options: BuildOptions,
    settings: Arc<IngestSettings>,
}

impl IndexBuilder {
    pub fn new(options: BuildOptions, analyzer: Analyzer, lines: LinePolicy) -> Result<Self> {
        options.validate()?;
        let settings = IngestSettings { analyzer, lines, hostname: local_hostname() };
        Ok(Self { options, settings: Arc::new(settings) })
    }

    pub fn from_config(config: &IndexConfig, options: BuildOptions, analyzer: Analyzer) -> Result<Self> {
        config.validate()?;
        Self::new(options, analyzer, config.line_policy())
    }

    /// Overrides the detected host name recorded on every document.
    pub fn with_hostname<S: Into<String>>(mut self, hostname: S) -> Self {
        let settings = IngestSettings { hostname: hostname.into(), ..*self.settings };
        self.settings = Arc::new(settings);
        self
    }

    pub fn options(&self) -> &BuildOptions { &self.options }

    /// Index every root named in `config` into the store at `index_path`,
    /// then close it.
    pub fn build<P: AsRef<Path>>(&self, config: &IndexConfig, index_path: P) -> Result<BuildReport> {
        config.validate()?;
        let partials = match (&config.partial_indexes, self.options.partial) {
            (Some(p), true) => Some(p),
            (None, true) => return Err(IndexError::invalid_argument("partial index mode needs partial_indexes in the configuration")),
            (_, false) => None,
        };
        let filter = config.extension_filter();
        let jobs = config.docs.iter().enumerate().map(|(i, root)| SourceJob {
            source: Box::new(FsDocumentSource::new(root, filter.clone())),
            partial: partials.map(|p| p[i].clone()),
        }).collect();

        info!(index = %index_path.as_ref().display(), mode = ?self.options.mode, "indexing");
        let target = IndexStore::open(index_path, self.options.mode)?;
        let (mut store, report) = self.run(target, jobs)?;
        store.close()?;
        Ok(report)
    }

    /// Run all jobs against `target` and hand the committed store back.
    pub fn run(&self, target: IndexStore, jobs: Vec<SourceJob>) -> Result<(IndexStore, BuildReport)> {
        let start = Instant::now();
        if self.options.partial && jobs.iter().any(|j| j.partial.is_none()) {
            return Err(IndexError::invalid_argument("a partial index must be given for each document source"));
        }
        let update_existing = self.options.update && !target.is_fresh();
        let mut report = BuildReport::default();

        let mut runnable = Vec::with_capacity(jobs.len());
        for job in jobs {
            match job.source.check() {
                Ok(()) => runnable.push(job),
                Err(e) if e.is_recoverable() => {
                    warn!(source = %job.source.name(), error = %e, "document source does not exist or is not readable, skipping");
                    report.skipped_sources.push(job.source.name());
                }
                Err(e) => return Err(e),
            }
        }

        let workers = self.options.effective_workers(runnable.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("indexer-worker-{i}"))
            .panic_handler(|_| error!("indexing worker panicked"))
            .build()
            .map_err(|e| IndexError::WorkerFailed(e.to_string()))?;
        debug!(workers, sources = runnable.len(), "starting workers");

        let shared = Arc::new(Mutex::new(target));
        let aborted = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::unbounded();
        let expected = runnable.len();
        let mut partial_roots = Vec::new();
        for job in runnable {
            let sink = match job.partial {
                Some(root) => {
                    partial_roots.push(root.clone());
                    Sink::Partial(root)
                }
                None => Sink::Shared { store: Arc::clone(&shared), update: update_existing },
            };
            let tx = tx.clone();
            let settings = Arc::clone(&self.settings);
            let aborted = Arc::clone(&aborted);
            pool.spawn(move || {
                let result = index_source(job.source.as_ref(), sink, &settings, &aborted);
                let _ = tx.send(result);
            });
        }
        drop(tx);

        let deadline = start + self.options.timeout;
        for _ in 0..expected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let failure = match rx.recv_timeout(remaining) {
                Ok(Ok(source)) => {
                    report.sources.push(source);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(RecvTimeoutError::Timeout) => IndexError::WorkerTimeout(self.options.timeout),
                Err(RecvTimeoutError::Disconnected) => IndexError::WorkerFailed("a worker exited without reporting".into()),
            };
            // late workers see the flag; the aborted store rejects their writes
            aborted.store(true, Ordering::SeqCst);
            shared.lock().abort();
            error!(error = %failure, "aborting index build");
            return Err(failure);
        }
        info!("finished all workers");

        let mut store = std::mem::take(&mut *shared.lock());
        if !partial_roots.is_empty() {
            merge_partials(&mut store, &partial_roots, update_existing)?;
        }
        store.commit()?;

        report.documents = store.document_count();
        report.elapsed = start.elapsed();
        Ok((store, report))
    }
}

fn merge_partials(store: &mut IndexStore, roots: &[PathBuf], update_existing: bool) -> Result<()> {
    let mut partials = roots.iter().map(IndexStore::open_for_merge).collect::<Result<Vec<_>>>()?;
    if update_existing {
        let incoming: HashSet<String> = partials
            .iter()
            .flat_map(|p| p.documents().iter().map(|d| d.path.clone()))
            .collect();
        let replaced = store.delete_by_paths(&incoming)?;
        debug!(replaced, "removed documents superseded by partial indexes");
    }
    let refs: Vec<&IndexStore> = partials.iter().collect();
    store.merge_from(&refs)?;
    info!(segments = partials.len(), documents = store.document_count(), "merged partial indexes");
    for partial in &mut partials {
        partial.close()?;
    }
    Ok(())
}

fn index_source(source: &dyn DocumentSource, sink: Sink, settings: &IngestSettings, aborted: &AtomicBool) -> Result<SourceReport> {
    let worker = thread::current().name().unwrap_or("main").to_string();
    let mut report = SourceReport { source: source.name(), worker: worker.clone(), ..Default::default() };
    let check_aborted = || {
        if aborted.load(Ordering::SeqCst) {
            Err(IndexError::WorkerFailed(format!("build aborted while indexing {}", source.name())))
        } else {
            Ok(())
        }
    };

    match sink {
        Sink::Shared { store, update } => {
            for item in source.documents() {
                let Some(doc) = prepare(item, settings, &worker, &mut report)? else { continue };
                check_aborted()?;
                write_document(&mut store.lock(), doc, update, &mut report)?;
            }
            check_aborted()?;
            store.lock().commit()?;
        }
        Sink::Partial(root) => {
            let mut store = IndexStore::open(&root, OpenMode::Create)?;
            for item in source.documents() {
                let Some(doc) = prepare(item, settings, &worker, &mut report)? else { continue };
                check_aborted()?;
                write_document(&mut store, doc, false, &mut report)?;
            }
            if let Err(e) = check_aborted() {
                store.abort();
                return Err(e);
            }
            store.close()?;
        }
    }

    info!(source = %report.source, worker = %worker, added = report.added, updated = report.updated, skipped = report.skipped, "source indexed");
    Ok(report)
}

/// `Ok(None)` for a document that is skipped; unrecoverable errors end the worker.
fn prepare(item: Result<SourceDocument>, settings: &IngestSettings, worker: &str, report: &mut SourceReport) -> Result<Option<Document>> {
    match item {
        Ok(raw) => Ok(Some(to_document(raw, settings, worker))),
        Err(e) if e.is_recoverable() => {
            warn!(error = %e, "skipping unreadable document");
            report.skipped += 1;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn write_document(store: &mut IndexStore, doc: Document, update: bool, report: &mut SourceReport) -> Result<()> {
    let path = doc.path().to_string();
    if update {
        info!(worker = %report.worker, path = %path, "updating");
        store.update_document(&path, doc)?;
        report.updated += 1;
    } else {
        info!(worker = %report.worker, path = %path, "adding");
        store.add_document(doc)?;
        report.added += 1;
    }
    Ok(())
}

fn to_document(raw: SourceDocument, settings: &IngestSettings, worker: &str) -> Document {
    let text = String::from_utf8_lossy(&raw.content);
    let contents = settings.lines.apply(&text);
    let stored = StoredDocument {
        path: raw.path,
        size_kb: raw.size as f32 / 1024.0,
        creation_time: rfc3339(raw.created),
        last_access_time: rfc3339(raw.accessed),
        last_modified_time: rfc3339(raw.modified),
        hostname: settings.hostname.clone(),
        thread: worker.to_string(),
        contents,
    };

    let keywords = [
        (fields::PATH, stored.path.clone()),
        (fields::HOSTNAME, stored.hostname.clone()),
        (fields::THREAD, stored.thread.clone()),
        (fields::CREATION_TIME, stored.creation_time.clone()),
        (fields::LAST_ACCESS_TIME, stored.last_access_time.clone()),
        (fields::LAST_MODIFIED_TIME, stored.last_modified_time.clone()),
        (fields::CREATION_TIME_COMPACT, compact_time(raw.created)),
        (fields::LAST_ACCESS_TIME_COMPACT, compact_time(raw.accessed)),
        (fields::LAST_MODIFIED_TIME_COMPACT, compact_time(raw.modified)),
    ];
    let contents = stored.contents.clone();
    let mut doc = Document::new(stored).with_text(fields::CONTENTS, &settings.analyzer, &contents);
    for (field, value) in keywords {
        doc = doc.with_keyword(field, &value);
    }
    doc
}

fn rfc3339(t: SystemTime) -> String {
    OffsetDateTime::from(t).format(&Rfc3339).unwrap_or_default()
}

/// yyyyMMddHHmmssSSS in UTC.
fn compact_time(t: SystemTime) -> String {
    OffsetDateTime::from(t)
        .format(format_description!("[year][month][day][hour][minute][second][subsecond digits:3]"))
        .unwrap_or_default()
}

/// Best-effort host name; never fails. Reads `$HOSTNAME`, then the Linux
/// `/proc/sys/kernel/hostname` and `/etc/hostname` files. Elsewhere, or when
/// none of them is set, documents are tagged `unknown`.
pub fn local_hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
