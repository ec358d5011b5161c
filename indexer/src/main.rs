use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use termscope_core::report::{
    write_clusters, write_collection_statistics, write_index_terms, write_similar_terms, write_top_terms,
};
use termscope_core::{
    cluster_terms, collection_statistics, similar_terms, top_terms, Analyzer, BuildOptions, IndexBuilder,
    IndexConfig, IndexStore, KMeans, OpenMode, OrderKey, Representation,
};
use tracing_subscriber::{fmt, EnvFilter};

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "termscope")]
#[command(about = "Build a local inverted index and analyze its terms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the document roots listed in the configuration file
    Index {
        /// Index directory
        #[arg(long)]
        index: PathBuf,
        /// JSON configuration with docs, partial_indexes, only_files, only_top_lines, only_bottom_lines
        #[arg(long, default_value = "config.json")]
        config: PathBuf,
        /// create, append or create_or_append
        #[arg(long, default_value = "create_or_append")]
        openmode: OpenMode,
        /// Replace documents whose path is already indexed
        #[arg(long, default_value_t = false)]
        update: bool,
        /// Upper bound on worker threads
        #[arg(long)]
        num_threads: Option<usize>,
        /// Build one private index per root, then merge them
        #[arg(long, default_value_t = false)]
        partial_indexes: bool,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Highest-ranked terms of one document
    BestTerms {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        doc_id: u32,
        #[arg(long)]
        field: String,
        #[arg(long)]
        top: usize,
        /// tf, df or tfxidf
        #[arg(long)]
        order: OrderKey,
        #[arg(long)]
        outputfile: Option<PathBuf>,
    },
    /// Terms most similar to a pivot term
    SimilarTerms {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        field: String,
        #[arg(long)]
        term: String,
        #[arg(long)]
        top: usize,
        /// bin, tf or tfxidf
        #[arg(long)]
        rep: Representation,
        #[arg(long)]
        outputfile: Option<PathBuf>,
    },
    /// Cluster the terms most similar to a pivot term with k-means
    TermsClusters {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        field: String,
        #[arg(long)]
        term: String,
        #[arg(long)]
        top: usize,
        /// bin, tf or tfxidf
        #[arg(long)]
        rep: Representation,
        #[arg(long)]
        k: usize,
        #[arg(long)]
        outputfile: Option<PathBuf>,
    },
    /// Collection statistics of one field or of every field
    StatsField {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        field: Option<String>,
        #[arg(long)]
        outputfile: Option<PathBuf>,
    },
    /// Dump every term of every field
    WriteIndex {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        outputfile: PathBuf,
    },
}

#[derive(clap::Args)]
struct AnalysisArgs {
    /// Drop English stop words
    #[arg(long, default_value_t = false)]
    stopwords: bool,
    /// Apply English stemming
    #[arg(long, default_value_t = false)]
    stem: bool,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Index { index, config, openmode, update, num_threads, partial_indexes, analysis } => {
            let config = IndexConfig::load(&config)?;
            let options = BuildOptions { mode: openmode, update, workers: num_threads, partial: partial_indexes, ..Default::default() };
            let analyzer = Analyzer { remove_stopwords: analysis.stopwords, stem: analysis.stem };
            let builder = IndexBuilder::from_config(&config, options, analyzer)?;
            let report = builder.build(&config, &index)?;
            for skipped in &report.skipped_sources {
                tracing::warn!(source = %skipped, "source skipped");
            }
            tracing::info!(index = %index.display(), documents = report.documents, sources = report.sources.len(), "index build complete");
        }
        Commands::BestTerms { index, doc_id, field, top, order, outputfile } => {
            if top < 1 {
                bail!("top must be greater than 0: {top}");
            }
            let store = IndexStore::open(&index, OpenMode::Append)?;
            let terms = top_terms(&store, &field, doc_id, order, top);
            let mut out = sink(outputfile.as_ref())?;
            write_top_terms(&mut out, &terms)?;
            out.flush()?;
        }
        Commands::SimilarTerms { index, field, term, top, rep, outputfile } => {
            let store = IndexStore::open(&index, OpenMode::Append)?;
            let ranking = similar_terms(&store, &field, rep, &term, top)?;
            let mut out = sink(outputfile.as_ref())?;
            write_similar_terms(&mut out, &term, top, &ranking)?;
            out.flush()?;
        }
        Commands::TermsClusters { index, field, term, top, rep, k, outputfile } => {
            let kmeans = KMeans::new(k)?;
            let store = IndexStore::open(&index, OpenMode::Append)?;
            let clusters = cluster_terms(&store, &field, rep, &term, top, &kmeans)?;
            let mut out = sink(outputfile.as_ref())?;
            write_clusters(&mut out, top, &clusters)?;
            out.flush()?;
        }
        Commands::StatsField { index, field, outputfile } => {
            let store = IndexStore::open(&index, OpenMode::Append)?;
            let stats = collection_statistics(&store, field.as_deref());
            let mut out = sink(outputfile.as_ref())?;
            write_collection_statistics(&mut out, &stats)?;
            out.flush()?;
        }
        Commands::WriteIndex { index, outputfile } => {
            let store = IndexStore::open(&index, OpenMode::Append)?;
            let mut out = sink(Some(&outputfile))?;
            write_index_terms(&mut out, &store)?;
            out.flush()?;
        }
    }

    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "total milliseconds");
    Ok(())
}

/// Report destination: the named file, or stdout.
fn sink(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(File::create(p)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}
