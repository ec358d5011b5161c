//! Plain-text reports. Column order and names are stable; widths are not.

use crate::cluster::TermClusters;
use crate::collection::FieldStatistics;
use crate::index::IndexStore;
use crate::stats::TermStats;
use crate::vsm::TermSimilarity;
use std::io::{self, Write};

pub fn write_top_terms<W: Write>(out: &mut W, terms: &[TermStats]) -> io::Result<()> {
    writeln!(out, "{:<20}{:<10}{:<10}{:<10}", "TERM", "TF", "DF", "TFxIDF")?;
    for t in terms {
        writeln!(out, "{:<20}{:<10}{:<10}{:<10.6}", t.term, t.tf, t.df, t.tfxidf)?;
    }
    Ok(())
}

pub fn write_similar_terms<W: Write>(out: &mut W, pivot: &str, limit: usize, ranking: &[TermSimilarity]) -> io::Result<()> {
    writeln!(out, "Top {limit} similar terms to {pivot}")?;
    writeln!(out)?;
    writeln!(out, "{:<20}{:<10}", "TERM", "SIMILARITY")?;
    for t in ranking {
        writeln!(out, "{:<20}{:<10.6}", t.term, t.similarity)?;
    }
    Ok(())
}

pub fn write_clusters<W: Write>(out: &mut W, limit: usize, result: &TermClusters) -> io::Result<()> {
    write_similar_terms(out, &result.pivot, limit, &result.ranking)?;
    writeln!(out)?;
    for (i, members) in result.clusters.iter().enumerate() {
        writeln!(out, "************* CLUSTER {} *************", i + 1)?;
        if members.is_empty() {
            writeln!(out, "No terms clustered")?;
        }
        for term in members {
            writeln!(out, "{term}")?;
        }
    }
    Ok(())
}

pub fn write_collection_statistics<W: Write>(out: &mut W, stats: &[FieldStatistics]) -> io::Result<()> {
    writeln!(
        out,
        "{:<24}{:<12}{:<16}{:<24}{:<12}",
        "FIELD", "MAX_DOC", "SUM_DOC_FREQ", "SUM_TOTAL_TERM_FREQ", "DOC_COUNT"
    )?;
    for s in stats {
        writeln!(
            out,
            "{:<24}{:<12}{:<16}{:<24}{:<12}",
            s.field, s.max_doc, s.sum_doc_freq, s.sum_total_term_freq, s.doc_count
        )?;
    }
    Ok(())
}

/// Every field followed by all of its terms on one line.
pub fn write_index_terms<W: Write>(out: &mut W, store: &IndexStore) -> io::Result<()> {
    for field in store.field_names() {
        writeln!(out, "{field}")?;
        if let Some(terms) = store.terms(field) {
            for (term, _) in terms.iter() {
                write!(out, "{term} ")?;
            }
        }
        writeln!(out)?;
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_terms_header_order() {
        let mut buf = Vec::new();
        let terms = vec![TermStats { term: "apple".into(), tf: 2, df: 2, tfxidf: 0.0 }];
        write_top_terms(&mut buf, &terms).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let header: Vec<&str> = text.lines().next().unwrap().split_whitespace().collect();
        assert_eq!(header, vec!["TERM", "TF", "DF", "TFxIDF"]);
        let row: Vec<&str> = text.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(row, vec!["apple", "2", "2", "0.000000"]);
    }

    #[test]
    fn empty_clusters_are_reported() {
        let result = TermClusters {
            pivot: "apple".into(),
            ranking: vec![TermSimilarity { term: "banana".into(), similarity: 0.5 }],
            clusters: vec![vec!["banana".into()], vec![]],
        };
        let mut buf = Vec::new();
        write_clusters(&mut buf, 1, &result).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Top 1 similar terms to apple"));
        assert!(text.contains("CLUSTER 1 *************\nbanana\n"));
        assert!(text.contains("CLUSTER 2 *************\nNo terms clustered\n"));
    }

    #[test]
    fn index_dump_lists_terms_per_field() {
        use crate::index::{fields, Document, StoredDocument};
        use crate::tokenizer::Analyzer;

        let mut store = IndexStore::in_memory();
        for (path, text) in [("a.txt", "pear apple"), ("b.txt", "apple fig")] {
            let doc = Document::new(StoredDocument::with_path(path))
                .with_keyword(fields::PATH, path)
                .with_text(fields::CONTENTS, &Analyzer::new(), text);
            store.add_document(doc).unwrap();
        }
        let mut buf = Vec::new();
        write_index_terms(&mut buf, &store).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "contents");
        assert_eq!(lines[1].split(' ').filter(|t| !t.is_empty()).collect::<Vec<_>>(), vec!["apple", "fig", "pear"]);
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "path");
        assert_eq!(lines[4].split_whitespace().collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn statistics_columns() {
        let stats = vec![FieldStatistics { field: "contents".into(), max_doc: 2, sum_doc_freq: 4, sum_total_term_freq: 5, doc_count: 2 }];
        let mut buf = Vec::new();
        write_collection_statistics(&mut buf, &stats).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let header: Vec<&str> = text.lines().next().unwrap().split_whitespace().collect();
        assert_eq!(header, vec!["FIELD", "MAX_DOC", "SUM_DOC_FREQ", "SUM_TOTAL_TERM_FREQ", "DOC_COUNT"]);
    }
}
