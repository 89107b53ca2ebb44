use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::models::ReferenceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Same record re-exported in several files of one source.
    IgnoreProvenance,
    /// Same publication indexed by different databases.
    NormalizedTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub strategy: DedupStrategy,
    pub before: usize,
    pub after: usize,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}

/// Title with spaces and hyphens stripped, case-folded.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Drop rows equal in every canonical column but `source_path`, keeping the first seen.
pub fn dedup_within_source(records: &mut Vec<ReferenceRecord>) -> DedupReport {
    let before = records.len();
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(before);

    for record in records.drain(..) {
        let key = {
            let (title, year, author, doi) = record.content_key();
            (
                title.to_string(),
                year,
                author.to_string(),
                doi.map(str::to_string),
            )
        };
        if seen.insert(key) {
            kept.push(record);
        }
    }
    *records = kept;

    report(DedupStrategy::IgnoreProvenance, before, records.len())
}

/// Drop rows whose normalized title was already seen, keeping the first occurrence.
///
/// Discarded rows lose whatever `document_path` they carried.
pub fn dedup_by_title(records: &mut Vec<ReferenceRecord>) -> DedupReport {
    let before = records.len();
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(record.title_key()));

    report(DedupStrategy::NormalizedTitle, before, records.len())
}

/// Stable `(year, title)` ordering applied to the unified table.
pub fn sort_by_year_and_title(records: &mut [ReferenceRecord]) {
    records.sort_by(|a, b| a.year.cmp(&b.year).then_with(|| a.title.cmp(&b.title)));
}

fn report(strategy: DedupStrategy, before: usize, after: usize) -> DedupReport {
    let report = DedupReport {
        strategy,
        before,
        after,
    };
    info!(
        ?strategy,
        "removed {} duplicate records ({} -> {})",
        report.removed(),
        before,
        after
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, title: &str, year: i32, doi: Option<&str>) -> ReferenceRecord {
        ReferenceRecord::new(source, title, year, "Smith", doi.map(str::to_string))
    }

    #[test]
    fn normalize_strips_spaces_hyphens_and_case() {
        assert_eq!(normalize_title("Deep Learning Systems"), "deeplearningsystems");
        assert_eq!(normalize_title("deep learning-systems"), "deeplearningsystems");
        assert_eq!(normalize_title("Self-Driving  Cars"), "selfdrivingcars");
    }

    #[test]
    fn intra_source_keeps_first_source_path() {
        let mut records = vec![
            record("wos/a.txt", "Graph Theory", 2019, Some("10.1/a")),
            record("wos/b.txt", "Graph Theory", 2019, Some("10.1/a")),
            record("wos/b.txt", "Graph Theory", 2020, Some("10.1/a")),
        ];

        let report = dedup_within_source(&mut records);

        assert_eq!(report.removed(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_path.to_str(), Some("wos/a.txt"));
        assert_eq!(records[1].year, 2020);
    }

    #[test]
    fn intra_source_treats_blank_and_missing_doi_alike() {
        let mut records = vec![
            record("a.csv", "Graph Theory", 2019, None),
            record("b.csv", "Graph Theory", 2019, Some("")),
        ];
        dedup_within_source(&mut records);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn cross_source_collapses_case_and_space_variants() {
        let mut records = vec![
            record("wos/a.txt", "Deep Learning Systems", 2021, Some("10.1/x")),
            record("scopus/a.csv", "deep learning systems", 2021, None),
            record("ieee/a.csv", "Deep Learning-Systems", 2022, None),
        ];

        let report = dedup_by_title(&mut records);

        assert_eq!(report.before, 3);
        assert_eq!(report.after, 1);
        assert_eq!(records[0].source_path.to_str(), Some("wos/a.txt"));
    }

    #[test]
    fn cross_source_leaves_titles_pairwise_distinct() {
        let titles = [
            "A Study", "a study", "A-Study", "Another Study", "another  study", "Third",
        ];
        let mut records: Vec<_> = titles
            .iter()
            .map(|t| record("x.csv", t, 2020, None))
            .collect();

        dedup_by_title(&mut records);

        let keys: HashSet<String> = records.iter().map(ReferenceRecord::title_key).collect();
        assert_eq!(keys.len(), records.len());
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn sort_orders_by_year_then_title() {
        let mut records = vec![
            record("x.csv", "Beta", 2021, None),
            record("x.csv", "Alpha", 2021, None),
            record("x.csv", "Zeta", 2019, None),
        ];
        sort_by_year_and_title(&mut records);
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Zeta", "Alpha", "Beta"]);
    }
}
