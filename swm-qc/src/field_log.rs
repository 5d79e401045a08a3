//! Field-work log matching
//!
//! The field-work log is the ground truth for which site visits were
//! intentional replicates. Each row names a site, a visit date and a visit-type
//! marker; a `REP` marker flags a replicate visit. Database site names and log
//! site names drift apart over time, so lookups go through [`SiteNameMatcher`].
//!
//! A missing or unreadable log is normal: every lookup then reports "not a
//! replicate" and callers fall back to averaging.

use crate::bio_resolver::BioRecord;
use crate::error::{QcError, QcResult};
use chrono::{Datelike, NaiveDate};
use polars::prelude::{CsvReadOptions, DataFrame, PolarsError, PolarsResult, SerReader, StringChunked};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use swm_common::config::{DEFAULT_SITE_MATCH_THRESHOLD, DEFAULT_YEAR_BUFFER, MAX_YEAR_BUFFER};
use swm_common::LogContext;

/// Column holding the site name
pub const NAME_COLUMN: &str = "Name";
/// Column holding the visit date
pub const DATE_COLUMN: &str = "Date";
/// Column holding the visit-type marker
pub const MARKER_COLUMN: &str = "M/F/H";
/// Marker value for a replicate visit
pub const REPLICATE_MARKER: &str = "REP";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

/// Trim and collapse internal whitespace
pub fn clean_site_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a log date, ignoring any trailing time component
pub fn parse_log_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw
        .trim()
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .filter(|s| !s.is_empty())?;

    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(date_part, format)
            .ok()
            // "5/10/23" also parses as year 23 with %Y; leave that to %y
            .filter(|date| *format != "%m/%d/%Y" || date.year() >= 100)
    })
}

/// Similarity score in `[0, 1]`
pub type SimilarityFn = fn(&str, &str) -> f64;

/// Case-insensitive normalized Levenshtein similarity
pub fn default_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Finds the log site a database site name refers to
#[derive(Debug, Clone, Copy)]
pub struct SiteNameMatcher {
    similarity: SimilarityFn,
    threshold: f64,
}

impl SiteNameMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            similarity: default_similarity,
            threshold,
        }
    }

    /// Replace the similarity function
    pub fn with_similarity(mut self, similarity: SimilarityFn) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn score(&self, a: &str, b: &str) -> f64 {
        (self.similarity)(a, b)
    }

    /// Exact match wins; otherwise the best candidate scoring strictly above the threshold
    ///
    /// Equal best scores keep the first candidate seen.
    pub fn best_match<'a, I>(&self, name: &str, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<(&'a str, f64)> = None;

        for candidate in candidates {
            if candidate == name {
                return Some(candidate);
            }
            let score = self.score(name, candidate);
            if score > self.threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }

        best.map(|(candidate, _)| candidate)
    }
}

impl Default for SiteNameMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_MATCH_THRESHOLD)
    }
}

/// One usable row of the field-work log
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLogRecord {
    pub site_name: String,
    pub date: String,
    pub marker: Option<String>,
    pub site_clean: String,
    pub date_clean: NaiveDate,
    pub year: i32,
    pub is_replicate: bool,
}

impl FieldLogRecord {
    /// Build from raw cell values; None when the date cannot be parsed
    pub fn from_raw(site_name: &str, date: &str, marker: Option<&str>) -> Option<Self> {
        let date_clean = parse_log_date(date)?;
        let marker = marker.map(str::trim).filter(|m| !m.is_empty());

        Some(Self {
            site_name: site_name.to_string(),
            date: date.to_string(),
            marker: marker.map(str::to_string),
            site_clean: clean_site_name(site_name),
            date_clean,
            year: date_clean.year(),
            is_replicate: marker.is_some_and(|m| m.eq_ignore_ascii_case(REPLICATE_MARKER)),
        })
    }
}

/// Parsed field-work log, indexed by cleaned site name
#[derive(Debug, Clone, Default)]
pub struct FieldLog {
    by_site: BTreeMap<String, Vec<FieldLogRecord>>,
}

impl FieldLog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = FieldLogRecord>) -> Self {
        let mut by_site: BTreeMap<String, Vec<FieldLogRecord>> = BTreeMap::new();
        for record in records {
            by_site.entry(record.site_clean.clone()).or_default().push(record);
        }
        Self { by_site }
    }

    /// Load the log, treating a missing or unreadable file as an empty log
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Field-work log not found, replicate detection disabled");
            return Self::empty();
        }

        match Self::try_load(path) {
            Ok(log) => {
                tracing::info!(path = %path.display(), records = log.len(), "Loaded field-work log");
                log
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read field-work log");
                Self::empty()
            }
        }
    }

    /// Load the log, surfacing read and format errors
    pub fn try_load(path: &Path) -> QcResult<Self> {
        let rows = read_log_rows(path).map_err(|e| QcError::FieldLog(e.to_string()))?;
        let total = rows.len();

        let records: Vec<FieldLogRecord> = rows
            .into_iter()
            .filter_map(|(name, date, marker)| {
                let name = name?;
                FieldLogRecord::from_raw(&name, date.as_deref()?, marker.as_deref())
            })
            .collect();

        if records.len() < total {
            tracing::debug!(
                dropped = total - records.len(),
                "Dropped field-work log rows without a site name or a parseable date"
            );
        }

        Ok(Self::from_records(records))
    }

    /// Number of usable rows
    pub fn len(&self) -> usize {
        self.by_site.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_site.is_empty()
    }

    /// Cleaned site names present in the log
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.by_site.keys().map(String::as_str)
    }

    pub fn records_for_site(&self, site_clean: &str) -> &[FieldLogRecord] {
        self.by_site.get(site_clean).map(Vec::as_slice).unwrap_or(&[])
    }
}

type RawRow = (Option<String>, Option<String>, Option<String>);

fn read_log_rows(path: &Path) -> PolarsResult<Vec<RawRow>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let names = string_column(&df, NAME_COLUMN)?;
    let dates = string_column(&df, DATE_COLUMN)?;
    let markers = string_column(&df, MARKER_COLUMN).ok();

    Ok((0..df.height())
        .map(|i| {
            (
                names.get(i).map(str::to_string),
                dates.get(i).map(str::to_string),
                markers.as_ref().and_then(|m| m.get(i)).map(str::to_string),
            )
        })
        .collect())
}

/// Column by header name, tolerating stray whitespace in the header row
fn string_column(df: &DataFrame, name: &str) -> PolarsResult<StringChunked> {
    let column = df
        .get_columns()
        .iter()
        .find(|c| c.name().as_str().trim() == name)
        .ok_or_else(|| PolarsError::ColumnNotFound(name.to_string().into()))?;

    Ok(column.as_materialized_series().str()?.clone())
}

/// Verdict for one site/year
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct FieldLogMatch {
    pub is_replicate: bool,
    /// Distinct visit dates, ascending; empty unless `is_replicate`
    pub dates: Vec<NaiveDate>,
}

impl FieldLogMatch {
    pub fn not_replicate() -> Self {
        Self::default()
    }
}

/// Answers "was this site/year visited as a replicate, and on which dates"
#[derive(Debug, Clone)]
pub struct FieldLogMatcher {
    log: FieldLog,
    matcher: SiteNameMatcher,
    year_buffer: i32,
    context: LogContext,
}

impl FieldLogMatcher {
    pub fn new(log: FieldLog, context: LogContext) -> Self {
        Self {
            log,
            matcher: SiteNameMatcher::default(),
            year_buffer: DEFAULT_YEAR_BUFFER,
            context,
        }
    }

    pub fn with_site_matcher(mut self, matcher: SiteNameMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Years either side of the requested year that may hold the visits
    ///
    /// Clamped to `0..=MAX_YEAR_BUFFER`.
    pub fn with_year_buffer(mut self, year_buffer: i32) -> Self {
        self.year_buffer = year_buffer.clamp(0, MAX_YEAR_BUFFER);
        self
    }

    pub fn log(&self) -> &FieldLog {
        &self.log
    }

    /// Log site matching a database site name
    pub fn matched_site(&self, site_name: &str) -> Option<&str> {
        let cleaned = clean_site_name(site_name);
        self.matcher.best_match(&cleaned, self.log.sites())
    }

    /// Candidate years, nearest first: `year, year-1, year+1, year-2, ...`
    fn candidate_years(&self, year: i32) -> impl Iterator<Item = i32> {
        std::iter::once(year).chain(
            (1..=self.year_buffer)
                .flat_map(move |d| [year.checked_sub(d), year.checked_add(d)])
                .flatten(),
        )
    }

    /// Replicate verdict for a site and year
    ///
    /// A year qualifies when the matched site's entries in it carry a `REP` marker
    /// and at least two distinct dates. The first qualifying candidate year wins.
    pub fn match_site(&self, site_name: &str, year: i32) -> FieldLogMatch {
        let _guard = self.context.span().enter();

        if self.log.is_empty() {
            return FieldLogMatch::not_replicate();
        }

        let Some(site) = self.matched_site(site_name) else {
            tracing::debug!(site = site_name, "No field-work log site matches");
            return FieldLogMatch::not_replicate();
        };
        let entries = self.log.records_for_site(site);

        for check_year in self.candidate_years(year) {
            let in_year: Vec<&FieldLogRecord> = entries.iter().filter(|r| r.year == check_year).collect();
            if !in_year.iter().any(|r| r.is_replicate) {
                continue;
            }

            let dates: BTreeSet<NaiveDate> = in_year.iter().map(|r| r.date_clean).collect();
            if dates.len() >= 2 {
                tracing::debug!(
                    site = site_name,
                    log_site = site,
                    year,
                    check_year,
                    dates = dates.len(),
                    "Replicate visits confirmed by field-work log"
                );
                return FieldLogMatch {
                    is_replicate: true,
                    dates: dates.into_iter().collect(),
                };
            }
        }

        FieldLogMatch::not_replicate()
    }

    /// Repair fish records whose `year` disagrees with their collection date
    ///
    /// The log date for the site in the record year is preferred, then the log date
    /// in the collection-date year. Without a log date the month and day are kept
    /// and the year replaced (Feb 29 becomes Feb 28). Returns the number of records
    /// changed.
    pub fn correct_collection_dates(&self, records: &mut [BioRecord]) -> usize {
        let _guard = self.context.span().enter();
        let mut from_log = 0usize;
        let mut from_year = 0usize;

        for record in records.iter_mut() {
            let Some(date) = record.collection_date else {
                continue;
            };
            if date.year() == record.year {
                continue;
            }

            if let Some(log_date) = self.log_date_for(&record.site_name, &[record.year, date.year()]) {
                tracing::debug!(
                    sample_id = %record.sample_id,
                    original = %date,
                    corrected = %log_date,
                    "Collection date taken from field-work log"
                );
                record.collection_date = Some(log_date);
                record.year = log_date.year();
                from_log += 1;
            } else if let Some(shifted) = with_year_clamped(date, record.year) {
                tracing::debug!(
                    sample_id = %record.sample_id,
                    original = %date,
                    corrected = %shifted,
                    "Collection date year replaced by record year"
                );
                record.collection_date = Some(shifted);
                from_year += 1;
            }
        }

        if from_log + from_year > 0 {
            tracing::info!(from_log, from_year, "Corrected collection dates");
        }
        from_log + from_year
    }

    /// Earliest log date for the site in the first of `years` that has any
    fn log_date_for(&self, site_name: &str, years: &[i32]) -> Option<NaiveDate> {
        let site = self.matched_site(site_name)?;
        let entries = self.log.records_for_site(site);
        years.iter().find_map(|year| {
            entries
                .iter()
                .filter(|r| r.year == *year)
                .map(|r| r.date_clean)
                .min()
        })
    }
}

fn with_year_clamped(date: NaiveDate, year: i32) -> Option<NaiveDate> {
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
}
