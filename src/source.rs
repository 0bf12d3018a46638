//! Record normalization: read the raw event table, map legacy headers to
//! canonical fields, and split the character list of every row.
//!
//! Expected columns (any configured alias is accepted):
//!   回次, 地名, 经度, 纬度, 城市出现次数, 涉及主要人物, 活动类型, 情节
//!
//! A missing required column aborts the load. A row that cannot be parsed
//! is skipped and reported; the remaining rows still load.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{ColumnAliases, SourceSettings};
use crate::error::{AtlasError, Result};
use crate::model::{Event, EventTable};

const BOM: char = '\u{feff}';

// ── Load report ──────────────────────────────────────────────────────────

/// A row left out of the table, with the reason it could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedRow {
    pub row: u64,
    pub reason: String,
}

/// Result of loading a source: the canonical table plus every skipped row.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub table: EventTable,
    pub skipped: Vec<SkippedRow>,
}

impl LoadReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

// ── Column mapping ───────────────────────────────────────────────────────

/// Index of each canonical field within a CSV record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    chapter: usize,
    location: usize,
    longitude: usize,
    latitude: usize,
    location_frequency: usize,
    characters: usize,
    activity_type: usize,
    plot_text: Option<usize>,
}

fn clean_header(raw: &str) -> &str {
    raw.trim_start_matches(BOM).trim()
}

fn find_column(headers: &StringRecord, names: &[String]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = clean_header(h);
        names.iter().any(|n| n.trim().eq_ignore_ascii_case(h))
    })
}

impl ColumnMap {
    fn resolve(headers: &StringRecord, aliases: &ColumnAliases) -> Result<Self> {
        let mut missing = Vec::new();
        let mut require = |field: &str, names: &[String]| {
            let found = find_column(headers, names);
            if found.is_none() {
                missing.push(field.to_string());
            }
            found.unwrap_or_default()
        };

        let map = ColumnMap {
            chapter: require("chapter", &aliases.chapter),
            location: require("location", &aliases.location),
            longitude: require("longitude", &aliases.longitude),
            latitude: require("latitude", &aliases.latitude),
            location_frequency: require("location_frequency", &aliases.location_frequency),
            characters: require("characters", &aliases.characters),
            activity_type: require("activity_type", &aliases.activity_type),
            plot_text: find_column(headers, &aliases.plot_text),
        };

        if missing.is_empty() {
            Ok(map)
        } else {
            Err(AtlasError::Schema { missing })
        }
    }
}

// ── Character splitting ──────────────────────────────────────────────────

/// Build a regex matching any of the configured delimiters.
/// Longer delimiters go first so they win over their own prefixes.
pub fn build_delimiter_regex(delimiters: &[String]) -> Result<Regex> {
    let mut parts: Vec<&str> = delimiters
        .iter()
        .map(String::as_str)
        .filter(|d| !d.is_empty())
        .collect();
    parts.sort_by_key(|d| std::cmp::Reverse(d.chars().count()));
    parts.dedup();
    if parts.is_empty() {
        return Err(AtlasError::config("no character delimiters configured"));
    }
    let alternatives: Vec<String> = parts.iter().map(|d| regex::escape(d)).collect();
    Regex::new(&alternatives.join("|")).map_err(AtlasError::config)
}

/// Split a character cell, trim each name, drop empty tokens and repeated
/// names. Order of first mention is kept.
pub fn split_characters(raw: &str, delimiter: &Regex) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in delimiter.split(raw) {
        let name = token.trim();
        if name.is_empty() || names.iter().any(|n| n == name) {
            continue;
        }
        names.push(name.to_string());
    }
    names
}

// ── Cell parsing ─────────────────────────────────────────────────────────

fn cell<'r>(record: &'r StringRecord, idx: usize, field: &str, row: u64) -> Result<&'r str> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| AtlasError::malformed(row, format!("missing {field} cell")))
}

/// Whole numbers, also accepting spreadsheet-style "10.0".
fn parse_whole(raw: &str) -> Option<u64> {
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

fn parse_chapter(raw: &str, row: u64) -> Result<u32> {
    match parse_whole(raw).and_then(|n| u32::try_from(n).ok()) {
        Some(n) if n >= 1 => Ok(n),
        _ => Err(AtlasError::malformed(
            row,
            format!("chapter `{raw}` is not an integer ≥ 1"),
        )),
    }
}

fn parse_coordinate(raw: &str, field: &str, row: u64) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AtlasError::malformed(row, format!("{field} `{raw}` is not a number")))
}

fn required_text(raw: &str, field: &str, row: u64) -> Result<String> {
    if raw.is_empty() {
        Err(AtlasError::malformed(row, format!("{field} is empty")))
    } else {
        Ok(raw.to_string())
    }
}

fn parse_record(
    record: &StringRecord,
    columns: &ColumnMap,
    delimiter: &Regex,
    row: u64,
) -> Result<Event> {
    let chapter = parse_chapter(cell(record, columns.chapter, "chapter", row)?, row)?;
    let location = required_text(cell(record, columns.location, "location", row)?, "location", row)?;
    let longitude = parse_coordinate(
        cell(record, columns.longitude, "longitude", row)?,
        "longitude",
        row,
    )?;
    let latitude = parse_coordinate(
        cell(record, columns.latitude, "latitude", row)?,
        "latitude",
        row,
    )?;
    let raw_frequency = cell(record, columns.location_frequency, "location_frequency", row)?;
    let location_frequency = parse_whole(raw_frequency).ok_or_else(|| {
        AtlasError::malformed(
            row,
            format!("location frequency `{raw_frequency}` is not an integer ≥ 0"),
        )
    })?;
    let characters = split_characters(cell(record, columns.characters, "characters", row)?, delimiter);
    let activity_type = required_text(
        cell(record, columns.activity_type, "activity_type", row)?,
        "activity_type",
        row,
    )?;
    let plot_text = columns
        .plot_text
        .and_then(|idx| record.get(idx))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    Ok(Event {
        row,
        chapter,
        location,
        longitude,
        latitude,
        location_frequency,
        characters,
        activity_type,
        plot_text,
    })
}

// ── Loading ──────────────────────────────────────────────────────────────

/// Load and normalize the event table at `path`.
pub fn load_events(path: &Path, settings: &SourceSettings) -> Result<LoadReport> {
    let origin = path.display().to_string();
    if !path.is_file() {
        return Err(AtlasError::source_load(origin, "file not found"));
    }
    let file = File::open(path).map_err(|e| AtlasError::source_load(origin.as_str(), e))?;
    read_events(file, &origin, settings)
}

/// Normalize CSV text from any reader. `origin` names the source in errors.
pub fn read_events<R: Read>(reader: R, origin: &str, settings: &SourceSettings) -> Result<LoadReport> {
    let delimiter = build_delimiter_regex(&settings.character_delimiters)?;
    // Rows with a different cell count than the header come back as errors
    // and are skipped like any other malformed row.
    let mut rdr = ReaderBuilder::new().from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| AtlasError::source_load(origin, e))?
        .clone();
    let columns = ColumnMap::resolve(&headers, &settings.columns)?;
    debug!(?columns, "resolved source columns");

    let mut events = Vec::new();
    let mut skipped = Vec::new();

    for (idx, record) in rdr.records().enumerate() {
        let fallback_row = idx as u64 + 2;
        let parsed = match record {
            Ok(record) => {
                let row = record.position().map(|p| p.line()).unwrap_or(fallback_row);
                parse_record(&record, &columns, &delimiter, row)
            }
            Err(e) if e.is_io_error() => return Err(AtlasError::source_load(origin, e)),
            Err(e) => {
                let row = e.position().map(|p| p.line()).unwrap_or(fallback_row);
                Err(AtlasError::malformed(row, e.to_string()))
            }
        };

        match parsed {
            Ok(event) => events.push(event),
            Err(AtlasError::MalformedRow { row, reason }) => {
                warn!(row, %reason, "skipping malformed row");
                skipped.push(SkippedRow { row, reason });
            }
            Err(other) => return Err(other),
        }
    }

    info!(
        source = origin,
        events = events.len(),
        skipped = skipped.len(),
        "event table loaded"
    );

    Ok(LoadReport {
        table: EventTable::new(events),
        skipped,
    })
}
