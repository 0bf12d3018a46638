//! Roll-up export to CSV and spreadsheet files.
//!
//! Files are rendered in memory first and then swapped into place, so a
//! failed export never leaves a partial file at the target path.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use atlas_types::{EntityKind, RollupRow};
use rust_xlsxwriter::{Format, Workbook};
use tempfile::NamedTempFile;
use tracing::info;

use crate::config::DisplaySettings;
use crate::error::{AtlasError, Result};
use crate::rollup::{Cell, cells, headers, table_title};

/// Spreadsheet tools detect UTF-8 CSV by this prefix.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Spreadsheet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Spreadsheet => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("csv"),
            Self::Spreadsheet => f.write_str("spreadsheet"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "spreadsheet" | "xlsx" | "excel" => Ok(Self::Spreadsheet),
            other => Err(format!("unknown export format `{other}` (expected csv or spreadsheet)")),
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

fn render_csv(rows: &[RollupRow], dimension: EntityKind, display: &DisplaySettings) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(UTF8_BOM.to_vec());
    wtr.write_record(headers(dimension)).map_err(AtlasError::export)?;
    for row in rows {
        let record: Vec<String> = cells(row, dimension, display)
            .iter()
            .map(Cell::as_text)
            .collect();
        wtr.write_record(&record).map_err(AtlasError::export)?;
    }
    wtr.into_inner().map_err(AtlasError::export)
}

fn render_spreadsheet(
    rows: &[RollupRow],
    dimension: EntityKind,
    display: &DisplaySettings,
) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(table_title(dimension)).map_err(AtlasError::export)?;

    for (col, title) in headers(dimension).iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *title, &bold)
            .map_err(AtlasError::export)?;
    }
    for (r, row) in rows.iter().enumerate() {
        let line = r as u32 + 1;
        for (col, cell) in cells(row, dimension, display).iter().enumerate() {
            let col = col as u16;
            let written = match cell {
                Cell::Text(text) => sheet.write_string(line, col, text),
                Cell::Count(n) => sheet.write_number(line, col, *n as f64),
            };
            written.map_err(AtlasError::export)?;
        }
    }
    workbook.save_to_buffer().map_err(AtlasError::export)
}

/// Render a roll-up table completely in memory.
pub fn render(
    rows: &[RollupRow],
    dimension: EntityKind,
    format: ExportFormat,
    display: &DisplaySettings,
) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => render_csv(rows, dimension, display),
        ExportFormat::Spreadsheet => render_spreadsheet(rows, dimension, display),
    }
}

// ── Writing ──────────────────────────────────────────────────────────────

/// Replace `path` with `bytes`: written to a temporary file beside the
/// target, then renamed over it. The directory must already exist.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(AtlasError::export(format!(
            "directory `{}` does not exist",
            parent.display()
        )));
    }
    let mut tmp = NamedTempFile::new_in(parent).map_err(AtlasError::export)?;
    tmp.write_all(bytes).map_err(AtlasError::export)?;
    tmp.as_file().sync_all().map_err(AtlasError::export)?;
    tmp.persist(path).map_err(|e| AtlasError::export(e.error))?;
    Ok(())
}

/// Render and write a roll-up table to `path`. On any failure the target
/// is left as it was.
pub fn export_to_path(
    rows: &[RollupRow],
    dimension: EntityKind,
    format: ExportFormat,
    display: &DisplaySettings,
    path: &Path,
) -> Result<()> {
    let bytes = render(rows, dimension, format, display)?;
    write_atomic(path, &bytes)?;
    info!(path = %path.display(), %format, rows = rows.len(), bytes = bytes.len(), "exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityMap;
    use crate::model::fixtures::sample;
    use crate::rollup::rollup;

    fn location_rows() -> Vec<RollupRow> {
        let events = sample();
        rollup(&events, EntityKind::Location, &IdentityMap::assign(&events), &DisplaySettings::default())
    }

    #[test]
    fn test_csv_has_bom_and_header() {
        let bytes = render(
            &location_rows(),
            EntityKind::Location,
            ExportFormat::Csv,
            &DisplaySettings::default(),
        )
        .unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("编号,地点,总出现次数,涉及章回,关联人物,活动类型统计,情节示例")
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("loc_001,京师,5,"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_spreadsheet_is_zip_container() {
        let bytes = render(
            &location_rows(),
            EntityKind::Location,
            ExportFormat::Spreadsheet,
            &DisplaySettings::default(),
        )
        .unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_export_empty_rollup_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        export_to_path(&[], EntityKind::Character, ExportFormat::Csv, &DisplaySettings::default(), &path)
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_export_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.csv");
        std::fs::write(&path, "old").unwrap();
        export_to_path(
            &location_rows(),
            EntityKind::Location,
            ExportFormat::Csv,
            &DisplaySettings::default(),
            &path,
        )
        .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        // No stray temp files left next to the target.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_directory_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("out.xlsx");
        let err = export_to_path(
            &location_rows(),
            EntityKind::Location,
            ExportFormat::Spreadsheet,
            &DisplaySettings::default(),
            &path,
        )
        .unwrap_err();
        assert!(matches!(err, AtlasError::Export { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("excel".parse::<ExportFormat>(), Ok(ExportFormat::Spreadsheet));
        assert_eq!(ExportFormat::Spreadsheet.extension(), "xlsx");
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
