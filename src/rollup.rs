//! Grouped summary tables, one row per distinct value of a dimension.

use atlas_types::{ActivityCount, EntityKind, EntityStat, RollupRow};
use tracing::debug;

use crate::aggregate::aggregate_with_excerpt;
use crate::config::DisplaySettings;
use crate::identity::IdentityMap;
use crate::model::Event;

// ── Formatting ───────────────────────────────────────────────────────────

/// "2回（10, 11）"
pub fn chapters_summary(chapters: &[u32]) -> String {
    let list = chapters
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}回（{list}）", chapters.len())
}

/// "官场任职（2次）, 社交往来（1次）"
pub fn activity_breakdown(histogram: &[ActivityCount]) -> String {
    histogram
        .iter()
        .map(|a| format!("{}（{}次）", a.activity, a.count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn joined_or(labels: &[String], none: &str) -> String {
    if labels.is_empty() {
        none.to_string()
    } else {
        labels.join(", ")
    }
}

// ── Rows ─────────────────────────────────────────────────────────────────

fn to_row(stat: EntityStat, display: &DisplaySettings) -> RollupRow {
    let chapters: Vec<u32> = stat.chapters.iter().copied().collect();
    RollupRow {
        chapters_summary: chapters_summary(&chapters),
        activity_breakdown: activity_breakdown(&stat.activity_histogram),
        sample_excerpt: stat
            .representative_excerpt
            .unwrap_or_else(|| display.no_plot.clone()),
        key: stat.entity_id,
        label: stat.label,
        total_count: stat.total_occurrences,
        chapters,
        related_entities: stat.related,
        secondary_entities: stat.secondary,
    }
}

/// One row per distinct value of `dimension` in `subset`, largest total
/// first. Equal totals keep first-appearance order.
pub fn rollup(
    subset: &[Event],
    dimension: EntityKind,
    ids: &IdentityMap,
    display: &DisplaySettings,
) -> Vec<RollupRow> {
    let stats = aggregate_with_excerpt(subset, dimension, ids, display.excerpt_chars);
    let mut rows: Vec<RollupRow> = stats
        .into_vec()
        .into_iter()
        .map(|stat| to_row(stat, display))
        .collect();
    rows.sort_by_key(|r| std::cmp::Reverse(r.total_count));
    debug!(%dimension, rows = rows.len(), "roll-up built");
    rows
}

// ── Tabular layout ───────────────────────────────────────────────────────

/// A typed table cell, so spreadsheets keep counts numeric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Count(u64),
}

impl Cell {
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Count(n) => n.to_string(),
        }
    }
}

/// Title of a dimension's table, also used as the spreadsheet sheet name.
pub fn table_title(dimension: EntityKind) -> &'static str {
    match dimension {
        EntityKind::Location => "按地点统计",
        EntityKind::Character => "按人物统计",
        EntityKind::Activity => "按活动类型统计",
    }
}

pub fn headers(dimension: EntityKind) -> [&'static str; 7] {
    match dimension {
        EntityKind::Location => [
            "编号", "地点", "总出现次数", "涉及章回", "关联人物", "活动类型统计", "情节示例",
        ],
        EntityKind::Character => [
            "编号", "人物", "出现次数", "涉及章回", "关联地点", "参与活动统计", "情节示例",
        ],
        EntityKind::Activity => [
            "编号", "活动类型", "活动总次数", "涉及章回", "关联地点", "关联人物", "情节示例",
        ],
    }
}

/// Cells of `row` in the order of [`headers`].
pub fn cells(row: &RollupRow, dimension: EntityKind, display: &DisplaySettings) -> Vec<Cell> {
    let fifth = match dimension {
        EntityKind::Location | EntityKind::Character => row.activity_breakdown.clone(),
        EntityKind::Activity => joined_or(&row.secondary_entities, &display.none_marker),
    };
    vec![
        Cell::Text(row.key.clone()),
        Cell::Text(row.label.clone()),
        Cell::Count(row.total_count),
        Cell::Text(row.chapters_summary.clone()),
        Cell::Text(joined_or(&row.related_entities, &display.none_marker)),
        Cell::Text(fifth),
        Cell::Text(row.sample_excerpt.clone()),
    ]
}
