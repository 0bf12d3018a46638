//! A loaded event table with its identity map and settings. Built once,
//! read-only afterwards, and shareable across threads.

use std::path::Path;

use atlas_types::{Entity, EntityKind, Graph, GraphKind, LocationMarker, RollupRow};
use serde::Serialize;
use tracing::info;

use crate::aggregate::{StatTable, aggregate_with_excerpt};
use crate::config::Settings;
use crate::error::Result;
use crate::filter::{ChapterRange, FilterSpec, filter};
use crate::graph::build_graph;
use crate::identity::IdentityMap;
use crate::markers::location_markers;
use crate::model::{Event, EventTable};
use crate::rollup::rollup;
use crate::source::{SkippedRow, load_events};

#[derive(Debug, Clone)]
pub struct Session {
    table: EventTable,
    ids: IdentityMap,
    settings: Settings,
    skipped: Vec<SkippedRow>,
}

/// Overview of a session, printed by the `summary` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub events: usize,
    pub skipped_rows: usize,
    pub chapters: Option<ChapterRange>,
    pub locations: Vec<Entity>,
    pub characters: Vec<Entity>,
    pub activities: Vec<Entity>,
}

impl Session {
    pub fn load(path: &Path, settings: Settings) -> Result<Self> {
        let report = load_events(path, &settings.source)?;
        let session = Self::build(report.table, report.skipped, settings);
        info!(
            path = %path.display(),
            events = session.table.len(),
            skipped = session.skipped.len(),
            "session ready"
        );
        Ok(session)
    }

    pub fn from_events(events: Vec<Event>, settings: Settings) -> Self {
        Self::build(EventTable::new(events), Vec::new(), settings)
    }

    fn build(table: EventTable, skipped: Vec<SkippedRow>, settings: Settings) -> Self {
        let ids = IdentityMap::assign(table.events());
        Self {
            table,
            ids,
            settings,
            skipped,
        }
    }

    pub fn table(&self) -> &EventTable {
        &self.table
    }

    pub fn ids(&self) -> &IdentityMap {
        &self.ids
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    /// Filter selecting every row of the table.
    pub fn everything(&self) -> FilterSpec {
        FilterSpec::everything(&self.table)
    }

    pub fn filter(&self, spec: &FilterSpec) -> Vec<Event> {
        filter(self.table.events(), spec)
    }

    pub fn aggregate(&self, subset: &[Event], dimension: EntityKind) -> StatTable {
        aggregate_with_excerpt(subset, dimension, &self.ids, self.settings.display.excerpt_chars)
    }

    pub fn graph(&self, subset: &[Event], kind: GraphKind) -> Graph {
        build_graph(subset, kind, &self.ids, &self.settings.graph)
    }

    pub fn rollup(&self, subset: &[Event], dimension: EntityKind) -> Vec<RollupRow> {
        rollup(subset, dimension, &self.ids, &self.settings.display)
    }

    pub fn markers(&self, subset: &[Event]) -> Vec<LocationMarker> {
        location_markers(subset, &self.ids, &self.settings.markers)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            events: self.table.len(),
            skipped_rows: self.skipped.len(),
            chapters: self
                .table
                .chapter_bounds()
                .map(|(min, max)| ChapterRange::new(min, max)),
            locations: self.ids.entities(EntityKind::Location),
            characters: self.ids.entities(EntityKind::Character),
            activities: self.ids.entities(EntityKind::Activity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::sample;
    use std::io::Write;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_session_is_shareable() {
        assert_send_sync::<Session>();
    }

    #[test]
    fn test_views_agree_on_one_filter() {
        let session = Session::from_events(sample(), Settings::default());
        let spec = session.everything().with_locations(["京师"]);
        let subset = session.filter(&spec);

        let stats = session.aggregate(&subset, EntityKind::Location);
        let rows = session.rollup(&subset, EntityKind::Location);
        let markers = session.markers(&subset);
        let graph = session.graph(&subset, GraphKind::LocationActivity);

        let total = stats.get("京师").unwrap().total_occurrences;
        assert_eq!(total, 5);
        assert_eq!(rows[0].total_count, total);
        assert_eq!(markers[0].total_occurrences, total);
        assert_eq!(graph.node("loc_001").unwrap().weight, total);
    }

    #[test]
    fn test_summary_lists_entities() {
        let session = Session::from_events(sample(), Settings::default());
        let summary = session.summary();
        assert_eq!(summary.events, 6);
        assert_eq!(summary.chapters, Some(ChapterRange::new(10, 13)));
        assert_eq!(summary.locations.len(), 3);
        assert_eq!(summary.characters[0].id, "char_001");
        assert_eq!(summary.activities.len(), 5);
    }

    #[test]
    fn test_empty_match_gives_empty_views() {
        let session = Session::from_events(sample(), Settings::default());
        let spec = session.everything().with_chapters(ChapterRange::new(90, 99));
        let subset = session.filter(&spec);
        assert!(subset.is_empty());
        assert!(session.aggregate(&subset, EntityKind::Character).is_empty());
        assert!(session.rollup(&subset, EntityKind::Activity).is_empty());
        assert!(session.markers(&subset).is_empty());
        assert!(session.graph(&subset, GraphKind::CharacterLocation).is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "回次,地名,经度,纬度,城市出现次数,涉及主要人物,活动类型,情节").unwrap();
        writeln!(file, "3,广东,113.2,23.1,2,范进，周进,科举备考,周学道校士拔真才").unwrap();
        writeln!(file, "3,广东,113.2,23.1,2,范进,家庭生活,").unwrap();
        writeln!(file, "x,广东,113.2,23.1,2,范进,家庭生活,").unwrap();
        let session = Session::load(file.path(), Settings::default()).unwrap();
        assert_eq!(session.table().len(), 2);
        assert_eq!(session.skipped().len(), 1);
        assert_eq!(session.ids().id(EntityKind::Character, "周进"), Some("char_002"));
    }
}
