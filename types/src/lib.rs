//! Output structures shared between the aggregation engine and any shell
//! that renders them (map markers, force-directed graphs, tables).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Entity kinds ─────────────────────────────────────────────────────────

/// The three kinds of entity discovered in an event table. Doubles as the
/// grouping dimension for statistics and roll-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Location,
    Character,
    Activity,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Location, Self::Character, Self::Activity];

    /// Prefix of synthetic identifiers, e.g. `loc_001`.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Location => "loc",
            Self::Character => "char",
            Self::Activity => "act",
        }
    }

    pub fn as_chinese(&self) -> &'static str {
        match self {
            Self::Location => "地点",
            Self::Character => "人物",
            Self::Activity => "活动类型",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Location => "location",
            Self::Character => "character",
            Self::Activity => "activity",
        };
        f.write_str(name)
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "location" | "loc" | "地点" => Ok(Self::Location),
            "character" | "char" | "人物" => Ok(Self::Character),
            "activity" | "act" | "activity_type" | "活动类型" => Ok(Self::Activity),
            other => Err(format!(
                "unknown dimension `{other}` (expected location, character or activity)"
            )),
        }
    }
}

/// One identified entity: stable id, display label and kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub label: String,
    pub kind: EntityKind,
}

// ── Per-entity statistics ────────────────────────────────────────────────

/// How often one activity type occurs inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCount {
    pub activity: String,
    pub count: u64,
}

/// Grouped statistics for one entity over a filtered event subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStat {
    pub entity_id: String,
    pub label: String,
    pub kind: EntityKind,
    pub total_occurrences: u64,
    pub chapters: BTreeSet<u32>,
    pub per_chapter_frequency: BTreeMap<u32, u64>,
    /// Sorted by descending count, ties in first-seen order.
    pub activity_histogram: Vec<ActivityCount>,
    /// Counterpart labels: characters for a location, locations for a
    /// character or an activity type.
    pub related: Vec<String>,
    /// Characters involved in an activity type; empty for other kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_activity: Option<String>,
    /// Number of subset rows (or character memberships) in the group.
    pub rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative_excerpt: Option<String>,
}

impl EntityStat {
    pub fn activity_count(&self, activity: &str) -> u64 {
        self.activity_histogram
            .iter()
            .find(|a| a.activity == activity)
            .map(|a| a.count)
            .unwrap_or(0)
    }
}

// ── Graphs ───────────────────────────────────────────────────────────────

/// Which pair of entity kinds a bipartite graph connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphKind {
    CharacterLocation,
    LocationActivity,
}

impl GraphKind {
    /// (left, right) sides of the partition.
    pub fn sides(&self) -> (EntityKind, EntityKind) {
        match self {
            Self::CharacterLocation => (EntityKind::Character, EntityKind::Location),
            Self::LocationActivity => (EntityKind::Location, EntityKind::Activity),
        }
    }

    pub fn as_chinese(&self) -> &'static str {
        match self {
            Self::CharacterLocation => "人物-地点关联图谱",
            Self::LocationActivity => "地点-活动类型关联图谱",
        }
    }
}

impl FromStr for GraphKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "character-location" | "character_location" | "cl" => Ok(Self::CharacterLocation),
            "location-activity" | "location_activity" | "la" => Ok(Self::LocationActivity),
            other => Err(format!(
                "unknown graph `{other}` (expected character-location or location-activity)"
            )),
        }
    }
}

/// A named hover/popup field attached to a node or edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TooltipField {
    pub name: String,
    pub value: String,
}

impl TooltipField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    /// Label with the weight appended, e.g. "京师（5次）".
    pub caption: String,
    pub kind: EntityKind,
    pub weight: u64,
    pub size: f64,
    pub tooltip: Vec<TooltipField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Node on the left side of the partition.
    pub source: String,
    /// Node on the right side of the partition.
    pub target: String,
    pub weight: u64,
    pub width: f64,
    pub chapters: Vec<u32>,
    pub activities: Vec<String>,
    pub tooltip: Vec<TooltipField>,
}

impl GraphEdge {
    /// True if this edge joins `a` and `b` in either direction.
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

/// A bipartite weighted graph. Nodes are sorted by (kind, id) and edges by
/// their unordered endpoint pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub kind: GraphKind,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn empty(kind: GraphKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Look up an edge regardless of endpoint order.
    pub fn edge(&self, a: &str, b: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.joins(a, b))
    }

    pub fn degree(&self, id: &str) -> usize {
        self.edges
            .iter()
            .filter(|e| e.source == id || e.target == id)
            .count()
    }
}

// ── Roll-up tables ───────────────────────────────────────────────────────

/// One row of a grouped summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupRow {
    /// Entity id of the grouping value.
    pub key: String,
    pub label: String,
    pub total_count: u64,
    pub chapters: Vec<u32>,
    /// e.g. "2回（10, 11）"
    pub chapters_summary: String,
    pub related_entities: Vec<String>,
    /// Characters of an activity row; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_entities: Vec<String>,
    /// e.g. "官场任职（2次）, 社交往来（1次）"
    pub activity_breakdown: String,
    pub sample_excerpt: String,
}

// ── Map markers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterFrequency {
    pub chapter: u32,
    pub frequency: u64,
}

/// Everything a map renderer needs to draw one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMarker {
    pub location_id: String,
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    pub total_occurrences: u64,
    pub chapters: Vec<u32>,
    pub per_chapter_frequency: Vec<ChapterFrequency>,
    pub dominant_activity: String,
    pub activity_breakdown: String,
    pub colour: String,
    pub radius: f64,
    pub characters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parses_english_and_chinese() {
        assert_eq!("location".parse::<EntityKind>(), Ok(EntityKind::Location));
        assert_eq!("人物".parse::<EntityKind>(), Ok(EntityKind::Character));
        assert_eq!("activity_type".parse::<EntityKind>(), Ok(EntityKind::Activity));
        assert!("chapter".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_graph_kind_sides() {
        assert_eq!(
            GraphKind::CharacterLocation.sides(),
            (EntityKind::Character, EntityKind::Location)
        );
        assert_eq!(
            "location-activity".parse::<GraphKind>(),
            Ok(GraphKind::LocationActivity)
        );
    }

    #[test]
    fn test_edge_lookup_ignores_direction() {
        let graph = Graph {
            kind: GraphKind::CharacterLocation,
            nodes: Vec::new(),
            edges: vec![GraphEdge {
                source: "char_001".into(),
                target: "loc_001".into(),
                weight: 1,
                width: 2.0,
                chapters: vec![10],
                activities: vec![],
                tooltip: vec![],
            }],
        };
        assert!(graph.edge("loc_001", "char_001").is_some());
        assert!(graph.edge("char_001", "loc_001").is_some());
        assert_eq!(graph.degree("loc_001"), 1);
        assert!(graph.edge("loc_002", "char_001").is_none());
    }

    #[test]
    fn test_entity_stat_serializes_chapter_keys() {
        let stat = EntityStat {
            entity_id: "loc_001".into(),
            label: "京师".into(),
            kind: EntityKind::Location,
            total_occurrences: 5,
            chapters: [10, 11].into_iter().collect(),
            per_chapter_frequency: [(10, 3), (11, 2)].into_iter().collect(),
            activity_histogram: vec![],
            related: vec![],
            secondary: vec![],
            dominant_activity: None,
            rows: 2,
            representative_excerpt: None,
        };
        let json = serde_json::to_string(&stat).unwrap();
        assert!(json.contains(r#""per_chapter_frequency":{"10":3,"11":2}"#));
        let back: EntityStat = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stat);
    }
}
