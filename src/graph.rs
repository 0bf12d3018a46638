//! Bipartite relationship graphs: character ↔ location and location ↔
//! activity type.
//!
//! Node weights:
//! - location: `total_occurrences` under the frequency dedup rule
//! - character / activity type: number of distinct associated locations
//!
//! Edge weights:
//! - character ↔ location: flat 1 (the pair co-occurs)
//! - location ↔ activity type: number of distinct chapters of the pair

use std::collections::{BTreeMap, BTreeSet};

use atlas_types::{EntityKind, EntityStat, Graph, GraphEdge, GraphKind, GraphNode, TooltipField};
use tracing::debug;

use crate::aggregate::{StatTable, aggregate};
use crate::config::GraphSettings;
use crate::identity::IdentityMap;
use crate::model::Event;
use crate::scale::LinearScale;

const NONE_MARKER: &str = "无";

// ── Edge accumulation ────────────────────────────────────────────────────

/// Unordered endpoint pair. `(a, b)` and `(b, a)` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeKey(String, String);

impl EdgeKey {
    fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }
}

#[derive(Debug)]
struct EdgeAcc<'a> {
    left: &'a str,
    right: &'a str,
    left_id: String,
    right_id: String,
    chapters: BTreeSet<u32>,
    activities: BTreeSet<&'a str>,
}

/// Every (left, right) pair co-occurring in a row, once per pair.
fn collect_edges<'a>(
    subset: &'a [Event],
    kind: GraphKind,
    ids: &IdentityMap,
) -> BTreeMap<EdgeKey, EdgeAcc<'a>> {
    let (left_kind, right_kind) = kind.sides();
    let mut edges: BTreeMap<EdgeKey, EdgeAcc<'a>> = BTreeMap::new();

    let mut add = |event: &'a Event, left: &'a str, right: &'a str| {
        let left_id = ids.id_or_label(left_kind, left);
        let right_id = ids.id_or_label(right_kind, right);
        let acc = edges
            .entry(EdgeKey::new(&left_id, &right_id))
            .or_insert_with(|| EdgeAcc {
                left,
                right,
                left_id,
                right_id,
                chapters: BTreeSet::new(),
                activities: BTreeSet::new(),
            });
        acc.chapters.insert(event.chapter);
        acc.activities.insert(event.activity_type.as_str());
    };

    for event in subset {
        match kind {
            GraphKind::CharacterLocation => {
                for name in &event.characters {
                    add(event, name.as_str(), event.location.as_str());
                }
            }
            GraphKind::LocationActivity => {
                add(event, event.location.as_str(), event.activity_type.as_str());
            }
        }
    }
    edges
}

// ── Nodes ────────────────────────────────────────────────────────────────

fn joined_or_none(labels: &[String]) -> String {
    if labels.is_empty() {
        NONE_MARKER.to_string()
    } else {
        labels.join(", ")
    }
}

fn breakdown(stat: &EntityStat) -> String {
    let parts: Vec<String> = stat
        .activity_histogram
        .iter()
        .map(|a| format!("{}（{}次）", a.activity, a.count))
        .collect();
    if parts.is_empty() {
        NONE_MARKER.to_string()
    } else {
        parts.join(", ")
    }
}

fn node_weight(stat: &EntityStat) -> u64 {
    match stat.kind {
        EntityKind::Location => stat.total_occurrences,
        EntityKind::Character | EntityKind::Activity => stat.related.len() as u64,
    }
}

/// Node without its size, which depends on every weight in the graph.
fn unsized_node(stat: &EntityStat, graph: GraphKind) -> GraphNode {
    let weight = node_weight(stat);
    let label = stat.label.clone();
    let (caption, tooltip) = match (stat.kind, graph) {
        (EntityKind::Location, GraphKind::CharacterLocation) => (
            format!("{label}（{weight}次）"),
            vec![
                TooltipField::new("地点", &label),
                TooltipField::new("总出现次数", format!("{weight}次")),
                TooltipField::new("关联人物", joined_or_none(&stat.related)),
            ],
        ),
        (EntityKind::Location, GraphKind::LocationActivity) => (
            format!("{label}（{weight}次）"),
            vec![
                TooltipField::new("地点", &label),
                TooltipField::new("总出现次数", format!("{weight}次")),
                TooltipField::new("关联活动", breakdown(stat)),
            ],
        ),
        (EntityKind::Character, _) => (
            format!("{label}（{weight}个地点）"),
            vec![
                TooltipField::new("人物", &label),
                TooltipField::new("关联地点数", format!("{weight}个")),
                TooltipField::new("关联地点", joined_or_none(&stat.related)),
            ],
        ),
        (EntityKind::Activity, _) => (
            format!("{label}（{weight}地）"),
            vec![
                TooltipField::new("活动类型", &label),
                TooltipField::new("关联地点数", format!("{weight}个")),
                TooltipField::new("涉及地点", joined_or_none(&stat.related)),
            ],
        ),
    };
    GraphNode {
        id: stat.entity_id.clone(),
        label,
        caption,
        kind: stat.kind,
        weight,
        size: 0.0,
        tooltip,
    }
}

// ── Graph construction ───────────────────────────────────────────────────

/// Assemble a graph from precomputed statistics of both sides. `left` and
/// `right` must be the statistics of `kind.sides()` over the same subset.
pub fn build_bipartite_graph(
    subset: &[Event],
    kind: GraphKind,
    left: &StatTable,
    right: &StatTable,
    ids: &IdentityMap,
    settings: &GraphSettings,
) -> Graph {
    if subset.is_empty() {
        return Graph::empty(kind);
    }

    let mut nodes: Vec<GraphNode> = left
        .iter()
        .chain(right.iter())
        .map(|stat| unsized_node(stat, kind))
        .collect();
    let scale = LinearScale::fit(nodes.iter().map(|n| n.weight), &settings.node_size);
    for node in &mut nodes {
        node.size = scale.map_weight(node.weight);
    }
    nodes.sort_by(|a, b| (a.kind, &a.id).cmp(&(b.kind, &b.id)));

    let accs = collect_edges(subset, kind, ids);
    let edge_weight = |acc: &EdgeAcc<'_>| match kind {
        GraphKind::CharacterLocation => 1,
        GraphKind::LocationActivity => acc.chapters.len() as u64,
    };
    let max_weight = accs.values().map(edge_weight).max().unwrap_or(0);
    let width_scale = LinearScale::proportional(max_weight, &settings.edge_width);

    let edges: Vec<GraphEdge> = accs
        .into_values()
        .map(|acc| {
            let weight = edge_weight(&acc);
            let width = match kind {
                GraphKind::CharacterLocation => settings.flat_edge_width,
                GraphKind::LocationActivity => width_scale.map_weight(weight),
            };
            let chapters: Vec<u32> = acc.chapters.into_iter().collect();
            let chapter_list = chapters
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let activities: Vec<String> = acc.activities.into_iter().map(str::to_string).collect();
            let tooltip = match kind {
                GraphKind::CharacterLocation => vec![
                    TooltipField::new("关联", format!("{} ↔ {}", acc.left, acc.right)),
                    TooltipField::new("涉及章回", chapter_list),
                    TooltipField::new("参与活动", activities.join(", ")),
                ],
                GraphKind::LocationActivity => vec![
                    TooltipField::new("关联", format!("{} ↔ {}", acc.left, acc.right)),
                    TooltipField::new("频次", format!("{weight}次")),
                    TooltipField::new("章回", chapter_list),
                ],
            };
            GraphEdge {
                source: acc.left_id,
                target: acc.right_id,
                weight,
                width,
                chapters,
                activities,
                tooltip,
            }
        })
        .collect();

    debug!(?kind, nodes = nodes.len(), edges = edges.len(), "graph built");
    Graph { kind, nodes, edges }
}

/// Aggregate both sides of `kind` over `subset` and build the graph. The
/// character ↔ location graph only sees rows that name at least one
/// character, so a location without characters does not become an
/// isolated node.
pub fn build_graph(
    subset: &[Event],
    kind: GraphKind,
    ids: &IdentityMap,
    settings: &GraphSettings,
) -> Graph {
    let scoped: Vec<Event>;
    let rows: &[Event] = match kind {
        GraphKind::CharacterLocation => {
            scoped = subset
                .iter()
                .filter(|e| !e.characters.is_empty())
                .cloned()
                .collect();
            &scoped
        }
        GraphKind::LocationActivity => subset,
    };
    let (left_kind, right_kind) = kind.sides();
    let left = aggregate(rows, left_kind, ids);
    let right = aggregate(rows, right_kind, ids);
    build_bipartite_graph(rows, kind, &left, &right, ids, settings)
}
