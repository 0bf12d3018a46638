//! Per-entity statistics over a filtered event subset.
//!
//! Counting rules:
//! - A location's total is the sum of `location_frequency` over its distinct
//!   (location, chapter) pairs. Several rows of the same pair (one per
//!   activity tag) count the frequency once.
//! - Characters and activity types have no frequency column; their total is
//!   the number of distinct (value, chapter) pairs.
//! - The activity histogram counts rows, so every tag row contributes.

use std::collections::{BTreeMap, HashMap, HashSet};

use atlas_types::{ActivityCount, EntityKind, EntityStat};
use tracing::debug;

use crate::identity::IdentityMap;
use crate::model::{Event, memberships};

/// Excerpt length used when the caller has no display settings.
pub const DEFAULT_EXCERPT_CHARS: usize = 80;

const ELLIPSIS: &str = "...";

/// Cut `text` to `max_chars` characters, marking the cut with an ellipsis.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

// ── Ordered tallies ──────────────────────────────────────────────────────

/// Counts keyed by label, remembering first-seen order for tie-breaks.
#[derive(Debug, Default)]
struct Tally<'a> {
    order: Vec<&'a str>,
    counts: HashMap<&'a str, u64>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, label: &'a str) {
        let count = self.counts.entry(label).or_insert_with(|| {
            self.order.push(label);
            0
        });
        *count += 1;
    }

    /// Descending count; equal counts keep first-seen order.
    fn ranked(&self) -> Vec<ActivityCount> {
        let mut ranked: Vec<ActivityCount> = self
            .order
            .iter()
            .map(|label| ActivityCount {
                activity: label.to_string(),
                count: self.counts[label],
            })
            .collect();
        ranked.sort_by_key(|a| std::cmp::Reverse(a.count));
        ranked
    }
}

/// Distinct labels in first-seen order.
#[derive(Debug, Default)]
struct Distinct<'a> {
    order: Vec<&'a str>,
    seen: HashSet<&'a str>,
}

impl<'a> Distinct<'a> {
    fn add(&mut self, label: &'a str) {
        if self.seen.insert(label) {
            self.order.push(label);
        }
    }

    fn into_strings(self) -> Vec<String> {
        self.order.into_iter().map(str::to_string).collect()
    }
}

// ── Group accumulator ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Group<'a> {
    /// chapter → frequency, first row of each chapter wins.
    chapter_frequency: BTreeMap<u32, u64>,
    activities: Tally<'a>,
    related: Distinct<'a>,
    secondary: Distinct<'a>,
    rows: usize,
    excerpt: Option<&'a str>,
}

impl<'a> Group<'a> {
    fn add_row(&mut self, event: &'a Event, chapter_frequency: u64) {
        self.chapter_frequency
            .entry(event.chapter)
            .or_insert(chapter_frequency);
        self.activities.add(&event.activity_type);
        self.rows += 1;
        if self.excerpt.is_none() {
            self.excerpt = event.plot_text.as_deref().filter(|p| !p.trim().is_empty());
        }
    }

    fn finish(self, kind: EntityKind, label: &str, entity_id: String, excerpt_chars: usize) -> EntityStat {
        let activity_histogram = self.activities.ranked();
        EntityStat {
            entity_id,
            label: label.to_string(),
            kind,
            total_occurrences: self.chapter_frequency.values().sum(),
            chapters: self.chapter_frequency.keys().copied().collect(),
            dominant_activity: activity_histogram.first().map(|a| a.activity.clone()),
            activity_histogram,
            per_chapter_frequency: self.chapter_frequency,
            related: self.related.into_strings(),
            secondary: self.secondary.into_strings(),
            rows: self.rows,
            representative_excerpt: self.excerpt.map(|p| excerpt(p, excerpt_chars)),
        }
    }
}

/// Groups keyed by label, in first-appearance order.
#[derive(Debug, Default)]
struct Groups<'a> {
    order: Vec<&'a str>,
    groups: HashMap<&'a str, Group<'a>>,
}

impl<'a> Groups<'a> {
    fn entry(&mut self, label: &'a str) -> &mut Group<'a> {
        self.groups.entry(label).or_insert_with(|| {
            self.order.push(label);
            Group::default()
        })
    }
}

// ── Stat table ───────────────────────────────────────────────────────────

/// Statistics of one dimension, in first-appearance order and indexed by
/// label.
#[derive(Debug, Clone, PartialEq)]
pub struct StatTable {
    kind: EntityKind,
    stats: Vec<EntityStat>,
    index: HashMap<String, usize>,
}

impl StatTable {
    fn new(kind: EntityKind, stats: Vec<EntityStat>) -> Self {
        let index = stats
            .iter()
            .enumerate()
            .map(|(i, s)| (s.label.clone(), i))
            .collect();
        Self { kind, stats, index }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn get(&self, label: &str) -> Option<&EntityStat> {
        self.index.get(label).map(|&i| &self.stats[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityStat> {
        self.stats.iter()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.stats.iter().map(|s| s.label.as_str())
    }

    pub fn into_vec(self) -> Vec<EntityStat> {
        self.stats
    }
}

impl<'a> IntoIterator for &'a StatTable {
    type Item = &'a EntityStat;
    type IntoIter = std::slice::Iter<'a, EntityStat>;

    fn into_iter(self) -> Self::IntoIter {
        self.stats.iter()
    }
}

// ── Aggregation ──────────────────────────────────────────────────────────

/// Group `subset` by `dimension` and compute one [`EntityStat`] per value.
pub fn aggregate(subset: &[Event], dimension: EntityKind, ids: &IdentityMap) -> StatTable {
    aggregate_with_excerpt(subset, dimension, ids, DEFAULT_EXCERPT_CHARS)
}

pub fn aggregate_with_excerpt(
    subset: &[Event],
    dimension: EntityKind,
    ids: &IdentityMap,
    excerpt_chars: usize,
) -> StatTable {
    let mut groups = Groups::default();

    match dimension {
        EntityKind::Location => {
            for event in subset {
                let group = groups.entry(&event.location);
                group.add_row(event, event.location_frequency);
                for name in &event.characters {
                    group.related.add(name);
                }
            }
        }
        EntityKind::Character => {
            for m in memberships(subset) {
                let group = groups.entry(m.character);
                group.add_row(m.event, 1);
                group.related.add(&m.event.location);
            }
        }
        EntityKind::Activity => {
            for event in subset {
                let group = groups.entry(&event.activity_type);
                group.add_row(event, 1);
                group.related.add(&event.location);
                for name in &event.characters {
                    group.secondary.add(name);
                }
            }
        }
    }

    let Groups { order, mut groups } = groups;
    let stats: Vec<EntityStat> = order
        .into_iter()
        .filter_map(|label| {
            let group = groups.remove(label)?;
            let id = ids.id_or_label(dimension, label);
            Some(group.finish(dimension, label, id, excerpt_chars))
        })
        .collect();

    debug!(%dimension, rows = subset.len(), groups = stats.len(), "aggregated");
    StatTable::new(dimension, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ChapterRange, FilterSpec, filter};
    use crate::model::fixtures::{event, sample};

    fn stats(events: &[Event], dimension: EntityKind) -> StatTable {
        aggregate(events, dimension, &IdentityMap::assign(events))
    }

    #[test]
    fn test_location_frequency_counted_once_per_chapter() {
        // 京师: chapter 10 (freq 3) on two tag rows, chapter 11 (freq 2).
        let events = vec![
            event(10, "京师", 3, &["娄三公子"], "官场任职", None),
            event(10, "京师", 3, &["娄四公子"], "社交往来", None),
            event(11, "京师", 2, &["鲁编修"], "官场任职", None),
        ];
        let spec = FilterSpec::default().with_chapters(ChapterRange::new(10, 12));
        let subset = filter(&events, &spec);
        let table = stats(&subset, EntityKind::Location);
        let jingshi = table.get("京师").unwrap();

        assert_eq!(jingshi.total_occurrences, 5);
        assert_eq!(jingshi.chapters.iter().copied().collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(jingshi.per_chapter_frequency.get(&10), Some(&3));
        assert_eq!(jingshi.per_chapter_frequency.get(&11), Some(&2));
        assert_eq!(jingshi.activity_count("官场任职"), 2);
        assert_eq!(jingshi.activity_count("社交往来"), 1);
        assert_eq!(jingshi.rows, 3);
    }

    #[test]
    fn test_many_characters_do_not_inflate_location_total() {
        let events = vec![event(10, "京师", 3, &["甲", "乙", "丙", "丁"], "官场任职", None)];
        assert_eq!(stats(&events, EntityKind::Location).get("京师").unwrap().total_occurrences, 3);
    }

    #[test]
    fn test_character_totals_count_distinct_chapters() {
        let events = sample();
        let table = stats(&events, EntityKind::Character);
        let lou = table.get("娄三公子").unwrap();
        // Chapters 10 (twice) and 11.
        assert_eq!(lou.total_occurrences, 2);
        assert_eq!(lou.rows, 3);
        assert_eq!(lou.related, vec!["京师", "湖州"]);
        assert_eq!(lou.entity_id, "char_001");
        assert_eq!(lou.activity_histogram[0].activity, "官场任职");
    }

    #[test]
    fn test_activity_totals_and_related() {
        let events = sample();
        let table = stats(&events, EntityKind::Activity);
        let official = table.get("官场任职").unwrap();
        assert_eq!(official.total_occurrences, 2);
        assert_eq!(official.related, vec!["京师"]);
        assert_eq!(official.secondary, vec!["娄三公子", "娄四公子", "鲁编修"]);
        assert_eq!(official.dominant_activity.as_deref(), Some("官场任职"));
    }

    #[test]
    fn test_groups_in_first_appearance_order() {
        let events = sample();
        let labels: Vec<String> = stats(&events, EntityKind::Location)
            .labels()
            .map(str::to_string)
            .collect();
        assert_eq!(labels, vec!["京师", "湖州", "嘉兴"]);
    }

    #[test]
    fn test_singleton_group_is_fully_populated() {
        let events = vec![event(13, "嘉兴", 2, &["蘧公孙"], "科举备考", Some("蘧公孙谈举业"))];
        let stat = stats(&events, EntityKind::Location).get("嘉兴").cloned().unwrap();
        assert_eq!(stat.total_occurrences, 2);
        assert_eq!(stat.chapters.len(), 1);
        assert_eq!(stat.related, vec!["蘧公孙"]);
        assert_eq!(stat.dominant_activity.as_deref(), Some("科举备考"));
        assert_eq!(stat.representative_excerpt.as_deref(), Some("蘧公孙谈举业"));
    }

    #[test]
    fn test_absent_values_are_not_reported() {
        let events = sample();
        let subset = filter(&events, &FilterSpec::default().with_locations(["嘉兴"]));
        let table = stats(&subset, EntityKind::Location);
        assert_eq!(table.len(), 1);
        assert!(table.get("京师").is_none());
    }

    #[test]
    fn test_empty_subset_gives_empty_table() {
        let ids = IdentityMap::assign(&sample());
        for kind in EntityKind::ALL {
            assert!(aggregate(&[], kind, &ids).is_empty());
        }
    }

    #[test]
    fn test_excerpt_skips_blank_plots_and_truncates() {
        let long = "乙".repeat(100);
        let events = vec![
            event(1, "京师", 1, &[], "官场任职", None),
            event(2, "京师", 1, &[], "官场任职", Some(long.as_str())),
        ];
        let stat = stats(&events, EntityKind::Location).get("京师").cloned().unwrap();
        let text = stat.representative_excerpt.unwrap();
        assert_eq!(text.chars().count(), DEFAULT_EXCERPT_CHARS + ELLIPSIS.len());
        assert!(text.ends_with("..."));
    }

    #[test]
    fn test_no_plot_anywhere_is_none() {
        let events = vec![event(1, "京师", 1, &[], "官场任职", None)];
        let stat = stats(&events, EntityKind::Location).get("京师").cloned().unwrap();
        assert_eq!(stat.representative_excerpt, None);
    }

    #[test]
    fn test_excerpt_keeps_short_text_whole() {
        assert_eq!(excerpt("湖州访贤", 80), "湖州访贤");
        assert_eq!(excerpt("湖州访贤", 2), "湖州...");
        assert_eq!(excerpt("湖州", 2), "湖州");
    }

    #[test]
    fn test_histogram_ties_keep_first_seen_order() {
        let events = vec![
            event(1, "京师", 1, &[], "社交往来", None),
            event(1, "京师", 1, &[], "官场任职", None),
        ];
        let stat = stats(&events, EntityKind::Location).get("京师").cloned().unwrap();
        assert_eq!(stat.dominant_activity.as_deref(), Some("社交往来"));
    }
}
