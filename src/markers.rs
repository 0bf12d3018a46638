//! Map markers: one per location, sized by total occurrences and coloured
//! by dominant activity.

use std::collections::HashMap;

use atlas_types::{ChapterFrequency, EntityKind, LocationMarker};
use tracing::debug;

use crate::aggregate::aggregate_with_excerpt;
use crate::config::MarkerSettings;
use crate::identity::IdentityMap;
use crate::model::Event;
use crate::rollup::activity_breakdown;
use crate::scale::LinearScale;

/// Markers in first-appearance order. Coordinates come from the first row
/// of each location in `subset`.
pub fn location_markers(
    subset: &[Event],
    ids: &IdentityMap,
    settings: &MarkerSettings,
) -> Vec<LocationMarker> {
    let mut coordinates: HashMap<&str, (f64, f64)> = HashMap::new();
    for event in subset {
        coordinates
            .entry(event.location.as_str())
            .or_insert((event.latitude, event.longitude));
    }

    let stats = aggregate_with_excerpt(subset, EntityKind::Location, ids, settings.excerpt_chars);
    let max_total = stats.iter().map(|s| s.total_occurrences).max().unwrap_or(0);
    let radius = LinearScale::proportional(max_total, &settings.radius);

    let markers: Vec<LocationMarker> = stats
        .into_vec()
        .into_iter()
        .map(|stat| {
            let (latitude, longitude) = coordinates
                .get(stat.label.as_str())
                .copied()
                .unwrap_or_default();
            let dominant = stat.dominant_activity.unwrap_or_default();
            LocationMarker {
                location_id: stat.entity_id,
                latitude,
                longitude,
                total_occurrences: stat.total_occurrences,
                chapters: stat.chapters.iter().copied().collect(),
                per_chapter_frequency: stat
                    .per_chapter_frequency
                    .iter()
                    .map(|(&chapter, &frequency)| ChapterFrequency { chapter, frequency })
                    .collect(),
                activity_breakdown: activity_breakdown(&stat.activity_histogram),
                colour: settings.colour_for(&dominant).to_string(),
                dominant_activity: dominant,
                radius: radius.map_weight(stat.total_occurrences),
                characters: stat.related,
                excerpt: stat.representative_excerpt,
                label: stat.label,
            }
        })
        .collect();

    debug!(markers = markers.len(), max_total, "markers built");
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{event, sample};

    fn markers(events: &[Event]) -> Vec<LocationMarker> {
        location_markers(events, &IdentityMap::assign(events), &MarkerSettings::default())
    }

    #[test]
    fn test_marker_per_location_in_order() {
        let markers = markers(&sample());
        let labels: Vec<&str> = markers.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["京师", "湖州", "嘉兴"]);
        let jingshi = &markers[0];
        assert_eq!(jingshi.location_id, "loc_001");
        assert_eq!(jingshi.total_occurrences, 5);
        assert_eq!(
            jingshi.per_chapter_frequency,
            vec![
                ChapterFrequency { chapter: 10, frequency: 3 },
                ChapterFrequency { chapter: 11, frequency: 2 },
            ]
        );
        assert_eq!(jingshi.dominant_activity, "官场任职");
        assert_eq!(jingshi.colour, "#E67E22");
        assert_eq!(jingshi.radius, 32.0);
    }

    #[test]
    fn test_radius_proportional_to_largest_total() {
        let markers = markers(&sample());
        // 嘉兴: 2 of 5 → 12 + 20 * 0.4
        assert_eq!(markers[2].radius, 20.0);
    }

    #[test]
    fn test_coordinates_from_first_row() {
        let mut first = event(10, "京师", 3, &["娄三公子"], "官场任职", None);
        first.latitude = 39.9;
        first.longitude = 116.4;
        let mut second = event(11, "京师", 2, &["鲁编修"], "官场任职", None);
        second.latitude = 0.0;
        second.longitude = 0.0;
        let markers = markers(&[first, second]);
        assert_eq!((markers[0].latitude, markers[0].longitude), (39.9, 116.4));
    }

    #[test]
    fn test_unknown_activity_uses_fallback_colour() {
        let markers = markers(&[event(1, "南京", 1, &[], "游山玩水", None)]);
        assert_eq!(markers[0].colour, "#95A5A6");
    }

    #[test]
    fn test_empty_subset_gives_no_markers() {
        let ids = IdentityMap::assign(&sample());
        assert!(location_markers(&[], &ids, &MarkerSettings::default()).is_empty());
    }
}
