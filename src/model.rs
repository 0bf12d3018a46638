use serde::{Deserialize, Serialize};

// ── Event ────────────────────────────────────────────────────────────────

/// One narrative occurrence: a chapter, a location, the characters present,
/// and the activity that took place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Line of the source file this event was read from.
    pub row: u64,
    pub chapter: u32,
    pub location: String,
    pub longitude: f64,
    pub latitude: f64,
    /// Externally supplied occurrence count of the location in this chapter.
    /// Shared by every row of the same (location, chapter) pair.
    pub location_frequency: u64,
    /// Non-empty names, de-duplicated, in source order.
    pub characters: Vec<String>,
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_text: Option<String>,
}

// ── Character membership ─────────────────────────────────────────────────

/// One (event, character) pair of the expanded membership relation.
#[derive(Debug, Clone, Copy)]
pub struct Membership<'a> {
    pub event: &'a Event,
    pub character: &'a str,
}

/// Expand events into one membership per listed character. Events with no
/// characters contribute nothing.
pub fn memberships(events: &[Event]) -> impl Iterator<Item = Membership<'_>> {
    events.iter().flat_map(|event| {
        event.characters.iter().map(move |c| Membership {
            event,
            character: c.as_str(),
        })
    })
}

// ── Event table ──────────────────────────────────────────────────────────

/// The canonical, immutable event sequence for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    events: Vec<Event>,
}

impl EventTable {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Lowest and highest chapter present.
    pub fn chapter_bounds(&self) -> Option<(u32, u32)> {
        let min = self.events.iter().map(|e| e.chapter).min()?;
        let max = self.events.iter().map(|e| e.chapter).max()?;
        Some((min, max))
    }
}
