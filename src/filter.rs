//! Filter specifications and the projection they define over events.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Event, EventTable};

// ── Selection ────────────────────────────────────────────────────────────

/// Which values of one dimension pass the filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Every value, including ones not seen at filter-construction time.
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(values.into_iter().map(Into::into).collect())
    }

    /// An empty list means "no restriction", matching a CLI with no flags.
    pub fn from_values(values: &[String]) -> Self {
        if values.is_empty() {
            Self::All
        } else {
            Self::only(values.iter().cloned())
        }
    }

    pub fn admits(&self, value: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(value),
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Only(_))
    }
}

// ── Chapter range ────────────────────────────────────────────────────────

/// Inclusive chapter interval. `min > max` admits nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    pub min: u32,
    pub max: u32,
}

impl ChapterRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub const fn unbounded() -> Self {
        Self::new(1, u32::MAX)
    }

    pub fn contains(&self, chapter: u32) -> bool {
        self.min <= chapter && chapter <= self.max
    }
}

impl Default for ChapterRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for ChapterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

// "10-12", "10~12", "10—12", "10"
static RE_CHAPTER_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<from>\d+)\s*(?:[-~—－]\s*(?P<to>\d+))?\s*$").unwrap()
});

impl FromStr for ChapterRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = RE_CHAPTER_RANGE
            .captures(s)
            .ok_or_else(|| format!("invalid chapter range `{s}` (expected e.g. 10-12)"))?;
        let number = |name: &str| -> Result<Option<u32>, String> {
            caps.name(name)
                .map(|m| {
                    m.as_str()
                        .parse::<u32>()
                        .map_err(|e| format!("chapter `{}`: {e}", m.as_str()))
                })
                .transpose()
        };
        let from = number("from")?.unwrap_or(1);
        let to = number("to")?.unwrap_or(from);
        Ok(Self::new(from, to))
    }
}

// ── Filter specification ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub locations: Selection,
    pub characters: Selection,
    pub activities: Selection,
    pub chapters: ChapterRange,
}

impl FilterSpec {
    /// The "everything selected" default: no restriction on any set, chapter
    /// range spanning the table.
    pub fn everything(table: &EventTable) -> Self {
        let chapters = table
            .chapter_bounds()
            .map(|(min, max)| ChapterRange::new(min, max))
            .unwrap_or_default();
        Self {
            chapters,
            ..Self::default()
        }
    }

    pub fn with_locations<I: IntoIterator<Item = S>, S: Into<String>>(mut self, values: I) -> Self {
        self.locations = Selection::only(values);
        self
    }

    pub fn with_characters<I: IntoIterator<Item = S>, S: Into<String>>(mut self, values: I) -> Self {
        self.characters = Selection::only(values);
        self
    }

    pub fn with_activities<I: IntoIterator<Item = S>, S: Into<String>>(mut self, values: I) -> Self {
        self.activities = Selection::only(values);
        self
    }

    pub fn with_chapters(mut self, chapters: ChapterRange) -> Self {
        self.chapters = chapters;
        self
    }

    /// Inclusion test for one event, before character narrowing.
    pub fn admits(&self, event: &Event) -> bool {
        self.locations.admits(&event.location)
            && self.activities.admits(&event.activity_type)
            && self.chapters.contains(event.chapter)
            && match &self.characters {
                Selection::All => true,
                Selection::Only(set) => event.characters.iter().any(|c| set.contains(c)),
            }
    }
}

// ── Projection ───────────────────────────────────────────────────────────

/// Events admitted by `spec`, in table order. With a character restriction
/// each kept event lists only the selected characters, so character-side
/// statistics see just the matched names. An empty result is not an error.
pub fn filter(events: &[Event], spec: &FilterSpec) -> Vec<Event> {
    let subset: Vec<Event> = events
        .iter()
        .filter(|e| spec.admits(e))
        .map(|e| match &spec.characters {
            Selection::All => e.clone(),
            Selection::Only(set) => Event {
                characters: e
                    .characters
                    .iter()
                    .filter(|c| set.contains(*c))
                    .cloned()
                    .collect(),
                ..e.clone()
            },
        })
        .collect();
    debug!(
        input = events.len(),
        kept = subset.len(),
        chapters = %spec.chapters,
        "filter applied"
    );
    subset
}
