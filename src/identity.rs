//! Stable synthetic identifiers for locations, characters and activity
//! types. Built once per session from the full event table and shared
//! read-only afterwards.

use std::collections::HashMap;

use atlas_types::{Entity, EntityKind};

use crate::model::Event;

/// Format the `seq`-th (1-based) identifier of a kind: `loc_001`, `char_042`.
pub fn format_id(kind: EntityKind, seq: usize) -> String {
    format!("{}_{:03}", kind.id_prefix(), seq)
}

/// Labels of one kind in first-seen order, with their ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct KindIds {
    labels: Vec<String>,
    ids: Vec<String>,
    index: HashMap<String, usize>,
}

impl KindIds {
    fn observe(&mut self, kind: EntityKind, label: &str) {
        if self.index.contains_key(label) {
            return;
        }
        self.index.insert(label.to_string(), self.labels.len());
        self.labels.push(label.to_string());
        self.ids.push(format_id(kind, self.labels.len()));
    }

    fn id(&self, label: &str) -> Option<&str> {
        self.index.get(label).map(|&i| self.ids[i].as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    locations: KindIds,
    characters: KindIds,
    activities: KindIds,
}

impl IdentityMap {
    /// Scan events in order; each new label gets the next number of its
    /// kind. Characters are numbered in the order they are listed.
    pub fn assign(events: &[Event]) -> Self {
        let mut map = Self::default();
        for event in events {
            map.locations.observe(EntityKind::Location, &event.location);
            for name in &event.characters {
                map.characters.observe(EntityKind::Character, name);
            }
            map.activities.observe(EntityKind::Activity, &event.activity_type);
        }
        map
    }

    fn kind(&self, kind: EntityKind) -> &KindIds {
        match kind {
            EntityKind::Location => &self.locations,
            EntityKind::Character => &self.characters,
            EntityKind::Activity => &self.activities,
        }
    }

    pub fn id(&self, kind: EntityKind, label: &str) -> Option<&str> {
        self.kind(kind).id(label)
    }

    /// Id of a label, or a kind-prefixed label when it was never assigned
    /// (a subset built from another table).
    pub fn id_or_label(&self, kind: EntityKind, label: &str) -> String {
        match self.id(kind, label) {
            Some(id) => id.to_string(),
            None => format!("{}_{label}", kind.id_prefix()),
        }
    }

    /// All labels of a kind, in id order.
    pub fn labels(&self, kind: EntityKind) -> &[String] {
        &self.kind(kind).labels
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.kind(kind).labels.len()
    }

    pub fn entities(&self, kind: EntityKind) -> Vec<Entity> {
        let ids = self.kind(kind);
        ids.labels
            .iter()
            .zip(&ids.ids)
            .map(|(label, id)| Entity {
                id: id.clone(),
                label: label.clone(),
                kind,
            })
            .collect()
    }
}
