use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::types::{Media, Timeline};

/// Registry of every media record in a project, in insertion order.
///
/// Records are never mutated after registration. Clips reference media by
/// id only, so any number of clips may share one record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct MediaLibrary {
    items: Vec<Media>,
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self { items: vec![] }
    }

    /// Register a media record. Returns its id.
    pub fn insert(&mut self, media: Media) -> Uuid {
        let id = media.id;
        tracing::debug!(media_id = %id, name = %media.name, hidden = media.hidden, "Media registered");
        self.items.push(media);
        id
    }

    pub fn get(&self, id: Uuid) -> Result<&Media> {
        self.items
            .iter()
            .find(|m| m.id == id)
            .ok_or(CoreError::MediaNotFound(id))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.iter().any(|m| m.id == id)
    }

    /// Register a hidden deep copy of `id`, decoupling later edits on
    /// whatever references the copy from those on the original.
    pub fn duplicate(&mut self, id: Uuid, suffix: &str) -> Result<Uuid> {
        let original = self.get(id)?;
        let copy = original.derive(format!("{} {}", original.name, suffix), original.source.clone());
        Ok(self.insert(copy))
    }

    /// The primary media list: everything not derived by the assistant.
    pub fn visible(&self) -> impl Iterator<Item = &Media> {
        self.items.iter().filter(|m| !m.hidden)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Media> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop hidden media that no clip on `timeline` references. Returns the
    /// number of records removed.
    pub fn prune_unreferenced(&mut self, timeline: &Timeline) -> usize {
        let referenced: HashSet<Uuid> = timeline
            .tracks
            .iter()
            .flat_map(|t| t.clips.iter())
            .map(|c| c.media_id)
            .collect();
        let before = self.items.len();
        self.items
            .retain(|m| !m.hidden || referenced.contains(&m.id));
        let removed = before - self.items.len();
        if removed > 0 {
            tracing::debug!(removed, "Pruned unreferenced derived media");
        }
        removed
    }
}
