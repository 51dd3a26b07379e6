//! Bijection between transport ids and engine handles.

use std::collections::{HashMap, HashSet};

use frensie_geometry::{GeometryError, Result};

use crate::engine::EntityHandle;

/// Maps user-facing ids to engine handles and back.
///
/// Built once from the engine's entity list; the order of that list is kept
/// as the canonical iteration order. With fast lookup the handler also keeps
/// hash tables in both directions, otherwise every query scans the list.
#[derive(Debug, Clone, Default)]
pub struct EntityHandler {
    entities: Vec<(u64, EntityHandle)>,
    handles: Vec<EntityHandle>,
    lookup: Option<Lookup>,
}

#[derive(Debug, Clone, Default)]
struct Lookup {
    by_id: HashMap<u64, EntityHandle>,
    by_handle: HashMap<EntityHandle, u64>,
}

impl EntityHandler {
    /// Build the bijection from `(id, handle)` pairs.
    ///
    /// `kind` names the entity kind in error messages. Ids must be unique and
    /// non-zero.
    pub fn new(
        kind: &str,
        entities: impl IntoIterator<Item = (u64, EntityHandle)>,
        fast_lookup: bool,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut handler = Self::default();

        for (id, handle) in entities {
            if id == 0 {
                return Err(GeometryError::InvalidGeometry(format!(
                    "{kind} {handle} has the reserved id 0"
                )));
            }
            if !seen.insert(id) {
                return Err(GeometryError::InvalidGeometry(format!(
                    "{kind} id {id} is used more than once"
                )));
            }
            handler.entities.push((id, handle));
            handler.handles.push(handle);
        }

        if fast_lookup {
            handler.lookup = Some(Lookup {
                by_id: handler.entities.iter().copied().collect(),
                by_handle: handler.entities.iter().map(|&(id, h)| (h, id)).collect(),
            });
        }

        Ok(handler)
    }

    /// Check if the hash tables were built.
    pub fn has_fast_lookup(&self) -> bool {
        self.lookup.is_some()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if there are no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Check if an id exists.
    pub fn contains_id(&self, id: u64) -> bool {
        self.handle(id).is_some()
    }

    /// Engine handle of an id.
    pub fn handle(&self, id: u64) -> Option<EntityHandle> {
        match &self.lookup {
            Some(lookup) => lookup.by_id.get(&id).copied(),
            None => self
                .entities
                .iter()
                .find(|&&(entity_id, _)| entity_id == id)
                .map(|&(_, handle)| handle),
        }
    }

    /// Id of an engine handle.
    pub fn id(&self, handle: EntityHandle) -> Option<u64> {
        match &self.lookup {
            Some(lookup) => lookup.by_handle.get(&handle).copied(),
            None => self
                .entities
                .iter()
                .find(|&&(_, entity_handle)| entity_handle == handle)
                .map(|&(id, _)| id),
        }
    }

    /// Handles in engine order.
    pub fn handles(&self) -> &[EntityHandle] {
        &self.handles
    }

    /// Ids in engine order.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entities.iter().map(|&(id, _)| id)
    }
}
