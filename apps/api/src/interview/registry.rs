//! Live session lookup.
//!
//! Handles are cloned out on read so no `DashMap` guard is held across an await.
//! Session actors register themselves on spawn and remove themselves when they stop.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::interview::runtime::SessionHandle;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id, handle);
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
