use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use rusqlite::Connection;
use serde::Deserialize;

use crate::drawers::Drawer;
use crate::error::StoreError;
use crate::filters::FilterEngine;
use crate::presets::{MemoryPresetStore, Preset, PresetStore, SqlitePresetStore};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Where a session's presets live: the workspace database when one is
/// selected, otherwise memory owned by the session.
pub enum SessionStore {
    Workspace(SqlitePresetStore),
    Ephemeral(MemoryPresetStore),
}

impl PresetStore for SessionStore {
    fn load(&self, namespace: &str) -> Result<Vec<Preset>, StoreError> {
        match self {
            SessionStore::Workspace(s) => s.load(namespace),
            SessionStore::Ephemeral(s) => s.load(namespace),
        }
    }

    fn save(&mut self, namespace: &str, presets: &[Preset]) -> Result<(), StoreError> {
        match self {
            SessionStore::Workspace(s) => s.save(namespace, presets),
            SessionStore::Ephemeral(s) => s.save(namespace, presets),
        }
    }
}

pub struct FilterSession {
    pub drawer: Option<Drawer>,
    pub engine: FilterEngine<SessionStore>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Rc<Connection>>,
    pub sessions: HashMap<String, FilterSession>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            sessions: HashMap::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
