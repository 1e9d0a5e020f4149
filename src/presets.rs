use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::filters::FilterState;

/// A named snapshot of a full filter state, empty fields included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub filters: FilterState,
}

/// Durable preset storage partitioned by namespace.
///
/// A store keeps presets in insertion order and never deduplicates; callers
/// are expected to enforce name uniqueness before writing the whole list back.
pub trait PresetStore {
    fn load(&self, namespace: &str) -> Result<Vec<Preset>, StoreError>;
    fn save(&mut self, namespace: &str, presets: &[Preset]) -> Result<(), StoreError>;
}

impl<S: PresetStore + ?Sized> PresetStore for Box<S> {
    fn load(&self, namespace: &str) -> Result<Vec<Preset>, StoreError> {
        (**self).load(namespace)
    }

    fn save(&mut self, namespace: &str, presets: &[Preset]) -> Result<(), StoreError> {
        (**self).save(namespace, presets)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryPresetStore {
    namespaces: HashMap<String, Vec<Preset>>,
}

impl MemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresetStore for MemoryPresetStore {
    fn load(&self, namespace: &str) -> Result<Vec<Preset>, StoreError> {
        Ok(self.namespaces.get(namespace).cloned().unwrap_or_default())
    }

    fn save(&mut self, namespace: &str, presets: &[Preset]) -> Result<(), StoreError> {
        self.namespaces
            .insert(namespace.to_string(), presets.to_vec());
        Ok(())
    }
}

/// Presets kept in the workspace database (`filter_presets` table).
#[derive(Clone)]
pub struct SqlitePresetStore {
    conn: Rc<Connection>,
}

impl SqlitePresetStore {
    pub fn new(conn: Rc<Connection>) -> Self {
        Self { conn }
    }

    /// Namespaces that currently hold at least one preset, sorted.
    pub fn namespaces(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT namespace FROM filter_presets ORDER BY namespace")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl PresetStore for SqlitePresetStore {
    fn load(&self, namespace: &str) -> Result<Vec<Preset>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, filters_json
             FROM filter_presets
             WHERE namespace = ?
             ORDER BY sort_order",
        )?;
        let rows = stmt
            .query_map([namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (name, filters_json) in rows {
            let filters: FilterState = serde_json::from_str(&filters_json)?;
            out.push(Preset { name, filters });
        }
        Ok(out)
    }

    fn save(&mut self, namespace: &str, presets: &[Preset]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM filter_presets WHERE namespace = ?", [namespace])?;
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        for (i, p) in presets.iter().enumerate() {
            let filters_json = serde_json::to_string(&p.filters)?;
            tx.execute(
                "INSERT INTO filter_presets(id, namespace, name, sort_order, filters_json, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    namespace,
                    &p.name,
                    i as i64,
                    &filters_json,
                    &updated_at,
                ),
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
