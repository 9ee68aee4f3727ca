//! Table records: the read-mostly catalog behind `listGames` and the
//! admin boundary. The core only ever updates status and occupancy.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use felt_engine::state::TableConfig;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Waiting,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    pub id: Uuid,
    pub name: String,
    pub config: TableConfig,
    pub status: TableStatus,
    pub players: usize,
    pub bots: usize,
    pub created_at: DateTime<Utc>,
}

/// Catalog of known tables. Read-only from the core's perspective apart
/// from status and occupancy updates.
pub trait GameRegistry: Send + Sync {
    fn insert(&self, record: TableRecord);
    fn get_by_id(&self, id: Uuid) -> Option<TableRecord>;
    fn list_active(&self) -> Vec<TableRecord>;
    fn update_status(&self, id: Uuid, status: TableStatus);
    fn update_occupancy(&self, id: Uuid, players: usize, bots: usize);
    fn get_starting_config(&self, id: Uuid) -> Option<TableConfig>;
    fn remove(&self, id: Uuid);
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    records: RwLock<HashMap<Uuid, TableRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameRegistry for InMemoryRegistry {
    fn insert(&self, record: TableRecord) {
        self.records
            .write()
            .expect("registry lock poisoned")
            .insert(record.id, record);
    }

    fn get_by_id(&self, id: Uuid) -> Option<TableRecord> {
        self.records
            .read()
            .expect("registry lock poisoned")
            .get(&id)
            .cloned()
    }

    fn list_active(&self) -> Vec<TableRecord> {
        let mut records: Vec<TableRecord> = self
            .records
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|r| matches!(r.status, TableStatus::Waiting | TableStatus::Active))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    fn update_status(&self, id: Uuid, status: TableStatus) {
        if let Some(record) = self
            .records
            .write()
            .expect("registry lock poisoned")
            .get_mut(&id)
        {
            record.status = status;
        }
    }

    fn update_occupancy(&self, id: Uuid, players: usize, bots: usize) {
        if let Some(record) = self
            .records
            .write()
            .expect("registry lock poisoned")
            .get_mut(&id)
        {
            record.players = players;
            record.bots = bots;
        }
    }

    fn get_starting_config(&self, id: Uuid) -> Option<TableConfig> {
        self.get_by_id(id).map(|r| r.config)
    }

    fn remove(&self, id: Uuid) {
        self.records
            .write()
            .expect("registry lock poisoned")
            .remove(&id);
    }
}
