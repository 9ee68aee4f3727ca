//! In-process administrative boundary. An HTTP admin layer (out of
//! scope here) calls these; tests and the server binary use them
//! directly.

use chrono::Utc;
use uuid::Uuid;

use felt_engine::cards::Card;
use felt_engine::player::PlayerId;
use felt_engine::state::TableConfig;

use crate::bots;
use crate::protocol::GameOverReason;
use crate::registry::{TableRecord, TableStatus};
use crate::server::AppContext;
use crate::table::{spawn_table, TableCmd};

pub struct AdminApi {
    ctx: AppContext,
}

impl AdminApi {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn list_tables(&self) -> Vec<TableRecord> {
        self.ctx.registry.list_active()
    }

    /// Create the record and spin up the owning task.
    pub fn create_table(&self, name: impl Into<String>, config: TableConfig) -> TableRecord {
        let record = TableRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            config: config.clone(),
            status: TableStatus::Waiting,
            players: 0,
            bots: 0,
            created_at: Utc::now(),
        };
        self.ctx.registry.insert(record.clone());
        let (handle, _join) = spawn_table(record.id, config, self.ctx.table_deps());
        self.ctx.tables.insert(handle);
        tracing::info!(table_id = %record.id, name = %record.name, "table created");
        record
    }

    /// Cancel a table; members receive `gameOver` with reason
    /// `cancelled`.
    pub fn delete_table(&self, id: Uuid) -> bool {
        match self.ctx.tables.remove(id) {
            Some(handle) => {
                handle.send(TableCmd::Shutdown {
                    reason: Some(GameOverReason::Cancelled),
                });
                true
            }
            None => false,
        }
    }

    /// Treat every seated player as ready and attempt to deal.
    pub fn force_start(&self, id: Uuid) -> bool {
        match self.ctx.tables.get(id) {
            Some(handle) => {
                handle.send(TableCmd::ForceStart);
                true
            }
            None => false,
        }
    }

    /// Preload the next hand's deck permutation; consumed exactly once.
    pub fn inject_deck(&self, id: Uuid, cards: Vec<Card>) -> bool {
        match self.ctx.tables.get(id) {
            Some(handle) => {
                handle.send(TableCmd::InjectDeck { cards });
                true
            }
            None => false,
        }
    }

    /// Launch an internal client speaking the player protocol. The bot
    /// occupies a seat like any player and is flagged in listings.
    pub fn add_bot(&self, id: Uuid, strategy: &str) -> Option<PlayerId> {
        let handle = self.ctx.tables.get(id)?;
        Some(bots::spawn_bot(&self.ctx, handle, strategy))
    }
}
