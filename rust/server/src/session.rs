//! Session registry: identity, reconnect tokens, and the live outbound
//! channel for every connection. Writers are connection lifecycle
//! events; readers are the per-table fan-out paths. Sends to a closed
//! channel are deliberate no-ops so a racing disconnect never fails a
//! broadcast.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use uuid::Uuid;

use felt_engine::player::{PlayerId, Role};

use crate::protocol::ServerMessage;

pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug)]
pub struct Session {
    pub player_id: PlayerId,
    pub display_name: String,
    pub reconnect_token: String,
    /// Table membership, if any, with the joined role.
    pub table: Option<(Uuid, Role)>,
    /// Outbound channel of the current connection; `None` while detached.
    pub sender: Option<MessageSender>,
    /// Monotonic id of the owning connection, so a stale disconnect
    /// cannot detach a newer connection.
    pub conn_seq: u64,
}

/// Result of a successful `identify`.
#[derive(Debug, Clone)]
pub struct Identified {
    pub player_id: PlayerId,
    pub display_name: String,
    pub reconnect_token: String,
    /// Set when a reconnecting session is still a member of a table.
    pub rejoined: Option<(Uuid, Role)>,
}

#[derive(Debug, Default)]
struct Inner {
    by_player: HashMap<PlayerId, Session>,
    by_token: HashMap<String, PlayerId>,
    next_conn_seq: u64,
}

#[derive(Debug, Default)]
pub struct SessionManager {
    inner: RwLock<Inner>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new identity, or restore one when a valid reconnect token
    /// is presented. Tokens are single-use: a successful restore rotates
    /// the token and rebinds the session to `sender`, detaching any
    /// previous connection.
    pub fn identify(
        &self,
        display_name: String,
        reconnect_token: Option<String>,
        sender: MessageSender,
    ) -> Result<(Identified, u64), SessionError> {
        let mut inner = self.inner.write().expect("session lock poisoned");
        inner.next_conn_seq += 1;
        let conn_seq = inner.next_conn_seq;

        if let Some(token) = reconnect_token {
            let player_id = inner
                .by_token
                .remove(&token)
                .ok_or(SessionError::BadToken)?;
            let fresh = Uuid::new_v4().to_string();
            inner.by_token.insert(fresh.clone(), player_id);
            let session = inner
                .by_player
                .get_mut(&player_id)
                .expect("token maps to a live session");
            // Dropping the old sender closes the previous connection's
            // outbound pump.
            session.sender = Some(sender);
            session.conn_seq = conn_seq;
            session.reconnect_token = fresh.clone();
            session.display_name = display_name.clone();
            // Spectator sessions do not survive a reconnect; the client
            // re-joins whatever it still cares about.
            if matches!(session.table, Some((_, Role::Spectator))) {
                session.table = None;
            }
            let rejoined = session.table;
            tracing::info!(player_id = %player_id, "session restored via reconnect token");
            return Ok((
                Identified {
                    player_id,
                    display_name,
                    reconnect_token: fresh,
                    rejoined,
                },
                conn_seq,
            ));
        }

        let player_id = Uuid::new_v4();
        let token = Uuid::new_v4().to_string();
        inner.by_token.insert(token.clone(), player_id);
        inner.by_player.insert(
            player_id,
            Session {
                player_id,
                display_name: display_name.clone(),
                reconnect_token: token.clone(),
                table: None,
                sender: Some(sender),
                conn_seq,
            },
        );
        tracing::info!(player_id = %player_id, name = %display_name, "new identity minted");
        Ok((
            Identified {
                player_id,
                display_name,
                reconnect_token: token,
                rejoined: None,
            },
            conn_seq,
        ))
    }

    /// Detach a connection. Returns the table the session was seated at,
    /// if the detach was not stale.
    pub fn disconnect(&self, player_id: PlayerId, conn_seq: u64) -> Option<(Uuid, Role)> {
        let mut inner = self.inner.write().expect("session lock poisoned");
        let session = inner.by_player.get_mut(&player_id)?;
        if session.conn_seq != conn_seq {
            return None;
        }
        session.sender = None;
        session.table
    }

    pub fn set_table(&self, player_id: PlayerId, table: Option<(Uuid, Role)>) {
        let mut inner = self.inner.write().expect("session lock poisoned");
        if let Some(session) = inner.by_player.get_mut(&player_id) {
            session.table = table;
        }
    }

    pub fn table_of(&self, player_id: PlayerId) -> Option<(Uuid, Role)> {
        let inner = self.inner.read().expect("session lock poisoned");
        inner.by_player.get(&player_id).and_then(|s| s.table)
    }

    pub fn display_name(&self, player_id: PlayerId) -> Option<String> {
        let inner = self.inner.read().expect("session lock poisoned");
        inner
            .by_player
            .get(&player_id)
            .map(|s| s.display_name.clone())
    }

    /// Best-effort delivery; a closed or missing channel is a no-op.
    pub fn send_to(&self, player_id: PlayerId, message: ServerMessage) {
        let inner = self.inner.read().expect("session lock poisoned");
        if let Some(sender) = inner
            .by_player
            .get(&player_id)
            .and_then(|s| s.sender.as_ref())
        {
            if sender.send(message).is_err() {
                tracing::debug!(player_id = %player_id, "dropped message for closed connection");
            }
        }
    }

    /// Register an internal (bot) session that has no socket lifecycle.
    pub fn register_internal(&self, display_name: String, sender: MessageSender) -> PlayerId {
        let mut inner = self.inner.write().expect("session lock poisoned");
        let player_id = Uuid::new_v4();
        inner.next_conn_seq += 1;
        let conn_seq = inner.next_conn_seq;
        inner.by_player.insert(
            player_id,
            Session {
                player_id,
                display_name,
                reconnect_token: Uuid::new_v4().to_string(),
                table: None,
                sender: Some(sender),
                conn_seq,
            },
        );
        player_id
    }

    pub fn remove(&self, player_id: PlayerId) {
        let mut inner = self.inner.write().expect("session lock poisoned");
        if let Some(session) = inner.by_player.remove(&player_id) {
            inner.by_token.remove(&session.reconnect_token);
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// Treated as a protocol error: the client should mint a new identity.
    #[error("reconnect token is invalid or already used")]
    BadToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (MessageSender, mpsc::UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn identify_mints_identity_and_token() {
        let sessions = SessionManager::new();
        let (tx, _rx) = channel();
        let (identified, _) = sessions.identify("ada".into(), None, tx).unwrap();
        assert_eq!(identified.display_name, "ada");
        assert!(identified.rejoined.is_none());
        assert!(!identified.reconnect_token.is_empty());
    }

    #[test]
    fn reconnect_token_is_single_use_and_rotates() {
        let sessions = SessionManager::new();
        let (tx, _rx) = channel();
        let (first, _) = sessions.identify("ada".into(), None, tx).unwrap();

        let (tx2, _rx2) = channel();
        let (second, _) = sessions
            .identify("ada".into(), Some(first.reconnect_token.clone()), tx2)
            .unwrap();
        assert_eq!(second.player_id, first.player_id);
        assert_ne!(second.reconnect_token, first.reconnect_token);

        // The old token no longer resolves.
        let (tx3, _rx3) = channel();
        let err = sessions
            .identify("ada".into(), Some(first.reconnect_token), tx3)
            .unwrap_err();
        assert_eq!(err, SessionError::BadToken);
    }

    #[test]
    fn reconnect_rebinds_the_outbound_channel() {
        let sessions = SessionManager::new();
        let (tx, mut old_rx) = channel();
        let (first, _) = sessions.identify("ada".into(), None, tx).unwrap();

        let (tx2, mut new_rx) = channel();
        sessions
            .identify("ada".into(), Some(first.reconnect_token), tx2)
            .unwrap();

        sessions.send_to(
            first.player_id,
            ServerMessage::error(crate::protocol::ErrorCode::InvalidMessage, "ping"),
        );
        assert!(new_rx.try_recv().is_ok());
        assert!(old_rx.try_recv().is_err());
    }

    #[test]
    fn seated_player_reconnect_reports_their_table() {
        let sessions = SessionManager::new();
        let (tx, _rx) = channel();
        let (first, _) = sessions.identify("ada".into(), None, tx).unwrap();
        let table = Uuid::new_v4();
        sessions.set_table(first.player_id, Some((table, Role::Player)));

        let (tx2, _rx2) = channel();
        let (second, _) = sessions
            .identify("ada".into(), Some(first.reconnect_token), tx2)
            .unwrap();
        assert_eq!(second.rejoined, Some((table, Role::Player)));
    }

    #[test]
    fn spectator_membership_is_discarded_on_reconnect() {
        let sessions = SessionManager::new();
        let (tx, _rx) = channel();
        let (first, _) = sessions.identify("eve".into(), None, tx).unwrap();
        sessions.set_table(first.player_id, Some((Uuid::new_v4(), Role::Spectator)));

        let (tx2, _rx2) = channel();
        let (second, _) = sessions
            .identify("eve".into(), Some(first.reconnect_token), tx2)
            .unwrap();
        assert!(second.rejoined.is_none());
    }

    #[test]
    fn stale_disconnect_does_not_detach_a_newer_connection() {
        let sessions = SessionManager::new();
        let (tx, _rx) = channel();
        let (first, old_seq) = sessions.identify("ada".into(), None, tx).unwrap();
        let (tx2, mut rx2) = channel();
        sessions
            .identify("ada".into(), Some(first.reconnect_token), tx2)
            .unwrap();

        // The old connection's teardown arrives after the reconnect.
        assert!(sessions.disconnect(first.player_id, old_seq).is_none());
        sessions.send_to(
            first.player_id,
            ServerMessage::error(crate::protocol::ErrorCode::InvalidMessage, "still here"),
        );
        assert!(rx2.try_recv().is_ok());
    }
}
