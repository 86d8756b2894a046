//! In-process connection registry for chat rooms and per-user delivery.
//!
//! Every accepted socket hands its outbound half (an unbounded mpsc sender)
//! to the registry, indexed by room name and by authenticated user id. All
//! fan-out paths are fire-and-forget: a send to a closed channel means the
//! writer task is already gone and the entry will be removed on disconnect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::database::models::{Notification, Role};

pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// One live socket. `conn_id` disambiguates multiple tabs for the same user.
pub struct ConnectionEntry {
    pub conn_id: u64,
    pub user_id: Option<Uuid>,
    pub role: Option<Role>,
    pub room: Option<String>,
    tx: ConnectionSender,
}

impl ConnectionEntry {
    /// Queue a JSON frame on this connection. Failures mean the writer task
    /// has exited; the entry is cleaned up by `remove` on disconnect.
    pub fn send_json(&self, payload: &serde_json::Value) -> bool {
        self.tx.send(Message::Text(payload.to_string())).is_ok()
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    rooms: DashMap<String, Vec<Arc<ConnectionEntry>>>,
    users: DashMap<Uuid, Vec<Arc<ConnectionEntry>>>,
    next_conn_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection under its room and/or user index and hand back the
    /// receiver for the connection's writer task.
    pub fn register(
        &self,
        room: Option<&str>,
        user_id: Option<Uuid>,
        role: Option<Role>,
    ) -> (Arc<ConnectionEntry>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let entry = Arc::new(ConnectionEntry {
            conn_id: self.next_conn_id.fetch_add(1, Ordering::Relaxed),
            user_id,
            role,
            room: room.map(str::to_owned),
            tx,
        });

        if let Some(room) = &entry.room {
            self.rooms.entry(room.clone()).or_default().push(entry.clone());
        }
        if let Some(uid) = entry.user_id {
            self.users.entry(uid).or_default().push(entry.clone());
        }

        debug!(
            conn_id = entry.conn_id,
            user_id = ?entry.user_id,
            room = ?entry.room,
            "websocket connection registered"
        );
        (entry, rx)
    }

    /// Drop a connection from every index it appears in. Emptied vectors are
    /// removed so the maps never retain keys with no live connections.
    pub fn remove(&self, entry: &ConnectionEntry) {
        if let Some(room) = &entry.room {
            if let Some(mut conns) = self.rooms.get_mut(room) {
                conns.retain(|c| c.conn_id != entry.conn_id);
                if conns.is_empty() {
                    drop(conns);
                    self.rooms.remove_if(room, |_, v| v.is_empty());
                }
            }
        }
        if let Some(uid) = entry.user_id {
            if let Some(mut conns) = self.users.get_mut(&uid) {
                conns.retain(|c| c.conn_id != entry.conn_id);
                if conns.is_empty() {
                    drop(conns);
                    self.users.remove_if(&uid, |_, v| v.is_empty());
                }
            }
        }
        debug!(conn_id = entry.conn_id, "websocket connection removed");
    }

    /// Fan a frame out to every connection in a room, optionally skipping all
    /// of one user's connections (e.g. the sender of a chat message).
    pub fn broadcast_to_room(
        &self,
        room: &str,
        payload: &serde_json::Value,
        exclude_user: Option<Uuid>,
    ) -> usize {
        let Some(conns) = self.rooms.get(room) else {
            return 0;
        };
        let mut delivered = 0;
        for conn in conns.iter() {
            if exclude_user.is_some() && conn.user_id == exclude_user {
                continue;
            }
            if conn.send_json(payload) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver a frame to every live connection of one user.
    pub fn send_to_user(&self, user_id: Uuid, payload: &serde_json::Value) -> usize {
        let Some(conns) = self.users.get(&user_id) else {
            return 0;
        };
        conns.iter().filter(|c| c.send_json(payload)).count()
    }

    /// Push a stored notification to its live audience: the targeted user's
    /// connections, or every connected superadmin when no user is targeted.
    pub fn push_notification(&self, notification: &Notification) -> usize {
        let payload = serde_json::json!({
            "type": "notification",
            "data": notification,
        });
        match notification.user_id {
            Some(uid) => self.send_to_user(uid, &payload),
            None => {
                let mut delivered = 0;
                for conns in self.users.iter() {
                    for conn in conns.value() {
                        if conn.role == Some(Role::Superadmin) && conn.send_json(&payload) {
                            delivered += 1;
                        }
                    }
                }
                delivered
            }
        }
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|c| c.len()).unwrap_or(0)
    }

    pub fn user_connection_count(&self, user_id: Uuid) -> usize {
        self.users.get(&user_id).map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn notification(user_id: Option<Uuid>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: "order_status".into(),
            title: "Order update".into(),
            message: "Your order shipped".into(),
            read: false,
            data: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    fn recv_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> serde_json::Value {
        match rx.try_recv().unwrap() {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn room_broadcast_skips_excluded_user() {
        let registry = ConnectionRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_a, mut rx_a) = registry.register(Some("seller_admin"), Some(alice), Some(Role::Seller));
        let (_b, mut rx_b) = registry.register(Some("seller_admin"), Some(bob), Some(Role::Superadmin));

        let payload = serde_json::json!({"type": "message", "content": "hi"});
        let delivered = registry.broadcast_to_room("seller_admin", &payload, Some(alice));

        assert_eq!(delivered, 1);
        assert_eq!(recv_json(&mut rx_b), payload);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn personal_send_reaches_every_connection_of_the_user() {
        let registry = ConnectionRegistry::new();
        let uid = Uuid::new_v4();
        let (_c1, mut rx1) = registry.register(None, Some(uid), Some(Role::Customer));
        let (_c2, mut rx2) = registry.register(None, Some(uid), Some(Role::Customer));

        let payload = serde_json::json!({"type": "message", "content": "dm"});
        assert_eq!(registry.send_to_user(uid, &payload), 2);
        assert_eq!(recv_json(&mut rx1), payload);
        assert_eq!(recv_json(&mut rx2), payload);
    }

    #[tokio::test]
    async fn untargeted_notification_goes_only_to_superadmins() {
        let registry = ConnectionRegistry::new();
        let admin = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let (_s, mut rx_seller) = registry.register(Some("seller_admin"), Some(seller), Some(Role::Seller));
        let (_a, mut rx_admin) = registry.register(Some("seller_admin"), Some(admin), Some(Role::Superadmin));

        let delivered = registry.push_notification(&notification(None));

        assert_eq!(delivered, 1);
        assert!(rx_seller.try_recv().is_err());
        let frame = recv_json(&mut rx_admin);
        assert_eq!(frame["type"], "notification");
    }

    #[tokio::test]
    async fn targeted_notification_goes_to_its_user() {
        let registry = ConnectionRegistry::new();
        let uid = Uuid::new_v4();
        let (_c, mut rx) = registry.register(None, Some(uid), Some(Role::Customer));

        assert_eq!(registry.push_notification(&notification(Some(uid))), 1);
        let frame = recv_json(&mut rx);
        assert_eq!(frame["data"]["user_id"], serde_json::json!(uid));
    }

    #[tokio::test]
    async fn remove_clears_empty_room_and_user_slots() {
        let registry = ConnectionRegistry::new();
        let uid = Uuid::new_v4();
        let (entry, _rx) = registry.register(Some("seller_admin"), Some(uid), Some(Role::Seller));

        assert_eq!(registry.room_size("seller_admin"), 1);
        registry.remove(&entry);
        assert_eq!(registry.room_size("seller_admin"), 0);
        assert_eq!(registry.user_connection_count(uid), 0);
        assert!(registry.rooms.get("seller_admin").is_none());
        assert!(registry.users.get(&uid).is_none());
    }
}
