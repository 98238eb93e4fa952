//! Outbound delivery: one unbounded channel per open connection.
//!
//! Every connection task owns the receiving half and drains it into its
//! socket. Anything in the server can push a [`ServerEvent`] to a
//! connection without touching the socket or awaiting: delivery is
//! fire-and-forget, and an event addressed to a connection that already
//! closed is simply dropped.

use std::collections::HashMap;

use gambit_protocol::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;

/// Sending half of a connection's outbound channel.
pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;

/// Receiving half, owned by the connection task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Open connections and their outbound channels.
///
/// Unlike the presence registry this includes connections that never
/// logged in: they still receive `activeUsers` broadcasts.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    senders: HashMap<ConnectionId, OutboundSender>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the outbound channel for a new connection.
    ///
    /// Attaching an id twice replaces the earlier channel; its receiver
    /// sees the channel close.
    pub fn attach(&mut self, connection_id: ConnectionId) -> OutboundReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(connection_id, tx);
        rx
    }

    /// Forgets a connection. Returns `false` if it was not attached.
    pub fn detach(&mut self, connection_id: ConnectionId) -> bool {
        self.senders.remove(&connection_id).is_some()
    }

    /// Queues an event for one connection.
    ///
    /// Returns whether a live channel accepted it. `false` is not an
    /// error: the peer may have left a moment ago.
    pub fn send_to(
        &self,
        connection_id: ConnectionId,
        event: ServerEvent,
    ) -> bool {
        match self.senders.get(&connection_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => {
                tracing::debug!(
                    %connection_id,
                    "dropping event for closed connection"
                );
                false
            }
        }
    }

    /// Queues an event for every open connection. Returns how many
    /// channels accepted it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        self.senders
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn ping() -> ServerEvent {
        ServerEvent::HeartbeatAck {
            client_time: 1,
            server_time: 2,
        }
    }

    #[test]
    fn test_send_to_attached_connection_delivers() {
        let mut hub = ConnectionHub::new();
        let mut rx = hub.attach(cid(1));

        assert!(hub.send_to(cid(1), ping()));
        assert_eq!(rx.try_recv().unwrap(), ping());
    }

    #[test]
    fn test_send_to_unknown_connection_is_dropped() {
        let hub = ConnectionHub::new();
        assert!(!hub.send_to(cid(7), ping()));
    }

    #[test]
    fn test_send_to_after_receiver_dropped_returns_false() {
        let mut hub = ConnectionHub::new();
        let rx = hub.attach(cid(1));
        drop(rx);

        assert!(!hub.send_to(cid(1), ping()));
    }

    #[test]
    fn test_broadcast_reaches_every_open_connection() {
        let mut hub = ConnectionHub::new();
        let mut a = hub.attach(cid(1));
        let mut b = hub.attach(cid(2));
        let closed = hub.attach(cid(3));
        drop(closed);

        let delivered = hub.broadcast(&ping());

        assert_eq!(delivered, 2);
        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
    }

    #[test]
    fn test_detach_stops_delivery() {
        let mut hub = ConnectionHub::new();
        let _rx = hub.attach(cid(1));

        assert!(hub.detach(cid(1)));
        assert!(!hub.detach(cid(1)));
        assert!(!hub.send_to(cid(1), ping()));
        assert!(hub.is_empty());
    }
}
