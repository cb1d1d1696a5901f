//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::protocol::{Role, ServerMessage};
use crate::metrics::WS_MESSAGES_DROPPED_TOTAL;

/// Outbound half of one connected peer.
///
/// Text frames are queued to the socket's writer task. Closing is one-way:
/// once [`close`](Self::close) or [`mark_peer_closed`](Self::mark_peer_closed)
/// has run, further sends are refused.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Endpoint the peer connected to.
    pub role: Role,
    tx: mpsc::Sender<String>,
    open: AtomicBool,
    closing: CancellationToken,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Count of messages dropped due to full or closed channel.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection and the receiving end its writer task drains.
    pub fn new(id: String, role: Role, buffer: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let conn = Arc::new(Self {
            id,
            role,
            tx,
            open: AtomicBool::new(true),
            closing: CancellationToken::new(),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        });
        (conn, rx)
    }

    /// Queue a text frame.
    ///
    /// Returns `false` if the connection is closed or the queue is full, and
    /// increments the dropped message counter.
    pub fn send(&self, message: String) -> bool {
        if !self.is_open() {
            return false;
        }
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(WS_MESSAGES_DROPPED_TOTAL, "role" => self.role.as_str()).increment(1);
            false
        }
    }

    /// Serialize a server message and queue it.
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        self.send(message.to_json())
    }

    /// Ask the writer task to flush queued frames and close the socket.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn close(&self) -> bool {
        let was_open = self.open.swap(false, Ordering::AcqRel);
        self.closing.cancel();
        was_open
    }

    /// Record that the peer already closed the socket.
    pub fn mark_peer_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Whether frames can still be sent.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Token cancelled when the server decides to close the socket.
    pub fn closing(&self) -> CancellationToken {
        self.closing.clone()
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(buffer: usize) -> (Arc<ClientConnection>, mpsc::Receiver<String>) {
        ClientConnection::new("conn_1".into(), Role::Observer, buffer)
    }

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection(8);
        assert_eq!(conn.id, "conn_1");
        assert_eq!(conn.role, Role::Observer);
        assert!(conn.is_open());
        assert!(!conn.closing().is_cancelled());
        assert_eq!(conn.drop_count(), 0);
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection(8);
        assert!(conn.send("hello".into()));
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn send_server_message_serializes() {
        let (conn, mut rx) = make_connection(8);
        assert!(conn.send_message(&ServerMessage::Users { users: 2 }));
        let parsed: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(parsed["type"], "USERS");
        assert_eq!(parsed["users"], 2);
    }

    #[test]
    fn send_to_full_channel_counts_drop() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send("msg1".into()));
        assert!(!conn.send("msg2".into()));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_dropped_receiver_counts_drop() {
        let (conn, rx) = make_connection(8);
        drop(rx);
        assert!(!conn.send("hello".into()));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn zero_buffer_is_raised_to_one() {
        let (conn, _rx) = make_connection(0);
        assert!(conn.send("only".into()));
    }

    #[test]
    fn close_is_idempotent() {
        let (conn, _rx) = make_connection(8);
        assert!(conn.close());
        assert!(!conn.close());
        assert!(!conn.is_open());
        assert!(conn.closing().is_cancelled());
    }

    #[test]
    fn send_after_close_refused() {
        let (conn, mut rx) = make_connection(8);
        let _ = conn.close();
        assert!(!conn.send("late".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn peer_closed_does_not_signal_writer() {
        let (conn, _rx) = make_connection(8);
        conn.mark_peer_closed();
        assert!(!conn.is_open());
        assert!(!conn.closing().is_cancelled());
        assert!(!conn.close());
    }

    #[test]
    fn age_is_non_negative() {
        let (conn, _rx) = make_connection(8);
        assert!(conn.age() < Duration::from_secs(5));
    }
}
