//! Per-token subscription handles.

use std::fmt;

use tokio::sync::mpsc;

/// Identifies one subscription within a [`Registry`](crate::Registry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// A count change for a single token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountUpdate {
    /// Token whose count changed.
    pub token: String,
    /// Count after the change.
    pub users: u64,
}

/// Receiving side of a token subscription.
///
/// The first update is always the count at the moment of subscribing,
/// followed by every later change in the order it was applied. Dropping the
/// handle stops delivery; the registry prunes the dead sender on its next
/// publish. Call [`Registry::unsubscribe`](crate::Registry::unsubscribe) to
/// remove it eagerly.
pub struct Subscription {
    pub(crate) id: SubscriberId,
    pub(crate) token: String,
    pub(crate) rx: mpsc::UnboundedReceiver<CountUpdate>,
}

impl Subscription {
    /// Subscription ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Token this subscription is bound to.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Wait for the next update.
    ///
    /// Returns `None` once the subscription has been removed from the
    /// registry and all queued updates were consumed. Cancel-safe.
    pub async fn recv(&mut self) -> Option<CountUpdate> {
        self.rx.recv().await
    }

    /// Take an already queued update without waiting.
    pub fn try_recv(&mut self) -> Option<CountUpdate> {
        self.rx.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
