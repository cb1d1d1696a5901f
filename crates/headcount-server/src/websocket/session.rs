//! Per-connection session state machine.
//!
//! A session moves `AwaitingInit → Active → Terminated`. It owns its timers,
//! the pending INIT resolution, and its registry participation: a viewer adds
//! one to its token's count, an observer holds a subscription. Termination
//! runs once no matter which event caused it, and dropping the session
//! without terminating still releases the registry participation.

use std::future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use headcount_auth::{CredentialVerifier, ResourceLookup};
use headcount_registry::{CountUpdate, Subscription};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use super::protocol::{self, InitRequest, Request, Role, ServerMessage};
use super::termination::TerminationReason;
use super::timers::{SessionTimers, TimerEvent};
use crate::context::SessionContext;
use crate::metrics::{
    SESSION_INIT_DURATION_SECONDS, SESSIONS_ACTIVATED_TOTAL, SESSIONS_ACTIVE,
    SESSIONS_TERMINATED_TOTAL,
};

/// Lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a successful INIT.
    AwaitingInit,
    /// Bound to a token.
    Active,
    /// Torn down. Terminal.
    Terminated,
}

/// What the session currently holds in the registry.
enum Participation {
    Idle,
    Counted(String),
    Subscribed(Subscription),
}

type PendingInit = BoxFuture<'static, Result<String, TerminationReason>>;

/// One connection's state machine.
pub struct Session {
    ctx: Arc<SessionContext>,
    conn: Arc<ClientConnection>,
    phase: Phase,
    token: Option<String>,
    last_heartbeat: Option<Instant>,
    timers: SessionTimers,
    pending: Option<PendingInit>,
    participation: Participation,
}

impl Session {
    /// Create a session for a freshly opened connection and arm its timers.
    pub fn new(ctx: Arc<SessionContext>, conn: Arc<ClientConnection>) -> Self {
        let timers = SessionTimers::arm(ctx.timing.handshake_timeout, ctx.timing.heartbeat_interval);
        Self {
            ctx,
            conn,
            phase: Phase::AwaitingInit,
            token: None,
            last_heartbeat: None,
            timers,
            pending: None,
            participation: Participation::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Bound token, once INIT has succeeded.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Drive the session until it terminates.
    ///
    /// `inbound` yields decoded text frames and ends when the peer goes away.
    /// Cancelling `shutdown` ends the session with
    /// [`TerminationReason::ServerShutdown`].
    pub async fn run<S>(mut self, mut inbound: S, shutdown: CancellationToken) -> TerminationReason
    where
        S: Stream<Item = String> + Unpin,
    {
        let reason = loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break TerminationReason::ServerShutdown,

                resolved = resolve_pending(&mut self.pending) => {
                    self.pending = None;
                    match resolved {
                        Ok(token) => self.activate(token),
                        Err(reason) => break reason,
                    }
                }

                frame = inbound.next() => match frame {
                    Some(text) => {
                        if let Err(reason) = self.handle_frame(&text) {
                            break reason;
                        }
                    }
                    None => break TerminationReason::PeerClosed,
                },

                event = self.timers.next() => {
                    if let Some(reason) = self.check_timer(event) {
                        break reason;
                    }
                }

                update = next_update(&mut self.participation) => match update {
                    Some(update) => self.forward(&update),
                    None => break TerminationReason::SubscriptionClosed,
                },
            }
        };
        self.terminate(reason);
        reason
    }

    fn handle_frame(&mut self, text: &str) -> Result<(), TerminationReason> {
        match protocol::parse_request(text) {
            Ok(Some(Request::Init(init))) => {
                self.begin_init(init);
                Ok(())
            }
            Ok(Some(Request::Ping)) => {
                self.last_heartbeat = Some(Instant::now());
                Ok(())
            }
            Ok(None) => {
                debug!("ignoring frame of unknown type");
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "malformed frame");
                Err(TerminationReason::MalformedMessage)
            }
        }
    }

    fn begin_init(&mut self, init: InitRequest) {
        if self.phase != Phase::AwaitingInit || self.pending.is_some() {
            debug!(phase = ?self.phase, "ignoring repeated INIT");
            return;
        }
        debug!(token = %init.token, "resolving INIT");
        self.pending = Some(Box::pin(resolve_init(
            self.conn.role,
            init,
            Arc::clone(&self.ctx.verifier),
            Arc::clone(&self.ctx.lookup),
        )));
    }

    fn activate(&mut self, token: String) {
        if self.phase != Phase::AwaitingInit {
            return;
        }
        self.timers.disarm_handshake();
        let role = self.conn.role;
        match role {
            Role::Viewer => {
                let users = self.ctx.registry.increment(&token);
                debug!(users, "viewer counted");
                self.participation = Participation::Counted(token.clone());
            }
            Role::Observer => {
                let subscription = self.ctx.registry.subscribe(&token);
                self.participation = Participation::Subscribed(subscription);
                self.forward_queued();
            }
        }
        let _ = tracing::Span::current().record("token", token.as_str());
        self.token = Some(token);
        self.phase = Phase::Active;
        metrics::counter!(SESSIONS_ACTIVATED_TOTAL, "role" => role.as_str()).increment(1);
        metrics::gauge!(SESSIONS_ACTIVE, "role" => role.as_str()).increment(1.0);
        info!("session active");
    }

    fn forward(&self, update: &CountUpdate) {
        if !self.conn.send_message(&ServerMessage::Users { users: update.users }) {
            warn!(users = update.users, "count update dropped");
        }
    }

    /// Send updates already waiting on the subscription.
    fn forward_queued(&mut self) {
        let mut queued = Vec::new();
        if let Participation::Subscribed(subscription) = &mut self.participation {
            while let Some(update) = subscription.try_recv() {
                queued.push(update);
            }
        }
        for update in &queued {
            self.forward(update);
        }
    }

    fn check_timer(&mut self, event: TimerEvent) -> Option<TerminationReason> {
        match event {
            TimerEvent::HandshakeExpired => self
                .token
                .is_none()
                .then_some(TerminationReason::HandshakeTimeout),
            TimerEvent::HeartbeatCheck => {
                self.token.as_ref()?;
                let timeout = self.ctx.timing.heartbeat_timeout;
                let expired = self
                    .last_heartbeat
                    .is_none_or(|at| at.elapsed() > timeout);
                expired.then_some(TerminationReason::HeartbeatTimeout)
            }
        }
    }

    /// Tear the session down. Only the first call has any effect.
    ///
    /// Order: timers, pending INIT, registry participation, final notice,
    /// channel close.
    fn terminate(&mut self, reason: TerminationReason) {
        if self.phase == Phase::Terminated {
            return;
        }
        self.phase = Phase::Terminated;
        self.timers.cancel();
        self.pending = None;
        self.release();

        if let Some(message) = reason.message() {
            if self.conn.is_open() && !self.conn.send(self.conn.role.encode_notice(message)) {
                warn!("final notice dropped");
            }
        }
        let _ = self.conn.close();

        let role = self.conn.role;
        metrics::counter!(
            SESSIONS_TERMINATED_TOTAL,
            "role" => role.as_str(),
            "reason" => reason.label()
        )
        .increment(1);
        info!(reason = reason.label(), age = ?self.conn.age(), "session terminated");
    }

    /// Undo the registry effect of activation, at most once.
    fn release(&mut self) {
        match std::mem::replace(&mut self.participation, Participation::Idle) {
            Participation::Idle => return,
            Participation::Counted(token) => {
                let users = self.ctx.registry.decrement(&token);
                debug!(users, "viewer released");
            }
            Participation::Subscribed(subscription) => {
                let _ = self.ctx.registry.unsubscribe(&subscription);
            }
        }
        metrics::gauge!(SESSIONS_ACTIVE, "role" => self.conn.role.as_str()).decrement(1.0);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
        if self.phase != Phase::Terminated {
            let _ = self.conn.close();
        }
    }
}

async fn next_update(participation: &mut Participation) -> Option<CountUpdate> {
    match participation {
        Participation::Subscribed(subscription) => subscription.recv().await,
        Participation::Idle | Participation::Counted(_) => future::pending().await,
    }
}

async fn resolve_pending(pending: &mut Option<PendingInit>) -> Result<String, TerminationReason> {
    match pending.as_mut() {
        Some(fut) => fut.await,
        None => future::pending().await,
    }
}

async fn resolve_init(
    role: Role,
    init: InitRequest,
    verifier: Arc<dyn CredentialVerifier>,
    lookup: Arc<dyn ResourceLookup>,
) -> Result<String, TerminationReason> {
    let started = Instant::now();
    let outcome = authorize(role, init, verifier.as_ref(), lookup.as_ref()).await;
    metrics::histogram!(SESSION_INIT_DURATION_SECONDS, "role" => role.as_str())
        .record(started.elapsed().as_secs_f64());
    outcome
}

/// Resolve an INIT to the token the session binds to.
async fn authorize(
    role: Role,
    init: InitRequest,
    verifier: &dyn CredentialVerifier,
    lookup: &dyn ResourceLookup,
) -> Result<String, TerminationReason> {
    match role {
        Role::Viewer => {
            let _ = find_resource(lookup, &init.token).await?;
            Ok(init.token)
        }
        Role::Observer => {
            let id_token = init
                .id_token
                .as_deref()
                .ok_or(TerminationReason::InvalidCredential)?;
            match verifier.verify(id_token).await {
                Ok(identity) => debug!(uid = %identity.uid, "credential verified"),
                Err(e) => {
                    debug!(error = %e, "credential verification failed");
                    return Err(TerminationReason::InvalidCredential);
                }
            }
            let resource = find_resource(lookup, &init.token).await?;
            debug!(owner = %resource.owner_uid, "observing resource");
            Ok(resource.token)
        }
    }
}

async fn find_resource(
    lookup: &dyn ResourceLookup,
    token: &str,
) -> Result<headcount_auth::Resource, TerminationReason> {
    match lookup.find_by_token(token).await {
        Ok(Some(resource)) => Ok(resource),
        Ok(None) => Err(TerminationReason::InvalidToken),
        Err(e) => {
            warn!(error = %e, "resource lookup failed");
            Err(TerminationReason::InvalidToken)
        }
    }
}
