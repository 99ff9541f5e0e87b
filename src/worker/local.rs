use async_trait::async_trait;
use kameo::actor::WeakActorRef;
use kameo::error::{ActorStopReason, Infallible, SendError};
use kameo::prelude::*;
use kameo::reply::ReplyError;
use std::time::{Duration, Instant};

use super::{ClusterWorkerContext, DispatchError, Role, WorkEnvelope, WorkerCreationError, WorkerSettings};

// ============================================================================
// Local Worker - single-consumer actor behind a role
// ============================================================================
//
// Each local role gets one kameo actor with its own bounded mailbox. The
// actor runs one handler invocation at a time, so messages for a role are
// processed in the order the mailbox accepted them. Distinct roles are
// distinct actors and run concurrently.
//
// ============================================================================

/// The processing logic plugged into a local worker
#[async_trait]
pub trait WorkerHandler: Send + 'static {
    async fn on_work(&mut self, envelope: WorkEnvelope, context: &ClusterWorkerContext) -> anyhow::Result<()>;

    /// Push out anything buffered. Called on explicit flush and before shutdown.
    async fn flush(&mut self, _context: &ClusterWorkerContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Builds the handler of a local worker from its settings
pub trait WorkerFactory: Send + Sync {
    fn build(&self, role: &Role, settings: &WorkerSettings) -> Result<Box<dyn WorkerHandler>, WorkerCreationError>;
}

impl<F> WorkerFactory for F
where
    F: Fn(&Role, &WorkerSettings) -> Result<Box<dyn WorkerHandler>, WorkerCreationError> + Send + Sync,
{
    fn build(&self, role: &Role, settings: &WorkerSettings) -> Result<Box<dyn WorkerHandler>, WorkerCreationError> {
        self(role, settings)
    }
}

// ============================================================================
// Messages
// ============================================================================

pub struct Deliver(pub WorkEnvelope);

pub struct Flush;

pub struct GetStats;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStats {
    pub role: Role,
    pub processed: u64,
    pub failed: u64,
}

// Implement Reply for WorkerStats to use it as a message reply type
impl Reply for WorkerStats {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

// ============================================================================
// Local Worker Actor
// ============================================================================

pub struct LocalWorker {
    role: Role,
    handler: Box<dyn WorkerHandler>,
    context: ClusterWorkerContext,
    flush_interval: Option<Duration>,
    processed: u64,
    failed: u64,
}

impl LocalWorker {
    pub fn new(role: Role, handler: Box<dyn WorkerHandler>, context: ClusterWorkerContext) -> Self {
        Self {
            role,
            handler,
            context,
            flush_interval: None,
            processed: 0,
            failed: 0,
        }
    }

    /// Flush the handler on a fixed period while the worker runs
    pub fn with_flush_interval(mut self, interval: Option<Duration>) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Spawn the actor with a mailbox of `queue_size` slots
    pub fn start(self, queue_size: usize) -> WorkerRef {
        let role = self.role.clone();
        let actor = LocalWorker::spawn_with_mailbox(self, kameo::mailbox::bounded(queue_size));
        WorkerRef { role, actor }
    }
}

impl Actor for LocalWorker {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!(
            role = %state.role,
            node = %state.context.node_id(),
            "LocalWorker started"
        );

        if let Some(period) = state.flush_interval {
            spawn_flush_timer(actor_ref.downgrade(), period);
        }
        Ok(state)
    }

    // Runs after the last queued message, so nothing accepted is left buffered
    async fn on_stop(&mut self, _actor_ref: WeakActorRef<Self>, reason: ActorStopReason) -> Result<(), Self::Error> {
        if matches!(reason, ActorStopReason::Killed) {
            tracing::debug!(role = %self.role, "LocalWorker killed");
            return Ok(());
        }

        if let Err(e) = self.handler.flush(&self.context).await {
            tracing::error!(role = %self.role, error = %e, "Worker flush on stop failed");
        }
        tracing::info!(role = %self.role, processed = self.processed, failed = self.failed, "LocalWorker stopped");
        Ok(())
    }
}

// Holds only a weak ref so the timer never keeps a worker alive
fn spawn_flush_timer(actor: WeakActorRef<LocalWorker>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(actor) = actor.upgrade() else { break };
            if !actor.is_alive() {
                break;
            }
            // a full mailbox skips this tick; the next one retries
            let _ = actor.tell(Flush).try_send();
        }
    });
}

impl Message<Deliver> for LocalWorker {
    type Reply = ();

    async fn handle(&mut self, msg: Deliver, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let Deliver(envelope) = msg;
        let envelope_id = envelope.id;
        let started = Instant::now();

        let result = self.handler.on_work(envelope, &self.context).await;
        let elapsed = started.elapsed().as_secs_f64();
        let success = result.is_ok();

        match result {
            Ok(()) => {
                self.processed += 1;
                tracing::debug!(role = %self.role, envelope_id = %envelope_id, "Processed work");
            }
            Err(e) => {
                self.failed += 1;
                tracing::error!(
                    role = %self.role,
                    envelope_id = %envelope_id,
                    error = %e,
                    "Worker handler failed"
                );
            }
        }

        self.context
            .metrics()
            .record_worker_message(self.role.name(), elapsed, success);
    }
}

impl Message<Flush> for LocalWorker {
    type Reply = ();

    async fn handle(&mut self, _msg: Flush, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if let Err(e) = self.handler.flush(&self.context).await {
            tracing::error!(role = %self.role, error = %e, "Worker flush failed");
        }
    }
}

impl Message<GetStats> for LocalWorker {
    type Reply = WorkerStats;

    async fn handle(&mut self, _msg: GetStats, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        WorkerStats {
            role: self.role.clone(),
            processed: self.processed,
            failed: self.failed,
        }
    }
}

// ============================================================================
// Worker Handle
// ============================================================================

/// Handle to a live local worker, as stored in the registry
#[derive(Clone)]
pub struct WorkerRef {
    role: Role,
    actor: ActorRef<LocalWorker>,
}

impl WorkerRef {
    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn is_alive(&self) -> bool {
        self.actor.is_alive()
    }

    /// Non-blocking handoff onto the worker's mailbox. Fails fast when full.
    pub fn enqueue(&self, envelope: WorkEnvelope) -> Result<(), DispatchError> {
        match self.actor.tell(Deliver(envelope)).try_send() {
            Ok(()) => Ok(()),
            Err(SendError::MailboxFull(_)) => Err(DispatchError::QueueFull {
                role: self.role.clone(),
            }),
            Err(_) => Err(DispatchError::WorkerStopped {
                role: self.role.clone(),
            }),
        }
    }

    /// Counters as of every message accepted before this call
    pub async fn stats(&self) -> Result<WorkerStats, DispatchError> {
        self.actor.ask(GetStats).await.map_err(|_| DispatchError::WorkerStopped {
            role: self.role.clone(),
        })
    }

    pub async fn flush(&self) -> Result<(), DispatchError> {
        self.actor.ask(Flush).await.map_err(|_| DispatchError::WorkerStopped {
            role: self.role.clone(),
        })
    }

    /// Drain the mailbox, then stop
    pub async fn stop(&self) {
        if let Err(e) = self.actor.stop_gracefully().await {
            tracing::debug!(role = %self.role, error = ?e, "Worker already stopped");
        }
        self.actor.wait_for_shutdown().await;
    }

    /// Stop immediately, dropping queued messages
    pub fn kill(&self) {
        self.actor.kill();
    }
}

impl std::fmt::Debug for WorkerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRef")
            .field("role", &self.role)
            .field("alive", &self.is_alive())
            .finish()
    }
}
