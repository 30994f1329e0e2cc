//! Actor wrapper that owns a [`SyncCoordinator`] on a tokio task.
//!
//! Commands, inbound frames, vote-window expiries and the gossip interval
//! are all handled by that one task, so they never touch the state
//! concurrently.

use chorus_core::models::{ClaimState, ClaimValue, MemoryRecordId};
use chorus_core::{ExperienceEvent, KnowledgeItem, ReplicaId, SyncError};
use chorus_crdt::AgentStateCRDT;
use chorus_gossip::RoundReport;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::confirmed::ConfirmedClaim;
use crate::coordinator::{ApplyOutcome, MemoryMetadata, SyncCoordinator};

const COMMAND_QUEUE: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, SyncError>>;

enum Command {
    Ingest {
        content: String,
        metadata: MemoryMetadata,
        reply: Reply<MemoryRecordId>,
    },
    Incoming {
        event: ExperienceEvent,
        reply: Reply<ApplyOutcome>,
    },
    Attest {
        claim_id: Option<Uuid>,
        item: KnowledgeItem,
        value: ClaimValue,
        reply: Reply<Uuid>,
    },
    TriggerRound,
    RunRound {
        reply: Reply<RoundReport>,
    },
    AddPeer {
        peer: ReplicaId,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<AgentStateCRDT>,
    },
    ClaimState {
        claim_id: Uuid,
        reply: oneshot::Sender<Option<ClaimState>>,
    },
    Confirmed {
        reply: oneshot::Sender<Vec<ConfirmedClaim>>,
    },
    Shutdown {
        reply: oneshot::Sender<SyncCoordinator>,
    },
}

/// Cloneable front end of a running coordinator.
#[derive(Clone)]
pub struct SyncHandle {
    replica: ReplicaId,
    commands: mpsc::Sender<Command>,
}

impl SyncHandle {
    /// Move `coordinator` onto its own task and start the gossip timer.
    pub fn spawn(mut coordinator: SyncCoordinator) -> (Self, JoinHandle<()>) {
        let replica = coordinator.replica().clone();
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        coordinator.set_expiry_notifier(expiry_tx);
        let inbound = coordinator.take_inbound();

        let task = tokio::spawn(run(coordinator, rx, inbound, expiry_rx));
        info!(replica = %replica, "sync actor spawned");
        (Self { replica, commands }, task)
    }

    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    /// Ask for a gossip round without waiting for it. Returns `false` when
    /// the actor is gone or its queue is full.
    pub fn trigger_sync_round(&self) -> bool {
        self.commands.try_send(Command::TriggerRound).is_ok()
    }

    /// Run a gossip round and wait for its report.
    pub async fn sync_round(&self) -> Result<RoundReport, SyncError> {
        self.request(|reply| Command::RunRound { reply }).await
    }

    pub async fn ingest_local(
        &self,
        content: impl Into<String>,
        metadata: MemoryMetadata,
    ) -> Result<MemoryRecordId, SyncError> {
        let content = content.into();
        self.request(|reply| Command::Ingest {
            content,
            metadata,
            reply,
        })
        .await
    }

    pub async fn on_incoming_event(&self, event: ExperienceEvent) -> Result<ApplyOutcome, SyncError> {
        self.request(|reply| Command::Incoming { event, reply }).await
    }

    pub async fn attest(
        &self,
        claim_id: Option<Uuid>,
        item: KnowledgeItem,
        value: ClaimValue,
    ) -> Result<Uuid, SyncError> {
        self.request(|reply| Command::Attest {
            claim_id,
            item,
            value,
            reply,
        })
        .await
    }

    pub async fn add_peer(&self, peer: impl Into<ReplicaId>) -> Result<bool, SyncError> {
        let peer = peer.into();
        self.ask(|reply| Command::AddPeer { peer, reply }).await
    }

    pub async fn snapshot(&self) -> Result<AgentStateCRDT, SyncError> {
        self.ask(|reply| Command::Snapshot { reply }).await
    }

    pub async fn claim_state(&self, claim_id: Uuid) -> Result<Option<ClaimState>, SyncError> {
        self.ask(|reply| Command::ClaimState { claim_id, reply }).await
    }

    pub async fn confirmed_claims(&self) -> Result<Vec<ConfirmedClaim>, SyncError> {
        self.ask(|reply| Command::Confirmed { reply }).await
    }

    /// Stop the actor and take the coordinator back.
    pub async fn shutdown(&self) -> Result<SyncCoordinator, SyncError> {
        self.ask(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SyncError> {
        self.ask(command).await?
    }

    /// Send a command and wait for its reply. A stopped actor reads as a
    /// halted coordinator.
    async fn ask<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SyncError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SyncError::Halted)?;
        response.await.map_err(|_| SyncError::Halted)
    }
}

async fn next_frame(inbound: &mut Option<mpsc::UnboundedReceiver<Vec<u8>>>) -> Option<Vec<u8>> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run(
    mut coordinator: SyncCoordinator,
    mut commands: mpsc::Receiver<Command>,
    mut inbound: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    mut expiries: mpsc::UnboundedReceiver<Uuid>,
) {
    let mut ticker = tokio::time::interval(coordinator.config().gossip.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!(replica = %coordinator.replica(), "all handles dropped");
                    break;
                };
                if let Some(done) = handle_command(&mut coordinator, command).await {
                    let _ = done.send(coordinator);
                    return;
                }
            }
            Some(bytes) = next_frame(&mut inbound) => {
                if let Err(e) = coordinator.handle_frame(&bytes) {
                    warn!(error = %e, "inbound frame not processed");
                }
            }
            Some(claim_id) = expiries.recv() => {
                debug!(claim_id = %claim_id, "vote window elapsed");
                if let Err(e) = coordinator.process_expirations() {
                    warn!(error = %e, "expiry sweep skipped");
                }
            }
            _ = ticker.tick() => {
                if coordinator.is_halted() {
                    continue;
                }
                gossip_tick(&mut coordinator).await;
            }
        }
    }
}

async fn gossip_tick(coordinator: &mut SyncCoordinator) {
    if let Err(e) = coordinator.process_inbound() {
        warn!(error = %e, "inbound drain failed");
    }
    if let Err(e) = coordinator.process_expirations() {
        warn!(error = %e, "expiry sweep failed");
    }
    if let Err(e) = coordinator.run_sync_round().await {
        warn!(error = %e, "gossip round failed");
    }
}

/// Returns the shutdown reply channel when the actor should stop.
async fn handle_command(
    coordinator: &mut SyncCoordinator,
    command: Command,
) -> Option<oneshot::Sender<SyncCoordinator>> {
    match command {
        Command::Ingest {
            content,
            metadata,
            reply,
        } => {
            let _ = reply.send(coordinator.ingest_local(content, metadata));
        }
        Command::Incoming { event, reply } => {
            let _ = reply.send(coordinator.on_incoming_event(event));
        }
        Command::Attest {
            claim_id,
            item,
            value,
            reply,
        } => {
            let _ = reply.send(coordinator.attest(claim_id, item, value));
        }
        Command::TriggerRound => gossip_tick(coordinator).await,
        Command::RunRound { reply } => {
            let _ = reply.send(coordinator.run_sync_round().await);
        }
        Command::AddPeer { peer, reply } => {
            let _ = reply.send(coordinator.add_peer(peer));
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(coordinator.snapshot());
        }
        Command::ClaimState { claim_id, reply } => {
            let _ = reply.send(coordinator.claim_state(&claim_id));
        }
        Command::Confirmed { reply } => {
            let _ = reply.send(coordinator.confirmed_claims());
        }
        Command::Shutdown { reply } => return Some(reply),
    }
    None
}
