//! Vote collection and claim decisions.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use chorus_core::config::ByzantineConfig;
use chorus_core::errors::QuorumError;
use chorus_core::models::{ClaimDecision, ClaimState, ClaimValue, SyncRecord};
use chorus_core::traits::IEventSink;
use chorus_core::{ReplicaId, VoteRecord};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::outliers::iqr_fence;
use crate::quorum::{fault_tolerance, quorum_size};
use crate::strategy::{strategy_for, AggregationStrategy};

struct PendingClaim {
    /// First vote of every voter. Later, different votes do not replace it.
    votes: BTreeMap<ReplicaId, VoteRecord>,
    equivocators: BTreeSet<ReplicaId>,
    deadline: Instant,
    timer: Option<JoinHandle<()>>,
}

impl PendingClaim {
    fn kind(&self) -> Option<ClaimValue> {
        self.votes.values().next().map(|v| v.claimed_value)
    }
}

/// Outcome of assessing the votes collected so far.
struct Verdict {
    state: ClaimState,
    value: Option<ClaimValue>,
    voters: Vec<ReplicaId>,
    outliers: Vec<ReplicaId>,
    reason: String,
}

impl Verdict {
    fn pending() -> Self {
        Self {
            state: ClaimState::Pending,
            value: None,
            voters: Vec::new(),
            outliers: Vec::new(),
            reason: String::new(),
        }
    }

    fn rejected(reason: String, voters: Vec<ReplicaId>, outliers: Vec<ReplicaId>) -> Self {
        Self {
            state: ClaimState::Rejected,
            value: None,
            voters,
            outliers,
            reason,
        }
    }
}

/// Collects votes per claim and decides each claim exactly once.
///
/// Every claim gets a deadline when its first vote arrives. With an expiry
/// notifier installed and a tokio runtime available, a timer task posts the
/// claim id when the deadline passes; [`ByzantineAggregator::process_expirations`]
/// sweeps overdue claims either way.
pub struct ByzantineAggregator {
    config: ByzantineConfig,
    strategy: Box<dyn AggregationStrategy>,
    sink: Arc<dyn IEventSink>,
    active_replicas: usize,
    pending: HashMap<Uuid, PendingClaim>,
    arrival: VecDeque<Uuid>,
    decided: HashMap<Uuid, ClaimDecision>,
    decided_order: VecDeque<Uuid>,
    notifier: Option<mpsc::UnboundedSender<Uuid>>,
}

impl ByzantineAggregator {
    pub fn new(config: ByzantineConfig, active_replicas: usize, sink: Arc<dyn IEventSink>) -> Self {
        Self {
            strategy: strategy_for(&config),
            config,
            sink,
            active_replicas: active_replicas.max(1),
            pending: HashMap::new(),
            arrival: VecDeque::new(),
            decided: HashMap::new(),
            decided_order: VecDeque::new(),
            notifier: None,
        }
    }

    /// Post the id of every claim whose vote window elapses to `tx`.
    pub fn with_expiry_notifier(mut self, tx: mpsc::UnboundedSender<Uuid>) -> Self {
        self.set_expiry_notifier(tx);
        self
    }

    /// Claims opened before the call keep running without a timer; the
    /// sweep still expires them.
    pub fn set_expiry_notifier(&mut self, tx: mpsc::UnboundedSender<Uuid>) {
        self.notifier = Some(tx);
    }

    /// Cluster size used for quorum math. Applies from the next vote on.
    pub fn set_active_replicas(&mut self, active: usize) {
        self.active_replicas = active.max(1);
    }

    pub fn active_replicas(&self) -> usize {
        self.active_replicas
    }

    pub fn quorum(&self) -> usize {
        quorum_size(self.active_replicas, self.config.quorum_fraction)
    }

    pub fn fault_tolerance(&self) -> usize {
        fault_tolerance(self.active_replicas)
    }

    pub fn pending_claims(&self) -> usize {
        self.pending.len()
    }

    pub fn claim_state(&self, claim_id: &Uuid) -> Option<ClaimState> {
        if self.pending.contains_key(claim_id) {
            return Some(ClaimState::Pending);
        }
        self.decided.get(claim_id).map(|d| d.state)
    }

    pub fn decision(&self, claim_id: &Uuid) -> Option<&ClaimDecision> {
        self.decided.get(claim_id)
    }

    /// Record one replica's report and decide the claim if possible.
    ///
    /// Returns the claim state after the vote. Votes for decided claims are
    /// ignored with [`QuorumError::AlreadyDecided`]. A voter that changes its
    /// value is recorded as equivocating and gets [`QuorumError::EquivocatingVote`];
    /// its first vote stands.
    #[instrument(skip(self, vote), fields(claim_id = %vote.event_id, voter = %vote.voter_replica))]
    pub fn register_vote(&mut self, vote: VoteRecord) -> Result<ClaimState, QuorumError> {
        let claim_id = vote.event_id;
        if let Some(decision) = self.decided.get(&claim_id) {
            debug!(state = %decision.state, "late vote ignored");
            return Err(QuorumError::AlreadyDecided {
                claim_id,
                state: decision.state.to_string(),
            });
        }
        if !self.pending.contains_key(&claim_id) {
            self.open(claim_id);
        }
        let Some(claim) = self.pending.get_mut(&claim_id) else {
            return Err(QuorumError::UnknownClaim { claim_id });
        };

        if let Some(kind) = claim.kind() {
            if !kind.same_kind(&vote.claimed_value) {
                warn!(value = %vote.claimed_value, "vote kind differs from claim");
                return Err(QuorumError::MixedClaimKinds { claim_id });
            }
        }

        let voter = vote.voter_replica.clone();
        let equivocated = match claim.votes.get(&voter) {
            Some(first) if first.claimed_value == vote.claimed_value => {
                // Redelivered vote.
                return Ok(ClaimState::Pending);
            }
            Some(first) => {
                warn!(
                    first = %first.claimed_value,
                    second = %vote.claimed_value,
                    "equivocating voter"
                );
                claim.equivocators.insert(voter.clone());
                true
            }
            None => {
                claim.votes.insert(voter.clone(), vote);
                self.sink.publish(SyncRecord::VoteRegistered {
                    claim_id,
                    voter: voter.clone(),
                });
                false
            }
        };

        let state = self.evaluate(claim_id);
        if equivocated {
            return Err(QuorumError::EquivocatingVote {
                claim_id,
                voter: voter.to_string(),
            });
        }
        Ok(state)
    }

    /// Expire every pending claim whose deadline has passed.
    pub fn process_expirations(&mut self) -> Vec<ClaimDecision> {
        let now = Instant::now();
        let mut overdue: Vec<(Instant, Uuid)> = self
            .pending
            .iter()
            .filter(|(_, claim)| claim.deadline <= now)
            .map(|(id, claim)| (claim.deadline, *id))
            .collect();
        overdue.sort();

        overdue
            .into_iter()
            .filter_map(|(_, claim_id)| {
                let reason = match self.pending.get(&claim_id) {
                    Some(claim) => format!(
                        "vote window elapsed with {} of {} required reports",
                        claim.votes.len(),
                        self.quorum()
                    ),
                    None => return None,
                };
                self.expire(claim_id, reason)
            })
            .collect()
    }

    fn open(&mut self, claim_id: Uuid) {
        while self.pending.len() >= self.config.max_pending_claims {
            let Some(oldest) = self.arrival.pop_front() else {
                break;
            };
            if self.pending.contains_key(&oldest) {
                warn!(evicted = %oldest, "pending claim cap reached");
                self.expire(oldest, "evicted: pending claim cap reached".to_string());
            }
        }

        let deadline = Instant::now() + self.config.vote_timeout();
        let timer = self.notifier.as_ref().and_then(|tx| {
            let handle = tokio::runtime::Handle::try_current().ok()?;
            let tx = tx.clone();
            Some(handle.spawn(async move {
                tokio::time::sleep_until(deadline).await;
                let _ = tx.send(claim_id);
            }))
        });

        debug!(claim_id = %claim_id, "claim opened");
        self.pending.insert(
            claim_id,
            PendingClaim {
                votes: BTreeMap::new(),
                equivocators: BTreeSet::new(),
                deadline,
                timer,
            },
        );
        self.arrival.push_back(claim_id);
    }

    fn evaluate(&mut self, claim_id: Uuid) -> ClaimState {
        let Some(claim) = self.pending.get(&claim_id) else {
            return self.claim_state(&claim_id).unwrap_or(ClaimState::Pending);
        };
        let quorum = self.quorum();
        let tolerance = self.fault_tolerance();
        let verdict = match claim.kind() {
            Some(ClaimValue::Numeric(_)) => assess_numeric(
                claim,
                quorum,
                tolerance,
                self.strategy.as_ref(),
                &self.config,
            ),
            Some(ClaimValue::Presence(_)) => assess_presence(claim, quorum, tolerance),
            None => Verdict::pending(),
        };
        if verdict.state.is_terminal() {
            self.finalize(claim_id, verdict);
        }
        self.claim_state(&claim_id).unwrap_or(ClaimState::Pending)
    }

    fn expire(&mut self, claim_id: Uuid, reason: String) -> Option<ClaimDecision> {
        let voters = self
            .pending
            .get(&claim_id)?
            .votes
            .keys()
            .cloned()
            .collect();
        warn!(claim_id = %claim_id, reason = %reason, "claim expired");
        self.finalize(
            claim_id,
            Verdict {
                state: ClaimState::Expired,
                value: None,
                voters,
                outliers: Vec::new(),
                reason,
            },
        )
    }

    fn finalize(&mut self, claim_id: Uuid, verdict: Verdict) -> Option<ClaimDecision> {
        let claim = self.pending.remove(&claim_id)?;
        if let Some(timer) = claim.timer {
            timer.abort();
        }
        self.arrival.retain(|id| *id != claim_id);

        let decision = ClaimDecision {
            claim_id,
            state: verdict.state,
            value: verdict.value,
            voters: verdict.voters,
            outliers: verdict.outliers,
            equivocators: claim.equivocators.into_iter().collect(),
            votes_received: claim.votes.len(),
            quorum: self.quorum(),
            reason: verdict.reason,
            decided_at: Utc::now(),
        };
        info!(
            claim_id = %claim_id,
            state = %decision.state,
            votes = decision.votes_received,
            quorum = decision.quorum,
            "claim decided"
        );

        self.decided.insert(claim_id, decision.clone());
        self.decided_order.push_back(claim_id);
        while self.decided_order.len() > self.config.decided_history {
            if let Some(old) = self.decided_order.pop_front() {
                self.decided.remove(&old);
            }
        }
        self.sink.publish(SyncRecord::ClaimDecided(decision.clone()));
        Some(decision)
    }
}

impl Drop for ByzantineAggregator {
    fn drop(&mut self) {
        for claim in self.pending.values_mut() {
            if let Some(timer) = claim.timer.take() {
                timer.abort();
            }
        }
    }
}

fn assess_numeric(
    claim: &PendingClaim,
    quorum: usize,
    tolerance: usize,
    strategy: &dyn AggregationStrategy,
    config: &ByzantineConfig,
) -> Verdict {
    let honest: Vec<(&ReplicaId, f64)> = claim
        .votes
        .iter()
        .filter(|(voter, _)| !claim.equivocators.contains(*voter))
        .filter_map(|(voter, vote)| match vote.claimed_value {
            ClaimValue::Numeric(v) => Some((voter, v)),
            ClaimValue::Presence(_) => None,
        })
        .collect();
    let equivocating = claim.equivocators.len();

    if equivocating > tolerance {
        return Verdict::rejected(
            format!("{equivocating} equivocating voters exceed tolerance {tolerance}"),
            Vec::new(),
            Vec::new(),
        );
    }
    if honest.len() < quorum {
        return Verdict::pending();
    }

    let values: Vec<f64> = honest.iter().map(|(_, v)| *v).collect();
    let fence = iqr_fence(&values, config.iqr_multiplier, config.outlier_floor);
    let voters: Vec<ReplicaId> = fence.inliers.iter().map(|&i| honest[i].0.clone()).collect();
    let outliers: Vec<ReplicaId> = fence.outliers.iter().map(|&i| honest[i].0.clone()).collect();

    let conflicting = outliers.len() + equivocating;
    if conflicting > tolerance {
        return Verdict::rejected(
            format!("{conflicting} conflicting reports exceed tolerance {tolerance}"),
            voters,
            outliers,
        );
    }
    if voters.len() < quorum {
        return Verdict::pending();
    }

    let kept: Vec<f64> = fence.inliers.iter().map(|&i| values[i]).collect();
    match strategy.aggregate(&kept) {
        Some(value) => Verdict {
            state: ClaimState::Accepted,
            value: Some(ClaimValue::Numeric(value)),
            reason: format!(
                "{} of {} corroborating reports, {} aggregate",
                voters.len(),
                quorum,
                strategy.name()
            ),
            voters,
            outliers,
        },
        None => Verdict::pending(),
    }
}

fn assess_presence(claim: &PendingClaim, quorum: usize, tolerance: usize) -> Verdict {
    let mut yes = Vec::new();
    let mut no = Vec::new();
    for (voter, vote) in &claim.votes {
        if claim.equivocators.contains(voter) {
            continue;
        }
        match vote.claimed_value {
            ClaimValue::Presence(true) => yes.push(voter.clone()),
            ClaimValue::Presence(false) => no.push(voter.clone()),
            ClaimValue::Numeric(_) => {}
        }
    }

    let majority = yes.len() >= no.len();
    let (winners, dissenters) = if majority { (yes, no) } else { (no, yes) };
    let conflicting = dissenters.len() + claim.equivocators.len();
    if conflicting > tolerance {
        return Verdict::rejected(
            format!("{conflicting} dissenting reports exceed tolerance {tolerance}"),
            winners,
            dissenters,
        );
    }
    if winners.len() + dissenters.len() < quorum || winners.len() == dissenters.len() {
        return Verdict::pending();
    }
    Verdict {
        state: ClaimState::Accepted,
        value: Some(ClaimValue::Presence(majority)),
        reason: format!(
            "majority {} with {} of {} reports",
            majority,
            winners.len(),
            winners.len() + dissenters.len()
        ),
        voters: winners,
        outliers: dissenters,
    }
}
