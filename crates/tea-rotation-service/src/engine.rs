//! Tea assignment engine.
//!
//! Drives the two-phase summarize workflow over an injected [`Store`]:
//!
//! 1. **Propose**: rank the session's participants and return the top
//!    candidates. Read-only.
//! 2. **Commit**: validate the confirmed assignee, claim the session, advance
//!    the rotation counters and close the session.
//!
//! # Double-commit guard
//!
//! A commit first takes a claim on the session with a conditional write. Only
//! the claim holder may run bookkeeping and complete the session, so a replay
//! or a concurrent confirmation fails with
//! [`EngineError::ConcurrentModification`] before any counter moves.
//!
//! Before touching a counter the holder records a bookkeeping marker on the
//! session. The marker outlives the claim. A retry after a failed completion
//! write, or a takeover after the lease expired, sees it and goes straight to
//! completion, so the counters move at most once per session.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use tea_rotation_core::{
    rank_candidates, top_candidates, CoreError, Participant, RankingPolicy, SessionCompletion,
    SessionId, SponsorRatio, User, UserId,
};
use tea_rotation_store::{ClaimOutcome, CommitClaim, Store, StoreError};

use crate::config::ServiceConfig;

/// Errors surfaced by the summarize workflow.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The session has no participating orders.
    #[error("No orders found for this session.")]
    NoOrdersFound,

    /// The session doesn't exist.
    #[error("Session not found.")]
    SessionNotFound,

    /// The confirmed id is not a participant of the session.
    #[error("Invalid assignee selected.")]
    InvalidAssignee,

    /// The session was already committed or is being committed.
    #[error("Session was already summarized or is being summarized.")]
    ConcurrentModification,

    /// The data store failed.
    #[error("{0}")]
    DataStore(#[from] StoreError),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoOrdersFound => Self::NoOrdersFound,
            other => Self::DataStore(StoreError::Corrupt(other.to_string())),
        }
    }
}

/// A parsed summarize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizeRequest {
    /// Session to summarize.
    pub session_id: SessionId,
    /// Confirmed assignee. Absent for the propose phase.
    pub confirm_assignee: Option<UserId>,
}

/// A proposed assignee with the ratio it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// User fields.
    #[serde(flatten)]
    pub user: User,
    /// Sponsor ratio at proposal time.
    pub sponsor_ratio: SponsorRatio,
}

impl From<&Participant> for Candidate {
    fn from(participant: &Participant) -> Self {
        Self {
            sponsor_ratio: participant.user.sponsor_ratio(),
            user: participant.user.clone(),
        }
    }
}

/// Propose-phase result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Always `true`; the caller must confirm one candidate.
    pub requires_confirmation: bool,
    /// Top-ranked participants, best first.
    pub candidates: Vec<Candidate>,
}

/// Commit-phase result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// The confirmed assignee after bookkeeping.
    pub assignee: User,
    /// Always `true` once the session is completed.
    pub committed: bool,
    /// Users whose bookkeeping writes failed.
    pub failed_updates: Vec<UserId>,
}

/// Outcome of one summarize call.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SummarizeOutcome {
    /// Candidates awaiting confirmation.
    Proposal(Proposal),
    /// The session was committed.
    Committed(Commit),
}

/// Assignee selection and session commit.
#[derive(Clone)]
pub struct AssignmentEngine {
    store: Arc<dyn Store>,
    policy: RankingPolicy,
    candidate_count: usize,
    commit_lease: Duration,
}

impl AssignmentEngine {
    /// Create an engine over `store` using the configured policy.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: &ServiceConfig) -> Self {
        Self {
            store,
            policy: config.ranking_policy(),
            candidate_count: config.candidate_count,
            commit_lease: Duration::seconds(config.commit_lease_seconds.max(1)),
        }
    }

    /// Run the propose or commit phase depending on `confirm_assignee`.
    ///
    /// `caller` is the authenticated subject of the request, if any. It is
    /// only used to record who summarized the session.
    ///
    /// # Errors
    ///
    /// See [`EngineError`].
    pub async fn summarize(
        &self,
        request: &SummarizeRequest,
        caller: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SummarizeOutcome, EngineError> {
        match request.confirm_assignee {
            None => self
                .propose(&request.session_id)
                .await
                .map(SummarizeOutcome::Proposal),
            Some(assignee) => self
                .commit(&request.session_id, &assignee, caller, now)
                .await
                .map(SummarizeOutcome::Committed),
        }
    }

    /// Rank the session's participants and return the top candidates.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoOrdersFound`] if nobody is participating.
    pub async fn propose(&self, session_id: &SessionId) -> Result<Proposal, EngineError> {
        let participants = self.store.participating_orders(session_id).await?;
        let ranked = rank_candidates(participants, &self.policy)?;
        let candidates: Vec<Candidate> = top_candidates(&ranked, self.candidate_count)
            .iter()
            .map(Candidate::from)
            .collect();

        tracing::debug!(
            session_id = %session_id,
            pool = ranked.len(),
            candidates = candidates.len(),
            "Proposed assignee candidates"
        );

        Ok(Proposal {
            requires_confirmation: true,
            candidates,
        })
    }

    /// Commit the session with `assignee_id` as the assignee.
    ///
    /// # Errors
    ///
    /// - [`EngineError::SessionNotFound`] if the session doesn't exist
    /// - [`EngineError::NoOrdersFound`] if nobody is participating
    /// - [`EngineError::InvalidAssignee`] if the id is not a participant
    /// - [`EngineError::ConcurrentModification`] if the session is not active,
    ///   another commit holds it, or an interrupted commit for a different
    ///   assignee is still pending
    /// - [`EngineError::DataStore`] if a claim or completion write fails
    pub async fn commit(
        &self,
        session_id: &SessionId,
        assignee_id: &UserId,
        caller: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Commit, EngineError> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or(EngineError::SessionNotFound)?;
        if !session.is_active() {
            return Err(EngineError::ConcurrentModification);
        }

        let claim = CommitClaim::new(now, self.commit_lease);
        let bookkept_for = match self.store.claim_session(session_id, &claim).await? {
            ClaimOutcome::Refused => {
                tracing::info!(session_id = %session_id, "Commit rejected, session already claimed");
                return Err(EngineError::ConcurrentModification);
            }
            ClaimOutcome::Fresh => None,
            ClaimOutcome::Resumed { assignee } => Some(assignee),
        };

        // Orders are frozen while the claim is held.
        let (participants, assignee) = match self.confirmed(session_id, assignee_id).await {
            Ok(found) => found,
            Err(e) => {
                self.release(session_id, &claim).await;
                return Err(e);
            }
        };
        let cups = cup_count(&participants);

        let failed_updates = match bookkept_for {
            Some(recorded) if recorded != assignee.id => {
                tracing::info!(
                    session_id = %session_id,
                    pending = %recorded,
                    requested = %assignee.id,
                    "Commit rejected, an interrupted commit for another assignee is pending"
                );
                self.release(session_id, &claim).await;
                return Err(EngineError::ConcurrentModification);
            }
            Some(_) => {
                tracing::info!(
                    session_id = %session_id,
                    "Resuming interrupted commit, bookkeeping already applied"
                );
                Vec::new()
            }
            None => {
                match self
                    .store
                    .mark_bookkeeping(session_id, claim.token, &assignee.id)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => return Err(EngineError::ConcurrentModification),
                    Err(e) => {
                        self.release(session_id, &claim).await;
                        return Err(e.into());
                    }
                }
                self.apply_bookkeeping(&participants, &assignee.id, cups, now)
                    .await
            }
        };

        let summarized_by = self.resolve_summarizer(caller).await;
        let completion = SessionCompletion {
            ended_at: now,
            assignee_name: assignee.name.clone(),
            total_drinks_in_session: cups,
            summarized_by,
        };

        match self
            .store
            .complete_session(session_id, claim.token, &completion)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    session_id = %session_id,
                    "Commit claim lost before completion"
                );
                return Err(EngineError::ConcurrentModification);
            }
            Err(e) => {
                // The bookkeeping marker stays, so a retry only completes.
                self.release(session_id, &claim).await;
                return Err(e.into());
            }
        }

        tracing::info!(
            session_id = %session_id,
            assignee = %assignee.id,
            cups,
            failed = failed_updates.len(),
            resumed = bookkept_for.is_some(),
            "Session summarized"
        );

        let assignee = match self.store.get_user(&assignee.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => assignee,
            Err(e) => {
                tracing::warn!(user_id = %assignee.id, error = %e, "Failed to reload assignee");
                assignee
            }
        };

        Ok(Commit {
            assignee,
            committed: true,
            failed_updates,
        })
    }

    /// Participants of the session, and the confirmed assignee among them.
    async fn confirmed(
        &self,
        session_id: &SessionId,
        assignee_id: &UserId,
    ) -> Result<(Vec<Participant>, User), EngineError> {
        let participants = self.store.participating_orders(session_id).await?;
        if participants.is_empty() {
            return Err(EngineError::NoOrdersFound);
        }
        let assignee = participants
            .iter()
            .find(|p| p.user_id() == *assignee_id)
            .map(|p| p.user.clone())
            .ok_or(EngineError::InvalidAssignee)?;
        Ok((participants, assignee))
    }

    async fn release(&self, session_id: &SessionId, claim: &CommitClaim) {
        if let Err(e) = self.store.release_claim(session_id, claim.token).await {
            tracing::warn!(
                session_id = %session_id,
                error = %e,
                "Failed to release commit claim"
            );
        }
    }

    /// Advance per-user rotation fields. Failures are logged and collected.
    async fn apply_bookkeeping(
        &self,
        participants: &[Participant],
        assignee_id: &UserId,
        cups: i64,
        now: DateTime<Utc>,
    ) -> Vec<UserId> {
        let mut failed = Vec::new();

        for p in participants {
            if let Err(e) = self
                .store
                .update_user_preferences(&p.user.id, &p.drink_type, &p.sugar_level)
                .await
            {
                record_failure(&mut failed, p.user.id, "preferences", &e);
            }
        }

        for p in participants {
            if let Err(e) = self.store.increment_drink_count(&p.user.id, 1).await {
                record_failure(&mut failed, p.user.id, "drink_count", &e);
            }
        }

        if let Err(e) = self.store.set_last_assigned_at(assignee_id, now).await {
            record_failure(&mut failed, *assignee_id, "last_assigned_at", &e);
        }

        if let Err(e) = self
            .store
            .increment_total_drinks_bought(assignee_id, cups)
            .await
        {
            record_failure(&mut failed, *assignee_id, "total_drinks_bought", &e);
        }

        failed
    }

    async fn resolve_summarizer(&self, caller: Option<&str>) -> Option<UserId> {
        let subject = caller?;
        match self.store.find_user_by_auth_id(subject).await {
            Ok(user) => user.map(|u| u.id),
            Err(e) => {
                tracing::warn!(subject, error = %e, "Failed to resolve summarizer");
                None
            }
        }
    }
}

fn cup_count(participants: &[Participant]) -> i64 {
    i64::try_from(participants.len()).unwrap_or(i64::MAX)
}

fn record_failure(failed: &mut Vec<UserId>, user_id: UserId, step: &str, error: &StoreError) {
    tracing::warn!(user_id = %user_id, step, error = %error, "Bookkeeping update failed");
    if !failed.contains(&user_id) {
        failed.push(user_id);
    }
}
