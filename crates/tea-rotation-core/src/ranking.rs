//! Candidate ranking.
//!
//! Orders the participants of a session by assignment priority, most owed
//! first:
//!
//! 1. Sponsor ratio, descending. A user who has drunk but never sponsored
//!    ranks above every finite ratio.
//! 2. `last_assigned_at`, ascending, with never-assigned users first.
//! 3. Input order for exact ties. The sort is stable, so ranking the same
//!    input twice yields the same sequence.
//!
//! A [`RankingPolicy`] can additionally push flagged users behind everyone
//! else without changing their relative order.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::{CoreError, Participant, Result, UserId};

/// Default number of candidates proposed for confirmation.
pub const DEFAULT_CANDIDATE_COUNT: usize = 2;

/// Adjustments applied on top of the fairness order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingPolicy {
    /// Users ranked after all unflagged users.
    pub deprioritized: HashSet<UserId>,
}

impl RankingPolicy {
    /// Policy that deprioritizes the given users.
    #[must_use]
    pub fn deprioritizing(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            deprioritized: ids.into_iter().collect(),
        }
    }

    fn is_deprioritized(&self, id: &UserId) -> bool {
        self.deprioritized.contains(id)
    }
}

/// Rank participants by assignment priority.
///
/// # Errors
///
/// Returns [`CoreError::NoOrdersFound`] when `participants` is empty.
pub fn rank_candidates(
    mut participants: Vec<Participant>,
    policy: &RankingPolicy,
) -> Result<Vec<Participant>> {
    if participants.is_empty() {
        return Err(CoreError::NoOrdersFound);
    }

    participants.sort_by_key(|p| {
        (
            policy.is_deprioritized(&p.user.id),
            Reverse(p.user.sponsor_ratio()),
            p.user.last_assigned_at,
        )
    });

    Ok(participants)
}

/// The first `k` entries of a ranked list, or all of them if fewer.
#[must_use]
pub fn top_candidates(ranked: &[Participant], k: usize) -> &[Participant] {
    &ranked[..k.min(ranked.len())]
}
