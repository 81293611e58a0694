//! Core types and the fairness ranking for the tea rotation.
//!
//! - **Identifiers**: `UserId`, `SessionId`
//! - **Users**: `User`, `SponsorRatio`
//! - **Orders**: `Order`, `Participant`, `OrderWithUser`
//! - **Sessions**: `Session`, `SessionStatus`, current-session selection
//! - **Ranking**: `rank_candidates`, `RankingPolicy`
//! - **Summary**: `OrderBreakdown`
//!
//! # Sponsor ratio
//!
//! `drink_count / total_drinks_bought`. Whoever has drunk the most relative to
//! what they have made is proposed first. Someone who has drunk but never made
//! a round has an unbounded ratio.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod order;
pub mod ranking;
pub mod session;
pub mod summary;
pub mod user;

pub use error::{CoreError, Result};
pub use ids::{IdError, SessionId, UserId};
pub use order::{Order, OrderWithUser, Participant, DEFAULT_DRINK, DEFAULT_SUGAR_LEVEL};
pub use ranking::{rank_candidates, top_candidates, RankingPolicy, DEFAULT_CANDIDATE_COUNT};
pub use session::{
    completed_grace_cutoff, current_session, Session, SessionCompletion, SessionStatus,
    DEFAULT_COMPLETED_GRACE_SECONDS,
};
pub use summary::{DrinkRecipients, DrinkTally, OrderBreakdown, SugarCount};
pub use user::{NewUser, SponsorRatio, User};

/// Trim a display name, rejecting blank input.
///
/// # Errors
///
/// Returns [`CoreError::EmptyName`] if nothing is left after trimming.
pub fn normalize_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::EmptyName);
    }
    Ok(trimmed.to_string())
}
