//! Participant records and the sponsor ratio.
//!
//! A user carries the rotation bookkeeping the engine reads and advances:
//! how many cups they have drunk, how many they have made for others, and when
//! they were last assigned.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::UserId;

/// A participant in the rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identity.
    pub id: UserId,

    /// Display name. Not unique and never used as a lookup key.
    pub name: String,

    /// Subject of the external auth identity linked to this user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_user_id: Option<String>,

    /// Cups consumed across all finalized sessions.
    pub drink_count: i64,

    /// Cups made for others while assigned.
    pub total_drinks_bought: i64,

    /// When the user was last the assignee. `None` means never.
    pub last_assigned_at: Option<DateTime<Utc>>,

    /// Drink from the user's most recent finalized order.
    pub last_ordered_drink: Option<String>,

    /// Sugar level from the user's most recent finalized order.
    pub last_sugar_level: Option<String>,

    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a user with zeroed counters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            name: name.into(),
            auth_user_id: None,
            drink_count: 0,
            total_drinks_bought: 0,
            last_assigned_at: None,
            last_ordered_drink: None,
            last_sugar_level: None,
            created_at: Utc::now(),
        }
    }

    /// The user's current sponsor ratio.
    #[must_use]
    pub fn sponsor_ratio(&self) -> SponsorRatio {
        SponsorRatio::new(self.drink_count, self.total_drinks_bought)
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Display name, already trimmed.
    pub name: String,
    /// Optional external auth subject.
    pub auth_user_id: Option<String>,
}

/// Drinks consumed divided by drinks sponsored.
///
/// Higher means the user owes more rounds. Values compare exactly by
/// cross-multiplication, so `2/2` and `3/3` are equal and no floating point
/// ties are lost. A user who has drunk but never sponsored is
/// [`SponsorRatio::Unbounded`] and outranks every finite ratio.
#[derive(Debug, Clone, Copy)]
pub enum SponsorRatio {
    /// `consumed / sponsored` with `sponsored > 0`, or `0 / 1` when both are zero.
    Finite {
        /// Drinks consumed.
        consumed: i64,
        /// Drinks sponsored.
        sponsored: i64,
    },
    /// Consumed at least one drink, sponsored none.
    Unbounded,
}

impl SponsorRatio {
    /// Build the ratio from the raw counters.
    #[must_use]
    pub fn new(drink_count: i64, total_drinks_bought: i64) -> Self {
        if total_drinks_bought > 0 {
            Self::Finite {
                consumed: drink_count.max(0),
                sponsored: total_drinks_bought,
            }
        } else if drink_count > 0 {
            Self::Unbounded
        } else {
            Self::Finite {
                consumed: 0,
                sponsored: 1,
            }
        }
    }

    /// Approximate value, `f64::INFINITY` for the unbounded case.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Finite {
                consumed,
                sponsored,
            } => consumed as f64 / sponsored as f64,
            Self::Unbounded => f64::INFINITY,
        }
    }

    /// Whether the ratio is unbounded.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

impl Ord for SponsorRatio {
    fn cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (Self::Unbounded, Self::Unbounded) => Ordering::Equal,
            (Self::Unbounded, Self::Finite { .. }) => Ordering::Greater,
            (Self::Finite { .. }, Self::Unbounded) => Ordering::Less,
            (
                Self::Finite {
                    consumed: a_num,
                    sponsored: a_den,
                },
                Self::Finite {
                    consumed: b_num,
                    sponsored: b_den,
                },
            ) => (i128::from(a_num) * i128::from(b_den)).cmp(&(i128::from(b_num) * i128::from(a_den))),
        }
    }
}

impl PartialOrd for SponsorRatio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SponsorRatio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SponsorRatio {}

impl fmt::Display for SponsorRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite { .. } => write!(f, "{:.2}", self.as_f64()),
            Self::Unbounded => f.write_str("Infinity"),
        }
    }
}

// JSON has no infinity, so the unbounded ratio goes over the wire as a string.
impl Serialize for SponsorRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Finite { .. } => serializer.serialize_f64(self.as_f64()),
            Self::Unbounded => serializer.serialize_str("Infinity"),
        }
    }
}
