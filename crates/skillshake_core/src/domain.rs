//! crates/skillshake_core/src/domain.rs
//!
//! Defines the pure, core data structures for the marketplace.
//! These structs are independent of any database or HTTP representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A set of skill or expertise tags. Order carries no meaning.
pub type TagSet = BTreeSet<String>;

/// Builds a [`TagSet`] from any list of tags, trimming and dropping empties.
pub fn tag_set<I, S>(tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
}

/// A marketplace participant. The same user may learn and teach.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub farcaster_id: Option<String>,
    pub username: String,
    pub profile_picture_url: Option<String>,
    pub bio: String,
    pub skills: TagSet,
    pub rating: f64,
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user or re-registering an existing one.
///
/// On re-registration `username` is replaced and every `None` field keeps
/// its stored value. On creation `None` falls back to empty or zero.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub id: String,
    pub farcaster_id: Option<String>,
    pub username: String,
    pub profile_picture_url: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<TagSet>,
    pub rating: Option<f64>,
    pub location: Option<Location>,
}

impl NewUser {
    /// Folds this input over the stored record, or builds a fresh one.
    pub fn merge_into(self, existing: Option<User>, now: DateTime<Utc>) -> User {
        match existing {
            Some(user) => User {
                id: user.id,
                farcaster_id: self.farcaster_id.or(user.farcaster_id),
                username: self.username,
                profile_picture_url: self.profile_picture_url.or(user.profile_picture_url),
                bio: self.bio.unwrap_or(user.bio),
                skills: self.skills.unwrap_or(user.skills),
                rating: self.rating.unwrap_or(user.rating),
                location: self.location.or(user.location),
                created_at: user.created_at,
            },
            None => User {
                id: self.id,
                farcaster_id: self.farcaster_id,
                username: self.username,
                profile_picture_url: self.profile_picture_url,
                bio: self.bio.unwrap_or_default(),
                skills: self.skills.unwrap_or_default(),
                rating: self.rating.unwrap_or(0.0),
                location: self.location,
                created_at: now,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Busy,
    Offline,
}

/// Teaching-side capability of a user. At most one per user.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpertProfile {
    pub user_id: String,
    pub expertise: TagSet,
    pub availability: Availability,
    pub hourly_rate: f64,
    pub rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    Live,
    Recorded,
    #[serde(rename = "inperson")]
    InPerson,
}

/// A bookable offering owned by an expert.
#[derive(Debug, Clone, PartialEq)]
pub struct MicroLesson {
    pub id: String,
    pub expert_user_id: String,
    pub title: String,
    pub description: String,
    pub duration_minutes: u32,
    pub lesson_type: LessonType,
    pub price: f64,
    pub location_tag: Option<String>,
    pub is_live: bool,
    pub recording_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of a booked session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    #[serde(alias = "active")]
    Confirmed,
    Completed,
    Cancelled,
}

/// Payment track of a booked session, independent of [`SessionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// The pair of state-machine fields a conditional update is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
}

/// One booking of a lesson by a learner.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub lesson_id: String,
    pub learner_user_id: String,
    pub expert_user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub rating: Option<u8>,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn state(&self) -> SessionState {
        SessionState {
            status: self.status,
            payment_status: self.payment_status,
        }
    }
}

/// A message delivered to a user as a side effect of a lifecycle transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Confirmation returned after a payment is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub session_id: String,
    pub amount: f64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

/// Payment view of a session, priced from its lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSummary {
    pub session_id: String,
    pub payment_status: PaymentStatus,
    pub amount: f64,
    pub title: String,
}

//=========================================================================================
// Query Helpers
//=========================================================================================

/// Limit/offset pagination. `limit` is clamped to `1..=MAX_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Matches sessions where the user is either learner or expert.
    pub user_id: Option<String>,
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct LessonFilter {
    pub expert_user_id: Option<String>,
    pub lesson_type: Option<LessonType>,
}

//=========================================================================================
// String Conversions (used by storage adapters and query strings)
//=========================================================================================

/// Error returned when a stored or supplied enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    (
        $ty:ident,
        $kind:literal,
        { $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text $(| $alias)* => Ok($ty::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

string_enum!(Availability, "availability", {
    Available => "available",
    Busy => "busy",
    Offline => "offline",
});

string_enum!(LessonType, "lesson type", {
    Live => "live",
    Recorded => "recorded",
    InPerson => "inperson" | "in_person",
});

string_enum!(SessionStatus, "session status", {
    Pending => "pending",
    Confirmed => "confirmed" | "active",
    Completed => "completed",
    Cancelled => "cancelled",
});

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Refunded => "refunded",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_set_ignores_order_and_duplicates() {
        let a = tag_set(["Rust", "Guitar", "Rust"]);
        let b = tag_set(vec![" Guitar", "Rust "]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn status_parses_active_as_confirmed() {
        assert_eq!("active".parse::<SessionStatus>(), Ok(SessionStatus::Confirmed));
        assert_eq!("Confirmed".parse::<SessionStatus>(), Ok(SessionStatus::Confirmed));
        assert!("archived".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn page_clamps_limit() {
        assert_eq!(Page::new(Some(0), None).limit, 1);
        assert_eq!(Page::new(Some(500), Some(7)), Page { limit: 100, offset: 7 });
        assert_eq!(Page::default().limit, Page::DEFAULT_LIMIT);
    }

    #[test]
    fn re_registration_keeps_omitted_fields() {
        let created_at = Utc::now();
        let stored = NewUser {
            id: "user_1".into(),
            farcaster_id: Some("fc1".into()),
            username: "alex".into(),
            bio: Some("teacher".into()),
            skills: Some(tag_set(["React"])),
            rating: Some(4.8),
            ..Default::default()
        }
        .merge_into(None, created_at);

        let again = NewUser {
            id: "user_1".into(),
            username: "alex2".into(),
            ..Default::default()
        }
        .merge_into(Some(stored), Utc::now());
        assert_eq!(again.username, "alex2");
        assert_eq!(again.rating, 4.8);
        assert_eq!(again.bio, "teacher");
        assert_eq!(again.skills, tag_set(["React"]));
        assert_eq!(again.farcaster_id.as_deref(), Some("fc1"));
        assert_eq!(again.created_at, created_at);
    }

    #[test]
    fn first_registration_fills_defaults() {
        let user = NewUser {
            id: "user_2".into(),
            username: "sarah".into(),
            ..Default::default()
        }
        .merge_into(None, Utc::now());
        assert_eq!(user.rating, 0.0);
        assert!(user.bio.is_empty());
        assert!(user.skills.is_empty());
    }
}
