//! crates/skillshake_core/src/ports.rs
//!
//! Defines the persistence contract for the core logic.
//! This trait forms the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete store (Postgres in production, memory in tests).

use async_trait::async_trait;
use crate::domain::{
    ExpertProfile, LessonFilter, MicroLesson, NewUser, Notification, Page, Session,
    SessionFilter, SessionState, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness rule other than the primary key was violated.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistence Port
//=========================================================================================

/// Lookups return `PortError::NotFound` when the id is absent.
///
/// Conditional updates (`compare_and_set_state`, `set_review`) return `Ok(None)`
/// when the row exists but no longer matches the expected values; implementations
/// must perform the compare and the write as one atomic step.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users & Expert Profiles ---
    async fn find_user(&self, user_id: &str) -> PortResult<User>;

    async fn find_user_by_farcaster_id(&self, farcaster_id: &str) -> PortResult<User>;

    /// Inserts the user or folds the input over the stored row
    /// (see [`NewUser::merge_into`]). A `farcaster_id` held by another user
    /// is a `PortError::Conflict`.
    async fn upsert_user(&self, user: NewUser) -> PortResult<User>;

    /// Replaces an existing user's mutable fields. Same conflict rule as `upsert_user`.
    async fn update_user(&self, user: User) -> PortResult<User>;

    async fn list_users(&self, page: Page) -> PortResult<Vec<User>>;

    async fn find_expert_profile(&self, user_id: &str) -> PortResult<ExpertProfile>;

    async fn upsert_expert_profile(&self, profile: ExpertProfile) -> PortResult<ExpertProfile>;

    // --- Lessons ---
    async fn find_lesson(&self, lesson_id: &str) -> PortResult<MicroLesson>;

    async fn insert_lesson(&self, lesson: MicroLesson) -> PortResult<MicroLesson>;

    async fn update_lesson(&self, lesson: MicroLesson) -> PortResult<MicroLesson>;

    async fn list_lessons(&self, filter: &LessonFilter, page: Page) -> PortResult<Vec<MicroLesson>>;

    async fn count_lessons(&self) -> PortResult<u64>;

    // --- Sessions ---
    async fn find_session(&self, session_id: &str) -> PortResult<Session>;

    async fn insert_session(&self, session: Session) -> PortResult<Session>;

    async fn list_sessions(&self, filter: &SessionFilter, page: Page) -> PortResult<Vec<Session>>;

    /// Moves the session from `expected` to `next` only if it is still in `expected`.
    async fn compare_and_set_state(
        &self,
        session_id: &str,
        expected: SessionState,
        next: SessionState,
    ) -> PortResult<Option<Session>>;

    /// Stores the review only if the session is completed and not yet reviewed.
    async fn set_review(
        &self,
        session_id: &str,
        rating: u8,
        review: Option<String>,
    ) -> PortResult<Option<Session>>;

    // --- Notifications ---
    async fn insert_notification(&self, notification: Notification) -> PortResult<Notification>;

    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        page: Page,
    ) -> PortResult<Vec<Notification>>;

    async fn set_notification_read(
        &self,
        notification_id: &str,
        read: bool,
    ) -> PortResult<Notification>;

    async fn delete_notification(&self, notification_id: &str) -> PortResult<()>;
}
