//! crates/skillshake_core/src/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port.
//! Every operation runs under a single mutex, which makes the conditional
//! updates atomic. Used by tests and for running the API without Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::domain::{
    ExpertProfile, LessonFilter, MicroLesson, NewUser, Notification, Page, Session,
    SessionFilter, SessionState, SessionStatus, User,
};
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    experts: HashMap<String, ExpertProfile>,
    lessons: HashMap<String, MicroLesson>,
    sessions: HashMap<String, Session>,
    notifications: HashMap<String, Notification>,
}

impl Tables {
    /// Mirrors the `UNIQUE` constraint on `users.farcaster_id`.
    fn check_farcaster_id(&self, user: &User) -> PortResult<()> {
        let Some(farcaster_id) = user.farcaster_id.as_deref() else {
            return Ok(());
        };
        let taken = self
            .users
            .values()
            .any(|u| u.id != user.id && u.farcaster_id.as_deref() == Some(farcaster_id));
        if taken {
            return Err(PortError::Conflict(format!(
                "farcasterId {} is already registered to another user",
                farcaster_id
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    fail_notifications: AtomicBool,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every notification insert fail until switched off again.
    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    fn tables(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

fn not_found(kind: &str, id: &str) -> PortError {
    PortError::NotFound(format!("{} {} not found", kind, id))
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn find_user(&self, user_id: &str) -> PortResult<User> {
        self.tables()?
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| not_found("User", user_id))
    }

    async fn find_user_by_farcaster_id(&self, farcaster_id: &str) -> PortResult<User> {
        self.tables()?
            .users
            .values()
            .find(|u| u.farcaster_id.as_deref() == Some(farcaster_id))
            .cloned()
            .ok_or_else(|| not_found("User with farcasterId", farcaster_id))
    }

    async fn upsert_user(&self, user: NewUser) -> PortResult<User> {
        let mut tables = self.tables()?;
        let existing = tables.users.get(&user.id).cloned();
        let stored = user.merge_into(existing, Utc::now());
        tables.check_farcaster_id(&stored)?;
        tables.users.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_user(&self, user: User) -> PortResult<User> {
        let mut tables = self.tables()?;
        let created_at = tables
            .users
            .get(&user.id)
            .map(|u| u.created_at)
            .ok_or_else(|| not_found("User", &user.id))?;
        tables.check_farcaster_id(&user)?;
        let stored = User { created_at, ..user };
        tables.users.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn list_users(&self, page: Page) -> PortResult<Vec<User>> {
        let mut users: Vec<User> = self.tables()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(users, page))
    }

    async fn find_expert_profile(&self, user_id: &str) -> PortResult<ExpertProfile> {
        self.tables()?
            .experts
            .get(user_id)
            .cloned()
            .ok_or_else(|| not_found("Expert profile", user_id))
    }

    async fn upsert_expert_profile(&self, profile: ExpertProfile) -> PortResult<ExpertProfile> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&profile.user_id) {
            return Err(not_found("User", &profile.user_id));
        }
        tables.experts.insert(profile.user_id.clone(), profile.clone());
        Ok(profile)
    }

    async fn find_lesson(&self, lesson_id: &str) -> PortResult<MicroLesson> {
        self.tables()?
            .lessons
            .get(lesson_id)
            .cloned()
            .ok_or_else(|| not_found("Lesson", lesson_id))
    }

    async fn insert_lesson(&self, lesson: MicroLesson) -> PortResult<MicroLesson> {
        let mut tables = self.tables()?;
        if !tables.experts.contains_key(&lesson.expert_user_id) {
            return Err(not_found("Expert profile", &lesson.expert_user_id));
        }
        if tables.lessons.contains_key(&lesson.id) {
            return Err(PortError::Unexpected(format!("Lesson {} already exists", lesson.id)));
        }
        tables.lessons.insert(lesson.id.clone(), lesson.clone());
        Ok(lesson)
    }

    async fn update_lesson(&self, lesson: MicroLesson) -> PortResult<MicroLesson> {
        let mut tables = self.tables()?;
        match tables.lessons.get_mut(&lesson.id) {
            Some(existing) => {
                *existing = lesson.clone();
                Ok(lesson)
            }
            None => Err(not_found("Lesson", &lesson.id)),
        }
    }

    async fn list_lessons(
        &self,
        filter: &LessonFilter,
        page: Page,
    ) -> PortResult<Vec<MicroLesson>> {
        let mut lessons: Vec<MicroLesson> = self
            .tables()?
            .lessons
            .values()
            .filter(|l| {
                filter
                    .expert_user_id
                    .as_ref()
                    .map_or(true, |e| &l.expert_user_id == e)
                    && filter.lesson_type.map_or(true, |t| l.lesson_type == t)
            })
            .cloned()
            .collect();
        lessons.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(lessons, page))
    }

    async fn count_lessons(&self) -> PortResult<u64> {
        Ok(self.tables()?.lessons.len() as u64)
    }

    async fn find_session(&self, session_id: &str) -> PortResult<Session> {
        self.tables()?
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| not_found("Session", session_id))
    }

    async fn insert_session(&self, session: Session) -> PortResult<Session> {
        let mut tables = self.tables()?;
        if !tables.lessons.contains_key(&session.lesson_id) {
            return Err(not_found("Lesson", &session.lesson_id));
        }
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn list_sessions(&self, filter: &SessionFilter, page: Page) -> PortResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .tables()?
            .sessions
            .values()
            .filter(|s| {
                filter
                    .user_id
                    .as_ref()
                    .map_or(true, |u| &s.learner_user_id == u || &s.expert_user_id == u)
                    && filter.status.map_or(true, |st| s.status == st)
            })
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(sessions, page))
    }

    async fn compare_and_set_state(
        &self,
        session_id: &str,
        expected: SessionState,
        next: SessionState,
    ) -> PortResult<Option<Session>> {
        let mut tables = self.tables()?;
        let session = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found("Session", session_id))?;
        if session.state() != expected {
            return Ok(None);
        }
        session.status = next.status;
        session.payment_status = next.payment_status;
        session.updated_at = Utc::now();
        Ok(Some(session.clone()))
    }

    async fn set_review(
        &self,
        session_id: &str,
        rating: u8,
        review: Option<String>,
    ) -> PortResult<Option<Session>> {
        let mut tables = self.tables()?;
        let session = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found("Session", session_id))?;
        if session.status != SessionStatus::Completed || session.rating.is_some() {
            return Ok(None);
        }
        session.rating = Some(rating);
        session.review = review;
        session.updated_at = Utc::now();
        Ok(Some(session.clone()))
    }

    async fn insert_notification(&self, notification: Notification) -> PortResult<Notification> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("notification store unavailable".to_string()));
        }
        let mut tables = self.tables()?;
        tables
            .notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        page: Page,
    ) -> PortResult<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .tables()?
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(notifications, page))
    }

    async fn set_notification_read(
        &self,
        notification_id: &str,
        read: bool,
    ) -> PortResult<Notification> {
        let mut tables = self.tables()?;
        let notification = tables
            .notifications
            .get_mut(notification_id)
            .ok_or_else(|| not_found("Notification", notification_id))?;
        notification.read = read;
        Ok(notification.clone())
    }

    async fn delete_notification(&self, notification_id: &str) -> PortResult<()> {
        self.tables()?
            .notifications
            .remove(notification_id)
            .map(|_| ())
            .ok_or_else(|| not_found("Notification", notification_id))
    }
}
