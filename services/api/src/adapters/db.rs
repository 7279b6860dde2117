//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! State changes on sessions are conditional `UPDATE ... WHERE` statements, so the
//! compare and the write happen in one round trip inside Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skillshake_core::domain::{
    Availability, ExpertProfile, LessonFilter, LessonType, Location, MicroLesson, NewUser,
    Notification, Page, PaymentStatus, Session, SessionFilter, SessionState, SessionStatus, User,
};
use skillshake_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn session_exists(&self, session_id: &str) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM sessions WHERE id = $1)")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }
}

const USER_COLUMNS: &str = "id, farcaster_id, username, profile_picture_url, bio, skills, rating, \
     location_lat, location_lng, location_address, created_at";
const EXPERT_COLUMNS: &str = "user_id, expertise, availability, hourly_rate, rating";
const LESSON_COLUMNS: &str = "id, expert_user_id, title, description, duration_minutes, \
     lesson_type, price, location_tag, is_live, recording_url, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, lesson_id, learner_user_id, expert_user_id, start_time, \
     end_time, status, payment_status, rating, review, created_at, updated_at";
const NOTIFICATION_COLUMNS: &str = "id, user_id, message, timestamp, read";

//=========================================================================================
// Error Mapping
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn lookup_err(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// Foreign-key violations on writes mean a referenced row is missing.
fn write_err(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            PortError::NotFound(format!("{} not found", what))
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// The only secondary unique key on `users` is `farcaster_id`.
fn user_write_err(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => PortError::Conflict(
            "farcasterId is already registered to another user".to_string(),
        ),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn parse<T>(value: &str) -> PortResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| PortError::Unexpected(format!("corrupt row: {}", e)))
}

fn sorted(tags: &skillshake_core::domain::TagSet) -> Vec<String> {
    tags.iter().cloned().collect()
}

fn location_columns(location: &Option<Location>) -> (Option<f64>, Option<f64>, Option<String>) {
    match location {
        Some(loc) => (Some(loc.lat), Some(loc.lng), loc.address.clone()),
        None => (None, None, None),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: String,
    farcaster_id: Option<String>,
    username: String,
    profile_picture_url: Option<String>,
    bio: String,
    skills: Vec<String>,
    rating: f64,
    location_lat: Option<f64>,
    location_lng: Option<f64>,
    location_address: Option<String>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        let location = match (self.location_lat, self.location_lng) {
            (Some(lat), Some(lng)) => Some(Location {
                lat,
                lng,
                address: self.location_address,
            }),
            _ => None,
        };
        User {
            id: self.id,
            farcaster_id: self.farcaster_id,
            username: self.username,
            profile_picture_url: self.profile_picture_url,
            bio: self.bio,
            skills: self.skills.into_iter().collect(),
            rating: self.rating,
            location,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ExpertRecord {
    user_id: String,
    expertise: Vec<String>,
    availability: String,
    hourly_rate: f64,
    rating: f64,
}
impl ExpertRecord {
    fn to_domain(self) -> PortResult<ExpertProfile> {
        Ok(ExpertProfile {
            user_id: self.user_id,
            expertise: self.expertise.into_iter().collect(),
            availability: parse::<Availability>(&self.availability)?,
            hourly_rate: self.hourly_rate,
            rating: self.rating,
        })
    }
}

#[derive(FromRow)]
struct LessonRecord {
    id: String,
    expert_user_id: String,
    title: String,
    description: String,
    duration_minutes: i32,
    lesson_type: String,
    price: f64,
    location_tag: Option<String>,
    is_live: bool,
    recording_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl LessonRecord {
    fn to_domain(self) -> PortResult<MicroLesson> {
        Ok(MicroLesson {
            id: self.id,
            expert_user_id: self.expert_user_id,
            title: self.title,
            description: self.description,
            duration_minutes: self.duration_minutes.max(0) as u32,
            lesson_type: parse::<LessonType>(&self.lesson_type)?,
            price: self.price,
            location_tag: self.location_tag,
            is_live: self.is_live,
            recording_url: self.recording_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: String,
    lesson_id: String,
    learner_user_id: String,
    expert_user_id: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    status: String,
    payment_status: String,
    rating: Option<i16>,
    review: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        Ok(Session {
            id: self.id,
            lesson_id: self.lesson_id,
            learner_user_id: self.learner_user_id,
            expert_user_id: self.expert_user_id,
            start_time: self.start_time,
            end_time: self.end_time,
            status: parse::<SessionStatus>(&self.status)?,
            payment_status: parse::<PaymentStatus>(&self.payment_status)?,
            rating: self.rating.map(|r| r as u8),
            review: self.review,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: String,
    user_id: String,
    message: String,
    timestamp: DateTime<Utc>,
    read: bool,
}
impl NotificationRecord {
    fn to_domain(self) -> Notification {
        Notification {
            id: self.id,
            user_id: self.user_id,
            message: self.message,
            timestamp: self.timestamp,
            read: self.read,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn find_user(&self, user_id: &str) -> PortResult<User> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_err(format!("User {}", user_id)))?;
        Ok(record.to_domain())
    }

    async fn find_user_by_farcaster_id(&self, farcaster_id: &str) -> PortResult<User> {
        let sql = format!("SELECT {} FROM users WHERE farcaster_id = $1", USER_COLUMNS);
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(farcaster_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_err(format!("User with farcasterId {}", farcaster_id)))?;
        Ok(record.to_domain())
    }

    async fn upsert_user(&self, user: NewUser) -> PortResult<User> {
        // NULL parameters keep the stored column on conflict.
        let sql = format!(
            "INSERT INTO users (id, farcaster_id, username, profile_picture_url, bio, skills, \
                 rating, location_lat, location_lng, location_address) \
             VALUES ($1, $2, $3, $4, COALESCE($5, ''), COALESCE($6, '{{}}'::text[]), \
                 COALESCE($7, 0), $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET \
                 farcaster_id = COALESCE($2, users.farcaster_id), \
                 username = EXCLUDED.username, \
                 profile_picture_url = COALESCE($4, users.profile_picture_url), \
                 bio = COALESCE($5, users.bio), \
                 skills = COALESCE($6, users.skills), \
                 rating = COALESCE($7, users.rating), \
                 location_lat = COALESCE($8, users.location_lat), \
                 location_lng = COALESCE($9, users.location_lng), \
                 location_address = CASE WHEN $8 IS NULL THEN users.location_address ELSE $10 END \
             RETURNING {}",
            USER_COLUMNS
        );
        let (lat, lng, address) = location_columns(&user.location);
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(&user.id)
            .bind(&user.farcaster_id)
            .bind(&user.username)
            .bind(&user.profile_picture_url)
            .bind(&user.bio)
            .bind(user.skills.as_ref().map(sorted))
            .bind(user.rating)
            .bind(lat)
            .bind(lng)
            .bind(address)
            .fetch_one(&self.pool)
            .await
            .map_err(user_write_err)?;
        Ok(record.to_domain())
    }

    async fn update_user(&self, user: User) -> PortResult<User> {
        let sql = format!(
            "UPDATE users SET farcaster_id = $2, username = $3, profile_picture_url = $4, \
                 bio = $5, skills = $6, rating = $7, location_lat = $8, location_lng = $9, \
                 location_address = $10 \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let (lat, lng, address) = location_columns(&user.location);
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(&user.id)
            .bind(&user.farcaster_id)
            .bind(&user.username)
            .bind(&user.profile_picture_url)
            .bind(&user.bio)
            .bind(sorted(&user.skills))
            .bind(user.rating)
            .bind(lat)
            .bind(lng)
            .bind(address)
            .fetch_optional(&self.pool)
            .await
            .map_err(user_write_err)?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user.id)))?;
        Ok(record.to_domain())
    }

    async fn list_users(&self, page: Page) -> PortResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn find_expert_profile(&self, user_id: &str) -> PortResult<ExpertProfile> {
        let sql = format!("SELECT {} FROM expert_profiles WHERE user_id = $1", EXPERT_COLUMNS);
        let record = sqlx::query_as::<_, ExpertRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_err(format!("Expert profile {}", user_id)))?;
        record.to_domain()
    }

    async fn upsert_expert_profile(&self, profile: ExpertProfile) -> PortResult<ExpertProfile> {
        let sql = format!(
            "INSERT INTO expert_profiles (user_id, expertise, availability, hourly_rate, rating) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 expertise = EXCLUDED.expertise, \
                 availability = EXCLUDED.availability, \
                 hourly_rate = EXCLUDED.hourly_rate, \
                 rating = EXCLUDED.rating \
             RETURNING {}",
            EXPERT_COLUMNS
        );
        let record = sqlx::query_as::<_, ExpertRecord>(&sql)
            .bind(&profile.user_id)
            .bind(sorted(&profile.expertise))
            .bind(profile.availability.as_str())
            .bind(profile.hourly_rate)
            .bind(profile.rating)
            .fetch_one(&self.pool)
            .await
            .map_err(write_err(format!("User {}", profile.user_id)))?;
        record.to_domain()
    }

    async fn find_lesson(&self, lesson_id: &str) -> PortResult<MicroLesson> {
        let sql = format!("SELECT {} FROM micro_lessons WHERE id = $1", LESSON_COLUMNS);
        let record = sqlx::query_as::<_, LessonRecord>(&sql)
            .bind(lesson_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_err(format!("Lesson {}", lesson_id)))?;
        record.to_domain()
    }

    async fn insert_lesson(&self, lesson: MicroLesson) -> PortResult<MicroLesson> {
        let sql = format!(
            "INSERT INTO micro_lessons ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {}",
            LESSON_COLUMNS, LESSON_COLUMNS
        );
        let record = sqlx::query_as::<_, LessonRecord>(&sql)
            .bind(&lesson.id)
            .bind(&lesson.expert_user_id)
            .bind(&lesson.title)
            .bind(&lesson.description)
            .bind(lesson.duration_minutes as i32)
            .bind(lesson.lesson_type.as_str())
            .bind(lesson.price)
            .bind(&lesson.location_tag)
            .bind(lesson.is_live)
            .bind(&lesson.recording_url)
            .bind(lesson.created_at)
            .bind(lesson.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(write_err(format!("Expert profile {}", lesson.expert_user_id)))?;
        record.to_domain()
    }

    async fn update_lesson(&self, lesson: MicroLesson) -> PortResult<MicroLesson> {
        let sql = format!(
            "UPDATE micro_lessons SET title = $2, description = $3, duration_minutes = $4, \
                 lesson_type = $5, price = $6, location_tag = $7, is_live = $8, \
                 recording_url = $9, updated_at = $10 \
             WHERE id = $1 RETURNING {}",
            LESSON_COLUMNS
        );
        let record = sqlx::query_as::<_, LessonRecord>(&sql)
            .bind(&lesson.id)
            .bind(&lesson.title)
            .bind(&lesson.description)
            .bind(lesson.duration_minutes as i32)
            .bind(lesson.lesson_type.as_str())
            .bind(lesson.price)
            .bind(&lesson.location_tag)
            .bind(lesson.is_live)
            .bind(&lesson.recording_url)
            .bind(lesson.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_err(format!("Lesson {}", lesson.id)))?;
        record.to_domain()
    }

    async fn list_lessons(
        &self,
        filter: &LessonFilter,
        page: Page,
    ) -> PortResult<Vec<MicroLesson>> {
        let sql = format!(
            "SELECT {} FROM micro_lessons \
             WHERE ($1::text IS NULL OR expert_user_id = $1) \
               AND ($2::text IS NULL OR lesson_type = $2) \
             ORDER BY created_at DESC, id ASC LIMIT $3 OFFSET $4",
            LESSON_COLUMNS
        );
        let records = sqlx::query_as::<_, LessonRecord>(&sql)
            .bind(filter.expert_user_id.as_deref())
            .bind(filter.lesson_type.map(|t| t.as_str()))
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn count_lessons(&self) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM micro_lessons")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count.max(0) as u64)
    }

    async fn find_session(&self, session_id: &str) -> PortResult<Session> {
        let sql = format!("SELECT {} FROM sessions WHERE id = $1", SESSION_COLUMNS);
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_err(format!("Session {}", session_id)))?;
        record.to_domain()
    }

    async fn insert_session(&self, session: Session) -> PortResult<Session> {
        let sql = format!(
            "INSERT INTO sessions ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {}",
            SESSION_COLUMNS, SESSION_COLUMNS
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(&session.id)
            .bind(&session.lesson_id)
            .bind(&session.learner_user_id)
            .bind(&session.expert_user_id)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(session.status.as_str())
            .bind(session.payment_status.as_str())
            .bind(session.rating.map(i16::from))
            .bind(&session.review)
            .bind(session.created_at)
            .bind(session.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(write_err(format!("Lesson or user for session {}", session.id)))?;
        record.to_domain()
    }

    async fn list_sessions(&self, filter: &SessionFilter, page: Page) -> PortResult<Vec<Session>> {
        let sql = format!(
            "SELECT {} FROM sessions \
             WHERE ($1::text IS NULL OR learner_user_id = $1 OR expert_user_id = $1) \
               AND ($2::text IS NULL OR status = $2) \
             ORDER BY start_time DESC, id ASC LIMIT $3 OFFSET $4",
            SESSION_COLUMNS
        );
        let records = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(filter.user_id.as_deref())
            .bind(filter.status.map(|s| s.as_str()))
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn compare_and_set_state(
        &self,
        session_id: &str,
        expected: SessionState,
        next: SessionState,
    ) -> PortResult<Option<Session>> {
        let sql = format!(
            "UPDATE sessions SET status = $4, payment_status = $5, updated_at = now() \
             WHERE id = $1 AND status = $2 AND payment_status = $3 \
             RETURNING {}",
            SESSION_COLUMNS
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session_id)
            .bind(expected.status.as_str())
            .bind(expected.payment_status.as_str())
            .bind(next.status.as_str())
            .bind(next.payment_status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match record {
            Some(r) => r.to_domain().map(Some),
            None if self.session_exists(session_id).await? => Ok(None),
            None => Err(PortError::NotFound(format!("Session {} not found", session_id))),
        }
    }

    async fn set_review(
        &self,
        session_id: &str,
        rating: u8,
        review: Option<String>,
    ) -> PortResult<Option<Session>> {
        let sql = format!(
            "UPDATE sessions SET rating = $2, review = $3, updated_at = now() \
             WHERE id = $1 AND status = 'completed' AND rating IS NULL \
             RETURNING {}",
            SESSION_COLUMNS
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session_id)
            .bind(i16::from(rating))
            .bind(review)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match record {
            Some(r) => r.to_domain().map(Some),
            None if self.session_exists(session_id).await? => Ok(None),
            None => Err(PortError::NotFound(format!("Session {} not found", session_id))),
        }
    }

    async fn insert_notification(&self, notification: Notification) -> PortResult<Notification> {
        let sql = format!(
            "INSERT INTO notifications ({}) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            NOTIFICATION_COLUMNS, NOTIFICATION_COLUMNS
        );
        let record = sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(&notification.id)
            .bind(&notification.user_id)
            .bind(&notification.message)
            .bind(notification.timestamp)
            .bind(notification.read)
            .fetch_one(&self.pool)
            .await
            .map_err(write_err(format!("User {}", notification.user_id)))?;
        Ok(record.to_domain())
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        page: Page,
    ) -> PortResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications \
             WHERE user_id = $1 AND (NOT $2 OR read = FALSE) \
             ORDER BY timestamp DESC, id ASC LIMIT $3 OFFSET $4",
            NOTIFICATION_COLUMNS
        );
        let records = sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(user_id)
            .bind(unread_only)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn set_notification_read(
        &self,
        notification_id: &str,
        read: bool,
    ) -> PortResult<Notification> {
        let sql = format!(
            "UPDATE notifications SET read = $2 WHERE id = $1 RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        let record = sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(notification_id)
            .bind(read)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_err(format!("Notification {}", notification_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_notification(&self, notification_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(notification_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Notification {} not found",
                notification_id
            )));
        }
        Ok(())
    }
}
