//! services/api/src/web/dto.rs
//!
//! JSON representations of the core domain types. Field names are camelCase on
//! the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillshake_core::domain::{
    Availability, ExpertProfile, LessonType, Location, MicroLesson, Notification, PaymentReceipt,
    PaymentStatus, PaymentSummary, Session, SessionStatus, User,
};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug)]
pub struct LocationDto {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
}

impl From<Location> for LocationDto {
    fn from(l: Location) -> Self {
        Self { lat: l.lat, lng: l.lng, address: l.address }
    }
}

impl From<LocationDto> for Location {
    fn from(l: LocationDto) -> Self {
        Self { lat: l.lat, lng: l.lng, address: l.address }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: String,
    pub farcaster_id: Option<String>,
    pub username: String,
    pub profile_picture_url: Option<String>,
    pub bio: String,
    pub skills: Vec<String>,
    pub rating: f64,
    pub location: Option<LocationDto>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expert_profile: Option<ExpertProfileResponse>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.id,
            farcaster_id: u.farcaster_id,
            username: u.username,
            profile_picture_url: u.profile_picture_url,
            bio: u.bio,
            skills: u.skills.into_iter().collect(),
            rating: u.rating,
            location: u.location.map(LocationDto::from),
            created_at: u.created_at,
            expert_profile: None,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpertProfileResponse {
    pub user_id: String,
    pub expertise: Vec<String>,
    #[schema(value_type = String, example = "available")]
    pub availability: Availability,
    pub hourly_rate: f64,
    pub rating: f64,
}

impl From<ExpertProfile> for ExpertProfileResponse {
    fn from(p: ExpertProfile) -> Self {
        Self {
            user_id: p.user_id,
            expertise: p.expertise.into_iter().collect(),
            availability: p.availability,
            hourly_rate: p.hourly_rate,
            rating: p.rating,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonResponse {
    pub lesson_id: String,
    pub expert_user_id: String,
    pub title: String,
    pub description: String,
    pub duration_minutes: u32,
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "live")]
    pub lesson_type: LessonType,
    pub price: f64,
    pub location_tag: Option<String>,
    pub is_live: bool,
    pub recording_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MicroLesson> for LessonResponse {
    fn from(l: MicroLesson) -> Self {
        Self {
            lesson_id: l.id,
            expert_user_id: l.expert_user_id,
            title: l.title,
            description: l.description,
            duration_minutes: l.duration_minutes,
            lesson_type: l.lesson_type,
            price: l.price,
            location_tag: l.location_tag,
            is_live: l.is_live,
            recording_url: l.recording_url,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub lesson_id: String,
    pub learner_user_id: String,
    pub expert_user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[schema(value_type = String, example = "pending")]
    pub status: SessionStatus,
    #[schema(value_type = String, example = "pending")]
    pub payment_status: PaymentStatus,
    pub rating: Option<u8>,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.id,
            lesson_id: s.lesson_id,
            learner_user_id: s.learner_user_id,
            expert_user_id: s.expert_user_id,
            start_time: s.start_time,
            end_time: s.end_time,
            status: s.status,
            payment_status: s.payment_status,
            rating: s.rating,
            review: s.review,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub success: bool,
    pub transaction_id: String,
    pub session_id: String,
    pub amount: f64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl From<PaymentReceipt> for ReceiptResponse {
    fn from(r: PaymentReceipt) -> Self {
        Self {
            success: true,
            transaction_id: r.transaction_id,
            session_id: r.session_id,
            amount: r.amount,
            currency: r.currency,
            timestamp: r.timestamp,
            message: "Payment processed successfully".to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub session_id: String,
    #[schema(value_type = String, example = "paid")]
    pub payment_status: PaymentStatus,
    pub amount: f64,
    pub title: String,
}

impl From<PaymentSummary> for PaymentStatusResponse {
    fn from(p: PaymentSummary) -> Self {
        Self {
            session_id: p.session_id,
            payment_status: p.payment_status,
            amount: p.amount,
            title: p.title,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub notification_id: String,
    pub user_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read_status: bool,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            notification_id: n.id,
            user_id: n.user_id,
            message: n.message,
            timestamp: n.timestamp,
            read_status: n.read,
        }
    }
}

/// A plain confirmation message.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
