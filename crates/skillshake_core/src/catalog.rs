//! crates/skillshake_core/src/catalog.rs
//!
//! Validated create/read/update operations for users, expert profiles and lessons.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Availability, ExpertProfile, LessonFilter, LessonType, Location, MicroLesson, NewUser, Page,
    TagSet, User,
};
use crate::error::{BookingError, BookingResult};
use crate::ports::DatabaseService;

pub const DEFAULT_DURATION_MINUTES: u32 = 3;
pub const DEFAULT_PRICE: f64 = 5.0;

/// Input for [`CatalogService::create_lesson`]. Unset fields take the defaults.
#[derive(Debug, Clone, Default)]
pub struct NewLesson {
    pub expert_user_id: String,
    pub title: String,
    pub description: String,
    pub duration_minutes: Option<u32>,
    pub lesson_type: Option<LessonType>,
    pub price: Option<f64>,
    pub location_tag: Option<String>,
    pub is_live: Option<bool>,
    pub recording_url: Option<String>,
}

/// Partial user update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub farcaster_id: Option<String>,
    pub username: Option<String>,
    pub profile_picture_url: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<TagSet>,
    pub rating: Option<f64>,
    pub location: Option<Location>,
}

/// Partial lesson update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct LessonPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    pub lesson_type: Option<LessonType>,
    pub price: Option<f64>,
    pub location_tag: Option<String>,
    pub is_live: Option<bool>,
    pub recording_url: Option<String>,
}

/// Input for [`CatalogService::upsert_expert_profile`].
#[derive(Debug, Clone)]
pub struct ExpertProfileInput {
    pub expertise: TagSet,
    pub availability: Availability,
    pub hourly_rate: f64,
    pub rating: Option<f64>,
}

fn check_rating(field: &str, rating: f64) -> BookingResult<()> {
    if !(0.0..=5.0).contains(&rating) {
        return Err(BookingError::validation(format!("{} must be between 0 and 5", field)));
    }
    Ok(())
}

fn check_non_negative(field: &str, value: f64) -> BookingResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(BookingError::validation(format!("{} must not be negative", field)));
    }
    Ok(())
}

fn check_duration(minutes: u32) -> BookingResult<()> {
    if minutes == 0 {
        return Err(BookingError::validation("durationMinutes must be greater than zero"));
    }
    Ok(())
}

fn check_present(field: &str, value: &str) -> BookingResult<()> {
    if value.trim().is_empty() {
        return Err(BookingError::validation(format!("{} is required", field)));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<dyn DatabaseService>,
}

impl CatalogService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    // --- Users ---

    pub async fn upsert_user(&self, user: NewUser) -> BookingResult<User> {
        check_present("userId", &user.id)?;
        check_present("username", &user.username)?;
        if let Some(rating) = user.rating {
            check_rating("rating", rating)?;
        }
        let user = self.db.upsert_user(user).await?;
        info!(user_id = %user.id, "User saved");
        Ok(user)
    }

    /// Applies only the supplied fields. This is the way to change a user's rating
    /// after registration.
    pub async fn update_user(&self, user_id: &str, patch: UserPatch) -> BookingResult<User> {
        let mut user = self.db.find_user(user_id).await?;
        if let Some(username) = patch.username {
            check_present("username", &username)?;
            user.username = username;
        }
        if let Some(rating) = patch.rating {
            check_rating("rating", rating)?;
            user.rating = rating;
        }
        if patch.farcaster_id.is_some() {
            user.farcaster_id = patch.farcaster_id;
        }
        if patch.profile_picture_url.is_some() {
            user.profile_picture_url = patch.profile_picture_url;
        }
        if let Some(bio) = patch.bio {
            user.bio = bio;
        }
        if let Some(skills) = patch.skills {
            user.skills = skills;
        }
        if patch.location.is_some() {
            user.location = patch.location;
        }
        let user = self.db.update_user(user).await?;
        info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> BookingResult<User> {
        Ok(self.db.find_user(user_id).await?)
    }

    pub async fn find_user_by_farcaster_id(&self, farcaster_id: &str) -> BookingResult<User> {
        Ok(self.db.find_user_by_farcaster_id(farcaster_id).await?)
    }

    pub async fn list_users(&self, page: Page) -> BookingResult<Vec<User>> {
        Ok(self.db.list_users(page).await?)
    }

    // --- Expert Profiles ---

    pub async fn upsert_expert_profile(
        &self,
        user_id: &str,
        input: ExpertProfileInput,
    ) -> BookingResult<ExpertProfile> {
        check_non_negative("hourlyRate", input.hourly_rate)?;
        let user = self.db.find_user(user_id).await?;
        let rating = input.rating.unwrap_or(user.rating);
        check_rating("rating", rating)?;
        let profile = self
            .db
            .upsert_expert_profile(ExpertProfile {
                user_id: user.id,
                expertise: input.expertise,
                availability: input.availability,
                hourly_rate: input.hourly_rate,
                rating,
            })
            .await?;
        info!(
            user_id = %profile.user_id,
            availability = %profile.availability,
            "Expert profile saved"
        );
        Ok(profile)
    }

    pub async fn get_expert_profile(&self, user_id: &str) -> BookingResult<ExpertProfile> {
        Ok(self.db.find_expert_profile(user_id).await?)
    }

    // --- Lessons ---

    pub async fn create_lesson(&self, new: NewLesson) -> BookingResult<MicroLesson> {
        check_present("expertUserId", &new.expert_user_id)?;
        check_present("title", &new.title)?;
        check_present("description", &new.description)?;
        let duration_minutes = new.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        check_duration(duration_minutes)?;
        let price = new.price.unwrap_or(DEFAULT_PRICE);
        check_non_negative("price", price)?;

        self.db.find_expert_profile(&new.expert_user_id).await?;

        let now = Utc::now();
        let lesson = MicroLesson {
            id: Uuid::new_v4().to_string(),
            expert_user_id: new.expert_user_id,
            title: new.title.trim().to_string(),
            description: new.description,
            duration_minutes,
            lesson_type: new.lesson_type.unwrap_or(LessonType::Live),
            price,
            location_tag: new.location_tag,
            is_live: new.is_live.unwrap_or(false),
            recording_url: new.recording_url,
            created_at: now,
            updated_at: now,
        };
        let lesson = self.db.insert_lesson(lesson).await?;
        info!(lesson_id = %lesson.id, expert_user_id = %lesson.expert_user_id, "Lesson created");
        Ok(lesson)
    }

    pub async fn update_lesson(
        &self,
        lesson_id: &str,
        patch: LessonPatch,
    ) -> BookingResult<MicroLesson> {
        let mut lesson = self.db.find_lesson(lesson_id).await?;
        if let Some(title) = patch.title {
            check_present("title", &title)?;
            lesson.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            check_present("description", &description)?;
            lesson.description = description;
        }
        if let Some(minutes) = patch.duration_minutes {
            check_duration(minutes)?;
            lesson.duration_minutes = minutes;
        }
        if let Some(price) = patch.price {
            check_non_negative("price", price)?;
            lesson.price = price;
        }
        if let Some(lesson_type) = patch.lesson_type {
            lesson.lesson_type = lesson_type;
        }
        if patch.location_tag.is_some() {
            lesson.location_tag = patch.location_tag;
        }
        if let Some(is_live) = patch.is_live {
            lesson.is_live = is_live;
        }
        if patch.recording_url.is_some() {
            lesson.recording_url = patch.recording_url;
        }
        lesson.updated_at = Utc::now();
        Ok(self.db.update_lesson(lesson).await?)
    }

    pub async fn get_lesson(&self, lesson_id: &str) -> BookingResult<MicroLesson> {
        Ok(self.db.find_lesson(lesson_id).await?)
    }

    pub async fn list_lessons(
        &self,
        filter: &LessonFilter,
        page: Page,
    ) -> BookingResult<Vec<MicroLesson>> {
        Ok(self.db.list_lessons(filter, page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tag_set;
    use crate::memory::InMemoryDatabase;

    async fn catalog_with_expert() -> CatalogService {
        let catalog = CatalogService::new(Arc::new(InMemoryDatabase::new()));
        catalog
            .upsert_user(NewUser {
                id: "user_1".into(),
                username: "alex_chen".into(),
                skills: Some(tag_set(["JavaScript", "React"])),
                rating: Some(4.8),
                ..Default::default()
            })
            .await
            .unwrap();
        catalog
            .upsert_expert_profile(
                "user_1",
                ExpertProfileInput {
                    expertise: tag_set(["React"]),
                    availability: Availability::Available,
                    hourly_rate: 50.0,
                    rating: None,
                },
            )
            .await
            .unwrap();
        catalog
    }

    fn lesson() -> NewLesson {
        NewLesson {
            expert_user_id: "user_1".into(),
            title: "React hooks in 5".into(),
            description: "useState and useEffect".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn user_rating_is_bounded() {
        let catalog = CatalogService::new(Arc::new(InMemoryDatabase::new()));
        let result = catalog
            .upsert_user(NewUser {
                id: "user_2".into(),
                username: "sarah".into(),
                rating: Some(5.5),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn upsert_keeps_creation_time() {
        let catalog = catalog_with_expert().await;
        let first = catalog.get_user("user_1").await.unwrap();
        let updated = catalog
            .upsert_user(NewUser {
                id: "user_1".into(),
                username: "alex".into(),
                rating: Some(4.9),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.created_at, first.created_at);
        assert_eq!(updated.username, "alex");
    }

    #[tokio::test]
    async fn repeat_registration_keeps_rating_and_profile() {
        let catalog = catalog_with_expert().await;
        let again = catalog
            .upsert_user(NewUser {
                id: "user_1".into(),
                username: "alex2".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(again.username, "alex2");
        assert_eq!(again.rating, 4.8);
        assert_eq!(again.skills, tag_set(["JavaScript", "React"]));
    }

    #[tokio::test]
    async fn patch_changes_only_supplied_fields() {
        let catalog = catalog_with_expert().await;
        let patched = catalog
            .update_user(
                "user_1",
                UserPatch {
                    rating: Some(3.5),
                    bio: Some("React since 2015".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.rating, 3.5);
        assert_eq!(patched.bio, "React since 2015");
        assert_eq!(patched.username, "alex_chen");
        assert_eq!(patched.skills, tag_set(["JavaScript", "React"]));

        let out_of_range = UserPatch { rating: Some(7.0), ..Default::default() };
        assert!(matches!(
            catalog.update_user("user_1", out_of_range).await,
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            catalog.update_user("user_404", UserPatch::default()).await,
            Err(BookingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn farcaster_id_is_unique_and_searchable() {
        let catalog = catalog_with_expert().await;
        catalog
            .update_user(
                "user_1",
                UserPatch { farcaster_id: Some("fc1".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(catalog.find_user_by_farcaster_id("fc1").await.unwrap().id, "user_1");
        assert!(matches!(
            catalog.find_user_by_farcaster_id("fc2").await,
            Err(BookingError::NotFound(_))
        ));

        let duplicate = catalog
            .upsert_user(NewUser {
                id: "user_2".into(),
                username: "sarah".into(),
                farcaster_id: Some("fc1".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(duplicate, Err(BookingError::Validation(_))));

        catalog
            .upsert_user(NewUser {
                id: "user_2".into(),
                username: "sarah".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let stolen = UserPatch { farcaster_id: Some("fc1".into()), ..Default::default() };
        assert!(matches!(
            catalog.update_user("user_2", stolen).await,
            Err(BookingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn expert_profile_inherits_user_rating() {
        let catalog = catalog_with_expert().await;
        let profile = catalog.get_expert_profile("user_1").await.unwrap();
        assert_eq!(profile.rating, 4.8);
        assert!(matches!(
            catalog
                .upsert_expert_profile(
                    "user_404",
                    ExpertProfileInput {
                        expertise: TagSet::new(),
                        availability: Availability::Offline,
                        hourly_rate: 10.0,
                        rating: None,
                    },
                )
                .await,
            Err(BookingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn lesson_defaults_apply() {
        let catalog = catalog_with_expert().await;
        let created = catalog.create_lesson(lesson()).await.unwrap();
        assert_eq!(created.duration_minutes, DEFAULT_DURATION_MINUTES);
        assert_eq!(created.price, DEFAULT_PRICE);
        assert_eq!(created.lesson_type, LessonType::Live);
        assert!(!created.is_live);
    }

    #[tokio::test]
    async fn lesson_requires_expert_profile() {
        let catalog = catalog_with_expert().await;
        let mut new = lesson();
        new.expert_user_id = "user_2".into();
        assert!(matches!(catalog.create_lesson(new).await, Err(BookingError::NotFound(_))));

        let mut new = lesson();
        new.duration_minutes = Some(0);
        assert!(matches!(catalog.create_lesson(new).await, Err(BookingError::Validation(_))));

        let mut new = lesson();
        new.price = Some(-1.0);
        assert!(matches!(catalog.create_lesson(new).await, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn lesson_patch_updates_only_given_fields() {
        let catalog = catalog_with_expert().await;
        let created = catalog.create_lesson(lesson()).await.unwrap();
        let updated = catalog
            .update_lesson(
                &created.id,
                LessonPatch {
                    price: Some(7.5),
                    lesson_type: Some(LessonType::Recorded),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 7.5);
        assert_eq!(updated.lesson_type, LessonType::Recorded);
        assert_eq!(updated.title, created.title);

        let filtered = catalog
            .list_lessons(
                &LessonFilter { lesson_type: Some(LessonType::Live), ..Default::default() },
                Page::default(),
            )
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }
}
