//! crates/skillshake_core/src/discovery.rs
//!
//! "Shake to discover": a random sample of lessons from the catalog.

use futures::future::try_join_all;
use rand::seq::index::sample;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{LessonFilter, MicroLesson, Page};
use crate::error::{BookingError, BookingResult};
use crate::ports::DatabaseService;

pub const MAX_DISCOVER_COUNT: usize = 10;

#[derive(Clone)]
pub struct DiscoveryService {
    db: Arc<dyn DatabaseService>,
}

impl DiscoveryService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Returns up to `count` distinct lessons chosen uniformly at random.
    ///
    /// Picks random offsets into the lesson count and fetches one lesson per
    /// offset. `count` is clamped to `1..=MAX_DISCOVER_COUNT`.
    pub async fn discover(&self, count: usize) -> BookingResult<Vec<MicroLesson>> {
        let total = self.db.count_lessons().await? as usize;
        if total == 0 {
            return Err(BookingError::NotFound("No lessons available".to_string()));
        }
        let wanted = count.clamp(1, MAX_DISCOVER_COUNT).min(total);
        let offsets = {
            let mut rng = rand::thread_rng();
            sample(&mut rng, total, wanted).into_vec()
        };
        debug!(total, ?offsets, "Sampling lessons");

        let filter = LessonFilter::default();
        let pages = try_join_all(offsets.into_iter().map(|offset| {
            self.db
                .list_lessons(&filter, Page { limit: 1, offset: offset as u32 })
        }))
        .await?;
        Ok(pages.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Availability, ExpertProfile, LessonType, NewUser};
    use crate::memory::InMemoryDatabase;
    use chrono::Utc;
    use std::collections::HashSet;

    async fn seeded(lessons: usize) -> DiscoveryService {
        let db = Arc::new(InMemoryDatabase::new());
        db.upsert_user(NewUser {
            id: "user_1".into(),
            username: "alex".into(),
            ..Default::default()
        })
            .await
            .unwrap();
        db.upsert_expert_profile(ExpertProfile {
            user_id: "user_1".into(),
            expertise: Default::default(),
            availability: Availability::Available,
            hourly_rate: 20.0,
            rating: 4.0,
        })
        .await
        .unwrap();
        for i in 0..lessons {
            let now = Utc::now();
            db.insert_lesson(MicroLesson {
                id: format!("lesson_{}", i + 1),
                expert_user_id: "user_1".into(),
                title: format!("Lesson {}", i + 1),
                description: "short".into(),
                duration_minutes: 3,
                lesson_type: LessonType::Recorded,
                price: 5.0,
                location_tag: None,
                is_live: false,
                recording_url: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        }
        DiscoveryService::new(db)
    }

    #[tokio::test]
    async fn empty_catalog_is_not_found() {
        let discovery = seeded(0).await;
        assert!(matches!(discovery.discover(1).await, Err(BookingError::NotFound(_))));
    }

    #[tokio::test]
    async fn sample_is_distinct_and_bounded() {
        let discovery = seeded(4).await;
        let picked = discovery.discover(3).await.unwrap();
        let ids: HashSet<_> = picked.iter().map(|l| l.id.clone()).collect();
        assert_eq!(picked.len(), 3);
        assert_eq!(ids.len(), 3);

        assert_eq!(discovery.discover(50).await.unwrap().len(), 4);
        assert_eq!(discovery.discover(0).await.unwrap().len(), 1);
    }
}
