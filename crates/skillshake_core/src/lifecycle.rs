//! crates/skillshake_core/src/lifecycle.rs
//!
//! The booking lifecycle: session creation, the status and payment state
//! machines, and the notification side effects of each transition.
//!
//! Status moves along `Pending -> Confirmed -> Completed`, with `Cancelled`
//! reachable from `Pending` or `Confirmed`. Payment moves along
//! `Pending -> Paid -> Refunded`. Every change is written with a conditional
//! update keyed on the `(status, payment_status)` pair that was read, so a
//! concurrent writer can never be silently overwritten.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    Page, PaymentReceipt, PaymentStatus, PaymentSummary, Session, SessionFilter, SessionState,
    SessionStatus,
};
use crate::error::{BookingError, BookingResult};
use crate::notifier::{events_for, Notifier};
use crate::ports::DatabaseService;

pub const DEFAULT_CURRENCY: &str = "USD";

//=========================================================================================
// State Machine
//=========================================================================================

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// Whether `self -> next` is an edge of the status DAG.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed)
                | (Confirmed, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }
}

impl PaymentStatus {
    /// Whether `self -> next` is an edge of the payment lattice.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!((*self, next), (Pending, Paid) | (Paid, Refunded))
    }
}

/// Every change a caller may request on an existing session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionTransition {
    Confirm,
    Complete,
    Cancel,
    RecordPayment { amount: f64, currency: Option<String> },
    Refund,
    AttachReview { rating: u8, review: Option<String> },
}

/// Result of [`BookingService::apply`].
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub session: Session,
    /// Present only for `RecordPayment`.
    pub receipt: Option<PaymentReceipt>,
}

/// Next state when moving `current` to `target`.
///
/// Cancelling a paid session refunds it, so `Paid` always implies a confirmed
/// or completed session.
pub fn next_state_for_status(
    current: SessionState,
    target: SessionStatus,
) -> BookingResult<SessionState> {
    if current.status.is_terminal() {
        return Err(BookingError::invalid_state(format!(
            "Session is {} and cannot change status",
            current.status
        )));
    }
    if !current.status.can_transition_to(target) {
        return Err(BookingError::invalid_state(format!(
            "Cannot move session from {} to {}",
            current.status, target
        )));
    }
    let payment_status = match (target, current.payment_status) {
        (SessionStatus::Cancelled, PaymentStatus::Paid) => PaymentStatus::Refunded,
        (_, p) => p,
    };
    Ok(SessionState { status: target, payment_status })
}

/// Next state when recording a payment. A pending session is confirmed by it.
pub fn next_state_for_payment(session: &Session) -> BookingResult<SessionState> {
    match session.payment_status {
        PaymentStatus::Paid => return Err(BookingError::AlreadyPaid(session.id.clone())),
        PaymentStatus::Refunded => {
            return Err(BookingError::invalid_state("Session payment was already refunded"))
        }
        PaymentStatus::Pending => {}
    }
    let status = match session.status {
        SessionStatus::Cancelled => {
            return Err(BookingError::invalid_state("Cannot pay for a cancelled session"))
        }
        SessionStatus::Pending => SessionStatus::Confirmed,
        other => other,
    };
    Ok(SessionState { status, payment_status: PaymentStatus::Paid })
}

pub fn next_state_for_refund(current: SessionState) -> BookingResult<SessionState> {
    if !current.payment_status.can_transition_to(PaymentStatus::Refunded) {
        return Err(BookingError::invalid_state(format!(
            "Cannot refund a session whose payment is {}",
            current.payment_status
        )));
    }
    Ok(SessionState { payment_status: PaymentStatus::Refunded, ..current })
}

/// Checks a review rating and narrows it to the stored type.
pub fn validate_rating(rating: i64) -> BookingResult<u8> {
    if !(1..=5).contains(&rating) {
        return Err(BookingError::validation(format!(
            "Rating must be between 1 and 5, got {}",
            rating
        )));
    }
    Ok(rating as u8)
}

fn validate_payment(amount: f64, currency: Option<&str>) -> BookingResult<String> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(BookingError::validation("Payment amount must be a positive number"));
    }
    let currency = currency
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(BookingError::validation(format!(
            "Currency must be a three-letter code, got '{}'",
            currency
        )));
    }
    Ok(currency)
}

fn require(field: &str, value: &str) -> BookingResult<()> {
    if value.trim().is_empty() {
        return Err(BookingError::validation(format!("{} is required", field)));
    }
    Ok(())
}

//=========================================================================================
// Booking Service
//=========================================================================================

/// Input for [`BookingService::create_session`].
#[derive(Debug, Clone)]
pub struct NewSession {
    pub lesson_id: String,
    pub learner_user_id: String,
    /// When supplied, must name the lesson's owning expert.
    pub expert_user_id: Option<String>,
    pub start_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct BookingService {
    db: Arc<dyn DatabaseService>,
    notifier: Notifier,
}

impl BookingService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        let notifier = Notifier::new(db.clone());
        Self { db, notifier }
    }

    /// Books `lesson_id` for a learner. The session starts as `(Pending, Pending)`.
    pub async fn create_session(&self, req: NewSession) -> BookingResult<Session> {
        require("lessonId", &req.lesson_id)?;
        require("learnerId", &req.learner_user_id)?;

        let lesson = self.db.find_lesson(&req.lesson_id).await?;
        let learner = self.db.find_user(&req.learner_user_id).await?;

        if let Some(expert_id) = req.expert_user_id.as_deref() {
            if expert_id != lesson.expert_user_id {
                return Err(BookingError::validation(format!(
                    "Lesson {} is taught by {}, not {}",
                    lesson.id, lesson.expert_user_id, expert_id
                )));
            }
        }
        if learner.id == lesson.expert_user_id {
            return Err(BookingError::validation("Experts cannot book their own lessons"));
        }
        let now = Utc::now();
        if req.start_time < now {
            return Err(BookingError::validation("startTime must not be in the past"));
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            lesson_id: lesson.id.clone(),
            learner_user_id: learner.id,
            expert_user_id: lesson.expert_user_id.clone(),
            start_time: req.start_time,
            end_time: Some(req.start_time + Duration::minutes(i64::from(lesson.duration_minutes))),
            status: SessionStatus::Pending,
            payment_status: PaymentStatus::Pending,
            rating: None,
            review: None,
            created_at: now,
            updated_at: now,
        };
        let session = self.db.insert_session(session).await?;
        info!(session_id = %session.id, lesson_id = %session.lesson_id, "Session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> BookingResult<Session> {
        Ok(self.db.find_session(session_id).await?)
    }

    pub async fn list_sessions(
        &self,
        filter: &SessionFilter,
        page: Page,
    ) -> BookingResult<Vec<Session>> {
        Ok(self.db.list_sessions(filter, page).await?)
    }

    pub async fn payment_summary(&self, session_id: &str) -> BookingResult<PaymentSummary> {
        let session = self.db.find_session(session_id).await?;
        let lesson = self.db.find_lesson(&session.lesson_id).await?;
        Ok(PaymentSummary {
            session_id: session.id,
            payment_status: session.payment_status,
            amount: lesson.price,
            title: lesson.title,
        })
    }

    /// Marks the session paid and notifies the expert. A second call fails with
    /// `AlreadyPaid` and emits nothing.
    pub async fn record_payment(
        &self,
        session_id: &str,
        amount: f64,
        currency: Option<&str>,
    ) -> BookingResult<(Session, PaymentReceipt)> {
        let currency = validate_payment(amount, currency)?;
        let before = self.db.find_session(session_id).await?;
        let next = next_state_for_payment(&before)?;
        let after = self.commit(&before, next).await?;

        let receipt = PaymentReceipt {
            transaction_id: format!("txn_{}", Uuid::new_v4().simple()),
            session_id: after.id.clone(),
            amount,
            currency,
            timestamp: Utc::now(),
        };
        info!(
            session_id = %after.id,
            transaction_id = %receipt.transaction_id,
            amount = receipt.amount,
            currency = %receipt.currency,
            "Payment recorded"
        );
        Ok((after, receipt))
    }

    pub async fn update_session_status(
        &self,
        session_id: &str,
        target: SessionStatus,
    ) -> BookingResult<Session> {
        let before = self.db.find_session(session_id).await?;
        let next = next_state_for_status(before.state(), target)?;
        self.commit(&before, next).await
    }

    pub async fn refund(&self, session_id: &str) -> BookingResult<Session> {
        let before = self.db.find_session(session_id).await?;
        let next = next_state_for_refund(before.state())?;
        self.commit(&before, next).await
    }

    /// Stores a learner review. Only completed sessions may be reviewed, once.
    pub async fn attach_review(
        &self,
        session_id: &str,
        rating: u8,
        review: Option<String>,
    ) -> BookingResult<Session> {
        let rating = validate_rating(i64::from(rating))?;
        let before = self.db.find_session(session_id).await?;
        if before.status != SessionStatus::Completed {
            return Err(BookingError::invalid_state(format!(
                "Only completed sessions can be reviewed; session is {}",
                before.status
            )));
        }
        if before.rating.is_some() {
            return Err(BookingError::invalid_state("Session has already been reviewed"));
        }
        let review = review.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        match self.db.set_review(session_id, rating, review).await? {
            Some(after) => {
                self.after_commit(&before, &after).await;
                Ok(after)
            }
            None => Err(BookingError::invalid_state(
                "Session changed before the review could be stored",
            )),
        }
    }

    /// Single entry point for every tagged transition.
    pub async fn apply(
        &self,
        session_id: &str,
        transition: SessionTransition,
    ) -> BookingResult<TransitionOutcome> {
        let (session, receipt) = match transition {
            SessionTransition::Confirm => {
                (self.update_session_status(session_id, SessionStatus::Confirmed).await?, None)
            }
            SessionTransition::Complete => {
                (self.update_session_status(session_id, SessionStatus::Completed).await?, None)
            }
            SessionTransition::Cancel => {
                (self.update_session_status(session_id, SessionStatus::Cancelled).await?, None)
            }
            SessionTransition::RecordPayment { amount, currency } => {
                let (session, receipt) = self
                    .record_payment(session_id, amount, currency.as_deref())
                    .await?;
                (session, Some(receipt))
            }
            SessionTransition::Refund => (self.refund(session_id).await?, None),
            SessionTransition::AttachReview { rating, review } => {
                (self.attach_review(session_id, rating, review).await?, None)
            }
        };
        Ok(TransitionOutcome { session, receipt })
    }

    /// Writes `next` if the session is still in the state it was read in, then
    /// emits notifications. A lost race is reported from the fresh row.
    async fn commit(&self, before: &Session, next: SessionState) -> BookingResult<Session> {
        match self
            .db
            .compare_and_set_state(&before.id, before.state(), next)
            .await?
        {
            Some(after) => {
                info!(
                    session_id = %after.id,
                    status = %after.status,
                    payment_status = %after.payment_status,
                    "Session state updated"
                );
                self.after_commit(before, &after).await;
                Ok(after)
            }
            None => {
                let current = self.db.find_session(&before.id).await?;
                warn!(
                    session_id = %current.id,
                    status = %current.status,
                    payment_status = %current.payment_status,
                    "Conditional session update lost a race"
                );
                if next.payment_status == PaymentStatus::Paid
                    && current.payment_status == PaymentStatus::Paid
                {
                    return Err(BookingError::AlreadyPaid(current.id));
                }
                Err(BookingError::invalid_state(format!(
                    "Session changed concurrently and is now {}/{}",
                    current.status, current.payment_status
                )))
            }
        }
    }

    async fn after_commit(&self, before: &Session, after: &Session) {
        let events = events_for(before, after);
        if events.is_empty() {
            return;
        }
        let title = match self.db.find_lesson(&after.lesson_id).await {
            Ok(lesson) => lesson.title,
            Err(e) => {
                warn!(session_id = %after.id, "Lesson lookup for notification failed: {}", e);
                after.lesson_id.clone()
            }
        };
        let expected = events.len();
        let mut stored = 0;
        for event in events {
            stored += self.notifier.emit(event, after, &title).await;
        }
        debug!(session_id = %after.id, events = expected, stored, "Notifications emitted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Availability, ExpertProfile, LessonType, MicroLesson, NewUser};
    use crate::memory::InMemoryDatabase;
    use std::collections::BTreeSet;
    use tokio::sync::Barrier;

    const ALL_STATUSES: [SessionStatus; 4] = [
        SessionStatus::Pending,
        SessionStatus::Confirmed,
        SessionStatus::Completed,
        SessionStatus::Cancelled,
    ];
    const ALL_PAYMENTS: [PaymentStatus; 3] =
        [PaymentStatus::Pending, PaymentStatus::Paid, PaymentStatus::Refunded];

    async fn setup() -> (Arc<InMemoryDatabase>, BookingService) {
        let db = Arc::new(InMemoryDatabase::new());
        for (id, name) in [("user_1", "alex_chen"), ("user_9", "sam_lee")] {
            db.upsert_user(NewUser {
                id: id.into(),
                username: name.into(),
                rating: Some(4.5),
                ..Default::default()
            })
            .await
            .unwrap();
        }
        db.upsert_expert_profile(ExpertProfile {
            user_id: "user_1".into(),
            expertise: BTreeSet::from(["Guitar".to_string()]),
            availability: Availability::Available,
            hourly_rate: 40.0,
            rating: 4.8,
        })
        .await
        .unwrap();
        let now = Utc::now();
        db.insert_lesson(MicroLesson {
            id: "lesson_1".into(),
            expert_user_id: "user_1".into(),
            title: "Three chords in five minutes".into(),
            description: "G, C and D".into(),
            duration_minutes: 5,
            lesson_type: LessonType::Live,
            price: 5.0,
            location_tag: None,
            is_live: true,
            recording_url: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
        let service = BookingService::new(db.clone());
        (db, service)
    }

    fn booking() -> NewSession {
        NewSession {
            lesson_id: "lesson_1".into(),
            learner_user_id: "user_9".into(),
            expert_user_id: Some("user_1".into()),
            start_time: Utc::now() + Duration::hours(1),
        }
    }

    async fn notifications(db: &InMemoryDatabase, user: &str) -> usize {
        db.list_notifications(user, false, Page::new(Some(100), None))
            .await
            .unwrap()
            .len()
    }

    #[test]
    fn status_edges_match_the_dag() {
        use SessionStatus::*;
        let allowed = [
            (Pending, Confirmed),
            (Confirmed, Completed),
            (Pending, Cancelled),
            (Confirmed, Cancelled),
        ];
        for from in ALL_STATUSES {
            for to in ALL_STATUSES {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn payment_edges_are_monotone() {
        use PaymentStatus::*;
        for from in ALL_PAYMENTS {
            for to in ALL_PAYMENTS {
                let expected = matches!((from, to), (Pending, Paid) | (Paid, Refunded));
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn every_legal_state_keeps_paid_sessions_confirmed_or_completed() {
        for status in ALL_STATUSES {
            for payment_status in ALL_PAYMENTS {
                let current = SessionState { status, payment_status };
                for target in ALL_STATUSES {
                    if let Ok(next) = next_state_for_status(current, target) {
                        if next.payment_status == PaymentStatus::Paid {
                            assert!(matches!(
                                next.status,
                                SessionStatus::Confirmed | SessionStatus::Completed
                            ));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn rating_must_be_one_to_five() {
        assert!(matches!(validate_rating(0), Err(BookingError::Validation(_))));
        assert!(matches!(validate_rating(6), Err(BookingError::Validation(_))));
        assert_eq!(validate_rating(5).unwrap(), 5);
    }

    #[tokio::test]
    async fn create_session_starts_pending() {
        let (_db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.payment_status, PaymentStatus::Pending);
        assert_eq!(session.expert_user_id, "user_1");
    }

    #[tokio::test]
    async fn create_session_rejects_bad_input() {
        let (_db, service) = setup().await;

        let mut req = booking();
        req.lesson_id = "lesson_404".into();
        assert!(matches!(service.create_session(req).await, Err(BookingError::NotFound(_))));

        let mut req = booking();
        req.learner_user_id = "user_404".into();
        assert!(matches!(service.create_session(req).await, Err(BookingError::NotFound(_))));

        let mut req = booking();
        req.learner_user_id = "user_1".into();
        assert!(matches!(service.create_session(req).await, Err(BookingError::Validation(_))));

        let mut req = booking();
        req.start_time = Utc::now() - Duration::minutes(5);
        assert!(matches!(service.create_session(req).await, Err(BookingError::Validation(_))));

        let mut req = booking();
        req.expert_user_id = Some("user_9".into());
        assert!(matches!(service.create_session(req).await, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn payment_is_recorded_once() {
        let (db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();

        let (paid, receipt) = service
            .record_payment(&session.id, 5.0, Some("usd"))
            .await
            .unwrap();
        assert_eq!(receipt.amount, 5.0);
        assert_eq!(receipt.currency, "USD");
        assert!(receipt.transaction_id.starts_with("txn_"));
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.status, SessionStatus::Confirmed);

        let expert_inbox = db.list_notifications("user_1", false, Page::default()).await.unwrap();
        assert_eq!(expert_inbox.len(), 1);
        assert!(expert_inbox[0].message.contains("Three chords in five minutes"));

        let second = service.record_payment(&session.id, 5.0, None).await;
        assert!(matches!(second, Err(BookingError::AlreadyPaid(_))));
        assert_eq!(notifications(&db, "user_1").await, 1);
        assert_eq!(service.get_session(&session.id).await.unwrap(), paid);
    }

    #[tokio::test]
    async fn payment_validates_input_and_existence() {
        let (_db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();

        assert!(matches!(
            service.record_payment("missing", 5.0, None).await,
            Err(BookingError::NotFound(_))
        ));
        assert!(matches!(
            service.record_payment(&session.id, 0.0, None).await,
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            service.record_payment(&session.id, 5.0, Some("dollars")).await,
            Err(BookingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_session_cannot_be_paid() {
        let (_db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        service
            .update_session_status(&session.id, SessionStatus::Cancelled)
            .await
            .unwrap();
        assert!(matches!(
            service.record_payment(&session.id, 5.0, None).await,
            Err(BookingError::InvalidState(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_payments_have_one_winner() {
        let (db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let service = service.clone();
            let barrier = barrier.clone();
            let id = session.id.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                service.record_payment(&id, 5.0, None).await
            }));
        }

        let mut wins = 0;
        let mut already_paid = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(BookingError::AlreadyPaid(_)) => already_paid += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((wins, already_paid), (1, 1));
        assert_eq!(notifications(&db, "user_1").await, 1);
    }

    #[tokio::test]
    async fn lost_race_is_reported_from_fresh_state() {
        let (db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        // Another writer pays between our read and our write.
        db.compare_and_set_state(
            &session.id,
            session.state(),
            SessionState { status: SessionStatus::Confirmed, payment_status: PaymentStatus::Paid },
        )
        .await
        .unwrap()
        .unwrap();

        let result = service.commit(&session, next_state_for_payment(&session).unwrap()).await;
        assert!(matches!(result, Err(BookingError::AlreadyPaid(_))));
    }

    #[tokio::test]
    async fn skipping_confirmed_is_rejected_and_state_kept() {
        let (_db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        let result = service
            .update_session_status(&session.id, SessionStatus::Completed)
            .await;
        assert!(matches!(result, Err(BookingError::InvalidState(_))));
        assert_eq!(service.get_session(&session.id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn terminal_states_are_final() {
        let (_db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        service.apply(&session.id, SessionTransition::Confirm).await.unwrap();
        service.apply(&session.id, SessionTransition::Complete).await.unwrap();

        for transition in [SessionTransition::Cancel, SessionTransition::Confirm] {
            assert!(matches!(
                service.apply(&session.id, transition).await,
                Err(BookingError::InvalidState(_))
            ));
        }
        let stored = service.get_session(&session.id).await.unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn cancelling_a_paid_session_refunds_it() {
        let (db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        service.record_payment(&session.id, 5.0, None).await.unwrap();

        let cancelled = service
            .update_session_status(&session.id, SessionStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        // cancel + refund for the learner
        assert_eq!(notifications(&db, "user_9").await, 2);
    }

    #[tokio::test]
    async fn refund_requires_payment() {
        let (_db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        assert!(matches!(
            service.apply(&session.id, SessionTransition::Refund).await,
            Err(BookingError::InvalidState(_))
        ));

        service.record_payment(&session.id, 5.0, None).await.unwrap();
        let refunded = service.apply(&session.id, SessionTransition::Refund).await.unwrap();
        assert_eq!(refunded.session.payment_status, PaymentStatus::Refunded);
        assert!(matches!(
            service.record_payment(&session.id, 5.0, None).await,
            Err(BookingError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn review_only_after_completion() {
        let (db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();

        assert!(matches!(
            service.attach_review(&session.id, 5, None).await,
            Err(BookingError::InvalidState(_))
        ));

        service.record_payment(&session.id, 5.0, None).await.unwrap();
        service
            .update_session_status(&session.id, SessionStatus::Completed)
            .await
            .unwrap();

        assert!(matches!(
            service.attach_review(&session.id, 0, None).await,
            Err(BookingError::Validation(_))
        ));

        let reviewed = service
            .attach_review(&session.id, 4, Some("Clear and quick".into()))
            .await
            .unwrap();
        assert_eq!(reviewed.rating, Some(4));
        assert_eq!(reviewed.review.as_deref(), Some("Clear and quick"));
        // payment + review
        assert_eq!(notifications(&db, "user_1").await, 2);

        assert!(matches!(
            service.attach_review(&session.id, 5, None).await,
            Err(BookingError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn failed_notification_does_not_undo_payment() {
        let (db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        db.fail_notifications(true);

        let (paid, _) = service.record_payment(&session.id, 5.0, None).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        db.fail_notifications(false);
        assert_eq!(notifications(&db, "user_1").await, 0);
        assert_eq!(
            service.get_session(&session.id).await.unwrap().payment_status,
            PaymentStatus::Paid
        );
    }

    #[tokio::test]
    async fn payment_summary_uses_lesson_price() {
        let (_db, service) = setup().await;
        let session = service.create_session(booking()).await.unwrap();
        let summary = service.payment_summary(&session.id).await.unwrap();
        assert_eq!(summary.amount, 5.0);
        assert_eq!(summary.payment_status, PaymentStatus::Pending);
        assert_eq!(summary.title, "Three chords in five minutes");
    }

    #[tokio::test]
    async fn sessions_are_listed_for_either_party() {
        let (_db, service) = setup().await;
        let first = service.create_session(booking()).await.unwrap();
        let mut later = booking();
        later.start_time = Utc::now() + Duration::hours(3);
        let second = service.create_session(later).await.unwrap();
        service.apply(&first.id, SessionTransition::Cancel).await.unwrap();

        let for_expert = service
            .list_sessions(
                &SessionFilter { user_id: Some("user_1".into()), status: None },
                Page::default(),
            )
            .await
            .unwrap();
        let ids: Vec<_> = for_expert.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

        let pending_for_learner = service
            .list_sessions(
                &SessionFilter {
                    user_id: Some("user_9".into()),
                    status: Some(SessionStatus::Pending),
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(pending_for_learner.len(), 1);
        assert_eq!(pending_for_learner[0].id, second.id);
    }
}
