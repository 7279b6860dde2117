//! crates/skillshake_core/src/notifier.rs
//!
//! Best-effort notification side effects of lifecycle transitions.
//! A failed insert is logged and swallowed; it never undoes the transition.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Notification, PaymentStatus, Session, SessionStatus};
use crate::ports::DatabaseService;

/// Events that produce notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    PaymentRecorded,
    Confirmed,
    Cancelled,
    Refunded,
    Reviewed,
}

impl LifecycleEvent {
    /// Recipients and message for this event on `session`.
    fn messages(&self, session: &Session, lesson_title: &str) -> Vec<(String, String)> {
        match self {
            LifecycleEvent::PaymentRecorded => vec![(
                session.expert_user_id.clone(),
                format!("Payment received for lesson: {}", lesson_title),
            )],
            LifecycleEvent::Confirmed => vec![(
                session.learner_user_id.clone(),
                format!("Your session for {} has been confirmed", lesson_title),
            )],
            LifecycleEvent::Cancelled => {
                let message = format!("Session for {} was cancelled", lesson_title);
                vec![
                    (session.learner_user_id.clone(), message.clone()),
                    (session.expert_user_id.clone(), message),
                ]
            }
            LifecycleEvent::Refunded => vec![(
                session.learner_user_id.clone(),
                format!("Refund issued for lesson: {}", lesson_title),
            )],
            LifecycleEvent::Reviewed => vec![(
                session.expert_user_id.clone(),
                format!(
                    "New {}-star review for {}",
                    session.rating.unwrap_or_default(),
                    lesson_title
                ),
            )],
        }
    }
}

/// Derives the events produced by a successful transition from `before` to `after`.
///
/// A payment that also confirms the session reports only `PaymentRecorded`.
pub fn events_for(before: &Session, after: &Session) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    let paid_now = before.payment_status != PaymentStatus::Paid
        && after.payment_status == PaymentStatus::Paid;

    if paid_now {
        events.push(LifecycleEvent::PaymentRecorded);
    }
    if before.status != after.status {
        match after.status {
            SessionStatus::Confirmed if !paid_now => events.push(LifecycleEvent::Confirmed),
            SessionStatus::Cancelled => events.push(LifecycleEvent::Cancelled),
            _ => {}
        }
    }
    if before.payment_status == PaymentStatus::Paid
        && after.payment_status == PaymentStatus::Refunded
    {
        events.push(LifecycleEvent::Refunded);
    }
    if before.rating.is_none() && after.rating.is_some() {
        events.push(LifecycleEvent::Reviewed);
    }
    events
}

#[derive(Clone)]
pub struct Notifier {
    db: Arc<dyn DatabaseService>,
}

impl Notifier {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Emits every notification for `event`. Returns how many were stored.
    pub async fn emit(
        &self,
        event: LifecycleEvent,
        session: &Session,
        lesson_title: &str,
    ) -> usize {
        let mut stored = 0;
        for (user_id, message) in event.messages(session, lesson_title) {
            let notification = Notification {
                id: Uuid::new_v4().to_string(),
                user_id,
                message,
                timestamp: Utc::now(),
                read: false,
            };
            match self.db.insert_notification(notification).await {
                Ok(n) => {
                    debug!(
                        session_id = %session.id,
                        user_id = %n.user_id,
                        ?event,
                        "Notification stored"
                    );
                    stored += 1;
                }
                Err(e) => {
                    warn!(session_id = %session.id, ?event, "Failed to store notification: {}", e);
                }
            }
        }
        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(status: SessionStatus, payment_status: PaymentStatus) -> Session {
        let now = Utc::now();
        Session {
            id: "s1".into(),
            lesson_id: "lesson_1".into(),
            learner_user_id: "user_9".into(),
            expert_user_id: "user_1".into(),
            start_time: now,
            end_time: None,
            status,
            payment_status,
            rating: None,
            review: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn payment_that_confirms_reports_only_payment() {
        let before = session(SessionStatus::Pending, PaymentStatus::Pending);
        let after = session(SessionStatus::Confirmed, PaymentStatus::Paid);
        assert_eq!(events_for(&before, &after), vec![LifecycleEvent::PaymentRecorded]);
    }

    #[test]
    fn cancelling_paid_session_reports_cancel_and_refund() {
        let before = session(SessionStatus::Confirmed, PaymentStatus::Paid);
        let after = session(SessionStatus::Cancelled, PaymentStatus::Refunded);
        assert_eq!(
            events_for(&before, &after),
            vec![LifecycleEvent::Cancelled, LifecycleEvent::Refunded]
        );
    }

    #[test]
    fn cancel_message_goes_to_both_parties() {
        let s = session(SessionStatus::Cancelled, PaymentStatus::Pending);
        let recipients: Vec<_> = LifecycleEvent::Cancelled
            .messages(&s, "Guitar basics")
            .into_iter()
            .map(|(user, _)| user)
            .collect();
        assert_eq!(recipients, vec!["user_9".to_string(), "user_1".to_string()]);
    }

    #[tokio::test]
    async fn emit_counts_only_stored_notifications() {
        let db = Arc::new(crate::memory::InMemoryDatabase::new());
        let notifier = Notifier::new(db.clone());
        let s = session(SessionStatus::Cancelled, PaymentStatus::Pending);
        assert_eq!(notifier.emit(LifecycleEvent::Cancelled, &s, "Guitar basics").await, 2);

        db.fail_notifications(true);
        assert_eq!(notifier.emit(LifecycleEvent::Cancelled, &s, "Guitar basics").await, 0);
    }
}
