pub mod catalog;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod notifier;
pub mod ports;

pub use catalog::{CatalogService, ExpertProfileInput, LessonPatch, NewLesson, UserPatch};
pub use discovery::DiscoveryService;
pub use domain::{
    Availability, ExpertProfile, LessonFilter, LessonType, Location, MicroLesson, NewUser,
    Notification, Page, PaymentReceipt, PaymentStatus, PaymentSummary, Session, SessionFilter,
    SessionState, SessionStatus, TagSet, User,
};
pub use error::{BookingError, BookingResult};
pub use lifecycle::{BookingService, NewSession, SessionTransition, TransitionOutcome};
pub use ports::{DatabaseService, PortError, PortResult};
