pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod text;

pub use clock::{Clock, DayPeriod, FixedClock, SystemClock};
pub use domain::conversation::{ConversationId, ProfileUpdate, Role, Turn, UserProfile};
pub use errors::{DomainError, InterfaceError};
