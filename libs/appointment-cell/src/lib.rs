pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use error::SchedulingError;
pub use models::*;
pub use router::{live_routes, scheduling_routes};
pub use services::*;
pub use store::{AppointmentStore, InMemoryStore, NotificationStore, PostgrestStore, SlotStore};
