pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Availability, AvailabilityError, BreakWindow};
pub use services::{generate_slots, AvailabilityService};
