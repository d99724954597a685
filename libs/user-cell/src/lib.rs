pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{UserAccount, UserError, UserProfile};
pub use services::UserService;
