pub mod store;
pub mod user_state;

pub use user_state::{RegistrationError, UserState};
