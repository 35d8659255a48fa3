pub mod event;
pub mod session;

pub use event::{Event, NewRegistration, Registration, RegistrationStatus, RowId};
pub use session::{AppMetadata, AuthSession, Credentials, SessionPair, User};
