pub mod backend;
pub mod backend_client;
pub mod events;
pub mod metrics;
pub mod mock_backend;

pub use backend::{
    AuthResponse, Backend, OAuthStart, RemoteError, RemoteErrorKind, RemoteResult,
};
pub use backend_client::BackendClient;
pub use mock_backend::{CallLog, MockBackend};
