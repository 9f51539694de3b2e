//! Client half of the auth flow: token persistence, backend calls, the
//! session state machine and the route guard.

pub mod api;
pub mod errors;
pub mod guard;
pub mod session;
pub mod token_store;

pub use api::{ApiClient, AuthApi};
pub use errors::ClientError;
pub use guard::{guard, Route};
pub use session::{AuthState, Session};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
