//! # Authentication
//!
//! Session handling for the clinic API: the token repository injected into
//! the HTTP client, and the login/refresh/logout flows that write to it.

pub mod session;
pub mod store;

pub use session::{AuthClient, LoginForm, RegistrationForm, UserProfile, seconds_until_expiry};
pub use store::{FileTokenStore, MemoryTokenStore, TokenPair, TokenStore, TokenStoreError};
