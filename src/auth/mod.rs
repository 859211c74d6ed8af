//! Authentication: token lifecycle, state machine, storage, and the façade

pub use manager::{ListenerId, TokenManager, TokenManagerOptions, TokenRefresher};
pub use service::AuthService;
pub use state::{AuthState, AuthStateChange};
pub use storage::{MemoryTokenStorage, TokenStorage};
pub use tokens::AuthTokens;

pub mod manager;
pub mod service;
pub mod state;
pub mod storage;
pub mod tokens;
