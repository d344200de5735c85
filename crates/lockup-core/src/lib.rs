pub mod coins;
pub mod constants;
pub mod error;
pub mod lock;
pub mod query;
pub mod types;

pub use coins::Coins;
pub use constants::*;
pub use error::LockupError;
pub use lock::{Lock, LockStatus};
pub use query::{QueryRequest, QueryResponse};
pub use types::*;
