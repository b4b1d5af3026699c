//! SurrealDB repository implementations.

mod account;
mod history;
mod session;

pub use account::SurrealAccountRepository;
pub use history::SurrealHistoryRepository;
pub use session::SurrealSessionRepository;
