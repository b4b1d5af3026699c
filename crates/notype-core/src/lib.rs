//! notype core: domain models, the shared error taxonomy, and the
//! repository and collaborator traits the other crates build on.

pub mod error;
pub mod models;
pub mod provider;
pub mod repository;

pub use error::{NotypeError, NotypeResult};
