pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod logger;
pub mod memory;
pub mod model;
pub mod repo;

pub use error::{Error, Result};
pub use model::{Entry, EntryFields, ValidationError};
pub use repo::Repository;
