//! Storage module for persistent ledger data.
//!
//! ## Backends
//!
//! - **InMemoryStore**: Fast, ephemeral storage for testing
//! - **FileStore**: JSON file-based persistence with atomic flush
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vessel_ledger::storage::{FileStore, LedgerStore};
//!
//! let store = LedgerStore::new(FileStore::open("./data")?);
//! store.save(&ledger)?;
//! let restored = store.load()?;
//! ```

pub mod backend;
pub mod state;

pub use backend::*;
pub use state::*;
