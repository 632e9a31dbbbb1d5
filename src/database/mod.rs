//! Storage collaborators and the cache entry model.

mod filter;
mod memory;
mod models;
mod mongo;
mod store;

pub use filter::Filter;
pub use memory::MemoryStore;
pub use models::*;
pub use mongo::MongoStore;
pub use store::DocumentStore;
