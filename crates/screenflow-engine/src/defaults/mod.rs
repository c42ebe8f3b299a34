//! Default component implementations.
//!
//! In-memory stores back tests and local development; the file-backed
//! flow store covers single-node deployments without a database. All
//! of them honor the contracts in [`traits`](crate::traits), so they
//! double as reference implementations for external backends.

mod file_flow_store;
mod in_memory_flow_store;
mod in_memory_queue;
mod in_memory_screen_store;
mod jwt;
mod resources;

pub use file_flow_store::FileFlowStore;
pub use in_memory_flow_store::InMemoryFlowStore;
pub use in_memory_queue::InMemoryQueue;
pub use in_memory_screen_store::InMemoryScreenStore;
pub use jwt::HmacJwtIssuer;
pub use resources::StaticResources;
