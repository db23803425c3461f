pub mod error;
pub mod filters;
pub mod memory;
pub mod postgres_store;
pub mod store;

pub use error::StoreError;
pub use filters::{ExecutionFilters, ServiceFilters};
pub use memory::InMemoryStore;
pub use postgres_store::PostgresStore;
pub use store::StateStore;
