//! The job store: a transactional, queryable record of every
//! job and its lifecycle. `JobStore` is the capability other crates depend
//! on; `SqliteJobStore` and `PostgresJobStore` are the two required
//! backends.

mod error;
mod postgres;
mod sqlite;
mod store;

pub use error::StoreError;
pub use postgres::PostgresJobStore;
pub use sqlite::SqliteJobStore;
pub use store::JobStore;
