//! Library catalog: scanning, validation and lookups.

pub mod builder;
pub mod entry;
pub mod query;
pub mod resolver;
pub mod snapshot;
pub mod store;
pub mod validator;

pub use builder::CatalogBuilder;
pub use entry::Entry;
pub use query::Query;
pub use resolver::{PageResolver, ResolvedPage};
pub use snapshot::{CatalogStats, RejectedEntry, Snapshot};
pub use store::CatalogStore;
pub use validator::Rejection;
