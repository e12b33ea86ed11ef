/// Media storage module
///
/// - Domain: `ObjectStore` port and the `StagedFile` handed over by the request layer
/// - Infrastructure: HTTP object store client and an in-memory store
pub mod domain;
pub mod infrastructure;

pub use domain::{ObjectStore, StagedFile};
pub use infrastructure::{HttpObjectStore, InMemoryObjectStore};
