pub mod http_object_store;
pub mod in_memory_object_store;

pub use http_object_store::HttpObjectStore;
pub use in_memory_object_store::InMemoryObjectStore;
