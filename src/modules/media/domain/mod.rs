pub mod object_store;
pub mod staged_file;

pub use object_store::ObjectStore;
pub use staged_file::StagedFile;
