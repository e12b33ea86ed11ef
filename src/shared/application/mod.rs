/// Shared application layer patterns
///
/// Pagination and the response envelope returned by every service method.
pub mod pagination;
pub mod response;

pub use pagination::*;
pub use response::ServiceResponse;
