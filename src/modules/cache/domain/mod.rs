pub mod cache_store;

pub use cache_store::CacheStore;

/// Key inside a cache namespace: `<namespace>:<suffix>`
pub fn namespace_key(namespace: &str, suffix: &str) -> String {
    format!("{}{}", namespace_prefix(namespace), suffix)
}

/// Prefix shared by every key of a namespace
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{}:", namespace.trim_end_matches(':'))
}
