//! Configuration access port trait.

/// Typed values are parsed by the caller from `get_string` so malformed
/// entries can be reported instead of silently defaulted.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
