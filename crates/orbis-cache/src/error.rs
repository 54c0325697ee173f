/// Errors raised by [`crate::MemoryCache`] for out-of-range arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Entry size outside `[1, capacity]`.
    #[error("entry size {size} is outside [1, {capacity}]")]
    InvalidSize { size: usize, capacity: usize },

    /// Capacity of zero, or a low-water mark not strictly below capacity.
    #[error("invalid cache bounds: capacity {capacity}, low-water mark {low_water}")]
    InvalidCapacity { capacity: usize, low_water: usize },
}
