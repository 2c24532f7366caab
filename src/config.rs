/// Number of slots a new column pre-allocates.
///
/// Large enough that typical bulk loads never trigger growth.
pub const DEFAULT_COLUMN_CAPACITY: usize = 10_000;

/// Tunables shared by every entity created under a [crate::Manager].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Initial physical capacity of every new column.
    pub column_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            column_capacity: DEFAULT_COLUMN_CAPACITY,
        }
    }
}

impl Config {
    /// Overrides the initial column capacity.
    ///
    /// Zero is clamped to one so that doubling growth always makes progress.
    pub fn with_column_capacity(mut self, capacity: usize) -> Self {
        self.column_capacity = capacity.max(1);
        self
    }
}
