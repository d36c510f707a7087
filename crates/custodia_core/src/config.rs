//! Store configuration.

/// Configuration for a [`crate::Store`] and the transactions it creates.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether filtered loads may push policy down as a storage predicate.
    ///
    /// When disabled, filtered loads always scan unfiltered and leave the
    /// decision to the post-load enforcement layer.
    pub filter_pushdown: bool,

    /// Whether a transaction dropped while still active is rolled back.
    pub rollback_on_drop: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter_pushdown: true,
            rollback_on_drop: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether filtered loads may push policy down.
    #[must_use]
    pub const fn filter_pushdown(mut self, value: bool) -> Self {
        self.filter_pushdown = value;
        self
    }

    /// Sets whether dropped active transactions are rolled back.
    #[must_use]
    pub const fn rollback_on_drop(mut self, value: bool) -> Self {
        self.rollback_on_drop = value;
        self
    }
}
