//! History handling shared by all filters.

/// Common operations for filters that keep a history of past samples.
pub trait FilterState: std::fmt::Debug {
    /// Fill the history as if `value` had been applied for ever.
    ///
    /// Used when a signal starts being filtered, or when a discontinuity
    /// must not be propagated as a transient.
    fn init_history(&mut self, value: f64);
}
