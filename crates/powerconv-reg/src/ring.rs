//! Fixed-capacity history rings for the RST regulator.
//!
//! All RST histories share one index so that a given age refers to the same
//! regulation period in every ring. The index arithmetic lives here and
//! nowhere else.

/// Length of every RST history. Must be a power of two.
pub const RST_HISTORY_LEN: usize = 16;

const RST_HISTORY_MASK: usize = RST_HISTORY_LEN - 1;

/// Buffer slot holding the sample `age` periods older than `index`.
#[inline]
pub const fn slot(index: usize, age: usize) -> usize {
    index.wrapping_sub(age) & RST_HISTORY_MASK
}

/// One history of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryRing {
    buf: [f64; RST_HISTORY_LEN],
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self {
            buf: [0.0; RST_HISTORY_LEN],
        }
    }
}

impl HistoryRing {
    /// Sample `age` periods older than `index`.
    #[inline]
    pub fn get(&self, index: usize, age: usize) -> f64 {
        self.buf[slot(index, age)]
    }

    /// Overwrite the sample `age` periods older than `index`.
    #[inline]
    pub fn set(&mut self, index: usize, age: usize, value: f64) {
        self.buf[slot(index, age)] = value;
    }

    /// Set every sample to `value`.
    pub fn fill(&mut self, value: f64) {
        self.buf = [value; RST_HISTORY_LEN];
    }

    /// Mean of the `len` most recent samples, `len` clipped to the ring.
    pub fn mean(&self, index: usize, len: usize) -> f64 {
        let len = len.clamp(1, RST_HISTORY_LEN);
        (0..len).map(|age| self.get(index, age)).sum::<f64>() / len as f64
    }

    /// Sample `age` periods old, interpolated between whole ages.
    ///
    /// Negative ages return the newest sample and ages beyond the ring
    /// return the oldest.
    #[inline]
    pub fn interpolate(&self, index: usize, age: f64) -> f64 {
        let max_age = (RST_HISTORY_LEN - 2) as f64;
        let age = age.clamp(0.0, max_age);
        let whole = age.floor();
        let frac = age - whole;
        let newer = self.get(index, whole as usize);
        if frac == 0.0 {
            return newer;
        }
        let older = self.get(index, whole as usize + 1);
        newer + frac * (older - newer)
    }
}
