//! Progress reporting for bulk operations.

/// Monotone integer-percent reporter over a caller-supplied sink.
///
/// Wraps the raw `FnMut(u8)` callback contract: percentages are clamped to
/// 0-100, never decrease, and `finish` guarantees that 100 is observed at
/// least once. Duplicate percentages are suppressed, so the sink may be
/// invoked anywhere from once to 101 times.
pub struct Progress<'a> {
    sink: &'a mut dyn FnMut(u8),
    last: Option<u8>,
}

impl<'a> Progress<'a> {
    /// Wrap a callback sink.
    pub fn new(sink: &'a mut dyn FnMut(u8)) -> Self {
        Self { sink, last: None }
    }

    /// Report `done` units out of `total`. A zero total reports nothing;
    /// `finish` still emits the final 100.
    pub fn report(&mut self, done: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = u8::try_from((done * 100 / total).min(100)).unwrap_or(100);
        if self.last.is_none_or(|p| percent > p) {
            (self.sink)(percent);
            self.last = Some(percent);
        }
    }

    /// Emit the terminal 100 unless it was already the last report.
    pub fn finish(&mut self) {
        if self.last != Some(100) {
            (self.sink)(100);
            self.last = Some(100);
        }
    }
}
