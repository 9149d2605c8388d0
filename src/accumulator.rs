use alloc::{collections::TryReserveError, vec::Vec};
use core::cmp;

/// Smallest allocation made for the accumulator.
pub const MIN_CAPACITY: usize = 32;

/// Holds the last completed receive transaction until the application has
/// read it.
///
/// The allocation only ever grows. Growth happens from interrupt context when
/// a transaction is published, so allocation latency adds to the interrupt
/// latency until the high-water mark is reached. Transactions are bounded by
/// the frame capacity, which bounds the growth as well.
pub struct RxAccumulator {
    buf: Vec<u8>,
    cursor: usize,
    #[cfg(test)]
    limit: Option<usize>,
}

impl RxAccumulator {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            cursor: 0,
            #[cfg(test)]
            limit: None,
        }
    }

    /// Ensures room for at least `requested` bytes. Existing content is not
    /// preserved when a new allocation is made. On failure nothing changes.
    pub fn grow(&mut self, requested: usize) -> Result<(), TryReserveError> {
        let wanted = cmp::max(requested, MIN_CAPACITY);
        if self.buf.capacity() >= wanted {
            return Ok(());
        }

        // An oversized request makes the reservation fail like a real
        // allocator would.
        #[cfg(test)]
        let wanted = match self.limit {
            Some(limit) if wanted > limit => usize::MAX,
            _ => wanted,
        };

        let mut fresh = Vec::new();
        fresh.try_reserve_exact(wanted)?;

        self.buf = fresh;
        self.cursor = 0;
        Ok(())
    }

    /// Replaces the content with `data` and rewinds the read cursor.
    pub fn fill(&mut self, data: &[u8]) -> Result<(), TryReserveError> {
        self.grow(data.len())?;

        self.buf.clear();
        self.buf.extend_from_slice(data);
        self.cursor = 0;
        Ok(())
    }

    pub fn available(&self) -> usize {
        self.buf.len() - self.cursor
    }

    pub fn is_drained(&self) -> bool {
        self.cursor >= self.buf.len()
    }

    pub fn read(&mut self) -> Option<u8> {
        let byte = self.buf.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(byte)
    }

    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let n = cmp::min(out.len(), self.available());
        out[..n].copy_from_slice(&self.buf[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Makes every allocation larger than `limit` bytes fail.
    #[cfg(test)]
    pub fn limit_growth(&mut self, limit: usize) {
        self.limit = Some(limit);
    }

    /// Frees the allocation.
    pub fn release(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::{RxAccumulator, MIN_CAPACITY};

    #[test]
    fn grow_applies_floor() {
        let mut acc = RxAccumulator::new();
        assert_eq!(acc.capacity(), 0);

        acc.grow(3).unwrap();

        assert!(acc.capacity() >= MIN_CAPACITY);
    }

    #[test]
    fn grow_never_shrinks() {
        let mut acc = RxAccumulator::new();
        acc.grow(100).unwrap();
        let high = acc.capacity();

        acc.grow(10).unwrap();

        assert_eq!(acc.capacity(), high);
    }

    #[test]
    fn failed_grow_keeps_previous_state() {
        let mut acc = RxAccumulator::new();
        acc.fill(&[1, 2, 3]).unwrap();
        acc.read().unwrap();
        let cap = acc.capacity();

        assert!(acc.grow(usize::MAX).is_err());

        assert_eq!(acc.capacity(), cap);
        assert_eq!(acc.available(), 2);
        assert_eq!(acc.read(), Some(2));
    }

    #[test]
    fn growth_past_limit_fails() {
        let mut acc = RxAccumulator::new();
        acc.limit_growth(MIN_CAPACITY);

        acc.fill(&[1; MIN_CAPACITY]).unwrap();
        let cap = acc.capacity();
        assert!(acc.fill(&[2; MIN_CAPACITY + 1]).is_err());

        assert_eq!(acc.capacity(), cap);
        assert_eq!(acc.available(), MIN_CAPACITY);
    }

    #[test]
    fn read_walks_cursor_then_reports_empty() {
        let mut acc = RxAccumulator::new();
        acc.fill(&[0x10, 0x20]).unwrap();

        assert_eq!(acc.available(), 2);
        assert_eq!(acc.read(), Some(0x10));
        assert_eq!(acc.available(), 1);
        assert_eq!(acc.read(), Some(0x20));
        assert_eq!(acc.available(), 0);
        assert!(acc.is_drained());
        assert_eq!(acc.read(), None);
    }

    #[test]
    fn read_into_copies_what_is_available() {
        let mut acc = RxAccumulator::new();
        acc.fill(&[1, 2, 3, 4, 5]).unwrap();

        let mut out = [0u8; 3];
        assert_eq!(acc.read_into(&mut out), 3);
        assert_eq!(out, [1, 2, 3]);

        assert_eq!(acc.read_into(&mut out), 2);
        assert_eq!(&out[..2], &[4, 5]);
        assert_eq!(acc.read_into(&mut out), 0);
    }

    #[test]
    fn fill_rewinds_cursor() {
        let mut acc = RxAccumulator::new();
        acc.fill(&[1, 2]).unwrap();
        acc.read();
        acc.read();

        acc.fill(&[7]).unwrap();

        assert_eq!(acc.available(), 1);
        assert_eq!(acc.read(), Some(7));
    }

    #[test]
    fn release_frees_allocation() {
        let mut acc = RxAccumulator::new();
        acc.fill(&[1, 2, 3]).unwrap();

        acc.release();

        assert_eq!(acc.capacity(), 0);
        assert_eq!(acc.available(), 0);
        assert_eq!(acc.read(), None);
    }
}
