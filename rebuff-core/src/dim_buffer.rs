//! Flat storage of fixed-width rows.
//!
//! [`DimensionalBuffer`] is the bottom layer of every environment in this crate.
//! It keeps `capacity` rows of `dim` values each in one contiguous allocation
//! and addresses them by slot index.
use crate::error::RebuffError;

/// Contiguous storage of `capacity` rows, each `dim` values wide.
///
/// Row `i` occupies `[i * dim, (i + 1) * dim)` of the backing vector.
/// Views returned by [`DimensionalBuffer::get_data`] and
/// [`DimensionalBuffer::rows`] borrow the buffer, so they stay valid until
/// the next mutable call.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionalBuffer<T> {
    buffer: Vec<T>,
    capacity: usize,
    dim: usize,
}

impl<T> DimensionalBuffer<T>
where
    T: Copy + Default,
{
    /// Creates a zero-filled buffer of `capacity` rows.
    ///
    /// Panics if `capacity * dim` overflows; environments validate their
    /// configuration before calling this.
    pub fn new(capacity: usize, dim: usize) -> Self {
        Self {
            buffer: vec![T::default(); capacity * dim],
            capacity,
            dim,
        }
    }

    /// Number of rows.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Width of a row.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Copies `count` rows of `source`, starting at row `shift`, into the
    /// buffer starting at row `dest_index`.
    ///
    /// The copy never wraps. A request running past `capacity`, or reading past
    /// the end of `source`, fails without writing anything.
    pub fn store_data(
        &mut self,
        source: &[T],
        shift: usize,
        dest_index: usize,
        count: usize,
    ) -> Result<(), RebuffError> {
        if dest_index + count > self.capacity {
            return Err(RebuffError::CapacityExceeded {
                requested: count,
                available: self.capacity.saturating_sub(dest_index),
            });
        }
        let src_begin = shift * self.dim;
        let src_end = (shift + count) * self.dim;
        if src_end > source.len() {
            return Err(RebuffError::ShapeMismatch {
                field: "source",
                expected: src_end,
                actual: source.len(),
            });
        }

        let dest_begin = dest_index * self.dim;
        self.buffer[dest_begin..dest_begin + (src_end - src_begin)]
            .copy_from_slice(&source[src_begin..src_end]);
        Ok(())
    }

    /// Returns the row at `index`.
    ///
    /// Panics if `index >= capacity`.
    pub fn get_data(&self, index: usize) -> &[T] {
        self.rows(index, 1)
    }

    /// Returns `count` consecutive rows starting at `index`.
    ///
    /// Panics if the range runs past `capacity`.
    pub fn rows(&self, index: usize, count: usize) -> &[T] {
        &self.buffer[index * self.dim..(index + count) * self.dim]
    }

    /// The whole backing storage.
    pub fn as_slice(&self) -> &[T] {
        &self.buffer
    }

    /// Moves rows `[src_begin, src_end)` so that they start at row `dest`.
    pub fn copy_within(&mut self, src_begin: usize, src_end: usize, dest: usize) {
        debug_assert!(src_end <= self.capacity);
        debug_assert!(dest + (src_end - src_begin) <= self.capacity);
        self.buffer
            .copy_within(src_begin * self.dim..src_end * self.dim, dest * self.dim);
    }

    /// Appends the row at `index` to `out`.
    pub(crate) fn extend_with_row(&self, index: usize, out: &mut Vec<T>) {
        out.extend_from_slice(self.get_data(index));
    }
}

#[cfg(test)]
mod tests {
    use super::DimensionalBuffer;
    use crate::error::RebuffError;

    #[test]
    fn test_store_and_get() {
        let mut buf = DimensionalBuffer::<f32>::new(1024, 3);
        assert_eq!(buf.get_data(0), &[0.0, 0.0, 0.0]);

        let v = vec![0.0, 1.0, 2.0];
        buf.store_data(&v, 0, 0, 1).unwrap();
        assert_eq!(buf.get_data(0), &[0.0, 1.0, 2.0]);

        for n in 0..1000 {
            let ix = (n * 3 % 1024).min(1023);
            buf.store_data(&v, 0, ix, 1).unwrap();
            assert_eq!(buf.get_data(ix), v.as_slice());
        }
    }

    #[test]
    fn test_store_with_shift() {
        let mut buf = DimensionalBuffer::<f32>::new(4, 2);
        let src = (0..8).map(|x| x as f32).collect::<Vec<_>>();
        buf.store_data(&src, 1, 2, 2).unwrap();
        assert_eq!(buf.rows(2, 2), &[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.get_data(0), &[0.0, 0.0]);
    }

    #[test]
    fn test_store_past_capacity_is_rejected() {
        let mut buf = DimensionalBuffer::<i8>::new(4, 1);
        let src = vec![1i8; 3];
        let err = buf.store_data(&src, 0, 2, 3).unwrap_err();
        assert_eq!(
            err,
            RebuffError::CapacityExceeded {
                requested: 3,
                available: 2
            }
        );
        assert!(buf.as_slice().iter().all(|&x| x == 0));
    }

    #[test]
    fn test_short_source_is_rejected() {
        let mut buf = DimensionalBuffer::<f32>::new(4, 3);
        let src = vec![1.0; 5];
        assert!(matches!(
            buf.store_data(&src, 0, 0, 2),
            Err(RebuffError::ShapeMismatch { expected: 6, .. })
        ));
    }

    #[test]
    fn test_copy_within() {
        let mut buf = DimensionalBuffer::<f32>::new(5, 1);
        let src = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        buf.store_data(&src, 0, 0, 5).unwrap();
        buf.copy_within(2, 5, 0);
        assert_eq!(buf.rows(0, 3), &[2.0, 3.0, 4.0]);
    }
}
