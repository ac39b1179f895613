//! Borrowed byte views for buffer uploads

use bytemuck::Pod;

/// Bytes to be written into a [`Buffer`](crate::vma::Buffer)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferWrite<'a> {
    bytes: &'a [u8],
}

impl<'a> BufferWrite<'a> {
    /// Raw bytes
    pub const fn from_bytes(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// The bytes of a single plain-old-data value
    pub fn from_value<T: Pod>(value: &'a T) -> Self {
        Self {
            bytes: bytemuck::bytes_of(value),
        }
    }

    /// The bytes of a slice of plain-old-data values
    pub fn from_slice<T: Pod>(values: &'a [T]) -> Self {
        Self {
            bytes: bytemuck::cast_slice(values),
        }
    }

    /// Underlying bytes
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Size in bytes
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether there is nothing to write
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl<'a> From<&'a [u8]> for BufferWrite<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Total size of a set of contiguous writes
pub fn total_len(writes: &[BufferWrite<'_>]) -> usize {
    writes.iter().map(BufferWrite::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_and_slice_sizes() {
        let value = [1.0f32, 2.0, 3.0, 4.0];
        assert_eq!(BufferWrite::from_value(&value).len(), 16);

        let indices = [0u32, 1, 2, 2, 3, 0];
        let write = BufferWrite::from_slice(&indices);
        assert_eq!(write.len(), 24);
        assert_eq!(&write.bytes()[4..8], &1u32.to_ne_bytes());
    }

    #[test]
    fn test_total_len() {
        let a = [0u8; 3];
        let b = [0u16; 5];
        let writes = [BufferWrite::from_bytes(&a), BufferWrite::default(), BufferWrite::from_slice(&b)];
        assert_eq!(total_len(&writes), 13);
        assert!(writes[1].is_empty());
    }
}
