//! Frames in flight

/// Number of frames the CPU may record ahead of the GPU
#[cfg(not(feature = "triple-buffering"))]
pub const RESOURCE_BUFFERING: usize = 2;
/// Number of frames the CPU may record ahead of the GPU
#[cfg(feature = "triple-buffering")]
pub const RESOURCE_BUFFERING: usize = 3;

const _: () = assert!(RESOURCE_BUFFERING >= 2 && RESOURCE_BUFFERING <= 8);

/// One instance of `T` per frame in flight
pub type Buffered<T> = [T; RESOURCE_BUFFERING];

/// Index of the frame currently being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameIndex(pub usize);

impl FrameIndex {
    /// The following frame, wrapping at [`RESOURCE_BUFFERING`]
    #[must_use]
    pub const fn next(self) -> Self {
        Self((self.0 + 1) % RESOURCE_BUFFERING)
    }

    /// Index into a [`Buffered`] array
    pub const fn get(self) -> usize {
        self.0
    }
}

/// Build a [`Buffered`] array, failing on the first error
pub fn try_buffered<T, E>(mut f: impl FnMut(FrameIndex) -> Result<T, E>) -> Result<Buffered<T>, E> {
    let mut items = Vec::with_capacity(RESOURCE_BUFFERING);
    for index in 0..RESOURCE_BUFFERING {
        items.push(f(FrameIndex(index))?);
    }
    Ok(items
        .try_into()
        .unwrap_or_else(|_| unreachable!("exactly RESOURCE_BUFFERING items were pushed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_wraps() {
        let mut index = FrameIndex::default();
        for _ in 0..RESOURCE_BUFFERING {
            index = index.next();
        }
        assert_eq!(index, FrameIndex(0));
        assert_eq!(FrameIndex(0).next().get(), 1);
    }

    #[test]
    fn test_try_buffered() {
        let values: Buffered<usize> = try_buffered(|index| Ok::<_, ()>(index.get() * 10)).unwrap();
        assert_eq!(values[1], 10);

        let failed: Result<Buffered<usize>, &str> = try_buffered(|index| if index.get() == 1 { Err("boom") } else { Ok(0) });
        assert_eq!(failed.unwrap_err(), "boom");
    }
}
