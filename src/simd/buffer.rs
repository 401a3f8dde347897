use crate::error::HarnessError;
use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

/// Buffer granularity: sizes must hold a whole number of 64-byte vectors.
pub const SIZE_GRANULE: usize = 64;
/// Smallest alignment a memory benchmark may request.
pub const MIN_ALIGNMENT: usize = 16;

/// Heap buffer whose start is aligned to exactly `alignment` bytes.
///
/// The allocation is aligned to `2 * alignment` and the usable region starts `alignment`
/// bytes in, so a request for 16 never lands on a 32- or 64-byte boundary by accident.
pub struct AlignedBuffer {
    base: NonNull<u8>,
    layout: Layout,
    offset: usize,
    len: usize,
}

// The buffer is uniquely owned; moving it to a worker thread is fine.
unsafe impl Send for AlignedBuffer {}

impl AlignedBuffer {
    pub fn new(len: usize, alignment: usize) -> Result<Self, HarnessError> {
        if len == 0 || len % SIZE_GRANULE != 0 {
            return Err(HarnessError::InvalidParams(format!(
                "size {} is not a positive multiple of {}",
                len, SIZE_GRANULE
            )));
        }
        if !alignment.is_power_of_two() || alignment < MIN_ALIGNMENT {
            return Err(HarnessError::InvalidParams(format!(
                "alignment {} is not a power of two >= {}",
                alignment, MIN_ALIGNMENT
            )));
        }

        let layout = Layout::from_size_align(len + alignment, alignment * 2)
            .map_err(|e| HarnessError::InvalidParams(e.to_string()))?;
        let base = NonNull::new(unsafe { alloc(layout) }).ok_or_else(|| {
            HarnessError::InvalidParams(format!("failed to allocate {} bytes", layout.size()))
        })?;

        let mut buffer = Self {
            base,
            layout,
            offset: alignment,
            len,
        };
        // Touch every page before timing starts
        buffer.as_mut_slice().fill(0x5a);
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        unsafe { self.base.as_ptr().add(self.offset) }
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.offset) }
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_alignment() {
        for alignment in [16, 32, 64, 128, 256, 4096] {
            let buf = AlignedBuffer::new(4096, alignment).unwrap();
            let addr = buf.as_ptr() as usize;
            assert_eq!(addr % alignment, 0);
            assert_ne!(addr % (alignment * 2), 0);
            assert_eq!(buf.len(), 4096);
            assert!(buf.as_slice().iter().all(|&b| b == 0x5a));
        }
    }

    #[test]
    fn test_rejects_bad_params() {
        assert!(matches!(
            AlignedBuffer::new(100, 64),
            Err(HarnessError::InvalidParams(_))
        ));
        assert!(matches!(
            AlignedBuffer::new(0, 64),
            Err(HarnessError::InvalidParams(_))
        ));
        assert!(AlignedBuffer::new(4096, 8).is_err());
        assert!(AlignedBuffer::new(4096, 48).is_err());
    }
}
