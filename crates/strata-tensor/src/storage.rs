//! Owning handle over an allocator-produced memory region.
//!
//! A [`TensorStorage`] pairs a pointer and its layout with the release action that frees it.
//! The handle is move-only: it implements neither `Clone` nor `Copy`, so two owners of the same
//! region cannot exist in safe code, and the release action runs exactly once when the handle
//! is dropped.

use std::{alloc::Layout, ptr::NonNull};

/// The action that returns a region to whoever produced it.
///
/// It receives the pointer and layout the region was allocated with.
pub type ReleaseFn = Box<dyn FnOnce(NonNull<u8>, Layout) + Send + Sync>;

/// Exclusive owner of a raw memory region.
///
/// # Safety invariants
///
/// - `ptr` is valid for reads and writes of `layout.size()` bytes and aligned to
///   `layout.align()`.
/// - every one of those bytes is initialized.
/// - nothing else frees the region; `release` is the only way it goes back to its allocator.
pub struct TensorStorage {
    /// The start of the region. Dangling but aligned when the region is empty.
    ptr: NonNull<u8>,
    /// The size and alignment the region was allocated with.
    layout: Layout,
    /// Taken exactly once, on drop.
    release: Option<ReleaseFn>,
}

// SAFETY: the handle owns its region exclusively; shared access only hands out `&[u8]` and
// mutation requires `&mut self`. The release action is itself `Send + Sync`.
unsafe impl Send for TensorStorage {}
unsafe impl Sync for TensorStorage {}

impl TensorStorage {
    /// Creates an empty storage with the given alignment and a no-op release action.
    ///
    /// `alignment` must be a power of two.
    pub fn empty(alignment: usize) -> Self {
        assert!(
            alignment.is_power_of_two(),
            "storage alignment must be a power of two, got {alignment}"
        );
        // an aligned address without provenance; it is never dereferenced, since every access
        // covers zero bytes
        let ptr = NonNull::new(std::ptr::null_mut::<u8>().wrapping_add(alignment))
            .unwrap_or(NonNull::dangling());
        // SAFETY: alignment is a non-zero power of two and size 0 cannot overflow
        let layout = unsafe { Layout::from_size_align_unchecked(0, alignment) };
        Self {
            ptr,
            layout,
            release: Some(Box::new(|_, _| {})),
        }
    }

    /// Wraps a region produced by an allocator.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `ptr` is valid for reads and writes of `layout.size()` bytes and aligned to
    ///   `layout.align()`
    /// - all `layout.size()` bytes are initialized
    /// - `release` frees the region and nothing else does
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, layout: Layout, release: ReleaseFn) -> Self {
        Self {
            ptr,
            layout,
            release: Some(release),
        }
    }

    /// Returns the number of bytes in the region.
    #[inline]
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Returns true if the region has a length of 0.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    /// Returns the layout the region was allocated with.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns the pointer to the start of the region.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr() as *const u8
    }

    /// Returns the mutable pointer to the start of the region.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Returns the region as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid, aligned and initialized for layout.size() bytes
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    /// Returns the region as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for TensorStorage {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.ptr, self.layout);
        }
    }
}

impl std::fmt::Debug for TensorStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorStorage")
            .field("ptr", &self.ptr)
            .field("len", &self.layout.size())
            .field("align", &self.layout.align())
            .finish()
    }
}
