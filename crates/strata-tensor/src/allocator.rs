use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::storage::{ReleaseFn, TensorStorage};

/// Default alignment in bytes of host allocations (one cache line).
pub const DEFAULT_ALIGNMENT: usize = 64;

/// The largest alignment any supported element type needs.
const MIN_ALIGNMENT: usize = 8;

/// An error type for tensor allocator operations.
#[derive(Debug, Error, PartialEq)]
pub enum TensorAllocatorError {
    /// The requested size and alignment do not form a valid layout.
    #[error("Invalid tensor layout {0}")]
    LayoutError(core::alloc::LayoutError),

    /// The memory source could not satisfy the request.
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// The number of bytes requested.
        size: usize,
    },

    /// The configured alignment is not usable.
    #[error("Invalid alignment {alignment}: must be a power of two and at least 8")]
    InvalidAlignment {
        /// The rejected alignment.
        alignment: usize,
    },
}

impl TensorAllocatorError {
    /// Returns true if freeing memory could make the request succeed.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Returns true if the error stems from a bad request rather than the memory source.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::LayoutError(_) | Self::InvalidAlignment { .. })
    }

    /// Returns a user-friendly suggestion for resolving the error.
    pub fn suggestion(&self) -> &str {
        match self {
            Self::LayoutError(_) => "Check that the requested size does not exceed isize::MAX bytes",
            Self::OutOfMemory { .. } => "Free unused buffers or request a smaller capacity",
            Self::InvalidAlignment { .. } => {
                "Use a power-of-two alignment of at least 8 bytes, e.g. DEFAULT_ALIGNMENT"
            }
        }
    }
}

/// A source of owned memory for tensor buffers.
///
/// `allocate` returns a [`TensorStorage`] whose release action gives the region back, so every
/// allocation is freed exactly once when its handle is dropped, on every exit path.
///
/// # Safety
///
/// Implementors must guarantee that every returned storage:
/// - satisfies the [`TensorStorage`] invariants, in particular all of its bytes are initialized
/// - is at least `size` bytes long and aligned to at least 8 bytes
///
/// Allocators are shared across threads; unrelated `allocate` calls may run concurrently.
pub unsafe trait TensorAllocator: Send + Sync {
    /// Returns a short name identifying the allocator in logs.
    fn name(&self) -> &str;

    /// Allocates a region of `size` bytes.
    ///
    /// `allocate(0)` returns a valid, releasable empty storage.
    fn allocate(&self, size: usize) -> Result<TensorStorage, TensorAllocatorError>;
}

/// A tensor allocator that uses the system allocator.
///
/// Memory is zero-initialized and aligned to [`DEFAULT_ALIGNMENT`] unless configured otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuAllocator {
    alignment: usize,
}

impl Default for CpuAllocator {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

impl CpuAllocator {
    /// Creates a host allocator with a custom alignment.
    ///
    /// # Errors
    ///
    /// Returns [`TensorAllocatorError::InvalidAlignment`] if `alignment` is not a power of two or
    /// is smaller than the alignment of the widest element type.
    pub fn with_alignment(alignment: usize) -> Result<Self, TensorAllocatorError> {
        if !alignment.is_power_of_two() || alignment < MIN_ALIGNMENT {
            return Err(TensorAllocatorError::InvalidAlignment { alignment });
        }
        Ok(Self { alignment })
    }

    /// Returns the alignment of the regions this allocator produces.
    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }
}

// SAFETY: regions come from `alloc_zeroed` with the requested layout, so they are initialized,
// large enough and aligned to `self.alignment >= MIN_ALIGNMENT`.
unsafe impl TensorAllocator for CpuAllocator {
    fn name(&self) -> &str {
        "cpu"
    }

    fn allocate(&self, size: usize) -> Result<TensorStorage, TensorAllocatorError> {
        if size == 0 {
            return Ok(TensorStorage::empty(self.alignment));
        }

        let layout =
            Layout::from_size_align(size, self.alignment).map_err(TensorAllocatorError::LayoutError)?;

        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(TensorAllocatorError::OutOfMemory { size })?;
        log::trace!("cpu allocator: allocated {size} bytes at {ptr:p}");

        let release: ReleaseFn = Box::new(|ptr, layout| {
            // SAFETY: ptr was returned by alloc_zeroed with this exact layout
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
        });

        // SAFETY: ptr is valid, zeroed and aligned for layout; release is its only deallocation
        Ok(unsafe { TensorStorage::from_raw_parts(ptr, layout, release) })
    }
}

/// Snapshot of the counters kept by a [`TrackingAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Number of successful `allocate` calls.
    pub allocations: usize,
    /// Number of regions released.
    pub releases: usize,
    /// Bytes currently held by live regions.
    pub live_bytes: usize,
    /// Largest value `live_bytes` has reached.
    pub peak_bytes: usize,
}

#[derive(Debug, Default)]
struct Counters {
    allocations: AtomicUsize,
    releases: AtomicUsize,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
}

impl Counters {
    fn record_allocation(&self, size: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        let live = self.live_bytes.fetch_add(size, Ordering::Relaxed) + size;
        self.peak_bytes.fetch_max(live, Ordering::Relaxed);
    }

    fn record_release(&self, size: usize) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(size, Ordering::Relaxed);
    }
}

/// An allocator wrapper that counts allocations, releases and live bytes.
///
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct TrackingAllocator<A = CpuAllocator> {
    inner: A,
    counters: Arc<Counters>,
}

impl<A: TensorAllocator> TrackingAllocator<A> {
    /// Wraps `inner` with fresh counters.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Returns the wrapped allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            allocations: self.counters.allocations.load(Ordering::Relaxed),
            releases: self.counters.releases.load(Ordering::Relaxed),
            live_bytes: self.counters.live_bytes.load(Ordering::Relaxed),
            peak_bytes: self.counters.peak_bytes.load(Ordering::Relaxed),
        }
    }
}

// SAFETY: the returned storage aliases the region of a storage produced by `inner`, which
// upholds the trait contract; that inner storage is kept alive until the outer one is released.
unsafe impl<A: TensorAllocator> TensorAllocator for TrackingAllocator<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn allocate(&self, size: usize) -> Result<TensorStorage, TensorAllocatorError> {
        let mut storage = self.inner.allocate(size)?;
        let layout = storage.layout();
        let ptr = NonNull::new(storage.as_mut_ptr()).ok_or(TensorAllocatorError::OutOfMemory { size })?;

        self.counters.record_allocation(layout.size());
        let counters = Arc::clone(&self.counters);
        let release: ReleaseFn = Box::new(move |_, layout| {
            drop(storage);
            counters.record_release(layout.size());
        });

        // SAFETY: ptr and layout describe the region owned by `storage`, which the release
        // action owns and drops exactly once
        Ok(unsafe { TensorStorage::from_raw_parts(ptr, layout, release) })
    }
}
