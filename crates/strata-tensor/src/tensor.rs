use std::sync::Arc;

use thiserror::Error;

use crate::{
    allocator::TensorAllocatorError,
    backend::Backend,
    device::Device,
    dispatch::{dispatcher, Dispatcher},
    dtype::{DataType, Element},
    layout,
    storage::TensorStorage,
    view::BoundedView,
};

/// Error type for tensor buffer operations.
///
/// These are the recoverable failures: conditions a correct caller can still run into at
/// runtime. Caller bugs such as mismatched sizes/strides lengths panic instead.
#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    /// The dtype passed to an operation differs from the buffer's dtype.
    ///
    /// A buffer's dtype is fixed at creation; `copy_` never retypes it.
    #[error("Dtype mismatch: buffer holds {expected} but the operation was given {actual}")]
    DtypeMismatch {
        /// The dtype of the buffer.
        expected: DataType,
        /// The dtype requested by the caller.
        actual: DataType,
    },

    /// A copy would write past the end of the buffer's allocation.
    #[error("Size mismatch: cannot copy {requested} bytes into a buffer with capacity {capacity}")]
    SizeMismatch {
        /// The capacity of the buffer in bytes.
        capacity: usize,
        /// The number of bytes the caller tried to copy.
        requested: usize,
    },

    /// Underlying allocation failed.
    ///
    /// This wraps errors from the [`TensorAllocator`](crate::TensorAllocator) that backs the
    /// buffer, most commonly out-of-memory conditions.
    #[error("Storage error: {0}")]
    StorageError(#[from] TensorAllocatorError),

    /// The byte size implied by a shape does not fit in `usize`.
    #[error("Capacity overflow: the requested shape needs more than usize::MAX bytes")]
    CapacityOverflow,

    /// No backend is registered for the buffer's device and dtype.
    #[error("No backend registered for device {device} and dtype {dtype}")]
    NoBackend {
        /// The device half of the dispatch key.
        device: Device,
        /// The dtype half of the dispatch key.
        dtype: DataType,
    },
}

impl TensorError {
    /// Creates a DtypeMismatch error.
    pub fn dtype_mismatch(expected: DataType, actual: DataType) -> Self {
        Self::DtypeMismatch { expected, actual }
    }

    /// Creates a SizeMismatch error.
    pub fn size_mismatch(capacity: usize, requested: usize) -> Self {
        Self::SizeMismatch {
            capacity,
            requested,
        }
    }

    /// Returns true if this error is recoverable by freeing memory.
    pub fn is_out_of_memory(&self) -> bool {
        match self {
            Self::StorageError(e) => e.is_out_of_memory(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a programming error.
    pub fn is_programming_error(&self) -> bool {
        match self {
            Self::NoBackend { .. } => true,
            Self::DtypeMismatch { .. } | Self::SizeMismatch { .. } | Self::CapacityOverflow => {
                false
            }
            Self::StorageError(e) => e.is_programming_error(),
        }
    }

    /// Returns a user-friendly suggestion for resolving the error.
    pub fn suggestion(&self) -> &str {
        match self {
            Self::DtypeMismatch { .. } => "Pass the dtype the buffer was created with",
            Self::SizeMismatch { .. } => {
                "Grow the buffer with resize_, reserve_ or extend_ before copying"
            }
            Self::StorageError(e) => e.suggestion(),
            Self::CapacityOverflow => "Reduce the extents of the requested shape",
            Self::NoBackend { .. } => {
                "Register a backend for this device and dtype in the dispatcher"
            }
        }
    }
}

/// A typed, strided, growable tensor buffer.
///
/// `Tensor` owns exactly one [`TensorStorage`] and tracks the logical shape on top of it:
///
/// * **dtype** - the element type, fixed at creation
/// * **sizes** - the extent of each dimension
/// * **strides** - the step, in elements, between neighbours along each dimension
/// * **capacity** - the bytes physically allocated, always at least [`nbytes`](Self::nbytes)
///
/// Mutating operations (`copy_`, `resize_`, `reserve_`, `extend_`) are forwarded to the
/// [`Backend`] that the buffer's [`Dispatcher`] resolves for its `(device, dtype)` key at call
/// time, so new backends plug in without touching this type.
///
/// A `Tensor` is not `Clone`: moving it moves its allocation, and no two buffers ever share one.
/// Concurrent mutation of one buffer is ruled out by `&mut self`; independent buffers may be
/// used from different threads.
///
/// # Examples
///
/// ```rust
/// use strata_tensor::{DataType, Tensor, TensorError};
///
/// let mut t = Tensor::new(DataType::F32)?;
/// assert_eq!(t.capacity(), 0);
///
/// t.extend_(10, 0.5)?;
/// assert_eq!(t.sizes().as_slice(), &[10]);
/// assert_eq!(t.capacity(), 40);
///
/// t.copy_from_slice(&[1.0f32, 2.0, 3.0])?;
/// assert_eq!(&t.as_slice::<f32>()?[..3], &[1.0, 2.0, 3.0]);
/// # Ok::<(), TensorError>(())
/// ```
pub struct Tensor {
    dtype: DataType,
    device: Device,
    sizes: Vec<usize>,
    strides: Vec<usize>,
    storage: TensorStorage,
    dispatcher: Arc<Dispatcher>,
}

impl Tensor {
    /// Creates an empty host buffer of `dtype` through the default dispatcher.
    ///
    /// The buffer has zero-length sizes and strides and zero capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is registered for `(Device::Cpu, dtype)` or the backend
    /// fails to produce the initial storage.
    pub fn new(dtype: DataType) -> Result<Self, TensorError> {
        dispatcher().tensor(Device::Cpu, dtype)
    }

    pub(crate) fn from_parts(
        dispatcher: Arc<Dispatcher>,
        device: Device,
        dtype: DataType,
        storage: TensorStorage,
    ) -> Self {
        Self {
            dtype,
            device,
            sizes: Vec::new(),
            strides: Vec::new(),
            storage,
            dispatcher,
        }
    }

    /// Returns the element type of the buffer.
    #[inline]
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Returns the device the buffer lives on.
    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    /// Returns the dispatcher the buffer routes its operations through.
    #[inline]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Returns the extent of each dimension.
    #[inline]
    pub fn sizes(&self) -> BoundedView<'_, usize> {
        BoundedView::from(&self.sizes)
    }

    /// Returns the stride, in elements, of each dimension.
    #[inline]
    pub fn strides(&self) -> BoundedView<'_, usize> {
        BoundedView::from(&self.strides)
    }

    /// Returns the number of dimensions.
    #[inline]
    pub fn dim(&self) -> usize {
        self.sizes.len()
    }

    /// Returns the number of logical elements.
    ///
    /// A buffer without dimensions has no elements.
    pub fn numel(&self) -> usize {
        // bounded by capacity / size_of, so it cannot overflow
        layout::numel(self.sizes()).unwrap_or(usize::MAX)
    }

    /// Returns the number of bytes the logical shape occupies.
    pub fn nbytes(&self) -> usize {
        layout::required_bytes(self.dtype, self.sizes(), self.strides()).unwrap_or(usize::MAX)
    }

    /// Returns the number of bytes physically allocated.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns true if the strides are the row-major strides of the sizes.
    pub fn is_contiguous(&self) -> bool {
        layout::is_contiguous(self.sizes(), self.strides())
    }

    /// Returns the bytes covered by the logical shape.
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage.as_slice()[..self.nbytes()]
    }

    /// Returns the logical bytes mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let nbytes = self.nbytes();
        &mut self.storage.as_mut_slice()[..nbytes]
    }

    /// Returns every allocated byte, including capacity beyond the logical shape.
    pub fn as_capacity_bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Returns every allocated byte mutably. Intended for [`Backend`] implementations that
    /// write past the logical shape.
    pub fn as_capacity_bytes_mut(&mut self) -> &mut [u8] {
        self.storage.as_mut_slice()
    }

    /// Returns the logical contents as a typed slice.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::DtypeMismatch`] if `T` does not match the buffer's dtype.
    pub fn as_slice<T: Element>(&self) -> Result<&[T], TensorError> {
        let len = self.check_element::<T>()?;
        // SAFETY: the storage is aligned for T and holds at least nbytes initialized bytes
        // (both checked above), and any bit pattern is a valid Element
        Ok(unsafe { std::slice::from_raw_parts(self.storage.as_ptr() as *const T, len) })
    }

    /// Returns the logical contents as a mutable typed slice.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::DtypeMismatch`] if `T` does not match the buffer's dtype.
    pub fn as_slice_mut<T: Element>(&mut self) -> Result<&mut [T], TensorError> {
        let len = self.check_element::<T>()?;
        // SAFETY: as in as_slice, and &mut self guarantees exclusive access
        Ok(unsafe { std::slice::from_raw_parts_mut(self.storage.as_mut_ptr() as *mut T, len) })
    }

    /// Checks that the storage can be viewed as `T` and returns the element count.
    fn check_element<T: Element>(&self) -> Result<usize, TensorError> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::dtype_mismatch(self.dtype, T::DTYPE));
        }
        assert!(
            self.storage.as_ptr() as usize % std::mem::align_of::<T>() == 0,
            "storage produced by the {} backend is not aligned for {}",
            self.device,
            self.dtype
        );
        let nbytes = self.nbytes();
        assert!(
            nbytes <= self.capacity(),
            "shape needs {nbytes} bytes but only {} are allocated",
            self.capacity()
        );
        Ok(nbytes / std::mem::size_of::<T>())
    }

    /// Overwrites the first `src.len()` bytes of the buffer with `src`.
    ///
    /// Sizes and strides are left unchanged.
    ///
    /// # Errors
    ///
    /// - [`TensorError::DtypeMismatch`] if `dtype` is not the buffer's dtype
    /// - [`TensorError::SizeMismatch`] if `src` is longer than the capacity
    ///
    /// On error the buffer is not modified.
    pub fn copy_(&mut self, dtype: DataType, src: &[u8]) -> Result<(), TensorError> {
        self.backend()?.copy_(self, dtype, src)
    }

    /// Typed form of [`copy_`](Self::copy_).
    pub fn copy_from_slice<T: Element>(&mut self, src: &[T]) -> Result<(), TensorError> {
        // SAFETY: Element types are plain scalars without padding
        let bytes = unsafe {
            std::slice::from_raw_parts(src.as_ptr() as *const u8, std::mem::size_of_val(src))
        };
        self.copy_(T::DTYPE, bytes)
    }

    /// Replaces the shape of the buffer, growing the allocation if the new shape needs more
    /// bytes than the current capacity.
    ///
    /// With `keep_data` the bytes of the old allocation are preserved at their offsets when a
    /// reallocation happens; without it the grown allocation is freshly zeroed. The capacity
    /// never shrinks.
    ///
    /// # Panics
    ///
    /// Panics if `sizes` and `strides` have different lengths.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte requirement overflows or the allocation fails; the buffer
    /// is then left unchanged.
    pub fn resize_(
        &mut self,
        sizes: BoundedView<'_, usize>,
        strides: BoundedView<'_, usize>,
        keep_data: bool,
    ) -> Result<(), TensorError> {
        assert_eq!(
            sizes.len(),
            strides.len(),
            "resize_ requires one stride per dimension"
        );
        self.backend()?.resize_(self, sizes, strides, keep_data)
    }

    /// [`resize_`](Self::resize_) with row-major strides.
    pub fn resize_contiguous_(
        &mut self,
        sizes: BoundedView<'_, usize>,
        keep_data: bool,
    ) -> Result<(), TensorError> {
        let strides = layout::contiguous_strides(sizes);
        self.resize_(sizes, BoundedView::from(&strides), keep_data)
    }

    /// Grows the capacity to hold `sizes` at the current dtype and strides, preserving the
    /// contents and leaving the logical shape untouched.
    ///
    /// If `sizes` has a different rank than the buffer, row-major strides are assumed for it.
    /// Does nothing if the capacity already suffices.
    pub fn reserve_(&mut self, sizes: BoundedView<'_, usize>) -> Result<(), TensorError> {
        self.backend()?.reserve_(self, sizes)
    }

    /// Grows the outermost dimension by `num` elements.
    ///
    /// When the capacity runs out it grows to `max(capacity * (1 + growth_pct), required)`, so
    /// repeated extensions reallocate geometrically rather than linearly. `growth_pct` is a
    /// fraction: `0.5` means +50%. A buffer without dimensions becomes one-dimensional with
    /// `num` elements. Existing bytes are preserved.
    ///
    /// # Panics
    ///
    /// Panics if `growth_pct` is negative or not finite.
    pub fn extend_(&mut self, num: usize, growth_pct: f64) -> Result<(), TensorError> {
        assert!(
            growth_pct.is_finite() && growth_pct >= 0.0,
            "growth_pct must be a finite fraction >= 0, got {growth_pct}"
        );
        self.backend()?.extend_(self, num, growth_pct)
    }

    fn backend(&self) -> Result<Arc<dyn Backend>, TensorError> {
        self.dispatcher.resolve(self.device, self.dtype)
    }

    /// Returns the storage. Intended for [`Backend`] implementations.
    #[inline]
    pub fn storage(&self) -> &TensorStorage {
        &self.storage
    }

    /// Swaps in a new allocation and returns the old one. Intended for [`Backend`]
    /// implementations.
    ///
    /// # Panics
    ///
    /// Panics if the new storage is smaller than the bytes of the current logical shape.
    pub fn replace_storage(&mut self, storage: TensorStorage) -> TensorStorage {
        assert!(
            storage.len() >= self.nbytes(),
            "replacement storage of {} bytes cannot hold the current {} bytes",
            storage.len(),
            self.nbytes()
        );
        std::mem::replace(&mut self.storage, storage)
    }

    /// Sets the logical shape. Intended for [`Backend`] implementations, after making sure the
    /// storage is large enough.
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ or the shape needs more bytes than the capacity.
    pub fn set_geometry(&mut self, sizes: Vec<usize>, strides: Vec<usize>) {
        assert_eq!(
            sizes.len(),
            strides.len(),
            "a shape needs one stride per dimension"
        );
        let required = layout::required_bytes(
            self.dtype,
            BoundedView::from(&sizes),
            BoundedView::from(&strides),
        );
        assert!(
            required.as_ref().is_ok_and(|&bytes| bytes <= self.capacity()),
            "shape {sizes:?} with strides {strides:?} does not fit in {} bytes",
            self.capacity()
        );
        self.sizes = sizes;
        self.strides = strides;
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &self.dtype)
            .field("device", &self.device)
            .field("sizes", &self.sizes)
            .field("strides", &self.strides)
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{TensorAllocator, TrackingAllocator};
    use crate::backend::CpuBackend;
    use crate::CpuAllocator;

    fn tracked(dtype: DataType) -> Result<(Tensor, TrackingAllocator), TensorError> {
        let allocator = TrackingAllocator::new(CpuAllocator::default());
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.register_backend(Arc::new(CpuBackend::with_allocator(Arc::new(
            allocator.clone(),
        ))));
        let tensor = dispatcher.tensor(Device::Cpu, dtype)?;
        Ok((tensor, allocator))
    }

    #[test]
    fn create_empty() -> Result<(), TensorError> {
        let t = Tensor::new(DataType::F32)?;
        assert_eq!(t.dtype(), DataType::F32);
        assert_eq!(t.device(), Device::Cpu);
        assert_eq!(t.dim(), 0);
        assert!(t.sizes().is_empty());
        assert!(t.strides().is_empty());
        assert_eq!(t.capacity(), 0);
        assert_eq!(t.numel(), 0);
        assert_eq!(t.nbytes(), 0);
        assert!(t.as_bytes().is_empty());
        assert!(t.as_slice::<f32>()?.is_empty());
        Ok(())
    }

    #[test]
    fn copy_roundtrip() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::U8)?;
        t.resize_contiguous_([8].as_slice().into(), false)?;
        let src = [1u8, 2, 3, 4, 5];
        t.copy_(DataType::U8, &src)?;
        assert_eq!(&t.as_capacity_bytes()[..5], &src);
        assert_eq!(t.sizes().as_slice(), &[8]);
        Ok(())
    }

    #[test]
    fn copy_dtype_mismatch() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::F32)?;
        t.resize_contiguous_([4].as_slice().into(), false)?;
        let err = t.copy_(DataType::I32, &[0u8; 4]).unwrap_err();
        assert_eq!(err, TensorError::dtype_mismatch(DataType::F32, DataType::I32));
        assert!(!err.is_programming_error());
        assert!(t.as_bytes().iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn copy_size_mismatch_leaves_buffer_untouched() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::U8)?;
        t.resize_contiguous_([4].as_slice().into(), false)?;
        t.copy_(DataType::U8, &[9, 9, 9, 9])?;

        let err = t.copy_(DataType::U8, &[1u8; 5]).unwrap_err();
        assert_eq!(err, TensorError::size_mismatch(4, 5));
        assert_eq!(t.as_bytes(), &[9, 9, 9, 9]);
        assert_eq!(t.capacity(), 4);
        Ok(())
    }

    #[test]
    fn typed_access() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::I32)?;
        t.resize_contiguous_([2, 2].as_slice().into(), false)?;
        t.copy_from_slice(&[1i32, -2, 3, -4])?;
        assert_eq!(t.as_slice::<i32>()?, &[1, -2, 3, -4]);

        t.as_slice_mut::<i32>()?[1] = 20;
        assert_eq!(t.as_slice::<i32>()?, &[1, 20, 3, -4]);

        assert_eq!(
            t.as_slice::<f32>().unwrap_err(),
            TensorError::dtype_mismatch(DataType::I32, DataType::F32)
        );
        assert_eq!(
            t.copy_from_slice(&[1u8]).unwrap_err(),
            TensorError::dtype_mismatch(DataType::I32, DataType::U8)
        );
        Ok(())
    }

    #[test]
    fn resize_keeps_data() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::U8)?;
        t.resize_([2, 3].as_slice().into(), [3, 1].as_slice().into(), false)?;
        t.copy_(DataType::U8, &[1, 2, 3, 4, 5, 6])?;

        t.resize_([4, 3].as_slice().into(), [3, 1].as_slice().into(), true)?;
        assert_eq!(t.sizes().as_slice(), &[4, 3]);
        assert_eq!(t.capacity(), 12);
        assert_eq!(&t.as_bytes()[..6], &[1, 2, 3, 4, 5, 6]);
        Ok(())
    }

    #[test]
    fn resize_without_keep_data() -> Result<(), TensorError> {
        let (mut t, allocator) = tracked(DataType::U8)?;
        t.resize_contiguous_([4].as_slice().into(), false)?;
        t.copy_(DataType::U8, &[7, 7, 7, 7])?;

        t.resize_contiguous_([16].as_slice().into(), false)?;
        assert_eq!(t.capacity(), 16);
        // the grown allocation is fresh, nothing was copied into it
        assert!(t.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(allocator.stats().live_bytes, 16);
        Ok(())
    }

    #[test]
    fn resize_shrink_keeps_capacity() -> Result<(), TensorError> {
        let (mut t, allocator) = tracked(DataType::F64)?;
        t.resize_contiguous_([10].as_slice().into(), false)?;
        let allocations = allocator.stats().allocations;

        t.resize_contiguous_([2, 2].as_slice().into(), true)?;
        assert_eq!(t.capacity(), 80);
        assert_eq!(t.nbytes(), 32);
        assert_eq!(t.strides().as_slice(), &[2, 1]);
        assert_eq!(allocator.stats().allocations, allocations);
        Ok(())
    }

    #[test]
    fn resize_padded_strides() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::F32)?;
        t.resize_([2, 3].as_slice().into(), [4, 1].as_slice().into(), false)?;
        assert!(!t.is_contiguous());
        assert_eq!(t.numel(), 6);
        assert_eq!(t.nbytes(), 28);
        assert!(t.capacity() >= 28);
        Ok(())
    }

    #[test]
    #[should_panic(expected = "resize_ requires one stride per dimension")]
    fn resize_length_mismatch_panics() {
        let mut t = Tensor::new(DataType::F32).unwrap();
        let _ = t.resize_([2, 3].as_slice().into(), [1].as_slice().into(), true);
    }

    #[test]
    fn reserve_grows_capacity_only() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::I16)?;
        t.resize_contiguous_([2, 4].as_slice().into(), false)?;
        t.copy_from_slice(&[1i16, 2, 3, 4, 5, 6, 7, 8])?;

        t.reserve_([10, 4].as_slice().into())?;
        assert_eq!(t.capacity(), 80);
        assert_eq!(t.sizes().as_slice(), &[2, 4]);
        assert_eq!(t.strides().as_slice(), &[4, 1]);
        assert_eq!(t.as_slice::<i16>()?, &[1, 2, 3, 4, 5, 6, 7, 8]);

        // never shrinks
        t.reserve_([1, 4].as_slice().into())?;
        assert_eq!(t.capacity(), 80);
        Ok(())
    }

    #[test]
    fn reserve_with_other_rank() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::F32)?;
        t.reserve_([3, 5].as_slice().into())?;
        assert_eq!(t.capacity(), 60);
        assert_eq!(t.dim(), 0);
        Ok(())
    }

    #[test]
    fn extend_exact_fit() -> Result<(), TensorError> {
        let (mut t, allocator) = tracked(DataType::F32)?;
        t.extend_(10, 0.0)?;
        assert_eq!(t.sizes().as_slice(), &[10]);
        assert_eq!(t.strides().as_slice(), &[1]);
        assert_eq!(t.capacity(), 40);

        t.extend_(1, 0.0)?;
        assert_eq!(t.sizes().as_slice(), &[11]);
        assert_eq!(t.capacity(), 44);
        // initial empty storage + two growths
        assert_eq!(allocator.stats().allocations, 3);
        Ok(())
    }

    #[test]
    fn extend_outer_dimension() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::U8)?;
        t.resize_contiguous_([2, 3].as_slice().into(), false)?;
        t.copy_(DataType::U8, &[1, 2, 3, 4, 5, 6])?;

        t.extend_(2, 0.5)?;
        assert_eq!(t.sizes().as_slice(), &[4, 3]);
        assert_eq!(t.strides().as_slice(), &[3, 1]);
        assert_eq!(t.capacity(), 12);
        assert_eq!(&t.as_bytes()[..6], &[1, 2, 3, 4, 5, 6]);

        // 15 bytes needed, 12 * 1.5 = 18 allocated
        t.extend_(1, 0.5)?;
        assert_eq!(t.capacity(), 18);
        assert_eq!(t.nbytes(), 15);
        Ok(())
    }

    #[test]
    fn extend_zero_is_noop() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::U8)?;
        t.extend_(4, 1.0)?;
        t.extend_(0, 1.0)?;
        assert_eq!(t.sizes().as_slice(), &[4]);
        assert_eq!(t.capacity(), 4);
        Ok(())
    }

    #[test]
    #[should_panic(expected = "growth_pct")]
    fn extend_negative_growth_panics() {
        let mut t = Tensor::new(DataType::U8).unwrap();
        let _ = t.extend_(1, -1.0);
    }

    #[test]
    fn release_once_on_drop() -> Result<(), TensorError> {
        let (mut t, allocator) = tracked(DataType::F32)?;
        t.extend_(8, 0.0)?;
        t.extend_(8, 0.0)?;

        let moved = t;
        assert_eq!(moved.capacity(), 64);
        drop(moved);

        let stats = allocator.stats();
        assert_eq!(stats.allocations, stats.releases);
        assert_eq!(stats.live_bytes, 0);
        Ok(())
    }

    #[test]
    fn allocation_failure_leaves_buffer_untouched() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::U8)?;
        t.resize_contiguous_([4].as_slice().into(), false)?;
        t.copy_(DataType::U8, &[1, 2, 3, 4])?;

        let huge = usize::MAX / 2;
        let err = t.resize_contiguous_([huge].as_slice().into(), true).unwrap_err();
        assert!(matches!(err, TensorError::StorageError(_)));
        assert_eq!(t.sizes().as_slice(), &[4]);
        assert_eq!(t.as_bytes(), &[1, 2, 3, 4]);

        let err = t.reserve_([usize::MAX, 2].as_slice().into()).unwrap_err();
        assert_eq!(err, TensorError::CapacityOverflow);
        Ok(())
    }

    #[test]
    fn missing_backend() {
        let dispatcher = Arc::new(Dispatcher::new());
        let err = dispatcher.tensor(Device::Cpu, DataType::F32).unwrap_err();
        assert_eq!(
            err,
            TensorError::NoBackend {
                device: Device::Cpu,
                dtype: DataType::F32
            }
        );
        assert!(!err.suggestion().is_empty());
    }

    #[test]
    fn debug_format() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::F64)?;
        t.extend_(3, 0.0)?;
        let debug = format!("{t:?}");
        assert!(debug.contains("F64"));
        assert!(debug.contains("capacity: 24"));
        Ok(())
    }

    #[test]
    fn tensors_on_many_threads() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let mut t = Tensor::new(DataType::U32).unwrap();
                    for _ in 0..50 {
                        t.extend_(i + 1, 0.5).unwrap();
                    }
                    t.numel()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), 50 * (i + 1));
        }
    }

    #[test]
    #[should_panic(expected = "cannot hold the current 16 bytes")]
    fn replace_storage_rejects_smaller_storage() {
        let mut t = Tensor::new(DataType::F32).unwrap();
        t.extend_(4, 0.0).unwrap();
        // the only way to swap storage checks it against the logical shape
        t.replace_storage(TensorStorage::empty(64));
    }

    #[test]
    fn replace_storage_keeps_shape_in_bounds() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::F32)?;
        t.extend_(4, 0.0)?;
        let larger = CpuAllocator::default().allocate(32)?;
        let old = t.replace_storage(larger);
        assert_eq!(old.len(), 16);
        assert_eq!(t.capacity(), 32);
        assert_eq!(t.as_slice::<f32>()?.len(), 4);
        Ok(())
    }

    #[test]
    fn capacity_bytes_writes_stay_in_allocation() -> Result<(), TensorError> {
        let mut t = Tensor::new(DataType::U8)?;
        t.reserve_([6].as_slice().into())?;
        t.extend_(2, 0.0)?;
        t.as_capacity_bytes_mut()[5] = 42;
        assert_eq!(t.as_capacity_bytes(), &[0, 0, 0, 0, 0, 42]);
        assert_eq!(t.as_bytes(), &[0, 0]);
        Ok(())
    }

    #[test]
    fn error_classes() {
        assert!(!TensorError::size_mismatch(1, 2).is_programming_error());
        assert!(!TensorError::dtype_mismatch(DataType::U8, DataType::I8).is_programming_error());
        assert!(!TensorError::CapacityOverflow.is_programming_error());
        assert!(TensorError::NoBackend {
            device: Device::Cpu,
            dtype: DataType::U8
        }
        .is_programming_error());
    }

    #[test]
    fn tracked_allocator_name() {
        let allocator = TrackingAllocator::new(CpuAllocator::default());
        assert_eq!(allocator.name(), "cpu");
    }
}
