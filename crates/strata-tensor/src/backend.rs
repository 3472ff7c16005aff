//! Backend abstraction for buffer operations.
//!
//! A [`Backend`] implements the mutating operations of a [`Tensor`] for one
//! `(device, dtype)` combination. Backends are looked up through a
//! [`Dispatcher`](crate::Dispatcher) at call time, so new memory kinds (pinned, pooled,
//! accelerator) plug in without changes to the buffer type.

use std::sync::Arc;

use crate::{
    allocator::{CpuAllocator, TensorAllocator},
    device::Device,
    dtype::DataType,
    layout,
    storage::TensorStorage,
    tensor::{Tensor, TensorError},
    view::BoundedView,
};

/// Backend trait defining the buffer operations.
///
/// The [`Tensor`] methods of the same names validate caller preconditions, resolve the backend
/// and forward here. Implementations must leave the buffer untouched when they return an error,
/// and must keep its capacity at least as large as the bytes its shape requires.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: a single backend instance serves every buffer
/// registered under its key, from any thread.
pub trait Backend: Send + Sync + 'static {
    /// Returns a short name identifying the backend in logs.
    fn name(&self) -> &str;

    /// Returns the device this backend serves.
    fn device(&self) -> Device;

    /// Produces the initial, empty storage of a new buffer of `dtype`.
    fn create(&self, dtype: DataType) -> Result<TensorStorage, TensorError>;

    /// Copies `src` into the start of the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::DtypeMismatch`] if `dtype` is not the buffer's dtype and
    /// [`TensorError::SizeMismatch`] if `src` exceeds the capacity.
    fn copy_(&self, tensor: &mut Tensor, dtype: DataType, src: &[u8]) -> Result<(), TensorError>;

    /// Sets a new shape, growing the storage if needed.
    ///
    /// `sizes` and `strides` have the same length.
    fn resize_(
        &self,
        tensor: &mut Tensor,
        sizes: BoundedView<'_, usize>,
        strides: BoundedView<'_, usize>,
        keep_data: bool,
    ) -> Result<(), TensorError>;

    /// Ensures the capacity can hold `sizes`, leaving the shape and contents unchanged.
    fn reserve_(&self, tensor: &mut Tensor, sizes: BoundedView<'_, usize>) -> Result<(), TensorError>;

    /// Grows the outermost dimension by `num`, reallocating geometrically by `growth_pct`.
    fn extend_(&self, tensor: &mut Tensor, num: usize, growth_pct: f64) -> Result<(), TensorError>;
}

/// CPU backend implementation.
///
/// Storage comes from a [`TensorAllocator`], by default a [`CpuAllocator`]. All operations
/// are synchronous.
#[derive(Clone)]
pub struct CpuBackend {
    allocator: Arc<dyn TensorAllocator>,
}

impl CpuBackend {
    /// Creates a CPU backend over the default host allocator.
    pub fn new() -> Self {
        Self::with_allocator(Arc::new(CpuAllocator::default()))
    }

    /// Creates a CPU backend that takes its memory from `allocator`.
    pub fn with_allocator(allocator: Arc<dyn TensorAllocator>) -> Self {
        Self { allocator }
    }

    /// Returns the allocator backing this backend.
    pub fn allocator(&self) -> &Arc<dyn TensorAllocator> {
        &self.allocator
    }

    /// Moves the buffer into a new allocation of `new_capacity` bytes, carrying over its first
    /// `keep_bytes` bytes.
    fn grow(
        &self,
        tensor: &mut Tensor,
        new_capacity: usize,
        keep_bytes: usize,
    ) -> Result<(), TensorError> {
        let old_capacity = tensor.capacity();
        let mut storage = self.allocator.allocate(new_capacity)?;
        let keep_bytes = keep_bytes.min(old_capacity).min(new_capacity);
        storage.as_mut_slice()[..keep_bytes]
            .copy_from_slice(&tensor.storage().as_slice()[..keep_bytes]);

        log::debug!(
            "{}: reallocated {} buffer from {old_capacity} to {new_capacity} bytes ({keep_bytes} kept)",
            self.allocator.name(),
            tensor.dtype(),
        );
        // the old allocation is released here
        drop(tensor.replace_storage(storage));
        Ok(())
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuBackend")
            .field("allocator", &self.allocator.name())
            .finish()
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn create(&self, _dtype: DataType) -> Result<TensorStorage, TensorError> {
        Ok(self.allocator.allocate(0)?)
    }

    fn copy_(&self, tensor: &mut Tensor, dtype: DataType, src: &[u8]) -> Result<(), TensorError> {
        if dtype != tensor.dtype() {
            return Err(TensorError::dtype_mismatch(tensor.dtype(), dtype));
        }
        if src.len() > tensor.capacity() {
            return Err(TensorError::size_mismatch(tensor.capacity(), src.len()));
        }
        tensor.as_capacity_bytes_mut()[..src.len()].copy_from_slice(src);
        Ok(())
    }

    fn resize_(
        &self,
        tensor: &mut Tensor,
        sizes: BoundedView<'_, usize>,
        strides: BoundedView<'_, usize>,
        keep_data: bool,
    ) -> Result<(), TensorError> {
        let required = layout::required_bytes(tensor.dtype(), sizes, strides)?;
        if required > tensor.capacity() {
            let keep_bytes = if keep_data { tensor.capacity() } else { 0 };
            self.grow(tensor, required, keep_bytes)?;
        }
        tensor.set_geometry(sizes.to_vec(), strides.to_vec());
        Ok(())
    }

    fn reserve_(&self, tensor: &mut Tensor, sizes: BoundedView<'_, usize>) -> Result<(), TensorError> {
        let strides = if sizes.len() == tensor.dim() {
            tensor.strides().to_vec()
        } else {
            layout::contiguous_strides(sizes)
        };
        let required = layout::required_bytes(tensor.dtype(), sizes, BoundedView::from(&strides))?;
        if required > tensor.capacity() {
            self.grow(tensor, required, tensor.capacity())?;
        }
        Ok(())
    }

    fn extend_(&self, tensor: &mut Tensor, num: usize, growth_pct: f64) -> Result<(), TensorError> {
        let (sizes, strides) = if tensor.dim() == 0 {
            (vec![num], vec![1])
        } else {
            let mut sizes = tensor.sizes().to_vec();
            sizes[0] = sizes[0]
                .checked_add(num)
                .ok_or(TensorError::CapacityOverflow)?;
            (sizes, tensor.strides().to_vec())
        };

        let required = layout::required_bytes(
            tensor.dtype(),
            BoundedView::from(&sizes),
            BoundedView::from(&strides),
        )?;
        let capacity = tensor.capacity();
        let new_capacity = layout::grown_capacity(capacity, required, growth_pct);
        if new_capacity > capacity {
            self.grow(tensor, new_capacity, capacity)?;
        }
        tensor.set_geometry(sizes, strides);
        Ok(())
    }
}
