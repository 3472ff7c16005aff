#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! `strata-tensor` is the storage layer underneath a tensor library: it owns raw memory, tracks a
//! typed, strided shape on top of it and grows it on demand. It does no arithmetic on elements.
//!
//! # Architecture
//!
//! - **TensorAllocator**: hands out owned memory regions whose release action runs exactly once
//! - **TensorStorage**: the move-only handle over one region
//! - **BoundedView**: a borrowed, bounds-checked window used to pass sizes and strides around
//! - **Tensor**: the buffer itself, with dtype, sizes, strides and capacity
//! - **Backend** / **Dispatcher**: the operations of a buffer, routed at runtime by
//!   `(device, dtype)` so new memory kinds plug in without touching [`Tensor`]
//!
//! # Quick Start
//!
//! ```rust
//! use strata_tensor::{BoundedView, DataType, Tensor, TensorError};
//!
//! let mut t = Tensor::new(DataType::U8)?;
//!
//! // a 2x3 row-major shape
//! t.resize_([2, 3].as_slice().into(), [3, 1].as_slice().into(), false)?;
//! t.copy_(DataType::U8, &[1, 2, 3, 4, 5, 6])?;
//!
//! // append a row; capacity grows by at least 50%
//! t.extend_(1, 0.5)?;
//! assert_eq!(t.sizes(), BoundedView::from(&[3, 3]));
//! assert_eq!(&t.as_bytes()[..6], &[1, 2, 3, 4, 5, 6]);
//! assert!(t.capacity() >= t.nbytes());
//! # Ok::<(), TensorError>(())
//! ```
//!
//! Plugging in an instrumented allocator:
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_tensor::{CpuAllocator, CpuBackend, DataType, Device, Dispatcher, TrackingAllocator};
//!
//! let allocator = TrackingAllocator::new(CpuAllocator::default());
//! let dispatcher = Arc::new(Dispatcher::new());
//! dispatcher.register_backend(Arc::new(CpuBackend::with_allocator(Arc::new(allocator.clone()))));
//!
//! let mut t = dispatcher.tensor(Device::Cpu, DataType::F32)?;
//! for _ in 0..100 {
//!     t.extend_(1, 1.0)?;
//! }
//! assert!(allocator.stats().allocations < 10);
//! # Ok::<(), strata_tensor::TensorError>(())
//! ```

/// Allocator module containing memory management utilities.
///
/// This module provides the [`TensorAllocator`] trait, the host [`CpuAllocator`] and the
/// instrumented [`TrackingAllocator`].
pub mod allocator;

/// backend module containing the buffer operation abstraction.
pub mod backend;

/// Device module containing device abstraction.
pub mod device;

/// Dispatch module routing operations to backends by device and dtype.
pub mod dispatch;

/// Element type tags and the typed element trait.
pub mod dtype;

/// Shape arithmetic: strides, byte requirements and capacity growth.
pub mod layout;

/// Storage module containing the owned memory handle.
///
/// This module provides [`storage::TensorStorage`], which frees its region exactly once.
pub mod storage;

/// Tensor module containing the buffer type and error types.
pub mod tensor;

/// View module containing the non-owning bounded view.
pub mod view;

pub use crate::allocator::{
    AllocatorStats, CpuAllocator, TensorAllocator, TensorAllocatorError, TrackingAllocator,
    DEFAULT_ALIGNMENT,
};
pub use crate::backend::{Backend, CpuBackend};
pub use crate::device::Device;
pub use crate::dispatch::{dispatcher, DispatchKey, Dispatcher};
pub use crate::dtype::{DataType, Element};
pub use crate::storage::TensorStorage;
pub use crate::tensor::{Tensor, TensorError};
pub use crate::view::BoundedView;
