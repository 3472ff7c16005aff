//! Byte-requirement and capacity-growth arithmetic shared by all backends.
//!
//! Every function here is pure; backends call them to decide whether, and by how much, a
//! buffer must be reallocated.

use crate::{dtype::DataType, tensor::TensorError, view::BoundedView};

/// Computes the strides for a row-major (C-contiguous) layout.
///
/// The rightmost dimension has stride 1 and each other dimension's stride is the product of all
/// extents to its right.
///
/// # Examples
///
/// ```rust
/// use strata_tensor::layout::contiguous_strides;
///
/// assert_eq!(contiguous_strides([2, 3, 4].as_slice().into()), vec![12, 4, 1]);
/// ```
pub fn contiguous_strides(sizes: BoundedView<'_, usize>) -> Vec<usize> {
    let mut strides = vec![0; sizes.len()];
    let mut stride = 1usize;
    for i in (0..sizes.len()).rev() {
        strides[i] = stride;
        stride = stride.saturating_mul(sizes[i]);
    }
    strides
}

/// Returns the number of elements described by `sizes`, or `None` on overflow.
///
/// A zero-dimensional shape describes an empty buffer, not a scalar; scalars use `[1]`.
pub fn numel(sizes: BoundedView<'_, usize>) -> Option<usize> {
    if sizes.is_empty() {
        return Some(0);
    }
    sizes.iter().try_fold(1usize, |acc, &size| acc.checked_mul(size))
}

/// Returns the number of elements between the first and one past the last addressable
/// element of a strided shape, or `None` on overflow.
///
/// The span is zero if the shape has no dimensions or any extent is zero.
///
/// # Panics
///
/// Panics if `sizes` and `strides` have different lengths.
pub fn storage_span(sizes: BoundedView<'_, usize>, strides: BoundedView<'_, usize>) -> Option<usize> {
    assert_eq!(
        sizes.len(),
        strides.len(),
        "a shape needs one stride per dimension"
    );
    if sizes.is_empty() || sizes.iter().any(|&size| size == 0) {
        return Some(0);
    }
    sizes
        .iter()
        .zip(strides.iter())
        .try_fold(1usize, |acc, (&size, &stride)| {
            (size - 1).checked_mul(stride).and_then(|step| acc.checked_add(step))
        })
}

/// Returns true if `strides` are the row-major strides of `sizes`.
///
/// Dimensions of extent 1 may carry any stride.
pub fn is_contiguous(sizes: BoundedView<'_, usize>, strides: BoundedView<'_, usize>) -> bool {
    if sizes.len() != strides.len() {
        return false;
    }
    let mut expected = 1usize;
    for (&size, &stride) in sizes.iter().zip(strides.iter()).rev() {
        if size != 1 && stride != expected {
            return false;
        }
        expected = expected.saturating_mul(size);
    }
    true
}

/// Returns the number of bytes a buffer of `dtype` needs to hold `sizes` laid out with
/// `strides`.
///
/// This is `dtype.size_of() * max(numel, span)`, which equals `dtype.size_of() * numel` for
/// contiguous layouts and keeps every addressable element in bounds for padded ones.
///
/// # Panics
///
/// Panics if `sizes` and `strides` have different lengths.
///
/// # Errors
///
/// Returns [`TensorError::CapacityOverflow`] if the requirement does not fit in `usize`.
pub fn required_bytes(
    dtype: DataType,
    sizes: BoundedView<'_, usize>,
    strides: BoundedView<'_, usize>,
) -> Result<usize, TensorError> {
    let count = numel(sizes).ok_or(TensorError::CapacityOverflow)?;
    let span = storage_span(sizes, strides).ok_or(TensorError::CapacityOverflow)?;
    count
        .max(span)
        .checked_mul(dtype.size_of())
        .ok_or(TensorError::CapacityOverflow)
}

/// Returns the capacity to allocate when `required` bytes no longer fit in `current`.
///
/// Growth is amortized: the result is `max(ceil(current * (1 + growth_pct)), required)`, so a
/// sequence of small extensions reallocates a logarithmic number of times. `growth_pct` is a
/// fraction: `0.5` grows by 50%, `0.0` grows to exactly `required`. If `required` already fits,
/// `current` is returned unchanged.
///
/// # Panics
///
/// Panics if `growth_pct` is negative or not finite.
pub fn grown_capacity(current: usize, required: usize, growth_pct: f64) -> usize {
    assert!(
        growth_pct.is_finite() && growth_pct >= 0.0,
        "growth_pct must be a finite fraction >= 0, got {growth_pct}"
    );
    if required <= current {
        return current;
    }
    // float to int casts saturate
    let geometric = (current as f64 * (1.0 + growth_pct)).ceil() as usize;
    geometric.max(required)
}
