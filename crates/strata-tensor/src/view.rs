/// A non-owning, bounds-checked window over a contiguous sequence.
///
/// `BoundedView` is a (pointer, length) pair borrowed from memory it does not own. It is used to
/// pass shape and stride descriptors to tensor operations without allocating. Copying a view
/// copies the pair, never the elements.
///
/// The lifetime `'a` ties the view to its source, so a view can never outlive the sequence it
/// points into.
///
/// # Fail-fast accessors
///
/// [`front`](Self::front), [`back`](Self::back), [`at`](Self::at), [`slice`](Self::slice) and
/// [`slice_from`](Self::slice_from) panic when their precondition does not hold. Those are caller
/// bugs, not runtime conditions; use [`get`](Self::get) for a fallible lookup.
///
/// # Examples
///
/// ```rust
/// use strata_tensor::BoundedView;
///
/// let sizes = [2usize, 3, 4];
/// let view = BoundedView::from(&sizes);
/// assert_eq!(view.len(), 3);
/// assert_eq!(*view.front(), 2);
/// assert_eq!(view.slice(1, 2).as_slice(), &[3, 4]);
/// ```
pub struct BoundedView<'a, T> {
    data: &'a [T],
}

impl<'a, T> BoundedView<'a, T> {
    /// Creates an empty view.
    #[inline]
    pub const fn empty() -> Self {
        Self { data: &[] }
    }

    /// Creates a view over a single element.
    #[inline]
    pub fn from_ref(element: &'a T) -> Self {
        Self {
            data: std::slice::from_ref(element),
        }
    }

    /// Creates a view from a pointer and a length.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` is valid for reads of `len` elements, properly aligned,
    /// and that the memory is not mutated for the lifetime `'a`. A null `ptr` is only allowed
    /// when `len` is zero.
    #[inline]
    pub unsafe fn from_raw_parts(ptr: *const T, len: usize) -> Self {
        if len == 0 {
            return Self::empty();
        }
        Self {
            data: std::slice::from_raw_parts(ptr, len),
        }
    }

    /// Creates a view from a `[begin, end)` pointer range.
    ///
    /// # Safety
    ///
    /// Both pointers must be derived from the same allocation with `begin <= end`, and the range
    /// must satisfy the requirements of [`from_raw_parts`](Self::from_raw_parts).
    #[inline]
    pub unsafe fn from_ptr_range(begin: *const T, end: *const T) -> Self {
        let len = end.offset_from(begin);
        assert!(len >= 0, "invalid pointer range: end precedes begin");
        Self::from_raw_parts(begin, len as usize)
    }

    /// Returns the number of elements in the view.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the view has no elements.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a pointer to the first element.
    #[inline]
    pub const fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    /// Returns the viewed elements as a slice with the source lifetime.
    #[inline]
    pub const fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns an iterator over the elements.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'a, T> {
        self.data.iter()
    }

    /// Returns the first element.
    ///
    /// # Panics
    ///
    /// Panics if the view is empty.
    #[inline]
    pub fn front(&self) -> &'a T {
        match self.data.first() {
            Some(element) => element,
            None => panic!("front() called on an empty view"),
        }
    }

    /// Returns the last element.
    ///
    /// # Panics
    ///
    /// Panics if the view is empty.
    #[inline]
    pub fn back(&self) -> &'a T {
        match self.data.last() {
            Some(element) => element,
            None => panic!("back() called on an empty view"),
        }
    }

    /// Returns the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[inline]
    pub fn at(&self, index: usize) -> &'a T {
        assert!(
            index < self.len(),
            "index {index} out of range for view of length {}",
            self.len()
        );
        &self.data[index]
    }

    /// Returns the element at `index`, or `None` if it is out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&'a T> {
        self.data.get(index)
    }

    /// Returns a view of `len` elements starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + len` exceeds the length of the view.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let end = offset.checked_add(len);
        assert!(
            end.is_some_and(|end| end <= self.len()),
            "invalid slice: offset {offset} + length {len} exceeds view of length {}",
            self.len()
        );
        Self {
            data: &self.data[offset..offset + len],
        }
    }

    /// Returns the view without its first `offset` elements.
    ///
    /// # Panics
    ///
    /// Panics if `offset` exceeds the length of the view.
    pub fn slice_from(&self, offset: usize) -> Self {
        assert!(
            offset <= self.len(),
            "invalid slice: offset {offset} exceeds view of length {}",
            self.len()
        );
        self.slice(offset, self.len() - offset)
    }

    /// Returns true if both views have the same length and equal elements.
    pub fn equals(&self, other: BoundedView<'_, T>) -> bool
    where
        T: PartialEq,
    {
        self.data == other.data
    }

    /// Copies the viewed elements into a new vector.
    ///
    /// This is the expensive operation of the view: it allocates and clones every element.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.data.to_vec()
    }
}

impl<T> Clone for BoundedView<'_, T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BoundedView<'_, T> {}

impl<T> Default for BoundedView<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for BoundedView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.data.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for BoundedView<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(*other)
    }
}

impl<T: Eq> Eq for BoundedView<'_, T> {}

impl<T> std::ops::Index<usize> for BoundedView<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        self.at(index)
    }
}

impl<'a, T> IntoIterator for BoundedView<'a, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl<'a, T> From<&'a [T]> for BoundedView<'a, T> {
    #[inline]
    fn from(data: &'a [T]) -> Self {
        Self { data }
    }
}

impl<'a, T, const N: usize> From<&'a [T; N]> for BoundedView<'a, T> {
    #[inline]
    fn from(data: &'a [T; N]) -> Self {
        Self {
            data: data.as_slice(),
        }
    }
}

impl<'a, T> From<&'a Vec<T>> for BoundedView<'a, T> {
    #[inline]
    fn from(data: &'a Vec<T>) -> Self {
        Self {
            data: data.as_slice(),
        }
    }
}

impl<T: Clone> From<BoundedView<'_, T>> for Vec<T> {
    fn from(view: BoundedView<'_, T>) -> Self {
        view.to_vec()
    }
}
