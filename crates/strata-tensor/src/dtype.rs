/// Element type tag of a tensor buffer.
///
/// The tag is fixed when a buffer is created and determines the byte width of every element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    /// Boolean stored as one byte.
    Bool,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 16-bit integer.
    I16,
    /// IEEE 754 half precision float.
    F16,
    /// Brain floating point (bfloat16).
    BF16,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 32-bit integer.
    I32,
    /// IEEE 754 single precision float.
    F32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 64-bit integer.
    I64,
    /// IEEE 754 double precision float.
    F64,
}

impl DataType {
    /// Every supported data type.
    pub const ALL: [DataType; 13] = [
        DataType::Bool,
        DataType::U8,
        DataType::I8,
        DataType::U16,
        DataType::I16,
        DataType::F16,
        DataType::BF16,
        DataType::U32,
        DataType::I32,
        DataType::F32,
        DataType::U64,
        DataType::I64,
        DataType::F64,
    ];

    /// Returns the size of one element in bytes.
    pub const fn size_of(self) -> usize {
        match self {
            DataType::Bool | DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 | DataType::F16 | DataType::BF16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    /// Returns the required alignment of one element in bytes.
    pub const fn alignment(self) -> usize {
        // every supported element is a naturally aligned scalar
        self.size_of()
    }

    /// Returns the short lowercase name of the data type.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::U8 => "u8",
            DataType::I8 => "i8",
            DataType::U16 => "u16",
            DataType::I16 => "i16",
            DataType::F16 => "f16",
            DataType::BF16 => "bf16",
            DataType::U32 => "u32",
            DataType::I32 => "i32",
            DataType::F32 => "f32",
            DataType::U64 => "u64",
            DataType::I64 => "i64",
            DataType::F64 => "f64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust primitive that can be read from and written to a tensor buffer.
///
/// This trait is sealed: every implementor is a plain scalar for which any bit pattern of the
/// right width is a valid value, so typed slices can be carved out of raw buffer bytes.
pub trait Element: private::Sealed + Copy + Send + Sync + 'static {
    /// The data type tag matching this Rust type.
    const DTYPE: DataType;
}

mod private {
    pub trait Sealed {}

    impl Sealed for u8 {}
    impl Sealed for i8 {}
    impl Sealed for u16 {}
    impl Sealed for i16 {}
    impl Sealed for u32 {}
    impl Sealed for i32 {}
    impl Sealed for f32 {}
    impl Sealed for u64 {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DataType = DataType::$dtype;
            }
        )*
    };
}

impl_element! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    u64 => U64,
    i64 => I64,
    f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_matches_rust_type() {
        assert_eq!(DataType::U8.size_of(), std::mem::size_of::<u8>());
        assert_eq!(DataType::I16.size_of(), std::mem::size_of::<i16>());
        assert_eq!(DataType::F32.size_of(), std::mem::size_of::<f32>());
        assert_eq!(DataType::I64.size_of(), std::mem::size_of::<i64>());
        assert_eq!(DataType::F64.size_of(), std::mem::size_of::<f64>());
        assert_eq!(DataType::BF16.size_of(), 2);
        assert_eq!(DataType::Bool.size_of(), 1);
    }

    #[test]
    fn test_element_tags() {
        assert_eq!(<f32 as Element>::DTYPE, DataType::F32);
        assert_eq!(<u8 as Element>::DTYPE, DataType::U8);
        assert_eq!(<i64 as Element>::DTYPE, DataType::I64);
        for dtype in DataType::ALL {
            assert!(dtype.alignment() <= crate::allocator::DEFAULT_ALIGNMENT);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", DataType::F16), "f16");
        assert_eq!(DataType::U64.to_string(), "u64");
    }
}
