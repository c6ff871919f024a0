use core::fmt;

/// An integral type of a fixed bit width and signedness.
///
/// All arithmetic on values of an [IntType] is performed at its declared width. Bounds and
/// immediates are always stored in their canonical form, i.e. sign-extended for signed types and
/// zero-extended for unsigned types, so that the natural ordering of `i128` matches the ordering
/// of the type.
///
/// The overflow behavior of a type is determined by its signedness: unsigned arithmetic wraps,
/// while signed overflow is undefined.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntType {
    bits: u8,
    signed: bool,
}

impl IntType {
    /// The boolean type
    pub const I1: Self = Self::new(1, false);
    pub const I16: Self = Self::new(16, true);
    pub const I32: Self = Self::new(32, true);
    pub const I64: Self = Self::new(64, true);
    pub const I8: Self = Self::new(8, true);
    pub const U16: Self = Self::new(16, false);
    pub const U32: Self = Self::new(32, false);
    pub const U64: Self = Self::new(64, false);
    pub const U8: Self = Self::new(8, false);

    /// Create a new integral type of `bits` width
    ///
    /// # Panics
    ///
    /// Panics if `bits` is zero or greater than 64.
    pub const fn new(bits: u8, signed: bool) -> Self {
        assert!(bits >= 1 && bits <= 64, "integer types must be between 1 and 64 bits wide");
        Self { bits, signed }
    }

    #[inline(always)]
    pub const fn bits(&self) -> u32 {
        self.bits as u32
    }

    #[inline(always)]
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    #[inline(always)]
    pub const fn is_bool(&self) -> bool {
        self.bits == 1 && !self.signed
    }

    /// Returns true if arithmetic overflow on this type has defined, wrapping, semantics
    #[inline(always)]
    pub const fn overflow_wraps(&self) -> bool {
        !self.signed
    }

    /// Get the same-width type with the given signedness
    pub const fn with_signedness(self, signed: bool) -> Self {
        Self::new(self.bits, signed)
    }

    /// The smallest representable value of this type
    pub const fn min_value(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.bits - 1))
        } else {
            0
        }
    }

    /// The largest representable value of this type
    pub const fn max_value(&self) -> i128 {
        if self.signed {
            (1i128 << (self.bits - 1)) - 1
        } else {
            (1i128 << self.bits) - 1
        }
    }

    /// The number of distinct values of this type, i.e. `2^bits`
    #[inline]
    pub const fn modulus(&self) -> i128 {
        1i128 << self.bits
    }

    /// Returns true if `value` is representable in this type without loss
    #[inline]
    pub const fn contains(&self, value: i128) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }

    /// Returns true if every value of `self` is representable in `other`
    pub const fn fits_in(&self, other: &Self) -> bool {
        self.min_value() >= other.min_value() && self.max_value() <= other.max_value()
    }

    /// Reduce `value` modulo `2^bits` into the canonical representation of this type.
    ///
    /// This is the result of converting any integer to this type with two's complement
    /// truncation semantics.
    pub const fn wrap(&self, value: i128) -> i128 {
        let modulus = self.modulus();
        let mut reduced = value.rem_euclid(modulus);
        if self.signed && reduced > self.max_value() {
            reduced -= modulus;
        }
        reduced
    }

    /// A mask of all the value bits of this type
    #[inline]
    pub const fn mask(&self) -> u64 {
        if self.bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    /// Reinterpret the canonical `value` as its raw bit pattern
    #[inline]
    pub const fn to_bits(&self, value: i128) -> u64 {
        (value as u64) & self.mask()
    }

    /// Interpret a raw bit pattern as a canonical value of this type
    #[inline]
    pub const fn from_bits(&self, bits: u64) -> i128 {
        self.wrap((bits & self.mask()) as i128)
    }
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.signed || self.is_bool() {
            write!(f, "i{}", self.bits)
        } else {
            write!(f, "u{}", self.bits)
        }
    }
}

impl fmt::Debug for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The type of an SSA value
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int(IntType),
    F32,
    F64,
}

impl Type {
    pub const I1: Self = Self::Int(IntType::I1);
    pub const I16: Self = Self::Int(IntType::I16);
    pub const I32: Self = Self::Int(IntType::I32);
    pub const I64: Self = Self::Int(IntType::I64);
    pub const I8: Self = Self::Int(IntType::I8);
    pub const U16: Self = Self::Int(IntType::U16);
    pub const U32: Self = Self::Int(IntType::U32);
    pub const U64: Self = Self::Int(IntType::U64);
    pub const U8: Self = Self::Int(IntType::U8);

    #[inline]
    pub const fn as_int(&self) -> Option<IntType> {
        match self {
            Self::Int(ty) => Some(*ty),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    #[inline]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Int(ty) if ty.is_bool())
    }
}

impl From<IntType> for Type {
    #[inline]
    fn from(ty: IntType) -> Self {
        Self::Int(ty)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(ty) => fmt::Display::fmt(ty, f),
            Self::F32 => f.write_str("f32"),
            Self::F64 => f.write_str("f64"),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An integer constant of a specific type
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Immediate {
    value: i128,
    ty: IntType,
}

impl Immediate {
    /// Create a new immediate, converting `value` to `ty` with wrapping semantics
    pub const fn new(value: i128, ty: IntType) -> Self {
        Self {
            value: ty.wrap(value),
            ty,
        }
    }

    pub const fn bool(value: bool) -> Self {
        Self::new(value as i128, IntType::I1)
    }

    pub const fn i32(value: i32) -> Self {
        Self::new(value as i128, IntType::I32)
    }

    pub const fn u32(value: u32) -> Self {
        Self::new(value as i128, IntType::U32)
    }

    pub const fn i64(value: i64) -> Self {
        Self::new(value as i128, IntType::I64)
    }

    pub const fn u64(value: u64) -> Self {
        Self::new(value as i128, IntType::U64)
    }

    #[inline(always)]
    pub const fn value(&self) -> i128 {
        self.value
    }

    #[inline(always)]
    pub const fn ty(&self) -> IntType {
        self.ty
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Returns the value as a power-of-two exponent, if it is a positive power of two
    pub const fn log2(&self) -> Option<u32> {
        if self.value > 0 && (self.value & (self.value - 1)) == 0 {
            Some(self.value.trailing_zeros())
        } else {
            None
        }
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl fmt::Debug for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.value, self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_type_bounds() {
        assert_eq!(IntType::I8.min_value(), -128);
        assert_eq!(IntType::I8.max_value(), 127);
        assert_eq!(IntType::U8.max_value(), 255);
        assert_eq!(IntType::I1.max_value(), 1);
        assert_eq!(IntType::U64.max_value(), u64::MAX as i128);
        assert_eq!(IntType::I64.min_value(), i64::MIN as i128);
    }

    #[test]
    fn int_type_wrap() {
        assert_eq!(IntType::U8.wrap(256), 0);
        assert_eq!(IntType::U8.wrap(-1), 255);
        assert_eq!(IntType::I8.wrap(128), -128);
        assert_eq!(IntType::I8.wrap(-129), 127);
        assert_eq!(IntType::I32.wrap(i32::MAX as i128 + 1), i32::MIN as i128);
    }

    #[test]
    fn int_type_bits_roundtrip_negative() {
        let ty = IntType::I16;
        assert_eq!(ty.to_bits(-1), 0xffff);
        assert_eq!(ty.from_bits(0xffff), -1);
    }

    #[test]
    fn immediate_log2() {
        assert_eq!(Immediate::i32(8).log2(), Some(3));
        assert_eq!(Immediate::i32(1).log2(), Some(0));
        assert_eq!(Immediate::i32(6).log2(), None);
        assert_eq!(Immediate::i32(-8).log2(), None);
    }
}
