//! Fixed-width bit cell values held by register files.
//!
//! A `Value` is a bit pattern of a declared width between 1 and 64 bits.
//! Signed, unsigned and single-precision views are explicit conversions;
//! nothing reinterprets a cell implicitly. Binary operations require both
//! operands to have the same width and fail with `DataError::WidthMismatch`
//! otherwise.

use crate::DataError;
use bitvec::prelude::*;
use core::fmt;
use core::ops::Range;

#[inline(always)]
fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// A width-tagged bit pattern.
///
/// Invariant: bits above `width` are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value {
    bits: u64,
    width: u32,
}

impl Value {
    /// All-zero value of the given width.
    ///
    /// # Panics
    ///
    /// Panics if `width` is not in `1..=64`.
    pub fn zero(width: u32) -> Self {
        assert!((1..=64).contains(&width), "cell width must be 1..=64");
        Self { bits: 0, width }
    }

    /// Builds a value from a raw bit pattern, rejecting patterns wider than `width`.
    pub fn from_unsigned(raw: u64, width: u32) -> Result<Self, DataError> {
        let cell = Self::zero(width);
        if raw & !mask(width) != 0 {
            return Err(DataError::ValueOutOfRange {
                value: raw as i128,
                width,
            });
        }
        Ok(Self { bits: raw, ..cell })
    }

    /// Builds the two's-complement encoding of `v`, rejecting values that do
    /// not fit in `width` signed bits.
    pub fn from_signed(v: i64, width: u32) -> Result<Self, DataError> {
        let cell = Self::zero(width);
        if width < 64 {
            let min = -(1i64 << (width - 1));
            let max = (1i64 << (width - 1)) - 1;
            if v < min || v > max {
                return Err(DataError::ValueOutOfRange {
                    value: v as i128,
                    width,
                });
            }
        }
        Ok(Self {
            bits: (v as u64) & mask(width),
            ..cell
        })
    }

    /// 32-bit value from a raw word.
    pub fn word(raw: u32) -> Self {
        Self {
            bits: raw as u64,
            width: 32,
        }
    }

    /// 32-bit two's-complement value.
    pub fn from_i32(v: i32) -> Self {
        Self::word(v as u32)
    }

    /// 32-bit value holding the IEEE-754 encoding of `v`.
    pub fn from_f32(v: f32) -> Self {
        Self::word(v.to_bits())
    }

    pub fn byte(raw: u8) -> Self {
        Self {
            bits: raw as u64,
            width: 8,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Raw magnitude of the bit pattern.
    pub fn unsigned(&self) -> u64 {
        self.bits
    }

    /// Two's-complement interpretation of the bit pattern.
    pub fn signed(&self) -> i64 {
        let shift = 64 - self.width;
        ((self.bits << shift) as i64) >> shift
    }

    /// Single-precision interpretation. Only defined for 32-bit cells.
    pub fn as_f32(&self) -> Result<f32, DataError> {
        if self.width != 32 {
            return Err(DataError::UnsupportedFloatWidth(self.width));
        }
        Ok(f32::from_bits(self.bits as u32))
    }

    /// Raw 32-bit word. Only defined for 32-bit cells.
    pub fn as_word(&self) -> Result<u32, DataError> {
        self.expect_width(32)?;
        Ok(self.bits as u32)
    }

    fn expect_width(&self, width: u32) -> Result<(), DataError> {
        if self.width != width {
            return Err(DataError::WidthMismatch {
                expected: width,
                found: self.width,
            });
        }
        Ok(())
    }

    fn with_bits(&self, bits: u64) -> Self {
        Self {
            bits: bits & mask(self.width),
            width: self.width,
        }
    }

    /// Sign-extends to a wider cell.
    pub fn sign_extend(&self, width: u32) -> Result<Self, DataError> {
        if width < self.width {
            return Err(DataError::WidthMismatch {
                expected: self.width,
                found: width,
            });
        }
        Value::from_signed(self.signed(), width)
    }

    /// Zero-extends to a wider cell.
    pub fn zero_extend(&self, width: u32) -> Result<Self, DataError> {
        if width < self.width {
            return Err(DataError::WidthMismatch {
                expected: self.width,
                found: width,
            });
        }
        Value::from_unsigned(self.bits, width)
    }

    /// Keeps the low `width` bits.
    pub fn truncate(&self, width: u32) -> Self {
        let cell = Self::zero(width.min(self.width));
        Self {
            bits: self.bits & mask(cell.width),
            ..cell
        }
    }

    /// Reads bits `range` (LSB-first numbering) as an unsigned field.
    pub fn field(&self, range: Range<usize>) -> Result<u64, DataError> {
        self.check_field(&range)?;
        Ok(self.bits.view_bits::<Lsb0>()[range].load_le::<u64>())
    }

    /// Returns a copy with bits `range` (LSB-first numbering) replaced by the
    /// low bits of `field`.
    pub fn splice(&self, range: Range<usize>, field: u64) -> Result<Self, DataError> {
        self.check_field(&range)?;
        let mut bits = self.bits;
        bits.view_bits_mut::<Lsb0>()[range].store_le::<u64>(field);
        Ok(self.with_bits(bits))
    }

    fn check_field(&self, range: &Range<usize>) -> Result<(), DataError> {
        if range.start >= range.end || range.end > self.width as usize {
            return Err(DataError::FieldOutOfRange {
                start: range.start,
                end: range.end,
                width: self.width,
            });
        }
        Ok(())
    }

    /// Bitwise complement within the cell width.
    pub fn not(&self) -> Self {
        self.with_bits(!self.bits)
    }

    /// Sum computed over one extra carry bit, then truncated to the cell width.
    pub fn wrapping_add(&self, rhs: &Value) -> Result<Self, DataError> {
        rhs.expect_width(self.width)?;
        let sum = self.bits as u128 + rhs.bits as u128;
        Ok(self.with_bits(sum as u64))
    }

    /// Difference as `a + !b + 1` over one extra carry bit, truncated.
    pub fn wrapping_sub(&self, rhs: &Value) -> Result<Self, DataError> {
        rhs.expect_width(self.width)?;
        let sum = self.bits as u128 + rhs.not().bits as u128 + 1;
        Ok(self.with_bits(sum as u64))
    }

    /// Low `width` bits of the product.
    pub fn wrapping_mul(&self, rhs: &Value) -> Result<Self, DataError> {
        rhs.expect_width(self.width)?;
        let product = (self.bits as u128).wrapping_mul(rhs.bits as u128);
        Ok(self.with_bits(product as u64))
    }

    /// Signed quotient truncated toward zero. `MIN / -1` wraps to `MIN`.
    pub fn signed_div(&self, rhs: &Value) -> Result<Self, DataError> {
        rhs.expect_width(self.width)?;
        let divisor = rhs.signed() as i128;
        if divisor == 0 {
            return Err(DataError::DivideByZero);
        }
        let quotient = (self.signed() as i128) / divisor;
        Ok(self.with_bits(quotient as u64))
    }

    /// Signed remainder with the sign of the dividend.
    pub fn signed_rem(&self, rhs: &Value) -> Result<Self, DataError> {
        rhs.expect_width(self.width)?;
        let divisor = rhs.signed() as i128;
        if divisor == 0 {
            return Err(DataError::DivideByZero);
        }
        let remainder = (self.signed() as i128) % divisor;
        Ok(self.with_bits(remainder as u64))
    }

    pub fn and(&self, rhs: &Value) -> Result<Self, DataError> {
        rhs.expect_width(self.width)?;
        Ok(self.with_bits(self.bits & rhs.bits))
    }

    pub fn or(&self, rhs: &Value) -> Result<Self, DataError> {
        rhs.expect_width(self.width)?;
        Ok(self.with_bits(self.bits | rhs.bits))
    }

    pub fn xor(&self, rhs: &Value) -> Result<Self, DataError> {
        rhs.expect_width(self.width)?;
        Ok(self.with_bits(self.bits ^ rhs.bits))
    }

    /// Applies a single-precision binary operation to both cells.
    pub fn float_op(&self, rhs: &Value, op: impl Fn(f32, f32) -> f32) -> Result<Self, DataError> {
        rhs.expect_width(self.width)?;
        Ok(Value::from_f32(op(self.as_f32()?, rhs.as_f32()?)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.width.div_ceil(4) as usize;
        write!(f, "0x{:0digits$x}", self.bits, digits = digits)
    }
}
