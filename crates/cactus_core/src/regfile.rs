//! Register files built on one fixed-width cell bank.
//!
//! `CellBank` stores the cells and enforces the width invariant; `Gpr`
//! adds the integer views and `Fpr` the single-precision views.

use crate::DataError;
use crate::value::Value;
use core::fmt;

/// Fixed-length bank of equally wide cells.
pub struct CellBank {
    class: &'static str,
    width: u32,
    cells: Vec<Value>,
}

impl CellBank {
    /// Creates `count` zeroed cells of `width` bits, named `class<N>` in errors.
    ///
    /// Panics if `width` is not in `1..=64`.
    pub fn new(class: &'static str, count: usize, width: u32) -> Self {
        Self {
            class,
            width,
            cells: vec![Value::zero(width); count],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    fn check(&self, index: usize) -> Result<(), DataError> {
        if index >= self.cells.len() {
            return Err(DataError::RegisterOutOfRange {
                class: self.class,
                index,
                count: self.cells.len(),
            });
        }
        Ok(())
    }

    pub fn read(&self, index: usize) -> Result<Value, DataError> {
        self.check(index)?;
        Ok(self.cells[index])
    }

    /// Stores `value`, which must have exactly the bank's width.
    pub fn write(&mut self, index: usize, value: Value) -> Result<(), DataError> {
        self.check(index)?;
        if value.width() != self.width {
            return Err(DataError::WidthMismatch {
                expected: self.width,
                found: value.width(),
            });
        }
        log::trace!("{}{} <- {}", self.class, index, value);
        self.cells[index] = value;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.cells.fill(Value::zero(self.width));
    }

    fn dump(
        &self,
        f: &mut fmt::Formatter<'_>,
        render: impl Fn(&Value) -> String,
    ) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            let name = format!("{}{}", self.class, i);
            write!(f, "{:>5}: {:>12}", name, render(cell))?;
            if i % 8 == 7 || i + 1 == self.cells.len() {
                writeln!(f)?;
            } else {
                f.write_str("  ")?;
            }
        }
        Ok(())
    }
}

/// General purpose integer register file (`r0..`).
pub struct Gpr {
    bank: CellBank,
}

impl Gpr {
    pub fn new(count: usize, width: u32) -> Self {
        Self {
            bank: CellBank::new("r", count, width),
        }
    }

    pub fn len(&self) -> usize {
        self.bank.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bank.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.bank.width()
    }

    pub fn read(&self, rs: usize) -> Result<Value, DataError> {
        self.bank.read(rs)
    }

    pub fn write(&mut self, rd: usize, value: Value) -> Result<(), DataError> {
        self.bank.write(rd, value)
    }

    /// Writes a signed integer, rejecting values outside the register width.
    pub fn write_signed(&mut self, rd: usize, v: i64) -> Result<(), DataError> {
        self.write(rd, Value::from_signed(v, self.width())?)
    }

    pub fn read_signed(&self, rs: usize) -> Result<i64, DataError> {
        Ok(self.read(rs)?.signed())
    }

    pub fn read_unsigned(&self, rs: usize) -> Result<u64, DataError> {
        Ok(self.read(rs)?.unsigned())
    }

    /// One-line description of a register: hex, unsigned and signed views.
    pub fn describe(&self, rs: usize) -> Result<String, DataError> {
        let v = self.read(rs)?;
        Ok(format!(
            "r{}: {:>10}, uint: {:>11}, int: {:>11}",
            rs,
            v,
            v.unsigned(),
            v.signed()
        ))
    }

    pub fn clear(&mut self) {
        self.bank.clear();
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.bank.dump(f, |v| v.signed().to_string())
    }
}

/// Floating point register file (`f0..`), IEEE-754 single precision.
pub struct Fpr {
    bank: CellBank,
}

impl Fpr {
    pub fn new(count: usize, width: u32) -> Self {
        Self {
            bank: CellBank::new("f", count, width),
        }
    }

    pub fn len(&self) -> usize {
        self.bank.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bank.is_empty()
    }

    pub fn read(&self, fs: usize) -> Result<Value, DataError> {
        self.bank.read(fs)
    }

    pub fn write(&mut self, fd: usize, value: Value) -> Result<(), DataError> {
        self.bank.write(fd, value)
    }

    pub fn read_f32(&self, fs: usize) -> Result<f32, DataError> {
        self.read(fs)?.as_f32()
    }

    pub fn write_f32(&mut self, fd: usize, v: f32) -> Result<(), DataError> {
        self.write(fd, Value::from_f32(v))
    }

    pub fn clear(&mut self) {
        self.bank.clear();
    }
}

impl fmt::Display for Fpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.bank.dump(f, |v| match v.as_f32() {
            Ok(x) => x.to_string(),
            Err(_) => v.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_checks_width() {
        let mut gpr = Gpr::new(4, 32);
        assert!(gpr.write(0, Value::word(7)).is_ok());
        assert!(matches!(
            gpr.write(0, Value::byte(7)),
            Err(DataError::WidthMismatch {
                expected: 32,
                found: 8
            })
        ));
        assert_eq!(gpr.read_unsigned(0).unwrap(), 7);
    }

    #[test]
    fn index_is_bounded() {
        let gpr = Gpr::new(4, 32);
        assert!(matches!(
            gpr.read(4),
            Err(DataError::RegisterOutOfRange {
                class: "r",
                index: 4,
                count: 4
            })
        ));
    }

    #[test]
    fn signed_round_trip() {
        let mut gpr = Gpr::new(2, 32);
        gpr.write_signed(1, -5).unwrap();
        assert_eq!(gpr.read_signed(1).unwrap(), -5);
        assert_eq!(gpr.read_unsigned(1).unwrap(), 0xFFFF_FFFB);
        assert!(gpr.write_signed(1, 1 << 40).is_err());

        let sum = gpr.read(1).unwrap().wrapping_add(&Value::from_i32(15)).unwrap();
        gpr.write(0, sum).unwrap();
        assert_eq!(gpr.read_signed(0).unwrap(), 10);
    }

    #[test]
    fn float_registers() {
        let mut fpr = Fpr::new(2, 32);
        fpr.write_f32(1, -0.5).unwrap();
        assert_eq!(fpr.read_f32(1).unwrap(), -0.5);
        assert_eq!(fpr.read_f32(0).unwrap(), 0.0);
    }

    #[test]
    fn dump_lists_every_register() {
        let mut gpr = Gpr::new(9, 32);
        gpr.write_signed(8, -3).unwrap();
        let text = gpr.to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("r8:"));
        assert!(text.contains("-3"));
    }
}
