//! Condition flag vector written by `CMP` and read by `BR` and `FBR`.

use crate::value::Value;
use cactus_common::isa::CmpFlag;
use core::fmt;

/// The twelve sticky condition flags.
///
/// After reset only `always` is set. A comparison rewrites the ten
/// relational flags at once and never touches `always` or `never`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagVector {
    flags: [bool; CmpFlag::COUNT],
}

impl Default for FlagVector {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagVector {
    pub fn new() -> Self {
        let mut flags = [false; CmpFlag::COUNT];
        flags[CmpFlag::Always.index()] = true;
        Self { flags }
    }

    #[inline(always)]
    pub fn get(&self, flag: CmpFlag) -> bool {
        self.flags[flag.index()]
    }

    /// Recomputes every relational flag from `rs` and `rt`.
    ///
    /// `eq`/`ne` compare raw bits, the `*u` flags compare unsigned
    /// magnitudes and the remaining flags compare two's-complement values.
    pub fn update_from_compare(&mut self, rs: &Value, rt: &Value) {
        let (us, ut) = (rs.unsigned(), rt.unsigned());
        let (ss, st) = (rs.signed(), rt.signed());
        let bits_equal = rs == rt;

        let mut set = |flag: CmpFlag, v: bool| self.flags[flag.index()] = v;
        set(CmpFlag::Eq, bits_equal);
        set(CmpFlag::Ne, !bits_equal);
        set(CmpFlag::Ltu, us < ut);
        set(CmpFlag::Geu, us >= ut);
        set(CmpFlag::Leu, us <= ut);
        set(CmpFlag::Gtu, us > ut);
        set(CmpFlag::Lt, ss < st);
        set(CmpFlag::Ge, ss >= st);
        set(CmpFlag::Le, ss <= st);
        set(CmpFlag::Gt, ss > st);
    }

    /// Flags paired with their current values, in vector order.
    pub fn iter(&self) -> impl Iterator<Item = (CmpFlag, bool)> + '_ {
        CmpFlag::ALL.iter().map(move |&f| (f, self.get(f)))
    }
}

impl fmt::Display for FlagVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, value) in self.iter() {
            writeln!(f, "{:>6}: {}", flag.name(), value as u8)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_state() {
        let flags = FlagVector::new();
        assert!(flags.get(CmpFlag::Always));
        assert!(!flags.get(CmpFlag::Never));
        assert!(!flags.get(CmpFlag::Eq));
    }

    #[test]
    fn signed_and_unsigned_orderings_disagree() {
        let mut flags = FlagVector::new();
        let max = Value::from_i32(i32::MAX);
        let min = Value::from_i32(i32::MIN);
        flags.update_from_compare(&max, &min);

        assert!(!flags.get(CmpFlag::Lt));
        assert!(flags.get(CmpFlag::Gt));
        assert!(flags.get(CmpFlag::Ltu));
        assert!(!flags.get(CmpFlag::Gtu));
        assert!(flags.get(CmpFlag::Ne));
        assert!(flags.get(CmpFlag::Always));
        assert!(!flags.get(CmpFlag::Never));
    }

    #[test]
    fn equal_operands() {
        let mut flags = FlagVector::new();
        let v = Value::from_i32(5);
        flags.update_from_compare(&v, &v);
        for flag in [CmpFlag::Eq, CmpFlag::Le, CmpFlag::Ge, CmpFlag::Leu, CmpFlag::Geu] {
            assert!(flags.get(flag), "{} should be set", flag);
        }
        for flag in [CmpFlag::Ne, CmpFlag::Lt, CmpFlag::Gt, CmpFlag::Ltu, CmpFlag::Gtu] {
            assert!(!flags.get(flag), "{} should be clear", flag);
        }
    }
}
