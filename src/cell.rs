//! The `Cell` trait generalizing tape cell width and signedness.
//!
//! Cell width/signedness is a configuration knob, not a design contract:
//! the VM and tape are generic over any integer type that can wrap on add
//! and multiply, be cast from a 32-bit immediate, and round-trip through
//! `i64` for I/O. This crate's cells always wrap — there is no
//! `CheckedAdd`/`SaturatingAdd`/abort-on-overflow knob.
//!
//! Conversion from a 32-bit IR immediate must truncate the way `as` does,
//! keeping the low bits and reinterpreting the sign — `num`'s `NumCast` is
//! a *checked* conversion that returns `None` (and would otherwise have to
//! be mapped to zero) for a negative value cast to an unsigned cell, which
//! would turn every decrement into a no-op on the default `u8` tape. `Cell`
//! is implemented per concrete width instead, each with a real `as` cast.

use num::traits::{WrappingAdd, WrappingMul, Zero};

/// A tape cell: a machine integer of configurable width and signedness.
pub trait Cell: WrappingAdd + WrappingMul + Zero + Copy + PartialEq + Default + std::fmt::Debug + 'static {
    /// Truncates a 32-bit IR immediate into this cell type, the way `as` would.
    fn from_i32(v: i32) -> Self;

    /// Widens this cell to `i64` for I/O and diagnostics.
    fn to_i64(self) -> i64;
}

macro_rules! impl_cell {
    ($($t:ty),+ $(,)?) => {
        $(
            impl Cell for $t {
                fn from_i32(v: i32) -> Self {
                    v as Self
                }

                fn to_i64(self) -> i64 {
                    self as i64
                }
            }
        )+
    };
}

impl_cell!(u8, i8, u16, i16, u32, i32);

/// Casts a 32-bit IR immediate into a cell value, truncating as `as` would.
pub fn cell_from_i32<C: Cell>(v: i32) -> C {
    C::from_i32(v)
}

/// Widens a cell value to `i64` for I/O and diagnostics.
pub fn cell_to_i64<C: Cell>(c: C) -> i64 {
    c.to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_at_u8() {
        let a: u8 = cell_from_i32(250);
        let b: u8 = cell_from_i32(10);
        assert_eq!(a.wrapping_add(b), 4u8);
    }

    #[test]
    fn truncates_wide_immediate_to_narrow_cell() {
        let c: u8 = cell_from_i32(300);
        assert_eq!(c, 44u8);
    }

    #[test]
    fn negative_immediate_wraps_into_unsigned_cell() {
        let c: u8 = cell_from_i32(-1);
        assert_eq!(c, 255u8);
    }

    #[test]
    fn roundtrips_through_i64() {
        let c: i16 = cell_from_i32(-5);
        assert_eq!(cell_to_i64(c), -5);
    }
}
