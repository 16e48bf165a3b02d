use super::{Error, Result};
use std::fmt;

/// Largest width a bitfield can have; the value has to fit in an i64.
pub const MAX_WIDTH: i64 = 63;

/// A bitfield with all its operands evaluated, e.g. `~F:-6:2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub data: i64,
    pub width: u32,
    pub skip: u32,
    pub complement: bool,
    pub reverse: bool,
    /// An infinite field (`data::skip`) takes all remaining bits, capped
    /// at [`MAX_WIDTH`].
    pub infinite: bool,
}

impl BitField {
    pub fn new(
        data: i64,
        width: i64,
        skip: i64,
        complement: bool,
        reverse: bool,
        infinite: bool,
    ) -> Result<Self> {
        let width = if infinite { MAX_WIDTH } else { width };

        if !(0..=MAX_WIDTH).contains(&width) {
            return Err(Error::incompatible(format!(
                "bitfield width {width} outside of allowed range 0..{MAX_WIDTH}"
            )));
        }

        if !(0..=MAX_WIDTH).contains(&skip) {
            return Err(Error::incompatible(format!(
                "bitfield skip {skip} outside of allowed range 0..{MAX_WIDTH}"
            )));
        }

        Ok(BitField {
            data,
            width: width as u32,
            skip: skip as u32,
            complement,
            reverse,
            infinite,
        })
    }

    /// The canonical value: shifted by skip, optionally complemented,
    /// masked to width bits and optionally reversed over width bits.
    pub fn compute(&self) -> i64 {
        let mut x = self.data >> self.skip;

        if self.complement {
            x = !x;
        }

        x &= mask(self.width);

        if self.reverse {
            x = reverse(x, self.width);
        }

        x
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0
    }
}

pub(crate) fn mask(width: u32) -> i64 {
    if width == 0 {
        0
    } else {
        ((1u64 << width) - 1) as i64
    }
}

/// Reverse the lowest `width` bits of `value`
pub(crate) fn reverse(value: i64, width: u32) -> i64 {
    if width == 0 {
        0
    } else {
        ((value as u64 & mask(width) as u64).reverse_bits() >> (64 - width)) as i64
    }
}

impl fmt::Display for BitField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.complement {
            write!(f, "~")?;
        }
        if self.infinite {
            write!(f, "{}::{}", self.data, self.skip)
        } else {
            write!(
                f,
                "{}:{}{}",
                self.data,
                if self.reverse { "-" } else { "" },
                self.width
            )?;
            if self.skip != 0 {
                write!(f, ":{}", self.skip)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn compute() {
        let b = BitField::new(0xe9, 8, 0, false, false, false).unwrap();
        assert_eq!(b.compute(), 0xe9);

        let b = BitField::new(0xe9, 8, 0, true, false, false).unwrap();
        assert_eq!(b.compute(), 0x16);

        let b = BitField::new(0xe9, 4, 4, false, false, false).unwrap();
        assert_eq!(b.compute(), 0xe);

        let b = BitField::new(0b0011, 4, 0, false, true, false).unwrap();
        assert_eq!(b.compute(), 0b1100);

        let b = BitField::new(-1, 0, 0, false, true, false).unwrap();
        assert!(b.is_empty());
        assert_eq!(b.compute(), 0);

        let b = BitField::new(-1, 0, 2, true, false, true).unwrap();
        assert_eq!(b.width, 63);
        assert_eq!(b.compute(), 0);
    }

    #[test]
    fn out_of_range() {
        assert!(matches!(
            BitField::new(1, 64, 0, false, false, false),
            Err(Error::IncompatibleArgument(_))
        ));
        assert!(matches!(
            BitField::new(1, -1, 0, false, false, false),
            Err(Error::IncompatibleArgument(_))
        ));
        assert!(matches!(
            BitField::new(1, 8, 64, false, false, false),
            Err(Error::IncompatibleArgument(_))
        ));
    }

    #[test]
    fn invariants() {
        let mut rng = rand::thread_rng();

        for _ in 0..1000 {
            let data: i64 = rng.gen();
            let width = rng.gen_range(0..=63);
            let skip = rng.gen_range(0..=63);

            let plain = BitField::new(data, width, skip, false, false, false).unwrap();
            assert_eq!(plain.compute(), (data >> skip) & mask(width as u32));

            let reversed = BitField::new(data, width, skip, false, true, false).unwrap();
            assert_eq!(reverse(reversed.compute(), width as u32), plain.compute());
        }
    }
}
