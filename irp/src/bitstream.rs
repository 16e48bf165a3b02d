use super::{bitfield::BitField, BitDirection, Error, Result};
use bitvec::prelude::*;

/// An accumulator of bits from consecutive bitfields, in the order they
/// are transmitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitStream {
    bits: BitVec<usize, LocalBits>,
}

impl BitStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits collected so far
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Append the canonical value of a bitfield, most significant bit first
    /// for msb protocols and least significant bit first for lsb.
    pub fn add(&mut self, field: &BitField, direction: BitDirection) -> Result<()> {
        if field.infinite {
            return Err(Error::incompatible(
                "infinite bitfields cannot be put into a bitstream",
            ));
        }

        let value = field.compute();
        let width = field.width as usize;

        match direction {
            BitDirection::Msb => {
                for i in (0..width).rev() {
                    self.bits.push((value >> i) & 1 != 0);
                }
            }
            BitDirection::Lsb => {
                for i in 0..width {
                    self.bits.push((value >> i) & 1 != 0);
                }
            }
        }

        Ok(())
    }

    /// Split into chunks of `chunk_size` bits. Each chunk is read with its
    /// earliest bit as the most significant one.
    pub fn chunks(&self, chunk_size: usize) -> Result<Vec<usize>> {
        if chunk_size == 0 || self.bits.len() % chunk_size != 0 {
            return Err(Error::incompatible(format!(
                "chunksize (= {chunk_size}) does not divide bitstream length (= {})",
                self.bits.len()
            )));
        }

        Ok(self.bits.chunks(chunk_size).map(bit_to_usize).collect())
    }

    /// Look up every chunk in the alternatives of a bitspec
    pub fn evaluate<'a, T>(&self, bit_spec: Option<&'a [T]>) -> Result<Vec<&'a T>> {
        let Some(alternatives) = bit_spec else {
            return Err(Error::Unassigned(
                "bitstream found, but no bitspec to evaluate it".into(),
            ));
        };

        self.chunks(chunk_size(alternatives.len()))?
            .into_iter()
            .map(|chunk| {
                alternatives.get(chunk).ok_or_else(|| {
                    Error::incompatible(format!(
                        "cannot encode {chunk} with a bitspec of {} entries",
                        alternatives.len()
                    ))
                })
            })
            .collect()
    }
}

/// Number of bits per bitspec lookup, i.e. ceil(log2(entries)), at least 1
pub fn chunk_size(entries: usize) -> usize {
    let bits = (usize::BITS - entries.saturating_sub(1).leading_zeros()) as usize;
    bits.max(1)
}

fn bit_to_usize(bit: &BitSlice) -> usize {
    let mut v = 0;

    for i in 0..bit.len() {
        if bit[i] {
            v |= 1 << (bit.len() - 1 - i);
        }
    }

    v
}
