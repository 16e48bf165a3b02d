use super::{Error, IrSequence, IrSignal, Result};
use std::{fmt, ops::Deref};

/// Frequencies within this fraction of each other may be concatenated
const ALLOWED_FREQUENCY_DEVIATION: f64 = 0.05;

/// Anything below this is unmodulated
const ZERO_MODULATION_LIMIT: f64 = 0.000001;

/// An IrSequence with its carrier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModulatedIrSequence {
    pub sequence: IrSequence,
    /// Carrier frequency in Hz, 0 for none
    pub frequency: f64,
    pub duty_cycle: Option<f64>,
}

impl Deref for ModulatedIrSequence {
    type Target = IrSequence;

    fn deref(&self) -> &IrSequence {
        &self.sequence
    }
}

impl ModulatedIrSequence {
    pub fn new(sequence: IrSequence, frequency: f64, duty_cycle: Option<f64>) -> Self {
        ModulatedIrSequence {
            sequence,
            frequency,
            duty_cycle,
        }
    }

    pub fn from_ints(durations: &[i32], frequency: f64, duty_cycle: Option<f64>) -> Result<Self> {
        Ok(Self::new(
            IrSequence::from_ints(durations, false)?,
            frequency,
            duty_cycle,
        ))
    }

    pub fn is_zero_modulated(&self) -> bool {
        self.frequency < ZERO_MODULATION_LIMIT
    }

    /// Concatenate, provided the carriers are close enough
    pub fn append(&self, tail: &ModulatedIrSequence) -> Result<ModulatedIrSequence> {
        let differ = if self.is_zero_modulated() {
            !tail.is_zero_modulated()
        } else {
            (self.frequency - tail.frequency).abs() / self.frequency > ALLOWED_FREQUENCY_DEVIATION
        };

        if differ {
            return Err(Error::incompatible(
                "concatenation not possible; modulation frequencies differ",
            ));
        }

        Ok(Self::new(
            self.sequence.append(&tail.sequence),
            self.frequency,
            self.duty_cycle,
        ))
    }

    pub fn append_delay(&self, delay: f64) -> Result<ModulatedIrSequence> {
        Ok(Self::new(
            self.sequence.append_delay(delay)?,
            self.frequency,
            self.duty_cycle,
        ))
    }

    pub fn chop(&self, threshold: f64) -> Vec<ModulatedIrSequence> {
        self.sequence
            .chop(threshold)
            .into_iter()
            .map(|seq| Self::new(seq, self.frequency, self.duty_cycle))
            .collect()
    }

    /// The whole sequence as the intro of a signal
    pub fn to_ir_signal(&self) -> IrSignal {
        IrSignal::new(
            self.frequency,
            self.duty_cycle,
            self.sequence.clone(),
            IrSequence::empty(),
            IrSequence::empty(),
        )
    }

    /// Split into a signal: everything before `begin` is the intro, the
    /// `length` durations from `begin` the repeat, and whatever follows
    /// `repeats` copies of it the ending. Offsets are in durations.
    pub fn to_ir_signal_split(&self, begin: usize, length: usize, repeats: usize) -> Result<IrSignal> {
        let data = self.sequence.data();
        let end = begin + length * repeats;

        if begin % 2 != 0 || length % 2 != 0 || end > data.len() {
            return Err(Error::incompatible(format!(
                "cannot split sequence of length {} at {begin} with {repeats} repeats of {length}",
                data.len()
            )));
        }

        Ok(IrSignal::new(
            self.frequency,
            self.duty_cycle,
            IrSequence::new(data[..begin].to_vec())?,
            IrSequence::new(data[begin..begin + length].to_vec())?,
            IrSequence::new(data[end..].to_vec())?,
        ))
    }

    /// Like [`IrSequence::to_print_string`], prefixed with `f=` and the
    /// frequency unless empty.
    pub fn to_print_string(&self, alternating: bool, signs: bool, separator: &str) -> String {
        let durations = self.sequence.to_print_string(alternating, signs, separator);

        if self.sequence.is_empty() {
            durations
        } else {
            format!("f={}{separator}{durations}", self.frequency.round() as i64)
        }
    }
}

impl fmt::Display for ModulatedIrSequence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{},{}}}", self.frequency.round() as i64, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append() {
        let a = ModulatedIrSequence::from_ints(&[100, 200], 38000.0, None).unwrap();
        let b = ModulatedIrSequence::from_ints(&[300, 400], 39000.0, None).unwrap();
        let c = ModulatedIrSequence::from_ints(&[300, 400], 56000.0, None).unwrap();
        let d = ModulatedIrSequence::from_ints(&[300, 400], 0.0, None).unwrap();

        assert_eq!(a.append(&b).unwrap().data(), &[100.0, 200.0, 300.0, 400.0]);
        assert!(a.append(&c).is_err());
        assert!(a.append(&d).is_err());
        assert!(d.append(&d).is_ok());
        assert!(d.is_zero_modulated());
    }

    #[test]
    fn split() {
        let seq = ModulatedIrSequence::from_ints(&[1, 2, 3, 4, 3, 4, 3, 4, 5, 6], 40000.0, None)
            .unwrap();

        let signal = seq.to_ir_signal_split(2, 2, 3).unwrap();
        assert_eq!(signal.intro.data(), &[1.0, 2.0]);
        assert_eq!(signal.repeat.data(), &[3.0, 4.0]);
        assert_eq!(signal.ending.data(), &[5.0, 6.0]);

        assert!(seq.to_ir_signal_split(1, 2, 3).is_err());
        assert!(seq.to_ir_signal_split(2, 2, 5).is_err());

        let signal = seq.to_ir_signal();
        assert_eq!(signal.intro.len(), 10);
        assert!(signal.repeat.is_empty());
    }

    #[test]
    fn print() {
        let seq = ModulatedIrSequence::from_ints(&[100, 200], 38000.0, None).unwrap();
        assert_eq!(seq.to_print_string(true, false, " "), "f=38000 +100 -200");
        assert_eq!(seq.to_string(), "{38000,[100,200]}");
        assert_eq!(seq.chop(150.0).len(), 1);
    }
}
