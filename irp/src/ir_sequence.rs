use super::{Error, Result};
use itertools::Itertools;
use rand::Rng;
use std::{fmt, str::FromStr};

/// Two durations closer than this are considered equal
const EPSILON: f64 = 0.001;

/// Gap appended by the lenient parser to text with an odd number of durations
const DUMMY_GAP: f64 = 50.0;

/// A sequence of alternating flashes and gaps, in microseconds. Even
/// entries are flashes, odd entries gaps; the sign of an entry is kept but
/// carries no meaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrSequence {
    data: Vec<f64>,
}

/// Are two durations equal, within an absolute or a relative tolerance
pub fn is_equal(x: f64, y: f64, absolute_tolerance: f64, relative_tolerance: f64) -> bool {
    let diff = (x - y).abs();

    diff <= absolute_tolerance || diff <= relative_tolerance * x.abs().max(y.abs())
}

/// Merge neighbours with the same sign and drop leading gaps. Zero counts
/// as either sign.
pub(crate) fn merge_signs(list: &[f64]) -> Vec<f64> {
    let mut res: Vec<f64> = Vec::with_capacity(list.len());

    for &value in list.iter().skip_while(|v| **v <= 0.0) {
        match res.last_mut() {
            Some(last) if same_sign(*last, value) => *last += value,
            _ => res.push(value),
        }
    }

    res
}

fn same_sign(x: f64, y: f64) -> bool {
    (x <= 0.0 && y <= 0.0) || (x >= 0.0 && y >= 0.0)
}

impl IrSequence {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create from durations; the number of durations must be even
    pub fn new(data: Vec<f64>) -> Result<Self> {
        if data.len() % 2 != 0 {
            return Err(Error::incompatible(format!(
                "IrSequence has odd length = {}",
                data.len()
            )));
        }

        Ok(IrSequence { data })
    }

    /// Create from integer durations. With `accept_odd`, a trailing flash
    /// is dropped rather than rejected.
    pub fn from_ints(data: &[i32], accept_odd: bool) -> Result<Self> {
        let mut len = data.len();

        if len % 2 != 0 {
            if accept_odd {
                len -= 1;
            } else {
                return Err(Error::incompatible(format!(
                    "IrSequence has odd length = {len}"
                )));
            }
        }

        Ok(IrSequence {
            data: data[..len].iter().map(|d| *d as f64).collect(),
        })
    }

    /// Create from signed values, merging neighbours with the same sign and
    /// dropping leading gaps. The result may not end with a flash.
    pub fn normalize(list: &[f64]) -> Result<Self> {
        let data = merge_signs(list);

        if data.len() % 2 != 0 {
            return Err(Error::incompatible("IrSequence cannot end with a flash"));
        }

        Ok(IrSequence { data })
    }

    /// Parse text like `+9024 -4512 +564 -39756` or `9024,4512,564,39756`.
    /// Separators are whitespace, comma or semicolon. When signs are
    /// present, consecutive values with the same sign are merged. With
    /// `lenient`, a missing trailing gap is replaced by a dummy gap.
    pub fn parse(s: &str, lenient: bool) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() {
            return Ok(Self::empty());
        }

        let mut tokens: Vec<&str> = s
            .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.len() == 1 {
            tokens = split_at_signs(s);
        }

        let signed = tokens.iter().any(|t| t.starts_with('-'));
        let mut data: Vec<f64> = Vec::with_capacity(tokens.len() + 1);

        for token in tokens {
            let value: f64 = token
                .strip_prefix('+')
                .unwrap_or(token)
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .ok_or_else(|| Error::incompatible(format!("invalid duration ‘{token}’")))?;

            // the sign of -0 still counts
            if data.is_empty() && value.is_sign_negative() {
                continue;
            }

            match data.last_mut() {
                Some(last) if signed && last.is_sign_negative() == value.is_sign_negative() => {
                    *last += value
                }
                _ => data.push(value),
            }
        }

        if data.len() % 2 != 0 {
            if lenient {
                data.push(-DUMMY_GAP);
            } else {
                return Err(Error::incompatible("IrSequence ends with a flash"));
            }
        }

        Ok(IrSequence { data })
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Absolute value of the duration at `i`
    pub fn get(&self, i: usize) -> f64 {
        self.data[i].abs()
    }

    pub fn number_of_bursts(&self) -> usize {
        self.data.len() / 2
    }

    /// Length of the final gap, or -1 for an empty sequence
    pub fn gap(&self) -> f64 {
        self.data.last().map_or(-1.0, |g| g.abs())
    }

    /// Total duration in microseconds
    pub fn duration(&self) -> f64 {
        self.data.iter().map(|d| d.abs()).sum()
    }

    /// Total duration of `len` entries from `begin`
    pub fn duration_of(&self, begin: usize, len: usize) -> f64 {
        self.data[begin..begin + len].iter().map(|d| d.abs()).sum()
    }

    /// Concatenate `repetitions` copies of `tail` to this sequence
    pub fn append_repeated(&self, tail: &IrSequence, repetitions: usize) -> IrSequence {
        let mut data = Vec::with_capacity(self.data.len() + repetitions * tail.data.len());
        data.extend_from_slice(&self.data);
        for _ in 0..repetitions {
            data.extend_from_slice(&tail.data);
        }
        IrSequence { data }
    }

    pub fn append(&self, tail: &IrSequence) -> IrSequence {
        self.append_repeated(tail, 1)
    }

    /// Extend the final gap by `delay` microseconds
    pub fn append_delay(&self, delay: f64) -> Result<IrSequence> {
        let mut res = self.clone();

        match res.data.last_mut() {
            Some(last) => {
                *last = -(last.abs() + delay.abs());
                Ok(res)
            }
            None => Err(Error::incompatible("IrSequence is empty")),
        }
    }

    /// Cut the sequence after every gap at least `threshold` long
    pub fn chop(&self, threshold: f64) -> Vec<IrSequence> {
        let mut res = Vec::new();
        let mut begin = 0;

        for i in (1..self.data.len()).step_by(2) {
            if self.data[i].abs() >= threshold || i == self.data.len() - 1 {
                res.push(IrSequence {
                    data: self.data[begin..=i].to_vec(),
                });
                begin = i + 1;
            }
        }

        res
    }

    /// Replace every entry, given its index and value
    pub(crate) fn map<F>(&self, f: F) -> IrSequence
    where
        F: FnMut((usize, &f64)) -> f64,
    {
        IrSequence {
            data: self.data.iter().enumerate().map(f).collect(),
        }
    }

    fn add_to(&self, start: usize, amount: f64) -> IrSequence {
        let mut res = self.clone();
        for d in res.data.iter_mut().skip(start).step_by(2) {
            *d += if *d > 0.0 { amount } else { -amount };
        }
        res
    }

    /// Lengthen every flash by `amount`
    pub fn add_to_flashes(&self, amount: f64) -> IrSequence {
        self.add_to(0, amount)
    }

    /// Lengthen every gap by `amount`
    pub fn add_to_gaps(&self, amount: f64) -> IrSequence {
        self.add_to(1, amount)
    }

    /// Lengthen the flashes and shorten the gaps by the same amount
    pub fn flash_excess(&self, amount: f64) -> IrSequence {
        self.add_to_flashes(amount).add_to_gaps(-amount)
    }

    /// Move every flash/gap boundary by a random amount of at most `max`
    pub fn noisify(&self, max: f64) -> IrSequence {
        let mut rng = rand::thread_rng();
        let mut res = self.clone();

        for burst in res.data.chunks_mut(2) {
            let t = max * (2.0 * rng.gen::<f64>() - 1.0);
            burst[0] += if burst[0] < 0.0 { -t } else { t };
            burst[1] += if burst[1] < 0.0 { t } else { -t };
        }

        res
    }

    /// Equal in length, with every entry within 0.001µs
    pub fn is_equal(&self, other: &IrSequence) -> bool {
        self.is_equal_with_tolerance(other, EPSILON)
    }

    pub fn is_equal_with_tolerance(&self, other: &IrSequence, tolerance: f64) -> bool {
        self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    /// Compare two stretches of `len` entries of this sequence. The final
    /// entry, a gap, also matches when both are at least `min_last_gap`.
    pub fn is_equal_range(
        &self,
        begin: usize,
        compare_start: usize,
        len: usize,
        absolute_tolerance: f64,
        relative_tolerance: f64,
        min_last_gap: f64,
    ) -> bool {
        if len == 0 || compare_start + len > self.data.len() || begin + len > self.data.len() {
            return false;
        }

        for i in 0..len {
            let x = self.get(begin + i);
            let y = self.get(compare_start + i);

            if i == len - 1 && x >= min_last_gap && y >= min_last_gap {
                continue;
            }

            if !is_equal(x, y, absolute_tolerance, relative_tolerance) {
                return false;
            }
        }

        true
    }

    pub fn contains_zeros(&self) -> bool {
        self.data.iter().any(|d| d.abs() < EPSILON)
    }

    /// Replace all zero durations; returns true if anything was changed
    pub fn replace_zeros(&mut self, replacement: f64) -> bool {
        let mut changed = false;
        for d in self.data.iter_mut().filter(|d| d.abs() < EPSILON) {
            *d = replacement;
            changed = true;
        }
        changed
    }

    /// Rounded durations, optionally with gaps negative
    pub fn to_ints(&self, alternating: bool) -> Vec<i32> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let d = d.abs().round() as i32;
                if alternating && i % 2 != 0 {
                    -d
                } else {
                    d
                }
            })
            .collect()
    }

    /// Durations as number of carrier periods
    pub fn to_pulses(&self, frequency: f64) -> Vec<u32> {
        self.data
            .iter()
            .map(|d| (frequency * d / 1_000_000.0).abs().round() as u32)
            .collect()
    }

    /// Durations as text. With `alternating`, flashes get `+` and gaps `-`;
    /// with `signs` off all values are unsigned; otherwise the stored
    /// signs are printed.
    pub fn to_print_string(&self, alternating: bool, signs: bool, separator: &str) -> String {
        self.data
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let abs = d.round().abs() as i64;
                if alternating {
                    format!("{}{abs}", if i % 2 == 0 { '+' } else { '-' })
                } else if !signs {
                    format!("{abs}")
                } else {
                    format!("{}", d.round() as i64)
                }
            })
            .join(separator)
    }
}

fn split_at_signs(s: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;

    for (i, c) in s.char_indices() {
        if (c == '+' || c == '-') && i > start {
            tokens.push(s[start..i].trim());
            start = i;
        }
    }
    tokens.push(s[start..].trim());

    tokens.into_iter().filter(|t| !t.is_empty()).collect()
}

impl FromStr for IrSequence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        IrSequence::parse(s, false)
    }
}

impl fmt::Display for IrSequence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}]",
            self.data.iter().map(|d| d.round() as i64).join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_length() {
        assert!(IrSequence::new(vec![1.0, 2.0, 3.0]).is_err());
        assert!(IrSequence::from_ints(&[1, 2, 3], false).is_err());
        assert_eq!(
            IrSequence::from_ints(&[1, 2, 3], true).unwrap().data(),
            &[1.0, 2.0]
        );

        let a = IrSequence::new(vec![1.0, -2.0]).unwrap();
        let b = IrSequence::new(vec![3.0, -4.0, 5.0, -6.0]).unwrap();
        assert_eq!(a.append(&b).len() % 2, 0);
        assert_eq!(a.append_repeated(&b, 3).len(), 14);
    }

    #[test]
    fn parse() {
        let seq: IrSequence = "+9024 -4512 +564 -1692".parse().unwrap();
        assert_eq!(seq.data(), &[9024.0, -4512.0, 564.0, -1692.0]);

        let seq: IrSequence = "9024,4512;564 1692".parse().unwrap();
        assert_eq!(seq.data(), &[9024.0, 4512.0, 564.0, 1692.0]);

        let seq: IrSequence = "+100-200+300-400".parse().unwrap();
        assert_eq!(seq.data(), &[100.0, -200.0, 300.0, -400.0]);

        // leading gap ignored, same signs merged
        let seq: IrSequence = "-5 +100 +100 -200 -50".parse().unwrap();
        assert_eq!(seq.data(), &[200.0, -250.0]);

        assert_eq!(
            "+100 -200 +300".parse::<IrSequence>(),
            Err(Error::IncompatibleArgument(
                "IrSequence ends with a flash".into()
            ))
        );
        let seq = IrSequence::parse("+100 -200 +300", true).unwrap();
        assert_eq!(seq.data(), &[100.0, -200.0, 300.0, -50.0]);

        assert!("+100 -x".parse::<IrSequence>().is_err());
        assert!("".parse::<IrSequence>().unwrap().is_empty());
    }

    #[test]
    fn chop() {
        let seq: IrSequence = "+100 -200 +100 -30000 +100 -200 +100 -30000 +5 -5"
            .parse()
            .unwrap();
        let parts = seq.chop(25000.0);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].data(), &[100.0, -200.0, 100.0, -30000.0]);
        assert_eq!(parts[2].data(), &[5.0, -5.0]);
    }

    #[test]
    fn measurements() {
        let seq: IrSequence = "+100 -200 +300 -400".parse().unwrap();
        assert_eq!(seq.duration(), 1000.0);
        assert_eq!(seq.duration_of(2, 2), 700.0);
        assert_eq!(seq.gap(), 400.0);
        assert_eq!(IrSequence::empty().gap(), -1.0);
        assert_eq!(seq.number_of_bursts(), 2);
        assert_eq!(seq.to_ints(true), vec![100, -200, 300, -400]);
        assert_eq!(seq.to_pulses(40000.0), vec![4, 8, 12, 16]);
        assert_eq!(seq.to_print_string(true, false, " "), "+100 -200 +300 -400");
        assert_eq!(seq.to_print_string(false, false, ","), "100,200,300,400");
        assert_eq!(seq.to_string(), "[100,-200,300,-400]");

        let delayed = seq.append_delay(600.0).unwrap();
        assert_eq!(delayed.gap(), 1000.0);
        assert!(IrSequence::empty().append_delay(1.0).is_err());
    }

    #[test]
    fn adjustments() {
        let seq: IrSequence = "+100 -200 +300 -400".parse().unwrap();

        assert_eq!(
            seq.flash_excess(50.0).data(),
            &[150.0, -150.0, 350.0, -350.0]
        );

        let noisy = seq.noisify(10.0);
        assert!(noisy.is_equal_with_tolerance(&seq, 10.0));
        assert!((noisy.duration() - seq.duration()).abs() < 1e-6);

        let mut zeros = IrSequence::new(vec![100.0, 0.0]).unwrap();
        assert!(zeros.contains_zeros());
        assert!(zeros.replace_zeros(-10.0));
        assert!(!zeros.contains_zeros());
    }

    #[test]
    fn ranges() {
        let seq: IrSequence = "+100 -200 +110 -30000 +100 -200 +100 -25000 +100 -200"
            .parse()
            .unwrap();

        assert!(seq.is_equal_range(0, 4, 4, 60.0, 0.1, 20000.0));
        assert!(!seq.is_equal_range(0, 4, 4, 5.0, 0.0, 40000.0));
        assert!(!seq.is_equal_range(4, 8, 4, 60.0, 0.1, 20000.0));
    }
}
