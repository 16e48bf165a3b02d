//! The timing structure of a protocol: the tree as parsed, and the
//! primary irstreams the evaluator produces from it for one pass.

use super::{
    bitfield::BitField, bitstream::BitStream, ir_sequence::merge_signs, BitDirection, Error,
    Expression, IrSequence, RepeatMarker, Result, Unit,
};
use std::{fmt, rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationKind {
    Flash,
    Gap,
    Extent,
}

/// Time of a duration, either a literal or a name
#[derive(Debug, Clone, PartialEq)]
pub enum Time {
    Number(f64),
    Name(String),
}

/// A flash, gap or extent as written in the protocol
#[derive(Debug, Clone, PartialEq)]
pub struct Duration {
    pub kind: DurationKind,
    pub time: Time,
    pub unit: Unit,
}

/// One item of an irstream, as parsed
#[derive(Debug, Clone, PartialEq)]
pub enum IrStreamItem {
    Duration(Duration),
    /// `Expression::BitField` or `Expression::InfiniteBitField`
    BitField(Rc<Expression>),
    Assignment(String, Rc<Expression>),
    /// Two or three alternatives, for intro, repeat and ending
    Variation(Vec<BareIrStream>),
    IrStream(IrStream),
}

/// A sequence of items without repeat semantics of its own
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BareIrStream {
    pub items: Vec<IrStreamItem>,
}

/// A parenthesized stream with its repeat marker and optional bitspec
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrStream {
    pub bit_spec: Option<BitSpec>,
    pub stream: BareIrStream,
    pub repeat: RepeatMarker,
}

/// Lookup table from a bit chunk value to its timing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BitSpec {
    pub alternatives: Vec<BareIrStream>,
}

impl IrStreamItem {
    /// Number of variation alternatives directly in this item
    pub fn alternatives(&self) -> usize {
        match self {
            IrStreamItem::Variation(list) => list.len(),
            _ => 0,
        }
    }
}

impl BareIrStream {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of alternatives of the variations directly in this stream
    pub fn alternatives(&self) -> usize {
        self.items
            .iter()
            .map(IrStreamItem::alternatives)
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Time::Number(n) => write!(f, "{n}"),
            Time::Name(name) => write!(f, "{name}"),
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let prefix = match self.kind {
            DurationKind::Flash => "",
            DurationKind::Gap => "-",
            DurationKind::Extent => "^",
        };
        write!(f, "{prefix}{}{}", self.time, self.unit)
    }
}

impl fmt::Display for IrStreamItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IrStreamItem::Duration(d) => write!(f, "{d}"),
            IrStreamItem::BitField(b) => write!(f, "{b}"),
            IrStreamItem::Assignment(name, expr) => write!(f, "{name}={expr}"),
            IrStreamItem::Variation(list) => {
                for alt in list {
                    write!(f, "[{alt}]")?;
                }
                Ok(())
            }
            IrStreamItem::IrStream(stream) => write!(f, "{stream}"),
        }
    }
}

impl fmt::Display for BareIrStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

impl fmt::Display for BitSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<")?;
        for (i, alt) in self.alternatives.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{alt}")?;
        }
        write!(f, ">")
    }
}

impl fmt::Display for IrStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(bit_spec) = &self.bit_spec {
            write!(f, "{bit_spec}")?;
        }
        write!(f, "({}){}", self.stream, self.repeat)
    }
}

/// An evaluated item: durations are in microseconds and bitfields have
/// their operands computed.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryItem {
    Duration(DurationKind, f64),
    BitField(BitField),
    Stream(PrimaryIrStream),
}

impl PrimaryItem {
    pub fn is_empty(&self) -> bool {
        match self {
            PrimaryItem::Duration(_, micros) => *micros == 0.0,
            PrimaryItem::BitField(b) => b.is_empty(),
            PrimaryItem::Stream(s) => s.is_empty(),
        }
    }
}

/// The result of walking an irstream for one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryIrStream {
    pub items: Vec<PrimaryItem>,
    pub bit_spec: Option<Rc<Vec<PrimaryIrStream>>>,
    /// Number of variation alternatives found directly in the stream
    pub alternatives: usize,
}

/// The chain of bitspecs enclosing a stream. Bitfields are looked up in the
/// innermost one; the timings found there are evaluated in its parent.
#[derive(Clone, Copy)]
struct Scope<'a> {
    bit_spec: &'a [PrimaryIrStream],
    parent: Option<&'a Scope<'a>>,
}

impl PrimaryIrStream {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: PrimaryIrStream) {
        self.items.extend(other.items);
    }

    /// Flatten into signed durations, expanding runs of bitfields through
    /// the bitspec in scope.
    pub fn evaluate(&self, direction: BitDirection) -> Result<Vec<(DurationKind, f64)>> {
        let mut out = Vec::new();
        self.evaluate_in(None, direction, &mut out)?;
        Ok(out)
    }

    fn evaluate_in(
        &self,
        scope: Option<&Scope>,
        direction: BitDirection,
        out: &mut Vec<(DurationKind, f64)>,
    ) -> Result<()> {
        let own;
        let scope = match &self.bit_spec {
            Some(bit_spec) => {
                own = Scope {
                    bit_spec: bit_spec.as_slice(),
                    parent: scope,
                };
                Some(&own)
            }
            None => scope,
        };

        let mut bits = BitStream::new();

        for item in &self.items {
            match item {
                PrimaryItem::BitField(field) => bits.add(field, direction)?,
                PrimaryItem::Duration(kind, micros) => {
                    flush(&mut bits, scope, direction, out)?;
                    out.push((*kind, *micros));
                }
                PrimaryItem::Stream(stream) => {
                    flush(&mut bits, scope, direction, out)?;
                    stream.evaluate_in(scope, direction, out)?;
                }
            }
        }

        flush(&mut bits, scope, direction, out)
    }
}

fn flush(
    bits: &mut BitStream,
    scope: Option<&Scope>,
    direction: BitDirection,
    out: &mut Vec<(DurationKind, f64)>,
) -> Result<()> {
    if bits.is_empty() {
        return Ok(());
    }

    let alternatives = bits.evaluate(scope.map(|s| s.bit_spec))?;

    for alternative in alternatives {
        alternative.evaluate_in(scope.and_then(|s| s.parent), direction, out)?;
    }

    *bits = BitStream::new();

    Ok(())
}

/// Gap appended to a sequence with an odd number of durations
const DUMMY_GAP: f64 = 0.001;

/// Turn flattened durations into an IrSequence, resolving extents against
/// the time elapsed since the previous extent.
pub fn to_ir_sequence(durations: &[(DurationKind, f64)]) -> Result<IrSequence> {
    let mut list = Vec::with_capacity(durations.len() + 1);
    let mut elapsed = 0.0;

    for (kind, micros) in durations {
        let value = match kind {
            DurationKind::Flash => *micros,
            DurationKind::Gap => -micros,
            DurationKind::Extent => {
                let remaining = micros - elapsed;
                if remaining < 0.0 {
                    return Err(Error::incompatible(format!(
                        "extent of {micros}µs is shorter than the {elapsed}µs already elapsed"
                    )));
                }
                -remaining
            }
        };

        if list.is_empty() && value <= 0.0 {
            // leading gaps carry no information
            if *kind == DurationKind::Extent {
                elapsed = 0.0;
            }
            continue;
        }

        list.push(value);

        if *kind == DurationKind::Extent {
            elapsed = 0.0;
        } else {
            elapsed += value.abs();
        }
    }

    let mut list = merge_signs(&list);

    if list.len() % 2 != 0 {
        list.push(-DUMMY_GAP);
    }

    IrSequence::new(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duration(kind: DurationKind, micros: f64) -> PrimaryItem {
        PrimaryItem::Duration(kind, micros)
    }

    fn field(data: i64, width: i64) -> PrimaryItem {
        PrimaryItem::BitField(BitField::new(data, width, 0, false, false, false).unwrap())
    }

    fn pulse_distance() -> Rc<Vec<PrimaryIrStream>> {
        Rc::new(vec![
            PrimaryIrStream {
                items: vec![
                    duration(DurationKind::Flash, 1.0),
                    duration(DurationKind::Gap, 1.0),
                ],
                ..Default::default()
            },
            PrimaryIrStream {
                items: vec![
                    duration(DurationKind::Flash, 1.0),
                    duration(DurationKind::Gap, 3.0),
                ],
                ..Default::default()
            },
        ])
    }

    #[test]
    fn bitfields_through_bitspec() {
        let stream = PrimaryIrStream {
            items: vec![
                duration(DurationKind::Flash, 16.0),
                duration(DurationKind::Gap, 8.0),
                field(0b10, 2),
                field(1, 1),
                duration(DurationKind::Flash, 1.0),
                duration(DurationKind::Extent, 100.0),
            ],
            bit_spec: Some(pulse_distance()),
            alternatives: 0,
        };

        let flat = stream.evaluate(BitDirection::Msb).unwrap();
        let seq = to_ir_sequence(&flat).unwrap();

        assert_eq!(
            seq.data(),
            &[16.0, -8.0, 1.0, -3.0, 1.0, -1.0, 1.0, -3.0, 1.0, -65.0]
        );
    }

    #[test]
    fn nested_stream_inherits_bitspec() {
        let inner = PrimaryIrStream {
            items: vec![field(1, 1)],
            ..Default::default()
        };
        let stream = PrimaryIrStream {
            items: vec![field(0, 1), PrimaryItem::Stream(inner)],
            bit_spec: Some(pulse_distance()),
            alternatives: 0,
        };

        let flat = stream.evaluate(BitDirection::Lsb).unwrap();
        assert_eq!(
            flat,
            vec![
                (DurationKind::Flash, 1.0),
                (DurationKind::Gap, 1.0),
                (DurationKind::Flash, 1.0),
                (DurationKind::Gap, 3.0)
            ]
        );
    }

    #[test]
    fn bitfield_without_bitspec() {
        let stream = PrimaryIrStream {
            items: vec![field(1, 1)],
            ..Default::default()
        };
        assert!(matches!(
            stream.evaluate(BitDirection::Lsb),
            Err(Error::Unassigned(_))
        ));
    }

    #[test]
    fn extents() {
        let flat = [
            (DurationKind::Gap, 50.0),
            (DurationKind::Flash, 10.0),
            (DurationKind::Gap, 20.0),
            (DurationKind::Flash, 10.0),
            (DurationKind::Extent, 100.0),
        ];
        let seq = to_ir_sequence(&flat).unwrap();
        assert_eq!(seq.data(), &[10.0, -20.0, 10.0, -60.0]);

        let flat = [(DurationKind::Flash, 200.0), (DurationKind::Extent, 100.0)];
        assert!(matches!(
            to_ir_sequence(&flat),
            Err(Error::IncompatibleArgument(_))
        ));
    }

    #[test]
    fn merges_and_pads() {
        let flat = [
            (DurationKind::Flash, 10.0),
            (DurationKind::Flash, 10.0),
            (DurationKind::Gap, 5.0),
        ];
        let seq = to_ir_sequence(&flat).unwrap();
        assert_eq!(seq.data(), &[20.0, -5.0]);

        let seq = to_ir_sequence(&[(DurationKind::Flash, 10.0)]).unwrap();
        assert_eq!(seq.data(), &[10.0, -DUMMY_GAP]);
    }
}
