use super::{Error, IrSequence, IrSignal, Parameters, Pass, Protocol, RenderSession, Result};
use log::warn;

/// Length of a pronto unit in microseconds, for a frequency code of 1
const PRONTO_CONSTANT: f64 = 0.241_246;

/// Frequency assumed for unmodulated signals, giving frequency code 10
const DUMMY_FREQUENCY: f64 = 100_000.0 / PRONTO_CONSTANT;

const LEARNED: u16 = 0x0000;
const LEARNED_UNMODULATED: u16 = 0x0100;
const RC5: u16 = 0x5000;
const RC5X: u16 = 0x5001;
const RC6: u16 = 0x6000;
const NEC1: u16 = 0x900a;

const RC5_FREQUENCY: u16 = 0x0073;
const RC5X_FREQUENCY: u16 = 0x0073;
const RC6_FREQUENCY: u16 = 0x0073;
const NEC1_FREQUENCY: u16 = 0x006c;

const RC5_IRP: &str =
    "{36k,msb,889}<1,-1|-1,1>((1:1,~F:1:6,T:1,D:5,F:6,^114m)+,T=1-T)[T@:0..1=0,D:0..31,F:0..127]";
const RC5X_IRP: &str = "{36k,msb,889}<1,-1|-1,1>(1:1,~S:1:6,T:1,D:5,-4,S:6,F:6,^114m,T=1-T)+[D:0..31,S:0..127,F:0..63,T@:0..1=0]";
const RC6_IRP: &str = "{36k,444,msb}<-1,1|1,-1>(6,-2,1:1,0:3,<-2,2|2,-2>(T:1),D:8,F:8,^107m,T=1-T)+[D:0..255,F:0..255,T@:0..1=0]";
const NEC1_IRP: &str = "{38.4k,564}<1,-1|1,-3>(16,-8,D:8,S:8,F:8,~F:8,1,-78,(16,-4,1,-173)*)[D:0..255,S:0..255=255-D,F:0..255]";

/// A decoded Pronto hex code. Learned codes carry their timings, the short
/// forms of the four well known protocols only their parameters.
#[derive(Debug, PartialEq)]
pub enum Pronto {
    LearnedUnmodulated {
        intro: Vec<f64>,
        repeat: Vec<f64>,
    },
    LearnedModulated {
        frequency: f64,
        intro: Vec<f64>,
        repeat: Vec<f64>,
    },
    Rc5 {
        device: u16,
        function: u16,
    },
    Rc5x {
        device: u16,
        subdevice: u16,
        function: u16,
    },
    Rc6 {
        device: u16,
        function: u16,
    },
    Nec1 {
        device: u16,
        subdevice: u16,
        function: u16,
    },
}

/// Carrier frequency in Hz of a pronto frequency code
pub fn frequency(code: u16) -> Option<f64> {
    (code != 0).then(|| 1_000_000.0 / (code as f64 * PRONTO_CONSTANT))
}

/// Pronto frequency code for a carrier frequency; 0 means unmodulated
pub fn pronto_code(frequency: f64) -> u16 {
    let frequency = if frequency > 0.0 {
        frequency
    } else {
        DUMMY_FREQUENCY
    };

    (1_000_000.0 / (frequency * PRONTO_CONSTANT)).round() as u16
}

/// Length in microseconds of one pulse at the given frequency code
pub fn pulse_time(code: u16) -> Option<f64> {
    (code != 0).then(|| code as f64 * PRONTO_CONSTANT)
}

/// Number of pronto units in a duration, at the unit of the frequency code
/// the frequency is encoded as
pub fn pulses(micros: f64, frequency: f64) -> u16 {
    match pulse_time(pronto_code(frequency)) {
        Some(unit) => (micros.abs() / unit).round() as u16,
        None => 0,
    }
}

fn to_micros(code: u16, pulses: &[u16]) -> Result<Vec<f64>> {
    let pulse_time = pulse_time(code)
        .ok_or_else(|| Error::incompatible("pronto frequency code 0000 is not valid"))?;

    Ok(pulses
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let micros = *p as f64 * pulse_time;
            if i % 2 == 0 {
                micros
            } else {
                -micros
            }
        })
        .collect())
}

fn parse_groups(s: &str) -> Result<Vec<u16>> {
    s.split_whitespace()
        .map(|elem| {
            if elem.len() != 4 || !elem.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::incompatible(format!(
                    "pronto hex expects 4 hex digits, ‘{elem}’ found"
                )));
            }

            u16::from_str_radix(elem, 16)
                .map_err(|_| Error::incompatible("pronto hex expects 4 hex digits"))
        })
        .collect()
}

impl std::str::FromStr for Pronto {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let p = parse_groups(s)?;

        if p.len() < 4 {
            return Err(Error::incompatible(
                "pronto hex should be at least 4 numbers long",
            ));
        }

        if p.len() % 2 != 0 {
            return Err(Error::incompatible(format!(
                "pronto hex has an odd number ({}) of numbers",
                p.len()
            )));
        }

        let code = p[1];
        let intro_length = p[2] as usize;
        let repeat_length = p[3] as usize;

        if p.len() != 4 + 2 * (intro_length + repeat_length) {
            return Err(Error::incompatible(format!(
                "inconsistent length: claimed {} pairs, found {} pairs",
                intro_length + repeat_length,
                (p.len() - 4) / 2
            )));
        }

        let expect_repeat = |n: u16| {
            if p[3] == n {
                Ok(())
            } else {
                Err(Error::incompatible(format!(
                    "pronto type {:04x} has wrong repeat length {}",
                    p[0], p[3]
                )))
            }
        };

        match p[0] {
            LEARNED | LEARNED_UNMODULATED => {
                let split = 4 + 2 * intro_length;
                let intro = to_micros(code, &p[4..split])?;
                let repeat = to_micros(code, &p[split..])?;

                if p[0] == LEARNED {
                    Ok(Pronto::LearnedModulated {
                        frequency: frequency(code).unwrap_or_default(),
                        intro,
                        repeat,
                    })
                } else {
                    Ok(Pronto::LearnedUnmodulated { intro, repeat })
                }
            }
            RC5 => {
                expect_repeat(1)?;
                Ok(Pronto::Rc5 {
                    device: p[4],
                    function: p[5],
                })
            }
            RC5X => {
                expect_repeat(2)?;
                Ok(Pronto::Rc5x {
                    device: p[4],
                    subdevice: p[5],
                    function: p[6],
                })
            }
            RC6 => {
                expect_repeat(1)?;
                Ok(Pronto::Rc6 {
                    device: p[4],
                    function: p[5],
                })
            }
            NEC1 => {
                expect_repeat(1)?;

                let function = p[5] >> 8;
                if function != 0xff - (p[5] & 0xff) {
                    return Err(Error::incompatible(format!(
                        "pronto nec1 checksum erroneous in {:04X}",
                        p[5]
                    )));
                }

                Ok(Pronto::Nec1 {
                    device: p[4] >> 8,
                    subdevice: p[4] & 0xff,
                    function,
                })
            }
            _ => Err(Error::incompatible(format!(
                "pronto type {:04x} not supported",
                p[0]
            ))),
        }
    }
}

impl Pronto {
    /// Parse pronto hex into a signal. The short forms are rendered with
    /// the protocol they name.
    pub fn parse(s: &str) -> Result<IrSignal> {
        s.parse::<Pronto>()?.to_ir_signal()
    }

    pub fn to_ir_signal(&self) -> Result<IrSignal> {
        let (irp, pass, params) = match self {
            Pronto::LearnedUnmodulated { intro, repeat } => {
                return Ok(IrSignal::new(
                    0.0,
                    None,
                    IrSequence::new(intro.clone())?,
                    IrSequence::new(repeat.clone())?,
                    IrSequence::empty(),
                ));
            }
            Pronto::LearnedModulated {
                frequency,
                intro,
                repeat,
            } => {
                return Ok(IrSignal::new(
                    *frequency,
                    None,
                    IrSequence::new(intro.clone())?,
                    IrSequence::new(repeat.clone())?,
                    IrSequence::empty(),
                ));
            }
            Pronto::Rc5 { device, function } => (
                RC5_IRP,
                Pass::Repeat,
                vec![("D", *device), ("F", *function), ("T", 0)],
            ),
            Pronto::Rc5x {
                device,
                subdevice,
                function,
            } => (
                RC5X_IRP,
                Pass::Repeat,
                vec![("D", *device), ("S", *subdevice), ("F", *function), ("T", 0)],
            ),
            Pronto::Rc6 { device, function } => (
                RC6_IRP,
                Pass::Repeat,
                vec![("D", *device), ("F", *function), ("T", 0)],
            ),
            Pronto::Nec1 {
                device,
                subdevice,
                function,
            } => (
                NEC1_IRP,
                Pass::All,
                vec![("D", *device), ("S", *subdevice), ("F", *function)],
            ),
        };

        let protocol = Protocol::parse(irp)?;
        let params: Parameters = params
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value as i64))
            .collect();

        protocol.render_ir_signal_with(&mut RenderSession::new(), &params, pass, true)
    }

    /// Encode a signal as learned pronto hex. Pronto has no ending, so a
    /// non-empty one is dropped.
    pub fn to_string(signal: &IrSignal) -> String {
        if !signal.ending.is_empty() {
            warn!("ending sequence ignored in pronto hex");
        }

        let mut groups = vec![
            if signal.frequency > 0.0 {
                LEARNED
            } else {
                LEARNED_UNMODULATED
            },
            pronto_code(signal.frequency),
            (signal.intro.len() / 2) as u16,
            (signal.repeat.len() / 2) as u16,
        ];

        groups.extend(
            signal
                .intro
                .data()
                .iter()
                .chain(signal.repeat.data())
                .map(|d| pulses(*d, signal.frequency)),
        );

        format_groups(&groups)
    }

    /// The short form pronto hex of a signal of one of the protocols rc5,
    /// rc5x, rc6 or nec1. `None` for any other protocol.
    pub fn short_ccf(
        protocol: &str,
        device: i64,
        subdevice: Option<i64>,
        function: i64,
    ) -> Result<Option<String>> {
        let invalid = || {
            Error::incompatible(format!(
                "invalid parameters for {protocol}: D={device} S={} F={function}",
                subdevice.map_or_else(|| "-".into(), |s| s.to_string())
            ))
        };

        let in_range = |value: i64, max: i64| (0..=max).contains(&value);

        let groups = match protocol.to_ascii_lowercase().as_str() {
            "rc5" => {
                if !in_range(device, 31) || subdevice.is_some() || !in_range(function, 127) {
                    return Err(invalid());
                }
                vec![RC5, RC5_FREQUENCY, 0, 1, device as u16, function as u16]
            }
            "rc5x" => {
                let subdevice = subdevice.ok_or_else(invalid)?;
                if !in_range(device, 31) || !in_range(subdevice, 127) || !in_range(function, 63) {
                    return Err(invalid());
                }
                vec![
                    RC5X,
                    RC5X_FREQUENCY,
                    0,
                    2,
                    device as u16,
                    subdevice as u16,
                    function as u16,
                    0,
                ]
            }
            "rc6" => {
                if !in_range(device, 255) || subdevice.is_some() || !in_range(function, 255) {
                    return Err(invalid());
                }
                vec![RC6, RC6_FREQUENCY, 0, 1, device as u16, function as u16]
            }
            "nec1" => {
                let subdevice = subdevice.unwrap_or(0xff - device);
                if !in_range(device, 255) || !in_range(subdevice, 255) || !in_range(function, 255)
                {
                    return Err(invalid());
                }
                vec![
                    NEC1,
                    NEC1_FREQUENCY,
                    0,
                    1,
                    ((device << 8) + subdevice) as u16,
                    ((function << 8) + 0xff - function) as u16,
                ]
            }
            _ => return Ok(None),
        };

        Ok(Some(format_groups(&groups)))
    }
}

fn format_groups(groups: &[u16]) -> String {
    groups
        .iter()
        .map(|g| format!("{g:04X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
