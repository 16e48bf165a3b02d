use super::{Error, Result};
use std::fmt;

/// Frequency assumed when the general spec does not give one
pub const DEFAULT_FREQUENCY: f64 = 38000.0;

/// Order in which the bits of a bitfield are transmitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDirection {
    #[default]
    Lsb,
    Msb,
}

/// Unit a duration or the general spec unit is given in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Multiples of the protocol unit (no suffix)
    Units,
    /// `u`
    Microseconds,
    /// `m`
    Milliseconds,
    /// `p`, periods of the carrier
    Pulses,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Unit::Units => Ok(()),
            Unit::Microseconds => write!(f, "u"),
            Unit::Milliseconds => write!(f, "m"),
            Unit::Pulses => write!(f, "p"),
        }
    }
}

/// The `{...}` clause of an IRP: carrier, duty cycle, bit order and unit.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralSpec {
    /// Carrier frequency in Hz; 0 means unmodulated
    pub frequency: f64,
    /// Duty cycle as a fraction between 0 and 1, if specified
    pub duty_cycle: Option<f64>,
    pub direction: BitDirection,
    /// Length of one protocol unit in microseconds
    pub unit: f64,
}

impl Default for GeneralSpec {
    fn default() -> Self {
        GeneralSpec {
            frequency: DEFAULT_FREQUENCY,
            duty_cycle: None,
            direction: BitDirection::Lsb,
            unit: 1.0,
        }
    }
}

impl GeneralSpec {
    /// Build a general spec. The unit may be given in carrier periods, which
    /// is only possible with a non-zero frequency.
    pub fn new(
        frequency: f64,
        duty_cycle: Option<f64>,
        direction: BitDirection,
        unit: f64,
        unit_kind: Unit,
    ) -> Result<Self> {
        let unit = match unit_kind {
            Unit::Pulses => {
                if frequency == 0.0 {
                    return Err(Error::arithmetic(
                        "units in p and frequency == 0 do not go together",
                    ));
                }
                unit * 1_000_000.0 / frequency
            }
            Unit::Milliseconds => unit * 1000.0,
            Unit::Units | Unit::Microseconds => unit,
        };

        Ok(GeneralSpec {
            frequency,
            duty_cycle,
            direction,
            unit,
        })
    }

    pub fn lsb(&self) -> bool {
        self.direction == BitDirection::Lsb
    }

    /// Convert a duration given in `unit` to microseconds
    pub fn micros(&self, time: f64, unit: Unit) -> Result<f64> {
        match unit {
            Unit::Microseconds => Ok(time),
            Unit::Milliseconds => Ok(time * 1000.0),
            Unit::Pulses => {
                if self.frequency > 0.0 {
                    Ok(1_000_000.0 * time / self.frequency)
                } else {
                    Err(Error::arithmetic(
                        "units in p and frequency == 0 do not go together",
                    ))
                }
            }
            Unit::Units => {
                if self.unit > 0.0 {
                    Ok(time * self.unit)
                } else {
                    Err(Error::arithmetic(
                        "relative units and unit == 0 do not go together",
                    ))
                }
            }
        }
    }
}

impl fmt::Display for GeneralSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        if self.frequency != DEFAULT_FREQUENCY {
            write!(f, "{}k,", self.frequency / 1000.0)?;
        }
        if let Some(duty_cycle) = self.duty_cycle {
            write!(f, "{}%,", duty_cycle * 100.0)?;
        }
        if self.direction == BitDirection::Msb {
            write!(f, "msb,")?;
        }
        write!(f, "{}}}", self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_in_pulses() {
        let gs = GeneralSpec::new(40000.0, None, BitDirection::Lsb, 10.0, Unit::Pulses).unwrap();
        assert_eq!(gs.unit, 250.0);

        let err = GeneralSpec::new(0.0, None, BitDirection::Lsb, 10.0, Unit::Pulses).unwrap_err();
        assert!(matches!(err, Error::Arithmetic(_)));
    }

    #[test]
    fn durations() {
        let gs = GeneralSpec {
            unit: 564.0,
            ..Default::default()
        };

        assert_eq!(gs.micros(2.0, Unit::Units).unwrap(), 1128.0);
        assert_eq!(gs.micros(2.0, Unit::Milliseconds).unwrap(), 2000.0);
        assert_eq!(gs.micros(38.0, Unit::Pulses).unwrap(), 1000.0);

        let unmodulated = GeneralSpec {
            frequency: 0.0,
            ..Default::default()
        };
        assert!(unmodulated.micros(38.0, Unit::Pulses).is_err());

        let zero_unit = GeneralSpec {
            unit: 0.0,
            ..Default::default()
        };
        assert!(zero_unit.micros(1.0, Unit::Units).is_err());
    }
}
