//! Identification of signals by an external decoder. Whatever a decoder
//! reports is taken as a hint, never as proof.

use super::{ir_sequence::is_equal, IrSignal, ModulatedIrSequence, Parameters, Protocol};
use log::{debug, warn};

/// A protocol and parameters a decoder found in a signal
#[derive(Debug, Clone, PartialEq)]
pub struct Decode {
    pub protocol: String,
    pub parameters: Parameters,
}

impl Decode {
    pub fn new(protocol: &str, parameters: Parameters) -> Self {
        Decode {
            protocol: protocol.to_owned(),
            parameters,
        }
    }

    /// Same protocol, ignoring case, and every parameter of `expected`
    /// has the same value here. Extra parameters are fine.
    pub fn matches(&self, expected: &Decode) -> bool {
        self.protocol.eq_ignore_ascii_case(&expected.protocol)
            && expected
                .parameters
                .iter()
                .all(|(name, value)| self.parameters.get(name) == Some(value))
    }
}

pub trait DecodeOracle {
    /// All the decodes found in a sequence; possibly none
    fn decode(&self, seq: &ModulatedIrSequence) -> Vec<Decode>;
}

/// Does the oracle recognize `signal`, sent once, as `expected`
pub fn identify(oracle: &dyn DecodeOracle, signal: &IrSignal, expected: &Decode) -> bool {
    let decodes = oracle.decode(&signal.to_modulated_ir_sequence(1));

    if decodes.len() > 1 {
        debug!("{} decodes found", decodes.len());
    }

    let found = decodes.iter().any(|decode| decode.matches(expected));

    if !found {
        warn!(
            "signal not identified as {} {:?}; decodes: {decodes:?}",
            expected.protocol, expected.parameters
        );
    }

    found
}

/// A decoder which knows a few protocols and parameter sets, and finds them
/// by rendering each one and comparing the result with the sequence.
pub struct RenderOracle {
    candidates: Vec<(String, Protocol, Vec<Parameters>)>,
    pub absolute_tolerance: f64,
    pub relative_tolerance: f64,
    pub frequency_tolerance: f64,
}

impl Default for RenderOracle {
    fn default() -> Self {
        RenderOracle {
            candidates: Vec::new(),
            absolute_tolerance: 60.0,
            relative_tolerance: 0.1,
            frequency_tolerance: 1000.0,
        }
    }
}

impl RenderOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, protocol: Protocol, parameters: Vec<Parameters>) {
        self.candidates
            .push((name.to_owned(), protocol, parameters));
    }

    /// Compare the sequence with the signal sent with as many repeats as
    /// fit its length
    fn same(&self, seq: &ModulatedIrSequence, signal: &IrSignal) -> bool {
        if (seq.frequency - signal.frequency).abs() > self.frequency_tolerance {
            return false;
        }

        let fixed = signal.intro.len() + signal.ending.len();
        if seq.len() < fixed {
            return false;
        }

        let repeats = match signal.repeat.len() {
            0 => 0,
            n if (seq.len() - fixed) % n == 0 => (seq.len() - fixed) / n,
            _ => return false,
        };

        let rendered = signal.to_modulated_ir_sequence_explicit(1, repeats, 1);

        rendered.len() == seq.len()
            && rendered.data().iter().zip(seq.data()).all(|(x, y)| {
                is_equal(
                    x.abs(),
                    y.abs(),
                    self.absolute_tolerance,
                    self.relative_tolerance,
                )
            })
    }
}

impl DecodeOracle for RenderOracle {
    fn decode(&self, seq: &ModulatedIrSequence) -> Vec<Decode> {
        let mut res = Vec::new();

        for (name, protocol, parameter_sets) in &self.candidates {
            for (params, signal) in protocol.render_batch(parameter_sets.iter().cloned()) {
                match signal {
                    Ok(signal) if self.same(seq, &signal) => {
                        res.push(Decode::new(name, params));
                    }
                    Ok(_) => (),
                    Err(e) => debug!("{name} {params:?}: {e}"),
                }
            }
        }

        res
    }
}
