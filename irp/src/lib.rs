//! This library renders IR protocols described in IRP notation into IR
//! signals. It can also read and write pronto hex codes, and analyze
//! captured signals: finding the repeating part and cleaning up noisy
//! durations.
//!
//! ## About IRP
//!
//! [IRP Notation](http://hifi-remote.com/wiki/index.php?title=IRP_Notation) is a domain-specific language
//! which describes [Consumer IR](https://en.wikipedia.org/wiki/Consumer_IR) protocols. A protocol has a
//! general spec with the carrier frequency and time unit, a bitspec which says how bits are sent, the
//! timing of the signal itself, and the domains of its parameters.
//!
//! A signal has three parts: the intro is sent once, the repeat is sent for as long as the button is held,
//! and the ending is sent once on release. Each part is rendered by walking the protocol once.
//!
//! ## An example of how to render NEC1
//!
//! ```
//! use irpmaster::{parse_params, Protocol};
//!
//! let protocol = Protocol::parse(r#"
//!     {38.4k,564}<1,-1|1,-3>(16,-8,D:8,S:8,F:8,~F:8,1,^108m,(16,-4,1,^108m)*)
//!     [D:0..255,S:0..255=255-D,F:0..255]"#)
//!     .expect("parse should succeed");
//! let params = parse_params("D=255 S=52 F=1").expect("parameters should parse");
//! let signal = protocol.render_ir_signal(&params).expect("render should succeed");
//!
//! println!("carrier: {}Hz", signal.frequency);
//! println!("{}", signal.to_print_string());
//! ```
//!
//! The output is in raw ir format, which looks like "+9024 -4512 +564 -1692 +564 -1692 +564 -1692 +564 ...".
//! The first entry is a *flash*, which means infrared light should be on for N microseconds, and the
//! second a *gap*, when the light is off. This continues to alternate.
//!
//! Protocols with a toggle, like RC5, keep state between renders. Use a [`RenderSession`] to render
//! successive button presses:
//!
//! ```
//! use irpmaster::{Parameters, Pass, Protocol, RenderSession};
//!
//! let rc5 = Protocol::parse("{36k,msb,889}<1,-1|-1,1>((1,~F:1:6,T:1,D:5,F:6,^114m)*,T=1-T)[D:0..31,F:0..127,T@:0..1=0]")
//!     .expect("parse should succeed");
//! let params: Parameters = [("D".to_owned(), 5), ("F".to_owned(), 12)].into();
//! let mut session = RenderSession::new();
//!
//! let first = rc5.render_ir_signal_with(&mut session, &params, Pass::All, false).unwrap();
//! let second = rc5.render_ir_signal_with(&mut session, &params, Pass::All, false).unwrap();
//! assert_ne!(first, second);
//! ```
//!
//! ## Parsing pronto hex codes
//!
//! The [Pronto Hex](http://www.hifi-remote.com/wiki/index.php?title=Working_With_Pronto_Hex) is made popular by the
//! Philips Pronto universal remote. The format is a series of 4 digits hex numbers. Both learned codes and the
//! short forms of RC5, RC5X, RC6 and NEC1 are understood.
//!
//! ```
//! use irpmaster::Pronto;
//!
//! let signal = Pronto::parse("900A 006C 0000 0001 0C03 01FE").expect("parse should succeed");
//! assert_eq!(signal.frequency, 38400.0);
//! println!("{}", Pronto::to_string(&signal));
//! ```

mod bitfield;
mod bitstream;
pub mod cleaner;
pub mod decode;
mod error;
mod expression;
mod general_spec;
mod ir_sequence;
mod ir_signal;
mod modulated;
mod name_engine;
mod parameters;
mod parser;
pub mod pronto;
mod protocol;
pub mod protocols;
pub mod rawir;
pub mod repeat_finder;
pub mod stream;
mod traverse;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

pub use bitfield::BitField;
pub use bitstream::BitStream;
pub use cleaner::{Cleaner, CleanerOptions};
pub use error::{Error, Result};
pub use expression::Expression;
pub use general_spec::{BitDirection, GeneralSpec, Unit, DEFAULT_FREQUENCY};
pub use ir_sequence::{is_equal, IrSequence};
pub use ir_signal::IrSignal;
pub use modulated::ModulatedIrSequence;
pub use name_engine::NameEngine;
pub use parameters::{ParameterSpec, ParameterSpecs, RepeatMarker};
pub use pronto::Pronto;
pub use protocol::{parse_params, Protocol, RenderSession};
pub use repeat_finder::{RepeatFinder, RepeatFinderData, RepeatFinderOptions};
pub use traverse::Pass;

/// Actual parameters of a render, by name
pub type Parameters = BTreeMap<String, i64>;
