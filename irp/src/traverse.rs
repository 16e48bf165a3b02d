//! Walk the tree of a protocol for one pass, producing the primary irstream
//! of whatever that pass emits.
//!
//! The walk counts states: every completed variation alternative and every
//! boundary of an infinite repeat moves to the next state. Durations and
//! bitfields are only emitted while the state equals the pass being
//! rendered. Everything outside infinite repeats is walked on every pass, so
//! its assignments apply whatever the pass. The body of an infinite repeat
//! is only walked on its own pass: assignments in it are not seen by the
//! intro or ending passes. A toggle like `(..., T=1-T)+` relies on this, the
//! first copy flips it once and the ending pass leaves it flipped.

use super::{
    expression::MAX_DEPTH,
    stream::{BareIrStream, IrStream, IrStreamItem, PrimaryIrStream, PrimaryItem, Time},
    Error, GeneralSpec, NameEngine, Result,
};
use log::{trace, warn};
use std::{fmt, rc::Rc};

/// Which part of the signal to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pass {
    #[default]
    Intro,
    Repeat,
    Ending,
    /// Intro, repeat and ending in one walk
    All,
}

impl Pass {
    /// Number of the pass, -1 for all
    pub fn index(&self) -> i64 {
        match self {
            Pass::Intro => 0,
            Pass::Repeat => 1,
            Pass::Ending => 2,
            Pass::All => -1,
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pass::Intro => write!(f, "intro"),
            Pass::Repeat => write!(f, "repeat"),
            Pass::Ending => write!(f, "ending"),
            Pass::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for Pass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "intro" | "0" => Ok(Pass::Intro),
            "repeat" | "1" => Ok(Pass::Repeat),
            "ending" | "2" => Ok(Pass::Ending),
            "all" => Ok(Pass::All),
            _ => Err(Error::incompatible(format!("unknown pass ‘{s}’"))),
        }
    }
}

/// Index of the variation alternative to take
const INTRO: usize = 0;
const REPEAT: usize = 1;
const ENDING: usize = 2;

/// Upper bound on the number of items visited in one walk
const MAX_STEPS: usize = 1 << 20;

struct Traverser<'a> {
    general_spec: &'a GeneralSpec,
    names: &'a mut NameEngine,
    pass: Pass,
    state: i64,
    /// Keep the first, minimum, copies of infinite repeats
    consider_repeat_mins: bool,
    /// Number of infinite repeats enclosing the current node
    infinite_depth: usize,
    /// Items visited so far
    steps: usize,
}

/// Walk `stream` for `pass`. Assignments are made in `names`, and the
/// internal names `$state`, `$pass` and `$final_state` are set.
pub(crate) fn traverse(
    stream: &IrStream,
    general_spec: &GeneralSpec,
    names: &mut NameEngine,
    pass: Pass,
    consider_repeat_mins: bool,
) -> Result<PrimaryIrStream> {
    let mut traverser = Traverser {
        general_spec,
        names,
        pass,
        state: 0,
        consider_repeat_mins: consider_repeat_mins || pass == Pass::All,
        infinite_depth: 0,
        steps: 0,
    };

    traverser.names.assign("$state", 0);
    traverser.names.assign("$pass", pass.index());

    let res = traverser.stream(stream, false, 0)?;

    let state = traverser.state;
    traverser.names.assign("$final_state", state);

    trace!("pass {pass} finished in state {state}");

    Ok(res)
}

impl<'a> Traverser<'a> {
    fn on_pass(&self) -> bool {
        match self.pass {
            Pass::All => true,
            pass => pass.index() == self.state,
        }
    }

    fn pass_ok(&self, force: bool) -> bool {
        force || self.on_pass()
    }

    fn advance_state(&mut self) {
        self.state += 1;
        self.names.assign("$state", self.state);
    }

    fn check_depth(depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            Err(Error::incompatible(format!(
                "irstreams nested deeper than {MAX_DEPTH} levels"
            )))
        } else {
            Ok(())
        }
    }

    /// An irstream with its optional bitspec and repeat marker
    fn stream(&mut self, stream: &IrStream, force: bool, depth: usize) -> Result<PrimaryIrStream> {
        Self::check_depth(depth)?;

        let bit_spec = match &stream.bit_spec {
            Some(bit_spec) => {
                let alternatives = bit_spec
                    .alternatives
                    .iter()
                    .map(|alt| self.bare_stream(alt, true, INTRO, depth + 1))
                    .collect::<Result<Vec<_>>>()?;

                Some(Rc::new(alternatives))
            }
            None => None,
        };

        let repeat = stream.repeat;
        let infinite = repeat.is_infinite();

        if infinite && self.infinite_depth > 0 {
            return Err(Error::InvalidRepeat(format!(
                "nested infinite repeats not supported: {stream}"
            )));
        }

        if infinite {
            self.infinite_depth += 1;
        }

        let res = self.repeated_stream(stream, force, depth);

        if infinite {
            self.infinite_depth -= 1;
        }

        let mut res = res?;
        res.bit_spec = bit_spec;
        Ok(res)
    }

    fn repeated_stream(
        &mut self,
        stream: &IrStream,
        force: bool,
        depth: usize,
    ) -> Result<PrimaryIrStream> {
        let repeat = stream.repeat;
        let body = &stream.stream;
        let mut res = PrimaryIrStream::default();
        let mut alternatives = 0;

        if repeat.min() >= 1 {
            let intro = self.bare_stream(body, force, INTRO, depth + 1)?;
            alternatives = intro.alternatives;

            if !repeat.is_infinite() || self.consider_repeat_mins {
                res.extend(intro);
            }

            if repeat.max_below(2) && alternatives > 1 {
                warn!("variations inside of irstream with repeat max < 2, second and third alternative ignored");
            } else if alternatives > 0 {
                self.advance_state();

                if repeat.max_below(3) && alternatives == 3 {
                    warn!("3-part variations inside of irstream with repeat max < 3, second alternative ignored");
                } else {
                    res.extend(self.bare_stream(body, force, REPEAT, depth + 1)?);
                }

                if alternatives == 3 {
                    self.advance_state();
                    res.extend(self.bare_stream(body, force, ENDING, depth + 1)?);
                }
            } else if self.consider_repeat_mins || !repeat.is_infinite() {
                for _ in 1..repeat.min() {
                    res.extend(self.bare_stream(body, force, INTRO, depth + 1)?);
                }
            }
        }

        if alternatives == 0 && repeat.is_infinite() {
            self.advance_state();

            if self.on_pass() {
                let repeating = self.bare_stream(body, force, INTRO, depth + 1)?;

                if repeating.alternatives > 0 {
                    return Err(Error::InvalidRepeat(
                        "variations enclosed in ( ... )* are not supported".into(),
                    ));
                }

                res.extend(repeating);
            }

            // done with the repeating part, whether it was walked or not
            self.advance_state();
        }

        Ok(res)
    }

    fn bare_stream(
        &mut self,
        stream: &BareIrStream,
        force: bool,
        alternative: usize,
        depth: usize,
    ) -> Result<PrimaryIrStream> {
        Self::check_depth(depth)?;

        let mut res = PrimaryIrStream::default();

        for item in &stream.items {
            let (primary, alternatives) = self.item(item, force, alternative, depth)?;

            if alternatives > 0 {
                res.alternatives = alternatives;
            }

            match primary {
                Some(primary) if !primary.is_empty() => res.items.push(primary),
                // an empty alternative of a variation ends the stream
                _ if alternatives > 0 => break,
                _ => (),
            }
        }

        Ok(res)
    }

    /// Returns the emitted item, if any, and the number of alternatives of
    /// the item if it is a variation.
    fn item(
        &mut self,
        item: &IrStreamItem,
        force: bool,
        alternative: usize,
        depth: usize,
    ) -> Result<(Option<PrimaryItem>, usize)> {
        self.steps += 1;

        if self.steps > MAX_STEPS {
            return Err(Error::InvalidRepeat(format!(
                "irstream expands to more than {MAX_STEPS} items"
            )));
        }

        match item {
            IrStreamItem::Duration(duration) => {
                if !self.pass_ok(force) {
                    return Ok((None, 0));
                }

                let time = match &duration.time {
                    Time::Number(n) => *n,
                    Time::Name(name) => self.names.evaluate(name)? as f64,
                };

                let micros = self.general_spec.micros(time, duration.unit)?;

                Ok((Some(PrimaryItem::Duration(duration.kind, micros)), 0))
            }
            IrStreamItem::BitField(expr) => {
                if !self.pass_ok(force) {
                    return Ok((None, 0));
                }

                let field = expr.bitfield_at(self.names, 0)?;

                Ok((Some(PrimaryItem::BitField(field)), 0))
            }
            IrStreamItem::Assignment(name, expr) => {
                match expr.eval(self.names) {
                    Ok(value) => self.names.assign(name, value),
                    // off pass, an assignment which cannot be made yet is a no-op
                    Err(Error::Unassigned(msg)) if !self.pass_ok(force) => {
                        trace!("assignment to {name} skipped: {msg}");
                    }
                    Err(e) => return Err(e),
                }

                Ok((None, 0))
            }
            IrStreamItem::Variation(list) => {
                let Some(last) = list.len().checked_sub(1) else {
                    return Ok((None, 0));
                };

                let chosen = &list[alternative.min(last)];
                let res = self.bare_stream(chosen, force, INTRO, depth + 1)?;

                Ok((Some(PrimaryItem::Stream(res)), list.len()))
            }
            IrStreamItem::IrStream(stream) => {
                let res = self.stream(stream, force, depth + 1)?;

                Ok((Some(PrimaryItem::Stream(res)), 0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{stream::to_ir_sequence, Protocol};

    fn walk(irp: &str, pass: Pass, consider_repeat_mins: bool) -> Result<Vec<i32>> {
        let protocol = Protocol::parse(irp)?;
        let mut names = NameEngine::new();

        for (name, expr) in &protocol.definitions {
            names.define_rc(name, expr.clone());
        }

        let primary = traverse(
            &protocol.stream,
            &protocol.general_spec,
            &mut names,
            pass,
            consider_repeat_mins,
        )?;

        Ok(to_ir_sequence(&primary.evaluate(protocol.general_spec.direction)?)?.to_ints(true))
    }

    #[test]
    fn repeat_mins() {
        let irp = "{}<1,-1|1,-3>((1,-2)2+,-10)";

        assert_eq!(walk(irp, Pass::Intro, false).unwrap(), Vec::<i32>::new());
        assert_eq!(walk(irp, Pass::Intro, true).unwrap(), vec![1, -2, 1, -2]);
        assert_eq!(walk(irp, Pass::Repeat, false).unwrap(), vec![1, -2]);
        assert_eq!(
            walk(irp, Pass::All, false).unwrap(),
            vec![1, -2, 1, -2, 1, -12]
        );
    }

    #[test]
    fn off_pass_assignment() {
        let irp = "{}<1,-1|1,-3>(10,-10,(20,-20)*,Y=Z,5,-5)";

        assert_eq!(walk(irp, Pass::Intro, false).unwrap(), vec![10, -10]);
        assert_eq!(walk(irp, Pass::Repeat, false).unwrap(), vec![20, -20]);
        assert!(matches!(
            walk(irp, Pass::Ending, false),
            Err(Error::Unassigned(_))
        ));
    }

    #[test]
    fn infinite_body_only_walked_on_its_pass() {
        let irp = "{}<100,-100|200,-100>((10,-20,X=X+1)*,X:2,-1000){X=0}";

        // the ending pass does not see X=X+1
        assert_eq!(
            walk(irp, Pass::Ending, false).unwrap(),
            vec![100, -100, 100, -1100]
        );
        assert_eq!(walk(irp, Pass::Repeat, false).unwrap(), vec![10, -20]);
        assert_eq!(
            walk(irp, Pass::All, false).unwrap(),
            vec![10, -20, 200, -100, 100, -1100]
        );
    }

    #[test]
    fn variations_with_low_repeat_max() {
        // no repeat: only the first alternative
        let irp = "{}<1,-1|1,-3>([1][2][3],-10)";

        assert_eq!(walk(irp, Pass::Intro, false).unwrap(), vec![1, -10]);
        assert!(walk(irp, Pass::Repeat, false).unwrap().is_empty());
        assert!(walk(irp, Pass::Ending, false).unwrap().is_empty());

        // two copies: the second alternative is skipped
        let irp = "{}<1,-1|1,-3>(([1][2][3],-10)2)";

        assert_eq!(walk(irp, Pass::Intro, false).unwrap(), vec![1, -10]);
        assert!(walk(irp, Pass::Repeat, false).unwrap().is_empty());
        assert_eq!(walk(irp, Pass::Ending, false).unwrap(), vec![3, -10]);
    }

    #[test]
    fn bitspec_walked_on_every_pass() {
        let irp = "{}<1,-1|1,-3>(5,-5,(2:2,-10)*)";

        assert_eq!(walk(irp, Pass::Intro, false).unwrap(), vec![5, -5]);
        assert_eq!(walk(irp, Pass::Repeat, false).unwrap(), vec![1, -1, 1, -13]);
    }

    #[test]
    fn huge_repeat_count() {
        let irp = "{}<1,-1|1,-3>((1,-1)4000000000)";

        assert!(matches!(
            walk(irp, Pass::Intro, false),
            Err(Error::InvalidRepeat(_))
        ));

        assert_eq!(
            walk("{}<1,-1|1,-3>((1,-1)3)", Pass::Intro, false).unwrap(),
            vec![1, -1, 1, -1, 1, -1]
        );
    }
}
