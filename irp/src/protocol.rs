use super::{
    stream::{to_ir_sequence, IrStream},
    traverse::traverse,
    Error, Expression, GeneralSpec, IrSequence, IrSignal, NameEngine, ParameterSpecs, Parameters,
    Pass, Result,
};
use log::{debug, warn};
use std::{fmt, rc::Rc};

/// A parsed protocol: general spec, the timing tree, definitions and
/// parameter specs. A protocol is never modified by rendering; state which
/// has to survive from one render to the next lives in a [`RenderSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct Protocol {
    pub general_spec: GeneralSpec,
    pub stream: IrStream,
    pub definitions: Vec<(String, Rc<Expression>)>,
    pub parameter_specs: ParameterSpecs,
}

/// State carried between renders of a protocol: the render count and the
/// values of parameters with memory, such as toggles.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSession {
    count: i64,
    virgin: bool,
    memory: Parameters,
}

impl Default for RenderSession {
    fn default() -> Self {
        RenderSession {
            count: 0,
            virgin: true,
            memory: Parameters::new(),
        }
    }
}

impl RenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of renders since the last initial one
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Nothing has been rendered with this session yet
    pub fn is_virgin(&self) -> bool {
        self.virgin
    }

    /// Values of the parameters with memory after the last render
    pub fn memory(&self) -> &Parameters {
        &self.memory
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Protocol {
    pub fn new(
        general_spec: GeneralSpec,
        stream: IrStream,
        definitions: Vec<(String, Rc<Expression>)>,
        parameter_specs: ParameterSpecs,
    ) -> Self {
        Protocol {
            general_spec,
            stream,
            definitions,
            parameter_specs,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.general_spec.frequency
    }

    pub fn duty_cycle(&self) -> Option<f64> {
        self.general_spec.duty_cycle
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameter_specs.get(name).is_some()
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameter_specs.names()
    }

    fn parameter_spec(&self, name: &str) -> Result<&super::ParameterSpec> {
        self.parameter_specs
            .get(name)
            .ok_or_else(|| Error::Unassigned(format!("Parameter {name} not assigned.")))
    }

    pub fn parameter_min(&self, name: &str) -> Result<i64> {
        Ok(self.parameter_spec(name)?.min)
    }

    pub fn parameter_max(&self, name: &str) -> Result<i64> {
        Ok(self.parameter_spec(name)?.max)
    }

    pub fn has_parameter_memory(&self, name: &str) -> Result<bool> {
        Ok(self.parameter_spec(name)?.memory)
    }

    pub fn has_parameter_default(&self, name: &str) -> bool {
        self.parameter_specs
            .get(name)
            .is_some_and(|spec| spec.default.is_some())
    }

    /// Evaluate the default of a parameter, which may depend on the values
    /// of other parameters. `None` if the parameter has no default.
    pub fn parameter_default(&self, name: &str, params: &Parameters) -> Result<Option<i64>> {
        let Some(default) = &self.parameter_spec(name)?.default else {
            return Ok(None);
        };

        let mut names = NameEngine::new();
        if let Err(e) = names.load_actual_parameters(params, &self.parameter_specs) {
            warn!("{e}");
        }

        default.eval(&names).map(Some)
    }

    /// Does the protocol have parameters other than D, S, F and T
    pub fn has_advanced_parameters(&self) -> bool {
        self.parameter_names()
            .any(|name| !matches!(name, "D" | "S" | "F" | "T"))
    }

    /// Number of different signals a protocol produces for the same
    /// parameters because of parameters with memory the caller leaves
    /// alone, e.g. 2 for an unassigned toggle `T@:0..1`.
    pub fn number_of_toggle_values(&self, params: &Parameters) -> u64 {
        self.parameter_specs
            .iter()
            .filter(|spec| spec.memory && !params.contains_key(&spec.name))
            .map(|spec| (spec.max.max(0) as u64).saturating_add(1))
            .fold(1u64, |acc, n| acc.saturating_mul(n))
    }

    /// Build the name engine for a render: definitions, defaults, the
    /// remembered values and finally the actual parameters.
    fn environment(
        &self,
        session: &mut RenderSession,
        params: &Parameters,
        initial: bool,
    ) -> Result<NameEngine> {
        let mut names = NameEngine::new();

        for (name, expr) in &self.definitions {
            names.define_rc(name, expr.clone());
        }

        if initial {
            session.count = 0;
            session.memory.clear();
        }

        names.assign("$count", session.count);
        names.load_defaults(&self.parameter_specs, true);

        for (name, value) in &session.memory {
            names.assign(name, *value);
        }

        names.load_actual_parameters(params, &self.parameter_specs)?;
        names.check_assignments(&self.parameter_specs)?;

        debug!("rendering with {names}");

        Ok(names)
    }

    /// Remember the parameters with memory for the next render
    fn finish(&self, session: &mut RenderSession, names: &NameEngine) {
        for spec in self.parameter_specs.iter().filter(|spec| spec.memory) {
            match names.evaluate(&spec.name) {
                Ok(value) => {
                    session.memory.insert(spec.name.clone(), value);
                }
                Err(e) => warn!("cannot remember {}: {e}", spec.name),
            }
        }

        session.count += 1;
        session.virgin = false;
    }

    fn walk(&self, names: &mut NameEngine, pass: Pass) -> Result<IrSequence> {
        let consider_repeat_mins = matches!(pass, Pass::Intro | Pass::All);

        let primary = traverse(
            &self.stream,
            &self.general_spec,
            names,
            pass,
            consider_repeat_mins,
        )?;

        to_ir_sequence(&primary.evaluate(self.general_spec.direction)?)
    }

    /// Render a single pass. With [`Pass::All`], the intro, repeat and
    /// ending are rendered in one walk and concatenated.
    pub fn render_pass(
        &self,
        session: &mut RenderSession,
        params: &Parameters,
        pass: Pass,
        initial: bool,
    ) -> Result<IrSequence> {
        let mut names = self.environment(session, params, initial)?;

        let seq = self.walk(&mut names, pass)?;

        self.finish(session, &names);

        Ok(seq)
    }

    /// Render a signal using and updating `session`. Every pass starts from
    /// the same parameter values; the parameters with memory as they are
    /// after the last pass are kept for the next render. With a pass other
    /// than [`Pass::All`], only that part of the signal is rendered.
    pub fn render_ir_signal_with(
        &self,
        session: &mut RenderSession,
        params: &Parameters,
        pass: Pass,
        initial: bool,
    ) -> Result<IrSignal> {
        let names = self.environment(session, params, initial)?;

        let mut last = names.clone();
        let mut render = |this_pass: Pass| -> Result<IrSequence> {
            if pass == Pass::All || pass == this_pass {
                let mut env = names.clone();
                let seq = self.walk(&mut env, this_pass)?;
                last = env;
                Ok(seq)
            } else {
                Ok(IrSequence::empty())
            }
        };

        let intro = render(Pass::Intro)?;
        let repeat = render(Pass::Repeat)?;
        let ending = render(Pass::Ending)?;

        self.finish(session, &last);

        Ok(IrSignal::new(
            self.frequency(),
            self.duty_cycle(),
            intro,
            repeat,
            ending,
        ))
    }

    /// Render a complete signal from scratch
    pub fn render_ir_signal(&self, params: &Parameters) -> Result<IrSignal> {
        let mut session = RenderSession::new();

        self.render_ir_signal_with(&mut session, params, Pass::All, true)
    }

    /// Render with the conventional device, subdevice, function and toggle
    /// parameters; `None` leaves a parameter unassigned.
    pub fn render_ir_signal_dsft(
        &self,
        device: Option<i64>,
        subdevice: Option<i64>,
        function: Option<i64>,
        toggle: Option<i64>,
    ) -> Result<IrSignal> {
        let params: Parameters = [("D", device), ("S", subdevice), ("F", function), ("T", toggle)]
            .into_iter()
            .filter_map(|(name, value)| value.map(|value| (name.to_owned(), value)))
            .collect();

        self.render_ir_signal(&params)
    }

    /// Render a signal for each parameter set. A failing render does not stop
    /// the batch; its error is returned with its parameters.
    pub fn render_batch<I>(&self, batch: I) -> Vec<(Parameters, Result<IrSignal>)>
    where
        I: IntoIterator<Item = Parameters>,
    {
        batch
            .into_iter()
            .map(|params| {
                let res = self.render_ir_signal(&params);
                if let Err(e) = &res {
                    debug!("render of {params:?} failed: {e}");
                }
                (params, res)
            })
            .collect()
    }
}

/// Parse parameter assignments like `D=12 F=0x22;S=1`. Numbers may be
/// decimal, or hexadecimal or binary with `0x` or `0b`.
pub fn parse_params(text: &str) -> Result<Parameters> {
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',' || c == '=' || c == ';')
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() % 2 != 0 {
        return Err(Error::incompatible(format!(
            "parameters ‘{text}’ are not name=value pairs"
        )));
    }

    tokens
        .chunks(2)
        .map(|pair| Ok((pair[0].to_owned(), parse_number(pair[1])?)))
        .collect()
}

pub(crate) fn parse_number(text: &str) -> Result<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };

    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        i64::from_str_radix(bin, 2)
    } else {
        digits.parse()
    }
    .map_err(|_| Error::incompatible(format!("invalid number ‘{text}’")))?;

    Ok(if negative { -value } else { value })
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.general_spec, self.stream)?;

        if !self.definitions.is_empty() {
            write!(f, "{{")?;
            for (i, (name, expr)) in self.definitions.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{name}={expr}")?;
            }
            write!(f, "}}")?;
        }

        if !self.parameter_specs.is_empty() {
            write!(f, "{}", self.parameter_specs)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params() {
        let params = parse_params("D=12 F=0x22;S = 0b11,T=-1").unwrap();

        assert_eq!(params["D"], 12);
        assert_eq!(params["F"], 0x22);
        assert_eq!(params["S"], 3);
        assert_eq!(params["T"], -1);

        assert!(parse_params("D=12 F").is_err());
        assert!(parse_params("D=x").is_err());
        assert!(parse_params("").unwrap().is_empty());
    }
}
