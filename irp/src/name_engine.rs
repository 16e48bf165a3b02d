use super::{expression::MAX_DEPTH, Error, Expression, ParameterSpecs, Parameters, Result};
use log::warn;
use std::{collections::BTreeMap, fmt, rc::Rc};

/// Symbol table mapping names to expressions. Values are evaluated when a
/// name is read, so definitions may refer to names bound later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameEngine {
    map: BTreeMap<String, Rc<Expression>>,
}

impl NameEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name to an expression
    pub fn define(&mut self, name: &str, expr: Expression) {
        self.map.insert(name.trim().to_owned(), Rc::new(expr));
    }

    pub(crate) fn define_rc(&mut self, name: &str, expr: Rc<Expression>) {
        self.map.insert(name.trim().to_owned(), expr);
    }

    /// Bind a name to a number
    pub fn assign(&mut self, name: &str, value: i64) {
        self.define(name, Expression::Number(value));
    }

    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.map.get(name).map(|e| e.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Evaluate the expression bound to a name
    pub fn evaluate(&self, name: &str) -> Result<i64> {
        self.evaluate_at(name, 0)
    }

    pub(crate) fn evaluate_at(&self, name: &str, depth: usize) -> Result<i64> {
        if depth > MAX_DEPTH {
            return Err(Error::Unassigned(format!(
                "Name `{name}' is circular or nested too deeply."
            )));
        }

        match self.map.get(name) {
            Some(expr) => expr.eval_at(self, depth + 1),
            None => Err(Error::Unassigned(format!("Name `{name}' not defined."))),
        }
    }

    /// Load the defaults of the parameter specs. Unless `initial` is set,
    /// parameters with memory are left alone.
    pub fn load_defaults(&mut self, specs: &ParameterSpecs, initial: bool) {
        for spec in specs.iter() {
            if let Some(default) = &spec.default {
                if initial || !spec.memory {
                    self.define_rc(&spec.name, default.clone());
                }
            }
        }
    }

    /// Assign the actual parameters, after checking them against their
    /// domains. Nothing is assigned if any parameter is out of its domain.
    pub fn load_actual_parameters(
        &mut self,
        params: &Parameters,
        specs: &ParameterSpecs,
    ) -> Result<()> {
        // with no parameter specs at all there is nothing to check against
        if !specs.is_empty() {
            for (name, value) in params {
                match specs.get(name) {
                    None => warn!("Parameter `{name}' unknown in ParameterSpecs."),
                    Some(spec) if !spec.is_ok(*value) => {
                        return Err(Error::DomainViolation(format!(
                            "Parameter {name} = {value} outside of allowed domain ({}).",
                            spec.domain()
                        )));
                    }
                    Some(_) => (),
                }
            }
        }

        for (name, value) in params {
            self.assign(name, *value);
        }

        Ok(())
    }

    /// Check that every declared parameter has a binding
    pub fn check_assignments(&self, specs: &ParameterSpecs) -> Result<()> {
        for name in specs.names() {
            if !self.contains(name) {
                return Err(Error::Unassigned(format!(
                    "Parameter `{name}' has not been assigned."
                )));
            }
        }

        Ok(())
    }

    /// Printable list of the bindings, skipping internal `$` names and
    /// anything which is not a plain number.
    pub fn notation_string(&self, equals: &str, separator: &str) -> String {
        self.map
            .iter()
            .filter_map(|(name, expr)| match expr.as_ref() {
                Expression::Number(n) if !name.starts_with('$') => {
                    Some(format!("{name}{equals}{n}"))
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl fmt::Display for NameEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, expr)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{name}={expr}")?;
        }
        write!(f, "}}")
    }
}
