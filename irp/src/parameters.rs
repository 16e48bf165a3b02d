use super::{Error, Expression, Result};
use std::{fmt, rc::Rc, str::FromStr};

/// Declared domain, default and memory flag of a single protocol parameter,
/// e.g. `T@:0..1=0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub min: i64,
    pub max: i64,
    pub memory: bool,
    pub default: Option<Rc<Expression>>,
}

impl ParameterSpec {
    pub fn new(name: &str, min: i64, max: i64) -> Self {
        ParameterSpec {
            name: name.to_owned(),
            min,
            max,
            memory: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Expression, memory: bool) -> Self {
        self.default = Some(Rc::new(default));
        self.memory = memory;
        self
    }

    /// Is the value within the domain of the parameter
    pub fn is_ok(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn domain(&self) -> String {
        format!("{}..{}", self.min, self.max)
    }
}

impl fmt::Display for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}:{}..{}",
            self.name,
            if self.memory { "@" } else { "" },
            self.min,
            self.max
        )?;
        if let Some(default) = &self.default {
            write!(f, "={default}")?;
        }
        Ok(())
    }
}

/// The parameter specs of a protocol, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSpecs {
    specs: Vec<ParameterSpec>,
}

impl ParameterSpecs {
    pub fn new(specs: Vec<ParameterSpec>) -> Result<Self> {
        let mut seen: Vec<&str> = Vec::new();

        for spec in &specs {
            if seen.contains(&spec.name.as_str()) {
                return Err(Error::Parse(format!(
                    "duplicate parameter called {}",
                    spec.name
                )));
            }
            seen.push(&spec.name);

            if spec.min > spec.max {
                return Err(Error::Parse(format!(
                    "invalid minimum {} and maximum {} for {}",
                    spec.min, spec.max, spec.name
                )));
            }
        }

        Ok(ParameterSpecs { specs })
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.specs.iter()
    }
}

impl fmt::Display for ParameterSpecs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, spec) in self.specs.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{spec}")?;
        }
        write!(f, "]")
    }
}

/// How often an irstream is repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMarker {
    /// No marker, the stream is sent once
    #[default]
    Once,
    /// `*`
    Any,
    /// `+`
    OneOrMore,
    /// `n`
    Count(u32),
    /// `n+`
    CountOrMore(u32),
}

impl RepeatMarker {
    pub fn min(&self) -> u32 {
        match self {
            RepeatMarker::Once | RepeatMarker::OneOrMore => 1,
            RepeatMarker::Any => 0,
            RepeatMarker::Count(n) | RepeatMarker::CountOrMore(n) => *n,
        }
    }

    /// Maximum number of repeats, `None` for infinite
    pub fn max(&self) -> Option<u32> {
        match self {
            RepeatMarker::Once => Some(1),
            RepeatMarker::Count(n) => Some(*n),
            RepeatMarker::Any | RepeatMarker::OneOrMore | RepeatMarker::CountOrMore(_) => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.max().is_none()
    }

    /// Is the maximum less than `n`
    pub(crate) fn max_below(&self, n: u32) -> bool {
        matches!(self.max(), Some(max) if max < n)
    }
}

impl FromStr for RepeatMarker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        match s {
            "" => Ok(RepeatMarker::Once),
            "*" => Ok(RepeatMarker::Any),
            "+" => Ok(RepeatMarker::OneOrMore),
            _ => {
                let (n, more) = match s.strip_suffix('+') {
                    Some(n) => (n, true),
                    None => (s, false),
                };

                let n = n
                    .parse()
                    .map_err(|_| Error::Parse(format!("invalid repeat marker ‘{s}’")))?;

                Ok(match (n, more) {
                    (1, false) => RepeatMarker::Once,
                    (1, true) => RepeatMarker::OneOrMore,
                    (n, false) => RepeatMarker::Count(n),
                    (n, true) => RepeatMarker::CountOrMore(n),
                })
            }
        }
    }
}

impl fmt::Display for RepeatMarker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RepeatMarker::Once => Ok(()),
            RepeatMarker::Any => write!(f, "*"),
            RepeatMarker::OneOrMore => write!(f, "+"),
            RepeatMarker::Count(n) => write!(f, "{n}"),
            RepeatMarker::CountOrMore(n) => write!(f, "{n}+"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_markers() {
        let cases = [
            ("", 1, Some(1)),
            ("*", 0, None),
            ("+", 1, None),
            ("0+", 0, None),
            ("7", 7, Some(7)),
            ("7+", 7, None),
            ("\t7+  ", 7, None),
        ];

        for (text, min, max) in cases {
            let marker: RepeatMarker = text.parse().unwrap();
            assert_eq!(marker.min(), min, "{text}");
            assert_eq!(marker.max(), max, "{text}");
            assert_eq!(marker.is_infinite(), max.is_none());
        }

        assert_eq!("7+".parse::<RepeatMarker>().unwrap().to_string(), "7+");
        assert!("x".parse::<RepeatMarker>().is_err());
    }

    #[test]
    fn domains() {
        let spec = ParameterSpec::new("F", 0, 255);
        assert!(!spec.is_ok(-1));
        assert!(spec.is_ok(0));
        assert!(spec.is_ok(255));
        assert!(!spec.is_ok(256));
        assert_eq!(spec.domain(), "0..255");

        let toggle = ParameterSpec::new("T", 0, 1).with_default(Expression::Number(0), true);
        assert_eq!(toggle.to_string(), "T@:0..1=0");
    }

    #[test]
    fn duplicates() {
        let specs = vec![ParameterSpec::new("D", 0, 255), ParameterSpec::new("D", 0, 31)];
        assert!(ParameterSpecs::new(specs).is_err());
    }
}
