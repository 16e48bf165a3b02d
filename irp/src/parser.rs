use super::{
    stream::{BareIrStream, BitSpec, Duration, DurationKind, IrStream, IrStreamItem, Time},
    BitDirection, Error, Expression, GeneralSpec, ParameterSpec, ParameterSpecs, Protocol,
    RepeatMarker, Result, Unit, DEFAULT_FREQUENCY,
};
use std::{collections::HashSet, rc::Rc, str::FromStr};

#[derive(PartialEq)]
enum GeneralItem<'a> {
    Msb,
    Lsb,
    Value(f64, Option<&'a str>),
}

type Definitions = Vec<(String, Rc<Expression>)>;

peg::parser! {
    grammar irp_parser() for str {
        pub(super) rule irp() -> (Vec<GeneralItem<'input>>, IrStream, Definitions, Vec<ParameterSpec>)
         = gs:general_spec() stream:bitspec_irstream() def:definitions()* specs:parameter_specs()?
        {
            let defs = def.into_iter().flatten().collect();
            let specs = specs.unwrap_or_default();

            (gs, stream, defs, specs)
        }

        pub(super) rule expression_only() -> Expression
         = _ e:expression() { e }

        rule general_spec() -> Vec<GeneralItem<'input>>
         = _ "{" _ items:(general_item() ** ",") "}" _ { items }

        rule general_item() -> GeneralItem<'input>
         = _ "msb" _ { GeneralItem::Msb }
         / _ "lsb" _ { GeneralItem::Lsb }
         / _ v:number_decimals() _ u:$("u" / "p" / "k" / "%")? _ { GeneralItem::Value(v, u) }

        rule number_decimals() -> f64
         = n:$(['0'..='9']* "." ['0'..='9']+)
         {? f64::from_str(n).map_err(|_| "f64") }
         / n:$(['0'..='9']+)
         {? f64::from_str(n).map_err(|_| "f64") }

        rule definitions() -> Definitions
         = "{" _ def:(definition() ** ("," _)) "}" _ { def }

        rule definition() -> (String, Rc<Expression>)
         = i:identifier() _ "=" _ e:expression() _ { (i.to_owned(), Rc::new(e)) }

        #[cache_left_rec]
        rule expression() -> Expression
         = cond:expression() "?" _ left:expression2() ":" _ right:expression2()
           { Expression::Conditional(Rc::new(cond), Rc::new(left), Rc::new(right)) }
         / expression2()

        #[cache_left_rec]
        rule expression2() -> Expression
         = left:expression2() "||" _ right:expression3()
           { Expression::Or(Rc::new(left), Rc::new(right)) }
         / expression3()

        #[cache_left_rec]
        rule expression3() -> Expression
         = left:expression3() "&&" _ right:expression4()
           { Expression::And(Rc::new(left), Rc::new(right)) }
         / expression4()

        #[cache_left_rec]
        rule expression4() -> Expression
         = left:expression4() "|" _ right:expression5()
           { Expression::BitwiseOr(Rc::new(left), Rc::new(right)) }
         / expression5()

        #[cache_left_rec]
        rule expression5() -> Expression
         = left:expression5() "&" _ right:expression6()
         { Expression::BitwiseAnd(Rc::new(left), Rc::new(right)) }
         / expression6()

        #[cache_left_rec]
        rule expression6() -> Expression
        = left:expression6() "^" _ right:expression7()
        { Expression::BitwiseXor(Rc::new(left), Rc::new(right)) }
        / expression7()

        #[cache_left_rec]
        rule expression7() -> Expression
         = left:expression7() "!=" _ right:expression8()
         { Expression::NotEqual(Rc::new(left), Rc::new(right)) }
         / left:expression7() "==" _ right:expression8()
         { Expression::Equal(Rc::new(left), Rc::new(right)) }
         / expression8()

        #[cache_left_rec]
        rule expression8() -> Expression
         = left:expression8() "<=" _ right:expression9()
         { Expression::LessEqual(Rc::new(left), Rc::new(right)) }
         / left:expression8() ">=" _ right:expression9()
         { Expression::GreaterEqual(Rc::new(left), Rc::new(right)) }
         / left:expression8() "<" !"<" _ right:expression9()
         { Expression::Less(Rc::new(left), Rc::new(right)) }
         / left:expression8() ">" !">" _ right:expression9()
         { Expression::Greater(Rc::new(left), Rc::new(right)) }
         / expression9()

        #[cache_left_rec]
        rule expression9() -> Expression
         = left:expression9() "<<" _ right:expression10()
         { Expression::ShiftLeft(Rc::new(left), Rc::new(right)) }
         / left:expression9() ">>" _ right:expression10()
         { Expression::ShiftRight(Rc::new(left), Rc::new(right)) }
         / expression10()

        #[cache_left_rec]
        rule expression10() -> Expression
         = left:expression10() "+" _ right:expression11()
         { Expression::Add(Rc::new(left), Rc::new(right)) }
         / left:expression10() "-" _ right:expression11()
         { Expression::Subtract(Rc::new(left), Rc::new(right)) }
         / expression11()

        #[cache_left_rec]
        rule expression11() -> Expression
        = left:expression11() "*" !"*" _ right:expression12()
         { Expression::Multiply(Rc::new(left), Rc::new(right)) }
         / left:expression11() "/" _ right:expression12()
         { Expression::Divide(Rc::new(left), Rc::new(right)) }
         / left:expression11() "%" _ right:expression12()
         { Expression::Modulo(Rc::new(left), Rc::new(right)) }
         / expression12()

        #[cache_left_rec]
        rule expression12() -> Expression
         = left:expression13() "**" _ right:expression12()
         { Expression::Power(Rc::new(left), Rc::new(right)) }
         / expression13()

        rule expression13() -> Expression
         = "#" _ expr:expression14()
         { Expression::BitCount(Rc::new(expr)) }
         / expression14()

        rule expression14() -> Expression
         = "!" _ expr:expression15()
         { Expression::Not(Rc::new(expr)) }
         / expression15()

        rule expression15() -> Expression
         = "-" _ expr:expression16()
         { Expression::Negative(Rc::new(expr)) }
         / expression16()

        rule expression16() -> Expression
         = bit_field()
         / "~" _ expr:expression16()
         { Expression::Complement(Rc::new(expr)) }
         / primary_item()

        rule bit_field() -> Expression
         = complement:"~"? _ value:primary_item() ":" !":" _ reverse:"-"? _ length:primary_item() skip:skip()?
         {
            Expression::BitField {
                value: Rc::new(value),
                complement: complement.is_some(),
                reverse: reverse.is_some(),
                length: Rc::new(length),
                skip: skip.map(Rc::new),
            }
         }
         / complement:"~"? _ value:primary_item() "::" _ skip:primary_item()
         {
            Expression::InfiniteBitField {
                value: Rc::new(value),
                complement: complement.is_some(),
                skip: Rc::new(skip),
            }
         }

        rule skip() -> Expression
         = ":" _ skip:primary_item() { skip }

        rule primary_item() -> Expression
         = number()
         / i:identifier() _ { Expression::Identifier(i.to_owned()) }
         / "(" _ e:expression() ")" _ { e }

        rule identifier() -> &'input str
         = quiet!{$(['_' | 'a'..='z' | 'A'..='Z']['_' | 'a'..='z' | 'A'..='Z' | '0'..='9']*)}
         / expected!("identifier")

        rule bare_number() -> i64
         = "0x" n:$(['0'..='9' | 'a'..='f' | 'A'..='F']+) _
         {? i64::from_str_radix(n, 16).map_err(|_| "i64") }
         / "0b" n:$(['0'..='1']+) _
         {? i64::from_str_radix(n, 2).map_err(|_| "i64") }
         / n:$("0" ['0'..='7']*) _
         {? i64::from_str_radix(n, 8).map_err(|_| "i64") }
         / n:$(['1'..='9'] ['0'..='9']*) _
         {? n.parse().map_err(|_| "i64") }
         / "UINT8_MAX" _ { u8::MAX as i64 }
         / "UINT16_MAX" _ { u16::MAX as i64 }
         / "UINT32_MAX" _ { u32::MAX as i64 }
         / "UINT64_MAX" _ { u64::MAX as i64 }

        rule number() -> Expression
         = n:bare_number() !(['u'|'m'|'p'] !['a'..='z' | 'A'..='Z' | '_' | '0'..='9']) { Expression::Number(n) }

        rule duration() -> Duration
         = kind:duration_kind() time:time() _ unit:unit() { Duration { kind, time, unit } }

        rule duration_kind() -> DurationKind
         = "-" _ { DurationKind::Gap }
         / "^" _ { DurationKind::Extent }
         / "" { DurationKind::Flash }

        rule time() -> Time
         = n:number_decimals() { Time::Number(n) }
         / id:identifier() { Time::Name(id.to_owned()) }

        rule unit() -> Unit
         = "m" !identifier() _ { Unit::Milliseconds }
         / "u" !identifier() _ { Unit::Microseconds }
         / "p" !identifier() _ { Unit::Pulses }
         / "" { Unit::Units }

        rule bare_irstream() -> BareIrStream
         = items:(irstream_item() ** ("," _)) { BareIrStream { items } }

        rule irstream() -> IrStream
         = "(" _ stream:bare_irstream() ")" _ repeat:repeat_marker()?
         {
            IrStream {
                bit_spec: None,
                stream,
                repeat: repeat.unwrap_or_default(),
            }
         }

        rule repeat_marker() -> RepeatMarker
         = m:$("*" / "+" / ['0'..='9']+ "+"?) _
         {? m.parse().map_err(|_| "repeat marker") }

        rule irstream_item() -> IrStreamItem
         = variation()
         / b:bit_field() _ { IrStreamItem::BitField(Rc::new(b)) }
         / d:definition() { IrStreamItem::Assignment(d.0, d.1) }
         / d:duration() { IrStreamItem::Duration(d) }
         / s:bitspec_irstream() { IrStreamItem::IrStream(s) }

        rule bitspec() -> BitSpec
         // !"||" is for IrpTransmogrifier compatibility, no other reason
         = "<" _ alternatives:(bare_irstream() ++ (!"||" "|" _)) ">" _ { BitSpec { alternatives } }

        rule bitspec_irstream() -> IrStream
         = bit_spec:bitspec()? stream:irstream() { IrStream { bit_spec, ..stream } }

        rule variation() -> IrStreamItem
         = a1:alternative() a2:alternative() a3:alternative()?
         {
            let mut list = vec![a1, a2];

            if let Some(e) = a3 {
                list.push(e);
            }

            IrStreamItem::Variation(list)
         }

        rule alternative() -> BareIrStream
         = "[" _ bare:bare_irstream() "]" _ { bare }

        rule parameter_specs() -> Vec<ParameterSpec>
         = "[" _ specs:(parameter_spec() ** ("," _)) "]" _ { specs }

        rule parameter_spec() -> ParameterSpec
         = id:identifier() _ memory:"@"? _ ":" _ min:signed_number() _ ".." _ max:signed_number() _ default:initializer()?
         {
            ParameterSpec {
                name: id.to_owned(),
                memory: memory.is_some(),
                min,
                max,
                default: default.map(Rc::new),
            }
        }

        rule signed_number() -> i64
         = "-" _ n:bare_number() { -n }
         / bare_number()

        rule initializer() -> Expression
         = "=" _ expr:expression() { expr }

        rule _ = quiet!{(commentline() / commentblock() / [' ' | '\n' | '\r' | '\t'])*}

        rule commentline() = "//" [^'\n']*
        rule commentblock() = "/*" ([_] !"*/")* [_] "*/"
    }
}

/// Deepest nesting of brackets, or run of `~`, accepted by the parser
const MAX_NESTING: usize = 64;

/// The grammar recurses once per nesting level, so bound the nesting
/// before handing the input over.
fn check_nesting(input: &str) -> Result<()> {
    let mut open = Vec::new();
    let mut complements = 0;
    let mut previous = None;

    for c in input.chars() {
        // a bitspec, not a comparison or shift
        let bitspec = match previous {
            None | Some('}' | '(' | ',' | '|' | '[') => true,
            Some('<') => open.last() == Some(&'<'),
            _ => false,
        };

        match c {
            '(' | '[' | '{' => open.push(c),
            '<' if bitspec => open.push(c),
            ')' | ']' | '}' => {
                open.pop();
            }
            '>' if open.last() == Some(&'<') => {
                open.pop();
            }
            _ => (),
        }

        if c == '~' {
            complements += 1;
        } else if !c.is_whitespace() {
            complements = 0;
        }

        if open.len() + complements > MAX_NESTING {
            return Err(Error::Parse(format!(
                "nested deeper than {MAX_NESTING} levels"
            )));
        }

        if !c.is_whitespace() {
            previous = Some(c);
        }
    }

    Ok(())
}

fn parse_error(e: peg::error::ParseError<peg::str::LineCol>) -> Error {
    Error::Parse(format!("at {}: expected {}", e.location, e.expected))
}

impl Protocol {
    /// Parse IRP notation, e.g.
    /// `{38.4k,564}<1,-1|1,-3>(16,-8,D:8,S:8,F:8,~F:8,1,^108m,(16,-4,1,^108m)*)[D:0..255,S:0..255=255-D,F:0..255]`
    pub fn parse(input: &str) -> Result<Protocol> {
        check_nesting(input)?;

        let (general, stream, definitions, parameters) =
            irp_parser::irp(input).map_err(parse_error)?;

        let general_spec = general_spec(&general)?;
        let parameter_specs = check_parameters(parameters)?;
        check_definitions(&definitions)?;

        Ok(Protocol::new(
            general_spec,
            stream,
            definitions,
            parameter_specs,
        ))
    }

    /// Parse a single expression, like `255-D` or `F:8:2`
    pub fn parse_expression(input: &str) -> Result<Expression> {
        check_nesting(input)?;

        irp_parser::expression_only(input).map_err(parse_error)
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Protocol::parse(s)
    }
}

fn general_spec(items: &[GeneralItem]) -> Result<GeneralSpec> {
    let mut unit = None;
    let mut direction = None;
    let mut frequency = None;
    let mut duty_cycle = None;

    for item in items {
        match item {
            GeneralItem::Lsb | GeneralItem::Msb => {
                if direction.is_some() {
                    return Err(Error::Parse("bit order (lsb,msb) specified twice".into()));
                }

                direction = Some(if *item == GeneralItem::Lsb {
                    BitDirection::Lsb
                } else {
                    BitDirection::Msb
                });
            }
            GeneralItem::Value(v, u) => {
                let v = *v;

                match u {
                    Some("%") => {
                        if !(0.0..=100.0).contains(&v) {
                            return Err(Error::Parse(format!("duty cycle {v}% not valid")));
                        }
                        if duty_cycle.is_some() {
                            return Err(Error::Parse("duty cycle specified twice".into()));
                        }

                        duty_cycle = Some(v / 100.0);
                    }
                    Some("k") => {
                        if frequency.is_some() {
                            return Err(Error::Parse(
                                "carrier frequency specified twice".into(),
                            ));
                        }

                        frequency = Some(v * 1000.0);
                    }
                    _ => {
                        if unit.is_some() {
                            return Err(Error::Parse("unit specified twice".into()));
                        }

                        let kind = if *u == Some("p") {
                            Unit::Pulses
                        } else {
                            Unit::Microseconds
                        };

                        unit = Some((v, kind));
                    }
                }
            }
        }
    }

    let (unit, kind) = unit.unwrap_or((1.0, Unit::Microseconds));

    GeneralSpec::new(
        frequency.unwrap_or(DEFAULT_FREQUENCY),
        duty_cycle,
        direction.unwrap_or_default(),
        unit,
        kind,
    )
}

fn check_parameters(parameters: Vec<ParameterSpec>) -> Result<ParameterSpecs> {
    for parameter in &parameters {
        if parameter.memory && parameter.default.is_none() {
            return Err(Error::Parse(format!(
                "memory parameter {} requires default value",
                parameter.name,
            )));
        }
    }

    ParameterSpecs::new(parameters)
}

fn check_definitions(definitions: &Definitions) -> Result<()> {
    let mut seen_names: HashSet<&str> = HashSet::new();

    for (name, expr) in definitions {
        if !seen_names.insert(name.as_str()) {
            return Err(Error::Parse(format!("duplicate definition called {name}")));
        }

        // definition cannot define itself
        let mut dependents = HashSet::new();
        expr.visit(&mut dependents, &|expr: &Expression, dependents: &mut HashSet<String>| {
            if let Expression::Identifier(var) = expr {
                dependents.insert(var.to_owned());
            }
        });

        if dependents.contains(name) {
            return Err(Error::Parse(format!(
                "definition {name}={expr} depends on its own value"
            )));
        }
    }

    Ok(())
}
