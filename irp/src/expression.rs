use super::{bitfield::BitField, name_engine::NameEngine, Error, Result};
use std::{fmt, rc::Rc};

/// Nesting limit for expression evaluation, including name lookups. A
/// circular definition hits this limit and becomes an unassigned name.
pub const MAX_DEPTH: usize = 128;

/// An arithmetic expression as found in definitions, assignments,
/// parameter defaults and bitfields.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(i64),
    Identifier(String),
    BitField {
        value: Rc<Expression>,
        complement: bool,
        reverse: bool,
        length: Rc<Expression>,
        skip: Option<Rc<Expression>>,
    },
    InfiniteBitField {
        value: Rc<Expression>,
        complement: bool,
        skip: Rc<Expression>,
    },
    Complement(Rc<Expression>),
    Not(Rc<Expression>),
    Negative(Rc<Expression>),
    BitCount(Rc<Expression>),

    Power(Rc<Expression>, Rc<Expression>),
    Multiply(Rc<Expression>, Rc<Expression>),
    Divide(Rc<Expression>, Rc<Expression>),
    Modulo(Rc<Expression>, Rc<Expression>),
    Add(Rc<Expression>, Rc<Expression>),
    Subtract(Rc<Expression>, Rc<Expression>),

    ShiftLeft(Rc<Expression>, Rc<Expression>),
    ShiftRight(Rc<Expression>, Rc<Expression>),

    LessEqual(Rc<Expression>, Rc<Expression>),
    Less(Rc<Expression>, Rc<Expression>),
    Greater(Rc<Expression>, Rc<Expression>),
    GreaterEqual(Rc<Expression>, Rc<Expression>),
    NotEqual(Rc<Expression>, Rc<Expression>),
    Equal(Rc<Expression>, Rc<Expression>),

    BitwiseAnd(Rc<Expression>, Rc<Expression>),
    BitwiseXor(Rc<Expression>, Rc<Expression>),
    BitwiseOr(Rc<Expression>, Rc<Expression>),

    And(Rc<Expression>, Rc<Expression>),
    Or(Rc<Expression>, Rc<Expression>),
    Conditional(Rc<Expression>, Rc<Expression>, Rc<Expression>),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Number(v) => write!(f, "{v}"),
            Expression::Identifier(id) => write!(f, "{id}"),
            Expression::Add(left, right) => write!(f, "({left} + {right})"),
            Expression::Subtract(left, right) => write!(f, "({left} - {right})"),
            Expression::Multiply(left, right) => write!(f, "({left} * {right})"),
            Expression::Divide(left, right) => write!(f, "({left} / {right})"),
            Expression::Power(left, right) => write!(f, "({left} ** {right})"),
            Expression::Modulo(left, right) => write!(f, "({left} % {right})"),
            Expression::BitwiseOr(left, right) => write!(f, "({left} | {right})"),
            Expression::BitwiseAnd(left, right) => write!(f, "({left} & {right})"),
            Expression::BitwiseXor(left, right) => write!(f, "({left} ^ {right})"),
            Expression::ShiftLeft(left, right) => write!(f, "({left} << {right})"),
            Expression::ShiftRight(left, right) => write!(f, "({left} >> {right})"),

            Expression::Equal(left, right) => write!(f, "({left} == {right})"),
            Expression::NotEqual(left, right) => write!(f, "({left} != {right})"),
            Expression::Greater(left, right) => write!(f, "({left} > {right})"),
            Expression::GreaterEqual(left, right) => write!(f, "({left} >= {right})"),
            Expression::Less(left, right) => write!(f, "({left} < {right})"),
            Expression::LessEqual(left, right) => write!(f, "({left} <= {right})"),

            Expression::Or(left, right) => write!(f, "({left} || {right})"),
            Expression::And(left, right) => write!(f, "({left} && {right})"),
            Expression::Conditional(cond, left, right) => {
                write!(f, "({cond} ? {left} : {right})")
            }
            Expression::Complement(expr) => write!(f, "~{expr}"),
            Expression::Not(expr) => write!(f, "!{expr}"),
            Expression::Negative(expr) => write!(f, "-{expr}"),
            Expression::BitCount(expr) => write!(f, "#({expr})"),
            Expression::BitField {
                value,
                complement,
                reverse,
                length,
                skip,
            } => {
                write!(
                    f,
                    "{}{value}:{}{length}",
                    if *complement { "~" } else { "" },
                    if *reverse { "-" } else { "" },
                )?;
                if let Some(skip) = skip {
                    write!(f, ":{skip}")?;
                }
                Ok(())
            }
            Expression::InfiniteBitField {
                value,
                complement,
                skip,
            } => {
                write!(f, "{}{value}::{skip}", if *complement { "~" } else { "" })
            }
        }
    }
}

impl Expression {
    /// Post-order visit all nodes in an expression
    pub fn visit<T, F>(&self, ctx: &mut T, visit: &F)
    where
        F: Fn(&Expression, &mut T),
    {
        match self {
            Expression::Complement(expr)
            | Expression::Not(expr)
            | Expression::Negative(expr)
            | Expression::BitCount(expr) => {
                expr.visit(ctx, visit);
            }
            Expression::Add(left, right)
            | Expression::Subtract(left, right)
            | Expression::Multiply(left, right)
            | Expression::Divide(left, right)
            | Expression::Modulo(left, right)
            | Expression::Power(left, right)
            | Expression::ShiftLeft(left, right)
            | Expression::ShiftRight(left, right)
            | Expression::BitwiseAnd(left, right)
            | Expression::BitwiseOr(left, right)
            | Expression::BitwiseXor(left, right)
            | Expression::Greater(left, right)
            | Expression::GreaterEqual(left, right)
            | Expression::Less(left, right)
            | Expression::LessEqual(left, right)
            | Expression::Equal(left, right)
            | Expression::NotEqual(left, right)
            | Expression::And(left, right)
            | Expression::Or(left, right) => {
                left.visit(ctx, visit);
                right.visit(ctx, visit);
            }
            Expression::Conditional(cond, left, right) => {
                cond.visit(ctx, visit);
                left.visit(ctx, visit);
                right.visit(ctx, visit);
            }
            Expression::BitField {
                value,
                length,
                skip,
                ..
            } => {
                value.visit(ctx, visit);
                length.visit(ctx, visit);
                if let Some(skip) = skip {
                    skip.visit(ctx, visit);
                }
            }
            Expression::InfiniteBitField { value, skip, .. } => {
                value.visit(ctx, visit);
                skip.visit(ctx, visit);
            }
            Expression::Number(_) | Expression::Identifier(_) => (),
        }
        visit(self, ctx);
    }

    /// Evaluate an arithmetic expression with 64 bit signed semantics.
    /// Names are looked up (and their expressions evaluated) in `names`.
    pub fn eval(&self, names: &NameEngine) -> Result<i64> {
        self.eval_at(names, 0)
    }

    pub(crate) fn eval_at(&self, names: &NameEngine, depth: usize) -> Result<i64> {
        if depth > MAX_DEPTH {
            return Err(Error::Unassigned(format!(
                "expression `{self}' nested too deeply or circular"
            )));
        }

        let depth = depth + 1;

        let binary = |l: &Expression, r: &Expression| -> Result<(i64, i64)> {
            Ok((l.eval_at(names, depth)?, r.eval_at(names, depth)?))
        };

        match self {
            Expression::Number(n) => Ok(*n),
            Expression::Identifier(id) => names.evaluate_at(id, depth),
            Expression::Negative(e) => Ok(e.eval_at(names, depth)?.wrapping_neg()),
            Expression::Complement(e) => Ok(!e.eval_at(names, depth)?),
            Expression::Not(e) => Ok((e.eval_at(names, depth)? == 0) as i64),
            Expression::BitCount(e) => Ok(e.eval_at(names, depth)?.count_ones().into()),
            Expression::Add(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok(l.wrapping_add(r))
            }
            Expression::Subtract(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok(l.wrapping_sub(r))
            }
            Expression::Multiply(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok(l.wrapping_mul(r))
            }
            Expression::Divide(l, r) => {
                let (l, r) = binary(l, r)?;
                if r == 0 {
                    return Err(Error::arithmetic("divide by zero"));
                }
                Ok(l.wrapping_div(r))
            }
            Expression::Modulo(l, r) => {
                let (l, r) = binary(l, r)?;
                if r == 0 {
                    return Err(Error::arithmetic("divide by zero"));
                }
                Ok(l.wrapping_rem(r))
            }
            Expression::Power(l, r) => {
                let (l, r) = binary(l, r)?;
                if r < 0 {
                    return Err(Error::arithmetic("power to negative not supported"));
                }
                Ok(power(l, r))
            }
            Expression::BitwiseAnd(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok(l & r)
            }
            Expression::BitwiseOr(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok(l | r)
            }
            Expression::BitwiseXor(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok(l ^ r)
            }
            Expression::ShiftLeft(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok(l.wrapping_shl(r as u32))
            }
            Expression::ShiftRight(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok(l.wrapping_shr(r as u32))
            }
            Expression::Equal(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok((l == r) as i64)
            }
            Expression::NotEqual(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok((l != r) as i64)
            }
            Expression::Greater(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok((l > r) as i64)
            }
            Expression::GreaterEqual(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok((l >= r) as i64)
            }
            Expression::Less(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok((l < r) as i64)
            }
            Expression::LessEqual(l, r) => {
                let (l, r) = binary(l, r)?;
                Ok((l <= r) as i64)
            }
            Expression::And(l, r) => {
                if l.eval_at(names, depth)? == 0 {
                    Ok(0)
                } else {
                    Ok((r.eval_at(names, depth)? != 0) as i64)
                }
            }
            Expression::Or(l, r) => {
                if l.eval_at(names, depth)? != 0 {
                    Ok(1)
                } else {
                    Ok((r.eval_at(names, depth)? != 0) as i64)
                }
            }
            Expression::Conditional(cond, l, r) => {
                if cond.eval_at(names, depth)? != 0 {
                    l.eval_at(names, depth)
                } else {
                    r.eval_at(names, depth)
                }
            }
            Expression::BitField { .. } | Expression::InfiniteBitField { .. } => {
                Ok(self.bitfield_at(names, depth)?.compute())
            }
        }
    }

    /// Resolve a bitfield expression into its data, width and skip.
    pub(crate) fn bitfield_at(&self, names: &NameEngine, depth: usize) -> Result<BitField> {
        match self {
            Expression::BitField {
                value,
                complement,
                reverse,
                length,
                skip,
            } => {
                let data = value.eval_at(names, depth)?;
                let width = length.eval_at(names, depth)?;
                let skip = match skip {
                    Some(skip) => skip.eval_at(names, depth)?,
                    None => 0,
                };

                BitField::new(data, width, skip, *complement, *reverse, false)
            }
            Expression::InfiniteBitField {
                value,
                complement,
                skip,
            } => {
                let data = value.eval_at(names, depth)?;
                let skip = skip.eval_at(names, depth)?;

                BitField::new(data, 0, skip, *complement, false, true)
            }
            _ => Err(Error::incompatible(format!("{self} is not a bitfield"))),
        }
    }
}

fn power(base: i64, exponent: i64) -> i64 {
    base.wrapping_pow(exponent.min(u32::MAX as i64) as u32)
}
