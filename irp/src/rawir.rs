/*!
 * Parsing and printing of raw ir strings like `+9024 -4512 +564 -39756`
 */

use super::{Error, Result};
use num::Integer;
use std::fmt::Write;

/// Parse a raw IR string. Every duration must carry its sign, starting with
/// a flash and alternating; a trailing flash is allowed.
pub fn parse(s: &str) -> Result<Vec<u32>> {
    let mut res = Vec::new();

    for (i, token) in s
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .enumerate()
    {
        let (flash, digits) = if let Some(digits) = token.strip_prefix('+') {
            (true, digits)
        } else if let Some(digits) = token.strip_prefix('-') {
            (false, digits)
        } else {
            return Err(Error::incompatible(format!(
                "raw ir duration ‘{token}’ should start with + or -"
            )));
        };

        if flash != i.is_even() {
            return Err(Error::incompatible(format!(
                "raw ir expected {} at ‘{token}’",
                if i.is_even() { "flash" } else { "gap" }
            )));
        }

        let value: u32 = digits
            .parse()
            .map_err(|_| Error::incompatible(format!("invalid raw ir duration ‘{token}’")))?;

        if value == 0 {
            return Err(Error::incompatible("raw ir durations cannot be 0"));
        }

        res.push(value);
    }

    Ok(res)
}

/// Convert durations to raw IR string
pub fn print_to_string(ir: &[u32]) -> String {
    let mut s = String::new();

    for (i, v) in ir.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        // writing to a String cannot fail
        let _ = write!(s, "{}{v}", if i.is_even() { "+" } else { "-" });
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(print_to_string(&[100, 50, 75]), "+100 -50 +75");
        assert_eq!(print_to_string(&[]), "");
    }

    #[test]
    fn parse_raw() {
        assert_eq!(parse("+100 -50 +75").unwrap(), vec![100, 50, 75]);
        assert_eq!(parse("+9024,-4512").unwrap(), vec![9024, 4512]);
        assert!(parse("").unwrap().is_empty());

        assert!(parse("100 -50").is_err());
        assert!(parse("-100 +50").is_err());
        assert!(parse("+100 +50").is_err());
        assert!(parse("+100 -0").is_err());
        assert!(parse("+100 -x").is_err());
    }
}
