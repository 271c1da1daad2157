//! printf-style number formats for displaying parameter values.
//!
//! Instrument scripts describe display formats the C way (`"%.04f"`,
//! `"%+.3e"`, `"%g"`). [`NumberFormat`] parses one such format, with optional
//! literal text around the conversion, and renders `f64` values with it.
//!
//! Supported grammar:
//!
//! ```text
//! [text] % [flags] [width] [.precision] [l|h|L] conversion [text]
//! flags      := any of "-+ 0#"
//! conversion := f | F | e | E | g | G | d | i
//! ```
//!
//! `%%` renders a literal percent sign. Exactly one conversion is required.

use crate::error::{AppResult, InstrumentError};
use serde::{Deserialize, Serialize};
use std::iter::Peekable;
use std::str::Chars;

/// A parsed printf-style numeric format.
///
/// # Example
///
/// ```rust
/// use labshell_core::format::NumberFormat;
///
/// let format = NumberFormat::parse("%.04f").unwrap();
/// assert_eq!(format.render(0.5), "0.5000");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NumberFormat {
    source: String,
    prefix: String,
    suffix: String,
    spec: ConversionSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Fixed { upper: bool },
    Exponent { upper: bool },
    General { upper: bool },
    Integer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConversionSpec {
    left_align: bool,
    plus: bool,
    space: bool,
    zero_pad: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
    conversion: Conversion,
}

impl NumberFormat {
    /// Parse a printf-style format string.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::InvalidFormat`] if the string has no
    /// conversion, more than one, or an unsupported conversion character.
    pub fn parse(format: &str) -> AppResult<Self> {
        let invalid = |reason: &str| InstrumentError::InvalidFormat {
            format: format.to_string(),
            reason: reason.to_string(),
        };

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut spec = None;
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            let text = if spec.is_none() { &mut prefix } else { &mut suffix };
            if c != '%' {
                text.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                text.push('%');
                continue;
            }
            if spec.is_some() {
                return Err(invalid("more than one conversion"));
            }
            spec = Some(ConversionSpec::parse(&mut chars).map_err(|reason| invalid(&reason))?);
        }

        let spec = spec.ok_or_else(|| invalid("no conversion specifier"))?;
        Ok(Self {
            source: format.to_string(),
            prefix,
            suffix,
            spec,
        })
    }

    /// The format string this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render a value.
    pub fn render(&self, value: f64) -> String {
        format!("{}{}{}", self.prefix, self.spec.render(value), self.suffix)
    }
}

impl std::fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for NumberFormat {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NumberFormat {
    type Error = InstrumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NumberFormat> for String {
    fn from(format: NumberFormat) -> Self {
        format.source
    }
}

impl ConversionSpec {
    fn parse(chars: &mut Peekable<Chars<'_>>) -> Result<Self, String> {
        let mut spec = Self {
            left_align: false,
            plus: false,
            space: false,
            zero_pad: false,
            alternate: false,
            width: 0,
            precision: None,
            conversion: Conversion::Fixed { upper: false },
        };

        while let Some(&c) = chars.peek() {
            match c {
                '-' => spec.left_align = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '0' => spec.zero_pad = true,
                '#' => spec.alternate = true,
                _ => break,
            }
            chars.next();
        }

        spec.width = take_number(chars)?.unwrap_or(0);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(take_number(chars)?.unwrap_or(0));
        }

        while matches!(chars.peek(), Some('l' | 'h' | 'L')) {
            chars.next();
        }

        spec.conversion = match chars.next() {
            Some('f') => Conversion::Fixed { upper: false },
            Some('F') => Conversion::Fixed { upper: true },
            Some('e') => Conversion::Exponent { upper: false },
            Some('E') => Conversion::Exponent { upper: true },
            Some('g') => Conversion::General { upper: false },
            Some('G') => Conversion::General { upper: true },
            Some('d' | 'i') => Conversion::Integer,
            Some(other) => return Err(format!("unsupported conversion '{}'", other)),
            None => return Err("missing conversion character".to_string()),
        };

        Ok(spec)
    }

    fn render(&self, value: f64) -> String {
        let (negative, digits) = match self.conversion {
            _ if value.is_nan() => (false, self.non_finite("nan")),
            _ if value.is_infinite() => (value < 0.0, self.non_finite("inf")),
            Conversion::Fixed { .. } => {
                let precision = self.precision.unwrap_or(6);
                let mut digits = format!("{:.*}", precision, value.abs());
                if self.alternate && precision == 0 {
                    digits.push('.');
                }
                (value.is_sign_negative(), digits)
            }
            Conversion::Exponent { upper } => {
                let digits = exponent(value.abs(), self.precision.unwrap_or(6), upper, self.alternate);
                (value.is_sign_negative(), digits)
            }
            Conversion::General { upper } => {
                (value.is_sign_negative(), self.general(value.abs(), upper))
            }
            Conversion::Integer => {
                let rounded = value.round();
                let mut digits = format!("{}", rounded.abs());
                if let Some(min_digits) = self.precision {
                    while digits.len() < min_digits {
                        digits.insert(0, '0');
                    }
                }
                (rounded < 0.0, digits)
            }
        };

        let sign = if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        };

        let len = sign.len() + digits.len();
        if len >= self.width {
            return format!("{}{}", sign, digits);
        }
        let fill = self.width - len;
        if self.left_align {
            format!("{}{}{}", sign, digits, " ".repeat(fill))
        } else if self.zero_pad && value.is_finite() {
            format!("{}{}{}", sign, "0".repeat(fill), digits)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, digits)
        }
    }

    fn non_finite(&self, label: &str) -> String {
        match self.conversion {
            Conversion::Fixed { upper: true }
            | Conversion::Exponent { upper: true }
            | Conversion::General { upper: true } => label.to_uppercase(),
            _ => label.to_string(),
        }
    }

    /// C `%g`: shortest of fixed/exponent for the given significant digits.
    fn general(&self, abs: f64, upper: bool) -> String {
        let significant = match self.precision {
            Some(0) => 1,
            Some(p) => p,
            None => 6,
        };

        let exp = if abs == 0.0 {
            0
        } else {
            decimal_exponent(&format!("{:.*e}", significant - 1, abs))
        };

        let digits = if exp < -4 || exp >= significant as i32 {
            exponent(abs, significant - 1, upper, self.alternate)
        } else {
            let decimals = (significant as i32 - 1 - exp).max(0) as usize;
            format!("{:.*}", decimals, abs)
        };

        if self.alternate {
            digits
        } else {
            strip_trailing_zeros(&digits)
        }
    }
}

/// Largest accepted width or precision.
const MAX_FIELD: usize = 128;

fn take_number(chars: &mut Peekable<Chars<'_>>) -> Result<Option<usize>, String> {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    if digits.is_empty() {
        return Ok(None);
    }
    match digits.parse::<usize>() {
        Ok(n) if n <= MAX_FIELD => Ok(Some(n)),
        _ => Err(format!(
            "width or precision '{}' exceeds {}",
            digits, MAX_FIELD
        )),
    }
}

fn decimal_exponent(scientific: &str) -> i32 {
    scientific
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

/// C `%e`: mantissa with `precision` decimals and a signed two-digit exponent.
fn exponent(abs: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let scientific = format!("{:.*e}", precision, abs);
    let (mantissa, exp) = match scientific.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_string(), exp.parse::<i32>().unwrap_or(0)),
        None => (scientific.clone(), 0),
    };
    let mut mantissa = mantissa;
    if alternate && precision == 0 {
        mantissa.push('.');
    }
    format!(
        "{}{}{}{:02}",
        mantissa,
        if upper { 'E' } else { 'e' },
        if exp < 0 { '-' } else { '+' },
        exp.abs()
    )
}

fn strip_trailing_zeros(digits: &str) -> String {
    let (mantissa, exp) = match digits.find(['e', 'E']) {
        Some(idx) => digits.split_at(idx),
        None => (digits, ""),
    };
    if !mantissa.contains('.') {
        return digits.to_string();
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, exp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(format: &str, value: f64) -> String {
        NumberFormat::parse(format).unwrap().render(value)
    }

    #[test]
    fn test_oversized_fields_rejected() {
        for format in ["%.70000f", "%18446744073709551615f", "%999999999999999999999e", "%.129g"] {
            assert!(
                matches!(
                    NumberFormat::parse(format),
                    Err(InstrumentError::InvalidFormat { .. })
                ),
                "{format}"
            );
        }
        assert_eq!(render("%.128f", 0.5).len(), 130);
        assert_eq!(render("%128.1f", 0.5).len(), 128);
    }

    #[test]
    fn test_fixed_precision_with_leading_zero() {
        assert_eq!(render("%.04f", 0.5), "0.5000");
        assert_eq!(render("%.04f", -1.23456), "-1.2346");
        assert_eq!(render("%f", 2.0), "2.000000");
    }

    #[test]
    fn test_exponent() {
        assert_eq!(render("%.3e", 12345.678), "1.235e+04");
        assert_eq!(render("%.2E", 0.00012), "1.20E-04");
    }

    #[test]
    fn test_general() {
        assert_eq!(render("%g", 0.0001), "0.0001");
        assert_eq!(render("%g", 0.00001), "1e-05");
        assert_eq!(render("%g", 123456789.0), "1.23457e+08");
        assert_eq!(render("%g", 100.0), "100");
        assert_eq!(render("%g", 0.0), "0");
    }

    #[test]
    fn test_integer() {
        assert_eq!(render("%d", 2.6), "3");
        assert_eq!(render("%5d", -2.4), "   -2");
        assert_eq!(render("%d", -0.3), "0");
    }

    #[test]
    fn test_flags_and_width() {
        assert_eq!(render("%+08.2f", 3.14159), "+0003.14");
        assert_eq!(render("%-8.1f|", 3.14159), "3.1     |");
        assert_eq!(render("% .1f", 2.0), " 2.0");
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(render("%.2f mT", 1.5), "1.50 mT");
        assert_eq!(render("%.0f%%", 42.0), "42%");
    }

    #[test]
    fn test_non_finite() {
        assert_eq!(render("%.2f", f64::NAN), "nan");
        assert_eq!(render("%.2f", f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_invalid_formats() {
        assert!(matches!(
            NumberFormat::parse("plain"),
            Err(InstrumentError::InvalidFormat { .. })
        ));
        assert!(NumberFormat::parse("%q").is_err());
        assert!(NumberFormat::parse("%f %f").is_err());
        assert!(NumberFormat::parse("%.2").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let format: NumberFormat = serde_json::from_str("\"%.04f\"").unwrap();
        assert_eq!(format.as_str(), "%.04f");
        assert_eq!(serde_json::to_string(&format).unwrap(), "\"%.04f\"");
        assert!(serde_json::from_str::<NumberFormat>("\"nope\"").is_err());
    }
}
