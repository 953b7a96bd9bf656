use geo::{Color, Point};

use crate::error::{SourceError, SourceLocation};
use crate::scene::IdTable;

/// The three result shapes a math expression can produce; the caller
/// (the constructor parser currently building a number, Point, or Color)
/// knows which one it expects and rejects a mismatch as `InvalidExpression`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MathValue {
    Number(f64),
    Point(Point),
    Color(Color),
}

impl MathValue {
    pub fn as_number(self, loc: &SourceLocation) -> Result<f64, SourceError> {
        match self {
            MathValue::Number(n) => Ok(n),
            _ => Err(SourceError::InvalidExpression { loc: loc.clone(), reason: "expected a number".to_string() }),
        }
    }

    pub fn as_point(self, loc: &SourceLocation) -> Result<Point, SourceError> {
        match self {
            MathValue::Point(p) => Ok(p),
            _ => Err(SourceError::InvalidExpression { loc: loc.clone(), reason: "expected a Point".to_string() }),
        }
    }

    pub fn as_color(self, loc: &SourceLocation) -> Result<Color, SourceError> {
        match self {
            MathValue::Color(c) => Ok(c),
            _ => Err(SourceError::InvalidExpression { loc: loc.clone(), reason: "expected a Color".to_string() }),
        }
    }
}

/// Evaluate the raw body captured between a pair of `$` delimiters against
/// the whitelisted function/operator set from the external-interfaces
/// math-expression table. Identifiers resolve through `table` and must be
/// bound to a `Number`; anything else is `UndefinedIdentifier`.
pub fn eval(body: &str, loc: &SourceLocation, table: &IdTable) -> Result<MathValue, SourceError> {
    let mut parser = ExprParser { chars: body.chars().collect(), pos: 0, loc: loc.clone(), table };
    let value = parser.parse_expr()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(SourceError::InvalidExpression {
            loc: loc.clone(),
            reason: format!("unexpected trailing input at offset {}", parser.pos),
        });
    }
    check_finite(value, loc)
}

fn check_finite(value: MathValue, loc: &SourceLocation) -> Result<MathValue, SourceError> {
    let ok = match value {
        MathValue::Number(n) => n.is_finite(),
        MathValue::Point(p) => p.x.is_finite() && p.y.is_finite() && p.z.is_finite(),
        MathValue::Color(c) => c.r.is_finite() && c.g.is_finite() && c.b.is_finite(),
    };
    if ok {
        Ok(value)
    } else {
        Err(SourceError::InvalidExpression { loc: loc.clone(), reason: "result is NaN or infinite".to_string() })
    }
}

struct ExprParser<'a> {
    chars: Vec<char>,
    pos: usize,
    loc: SourceLocation,
    table: &'a IdTable,
}

impl<'a> ExprParser<'a> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.get(self.pos), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        self.skip_ws();
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect_char(&mut self, expected: char) -> Result<(), SourceError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            _ => Err(SourceError::InvalidExpression {
                loc: self.loc.clone(),
                reason: format!("expected {expected:?}"),
            }),
        }
    }

    fn err(&self, reason: impl Into<String>) -> SourceError {
        SourceError::InvalidExpression { loc: self.loc.clone(), reason: reason.into() }
    }

    /// `+`/`-` are left-associative, lowest precedence.
    fn parse_expr(&mut self) -> Result<MathValue, SourceError> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek() {
                Some('+') => {
                    self.bump();
                    lhs = add(lhs, self.parse_term()?, &self.loc)?;
                }
                Some('-') => {
                    self.bump();
                    lhs = sub(lhs, self.parse_term()?, &self.loc)?;
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    /// `*`, `/`, `div`, `%` — left-associative, above `+`/`-`.
    fn parse_term(&mut self) -> Result<MathValue, SourceError> {
        let mut lhs = self.parse_power()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.bump();
                    lhs = mul(lhs, self.parse_power()?, &self.loc)?;
                }
                Some('/') => {
                    self.bump();
                    let rhs = self.parse_power()?.as_number(&self.loc)?;
                    lhs = MathValue::Number(lhs.as_number(&self.loc)? / rhs);
                }
                _ if self.matches_word("div") => {
                    self.consume_word("div");
                    let lhs_n = lhs.as_number(&self.loc)?;
                    let rhs_n = self.parse_power()?.as_number(&self.loc)?;
                    lhs = MathValue::Number((lhs_n / rhs_n).trunc());
                }
                Some('%') => {
                    self.bump();
                    let lhs_n = lhs.as_number(&self.loc)?;
                    let rhs_n = self.parse_power()?.as_number(&self.loc)?;
                    lhs = MathValue::Number(lhs_n % rhs_n);
                }
                // A number directly adjacent to an identifier or a
                // parenthesized group (`2a`, `2(a+1)`) is implicit
                // multiplication, same as ordinary mathematical notation.
                Some(c) if c.is_alphabetic() || c == '_' || c == '(' => {
                    lhs = mul(lhs, self.parse_power()?, &self.loc)?;
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    /// `^` — right-associative, above `*`/`/`.
    fn parse_power(&mut self) -> Result<MathValue, SourceError> {
        let base = self.parse_unary()?;
        if self.peek() == Some('^') {
            self.bump();
            let exp = self.parse_power()?.as_number(&self.loc)?;
            let base_n = base.as_number(&self.loc)?;
            return Ok(MathValue::Number(base_n.powf(exp)));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<MathValue, SourceError> {
        if self.peek() == Some('-') {
            self.bump();
            let v = self.parse_unary()?;
            return negate(v, &self.loc);
        }
        self.parse_atom()
    }

    fn matches_word(&mut self, word: &str) -> bool {
        self.skip_ws();
        let rest: String = self.chars[self.pos..].iter().collect();
        rest.starts_with(word)
            && rest[word.len()..].chars().next().map_or(true, |c| !c.is_alphanumeric() && c != '_')
    }

    fn consume_word(&mut self, word: &str) {
        self.skip_ws();
        self.pos += word.len();
    }

    fn parse_atom(&mut self) -> Result<MathValue, SourceError> {
        match self.peek() {
            Some('(') => {
                self.bump();
                let v = self.parse_expr()?;
                self.expect_char(')')?;
                Ok(v)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_ident_or_call(),
            Some(c) => Err(self.err(format!("unexpected character {c:?}"))),
            None => Err(self.err("unexpected end of expression")),
        }
    }

    fn parse_number(&mut self) -> Result<MathValue, SourceError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.chars.get(self.pos), Some(c) if c.is_ascii_digit() || *c == '.') {
            self.pos += 1;
        }
        if matches!(self.chars.get(self.pos), Some('e') | Some('E')) {
            self.pos += 1;
            if matches!(self.chars.get(self.pos), Some('+') | Some('-')) {
                self.pos += 1;
            }
            while matches!(self.chars.get(self.pos), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(MathValue::Number)
            .map_err(|_| self.err(format!("invalid number {text:?}")))
    }

    fn parse_word(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.chars.get(self.pos), Some(c) if c.is_alphanumeric() || *c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_ident_or_call(&mut self) -> Result<MathValue, SourceError> {
        let word = self.parse_word();

        if self.peek() == Some('(') {
            return self.parse_call(&word);
        }

        match self.table.lookup_number(&word) {
            Some(n) => Ok(MathValue::Number(n)),
            None => Err(SourceError::UndefinedIdentifier { loc: self.loc.clone(), name: word }),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<f64>, SourceError> {
        self.expect_char('(')?;
        let mut args = Vec::new();
        if self.peek() != Some(')') {
            loop {
                args.push(self.parse_expr()?.as_number(&self.loc)?);
                if self.peek() == Some(',') {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect_char(')')?;
        Ok(args)
    }

    fn parse_call(&mut self, name: &str) -> Result<MathValue, SourceError> {
        if name == "Point" {
            self.expect_char('(')?;
            let x = self.parse_expr()?.as_number(&self.loc)?;
            self.expect_char(',')?;
            let y = self.parse_expr()?.as_number(&self.loc)?;
            self.expect_char(',')?;
            let z = self.parse_expr()?.as_number(&self.loc)?;
            self.expect_char(')')?;
            return Ok(MathValue::Point(Point::new(x, y, z)));
        }
        if name == "RGB" {
            self.expect_char('(')?;
            let r = self.parse_expr()?.as_number(&self.loc)?;
            self.expect_char(',')?;
            let g = self.parse_expr()?.as_number(&self.loc)?;
            self.expect_char(',')?;
            let b = self.parse_expr()?.as_number(&self.loc)?;
            self.expect_char(')')?;
            return Ok(MathValue::Color(Color::new(r as f32, g as f32, b as f32)));
        }

        let args = self.parse_args()?;
        let n = |i: usize| args[i];

        let result = match (name, args.len()) {
            ("floor", 1) => n(0).floor(),
            ("ceil", 1) => n(0).ceil(),
            ("round", 1) => n(0).round(),
            ("exp", 1) => n(0).exp(),
            ("exp2", 1) => n(0).exp2(),
            ("exp10", 1) => 10f64.powf(n(0)),
            ("log", 1) => n(0).ln(),
            ("log2", 1) => n(0).log2(),
            ("log10", 1) => n(0).log10(),
            ("log1p", 1) => n(0).ln_1p(),
            ("sin", 1) => n(0).sin(),
            ("cos", 1) => n(0).cos(),
            ("tan", 1) => n(0).tan(),
            ("asin", 1) => n(0).asin(),
            ("acos", 1) => n(0).acos(),
            ("atan", 1) => n(0).atan(),
            ("atan", 2) => n(0).atan2(n(1)),
            _ => return Err(self.err(format!("unknown function {name}/{}", args.len()))),
        };

        Ok(MathValue::Number(result))
    }
}

fn add(a: MathValue, b: MathValue, loc: &SourceLocation) -> Result<MathValue, SourceError> {
    match (a, b) {
        (MathValue::Number(x), MathValue::Number(y)) => Ok(MathValue::Number(x + y)),
        (MathValue::Point(p), MathValue::Number(_)) | (MathValue::Number(_), MathValue::Point(p)) => {
            Ok(MathValue::Point(p))
        }
        (MathValue::Color(x), MathValue::Color(y)) => Ok(MathValue::Color(x + y)),
        _ => Err(SourceError::InvalidExpression { loc: loc.clone(), reason: "mismatched operand types for +".to_string() }),
    }
}

fn sub(a: MathValue, b: MathValue, loc: &SourceLocation) -> Result<MathValue, SourceError> {
    match (a, b) {
        (MathValue::Number(x), MathValue::Number(y)) => Ok(MathValue::Number(x - y)),
        (MathValue::Color(x), MathValue::Color(y)) => Ok(MathValue::Color(x - y)),
        _ => Err(SourceError::InvalidExpression { loc: loc.clone(), reason: "mismatched operand types for -".to_string() }),
    }
}

fn mul(a: MathValue, b: MathValue, loc: &SourceLocation) -> Result<MathValue, SourceError> {
    match (a, b) {
        (MathValue::Number(x), MathValue::Number(y)) => Ok(MathValue::Number(x * y)),
        (MathValue::Color(c), MathValue::Number(s)) | (MathValue::Number(s), MathValue::Color(c)) => {
            Ok(MathValue::Color(c * (s as f32)))
        }
        _ => Err(SourceError::InvalidExpression { loc: loc.clone(), reason: "mismatched operand types for *".to_string() }),
    }
}

fn negate(v: MathValue, loc: &SourceLocation) -> Result<MathValue, SourceError> {
    match v {
        MathValue::Number(n) => Ok(MathValue::Number(-n)),
        _ => Err(SourceError::InvalidExpression { loc: loc.clone(), reason: "unary - only applies to numbers".to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new("test", 1, 1)
    }

    #[test]
    fn test_e1_scenario() {
        let mut table = IdTable::new();
        table.declare_number("a", 9.0, loc()).unwrap();

        let v = eval("1 + 2a", &loc(), &table).unwrap();
        assert_eq!(v, MathValue::Number(19.0));
    }

    #[test]
    fn test_e2_scenario_undefined_identifier() {
        let table = IdTable::new();
        let err = eval("1 + 2b", &loc(), &table).unwrap_err();
        assert!(matches!(err, SourceError::UndefinedIdentifier { name, .. } if name == "b"));
    }

    #[test]
    fn test_operator_precedence() {
        let table = IdTable::new();
        let v = eval("2 + 3 * 4", &loc(), &table).unwrap();
        assert_eq!(v, MathValue::Number(14.0));
    }

    #[test]
    fn test_power_is_right_associative() {
        let table = IdTable::new();
        let v = eval("2 ^ 3 ^ 2", &loc(), &table).unwrap();
        assert_eq!(v, MathValue::Number(512.0));
    }

    #[test]
    fn test_point_constructor() {
        let table = IdTable::new();
        let v = eval("Point(1, 2, 3)", &loc(), &table).unwrap();
        assert_eq!(v, MathValue::Point(Point::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_trig_and_atan2() {
        let table = IdTable::new();
        let v = eval("atan(1, 1)", &loc(), &table).unwrap();
        assert_eq!(v, MathValue::Number(std::f64::consts::FRAC_PI_4));
    }

    #[test]
    fn test_unknown_function_is_invalid_expression() {
        let table = IdTable::new();
        let err = eval("sqrt(4)", &loc(), &table).unwrap_err();
        assert!(matches!(err, SourceError::InvalidExpression { .. }));
    }

    #[test]
    fn test_division_by_zero_is_infinite_and_rejected() {
        let table = IdTable::new();
        let err = eval("1 / 0", &loc(), &table).unwrap_err();
        assert!(matches!(err, SourceError::InvalidExpression { .. }));
    }
}
