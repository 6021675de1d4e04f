//! Rule DSL parser.
//!
//! Recursive descent parser for the rule grammar. Converts text to a
//! series-independent AST ([`RuleExpr`]); [`crate::domain::rule_builder`] binds
//! it to a series. Errors carry the character offset plus the expected and
//! found tokens.
//!
//! ```text
//! rule    := CROSS_ABOVE(operand, operand) | CROSS_BELOW(operand, operand)
//!          | STOP_LOSS(source, number) | STOP_GAIN(source, number)
//!          | AND(rule, rule, ...) | OR(rule, rule, ...) | NOT(rule)
//! operand := number | source
//! source  := open | high | low | close | volume | typical
//!          | SMA(integer[, source]) | EMA(integer[, source])
//! ```
//!
//! Keywords are upper case, price fields lower case. Numbers are kept as the
//! literal text so that decimal runs parse them without a float round trip.

use std::fmt;

use crate::domain::bar::PriceField;
use crate::domain::error::ParseError;

/// Indicator identity plus parameters; equal specs share one instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorSpec {
    Sma { window: usize, source: Source },
    Ema { window: usize, source: Source },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Price(PriceField),
    Indicator(Box<IndicatorSpec>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandExpr {
    Source(Source),
    /// Literal number text, e.g. `"800"` or `"-0.5"`.
    Constant(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpr {
    CrossAbove {
        left: OperandExpr,
        right: OperandExpr,
    },
    CrossBelow {
        left: OperandExpr,
        right: OperandExpr,
    },
    StopLoss {
        price: Source,
        percent: String,
    },
    StopGain {
        price: Source,
        percent: String,
    },
    And(Vec<RuleExpr>),
    Or(Vec<RuleExpr>),
    Not(Box<RuleExpr>),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Price(field) => write!(f, "{}", field),
            Source::Indicator(spec) => write!(f, "{}", spec),
        }
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, window, source) = match self {
            IndicatorSpec::Sma { window, source } => ("SMA", window, source),
            IndicatorSpec::Ema { window, source } => ("EMA", window, source),
        };
        match source {
            Source::Price(PriceField::Close) => write!(f, "{}({})", name, window),
            other => write!(f, "{}({}, {})", name, window, other),
        }
    }
}

impl fmt::Display for OperandExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandExpr::Source(source) => write!(f, "{}", source),
            OperandExpr::Constant(text) => f.write_str(text),
        }
    }
}

impl fmt::Display for RuleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, rules: &[RuleExpr]) -> fmt::Result {
            write!(f, "{}(", name)?;
            for (i, rule) in rules.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", rule)?;
            }
            f.write_str(")")
        }

        match self {
            RuleExpr::CrossAbove { left, right } => write!(f, "CROSS_ABOVE({}, {})", left, right),
            RuleExpr::CrossBelow { left, right } => write!(f, "CROSS_BELOW({}, {})", left, right),
            RuleExpr::StopLoss { price, percent } => write!(f, "STOP_LOSS({}, {})", price, percent),
            RuleExpr::StopGain { price, percent } => write!(f, "STOP_GAIN({}, {})", price, percent),
            RuleExpr::And(rules) => list(f, "AND", rules),
            RuleExpr::Or(rules) => list(f, "OR", rules),
            RuleExpr::Not(rule) => write!(f, "NOT({})", rule),
        }
    }
}

impl RuleExpr {
    /// Every indicator referenced anywhere in the expression, outermost first.
    pub fn indicators(&self) -> Vec<IndicatorSpec> {
        let mut out = Vec::new();
        self.collect_indicators(&mut out);
        out
    }

    fn collect_indicators(&self, out: &mut Vec<IndicatorSpec>) {
        fn from_source(source: &Source, out: &mut Vec<IndicatorSpec>) {
            if let Source::Indicator(spec) = source {
                if !out.contains(spec) {
                    out.push((**spec).clone());
                }
                let (IndicatorSpec::Sma { source, .. } | IndicatorSpec::Ema { source, .. }) =
                    spec.as_ref();
                from_source(source, out);
            }
        }
        fn from_operand(operand: &OperandExpr, out: &mut Vec<IndicatorSpec>) {
            if let OperandExpr::Source(source) = operand {
                from_source(source, out);
            }
        }

        match self {
            RuleExpr::CrossAbove { left, right } | RuleExpr::CrossBelow { left, right } => {
                from_operand(left, out);
                from_operand(right, out);
            }
            RuleExpr::StopLoss { price, .. } | RuleExpr::StopGain { price, .. } => {
                from_source(price, out);
            }
            RuleExpr::And(rules) | RuleExpr::Or(rules) => {
                for rule in rules {
                    rule.collect_indicators(out);
                }
            }
            RuleExpr::Not(rule) => rule.collect_indicators(out),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            let found = self.peek_word();
            Err(self.error(format!("expected '{}', found '{}'", keyword, found)))
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|ch| ch.is_alphanumeric() || *ch == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        if text.is_empty() {
            return Err(ParseError {
                message: format!("expected integer, found '{}'", self.peek_word()),
                position: start,
            });
        }
        text.parse::<usize>().map_err(|_| ParseError {
            message: format!("invalid integer: {}", text),
            position: start,
        })
    }

    fn parse_source(&mut self) -> Result<Source, ParseError> {
        self.skip_whitespace();
        if self.peek_keyword("SMA") || self.peek_keyword("EMA") {
            return self.parse_indicator().map(|spec| Source::Indicator(Box::new(spec)));
        }

        let word = self.peek_word();
        match word.parse::<PriceField>() {
            Ok(field) if word.chars().all(|c| c.is_ascii_lowercase()) => {
                self.pos += word.len();
                Ok(Source::Price(field))
            }
            _ => Err(self.error(format!(
                "expected price field (open, high, low, close, volume, typical) or indicator, found '{}'",
                word
            ))),
        }
    }

    fn parse_indicator(&mut self) -> Result<IndicatorSpec, ParseError> {
        let is_sma = self.peek_keyword("SMA");
        self.expect_keyword(if is_sma { "SMA" } else { "EMA" })?;
        self.expect_char('(')?;
        let window = self.parse_integer()?;

        self.skip_whitespace();
        let source = if self.peek() == Some(',') {
            self.advance();
            self.parse_source()?
        } else {
            Source::Price(PriceField::Close)
        };
        self.expect_char(')')?;

        Ok(if is_sma {
            IndicatorSpec::Sma { window, source }
        } else {
            IndicatorSpec::Ema { window, source }
        })
    }

    fn parse_operand(&mut self) -> Result<OperandExpr, ParseError> {
        self.skip_whitespace();
        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return self.parse_number().map(OperandExpr::Constant);
        }
        self.parse_source().map(OperandExpr::Source)
    }

    fn parse_cross(&mut self, keyword: &str) -> Result<RuleExpr, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;

        Ok(match keyword {
            "CROSS_ABOVE" => RuleExpr::CrossAbove { left, right },
            _ => RuleExpr::CrossBelow { left, right },
        })
    }

    fn parse_stop(&mut self, keyword: &str) -> Result<RuleExpr, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let price = self.parse_source()?;
        self.expect_char(',')?;
        let percent = self.parse_number()?;
        self.expect_char(')')?;

        Ok(match keyword {
            "STOP_LOSS" => RuleExpr::StopLoss { price, percent },
            _ => RuleExpr::StopGain { price, percent },
        })
    }

    fn parse_list(&mut self, keyword: &str) -> Result<Vec<RuleExpr>, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut rules = vec![self.parse_rule()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }

        if rules.len() < 2 {
            return Err(self.error(format!("{} requires at least 2 rules", keyword)));
        }
        Ok(rules)
    }

    fn parse_not(&mut self) -> Result<RuleExpr, ParseError> {
        self.expect_keyword("NOT")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(')')?;
        Ok(RuleExpr::Not(Box::new(rule)))
    }

    fn parse_rule(&mut self) -> Result<RuleExpr, ParseError> {
        self.skip_whitespace();

        for keyword in ["CROSS_ABOVE", "CROSS_BELOW"] {
            if self.peek_keyword(keyword) {
                return self.parse_cross(keyword);
            }
        }
        for keyword in ["STOP_LOSS", "STOP_GAIN"] {
            if self.peek_keyword(keyword) {
                return self.parse_stop(keyword);
            }
        }
        if self.peek_keyword("AND") {
            return self.parse_list("AND").map(RuleExpr::And);
        }
        if self.peek_keyword("OR") {
            return self.parse_list("OR").map(RuleExpr::Or);
        }
        if self.peek_keyword("NOT") {
            return self.parse_not();
        }

        let word = self.peek_word();
        Err(self.error(format!("expected rule, found '{}'", word)))
    }

    fn parse(&mut self) -> Result<RuleExpr, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after rule: '{}'",
                self.remaining()
            )));
        }
        Ok(rule)
    }
}

pub fn parse(input: &str) -> Result<RuleExpr, ParseError> {
    Parser::new(input).parse()
}
