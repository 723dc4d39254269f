//! Parser for the OQL subset produced by the compiler
//!
//! ```text
//! SELECT * FROM /people WHERE (age >= $1 AND name LIKE 'A%') ORDER BY age DESC LIMIT 10
//! SELECT DISTINCT e.key FROM /people.entries e WHERE e.value.age > 30L
//! ```
//!
//! Placeholders are resolved against the bound parameters while parsing.

use super::filter::{like_to_regex, Filter};
use criteria_core::Value;

/// What a query returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// `SELECT *`: stored values
    All,
    /// `SELECT DISTINCT e.key`: keys of matching entries
    Keys,
}

/// One `ORDER BY` segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Parsed query
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub projection: Projection,
    pub region: String,
    pub filter: Filter,
    pub order_by: Vec<SortKey>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Identifier or keyword, possibly dotted
    Word(String),
    /// `/region` or `/region.entries`
    RegionPath(String),
    Param(usize),
    Str(String),
    Int { value: i64, long: bool },
    Float(f64),
    Star,
    LParen,
    RParen,
    Comma,
    Cmp(Comparison),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// OQL parser
pub struct OqlParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    params: &'a [Value],
    /// `e.value.` when selecting keys over `region.entries e`
    value_prefix: Option<String>,
}

impl<'a> OqlParser<'a> {
    /// Parse a query, binding `params` to `$1..$n`
    pub fn parse(oql: &str, params: &'a [Value]) -> Result<ParsedQuery, OqlParseError> {
        let mut parser = OqlParser {
            tokens: tokenize(oql)?,
            pos: 0,
            params,
            value_prefix: None,
        };
        parser.parse_query()
    }

    fn parse_query(&mut self) -> Result<ParsedQuery, OqlParseError> {
        self.expect_keyword("SELECT")?;

        let projection = if self.eat_keyword("DISTINCT") {
            Projection::Keys
        } else {
            self.expect(&Token::Star, "*")?;
            Projection::All
        };
        let key_alias = match projection {
            Projection::Keys => {
                let key = self.expect_word("alias.key")?;
                let alias = key
                    .strip_suffix(".key")
                    .filter(|alias| !alias.is_empty() && !alias.contains('.'))
                    .ok_or(OqlParseError::UnexpectedToken {
                        expected: "alias.key",
                        found: key.clone(),
                    })?;
                Some(alias.to_string())
            }
            Projection::All => None,
        };

        self.expect_keyword("FROM")?;
        let region = match (self.next(), &key_alias) {
            (Some(Token::RegionPath(path)), None) => path,
            (Some(Token::RegionPath(path)), Some(alias)) => {
                let region = path
                    .strip_suffix(".entries")
                    .ok_or(OqlParseError::UnexpectedToken {
                        expected: "region.entries",
                        found: path.clone(),
                    })?
                    .to_string();
                let found = self.expect_word("entry alias")?;
                if &found != alias {
                    return Err(OqlParseError::UnexpectedToken {
                        expected: "entry alias",
                        found,
                    });
                }
                self.value_prefix = Some(format!("{alias}.value."));
                region
            }
            (Some(other), _) => {
                return Err(OqlParseError::UnexpectedToken {
                    expected: "region path",
                    found: describe(&other),
                })
            }
            (None, _) => return Err(OqlParseError::UnexpectedEnd { expected: "region path" }),
        };

        let filter = if self.eat_keyword("WHERE") {
            self.parse_or()?
        } else {
            Filter::Empty
        };

        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let field = self.parse_field()?;
                let descending = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                order_by.push(SortKey { field, descending });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        let limit = if self.eat_keyword("LIMIT") {
            Some(self.parse_count("limit")?)
        } else {
            None
        };
        let offset = if self.eat_keyword("OFFSET") {
            Some(self.parse_count("offset")?)
        } else {
            None
        };

        if let Some(token) = self.next() {
            return Err(OqlParseError::UnexpectedToken {
                expected: "end of query",
                found: describe(&token),
            });
        }

        Ok(ParsedQuery {
            projection,
            region,
            filter,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_or(&mut self) -> Result<Filter, OqlParseError> {
        let mut branches = vec![self.parse_and()?];
        while self.eat_keyword("OR") {
            branches.push(self.parse_and()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            Filter::Or(branches)
        })
    }

    fn parse_and(&mut self) -> Result<Filter, OqlParseError> {
        let mut terms = vec![self.parse_unary()?];
        while self.eat_keyword("AND") {
            terms.push(self.parse_unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::And(terms)
        })
    }

    fn parse_unary(&mut self) -> Result<Filter, OqlParseError> {
        if self.eat_keyword("NOT") {
            return Ok(Filter::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Filter, OqlParseError> {
        if self.eat(&Token::LParen) {
            let inner = self.parse_or()?;
            self.expect(&Token::RParen, ")")?;
            return Ok(inner);
        }

        for (keyword, defined) in [("IS_DEFINED", true), ("IS_UNDEFINED", false)] {
            if self.eat_keyword(keyword) {
                self.expect(&Token::LParen, "(")?;
                let field = self.parse_field()?;
                self.expect(&Token::RParen, ")")?;
                return Ok(Filter::Defined { field, defined });
            }
        }

        let field = self.parse_field()?;

        if self.eat_keyword("IN") {
            let values = match self.parse_operand()? {
                Value::Array(values) => values,
                single => vec![single],
            };
            return Ok(Filter::In { field, values });
        }

        if self.eat_keyword("LIKE") {
            let pattern = match self.parse_operand()? {
                Value::String(pattern) => pattern,
                other => {
                    return Err(OqlParseError::UnexpectedToken {
                        expected: "string pattern",
                        found: other.to_string(),
                    })
                }
            };
            let pattern = like_to_regex(&pattern)
                .map_err(|e| OqlParseError::InvalidPattern(e.to_string()))?;
            return Ok(Filter::Like { field, pattern });
        }

        let comparison = match self.next() {
            Some(Token::Cmp(comparison)) => comparison,
            Some(other) => {
                return Err(OqlParseError::UnexpectedToken {
                    expected: "comparison operator",
                    found: describe(&other),
                })
            }
            None => {
                return Err(OqlParseError::UnexpectedEnd {
                    expected: "comparison operator",
                })
            }
        };
        let value = self.parse_operand()?;

        if value.is_null() {
            return match comparison {
                Comparison::Eq => Ok(Filter::IsNull { field }),
                Comparison::Ne => Ok(Filter::Not(Box::new(Filter::IsNull { field }))),
                _ => Err(OqlParseError::UnexpectedToken {
                    expected: "non-null operand",
                    found: "NULL".to_string(),
                }),
            };
        }

        Ok(match comparison {
            Comparison::Eq => Filter::Eq { field, value },
            Comparison::Ne => Filter::Ne { field, value },
            Comparison::Lt => Filter::Lt { field, value },
            Comparison::Le => Filter::Lte { field, value },
            Comparison::Gt => Filter::Gt { field, value },
            Comparison::Ge => Filter::Gte { field, value },
        })
    }

    fn parse_field(&mut self) -> Result<String, OqlParseError> {
        let word = self.expect_word("field")?;
        match &self.value_prefix {
            None => Ok(word),
            Some(prefix) => word
                .strip_prefix(prefix.as_str())
                .map(str::to_string)
                .ok_or(OqlParseError::UnexpectedToken {
                    expected: "entry value field",
                    found: word.clone(),
                }),
        }
    }

    fn parse_operand(&mut self) -> Result<Value, OqlParseError> {
        match self.next() {
            Some(Token::Param(index)) => index
                .checked_sub(1)
                .and_then(|i| self.params.get(i))
                .cloned()
                .ok_or(OqlParseError::UnboundParameter {
                    index,
                    provided: self.params.len(),
                }),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Int { value, long: true }) => Ok(Value::Int64(value)),
            Some(Token::Int { value, long: false }) => Ok(i32::try_from(value)
                .map(Value::Int32)
                .unwrap_or(Value::Int64(value))),
            Some(Token::Float(f)) => Ok(Value::Float64(f)),
            Some(Token::Word(word)) => match word.to_ascii_uppercase().as_str() {
                "TRUE" => Ok(Value::Bool(true)),
                "FALSE" => Ok(Value::Bool(false)),
                "NULL" => Ok(Value::Null),
                "SET" => {
                    self.expect(&Token::LParen, "(")?;
                    let mut items = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            items.push(self.parse_operand()?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            self.expect(&Token::Comma, ",")?;
                        }
                    }
                    Ok(Value::Array(items))
                }
                _ => Err(OqlParseError::UnexpectedToken {
                    expected: "operand",
                    found: word,
                }),
            },
            Some(other) => Err(OqlParseError::UnexpectedToken {
                expected: "operand",
                found: describe(&other),
            }),
            None => Err(OqlParseError::UnexpectedEnd { expected: "operand" }),
        }
    }

    fn parse_count(&mut self, expected: &'static str) -> Result<u64, OqlParseError> {
        match self.next() {
            Some(Token::Int { value, .. }) if value >= 0 => Ok(value as u64),
            Some(other) => Err(OqlParseError::UnexpectedToken {
                expected,
                found: describe(&other),
            }),
            None => Err(OqlParseError::UnexpectedEnd { expected }),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), OqlParseError> {
        if self.eat(token) {
            return Ok(());
        }
        Err(self.unexpected(expected))
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), OqlParseError> {
        if self.eat_keyword(keyword) {
            return Ok(());
        }
        Err(self.unexpected(keyword))
    }

    fn expect_word(&mut self, expected: &'static str) -> Result<String, OqlParseError> {
        match self.peek() {
            Some(Token::Word(word)) => {
                let word = word.clone();
                self.pos += 1;
                Ok(word)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn unexpected(&self, expected: &'static str) -> OqlParseError {
        match self.peek() {
            Some(token) => OqlParseError::UnexpectedToken {
                expected,
                found: describe(token),
            },
            None => OqlParseError::UnexpectedEnd { expected },
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Word(w) | Token::RegionPath(w) => w.clone(),
        Token::Param(i) => format!("${i}"),
        Token::Str(s) => format!("'{s}'"),
        Token::Int { value, long } => format!("{value}{}", if *long { "L" } else { "" }),
        Token::Float(f) => f.to_string(),
        Token::Star => "*".to_string(),
        Token::LParen => "(".to_string(),
        Token::RParen => ")".to_string(),
        Token::Comma => ",".to_string(),
        Token::Cmp(c) => format!("{c:?}"),
    }
}

/// Length of an `e[+-]digits` suffix at the start of `rest`, or 0
fn exponent_len(rest: &[char]) -> usize {
    if !matches!(rest.first(), Some('e' | 'E')) {
        return 0;
    }
    let sign = usize::from(matches!(rest.get(1), Some('+' | '-')));
    let digits = rest[1 + sign..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 {
        0
    } else {
        1 + sign + digits
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '.'
}

fn tokenize(input: &str) -> Result<Vec<Token>, OqlParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Cmp(Comparison::Eq));
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Cmp(Comparison::Ne));
                i += 2;
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push(Token::Cmp(Comparison::Le));
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Cmp(Comparison::Ne));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Cmp(Comparison::Lt));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Cmp(Comparison::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Cmp(Comparison::Gt));
                    i += 1;
                }
            }
            '\'' => {
                let start = i;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            text.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(c) => {
                            text.push(*c);
                            i += 1;
                        }
                        None => return Err(OqlParseError::UnterminatedString(start)),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                let digits: String = chars[start..end].iter().collect();
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| OqlParseError::InvalidNumber(format!("${digits}")))?;
                tokens.push(Token::Param(index));
                i = end;
            }
            '/' => {
                let start = i;
                i += 1;
                while i < chars.len() && (is_word_char(chars[i]) || chars[i] == '/') {
                    i += 1;
                }
                tokens.push(Token::RegionPath(chars[start..i].iter().collect()));
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let exponent = exponent_len(&chars[i..]);
                i += exponent;
                let text: String = chars[start..i].iter().collect();
                if exponent > 0 || text.contains('.') {
                    let value = text
                        .parse::<f64>()
                        .map_err(|_| OqlParseError::InvalidNumber(text.clone()))?;
                    tokens.push(Token::Float(value));
                } else {
                    let long = matches!(chars.get(i), Some('L' | 'l'));
                    if long {
                        i += 1;
                    }
                    let value = text
                        .parse::<i64>()
                        .map_err(|_| OqlParseError::InvalidNumber(text.clone()))?;
                    tokens.push(Token::Int { value, long });
                }
            }
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => {
                return Err(OqlParseError::UnexpectedChar {
                    ch: other,
                    position: i,
                })
            }
        }
    }

    Ok(tokens)
}

/// OQL parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OqlParseError {
    #[error("Unexpected character '{ch}' at {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("Unterminated string starting at {0}")]
    UnterminatedString(usize),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("Expected {expected}, found end of query")]
    UnexpectedEnd { expected: &'static str },

    #[error("Parameter ${index} is not bound ({provided} provided)")]
    UnboundParameter { index: usize, provided: usize },

    #[error("Invalid LIKE pattern: {0}")]
    InvalidPattern(String),
}
