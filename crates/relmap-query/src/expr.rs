//! Predicate expressions for ad-hoc queries.
//!
//! The fluent query surface records a flat sequence of [`Token`]s. [`parse`]
//! turns that sequence into an [`Expr`] tree, rejecting malformed sequences
//! before any SQL exists, and [`Expr::build`] renders the tree with named
//! `:p<n>` parameters.

use relmap_core::{Error, Result, Value};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
}

impl CompareOp {
    /// Get the SQL representation of this operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A WHERE-clause expression tree.
///
/// Column names are stored exactly as they should appear in SQL; values are
/// already in column form.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// column <op> value
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },

    /// column [NOT] BETWEEN low AND high
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },

    /// column [NOT] LIKE pattern, optionally ignoring case
    Like {
        column: String,
        pattern: Value,
        negated: bool,
        case_sensitive: bool,
    },

    /// column [NOT] IN (values)
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },

    /// column IS [NOT] NULL
    IsNull { column: String, negated: bool },

    /// Logical AND
    And(Box<Expr>, Box<Expr>),

    /// Logical OR
    Or(Box<Expr>, Box<Expr>),

    /// Logical NOT
    Not(Box<Expr>),

    /// Explicit grouping
    Group(Box<Expr>),
}

impl Expr {
    /// Combine with AND.
    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    /// Combine with OR.
    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Negate.
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Wrap in parentheses.
    pub fn group(self) -> Self {
        Expr::Group(Box::new(self))
    }

    /// Binding strength when rendered; higher binds tighter.
    const fn precedence(&self) -> u8 {
        match self {
            Expr::Or(..) => 1,
            Expr::And(..) => 2,
            Expr::Not(_) => 3,
            _ => 4,
        }
    }

    /// Render to SQL, appending parameters to `params`.
    ///
    /// Placeholders are numbered from the current length of `params`, so a
    /// caller can render several expressions into one command.
    pub fn build(&self, params: &mut Vec<(String, Value)>) -> String {
        match self {
            Expr::Compare { column, op, value } => {
                let p = push(params, value.clone());
                format!("{column} {} {p}", op.as_str())
            }

            Expr::Between {
                column,
                low,
                high,
                negated,
            } => {
                let low = push(params, low.clone());
                let high = push(params, high.clone());
                let not_str = if *negated { "NOT " } else { "" };
                format!("{column} {not_str}BETWEEN {low} AND {high}")
            }

            Expr::Like {
                column,
                pattern,
                negated,
                case_sensitive,
            } => {
                let p = push(params, pattern.clone());
                let not_str = if *negated { "NOT " } else { "" };
                if *case_sensitive {
                    format!("{column} {not_str}LIKE {p}")
                } else {
                    format!("LOWER({column}) {not_str}LIKE LOWER({p})")
                }
            }

            Expr::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // Nothing is a member of the empty set.
                    let constant = if *negated { "1 = 1" } else { "1 = 0" };
                    return constant.to_string();
                }
                let placeholders: Vec<_> = values
                    .iter()
                    .map(|v| push(params, v.clone()))
                    .collect();
                let not_str = if *negated { "NOT " } else { "" };
                format!("{column} {not_str}IN ({})", placeholders.join(", "))
            }

            Expr::IsNull { column, negated } => {
                let not_str = if *negated { " NOT" } else { "" };
                format!("{column} IS{not_str} NULL")
            }

            Expr::And(left, right) => {
                let left = left.build_within(self.precedence(), params);
                let right = right.build_within(self.precedence(), params);
                format!("{left} AND {right}")
            }

            Expr::Or(left, right) => {
                let left = left.build_within(self.precedence(), params);
                let right = right.build_within(self.precedence(), params);
                format!("{left} OR {right}")
            }

            Expr::Not(inner) => {
                let inner = inner.build_within(self.precedence(), params);
                format!("NOT {inner}")
            }

            Expr::Group(inner) => format!("({})", inner.build(params)),
        }
    }

    fn build_within(&self, parent: u8, params: &mut Vec<(String, Value)>) -> String {
        if self.precedence() < parent {
            format!("({})", self.build(params))
        } else {
            self.build(params)
        }
    }
}

fn push(params: &mut Vec<(String, Value)>, value: Value) -> String {
    let name = format!(":p{}", params.len());
    params.push((name.clone(), value));
    name
}

/// One step of a fluent predicate sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    And,
    Or,
    Not,
    /// Opening parenthesis
    BeginSet,
    /// Closing parenthesis
    EndSet,
    /// A leaf condition (comparison, BETWEEN, LIKE, IN or IS NULL)
    Condition(Expr),
}

impl Token {
    fn describe(&self) -> &'static str {
        match self {
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::BeginSet => "begin_set",
            Token::EndSet => "end_set",
            Token::Condition(_) => "a condition",
        }
    }
}

/// Parse a token sequence into an expression tree.
///
/// Precedence follows SQL: NOT binds tighter than AND, which binds tighter
/// than OR. Sets become [`Expr::Group`] nodes.
pub fn parse(tokens: &[Token]) -> Result<Expr> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(Token::EndSet) => Err(Error::syntax("end_set without a matching begin_set")),
        Some(token) => Err(Error::syntax(format!(
            "expected AND or OR before {}",
            token.describe()
        ))),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut expr = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            expr = expr.or(self.and_expr()?);
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut expr = self.not_expr()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            expr = expr.and(self.not_expr()?);
        }
        Ok(expr)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(self.not_expr()?.not());
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Condition(expr)) => Ok(expr.clone()),
            Some(Token::BeginSet) => {
                if self.peek() == Some(&Token::EndSet) {
                    return Err(Error::syntax("empty set"));
                }
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::EndSet) => Ok(inner.group()),
                    _ => Err(Error::syntax("begin_set without a matching end_set")),
                }
            }
            Some(token) => Err(Error::syntax(format!(
                "expected a condition, found {}",
                token.describe()
            ))),
            None => Err(Error::syntax("expected a condition, found end of input")),
        }
    }
}
