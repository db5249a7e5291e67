//! Entity-bound predicate accumulator behind the fluent query surface.

use crate::expr::{CompareOp, Expr, Token, parse};
use crate::select::base_select;
use relmap_core::{Command, Entity, Error, Field, Result, Value};
use std::sync::Arc;

/// Collects the WHERE clause of one query against one entity.
///
/// Column names are resolved through the entity (ignoring case) and values
/// are converted to column form as each condition is added. The first
/// problem is remembered and reported by [`Filter::build`], so nothing
/// malformed ever reaches a connection.
#[derive(Debug, Clone)]
pub struct Filter {
    entity: Arc<Entity>,
    started: bool,
    tokens: Vec<Token>,
    error: Option<String>,
}

impl Filter {
    pub fn new(entity: Arc<Entity>) -> Self {
        Self {
            entity,
            started: false,
            tokens: Vec::new(),
            error: None,
        }
    }

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    /// Start the WHERE clause.
    pub fn filter(&mut self) -> &mut Self {
        if self.started {
            self.fail("filter() called twice".to_string());
        }
        self.started = true;
        self
    }

    pub fn and(&mut self) -> &mut Self {
        self.push(Token::And)
    }

    pub fn or(&mut self) -> &mut Self {
        self.push(Token::Or)
    }

    pub fn not(&mut self) -> &mut Self {
        self.push(Token::Not)
    }

    pub fn begin_set(&mut self) -> &mut Self {
        self.push(Token::BeginSet)
    }

    pub fn end_set(&mut self) -> &mut Self {
        self.push(Token::EndSet)
    }

    /// Add `column <op> value`.
    pub fn compare(&mut self, column: &str, op: CompareOp, value: Value) -> &mut Self {
        let condition = self.field(column).and_then(|field| {
            Ok(Expr::Compare {
                column: field.column_name().to_string(),
                op,
                value: field.to_column_value(value)?,
            })
        });
        self.push_condition(condition)
    }

    /// Add `column [NOT] BETWEEN low AND high`.
    pub fn between(&mut self, column: &str, low: Value, high: Value, negated: bool) -> &mut Self {
        let condition = self.field(column).and_then(|field| {
            Ok(Expr::Between {
                column: field.column_name().to_string(),
                low: field.to_column_value(low)?,
                high: field.to_column_value(high)?,
                negated,
            })
        });
        self.push_condition(condition)
    }

    /// Add `column [NOT] LIKE pattern`.
    pub fn like(
        &mut self,
        column: &str,
        pattern: &str,
        negated: bool,
        case_sensitive: bool,
    ) -> &mut Self {
        let condition = self.field(column).map(|field| Expr::Like {
            column: field.column_name().to_string(),
            pattern: Value::Text(pattern.to_string()),
            negated,
            case_sensitive,
        });
        self.push_condition(condition)
    }

    /// Add `column [NOT] IN (values)`.
    pub fn in_list(&mut self, column: &str, values: Vec<Value>, negated: bool) -> &mut Self {
        let condition = self.field(column).and_then(|field| {
            Ok(Expr::In {
                column: field.column_name().to_string(),
                values: values
                    .into_iter()
                    .map(|v| field.to_column_value(v))
                    .collect::<Result<_>>()?,
                negated,
            })
        });
        self.push_condition(condition)
    }

    /// Add `column IS [NOT] NULL`.
    pub fn is_null(&mut self, column: &str, negated: bool) -> &mut Self {
        let condition = self.field(column).map(|field| Expr::IsNull {
            column: field.column_name().to_string(),
            negated,
        });
        self.push_condition(condition)
    }

    /// The parsed WHERE expression, if [`Filter::filter`] was called.
    pub fn expression(&self) -> Result<Option<Expr>> {
        if let Some(message) = &self.error {
            return Err(Error::syntax(message.clone()));
        }
        if !self.started {
            return Ok(None);
        }
        parse(&self.tokens).map(Some)
    }

    /// Build the query command: the entity's base select plus the WHERE
    /// clause.
    pub fn build(&self) -> Result<Command> {
        let mut sql = base_select(&self.entity)?;
        let mut params = Vec::new();
        if let Some(expr) = self.expression()? {
            sql.push_str(" WHERE ");
            sql.push_str(&expr.build(&mut params));
        }

        let mut command = Command::new(sql);
        for (name, value) in params {
            command.push_param(name, value);
        }
        Ok(command)
    }

    fn field(&self, column: &str) -> Result<&Field> {
        self.entity.field_by_name(column).ok_or_else(|| {
            Error::syntax(format!(
                "`{}` has no column `{}`",
                self.entity.name(),
                column
            ))
        })
    }

    fn push(&mut self, token: Token) -> &mut Self {
        if !self.started {
            self.fail(format!(
                "{} used before filter()",
                match token {
                    Token::Condition(_) => "condition",
                    _ => "connective",
                }
            ));
        }
        self.tokens.push(token);
        self
    }

    fn push_condition(&mut self, condition: Result<Expr>) -> &mut Self {
        match condition {
            Ok(expr) => self.push(Token::Condition(expr)),
            Err(e) => {
                self.fail(e.to_string());
                self
            }
        }
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            tracing::debug!(
                entity = self.entity.name(),
                error = %message,
                "Rejected query predicate"
            );
            self.error = Some(message);
        }
    }
}
