//! Backend-neutral query representation.
//!
//! A query is a tree of terms joined by conjunctions. It carries no backend
//! syntax; a [`QueryBuilder`] compiles the tree into whatever the target
//! backend executes, rejecting constructs the backend cannot express instead
//! of silently degrading them.

pub mod doc;
pub mod eval;

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    InvalidQueryType(String),

    #[error("invalid term value: {0}")]
    InvalidTermValue(String),

    #[error("operator {0} is not supported by this backend")]
    UnsupportedOperator(Operator),

    #[error("conjunction {0} is not supported by this backend")]
    UnsupportedConjunction(Conjunction),

    #[error("value is not representable in this backend: {0}")]
    UnsupportedValueForBackend(String),
}

/// A typed term operand. Values are normalized at construction; a query can
/// never hold a NaN float or a nested list.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    fn normalized(self) -> Result<Value, QueryError> {
        match self {
            Value::Float(f) if f.is_nan() => {
                Err(QueryError::InvalidTermValue("NaN is not comparable".into()))
            }
            Value::List(items) => {
                let items = items
                    .into_iter()
                    .map(|item| match item {
                        Value::List(_) => Err(QueryError::InvalidTermValue(
                            "lists cannot be nested".into(),
                        )),
                        other => other.normalized(),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(items))
            }
            other => Ok(other),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Is,
    Not,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Is => "is",
            Operator::Not => "not",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "not-in",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Conjunction::And => "and",
            Conjunction::Or => "or",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConjunctionQuery {
    pub conjunction: Conjunction,
    pub subqueries: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(TermQuery),
    Conjunction(ConjunctionQuery),
}

impl Query {
    /// A single field/operator/value term. List values are only valid with
    /// the membership operators, and vice versa.
    pub fn term(field: &str, operator: Operator, value: impl Into<Value>) -> Result<Query, QueryError> {
        let value = value.into().normalized()?;
        let is_list = matches!(value, Value::List(_));
        let wants_list = matches!(operator, Operator::In | Operator::NotIn);
        if wants_list && !is_list {
            return Err(QueryError::InvalidTermValue(format!(
                "operator {} requires a list value",
                operator
            )));
        }
        if is_list && !wants_list {
            return Err(QueryError::InvalidTermValue(format!(
                "operator {} cannot take a list value",
                operator
            )));
        }
        Ok(Query::Term(TermQuery { field: field.to_string(), operator, value }))
    }

    /// Join at least two subqueries under one conjunction.
    pub fn conjunct(conjunction: Conjunction, subqueries: Vec<Query>) -> Result<Query, QueryError> {
        if subqueries.len() < 2 {
            return Err(QueryError::InvalidQueryType(format!(
                "conjunction {} requires at least two subqueries, got {}",
                conjunction,
                subqueries.len()
            )));
        }
        Ok(Query::Conjunction(ConjunctionQuery { conjunction, subqueries }))
    }

    pub fn and(subqueries: Vec<Query>) -> Result<Query, QueryError> {
        Query::conjunct(Conjunction::And, subqueries)
    }

    pub fn or(subqueries: Vec<Query>) -> Result<Query, QueryError> {
        Query::conjunct(Conjunction::Or, subqueries)
    }

    /// Grow an existing conjunction in place.
    pub fn append(&mut self, subquery: Query) -> Result<(), QueryError> {
        match self {
            Query::Conjunction(conj) => {
                conj.subqueries.push(subquery);
                Ok(())
            }
            Query::Term(_) => {
                Err(QueryError::InvalidQueryType("cannot append to a term query".into()))
            }
        }
    }

    /// Depth-first walk over every node, the node itself first.
    pub fn iter(&self) -> QueryIter<'_> {
        QueryIter { stack: vec![self] }
    }
}

pub struct QueryIter<'a> {
    stack: Vec<&'a Query>,
}

impl<'a> Iterator for QueryIter<'a> {
    type Item = &'a Query;

    fn next(&mut self) -> Option<&'a Query> {
        let node = self.stack.pop()?;
        if let Query::Conjunction(conj) = node {
            for sub in conj.subqueries.iter().rev() {
                self.stack.push(sub);
            }
        }
        Some(node)
    }
}

/// Compiles a [`Query`] into one backend's native filter form. Builders must
/// fail fast on anything the backend cannot express.
pub trait QueryBuilder {
    type Output;

    fn build(&self, query: &Query) -> Result<Self::Output, QueryError>;
}
