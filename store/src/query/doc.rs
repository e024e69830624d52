//! Query compilation for the document backend's JSON filter dialect.

use super::{Conjunction, Operator, Query, QueryBuilder, QueryError, TermQuery, Value};
use serde_json::json;

/// Compiles a query into the mongo-style filter the document backend's
/// `find` evaluates.
pub struct DocFilterBuilder;

impl QueryBuilder for DocFilterBuilder {
    type Output = serde_json::Value;

    fn build(&self, query: &Query) -> Result<serde_json::Value, QueryError> {
        match query {
            Query::Term(term) => build_term(term),
            Query::Conjunction(conj) => {
                let subs = conj
                    .subqueries
                    .iter()
                    .map(|sub| self.build(sub))
                    .collect::<Result<Vec<_>, _>>()?;
                let key = match conj.conjunction {
                    Conjunction::And => "$and",
                    Conjunction::Or => "$or",
                };
                Ok(json!({ key: subs }))
            }
        }
    }
}

fn build_term(term: &TermQuery) -> Result<serde_json::Value, QueryError> {
    let operand = json_value(&term.value)?;
    let condition = match term.operator {
        Operator::Is => json!({ "$eq": operand }),
        Operator::Not => json!({ "$ne": operand }),
        Operator::Gt => json!({ "$gt": operand }),
        Operator::Gte => json!({ "$gte": operand }),
        Operator::Lt => json!({ "$lt": operand }),
        Operator::Lte => json!({ "$lte": operand }),
        Operator::In => json!({ "$in": operand }),
        Operator::NotIn => json!({ "$not": { "$in": operand } }),
    };
    Ok(json!({ &term.field: condition }))
}

fn json_value(value: &Value) -> Result<serde_json::Value, QueryError> {
    match value {
        Value::Bool(b) => Ok(json!(b)),
        Value::Int(i) => Ok(json!(i)),
        Value::Uint(u) => Ok(json!(u)),
        Value::Float(f) => Ok(json!(f)),
        Value::Str(s) => Ok(json!(s)),
        Value::Bytes(_) => Err(QueryError::UnsupportedValueForBackend(
            "byte strings have no JSON document form".into(),
        )),
        Value::List(items) => {
            let items = items.iter().map(json_value).collect::<Result<Vec<_>, _>>()?;
            Ok(serde_json::Value::Array(items))
        }
    }
}
