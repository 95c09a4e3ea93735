//! Translation of query descriptions into Data API requests.
//!
//! | SQL                                   | Request                              |
//! |---------------------------------------|--------------------------------------|
//! | `SELECT ... FROM t`                   | `GET layouts/t/records`              |
//! | `SELECT ... FROM t WHERE rec_id = n`  | `GET layouts/t/records/n`            |
//! | `SELECT ... FROM t WHERE <filter>`    | `POST layouts/t/_find`               |
//! | `INSERT INTO t (..) VALUES (..)`      | `POST layouts/t/records`             |
//! | `UPDATE t SET .. WHERE rec_id = n`    | `PATCH layouts/t/records/n`          |
//! | `DELETE FROM t WHERE rec_id = n`      | `DELETE layouts/t/records/n`         |

use reqwest::Method;
use serde_json::{json, Map, Value as Json};
use sqlparser::ast::{
    AssignmentTarget, BinaryOperator, Expr, Offset, OrderByExpr, Query, SetExpr, Statement,
    TableFactor, UnaryOperator, Value as SqlValue,
};
use std::collections::HashMap;

use super::parser::{column_name, innermost_select};
use super::{QueryDescription, QueryKind, RequestDescriptor, RequestTranslator, REC_ID_COLUMN};
use crate::config::ConnectionConfig;
use crate::error::{FmError, Result};
use crate::params::Params;

/// One find request: field name to find criterion.
type FindRequest = Map<String, Json>;

/// Declared primary keys, per table.
///
/// Tables without an entry use the `rec_id` pseudo-column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMetadata {
    primary_keys: HashMap<String, String>,
}

impl SchemaMetadata {
    /// Creates metadata with no declared keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads declared keys from a connection config.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            primary_keys: config.primary_keys.clone(),
        }
    }

    /// Declares the primary key column of `table`.
    pub fn with_primary_key(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.primary_keys.insert(table.into(), column.into());
        self
    }

    /// Returns the declared primary key column of `table`.
    pub fn primary_key(&self, table: &str) -> Option<&str> {
        self.primary_keys.get(table).map(String::as_str)
    }
}

/// Default [`RequestTranslator`] for the Data API v1 record endpoints.
#[derive(Debug, Default)]
pub struct DataApiTranslator;

impl DataApiTranslator {
    /// Creates a new translator.
    pub fn new() -> Self {
        Self
    }
}

impl RequestTranslator for DataApiTranslator {
    fn describe_request(
        &self,
        description: &QueryDescription,
        _raw_text: &str,
        _params: &Params,
    ) -> Result<RequestDescriptor> {
        let records = format!("layouts/{}/records", description.table);

        match (&description.statement, description.kind) {
            (Statement::Query(query), QueryKind::Select) => {
                describe_select(query, &description.table, &records)
            }
            (Statement::Insert(insert), QueryKind::Insert) => {
                let source = insert
                    .source
                    .as_ref()
                    .ok_or_else(|| FmError::translation("INSERT without VALUES"))?;
                let rows = match source.body.as_ref() {
                    SetExpr::Values(values) => &values.rows,
                    _ => return Err(FmError::not_supported("INSERT ... SELECT is not supported")),
                };
                if rows.len() != 1 {
                    return Err(FmError::not_supported(
                        "Multi-row INSERT cannot be committed atomically; insert one row per statement",
                    ));
                }
                if insert.columns.len() != rows[0].len() {
                    return Err(FmError::translation(
                        "INSERT must name one column per value",
                    ));
                }

                let mut field_data = Map::new();
                for (column, value) in insert.columns.iter().zip(&rows[0]) {
                    field_data.insert(column.value.clone(), field_value(value)?);
                }

                Ok(RequestDescriptor::new(Method::POST, records)
                    .with_body(json!({ "fieldData": field_data })))
            }
            (
                Statement::Update {
                    assignments,
                    selection,
                    ..
                },
                QueryKind::Update,
            ) => {
                let record_id = selection
                    .as_ref()
                    .and_then(record_id_filter)
                    .ok_or_else(|| FmError::translation("UPDATE requires WHERE rec_id = <id>"))?;

                let mut field_data = Map::new();
                for assignment in assignments {
                    let field = match &assignment.target {
                        AssignmentTarget::ColumnName(name) => name
                            .0
                            .last()
                            .map(|ident| ident.value.clone())
                            .ok_or_else(|| FmError::translation("Empty column name"))?,
                        AssignmentTarget::Tuple(_) => {
                            return Err(FmError::not_supported("Tuple assignment is not supported"))
                        }
                    };
                    field_data.insert(field, field_value(&assignment.value)?);
                }

                Ok(
                    RequestDescriptor::new(Method::PATCH, format!("{records}/{record_id}"))
                        .with_body(json!({ "fieldData": field_data })),
                )
            }
            (Statement::Delete(delete), QueryKind::Delete) => {
                let record_id = delete
                    .selection
                    .as_ref()
                    .and_then(record_id_filter)
                    .ok_or_else(|| FmError::translation("DELETE requires WHERE rec_id = <id>"))?;
                Ok(RequestDescriptor::new(
                    Method::DELETE,
                    format!("{records}/{record_id}"),
                ))
            }
            (_, kind) => Err(FmError::translation(format!(
                "Description does not match its {} statement",
                kind.as_str()
            ))),
        }
    }

    fn resolve_primary_key_column(
        &self,
        description: &QueryDescription,
        schema: &SchemaMetadata,
    ) -> String {
        schema
            .primary_key(&description.table)
            .unwrap_or(REC_ID_COLUMN)
            .to_string()
    }
}

/// Queries from the outermost to the one reading the real table.
fn query_chain(query: &Query) -> Vec<&Query> {
    let mut chain = vec![query];
    let next = match query.body.as_ref() {
        SetExpr::Query(inner) => Some(inner.as_ref()),
        SetExpr::Select(select) => match select.from.first().map(|t| &t.relation) {
            Some(TableFactor::Derived { subquery, .. }) => Some(subquery.as_ref()),
            _ => None,
        },
        _ => None,
    };
    if let Some(inner) = next {
        chain.extend(query_chain(inner));
    }
    chain
}

fn describe_select(query: &Query, layout: &str, records: &str) -> Result<RequestDescriptor> {
    let chain = query_chain(query);
    let select = innermost_select(query)?;

    // Outer aliases do not name layout fields, so only the innermost filter can be sent
    let outer_filter = chain.iter().any(|q| match q.body.as_ref() {
        SetExpr::Select(outer) => {
            !std::ptr::eq(outer.as_ref(), select) && outer.selection.is_some()
        }
        _ => false,
    });
    if outer_filter {
        return Err(FmError::not_supported(
            "WHERE is only supported on the query that reads the table",
        ));
    }

    let limit = chain
        .iter()
        .find_map(|q| q.limit.as_ref())
        .map(count_literal)
        .transpose()?;
    let offset = chain
        .iter()
        .find_map(|q| q.offset.as_ref())
        .map(|o: &Offset| count_literal(&o.value))
        .transpose()?
        .map(first_record)
        .transpose()?;
    let sort = chain
        .iter()
        .find_map(|q| q.order_by.as_ref().filter(|o| !o.exprs.is_empty()))
        .map(|o| sort_spec(&o.exprs))
        .transpose()?;

    let Some(selection) = &select.selection else {
        let mut descriptor = RequestDescriptor::new(Method::GET, records);
        if let Some(limit) = limit {
            descriptor = descriptor.with_query("_limit", limit.to_string());
        }
        if let Some(offset) = offset {
            descriptor = descriptor.with_query("_offset", offset.to_string());
        }
        if let Some(sort) = sort {
            descriptor = descriptor.with_query("_sort", sort.to_string());
        }
        return Ok(descriptor);
    };

    if let Some(record_id) = record_id_filter(selection) {
        return Ok(RequestDescriptor::new(
            Method::GET,
            format!("{records}/{record_id}"),
        ));
    }

    let mut body = Map::new();
    body.insert(
        "query".to_string(),
        Json::Array(find_requests(selection)?.into_iter().map(Json::Object).collect()),
    );
    if let Some(limit) = limit {
        body.insert("limit".to_string(), json!(limit));
    }
    if let Some(offset) = offset {
        body.insert("offset".to_string(), json!(offset));
    }
    if let Some(sort) = sort {
        body.insert("sort".to_string(), sort);
    }

    Ok(RequestDescriptor::new(Method::POST, format!("layouts/{layout}/_find"))
        .with_body(Json::Object(body)))
}

/// Converts a SQL offset into the Data API's 1-based first record.
fn first_record(offset: u64) -> Result<u64> {
    offset
        .checked_add(1)
        .ok_or_else(|| FmError::translation(format!("OFFSET {offset} is out of range")))
}

fn sort_spec(exprs: &[OrderByExpr]) -> Result<Json> {
    let mut sort = Vec::with_capacity(exprs.len());
    for order in exprs {
        let field = column_name(&order.expr).ok_or_else(|| {
            FmError::not_supported(format!("Can only sort by a column, got: {}", order.expr))
        })?;
        let direction = if order.asc == Some(false) {
            "descend"
        } else {
            "ascend"
        };
        sort.push(json!({ "fieldName": field, "sortOrder": direction }));
    }
    Ok(Json::Array(sort))
}

/// Returns `n` when the filter is exactly `rec_id = n`.
fn record_id_filter(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Nested(inner) => record_id_filter(inner),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } if column_name(left).as_deref() == Some(REC_ID_COLUMN) => literal_text(right).ok(),
        _ => None,
    }
}

/// Converts a WHERE clause into find requests.
///
/// Find requests in one array are OR-ed; criteria within one request are
/// AND-ed, so `a AND (b OR c)` becomes `[{a, b}, {a, c}]`.
fn find_requests(expr: &Expr) -> Result<Vec<FindRequest>> {
    match expr {
        Expr::Nested(inner) => find_requests(inner),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => {
            let mut requests = find_requests(left)?;
            requests.extend(find_requests(right)?);
            Ok(requests)
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            let lefts = find_requests(left)?;
            let rights = find_requests(right)?;
            let mut requests = Vec::with_capacity(lefts.len() * rights.len());
            for l in &lefts {
                for r in &rights {
                    let mut merged = l.clone();
                    for (field, incoming) in r {
                        let combined = match merged.get(field) {
                            Some(existing) => combine_criteria(field, existing, incoming)?,
                            None => incoming.clone(),
                        };
                        merged.insert(field.clone(), combined);
                    }
                    requests.push(merged);
                }
            }
            Ok(requests)
        }
        Expr::BinaryOp { left, op, right } => {
            let prefix = match op {
                BinaryOperator::Eq => "==",
                BinaryOperator::Gt => ">",
                BinaryOperator::Lt => "<",
                BinaryOperator::GtEq => ">=",
                BinaryOperator::LtEq => "<=",
                other => {
                    return Err(FmError::not_supported(format!(
                        "Operator {other} has no find equivalent"
                    )))
                }
            };
            criterion(left, format!("{prefix}{}", literal_text(right)?))
        }
        Expr::Like {
            negated: false,
            expr,
            pattern,
            ..
        } => {
            let pattern = literal_text(pattern)?.replace('%', "*").replace('_', "@");
            criterion(expr, format!("=={pattern}"))
        }
        Expr::IsNull(inner) => criterion(inner, "=".to_string()),
        other => Err(FmError::not_supported(format!(
            "Unsupported filter: {other}"
        ))),
    }
}

/// One side of a range criterion.
enum Bound<'a> {
    Lower { value: &'a str, inclusive: bool },
    Upper { value: &'a str, inclusive: bool },
}

impl<'a> Bound<'a> {
    fn parse(criterion: &'a str) -> Option<Self> {
        if let Some(value) = criterion.strip_prefix(">=") {
            Some(Bound::Lower { value, inclusive: true })
        } else if let Some(value) = criterion.strip_prefix("<=") {
            Some(Bound::Upper { value, inclusive: true })
        } else if let Some(value) = criterion.strip_prefix('>') {
            Some(Bound::Lower { value, inclusive: false })
        } else {
            criterion
                .strip_prefix('<')
                .map(|value| Bound::Upper { value, inclusive: false })
        }
    }
}

/// Combines two criteria on the same field into one.
///
/// A lower and an upper bound become the inclusive range `lo...hi`.
/// Exclusive bounds are tightened by one, which only works for integers.
fn combine_criteria(field: &str, existing: &Json, incoming: &Json) -> Result<Json> {
    if existing == incoming {
        return Ok(existing.clone());
    }

    let conflict = || {
        FmError::not_supported(format!(
            "Cannot combine {existing} and {incoming} on field {field}"
        ))
    };
    let (Some(a), Some(b)) = (existing.as_str(), incoming.as_str()) else {
        return Err(conflict());
    };

    let (lower, upper) = match (Bound::parse(a), Bound::parse(b)) {
        (Some(lo @ Bound::Lower { .. }), Some(hi @ Bound::Upper { .. }))
        | (Some(hi @ Bound::Upper { .. }), Some(lo @ Bound::Lower { .. })) => (lo, hi),
        _ => return Err(conflict()),
    };

    let low = match lower {
        Bound::Lower { value, inclusive: true } => value.to_string(),
        Bound::Lower { value, .. } => value
            .parse::<i64>()
            .ok()
            .and_then(|n| n.checked_add(1))
            .map(|n| n.to_string())
            .ok_or_else(|| {
                FmError::not_supported(format!(
                    "Exclusive bound >{value} on field {field} needs an integer; use >= instead"
                ))
            })?,
        Bound::Upper { .. } => return Err(conflict()),
    };
    let high = match upper {
        Bound::Upper { value, inclusive: true } => value.to_string(),
        Bound::Upper { value, .. } => value
            .parse::<i64>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .map(|n| n.to_string())
            .ok_or_else(|| {
                FmError::not_supported(format!(
                    "Exclusive bound <{value} on field {field} needs an integer; use <= instead"
                ))
            })?,
        Bound::Lower { .. } => return Err(conflict()),
    };

    Ok(Json::String(format!("{low}...{high}")))
}

fn criterion(column: &Expr, value: String) -> Result<Vec<FindRequest>> {
    let field = column_name(column).ok_or_else(|| {
        FmError::not_supported(format!("Filter must compare a column, got: {column}"))
    })?;
    if field == REC_ID_COLUMN {
        return Err(FmError::not_supported(
            "rec_id can only be used alone as WHERE rec_id = <id>",
        ));
    }
    let mut request = Map::new();
    request.insert(field, Json::String(value));
    Ok(vec![request])
}

fn literal_text(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => Ok(n.clone()),
        Expr::Value(SqlValue::SingleQuotedString(s))
        | Expr::Value(SqlValue::DoubleQuotedString(s)) => Ok(s.clone()),
        Expr::Value(SqlValue::Boolean(b)) => Ok(if *b { "1" } else { "0" }.to_string()),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => Ok(format!("-{}", literal_text(expr)?)),
        Expr::Nested(inner) => literal_text(inner),
        other => Err(FmError::not_supported(format!(
            "Expected a literal value, got: {other}"
        ))),
    }
}

fn field_value(expr: &Expr) -> Result<Json> {
    match expr {
        // The Data API has no NULL; clearing a field means writing ""
        Expr::Value(SqlValue::Null) => Ok(Json::String(String::new())),
        Expr::Value(SqlValue::Number(n, _)) => Ok(n
            .parse::<i64>()
            .map(Json::from)
            .or_else(|_| n.parse::<f64>().map(Json::from))
            .unwrap_or_else(|_| Json::String(n.clone()))),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match field_value(expr)? {
            Json::Number(n) => Ok(n
                .as_i64()
                .map(|i| Json::from(-i))
                .or_else(|| n.as_f64().map(|f| Json::from(-f)))
                .unwrap_or(Json::Null)),
            _ => Err(FmError::not_supported("Cannot negate a non-numeric value")),
        },
        other => literal_text(other).map(Json::String),
    }
}

fn count_literal(expr: &Expr) -> Result<u64> {
    literal_text(expr)?
        .parse()
        .map_err(|_| FmError::translation(format!("Expected a row count, got: {expr}")))
}
