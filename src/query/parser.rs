//! SQL parsing with sqlparser-rs.
//!
//! Uses the generic dialect; only the statement shapes the translator
//! understands are described, everything else is rejected here.

use sqlparser::ast::{
    Expr, FromTable, ObjectName, Query, Select, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::{QueryDescription, QueryKind, QueryParser, SelectedColumn};
use crate::error::{FmError, Result};

/// Default [`QueryParser`] built on sqlparser-rs.
#[derive(Debug, Default)]
pub struct SqlParser {
    dialect: GenericDialect,
}

impl SqlParser {
    /// Creates a new parser.
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }
}

impl QueryParser for SqlParser {
    fn parse(&self, text: &str) -> Result<QueryDescription> {
        let mut statements = Parser::parse_sql(&self.dialect, text)
            .map_err(|e| FmError::parse(format!("SQL parse error: {e}")))?;

        if statements.len() != 1 {
            return Err(FmError::parse(format!(
                "Expected exactly one statement, found {}",
                statements.len()
            )));
        }

        describe(statements.remove(0))
    }
}

fn describe(statement: Statement) -> Result<QueryDescription> {
    let (kind, table, columns, wildcard) = match &statement {
        Statement::Query(query) => {
            let select = innermost_select(query)?;
            let (columns, wildcard) = projection(select)?;
            (QueryKind::Select, table_of_select(select)?, columns, wildcard)
        }
        Statement::Insert(insert) => (
            QueryKind::Insert,
            object_name(&insert.table_name)?,
            Vec::new(),
            false,
        ),
        Statement::Update { table, .. } => (QueryKind::Update, table_name(table)?, Vec::new(), false),
        Statement::Delete(delete) => {
            let tables = match &delete.from {
                FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
            };
            let first = tables
                .first()
                .ok_or_else(|| FmError::parse("DELETE without a table"))?;
            (QueryKind::Delete, table_name(first)?, Vec::new(), false)
        }
        other => {
            return Err(FmError::not_supported(format!(
                "Statement is not supported by the Data API: {other}"
            )))
        }
    };

    Ok(QueryDescription {
        kind,
        table,
        columns,
        wildcard,
        statement,
    })
}

/// Returns the SELECT that reads from a real table.
///
/// Paginating ORMs wrap the real query in one or more derived tables
/// (`SELECT ... FROM (SELECT ...) alias`); the innermost projection is the
/// one that names layout fields.
pub(crate) fn innermost_select(query: &Query) -> Result<&Select> {
    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select.as_ref(),
        SetExpr::Query(inner) => return innermost_select(inner),
        _ => {
            return Err(FmError::not_supported(
                "Only plain SELECT queries are supported (no UNION, VALUES, ...)",
            ))
        }
    };

    match select.from.first().map(|t| &t.relation) {
        Some(TableFactor::Derived { subquery, .. }) => innermost_select(subquery),
        _ => Ok(select),
    }
}

fn table_of_select(select: &Select) -> Result<String> {
    let first = select
        .from
        .first()
        .ok_or_else(|| FmError::not_supported("SELECT without FROM is not supported"))?;
    if select.from.len() > 1 || !first.joins.is_empty() {
        return Err(FmError::not_supported("Joins are not supported"));
    }
    table_name(first)
}

fn table_name(table: &TableWithJoins) -> Result<String> {
    match &table.relation {
        TableFactor::Table { name, .. } => object_name(name),
        other => Err(FmError::not_supported(format!(
            "Unsupported table expression: {other}"
        ))),
    }
}

fn object_name(name: &ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .ok_or_else(|| FmError::parse("Empty table name"))
}

/// Returns the unqualified column name an expression refers to.
pub(crate) fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.clone()),
        Expr::Nested(inner) => column_name(inner),
        _ => None,
    }
}

fn projection(select: &Select) -> Result<(Vec<SelectedColumn>, bool)> {
    let mut columns = Vec::new();
    let mut wildcard = false;

    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) => {
                let field = column_name(expr).ok_or_else(|| unsupported_projection(expr))?;
                columns.push(SelectedColumn::new(field));
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                let field = column_name(expr).ok_or_else(|| unsupported_projection(expr))?;
                columns.push(SelectedColumn::aliased(field, alias.value.clone()));
            }
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => wildcard = true,
        }
    }

    Ok((columns, wildcard))
}

fn unsupported_projection(expr: &Expr) -> FmError {
    FmError::not_supported(format!("Only plain columns can be selected, got: {expr}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(sql: &str) -> Result<QueryDescription> {
        SqlParser::new().parse(sql)
    }

    #[test]
    fn test_select_with_aliases() {
        let desc =
            parse("SELECT t0.id AS id_1, t0.name AS name_2, t0.rec_id AS rec_id_3 FROM Contacts t0")
                .unwrap();

        assert_eq!(desc.kind, QueryKind::Select);
        assert_eq!(desc.table, "Contacts");
        assert_eq!(
            desc.columns,
            vec![
                SelectedColumn::aliased("id", "id_1"),
                SelectedColumn::aliased("name", "name_2"),
                SelectedColumn::aliased("rec_id", "rec_id_3"),
            ]
        );
        assert!(!desc.wildcard);
    }

    #[test]
    fn test_select_unaliased_and_wildcard() {
        let desc = parse("SELECT name, * FROM Contacts").unwrap();
        assert_eq!(desc.columns, vec![SelectedColumn::new("name")]);
        assert!(desc.wildcard);
    }

    #[test]
    fn test_select_from_derived_table_uses_inner_projection() {
        let desc = parse(
            "SELECT DISTINCT id_0 FROM (SELECT t0.id AS id_0, t0.name AS name_1 FROM Contacts t0) dctrn_result",
        )
        .unwrap();

        assert_eq!(desc.table, "Contacts");
        assert_eq!(desc.columns.len(), 2);
        assert_eq!(desc.columns[0], SelectedColumn::aliased("id", "id_0"));
    }

    #[test]
    fn test_insert_update_delete_tables() {
        assert_eq!(
            parse("INSERT INTO Contacts (name) VALUES ('Ada')").unwrap().kind,
            QueryKind::Insert
        );
        let update = parse("UPDATE Contacts SET name = 'Ada' WHERE rec_id = 3").unwrap();
        assert_eq!(update.kind, QueryKind::Update);
        assert_eq!(update.table, "Contacts");
        let delete = parse("DELETE FROM Contacts WHERE rec_id = 3").unwrap();
        assert_eq!(delete.kind, QueryKind::Delete);
        assert_eq!(delete.table, "Contacts");
    }

    #[test]
    fn test_reparse_is_identical() {
        let sql = "SELECT t0.name AS name_1 FROM Contacts t0 WHERE t0.city = 'Oslo'";
        assert_eq!(parse(sql).unwrap(), parse(sql).unwrap());
    }

    #[test]
    fn test_malformed_sql_is_parse_error() {
        let err = parse("SELEKT * FROM").unwrap_err();
        assert_eq!(err.category(), "Parse Error");
    }

    #[test]
    fn test_multiple_statements_rejected() {
        let err = parse("SELECT a FROM t; SELECT b FROM t").unwrap_err();
        assert!(err.to_string().contains("exactly one statement"));
    }

    #[test]
    fn test_ddl_not_supported() {
        let err = parse("CREATE TABLE t (id INT)").unwrap_err();
        assert_eq!(err.category(), "Not Supported");
    }

    #[test]
    fn test_joins_not_supported() {
        let err = parse("SELECT a.x FROM a JOIN b ON a.id = b.id").unwrap_err();
        assert_eq!(err.category(), "Not Supported");
    }

    #[test]
    fn test_function_projection_not_supported() {
        let err = parse("SELECT COUNT(*) FROM Contacts").unwrap_err();
        assert_eq!(err.category(), "Not Supported");
    }
}
