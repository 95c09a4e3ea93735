//! Query description and request translation.
//!
//! A statement's SQL goes through two collaborators: a [`QueryParser`] that
//! turns text into a [`QueryDescription`], and a [`RequestTranslator`] that
//! maps the description onto a Data API [`RequestDescriptor`]. Both are
//! traits so a session can be built with alternative implementations.

mod parser;
mod translator;

pub use parser::SqlParser;
pub use translator::{DataApiTranslator, SchemaMetadata};

use reqwest::Method;
use serde_json::Value as Json;

use crate::error::Result;
use crate::params::Params;

/// Output column mapped to the record's internal id.
pub const REC_ID_COLUMN: &str = "rec_id";

/// Output column mapped to the record's modification id.
pub const MOD_ID_COLUMN: &str = "mod_id";

/// Output column holding result metadata.
pub const META_COLUMN: &str = "rec_meta";

/// Kind of statement a description was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryKind {
    /// Returns the kind as an SQL keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// One output column of a SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColumn {
    /// Field name on the layout, without any table qualifier.
    pub field: String,
    /// Key the value is returned under.
    pub alias: String,
}

impl SelectedColumn {
    /// Creates a column returned under its own name.
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            alias: field.clone(),
            field,
        }
    }

    /// Creates a column returned under an alias.
    pub fn aliased(field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            alias: alias.into(),
        }
    }
}

/// Structured form of one SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescription {
    pub kind: QueryKind,
    /// Target table, used as the layout name.
    pub table: String,
    /// Output columns in select order. Empty for writes.
    pub columns: Vec<SelectedColumn>,
    /// True when the projection contained `*`.
    pub wildcard: bool,
    /// The parsed statement.
    pub statement: sqlparser::ast::Statement,
}

/// Query string and JSON body of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub body: Option<Json>,
}

/// The method, path and options of one Data API call.
///
/// Paths are relative to the session's base address. A descriptor is an
/// immutable snapshot, which is what gets queued inside a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub options: RequestOptions,
}

impl RequestDescriptor {
    /// Creates a descriptor without query or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            options: RequestOptions::default(),
        }
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: Json) -> Self {
        self.options.body = Some(body);
        self
    }

    /// Appends a query string parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.push((name.into(), value.into()));
        self
    }
}

/// Turns SQL text into a [`QueryDescription`].
pub trait QueryParser: Send + Sync {
    /// Parses one statement. Fails with [`FmError::Parse`](crate::error::FmError::Parse)
    /// on malformed text.
    fn parse(&self, text: &str) -> Result<QueryDescription>;
}

/// Maps query descriptions onto Data API requests.
pub trait RequestTranslator: Send + Sync {
    /// Builds the request that performs `description`.
    fn describe_request(
        &self,
        description: &QueryDescription,
        raw_text: &str,
        params: &Params,
    ) -> Result<RequestDescriptor>;

    /// Returns the column holding the logical primary key of the target table.
    fn resolve_primary_key_column(
        &self,
        description: &QueryDescription,
        schema: &SchemaMetadata,
    ) -> String;
}
