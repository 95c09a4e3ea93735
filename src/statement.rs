//! Prepared statements and their forward-only result cursor.

use reqwest::Method;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FmError, Result};
use crate::params::{self, ParamKey, Params};
use crate::query::{
    QueryDescription, QueryKind, RequestDescriptor, META_COLUMN, MOD_ID_COLUMN, REC_ID_COLUMN,
};
use crate::response::{Payload, Record, WriteReceipt};
use crate::session::Session;
use crate::types::{Row, Value};

/// Value of the metadata pseudo-column. The Data API exposes no result
/// metadata, so this is always zeroed.
pub const META_PLACEHOLDER: &str = r#"{"found":0,"fetch":0,"total":0}"#;

/// Identifies one execution of a statement, and its queue entry while a
/// transaction is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementId(Uuid);

impl StatementId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A statement bound to its session.
///
/// Rows are handed out once, oldest first; there is no rewinding.
pub struct Statement<'s> {
    session: &'s mut Session,
    id: StatementId,
    raw_text: String,
    params: Params,
    description: Option<QueryDescription>,
    descriptor: Option<RequestDescriptor>,
    records: VecDeque<Record>,
    receipt: Option<WriteReceipt>,
    columns: Vec<String>,
    row_count: u64,
    result_ready: bool,
    queued: bool,
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("id", &self.id)
            .field("raw_text", &self.raw_text)
            .field("row_count", &self.row_count)
            .field("result_ready", &self.result_ready)
            .field("queued", &self.queued)
            .finish_non_exhaustive()
    }
}

impl<'s> Statement<'s> {
    pub(crate) fn new(session: &'s mut Session, raw_text: String) -> Self {
        Self {
            session,
            id: StatementId::generate(),
            raw_text,
            params: Params::new(),
            description: None,
            descriptor: None,
            records: VecDeque::new(),
            receipt: None,
            columns: Vec::new(),
            row_count: 0,
            result_ready: false,
            queued: false,
        }
    }

    /// Binds a value to a `?` position (from 1) or a `:name` placeholder.
    pub fn bind(&mut self, key: impl Into<ParamKey>, value: impl Into<Value>) -> &mut Self {
        self.params.bind(key, value);
        self
    }

    /// Runs the statement, or queues it when a transaction is open.
    pub async fn execute(&mut self) -> Result<()> {
        let text = params::substitute(&self.raw_text, &self.params);
        self.id = StatementId::generate();
        self.reset_results();

        let description = self.session.parser.parse(&text)?;
        let descriptor =
            self.session
                .translator
                .describe_request(&description, &self.raw_text, &self.params)?;
        debug!(
            "{} on {} -> {} {}",
            description.kind.as_str(),
            description.table,
            descriptor.method,
            descriptor.path
        );

        self.description = Some(description);
        self.descriptor = Some(descriptor.clone());

        if self.session.is_transaction_open() {
            debug!("Queued statement {} until commit", self.id);
            self.session.enqueue(self.id.clone(), descriptor);
            self.queued = true;
            return Ok(());
        }

        let payload = self.session.perform_request(&descriptor, false).await?;
        self.accept(payload);
        Ok(())
    }

    fn reset_results(&mut self) {
        self.records.clear();
        self.receipt = None;
        self.columns.clear();
        self.row_count = 0;
        self.result_ready = false;
        self.queued = false;
    }

    fn accept(&mut self, payload: Payload) {
        self.receipt = payload.write_receipt();
        match payload {
            Payload::Records(records) => {
                self.row_count = records.len() as u64;
                self.records = records.into();
            }
            Payload::Object(_) => self.row_count = 1,
            Payload::Script(_) | Payload::Empty => self.row_count = 0,
        }
        self.columns = self.output_columns();
        self.result_ready = true;
    }

    fn output_columns(&self) -> Vec<String> {
        let Some(description) = &self.description else {
            return Vec::new();
        };
        let mut columns: Vec<String> = description
            .columns
            .iter()
            .map(|c| c.alias.clone())
            .collect();
        if description.wildcard {
            if let Some(first) = self.records.front() {
                for field in first.field_data.keys() {
                    if !columns.contains(field) {
                        columns.push(field.clone());
                    }
                }
            }
        }
        columns
    }

    /// Returns the next row, or `None` once every row has been fetched.
    pub fn fetch_next(&mut self) -> Result<Option<Row>> {
        if !self.result_ready {
            return Err(FmError::statement(
                "No result to fetch; execute the statement first",
            ));
        }
        let Some(record) = self.records.pop_front() else {
            return Ok(None);
        };
        let Some(description) = &self.description else {
            return Ok(None);
        };

        let mut row = Row::new();
        for column in &description.columns {
            let value = match column.field.as_str() {
                REC_ID_COLUMN => Value::String(record.record_id.clone()),
                MOD_ID_COLUMN => Value::String(record.mod_id.clone()),
                META_COLUMN => Value::String(META_PLACEHOLDER.to_string()),
                field => record
                    .field_data
                    .get(field)
                    .map(Value::from_field)
                    .unwrap_or_default(),
            };
            row.insert(column.alias.clone(), value);
        }
        if description.wildcard {
            for (field, value) in &record.field_data {
                row.entry(field.clone())
                    .or_insert_with(|| Value::from_field(value));
            }
        }
        Ok(Some(row))
    }

    /// Drains the cursor.
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(self.records.len());
        while let Some(row) = self.fetch_next()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Fetches the next row and returns its value at `index`.
    pub fn fetch_column(&mut self, index: usize) -> Result<Option<Value>> {
        Ok(self
            .fetch_next()?
            .and_then(|row| row.get_index(index).map(|(_, value)| value.clone())))
    }

    /// Number of output columns of the last execution.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Output column names of the last execution, in select order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Records returned by the last execution, or 1 for a write.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Discards unfetched rows.
    pub fn close_cursor(&mut self) {
        self.records.clear();
        self.result_ready = false;
    }

    /// Returns the primary key value of the record created by this INSERT.
    ///
    /// When the table's key is not `rec_id`, the new record is read back to
    /// find the key field's value. A statement still waiting in an open
    /// transaction is sent first and leaves the queue.
    pub async fn extract_generated_key(&mut self) -> Result<Value> {
        self.generated_key()
            .await
            .map_err(|e| FmError::GeneratedKey(Box::new(e)))
    }

    async fn generated_key(&mut self) -> Result<Value> {
        if self.queued {
            if let Some(descriptor) = self.session.pending_request(&self.id) {
                debug!("Sending queued statement {} for its key", self.id);
                let payload = self.session.perform_request(&descriptor, false).await?;
                self.session.dequeue(&self.id);
                self.accept(payload);
            }
            self.queued = false;
        }

        let description = self
            .description
            .as_ref()
            .filter(|d| d.kind == QueryKind::Insert)
            .ok_or_else(|| FmError::statement("Statement did not insert a record"))?;
        let receipt = self
            .receipt
            .clone()
            .ok_or_else(|| FmError::statement("Response did not contain a record id"))?;

        let column = self
            .session
            .translator
            .resolve_primary_key_column(description, &self.session.schema);
        if column == REC_ID_COLUMN {
            return Ok(Value::String(receipt.record_id));
        }

        let path = self
            .descriptor
            .as_ref()
            .map(|d| format!("{}/{}", d.path, receipt.record_id))
            .ok_or_else(|| FmError::statement("Statement has no request"))?;
        let lookup = RequestDescriptor::new(Method::GET, path);

        match self.session.perform_request(&lookup, false).await? {
            Payload::Records(records) => records
                .first()
                .and_then(|record| record.field_data.get(&column))
                .map(Value::from_field)
                .ok_or_else(|| {
                    FmError::statement(format!("Field {column} missing from created record"))
                }),
            _ => Err(FmError::statement(format!(
                "Record {} not found",
                receipt.record_id
            ))),
        }
    }

    pub fn id(&self) -> &StatementId {
        &self.id
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn description(&self) -> Option<&QueryDescription> {
        self.description.as_ref()
    }

    /// The request of the last execution.
    pub fn request(&self) -> Option<&RequestDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub fn is_result_ready(&self) -> bool {
        self.result_ready
    }
}
