//! Authenticated connection to one hosted database.
//!
//! A [`Session`] owns the token, executes translated requests, and keeps the
//! pseudo-transaction queue. The Data API has no transactions: while one is
//! open, executed statements are only queued, and `commit` replays them in
//! order. Nothing can be undone once sent.

use indexmap::IndexMap;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, CloudIdentityExchange};
use crate::config::ConnectionConfig;
use crate::error::{FmError, RequestFault, Result};
use crate::query::{
    DataApiTranslator, QueryParser, RequestDescriptor, RequestTranslator, SchemaMetadata,
    SqlParser,
};
use crate::response::{ApiResponse, DataInfo, Payload, ScriptOutcome};
use crate::statement::{Statement, StatementId};
use crate::token::{FileTokenStore, TokenStore};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport, TransportError};

/// Token refreshes allowed per request.
const MAX_TOKEN_REFRESHES: u32 = 1;

const SERVER_VERSION: &str = "FMS Data API v1";

/// Builds a [`Session`] with custom collaborators.
///
/// Anything not set falls back to the production default: `reqwest`
/// transport, token file in the temp directory, sqlparser-based parser and
/// the Data API translator.
pub struct SessionBuilder {
    config: ConnectionConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    token_store: Option<Arc<dyn TokenStore>>,
    exchange: Option<Arc<dyn CloudIdentityExchange>>,
    parser: Option<Arc<dyn QueryParser>>,
    translator: Option<Arc<dyn RequestTranslator>>,
    schema: Option<SchemaMetadata>,
}

impl SessionBuilder {
    fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            transport: None,
            token_store: None,
            exchange: None,
            parser: None,
            translator: None,
            schema: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Sets the identity exchange used when the connection is in cloud mode.
    pub fn cloud_exchange(mut self, exchange: Arc<dyn CloudIdentityExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn QueryParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn RequestTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Overrides the primary key metadata read from the config.
    pub fn schema(mut self, schema: SchemaMetadata) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Resolves the base address and authenticates.
    pub async fn connect(self) -> Result<Session> {
        let base_address = self.config.base_address()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_timeout(Duration::from_secs(
                self.config.timeout_secs,
            ))?),
        };
        let store = self
            .token_store
            .unwrap_or_else(|| Arc::new(FileTokenStore::new()));
        let authenticator =
            Authenticator::new(base_address.clone(), &self.config, store, self.exchange);

        let token = authenticator.authenticate(transport.as_ref()).await?;
        info!("Connected to {}", self.config.display_string());

        Ok(Session {
            base_address,
            authenticator,
            transport,
            parser: self.parser.unwrap_or_else(|| Arc::new(SqlParser::new())),
            translator: self
                .translator
                .unwrap_or_else(|| Arc::new(DataApiTranslator::new())),
            schema: self
                .schema
                .unwrap_or_else(|| SchemaMetadata::from_config(&self.config)),
            token: Some(token),
            retried_once: false,
            transaction_open: false,
            pending: IndexMap::new(),
            last_metadata: None,
        })
    }
}

/// One logical connection to a hosted database.
pub struct Session {
    base_address: String,
    authenticator: Authenticator,
    transport: Arc<dyn HttpTransport>,
    pub(crate) parser: Arc<dyn QueryParser>,
    pub(crate) translator: Arc<dyn RequestTranslator>,
    pub(crate) schema: SchemaMetadata,
    token: Option<String>,
    retried_once: bool,
    transaction_open: bool,
    pending: IndexMap<StatementId, RequestDescriptor>,
    last_metadata: Option<DataInfo>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_address", &self.base_address)
            .field("transaction_open", &self.transaction_open)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connects with the default collaborators.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        Self::builder(config.clone()).connect().await
    }

    /// Starts building a session with custom collaborators.
    pub fn builder(config: ConnectionConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Creates a statement for `sql`. Nothing is sent until it is executed.
    pub fn prepare(&mut self, sql: impl Into<String>) -> Statement<'_> {
        Statement::new(self, sql.into())
    }

    /// Prepares and executes `sql` without parameters.
    pub async fn query(&mut self, sql: impl Into<String>) -> Result<Statement<'_>> {
        let mut statement = self.prepare(sql);
        statement.execute().await?;
        Ok(statement)
    }

    /// Executes one request, refreshing the token at most once.
    ///
    /// A "no records" answer is a successful, empty result. An invalid
    /// session (HTTP 401 or a session-invalid code) triggers one forced
    /// token refresh and a replay; a second rejection is fatal.
    pub async fn perform_request(
        &mut self,
        descriptor: &RequestDescriptor,
        wants_script_result: bool,
    ) -> Result<Payload> {
        self.retried_once = false;

        for attempt in 0..=MAX_TOKEN_REFRESHES {
            let request = self.build_request(descriptor);
            debug!("{} {} (attempt {})", request.method, descriptor.path, attempt + 1);

            let response = self
                .transport
                .send(request)
                .await
                .map_err(|e| match e {
                    TransportError::Connect(msg) => RequestFault::Connect(msg),
                    TransportError::Other(msg) => RequestFault::Transport(msg),
                })?;

            let rejection = match ApiResponse::decode(&response) {
                ApiResponse::Success {
                    response,
                    data_info,
                } => {
                    self.last_metadata = data_info;
                    return Ok(Payload::from_response(response, wants_script_result)?);
                }
                ApiResponse::NoRecords => {
                    debug!("No records match {}", descriptor.path);
                    self.last_metadata = None;
                    return Ok(Payload::Empty);
                }
                ApiResponse::Opaque { status, reason } => {
                    return Err(RequestFault::Opaque { status, reason }.into())
                }
                ApiResponse::ApplicationError { code, message } => {
                    return Err(RequestFault::Application { message, code }.into())
                }
                ApiResponse::Unauthorized { reason } => reason,
                ApiResponse::SessionInvalid { code, message } => format!("{message} ({code})"),
            };

            if attempt == MAX_TOKEN_REFRESHES {
                return Err(RequestFault::AuthExpired(rejection).into());
            }

            warn!("Session rejected ({rejection}), refreshing token and retrying");
            self.retried_once = true;
            let token = self
                .authenticator
                .force_refresh(self.transport.as_ref())
                .await?;
            self.token = Some(token);
        }

        Err(RequestFault::AuthExpired("token refresh limit reached".to_string()).into())
    }

    fn build_request(&self, descriptor: &RequestDescriptor) -> HttpRequest {
        let mut request = HttpRequest::new(
            descriptor.method.clone(),
            format!("{}{}", self.base_address, descriptor.path),
        )
        .header("Content-Type", "application/json")
        .header(
            "Authorization",
            format!("Bearer {}", self.token.as_deref().unwrap_or_default()),
        )
        .header("Accept-Encoding", "gzip, deflate, br");
        request.query = descriptor.options.query.clone();
        request.body = descriptor.options.body.clone();
        request
    }

    /// Runs a script on `layout` and returns its error code and result.
    pub async fn run_script(
        &mut self,
        layout: &str,
        script: &str,
        parameter: Option<&str>,
    ) -> Result<ScriptOutcome> {
        let mut descriptor =
            RequestDescriptor::new(Method::GET, format!("layouts/{layout}/script/{script}"));
        if let Some(parameter) = parameter {
            descriptor = descriptor.with_query("script.param", parameter);
        }

        match self.perform_request(&descriptor, true).await? {
            Payload::Script(outcome) => Ok(outcome),
            _ => Ok(ScriptOutcome::default()),
        }
    }

    /// Opens a pseudo-transaction. No remote call is made.
    pub fn begin_transaction(&mut self) {
        debug!("Transaction opened");
        self.transaction_open = true;
    }

    /// Sends every queued statement in the order it was executed.
    ///
    /// A failing statement stops the replay: statements sent before it stay
    /// applied, it and everything after it remain queued, and the
    /// transaction stays open.
    pub async fn commit(&mut self) -> Result<()> {
        let total = self.pending.len();
        info!("Committing {total} queued statement(s)");

        while let Some((id, descriptor)) = self.pending.first().map(|(k, v)| (k.clone(), v.clone()))
        {
            debug!("Replaying statement {id}");
            self.perform_request(&descriptor, false).await?;
            self.pending.shift_remove(&id);
        }

        self.transaction_open = false;
        Ok(())
    }

    /// Does nothing: the Data API cannot undo writes.
    ///
    /// Statements already committed stay applied. Statements still queued
    /// are never sent unless `commit` is called later.
    pub fn rollback(&mut self) {
        debug!(
            "Rollback requested with {} queued statement(s); nothing to undo",
            self.pending.len()
        );
    }

    pub(crate) fn enqueue(&mut self, id: StatementId, descriptor: RequestDescriptor) {
        self.pending.insert(id, descriptor);
    }

    pub(crate) fn pending_request(&self, id: &StatementId) -> Option<RequestDescriptor> {
        self.pending.get(id).cloned()
    }

    pub(crate) fn dequeue(&mut self, id: &StatementId) -> Option<RequestDescriptor> {
        self.pending.shift_remove(id)
    }

    /// Quoting is not offered; bind parameters instead.
    pub fn quote(&self, _value: &str) -> Result<String> {
        Err(FmError::not_supported(
            "Quote method is not implemented in this connection",
        ))
    }

    /// Raw statement execution is not offered; use `prepare` or `query`.
    pub fn exec(&mut self, _sql: &str) -> Result<u64> {
        Err(FmError::not_supported(
            "Exec method is not implemented in this connection",
        ))
    }

    /// The Data API does not report a server version; this is fixed.
    pub fn server_version(&self) -> &'static str {
        SERVER_VERSION
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Diagnostics from the most recent successful response.
    pub fn last_metadata(&self) -> Option<&DataInfo> {
        self.last_metadata.as_ref()
    }

    pub fn is_transaction_open(&self) -> bool {
        self.transaction_open
    }

    /// Number of statements waiting for `commit`.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the most recent request needed a token refresh.
    pub fn retried_once(&self) -> bool {
        self.retried_once
    }
}
