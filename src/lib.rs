//! fmdata-sql - SQL access to FileMaker databases over the Data API.
//!
//! A [`Session`] logs in (or reuses a cached token), translates SQL
//! statements into Data API record requests, and hands back rows through a
//! forward-only [`Statement`] cursor.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod params;
pub mod query;
pub mod response;
pub mod session;
pub mod statement;
pub mod token;
pub mod transport;
pub mod types;

pub use auth::{CloudCredentials, CloudIdentityExchange};
pub use config::{Config, ConnectionConfig};
pub use error::{AuthFault, FmError, RequestFault, Result};
pub use params::{ParamKey, Params};
pub use query::SchemaMetadata;
pub use session::{Session, SessionBuilder};
pub use statement::{Statement, StatementId};
pub use token::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{HttpTransport, MockTransport, ReqwestTransport};
pub use types::{Row, Value};
