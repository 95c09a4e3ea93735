//! Data API response model.
//!
//! Every HTTP response is decoded exactly once into an [`ApiResponse`], so the
//! session and statements never inspect raw JSON. Envelopes look like
//! `{"response": {...}, "messages": [{"code": "0", "message": "OK"}]}`; codes
//! arrive as strings on most server versions and as numbers on some.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::RequestFault;
use crate::transport::HttpResponse;

/// Application code meaning the find matched nothing.
pub const NO_RECORDS_CODE: i64 = 401;

/// Application code for an invalid or expired token.
pub const INVALID_TOKEN_CODE: i64 = 952;

/// Application code for a missing layout, which servers also return for
/// some expired sessions.
pub const MISSING_LAYOUT_CODE: i64 = 105;

const SESSION_INVALID_CODES: [i64; 2] = [MISSING_LAYOUT_CODE, INVALID_TOKEN_CODE];

/// One entry of the envelope's `messages` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiMessage {
    #[serde(deserialize_with = "code_from_json")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    response: Option<Json>,
    #[serde(default)]
    messages: Vec<ApiMessage>,
}

/// Diagnostic block (`response.dataInfo`) returned with record queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataInfo {
    pub database: String,
    pub layout: String,
    pub table: String,
    pub total_record_count: u64,
    pub found_count: u64,
    pub returned_count: u64,
}

/// One record as returned in `response.data`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Record {
    #[serde(rename = "fieldData", default)]
    pub field_data: Map<String, Json>,
    #[serde(rename = "portalData", default)]
    pub portal_data: Map<String, Json>,
    #[serde(rename = "recordId", deserialize_with = "string_from_json")]
    pub record_id: String,
    #[serde(rename = "modId", default, deserialize_with = "string_from_json")]
    pub mod_id: String,
}

/// Identifiers returned by a create or edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub record_id: String,
    pub mod_id: String,
}

/// Outcome of a script run through the `wantsScriptResult` path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptOutcome {
    /// Script error code as reported by the server, `"0"` on success.
    pub error: String,
    /// Script result, empty when the script returned nothing.
    pub result: String,
}

/// A classified Data API response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// 2xx with a decodable envelope.
    Success {
        response: Map<String, Json>,
        data_info: Option<DataInfo>,
    },
    /// HTTP 401: the token was rejected at the HTTP layer.
    Unauthorized { reason: String },
    /// The find matched no records; a normal, empty result.
    NoRecords,
    /// The platform reported an invalid session.
    SessionInvalid { code: i64, message: String },
    /// Any other platform error.
    ApplicationError { code: i64, message: String },
    /// The body was not a Data API envelope.
    Opaque { status: u16, reason: String },
}

impl ApiResponse {
    /// Classifies a raw HTTP response.
    pub fn decode(http: &HttpResponse) -> Self {
        if http.status == 401 {
            return Self::Unauthorized {
                reason: http.reason.clone(),
            };
        }

        let envelope: Envelope = match serde_json::from_str(&http.body) {
            Ok(envelope) => envelope,
            Err(_) => return Self::opaque(http),
        };

        if http.is_success() {
            let response = match envelope.response {
                Some(Json::Object(map)) => map,
                _ => Map::new(),
            };
            let data_info = response
                .get("dataInfo")
                .and_then(|info| serde_json::from_value(info.clone()).ok());
            return Self::Success {
                response,
                data_info,
            };
        }

        let Some(first) = envelope.messages.into_iter().next() else {
            return Self::opaque(http);
        };

        if first.code == NO_RECORDS_CODE {
            Self::NoRecords
        } else if SESSION_INVALID_CODES.contains(&first.code) {
            Self::SessionInvalid {
                code: first.code,
                message: first.message,
            }
        } else {
            Self::ApplicationError {
                code: first.code,
                message: first.message,
            }
        }
    }

    fn opaque(http: &HttpResponse) -> Self {
        Self::Opaque {
            status: http.status,
            reason: http.reason.clone(),
        }
    }
}

/// What a data request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `response.data`: records from a find or record fetch.
    Records(Vec<Record>),
    /// The `response` object itself (create/edit/delete).
    Object(Map<String, Json>),
    /// Script error and result.
    Script(ScriptOutcome),
    /// No records matched.
    Empty,
}

impl Payload {
    /// Shapes a successful `response` object into a payload.
    pub fn from_response(
        mut response: Map<String, Json>,
        wants_script_result: bool,
    ) -> Result<Self, RequestFault> {
        if wants_script_result {
            return Ok(Self::Script(ScriptOutcome {
                error: response
                    .get("scriptError")
                    .map(json_to_string)
                    .unwrap_or_default(),
                result: response
                    .get("scriptResult")
                    .map(json_to_string)
                    .unwrap_or_default(),
            }));
        }

        match response.remove("data") {
            Some(data) => serde_json::from_value(data)
                .map(Self::Records)
                .map_err(|e| RequestFault::Opaque {
                    status: 200,
                    reason: format!("Malformed record data: {e}"),
                }),
            None => Ok(Self::Object(response)),
        }
    }

    /// Record identifiers when this is the result of a create or edit.
    pub fn write_receipt(&self) -> Option<WriteReceipt> {
        match self {
            Self::Object(map) => {
                let record_id = map.get("recordId").map(json_to_string)?;
                let mod_id = map.get("modId").map(json_to_string).unwrap_or_default();
                Some(WriteReceipt { record_id, mod_id })
            }
            _ => None,
        }
    }
}

fn json_to_string(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Json::deserialize(deserializer)?;
    Ok(json_to_string(&value))
}

fn code_from_json<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Json::deserialize(deserializer)? {
        Json::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid message code {n}"))),
        Json::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid message code {s:?}"))),
        other => Err(serde::de::Error::custom(format!(
            "invalid message code {other}"
        ))),
    }
}
