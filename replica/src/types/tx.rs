// replica/src/types/tx.rs

//! Transaction types as delivered by the chain feed.
//!
//! The feed hands the replica opaque VIDA data transactions: a sender, a
//! payload and the position of the transaction on the base chain. The
//! payload is a small JSON document:
//!
//! ```json
//! {"action":"transfer","amount":"30","receiver":"0x1234..."}
//! ```
//!
//! Decoding is split in two steps so that unknown actions can be skipped
//! without having to understand their body:
//!
//! - [`FeedTransaction::envelope`] extracts the action tag and the raw
//!   JSON object,
//! - [`TransferPayload::from_envelope`] interprets a `transfer` body.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Address, AddressError, Balance};

/// Why a payload could not be interpreted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    #[error("payload is not valid JSON: {0}")]
    NotJson(String),
    #[error("payload is not a JSON object")]
    NotObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` must be a string")]
    NotAString(&'static str),
    #[error("invalid amount {0}: expected a non-negative integer")]
    InvalidAmount(String),
    #[error("invalid receiver: {0}")]
    InvalidReceiver(AddressError),
    #[error("invalid sender: {0}")]
    InvalidSender(AddressError),
}

/// A VIDA data transaction as delivered by the chain feed.
///
/// Immutable once delivered. `block_number` and `sequence` locate the
/// transaction on the base chain and are used for ordering and logging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTransaction {
    /// Hex-encoded sender address (optional `0x` prefix).
    pub sender: String,

    /// Raw application payload, normally UTF-8 JSON.
    pub payload: Vec<u8>,

    /// Base-chain block that included this transaction.
    pub block_number: u64,

    /// Position of the transaction within its block.
    pub sequence: u32,

    /// Base-chain transaction hash, if the feed provides one.
    pub hash: Option<String>,
}

impl FeedTransaction {
    /// Decodes the payload into an [`ActionEnvelope`].
    ///
    /// A missing `action` field yields an empty action name, which no
    /// handler is registered for.
    pub fn envelope(&self) -> Result<ActionEnvelope, PayloadError> {
        let text = std::str::from_utf8(&self.payload).map_err(|_| PayloadError::NotUtf8)?;
        let value: Value =
            serde_json::from_str(text).map_err(|e| PayloadError::NotJson(e.to_string()))?;

        let Value::Object(body) = value else {
            return Err(PayloadError::NotObject);
        };

        let action = body
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(ActionEnvelope { action, body })
    }

    /// Parses the sender address.
    pub fn sender_address(&self) -> Result<Address, PayloadError> {
        Address::from_hex(&self.sender).map_err(PayloadError::InvalidSender)
    }
}

/// Action tag plus the JSON object it came in.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionEnvelope {
    /// Action name exactly as sent; matching is case-insensitive.
    pub action: String,
    pub body: Map<String, Value>,
}

/// Decoded body of a `transfer` action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPayload {
    pub receiver: Address,
    pub amount: Balance,
}

impl TransferPayload {
    /// Interprets the body of a `transfer` envelope.
    pub fn from_envelope(envelope: &ActionEnvelope) -> Result<Self, PayloadError> {
        let amount = envelope
            .body
            .get("amount")
            .ok_or(PayloadError::MissingField("amount"))
            .and_then(parse_amount)?;

        let receiver = match envelope.body.get("receiver") {
            Some(Value::String(s)) => Address::from_hex(s).map_err(PayloadError::InvalidReceiver)?,
            Some(_) => return Err(PayloadError::NotAString("receiver")),
            None => return Err(PayloadError::MissingField("receiver")),
        };

        Ok(TransferPayload { receiver, amount })
    }
}

/// Accepts a decimal string or a non-negative JSON integer.
pub(crate) fn parse_amount(value: &Value) -> Result<Balance, PayloadError> {
    match value {
        Value::String(s) => {
            let digits = s.trim();
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PayloadError::InvalidAmount(format!("{s:?}")));
            }
            digits
                .parse::<Balance>()
                .map_err(|_| PayloadError::InvalidAmount(format!("{s:?}")))
        }
        Value::Number(n) => n
            .as_u64()
            .map(Balance::from)
            .ok_or_else(|| PayloadError::InvalidAmount(n.to_string())),
        other => Err(PayloadError::InvalidAmount(other.to_string())),
    }
}
