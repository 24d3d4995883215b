/*!
Codec adapters turning a [`PersistedEnvelope`] into the string handed to
storage and back.

JSON is the default; [`FnCodec`] wraps arbitrary closures so callers can plug
in their own encoding (encryption, compression to base64, and so on) without
defining a type.
*/

use std::fmt;
use std::sync::Arc;

use crate::{PersistedEnvelope, Result};

/// Encoding abstraction for persisted envelopes
pub trait Codec: Send + Sync {
    /// Encode an envelope for storage
    fn serialize(&self, envelope: &PersistedEnvelope) -> Result<String>;

    /// Decode a stored value
    ///
    /// `Ok(None)` means the stored value encodes "nothing persisted"
    /// (for JSON, the literal `null`).
    fn deserialize(&self, raw: &str) -> Result<Option<PersistedEnvelope>>;

    /// Name of the encoding, used in log output
    fn name(&self) -> &str;
}

/// JSON codec (the default)
#[derive(Debug, Clone, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Emit indented JSON, handy for file-backed storage inspected by hand.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Codec for JsonCodec {
    fn serialize(&self, envelope: &PersistedEnvelope) -> Result<String> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(envelope)?
        } else {
            serde_json::to_string(envelope)?
        };
        Ok(encoded)
    }

    fn deserialize(&self, raw: &str) -> Result<Option<PersistedEnvelope>> {
        Ok(serde_json::from_str(raw)?)
    }

    fn name(&self) -> &str {
        "json"
    }
}

type SerializeFn = Arc<dyn Fn(&PersistedEnvelope) -> Result<String> + Send + Sync>;
type DeserializeFn = Arc<dyn Fn(&str) -> Result<Option<PersistedEnvelope>> + Send + Sync>;

/// Codec built from a pair of closures
#[derive(Clone)]
pub struct FnCodec {
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

impl FnCodec {
    pub fn new<S, D>(serialize: S, deserialize: D) -> Self
    where
        S: Fn(&PersistedEnvelope) -> Result<String> + Send + Sync + 'static,
        D: Fn(&str) -> Result<Option<PersistedEnvelope>> + Send + Sync + 'static,
    {
        Self {
            serialize: Arc::new(serialize),
            deserialize: Arc::new(deserialize),
        }
    }
}

impl fmt::Debug for FnCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}

impl Codec for FnCodec {
    fn serialize(&self, envelope: &PersistedEnvelope) -> Result<String> {
        (self.serialize)(envelope)
    }

    fn deserialize(&self, raw: &str) -> Result<Option<PersistedEnvelope>> {
        (self.deserialize)(raw)
    }

    fn name(&self) -> &str {
        "custom"
    }
}
