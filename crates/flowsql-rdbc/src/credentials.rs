//! Connection credentials
//!
//! The credential shape is defined by the host's credential store; this
//! crate only carries it opaquely to the [`ConnectionFactory`]. The
//! password is wrapped so it cannot leak through `Debug`, `Display`, or
//! serialized config dumps.
//!
//! [`ConnectionFactory`]: crate::connection::ConnectionFactory

use schemars::JsonSchema;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A wrapper around `SecretString` that provides safe handling of sensitive values.
///
/// - Redacts the value in `Debug` and `Display` output
/// - Serializes as `"***REDACTED***"` to prevent accidental exposure
/// - Provides `expose_secret()` to access the actual value when needed
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Create a new sensitive string from any string-like value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value.
    ///
    /// Use sparingly - only when the actual value is needed (e.g., for
    /// authentication).
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

impl JsonSchema for SensitiveString {
    fn schema_name() -> String {
        "SensitiveString".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = gen.subschema_for::<String>();
        if let schemars::schema::Schema::Object(obj) = &mut schema {
            obj.format = Some("password".to_string());
            obj.metadata().description = Some(
                "Sensitive value (passwords, API keys, etc.). Will be redacted in logs."
                    .to_string(),
            );
        }
        schema
    }
}

/// Stored connection credentials supplied by the host per invocation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct SqlCredentials {
    /// Database user name
    pub user: String,

    /// Database password
    pub password: SensitiveString,

    /// Driver connection string (URL or easy-connect form)
    #[validate(length(min = 1))]
    pub connection_string: String,
}

impl SqlCredentials {
    /// Create credentials from their three parts
    pub fn new(
        user: impl Into<String>,
        password: impl Into<SensitiveString>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            connection_string: connection_string.into(),
        }
    }
}
