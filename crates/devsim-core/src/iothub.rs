//! IoT Hub connection strings and shared access signatures.
//!
//! A connection string has the form
//! `HostName=<host>;SharedAccessKeyName=<policy>;SharedAccessKey=<base64 key>`.
//! Tokens are signed with HMAC-SHA256 over `<url-encoded host>\n<expiry>`.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::model::IotHubDescriptor;

type HmacSha256 = Hmac<Sha256>;

/// Descriptor value meaning "the hub configured on the service".
pub const DEFAULT_HUB: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionStringError {
    #[error("connection string is empty")]
    Empty,

    #[error("malformed segment '{0}', expected key=value")]
    MalformedSegment(String),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("SharedAccessKey is not valid base64")]
    InvalidKey,
}

/// A parsed IoT Hub connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct IotHubConnectionString {
    pub host_name: String,
    pub shared_access_key_name: String,
    shared_access_key: String,
    key: Vec<u8>,
}

impl IotHubConnectionString {
    pub fn new(host_name: impl Into<String>, key_name: impl Into<String>, key: &[u8]) -> Self {
        Self {
            host_name: host_name.into(),
            shared_access_key_name: key_name.into(),
            shared_access_key: STANDARD.encode(key),
            key: key.to_vec(),
        }
    }

    /// Decoded signing key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Sign a token for this hub that expires at `expiry`.
    pub fn sas_token(&self, expiry: DateTime<Utc>) -> SasToken {
        let resource = self.host_name.to_ascii_lowercase();
        let expiry = expiry.timestamp();
        SasToken {
            signature: sign(&self.key, &resource, expiry),
            resource,
            expiry,
            key_name: self.shared_access_key_name.clone(),
        }
    }
}

impl FromStr for IotHubConnectionString {
    type Err = ConnectionStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConnectionStringError::Empty);
        }

        let mut host_name = None;
        let mut key_name = None;
        let mut key_text = None;

        for segment in s.split(';').map(str::trim).filter(|seg| !seg.is_empty()) {
            let (name, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "hostname" => host_name = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key_text = Some(value),
                _ => {}
            }
        }

        let host_name = host_name
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::Missing("HostName"))?;
        let shared_access_key_name = key_name
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::Missing("SharedAccessKeyName"))?;
        let shared_access_key = key_text
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::Missing("SharedAccessKey"))?;
        let key = STANDARD
            .decode(&shared_access_key)
            .map_err(|_| ConnectionStringError::InvalidKey)?;
        if key.is_empty() {
            return Err(ConnectionStringError::InvalidKey);
        }

        Ok(Self {
            host_name,
            shared_access_key_name,
            shared_access_key,
            key,
        })
    }
}

impl fmt::Display for IotHubConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HostName={};SharedAccessKeyName={};SharedAccessKey={}",
            self.host_name, self.shared_access_key_name, self.shared_access_key
        )
    }
}

// Keeps the key out of logs.
impl fmt::Debug for IotHubConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IotHubConnectionString")
            .field("host_name", &self.host_name)
            .field("shared_access_key_name", &self.shared_access_key_name)
            .finish_non_exhaustive()
    }
}

/// A `SharedAccessSignature sr=..&sig=..&se=..&skn=..` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasToken {
    pub resource: String,
    pub signature: String,
    pub expiry: i64,
    pub key_name: String,
}

impl SasToken {
    /// True if the token was signed with `key` and has not expired.
    pub fn verify(&self, key: &[u8], now: DateTime<Utc>) -> bool {
        if self.expiry <= now.timestamp() {
            return false;
        }
        let Ok(expected) = STANDARD.decode(&self.signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
            return false;
        };
        mac.update(string_to_sign(&self.resource, self.expiry).as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

impl fmt::Display for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            urlencoding::encode(&self.resource),
            urlencoding::encode(&self.signature),
            self.expiry,
            urlencoding::encode(&self.key_name)
        )
    }
}

fn string_to_sign(resource: &str, expiry: i64) -> String {
    format!("{}\n{}", urlencoding::encode(resource), expiry)
}

fn sign(key: &[u8], resource: &str, expiry: i64) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(string_to_sign(resource, expiry).as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// What an `IoTHub` descriptor points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubTarget {
    /// The service-level connection string.
    Default,
    Custom(IotHubConnectionString),
}

impl IotHubDescriptor {
    pub fn target(&self) -> Result<HubTarget, ConnectionStringError> {
        let value = self.connection_string.trim();
        if value.eq_ignore_ascii_case(DEFAULT_HUB) {
            return Ok(HubTarget::Default);
        }
        value.parse().map(HubTarget::Custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "c2VjcmV0LWtleS1mb3ItdGVzdHM=";

    fn conn() -> IotHubConnectionString {
        format!("HostName=hub.azure-devices.net;SharedAccessKeyName=iothubowner;SharedAccessKey={KEY}")
            .parse()
            .unwrap()
    }

    #[test]
    fn test_parse_connection_string() {
        let c = conn();
        assert_eq!(c.host_name, "hub.azure-devices.net");
        assert_eq!(c.shared_access_key_name, "iothubowner");
        assert_eq!(c.key(), b"secret-key-for-tests");
        assert!(c.to_string().ends_with(KEY));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert_eq!(
            "invalid string".parse::<IotHubConnectionString>(),
            Err(ConnectionStringError::MalformedSegment("invalid string".into()))
        );
        assert_eq!(
            "HostName=h;SharedAccessKeyName=k".parse::<IotHubConnectionString>(),
            Err(ConnectionStringError::Missing("SharedAccessKey"))
        );
        assert_eq!(
            "HostName=h;SharedAccessKeyName=k;SharedAccessKey=!!".parse::<IotHubConnectionString>(),
            Err(ConnectionStringError::InvalidKey)
        );
        assert_eq!(
            "".parse::<IotHubConnectionString>(),
            Err(ConnectionStringError::Empty)
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let printed = format!("{:?}", conn());
        assert!(!printed.contains(KEY));
    }

    #[test]
    fn test_sas_token_verifies() {
        let c = conn();
        let now = Utc::now();
        let token = c.sas_token(now + chrono::Duration::hours(1));

        assert!(token.verify(c.key(), now));
        assert!(!token.verify(b"other-key", now));
        assert!(!token.verify(c.key(), now + chrono::Duration::hours(2)));

        let mut tampered = token.clone();
        tampered.resource = "other.azure-devices.net".into();
        assert!(!tampered.verify(c.key(), now));

        let text = token.to_string();
        assert!(text.starts_with("SharedAccessSignature sr=hub.azure-devices.net&sig="));
        assert!(text.ends_with("&skn=iothubowner"));
    }

    #[test]
    fn test_descriptor_target() {
        assert_eq!(
            IotHubDescriptor::new("Default").target().unwrap(),
            HubTarget::Default
        );
        assert!(IotHubDescriptor::new("invalid string").target().is_err());
        assert!(matches!(
            IotHubDescriptor::new(conn().to_string()).target().unwrap(),
            HubTarget::Custom(_)
        ));
    }
}
