//! OAuth 1.0a request signing (HMAC-SHA1), as required for Twitter/X
//! user-context writes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use postgate_common::{PostgateError, Result};
use sha1::Sha1;

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

#[derive(Clone)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Per-request values that must differ on every call.
#[derive(Debug, Clone)]
pub struct Nonce {
    pub nonce: String,
    pub timestamp: u64,
}

impl Nonce {
    pub fn fresh() -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            nonce: uuid::Uuid::new_v4().simple().to_string(),
            timestamp,
        }
    }
}

impl OAuthCredentials {
    fn oauth_params(&self, nonce: &Nonce) -> Vec<(&'static str, String)> {
        vec![
            ("oauth_consumer_key", self.consumer_key.clone()),
            ("oauth_nonce", nonce.nonce.clone()),
            ("oauth_signature_method", "HMAC-SHA1".to_string()),
            ("oauth_timestamp", nonce.timestamp.to_string()),
            ("oauth_token", self.access_token.clone()),
            ("oauth_version", "1.0".to_string()),
        ]
    }

    /// Sorted, encoded `k=v&...` string over OAuth and request parameters.
    fn parameter_string(&self, nonce: &Nonce, request_params: &[(&str, &str)]) -> String {
        let mut pairs: Vec<(String, String)> = self
            .oauth_params(nonce)
            .into_iter()
            .map(|(k, v)| (encode(k), encode(&v)))
            .chain(request_params.iter().map(|(k, v)| (encode(k), encode(v))))
            .collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn signature(
        &self,
        method: &str,
        url: &str,
        nonce: &Nonce,
        request_params: &[(&str, &str)],
    ) -> Result<String> {
        let base = format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            encode(url),
            encode(&self.parameter_string(nonce, request_params))
        );
        let key = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.access_token_secret)
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| PostgateError::Publish(format!("Invalid OAuth signing key: {e}")))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Build the `Authorization: OAuth ...` header value.
    ///
    /// `request_params` are query or form parameters that take part in the
    /// signature; JSON bodies do not.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        nonce: &Nonce,
        request_params: &[(&str, &str)],
    ) -> Result<String> {
        let signature = self.signature(method, url, nonce, request_params)?;
        let mut params = self.oauth_params(nonce);
        params.push(("oauth_signature", signature));
        params.sort_by(|a, b| a.0.cmp(b.0));

        let fields = params
            .into_iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(&v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {fields}"))
    }
}
