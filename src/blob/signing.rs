use crate::blob::{BlobError, BlobResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Produces expiring read URLs for blob keys
///
/// A URL has the form `{base}/{key}?expires={unix}&signature={hex}` where the
/// signature is the HMAC-SHA256 of `key` and `expires` joined by a newline,
/// keyed with the signing secret.
#[derive(Debug, Clone)]
pub struct UrlSigner {
    secret: String,
    base_url: String,
}

impl UrlSigner {
    pub fn new(secret: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Signs `key` for reading until `expires_at` (unix seconds)
    pub fn sign(&self, key: &str, expires_at: i64) -> BlobResult<String> {
        let path = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let signature = hex::encode(self.mac(key, expires_at)?.finalize().into_bytes());

        Ok(format!(
            "{}/{}?expires={}&signature={}",
            self.base_url, path, expires_at, signature
        ))
    }

    fn mac(&self, key: &str, expires_at: i64) -> BlobResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| BlobError::Signing(e.to_string()))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires_at.to_string().as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
impl UrlSigner {
    /// Checks a hex signature in constant time, rejecting expired URLs
    fn verify(&self, key: &str, expires_at: i64, signature: &str, now: i64) -> bool {
        let Ok(raw) = hex::decode(signature) else {
            return false;
        };
        now <= expires_at
            && self
                .mac(key, expires_at)
                .map_or(false, |mac| mac.verify_slice(&raw).is_ok())
    }
}
