use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    VARY,
};
use axum::http::{HeaderMap, HeaderValue};

/// Cross-origin headers attached to every response of the formula endpoint.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsPolicy {
    /// `origin` is either `*` or a single origin such as `https://addin.example.com`.
    pub fn new(origin: &str) -> anyhow::Result<Self> {
        let allow_origin = HeaderValue::from_str(origin.trim())
            .map_err(|e| anyhow::anyhow!("invalid allowed_origin {origin:?}: {e}"))?;
        Ok(Self {
            allow_origin,
            allow_methods: HeaderValue::from_static("POST, OPTIONS"),
            allow_headers: HeaderValue::from_static("Content-Type"),
        })
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        if self.allow_origin != "*" {
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allow_origin: HeaderValue::from_static("*"),
            allow_methods: HeaderValue::from_static("POST, OPTIONS"),
            allow_headers: HeaderValue::from_static("Content-Type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_policy_headers() {
        let mut headers = HeaderMap::new();
        CorsPolicy::default().apply(&mut headers);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert!(headers.get(VARY).is_none());
    }

    #[test]
    fn single_origin_policy_varies_on_origin() {
        let mut headers = HeaderMap::new();
        CorsPolicy::new("https://excel-smart.vercel.app")
            .unwrap()
            .apply(&mut headers);
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://excel-smart.vercel.app"
        );
        assert_eq!(headers[VARY], "Origin");
    }

    #[test]
    fn rejects_unencodable_origin() {
        assert!(CorsPolicy::new("https://bad\norigin").is_err());
    }
}
