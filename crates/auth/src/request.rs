use axum::http::{HeaderMap, header};

/// The parts of an inbound request the authenticators look at.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    headers: &'a HeaderMap,
}

impl<'a> RequestContext<'a> {
    pub fn new(headers: &'a HeaderMap) -> Self {
        Self { headers }
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// Value of `Authorization: Bearer <value>`. The scheme is matched
    /// case-insensitively; an empty value counts as absent.
    pub fn bearer(&self) -> Option<&'a str> {
        let value = self.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
    }

    /// First cookie called `name` across all `Cookie` headers.
    pub fn cookie(&self, name: &str) -> Option<&'a str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|h| parse_cookie(h, name))
    }
}

/// Parse a specific cookie value from a Cookie header string.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(name)
            && let Some(value) = value.strip_prefix('=')
        {
            return Some(value);
        }
    }
    None
}
