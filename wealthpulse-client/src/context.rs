//! Per-request identity and context headers.
//!
//! - [`ContextResolver`] derives the header set from the credential store, the
//!   impersonation store and the cookie jar.
//! - [`RequestAuthenticator`] merges that set into an outbound request right
//!   before it is sent, leaving caller-set headers alone.
//!
//! Neither performs I/O or fails. A missing input just omits its header.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use url::Url;
use wealthpulse_core::{CredentialStore, ImpersonationStore, Secret};

/// Header naming the user whose data an administrator is viewing.
pub const PORTFOLIO_USER_HEADER: HeaderName = HeaderName::from_static("x-portfolio-user-id");

/// Header echoing the CSRF cookie back to the server.
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrftoken");

/// Derives the identity/context headers for the next request.
#[derive(Clone)]
pub struct ContextResolver {
    credentials: CredentialStore,
    impersonation: ImpersonationStore,
    cookies: Arc<Jar>,
    cookie_url: Url,
    csrf_cookie_name: String,
}

impl ContextResolver {
    pub fn new(
        credentials: CredentialStore,
        impersonation: ImpersonationStore,
        cookies: Arc<Jar>,
        cookie_url: Url,
        csrf_cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            impersonation,
            cookies,
            cookie_url,
            csrf_cookie_name: csrf_cookie_name.into(),
        }
    }

    /// Current header set.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(token) = self.credentials.access_token() {
            if let Some(value) = bearer_value(&token) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        if let Some(user) = self.impersonation.acting_as() {
            if let Ok(value) = HeaderValue::from_str(&user.to_string()) {
                headers.insert(PORTFOLIO_USER_HEADER, value);
            }
        }

        if let Some(csrf) = self.csrf_token() {
            match HeaderValue::from_str(&csrf) {
                Ok(value) => {
                    headers.insert(CSRF_HEADER, value);
                }
                Err(_) => tracing::warn!("Ignoring CSRF cookie that is not a valid header value"),
            }
        }

        headers
    }

    /// Only the CSRF header, for calls that must not carry identity.
    pub fn csrf_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self
            .csrf_token()
            .and_then(|csrf| HeaderValue::from_str(&csrf).ok())
        {
            headers.insert(CSRF_HEADER, value);
        }
        headers
    }

    /// Value of the CSRF cookie for the API origin, if the server set one.
    pub fn csrf_token(&self) -> Option<String> {
        let header = self.cookies.cookies(&self.cookie_url)?;
        let cookies = header.to_str().ok()?;
        find_cookie(cookies, &self.csrf_cookie_name).map(str::to_string)
    }
}

impl std::fmt::Debug for ContextResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextResolver")
            .field("cookie_url", &self.cookie_url.as_str())
            .field("csrf_cookie_name", &self.csrf_cookie_name)
            .finish_non_exhaustive()
    }
}

/// Attaches resolved headers to outbound requests.
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    resolver: ContextResolver,
}

impl RequestAuthenticator {
    pub fn new(resolver: ContextResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ContextResolver {
        &self.resolver
    }

    /// Merge the resolved headers into `headers`.
    ///
    /// Returns the bearer token the request will carry, whether it came from
    /// the store or from the caller.
    pub fn authenticate(&self, headers: &mut HeaderMap) -> Option<String> {
        for (name, value) in self.resolver.headers() {
            if let Some(name) = name {
                if !headers.contains_key(&name) {
                    headers.insert(name, value);
                }
            }
        }

        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string)
    }
}

fn bearer_value(token: &Secret) -> Option<HeaderValue> {
    match HeaderValue::from_str(&format!("Bearer {}", token.expose())) {
        Ok(mut value) => {
            value.set_sensitive(true);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Stored access token is not a valid header value; sending unauthenticated");
            None
        }
    }
}

/// Find `name` in a `Cookie` header value (`a=1; b=2`).
fn find_cookie<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wealthpulse_core::{MemoryStore, SecretStore, UserId};

    struct Fixture {
        credentials: CredentialStore,
        impersonation: ImpersonationStore,
        cookies: Arc<Jar>,
        url: Url,
        authenticator: RequestAuthenticator,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn SecretStore> = Arc::new(MemoryStore::new());
        let credentials = CredentialStore::new(store.clone());
        let impersonation = ImpersonationStore::new(store);
        let cookies = Arc::new(Jar::default());
        let url = Url::parse("http://localhost:8000/api/v1").unwrap();
        let resolver = ContextResolver::new(
            credentials.clone(),
            impersonation.clone(),
            cookies.clone(),
            url.clone(),
            "wp_csrftoken",
        );
        Fixture {
            credentials,
            impersonation,
            cookies,
            url,
            authenticator: RequestAuthenticator::new(resolver),
        }
    }

    #[test]
    fn test_empty_context_emits_no_headers() {
        let fx = fixture();
        assert!(fx.authenticator.resolver().headers().is_empty());

        let mut headers = HeaderMap::new();
        assert_eq!(fx.authenticator.authenticate(&mut headers), None);
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_full_context() {
        let fx = fixture();
        fx.credentials
            .set_tokens(&Secret::new("A1"), &Secret::new("R1"))
            .unwrap();
        fx.impersonation.set_acting_as(UserId(42)).unwrap();
        fx.cookies
            .add_cookie_str("wp_csrftoken=csrf-value; Path=/", &fx.url);

        let headers = fx.authenticator.resolver().headers();
        assert_eq!(headers[AUTHORIZATION], "Bearer A1");
        assert_eq!(headers[PORTFOLIO_USER_HEADER], "42");
        assert_eq!(headers[CSRF_HEADER], "csrf-value");
    }

    #[test]
    fn test_other_cookies_are_not_mirrored() {
        let fx = fixture();
        fx.cookies.add_cookie_str("session=abc; Path=/", &fx.url);
        fx.cookies
            .add_cookie_str("wp_csrftoken_old=stale; Path=/", &fx.url);

        assert!(fx.authenticator.resolver().csrf_token().is_none());
        assert!(fx.authenticator.resolver().csrf_headers().is_empty());
    }

    #[test]
    fn test_caller_headers_are_not_overwritten() {
        let fx = fixture();
        fx.credentials
            .set_tokens(&Secret::new("A1"), &Secret::new("R1"))
            .unwrap();
        fx.impersonation.set_acting_as(UserId(7)).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer caller"));

        let sent_with = fx.authenticator.authenticate(&mut headers);

        assert_eq!(sent_with.as_deref(), Some("caller"));
        assert_eq!(headers[AUTHORIZATION], "Bearer caller");
        assert_eq!(headers[PORTFOLIO_USER_HEADER], "7");
    }

    #[test]
    fn test_authenticate_reports_stored_token() {
        let fx = fixture();
        fx.credentials
            .set_tokens(&Secret::new("A9"), &Secret::new("R9"))
            .unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(
            fx.authenticator.authenticate(&mut headers).as_deref(),
            Some("A9")
        );
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_unencodable_token_is_omitted() {
        let fx = fixture();
        fx.credentials
            .set_tokens(&Secret::new("bad\ntoken"), &Secret::new("R"))
            .unwrap();

        assert!(fx.authenticator.resolver().headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_find_cookie() {
        assert_eq!(find_cookie("a=1; wp_csrftoken=x; b=2", "wp_csrftoken"), Some("x"));
        assert_eq!(find_cookie("a=1", "wp_csrftoken"), None);
        assert_eq!(find_cookie("", "wp_csrftoken"), None);
    }
}
