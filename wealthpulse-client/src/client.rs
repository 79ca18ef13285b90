use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::Instrument;
use url::Url;
use wealthpulse_core::{
    CredentialStore, ImpersonationStore, RefreshRequest, Secret, SecretStore, TokenPair, UserId,
    UserProfile, create_store,
};

use crate::action_log::ActionLog;
use crate::classify;
use crate::config::GatewayConfig;
use crate::context::{ContextResolver, RequestAuthenticator};
use crate::error::{GatewayError, RefreshFailure, Result};
use crate::navigator::{MemoryNavigator, Navigator};
use crate::refresh::RefreshCoordinator;
use crate::transport::{
    ApiRequest, ApiResponse, MultipartPart, OutboundRequest, ReqwestTransport, RequestBody,
    Transport,
};

/// Action log message for a session ended by a failed refresh.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

struct Inner {
    config: GatewayConfig,
    credentials: CredentialStore,
    impersonation: ImpersonationStore,
    authenticator: RequestAuthenticator,
    transport: Arc<dyn Transport>,
    navigator: Arc<dyn Navigator>,
    refresh: RefreshCoordinator,
    log: ActionLog,
    cookies: Arc<Jar>,
}

/// Authenticated client for the WealthPulse API.
///
/// Every request goes through the same pipeline: resolve identity headers,
/// send, and on a 401 refresh the token pair once (shared with any concurrent
/// 401s) and replay. Failures other than recovered 401s are recorded in the
/// [`ActionLog`] and returned unchanged.
///
/// Cloning is cheap and clones share all state.
///
/// # Example
///
/// ```no_run
/// use wealthpulse_client::GatewayClient;
///
/// #[tokio::main]
/// async fn main() -> wealthpulse_client::Result<()> {
///     let client = GatewayClient::builder().build()?;
///
///     client.login("investor@example.com", "hunter2").await?;
///     let me = client.me().await?;
///     println!("Logged in as {}", me.email);
///
///     let assets: serde_json::Value = client.get_json("/assets").await?;
///     println!("{}", assets);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<Inner>,
}

impl GatewayClient {
    /// Start building a client from [`GatewayConfig::load`].
    pub fn builder() -> GatewayClientBuilder {
        GatewayClientBuilder::new()
    }

    /// Run a request through the full pipeline.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let span = tracing::debug_span!(
            "api_request",
            method = %request.method,
            path = %request.path
        );
        self.send_inner(request).instrument(span).await
    }

    async fn send_inner(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request)?;

        loop {
            let mut headers = request.headers.clone();
            if request.is_retried() {
                // Replays go out with the session token, not a rejected caller token.
                headers.remove(AUTHORIZATION);
            }
            let sent_with = self.inner.authenticator.authenticate(&mut headers);

            let outbound = OutboundRequest {
                method: request.method.clone(),
                url: url.clone(),
                headers,
                body: request.body.clone(),
            };

            let response = match self.inner.transport.execute(outbound).await {
                Ok(response) => response,
                Err(e) => {
                    return Err(self.fail(classify::transport_error(
                        &request.method,
                        url.as_str(),
                        &e.message,
                    )));
                }
            };

            if response.is_success() {
                tracing::debug!(status = %response.status, "Request succeeded");
                return Ok(response);
            }

            if response.status == StatusCode::UNAUTHORIZED {
                if request.is_retried() || self.inner.config.is_refresh_path(&request.path) {
                    let reason = if request.is_retried() {
                        "request rejected again after token refresh"
                    } else {
                        "refresh token rejected"
                    };
                    self.end_session(reason.to_string());
                    return Err(self.fail(classify::status_error(
                        &request.method,
                        url.as_str(),
                        &response,
                    )));
                }

                tracing::debug!("Received 401, recovering session");
                self.inner
                    .refresh
                    .recover(
                        sent_with.as_deref(),
                        || {
                            self.inner
                                .credentials
                                .access_token()
                                .map(Secret::into_inner)
                        },
                        move || self.refresh_session(),
                    )
                    .await?;

                request.mark_retried();
                continue;
            }

            return Err(self.fail(classify::status_error(
                &request.method,
                url.as_str(),
                &response,
            )));
        }
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = self.inner.config.endpoint(&request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    fn fail(&self, error: GatewayError) -> GatewayError {
        if !classify::record(&self.inner.log, &error) {
            tracing::debug!("Request failed: {}", error);
        }
        error
    }

    /// Exchange the stored refresh token for a new pair and persist it.
    ///
    /// On any failure the session is ended.
    async fn refresh_session(&self) -> std::result::Result<(), RefreshFailure> {
        let pair = match self.exchange_refresh_token().await {
            Ok(pair) => pair,
            Err(message) => return Err(self.end_session(message)),
        };

        if let Err(e) = self.inner.credentials.store_pair(&pair) {
            return Err(self.end_session(format!("failed to store refreshed tokens: {}", e)));
        }

        tracing::info!("Access token refreshed");
        Ok(())
    }

    async fn exchange_refresh_token(&self) -> std::result::Result<TokenPair, String> {
        let refresh_token = self
            .inner
            .credentials
            .refresh_token()
            .ok_or_else(|| "no refresh token available".to_string())?;

        let config = &self.inner.config;
        let url = config
            .endpoint(&config.refresh_path)
            .map_err(|e| e.to_string())?;
        let body = serde_json::to_value(RefreshRequest { refresh_token })
            .map_err(|e| format!("failed to encode refresh request: {}", e))?;

        // CSRF only. The refresh token is the credential.
        let outbound = OutboundRequest {
            method: Method::POST,
            url,
            headers: self.inner.authenticator.resolver().csrf_headers(),
            body: RequestBody::Json(body),
        };

        let response = self
            .inner
            .transport
            .execute(outbound)
            .await
            .map_err(|e| e.message)?;

        if !response.is_success() {
            let body: Value = response.json().unwrap_or(Value::Null);
            let fallback = format!(
                "Request failed with status code {}",
                response.status.as_u16()
            );
            return Err(classify::extract_message(&body, Some(&fallback)));
        }

        response
            .json::<TokenPair>()
            .map_err(|e| format!("malformed refresh response: {}", e))
    }

    /// Clear tokens, log one warning and send the user to the login route.
    fn end_session(&self, reason: String) -> RefreshFailure {
        tracing::warn!("Ending session: {}", reason);
        self.inner.credentials.clear_tokens();
        self.inner
            .log
            .warning(SESSION_EXPIRED_MESSAGE, Some(json!({ "reason": reason })));

        let login_route = &self.inner.config.login_route;
        if self.inner.navigator.location() != *login_route {
            self.inner.navigator.redirect(login_route);
        }

        RefreshFailure::new(reason)
    }

    async fn read_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let url = self.url_for(&request)?;
        let response = self.send(request).await?;
        decode(&response, url.as_str())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.read_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.read_json(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.read_json(ApiRequest::put(path).json(body)?).await
    }

    /// `DELETE path`, discarding the response body.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(ApiRequest::delete(path)).await.map(|_| ())
    }

    /// Upload a file as a multipart form with a single part named `field`.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<T> {
        let part = MultipartPart::file(field, file_name, bytes);
        self.read_json(ApiRequest::post(path).multipart(vec![part]))
            .await
    }

    /// Log in with email and password and store the returned pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let request = ApiRequest::post(self.inner.config.login_path.clone()).form(vec![
            ("username".to_string(), email.to_string()),
            ("password".to_string(), password.to_string()),
        ]);
        let pair: TokenPair = self.read_json(request).await?;
        self.inner.credentials.store_pair(&pair)?;

        tracing::info!("Logged in as {}", email);
        self.inner.log.info("Logged in", Some(json!({ "email": email })));
        Ok(())
    }

    /// Forget the stored tokens. The impersonation target is kept.
    pub fn logout(&self) {
        self.inner.credentials.clear_tokens();
        self.inner.log.info("Logged out", None);
    }

    /// The authenticated user.
    pub async fn me(&self) -> Result<UserProfile> {
        self.get_json(&self.inner.config.me_path).await
    }

    /// View the application as another user. Requires an admin session
    /// server-side.
    pub fn act_as(&self, user: UserId) -> Result<()> {
        self.inner.impersonation.set_acting_as(user)?;
        self.inner
            .log
            .info(format!("Viewing as user {}", user), Some(json!({ "user_id": user })));
        Ok(())
    }

    /// Stop impersonating and reload so no data from the other view survives.
    pub fn exit_view(&self) -> Result<()> {
        self.inner.impersonation.clear()?;
        self.inner.log.info("Returned to own view", None);
        self.inner.navigator.reload();
        Ok(())
    }

    /// Whether a live access token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.inner.credentials.is_authenticated()
    }

    pub fn acting_as(&self) -> Option<UserId> {
        self.inner.impersonation.acting_as()
    }

    pub fn action_log(&self) -> &ActionLog {
        &self.inner.log
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    pub fn impersonation(&self) -> &ImpersonationStore {
        &self.inner.impersonation
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn cookies(&self) -> &Arc<Jar> {
        &self.inner.cookies
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.inner.config.base_url)
            .field("refresh", &self.inner.refresh)
            .field("log", &self.inner.log)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(response: &ApiResponse, url: &str) -> Result<T> {
    // Endpoints answering 204 decode as `null`.
    let parsed = if response.body.is_empty() {
        serde_json::from_value(Value::Null)
    } else {
        response.json()
    };
    parsed.map_err(|e| GatewayError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Builder for [`GatewayClient`].
///
/// Anything not set explicitly is derived from the config: the store backend
/// from `config.store`, a [`ReqwestTransport`] sharing the cookie jar, and a
/// [`MemoryNavigator`].
#[derive(Default)]
pub struct GatewayClientBuilder {
    config: Option<GatewayConfig>,
    store: Option<Arc<dyn SecretStore>>,
    transport: Option<Arc<dyn Transport>>,
    navigator: Option<Arc<dyn Navigator>>,
    cookies: Option<Arc<Jar>>,
    log: Option<ActionLog>,
}

impl GatewayClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Share a cookie jar, e.g. with a custom transport.
    pub fn cookies(mut self, cookies: Arc<Jar>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn action_log(mut self, log: ActionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn build(self) -> Result<GatewayClient> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => GatewayConfig::load()?,
        };

        let store = self
            .store
            .unwrap_or_else(|| Arc::from(create_store(config.store)));
        let cookies = self.cookies.unwrap_or_default();
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(cookies.clone())?),
        };
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(MemoryNavigator::default()));
        let log = self
            .log
            .unwrap_or_else(|| ActionLog::new(config.action_log_capacity));

        let credentials = CredentialStore::new(store.clone());
        let impersonation = ImpersonationStore::new(store);
        let resolver = ContextResolver::new(
            credentials.clone(),
            impersonation.clone(),
            cookies.clone(),
            config.base()?,
            config.csrf_cookie_name.clone(),
        );

        tracing::debug!(base_url = %config.base_url, "Gateway client ready");

        Ok(GatewayClient {
            inner: Arc::new(Inner {
                config,
                credentials,
                impersonation,
                authenticator: RequestAuthenticator::new(resolver),
                transport,
                navigator,
                refresh: RefreshCoordinator::new(),
                log,
                cookies,
            }),
        })
    }
}
