//! Expiry-aware token cache backing the gateway's shared application identity.
//!
//! [`TokenCache::token`] returns the cached bearer secret while it remains strictly unexpired
//! and otherwise performs one client-credentials exchange against the authority. A refresh guard
//! ensures concurrent callers piggy-back on the same in-flight exchange instead of stampeding
//! the token endpoint, and the stored credential is only ever replaced whole: a failed exchange
//! leaves the previous state untouched.

// crates.io
use serde_json::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	config::GatewayConfig,
	http::{GatewayHttpClient, Method, OutboundRequest, RequestBody},
	obs::{self, CallKind, CallOutcome, CallSpan},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Margin subtracted from `expires_in` so a token is never handed out when it could expire
/// mid-flight during a slow downstream call.
const SAFETY_MARGIN: Duration = Duration::seconds(300);
/// Time bound for the exchange call; shorter than the resource bound since the authority
/// answers from memory.
const EXCHANGE_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Successful token endpoint response, reduced to the fields the cache consumes.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	expires_in: i64,
}

/// Owns the lifecycle of the single shared bearer credential.
pub struct TokenCache<C>
where
	C: ?Sized + GatewayHttpClient,
{
	token_endpoint: Url,
	client_id: String,
	client_secret: TokenSecret,
	scope: String,
	credential: RwLock<Option<Credential>>,
	refresh_guard: AsyncMutex<()>,
	http: Arc<C>,
}
impl<C> TokenCache<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates a cache that reuses the caller-provided transport.
	pub fn with_http_client(config: &GatewayConfig, http: impl Into<Arc<C>>) -> Self {
		Self {
			token_endpoint: config.token_endpoint.clone(),
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			scope: config.scope.clone(),
			credential: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			http: http.into(),
		}
	}

	/// Returns a currently-valid bearer secret, exchanging credentials only when the cached
	/// one is missing or expired.
	pub async fn token(&self) -> Result<TokenSecret> {
		if let Some(secret) = self.cached(OffsetDateTime::now_utc()) {
			return Ok(secret);
		}

		let _refresh = self.refresh_guard.lock().await;

		// A concurrent caller may have completed an exchange while this one waited on the
		// guard; the re-check lets it reuse that credential.
		if let Some(secret) = self.cached(OffsetDateTime::now_utc()) {
			return Ok(secret);
		}

		let span = CallSpan::new(CallKind::TokenExchange, "token");

		obs::record_call_outcome(CallKind::TokenExchange, CallOutcome::Attempt);

		let result = span.instrument(self.exchange()).await;

		match &result {
			Ok(_) => obs::record_call_outcome(CallKind::TokenExchange, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(CallKind::TokenExchange, CallOutcome::Failure),
		}

		let credential = result?;
		let secret = credential.access_token.clone();

		*self.credential.write() = Some(credential);

		Ok(secret)
	}

	/// Clears the cached credential unconditionally. Idempotent; the next [`TokenCache::token`]
	/// call performs a fresh exchange.
	pub fn invalidate(&self) {
		*self.credential.write() = None;
	}

	fn cached(&self, now: OffsetDateTime) -> Option<TokenSecret> {
		self.credential
			.read()
			.as_ref()
			.filter(|credential| credential.is_valid_at(now))
			.map(|credential| credential.access_token.clone())
	}

	async fn exchange(&self) -> Result<Credential> {
		let request = OutboundRequest {
			method: Method::Post,
			url: self.token_endpoint.clone(),
			bearer: None,
			headers: Vec::new(),
			body: Some(RequestBody::Form(vec![
				("client_id", self.client_id.clone()),
				("client_secret", self.client_secret.expose().into()),
				("scope", self.scope.clone()),
				("grant_type", "client_credentials".into()),
			])),
			timeout: EXCHANGE_TIMEOUT,
		};
		let response = self
			.http
			.execute(request)
			.await
			.map_err(|e| Error::Authentication { status: None, reason: e.to_string() })?;

		if !response.is_success() {
			return Err(Error::Authentication {
				status: Some(response.status),
				reason: response.body_preview(),
			});
		}

		let deserializer = &mut Deserializer::from_slice(&response.body);
		let parsed: TokenEndpointResponse =
			serde_path_to_error::deserialize(deserializer).map_err(|e| Error::Authentication {
				status: Some(response.status),
				reason: format!("malformed token endpoint body ({e})"),
			})?;
		let now = OffsetDateTime::now_utc();

		Ok(Credential {
			access_token: TokenSecret::new(parsed.access_token),
			expires_at: now + Duration::seconds(parsed.expires_in) - SAFETY_MARGIN,
		})
	}
}
#[cfg(feature = "reqwest")]
impl TokenCache<ReqwestHttpClient> {
	/// Creates a cache with a default reqwest-backed transport.
	pub fn new(config: &GatewayConfig) -> Self {
		Self::with_http_client(config, ReqwestHttpClient::default())
	}
}
impl<C> Debug for TokenCache<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("scope", &self.scope)
			.field("credential_cached", &self.credential.read().is_some())
			.finish()
	}
}
