//! Gateway client executing proxied calls against the resource Web API.
//!
//! Every call attaches the cached bearer token and is replayed at most once: a 401 forces a
//! cache invalidation and a fresh exchange before the single retry, any other rejection is
//! surfaced immediately with its downstream status and message preserved. The retry budget is an
//! explicit counter, so the one-replay bound is structural rather than a guard condition.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	cache::TokenCache,
	config::GatewayConfig,
	http::{GatewayHttpClient, Method, OutboundRequest, RawResponse, RequestBody},
	obs::{self, CallKind, CallOutcome, CallSpan},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Time bound for proxied resource calls.
const RESOURCE_TIMEOUT: StdDuration = StdDuration::from_secs(10);
/// Status that triggers the single invalidate-and-replay cycle.
const STATUS_UNAUTHORIZED: u16 = 401;
/// Status mapped to [`Error::NotFound`].
const STATUS_NOT_FOUND: u16 = 404;
/// Status carrying no body by contract.
const STATUS_NO_CONTENT: u16 = 204;

/// OData protocol headers attached to every resource call.
const ODATA_HEADERS: [(&str, &str); 2] = [("OData-MaxVersion", "4.0"), ("OData-Version", "4.0")];
/// Header asking the server to echo the resulting representation on mutations.
const PREFER_REPRESENTATION: (&str, &str) = ("Prefer", "return=representation");

/// Executes logical requests against the resource API on behalf of route handlers.
pub struct Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	base: Url,
	cache: Arc<TokenCache<C>>,
	http: Arc<C>,
}
impl<C> Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates a gateway that shares the caller-provided transport with its token cache.
	pub fn with_http_client(config: &GatewayConfig, http: impl Into<Arc<C>>) -> Self {
		let http = http.into();
		let cache = Arc::new(TokenCache::with_http_client(config, http.clone()));

		Self { base: config.web_api_base.clone(), cache, http }
	}

	/// Returns the token cache backing this gateway.
	pub fn cache(&self) -> &TokenCache<C> {
		&self.cache
	}

	/// Executes one logical request and decodes the response.
	///
	/// Returns `Ok(None)` for no-content responses (DELETE), otherwise the parsed JSON body.
	/// `path` is appended to the configured Web API base and should start with `/`.
	pub async fn execute(
		&self,
		method: Method,
		path: &str,
		payload: Option<Value>,
	) -> Result<Option<Value>> {
		let span = CallSpan::new(CallKind::Resource, "execute");

		obs::record_call_outcome(CallKind::Resource, CallOutcome::Attempt);

		let result = span.instrument(self.execute_inner(method, path, payload)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(CallKind::Resource, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(CallKind::Resource, CallOutcome::Failure),
		}

		result
	}

	/// Convenience wrapper for GET calls.
	pub async fn get(&self, path: &str) -> Result<Option<Value>> {
		self.execute(Method::Get, path, None).await
	}

	/// Convenience wrapper for POST calls.
	pub async fn post(&self, path: &str, payload: Value) -> Result<Option<Value>> {
		self.execute(Method::Post, path, Some(payload)).await
	}

	/// Convenience wrapper for PATCH calls.
	pub async fn patch(&self, path: &str, payload: Value) -> Result<Option<Value>> {
		self.execute(Method::Patch, path, Some(payload)).await
	}

	/// Convenience wrapper for DELETE calls.
	pub async fn delete(&self, path: &str) -> Result<Option<Value>> {
		self.execute(Method::Delete, path, None).await
	}

	async fn execute_inner(
		&self,
		method: Method,
		path: &str,
		payload: Option<Value>,
	) -> Result<Option<Value>> {
		let url = self.resource_url(path)?;
		// One replay total; only a 401 with budget remaining spends it.
		let mut retries_remaining = 1_u8;

		loop {
			let token = self.cache.token().await?;
			let request = OutboundRequest {
				method,
				url: url.clone(),
				bearer: Some(token),
				headers: resource_headers(method),
				body: payload.clone().map(RequestBody::Json),
				timeout: RESOURCE_TIMEOUT,
			};
			let response = self.http.execute(request).await?;

			if response.status == STATUS_UNAUTHORIZED && retries_remaining > 0 {
				retries_remaining -= 1;

				obs::record_call_outcome(CallKind::Resource, CallOutcome::Retry);
				self.cache.invalidate();

				continue;
			}

			return interpret_response(response);
		}
	}

	fn resource_url(&self, path: &str) -> Result<Url> {
		Url::parse(&format!("{}{path}", self.base))
			.map_err(|e| crate::error::ConfigError::from(e).into())
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestHttpClient> {
	/// Creates a gateway with a default reqwest-backed transport shared with its token cache.
	pub fn new(config: &GatewayConfig) -> Self {
		Self::with_http_client(config, ReqwestHttpClient::default())
	}
}
impl<C> Debug for Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("base", &self.base.as_str())
			.field("cache", &self.cache)
			.finish()
	}
}

fn resource_headers(method: Method) -> Vec<(&'static str, &'static str)> {
	let mut headers = ODATA_HEADERS.to_vec();

	if method.is_mutation() {
		headers.push(PREFER_REPRESENTATION);
	}

	headers
}

fn interpret_response(response: RawResponse) -> Result<Option<Value>> {
	match response.status {
		STATUS_NO_CONTENT => Ok(None),
		status if response.is_success() => {
			if response.body.is_empty() {
				return Ok(None);
			}

			serde_json::from_slice(&response.body).map(Some).map_err(|e| Error::Upstream {
				status,
				message: format!("malformed JSON body ({e})"),
			})
		},
		STATUS_NOT_FOUND => Err(Error::NotFound),
		status => Err(Error::Upstream { status, message: upstream_message(&response) }),
	}
}

/// Extracts the OData `error.message` field, falling back to a bounded body preview.
fn upstream_message(response: &RawResponse) -> String {
	serde_json::from_slice::<Value>(&response.body)
		.ok()
		.as_ref()
		.and_then(|body| body.get("error"))
		.and_then(|error| error.get("message"))
		.and_then(Value::as_str)
		.map(str::to_owned)
		.unwrap_or_else(|| response.body_preview())
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::http::testing::ScriptedClient;

	fn config() -> GatewayConfig {
		GatewayConfig::new(
			"https://contoso.crm.dynamics.com",
			"tenant-1",
			"client-1",
			"secret-1",
			None,
		)
		.expect("Config fixture should be valid.")
	}

	fn gateway(transport: Arc<ScriptedClient>) -> Gateway<ScriptedClient> {
		Gateway::with_http_client(&config(), transport)
	}

	/// Splits recorded requests into (token exchanges, resource calls) by URL.
	fn split_requests(transport: &ScriptedClient) -> (usize, usize) {
		let requests = transport.requests();
		let exchanges = requests
			.iter()
			.filter(|request| request.url.as_str() == config().token_endpoint.as_str())
			.count();

		(exchanges, requests.len() - exchanges)
	}

	#[tokio::test]
	async fn execute_round_trips_the_decoded_body() {
		let transport = ScriptedClient::new([
			ScriptedClient::token("tok-1", 3600),
			ScriptedClient::json(200, &json!({ "a": 1 })),
		]);
		let gateway = gateway(transport.clone());
		let result = gateway
			.post("/accounts", json!({ "a": 1 }))
			.await
			.expect("Echoing POST should succeed.");

		assert_eq!(result, Some(json!({ "a": 1 })));

		let requests = transport.requests();
		let resource = &requests[1];

		assert_eq!(resource.method, Method::Post);
		assert_eq!(
			resource.url.as_str(),
			"https://contoso.crm.dynamics.com/api/data/v9.2/accounts",
		);
		assert_eq!(
			resource.bearer.as_ref().map(|secret| secret.expose().to_owned()),
			Some("tok-1".to_owned()),
		);
		assert!(resource.headers.contains(&("OData-Version", "4.0")));
		assert!(resource.headers.contains(&("Prefer", "return=representation")));
	}

	#[tokio::test]
	async fn reads_do_not_request_representation() {
		let transport = ScriptedClient::new([
			ScriptedClient::token("tok-1", 3600),
			ScriptedClient::json(200, &json!({ "value": [] })),
		]);
		let gateway = gateway(transport.clone());

		gateway.get("/accounts").await.expect("GET should succeed.");

		let requests = transport.requests();

		assert!(!requests[1].headers.contains(&("Prefer", "return=representation")));
	}

	#[tokio::test]
	async fn unauthorized_then_success_replays_exactly_once() {
		let transport = ScriptedClient::new([
			ScriptedClient::token("tok-stale", 3600),
			ScriptedClient::status(401),
			ScriptedClient::token("tok-fresh", 3600),
			ScriptedClient::json(200, &json!({ "ok": true })),
		]);
		let gateway = gateway(transport.clone());
		let result = gateway.get("/accounts").await.expect("Replayed call should succeed.");

		assert_eq!(result, Some(json!({ "ok": true })));

		let (exchanges, resource_calls) = split_requests(&transport);

		assert_eq!(exchanges, 2);
		assert_eq!(resource_calls, 2);

		let requests = transport.requests();

		assert_eq!(requests[1].bearer.as_ref().map(|secret| secret.expose()), Some("tok-stale"));
		assert_eq!(requests[3].bearer.as_ref().map(|secret| secret.expose()), Some("tok-fresh"));
	}

	#[tokio::test]
	async fn a_second_unauthorized_is_not_replayed() {
		let transport = ScriptedClient::new([
			ScriptedClient::token("tok-1", 3600),
			ScriptedClient::status(401),
			ScriptedClient::token("tok-2", 3600),
			ScriptedClient::status(401),
		]);
		let gateway = gateway(transport.clone());
		let err = gateway.get("/accounts").await.expect_err("Double 401 should surface.");

		assert!(matches!(err, Error::Upstream { status: 401, .. }));

		let (exchanges, resource_calls) = split_requests(&transport);

		assert_eq!(exchanges, 2);
		assert_eq!(resource_calls, 2);
	}

	#[tokio::test]
	async fn not_found_is_surfaced_without_a_retry() {
		let transport = ScriptedClient::new([
			ScriptedClient::token("tok-1", 3600),
			ScriptedClient::status(404),
		]);
		let gateway = gateway(transport.clone());
		let err = gateway.get("/accounts(missing)").await.expect_err("404 should surface.");

		assert!(matches!(err, Error::NotFound));

		let (_, resource_calls) = split_requests(&transport);

		assert_eq!(resource_calls, 1);
	}

	#[tokio::test]
	async fn upstream_rejections_preserve_the_odata_message() {
		let transport = ScriptedClient::new([
			ScriptedClient::token("tok-1", 3600),
			ScriptedClient::json(400, &json!({ "error": { "message": "Invalid column." } })),
		]);
		let gateway = gateway(transport);
		let err = gateway.get("/accounts?$select=bogus").await.expect_err("400 should surface.");
		let Error::Upstream { status, message } = err else {
			panic!("Non-401 rejections should map to an upstream error.");
		};

		assert_eq!(status, 400);
		assert_eq!(message, "Invalid column.");
	}

	#[tokio::test]
	async fn delete_no_content_yields_no_value() {
		let transport = ScriptedClient::new([
			ScriptedClient::token("tok-1", 3600),
			ScriptedClient::status(204),
		]);
		let gateway = gateway(transport);
		let result = gateway.delete("/accounts(id-1)").await.expect("DELETE should succeed.");

		assert_eq!(result, None);
	}

	#[tokio::test]
	async fn failed_token_exchange_skips_the_resource_call() {
		let transport = ScriptedClient::new([ScriptedClient::status(500)]);
		let gateway = gateway(transport.clone());
		let err = gateway.get("/accounts").await.expect_err("Exchange failure should surface.");

		assert!(matches!(err, Error::Authentication { .. }));

		let (exchanges, resource_calls) = split_requests(&transport);

		assert_eq!(exchanges, 1);
		assert_eq!(resource_calls, 0);
	}

	#[tokio::test]
	async fn transport_failures_map_to_network_errors() {
		let transport = ScriptedClient::new([
			ScriptedClient::token("tok-1", 3600),
			Err(crate::error::TransportError::Timeout),
		]);
		let gateway = gateway(transport);
		let err = gateway.get("/accounts").await.expect_err("Timeout should surface.");

		assert!(matches!(
			err,
			Error::Network(crate::error::TransportError::Timeout)
		));
	}
}
