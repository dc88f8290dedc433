//! Transport primitives shared by the token cache and the gateway client.
//!
//! [`GatewayHttpClient`] is the crate's only dependency on an HTTP stack: both the
//! client-credentials exchange and every proxied resource call go through it. The default
//! implementation wraps reqwest; tests substitute scripted fakes without touching the network.

// crates.io
use serde_json::Value;
// self
use crate::{_prelude::*, auth::TokenSecret, error::TransportError};

/// Maximum number of body bytes copied into an error preview.
const BODY_PREVIEW_LIMIT: usize = 256;

/// HTTP methods accepted by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
	/// Read a resource.
	Get,
	/// Create a resource.
	Post,
	/// Partially update a resource.
	Patch,
	/// Remove a resource.
	Delete,
}
impl Method {
	/// Returns the wire-format method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}

	/// Returns `true` for methods that mutate downstream state.
	pub const fn is_mutation(self) -> bool {
		matches!(self, Method::Post | Method::Patch)
	}

	#[cfg(feature = "reqwest")]
	fn as_reqwest(self) -> reqwest::Method {
		match self {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Patch => reqwest::Method::PATCH,
			Method::Delete => reqwest::Method::DELETE,
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request body variants; the variant decides the `Content-Type` header.
#[derive(Clone, Debug)]
pub enum RequestBody {
	/// JSON payload sent as `application/json`.
	Json(Value),
	/// Key/value pairs sent as `application/x-www-form-urlencoded`.
	Form(Vec<(&'static str, String)>),
}

/// One outbound HTTP call, fully described before dispatch.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Bearer credential attached as `Authorization`, when present.
	pub bearer: Option<TokenSecret>,
	/// Additional headers beyond the standard JSON `Accept`/`Content-Type` pair.
	pub headers: Vec<(&'static str, &'static str)>,
	/// Optional request body.
	pub body: Option<RequestBody>,
	/// Per-call time bound; the transport aborts and reports a timeout once it elapses.
	pub timeout: StdDuration,
}

/// Raw response handed back by the transport: a status code and the unparsed body.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Unparsed response body.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns a bounded, lossy text preview of the body for error messages.
	pub fn body_preview(&self) -> String {
		let text = String::from_utf8_lossy(&self.body);
		let trimmed = text.trim();

		if trimmed.is_empty() {
			return format!("status {} with an empty body", self.status);
		}

		trimmed.chars().take(BODY_PREVIEW_LIMIT).collect()
	}
}

/// Boxed response future returned by [`GatewayHttpClient`] implementations.
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing gateway calls.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared between
/// the token cache and the gateway client behind one `Arc`.
pub trait GatewayHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Dispatches the request and resolves with the raw response or a transport failure.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Bearer credentials ride on every resource call; configure any custom [`ReqwestClient`] to
/// disable redirect following so they are never re-sent to a delegated URI.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl GatewayHttpClient for ReqwestHttpClient {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut builder = client
				.request(request.method.as_reqwest(), request.url.clone())
				.timeout(request.timeout)
				.header("Accept", "application/json");

			if let Some(bearer) = &request.bearer {
				builder = builder.bearer_auth(bearer.expose());
			}
			for (name, value) in &request.headers {
				builder = builder.header(*name, *value);
			}
			builder = match request.body {
				Some(RequestBody::Json(value)) => builder
					.header("Content-Type", "application/json")
					.body(serde_json::to_vec(&value).map_err(TransportError::network)?),
				Some(RequestBody::Form(pairs)) => builder
					.header("Content-Type", "application/x-www-form-urlencoded")
					.body(encode_form(&pairs)),
				None => builder,
			};

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(RawResponse { status, body })
		})
	}
}

/// Percent-encodes form pairs into an `application/x-www-form-urlencoded` body.
pub fn encode_form(pairs: &[(&'static str, String)]) -> String {
	let mut serializer = url::form_urlencoded::Serializer::new(String::new());

	for (name, value) in pairs {
		serializer.append_pair(name, value);
	}

	serializer.finish()
}


#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn method_labels_and_mutation_flags() {
		assert_eq!(Method::Get.as_str(), "GET");
		assert_eq!(Method::Delete.to_string(), "DELETE");
		assert!(Method::Post.is_mutation());
		assert!(Method::Patch.is_mutation());
		assert!(!Method::Get.is_mutation());
		assert!(!Method::Delete.is_mutation());
	}

	#[test]
	fn body_preview_bounds_and_falls_back() {
		let empty = RawResponse { status: 502, body: Vec::new() };

		assert_eq!(empty.body_preview(), "status 502 with an empty body");

		let long = RawResponse { status: 500, body: vec![b'x'; 1024] };

		assert_eq!(long.body_preview().len(), 256);
	}

	#[test]
	fn form_encoding_escapes_reserved_characters() {
		let encoded = encode_form(&[
			("grant_type", "client_credentials".into()),
			("scope", "https://contoso.crm.dynamics.com/.default".into()),
		]);

		assert!(encoded.starts_with("grant_type=client_credentials&scope="));
		assert!(encoded.contains("https%3A%2F%2F"));
		assert!(!encoded.contains("/.default"));
	}
}
