//! Gateway-level error types shared across the token cache, transport, and resource client.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// Callers translate these into transport-level responses: [`Error::NotFound`] maps to 404,
/// everything else to a 5xx with a safe message.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout) while calling the resource API.
	#[error(transparent)]
	Network(#[from] TransportError),

	/// A bearer token could not be obtained from the authority.
	#[error("Authentication against the authority failed: {reason}.")]
	Authentication {
		/// HTTP status returned by the token endpoint, when one was received.
		status: Option<u16>,
		/// Downstream- or transport-supplied reason string.
		reason: String,
	},
	/// The resource API reported that the targeted entity does not exist.
	#[error("The targeted entity does not exist downstream.")]
	NotFound,
	/// The resource API rejected the call with a non-retryable status.
	#[error("The resource API rejected the call with status {status}: {message}.")]
	Upstream {
		/// HTTP status code returned by the resource API.
		status: u16,
		/// Downstream-provided error message, or a body preview when none was supplied.
		message: String,
	},
}

/// Configuration and validation failures raised at construction time.
///
/// Every required value is checked when a [`GatewayConfig`](crate::config::GatewayConfig) is
/// built; a missing or malformed value never surfaces lazily on the first call.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required environment variable is absent or empty.
	#[error("Required environment variable `{name}` is missing.")]
	MissingVar {
		/// Name of the absent variable.
		name: &'static str,
	},
	/// The resource URL does not use HTTPS.
	#[error("The resource URL must start with https://.")]
	InsecureResourceUrl,
	/// A derived or caller-supplied URL cannot be parsed.
	#[error("URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl From<url::ParseError> for ConfigError {
	fn from(e: url::ParseError) -> Self {
		Self::InvalidUrl { source: e }
	}
}

/// Transport-level failures (network, IO, per-call timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the remote endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The per-call time bound elapsed before a response arrived.
	#[error("The call exceeded its time bound and was aborted.")]
	Timeout,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}
