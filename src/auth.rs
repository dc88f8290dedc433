//! Credential state: the redacting secret wrapper and the cached bearer record.

// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping bearer material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Cached bearer credential obtained from a successful client-credentials exchange.
///
/// Both fields are always written together; the absence of a credential is modeled as
/// `Option<Credential>` in the cache, so partially-updated state cannot be observed.
#[derive(Clone, Debug)]
pub struct Credential {
	/// Opaque bearer token presented to the resource API.
	pub access_token: TokenSecret,
	/// Instant past which the token must no longer be handed out.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Returns `true` while the credential is strictly unexpired at the provided instant.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}
