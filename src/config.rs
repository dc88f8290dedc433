//! Startup configuration for the gateway's shared application identity.
//!
//! All values are loaded once and validated eagerly; a missing or malformed value fails at
//! construction instead of surfacing on the first proxied call. The authority token endpoint and
//! the Web API base are derived here so the rest of the crate only ever handles parsed [`Url`]s.

// std
use std::env;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Environment variable holding the Dataverse organization URL.
pub const ENV_RESOURCE_URL: &str = "DATAVERSE_URL";
/// Environment variable holding the Azure AD tenant identifier.
pub const ENV_TENANT_ID: &str = "DATAVERSE_TENANT_ID";
/// Environment variable holding the confidential client identifier.
pub const ENV_CLIENT_ID: &str = "DATAVERSE_CLIENT_ID";
/// Environment variable holding the confidential client secret.
pub const ENV_CLIENT_SECRET: &str = "DATAVERSE_CLIENT_SECRET";
/// Environment variable overriding the OAuth scope; defaults to `{DATAVERSE_URL}/.default`.
pub const ENV_SCOPE: &str = "DATAVERSE_SCOPE";

/// Web API version segment appended to the resource URL.
const WEB_API_SEGMENT: &str = "/api/data/v9.2";

/// Validated gateway configuration: client identity plus derived endpoints.
#[derive(Clone)]
pub struct GatewayConfig {
	/// OAuth 2.0 client identifier used for every exchange.
	pub client_id: String,
	/// Confidential client secret; redacted in logs.
	pub client_secret: TokenSecret,
	/// Scope requested during the client-credentials grant.
	pub scope: String,
	/// Authority token endpoint receiving the form-encoded exchange.
	pub token_endpoint: Url,
	/// Base URL of the resource Web API; call paths are appended to it.
	pub web_api_base: Url,
}
impl GatewayConfig {
	/// Builds a configuration from explicit values, deriving the authority token endpoint and
	/// the Web API base.
	///
	/// `scope` falls back to `{resource_url}/.default` when absent. The resource URL must use
	/// HTTPS; both derived URLs must parse.
	pub fn new(
		resource_url: &str,
		tenant_id: &str,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		scope: Option<String>,
	) -> Result<Self, ConfigError> {
		if !resource_url.starts_with("https://") {
			return Err(ConfigError::InsecureResourceUrl);
		}

		let resource_url = resource_url.trim_end_matches('/');
		let token_endpoint = Url::parse(&format!(
			"https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token"
		))?;
		let web_api_base = Url::parse(&format!("{resource_url}{WEB_API_SEGMENT}"))?;

		Ok(Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			scope: scope.unwrap_or_else(|| format!("{resource_url}/.default")),
			token_endpoint,
			web_api_base,
		})
	}

	/// Loads and validates the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		let resource_url = require_var(ENV_RESOURCE_URL)?;
		let tenant_id = require_var(ENV_TENANT_ID)?;
		let client_id = require_var(ENV_CLIENT_ID)?;
		let client_secret = require_var(ENV_CLIENT_SECRET)?;
		let scope = env::var(ENV_SCOPE).ok().filter(|value| !value.is_empty());

		Self::new(&resource_url, &tenant_id, client_id, client_secret, scope)
	}

	/// Overrides the derived authority token endpoint; used to point tests at a mock authority.
	pub fn with_token_endpoint(mut self, endpoint: Url) -> Self {
		self.token_endpoint = endpoint;

		self
	}

	/// Overrides the derived Web API base; used to point tests at a mock resource server.
	pub fn with_web_api_base(mut self, base: Url) -> Self {
		self.web_api_base = base;

		self
	}
}
impl Debug for GatewayConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GatewayConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("scope", &self.scope)
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("web_api_base", &self.web_api_base.as_str())
			.finish()
	}
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
	env::var(name).ok().filter(|value| !value.is_empty()).ok_or(ConfigError::MissingVar { name })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

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

	#[test]
	fn derives_authority_and_web_api_urls() {
		let config = config();

		assert_eq!(
			config.token_endpoint.as_str(),
			"https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token",
		);
		assert_eq!(
			config.web_api_base.as_str(),
			"https://contoso.crm.dynamics.com/api/data/v9.2",
		);
	}

	#[test]
	fn scope_defaults_to_resource_suffix() {
		assert_eq!(config().scope, "https://contoso.crm.dynamics.com/.default");

		let explicit = GatewayConfig::new(
			"https://contoso.crm.dynamics.com",
			"tenant-1",
			"client-1",
			"secret-1",
			Some("custom/.default".into()),
		)
		.expect("Config with explicit scope should be valid.");

		assert_eq!(explicit.scope, "custom/.default");
	}

	#[test]
	fn rejects_insecure_resource_url() {
		let err = GatewayConfig::new("http://contoso.local", "t", "c", "s", None)
			.expect_err("Plain HTTP resource URLs should be rejected.");

		assert!(matches!(err, ConfigError::InsecureResourceUrl));
	}

	#[test]
	fn trailing_slash_is_normalized() {
		let config = GatewayConfig::new(
			"https://contoso.crm.dynamics.com/",
			"tenant-1",
			"client-1",
			"secret-1",
			None,
		)
		.expect("Config with trailing slash should be valid.");

		assert_eq!(
			config.web_api_base.as_str(),
			"https://contoso.crm.dynamics.com/api/data/v9.2",
		);
	}

	#[test]
	fn debug_output_redacts_the_secret() {
		let rendered = format!("{:?}", config());

		assert!(!rendered.contains("secret-1"));
		assert!(rendered.contains("<redacted>"));
	}
}
