//! Demonstrates the gateway end to end against a mock authority and resource server: one
//! client-credentials exchange, then cached-token CRUD calls over an entity set.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use dataverse_gateway::{
	config::GatewayConfig,
	gateway::Gateway,
	odata::ListQuery,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":900}",
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/accounts");
			then.status(201)
				.header("content-type", "application/json")
				.body("{\"accountid\":\"demo-1\",\"name\":\"Acme\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/accounts");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"@odata.count\":1,\"value\":[{\"accountid\":\"demo-1\",\"name\":\"Acme\"}]}");
		})
		.await;

	let config = GatewayConfig::new(
		"https://contoso.crm.dynamics.com",
		"demo-tenant",
		"demo-client",
		"demo-secret",
		None,
	)?
	.with_token_endpoint(Url::parse(&server.url("/token"))?)
	.with_web_api_base(Url::parse(&server.url("/api"))?);
	let gateway = Gateway::new(&config);
	let accounts = gateway.entity_set("accounts");
	let created = accounts.create(json!({ "name": "Acme" })).await?;

	println!("Created entity: {created}.");

	let query = ListQuery::new().with_limit(10).with_search("acme");
	let page = accounts.list(&query, &["name"], &["name"]).await?;

	println!("Listed {} of {} matching entities.", page.value.len(), page.total());

	// Both calls reused the cached token from the single exchange.
	token_mock.assert_async().await;

	Ok(())
}
