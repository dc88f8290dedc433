//! Generic CRUD operations over one named entity set, built on the gateway client.
//!
//! This is the surface a route layer calls: list with pagination and search, retrieve by
//! identifier, create/update with the echoed representation, and delete. Entity schemas are the
//! caller's concern; payloads and rows stay as raw JSON values.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	gateway::Gateway,
	http::GatewayHttpClient,
	odata::{ListQuery, Page},
};

/// Handle for CRUD calls against one entity set (e.g. `accounts` or `contacts`).
#[derive(Debug)]
pub struct EntitySet<'g, C>
where
	C: ?Sized + GatewayHttpClient,
{
	gateway: &'g Gateway<C>,
	name: String,
}
impl<C> Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Binds a CRUD handle to the named entity set.
	pub fn entity_set(&self, name: impl Into<String>) -> EntitySet<'_, C> {
		EntitySet { gateway: self, name: name.into() }
	}
}
impl<C> EntitySet<'_, C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Lists one page of entities; `select` and `search_columns` parameterize the query.
	pub async fn list(
		&self,
		query: &ListQuery,
		select: &[&str],
		search_columns: &[&str],
	) -> Result<Page> {
		let path =
			format!("/{}?{}", self.name, query.to_query_string(select, search_columns));

		match self.gateway.get(&path).await? {
			Some(body) => Page::from_value(body),
			None => Ok(Page::default()),
		}
	}

	/// Retrieves one entity by identifier, optionally restricted to `select` columns.
	pub async fn retrieve(&self, id: &str, select: &[&str]) -> Result<Value> {
		let mut path = self.entity_path(id);

		if !select.is_empty() {
			path.push_str(&format!("?$select={}", select.join(",")));
		}

		self.gateway.get(&path).await?.ok_or(Error::NotFound)
	}

	/// Creates an entity and returns the echoed representation.
	///
	/// Returns `Value::Null` when the server ignores the representation preference and
	/// answers with no content.
	pub async fn create(&self, payload: Value) -> Result<Value> {
		Ok(self.gateway.post(&format!("/{}", self.name), payload).await?.unwrap_or(Value::Null))
	}

	/// Applies a partial update and returns the echoed representation.
	pub async fn update(&self, id: &str, payload: Value) -> Result<Value> {
		Ok(self.gateway.patch(&self.entity_path(id), payload).await?.unwrap_or(Value::Null))
	}

	/// Deletes one entity by identifier.
	pub async fn delete(&self, id: &str) -> Result<()> {
		self.gateway.delete(&self.entity_path(id)).await?;

		Ok(())
	}

	/// Renders the `/{set}({id})` entity address.
	fn entity_path(&self, id: &str) -> String {
		format!("/{}({id})", self.name)
	}
}
