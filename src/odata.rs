//! OData query rendering and response envelopes for list operations.
//!
//! The builders here stay schema-agnostic: column names for `$select`, search filters, and
//! ordering are caller input, never baked into the crate.

// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

/// Pagination and search parameters for a list call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQuery {
	/// 1-based page number; values below 1 are treated as the first page.
	pub page: u32,
	/// Page size, rendered as `$top`.
	pub limit: u32,
	/// Free-text search term matched with `contains` over the caller's search columns.
	pub search: Option<String>,
	/// Raw `$orderby` expression, e.g. `createdon desc`.
	pub order_by: Option<String>,
}
impl ListQuery {
	/// Creates a query for the first page with the default page size.
	pub fn new() -> Self {
		Self { page: 1, limit: 10, search: None, order_by: None }
	}

	/// Sets the 1-based page number.
	pub fn with_page(mut self, page: u32) -> Self {
		self.page = page;

		self
	}

	/// Sets the page size.
	pub fn with_limit(mut self, limit: u32) -> Self {
		self.limit = limit;

		self
	}

	/// Sets the free-text search term.
	pub fn with_search(mut self, search: impl Into<String>) -> Self {
		self.search = Some(search.into());

		self
	}

	/// Sets the `$orderby` expression.
	pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
		self.order_by = Some(order_by.into());

		self
	}

	/// Renders the OData query string (without a leading `?`).
	///
	/// `select` populates `$select`; `search_columns` are the columns matched against the
	/// search term. `$count=true` is always requested so the caller can report totals, and
	/// `$skip` is only emitted past the first page.
	pub fn to_query_string(&self, select: &[&str], search_columns: &[&str]) -> String {
		let mut parts = Vec::new();

		if !select.is_empty() {
			parts.push(format!("$select={}", select.join(",")));
		}

		parts.push("$count=true".into());

		if let Some(filter) = self.filter_expression(search_columns) {
			parts.push(format!("$filter={filter}"));
		}
		if let Some(order_by) = &self.order_by {
			parts.push(format!("$orderby={order_by}"));
		}

		parts.push(format!("$top={}", self.limit));

		let page = self.page.max(1);

		if page > 1 {
			parts.push(format!("$skip={}", (page - 1) * self.limit));
		}

		parts.join("&")
	}

	fn filter_expression(&self, search_columns: &[&str]) -> Option<String> {
		let term = self.search.as_deref().filter(|term| !term.is_empty())?;

		if search_columns.is_empty() {
			return None;
		}

		// OData string literals escape single quotes by doubling them.
		let escaped = term.replace('\'', "''");
		let clauses = search_columns
			.iter()
			.map(|column| format!("contains({column},'{escaped}')"))
			.collect::<Vec<_>>();

		Some(format!("({})", clauses.join(" or ")))
	}
}
impl Default for ListQuery {
	fn default() -> Self {
		Self::new()
	}
}

/// One page of entities decoded from the resource API's list envelope.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Page {
	/// Entities on this page.
	#[serde(default)]
	pub value: Vec<Value>,
	/// Total matching entities, when the server honored `$count=true`.
	#[serde(rename = "@odata.count")]
	pub count: Option<u64>,
}
impl Page {
	/// Decodes a page from a raw response body.
	pub fn from_value(body: Value) -> Result<Self> {
		serde_json::from_value(body).map_err(|e| Error::Upstream {
			status: 200,
			message: format!("malformed list envelope ({e})"),
		})
	}

	/// Returns the reported total, falling back to this page's length when the count
	/// annotation is absent.
	pub fn total(&self) -> u64 {
		self.count.unwrap_or(self.value.len() as u64)
	}
}
