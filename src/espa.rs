//! Types and the client seam for the ESPA ordering API.
mod provider;
pub use provider::Provider;

use crate::error::ApiError;
use crate::order::Order;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const AVAILABLE_PRODUCTS: &str = "available-products";
pub const ORDER: &str = "order";
pub const ITEM_STATUS: &str = "item-status";

pub const DATE_RESTRICTED: &str = "date_restricted";
pub const NOT_IMPLEMENTED: &str = "not_implemented";

const STATUS_COMPLETE: &str = "complete";

pub trait EspaOps {
    async fn available_products(&self, inputs: &[String]) -> Result<Availability>;

    /// Submit an order and return the order id ESPA assigned to it.
    async fn submit_order(&self, order: &Order) -> Result<String>;

    async fn item_status(&self, order_id: &str) -> Result<Vec<OrderItem>>;

    async fn download(&self, url: &str, output_dir: &Path) -> Result<PathBuf>;
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub product_dload_url: Option<String>,
}

impl OrderItem {
    pub fn is_complete(&self) -> bool {
        self.status == STATUS_COMPLETE
    }
}

/// What ESPA can produce for a list of candidate product ids.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Availability {
    /// Sensor collection key to the ids ESPA accepted for it.
    pub collections: BTreeMap<String, Vec<String>>,
    pub date_restricted: Vec<String>,
    pub not_implemented: Vec<String>,
}

impl Availability {
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        let map = value.as_object().ok_or_else(|| ApiError::UnexpectedShape {
            endpoint: AVAILABLE_PRODUCTS.to_string(),
            detail: "expected a json object".to_string(),
        })?;

        let mut availability = Self::default();
        for (key, entry) in map {
            match key.as_str() {
                DATE_RESTRICTED => availability.date_restricted = collect_ids(entry),
                NOT_IMPLEMENTED => availability.not_implemented = collect_ids(entry),
                _ => match entry.get("inputs") {
                    Some(inputs) => {
                        availability
                            .collections
                            .insert(key.to_string(), string_list(inputs));
                    }
                    None => tracing::debug!("Ignoring availability category {key}"),
                },
            }
        }
        Ok(availability)
    }
}

/// Item list for `order_id` out of an `item-status` response.
pub fn parse_item_status(order_id: &str, value: Value) -> Result<Vec<OrderItem>, ApiError> {
    let endpoint = format!("{ITEM_STATUS}/{order_id}");
    let items = match value {
        Value::Object(mut map) => map.remove(order_id),
        _ => None,
    }
    .ok_or_else(|| ApiError::MissingField {
        endpoint: endpoint.clone(),
        field: order_id.to_string(),
    })?;

    serde_json::from_value(items).map_err(|e| ApiError::UnexpectedShape {
        endpoint,
        detail: e.to_string(),
    })
}

pub fn parse_order_id(value: &Value) -> Result<String, ApiError> {
    value
        .get("orderid")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::MissingField {
            endpoint: ORDER.to_string(),
            field: "orderid".to_string(),
        })
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// Restricted categories come either as a bare list or keyed by product type.
fn collect_ids(value: &Value) -> Vec<String> {
    let mut ids: Vec<String> = vec![];
    let lists: Vec<&Value> = match value {
        Value::Object(map) => map.values().collect(),
        other => vec![other],
    };
    for id in lists.into_iter().flat_map(string_list) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
