use crate::config::ApiConfig;
use crate::espa::{EspaOps, DATE_RESTRICTED, NOT_IMPLEMENTED};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CollectionRequest {
    pub inputs: Vec<String>,
    pub products: Vec<String>,
}

/// An ESPA order payload, one entry per sensor collection.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Order {
    #[serde(flatten)]
    pub collections: BTreeMap<String, CollectionRequest>,
    pub format: String,
}

impl Order {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn scene_count(&self) -> usize {
        self.collections.values().map(|c| c.inputs.len()).sum()
    }

    pub fn collections(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }
}

/// Fixed parts of every order and the collections never ordered.
#[derive(Clone, Debug)]
pub struct OrderPolicy {
    pub product_types: Vec<String>,
    pub output_format: String,
    pub excluded_collections: Vec<String>,
}

impl From<&ApiConfig> for OrderPolicy {
    fn from(api: &ApiConfig) -> Self {
        Self {
            product_types: api.product_types.clone(),
            output_format: api.output_format.clone(),
            excluded_collections: api.excluded_collections.clone(),
        }
    }
}

pub async fn define_order(
    api: &impl EspaOps,
    candidates: &[String],
    desired_collections: &[String],
    policy: &OrderPolicy,
) -> Result<Order> {
    let availability = api
        .available_products(candidates)
        .await
        .context("Unable to query available products")?;

    if !availability.date_restricted.is_empty() {
        info!("{DATE_RESTRICTED}: {}", availability.date_restricted.len());
    }
    if !availability.not_implemented.is_empty() {
        info!("{NOT_IMPLEMENTED}: {}", availability.not_implemented.len());
    }

    let mut collections = BTreeMap::new();
    for (key, inputs) in availability.collections {
        if policy.excluded_collections.contains(&key) {
            info!("{key}: {}", inputs.len());
            continue;
        }
        if !desired_collections.contains(&key) {
            continue;
        }

        // A restricted id may be listed under any collection
        let inputs: Vec<String> = inputs
            .into_iter()
            .filter(|id| !availability.date_restricted.contains(id))
            .collect();
        if inputs.is_empty() {
            continue;
        }

        collections.insert(
            key,
            CollectionRequest {
                inputs,
                products: policy.product_types.clone(),
            },
        );
    }

    Ok(Order {
        collections,
        format: policy.output_format.clone(),
    })
}

pub async fn submit_order(api: &impl EspaOps, order: &Order) -> Result<String> {
    info!("POST order with {} scene(s)", order.scene_count());
    let order_id = api
        .submit_order(order)
        .await
        .context("Order submission failed")?;
    info!("ESPA accepted order {order_id}");
    Ok(order_id)
}
