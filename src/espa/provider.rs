use super::{parse_item_status, parse_order_id, Availability, EspaOps};
use super::{AVAILABLE_PRODUCTS, ITEM_STATUS, ORDER};
use crate::credentials::Credentials;
use crate::download;
use crate::error::ApiError;
use crate::order::Order;
use anyhow::{Context, Result};
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub struct Provider {
    client: Client,
    host: Url,
    credentials: Credentials,
}

impl Provider {
    pub fn new(host: &str, credentials: Credentials) -> Result<Self> {
        // Url::join drops the last segment of a base without a trailing slash
        let host = if host.ends_with('/') {
            host.to_string()
        } else {
            format!("{host}/")
        };
        let host = Url::parse(&host).with_context(|| format!("Invalid ESPA host: {host}"))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            host,
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.host.join(path)?)
    }

    async fn call<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value> {
        let url = self.endpoint(path)?;
        let mut request = self
            .client
            .request(method.clone(), url)
            .basic_auth(&self.credentials.username, Some(self.credentials.password()));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("{method} {path} failed"))?;
        let status = response.status();
        debug!("{method} {path}: {status}");

        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: path.to_string(),
                status,
                body: text,
            }
            .into());
        }

        let mut value: Value = serde_json::from_str(&text)
            .with_context(|| format!("Response from {path} is not valid json"))?;
        log_messages(path, &mut value);
        Ok(value)
    }
}

/// ESPA attaches user-facing notices under `messages`; surface and strip them.
fn log_messages(path: &str, value: &mut Value) {
    let Some(map) = value.as_object_mut() else {
        return;
    };
    if let Some(messages) = map.remove("messages") {
        let empty = match &messages {
            Value::Null => true,
            Value::Object(m) => m.values().all(|v| v.as_array().is_some_and(|a| a.is_empty())),
            Value::Array(a) => a.is_empty(),
            _ => false,
        };
        if !empty {
            warn!("ESPA messages from {path}: {messages}");
        }
    }
}

impl EspaOps for Provider {
    async fn available_products(&self, inputs: &[String]) -> Result<Availability> {
        let body = serde_json::json!({ "inputs": inputs });
        let value = self.call(Method::POST, AVAILABLE_PRODUCTS, Some(&body)).await?;
        Ok(Availability::from_value(&value)?)
    }

    async fn submit_order(&self, order: &Order) -> Result<String> {
        let value = self.call(Method::POST, ORDER, Some(order)).await?;
        Ok(parse_order_id(&value)?)
    }

    async fn item_status(&self, order_id: &str) -> Result<Vec<super::OrderItem>> {
        let path = format!("{ITEM_STATUS}/{order_id}");
        let value = self.call::<Value>(Method::GET, &path, None).await?;
        Ok(parse_item_status(order_id, value)?)
    }

    async fn download(&self, url: &str, output_dir: &Path) -> Result<PathBuf> {
        download::download_file(&self.client, url, output_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{local_client, serve_once};
    use serde_json::json;

    fn local_provider(host: &str) -> Provider {
        Provider {
            client: local_client(),
            host: Url::parse(&format!("{host}/api/v1/")).unwrap(),
            credentials: Credentials::new("landsat", "secret"),
        }
    }

    #[test]
    fn test_endpoint_keeps_api_prefix() {
        let provider = Provider::new(
            "https://espa.cr.usgs.gov/api/v1",
            Credentials::new("landsat", "secret"),
        )
        .unwrap();
        assert_eq!(
            provider.endpoint("item-status/espa-0101").unwrap().as_str(),
            "https://espa.cr.usgs.gov/api/v1/item-status/espa-0101"
        );
    }

    #[test]
    fn test_messages_are_stripped() {
        let mut value = json!({
            "orderid": "espa-0101",
            "messages": {"warnings": ["Date restricted"], "errors": []}
        });
        log_messages(ORDER, &mut value);
        assert_eq!(value, json!({"orderid": "espa-0101"}));
    }

    #[tokio::test]
    async fn test_item_status_strips_messages() {
        let host = serve_once(
            "200 OK",
            br#"{"espa-0101": [{"name": "LC08_L1TP_091084_20170101_20170218_01_T1", "status": "complete", "product_dload_url": "https://edclpdsftp.cr.usgs.gov/orders/scene.tar.gz"}], "messages": {"warnings": ["Slow processing"]}}"#,
        )
        .await;
        let provider = local_provider(&host);

        let value = provider
            .call::<Value>(Method::GET, "item-status/espa-0101", None)
            .await
            .unwrap();
        assert!(value.get("messages").is_none());

        let items = parse_item_status("espa-0101", value).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_complete());
    }

    #[tokio::test]
    async fn test_error_status_becomes_api_error() {
        let host = serve_once("404 Not Found", br#"{"message": "Order not found"}"#).await;
        let provider = local_provider(&host);

        let err = provider.item_status("espa-0101").await.unwrap_err();
        match err.downcast_ref::<ApiError>() {
            Some(ApiError::Status { endpoint, status, body }) => {
                assert_eq!(endpoint, "item-status/espa-0101");
                assert_eq!(*status, reqwest::StatusCode::NOT_FOUND);
                assert!(body.contains("Order not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
