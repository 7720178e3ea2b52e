//! Distribution triggers for newly created summaries.
//!
//! The pipeline hands each new summary to a [`Distributor`] and never looks
//! at the outcome beyond logging it. Distributors own the summary's
//! distribution flag.

use crate::config::DistributionSettings;
use crate::error::{RecapError, Result};
use crate::model::{Item, ItemId, Summary};
use crate::store::ItemStore;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Payload describing a summary ready for delivery.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DistributionTrigger {
    pub summary_id: Uuid,
    pub item_id: ItemId,
    pub title: String,
    pub external_url: String,
}

impl DistributionTrigger {
    pub fn new(item: &Item, summary: &Summary) -> Self {
        Self {
            summary_id: summary.id,
            item_id: item.id,
            title: item.title.clone(),
            external_url: item.external_url.clone(),
        }
    }
}

#[async_trait]
pub trait Distributor: Send + Sync {
    async fn distribute(&self, trigger: &DistributionTrigger) -> Result<()>;
}

/// Logs triggers without delivering them anywhere.
#[derive(Debug, Default)]
pub struct LogDistributor;

#[async_trait]
impl Distributor for LogDistributor {
    async fn distribute(&self, trigger: &DistributionTrigger) -> Result<()> {
        info!(
            summary_id = %trigger.summary_id,
            item_id = %trigger.item_id,
            "Summary ready for distribution: {}",
            trigger.title
        );
        Ok(())
    }
}

/// POSTs each trigger as JSON and marks the summary distributed on success.
pub struct WebhookDistributor {
    client: reqwest::Client,
    url: String,
    store: Arc<dyn ItemStore>,
}

impl WebhookDistributor {
    pub fn new(url: &str, timeout: Duration, store: Arc<dyn ItemStore>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            store,
        })
    }
}

#[async_trait]
impl Distributor for WebhookDistributor {
    async fn distribute(&self, trigger: &DistributionTrigger) -> Result<()> {
        debug!("POST {} for summary {}", self.url, trigger.summary_id);

        let response = self.client.post(&self.url).json(trigger).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecapError::InvalidInput(format!(
                "webhook returned {}",
                status
            )));
        }

        let marked = self
            .store
            .mark_summary_distributed(trigger.summary_id, Utc::now())
            .await?;
        if !marked {
            debug!("Summary {} was already marked distributed", trigger.summary_id);
        }

        Ok(())
    }
}

/// Builds the distributor described by configuration.
pub fn from_settings(
    settings: &DistributionSettings,
    store: Arc<dyn ItemStore>,
) -> Result<Arc<dyn Distributor>> {
    match settings.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => Ok(Arc::new(WebhookDistributor::new(
            url,
            Duration::from_secs(settings.timeout_seconds),
            store,
        )?)),
        None => Ok(Arc::new(LogDistributor)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SummaryProvenance, Transcript};
    use crate::store::MemoryItemStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one HTTP request with `status_line` and hand back what was sent.
    async fn serve_once(status_line: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hooks/recap", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            // The JSON body ends with the closing brace
            while !request.ends_with(b"}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, server)
    }

    async fn stored_summary(store: &MemoryItemStore) -> (Item, Summary) {
        let item = Item::new("chan", "Episode", "https://example.com/hooked", Some(60));
        store.insert_item(&item).await.unwrap();
        let transcript = Transcript::new(item.id, "hello".into(), None, 60.0);
        store.insert_transcript(&transcript).await.unwrap();
        let summary = Summary::new(&transcript, "hi".into(), SummaryProvenance::default());
        store.insert_summary(&summary).await.unwrap();
        (item, summary)
    }

    #[tokio::test]
    async fn test_webhook_success_marks_summary_distributed() {
        let store = Arc::new(MemoryItemStore::new());
        let (item, summary) = stored_summary(&store).await;
        let (url, server) = serve_once("HTTP/1.1 204 No Content").await;

        let webhook = WebhookDistributor::new(&url, Duration::from_secs(5), store.clone()).unwrap();
        webhook
            .distribute(&DistributionTrigger::new(&item, &summary))
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hooks/recap"));
        assert!(request.contains(&summary.id.to_string()));

        let stored = store
            .summary_for_transcript(summary.transcript_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.distributed);
    }

    #[tokio::test]
    async fn test_webhook_error_status_leaves_summary_undistributed() {
        let store = Arc::new(MemoryItemStore::new());
        let (item, summary) = stored_summary(&store).await;
        let (url, server) = serve_once("HTTP/1.1 500 Internal Server Error").await;

        let webhook = WebhookDistributor::new(&url, Duration::from_secs(5), store.clone()).unwrap();
        let err = webhook
            .distribute(&DistributionTrigger::new(&item, &summary))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
        server.await.unwrap();

        let stored = store
            .summary_for_transcript(summary.transcript_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.distributed);
    }

    #[tokio::test]
    async fn test_log_distributor_succeeds() {
        let item = Item::new("chan", "Episode", "https://example.com/1", Some(60));
        let transcript = Transcript::new(item.id, "hello".into(), None, 60.0);
        let summary = Summary::new(&transcript, "hi".into(), SummaryProvenance::default());

        let trigger = DistributionTrigger::new(&item, &summary);
        assert_eq!(trigger.summary_id, summary.id);
        assert!(LogDistributor.distribute(&trigger).await.is_ok());
    }

    #[test]
    fn test_from_settings_defaults_to_log() {
        let store: Arc<dyn ItemStore> = Arc::new(MemoryItemStore::new());
        let settings = DistributionSettings {
            webhook_url: Some("  ".into()),
            timeout_seconds: 1,
        };
        assert!(from_settings(&settings, store).is_ok());
    }

    #[test]
    fn test_trigger_payload_shape() {
        let item = Item::new("chan", "Episode", "https://example.com/1", None);
        let transcript = Transcript::new(item.id, "hello".into(), None, 1.0);
        let summary = Summary::new(&transcript, "hi".into(), SummaryProvenance::default());

        let json = serde_json::to_value(DistributionTrigger::new(&item, &summary)).unwrap();
        assert_eq!(json["item_id"], item.id.to_string());
        assert_eq!(json["external_url"], "https://example.com/1");
    }
}
