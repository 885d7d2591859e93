use redis::AsyncCommands;
use redis::Client;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc;

use crate::db::{DocumentKey, DocumentStore};
use crate::error::{AppError, AppResult};
use crate::models::{
    CityId, DecisionCollection, DecisionRecord, QuestionnaireResponse, RecommendationSnapshot,
    SwipeDecision, UserId,
};

/// Creates a Redis client for the document store
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous document writes
struct DocumentWriteMessage {
    key: String,
    value: String,
}

/// Document store backed by Redis
///
/// Profiles and recommendation snapshots are JSON strings under
/// `profiles:{uid}` and `recommendations:{uid}`. Decisions are hashes under
/// `favorites:{uid}` / `dislikes:{uid}` with one field per city identifier.
///
/// Profile and decision writes are awaited so failures reach the session.
/// Recommendation snapshots are written by a background task.
#[derive(Clone)]
pub struct RedisDocumentStore {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<DocumentWriteMessage>,
}

/// Handle for gracefully shutting down the background writer
pub struct StoreWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl StoreWriterHandle {
    /// Signals the writer task to flush pending snapshots and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Document writer shutdown signal sent");
    }
}

impl RedisDocumentStore {
    /// Creates the store and spawns its background writer task
    pub fn new(redis_client: Client) -> (Self, StoreWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::writer_task(client, write_rx, shutdown_rx).await;
        });

        let store = Self {
            redis_client,
            write_tx,
        };

        (store, StoreWriterHandle { shutdown_tx })
    }

    async fn writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<DocumentWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Document writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_document(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write document to Redis");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Document writer shutting down, flushing remaining writes");

                    // Senders live in store clones, so drain without waiting
                    while let Ok(msg) = write_rx.try_recv() {
                        if let Err(e) = Self::write_document(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush document write during shutdown");
                        }
                    }

                    tracing::info!("Document writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_document(client: &Client, msg: DocumentWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set(msg.key, msg.value).await?;
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &DocumentKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let stored: Option<String> = conn.get(key.to_string()).await?;

        match stored {
            Some(json) => {
                let value = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Document deserialization error for {}: {}", key, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Queues a document write without waiting for Redis
    fn set_in_background<T: serde::Serialize>(&self, key: &DocumentKey, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Failed to serialize document");
                return;
            }
        };

        let msg = DocumentWriteMessage {
            key: key.to_string(),
            value: json,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to queue document write");
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn load_profile(&self, user_id: &UserId) -> AppResult<Option<QuestionnaireResponse>> {
        self.get_json(&DocumentKey::Profile(user_id.clone())).await
    }

    async fn save_profile(
        &self,
        user_id: &UserId,
        profile: &QuestionnaireResponse,
    ) -> AppResult<()> {
        let key = DocumentKey::Profile(user_id.clone());
        let json = serde_json::to_string(profile)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.set(key.to_string(), json).await?;

        tracing::debug!(user_id = %user_id, "Profile stored");
        Ok(())
    }

    async fn record_decision(&self, user_id: &UserId, decision: &SwipeDecision) -> AppResult<()> {
        let key = DocumentKey::Decisions(decision.collection(), user_id.clone());
        let json = serde_json::to_string(&decision.record)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn
            .hset(key.to_string(), decision.city_id.to_string(), json)
            .await?;

        tracing::debug!(
            user_id = %user_id,
            city_id = %decision.city_id,
            collection = %decision.collection(),
            "Decision stored"
        );
        Ok(())
    }

    async fn remove_decision(
        &self,
        user_id: &UserId,
        collection: DecisionCollection,
        city_id: &CityId,
    ) -> AppResult<bool> {
        let key = DocumentKey::Decisions(collection, user_id.clone());
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let removed: u32 = conn.hdel(key.to_string(), city_id.to_string()).await?;
        Ok(removed > 0)
    }

    async fn list_decisions(
        &self,
        user_id: &UserId,
        collection: DecisionCollection,
    ) -> AppResult<BTreeMap<CityId, DecisionRecord>> {
        let key = DocumentKey::Decisions(collection, user_id.clone());
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(key.to_string()).await?;

        let mut records = BTreeMap::new();
        for (city_id, json) in fields {
            match serde_json::from_str::<DecisionRecord>(&json) {
                Ok(record) => {
                    records.insert(CityId(city_id), record);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        key = %key,
                        city_id = %city_id,
                        "Skipping unreadable decision record"
                    );
                }
            }
        }

        Ok(records)
    }

    async fn save_recommendations(
        &self,
        user_id: &UserId,
        snapshot: &RecommendationSnapshot,
    ) -> AppResult<()> {
        self.set_in_background(&DocumentKey::Recommendations(user_id.clone()), snapshot);
        Ok(())
    }

    async fn load_recommendations(
        &self,
        user_id: &UserId,
    ) -> AppResult<Option<RecommendationSnapshot>> {
        self.get_json(&DocumentKey::Recommendations(user_id.clone()))
            .await
    }
}
