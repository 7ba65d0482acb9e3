//! Redis-backed registry implementation.

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use redis::AsyncCommands;
use serde_json::{json, Value};
use tracing::{debug, info};

use vpost_models::{Project, ProjectId};

use crate::error::{RegistryError, RegistryResult};
use crate::fields::apply_field;
use crate::{FieldUpdate, ProjectRegistry};

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RedisRegistryConfig {
    pub redis_url: String,
    /// Key prefix, lets several deployments share one Redis
    pub namespace: String,
}

impl Default for RedisRegistryConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            namespace: "vpost".to_string(),
        }
    }
}

impl RedisRegistryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            namespace: std::env::var("REGISTRY_NAMESPACE").unwrap_or_else(|_| "vpost".to_string()),
        }
    }
}

/// Project registry over Redis JSON documents.
///
/// One string key per project plus a folder-name index. Partial updates are
/// read-modify-write; concurrent writers are last-writer-wins per document,
/// which matches the registry contract (one worker writes per project at a
/// time, controller writes are whole-status transitions).
pub struct RedisRegistry {
    client: redis::Client,
    config: RedisRegistryConfig,
}

impl RedisRegistry {
    pub fn new(config: RedisRegistryConfig) -> RegistryResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> RegistryResult<Self> {
        Self::new(RedisRegistryConfig::from_env())
    }

    fn project_key(&self, id: &ProjectId) -> String {
        format!("{}:project:{}", self.config.namespace, id)
    }

    fn folder_key(&self, folder_name: &str) -> String {
        format!("{}:project_folder:{}", self.config.namespace, folder_name)
    }

    async fn connection(&self) -> RegistryResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn load_doc(&self, id: &ProjectId) -> RegistryResult<Option<Value>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(self.project_key(id)).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn store_doc(&self, id: &ProjectId, doc: &Value) -> RegistryResult<()> {
        let mut conn = self.connection().await?;
        let raw = serde_json::to_string(doc)?;
        conn.set::<_, _, ()>(self.project_key(id), raw).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectRegistry for RedisRegistry {
    async fn create(&self, project: &Project) -> RegistryResult<()> {
        let mut conn = self.connection().await?;
        let key = self.project_key(&project.id);

        let exists: bool = conn.exists(&key).await?;
        if exists {
            return Err(RegistryError::AlreadyExists(project.id.to_string()));
        }

        let raw = serde_json::to_string(project)?;
        conn.set::<_, _, ()>(&key, raw).await?;
        conn.set::<_, _, ()>(self.folder_key(&project.folder_name), project.id.to_string())
            .await?;

        counter!("vpost_registry_projects_created").increment(1);
        info!(project_id = %project.id, folder = %project.folder_name, "created project record");
        Ok(())
    }

    async fn get(&self, id: &ProjectId) -> RegistryResult<Option<Project>> {
        match self.load_doc(id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    async fn get_by_folder(&self, folder_name: &str) -> RegistryResult<Option<Project>> {
        let mut conn = self.connection().await?;
        let id: Option<String> = conn.get(self.folder_key(folder_name)).await?;
        match id {
            Some(id) => self.get(&ProjectId::from(id)).await,
            None => Ok(None),
        }
    }

    async fn put(&self, project: &Project) -> RegistryResult<()> {
        let mut doc = serde_json::to_value(project)?;
        apply_field(&mut doc, "updated_at", json!(Utc::now()));
        self.store_doc(&project.id, &doc).await
    }

    async fn update_fields(&self, id: &ProjectId, fields: Vec<FieldUpdate>) -> RegistryResult<()> {
        let mut doc = self
            .load_doc(id)
            .await?
            .ok_or_else(|| RegistryError::not_found(id.to_string()))?;

        for (path, value) in &fields {
            apply_field(&mut doc, path, value.clone());
        }
        apply_field(&mut doc, "updated_at", json!(Utc::now()));

        self.store_doc(id, &doc).await?;
        debug!(project_id = %id, fields = fields.len(), "updated project fields");
        Ok(())
    }
}
