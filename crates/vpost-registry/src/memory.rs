//! In-memory registry double for tests and read projections.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use vpost_models::{Project, ProjectId};

use crate::error::{RegistryError, RegistryResult};
use crate::fields::apply_field;
use crate::{FieldUpdate, ProjectRegistry};

/// Test double holding documents in a mutex-guarded map.
#[derive(Default)]
pub struct MemoryRegistry {
    docs: Mutex<HashMap<String, Value>>,
    folders: Mutex<HashMap<String, String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRegistry for MemoryRegistry {
    async fn create(&self, project: &Project) -> RegistryResult<()> {
        let mut docs = self.docs.lock().expect("registry lock");
        let key = project.id.to_string();
        if docs.contains_key(&key) {
            return Err(RegistryError::AlreadyExists(key));
        }
        docs.insert(key.clone(), serde_json::to_value(project)?);
        self.folders
            .lock()
            .expect("registry lock")
            .insert(project.folder_name.clone(), key);
        Ok(())
    }

    async fn get(&self, id: &ProjectId) -> RegistryResult<Option<Project>> {
        let docs = self.docs.lock().expect("registry lock");
        match docs.get(id.as_str()) {
            Some(doc) => Ok(Some(serde_json::from_value(doc.clone())?)),
            None => Ok(None),
        }
    }

    async fn get_by_folder(&self, folder_name: &str) -> RegistryResult<Option<Project>> {
        let id = {
            let folders = self.folders.lock().expect("registry lock");
            folders.get(folder_name).cloned()
        };
        match id {
            Some(id) => self.get(&ProjectId::from(id)).await,
            None => Ok(None),
        }
    }

    async fn put(&self, project: &Project) -> RegistryResult<()> {
        let mut doc = serde_json::to_value(project)?;
        apply_field(&mut doc, "updated_at", json!(Utc::now()));
        self.docs
            .lock()
            .expect("registry lock")
            .insert(project.id.to_string(), doc);
        Ok(())
    }

    async fn update_fields(&self, id: &ProjectId, fields: Vec<FieldUpdate>) -> RegistryResult<()> {
        let mut docs = self.docs.lock().expect("registry lock");
        let doc = docs
            .get_mut(id.as_str())
            .ok_or_else(|| RegistryError::not_found(id.to_string()))?;
        for (path, value) in fields {
            apply_field(doc, &path, value);
        }
        apply_field(doc, "updated_at", json!(Utc::now()));
        Ok(())
    }
}
