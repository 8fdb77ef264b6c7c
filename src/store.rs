// Persistence boundary for design template overrides, the last selection and the gallery

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::errors::StoreError;
use crate::gallery::GalleryItem;
use crate::templates::DesignTemplateConfig;

pub const TEMPLATE_STORAGE_KEY: &str = "photobooth_design_templates_v1";
pub const LAST_TEMPLATE_ID_KEY: &str = "photobooth_last_design_template_id";
pub const GALLERY_STORAGE_KEY: &str = "photobooth_gallery_v1";

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Persisted overrides; unreadable data yields an empty list.
    async fn load_templates(&self) -> Result<Vec<DesignTemplateConfig>, StoreError>;
    async fn save_templates(&self, templates: &[DesignTemplateConfig]) -> Result<(), StoreError>;
    async fn last_selected_id(&self) -> Result<Option<String>, StoreError>;
    /// `None` clears the selection.
    async fn set_last_selected_id(&self, id: Option<&str>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GalleryStore: Send + Sync {
    /// Stored items in insertion order; unreadable data yields an empty list.
    async fn load_gallery(&self) -> Result<Vec<GalleryItem>, StoreError>;
    async fn save_gallery(&self, items: &[GalleryItem]) -> Result<(), StoreError>;
}

fn parse_list<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Vec<T> {
    match serde_json::from_str::<Vec<T>>(raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("Ignoring unreadable persisted {}: {}", what, e);
            Vec::new()
        }
    }
}

fn parse_templates(raw: &str) -> Vec<DesignTemplateConfig> {
    parse_list(raw, "templates")
}

/// Key-value store backed by a single SQLite table.
#[derive(Clone)]
pub struct SqliteTemplateStore {
    pool: SqlitePool,
}

impl SqliteTemplateStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteTemplateStore { pool }
    }

    /// Open (creating if needed) the database file and run migrations.
    pub async fn connect(db_config: &DatabaseConfig) -> Result<Self, StoreError> {
        if let Some(parent) = db_config.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create database directory {:?}: {}", parent, e);
            }
        }

        let options =
            SqliteConnectOptions::from_str(&db_config.connection_string())?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Template store ready at {:?}", db_config.path);
        Ok(Self::new(pool))
    }

    /// Single-connection in-memory database, mostly for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for SqliteTemplateStore {
    async fn load_templates(&self) -> Result<Vec<DesignTemplateConfig>, StoreError> {
        Ok(self
            .get(TEMPLATE_STORAGE_KEY)
            .await?
            .map(|raw| parse_templates(&raw))
            .unwrap_or_default())
    }

    async fn save_templates(&self, templates: &[DesignTemplateConfig]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(templates)?;
        self.put(TEMPLATE_STORAGE_KEY, &raw).await
    }

    async fn last_selected_id(&self) -> Result<Option<String>, StoreError> {
        self.get(LAST_TEMPLATE_ID_KEY).await
    }

    async fn set_last_selected_id(&self, id: Option<&str>) -> Result<(), StoreError> {
        match id {
            Some(id) => self.put(LAST_TEMPLATE_ID_KEY, id).await,
            None => self.remove(LAST_TEMPLATE_ID_KEY).await,
        }
    }
}

#[async_trait]
impl GalleryStore for SqliteTemplateStore {
    async fn load_gallery(&self) -> Result<Vec<GalleryItem>, StoreError> {
        Ok(self
            .get(GALLERY_STORAGE_KEY)
            .await?
            .map(|raw| parse_list(&raw, "gallery"))
            .unwrap_or_default())
    }

    async fn save_gallery(&self, items: &[GalleryItem]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(items)?;
        self.put(GALLERY_STORAGE_KEY, &raw).await
    }
}

/// Volatile store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: Mutex<Option<String>>,
    last_selected: Mutex<Option<String>>,
    gallery: Mutex<Vec<GalleryItem>>,
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn load_templates(&self) -> Result<Vec<DesignTemplateConfig>, StoreError> {
        let raw = self
            .templates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        Ok(raw.map(|raw| parse_templates(&raw)).unwrap_or_default())
    }

    async fn save_templates(&self, templates: &[DesignTemplateConfig]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(templates)?;
        *self
            .templates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(raw);
        Ok(())
    }

    async fn last_selected_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .last_selected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    async fn set_last_selected_id(&self, id: Option<&str>) -> Result<(), StoreError> {
        *self
            .last_selected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = id.map(str::to_string);
        Ok(())
    }
}

#[async_trait]
impl GalleryStore for MemoryTemplateStore {
    async fn load_gallery(&self) -> Result<Vec<GalleryItem>, StoreError> {
        Ok(self
            .gallery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    async fn save_gallery(&self, items: &[GalleryItem]) -> Result<(), StoreError> {
        *self
            .gallery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = items.to_vec();
        Ok(())
    }
}
