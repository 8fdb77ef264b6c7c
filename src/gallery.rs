// Gallery of kept photos and composites, grouped by design template

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::composite::Composite;
use crate::errors::StoreError;
use crate::store::GalleryStore;
use crate::templates::DesignTemplateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GalleryItemType {
    Individual,
    Composed,
}

impl GalleryItemType {
    fn prefix(&self) -> &'static str {
        match self {
            GalleryItemType::Individual => "individual",
            GalleryItemType::Composed => "composed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: GalleryItemType,
    pub data_url: String,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_template_id: Option<String>,
    /// Folder the item is listed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_template_name: Option<String>,
}

/// Query for `list`; unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryFilter {
    #[serde(default, rename = "type")]
    pub item_type: Option<GalleryItemType>,
    #[serde(default)]
    pub template: Option<String>,
}

impl GalleryFilter {
    pub fn matches(&self, item: &GalleryItem) -> bool {
        if self.item_type.is_some_and(|t| t != item.item_type) {
            return false;
        }
        match &self.template {
            Some(name) => item.design_template_name.as_deref() == Some(name.as_str()),
            None => true,
        }
    }
}

pub struct Gallery {
    store: Arc<dyn GalleryStore>,
    // Serializes read-modify-write of the stored list
    write_lock: Mutex<()>,
}

impl Gallery {
    pub fn new(store: Arc<dyn GalleryStore>) -> Self {
        Gallery {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Keep a finished composite. All items of one composition share a session id.
    pub async fn add_composed(
        &self,
        composite: &Composite,
        template: Option<&DesignTemplateConfig>,
        session_id: &str,
    ) -> Result<GalleryItem, StoreError> {
        let mut item = new_item(GalleryItemType::Composed, composite.to_data_url(), template);
        item.session_id = Some(session_id.to_string());
        self.push(item).await
    }

    /// Keep a single captured photo.
    pub async fn add_individual(
        &self,
        data_url: String,
        template: Option<&DesignTemplateConfig>,
    ) -> Result<GalleryItem, StoreError> {
        self.push(new_item(GalleryItemType::Individual, data_url, template))
            .await
    }

    pub async fn list(&self, filter: &GalleryFilter) -> Result<Vec<GalleryItem>, StoreError> {
        let items = self.store.load_gallery().await?;
        Ok(items.into_iter().filter(|item| filter.matches(item)).collect())
    }

    /// Distinct template names in first-seen order. Items without one are
    /// not in any folder.
    pub async fn folders(&self) -> Result<Vec<String>, StoreError> {
        let mut folders: Vec<String> = Vec::new();
        for item in self.store.load_gallery().await? {
            if let Some(name) = item.design_template_name {
                if !name.is_empty() && !folders.contains(&name) {
                    folders.push(name);
                }
            }
        }
        Ok(folders)
    }

    pub async fn get(&self, id: &str) -> Result<Option<GalleryItem>, StoreError> {
        let items = self.store.load_gallery().await?;
        Ok(items.into_iter().find(|item| item.id == id))
    }

    /// Returns false when no item had that id.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.store.load_gallery().await?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(false);
        }
        self.store.save_gallery(&items).await?;
        info!("Deleted gallery item {}", id);
        Ok(true)
    }

    async fn push(&self, item: GalleryItem) -> Result<GalleryItem, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.store.load_gallery().await?;
        items.push(item.clone());
        self.store.save_gallery(&items).await?;
        info!(
            "Added {} gallery item {} ({} total)",
            item.item_type.prefix(),
            item.id,
            items.len()
        );
        Ok(item)
    }
}

fn new_item(
    item_type: GalleryItemType,
    data_url: String,
    template: Option<&DesignTemplateConfig>,
) -> GalleryItem {
    let timestamp = chrono::Utc::now().timestamp_millis();
    GalleryItem {
        id: format!(
            "{}-{}-{}",
            item_type.prefix(),
            timestamp,
            uuid::Uuid::new_v4().simple()
        ),
        item_type,
        data_url,
        timestamp,
        session_id: None,
        design_template_id: template.map(|t| t.id.clone()),
        design_template_name: template.map(|t| t.name.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::OutputFormat;
    use crate::store::MemoryTemplateStore;
    use crate::templates::builtin_templates;
    use bytes::Bytes;

    fn gallery() -> Gallery {
        Gallery::new(Arc::new(MemoryTemplateStore::default()))
    }

    fn composite() -> Composite {
        Composite::new(Bytes::from_static(b"jpeg"), OutputFormat::Jpeg, 600, 1800)
    }

    #[tokio::test]
    async fn test_composed_item_carries_template_metadata() {
        let gallery = gallery();
        let template = builtin_templates().remove(0);

        let item = gallery
            .add_composed(&composite(), Some(&template), "1700000000000")
            .await
            .unwrap();

        assert!(item.id.starts_with("composed-"));
        assert_eq!(item.item_type, GalleryItemType::Composed);
        assert_eq!(item.session_id.as_deref(), Some("1700000000000"));
        assert_eq!(item.design_template_id.as_deref(), Some(template.id.as_str()));
        assert_eq!(item.design_template_name.as_deref(), Some(template.name.as_str()));
        assert!(item.data_url.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_list_filters_by_type_and_folder() {
        let gallery = gallery();
        let templates = builtin_templates();
        let (first, second) = (&templates[0], &templates[1]);

        gallery
            .add_composed(&composite(), Some(first), "s1")
            .await
            .unwrap();
        gallery
            .add_individual("data:image/png;base64,AAAA".to_string(), Some(first))
            .await
            .unwrap();
        gallery
            .add_composed(&composite(), Some(second), "s2")
            .await
            .unwrap();
        gallery.add_composed(&composite(), None, "s3").await.unwrap();

        let all = gallery.list(&GalleryFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);

        let composed = GalleryFilter {
            item_type: Some(GalleryItemType::Composed),
            template: None,
        };
        assert_eq!(gallery.list(&composed).await.unwrap().len(), 3);

        let folder = GalleryFilter {
            item_type: None,
            template: Some(first.name.clone()),
        };
        assert_eq!(gallery.list(&folder).await.unwrap().len(), 2);

        let both = GalleryFilter {
            item_type: Some(GalleryItemType::Individual),
            template: Some(second.name.clone()),
        };
        assert!(gallery.list(&both).await.unwrap().is_empty());

        assert_eq!(
            gallery.folders().await.unwrap(),
            vec![first.name.clone(), second.name.clone()]
        );
    }

    #[tokio::test]
    async fn test_delete_removes_only_that_item() {
        let gallery = gallery();
        let keep = gallery.add_composed(&composite(), None, "s1").await.unwrap();
        let drop = gallery.add_composed(&composite(), None, "s1").await.unwrap();
        assert_ne!(keep.id, drop.id);

        assert!(gallery.delete(&drop.id).await.unwrap());
        assert!(!gallery.delete(&drop.id).await.unwrap());

        assert_eq!(gallery.get(&keep.id).await.unwrap(), Some(keep));
        assert_eq!(gallery.get(&drop.id).await.unwrap(), None);
    }

    #[test]
    fn test_filter_query_shape() {
        let filter: GalleryFilter =
            serde_json::from_str(r#"{"type": "individual", "template": "Gold Frame"}"#).unwrap();
        assert_eq!(filter.item_type, Some(GalleryItemType::Individual));
        assert_eq!(filter.template.as_deref(), Some("Gold Frame"));
    }
}
