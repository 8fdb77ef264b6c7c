// Design templates: a background image plus explicit photo slots

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::layout::{PhotoLayout, TemplateType, MAX_SLOT_EXTENT};
use crate::store::TemplateStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignTemplateConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template_type: TemplateType,
    pub background_url: String,
    pub slots: Vec<PhotoLayout>,
}

impl DesignTemplateConfig {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.id.trim().is_empty() {
            return Err(StoreError::InvalidTemplate(
                "template id must not be empty".to_string(),
            ));
        }

        if let Some((i, _)) = self.slots.iter().enumerate().find(|(_, s)| !s.is_valid()) {
            return Err(StoreError::InvalidTemplate(format!(
                "slot {} of '{}' needs a positive size within {}px of the origin",
                i,
                self.id,
                MAX_SLOT_EXTENT
            )));
        }

        Ok(())
    }
}

/// The templates shipped with the booth.
pub fn builtin_templates() -> Vec<DesignTemplateConfig> {
    vec![
        DesignTemplateConfig {
            id: "classic_strip".to_string(),
            name: "Classic Photo Strip".to_string(),
            description: "Clean white strip with three vertical photos".to_string(),
            template_type: TemplateType::Strip,
            background_url: "/templates/classic-strip.png".to_string(),
            slots: vec![
                PhotoLayout::new(70.0, 140.0, 460.0, 340.0),
                PhotoLayout::new(70.0, 520.0, 460.0, 340.0),
                PhotoLayout::new(70.0, 900.0, 460.0, 340.0),
            ],
        },
        DesignTemplateConfig {
            id: "gold_frame".to_string(),
            name: "Gold Frame".to_string(),
            description: "Single large photo with gold border and space for branding".to_string(),
            template_type: TemplateType::Single,
            background_url: "/templates/gold-frame.png".to_string(),
            slots: vec![PhotoLayout::new(80.0, 160.0, 440.0, 620.0)],
        },
    ]
}

/// Registry handle shared across HTTP workers.
pub type SharedRegistry = Arc<RwLock<TemplateRegistry>>;

/// In-memory merged view of built-in and persisted templates.
///
/// The registry never touches storage on its own; `load`/`refresh` take the
/// store explicitly so the caller controls when the view changes.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    builtins: Vec<DesignTemplateConfig>,
    merged: Vec<DesignTemplateConfig>,
}

impl TemplateRegistry {
    pub fn new(builtins: Vec<DesignTemplateConfig>, overrides: Vec<DesignTemplateConfig>) -> Self {
        let merged = merge(&builtins, overrides);
        TemplateRegistry { builtins, merged }
    }

    pub fn with_defaults(overrides: Vec<DesignTemplateConfig>) -> Self {
        Self::new(builtin_templates(), overrides)
    }

    pub async fn load(store: &dyn TemplateStore) -> Result<Self, StoreError> {
        let overrides = store.load_templates().await?;
        info!("Loaded {} persisted design templates", overrides.len());
        Ok(Self::with_defaults(overrides))
    }

    /// Rebuild the merged view from whatever the store now holds.
    pub async fn refresh(&mut self, store: &dyn TemplateStore) -> Result<(), StoreError> {
        let overrides = store.load_templates().await?;
        self.merged = merge(&self.builtins, overrides);
        debug!("Template registry refreshed: {} templates", self.merged.len());
        Ok(())
    }

    /// Persist `template` as an override (replacing any with the same id) and refresh.
    pub async fn save(
        &mut self,
        store: &dyn TemplateStore,
        template: DesignTemplateConfig,
    ) -> Result<(), StoreError> {
        template.validate()?;

        let mut persisted = store.load_templates().await?;
        match persisted.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => persisted.push(template),
        }
        store.save_templates(&persisted).await?;

        self.refresh(store).await
    }

    pub fn get_all(&self) -> &[DesignTemplateConfig] {
        &self.merged
    }

    pub fn get_by_id(&self, id: &str) -> Option<&DesignTemplateConfig> {
        self.merged.iter().find(|t| t.id == id)
    }
}

fn merge(
    builtins: &[DesignTemplateConfig],
    overrides: Vec<DesignTemplateConfig>,
) -> Vec<DesignTemplateConfig> {
    let mut merged = builtins.to_vec();
    for template in overrides {
        match merged.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => merged.push(template),
        }
    }
    merged
}
