// Library module organization

pub mod composite;
pub mod compositor;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod gallery;
pub mod layout;
pub mod loader;
pub mod routes;
pub mod store;
pub mod surface;
pub mod templates;

// Re-export commonly used types for convenience
pub use composite::{Composite, OutputFormat};
pub use compositor::{Branding, ComposeOptions, Compositor};
pub use config::Config;
pub use errors::{AppError, CompositionError, DecodeError, DeliveryError, StoreError};
pub use gallery::{Gallery, GalleryFilter, GalleryItem, GalleryItemType};
pub use layout::{layout, template_size, PhotoLayout, TemplateSize, TemplateType};
pub use loader::{ImageLoader, ImageSource, Raster};
pub use store::{GalleryStore, MemoryTemplateStore, SqliteTemplateStore, TemplateStore};
pub use templates::{DesignTemplateConfig, SharedRegistry, TemplateRegistry};
