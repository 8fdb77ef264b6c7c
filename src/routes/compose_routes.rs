use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::compositor::{ComposeOptions, Compositor};
use crate::errors::AppError;
use crate::gallery::Gallery;
use crate::layout::TemplateType;
use crate::templates::SharedRegistry;

#[derive(Debug, Deserialize)]
pub struct ComposeBody {
    pub photos: Vec<String>,
    #[serde(default = "default_template")]
    pub template: TemplateType,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub design_template_id: Option<String>,
}

fn default_template() -> TemplateType {
    TemplateType::Strip
}

#[post("/compose")]
pub async fn compose(
    compositor: web::Data<Arc<Compositor>>,
    registry: web::Data<SharedRegistry>,
    gallery: web::Data<Arc<Gallery>>,
    body: web::Json<ComposeBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    info!(
        "Compose request: {} photo(s), template {}, design {:?}",
        body.photos.len(),
        body.template,
        body.design_template_id
    );

    // Clone out of the lock so it is not held across decoding
    let design_template = match &body.design_template_id {
        Some(id) => Some(
            registry
                .read()
                .await
                .get_by_id(id)
                .cloned()
                .ok_or_else(|| AppError::TemplateNotFound { id: id.clone() })?,
        ),
        None => None,
    };

    let options = ComposeOptions {
        width: body.width,
        height: body.height,
        design_template,
    };
    let composite = compositor
        .compose(&body.photos, body.template, &options)
        .await?;

    // A gallery failure does not cost the guest their composite
    let session_id = chrono::Utc::now().timestamp_millis().to_string();
    let gallery_id = match gallery
        .add_composed(&composite, options.design_template.as_ref(), &session_id)
        .await
    {
        Ok(item) => Some(item.id),
        Err(e) => {
            warn!("Failed to add composite to gallery: {}", e);
            None
        }
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "image": composite.to_data_url(),
        "width": composite.width(),
        "height": composite.height(),
        "format": composite.format(),
        "gallery_id": gallery_id,
    })))
}
