use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::composite::Composite;
use crate::delivery::DeliveryServices;
use crate::errors::{AppError, CompositionError};
use crate::gallery::{Gallery, GalleryFilter};
use crate::templates::SharedRegistry;

/// Reprints always use the single-photo layout name.
const REPRINT_TEMPLATE: &str = "single";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPhotoBody {
    pub data_url: String,
    pub design_template_id: Option<String>,
}

#[get("/gallery")]
pub async fn list_gallery(
    gallery: web::Data<Arc<Gallery>>,
    query: web::Query<GalleryFilter>,
) -> Result<HttpResponse, AppError> {
    let items = gallery.list(&query).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "items": items,
    })))
}

#[get("/gallery/folders")]
pub async fn gallery_folders(gallery: web::Data<Arc<Gallery>>) -> Result<HttpResponse, AppError> {
    let folders = gallery.folders().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "folders": folders,
    })))
}

/// Keep one captured photo, filed under the chosen design template.
#[post("/gallery")]
pub async fn add_gallery_photo(
    gallery: web::Data<Arc<Gallery>>,
    registry: web::Data<SharedRegistry>,
    body: web::Json<AddPhotoBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    Composite::from_data_url(&body.data_url).map_err(CompositionError::from)?;

    let template = match &body.design_template_id {
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

    let item = gallery
        .add_individual(body.data_url, template.as_ref())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "item": item,
    })))
}

#[delete("/gallery/{id}")]
pub async fn delete_gallery_item(
    gallery: web::Data<Arc<Gallery>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if !gallery.delete(&id).await? {
        return Err(AppError::NotFound(format!("gallery item {}", id)));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

#[post("/gallery/{id}/print")]
pub async fn print_gallery_item(
    gallery: web::Data<Arc<Gallery>>,
    services: web::Data<Arc<DeliveryServices>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let item = gallery
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("gallery item {}", id)))?;
    let composite = Composite::from_data_url(&item.data_url).map_err(CompositionError::from)?;

    info!("Reprinting gallery item {}", id);
    let job_ids = services
        .print
        .print(std::slice::from_ref(&composite), REPRINT_TEMPLATE, 1)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "job_ids": job_ids,
    })))
}
