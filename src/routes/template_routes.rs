use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::store::TemplateStore;
use crate::templates::{DesignTemplateConfig, SharedRegistry};

#[get("/templates")]
pub async fn list_templates(registry: web::Data<SharedRegistry>) -> HttpResponse {
    let registry = registry.read().await;
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "templates": registry.get_all(),
    }))
}

#[post("/templates")]
pub async fn save_template(
    registry: web::Data<SharedRegistry>,
    store: web::Data<Arc<dyn TemplateStore>>,
    body: web::Json<DesignTemplateConfig>,
) -> Result<HttpResponse, AppError> {
    let template = body.into_inner();
    let id = template.id.clone();
    info!("Saving design template override: {}", id);

    let mut registry = registry.write().await;
    registry.save(store.get_ref().as_ref(), template).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "template": registry.get_by_id(&id),
    })))
}

#[get("/templates/selection")]
pub async fn get_selection(
    store: web::Data<Arc<dyn TemplateStore>>,
) -> Result<HttpResponse, AppError> {
    let id = store.last_selected_id().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "id": id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SelectionBody {
    pub id: Option<String>,
}

#[post("/templates/selection")]
pub async fn set_selection(
    registry: web::Data<SharedRegistry>,
    store: web::Data<Arc<dyn TemplateStore>>,
    body: web::Json<SelectionBody>,
) -> Result<HttpResponse, AppError> {
    let id = body.into_inner().id.filter(|id| !id.is_empty());

    if let Some(id) = &id {
        if registry.read().await.get_by_id(id).is_none() {
            warn!("Refusing to select unknown template {}", id);
            return Err(AppError::TemplateNotFound { id: id.clone() });
        }
    }

    store.set_last_selected_id(id.as_deref()).await?;
    info!("Last selected design template set to {:?}", id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "id": id,
    })))
}

// Registered after the selection routes so `selection` is never taken as an id
#[get("/templates/{id}")]
pub async fn get_template(
    registry: web::Data<SharedRegistry>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let registry = registry.read().await;
    let template = registry
        .get_by_id(&id)
        .ok_or(AppError::TemplateNotFound { id: id.clone() })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "template": template,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTemplateStore;
    use crate::templates::TemplateRegistry;
    use actix_web::{test, App};
    use tokio::sync::RwLock;

    fn app_data() -> (web::Data<SharedRegistry>, web::Data<Arc<dyn TemplateStore>>) {
        let store: Arc<dyn TemplateStore> = Arc::new(MemoryTemplateStore::default());
        (
            web::Data::new(Arc::new(RwLock::new(TemplateRegistry::with_defaults(
                Vec::new(),
            )))),
            web::Data::new(store),
        )
    }

    macro_rules! template_app {
        ($registry:expr, $store:expr) => {
            test::init_service(
                App::new()
                    .app_data($registry.clone())
                    .app_data($store.clone())
                    .service(list_templates)
                    .service(save_template)
                    .service(get_selection)
                    .service(set_selection)
                    .service(get_template),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_list_and_get_builtins() {
        let (registry, store) = app_data();
        let app = template_app!(registry, store);

        let req = test::TestRequest::get().uri("/templates").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["templates"].as_array().unwrap().len(), 2);

        let req = test::TestRequest::get()
            .uri("/templates/gold_frame")
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["template"]["backgroundUrl"], "/templates/gold-frame.png");

        let req = test::TestRequest::get().uri("/templates/missing").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 404);
    }

    #[actix_web::test]
    async fn test_save_override_replaces_builtin() {
        let (registry, store) = app_data();
        let app = template_app!(registry, store);

        let req = test::TestRequest::post()
            .uri("/templates")
            .set_json(serde_json::json!({
                "id": "gold_frame",
                "name": "Gold Frame v2",
                "templateType": "single",
                "backgroundUrl": "/templates/gold-v2.png",
                "slots": [{"x": 0, "y": 0, "width": 100, "height": 100}],
            }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["ok"], true);

        let registry = registry.read().await;
        assert_eq!(registry.get_all().len(), 2);
        assert_eq!(
            registry.get_by_id("gold_frame").unwrap().name,
            "Gold Frame v2"
        );
    }

    #[actix_web::test]
    async fn test_save_invalid_template_is_400() {
        let (registry, store) = app_data();
        let app = template_app!(registry, store);

        let req = test::TestRequest::post()
            .uri("/templates")
            .set_json(serde_json::json!({
                "id": "",
                "name": "Broken",
                "templateType": "strip",
                "backgroundUrl": "/templates/x.png",
                "slots": [],
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn test_selection_round_trip() {
        let (registry, store) = app_data();
        let app = template_app!(registry, store);

        let req = test::TestRequest::post()
            .uri("/templates/selection")
            .set_json(serde_json::json!({"id": "classic_strip"}))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["id"], "classic_strip");

        let req = test::TestRequest::get()
            .uri("/templates/selection")
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["id"], "classic_strip");

        let req = test::TestRequest::post()
            .uri("/templates/selection")
            .set_json(serde_json::json!({"id": null}))
            .to_request();
        test::call_service(&app, req).await;
        assert_eq!(store.last_selected_id().await.unwrap(), None);

        let req = test::TestRequest::post()
            .uri("/templates/selection")
            .set_json(serde_json::json!({"id": "unknown"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 404);
    }
}
