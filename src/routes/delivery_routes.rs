use actix_files::NamedFile;
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::composite::Composite;
use crate::delivery::{DeliveryMethod, DeliveryRequest, DeliveryServices};
use crate::errors::{AppError, CompositionError};

#[derive(Debug, Deserialize)]
pub struct DeliverBody {
    pub method: DeliveryMethod,
    pub composites: Vec<String>,
    #[serde(default = "default_template_name")]
    pub template_name: String,
    pub email: Option<String>,
    pub copies: Option<u32>,
}

fn default_template_name() -> String {
    "strip".to_string()
}

#[post("/deliver")]
pub async fn deliver(
    services: web::Data<Arc<DeliveryServices>>,
    body: web::Json<DeliverBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    info!(
        "Delivery request: {:?} with {} composite(s)",
        body.method,
        body.composites.len()
    );

    let composites = body
        .composites
        .iter()
        .map(|reference| Composite::from_data_url(reference))
        .collect::<Result<Vec<_>, _>>()
        .map_err(CompositionError::from)?;

    let request = DeliveryRequest {
        method: body.method,
        email: body.email,
        copies: body.copies,
    };
    let outcome = services
        .deliver(&request, &composites, &body.template_name)
        .await
        .map_err(|e| {
            warn!("Delivery via {:?} failed: {}", request.method, e);
            e
        })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "delivery": outcome,
    })))
}

#[get("/printer/status")]
pub async fn printer_status(services: web::Data<Arc<DeliveryServices>>) -> HttpResponse {
    let printer = services.print.printer();
    match printer.get_status().await {
        Ok(status) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "type": printer.type_name(),
            "ready": printer.is_ready().await,
            "status": status,
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "ok": false,
            "type": printer.type_name(),
            "error": e.to_string(),
        })),
    }
}

/// Target of share links.
#[get("/photos/{millis}")]
pub async fn shared_photo(
    services: web::Data<Arc<DeliveryServices>>,
    path: web::Path<i64>,
) -> Result<NamedFile, AppError> {
    let millis = path.into_inner();
    let file = services
        .save
        .find(millis)
        .await
        .ok_or_else(|| AppError::NotFound(format!("shared photo {}", millis)))?;

    NamedFile::open_async(&file)
        .await
        .map_err(|e| AppError::NotFound(format!("shared photo {}: {}", millis, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{EmailAdapter, MockEmailSender, MockPrinter, PrintAdapter, SaveAdapter};
    use crate::loader::tests::png_data_url;
    use actix_web::{test, App};
    use std::time::Duration;

    fn services(dir: &std::path::Path) -> web::Data<Arc<DeliveryServices>> {
        web::Data::new(Arc::new(DeliveryServices {
            print: PrintAdapter::new(
                Arc::new(MockPrinter::new(Duration::ZERO)),
                dir.join("spool"),
            ),
            email: EmailAdapter::new(Box::new(MockEmailSender::new(Duration::ZERO))),
            save: SaveAdapter::new(dir.join("images")),
            share_base_url: "http://booth.local".to_string(),
        }))
    }

    #[actix_web::test]
    async fn test_qr_link_serves_saved_photo() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(services(dir.path()))
                .service(deliver)
                .service(shared_photo),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/deliver")
            .set_json(serde_json::json!({
                "method": "qr",
                "composites": [png_data_url(8, 8, [0, 0, 255, 255])],
            }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["delivery"]["method"], "qr");

        let url = resp["delivery"]["url"].as_str().unwrap();
        let path = url.trim_start_matches("http://booth.local");
        let req = test::TestRequest::get().uri(path).to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_invalid_email_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app =
            test::init_service(App::new().app_data(services(dir.path())).service(deliver)).await;

        let req = test::TestRequest::post()
            .uri("/deliver")
            .set_json(serde_json::json!({
                "method": "email",
                "email": "a b@c.d",
                "composites": [png_data_url(4, 4, [0, 0, 0, 255])],
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn test_printer_status_reports_mock() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(services(dir.path()))
                .service(printer_status),
        )
        .await;

        let req = test::TestRequest::get().uri("/printer/status").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["type"], "Mock Printer");
        assert_eq!(resp["ready"], true);
    }

    #[actix_web::test]
    async fn test_unknown_share_link_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(services(dir.path()))
                .service(shared_photo),
        )
        .await;

        let req = test::TestRequest::get().uri("/photos/123").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 404);
    }
}
