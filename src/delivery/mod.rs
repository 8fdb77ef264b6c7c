// Delivery adapters: routes a finished composite to print, email, disk or a share link

pub mod email;
pub mod print;
pub mod save;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::composite::Composite;
use crate::errors::DeliveryError;

pub use email::{validate_email, EmailAdapter, EmailSender, MockEmailSender};
pub use print::{new_printer, MockPrinter, PrintAdapter, Printer, PrinterStatus};
pub use save::SaveAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Print,
    Email,
    Save,
    Qr,
}

#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub method: DeliveryMethod,
    pub email: Option<String>,
    pub copies: Option<u32>,
}

/// What a delivery produced, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Print { job_ids: Vec<String> },
    Email { address: String },
    Save { files: Vec<String> },
    Qr { url: String, files: Vec<String> },
}

pub struct DeliveryServices {
    pub print: PrintAdapter,
    pub email: EmailAdapter,
    pub save: SaveAdapter,
    pub share_base_url: String,
}

impl DeliveryServices {
    /// Composites are borrowed, so a failed delivery can be retried with
    /// another method.
    pub async fn deliver(
        &self,
        request: &DeliveryRequest,
        composites: &[Composite],
        template_name: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        info!(
            "Delivering {} composite(s) via {:?}",
            composites.len(),
            request.method
        );

        match request.method {
            DeliveryMethod::Print => {
                let copies = request.copies.unwrap_or(1);
                let job_ids = self.print.print(composites, template_name, copies).await?;
                Ok(DeliveryOutcome::Print { job_ids })
            }
            DeliveryMethod::Email => {
                let address = request.email.as_deref().unwrap_or_default().trim();
                self.email.send(address, composites, template_name).await?;
                Ok(DeliveryOutcome::Email {
                    address: address.to_string(),
                })
            }
            DeliveryMethod::Save => {
                let (_, files) = self.save.save(composites).await?;
                Ok(DeliveryOutcome::Save { files })
            }
            DeliveryMethod::Qr => {
                let (millis, files) = self.save.save(composites).await?;
                Ok(DeliveryOutcome::Qr {
                    url: share_url(&self.share_base_url, millis),
                    files,
                })
            }
        }
    }
}

/// `<base>/photos/<millis>`; a trailing slash on `base` is ignored.
pub fn share_url(base: &str, millis: i64) -> String {
    format!("{}/photos/{}", base.trim_end_matches('/'), millis)
}
