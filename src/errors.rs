use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Design template not found: {id}")]
    TemplateNotFound { id: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// An image reference could not be turned into a raster.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported image reference: {reference}")]
    UnsupportedReference { reference: String },

    #[error("Malformed data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Failed to read image {reference}: {source}")]
    Read {
        reference: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to fetch image {reference}: {reason}")]
    Fetch { reference: String, reason: String },

    #[error("Failed to decode image {reference}: {reason}")]
    Corrupt { reference: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Drawing surface unavailable for {width}x{height} canvas")]
    ContextUnavailable { width: u32, height: u32 },

    #[error("Failed to encode composite: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("Printer not found: {name}")]
    NotFound { name: String },

    #[error("Printer not ready: {reason}")]
    NotReady { reason: String },

    #[error("Print job failed: {0}")]
    PrintFailed(String),

    #[error("Printer I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Delivery failed after a successful composition. The composite itself is
/// untouched and can be handed to another delivery method.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Nothing to deliver")]
    NoComposites,

    #[error("Printer error: {0}")]
    Printer(#[from] PrinterError),

    #[error("Invalid email address: {address}")]
    InvalidEmail { address: String },

    #[error("Email delivery failed: {0}")]
    EmailFailed(String),

    #[error("Failed to save composite: {0}")]
    SaveFailed(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid design template: {0}")]
    InvalidTemplate(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Initialization(_) => 500,
            AppError::Composition(CompositionError::Decode(_)) => 422,
            AppError::Composition(_) => 500,
            AppError::Delivery(DeliveryError::InvalidEmail { .. }) => 400,
            AppError::Delivery(DeliveryError::NoComposites) => 400,
            AppError::Delivery(DeliveryError::Printer(_)) => 503,
            AppError::Delivery(_) => 500,
            AppError::Store(StoreError::InvalidTemplate(_)) => 400,
            AppError::Store(_) => 503,
            AppError::Config(_) => 500,
            AppError::TemplateNotFound { .. } => 404,
            AppError::NotFound(_) => 404,
            AppError::BadRequest(_) => 400,
        }
    }

    pub fn error_response(&self) -> serde_json::Value {
        serde_json::json!({
            "ok": false,
            "error": self.to_string(),
            "error_type": self.error_type()
        })
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Initialization(_) => "initialization_error",
            AppError::Composition(CompositionError::Decode(_)) => "decode_error",
            AppError::Composition(CompositionError::ContextUnavailable { .. }) => {
                "context_unavailable"
            }
            AppError::Composition(_) => "composition_error",
            AppError::Delivery(_) => "delivery_error",
            AppError::Store(_) => "store_error",
            AppError::Config(_) => "config_error",
            AppError::TemplateNotFound { .. } => "template_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::from_u16(AppError::status_code(self))
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        actix_web::HttpResponse::build(actix_web::ResponseError::status_code(self))
            .json(AppError::error_response(self))
    }
}
