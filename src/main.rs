// Photo booth compositor server: composes captured photos into strips,
// collages and designed templates, then delivers them.

use actix_files as fs;
use actix_web::{middleware, web, App, HttpServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use photobooth_compositor::config::Config;
use photobooth_compositor::delivery::{
    new_printer, DeliveryServices, EmailAdapter, MockEmailSender, PrintAdapter, SaveAdapter,
};
use photobooth_compositor::errors::AppError;
use photobooth_compositor::routes;
use photobooth_compositor::{
    Branding, Compositor, Gallery, ImageLoader, SharedRegistry, SqliteTemplateStore,
    TemplateRegistry, TemplateStore,
};

// ============================================================================
// Application State
// ============================================================================

/// Centralized application state container
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<SqliteTemplateStore>,
    pub registry: SharedRegistry,
    pub gallery: Arc<Gallery>,
    pub compositor: Arc<Compositor>,
    pub delivery: Arc<DeliveryServices>,
}

impl AppState {
    /// Create a new application state instance
    async fn new(config: Config) -> Result<Self, AppError> {
        info!("Initializing application state");

        info!("Initializing database at: {:?}", config.database.path);
        let store = SqliteTemplateStore::connect(&config.database)
            .await
            .map_err(|e| {
                AppError::Initialization(format!("Failed to open template store: {}", e))
            })?;
        let store = Arc::new(store);

        let registry = TemplateRegistry::load(store.as_ref()).await?;
        info!("Loaded {} design templates", registry.get_all().len());

        let gallery = Gallery::new(store.clone());

        let loader = ImageLoader::new(config.storage.assets_path.clone());
        let branding = Branding::from_config(&config.branding);
        let compositor = Compositor::new(Arc::new(loader), branding);

        let delivery = Self::initialize_delivery(&config).await?;

        Ok(Self {
            config,
            store,
            registry: Arc::new(RwLock::new(registry)),
            gallery: Arc::new(gallery),
            compositor: Arc::new(compositor),
            delivery: Arc::new(delivery),
        })
    }

    async fn initialize_delivery(config: &Config) -> Result<DeliveryServices, AppError> {
        for dir in [config.images_path(), config.spool_path()] {
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                AppError::Initialization(format!("Failed to create {:?}: {}", dir, e))
            })?;
        }

        // Printer is non-critical; new_printer falls back to the mock
        let printer = new_printer(&config.printer);
        if printer.is_ready().await {
            info!("Printer initialized: {}", printer.type_name());
        } else {
            warn!("Printer {} is not ready, printing may fail", printer.type_name());
        }

        Ok(DeliveryServices {
            print: PrintAdapter::new(printer, config.spool_path())
                .with_media(config.printer.paper_size, config.printer.quality),
            email: EmailAdapter::new(Box::new(MockEmailSender::new(
                config.delivery.email_delay(),
            ))),
            save: SaveAdapter::new(config.images_path()),
            share_base_url: config.delivery.share_base_url.clone(),
        })
    }
}

// ============================================================================
// Shutdown Handling
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

async fn cleanup_resources(state: AppState) {
    info!("Beginning resource cleanup");

    state.store.close().await;
    info!("Database connections closed");

    info!("Resource cleanup complete");
}

fn load_config() -> Result<(Config, SocketAddr), AppError> {
    let config = Config::from_env()?;
    let socket_addr = config.socket_addr()?;
    Ok((config, socket_addr))
}

fn io_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // ========================================
    // Phase 1: Basic Initialization
    // ========================================

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting photo booth compositor");

    // ========================================
    // Phase 2: Configuration & State Setup
    // ========================================

    let (config, socket_addr) = load_config().map_err(|e| {
        error!("{}", e);
        io_error("Failed to load configuration", e)
    })?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", socket_addr);

    let app_state = AppState::new(config).await.map_err(|e| {
        error!("Application initialization error: {}", e);
        io_error("Failed to initialize application", e)
    })?;

    // ========================================
    // Phase 3: HTTP Server Setup
    // ========================================

    let app_state_for_server = app_state.clone();

    let server = HttpServer::new(move || {
        let state = app_state_for_server.clone();
        let store: Arc<dyn TemplateStore> = state.store.clone();

        App::new()
            // Middleware
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            // Application state
            .app_data(web::Data::new(store))
            .app_data(web::Data::new(state.registry.clone()))
            .app_data(web::Data::new(state.gallery.clone()))
            .app_data(web::Data::new(state.compositor.clone()))
            .app_data(web::Data::new(state.delivery.clone()))
            .app_data(web::JsonConfig::default().limit(64 * 1024 * 1024))
            // JSON API
            .service(
                web::scope("/api")
                    .service(routes::compose)
                    .service(routes::list_templates)
                    .service(routes::save_template)
                    .service(routes::get_selection)
                    .service(routes::set_selection)
                    .service(routes::get_template)
                    .service(routes::deliver)
                    .service(routes::printer_status)
                    .service(routes::gallery_folders)
                    .service(routes::list_gallery)
                    .service(routes::add_gallery_photo)
                    .service(routes::delete_gallery_item)
                    .service(routes::print_gallery_item),
            )
            // Share links
            .service(routes::shared_photo)
            // Static file serving
            .service(fs::Files::new("/images", state.config.images_path()))
            .service(fs::Files::new(
                "/templates",
                state.config.storage.assets_path.join("templates"),
            ))
    })
    .bind(socket_addr)?
    .shutdown_timeout(5)
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(async move { server.await });

    info!("Photo booth compositor started on {}", socket_addr);

    // ========================================
    // Phase 4: Run Until Shutdown
    // ========================================

    shutdown_signal().await;

    // ========================================
    // Phase 5: Graceful Shutdown
    // ========================================

    info!("Initiating graceful shutdown...");

    server_handle.stop(true).await;
    cleanup_resources(app_state).await;

    server_task
        .await
        .map_err(|e| io_error("Server task error", e))??;

    info!("Graceful shutdown complete");
    Ok(())
}
