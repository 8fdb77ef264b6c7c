use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::delivery::print::{PaperSize, PrintQuality};
pub use crate::errors::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub printer: PrinterConfig,
    pub branding: BrandingConfig,
    pub delivery: DeliveryConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Where saved composites and print spool files are written.
    pub base_path: PathBuf,
    /// Root for template background references such as `/templates/gold-frame.png`.
    pub assets_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrinterConfig {
    pub name: String,
    pub fallback_names: Vec<String>,
    pub use_mock: bool,
    pub paper_size: PaperSize,
    pub quality: PrintQuality,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandingConfig {
    pub label: String,
    pub font_path: PathBuf,
    pub bold_font_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    pub email_delay_ms: u64,
    pub share_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

impl DeliveryConfig {
    pub fn email_delay(&self) -> Duration {
        Duration::from_millis(self.email_delay_ms)
    }
}

impl Default for BrandingConfig {
    fn default() -> Self {
        BrandingConfig {
            label: "PhotoBooth".to_string(),
            font_path: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            bold_font_path: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let server = ServerConfig {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
        };

        let base_path = std::env::var("STORAGE_PATH")
            .unwrap_or_else(|_| "/usr/local/share/photo_booth".to_string());
        let storage = StorageConfig {
            base_path: PathBuf::from(&base_path),
            assets_path: std::env::var("TEMPLATE_ASSETS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(&base_path).join("static")),
        };

        let printer = PrinterConfig {
            name: std::env::var("PRINTER_NAME")
                .unwrap_or_else(|_| "XP8700series-TurboPrint".to_string()),
            fallback_names: std::env::var("PRINTER_FALLBACK")
                .unwrap_or_else(|_| "EPSON_XP_8700_Series_USB,XP-8700".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            use_mock: std::env::var("USE_MOCK_PRINTER")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            paper_size: env_parse("PRINT_PAPER_SIZE", "photo4x6")?,
            quality: env_parse("PRINT_QUALITY", "high")?,
        };

        let defaults = BrandingConfig::default();
        let branding = BrandingConfig {
            label: std::env::var("BRANDING_LABEL").unwrap_or(defaults.label),
            font_path: std::env::var("FONT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.font_path),
            bold_font_path: std::env::var("BOLD_FONT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.bold_font_path),
        };

        let email_delay = std::env::var("EMAIL_DELAY_MS").unwrap_or_else(|_| "2000".to_string());
        let delivery = DeliveryConfig {
            email_delay_ms: email_delay
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "EMAIL_DELAY_MS",
                    value: email_delay.clone(),
                })?,
            share_base_url: std::env::var("SHARE_BASE_URL")
                .unwrap_or_else(|_| "https://photobooth.app".to_string()),
        };

        let database = DatabaseConfig {
            path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| format!("{}/photo_booth.db", base_path))
                .into(),
        };

        let config = Config {
            server,
            storage,
            printer,
            branding,
            delivery,
            database,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                name: "HOST",
                value: self.server.host.clone(),
            })
    }

    pub fn images_path(&self) -> PathBuf {
        self.storage.base_path.clone()
    }

    pub fn spool_path(&self) -> PathBuf {
        self.storage.base_path.join("spool")
    }
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = std::env::var(name).unwrap_or_else(|_| default.to_string());
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global, so everything touching them lives in one test.
    #[test]
    fn test_env_config() {
        std::env::remove_var("PORT");
        std::env::remove_var("EMAIL_DELAY_MS");
        std::env::remove_var("STORAGE_PATH");
        std::env::remove_var("TEMPLATE_ASSETS_PATH");
        std::env::remove_var("PRINT_PAPER_SIZE");
        std::env::remove_var("PRINT_QUALITY");

        let config = Config::from_env().expect("Failed to create config");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.branding.label, "PhotoBooth");
        assert_eq!(config.delivery.email_delay(), Duration::from_millis(2000));
        assert_eq!(
            config.storage.assets_path,
            PathBuf::from("/usr/local/share/photo_booth/static")
        );
        assert_eq!(config.printer.paper_size, PaperSize::Photo4x6);
        assert_eq!(config.printer.quality, PrintQuality::High);

        std::env::set_var("PORT", "invalid");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidPort)));
        std::env::remove_var("PORT");

        std::env::set_var("EMAIL_DELAY_MS", "soon");
        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                name: "EMAIL_DELAY_MS",
                ..
            })
        ));
        std::env::remove_var("EMAIL_DELAY_MS");

        std::env::set_var("PRINT_PAPER_SIZE", "letter");
        std::env::set_var("PRINT_QUALITY", "normal");
        let config = Config::from_env().expect("Failed to create config");
        assert_eq!(config.printer.paper_size, PaperSize::Letter);
        assert_eq!(config.printer.quality, PrintQuality::Normal);

        std::env::set_var("PRINT_PAPER_SIZE", "a4");
        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                name: "PRINT_PAPER_SIZE",
                ..
            })
        ));
        std::env::remove_var("PRINT_PAPER_SIZE");
        std::env::remove_var("PRINT_QUALITY");
    }
}
