use async_trait::async_trait;
#[cfg(feature = "printer-cups")]
use printers::{
    common::base::job::PrinterJobOptions, common::base::printer::Printer as PrintersCratePrinter,
    get_printers,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::composite::Composite;
use crate::config::PrinterConfig;
use crate::errors::{DeliveryError, PrinterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    Letter,
    Photo4x6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintQuality {
    Normal,
    High,
}

impl FromStr for PaperSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "letter" => Ok(PaperSize::Letter),
            "photo4x6" | "4x6" => Ok(PaperSize::Photo4x6),
            other => Err(other.to_string()),
        }
    }
}

impl FromStr for PrintQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(PrintQuality::Normal),
            "high" => Ok(PrintQuality::High),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrintJob {
    pub file_path: PathBuf,
    pub job_name: String,
    pub copies: u32,
    pub paper_size: PaperSize,
    pub quality: PrintQuality,
}

#[derive(Debug, Serialize)]
pub struct PrinterStatus {
    pub is_online: bool,
    pub printer: String,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait Printer: Send + Sync {
    async fn print_file(&self, job: PrintJob) -> Result<String, PrinterError>;
    async fn is_ready(&self) -> bool;
    async fn get_status(&self) -> Result<PrinterStatus, PrinterError>;
    fn type_name(&self) -> &'static str;
}

/// Upper bound on copies for a single request.
pub const MAX_COPIES: u32 = 10;

/// Spools composites to disk and hands them to a printer.
pub struct PrintAdapter {
    printer: Arc<dyn Printer>,
    spool_dir: PathBuf,
    cleanup_delay: Duration,
    paper_size: PaperSize,
    quality: PrintQuality,
}

impl PrintAdapter {
    pub fn new(printer: Arc<dyn Printer>, spool_dir: impl Into<PathBuf>) -> Self {
        PrintAdapter {
            printer,
            spool_dir: spool_dir.into(),
            cleanup_delay: Duration::from_secs(30),
            paper_size: PaperSize::Photo4x6,
            quality: PrintQuality::High,
        }
    }

    pub fn with_media(mut self, paper_size: PaperSize, quality: PrintQuality) -> Self {
        self.paper_size = paper_size;
        self.quality = quality;
        self
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn printer(&self) -> &Arc<dyn Printer> {
        &self.printer
    }

    /// Submit one print job per composite. Returns the job ids in order.
    pub async fn print(
        &self,
        composites: &[Composite],
        template_name: &str,
        copies: u32,
    ) -> Result<Vec<String>, DeliveryError> {
        if composites.is_empty() {
            return Err(DeliveryError::NoComposites);
        }
        if !self.printer.is_ready().await {
            return Err(PrinterError::NotReady {
                reason: format!("{} is not ready", self.printer.type_name()),
            }
            .into());
        }

        tokio::fs::create_dir_all(&self.spool_dir)
            .await
            .map_err(PrinterError::from)?;
        let copies = copies.clamp(1, MAX_COPIES);
        let mut job_ids = Vec::with_capacity(composites.len());

        for (i, composite) in composites.iter().enumerate() {
            let file_path = self.spool_dir.join(format!(
                "print_{}.{}",
                uuid::Uuid::new_v4(),
                composite.format().extension()
            ));
            tokio::fs::write(&file_path, composite.bytes())
                .await
                .map_err(PrinterError::from)?;

            let job = PrintJob {
                file_path: file_path.clone(),
                job_name: format!(
                    "PhotoBooth-{}-{}-{}",
                    template_name,
                    chrono::Utc::now().format("%Y%m%d-%H%M%S"),
                    i + 1
                ),
                copies,
                paper_size: self.paper_size,
                quality: self.quality,
            };

            info!("Sending print job to {}: {:?}", self.printer.type_name(), job);
            let result = self.printer.print_file(job).await;
            self.schedule_cleanup(file_path);

            match result {
                Ok(job_id) => {
                    info!("Print job submitted successfully with ID: {}", job_id);
                    job_ids.push(job_id);
                }
                Err(e) => {
                    warn!("Print job failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        Ok(job_ids)
    }

    // The printer may still be reading the spool file after submission
    fn schedule_cleanup(&self, path: PathBuf) {
        let delay = self.cleanup_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove spool file {:?}: {}", path, e);
            }
        });
    }
}

#[cfg(feature = "printer-cups")]
pub struct CupsPrinter {
    printer: PrintersCratePrinter,
}

#[cfg(feature = "printer-cups")]
impl CupsPrinter {
    /// Find a CUPS queue by exact name or system name, then by substring.
    pub fn find(name: &str) -> Result<Self, PrinterError> {
        let available = get_printers();
        for printer in &available {
            info!(
                "  - Name: '{}', System Name: '{}', URI: '{}'",
                printer.name, printer.system_name, printer.uri
            );
        }

        available
            .iter()
            .find(|p| p.name == name || p.system_name == name)
            .or_else(|| available.iter().find(|p| p.name.contains(name)))
            .cloned()
            .map(|printer| {
                info!(
                    "Selected printer: '{}' (System: '{}')",
                    printer.name, printer.system_name
                );
                CupsPrinter { printer }
            })
            .ok_or_else(|| PrinterError::NotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(feature = "printer-cups")]
#[async_trait]
impl Printer for CupsPrinter {
    async fn print_file(&self, job: PrintJob) -> Result<String, PrinterError> {
        let path = job
            .file_path
            .to_str()
            .ok_or_else(|| PrinterError::PrintFailed("spool path is not UTF-8".to_string()))?;

        let page_size = match job.paper_size {
            PaperSize::Photo4x6 => "Borderless4x6in",
            PaperSize::Letter => "Letter",
        };
        let quality = match job.quality {
            PrintQuality::High => "High",
            PrintQuality::Normal => "Normal",
        };
        let copies = job.copies.to_string();
        let raw_properties = [
            ("PageSize", page_size),
            ("print-quality", quality),
            ("copies", copies.as_str()),
            ("job-name", job.job_name.as_str()),
        ];
        let options = PrinterJobOptions {
            name: Some(&job.job_name),
            raw_properties: &raw_properties,
        };

        // Success only means CUPS accepted the job, not that it printed
        self.printer
            .print_file(path, options)
            .map(|job_id| job_id.to_string())
            .map_err(|e| PrinterError::PrintFailed(format!("CUPS print error: {}", e)))
    }

    // The queue can disappear when the printer is unplugged
    async fn is_ready(&self) -> bool {
        get_printers()
            .iter()
            .any(|p| p.system_name == self.printer.system_name)
    }

    async fn get_status(&self) -> Result<PrinterStatus, PrinterError> {
        let online = self.is_ready().await;
        Ok(PrinterStatus {
            is_online: online,
            printer: self.printer.name.clone(),
            error_message: (!online).then(|| "queue no longer listed by CUPS".to_string()),
        })
    }

    fn type_name(&self) -> &'static str {
        "CUPS printer"
    }
}

/// Accepts every job without printing anything.
pub struct MockPrinter {
    delay: Duration,
    ready: bool,
}

impl MockPrinter {
    pub fn new(delay: Duration) -> Self {
        MockPrinter { delay, ready: true }
    }

    /// A printer that reports itself offline.
    pub fn offline() -> Self {
        MockPrinter {
            delay: Duration::ZERO,
            ready: false,
        }
    }
}

impl Default for MockPrinter {
    fn default() -> Self {
        MockPrinter::new(Duration::from_millis(500))
    }
}

#[async_trait]
impl Printer for MockPrinter {
    async fn print_file(&self, job: PrintJob) -> Result<String, PrinterError> {
        if !Path::new(&job.file_path).exists() {
            return Err(PrinterError::PrintFailed(format!(
                "spool file missing: {:?}",
                job.file_path
            )));
        }
        tokio::time::sleep(self.delay).await;
        Ok(format!("mock-job-{}", uuid::Uuid::new_v4()))
    }

    async fn is_ready(&self) -> bool {
        self.ready
    }

    async fn get_status(&self) -> Result<PrinterStatus, PrinterError> {
        Ok(PrinterStatus {
            is_online: self.ready,
            printer: "mock".to_string(),
            error_message: (!self.ready).then(|| "mock printer is offline".to_string()),
        })
    }

    fn type_name(&self) -> &'static str {
        "Mock Printer"
    }
}

/// Pick the configured printer, trying fallbacks before settling on the mock.
pub fn new_printer(config: &PrinterConfig) -> Arc<dyn Printer> {
    if config.use_mock {
        info!("Mock printer requested by configuration");
        return Arc::new(MockPrinter::default());
    }
    connect_printer(config)
}

#[cfg(feature = "printer-cups")]
fn connect_printer(config: &PrinterConfig) -> Arc<dyn Printer> {
    for name in std::iter::once(&config.name).chain(&config.fallback_names) {
        info!("Attempting to connect to printer: {}", name);
        match CupsPrinter::find(name) {
            Ok(printer) => return Arc::new(printer),
            Err(e) => warn!("Failed to connect to {}: {}", name, e),
        }
    }

    warn!("No physical printer found, using mock printer");
    Arc::new(MockPrinter::default())
}

#[cfg(not(feature = "printer-cups"))]
fn connect_printer(_config: &PrinterConfig) -> Arc<dyn Printer> {
    Arc::new(MockPrinter::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::OutputFormat;
    use bytes::Bytes;
    use std::sync::Mutex;

    struct RecordingPrinter {
        jobs: Mutex<Vec<PrintJob>>,
        fail: bool,
    }

    #[async_trait]
    impl Printer for RecordingPrinter {
        async fn print_file(&self, job: PrintJob) -> Result<String, PrinterError> {
            assert!(job.file_path.exists());
            let id = format!("job-{}", self.jobs.lock().unwrap().len());
            self.jobs.lock().unwrap().push(job);
            if self.fail {
                return Err(PrinterError::PrintFailed("paper jam".to_string()));
            }
            Ok(id)
        }

        async fn is_ready(&self) -> bool {
            true
        }

        async fn get_status(&self) -> Result<PrinterStatus, PrinterError> {
            Ok(PrinterStatus {
                is_online: true,
                printer: "recording".to_string(),
                error_message: None,
            })
        }

        fn type_name(&self) -> &'static str {
            "Recording Printer"
        }
    }

    fn composite() -> Composite {
        Composite::new(Bytes::from_static(b"jpeg bytes"), OutputFormat::Jpeg, 600, 800)
    }

    #[tokio::test]
    async fn test_print_submits_one_job_per_composite() {
        let dir = tempfile::tempdir().unwrap();
        let printer = Arc::new(RecordingPrinter {
            jobs: Mutex::new(Vec::new()),
            fail: false,
        });
        let adapter = PrintAdapter::new(printer.clone(), dir.path())
            .with_cleanup_delay(Duration::from_secs(60));

        let ids = adapter
            .print(&[composite(), composite()], "strip", 25)
            .await
            .unwrap();

        assert_eq!(ids, vec!["job-0".to_string(), "job-1".to_string()]);
        let jobs = printer.jobs.lock().unwrap();
        assert_eq!(jobs[0].copies, MAX_COPIES);
        assert!(jobs[0].job_name.starts_with("PhotoBooth-strip-"));
        assert_eq!(jobs[1].file_path.extension().unwrap(), "jpg");
    }

    #[tokio::test]
    async fn test_print_failure_surfaces_as_delivery_error() {
        let dir = tempfile::tempdir().unwrap();
        let printer = Arc::new(RecordingPrinter {
            jobs: Mutex::new(Vec::new()),
            fail: true,
        });
        let adapter = PrintAdapter::new(printer, dir.path());
        let kept = composite();

        let result = adapter.print(std::slice::from_ref(&kept), "single", 1).await;

        assert!(matches!(result, Err(DeliveryError::Printer(_))));
        // The composite is still intact for another attempt
        assert_eq!(kept.bytes(), &Bytes::from_static(b"jpeg bytes"));
    }

    #[tokio::test]
    async fn test_print_requires_composites() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = PrintAdapter::new(Arc::new(MockPrinter::default()), dir.path());
        let result = adapter.print(&[], "strip", 1).await;
        assert!(matches!(result, Err(DeliveryError::NoComposites)));
    }

    #[tokio::test]
    async fn test_mock_printer_accepts_spooled_file() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = PrintAdapter::new(
            Arc::new(MockPrinter::new(Duration::ZERO)),
            dir.path(),
        );
        let ids = adapter.print(&[composite()], "collage", 2).await.unwrap();
        assert!(ids[0].starts_with("mock-job-"));
    }

    #[tokio::test]
    async fn test_offline_printer_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = PrintAdapter::new(Arc::new(MockPrinter::offline()), dir.path().join("spool"));

        let result = adapter.print(&[composite()], "strip", 1).await;

        assert!(matches!(
            result,
            Err(DeliveryError::Printer(PrinterError::NotReady { .. }))
        ));
        // Nothing is spooled for a printer that will not take the job
        assert!(!dir.path().join("spool").exists());
    }

    #[tokio::test]
    async fn test_offline_status_carries_error_message() {
        let status = MockPrinter::offline().get_status().await.unwrap();
        assert!(!status.is_online);
        assert!(status.error_message.is_some());
    }

    #[tokio::test]
    async fn test_unwritable_spool_is_printer_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("spool");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let adapter = PrintAdapter::new(Arc::new(MockPrinter::new(Duration::ZERO)), &blocker);

        let result = adapter.print(&[composite()], "strip", 1).await;

        assert!(matches!(
            result,
            Err(DeliveryError::Printer(PrinterError::IoError(_)))
        ));
    }

    #[tokio::test]
    async fn test_configured_media_reaches_job() {
        let dir = tempfile::tempdir().unwrap();
        let printer = Arc::new(RecordingPrinter {
            jobs: Mutex::new(Vec::new()),
            fail: false,
        });
        let adapter = PrintAdapter::new(printer.clone(), dir.path())
            .with_media(PaperSize::Letter, PrintQuality::Normal)
            .with_cleanup_delay(Duration::from_secs(60));

        adapter.print(&[composite()], "single", 1).await.unwrap();

        let jobs = printer.jobs.lock().unwrap();
        assert_eq!(jobs[0].paper_size, PaperSize::Letter);
        assert_eq!(jobs[0].quality, PrintQuality::Normal);
    }

    #[test]
    fn test_media_parsing() {
        assert_eq!("Letter".parse::<PaperSize>(), Ok(PaperSize::Letter));
        assert_eq!("4x6".parse::<PaperSize>(), Ok(PaperSize::Photo4x6));
        assert_eq!(" high ".parse::<PrintQuality>(), Ok(PrintQuality::High));
        assert!("a4".parse::<PaperSize>().is_err());
        assert!("draft".parse::<PrintQuality>().is_err());
    }
}
