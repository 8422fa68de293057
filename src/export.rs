mod archive;
mod pdf;

pub use archive::ZipExporter;
pub use pdf::PdfExporter;

use crate::config::ExportConfig;
use crate::error::Result;
use crate::library::entry::Entry;
use crate::library::resolver::{PageResolver, ResolvedPage};
use std::path::PathBuf;

/// Download container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// ZIP archive of the page images plus `meta.json`.
    Zip,
    /// PDF with one image per page.
    Pdf,
}

impl ExportFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Zip => "application/zip",
            ExportFormat::Pdf => "application/pdf",
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Zip => "zip",
            ExportFormat::Pdf => "pdf",
        }
    }

    /// Download file name, e.g. `doujinshi_00042.zip`.
    pub fn file_name(&self, number: u64) -> String {
        format!("doujinshi_{:05}.{}", number, self.extension())
    }
}

/// Everything an exporter needs, already resolved on disk.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Entry being exported.
    pub entry: Entry,
    /// Pages that exist, in page order.
    pub pages: Vec<ResolvedPage>,
    /// Path to the entry's `meta.json`.
    pub metadata_path: PathBuf,
}

impl ExportJob {
    /// Resolve every page of an entry.
    pub fn resolve(resolver: &PageResolver, entry: Entry) -> Self {
        let pages = resolver.resolve_all(entry.number, entry.pages);
        let metadata_path = resolver.metadata_path(entry.number);

        Self {
            entry,
            pages,
            metadata_path,
        }
    }
}

/// Trait for export container writers.
pub trait Exporter: Send + Sync {
    /// Encode the job into a complete file.
    fn export(&self, job: &ExportJob) -> Result<Vec<u8>>;
}

/// Get the exporter for a format.
pub fn get_exporter(format: ExportFormat, config: &ExportConfig) -> Box<dyn Exporter> {
    match format {
        ExportFormat::Zip => Box::new(ZipExporter),
        ExportFormat::Pdf => Box::new(PdfExporter {
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        }),
    }
}
