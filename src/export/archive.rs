//! ZIP export.

use crate::error::Result;
use crate::export::{ExportJob, Exporter};
use crate::library::resolver::METADATA_FILE;
use std::fs::File;
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Packs page images as `{page}.{ext}` followed by `meta.json`.
pub struct ZipExporter;

impl Exporter for ZipExporter {
    fn export(&self, job: &ExportJob) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for page in &job.pages {
            let mut file = match File::open(&page.path) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(path = %page.path.display(), error = %e, "Skipping unreadable page");
                    continue;
                }
            };

            writer.start_file(page.file_name(), options)?;
            std::io::copy(&mut file, &mut writer)?;
        }

        match std::fs::read(&job.metadata_path) {
            Ok(metadata) => {
                writer.start_file(METADATA_FILE, options)?;
                writer.write_all(&metadata)?;
            }
            Err(e) => {
                tracing::warn!(
                    number = job.entry.number,
                    error = %e,
                    "Metadata missing from archive"
                );
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}
