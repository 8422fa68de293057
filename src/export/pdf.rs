//! PDF export.
//!
//! Each page image becomes one PDF page of the same pixel size. Grayscale
//! and RGB JPEG pages are embedded untouched with `DCTDecode`; every other
//! page, CMYK JPEGs included, is decoded and re-encoded as RGB JPEG first.

use crate::error::{AppError, Result};
use crate::export::{ExportJob, Exporter};
use crate::library::resolver::ResolvedPage;
use image::codecs::jpeg::JpegEncoder;
use lopdf::{Document, Object, Stream, dictionary};

/// Writes one image per PDF page.
pub struct PdfExporter {
    /// JPEG quality (1-100) for re-encoded pages.
    pub jpeg_quality: u8,
}

/// JPEG data ready to be embedded as an image XObject.
struct EmbeddedImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
    color_space: &'static str,
}

impl PdfExporter {
    /// Load a page as embeddable JPEG data.
    fn load_page(&self, page: &ResolvedPage) -> Result<EmbeddedImage> {
        let bytes = std::fs::read(&page.path)?;

        if page.format.is_jpeg()
            && let Some(header) = JpegHeader::parse(&bytes)
            && let Some(color_space) = header.color_space()
        {
            return Ok(EmbeddedImage {
                data: bytes,
                width: header.width,
                height: header.height,
                color_space,
            });
        }

        let img = image::load_from_memory_with_format(&bytes, page.format.image_format())?;
        let rgb = img.to_rgb8();

        let mut data = Vec::new();
        JpegEncoder::new_with_quality(&mut data, self.jpeg_quality).encode_image(&rgb)?;

        Ok(EmbeddedImage {
            data,
            width: rgb.width(),
            height: rgb.height(),
            color_space: "DeviceRGB",
        })
    }
}

/// Frame header of a JPEG file, as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegHeader {
    width: u32,
    height: u32,
    components: u8,
}

impl JpegHeader {
    /// Read the first start-of-frame segment.
    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.get(..2)? != [0xFF, 0xD8] {
            return None;
        }

        let mut pos = 2;
        loop {
            if *bytes.get(pos)? != 0xFF {
                return None;
            }
            while *bytes.get(pos)? == 0xFF {
                pos += 1;
            }
            let marker = *bytes.get(pos)?;
            pos += 1;

            match marker {
                // Standalone markers carry no length.
                0x01 | 0xD0..=0xD7 => continue,
                // Scan data or end of image before any frame header.
                0xD9 | 0xDA => return None,
                _ => {}
            }

            let length = usize::from(u16::from_be_bytes([
                *bytes.get(pos)?,
                *bytes.get(pos + 1)?,
            ]));
            if length < 2 {
                return None;
            }

            if matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
                let frame = bytes.get(pos + 2..pos + 8)?;
                let height = u32::from(u16::from_be_bytes([frame[1], frame[2]]));
                let width = u32::from(u16::from_be_bytes([frame[3], frame[4]]));
                return Some(Self {
                    width,
                    height,
                    components: frame[5],
                });
            }

            pos += length;
        }
    }

    /// PDF colour space for embedding the data as-is, if it can be.
    fn color_space(&self) -> Option<&'static str> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        match self.components {
            1 => Some("DeviceGray"),
            3 => Some("DeviceRGB"),
            _ => None,
        }
    }
}

impl Exporter for PdfExporter {
    fn export(&self, job: &ExportJob) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(job.pages.len());

        for page in &job.pages {
            let image = match self.load_page(page) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(path = %page.path.display(), error = %e, "Skipping undecodable page");
                    continue;
                }
            };

            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => image.color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                image.data,
            ));

            // Page dimensions in points, one point per pixel
            let width = image.width as f32;
            let height = image.height as f32;

            let content = format!("q {} 0 0 {} 0 0 cm /Im1 Do Q", width, height);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {
                    "XObject" => dictionary! {
                        "Im1" => Object::Reference(image_id),
                    },
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let title = job
            .entry
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", job.entry.number));
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal("manga-rs".to_string()),
        });
        doc.trailer.set("Info", Object::Reference(info_id));

        let mut pdf_bytes = Vec::new();
        doc.save_to(&mut pdf_bytes)
            .map_err(|e| AppError::Pdf(format!("Failed to save PDF: {}", e)))?;

        Ok(pdf_bytes)
    }
}
