use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Self-hosted manga and doujinshi library server.
#[derive(Parser, Debug, Clone)]
#[command(name = "manga-rs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "MANGA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long, env = "MANGA_BIND")]
        bind: Option<SocketAddr>,

        /// Library root directory (one numbered folder per entry).
        #[arg(short, long, env = "MANGA_DIR")]
        root: Option<PathBuf>,
    },

    /// Build the catalog once and print a summary.
    Scan {
        /// Library root directory.
        #[arg(short, long, env = "MANGA_DIR")]
        root: Option<PathBuf>,
    },

    /// Create a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Library location.
    #[serde(default)]
    pub library: LibraryConfig,

    /// Scan configuration.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Export configuration.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        5173,
    )
}

/// Library configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root directory holding one numbered folder per entry.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("manga")
}

/// Scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of parallel workers validating entries (1 = sequential).
    /// Keep low for NAS/network storage to avoid saturation.
    #[serde(default = "default_scan_workers")]
    pub workers: usize,

    /// Whether to sum the on-disk size of the library on every build.
    #[serde(default = "default_compute_size")]
    pub compute_size: bool,

    /// Rescan interval in seconds (0 to disable).
    #[serde(default)]
    pub interval_seconds: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_scan_workers(),
            compute_size: default_compute_size(),
            interval_seconds: 0,
        }
    }
}

fn default_scan_workers() -> usize {
    1 // Sequential by default - safe for NAS/Raspberry Pi
}

fn default_compute_size() -> bool {
    true
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// JPEG quality (1-100) for pages re-encoded into PDF exports.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_jpeg_quality() -> u8 {
    90
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("manga-rs.toml"),
            dirs::config_dir()
                .map(|p| p.join("manga-rs").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/manga-rs/config.toml"),
        ];

        candidates
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# manga-rs configuration

[server]
bind = "0.0.0.0:5173"

[library]
# Folder with 1/, 2/, ... each holding meta.json and 1.jpg, 2.jpg, ...
root = "manga"

[scan]
# Parallel workers validating entries (keep at 1 for NAS storage)
workers = 1
# Sum the on-disk size of the library on every build
compute_size = true
# Rescan interval in seconds (0 to disable)
interval_seconds = 0

[export]
# JPEG quality for non-JPEG pages embedded into PDF exports
jpeg_quality = 90
"#
        .to_string()
    }
}

/// Page image formats, in resolution precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageFormat {
    /// JPEG with the `.jpg` extension.
    Jpg,
    /// JPEG with the `.jpeg` extension.
    Jpeg,
    /// PNG image.
    Png,
    /// WebP image.
    Webp,
    /// GIF image.
    Gif,
    /// BMP image.
    Bmp,
}

impl PageFormat {
    /// Extension trial order shared by every page lookup.
    pub const PRECEDENCE: [PageFormat; 6] = [
        PageFormat::Jpg,
        PageFormat::Jpeg,
        PageFormat::Png,
        PageFormat::Webp,
        PageFormat::Gif,
        PageFormat::Bmp,
    ];

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            PageFormat::Jpg => "jpg",
            PageFormat::Jpeg => "jpeg",
            PageFormat::Png => "png",
            PageFormat::Webp => "webp",
            PageFormat::Gif => "gif",
            PageFormat::Bmp => "bmp",
        }
    }

    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            PageFormat::Jpg | PageFormat::Jpeg => "image/jpeg",
            PageFormat::Png => "image/png",
            PageFormat::Webp => "image/webp",
            PageFormat::Gif => "image/gif",
            PageFormat::Bmp => "image/bmp",
        }
    }

    /// Whether the page can be embedded into a PDF without re-encoding.
    pub fn is_jpeg(&self) -> bool {
        matches!(self, PageFormat::Jpg | PageFormat::Jpeg)
    }

    /// Matching decoder format for the `image` crate.
    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            PageFormat::Jpg | PageFormat::Jpeg => image::ImageFormat::Jpeg,
            PageFormat::Png => image::ImageFormat::Png,
            PageFormat::Webp => image::ImageFormat::WebP,
            PageFormat::Gif => image::ImageFormat::Gif,
            PageFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}
