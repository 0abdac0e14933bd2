//! Byte-level knowledge of the supported image containers.
//!
//! Each submodule exposes a `walk` function that visits every block of its
//! container and records structural anomalies into a [`StructureReport`].
//! Walkers never panic on hostile input: all reads go through bounds-checked
//! helpers, and a block that cannot be parsed ends the walk with a
//! [`WalkError`].

pub mod bmp;
pub mod gif;
pub mod ico;
pub mod jpeg;
pub mod png;
pub mod psd;
pub mod tiff;
pub mod webp;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Image containers accepted by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    WebP,
    Ico,
    Psd,
}

/// Extensions accepted on the declared filename.
pub const SUPPORTED_EXTENSIONS: [&str; 9] =
    ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "ico", "psd"];

impl ImageFormat {
    pub const ALL: [ImageFormat; 8] = [
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Gif,
        ImageFormat::Bmp,
        ImageFormat::Tiff,
        ImageFormat::WebP,
        ImageFormat::Ico,
        ImageFormat::Psd,
    ];

    /// Maps a lowercase extension (without the dot) to its format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            "tiff" => Some(ImageFormat::Tiff),
            "webp" => Some(ImageFormat::WebP),
            "ico" => Some(ImageFormat::Ico),
            "psd" => Some(ImageFormat::Psd),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Ico => "image/vnd.microsoft.icon",
            ImageFormat::Psd => "image/vnd.adobe.photoshop",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Bmp => "BMP",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::WebP => "WebP",
            ImageFormat::Ico => "ICO",
            ImageFormat::Psd => "PSD",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of magic-byte sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    Image(ImageFormat),
    /// Recognised, but not an image container.
    Other(&'static str),
    Unknown,
}

impl Sniffed {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Sniffed::Image(format) => format.mime_type(),
            Sniffed::Other(mime) => mime,
            Sniffed::Unknown => "application/octet-stream",
        }
    }
}

const NON_IMAGE_MAGIC: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"Rar!\x1a\x07", "application/vnd.rar"),
    (b"\x1f\x8b", "application/gzip"),
    (b"\x7fELF", "application/x-elf"),
    (b"MZ", "application/x-msdownload"),
    (b"<?php", "application/x-httpd-php"),
    (b"<!DOCTYPE html", "text/html"),
    (b"<html", "text/html"),
    (b"<svg", "image/svg+xml"),
    (b"#!", "text/x-shellscript"),
];

/// Identifies the container from its leading bytes only.
///
/// The declared extension and any client-supplied content type are ignored.
pub fn sniff(data: &[u8]) -> Sniffed {
    if data.starts_with(&jpeg::JPEG_SOI_PREFIX) {
        Sniffed::Image(ImageFormat::Jpeg)
    } else if data.starts_with(&png::PNG_SIGNATURE) {
        Sniffed::Image(ImageFormat::Png)
    } else if data.starts_with(gif::GIF87A) || data.starts_with(gif::GIF89A) {
        Sniffed::Image(ImageFormat::Gif)
    } else if data.starts_with(tiff::TIFF_LE) || data.starts_with(tiff::TIFF_BE) {
        Sniffed::Image(ImageFormat::Tiff)
    } else if webp::is_webp(data) {
        Sniffed::Image(ImageFormat::WebP)
    } else if data.starts_with(psd::PSD_SIGNATURE) {
        Sniffed::Image(ImageFormat::Psd)
    } else if data.starts_with(&ico::ICO_HEADER) {
        Sniffed::Image(ImageFormat::Ico)
    } else if data.starts_with(bmp::BMP_SIGNATURE) {
        Sniffed::Image(ImageFormat::Bmp)
    } else {
        NON_IMAGE_MAGIC
            .iter()
            .find(|(magic, _)| data.starts_with(magic))
            .map(|(_, mime)| Sniffed::Other(mime))
            .unwrap_or(Sniffed::Unknown)
    }
}

/// Short human label for a payload found where no data was expected.
pub fn describe_payload(data: &[u8]) -> &'static str {
    match sniff(data) {
        Sniffed::Image(ImageFormat::Jpeg) => "embedded JPEG stream",
        Sniffed::Image(ImageFormat::Png) => "embedded PNG image",
        Sniffed::Image(_) => "embedded image container",
        Sniffed::Other("application/zip") => "ZIP archive",
        Sniffed::Other("application/pdf") => "PDF document",
        Sniffed::Other("application/vnd.rar") => "RAR archive",
        Sniffed::Other("application/x-elf") => "ELF executable",
        Sniffed::Other("application/x-msdownload") => "DOS/PE executable",
        Sniffed::Other("application/x-httpd-php") => "PHP script",
        Sniffed::Other("text/html") => "HTML document",
        Sniffed::Other(_) => "non-image payload",
        Sniffed::Unknown if data.iter().all(|&b| b == 0) => "zero padding",
        Sniffed::Unknown => "unrecognised data",
    }
}

/// Finds the first image or executable container embedded in `payload`.
pub fn find_nested_container(payload: &[u8]) -> Option<(usize, &'static str)> {
    if let Some(pos) = memchr::memmem::find(payload, &png::PNG_SIGNATURE) {
        return Some((pos, "PNG image"));
    }
    if let Some(pos) = jpeg::find_jpeg_stream(payload) {
        return Some((pos, "JPEG stream"));
    }
    None
}

/// Tunables shared by all structure walkers.
#[derive(Debug, Clone, Copy)]
pub struct WalkLimits {
    pub oversized_ratio: f64,
    pub oversized_min_bytes: u64,
    pub max_entries: usize,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            oversized_ratio: 0.5,
            oversized_min_bytes: 64 * 1024,
            max_entries: 4096,
        }
    }
}

/// Categories of structural anomaly a walker can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    /// Declared block length runs past the end of the buffer.
    TruncatedBlock,
    /// Metadata block implausibly large relative to the file.
    OversizedBlock,
    /// Bytes after the container's terminator.
    TrailingData,
    /// A block that must appear at most once appears again.
    DuplicateCritical,
    /// Another container nested inside a metadata block.
    NestedContainer,
    /// An offset chain that points back into itself.
    RecursiveReference,
    /// Stored checksum does not match the block content.
    ChecksumMismatch,
    /// The container ends without its terminating block.
    MissingTerminator,
    /// A structure that is itself a known exploit pattern.
    KnownExploit(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub offset: u64,
    pub detail: String,
}

/// Why a walk stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    Corrupt { offset: u64, detail: String },
    EntryLimit { offset: u64, limit: usize },
}

pub type WalkResult = std::result::Result<(), WalkError>;

pub(crate) fn corrupt(offset: usize, detail: impl Into<String>) -> WalkError {
    WalkError::Corrupt {
        offset: offset as u64,
        detail: detail.into(),
    }
}

/// Anomalies collected while walking one container.
#[derive(Debug)]
pub struct StructureReport {
    limits: WalkLimits,
    file_len: u64,
    entries: usize,
    anomalies: Vec<Anomaly>,
}

impl StructureReport {
    pub fn new(file_len: usize, limits: WalkLimits) -> Self {
        Self {
            limits,
            file_len: file_len as u64,
            entries: 0,
            anomalies: Vec::new(),
        }
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn into_anomalies(self) -> Vec<Anomaly> {
        self.anomalies
    }

    pub fn record(&mut self, kind: AnomalyKind, offset: usize, detail: impl Into<String>) {
        self.anomalies.push(Anomaly {
            kind,
            offset: offset as u64,
            detail: detail.into(),
        });
    }

    /// Counts one visited block, failing once the configured cap is hit.
    pub fn visit(&mut self, offset: usize) -> WalkResult {
        self.entries += 1;
        if self.entries > self.limits.max_entries {
            return Err(WalkError::EntryLimit {
                offset: offset as u64,
                limit: self.limits.max_entries,
            });
        }
        Ok(())
    }

    /// Fails when `queued` more blocks could not all be visited under the cap.
    pub fn check_queue(&self, offset: usize, queued: usize) -> WalkResult {
        if self.entries.saturating_add(queued) > self.limits.max_entries {
            return Err(WalkError::EntryLimit {
                offset: offset as u64,
                limit: self.limits.max_entries,
            });
        }
        Ok(())
    }

    pub fn is_oversized(&self, len: u64) -> bool {
        len >= self.limits.oversized_min_bytes
            && self.file_len > 0
            && len as f64 > self.file_len as f64 * self.limits.oversized_ratio
    }

    /// Records an oversize anomaly for a metadata block when it qualifies.
    pub fn check_oversized(&mut self, offset: usize, len: u64, label: &str) {
        if self.is_oversized(len) {
            let share = len as f64 * 100.0 / self.file_len as f64;
            self.record(
                AnomalyKind::OversizedBlock,
                offset,
                format!("{label} block of {len} bytes occupies {share:.0}% of the file"),
            );
        }
    }

    pub fn truncated(&mut self, offset: usize, label: &str, declared: u64, available: usize) {
        self.record(
            AnomalyKind::TruncatedBlock,
            offset,
            format!(
                "{label} declares {declared} bytes but only {available} remain in the buffer"
            ),
        );
    }

    /// Records trailing data starting at `end` if any exists.
    pub fn trailing(&mut self, data: &[u8], end: usize, terminator: &str) {
        if let Some(rest) = data.get(end..).filter(|rest| !rest.is_empty()) {
            self.record(
                AnomalyKind::TrailingData,
                end,
                format!(
                    "{} bytes of appended data after {terminator} ({})",
                    rest.len(),
                    describe_payload(rest)
                ),
            );
        }
    }
}

#[inline]
pub(crate) fn be_u16(data: &[u8], pos: usize) -> Option<u16> {
    let bytes = data.get(pos..pos.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub(crate) fn be_u32(data: &[u8], pos: usize) -> Option<u32> {
    let bytes = data.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub(crate) fn le_u16(data: &[u8], pos: usize) -> Option<u16> {
    let bytes = data.get(pos..pos.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub(crate) fn le_u32(data: &[u8], pos: usize) -> Option<u32> {
    let bytes = data.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Walks `data` as `format`, collecting anomalies into `report`.
pub fn walk(format: ImageFormat, data: &[u8], report: &mut StructureReport) -> WalkResult {
    match format {
        ImageFormat::Png => png::walk(data, report),
        ImageFormat::Jpeg => jpeg::walk(data, report),
        ImageFormat::Gif => gif::walk(data, report),
        ImageFormat::Bmp => bmp::walk(data, report),
        ImageFormat::WebP => webp::walk(data, report),
        ImageFormat::Tiff => tiff::walk(data, report),
        ImageFormat::Ico => ico::walk(data, report),
        ImageFormat::Psd => psd::walk(data, report),
    }
}
