//! Format validation service
//!
//! Confirms the declared extension, the sniffed content type and the parsed
//! container header agree before any detector touches the bytes.

use crate::core::RejectionReason;
use crate::domain::entities::{Dimensions, Finding, Severity, Stage};
use crate::formats::{self, ImageFormat, Sniffed, SUPPORTED_EXTENSIONS};

pub const EXTENSION_MISMATCH_RULE: &str = "format.extension-mismatch";

/// Outcome of a successful validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCheck {
    /// Format sniffed from magic bytes
    pub format: ImageFormat,
    pub mime: &'static str,
    pub dimensions: Dimensions,
    pub declared_extension: String,
}

impl FormatCheck {
    /// Warning raised when the extension names a different image format
    pub fn extension_mismatch(&self) -> Option<Finding> {
        let declared = ImageFormat::from_extension(&self.declared_extension)?;
        (declared != self.format).then(|| {
            Finding::new(
                EXTENSION_MISMATCH_RULE,
                Stage::Format,
                Severity::Warning,
                format!(
                    "declared .{} ({}) but content is {}",
                    self.declared_extension, declared, self.format
                ),
            )
        })
    }
}

/// Byte-level format gate
#[derive(Debug, Clone)]
pub struct FormatValidator {
    max_file_size: u64,
}

impl FormatValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Validates `data` against its declared (lowercased, dotless) extension
    ///
    /// Pure function of its inputs. Only magic bytes decide the format; the
    /// extension is checked against the supported set and otherwise only
    /// compared.
    pub fn validate(
        &self,
        data: &[u8],
        declared_extension: &str,
    ) -> Result<FormatCheck, RejectionReason> {
        if data.is_empty() {
            return Err(RejectionReason::EmptyInput);
        }
        if !SUPPORTED_EXTENSIONS.contains(&declared_extension) {
            return Err(RejectionReason::UnsupportedExtension {
                extension: declared_extension.to_string(),
            });
        }
        let size = data.len() as u64;
        if size > self.max_file_size {
            return Err(RejectionReason::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }

        let format = match formats::sniff(data) {
            Sniffed::Image(format) => format,
            other => {
                return Err(RejectionReason::MimeMismatch {
                    detected: other.mime_type().to_string(),
                })
            }
        };

        let size = imagesize::blob_size(data).map_err(|e| RejectionReason::CorruptContainer {
            format,
            detail: e.to_string(),
        })?;
        if size.width == 0 || size.height == 0 {
            return Err(RejectionReason::CorruptContainer {
                format,
                detail: format!("header declares {}x{} pixels", size.width, size.height),
            });
        }

        Ok(FormatCheck {
            format,
            mime: format.mime_type(),
            dimensions: Dimensions {
                width: size.width,
                height: size.height,
            },
            declared_extension: declared_extension.to_string(),
        })
    }
}
