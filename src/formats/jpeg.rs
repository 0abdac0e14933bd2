//! JPEG marker/segment walker.

use memchr::memmem;

use super::{be_u16, corrupt, AnomalyKind, StructureReport, WalkResult};

pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
pub const JPEG_SOI_PREFIX: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// COM segment with length 0: the GDI+ length underflow (MS04-028).
pub const COM_LENGTH_ZERO_RULE: &str = "jpeg-com-zero-length";
/// COM segment with length 1: same underflow, alternate encoding.
pub const COM_LENGTH_ONE_RULE: &str = "jpeg-com-length-one";

const MARKER_COM: u8 = 0xFE;
const MARKER_SOS: u8 = 0xDA;

#[inline]
pub fn is_sof_marker(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

#[inline]
fn is_standalone_marker(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD7)
}

#[inline]
fn is_metadata_marker(marker: u8) -> bool {
    matches!(marker, 0xE0..=0xEF) || marker == MARKER_COM
}

/// Offset of the first JPEG stream start (SOI followed by a segment marker).
pub fn find_jpeg_stream(data: &[u8]) -> Option<usize> {
    memmem::find_iter(data, &JPEG_SOI_PREFIX)
        .find(|&pos| matches!(data.get(pos + 3), Some(0xE0..=0xEF | 0xDB | 0xFE)))
}

fn count_jpeg_streams(data: &[u8]) -> usize {
    memmem::find_iter(data, &JPEG_SOI_PREFIX)
        .filter(|&pos| matches!(data.get(pos + 3), Some(0xE0..=0xEF | 0xDB | 0xFE)))
        .count()
}

/// Skips entropy-coded scan data, returning the offset of the next marker.
fn skip_entropy_coded(data: &[u8], mut pos: usize) -> usize {
    loop {
        let Some(found) = data.get(pos..).and_then(|rest| memchr::memchr(0xFF, rest)) else {
            return data.len();
        };
        let at = pos + found;
        match data.get(at + 1) {
            None => return at,
            Some(0x00) | Some(0xD0..=0xD7) => pos = at + 2,
            Some(0xFF) => pos = at + 1,
            Some(_) => return at,
        }
    }
}

/// Offsets of the marker segments reachable by walking the segment chain.
///
/// The walk ends at EOI or at the first segment whose length field is
/// unusable; that segment is still included.
pub fn segment_offsets(data: &[u8]) -> Vec<usize> {
    let mut offsets = Vec::new();
    if !data.starts_with(&JPEG_SOI) {
        return offsets;
    }

    let mut pos = JPEG_SOI.len();
    while data.get(pos) == Some(&0xFF) {
        while data.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        let Some(&marker) = data.get(pos + 1) else {
            break;
        };
        match marker {
            0xD9 | 0x00 => break,
            0xD8 => {
                pos += 2;
                continue;
            }
            m if is_standalone_marker(m) => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        offsets.push(pos);
        let Some(seg_len) = be_u16(data, pos + 2).filter(|&len| len >= 2) else {
            break;
        };
        pos += 2 + seg_len as usize;
        if marker == MARKER_SOS {
            pos = skip_entropy_coded(data, pos);
        }
    }
    offsets
}

pub fn walk(data: &[u8], report: &mut StructureReport) -> WalkResult {
    if !data.starts_with(&JPEG_SOI) {
        return Err(corrupt(0, "missing JPEG SOI marker"));
    }

    let mut pos = JPEG_SOI.len();
    let mut frames = 0usize;
    let mut metadata_bytes = 0u64;
    let mut embedded_streams = 0usize;

    loop {
        let Some(&byte) = data.get(pos) else {
            report.record(
                AnomalyKind::MissingTerminator,
                pos,
                "JPEG stream ends without an EOI marker",
            );
            break;
        };
        if byte != 0xFF {
            return Err(corrupt(
                pos,
                format!("expected a marker, found byte 0x{byte:02X}"),
            ));
        }
        while data.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        let Some(&marker) = data.get(pos + 1) else {
            report.record(
                AnomalyKind::MissingTerminator,
                pos,
                "JPEG stream ends without an EOI marker",
            );
            break;
        };
        report.visit(pos)?;

        match marker {
            0xD9 => {
                report.trailing(data, pos + JPEG_EOI.len(), "EOI");
                break;
            }
            0xD8 => {
                report.record(
                    AnomalyKind::NestedContainer,
                    pos,
                    "SOI marker repeated inside the stream",
                );
                pos += 2;
                continue;
            }
            m if is_standalone_marker(m) => {
                pos += 2;
                continue;
            }
            0x00 => return Err(corrupt(pos, "stuffed byte outside entropy-coded data")),
            _ => {}
        }

        let Some(seg_len) = be_u16(data, pos + 2) else {
            report.truncated(pos, "segment header", 2, data.len().saturating_sub(pos + 2));
            break;
        };

        if seg_len < 2 {
            if marker == MARKER_COM {
                let rule = if seg_len == 0 {
                    COM_LENGTH_ZERO_RULE
                } else {
                    COM_LENGTH_ONE_RULE
                };
                report.record(
                    AnomalyKind::KnownExploit(rule),
                    pos,
                    format!("COM segment length {seg_len} underflows the length field"),
                );
            }
            return Err(corrupt(
                pos,
                format!("segment 0x{marker:02X} has invalid length {seg_len}"),
            ));
        }

        let seg_end = pos + 2 + seg_len as usize;
        let Some(payload) = data.get(pos + 4..seg_end) else {
            report.truncated(
                pos,
                &format!("segment 0x{marker:02X}"),
                seg_len as u64,
                data.len().saturating_sub(pos + 2),
            );
            break;
        };

        if is_sof_marker(marker) {
            frames += 1;
            if frames > 1 {
                report.record(
                    AnomalyKind::DuplicateCritical,
                    pos,
                    format!("additional frame header SOF 0x{marker:02X}"),
                );
            }
        } else if is_metadata_marker(marker) {
            metadata_bytes += seg_len as u64;
            embedded_streams += count_jpeg_streams(payload);
        }

        pos = seg_end;
        if marker == MARKER_SOS {
            pos = skip_entropy_coded(data, pos);
        }
    }

    if embedded_streams > 1 {
        report.record(
            AnomalyKind::NestedContainer,
            JPEG_SOI.len(),
            format!("{embedded_streams} JPEG streams embedded in metadata segments"),
        );
    }
    report.check_oversized(JPEG_SOI.len(), metadata_bytes, "APPn/COM metadata");

    Ok(())
}
