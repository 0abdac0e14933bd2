//! RIFF/WebP chunk walker.

use super::{corrupt, find_nested_container, le_u32, AnomalyKind, StructureReport, WalkResult};

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Chunks that may appear at most once per file.
const SINGLETON_CHUNKS: [&[u8; 4]; 5] = [b"VP8X", b"ICCP", b"EXIF", b"XMP ", b"ANIM"];
const METADATA_CHUNKS: [&[u8; 4]; 3] = [b"ICCP", b"EXIF", b"XMP "];

pub fn is_webp(data: &[u8]) -> bool {
    data.len() >= RIFF_HEADER_LEN && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

pub fn walk(data: &[u8], report: &mut StructureReport) -> WalkResult {
    if !is_webp(data) {
        return Err(corrupt(0, "missing RIFF/WEBP header"));
    }
    let riff_size = le_u32(data, 4).unwrap_or(0) as usize;
    let declared_end = CHUNK_HEADER_LEN + riff_size;
    let limit = declared_end.min(data.len());

    let mut pos = RIFF_HEADER_LEN;
    let mut seen: Vec<[u8; 4]> = Vec::new();
    let mut bitstreams = 0usize;
    let mut animated = false;

    while pos < limit {
        report.visit(pos)?;
        let (Some(fourcc), Some(size)) = (data.get(pos..pos + 4), le_u32(data, pos + 4)) else {
            report.truncated(pos, "RIFF chunk header", CHUNK_HEADER_LEN as u64, limit - pos);
            break;
        };
        let fourcc = [fourcc[0], fourcc[1], fourcc[2], fourcc[3]];
        if !fourcc.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(corrupt(pos, "RIFF chunk identifier is not printable ASCII"));
        }

        let name = String::from_utf8_lossy(&fourcc).into_owned();
        let payload_start = pos + CHUNK_HEADER_LEN;
        let Some(payload) = data.get(payload_start..payload_start + size as usize) else {
            report.truncated(
                pos,
                &format!("{} chunk", name.trim_end()),
                size as u64,
                data.len() - payload_start.min(data.len()),
            );
            break;
        };

        if SINGLETON_CHUNKS.contains(&&fourcc) && seen.contains(&fourcc) {
            report.record(
                AnomalyKind::DuplicateCritical,
                pos,
                format!("{} chunk repeated; at most one is allowed", name.trim_end()),
            );
        }
        seen.push(fourcc);

        match &fourcc {
            b"VP8 " | b"VP8L" => bitstreams += 1,
            b"ANIM" => animated = true,
            f if METADATA_CHUNKS.contains(&f) => {
                report.check_oversized(pos, size as u64, &format!("{} chunk", name.trim_end()));
            }
            b"VP8X" | b"ALPH" | b"ANMF" => {}
            _ => {
                if let Some((inner, what)) = find_nested_container(payload) {
                    report.record(
                        AnomalyKind::NestedContainer,
                        payload_start + inner,
                        format!("{what} nested inside unknown {} chunk", name.trim_end()),
                    );
                }
            }
        }

        // chunks are padded to an even length
        pos = payload_start + size as usize + (size as usize & 1);
    }

    if bitstreams > 1 && !animated {
        report.record(
            AnomalyKind::DuplicateCritical,
            RIFF_HEADER_LEN,
            format!("{bitstreams} image bitstreams in a still WebP"),
        );
    }

    if declared_end > data.len() {
        report.truncated(4, "RIFF container", riff_size as u64, data.len() - CHUNK_HEADER_LEN);
    } else {
        report.trailing(data, declared_end, "the RIFF container");
    }

    Ok(())
}
