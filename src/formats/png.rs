//! PNG chunk walker.

use super::{
    be_u32, corrupt, find_nested_container, AnomalyKind, StructureReport, WalkResult,
};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub const IEND_CHUNK_TYPE: &[u8; 4] = b"IEND";

const CHUNK_OVERHEAD: usize = 12;
const MAX_CHUNK_LENGTH: u32 = 0x7FFF_FFFF;

/// Chunks that may appear at most once in a well-formed stream.
const SINGLETON_CHUNKS: [&[u8; 4]; 9] = [
    b"IHDR", b"PLTE", b"gAMA", b"cHRM", b"sRGB", b"iCCP", b"pHYs", b"tIME", b"acTL",
];

/// Ancillary chunks that legitimately carry embedded images.
const THUMBNAIL_CHUNKS: [&[u8; 4]; 1] = [b"eXIf"];

#[derive(Debug, Clone, Copy)]
pub struct PngChunk<'a> {
    pub offset: usize,
    pub chunk_type: [u8; 4],
    pub payload: &'a [u8],
    pub stored_crc: u32,
}

impl PngChunk<'_> {
    /// Critical chunks have an uppercase first letter.
    #[inline]
    pub fn is_critical(&self) -> bool {
        self.chunk_type[0] & 0x20 == 0
    }

    pub fn crc_valid(&self) -> bool {
        chunk_crc(&self.chunk_type, self.payload) == self.stored_crc
    }

    pub fn end(&self) -> usize {
        self.offset + CHUNK_OVERHEAD + self.payload.len()
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.chunk_type).into_owned()
    }
}

pub fn chunk_crc(chunk_type: &[u8; 4], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(payload);
    hasher.finalize()
}

enum NextChunk<'a> {
    Chunk(PngChunk<'a>),
    Truncated { declared: u64, available: usize },
}

fn read_chunk(data: &[u8], pos: usize) -> Result<NextChunk<'_>, super::WalkError> {
    let available = data.len().saturating_sub(pos);
    let (Some(length), Some(type_bytes)) = (be_u32(data, pos), data.get(pos + 4..pos + 8)) else {
        return Ok(NextChunk::Truncated {
            declared: 8,
            available,
        });
    };

    if length > MAX_CHUNK_LENGTH {
        return Err(corrupt(
            pos,
            format!("chunk length {length} exceeds the PNG maximum"),
        ));
    }

    let chunk_type = [type_bytes[0], type_bytes[1], type_bytes[2], type_bytes[3]];
    if !chunk_type.iter().all(u8::is_ascii_alphabetic) {
        return Err(corrupt(pos + 4, "chunk type is not four ASCII letters"));
    }

    let payload_start = pos + 8;
    let payload_end = payload_start + length as usize;
    let (Some(payload), Some(stored_crc)) =
        (data.get(payload_start..payload_end), be_u32(data, payload_end))
    else {
        return Ok(NextChunk::Truncated {
            declared: length as u64 + CHUNK_OVERHEAD as u64,
            available,
        });
    };

    Ok(NextChunk::Chunk(PngChunk {
        offset: pos,
        chunk_type,
        payload,
        stored_crc,
    }))
}

pub fn walk(data: &[u8], report: &mut StructureReport) -> WalkResult {
    if !data.starts_with(&PNG_SIGNATURE) {
        return Err(corrupt(0, "missing PNG signature"));
    }

    let mut pos = PNG_SIGNATURE.len();
    let mut seen: Vec<[u8; 4]> = Vec::new();
    let mut crc_failures = 0usize;
    let mut first_crc_failure: Option<(usize, String)> = None;

    loop {
        if pos >= data.len() {
            report.record(
                AnomalyKind::MissingTerminator,
                pos,
                "PNG stream ends without an IEND chunk",
            );
            break;
        }
        report.visit(pos)?;

        let chunk = match read_chunk(data, pos)? {
            NextChunk::Chunk(chunk) => chunk,
            NextChunk::Truncated {
                declared,
                available,
            } => {
                report.truncated(pos, "chunk", declared, available);
                break;
            }
        };
        tracing::trace!(
            offset = pos,
            chunk = %chunk.name(),
            len = chunk.payload.len(),
            "png chunk"
        );

        if pos == PNG_SIGNATURE.len() && &chunk.chunk_type != b"IHDR" {
            return Err(corrupt(pos, "first chunk is not IHDR"));
        }

        if SINGLETON_CHUNKS.contains(&&chunk.chunk_type) && seen.contains(&chunk.chunk_type) {
            report.record(
                AnomalyKind::DuplicateCritical,
                pos,
                format!("{} chunk repeated; at most one is allowed", chunk.name()),
            );
        }
        seen.push(chunk.chunk_type);

        if !chunk.crc_valid() {
            crc_failures += 1;
            first_crc_failure.get_or_insert((pos, chunk.name()));
        }

        if !chunk.is_critical() {
            let label = format!("{} chunk", chunk.name());
            report.check_oversized(pos, chunk.payload.len() as u64, &label);

            if !THUMBNAIL_CHUNKS.contains(&&chunk.chunk_type) {
                if let Some((inner, what)) = find_nested_container(chunk.payload) {
                    report.record(
                        AnomalyKind::NestedContainer,
                        pos + 8 + inner,
                        format!("{what} nested inside {} chunk", chunk.name()),
                    );
                }
            }
        }

        pos = chunk.end();

        if &chunk.chunk_type == IEND_CHUNK_TYPE {
            report.trailing(data, pos, "IEND");
            break;
        }
    }

    if let Some((offset, name)) = first_crc_failure {
        report.record(
            AnomalyKind::ChecksumMismatch,
            offset,
            format!("{crc_failures} chunk CRC mismatch(es), first in {name}"),
        );
    }

    Ok(())
}
