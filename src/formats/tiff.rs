//! TIFF IFD chain walker.
//!
//! Follows the main IFD chain plus the EXIF, GPS, interoperability and SubIFD
//! pointers. Every IFD offset is visited at most once; an offset seen twice is
//! a reference loop, which is how recursive TIFF bombs are built.

use std::collections::HashSet;

use super::{corrupt, AnomalyKind, StructureReport, WalkResult};

pub const TIFF_LE: &[u8] = b"II*\0";
pub const TIFF_BE: &[u8] = b"MM\0*";

const HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 12;

const TAG_SUB_IFDS: u16 = 0x014A;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_INTEROP_IFD: u16 = 0xA005;
const METADATA_TAGS: [(u16, &str); 4] = [
    (0x02BC, "XMP packet"),
    (0x83BB, "IPTC record"),
    (0x8649, "Photoshop resource"),
    (0x8773, "ICC profile"),
];

#[derive(Clone, Copy)]
struct Endian {
    little: bool,
}

impl Endian {
    fn u16(&self, data: &[u8], pos: usize) -> Option<u16> {
        if self.little {
            super::le_u16(data, pos)
        } else {
            super::be_u16(data, pos)
        }
    }

    fn u32(&self, data: &[u8], pos: usize) -> Option<u32> {
        if self.little {
            super::le_u32(data, pos)
        } else {
            super::be_u32(data, pos)
        }
    }
}

fn type_size(field_type: u16) -> u64 {
    match field_type {
        1 | 2 | 6 | 7 => 1,
        3 | 8 => 2,
        4 | 9 | 11 | 13 => 4,
        5 | 10 | 12 => 8,
        _ => 1,
    }
}

type Pending = Vec<(u32, &'static str)>;

/// Queues a non-null IFD offset, refusing to grow past what the visit cap allows
fn enqueue(
    pending: &mut Pending,
    report: &StructureReport,
    at: usize,
    offset: u32,
    label: &'static str,
) -> WalkResult {
    if offset == 0 {
        return Ok(());
    }
    report.check_queue(at, pending.len() + 1)?;
    pending.push((offset, label));
    Ok(())
}

pub fn walk(data: &[u8], report: &mut StructureReport) -> WalkResult {
    let endian = if data.starts_with(TIFF_LE) {
        Endian { little: true }
    } else if data.starts_with(TIFF_BE) {
        Endian { little: false }
    } else {
        return Err(corrupt(0, "missing TIFF byte-order header"));
    };

    let Some(first) = endian.u32(data, 4) else {
        return Err(corrupt(4, "truncated TIFF header"));
    };

    let mut pending = Pending::new();
    enqueue(&mut pending, report, 4, first, "IFD0")?;
    let mut visited: HashSet<u32> = HashSet::new();

    while let Some((offset, label)) = pending.pop() {
        let pos = offset as usize;
        report.visit(pos)?;

        if pos < HEADER_LEN {
            return Err(corrupt(pos, format!("{label} offset points into the TIFF header")));
        }
        if !visited.insert(offset) {
            report.record(
                AnomalyKind::RecursiveReference,
                pos,
                format!("{label} at offset {offset} was already visited; IFD chain loops"),
            );
            continue;
        }

        let Some(count) = endian.u16(data, pos) else {
            report.truncated(pos, label, 2, data.len().saturating_sub(pos));
            continue;
        };
        let entries_end = pos + 2 + count as usize * ENTRY_LEN;
        if entries_end + 4 > data.len() {
            report.truncated(
                pos,
                &format!("{label} with {count} entries"),
                (entries_end + 4 - pos) as u64,
                data.len().saturating_sub(pos),
            );
            continue;
        }

        for entry in (pos + 2..entries_end).step_by(ENTRY_LEN) {
            let (Some(tag), Some(field_type), Some(value_count), Some(value)) = (
                endian.u16(data, entry),
                endian.u16(data, entry + 2),
                endian.u32(data, entry + 4),
                endian.u32(data, entry + 8),
            ) else {
                break;
            };
            let byte_len = type_size(field_type) * value_count as u64;

            if byte_len > 4 && value as u64 + byte_len > data.len() as u64 {
                report.truncated(
                    entry,
                    &format!("tag 0x{tag:04X} value"),
                    byte_len,
                    data.len().saturating_sub(value as usize),
                );
            }

            if let Some((_, what)) = METADATA_TAGS.iter().find(|(t, _)| *t == tag) {
                report.check_oversized(entry, byte_len, what);
            }

            match tag {
                TAG_EXIF_IFD => enqueue(&mut pending, report, entry, value, "EXIF IFD")?,
                TAG_GPS_IFD => enqueue(&mut pending, report, entry, value, "GPS IFD")?,
                TAG_INTEROP_IFD => {
                    enqueue(&mut pending, report, entry, value, "interoperability IFD")?
                }
                TAG_SUB_IFDS if value_count == 1 => {
                    enqueue(&mut pending, report, entry, value, "SubIFD")?
                }
                TAG_SUB_IFDS => {
                    for i in 0..value_count.min(64) as usize {
                        if let Some(sub) = endian.u32(data, value as usize + i * 4) {
                            enqueue(&mut pending, report, entry, sub, "SubIFD")?;
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(next) = endian.u32(data, entries_end) {
            enqueue(&mut pending, report, entries_end, next, "next IFD")?;
        }
    }

    Ok(())
}
