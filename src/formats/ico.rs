//! ICO directory walker.

use super::{corrupt, le_u16, le_u32, AnomalyKind, StructureReport, WalkResult};

pub const ICO_HEADER: [u8; 4] = [0x00, 0x00, 0x01, 0x00];

const DIRECTORY_HEADER_LEN: usize = 6;
const ENTRY_LEN: usize = 16;

pub fn walk(data: &[u8], report: &mut StructureReport) -> WalkResult {
    let Some(count) = le_u16(data, 4) else {
        return Err(corrupt(0, "truncated icon directory header"));
    };
    if count == 0 {
        return Err(corrupt(4, "icon directory has no entries"));
    }

    let directory_end = DIRECTORY_HEADER_LEN + count as usize * ENTRY_LEN;
    if directory_end > data.len() {
        report.truncated(
            DIRECTORY_HEADER_LEN,
            &format!("icon directory of {count} entries"),
            (directory_end - DIRECTORY_HEADER_LEN) as u64,
            data.len() - DIRECTORY_HEADER_LEN,
        );
        return Ok(());
    }

    let mut extents: Vec<(u64, u64, usize)> = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        let entry = DIRECTORY_HEADER_LEN + index * ENTRY_LEN;
        report.visit(entry)?;

        let (Some(size), Some(offset)) = (le_u32(data, entry + 8), le_u32(data, entry + 12)) else {
            break;
        };
        let (start, end) = (offset as u64, offset as u64 + size as u64);

        if (start as usize) < directory_end {
            return Err(corrupt(
                entry,
                format!("icon image {index} overlaps the directory"),
            ));
        }
        if end > data.len() as u64 {
            report.truncated(
                entry,
                &format!("icon image {index}"),
                size as u64,
                data.len().saturating_sub(start as usize),
            );
            continue;
        }
        extents.push((start, end, index));
    }

    extents.sort_unstable();
    for pair in extents.windows(2) {
        let ((_, first_end, first), (second_start, _, second)) = (pair[0], pair[1]);
        if second_start < first_end {
            report.record(
                AnomalyKind::DuplicateCritical,
                second_start as usize,
                format!("icon images {first} and {second} share the same bytes"),
            );
        }
    }

    if let Some(last_end) = extents.iter().map(|&(_, end, _)| end).max() {
        report.trailing(data, last_end as usize, "the last icon image");
    }

    Ok(())
}
