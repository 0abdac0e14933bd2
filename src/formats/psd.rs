//! PSD/PSB section walker.

use super::{be_u16, be_u32, corrupt, AnomalyKind, StructureReport, WalkResult};

pub const PSD_SIGNATURE: &[u8] = b"8BPS";

const HEADER_LEN: usize = 26;
const RESOURCE_SIGNATURE: &[u8] = b"8BIM";

fn be_u64(data: &[u8], pos: usize) -> Option<u64> {
    let bytes = data.get(pos..pos.checked_add(8)?)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_be_bytes(buf))
}

pub fn walk(data: &[u8], report: &mut StructureReport) -> WalkResult {
    let Some(version) = be_u16(data, 4).filter(|_| data.len() >= HEADER_LEN) else {
        return Err(corrupt(0, "truncated PSD header"));
    };
    let large_document = match version {
        1 => false,
        2 => true,
        other => return Err(corrupt(4, format!("unknown PSD version {other}"))),
    };

    let mut pos = HEADER_LEN;
    let sections = [
        ("color mode data", false),
        ("image resources", false),
        ("layer and mask information", large_document),
    ];

    for (label, wide) in sections {
        report.visit(pos)?;
        let (len, header) = if wide {
            (be_u64(data, pos), 8)
        } else {
            (be_u32(data, pos).map(u64::from), 4)
        };
        let Some(len) = len else {
            report.truncated(
                pos,
                &format!("{label} length"),
                header as u64,
                data.len().saturating_sub(pos),
            );
            return Ok(());
        };

        let body = pos + header;
        let end = body as u64 + len;
        if end > data.len() as u64 {
            report.truncated(
                pos,
                &format!("{label} section"),
                len,
                data.len().saturating_sub(body),
            );
            return Ok(());
        }
        let end = end as usize;

        if label == "image resources" {
            walk_resources(&data[body..end], body, report)?;
        }
        report.check_oversized(pos, len, label);
        pos = end;
    }

    if be_u16(data, pos).is_none() {
        report.truncated(
            pos,
            "image data compression field",
            2,
            data.len().saturating_sub(pos),
        );
    }
    Ok(())
}

fn walk_resources(block: &[u8], base: usize, report: &mut StructureReport) -> WalkResult {
    let mut pos = 0usize;
    let mut seen: Vec<u16> = Vec::new();

    while pos < block.len() {
        report.visit(base + pos)?;
        if block.get(pos..pos + 4) != Some(RESOURCE_SIGNATURE) {
            return Err(corrupt(base + pos, "image resource block lacks 8BIM signature"));
        }
        let Some(id) = be_u16(block, pos + 4) else {
            report.truncated(base + pos, "image resource header", 6, block.len() - pos);
            return Ok(());
        };

        // Pascal string name, padded to an even total length
        let Some(&name_len) = block.get(pos + 6) else {
            report.truncated(base + pos, "image resource name", 1, 0);
            return Ok(());
        };
        let name_total = (1 + name_len as usize + 1) & !1;
        let size_at = pos + 6 + name_total;
        let Some(size) = be_u32(block, size_at) else {
            report.truncated(
                base + pos,
                "image resource size",
                4,
                block.len().saturating_sub(size_at),
            );
            return Ok(());
        };

        let data_start = size_at + 4;
        let data_end = data_start as u64 + size as u64;
        if data_end > block.len() as u64 {
            report.truncated(
                base + pos,
                &format!("image resource 0x{id:04X}"),
                size as u64,
                block.len().saturating_sub(data_start),
            );
            return Ok(());
        }

        if seen.contains(&id) {
            report.record(
                AnomalyKind::DuplicateCritical,
                base + pos,
                format!("image resource 0x{id:04X} repeated"),
            );
        }
        seen.push(id);
        report.check_oversized(base + pos, size as u64, &format!("image resource 0x{id:04X}"));

        pos = data_start + size as usize + (size as usize & 1);
    }
    Ok(())
}
