//! BMP header and declared-extent checks.

use super::{
    corrupt, find_nested_container, le_u16, le_u32, AnomalyKind, StructureReport, WalkResult,
};

pub const BMP_SIGNATURE: &[u8] = b"BM";

const FILE_HEADER_LEN: usize = 14;
const DIB_HEADER_SIZES: [u32; 7] = [12, 40, 52, 56, 64, 108, 124];
const BI_BITFIELDS: u32 = 3;

pub fn walk(data: &[u8], report: &mut StructureReport) -> WalkResult {
    let (Some(declared_size), Some(pixel_offset), Some(dib_size)) =
        (le_u32(data, 2), le_u32(data, 10), le_u32(data, 14))
    else {
        return Err(corrupt(0, "truncated BMP file header"));
    };
    report.visit(0)?;

    if !DIB_HEADER_SIZES.contains(&dib_size) {
        return Err(corrupt(
            FILE_HEADER_LEN,
            format!("unrecognised DIB header size {dib_size}"),
        ));
    }

    let header_end = FILE_HEADER_LEN + dib_size as usize;
    if header_end > data.len() {
        report.truncated(
            FILE_HEADER_LEN,
            "DIB header",
            dib_size as u64,
            data.len() - FILE_HEADER_LEN,
        );
        return Ok(());
    }

    let pixel_offset = pixel_offset as usize;
    if pixel_offset < header_end {
        return Err(corrupt(10, "pixel data offset points inside the headers"));
    }
    if pixel_offset > data.len() {
        report.truncated(10, "pixel data offset", pixel_offset as u64, data.len());
        return Ok(());
    }

    let expected_pixels = header_end + palette_len(data, dib_size);
    if pixel_offset > expected_pixels {
        let gap = &data[expected_pixels..pixel_offset];
        report.check_oversized(expected_pixels, gap.len() as u64, "gap before pixel data");
        if let Some((inner, what)) = find_nested_container(gap) {
            report.record(
                AnomalyKind::NestedContainer,
                expected_pixels + inner,
                format!("{what} hidden between headers and pixel data"),
            );
        }
    }

    let declared_size = declared_size as usize;
    if declared_size == 0 {
        return Ok(());
    }
    if declared_size > data.len() {
        report.truncated(2, "BMP file", declared_size as u64, data.len());
    } else {
        report.trailing(data, declared_size, "the declared BMP file size");
    }

    Ok(())
}

/// Bytes of color masks and palette expected between the DIB header and pixels.
fn palette_len(data: &[u8], dib_size: u32) -> usize {
    if dib_size == 12 {
        let bits = le_u16(data, 24).unwrap_or(24);
        return if bits <= 8 { 3 * (1usize << bits) } else { 0 };
    }

    let bits = le_u16(data, 28).unwrap_or(24);
    let compression = le_u32(data, 30).unwrap_or(0);
    let colors_used = le_u32(data, 46).unwrap_or(0) as usize;

    let masks = if dib_size == 40 && compression == BI_BITFIELDS {
        12
    } else {
        0
    };
    let entries = match (colors_used, bits) {
        (0, b) if b <= 8 => 1usize << b,
        (n, _) => n.min(1 << 16),
    };
    masks + entries * 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::WalkLimits;

    fn bmp(pixel_gap: usize) -> Vec<u8> {
        let pixels = 4 * 2 * 2;
        let offset = FILE_HEADER_LEN + 40 + pixel_gap;
        let total = offset + pixels;

        let mut data = BMP_SIGNATURE.to_vec();
        data.extend_from_slice(&(total as u32).to_le_bytes());
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&(offset as u32).to_le_bytes());
        data.extend_from_slice(&40u32.to_le_bytes());
        data.extend_from_slice(&2i32.to_le_bytes());
        data.extend_from_slice(&2i32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&32u16.to_le_bytes());
        data.extend_from_slice(&[0u8; 24]);
        data.extend(std::iter::repeat_n(0u8, pixel_gap));
        data.extend_from_slice(&[0x7F; 16]);
        data
    }

    fn walk_kinds(data: &[u8]) -> Vec<AnomalyKind> {
        let mut report = StructureReport::new(data.len(), WalkLimits::default());
        walk(data, &mut report).unwrap();
        report.anomalies().iter().map(|a| a.kind).collect()
    }

    #[test]
    fn consistent_bmp_is_clean() {
        assert!(walk_kinds(&bmp(0)).is_empty());
    }

    #[test]
    fn bytes_past_declared_size_are_trailing() {
        let mut data = bmp(0);
        data.extend_from_slice(b"MZ\x90\x00");
        assert_eq!(walk_kinds(&data), vec![AnomalyKind::TrailingData]);
    }

    #[test]
    fn declared_size_beyond_buffer_is_truncation() {
        let mut data = bmp(0);
        data.truncate(data.len() - 4);
        assert_eq!(walk_kinds(&data), vec![AnomalyKind::TruncatedBlock]);
    }

    #[test]
    fn large_gap_before_pixels_is_oversized() {
        assert_eq!(walk_kinds(&bmp(80_000)), vec![AnomalyKind::OversizedBlock]);
    }
}
