//! Shared fixture builders for integration tests

#![allow(dead_code)]

use aegis::formats::png::{chunk_crc, PNG_SIGNATURE};

pub fn png_chunk(chunk_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(payload);
    out.extend_from_slice(&chunk_crc(chunk_type, payload).to_be_bytes());
    out
}

/// Minimal valid PNG with `extra` chunks inserted between IHDR and IDAT
pub fn png_with(width: u32, height: u32, extra: &[Vec<u8>]) -> Vec<u8> {
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut data = PNG_SIGNATURE.to_vec();
    data.extend(png_chunk(b"IHDR", &ihdr));
    for chunk in extra {
        data.extend_from_slice(chunk);
    }
    data.extend(png_chunk(b"IDAT", &[0x78, 0x9C, 0x63, 0x60, 0x00, 0x00]));
    data.extend(png_chunk(b"IEND", &[]));
    data
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    png_with(width, height, &[])
}

pub fn jpeg_segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, marker];
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Baseline JPEG (3x2, one component) with `after_frame` spliced in after SOF0
pub fn jpeg_with(after_frame: &[u8]) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend(jpeg_segment(
        0xE0,
        &[b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0],
    ));

    let mut dqt = vec![0x00];
    dqt.extend(1..=64u8);
    data.extend(jpeg_segment(0xDB, &dqt));

    data.extend(jpeg_segment(0xC0, &[8, 0, 2, 0, 3, 1, 1, 0x11, 0]));
    data.extend_from_slice(after_frame);
    data.extend(jpeg_segment(0xDA, &[1, 1, 0x00, 0, 63, 0]));
    data.extend((0..64u32).map(|i| ((i * 131 + 17) % 251) as u8));
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

pub fn jpeg() -> Vec<u8> {
    jpeg_with(&[])
}

/// GIF89a with one 1x1 frame; the logical screen carries the given size
pub fn gif(width: u16, height: u16) -> Vec<u8> {
    let mut data = b"GIF89a".to_vec();
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&[0x00, 0x00, 0x00]);
    data.extend_from_slice(&[0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0x00, 0x02, 0x02, 0x4C, 0x01, 0x00]);
    data.push(0x3B);
    data
}

/// Hex SHA-256 of `data`, as written in a hash list
pub fn sha256_hex(data: &[u8]) -> String {
    aegis::domain::entities::ContentDigest::of(data).to_hex()
}

/// 24-bit BMP with a BITMAPINFOHEADER and zeroed pixels
pub fn bmp(width: u32, height: u32) -> Vec<u8> {
    let row = (width as usize * 3).div_ceil(4) * 4;
    let pixels = row * height as usize;
    let file_size = (54 + pixels) as u32;

    let mut data = b"BM".to_vec();
    data.extend_from_slice(&file_size.to_le_bytes());
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&54u32.to_le_bytes());
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&(width as i32).to_le_bytes());
    data.extend_from_slice(&(height as i32).to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&24u16.to_le_bytes());
    data.extend_from_slice(&[0; 24]);
    data.extend(std::iter::repeat_n(0u8, pixels));
    data
}

/// Little-endian TIFF with one IFD holding only the dimension tags
pub fn tiff(width: u16, height: u16) -> Vec<u8> {
    let mut data = b"II*\0".to_vec();
    data.extend_from_slice(&8u32.to_le_bytes());
    data.extend_from_slice(&2u16.to_le_bytes());
    for (tag, value) in [(0x0100u16, width), (0x0101, height)] {
        data.extend_from_slice(&tag.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&value.to_le_bytes());
        data.extend_from_slice(&[0; 2]);
    }
    data.extend_from_slice(&0u32.to_le_bytes());
    data
}

/// Extended-format WebP carrying just a VP8X header
pub fn webp(width: u32, height: u32) -> Vec<u8> {
    let mut data = b"RIFF".to_vec();
    data.extend_from_slice(&22u32.to_le_bytes());
    data.extend_from_slice(b"WEBPVP8X");
    data.extend_from_slice(&10u32.to_le_bytes());
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    data.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
    data
}

/// Icon with one directory entry and a 40-byte image body
pub fn ico(width: u8, height: u8) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x01, 0x00];
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&[width, height, 0, 0]);
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&32u16.to_le_bytes());
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&22u32.to_le_bytes());
    data.extend_from_slice(&[0; 40]);
    data
}

/// Version 1 PSD with empty sections and raw image data
pub fn psd(width: u32, height: u32) -> Vec<u8> {
    let mut data = b"8BPS".to_vec();
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&[0; 6]);
    data.extend_from_slice(&3u16.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&8u16.to_be_bytes());
    data.extend_from_slice(&3u16.to_be_bytes());
    data.extend_from_slice(&[0; 12]);
    data.extend_from_slice(&0u16.to_be_bytes());
    data
}
