//! GIF block walker.

use super::{corrupt, find_nested_container, AnomalyKind, StructureReport, WalkResult};

pub const GIF87A: &[u8] = b"GIF87a";
pub const GIF89A: &[u8] = b"GIF89a";

const HEADER_LEN: usize = 13;
const IMAGE_DESCRIPTOR_LEN: usize = 10;

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_SEPARATOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;
const COMMENT_LABEL: u8 = 0xFE;
const APPLICATION_LABEL: u8 = 0xFF;

fn color_table_len(flags: u8) -> usize {
    if flags & 0x80 == 0 {
        0
    } else {
        3 * (1usize << ((flags & 0x07) + 1))
    }
}

/// Walks a chain of data sub-blocks starting at `pos`.
///
/// Returns the offset after the block terminator and the payload bytes seen,
/// or `None` if the chain ran off the end of the buffer.
fn sub_blocks(
    data: &[u8],
    mut pos: usize,
    report: &mut StructureReport,
) -> Option<(usize, Vec<u8>)> {
    let mut payload = Vec::new();
    loop {
        let Some(&size) = data.get(pos) else {
            report.truncated(pos, "data sub-block chain", 1, 0);
            return None;
        };
        if size == 0 {
            return Some((pos + 1, payload));
        }
        let Some(block) = data.get(pos + 1..pos + 1 + size as usize) else {
            report.truncated(
                pos,
                "data sub-block",
                size as u64,
                data.len().saturating_sub(pos + 1),
            );
            return None;
        };
        payload.extend_from_slice(block);
        pos += 1 + size as usize;
    }
}

/// Like [`sub_blocks`] but without collecting the payload (image data).
fn skip_sub_blocks(data: &[u8], mut pos: usize, report: &mut StructureReport) -> Option<usize> {
    loop {
        let Some(&size) = data.get(pos) else {
            report.truncated(pos, "image data sub-block chain", 1, 0);
            return None;
        };
        if size == 0 {
            return Some(pos + 1);
        }
        let next = pos + 1 + size as usize;
        if next > data.len() {
            report.truncated(
                pos,
                "image data sub-block",
                size as u64,
                data.len().saturating_sub(pos + 1),
            );
            return None;
        }
        pos = next;
    }
}

pub fn walk(data: &[u8], report: &mut StructureReport) -> WalkResult {
    let Some(&screen_flags) = data.get(10).filter(|_| data.len() >= HEADER_LEN) else {
        return Err(corrupt(0, "truncated logical screen descriptor"));
    };

    let mut pos = HEADER_LEN + color_table_len(screen_flags);
    if pos > data.len() {
        report.truncated(
            HEADER_LEN,
            "global color table",
            color_table_len(screen_flags) as u64,
            data.len() - HEADER_LEN,
        );
        return Ok(());
    }

    let mut comment_bytes = 0u64;

    loop {
        let Some(&introducer) = data.get(pos) else {
            report.record(
                AnomalyKind::MissingTerminator,
                pos,
                "GIF stream ends without a trailer",
            );
            break;
        };
        report.visit(pos)?;

        match introducer {
            TRAILER => {
                report.trailing(data, pos + 1, "GIF trailer");
                break;
            }
            EXTENSION_INTRODUCER => {
                let Some(&label) = data.get(pos + 1) else {
                    report.truncated(pos, "extension label", 1, 0);
                    break;
                };
                let Some((next, payload)) = sub_blocks(data, pos + 2, report) else {
                    break;
                };
                match label {
                    COMMENT_LABEL => {
                        comment_bytes += payload.len() as u64;
                        if let Some((inner, what)) = find_nested_container(&payload) {
                            report.record(
                                AnomalyKind::NestedContainer,
                                pos + 2 + inner,
                                format!("{what} nested inside a comment extension"),
                            );
                        }
                    }
                    APPLICATION_LABEL => {
                        report.check_oversized(pos, payload.len() as u64, "application extension");
                    }
                    _ => {}
                }
                pos = next;
            }
            IMAGE_SEPARATOR => {
                let Some(&flags) = data.get(pos + IMAGE_DESCRIPTOR_LEN - 1) else {
                    report.truncated(
                        pos,
                        "image descriptor",
                        IMAGE_DESCRIPTOR_LEN as u64,
                        data.len() - pos,
                    );
                    break;
                };
                // descriptor, local color table, LZW minimum code size
                let image_data = pos + IMAGE_DESCRIPTOR_LEN + color_table_len(flags) + 1;
                if image_data > data.len() {
                    report.truncated(
                        pos,
                        "image header",
                        (image_data - pos) as u64,
                        data.len() - pos,
                    );
                    break;
                }
                let Some(next) = skip_sub_blocks(data, image_data, report) else {
                    break;
                };
                pos = next;
            }
            other => {
                return Err(corrupt(
                    pos,
                    format!("unknown block introducer 0x{other:02X}"),
                ));
            }
        }
    }

    report.check_oversized(HEADER_LEN, comment_bytes, "comment extension");
    Ok(())
}
