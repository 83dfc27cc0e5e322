//! Image dimension sniffing
//!
//! Only the container headers are read; pixel data is never decoded.

/// Width and height of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Reads the pixel size from a PNG, GIF, BMP, JPEG or WebP header
pub fn image_dimensions(data: &[u8]) -> Option<Dimensions> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        png(data)
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        gif(data)
    } else if data.starts_with(b"BM") {
        bmp(data)
    } else if data.starts_with(&[0xFF, 0xD8]) {
        jpeg(data)
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        webp(data)
    } else {
        None
    }
}

fn be_u16(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]) as u32)
}

fn le_u16(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]) as u32)
}

fn le_u24(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 3)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn le_i32(data: &[u8], at: usize) -> Option<i32> {
    let bytes = data.get(at..at + 4)?;
    Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn png(data: &[u8]) -> Option<Dimensions> {
    if data.get(12..16)? != b"IHDR" {
        return None;
    }
    Some(Dimensions {
        width: be_u32(data, 16)?,
        height: be_u32(data, 20)?,
    })
}

fn gif(data: &[u8]) -> Option<Dimensions> {
    Some(Dimensions {
        width: le_u16(data, 6)?,
        height: le_u16(data, 8)?,
    })
}

fn bmp(data: &[u8]) -> Option<Dimensions> {
    let header_size = le_i32(data, 14)?;

    // OS/2 BITMAPCOREHEADER stores 16-bit sizes
    if header_size == 12 {
        return Some(Dimensions {
            width: le_u16(data, 18)?,
            height: le_u16(data, 20)?,
        });
    }

    // Negative height marks a top-down bitmap
    Some(Dimensions {
        width: le_i32(data, 18)?.unsigned_abs(),
        height: le_i32(data, 22)?.unsigned_abs(),
    })
}

fn jpeg(data: &[u8]) -> Option<Dimensions> {
    let mut i = 2;

    loop {
        while *data.get(i)? != 0xFF {
            i += 1;
        }
        while *data.get(i)? == 0xFF {
            i += 1;
        }
        let marker = *data.get(i)?;
        i += 1;

        match marker {
            0xD8 | 0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return None,
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                return Some(Dimensions {
                    height: be_u16(data, i + 3)?,
                    width: be_u16(data, i + 5)?,
                });
            }
            _ => {
                let length = be_u16(data, i)? as usize;
                if length < 2 {
                    return None;
                }
                i += length;
            }
        }
    }
}

fn webp(data: &[u8]) -> Option<Dimensions> {
    match data.get(12..16)? {
        b"VP8 " => Some(Dimensions {
            width: le_u16(data, 26)? & 0x3FFF,
            height: le_u16(data, 28)? & 0x3FFF,
        }),
        b"VP8L" => {
            if *data.get(20)? != 0x2F {
                return None;
            }
            let b = data.get(21..25)?;
            let (b0, b1, b2, b3) = (b[0] as u32, b[1] as u32, b[2] as u32, b[3] as u32);
            Some(Dimensions {
                width: 1 + (((b1 & 0x3F) << 8) | b0),
                height: 1 + (((b3 & 0x0F) << 10) | (b2 << 2) | ((b1 & 0xC0) >> 6)),
            })
        }
        b"VP8X" => Some(Dimensions {
            width: 1 + le_u24(data, 24)?,
            height: 1 + le_u24(data, 27)?,
        }),
        _ => None,
    }
}
