use image::DynamicImage;

const ORIENTATION_TAG: u16 = 0x0112;
const TIFF_SHORT: u16 = 3;

/// Rotates `image` upright according to the JPEG EXIF orientation tag, if any.
pub fn apply_exif_orientation(bytes: &[u8], image: DynamicImage) -> DynamicImage {
    match exif_orientation_from_jpeg(bytes) {
        Some(90) => image.rotate90(),
        Some(180) => image.rotate180(),
        Some(270) => image.rotate270(),
        _ => image,
    }
}

// Walks JPEG segments up to the first APP1 "Exif" block.
fn exif_orientation_from_jpeg(bytes: &[u8]) -> Option<u16> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut i = 2usize;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = bytes[i + 1];
        i += 2;
        // EOI or start of scan: no metadata past this point.
        if marker == 0xD9 || marker == 0xDA {
            break;
        }
        let seg_len = u16::from_be_bytes([bytes[i], bytes[i + 1]]) as usize;
        i += 2;
        if seg_len < 2 || i + seg_len - 2 > bytes.len() {
            break;
        }
        let segment = &bytes[i..i + seg_len - 2];
        if marker == 0xE1 && segment.starts_with(b"Exif\0\0") {
            return parse_tiff_orientation(&segment[6..]);
        }
        i += seg_len - 2;
    }
    None
}

struct Tiff<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl Tiff<'_> {
    fn u16_at(&self, off: usize) -> Option<u16> {
        let b: [u8; 2] = self.data.get(off..off + 2)?.try_into().ok()?;
        Some(if self.big_endian {
            u16::from_be_bytes(b)
        } else {
            u16::from_le_bytes(b)
        })
    }

    fn u32_at(&self, off: usize) -> Option<u32> {
        let b: [u8; 4] = self.data.get(off..off + 4)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(b)
        } else {
            u32::from_le_bytes(b)
        })
    }
}

fn parse_tiff_orientation(data: &[u8]) -> Option<u16> {
    let big_endian = match data.get(0..2)? {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };
    let tiff = Tiff { data, big_endian };
    if tiff.u16_at(2)? != 0x002A {
        return None;
    }
    let ifd0 = tiff.u32_at(4)? as usize;
    let count = tiff.u16_at(ifd0)? as usize;
    for entry in 0..count {
        let p = ifd0 + 2 + entry * 12;
        if tiff.u16_at(p)? != ORIENTATION_TAG {
            continue;
        }
        if tiff.u16_at(p + 2)? != TIFF_SHORT {
            return None;
        }
        // A single SHORT is stored inline in the value field.
        return match tiff.u16_at(p + 8)? {
            3 => Some(180),
            6 => Some(90),
            8 => Some(270),
            _ => None,
        };
    }
    None
}
