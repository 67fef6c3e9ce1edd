//! Pixel density from container headers.
//!
//! Reports pixels per inch, rounded to a whole number:
//! - JPEG: JFIF APP0 segment (units: dpi or dots per cm)
//! - PNG: `pHYs` chunk (pixels per metre)
//! - TIFF: IFD0 `XResolution` (282) with `ResolutionUnit` (296)
//!
//! WebP and AVIF carry no density field. Unitless or malformed headers
//! report nothing rather than failing the probe.

use super::params::ImageFormat;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// JFIF and `pHYs` sit ahead of the pixel data; this much of the file is enough.
const HEADER_WINDOW: u64 = 64 * 1024;

const CM_PER_INCH: f64 = 2.54;
const METRES_PER_INCH: f64 = 0.0254;

/// Read the horizontal density of the image at `path`.
pub fn read_density(path: &Path, format: ImageFormat) -> Option<f64> {
    match format {
        ImageFormat::Jpeg => jfif_density(&read_prefix(path)?),
        ImageFormat::Png => phys_density(&read_prefix(path)?),
        // IFDs may follow the strips, so TIFF needs the whole file
        ImageFormat::Tiff => tiff_density(&std::fs::read(path).ok()?),
        ImageFormat::WebP | ImageFormat::Avif => None,
    }
}

fn read_prefix(path: &Path) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)
        .ok()?
        .take(HEADER_WINDOW)
        .read_to_end(&mut bytes)
        .ok()?;
    Some(bytes)
}

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn per_inch(value: f64, units_per_inch: f64) -> Option<f64> {
    (value > 0.0).then(|| (value * units_per_inch).round())
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

const JFIF_ID: &[u8] = b"JFIF\0";

/// Walk JPEG markers up to SOS looking for a JFIF APP0 segment.
///
/// APP0 layout after the length: "JFIF\0" (5), version (2), units (1),
/// Xdensity (2), Ydensity (2).
fn jfif_density(data: &[u8]) -> Option<f64> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while let (Some(&0xFF), Some(&marker)) = (data.get(pos), data.get(pos + 1)) {
        match marker {
            // Fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            // Start of scan: no more headers
            0xDA | 0xD9 => return None,
            _ => {}
        }
        let len = be_u16(data, pos + 2)? as usize;
        if marker == 0xE0 {
            let segment = data.get(pos + 4..pos + 2 + len)?;
            if segment.starts_with(JFIF_ID) {
                let units = *segment.get(7)?;
                let x = f64::from(be_u16(segment, 8)?);
                return match units {
                    1 => per_inch(x, 1.0),
                    2 => per_inch(x, CM_PER_INCH),
                    _ => None,
                };
            }
        }
        pos += 2 + len;
    }
    None
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const PHYS_UNIT_METRE: u8 = 1;

/// Walk PNG chunks up to the first `IDAT` looking for `pHYs`.
///
/// Chunk layout: length (4), type (4), data (length), CRC (4).
/// `pHYs` data: x pixels per unit (4), y pixels per unit (4), unit (1).
fn phys_density(data: &[u8]) -> Option<f64> {
    if !data.starts_with(PNG_SIGNATURE) {
        return None;
    }
    let mut pos = PNG_SIGNATURE.len();
    loop {
        let len = be_u32(data, pos)? as usize;
        let kind = data.get(pos + 4..pos + 8)?;
        match kind {
            b"pHYs" => {
                let chunk = data.get(pos + 8..pos + 8 + len)?;
                let x = f64::from(be_u32(chunk, 0)?);
                return match *chunk.get(8)? {
                    PHYS_UNIT_METRE => per_inch(x, METRES_PER_INCH),
                    _ => None,
                };
            }
            b"IDAT" | b"IEND" => return None,
            _ => pos = pos.checked_add(12 + len)?,
        }
    }
}

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

const TAG_X_RESOLUTION: u16 = 282;
const TAG_RESOLUTION_UNIT: u16 = 296;
const TYPE_RATIONAL: u16 = 5;

/// Read `XResolution` and `ResolutionUnit` from the first IFD.
///
/// A missing `ResolutionUnit` means inches; unit 1 means "no absolute unit".
fn tiff_density(data: &[u8]) -> Option<f64> {
    let big_endian = match data.get(0..2)? {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };
    let u16_at = |at: usize| -> Option<u16> {
        let bytes: [u8; 2] = data.get(at..at + 2)?.try_into().ok()?;
        Some(if big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    };
    let u32_at = |at: usize| -> Option<u32> {
        let bytes: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
        Some(if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    };

    if u16_at(2)? != 42 {
        return None;
    }
    let ifd = u32_at(4)? as usize;
    let entries = u16_at(ifd)? as usize;

    let mut resolution = None;
    let mut unit = 2;
    for i in 0..entries {
        let entry = ifd + 2 + i * 12;
        match u16_at(entry)? {
            TAG_X_RESOLUTION if u16_at(entry + 2)? == TYPE_RATIONAL => {
                let offset = u32_at(entry + 8)? as usize;
                let (num, den) = (u32_at(offset)?, u32_at(offset + 4)?);
                if den > 0 {
                    resolution = Some(f64::from(num) / f64::from(den));
                }
            }
            TAG_RESOLUTION_UNIT => unit = u16_at(entry + 8)?,
            _ => {}
        }
    }

    match unit {
        2 => per_inch(resolution?, 1.0),
        3 => per_inch(resolution?, CM_PER_INCH),
        _ => None,
    }
}
