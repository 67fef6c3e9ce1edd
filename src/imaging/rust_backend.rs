//! Image engine with no system libraries.
//!
//! Everything is statically linked into the binary; `webp` builds its bundled
//! libwebp from source.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Sniff + probe (JPEG, PNG, TIFF, WebP) | `image::ImageReader::with_guessed_format` + `ImageDecoder` header |
//! | Probe + decode (AVIF) | [`avif`](super::avif): `avif-parse` + `rav1d` |
//! | Resize | `image::imageops` Lanczos3, fit math in [`calculations`](super::calculations) |
//! | Extract | `DynamicImage::crop_imm`, bounds checked, never clamped |
//! | Rotate | `rotate90/180/270` for right angles, bilinear onto an enlarged canvas otherwise |
//! | Flip / flop | `DynamicImage::flipv` / `fliph` |
//! | Encode → JPEG | `jpeg_encoder::Encoder`, baseline or progressive |
//! | Encode → PNG | `PngEncoder`, lossless; a quality request selects best compression |
//! | Encode → WebP | `webp::Encoder` (lossy, quality honoured) |
//! | Encode → AVIF | `AvifEncoder` (rav1e, speed 6) |
//! | Encode → TIFF | `DynamicImage::write_to` |
//! | Density | [`density`](super::density): JFIF, `pHYs` and TIFF IFD headers |
//!
//! Every resize or rotate checks its target canvas against
//! [`within_limits`] before allocating it.

use super::avif;
use super::backend::{BackendError, ImageBackend, ImageInfo};
use super::calculations::{
    MAX_DIMENSION, Placement, center_offset, normalize_degrees, plan_resize, quarter_turns,
    rotated_bounds, within_limits,
};
use super::density;
use super::params::{Color, EncodeStep, FitMode, ImageFormat, Pipeline, TransformStep};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader, Rgba, RgbaImage};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Letterbox colour for `contain` resizes.
const CONTAIN_BACKGROUND: Color = Color::BLACK;

/// Engine built on the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-step mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn from_image_format(format: image::ImageFormat) -> Option<ImageFormat> {
    match format {
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::WebP => Some(ImageFormat::WebP),
        image::ImageFormat::Avif => Some(ImageFormat::Avif),
        image::ImageFormat::Tiff => Some(ImageFormat::Tiff),
        _ => None,
    }
}

/// Open `path` and identify its format from the file contents.
fn open_sniffed(path: &Path) -> Result<(ImageReader<BufReader<File>>, ImageFormat), BackendError> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| BackendError::io(path, e))?;
    let format = reader
        .format()
        .and_then(from_image_format)
        .ok_or_else(|| BackendError::UnsupportedInput(path.to_path_buf()))?;
    Ok((reader, format))
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let (reader, format) = open_sniffed(path)?;
    if format == ImageFormat::Avif {
        return avif::decode(path);
    }
    reader.decode().map_err(|e| BackendError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn with_alpha_of(source_had_alpha: bool, canvas: RgbaImage) -> DynamicImage {
    let canvas = DynamicImage::ImageRgba8(canvas);
    if source_had_alpha {
        canvas
    } else {
        DynamicImage::ImageRgb8(canvas.to_rgb8())
    }
}

fn check_canvas(action: &str, (width, height): (u32, u32)) -> Result<(), BackendError> {
    if within_limits((width, height)) {
        Ok(())
    } else {
        Err(BackendError::Geometry(format!(
            "{action} would produce a {width}x{height} image; \
             the limit is {MAX_DIMENSION} pixels per side"
        )))
    }
}

fn resize(
    img: DynamicImage,
    target: (Option<u32>, Option<u32>),
    fit: FitMode,
    without_enlargement: bool,
) -> Result<DynamicImage, BackendError> {
    let plan = plan_resize((img.width(), img.height()), target, fit, without_enlargement);
    check_canvas("resize", (plan.width, plan.height))?;
    check_canvas("resize", plan.output())?;
    let resized = if (plan.width, plan.height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(plan.width, plan.height, FilterType::Lanczos3)
    };

    Ok(match plan.placement {
        Placement::Exact => resized,
        Placement::Crop { width, height } => resized.crop_imm(
            center_offset(resized.width(), width),
            center_offset(resized.height(), height),
            width,
            height,
        ),
        Placement::Pad { width, height } => {
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba(CONTAIN_BACKGROUND.0));
            image::imageops::overlay(
                &mut canvas,
                &resized.to_rgba8(),
                center_offset(width, resized.width()) as i64,
                center_offset(height, resized.height()) as i64,
            );
            with_alpha_of(resized.color().has_alpha(), canvas)
        }
    })
}

fn extract(
    img: DynamicImage,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
) -> Result<DynamicImage, BackendError> {
    let inside = |start: u32, len: u32, bound: u32| {
        len > 0 && start.checked_add(len).is_some_and(|end| end <= bound)
    };
    if !inside(left, width, img.width()) || !inside(top, height, img.height()) {
        return Err(BackendError::Geometry(format!(
            "extract area {width}x{height} at ({left}, {top}) lies outside the {}x{} source",
            img.width(),
            img.height()
        )));
    }
    Ok(img.crop_imm(left, top, width, height))
}

/// Sample `src` at fractional coordinates, treating outside pixels as `background`.
fn bilinear(src: &RgbaImage, x: f64, y: f64, background: Rgba<u8>) -> Rgba<u8> {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let fetch = |px: f64, py: f64| {
        if px < 0.0 || py < 0.0 || px >= src.width() as f64 || py >= src.height() as f64 {
            background
        } else {
            *src.get_pixel(px as u32, py as u32)
        }
    };
    let (p00, p10) = (fetch(x0, y0), fetch(x0 + 1.0, y0));
    let (p01, p11) = (fetch(x0, y0 + 1.0), fetch(x0 + 1.0, y0 + 1.0));

    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = p00.0[c] as f64 * (1.0 - fx) + p10.0[c] as f64 * fx;
        let bottom = p01.0[c] as f64 * (1.0 - fx) + p11.0[c] as f64 * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

fn rotate(img: DynamicImage, degrees: f64, background: Color) -> Result<DynamicImage, BackendError> {
    match quarter_turns(degrees) {
        Some(0) => return Ok(img),
        Some(1) => return Ok(img.rotate90()),
        Some(2) => return Ok(img.rotate180()),
        Some(3) => return Ok(img.rotate270()),
        _ => {}
    }

    let (w, h) = (img.width(), img.height());
    let (out_w, out_h) = rotated_bounds((w, h), degrees);
    check_canvas("rotation", (out_w, out_h))?;
    let had_alpha = img.color().has_alpha();
    let src = img.to_rgba8();
    let (sin, cos) = normalize_degrees(degrees).to_radians().sin_cos();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let (ocx, ocy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);
    let fill = Rgba(background.0);

    // Inverse-map each output pixel through the clockwise rotation
    let canvas = RgbaImage::from_fn(out_w, out_h, |x, y| {
        let dx = x as f64 + 0.5 - ocx;
        let dy = y as f64 + 0.5 - ocy;
        let sx = dx * cos + dy * sin + cx - 0.5;
        let sy = -dx * sin + dy * cos + cy - 0.5;
        bilinear(&src, sx, sy, fill)
    });

    Ok(with_alpha_of(had_alpha || !background.is_opaque(), canvas))
}

fn apply_step(img: DynamicImage, step: &TransformStep) -> Result<DynamicImage, BackendError> {
    Ok(match *step {
        TransformStep::Resize {
            width,
            height,
            fit,
            without_enlargement,
        } => resize(img, (width, height), fit, without_enlargement)?,
        TransformStep::Extract {
            left,
            top,
            width,
            height,
        } => extract(img, left, top, width, height)?,
        TransformStep::Rotate {
            degrees,
            background,
        } => rotate(img, degrees, background)?,
        TransformStep::Flop => img.fliph(),
        TransformStep::Flip => img.flipv(),
    })
}

/// Narrow to the 8-bit RGB(A) layouts every encoder accepts.
fn to_rgb8_family(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Encode and write `img` to `path` as described by `step`.
fn save_image(img: &DynamicImage, path: &Path, step: &EncodeStep) -> Result<(), BackendError> {
    let file = File::create(path).map_err(|e| BackendError::io(path, e))?;
    let mut writer = std::io::BufWriter::new(file);
    let encode_failed = |message: String| BackendError::Encode {
        format: step.format,
        message,
    };
    let quality = step.quality.unwrap_or_default().value() as u8;

    match step.format {
        ImageFormat::Jpeg => {
            let (pixels, color) = if img.color().has_color() {
                (img.to_rgb8().into_raw(), jpeg_encoder::ColorType::Rgb)
            } else {
                (img.to_luma8().into_raw(), jpeg_encoder::ColorType::Luma)
            };
            let side = |v: u32| {
                u16::try_from(v).map_err(|_| {
                    encode_failed(format!("JPEG sides are limited to {} pixels, got {v}", u16::MAX))
                })
            };
            let (width, height) = (side(img.width())?, side(img.height())?);
            let mut encoder = jpeg_encoder::Encoder::new(&mut writer, quality);
            encoder.set_progressive(step.progressive);
            encoder
                .encode(&pixels, width, height, color)
                .map_err(|e| encode_failed(e.to_string()))?;
        }
        ImageFormat::Png => {
            let compression = match step.quality {
                Some(_) => CompressionType::Best,
                None => CompressionType::Default,
            };
            let encoder =
                PngEncoder::new_with_quality(&mut writer, compression, PngFilter::Adaptive);
            img.write_with_encoder(encoder)
                .map_err(|e| encode_failed(e.to_string()))?;
        }
        ImageFormat::WebP => {
            let pixels = to_rgb8_family(img);
            let encoder =
                webp::Encoder::from_image(&pixels).map_err(|e| encode_failed(e.to_string()))?;
            let encoded = encoder.encode(f32::from(quality));
            writer
                .write_all(&encoded)
                .map_err(|e| BackendError::io(path, e))?;
        }
        ImageFormat::Avif => {
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut writer,
                AVIF_SPEED,
                quality,
            );
            to_rgb8_family(img)
                .write_with_encoder(encoder)
                .map_err(|e| encode_failed(e.to_string()))?;
        }
        ImageFormat::Tiff => img
            .write_to(&mut writer, image::ImageFormat::Tiff)
            .map_err(|e| encode_failed(e.to_string()))?,
    }
    writer.flush().map_err(|e| BackendError::io(path, e))
}

impl ImageBackend for RustBackend {
    fn probe(&self, path: &Path) -> Result<ImageInfo, BackendError> {
        let (reader, format) = open_sniffed(path)?;
        if format == ImageFormat::Avif {
            return avif::probe(path);
        }
        let decoder = reader.into_decoder().map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let (width, height) = decoder.dimensions();
        let color = decoder.color_type();
        let channels = color.channel_count();

        Ok(ImageInfo {
            format,
            width,
            height,
            channels,
            bit_depth: (color.bits_per_pixel() / channels as u16) as u8,
            color_space: if color.has_color() { "srgb" } else { "b-w" },
            has_alpha: color.has_alpha(),
            density: density::read_density(path, format),
        })
    }

    fn execute(&self, pipeline: &Pipeline) -> Result<(), BackendError> {
        let mut img = load_image(&pipeline.source)?;
        for step in &pipeline.steps {
            img = apply_step(img, step)?;
        }
        save_image(&img, &pipeline.destination, &pipeline.encode)
    }
}
