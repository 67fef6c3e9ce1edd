//! AVIF probing and decoding.
//!
//! The `image` crate's `"avif"` feature only provides the encoder (rav1e).
//! Decoding would need `"avif-native"` (the dav1d C library), so AVIF input
//! goes through `avif-parse` for the container and `rav1d` (a pure Rust port
//! of dav1d) for the AV1 payload.

use super::backend::{BackendError, ImageInfo};
use super::params::ImageFormat;
use image::DynamicImage;
use std::path::Path;

fn read_container(path: &Path) -> Result<avif_parse::AvifData, BackendError> {
    let file_data = std::fs::read(path).map_err(|e| BackendError::io(path, e))?;
    avif_parse::read_avif(&mut std::io::Cursor::new(&file_data)).map_err(|e| {
        BackendError::Decode {
            path: path.to_path_buf(),
            message: format!("invalid AVIF container: {e:?}"),
        }
    })
}

/// Read dimensions and pixel layout from the AVIF container (no AV1 decode).
pub fn probe(path: &Path) -> Result<ImageInfo, BackendError> {
    let avif = read_container(path)?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            message: format!("unreadable AV1 sequence header: {e:?}"),
        })?;
    let has_alpha = avif.alpha_item.is_some();
    let color_channels = if meta.monochrome { 1 } else { 3 };

    Ok(ImageInfo {
        format: ImageFormat::Avif,
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
        channels: color_channels + u8::from(has_alpha),
        bit_depth: meta.bit_depth,
        color_space: if meta.monochrome { "b-w" } else { "srgb" },
        has_alpha,
        density: None,
    })
}

fn decode_failed(path: &Path, message: impl Into<String>) -> BackendError {
    BackendError::Decode {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Decode the primary item of an AVIF file to RGB8.
pub fn decode(path: &Path) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as dav1d;
    use std::ptr::NonNull;

    let avif = read_container(path)?;
    let av1_bytes: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d::dav1d_default_settings(NonNull::from(&mut settings).cast::<Dav1dSettings>()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(decode_failed(path, format!("rav1d open failed ({})", rc.0)));
    }

    // Everything between open and close runs in here so the context is
    // released on every path.
    let decoded = (|| {
        let mut data = Dav1dData::default();
        let buf_ptr = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
        if buf_ptr.is_null() {
            return Err(decode_failed(path, "rav1d data_create failed"));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

        let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(decode_failed(path, format!("rav1d send_data failed ({})", rc.0)));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(decode_failed(path, format!("rav1d get_picture failed ({})", rc.0)));
        }

        let rgb = picture_to_rgb(&pic).map_err(|message| decode_failed(path, message));
        unsafe { dav1d::dav1d_picture_unref(NonNull::new(&mut pic)) };
        let (width, height, rgb) = rgb?;

        image::RgbImage::from_raw(width, height, rgb)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| decode_failed(path, "decoded buffer does not match frame size"))
    })();

    unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
    decoded
}

/// Convert a decoded picture's planes to interleaved RGB8.
fn picture_to_rgb(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<(u32, u32, Vec<u8>), String> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let plane = |i: usize| -> Result<*const u8, String> {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| format!("missing plane {i}"))
    };

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let y_ptr = plane(0)?;
    let layout = pic.p.layout;

    let (u_ptr, v_ptr, subsampling) = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        (y_ptr, y_ptr, None)
    } else {
        let subsampling = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            _ => return Err(format!("unsupported pixel layout {layout}")),
        };
        (plane(1)?, plane(2)?, Some(subsampling))
    };

    let planes = YuvPlanes {
        y_ptr,
        u_ptr,
        v_ptr,
        y_stride: pic.stride[0],
        uv_stride: pic.stride[1],
        width,
        height,
        bpc: pic.p.bpc as u32,
        subsampling,
    };
    Ok((width, height, planes.to_rgb()?))
}

/// Byte length of an interleaved RGB8 frame, or `None` if it overflows `usize`.
fn rgb_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)
}

/// Decoded YUV plane pointers, valid until the picture is unref'd.
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling (horizontal, vertical); `None` for monochrome.
    subsampling: Option<(bool, bool)>,
}

impl YuvPlanes {
    /// BT.601 YCbCr → RGB, scaled to 8 bits per channel.
    fn to_rgb(&self) -> Result<Vec<u8>, String> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let len = rgb_len(self.width, self.height)
            .ok_or_else(|| format!("frame {}x{} is too large", self.width, self.height))?;
        let mut rgb = vec![0u8; len];
        let row_bytes = self.width as usize * 3;

        for row in 0..self.height {
            for col in 0..self.width {
                let y = self.sample(self.y_ptr, self.y_stride, col, row);

                let (r, g, b) = match self.subsampling {
                    None => {
                        let v = (y * scale).clamp(0.0, 255.0);
                        (v, v, v)
                    }
                    Some((ss_x, ss_y)) => {
                        let c_col = if ss_x { col / 2 } else { col };
                        let c_row = if ss_y { row / 2 } else { row };
                        let cb = self.sample(self.u_ptr, self.uv_stride, c_col, c_row) - center;
                        let cr = self.sample(self.v_ptr, self.uv_stride, c_col, c_row) - center;
                        (
                            ((y + 1.402 * cr) * scale).clamp(0.0, 255.0),
                            ((y - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                            ((y + 1.772 * cb) * scale).clamp(0.0, 255.0),
                        )
                    }
                };

                let idx = row as usize * row_bytes + col as usize * 3;
                rgb[idx] = r as u8;
                rgb[idx + 1] = g as u8;
                rgb[idx + 2] = b as u8;
            }
        }

        Ok(rgb)
    }

    /// One sample from a plane; >8-bit depths are stored as u16.
    #[inline]
    fn sample(&self, ptr: *const u8, stride: isize, x: u32, y: u32) -> f32 {
        if self.bpc <= 8 {
            (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
        } else {
            let byte_offset = y as isize * stride + x as isize * 2;
            (unsafe { *(ptr.offset(byte_offset) as *const u16) }) as f32
        }
    }
}
