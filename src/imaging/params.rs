//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline compiler (which decides which steps an
//! operation needs) and the [`backend`](super::backend) (which does the
//! actual pixel work). This separation allows swapping backends (e.g. for
//! testing with a mock) without changing compilation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Rejected, not clamped, when out of range.
//! - [`ImageFormat`]: Encoded formats the engine can read and write.
//! - [`FitMode`]: How a source maps onto target dimensions during a resize.
//! - [`Color`]: RGBA fill colour for exposed canvas areas.
//! - [`TransformStep`] / [`EncodeStep`]: One geometry step, and the terminal encode.
//! - [`Pipeline`]: Source, destination, ordered steps and exactly one encode step.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    /// Returns `None` when `value` is outside `1..=100`.
    pub fn new(value: u32) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&value)
            .then_some(Self(value as u8))
    }

    pub fn value(self) -> u32 {
        self.0 as u32
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Encoded image formats the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Tiff,
}

impl ImageFormat {
    /// Lowercase name as reported in metadata documents.
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::WebP => "webp",
            ImageFormat::Avif => "avif",
            ImageFormat::Tiff => "tiff",
        }
    }

    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::WebP),
            "avif" => Some(ImageFormat::Avif),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    /// Formats whose encoders take a quality setting.
    pub fn accepts_quality(self) -> bool {
        !matches!(self, ImageFormat::Tiff)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Geometric policy for mapping a source onto target dimensions.
///
/// - `Cover`: scale to cover both dimensions, then center-crop the overflow
/// - `Contain`: scale to fit inside both dimensions, then letterbox to the exact box
/// - `Fill`: stretch to exactly the target, ignoring aspect ratio
/// - `Inside`: scale to fit inside both dimensions, no letterbox
/// - `Outside`: scale to cover both dimensions, no crop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    #[default]
    Cover,
    Contain,
    Fill,
    Inside,
    Outside,
}

impl FitMode {
    pub const ALL: [FitMode; 5] = [
        FitMode::Cover,
        FitMode::Contain,
        FitMode::Fill,
        FitMode::Inside,
        FitMode::Outside,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FitMode::Cover => "cover",
            FitMode::Contain => "contain",
            FitMode::Fill => "fill",
            FitMode::Inside => "inside",
            FitMode::Outside => "outside",
        }
    }
}

impl FromStr for FitMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FitMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or(())
    }
}

/// RGBA colour used to fill canvas areas the source does not cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0, 255]);

    pub fn is_opaque(self) -> bool {
        self.0[3] == 255
    }
}

const NAMED_COLORS: &[(&str, [u8; 4])] = &[
    ("black", [0, 0, 0, 255]),
    ("white", [255, 255, 255, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 128, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("gray", [128, 128, 128, 255]),
    ("grey", [128, 128, 128, 255]),
    ("transparent", [0, 0, 0, 0]),
];

impl FromStr for Color {
    type Err = ();

    /// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa` and a handful of CSS colour names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if !hex.is_ascii() {
                return Err(());
            }
            let channel = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16);
            return match hex.len() {
                3 => {
                    let mut rgba = [255u8; 4];
                    for (i, slot) in rgba.iter_mut().take(3).enumerate() {
                        let v = channel(i, 1).map_err(|_| ())?;
                        *slot = v * 17;
                    }
                    Ok(Color(rgba))
                }
                6 | 8 => {
                    let mut rgba = [255u8; 4];
                    for (i, slot) in rgba.iter_mut().take(hex.len() / 2).enumerate() {
                        *slot = channel(i * 2, 2).map_err(|_| ())?;
                    }
                    Ok(Color(rgba))
                }
                _ => Err(()),
            };
        }
        let lower = s.to_ascii_lowercase();
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, rgba)| Color(*rgba))
            .ok_or(())
    }
}

/// One non-terminal geometry step.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformStep {
    /// Resize with `None` meaning "this axis does not constrain".
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        fit: FitMode,
        without_enlargement: bool,
    },
    /// Extract an exact region. Never clamped to the source bounds.
    Extract {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    },
    /// Rotate clockwise by `degrees`, filling exposed corners with `background`.
    Rotate { degrees: f64, background: Color },
    /// Mirror left-right.
    Flop,
    /// Mirror top-bottom.
    Flip,
}

/// Terminal encode step: every pipeline ends in exactly one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeStep {
    pub format: ImageFormat,
    /// `None` writes with the encoder's own settings.
    pub quality: Option<Quality>,
    pub progressive: bool,
}

impl EncodeStep {
    /// Encode with no quality override.
    pub fn plain(format: ImageFormat) -> Self {
        Self {
            format,
            quality: None,
            progressive: false,
        }
    }
}

/// Ordered transform steps for one source image, ending in one encode step.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub steps: Vec<TransformStep>,
    pub encode: EncodeStep,
}

impl Pipeline {
    /// Short human-readable description for logs, e.g. `resize(800x-,cover) → jpeg(q80)`.
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .steps
            .iter()
            .map(|step| match step {
                TransformStep::Resize {
                    width, height, fit, ..
                } => format!(
                    "resize({}x{},{})",
                    width.map_or("-".to_string(), |w| w.to_string()),
                    height.map_or("-".to_string(), |h| h.to_string()),
                    fit.as_str()
                ),
                TransformStep::Extract {
                    left,
                    top,
                    width,
                    height,
                } => format!("extract({left},{top},{width}x{height})"),
                TransformStep::Rotate { degrees, .. } => format!("rotate({degrees})"),
                TransformStep::Flop => "flop".to_string(),
                TransformStep::Flip => "flip".to_string(),
            })
            .collect();
        parts.push(match self.encode.quality {
            Some(q) => format!("{}(q{})", self.encode.format, q.value()),
            None => self.encode.format.to_string(),
        });
        parts.join(" → ")
    }
}
