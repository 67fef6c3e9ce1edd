//! The fixed operation catalog.
//!
//! Eight operations, each pairing a caller-facing name and JSON input schema
//! ([`OperationKind`]) with a strongly-typed parameter record ([`Operation`]).
//! The resolver turns raw arguments into an [`Operation`]; everything after
//! that matches on the enum exhaustively, so adding an operation is a compile
//! error everywhere it needs handling.
//!
//! | Name | Required | Optional |
//! |---|---|---|
//! | `resize_image` | inputPath, outputPath | width, height, fit, preserveAspectRatio |
//! | `convert_format` | inputPath, outputPath, format | quality |
//! | `crop_image` | inputPath, outputPath, left, top, width, height | |
//! | `compress_image` | inputPath, outputPath | quality, progressive |
//! | `rotate_image` | inputPath, outputPath, angle | background |
//! | `flip_image` | inputPath, outputPath, direction | |
//! | `get_image_info` | inputPath | |
//! | `batch_resize` | inputPath, outputDir, sizes | format, quality |

use crate::config::Defaults;
use crate::imaging::calculations::MAX_DIMENSION;
use crate::imaging::{Color, FitMode, ImageFormat, Quality};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::str::FromStr;

/// Identifier of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    ResizeImage,
    ConvertFormat,
    CropImage,
    CompressImage,
    RotateImage,
    FlipImage,
    GetImageInfo,
    BatchResize,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::ResizeImage,
        OperationKind::ConvertFormat,
        OperationKind::CropImage,
        OperationKind::CompressImage,
        OperationKind::RotateImage,
        OperationKind::FlipImage,
        OperationKind::GetImageInfo,
        OperationKind::BatchResize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::ResizeImage => "resize_image",
            OperationKind::ConvertFormat => "convert_format",
            OperationKind::CropImage => "crop_image",
            OperationKind::CompressImage => "compress_image",
            OperationKind::RotateImage => "rotate_image",
            OperationKind::FlipImage => "flip_image",
            OperationKind::GetImageInfo => "get_image_info",
            OperationKind::BatchResize => "batch_resize",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            OperationKind::ResizeImage => "Resize an image to specified dimensions",
            OperationKind::ConvertFormat => "Convert image between formats (jpeg, png, webp, avif)",
            OperationKind::CropImage => "Crop an image to specified region",
            OperationKind::CompressImage => "Compress an image with quality settings",
            OperationKind::RotateImage => "Rotate an image by specified degrees",
            OperationKind::FlipImage => "Flip an image horizontally or vertically",
            OperationKind::GetImageInfo => "Get metadata and information about an image",
            OperationKind::BatchResize => "Generate multiple sizes from one image",
        }
    }

    /// Every argument the operation understands.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            OperationKind::ResizeImage => &[
                "inputPath",
                "outputPath",
                "width",
                "height",
                "fit",
                "preserveAspectRatio",
            ],
            OperationKind::ConvertFormat => &["inputPath", "outputPath", "format", "quality"],
            OperationKind::CropImage => {
                &["inputPath", "outputPath", "left", "top", "width", "height"]
            }
            OperationKind::CompressImage => &["inputPath", "outputPath", "quality", "progressive"],
            OperationKind::RotateImage => &["inputPath", "outputPath", "angle", "background"],
            OperationKind::FlipImage => &["inputPath", "outputPath", "direction"],
            OperationKind::GetImageInfo => &["inputPath"],
            OperationKind::BatchResize => &["inputPath", "outputDir", "sizes", "format", "quality"],
        }
    }

    /// Optional arguments whose fallback comes from the defaults table.
    pub fn defaultable_fields(self) -> &'static [&'static str] {
        match self {
            OperationKind::ResizeImage => &["fit", "preserveAspectRatio"],
            OperationKind::ConvertFormat => &["quality"],
            OperationKind::CompressImage => &["quality", "progressive"],
            OperationKind::RotateImage => &["background"],
            OperationKind::BatchResize => &["quality"],
            OperationKind::CropImage | OperationKind::FlipImage | OperationKind::GetImageInfo => &[],
        }
    }

    /// JSON Schema of the arguments object, with `defaults` filled in.
    pub fn input_schema(self, defaults: &Defaults) -> Value {
        let input = json!({ "type": "string", "description": "Path to input image" });
        let quality = json!({
            "type": "number",
            "minimum": Quality::MIN,
            "maximum": Quality::MAX,
            "description": "Quality for lossy formats (1-100)"
        });
        let format = json!({
            "type": "string",
            "enum": OutputFormat::ALL.map(OutputFormat::as_str),
        });

        let mut schema = match self {
            OperationKind::ResizeImage => json!({
                "type": "object",
                "properties": {
                    "inputPath": input,
                    "outputPath": { "type": "string", "description": "Path to save resized image" },
                    "width": { "type": "number", "maximum": MAX_DIMENSION, "description": "Target width in pixels" },
                    "height": { "type": "number", "maximum": MAX_DIMENSION, "description": "Target height in pixels" },
                    "fit": {
                        "type": "string",
                        "enum": FitMode::ALL.map(FitMode::as_str),
                        "description": "How the image should be resized to fit"
                    },
                    "preserveAspectRatio": {
                        "type": "boolean",
                        "description": "Maintain original aspect ratio (never enlarge)"
                    }
                },
                "required": ["inputPath", "outputPath"]
            }),
            OperationKind::ConvertFormat => json!({
                "type": "object",
                "properties": {
                    "inputPath": input,
                    "outputPath": { "type": "string", "description": "Path to save converted image" },
                    "format": format,
                    "quality": quality
                },
                "required": ["inputPath", "outputPath", "format"]
            }),
            OperationKind::CropImage => json!({
                "type": "object",
                "properties": {
                    "inputPath": input,
                    "outputPath": { "type": "string", "description": "Path to save cropped image" },
                    "left": { "type": "number", "description": "Left offset in pixels" },
                    "top": { "type": "number", "description": "Top offset in pixels" },
                    "width": { "type": "number", "description": "Width of crop area" },
                    "height": { "type": "number", "description": "Height of crop area" }
                },
                "required": ["inputPath", "outputPath", "left", "top", "width", "height"]
            }),
            OperationKind::CompressImage => json!({
                "type": "object",
                "properties": {
                    "inputPath": input,
                    "outputPath": { "type": "string", "description": "Path to save compressed image" },
                    "quality": quality,
                    "progressive": {
                        "type": "boolean",
                        "description": "Use progressive encoding (for JPEG)"
                    }
                },
                "required": ["inputPath", "outputPath"]
            }),
            OperationKind::RotateImage => json!({
                "type": "object",
                "properties": {
                    "inputPath": input,
                    "outputPath": { "type": "string", "description": "Path to save rotated image" },
                    "angle": {
                        "type": "number",
                        "description": "Rotation angle in degrees (positive = clockwise)"
                    },
                    "background": {
                        "type": "string",
                        "description": "Background color for exposed areas (hex or named color)"
                    }
                },
                "required": ["inputPath", "outputPath", "angle"]
            }),
            OperationKind::FlipImage => json!({
                "type": "object",
                "properties": {
                    "inputPath": input,
                    "outputPath": { "type": "string", "description": "Path to save flipped image" },
                    "direction": {
                        "type": "string",
                        "enum": FlipDirection::ALL.map(FlipDirection::as_str),
                        "description": "Flip direction"
                    }
                },
                "required": ["inputPath", "outputPath", "direction"]
            }),
            OperationKind::GetImageInfo => json!({
                "type": "object",
                "properties": {
                    "inputPath": { "type": "string", "description": "Path to image file" }
                },
                "required": ["inputPath"]
            }),
            OperationKind::BatchResize => json!({
                "type": "object",
                "properties": {
                    "inputPath": input,
                    "outputDir": { "type": "string", "description": "Directory to save resized images" },
                    "sizes": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "width": { "type": "number", "maximum": MAX_DIMENSION, "description": "Width in pixels" },
                                "height": { "type": "number", "maximum": MAX_DIMENSION, "description": "Height in pixels" },
                                "suffix": { "type": "string", "description": "Suffix to add to filename" }
                            },
                            "required": ["width", "suffix"]
                        },
                        "description": "Array of sizes to generate"
                    },
                    "format": format,
                    "quality": quality
                },
                "required": ["inputPath", "outputDir", "sizes"]
            }),
        };

        if let Some(properties) = schema["properties"].as_object_mut() {
            for field in self.defaultable_fields() {
                if let (Some(prop), Some(default)) =
                    (properties.get_mut(*field), defaults.get(self, field))
                {
                    prop["default"] = default.clone();
                }
            }
        }
        schema
    }
}

/// One entry of the `tools/list` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Describe every operation, in catalog order.
pub fn tool_descriptors(defaults: &Defaults) -> Vec<ToolDescriptor> {
    OperationKind::ALL
        .into_iter()
        .map(|kind| ToolDescriptor {
            name: kind.name(),
            description: kind.description(),
            input_schema: kind.input_schema(defaults),
        })
        .collect()
}

/// Target format accepted by `convert_format` and `batch_resize`.
///
/// `jpg` and `jpeg` encode identically but keep their spelling for file
/// extensions and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Jpg,
    Png,
    Webp,
    Avif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Jpeg,
        OutputFormat::Jpg,
        OutputFormat::Png,
        OutputFormat::Webp,
        OutputFormat::Avif,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg | OutputFormat::Jpg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Webp => ImageFormat::WebP,
            OutputFormat::Avif => ImageFormat::Avif,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Horizontal,
    Vertical,
    Both,
}

impl FlipDirection {
    pub const ALL: [FlipDirection; 3] = [
        FlipDirection::Horizontal,
        FlipDirection::Vertical,
        FlipDirection::Both,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FlipDirection::Horizontal => "horizontal",
            FlipDirection::Vertical => "vertical",
            FlipDirection::Both => "both",
        }
    }

    /// Left-right mirror.
    pub fn mirrors_horizontally(self) -> bool {
        matches!(self, FlipDirection::Horizontal | FlipDirection::Both)
    }

    /// Top-bottom mirror.
    pub fn mirrors_vertically(self) -> bool {
        matches!(self, FlipDirection::Vertical | FlipDirection::Both)
    }
}

impl FromStr for FlipDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlipDirection::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitMode,
    pub preserve_aspect_ratio: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertParams {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub quality: Quality,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub input: PathBuf,
    pub output: PathBuf,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressParams {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quality: Quality,
    pub progressive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RotateParams {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Degrees, positive = clockwise, any range.
    pub angle: f64,
    pub background: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlipParams {
    pub input: PathBuf,
    pub output: PathBuf,
    pub direction: FlipDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoParams {
    pub input: PathBuf,
}

/// One output of a batch resize.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeSpec {
    pub width: u32,
    pub height: Option<u32>,
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResizeParams {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub sizes: Vec<SizeSpec>,
    pub format: Option<OutputFormat>,
    pub quality: Quality,
}

/// A resolved request: one catalog entry with its complete, in-domain parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Resize(ResizeParams),
    ConvertFormat(ConvertParams),
    Crop(CropParams),
    Compress(CompressParams),
    Rotate(RotateParams),
    Flip(FlipParams),
    GetImageInfo(InfoParams),
    BatchResize(BatchResizeParams),
}
