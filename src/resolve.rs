//! Parameter resolution.
//!
//! Turns a raw `{name, arguments}` pair into a fully-typed [`Operation`]:
//! required fields are checked, absent optionals fall back to the configured
//! [`Defaults`], and every value is coerced into its domain type. Nothing here
//! touches the filesystem or the image engine, so a request that fails
//! resolution has no side effects.
//!
//! Coercions accepted from callers:
//! - `null` is treated as absent
//! - integer fields accept whole JSON numbers (`800`, `800.0`) or numeric strings
//! - boolean fields accept booleans or `"true"` / `"false"`
//! - arguments the operation does not know are ignored
//!
//! Resize targets (including batch sizes) are capped at [`MAX_DIMENSION`]
//! pixels per side.

use crate::catalog::{
    BatchResizeParams, CompressParams, ConvertParams, CropParams, FlipDirection, FlipParams,
    InfoParams, Operation, OperationKind, OutputFormat, ResizeParams, RotateParams, SizeSpec,
};
use crate::config::Defaults;
use crate::error::DispatchError;
use crate::imaging::calculations::MAX_DIMENSION;
use crate::imaging::{Color, FitMode, Quality};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Resolve one request against the catalog.
pub fn resolve(
    name: &str,
    arguments: &Map<String, Value>,
    defaults: &Defaults,
) -> Result<Operation, DispatchError> {
    let kind =
        OperationKind::from_name(name).ok_or_else(|| DispatchError::NotFound(name.to_string()))?;
    let args = Args {
        kind,
        raw: arguments,
        defaults,
    };
    args.log_ignored();

    let op = match kind {
        OperationKind::ResizeImage => Operation::Resize(ResizeParams {
            input: args.path("inputPath")?,
            output: args.path("outputPath")?,
            width: args.optional("width", parse_axis)?.flatten(),
            height: args.optional("height", parse_axis)?.flatten(),
            fit: args.defaulted("fit", parse_fit)?.unwrap_or_default(),
            preserve_aspect_ratio: args
                .defaulted("preserveAspectRatio", parse_bool)?
                .unwrap_or(true),
        }),
        OperationKind::ConvertFormat => Operation::ConvertFormat(ConvertParams {
            input: args.path("inputPath")?,
            output: args.path("outputPath")?,
            format: args.required("format", parse_format)?,
            quality: args.defaulted("quality", parse_quality)?.unwrap_or_default(),
        }),
        OperationKind::CropImage => Operation::Crop(CropParams {
            input: args.path("inputPath")?,
            output: args.path("outputPath")?,
            left: args.required("left", |f, v| parse_u32_at_least(f, v, 0))?,
            top: args.required("top", |f, v| parse_u32_at_least(f, v, 0))?,
            width: args.required("width", |f, v| parse_u32_at_least(f, v, 1))?,
            height: args.required("height", |f, v| parse_u32_at_least(f, v, 1))?,
        }),
        OperationKind::CompressImage => Operation::Compress(CompressParams {
            input: args.path("inputPath")?,
            output: args.path("outputPath")?,
            quality: args.defaulted("quality", parse_quality)?.unwrap_or_default(),
            progressive: args.defaulted("progressive", parse_bool)?.unwrap_or(true),
        }),
        OperationKind::RotateImage => Operation::Rotate(RotateParams {
            input: args.path("inputPath")?,
            output: args.path("outputPath")?,
            angle: args.required("angle", parse_angle)?,
            background: args
                .defaulted("background", parse_color)?
                .unwrap_or(Color::BLACK),
        }),
        OperationKind::FlipImage => Operation::Flip(FlipParams {
            input: args.path("inputPath")?,
            output: args.path("outputPath")?,
            direction: args.required("direction", parse_direction)?,
        }),
        OperationKind::GetImageInfo => Operation::GetImageInfo(InfoParams {
            input: args.path("inputPath")?,
        }),
        OperationKind::BatchResize => Operation::BatchResize(BatchResizeParams {
            input: args.path("inputPath")?,
            output_dir: args.path("outputDir")?,
            sizes: args.required("sizes", parse_sizes)?,
            format: args.optional("format", parse_format)?,
            quality: args.defaulted("quality", parse_quality)?.unwrap_or_default(),
        }),
    };
    Ok(op)
}

/// Check a configured default with the validator caller input for the same
/// field goes through.
pub fn check_default(kind: OperationKind, field: &str, value: &Value) -> Result<(), DispatchError> {
    match (kind, field) {
        (_, "quality") => parse_quality(field, value).map(drop),
        (OperationKind::ResizeImage, "fit") => parse_fit(field, value).map(drop),
        (_, "preserveAspectRatio" | "progressive") => parse_bool(field, value).map(drop),
        (OperationKind::RotateImage, "background") => parse_color(field, value).map(drop),
        _ => Err(DispatchError::validation(field, "has no configurable default")),
    }
}

type Parser<T> = fn(&str, &Value) -> Result<T, DispatchError>;

/// Raw arguments of one request, bound to the operation they are for.
struct Args<'a> {
    kind: OperationKind,
    raw: &'a Map<String, Value>,
    defaults: &'a Defaults,
}

impl<'a> Args<'a> {
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.raw.get(field).filter(|v| !v.is_null())
    }

    fn required<T>(
        &self,
        field: &str,
        parse: impl Fn(&str, &Value) -> Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        let value = self
            .get(field)
            .ok_or_else(|| DispatchError::validation(field, "is required"))?;
        parse(field, value)
    }

    fn optional<T>(&self, field: &str, parse: Parser<T>) -> Result<Option<T>, DispatchError> {
        self.get(field).map(|v| parse(field, v)).transpose()
    }

    /// Caller value, else the configured default for this operation.
    fn defaulted<T>(&self, field: &str, parse: Parser<T>) -> Result<Option<T>, DispatchError> {
        self.get(field)
            .or_else(|| self.defaults.get(self.kind, field))
            .map(|v| parse(field, v))
            .transpose()
    }

    fn path(&self, field: &str) -> Result<PathBuf, DispatchError> {
        self.required(field, parse_path)
    }

    fn log_ignored(&self) {
        let known = self.kind.fields();
        for key in self.raw.keys().filter(|k| !known.contains(&k.as_str())) {
            tracing::debug!(operation = self.kind.name(), argument = %key, "ignoring unknown argument");
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("`{s}`"),
        other => other.to_string(),
    }
}

fn one_of(options: &[&str]) -> String {
    format!("must be one of {}", options.join(", "))
}

fn parse_path(field: &str, value: &Value) -> Result<PathBuf, DispatchError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(PathBuf::from(s)),
        Value::String(_) => Err(DispatchError::validation(field, "must be a non-empty path")),
        other => Err(DispatchError::validation(
            field,
            format!("must be a path string, got {}", describe(other)),
        )),
    }
}

fn parse_str<'v>(field: &str, value: &'v Value) -> Result<&'v str, DispatchError> {
    value.as_str().ok_or_else(|| {
        DispatchError::validation(field, format!("must be a string, got {}", describe(value)))
    })
}

fn parse_number(field: &str, value: &Value) -> Result<f64, DispatchError> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite()).ok_or_else(|| {
        DispatchError::validation(field, format!("must be a number, got {}", describe(value)))
    })
}

fn parse_integer(field: &str, value: &Value) -> Result<i64, DispatchError> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    let n = parse_number(field, value)?;
    if n.fract() != 0.0 || n < i64::MIN as f64 || n > i64::MAX as f64 {
        return Err(DispatchError::validation(
            field,
            format!("must be a whole number, got {}", describe(value)),
        ));
    }
    Ok(n as i64)
}

fn parse_u32_at_least(field: &str, value: &Value, min: u32) -> Result<u32, DispatchError> {
    let n = parse_integer(field, value)?;
    if n < i64::from(min) {
        return Err(DispatchError::validation(
            field,
            format!("must be at least {min}, got {n}"),
        ));
    }
    u32::try_from(n).map_err(|_| {
        DispatchError::validation(field, format!("must be at most {}, got {n}", u32::MAX))
    })
}

/// A resize target side, at least `min` and at most [`MAX_DIMENSION`].
fn parse_dimension(field: &str, value: &Value, min: u32) -> Result<u32, DispatchError> {
    let n = parse_u32_at_least(field, value, min)?;
    if n > MAX_DIMENSION {
        return Err(DispatchError::validation(
            field,
            format!("must be at most {MAX_DIMENSION}, got {n}"),
        ));
    }
    Ok(n)
}

/// Resize axis: zero means "not constraining this axis".
fn parse_axis(field: &str, value: &Value) -> Result<Option<u32>, DispatchError> {
    let n = parse_dimension(field, value, 0)?;
    Ok((n > 0).then_some(n))
}

fn parse_angle(field: &str, value: &Value) -> Result<f64, DispatchError> {
    parse_number(field, value)
}

fn parse_bool(field: &str, value: &Value) -> Result<bool, DispatchError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        other => Err(DispatchError::validation(
            field,
            format!("must be a boolean, got {}", describe(other)),
        )),
    }
}

fn parse_quality(field: &str, value: &Value) -> Result<Quality, DispatchError> {
    let n = parse_integer(field, value)?;
    u32::try_from(n)
        .ok()
        .and_then(Quality::new)
        .ok_or_else(|| {
            DispatchError::validation(
                field,
                format!(
                    "must be between {} and {}, got {n}",
                    Quality::MIN,
                    Quality::MAX
                ),
            )
        })
}

fn parse_fit(field: &str, value: &Value) -> Result<FitMode, DispatchError> {
    let s = parse_str(field, value)?;
    s.parse().map_err(|()| {
        DispatchError::validation(
            field,
            format!("{}, got `{s}`", one_of(&FitMode::ALL.map(FitMode::as_str))),
        )
    })
}

fn parse_format(field: &str, value: &Value) -> Result<OutputFormat, DispatchError> {
    let s = parse_str(field, value)?;
    s.parse().map_err(|()| {
        DispatchError::validation(
            field,
            format!(
                "{}, got `{s}`",
                one_of(&OutputFormat::ALL.map(OutputFormat::as_str))
            ),
        )
    })
}

fn parse_direction(field: &str, value: &Value) -> Result<FlipDirection, DispatchError> {
    let s = parse_str(field, value)?;
    s.parse().map_err(|()| {
        DispatchError::validation(
            field,
            format!(
                "{}, got `{s}`",
                one_of(&FlipDirection::ALL.map(FlipDirection::as_str))
            ),
        )
    })
}

fn parse_color(field: &str, value: &Value) -> Result<Color, DispatchError> {
    let s = parse_str(field, value)?;
    s.parse().map_err(|_| {
        DispatchError::validation(
            field,
            format!("must be a hex (#rgb, #rrggbb, #rrggbbaa) or named color, got `{s}`"),
        )
    })
}

fn parse_sizes(field: &str, value: &Value) -> Result<Vec<SizeSpec>, DispatchError> {
    let items = value.as_array().ok_or_else(|| {
        DispatchError::validation(field, format!("must be an array, got {}", describe(value)))
    })?;
    if items.is_empty() {
        return Err(DispatchError::validation(
            field,
            "must contain at least one size",
        ));
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let at = |name: &str| format!("{field}[{i}].{name}");
            let spec = item.as_object().ok_or_else(|| {
                DispatchError::validation(
                    format!("{field}[{i}]"),
                    format!("must be an object, got {}", describe(item)),
                )
            })?;
            let get = |name: &str| spec.get(name).filter(|v| !v.is_null());

            let width = get("width")
                .ok_or_else(|| DispatchError::validation(at("width"), "is required"))
                .and_then(|v| parse_dimension(&at("width"), v, 1))?;
            let height = get("height")
                .map(|v| parse_axis(&at("height"), v))
                .transpose()?
                .flatten();
            let suffix = get("suffix")
                .ok_or_else(|| DispatchError::validation(at("suffix"), "is required"))
                .and_then(|v| parse_str(&at("suffix"), v))?;

            Ok(SizeSpec {
                width,
                height,
                suffix: suffix.to_string(),
            })
        })
        .collect()
}
