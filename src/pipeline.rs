//! Pipeline compilation: resolved operations → ordered transform steps.
//!
//! Every write ends in an explicit [`EncodeStep`]. Its format is, in order:
//!
//! 1. the operation's own format (`convert_format`, `batch_resize` with `format`,
//!    and `compress_image`, which keeps the source's format)
//! 2. the format named by the destination's extension
//! 3. the source's probed format, when the destination has no extension
//!
//! A destination extension that names no supported format is rejected before
//! anything is written.
//!
//! The compiler only probes the source when a rule needs it, so most
//! operations compile without touching the filesystem.

use crate::catalog::{BatchResizeParams, Operation, SizeSpec};
use crate::error::DispatchError;
use crate::imaging::{
    EncodeStep, FitMode, ImageBackend, ImageFormat, Pipeline, Quality, TransformStep,
};
use crate::outcome::Written;
use crate::paths::derive_batch_name;
use std::path::Path;

/// What the dispatcher has to run for one operation.
#[derive(Debug)]
pub enum Plan<'op> {
    /// One pipeline, one output file, reported with a fixed message.
    Write { pipeline: Pipeline, written: Written },
    /// Re-encode in the source's own format, reported with the size change.
    Compress(Pipeline),
    /// Read-only metadata probe of the given file; nothing is written.
    Inspect(&'op Path),
    /// One independent pipeline per size, in request order.
    Batch {
        params: &'op BatchResizeParams,
        items: Vec<BatchItem<'op>>,
    },
}

/// One compiled batch item.
#[derive(Debug)]
pub struct BatchItem<'op> {
    pub spec: &'op SizeSpec,
    pub pipeline: Pipeline,
}

/// Compiles operations against one image engine.
pub struct PipelineCompiler<'a, B: ImageBackend> {
    backend: &'a B,
}

impl<'a, B: ImageBackend> PipelineCompiler<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    pub fn compile<'op>(&self, op: &'op Operation) -> Result<Plan<'op>, DispatchError> {
        let (pipeline, written) = match op {
            Operation::Resize(p) => {
                let mut steps = Vec::new();
                if p.width.is_some() || p.height.is_some() {
                    steps.push(TransformStep::Resize {
                        width: p.width,
                        height: p.height,
                        fit: p.fit,
                        without_enlargement: p.preserve_aspect_ratio,
                    });
                }
                let pipeline = Pipeline {
                    source: p.input.clone(),
                    destination: p.output.clone(),
                    steps,
                    encode: EncodeStep::plain(self.output_format(&p.input, &p.output, "outputPath")?),
                };
                (pipeline, Written::Resized)
            }
            Operation::ConvertFormat(p) => {
                let format = p.format.image_format();
                let pipeline = Pipeline {
                    source: p.input.clone(),
                    destination: p.output.clone(),
                    steps: Vec::new(),
                    encode: EncodeStep {
                        format,
                        quality: Some(p.quality),
                        progressive: format == ImageFormat::Jpeg,
                    },
                };
                (pipeline, Written::Converted(p.format))
            }
            Operation::Crop(p) => {
                let pipeline = Pipeline {
                    source: p.input.clone(),
                    destination: p.output.clone(),
                    steps: vec![TransformStep::Extract {
                        left: p.left,
                        top: p.top,
                        width: p.width,
                        height: p.height,
                    }],
                    encode: EncodeStep::plain(self.output_format(&p.input, &p.output, "outputPath")?),
                };
                (pipeline, Written::Cropped)
            }
            Operation::Compress(p) => {
                let format = self.backend.probe(&p.input)?.format;
                let encode = if format.accepts_quality() {
                    EncodeStep {
                        format,
                        quality: Some(p.quality),
                        progressive: format == ImageFormat::Jpeg && p.progressive,
                    }
                } else {
                    tracing::debug!(%format, "no quality setting for source format, re-encoding as is");
                    EncodeStep::plain(format)
                };
                return Ok(Plan::Compress(Pipeline {
                    source: p.input.clone(),
                    destination: p.output.clone(),
                    steps: Vec::new(),
                    encode,
                }));
            }
            Operation::Rotate(p) => {
                let pipeline = Pipeline {
                    source: p.input.clone(),
                    destination: p.output.clone(),
                    steps: vec![TransformStep::Rotate {
                        degrees: p.angle,
                        background: p.background,
                    }],
                    encode: EncodeStep::plain(self.output_format(&p.input, &p.output, "outputPath")?),
                };
                (pipeline, Written::Rotated(p.angle))
            }
            Operation::Flip(p) => {
                let mut steps = Vec::new();
                if p.direction.mirrors_horizontally() {
                    steps.push(TransformStep::Flop);
                }
                if p.direction.mirrors_vertically() {
                    steps.push(TransformStep::Flip);
                }
                let pipeline = Pipeline {
                    source: p.input.clone(),
                    destination: p.output.clone(),
                    steps,
                    encode: EncodeStep::plain(self.output_format(
                        &p.input,
                        &p.output,
                        "outputPath",
                    )?),
                };
                (pipeline, Written::Flipped(p.direction))
            }
            Operation::GetImageInfo(p) => return Ok(Plan::Inspect(&p.input)),
            Operation::BatchResize(params) => {
                let items = self.compile_batch(params)?;
                return Ok(Plan::Batch { params, items });
            }
        };
        Ok(Plan::Write { pipeline, written })
    }

    /// One cover-fit, never-enlarging resize per size, all sharing one encode step.
    pub fn compile_batch<'op>(
        &self,
        params: &'op BatchResizeParams,
    ) -> Result<Vec<BatchItem<'op>>, DispatchError> {
        let encode = match params.format {
            Some(format) => batch_encode(format.image_format(), params.quality),
            // Derived names keep the input's extension, so the input path
            // stands in for every destination here.
            None => EncodeStep::plain(self.output_format(
                &params.input,
                &params.input,
                "inputPath",
            )?),
        };

        Ok(params
            .sizes
            .iter()
            .map(|spec| BatchItem {
                spec,
                pipeline: Pipeline {
                    source: params.input.clone(),
                    destination: params.output_dir.join(derive_batch_name(
                        &params.input,
                        &spec.suffix,
                        params.format,
                    )),
                    steps: vec![TransformStep::Resize {
                        width: Some(spec.width),
                        height: spec.height,
                        fit: FitMode::Cover,
                        without_enlargement: true,
                    }],
                    encode,
                },
            })
            .collect())
    }

    fn output_format(
        &self,
        source: &Path,
        destination: &Path,
        field: &str,
    ) -> Result<ImageFormat, DispatchError> {
        match destination.extension() {
            Some(ext) => ext
                .to_str()
                .and_then(ImageFormat::from_extension)
                .ok_or_else(|| {
                    DispatchError::validation(
                        field,
                        format!(
                            "extension `.{}` does not name a supported format \
                             (jpeg, jpg, png, webp, avif, tif, tiff)",
                            ext.to_string_lossy()
                        ),
                    )
                }),
            None => Ok(self.backend.probe(source)?.format),
        }
    }
}

/// PNG output is written losslessly at default effort; JPEG is progressive.
fn batch_encode(format: ImageFormat, quality: Quality) -> EncodeStep {
    EncodeStep {
        format,
        quality: (format != ImageFormat::Png).then_some(quality),
        progressive: format == ImageFormat::Jpeg,
    }
}
