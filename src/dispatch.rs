//! Request dispatch.
//!
//! ```text
//! OperationRequest ─► resolve ─► compile ─► create dirs ─► engine ─► OperationOutcome
//!                       │           │                        │
//!                  Validation    Validation              Engine / Filesystem
//!                  NotFound      Engine (probe)
//! ```
//!
//! Validation and not-found errors are raised before anything touches the
//! filesystem. Every request gets its own tracing span named after the
//! operation.

use crate::batch::run_batch;
use crate::catalog::{ToolDescriptor, tool_descriptors};
use crate::config::ServerConfig;
use crate::error::DispatchError;
use crate::imaging::ImageBackend;
use crate::outcome::{CompressionReport, ImageReport, OperationOutcome};
use crate::paths;
use crate::pipeline::{PipelineCompiler, Plan};
use crate::resolve::resolve;
use serde::Deserialize;
use serde_json::{Map, Value};

/// One incoming call: an operation name and its raw arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl OperationRequest {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Routes requests to the catalog and runs them against one image engine.
pub struct Dispatcher<B: ImageBackend> {
    backend: B,
    config: ServerConfig,
}

impl<B: ImageBackend> Dispatcher<B> {
    pub fn new(backend: B, config: ServerConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The catalog as advertised to callers, with configured defaults filled in.
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        tool_descriptors(&self.config.defaults)
    }

    pub fn dispatch(&self, request: &OperationRequest) -> Result<OperationOutcome, DispatchError> {
        let span = tracing::info_span!("dispatch", operation = %request.name);
        let _enter = span.enter();

        let result = self.run(request);
        match &result {
            Ok(outcome) if outcome.success => tracing::info!("completed"),
            Ok(_) => tracing::warn!("completed with failed items"),
            Err(e) => tracing::warn!(kind = e.kind(), error = %e, "failed"),
        }
        result
    }

    fn run(&self, request: &OperationRequest) -> Result<OperationOutcome, DispatchError> {
        let op = resolve(&request.name, &request.arguments, &self.config.defaults)?;
        let compiler = PipelineCompiler::new(&self.backend);

        match compiler.compile(&op)? {
            Plan::Inspect(path) => {
                let info = self.backend.probe(path)?;
                let stat = paths::stat(path)?;
                Ok(OperationOutcome::inspected(ImageReport::new(&info, &stat)))
            }
            Plan::Write { pipeline, written } => {
                paths::ensure_writable(&pipeline.destination)?;
                tracing::debug!(pipeline = %pipeline.describe(), "executing");
                self.backend.execute(&pipeline)?;
                Ok(OperationOutcome::written(written, &pipeline.destination))
            }
            Plan::Compress(pipeline) => {
                // Read before writing: the output may replace the input.
                let original = paths::stat(&pipeline.source)?.size;

                paths::ensure_writable(&pipeline.destination)?;
                tracing::debug!(pipeline = %pipeline.describe(), "executing");
                self.backend.execute(&pipeline)?;

                let compressed = paths::stat(&pipeline.destination)?.size;
                Ok(OperationOutcome::compressed(
                    &pipeline.destination,
                    CompressionReport::new(original, compressed),
                ))
            }
            Plan::Batch { params, items } => {
                tracing::debug!(items = items.len(), "running batch");
                let report = run_batch(&self.backend, params, items, &self.config.batch)?;
                Ok(OperationOutcome::batch(report))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp, jpeg_info};
    use crate::imaging::{EncodeStep, ImageFormat, Quality};
    use crate::outcome::OutcomeDetails;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn request(name: &str, arguments: Value) -> OperationRequest {
        match arguments {
            Value::Object(map) => OperationRequest::new(name, map),
            _ => panic!("arguments must be an object"),
        }
    }

    fn dispatcher(backend: MockBackend) -> Dispatcher<MockBackend> {
        Dispatcher::new(backend, ServerConfig::default())
    }

    #[test]
    fn unknown_operation_touches_nothing() {
        let d = dispatcher(MockBackend::new());
        let err = d
            .dispatch(&request("sharpen_image", json!({"inputPath": "x.jpg"})))
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(ref n) if n == "sharpen_image"));
        assert!(d.backend().get_operations().is_empty());
    }

    #[test]
    fn validation_error_precedes_any_side_effect() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(MockBackend::new());
        let output = tmp.path().join("new/dir/out.jpg");
        let err = d
            .dispatch(&request(
                "compress_image",
                json!({"inputPath": "in.jpg", "outputPath": output, "quality": 0}),
            ))
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(!tmp.path().join("new").exists());
        assert!(d.backend().get_operations().is_empty());
    }

    #[test]
    fn resize_creates_parent_dirs_and_reports_destination() {
        let tmp = TempDir::new().unwrap();
        let d = dispatcher(MockBackend::new());
        let output = tmp.path().join("a/b/out.png");
        let outcome = d
            .dispatch(&request(
                "resize_image",
                json!({"inputPath": "in.jpg", "outputPath": output, "width": 640}),
            ))
            .unwrap();

        assert!(outcome.success);
        assert_eq!(
            outcome.message,
            format!("Image resized successfully. Saved to: {}", output.display())
        );
        assert!(output.exists());
        assert_eq!(d.backend().executed()[0].encode, EncodeStep::plain(ImageFormat::Png));
    }

    #[test]
    fn engine_failure_is_wrapped_as_internal() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("out.jpg");
        backend.fail_on(&output);
        let d = dispatcher(backend);

        let err = d
            .dispatch(&request(
                "flip_image",
                json!({"inputPath": "in.jpg", "outputPath": output, "direction": "both"}),
            ))
            .unwrap_err();
        assert_eq!(err.kind(), "engine");
        assert_eq!(err.class().code(), -32603);
        assert!(err.to_string().starts_with("Image processing error: "));
    }

    #[test]
    fn compress_reports_byte_delta() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.jpg");
        fs::write(&input, vec![1u8; 1000]).unwrap();
        let output = tmp.path().join("out.jpg");

        let backend = MockBackend {
            output_bytes: 750,
            ..MockBackend::new()
        };
        backend.add_image(&input, jpeg_info(100, 100));
        let d = dispatcher(backend);

        let outcome = d
            .dispatch(&request(
                "compress_image",
                json!({"inputPath": input, "outputPath": output, "quality": 60}),
            ))
            .unwrap();

        assert!(outcome.message.ends_with("Size reduction: 25.0% (1000 → 750 bytes)"));
        let Some(OutcomeDetails::Compression(report)) = outcome.details else {
            panic!("expected compression details")
        };
        assert_eq!(report.savings_percent, 25.0);

        let executed = d.backend().executed();
        assert_eq!(
            executed[0].encode,
            EncodeStep {
                format: ImageFormat::Jpeg,
                quality: Quality::new(60),
                progressive: true,
            }
        );
    }

    #[test]
    fn compress_growth_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.jpg");
        fs::write(&input, vec![1u8; 100]).unwrap();
        let output = tmp.path().join("out.jpg");

        let backend = MockBackend {
            output_bytes: 150,
            ..MockBackend::new()
        };
        backend.add_image(&input, jpeg_info(10, 10));
        let d = dispatcher(backend);

        let outcome = d
            .dispatch(&request(
                "compress_image",
                json!({"inputPath": input, "outputPath": output}),
            ))
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.message.contains("Size reduction: -50.0%"));
    }

    #[test]
    fn info_probes_and_stats_without_writing() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("photo.jpg");
        fs::write(&input, vec![0u8; 2048]).unwrap();
        let d = dispatcher(MockBackend::with_image(&input, jpeg_info(1920, 1080)));

        let outcome = d
            .dispatch(&request("get_image_info", json!({"inputPath": input})))
            .unwrap();

        let doc: Value = serde_json::from_str(&outcome.message).unwrap();
        assert_eq!(doc["format"], "jpeg");
        assert_eq!(doc["width"], 1920);
        assert_eq!(doc["height"], 1080);
        assert_eq!(doc["fileSize"], 2048);
        assert!(d.backend().executed().is_empty());
        assert!(matches!(
            d.backend().get_operations()[0],
            RecordedOp::Probe(_)
        ));
    }

    #[test]
    fn batch_with_failed_item_is_unsuccessful_outcome() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let out_dir = tmp.path().join("sizes");
        backend.fail_on(out_dir.join("p-b.jpg"));
        let d = dispatcher(backend);

        let outcome = d
            .dispatch(&request(
                "batch_resize",
                json!({
                    "inputPath": tmp.path().join("p.jpg"),
                    "outputDir": out_dir,
                    "sizes": [
                        {"width": 100, "suffix": "-a"},
                        {"width": 200, "suffix": "-b"},
                        {"width": 300, "suffix": "-c"}
                    ]
                }),
            ))
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Batch resize completed with errors. Generated 2 of 3"));
        let Some(OutcomeDetails::Batch(report)) = outcome.details else {
            panic!("expected batch details")
        };
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn batch_honours_fail_fast_config() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let out_dir = tmp.path().join("sizes");
        backend.fail_on(out_dir.join("p-a.webp"));
        let config = ServerConfig {
            batch: BatchConfig {
                max_parallel: 1,
                fail_fast: true,
            },
            ..ServerConfig::default()
        };
        let d = Dispatcher::new(backend, config);

        let outcome = d
            .dispatch(&request(
                "batch_resize",
                json!({
                    "inputPath": "p.jpg",
                    "outputDir": out_dir,
                    "format": "webp",
                    "sizes": [{"width": 100, "suffix": "-a"}, {"width": 200, "suffix": "-b"}]
                }),
            ))
            .unwrap();

        assert!(outcome.message.contains("Skipped: "));
        assert_eq!(d.backend().executed().len(), 1);
    }

    #[test]
    fn tools_carry_configured_defaults() {
        let mut config = ServerConfig::default();
        config.defaults.set(
            crate::catalog::OperationKind::ConvertFormat,
            "quality",
            json!(65),
        );
        let d = Dispatcher::new(MockBackend::new(), config);
        let tools = d.tools();
        assert_eq!(tools.len(), 8);
        assert_eq!(tools[1].input_schema["properties"]["quality"]["default"], 65);
    }
}
