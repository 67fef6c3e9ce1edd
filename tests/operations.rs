//! End-to-end operation tests against the pure-Rust engine.
//!
//! Every test writes synthetic images into a temp dir, dispatches one
//! request, and checks the files that come out.

use image::{ImageReader, Rgb, RgbImage};
use imagician::config::{BatchConfig, ServerConfig};
use imagician::dispatch::{Dispatcher, OperationRequest};
use imagician::error::DispatchError;
use imagician::imaging::RustBackend;
use imagician::outcome::{OperationOutcome, OutcomeDetails};
use serde_json::{Value, json};
use std::path::Path;
use tempfile::TempDir;

fn dispatcher() -> Dispatcher<RustBackend> {
    Dispatcher::new(RustBackend::new(), ServerConfig::default())
}

fn call(d: &Dispatcher<RustBackend>, name: &str, args: Value) -> Result<OperationOutcome, DispatchError> {
    let Value::Object(arguments) = args else {
        panic!("arguments must be an object")
    };
    d.dispatch(&OperationRequest::new(name, arguments))
}

fn write_gradient(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
    .save(path)
    .unwrap();
}

/// Solid blue image with one red pixel in the top-left corner.
fn write_marked(path: &Path, width: u32, height: u32) {
    let mut img = RgbImage::from_pixel(width, height, Rgb([0, 0, 255]));
    img.put_pixel(0, 0, Rgb([255, 0, 0]));
    img.save(path).unwrap();
}

fn dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

/// Frame marker of a JPEG file: 0xC0 baseline, 0xC2 progressive.
fn jpeg_frame_marker(path: &Path) -> Option<u8> {
    let bytes = std::fs::read(path).unwrap();
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        let marker = bytes[pos + 1];
        if (0xC0..=0xCF).contains(&marker) && ![0xC4, 0xC8, 0xCC].contains(&marker) {
            return Some(marker);
        }
        pos += 2 + u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
    }
    None
}

fn sniffed_format(path: &Path) -> image::ImageFormat {
    ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .format()
        .unwrap()
}

#[test]
fn info_on_full_hd_jpeg() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("hd.jpg");
    write_gradient(&input, 1920, 1080);

    let outcome = call(&dispatcher(), "get_image_info", json!({"inputPath": input})).unwrap();
    let doc: Value = serde_json::from_str(&outcome.message).unwrap();

    assert_eq!(doc["format"], "jpeg");
    assert_eq!(doc["width"], 1920);
    assert_eq!(doc["height"], 1080);
    assert_eq!(doc["channels"], 3);
    assert_eq!(doc["hasAlpha"], false);
    assert_eq!(doc["fileSize"], std::fs::metadata(&input).unwrap().len());
    assert!(doc["lastModified"].as_str().unwrap().ends_with('Z'));
}

#[test]
fn info_on_missing_file_is_filesystem_error() {
    let tmp = TempDir::new().unwrap();
    let err = call(
        &dispatcher(),
        "get_image_info",
        json!({"inputPath": tmp.path().join("nope.png")}),
    )
    .unwrap_err();
    assert_eq!(err.kind(), "filesystem");
    assert_eq!(err.class().code(), -32603);
}

#[test]
fn resize_width_only_never_exceeds_or_enlarges() {
    let tmp = TempDir::new().unwrap();
    let large = tmp.path().join("large.png");
    let small = tmp.path().join("small.png");
    write_gradient(&large, 1600, 1200);
    write_gradient(&small, 400, 300);
    let d = dispatcher();

    let out = tmp.path().join("out/large.png");
    call(&d, "resize_image", json!({"inputPath": large, "outputPath": out, "width": 800})).unwrap();
    assert_eq!(dimensions(&out), (800, 600));

    let out = tmp.path().join("out/small.png");
    call(&d, "resize_image", json!({"inputPath": small, "outputPath": out, "width": 800})).unwrap();
    assert_eq!(dimensions(&out), (400, 300));
}

#[test]
fn resize_without_dimensions_rewrites_unchanged() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.png");
    write_gradient(&input, 64, 48);
    let out = tmp.path().join("copy.webp");

    let outcome = call(
        &dispatcher(),
        "resize_image",
        json!({"inputPath": input, "outputPath": out, "width": 0}),
    )
    .unwrap();

    assert!(outcome.success);
    assert_eq!(dimensions(&out), (64, 48));
    assert_eq!(sniffed_format(&out), image::ImageFormat::WebP);
}

#[test]
fn resize_to_unknown_extension_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.png");
    write_gradient(&input, 16, 16);
    let out = tmp.path().join("sub/out.gif");

    let err = call(
        &dispatcher(),
        "resize_image",
        json!({"inputPath": input, "outputPath": out, "width": 8}),
    )
    .unwrap_err();

    assert_eq!(err.kind(), "validation");
    assert!(!tmp.path().join("sub").exists());
}

#[test]
fn convert_png_to_jpeg_ignores_destination_extension() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.png");
    write_gradient(&input, 32, 32);
    let out = tmp.path().join("converted.img");

    let outcome = call(
        &dispatcher(),
        "convert_format",
        json!({"inputPath": input, "outputPath": out, "format": "jpg", "quality": 70}),
    )
    .unwrap();

    assert_eq!(
        outcome.message,
        format!("Image converted to jpg format. Saved to: {}", out.display())
    );
    assert_eq!(sniffed_format(&out), image::ImageFormat::Jpeg);
}

#[test]
fn convert_to_jpeg_is_always_progressive() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.png");
    write_gradient(&input, 64, 64);
    let out = tmp.path().join("out.jpg");

    call(
        &dispatcher(),
        "convert_format",
        json!({"inputPath": input, "outputPath": out, "format": "jpeg"}),
    )
    .unwrap();

    assert_eq!(jpeg_frame_marker(&out), Some(0xC2));
}

#[test]
fn compress_honours_progressive_argument() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.jpg");
    write_gradient(&input, 64, 64);
    let d = dispatcher();

    let default_out = tmp.path().join("default.jpg");
    call(&d, "compress_image", json!({"inputPath": input, "outputPath": default_out})).unwrap();
    assert_eq!(jpeg_frame_marker(&default_out), Some(0xC2));

    let baseline_out = tmp.path().join("baseline.jpg");
    call(
        &d,
        "compress_image",
        json!({"inputPath": input, "outputPath": baseline_out, "progressive": false}),
    )
    .unwrap();
    assert_eq!(jpeg_frame_marker(&baseline_out), Some(0xC0));
}

#[test]
fn convert_to_webp_applies_quality() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.png");
    write_gradient(&input, 256, 256);
    let d = dispatcher();

    let size_at = |quality: u32| {
        let out = tmp.path().join(format!("q{quality}.webp"));
        call(
            &d,
            "convert_format",
            json!({"inputPath": input, "outputPath": out, "format": "webp", "quality": quality}),
        )
        .unwrap();
        assert_eq!(sniffed_format(&out), image::ImageFormat::WebP);
        std::fs::metadata(&out).unwrap().len()
    };

    assert!(size_at(5) < size_at(95));
}

#[test]
fn resize_beyond_dimension_limit_is_rejected_before_decoding() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("tiny.png");
    write_gradient(&input, 8, 8);
    let out = tmp.path().join("huge.png");

    let err = call(
        &dispatcher(),
        "resize_image",
        json!({
            "inputPath": input, "outputPath": out,
            "width": 4294967295u64, "height": 4294967295u64,
            "fit": "fill", "preserveAspectRatio": false
        }),
    )
    .unwrap_err();

    assert!(matches!(err, DispatchError::Validation { ref field, .. } if field == "width"));
    assert!(!out.exists());
}

#[test]
fn resize_growing_one_axis_past_limit_is_engine_error() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("sliver.png");
    write_gradient(&input, 1, 100);
    let out = tmp.path().join("wide.png");

    let err = call(
        &dispatcher(),
        "resize_image",
        json!({"inputPath": input, "outputPath": out, "width": 16383, "preserveAspectRatio": false}),
    )
    .unwrap_err();

    assert!(matches!(err, DispatchError::Engine(_)));
    assert!(!out.exists());
}

#[test]
fn info_reports_jfif_density() {
    use image::ImageEncoder;
    use image::codecs::jpeg::{JpegEncoder, PixelDensity};

    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("print.jpg");
    let img = RgbImage::from_pixel(20, 10, Rgb([90, 90, 90]));
    let mut encoder = JpegEncoder::new(std::fs::File::create(&input).unwrap());
    encoder.set_pixel_density(PixelDensity::dpi(240));
    encoder
        .write_image(img.as_raw(), 20, 10, image::ExtendedColorType::Rgb8)
        .unwrap();

    let outcome = call(&dispatcher(), "get_image_info", json!({"inputPath": input})).unwrap();
    let doc: Value = serde_json::from_str(&outcome.message).unwrap();
    assert_eq!(doc["density"], 240.0);
}

#[test]
fn crop_within_bounds_is_exact() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.png");
    write_gradient(&input, 100, 80);
    let out = tmp.path().join("crop.png");

    call(
        &dispatcher(),
        "crop_image",
        json!({"inputPath": input, "outputPath": out, "left": 10, "top": 20, "width": 50, "height": 40}),
    )
    .unwrap();

    assert_eq!(dimensions(&out), (50, 40));
    let cropped = image::open(&out).unwrap().to_rgb8();
    // Gradient encodes coordinates; top-left of the crop is source (10, 20)
    assert_eq!(cropped.get_pixel(0, 0), &Rgb([10, 20, 30]));
}

#[test]
fn crop_outside_bounds_is_engine_error() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.png");
    write_gradient(&input, 100, 80);
    let out = tmp.path().join("crop.png");

    let err = call(
        &dispatcher(),
        "crop_image",
        json!({"inputPath": input, "outputPath": out, "left": 60, "top": 0, "width": 50, "height": 40}),
    )
    .unwrap_err();

    assert!(matches!(err, DispatchError::Engine(_)));
    assert!(err.to_string().starts_with("Image processing error: "));
    assert!(!out.exists());
}

#[test]
fn compress_reports_actual_savings() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.jpg");
    write_gradient(&input, 256, 256);
    let out = tmp.path().join("small.jpg");

    let outcome = call(
        &dispatcher(),
        "compress_image",
        json!({"inputPath": input, "outputPath": out, "quality": 20}),
    )
    .unwrap();

    let original = std::fs::metadata(&input).unwrap().len();
    let compressed = std::fs::metadata(&out).unwrap().len();
    let expected = ((original as f64 - compressed as f64) / original as f64 * 100.0 * 10.0).round() / 10.0;

    let Some(OutcomeDetails::Compression(report)) = outcome.details else {
        panic!("expected compression details")
    };
    assert_eq!(report.original_bytes, original);
    assert_eq!(report.compressed_bytes, compressed);
    assert_eq!(report.savings_percent, expected);
    assert!(outcome.message.contains(&format!("({original} → {compressed} bytes)")));
    assert_eq!(sniffed_format(&out), image::ImageFormat::Jpeg);
}

#[test]
fn compress_in_place_compares_against_original_size() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("photo.jpg");
    write_gradient(&path, 128, 128);
    let before = std::fs::metadata(&path).unwrap().len();

    let outcome = call(
        &dispatcher(),
        "compress_image",
        json!({"inputPath": path, "outputPath": path, "quality": 10}),
    )
    .unwrap();

    let Some(OutcomeDetails::Compression(report)) = outcome.details else {
        panic!("expected compression details")
    };
    assert_eq!(report.original_bytes, before);
}

#[test]
fn rotate_right_angle_swaps_dimensions() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.png");
    write_gradient(&input, 40, 20);
    let out = tmp.path().join("rot.png");

    let outcome = call(
        &dispatcher(),
        "rotate_image",
        json!({"inputPath": input, "outputPath": out, "angle": 450}),
    )
    .unwrap();

    assert_eq!(
        outcome.message,
        format!("Image rotated 450° successfully. Saved to: {}", out.display())
    );
    assert_eq!(dimensions(&out), (20, 40));
}

#[test]
fn flip_both_moves_corner_to_opposite_corner() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.png");
    write_marked(&input, 4, 3);
    let out = tmp.path().join("flipped.png");

    call(
        &dispatcher(),
        "flip_image",
        json!({"inputPath": input, "outputPath": out, "direction": "both"}),
    )
    .unwrap();

    let flipped = image::open(&out).unwrap().to_rgb8();
    assert_eq!(flipped.get_pixel(3, 2), &Rgb([255, 0, 0]));
    assert_eq!(flipped.get_pixel(0, 0), &Rgb([0, 0, 255]));
}

#[test]
fn batch_without_format_keeps_extension_and_order() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("photo.jpg");
    write_gradient(&input, 1200, 800);
    let out_dir = tmp.path().join("sizes");

    let outcome = call(
        &dispatcher(),
        "batch_resize",
        json!({
            "inputPath": input,
            "outputDir": out_dir,
            "sizes": [
                {"width": 600, "suffix": "-medium"},
                {"width": 150, "height": 150, "suffix": "-thumb"},
                {"width": 2400, "suffix": "-huge"}
            ]
        }),
    )
    .unwrap();

    assert!(outcome.success);
    let expected: Vec<_> = ["-medium", "-thumb", "-huge"]
        .iter()
        .map(|s| out_dir.join(format!("photo{s}.jpg")))
        .collect();
    let listed: Vec<&str> = outcome.message.lines().skip(1).collect();
    assert_eq!(
        listed,
        expected.iter().map(|p| p.to_str().unwrap()).collect::<Vec<_>>()
    );

    assert_eq!(dimensions(&expected[0]), (600, 400));
    assert_eq!(dimensions(&expected[1]), (150, 150));
    // Never enlarged
    assert_eq!(dimensions(&expected[2]), (1200, 800));
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 3);
}

#[test]
fn batch_with_format_changes_extension() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("photo.png");
    write_gradient(&input, 300, 200);
    let out_dir = tmp.path().join("webp");

    call(
        &dispatcher(),
        "batch_resize",
        json!({
            "inputPath": input,
            "outputDir": out_dir,
            "format": "webp",
            "sizes": [{"width": 100, "suffix": "@1x"}, {"width": 200, "suffix": "@2x"}]
        }),
    )
    .unwrap();

    for (suffix, width) in [("@1x", 100), ("@2x", 200)] {
        let path = out_dir.join(format!("photo{suffix}.webp"));
        assert_eq!(sniffed_format(&path), image::ImageFormat::WebP);
        assert_eq!(dimensions(&path).0, width);
    }
}

#[test]
fn batch_on_unreadable_source_reports_every_item() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("broken.png");
    std::fs::write(&input, b"not a png").unwrap();
    let out_dir = tmp.path().join("out");

    let outcome = call(
        &dispatcher(),
        "batch_resize",
        json!({
            "inputPath": input,
            "outputDir": out_dir,
            "sizes": [{"width": 10, "suffix": "-a"}, {"width": 20, "suffix": "-b"}]
        }),
    )
    .unwrap();

    assert!(!outcome.success);
    let Some(OutcomeDetails::Batch(report)) = outcome.details else {
        panic!("expected batch details")
    };
    assert_eq!((report.total, report.failed), (2, 2));
    assert!(out_dir.is_dir());
}

#[test]
fn batch_fail_fast_skips_after_first_failure() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("broken.png");
    std::fs::write(&input, b"not a png").unwrap();
    let config = ServerConfig {
        batch: BatchConfig {
            max_parallel: 1,
            fail_fast: true,
        },
        ..ServerConfig::default()
    };
    let d = Dispatcher::new(RustBackend::new(), config);

    let outcome = call(
        &d,
        "batch_resize",
        json!({
            "inputPath": input,
            "outputDir": tmp.path().join("out"),
            "sizes": [{"width": 10, "suffix": "-a"}, {"width": 20, "suffix": "-b"}, {"width": 30, "suffix": "-c"}]
        }),
    )
    .unwrap();

    let Some(OutcomeDetails::Batch(report)) = outcome.details else {
        panic!("expected batch details")
    };
    assert_eq!((report.failed, report.skipped), (1, 2));
}

#[test]
fn parallel_batch_matches_sequential_output() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("photo.png");
    write_gradient(&input, 400, 400);
    let sizes: Vec<Value> = (1..=6)
        .map(|i| json!({"width": i * 50, "suffix": format!("-{i}")}))
        .collect();
    let config = ServerConfig {
        batch: BatchConfig {
            max_parallel: 3,
            fail_fast: false,
        },
        ..ServerConfig::default()
    };
    let d = Dispatcher::new(RustBackend::new(), config);

    let outcome = call(
        &d,
        "batch_resize",
        json!({"inputPath": input, "outputDir": tmp.path().join("par"), "sizes": sizes}),
    )
    .unwrap();

    assert!(outcome.success);
    let Some(OutcomeDetails::Batch(report)) = outcome.details else {
        panic!("expected batch details")
    };
    let widths: Vec<u32> = report.items.iter().map(|i| dimensions(Path::new(&i.output)).0).collect();
    assert_eq!(widths, [50, 100, 150, 200, 250, 300]);
}

#[test]
fn unknown_tool_is_not_found() {
    let err = call(&dispatcher(), "blur_image", json!({"inputPath": "x.png"})).unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(ref name) if name == "blur_image"));
    assert_eq!(err.class().code(), -32601);
}
