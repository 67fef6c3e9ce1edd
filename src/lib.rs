//! # Imagician
//!
//! A fixed catalog of image operations (resize, convert, crop, compress,
//! rotate, flip, inspect, multi-size batch) served to an external caller over
//! a line-based JSON-RPC protocol on stdio.
//!
//! # Architecture: Resolve → Compile → Execute
//!
//! Every request flows through the same three steps:
//!
//! ```text
//! 1. Resolve   {name, arguments}  →  Operation      (validation, defaults, coercion)
//! 2. Compile   Operation          →  Plan           (ordered steps + explicit encode)
//! 3. Execute   Plan               →  OperationOutcome (image engine + filesystem)
//! ```
//!
//! Resolution and compilation are pure apart from an occasional metadata
//! probe, so almost all request logic is unit tested against a recording
//! mock engine without decoding a single pixel.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | The eight operations: names, JSON schemas, typed parameter records |
//! | [`resolve`] | Raw arguments → [`catalog::Operation`], with defaults and domain checks |
//! | [`pipeline`] | [`catalog::Operation`] → transform steps ending in one encode step |
//! | [`batch`] | Runs the per-size pipelines of `batch_resize`, sequentially or on a bounded pool |
//! | [`dispatch`] | Ties the above together and formats outcomes |
//! | [`outcome`] | Success payloads: messages, image metadata, compression and batch reports |
//! | [`paths`] | Destination directories, batch file names, file stats |
//! | [`protocol`] | Newline-delimited JSON-RPC transport over stdin/stdout |
//! | [`config`] | `config.toml` loading: the defaults table, batch policy, log level |
//! | [`error`] | [`error::DispatchError`] and its wire classes |
//! | [`imaging`] | Engine boundary: [`imaging::ImageBackend`] and the statically linked implementation |
//! | [`logging`] | `tracing` subscriber writing to stderr |
//!
//! # Design Decisions
//!
//! ## Closed Operation Enum
//!
//! Operation names are matched exactly once, in [`resolve`]. Everything
//! downstream matches on [`catalog::Operation`], so the compiler reports any
//! code path that forgets an operation.
//!
//! ## One Defaults Table
//!
//! Fallbacks for optional arguments (fit mode, quality, progressive,
//! background) live in [`config::Defaults`], are checked at startup by the
//! same validators that check caller input, and are advertised in the tool
//! schemas.
//!
//! ## Explicit Output Format
//!
//! Writes never rely on the engine guessing a format from a file name. The
//! compiler picks the format (operation argument, destination extension,
//! then the probed source format) and records it in the pipeline's encode
//! step.
//!
//! ## Best-Effort Batches
//!
//! A failed batch item does not hide the others: every size is reported with
//! its own status, in request order. `batch.fail_fast` switches to skipping
//! the remaining items instead.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, resampling and
//! most encoders, `rav1e` for AVIF output and `rav1d` for AVIF input. No
//! system libraries are needed.

pub mod batch;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod imaging;
pub mod logging;
pub mod outcome;
pub mod paths;
pub mod pipeline;
pub mod protocol;
pub mod resolve;
