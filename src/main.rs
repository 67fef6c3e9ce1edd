use clap::{Parser, Subcommand};
use imagician::config;
use imagician::dispatch::{Dispatcher, OperationRequest};
use imagician::imaging::RustBackend;
use imagician::{logging, protocol};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "imagician")]
#[command(about = "Image transformation tools served over JSON-RPC on stdio")]
#[command(long_about = "\
Image transformation tools served over JSON-RPC on stdio

With no subcommand the server reads one JSON-RPC request per line from stdin
and writes one response per line to stdout. Logs go to stderr.

Tools:

  resize_image     inputPath, outputPath, [width], [height], [fit], [preserveAspectRatio]
  convert_format   inputPath, outputPath, format, [quality]
  crop_image       inputPath, outputPath, left, top, width, height
  compress_image   inputPath, outputPath, [quality], [progressive]
  rotate_image     inputPath, outputPath, angle, [background]
  flip_image       inputPath, outputPath, direction
  get_image_info   inputPath
  batch_resize     inputPath, outputDir, sizes[{width, suffix, [height]}], [format], [quality]

Example:

  imagician call resize_image --args '{\"inputPath\":\"in.jpg\",\"outputPath\":\"out.jpg\",\"width\":800}'

Run 'imagician gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the tool catalog over JSON-RPC on stdin/stdout (default)
    Serve,
    /// Run one operation and print its outcome as JSON
    Call {
        /// Operation name, e.g. resize_image
        operation: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Print the tool catalog with input schemas as JSON
    Tools,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Command::GenConfig)) {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let config = config::load_config(cli.config.as_deref())?;
    logging::init(&config.logging);
    let dispatcher = Dispatcher::new(RustBackend::new(), config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            protocol::serve(&dispatcher, std::io::stdin().lock(), std::io::stdout().lock())?;
        }
        Command::Call { operation, args } => {
            let arguments: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&args)?;
            match dispatcher.dispatch(&OperationRequest::new(operation, arguments)) {
                Ok(outcome) => {
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                    if !outcome.success {
                        return Ok(ExitCode::FAILURE);
                    }
                }
                Err(e) => {
                    eprintln!("error ({}): {e}", e.kind());
                    return Ok(ExitCode::from(2));
                }
            }
        }
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&dispatcher.tools())?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}
