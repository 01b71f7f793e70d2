//! Batch tool that precomputes track-data artifacts for a directory tree.

use std::path::PathBuf;

use trackdeck::generate::OfflineGenerator;
use trackdeck::precompute::{self, PrecomputeOptions};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = trackdeck::logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let generator = OfflineGenerator::default();
    let summary = precompute::run(&options, &generator).map_err(|err| err.to_string())?;
    println!(
        "Processed {} folder(s): {} generated, {} skipped, {} failed, {} running order(s) written",
        summary.folders,
        summary.generated,
        summary.skipped,
        summary.failed,
        summary.running_orders_written
    );
    if summary.failed > 0 {
        return Err(format!("{} file(s) failed; see log for details", summary.failed));
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Option<PrecomputeOptions>, String> {
    let mut input: Option<PathBuf> = None;
    let mut scale: u32 = trackdeck::track_data::DEFAULT_SCALE;
    let mut overwrite = false;
    let mut running_order = true;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--input" | "--dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--input requires a value".to_string())?;
                input = Some(PathBuf::from(value));
            }
            "--scale" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--scale requires a value".to_string())?;
                scale = value
                    .parse::<u32>()
                    .ok()
                    .filter(|scale| *scale > 0)
                    .ok_or_else(|| format!("Invalid --scale value: {value}"))?;
            }
            "--overwrite" => {
                overwrite = true;
            }
            "--no-running-order" => {
                running_order = false;
            }
            other if !other.starts_with("--") && input.is_none() => {
                input = Some(PathBuf::from(other));
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }

    let Some(input) = input else {
        return Err(format!("--input is required\n\n{}", help_text()));
    };

    Ok(Some(PrecomputeOptions {
        input,
        scale,
        overwrite,
        running_order,
    }))
}

fn help_text() -> String {
    [
        "trackdeck-precompute",
        "",
        "Walks a directory tree and writes track-data artifacts (and running",
        "order documents) next to the audio files it finds.",
        "",
        "Usage:",
        "  trackdeck-precompute --input <dir> [options]",
        "",
        "Options:",
        "  --input, --dir <dir>  Directory tree to process (required).",
        "  --scale <u32>         Samples per peak window (default: 256).",
        "  --overwrite           Regenerate artifacts that already exist.",
        "  --no-running-order    Skip writing running-order.v2.json files.",
        "",
        "Requires ffmpeg and ffprobe on PATH.",
    ]
    .join("\n")
}
