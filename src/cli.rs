// ============================================================================
// LayerPaint CLI: headless script replay via command-line arguments
// ============================================================================
//
// Usage examples:
//   LayerPaint --script strokes.rhai --output strokes.png
//   LayerPaint -s "demos/*.rhai" --output-dir renders/ --width 320 --height 240
//
// No window is opened in CLI mode. Each script is recorded, replayed on a
// fresh session and the composite is written as PNG.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io::write_png;
use crate::ops::scripting::execute_script_sync;
use crate::project::SessionConfig;
use crate::settings::AppSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// LayerPaint headless renderer.
#[derive(Parser, Debug)]
#[command(
    name = "LayerPaint",
    about = "LayerPaint headless script runner",
    long_about = "Replay Rhai drawing scripts on a fresh canvas and save the\n\
                  composite as PNG, without opening the GUI.\n\n\
                  Example:\n  \
                  LayerPaint --script strokes.rhai --output strokes.png\n  \
                  LayerPaint -s \"demos/*.rhai\" --output-dir renders/"
)]
pub struct CliArgs {
    /// Script file(s). Glob patterns accepted (e.g. "demos/*.rhai").
    #[arg(short, long, required = true, num_args = 1.., value_name = "SCRIPT.rhai")]
    pub script: Vec<String>,

    /// Output PNG path. Only valid for a single script.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for several scripts; files are named after each script.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Canvas width (defaults to the saved setting).
    #[arg(long)]
    pub width: Option<u32>,

    /// Canvas height (defaults to the saved setting).
    #[arg(long)]
    pub height: Option<u32>,

    /// Print script console output and per-script timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        Self::is_cli_args(std::env::args())
    }

    fn is_cli_args(args: impl IntoIterator<Item = String>) -> bool {
        args.into_iter()
            .any(|a| a == "--script" || a == "-s" || a.starts_with("--script="))
    }

    fn session_config(&self, settings: &AppSettings) -> SessionConfig {
        let mut config = SessionConfig::from_settings(settings);
        if let Some(w) = self.width {
            config.width = w;
        }
        if let Some(h) = self.height {
            config.height = h;
        }
        config
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run every script and return an OS exit code.
/// `0` = all scripts succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    run_with_settings(args, &AppSettings::load())
}

pub fn run_with_settings(args: CliArgs, settings: &AppSettings) -> ExitCode {
    let scripts = resolve_inputs(&args.script);
    if scripts.is_empty() {
        eprintln!("error: no script files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if scripts.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} scripts given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory.",
            scripts.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let config = args.session_config(settings);
    let total = scripts.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, script_path) in scripts.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, script_path.display());
        }
        let start = Instant::now();

        let Some(output_path) =
            build_output_path(script_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                script_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(script_path, &output_path, config.clone(), args.verbose) {
            Ok(()) => {
                log_info!("Rendered {} -> {}", script_path.display(), output_path.display());
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", script_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-script pipeline
// ============================================================================

fn run_one(
    script: &Path,
    output: &Path,
    config: SessionConfig,
    verbose: bool,
) -> Result<(), String> {
    let source = std::fs::read_to_string(script)
        .map_err(|e| format!("could not read script '{}': {}", script.display(), e))?;

    let (session, console_output) =
        execute_script_sync(&source, config).map_err(|e| format!("script error: {}", e))?;

    if verbose {
        for line in &console_output {
            println!("  [script] {}", line);
        }
    }

    write_png(session.compositor.output().as_rgba_image(), output)
        .map_err(|e| format!("save failed: {}", e))
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for one script.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir`, named after the script stem
/// 3. Next to the script, same stem, `.png`
fn build_output_path(
    script: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = script.file_stem()?.to_string_lossy().into_owned();
    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    let parent = script.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}.png", stem)))
}
