// Command-line front end for vcpatch.
//
// Explicit subcommands with long-form options. All decoding goes through
// `io::decode_file_with`; the header command only parses.

use std::fs::File;
use std::io::{BufReader, Seek};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::io::{self, DecodeStats, IoError};
use crate::vcdiff::decoder::{DecodeEvent, DecodeOptions};
use crate::vcdiff::error::DecodeError;
use crate::vcdiff::header::{Header, HeaderIndicator};
use crate::vcdiff::window::{Window, WindowIndicator, WindowReader};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// VCDIFF (RFC 3284) patch decoder.
#[derive(Parser, Debug)]
#[command(
    name = "vcpatch",
    version,
    about = "Apply VCDIFF / xdelta patches",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Apply a patch to a source file.
    Decode(DecodeArgs),
    /// Print the file header and every window header of a patch.
    Header(HeaderArgs),
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Original file the patch was made against.
    #[arg(value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// VCDIFF patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Where to write the patched file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Skip Adler-32 verification of windows.
    #[arg(long = "no-checksum")]
    no_checksum: bool,
}

#[derive(Args, Debug)]
struct HeaderArgs {
    /// VCDIFF patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Decode,
    Header,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    no_checksum: bool,
    source_file: Option<PathBuf>,
    patch_file: PathBuf,
    output_file: Option<PathBuf>,
    json_output: bool,
}

fn resolve_options(cli: Cli) -> Options {
    let quiet = cli.quiet;
    let verbose = cli.verbose.min(3);
    let force = cli.force;
    let json_output = cli.json_output;

    match cli.command {
        Cmd::Decode(args) => Options {
            command: Command::Decode,
            force,
            quiet,
            verbose,
            no_checksum: args.no_checksum,
            source_file: Some(args.source),
            patch_file: args.patch,
            output_file: Some(args.output),
            json_output,
        },
        Cmd::Header(args) => Options {
            command: Command::Header,
            force,
            quiet,
            verbose,
            no_checksum: false,
            source_file: None,
            patch_file: args.patch,
            output_file: None,
            json_output,
        },
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("vcpatch".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn log_level(quiet: bool, verbose: u8) -> Option<log::LevelFilter> {
    match (quiet, verbose) {
        (true, _) => Some(log::LevelFilter::Error),
        (false, 0) => None,
        (false, 1) => Some(log::LevelFilter::Info),
        (false, 2) => Some(log::LevelFilter::Debug),
        (false, _) => Some(log::LevelFilter::Trace),
    }
}

/// Whether `a` and `b` name the same file. Paths that do not exist yet
/// are compared as written.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let (Some(source), Some(output)) = (&opts.source_file, &opts.output_file) else {
        eprintln!("vcpatch: decode requires source, patch and output files");
        return 1;
    };

    if output.exists() && !opts.force {
        eprintln!(
            "vcpatch: output file exists, use -f to overwrite: {}",
            output.display()
        );
        return 1;
    }
    if same_file(output, source) || same_file(output, &opts.patch_file) {
        eprintln!(
            "vcpatch: output file must differ from its inputs: {}",
            output.display()
        );
        return 1;
    }

    let options = DecodeOptions {
        verify_checksum: !opts.no_checksum,
        ..DecodeOptions::default()
    };
    let show_progress = opts.verbose > 0 && !opts.quiet;

    let started = Instant::now();
    let result = io::decode_file_with(source, &opts.patch_file, output, options, |event| {
        if show_progress {
            match event {
                DecodeEvent::Progress(fraction) => {
                    eprint!("\rvcpatch: {:5.1}%", fraction * 100.0);
                }
                DecodeEvent::Finished => eprintln!(),
            }
        }
    });
    let elapsed = started.elapsed();

    match result {
        Ok(stats) => {
            if !opts.quiet {
                eprintln!(
                    "vcpatch: done in {elapsed:.2?}: {} bytes, {} windows",
                    stats.output_size, stats.windows
                );
            }
            if opts.json_output {
                print_decode_json(&stats, elapsed.as_secs_f64());
            }
            0
        }
        Err(e) => {
            if show_progress {
                eprintln!();
            }
            match &e {
                IoError::Decode(err) => {
                    eprintln!("vcpatch: decode error ({:?}): {err}", err.class());
                }
                IoError::Io(err) => eprintln!("vcpatch: {err}"),
            }
            2
        }
    }
}

fn print_decode_json(stats: &DecodeStats, elapsed_secs: f64) {
    let json = serde_json::json!({
        "command": "decode",
        "source_size": stats.source_size,
        "patch_size": stats.patch_size,
        "output_size": stats.output_size,
        "windows": stats.windows,
        "output_sha256": stats.output_sha256.as_ref().map(|h| hex(h)),
        "elapsed_secs": elapsed_secs,
    });
    match serde_json::to_string_pretty(&json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("vcpatch: json output: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Header command
// ---------------------------------------------------------------------------

fn header_flags(indicator: HeaderIndicator) -> String {
    let names: Vec<&str> = [
        (HeaderIndicator::SECONDARY_COMPRESSION, "VCD_SECONDARY"),
        (HeaderIndicator::CODE_TABLE, "VCD_CODETABLE"),
        (HeaderIndicator::APPLICATION_DATA, "VCD_APPHEADER"),
    ]
    .into_iter()
    .filter(|(flag, _)| indicator.contains(*flag))
    .map(|(_, name)| name)
    .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(" ")
    }
}

fn window_flags(indicator: WindowIndicator) -> String {
    let names: Vec<&str> = [
        (WindowIndicator::SOURCE, "VCD_SOURCE"),
        (WindowIndicator::TARGET, "VCD_TARGET"),
        (WindowIndicator::ADLER32, "VCD_ADLER32"),
    ]
    .into_iter()
    .filter(|(flag, _)| indicator.contains(*flag))
    .map(|(_, name)| name)
    .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(" ")
    }
}

fn print_header_text(header: &Header) {
    println!("VCDIFF version:               0");
    println!("VCDIFF header size:           {}", header.encoded_len());
    println!(
        "VCDIFF header indicator:      {}",
        header_flags(header.indicator)
    );
    println!("VCDIFF secondary compressor:  none");
    if let Some(app) = &header.application_data {
        println!("VCDIFF application header:    {app}");
    }
}

fn print_window_text(number: u64, window: &Window) {
    println!();
    println!("VCDIFF window number:         {number}");
    println!(
        "VCDIFF window indicator:      {}",
        window_flags(window.indicator)
    );
    if let Some(sum) = window.checksum {
        println!("VCDIFF adler32 checksum:      {sum:08X}");
    }
    if window.has_copy_segment() {
        println!(
            "VCDIFF copy window length:    {}",
            window.source_segment_length
        );
        println!(
            "VCDIFF copy window offset:    {}",
            window.source_segment_offset
        );
    }
    println!(
        "VCDIFF target window length:  {}",
        window.target_window_length
    );
    println!(
        "VCDIFF target window offset:  {}",
        window.target_window_offset
    );
    println!("VCDIFF data section length:   {}", window.data.len());
    println!("VCDIFF inst section length:   {}", window.instructions.len());
    println!("VCDIFF addr section length:   {}", window.addresses.len());
}

fn window_json(number: u64, window: &Window) -> serde_json::Value {
    serde_json::json!({
        "number": number,
        "indicator": window_flags(window.indicator),
        "copy_window_length": window.source_segment_length,
        "copy_window_offset": window.source_segment_offset,
        "target_window_length": window.target_window_length,
        "target_window_offset": window.target_window_offset,
        "adler32": window.checksum,
        "data_length": window.data.len(),
        "inst_length": window.instructions.len(),
        "addr_length": window.addresses.len(),
    })
}

/// Parse the header and every window. Returns the windows read before
/// the first error, if any.
fn read_windows(
    reader: &mut BufReader<File>,
    len: u64,
    header: &Header,
) -> (Vec<Window>, Option<DecodeError>) {
    let mut windows = Vec::new();
    let mut window_reader = WindowReader::new();
    loop {
        match reader.stream_position() {
            Ok(pos) if pos >= len => return (windows, None),
            Ok(_) => {}
            Err(e) => return (windows, Some(e.into())),
        }
        match window_reader.read_next(reader, header) {
            Ok(window) => windows.push(window),
            Err(e) => return (windows, Some(e)),
        }
    }
}

fn cmd_header(opts: &Options) -> i32 {
    let path = &opts.patch_file;
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("vcpatch: {}: {e}", path.display());
            return 1;
        }
    };
    let len = match file.metadata() {
        Ok(m) => m.len(),
        Err(e) => {
            eprintln!("vcpatch: {}: {e}", path.display());
            return 1;
        }
    };
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);

    let header = match Header::decode(&mut reader) {
        Ok(hdr) => hdr,
        Err(e) => {
            eprintln!("vcpatch: invalid VCDIFF header: {e}");
            return 2;
        }
    };

    let (windows, error) = read_windows(&mut reader, len, &header);

    if opts.json_output {
        let json = serde_json::json!({
            "command": "header",
            "header_size": header.encoded_len(),
            "indicator": header_flags(header.indicator),
            "application_data": header.application_data,
            "windows": windows
                .iter()
                .zip(0u64..)
                .map(|(w, n)| window_json(n, w))
                .collect::<Vec<_>>(),
            "error": error.as_ref().map(|e| e.to_string()),
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("vcpatch: json output: {e}"),
        }
    } else {
        print_header_text(&header);
        for (window, number) in windows.iter().zip(0u64..) {
            print_window_text(number, window);
        }
    }

    match error {
        Some(e) => {
            eprintln!("vcpatch: window {}: {e}", windows.len());
            2
        }
        None => 0,
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    logger.format_timestamp(None).format_target(false);
    if let Some(level) = log_level(opts.quiet, opts.verbose) {
        logger.filter_level(level);
    }
    logger.init();

    let exit_code = match opts.command {
        Command::Decode => cmd_decode(&opts),
        Command::Header => cmd_header(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
