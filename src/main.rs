use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use psfkit::{Container, PsfError, ReadOptions, Report};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_USAGE:   u8 = 1;
const EXIT_OPEN:    u8 = 2;
const EXIT_DECODE:  u8 = 3;
const EXIT_LIBRARY: u8 = 4;

#[derive(Parser)]
#[command(name = "psfinfo", version, about = "Show header, tags and libraries of PSF-family files")]
struct Cli {
    /// PSF, MiniPSF, GSF, USF, ... file to inspect
    file: PathBuf,
    /// Do not follow _lib / _libN references
    #[arg(long)]
    no_libs: bool,
    /// Deepest _lib nesting to follow
    #[arg(long, default_value_t = psfkit::container::DEFAULT_MAX_LIBRARY_DEPTH)]
    max_depth: usize,
    /// Let the inflate buffer grow without limit
    #[arg(long)]
    no_inflate_limit: bool,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    /// Verbose logging to stderr (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut opts = ReadOptions::default().max_library_depth(Some(cli.max_depth));
    if cli.no_inflate_limit {
        opts = opts.max_inflate_ratio(None);
    }

    let mut psf = match Container::open_with(&cli.file, &opts) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", cli.file.display());
            return ExitCode::from(match e {
                PsfError::Open { .. } => EXIT_OPEN,
                _ => EXIT_DECODE,
            });
        }
    };

    let mut status = ExitCode::SUCCESS;
    if !cli.no_libs {
        if let Err(e) = psf.load_libraries_with(&opts) {
            eprintln!("Error loading libraries: {e}");
            if let Some(cause) = std::error::Error::source(e.root_cause()) {
                eprintln!("  caused by: {cause}");
            }
            status = ExitCode::from(EXIT_LIBRARY);
        }
    }

    let report = Report::from_container(&psf);
    if cli.json {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error encoding report: {e}");
                return ExitCode::from(EXIT_DECODE);
            }
        }
    } else {
        print!("{}", report.render_text());
    }

    psf.close();
    status
}
