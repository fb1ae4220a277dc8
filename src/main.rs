//! datecrack - Date and numeric wordlist recovery for password-protected PDFs.
//!
//! Estimates and generates candidate wordlists and drives John the Ripper.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use datecrack::analysis;
use datecrack::calendar::{SerializationFormat, YearRange};
use datecrack::progress::BarProgress;
use datecrack::source::{DateSource, NumericRangeSpec, RangeSource, SourceType};
use datecrack::wordlist::{format_size, Dedup};
use datecrack::{CancelToken, Config, CrackRequest, CrackState, Error, WordlistJob};

/// Window used by `--comprehensive` when no years are given.
const DEFAULT_YEARS_BACK: u32 = 80;

fn parse_format(s: &str) -> Result<SerializationFormat, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

#[derive(Parser)]
#[command(name = "datecrack")]
#[command(about = "Date and numeric wordlist recovery for password-protected PDFs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML config with tool paths and timings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Show candidate count and file size without generating anything
    Estimate {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Write a wordlist file
    Generate {
        #[command(flatten)]
        job: JobArgs,

        /// Output file
        #[arg(short, long, default_value = "wordlists/dates_wordlist.txt")]
        output: PathBuf,

        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Recover a document password
    Crack {
        /// Protected PDF
        document: PathBuf,

        /// Existing wordlist (default: generate one from the job options)
        #[arg(long, conflicts_with = "comprehensive")]
        wordlist: Option<PathBuf>,

        #[command(flatten)]
        job: JobArgs,

        /// Cracking time limit in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show whether a document is protected and its extracted hash
    Info {
        document: PathBuf,
    },
}

#[derive(Args, Clone)]
struct JobArgs {
    /// First year (Gregorian)
    #[arg(long, alias = "start-year", conflicts_with = "years_back")]
    start: Option<i32>,

    /// Last year (Gregorian)
    #[arg(long, alias = "end-year", conflicts_with = "years_back")]
    end: Option<i32>,

    /// Use current year minus N through current year plus 5
    #[arg(long)]
    years_back: Option<u32>,

    /// Date layout(s): DDMMYYYY, DDMMYY, MMDDYYYY, MMDDYY, YYYYMMDD, YYMMDD
    #[arg(long, value_parser = parse_format, value_delimiter = ',', default_value = "DDMMYYYY")]
    format: Vec<SerializationFormat>,

    /// Candidate source(s), in order
    #[arg(long, value_enum, value_delimiter = ',', default_value = "gregorian")]
    source: Vec<SourceType>,

    /// Digit width for the numbers source
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(1..=17))]
    digits: u8,

    /// Lowest number (default 0)
    #[arg(long)]
    min: Option<u64>,

    /// Highest number (default: all digits 9)
    #[arg(long)]
    max: Option<u64>,

    /// Gregorian and Buddhist dates for every format, then all 8-digit numbers
    #[arg(long)]
    comprehensive: bool,

    /// Always enumerate numbers directly instead of trying crunch
    #[arg(long)]
    no_crunch: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Estimate { job } => run_estimate(&job, &config),
        Command::Generate { job, output, force } => run_generate(&job, &output, force, &config),
        Command::Crack { document, wordlist, job, timeout } => {
            run_crack(&document, wordlist, &job, timeout, &config)
        }
        Command::Info { document } => run_info(&document, &config),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn year_range(args: &JobArgs) -> Result<YearRange> {
    let years_back = args
        .years_back
        .or((args.comprehensive && args.start.is_none() && args.end.is_none()).then_some(DEFAULT_YEARS_BACK));

    let range = match years_back {
        Some(n) => YearRange::years_back(n, chrono::Local::now().date_naive())?,
        None => YearRange::new(args.start.unwrap_or(2000), args.end.unwrap_or(2030))?,
    };
    Ok(range)
}

fn build_job(args: &JobArgs, config: &Config) -> Result<WordlistJob> {
    let range = year_range(args)?;
    let crunch = (!args.no_crunch).then(|| config.crunch_generator());

    if args.comprehensive {
        return Ok(WordlistJob::comprehensive(range, &args.format, crunch)?);
    }

    let has_dates = args.source.iter().any(|s| *s != SourceType::Numbers);
    let mut job = WordlistJob::new();
    for source in &args.source {
        match source {
            SourceType::Gregorian => {
                for &format in &args.format {
                    job.push(DateSource::gregorian(range, format), Dedup::Track);
                }
            }
            SourceType::Buddhist => {
                for &format in &args.format {
                    job.push(DateSource::buddhist(range, format), Dedup::Track);
                }
            }
            SourceType::Numbers => {
                let full = NumericRangeSpec::full(args.digits as usize)?;
                let spec = NumericRangeSpec::new(
                    args.min.unwrap_or(full.min()),
                    args.max.unwrap_or(full.max()),
                    args.digits as usize,
                )?;
                let numbers = match &crunch {
                    Some(crunch) => RangeSource::with_crunch(spec, crunch.clone()),
                    None => RangeSource::new(spec),
                };
                let dedup = if has_dates { Dedup::Probe } else { Dedup::Off };
                job.push(numbers, dedup);
            }
        }
    }

    if job.is_empty() {
        bail!("no candidate sources selected");
    }
    Ok(job)
}

fn print_estimate(job: &WordlistJob) {
    let estimate = job.estimate();
    eprintln!("Wordlist plan:");
    for task in &estimate.tasks {
        eprintln!("  {:<40} {:>12} passwords  {:>10}", task.name, task.entries, format_size(task.bytes));
    }
    eprintln!(
        "Total: {} passwords, {} (before duplicate removal)",
        estimate.entries,
        estimate.human_size()
    );
}

fn run_estimate(args: &JobArgs, config: &Config) -> Result<()> {
    let job = build_job(args, config)?;
    print_estimate(&job);
    Ok(())
}

fn run_generate(args: &JobArgs, output: &Path, force: bool, config: &Config) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let job = build_job(args, config)?;
    print_estimate(&job);

    let cancel = CancelToken::new();
    cancel_on_interrupt(&cancel);

    let bar = BarProgress::entries(job.estimate().entries);
    let result = job.write_file(output, &bar, &cancel);
    bar.finish();

    match result {
        Ok(stats) => {
            eprintln!(
                "Done. Wrote {} passwords ({}) to {}, skipped {} duplicates",
                stats.entries_written,
                format_size(stats.bytes_written),
                output.display(),
                stats.duplicates_skipped
            );
            Ok(())
        }
        Err(e) => {
            if output.exists() {
                std::fs::remove_file(output)
                    .with_context(|| format!("removing partial {}", output.display()))?;
            }
            Err(e.into())
        }
    }
}

fn run_crack(
    document: &Path,
    wordlist: Option<PathBuf>,
    args: &JobArgs,
    timeout: Option<u64>,
    config: &Config,
) -> Result<()> {
    let mut orchestrator = config.orchestrator()?;

    let request = match wordlist {
        Some(path) => CrackRequest::with_wordlist(document, path),
        None => {
            let job = build_job(args, config)?;
            print_estimate(&job);
            CrackRequest::generate(document, job)
        }
    };
    let request = match timeout {
        Some(secs) => request.timeout(Some(Duration::from_secs(secs))),
        None => request,
    };
    cancel_on_interrupt(&request.cancel_handle());

    eprintln!("Cracking {}...", document.display());
    let bar = BarProgress::new();
    let outcome = orchestrator.crack(request, &bar);
    bar.finish();

    match outcome.state {
        CrackState::Found => {
            let secret = outcome.secret.unwrap_or_default();
            println!("Password: {}", secret);
            eprintln!(
                "Found in {:.1}s (~{} attempts)",
                outcome.elapsed.as_secs_f64(),
                outcome.attempts
            );
            eprintln!("Looks like: {}", analysis::describe(&secret));
            Ok(())
        }
        CrackState::NotProtected => {
            println!("{} is not password protected", document.display());
            Ok(())
        }
        _ => bail!(
            "{} after {:.1}s",
            outcome.error.unwrap_or_else(|| "Cracking failed".to_string()),
            outcome.elapsed.as_secs_f64()
        ),
    }
}

fn run_info(document: &Path, config: &Config) -> Result<()> {
    let orchestrator = config.orchestrator()?;
    let info = orchestrator.document_info(document);

    println!("Path:      {}", info.path.display());
    println!("Exists:    {}", info.exists);
    if info.exists {
        println!("Size:      {}", format_size(info.size));
    }
    match info.protected {
        Some(true) => println!("Protected: yes"),
        Some(false) => println!("Protected: no"),
        None => println!("Protected: unknown"),
    }
    if let Some(hash) = &info.hash {
        println!("Hash:      {}", hash);
    }
    if let Some(error) = info.error {
        bail!(error);
    }
    Ok(())
}

#[cfg(unix)]
mod interrupt {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
    use tracing::warn;

    use datecrack::CancelToken;

    static INTERRUPTED: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_interrupt(_: nix::libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }

    /// First Ctrl-C cancels `token`; the work then winds down on its own.
    pub fn watch(token: &CancelToken) {
        let action = SigAction::new(SigHandler::Handler(on_interrupt), SaFlags::empty(), SigSet::empty());
        // SAFETY: the handler only stores to an atomic.
        if let Err(e) = unsafe { sigaction(Signal::SIGINT, &action) } {
            warn!(error = %e, "cannot install interrupt handler");
            return;
        }

        let token = token.clone();
        thread::spawn(move || loop {
            if INTERRUPTED.load(Ordering::SeqCst) {
                eprintln!("\nInterrupted, stopping...");
                token.cancel();
                return;
            }
            thread::sleep(Duration::from_millis(100));
        });
    }
}

fn cancel_on_interrupt(token: &CancelToken) {
    #[cfg(unix)]
    interrupt::watch(token);
    #[cfg(not(unix))]
    let _ = token;
}
