extern crate clap;
extern crate yapb;
extern crate termion;
extern crate failure;
#[macro_use]
extern crate log;
extern crate elfwalk;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Arg, App};
use yapb::Spinner;
use failure::{Error, ResultExt};
use log::LevelFilter;

use elfwalk::{ErrorExt, WalkStats};

type Result<T> = std::result::Result<T, Error>;

fn main() {
    let args = App::new("elfwalk")
        .version("0.1")
        .about("Finds ELF objects, and ar archives containing them, below the given paths")
        .arg(Arg::with_name("PATH")
             .help("files or directories to search")
             .required(true)
             .multiple(true))
        .arg(Arg::with_name("all")
             .long("all")
             .short("a")
             .help("print every file visited, not just ELF objects"))
        .arg(Arg::with_name("progress")
             .long("progress")
             .short("p")
             .help("show a spinner and a summary on stderr"))
        .arg(Arg::with_name("verbose")
             .long("verbose")
             .short("v")
             .conflicts_with("quiet")
             .help("report diagnostics about unreadable files and malformed archives"))
        .arg(Arg::with_name("quiet")
             .long("quiet")
             .short("q")
             .help("only report errors"))
        .get_matches();

    let level = if args.is_present("verbose") {
        LevelFilter::Debug
    } else if args.is_present("quiet") {
        LevelFilter::Error
    } else {
        LevelFilter::Warn
    };
    if let Err(e) = elfwalk::logger::init(level) {
        eprintln!("ERROR: failed to install logger: {}", e);
    }

    if let Err(e) = run(&args) {
        eprintln!("FATAL: {}", e.pretty());
        ::std::process::exit(1);
    }
}

fn run<'a>(args: &clap::ArgMatches<'a>) -> Result<()> {
    let roots: Vec<PathBuf> = args.values_of_os("PATH")
        .map(|xs| xs.map(PathBuf::from).collect())
        .unwrap_or_default();

    let stdout = io::stdout();
    let progress = if args.is_present("progress") && termion::is_tty(&io::stderr()) {
        Some(Progress::new(io::stderr(), Duration::from_millis(100)))
    } else {
        None
    };
    let mut out = Output {
        stdout: stdout.lock(),
        failed: false,
        all: args.is_present("all"),
        progress,
    };

    let stats = elfwalk::walk_classified(&roots[..], |path, is_elf| out.visit(path, is_elf))
        .context("walk aborted")?;

    if let Some(progress) = out.progress.take() {
        progress.finish(&stats);
    }
    Ok(())
}

struct Output<'a, W: Write> {
    stdout: io::StdoutLock<'a>,
    failed: bool,
    all: bool,
    progress: Option<Progress<W>>,
}

impl<'a, W: Write> Output<'a, W> {
    fn visit(&mut self, path: &Path, is_elf: bool) {
        if is_elf || self.all {
            if let Some(ref mut progress) = self.progress {
                progress.clear();
            }
            if !self.failed {
                if let Err(e) = writeln!(self.stdout, "{}", path.display()) {
                    error!("failed to write output: {}", e);
                    self.failed = true;
                }
            }
        }
        if let Some(ref mut progress) = self.progress {
            progress.step(is_elf);
        }
    }
}

/// Indexing spinner, redrawn at most once per `interval`.
struct Progress<W: Write> {
    out: W,
    spinner: yapb::Snake,
    visited: u64,
    found: u64,
    interval: Duration,
    start: Instant,
    last_draw: Instant,
    drawn: bool,
}

impl<W: Write> Progress<W> {
    fn new(out: W, interval: Duration) -> Self {
        let now = Instant::now();
        Progress {
            out, spinner: yapb::Snake::new(), visited: 0, found: 0,
            interval, start: now, last_draw: now, drawn: false,
        }
    }

    /// Erases the spinner line, if one is showing.
    fn clear(&mut self) {
        if !self.drawn { return; }
        self.drawn = false;
        let _ = write!(self.out, "{}{}", termion::cursor::Left(!0), termion::clear::CurrentLine);
        let _ = self.out.flush();
    }

    fn step(&mut self, is_elf: bool) {
        self.visited += 1;
        if is_elf { self.found += 1; }
        let now = Instant::now();
        if now - self.last_draw < self.interval {
            return;
        }
        self.last_draw = now;
        self.spinner.step(1);
        let _ = write!(self.out, "{}{}{} {} searched, {} found",
                       termion::cursor::Left(!0), termion::clear::CurrentLine,
                       self.spinner, self.visited, self.found);
        let _ = self.out.flush();
        self.drawn = true;
    }

    fn finish(mut self, stats: &WalkStats) {
        self.clear();
        let time = Instant::now() - self.start;
        let _ = writeln!(self.out, "searched {} files, found {}, skipped {} duplicates, {} errors in {}s",
                         self.visited, stats.reported, stats.duplicates, stats.errors,
                         yapb::prefix::Scientific(time.as_secs() as f64 + time.subsec_nanos() as f64 * 1e-9));
    }
}
