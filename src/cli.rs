//! Command-line surface: argument parsing, logging setup and the interactive
//! fallback that asks for any input not given as a flag.

use crate::config::{validate_concurrency, RunConfig};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// CLI arguments for the batch converter
#[derive(Parser, Debug, Clone)]
#[command(
    name = "txt2pdf",
    version,
    about = "Convert every text file in a directory tree to PDF",
    long_about = "
Walks the input directory, converts each text-like file (txt, py, log, csv,
xml, json, html, md, sql, yaml, yml, ini, cfg, java, c, cpp, rb, sh, bat) to a
PDF, and writes it to the same relative location under the output directory.

Any of --input, --output or --jobs left out is asked for interactively.

EXAMPLES:
    txt2pdf -i ./notes -o ./notes-pdf -j 4
    txt2pdf -i ./src -o ./printout -j 2 --config txt2pdf.toml --summary-json run.json
"
)]
pub struct CliArgs {
    /// Directory containing the files to convert
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Directory receiving the PDF tree (created if absent)
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Number of parallel workers (1 to the number of CPUs)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// TOML file with render and input settings
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the font family, overrides the config file
    #[arg(long = "font-dir", value_name = "DIR")]
    pub font_dir: Option<PathBuf>,

    /// Write the run summary as JSON to this file
    #[arg(long = "summary-json", value_name = "FILE")]
    pub summary_json: Option<PathBuf>,

    /// Ring the terminal bell after each converted file
    #[arg(long = "bell")]
    pub bell: bool,

    /// Clear the screen before starting
    #[arg(long = "clear")]
    pub clear: bool,

    /// Disable the live progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Set the logging level
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

/// Log level enumeration
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl CliArgs {
    /// Set up tracing; `RUST_LOG` wins over `--log-level`
    pub fn setup_logging(&self) -> Result<()> {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(self.log_level.as_str()));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
    }

    /// Whether any boundary input still has to be asked for
    pub fn needs_prompt(&self) -> bool {
        self.input.is_none() || self.output.is_none() || self.jobs.is_none()
    }

    /// Build the run configuration, prompting for whatever is missing.
    ///
    /// Values passed as flags are validated once and never re-prompted.
    pub fn resolve_run_config<R: BufRead, W: Write>(
        &self,
        prompt: &mut Prompt<R, W>,
        max_units: usize,
    ) -> Result<RunConfig> {
        let input = match &self.input {
            Some(dir) => dir.clone(),
            None => prompt.source_dir()?,
        };
        let output = match &self.output {
            Some(dir) => dir.clone(),
            None => prompt.dest_dir()?,
        };
        let jobs = match self.jobs {
            Some(jobs) => jobs,
            None => prompt.jobs(max_units)?,
        };

        RunConfig::validated(input, output, jobs, max_units).context("Invalid run configuration")
    }
}

/// Line-based prompts over any reader/writer pair
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(anyhow!("Input closed while waiting for an answer"));
        }
        Ok(line.trim().to_string())
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }

    /// Ask until an existing directory is given
    pub fn source_dir(&mut self) -> Result<PathBuf> {
        loop {
            let answer = self.ask("Input directory: ")?;
            let path = PathBuf::from(&answer);
            if !answer.is_empty() && path.is_dir() {
                return Ok(path);
            }
            self.say("The directory does not exist. Please try again.")?;
        }
    }

    pub fn dest_dir(&mut self) -> Result<PathBuf> {
        loop {
            let answer = self.ask("Output directory: ")?;
            if !answer.is_empty() {
                return Ok(PathBuf::from(answer));
            }
            self.say("Please enter a directory path.")?;
        }
    }

    /// Ask until a worker count in `1..=max_units` is given
    pub fn jobs(&mut self, max_units: usize) -> Result<usize> {
        loop {
            let answer = self.ask(&format!("Number of workers to use (1-{max_units}): "))?;
            match answer.parse::<usize>() {
                Ok(jobs) if validate_concurrency(jobs, max_units).is_ok() => return Ok(jobs),
                Ok(_) => self.say(&format!("Please enter a number between 1 and {max_units}."))?,
                Err(_) => self.say("Please enter a valid number.")?,
            }
        }
    }
}

/// Clear the terminal and home the cursor; failures are ignored
pub fn clear_screen() {
    use crossterm::{cursor, execute, terminal};

    let mut stdout = std::io::stdout();
    let _ = execute!(
        stdout,
        terminal::Clear(terminal::ClearType::All),
        cursor::MoveTo(0, 0)
    );
}
