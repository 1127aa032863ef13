//! reirc - compile and run REIR programs
//!
//! ```bash
//! # Run a file
//! reirc -f program.reir
//!
//! # Run inline code, keeping the catalog between invocations
//! reirc --catalog reir.catalog -e 'define<{int:a key, int:b}> t'
//! reirc --catalog reir.catalog -e 'insert t {1, 2}; scan t, row { emit row }'
//!
//! # Interactive session
//! reirc
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use reir::backend::MemoryBackend;
use reir::catalog::MemoryCatalog;
use reir::config::DriverConfig;
use reir::driver::Driver;
use reir::executor::{EmittedRow, Execution};

/// REIR compiler and runner
#[derive(Parser, Debug)]
#[command(name = "reirc", version, about = "Compile and run REIR programs")]
struct Args {
    /// Run the program in FILE
    #[arg(short = 'f', long, value_name = "FILE", conflicts_with = "exec")]
    file: Option<PathBuf>,

    /// Run inline program text
    #[arg(short = 'e', long, value_name = "CODE")]
    exec: Option<String>,

    /// Load the catalog from FILE and save it back afterwards
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Driver configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seed of the generator behind rand()
    #[arg(long)]
    seed: Option<u64>,

    /// Abort programs after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// Print the analyzed syntax tree
    #[arg(long)]
    dump_ast: bool,

    /// Print the generated program
    #[arg(long)]
    dump_program: bool,

    /// Output format of emitted rows
    #[arg(short = 'o', long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Rows in a table
    Table,
    /// The whole execution as JSON
    Json,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let driver = Driver::new(load_config(&args)?);
    let catalog = match &args.catalog {
        Some(path) if path.exists() => MemoryCatalog::load_from_disk(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        _ => MemoryCatalog::new(),
    };
    let mut session = Session {
        driver,
        backend: MemoryBackend::new(),
        catalog,
        args: &args,
    };

    let source = match (&args.file, &args.exec) {
        (Some(path), _) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        (None, Some(code)) => Some(code.clone()),
        (None, None) => None,
    };

    match source {
        Some(source) => session.execute(&source)?,
        None => session.repl()?,
    }
    session.save_catalog()
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("reir=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<DriverConfig> {
    let mut config = match &args.config {
        Some(path) => DriverConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DriverConfig::default(),
    };

    if let Some(seed) = args.seed {
        config = config.rand_seed(seed);
    }
    if let Some(max_steps) = args.max_steps {
        config = config.max_steps(max_steps);
    }
    Ok(config)
}

/// State shared by every program run in one invocation
struct Session<'a> {
    driver: Driver,
    backend: MemoryBackend,
    catalog: MemoryCatalog,
    args: &'a Args,
}

impl Session<'_> {
    fn execute(&mut self, source: &str) -> Result<()> {
        if self.args.dump_ast || self.args.dump_program {
            let compilation = self.driver.compile(source, &self.catalog)?;
            if self.args.dump_ast {
                println!("{:#?}", compilation.ast);
            }
            if self.args.dump_program {
                print!("{}", compilation.program);
            }
        }

        let execution = self.driver.run(source, &mut self.backend, &self.catalog)?;
        self.print(&execution)
    }

    fn print(&self, execution: &Execution) -> Result<()> {
        match self.args.output {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(execution)?);
            }
            OutputFormat::Table => {
                for line in &execution.console {
                    println!("{}", line);
                }
                print!("{}", format_rows(&execution.rows));
            }
        }
        Ok(())
    }

    fn repl(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().context("failed to start line editor")?;
        println!("reirc {}", env!("CARGO_PKG_VERSION"));
        println!("Type '.help' for help, '.quit' to exit");

        loop {
            match editor.readline("reir> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Err(e) = editor.add_history_entry(line) {
                        debug!(error = %e, "history entry not recorded");
                    }

                    if line.starts_with('.') {
                        if !self.command(line) {
                            break;
                        }
                        continue;
                    }
                    if let Err(e) = self.execute(line) {
                        eprintln!("Error: {e:#}");
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e).context("failed to read input"),
            }
        }
        Ok(())
    }

    /// Handle a dot command; false ends the session
    fn command(&self, line: &str) -> bool {
        match line.split_whitespace().next() {
            Some(".help") => print_help(),
            Some(".quit") | Some(".exit") => return false,
            Some(".tables") => {
                let tables = self.catalog.list_tables();
                if tables.is_empty() {
                    println!("No tables found.");
                } else {
                    for table in tables {
                        println!("  {}", table);
                    }
                }
            }
            Some(cmd) => {
                eprintln!("Unknown command: {}", cmd);
                eprintln!("Type '.help' for available commands.");
            }
            None => {}
        }
        true
    }

    fn save_catalog(&self) -> Result<()> {
        if let Some(path) = &self.args.catalog {
            save_catalog(&self.catalog, path)?;
        }
        Ok(())
    }
}

fn save_catalog(catalog: &MemoryCatalog, path: &Path) -> Result<()> {
    catalog
        .save_to_disk(path)
        .with_context(|| format!("failed to save catalog {}", path.display()))?;
    info!(path = %path.display(), "catalog saved");
    Ok(())
}

fn print_help() {
    println!(
        r#"
Commands:
  .help              Show this help message
  .tables            List tables in the catalog
  .quit              Exit

Each line is compiled and run as one program. Tables defined on one line
can be used on later lines.

Examples:
  define<{{int:id key, int:score}}> scores
  insert scores {{1, 90}}; insert scores {{2, 75}}
  transaction {{ scan scores, s {{ if s.score > 80 {{ emit s }} }} }}
"#
    );
}

/// Format emitted rows as a table
fn format_rows(rows: &[EmittedRow]) -> String {
    let columns = rows.iter().map(|r| r.values.len()).max().unwrap_or(0);
    if columns == 0 {
        return format!("{} row(s) emitted\n", rows.len());
    }

    let header: Vec<String> = (0..columns).map(|i| format!("${}", i)).collect();
    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in rows {
        for (i, value) in row.values.iter().enumerate() {
            widths[i] = widths[i].max(value.to_string().len());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    let mut output = String::new();
    output.push_str(&separator);
    let header: String = header
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    for row in rows {
        let cells: String = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = row.values.get(i).map(|v| v.to_string()).unwrap_or_default();
                format!(" {:>width$} ", cell, width = *w)
            })
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", cells));
    }
    output.push_str(&separator);
    output.push_str(&format!("{} row(s) emitted\n", rows.len()));
    output
}
