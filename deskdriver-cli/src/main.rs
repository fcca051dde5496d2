//! deskdriver CLI
//!
//! Runs single driver operations from a shell, mostly for debugging scenario steps
//! against a live application.
//!
//! Usage:
//!   deskdriver cleanup                              # sweep stale recovery files
//!   deskdriver locate                               # find the main window
//!   deskdriver run select-cell B2                   # attach, then Go To B2
//!   deskdriver run --quit save --path "C:\out.xlsx" # save-as, then quit
//!   deskdriver --preset text-editor run type "hello world"
//!   deskdriver --preset text-editor run find file_menu

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use deskdriver::platforms::create_backend;
use deskdriver::{
    AppDriver, AutomationError, CellRef, CopiedFiles, DriverConfig, RecoveryCleaner,
    WindowLocator,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deskdriver")]
#[command(about = "Keyboard-driven automation for desktop applications")]
struct Cli {
    /// JSON driver config. Falls back to $DESKDRIVER_CONFIG, then to --preset.
    #[clap(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Built-in profile used when no config file is given
    #[clap(long, value_enum, global = true, default_value = "spreadsheet")]
    preset: Preset,

    /// Debug-level logging
    #[clap(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
#[clap(rename_all = "kebab-case")]
enum Preset {
    #[default]
    Spreadsheet,
    TextEditor,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete stale autosave, lock and recovered files
    Cleanup,
    /// Run the two-phase window lookup and print what was found
    Locate,
    /// Attach to (or launch) the application and run one operation
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Wall-clock bound for start plus the operation, in seconds
    #[clap(long, default_value_t = 120)]
    timeout: u64,

    /// Launch the application with this document open
    #[clap(long)]
    open: Option<PathBuf>,

    /// Quit the application afterwards
    #[clap(long)]
    quit: bool,

    #[command(subcommand)]
    operation: Operation,
}

#[derive(Subcommand, Debug)]
enum Operation {
    /// Select a cell by address (B2) or by --row/--column
    SelectCell {
        address: Option<String>,
        #[clap(long)]
        row: Option<u32>,
        #[clap(long)]
        column: Option<u32>,
    },
    /// Type literal text and confirm
    Type { text: String },
    /// Run a '>'-delimited accelerator path, e.g. "Home>Format>AutoFit"
    Menu { path: String },
    /// Save in place, or save-as with --path
    Save {
        #[clap(long)]
        path: Option<String>,
    },
    /// Close the active document
    Close {
        /// Keep changes instead of discarding them
        #[clap(long)]
        save: bool,
    },
    /// Wait for a dialog whose title matches one of the patterns and answer it
    Dialog {
        #[clap(required = true)]
        patterns: Vec<String>,
        /// Response key in send-keys syntax; defaults to the configured key
        #[clap(long)]
        key: Option<String>,
        #[clap(long)]
        timeout_ms: Option<u64>,
    },
    /// Look up a named control from the profile, e.g. "save_as_menu_item"
    Find { element: String },
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::SelectCell { .. } => "select_cell",
            Operation::Type { .. } => "input_text",
            Operation::Menu { .. } => "execute_menu_path",
            Operation::Save { .. } => "save",
            Operation::Close { .. } => "close_document",
            Operation::Dialog { .. } => "handle_dialog",
            Operation::Find { .. } => "element",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    info!("Driving {} ({})", config.app.name, config.app.executable);

    match cli.command {
        Commands::Cleanup => {
            let cleaner = RecoveryCleaner::from_config(&config.app.recovery);
            let report = cleaner.cleanup(&CopiedFiles::new());
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Locate => {
            let window = tokio::task::spawn_blocking(move || {
                let backend = create_backend()?;
                let title = config.title_regex()?;
                WindowLocator::new(backend, config.locator).locate(&config.app.executable, &title)
            })
            .await
            .context("locate task panicked")??;
            println!("{}", serde_json::to_string_pretty(&window)?);
        }
        Commands::Run(args) => run(config, args).await?,
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<DriverConfig> {
    let from_file = cli.config.is_some()
        || std::env::var_os(deskdriver::config::CONFIG_ENV_VAR).is_some_and(|v| !v.is_empty());
    if from_file {
        return DriverConfig::load(cli.config.as_deref()).context("failed to load driver config");
    }
    Ok(match cli.preset {
        Preset::Spreadsheet => DriverConfig::spreadsheet(),
        Preset::TextEditor => DriverConfig::text_editor(),
    })
}

async fn run(config: DriverConfig, args: RunArgs) -> Result<()> {
    let mut driver = AppDriver::new(config)?;
    let cancel = driver.cancellation_token();
    let limit = Duration::from_secs(args.timeout);
    let operation = args.operation;
    let open = args.open;
    let quit = args.quit;

    let task = tokio::task::spawn_blocking(move || {
        driver.start(open.as_deref())?;
        let result = perform(&mut driver, &operation);
        if quit {
            driver.quit();
        }
        result
    });

    match tokio::time::timeout(limit, task).await {
        Ok(joined) => {
            let value = joined.context("operation task panicked")?.map_err(|e| {
                error!("Operation failed ({:?}): {}", e.kind(), e);
                e
            })?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(_) => {
            cancel.cancel();
            anyhow::bail!("operation did not finish within {}s", args.timeout)
        }
    }
}

fn perform(driver: &mut AppDriver, operation: &Operation) -> Result<Value, AutomationError> {
    let detail = match operation {
        Operation::SelectCell {
            address,
            row,
            column,
        } => {
            let cell = CellRef::from_parts(*row, *column, address.as_deref())?;
            driver.select_cell(&cell)?;
            json!({ "cell": cell.address() })
        }
        Operation::Type { text } => {
            driver.input_text(text)?;
            json!({ "chars": text.chars().count() })
        }
        Operation::Menu { path } => {
            driver.execute_menu_path(path)?;
            json!({ "path": path })
        }
        Operation::Save { path } => {
            driver.save(path.as_deref())?;
            json!({ "path": path })
        }
        Operation::Close { save } => {
            driver.close_document(*save)?;
            json!({ "saved": save })
        }
        Operation::Dialog {
            patterns,
            key,
            timeout_ms,
        } => {
            let key = key
                .clone()
                .unwrap_or_else(|| driver.config().dialog.response_key.clone());
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| driver.config().dialog.timeout());
            let outcome = driver.handle_dialog(patterns.as_slice(), &key, timeout)?;
            serde_json::to_value(outcome).unwrap_or(Value::Null)
        }
        Operation::Find { element } => {
            let found = driver.element(element)?;
            let detail = serde_json::to_value(&found).unwrap_or(Value::Null);
            if let Some(found) = &found {
                driver.release(found);
            }
            detail
        }
    };
    Ok(json!({ "operation": operation.name(), "status": "ok", "detail": detail }))
}
