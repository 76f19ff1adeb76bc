//! jlcmgr: manage project-local JLC component libraries for KiCad
//!
//! Finds the KiCad project around the working directory, then runs one
//! reconciliation command against it.

use std::error::Error as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use kicad_jlc_manager::config;
use kicad_jlc_manager::generator::Jlc2KicadLib;
use kicad_jlc_manager::manifest::MANIFEST_FILE;
use kicad_jlc_manager::project::{find_kicad_project, KicadProject};
use kicad_jlc_manager::reconcile::{ListedComponent, ReconcileError, Reconciler, SyncOptions};
use kicad_jlc_manager::supplier::LcscClient;
use kicad_jlc_manager::symbol::{EnrichOutcome, FieldUpdate};

type CliReconciler = Reconciler<Jlc2KicadLib, LcscClient>;

/// Manage project-local JLC component libraries for KiCad.
///
/// Parts are listed in jlcproject.toml next to the .kicad_pro file and
/// generated into a library directory registered in the project's library
/// tables.
#[derive(Parser, Debug)]
#[command(name = "jlcmgr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "CONFIG_FILE", global = true)]
    config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long = "directory", value_name = "DIR", global = true)]
    directory: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set up the library directory, library tables and .gitignore entry
    Init {
        /// Library directory relative to the project (default: jlclib)
        #[arg(long)]
        lib_dir: Option<String>,

        /// Library name in the library tables (default: JLC_Project)
        #[arg(long)]
        lib_name: Option<String>,
    },

    /// Generate a part, enrich its symbol and add it to the manifest
    Add {
        /// LCSC part number, e.g. C194349
        part: String,
    },

    /// Remove a part from the manifest and the library
    Remove {
        /// LCSC part number
        part: String,
    },

    /// List the parts in the manifest
    List {
        /// Show installed symbol data and the part page
        #[arg(long)]
        detailed: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Regenerate the library from the manifest
    Sync {
        /// Delete the library directory first
        #[arg(long)]
        clean: bool,
    },

    /// Show differences between the manifest and the library
    Status,

    /// Re-apply supplier data to an installed part's symbol
    Enrich {
        /// LCSC part number
        part: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn describe_update(update: FieldUpdate) -> &'static str {
    match update {
        FieldUpdate::Untouched => "unchanged",
        FieldUpdate::Rewritten => "updated",
        FieldUpdate::Inserted => "added",
        FieldUpdate::Unsupported => "skipped",
    }
}

fn report_enrichment(external_id: &str, outcome: &EnrichOutcome) {
    match outcome {
        EnrichOutcome::Updated(changes) => println!(
            "  Symbol enriched (value {}, description {}, keywords {})",
            describe_update(changes.value),
            describe_update(changes.description),
            describe_update(changes.keywords)
        ),
        EnrichOutcome::Unchanged(_) => println!("  Symbol already up to date"),
        EnrichOutcome::NoData => println!("  No supplier details available"),
        EnrichOutcome::NotFound => println!("  No symbol for {external_id} in the library"),
        EnrichOutcome::Failed(e) => println!("  ⚠ Could not update symbol: {e}"),
    }
}

fn print_components(project: &KicadProject, components: &[ListedComponent], detailed: bool) {
    if components.is_empty() {
        println!("No components in project");
        return;
    }

    println!("Components in {} ({}):\n", project.name(), components.len());
    for component in components {
        let marker = if component.installed { "" } else { "  [not installed]" };
        if component.comment.is_empty() {
            println!("  • {}{marker}", component.external_id);
        } else {
            println!("  • {}  ({}){marker}", component.external_id, component.comment);
        }

        if detailed {
            if component.installed {
                println!("    Part number: {}", component.part_number);
                println!("    Value:       {}", component.value);
                if !component.description.is_empty() {
                    println!("    Description: {}", component.description);
                }
            }
            println!("    {}", component.url);
        }
    }
}

fn write_csv(components: &[ListedComponent]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for component in components {
        writer.serialize(component)?;
    }
    writer.flush()?;
    Ok(())
}

fn export_components(components: &[ListedComponent], format: OutputFormat) -> ExitCode {
    let result = match format {
        OutputFormat::Json => serde_json::to_string_pretty(components)
            .map(|json| println!("{json}"))
            .map_err(|e| e.to_string()),
        OutputFormat::Csv => write_csv(components).map_err(|e| e.to_string()),
        OutputFormat::Text => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Export failed");
            eprintln!("✗ Export failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one command against the project.
async fn run(
    reconciler: &CliReconciler,
    project: &KicadProject,
    command: Command,
) -> Result<ExitCode, ReconcileError> {
    if !matches!(command, Command::Init { .. }) && !reconciler.is_initialised() {
        eprintln!("✗ Project not initialised");
        eprintln!("  Run 'jlcmgr init' first to set up the library structure");
        return Ok(ExitCode::FAILURE);
    }

    match command {
        Command::Init { lib_dir, lib_name } => {
            let settings = reconciler.init(lib_dir.as_deref(), lib_name.as_deref())?;
            println!("✓ Project library initialised");
            println!("  Library: {} → {}/", settings.lib_name, settings.lib_dir);
            println!("  Use 'jlcmgr add <part>' to add components");
        }

        Command::Add { part } => {
            println!("Fetching component {part} from JLCPCB...");
            let report = reconciler.add(&part).await?;
            report_enrichment(&part, &report.enrichment);
            if report.newly_listed {
                println!("✓ Component {part} added to project");
            } else {
                println!("✓ Component {part} regenerated");
            }
            println!("  Tracked in {MANIFEST_FILE}");
        }

        Command::Remove { part } => {
            let report = reconciler.remove(&part)?;
            if !report.removed_anything() {
                println!("Component {part} is not in the project");
                return Ok(ExitCode::SUCCESS);
            }
            if let Some(symbol) = &report.symbol {
                println!("  Removed symbol {}", symbol.name);
            }
            if let Some(footprint) = &report.footprint {
                println!("  Removed footprint {}", footprint.display());
            }
            println!("✓ Component {part} removed");
        }

        Command::List { detailed, format } => {
            let components = reconciler.list()?;
            if format != OutputFormat::Text {
                return Ok(export_components(&components, format));
            }
            print_components(project, &components, detailed);
        }

        Command::Sync { clean } => {
            let report = reconciler.sync(SyncOptions { clean }).await?;
            for removed in &report.removed {
                println!("  - {removed} (no longer listed)");
            }
            for synced in &report.synced {
                println!("  • {synced} ✓");
            }
            for failed in &report.failed {
                println!("  • {} ✗", failed.external_id);
                println!("    Error: {}", failed.reason);
            }
            println!();
            if report.is_success() {
                println!("✓ All {} component(s) synced successfully", report.synced.len());
            } else {
                println!(
                    "⚠ Synced {}/{} components ({} failed)",
                    report.synced.len(),
                    report.attempted(),
                    report.failed.len()
                );
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Status => {
            let plan = reconciler.plan()?;
            if plan.is_clean() {
                println!("✓ Library matches {MANIFEST_FILE}");
            }
            for missing in &plan.missing {
                println!("  + {missing}  (listed, not installed)");
            }
            for extra in &plan.extra {
                match &extra.symbol {
                    Some(symbol) => println!(
                        "  - {}  ({symbol}, installed, not listed)",
                        extra.external_id
                    ),
                    None => println!("  - {}  (installed, not listed)", extra.external_id),
                }
            }
            if !plan.is_clean() {
                println!("\nRun 'jlcmgr sync' to bring the library in line");
            }
        }

        Command::Enrich { part } => {
            let outcome = reconciler.enrich(&part).await?;
            report_enrichment(&part, &outcome);
            if matches!(outcome, EnrichOutcome::Failed(_) | EnrichOutcome::NotFound) {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Entry point for jlcmgr.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    let start = args.directory.clone().unwrap_or_else(|| PathBuf::from("."));
    let project = match find_kicad_project(&start) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("✗ {e}");
            eprintln!("  Make sure you're inside a KiCad project directory (contains a .kicad_pro file)");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        project = %project.name(),
        file = %project.project_file().display(),
        "Found KiCad project"
    );

    let reconciler = Reconciler::new(
        project.root(),
        cfg.generator.symbol_lib.as_str(),
        Jlc2KicadLib::new(&cfg.generator),
        LcscClient::new(&cfg.supplier),
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&reconciler, &project, args.command)) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("✗ {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
