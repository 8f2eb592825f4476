//! SOAP Orb CLI
//!
//! Usage:
//!   soap-orb [-v...] build <REQUEST> -o <FILE> [--profile <FILE>] [--templates <DIR>]
//!   soap-orb [-v...] report <KIND> <FILE> [--profile <FILE>]
//!   soap-orb [-v...] platforms <FILE>
//!   soap-orb [-v...] templates [--templates <DIR>]

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use soap_orb::{write_scenario, BuildConfig, Profile, ScenarioRequest};

#[derive(Parser)]
#[command(name = "soap-orb")]
#[command(about = "Generate SOAP scenario files and read the reports they produce")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose a scenario file from a TOML request
    Build {
        /// Scenario request (TOML)
        request: PathBuf,

        /// Output scenario file
        #[arg(short, long)]
        output: PathBuf,

        /// Format profile for the target application version (TOML)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Directory holding a `library.toml` fragment library
        #[arg(short, long)]
        templates: Option<PathBuf>,
    },

    /// Read a report produced by the application
    Report {
        /// Report kind as pinned in the profile, e.g. `contact`
        kind: String,

        /// Report file
        file: PathBuf,

        /// Format profile for the target application version (TOML)
        #[arg(short, long)]
        profile: Option<PathBuf>,
    },

    /// List the platforms defined in a scenario file
    Platforms {
        /// Scenario file
        file: PathBuf,
    },

    /// List the templates in the fragment library
    Templates {
        /// Directory holding a `library.toml` fragment library
        #[arg(short, long)]
        templates: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Command::Build {
            request,
            output,
            profile,
            templates,
        } => {
            let content = read_file(&request);
            let request = match ScenarioRequest::from_toml(&content) {
                Ok(r) => r,
                Err(e) => fail(&format!("Error in request '{}': {}", request.display(), e)),
            };
            let config = load_config(profile.as_deref(), templates.as_deref());
            match write_scenario(&request, &config, &output) {
                Ok(document) => {
                    println!(
                        "Wrote {} ({} entries)",
                        output.display(),
                        document.entry_blocks().count()
                    );
                }
                Err(e) => fail(&format!("Error: {}", e)),
            }
        }

        Command::Report {
            kind,
            file,
            profile,
        } => {
            let profile = load_profile(profile.as_deref());
            let raw = read_file(&file);
            let report = match profile.parse_report(&kind, &raw) {
                Ok(r) => r,
                Err(e) => fail(&format!("Error reading '{}': {}", file.display(), e)),
            };
            for record in &report.records {
                let row: Vec<String> = record.values().map(|v| v.to_string()).collect();
                println!("{}", row.join(","));
            }
            for error in &report.errors {
                eprintln!("{}: {}", file.display(), error);
            }
            if !report.is_clean() {
                std::process::exit(1);
            }
        }

        Command::Platforms { file } => {
            let source = read_file(&file);
            let filename = file.display().to_string();
            match soap_orb::read_platforms(&source) {
                Ok(platforms) => {
                    for platform in &platforms {
                        println!("{}\t{}", platform.name(), platform.body());
                    }
                }
                Err(errors) => {
                    for error in &errors {
                        eprint!("{}", error.format(&source, &filename));
                    }
                    std::process::exit(1);
                }
            }
        }

        Command::Templates { templates } => {
            let store = load_config(None, templates.as_deref()).store;
            for id in store.ids() {
                if let Some(template) = store.get(id) {
                    println!("{}\t{}\t{}", id, template.kind, template.placeholders().join(" "));
                }
            }
        }
    }
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn read_file(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => fail(&format!("Error reading file '{}': {}", path.display(), e)),
    }
}

fn load_profile(path: Option<&Path>) -> Profile {
    match path {
        Some(path) => match Profile::from_file(path) {
            Ok(p) => p,
            Err(e) => fail(&format!("Error loading profile '{}': {}", path.display(), e)),
        },
        None => Profile::default(),
    }
}

fn load_config(profile: Option<&Path>, templates: Option<&Path>) -> BuildConfig {
    match BuildConfig::load(profile, templates) {
        Ok(config) => config,
        Err(e) => fail(&format!("Error loading configuration: {}", e)),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}
