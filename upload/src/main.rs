mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "xray-upload",
    version,
    about = "Upload Cypress run results and Cucumber features to Xray"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload the results of a finished Cypress run
    Results {
        /// Cypress run results as JSON
        file: PathBuf,
        /// JSON object mapping scenario names to their tags
        #[arg(long)]
        scenario_tags: Option<PathBuf>,
    },
    /// Import a Cucumber feature file
    ImportFeature {
        file: PathBuf,
        #[arg(long)]
        project_key: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Export Cucumber tests as a feature file
    ExportFeature {
        /// Issue keys to export
        #[arg(long, value_delimiter = ';')]
        keys: Vec<String>,
        /// Saved filter id
        #[arg(long)]
        filter: Option<u64>,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Results {
            file,
            scenario_tags,
        } => commands::results(&file, scenario_tags.as_deref()),
        Command::ImportFeature {
            file,
            project_key,
            project_id,
            source,
        } => commands::import_feature(file, project_key, project_id, source),
        Command::ExportFeature {
            keys,
            filter,
            output_dir,
        } => commands::export_feature(keys, filter, &output_dir),
    };
    if let Err(e) = result {
        println!("{:?}", e);
        process::exit(1);
    }
}
