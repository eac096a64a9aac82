use clap::{Parser, Subcommand};
use horus_store::cli::{self as prog_cli, Command};
use horus_store::config::ServiceConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "horusctl", version, about = "Build and inspect document store commands")]
struct Cli {
    /// Path to a horus.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(name = "filter", about = "Print an equality filter built from key=value terms")]
    Filter {
        #[arg(value_parser = parse_term_arg, help = "key=value; JSON values keep their type")]
        terms: Vec<(String, String)>,
    },
    #[command(name = "update", about = "Print an update document")]
    Update {
        #[arg(help = "Operator, e.g. set, inc, currentDate")]
        operator: String,
        #[arg(help = "Fields as a JSON object")]
        fields: String,
    },
    #[command(name = "spatial", about = "Print a spatial filter on the location field")]
    Spatial {
        #[arg(help = "near, nearSphere, geoWithin or geoIntersects")]
        operator: String,
        #[arg(help = "Point, Polygon or MultiPolygon")]
        shape: String,
        #[arg(help = "Coordinates as JSON, e.g. [-122.66,45.69]")]
        coordinates: String,
        #[arg(long = "max")]
        max_distance: Option<f64>,
        #[arg(long = "min")]
        min_distance: Option<f64>,
    },
    #[command(name = "check-config", about = "Load and validate the service config")]
    CheckConfig,
}

fn parse_term_arg(s: &str) -> Result<(String, String), String> {
    prog_cli::parse_term(s).map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();
    let command = match cli.command {
        Commands::Filter { terms } => Command::Filter { terms },
        Commands::Update { operator, fields } => Command::Update { operator, fields_json: fields },
        Commands::Spatial { operator, shape, coordinates, max_distance, min_distance } => Command::Spatial {
            operator,
            shape,
            coordinates_json: coordinates,
            max_distance,
            min_distance,
        },
        Commands::CheckConfig => Command::CheckConfig { path: cli.config.clone() },
    };

    if let Ok(cfg) = ServiceConfig::load(cli.config.as_deref()) {
        if let Err(e) = prog_cli::setup_logging(&cfg) {
            eprintln!("warning: logging disabled: {e}");
        }
    }

    let stdout = std::io::stdout();
    if let Err(e) = prog_cli::run(command, &mut stdout.lock()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
