use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;

use deployhost::config::{AppState, Config};
use deployhost::logger;
use deployhost::manifest::{BuildPlan, Manifest};
use deployhost::routing::{Deployment, Destination};
use deployhost::server::{self, SignalHandler};

#[derive(Parser)]
#[command(name = "deployhost", version, about = "Serve a project from its deployment manifest")]
struct Cli {
    /// Configuration file, extension optional
    #[arg(short, long, default_value = "config")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Parse and validate the manifest
    Check {
        /// Manifest to check instead of the configured one
        #[arg(long)]
        manifest: Option<String>,
    },
    /// Print the install and build plan
    Plan,
    /// Show where a request path is routed
    Route {
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
    },
    /// Print the normalised manifest
    Print,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;
    let manifest_path = cfg.deploy.manifest_path.clone();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            serve(cfg)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { manifest } => Ok(check(manifest.as_deref().unwrap_or(&manifest_path))),
        Command::Plan => {
            let manifest = Manifest::load(&manifest_path)?;
            print!("{}", BuildPlan::from_manifest(&manifest));
            Ok(ExitCode::SUCCESS)
        }
        Command::Route { path, method } => route(&manifest_path, &method, &path),
        Command::Print => {
            println!("{}", Manifest::load(&manifest_path)?.to_json_pretty()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn check(path: &str) -> ExitCode {
    match Deployment::load(path) {
        Ok(deployment) => {
            println!(
                "{path}: OK ({} build(s), {} route(s))",
                deployment.manifest.builds.len(),
                deployment.routes.len()
            );
            for (src, runtime) in deployment.entrypoints() {
                println!("  entrypoint {src} -> {runtime}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{path}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn route(
    manifest_path: &str,
    method: &str,
    path: &str,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let deployment = Deployment::load(manifest_path)?;
    let Some(resolved) = deployment.routes.resolve(method, path) else {
        println!("{method} {path}: no route matches");
        return Ok(ExitCode::FAILURE);
    };

    let target = match deployment.destination(&resolved.dest) {
        Destination::Entrypoint { src, runtime } => format!("entrypoint {src} ({runtime})"),
        Destination::Static { path } => format!("static file {path}"),
    };
    println!(
        "{method} {path} -> {} via route #{}: {target}",
        resolved.dest, resolved.index
    );
    Ok(ExitCode::SUCCESS)
}

fn serve(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    logger::init(&cfg)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let deployment = Deployment::load(&cfg.deploy.manifest_path)?;
    logger::log_manifest_loaded(&cfg.deploy.manifest_path, &deployment);

    let listener = server::create_reusable_listener(addr)?;
    let state = Arc::new(AppState::new(&cfg, deployment));
    logger::log_server_start(&addr, &cfg);

    let signals = Arc::new(SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    // LocalSet for spawn_local connection tasks
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::run_server(listener, state, signals))
        .await?;
    Ok(())
}
