use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;

#[derive(Parser)]
#[command(name = "tilescape", about = "Tile scene renderer demo")]
struct Args {
    /// Load a saved renderer configuration
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Transform and sort geometry on the CPU instead of the compute pass
    #[arg(long)]
    software_sort: bool,

    /// Start with shadows disabled
    #[arg(long)]
    no_shadows: bool,

    /// Window width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Window height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => match tilescape::config::load_config(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("could not load config from {}: {e}", path.display());
                tilescape::RendererConfig::default()
            }
        },
        None => tilescape::RendererConfig::default(),
    };
    if args.software_sort {
        config.compute_sort = false;
    }
    if args.no_shadows {
        config.shadows.enabled = false;
    }

    if let Err(e) = app::run(config, args.width, args.height) {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}
