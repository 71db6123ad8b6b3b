use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
pub use app::App;

#[derive(Parser, Debug)]
#[command(name = "iat-app", version, about = "Run an Implicit Association Test")]
pub struct Args {
    /// Experiment definition exported by the authoring server (JSON)
    #[arg(long)]
    pub experiment: PathBuf,

    /// Participant or session identifier stored with the responses
    #[arg(long)]
    pub participant: String,

    /// TrueType/OpenType font for labels and words
    #[arg(long)]
    pub font: PathBuf,

    /// Directory the finished response log is written to
    #[arg(long, default_value = "./iat-results")]
    pub output: PathBuf,

    /// Seed for stimulus selection and block balancing
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run in a window instead of borderless fullscreen
    #[arg(long)]
    pub windowed: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("iat_app=info,iat_experiment=info")),
        )
        .init();

    let args = Args::parse();
    let app = App::new(args)?;
    app.run()?;

    Ok(())
}
