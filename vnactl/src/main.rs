use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = vnactl::Cli::parse();
    if let Err(err) = vnactl::run(cli) {
        eprintln!("erro: {err}");
        std::process::exit(1);
    }
}
