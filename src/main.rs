// src/main.rs

use wmlkit::errors::WmlkitError;
use wmlkit::{EXIT_KILLED, cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(code) => std::process::exit(code),
        Err(err) if matches!(err.downcast_ref::<WmlkitError>(), Some(WmlkitError::Cancelled(_))) => {
            eprintln!("wmlkit: {err}");
            std::process::exit(EXIT_KILLED);
        }
        Err(err) => {
            eprintln!("wmlkit error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
