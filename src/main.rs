// src/main.rs

use execwatch::cli::{self, CliCommand, LogLevel};
use execwatch::{logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("execwatch error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    // Forked entry points share their stderr with the redirected child
    // stream, so keep them quiet unless asked.
    let fallback = match args.command {
        CliCommand::Entry(_) => LogLevel::Warn,
        CliCommand::Run(_) => LogLevel::Info,
    };
    logging::init_logging(args.log_level, fallback)?;
    run(args).await
}
