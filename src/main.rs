use actix_web::{web, App, HttpServer};
use clap::Parser;
use tracing::{error, info};

mod client;
mod config;
mod error;
mod executor;
mod harness;
mod logging;
mod models;
mod report;
mod utils;
mod ws;

use config::{Cli, Command, RunArgs, ServeArgs};
use error::LoadError;

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level);

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Serve(args) => serve(args),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether every check passed.
fn run(args: RunArgs) -> Result<bool, LoadError> {
    let plan = args.to_plan()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let summary = runtime.block_on(executor::run_load_test(plan));
    report::print_summary(&summary);

    if let Some(path) = &args.summary_json {
        let path = report::write_json_summary(&summary, path)?;
        info!(path = %path.display(), "summary written");
    }

    Ok(summary.checks_ok())
}

fn serve(args: ServeArgs) -> Result<bool, LoadError> {
    info!("worker listening on ws://{}/ws", args.bind);

    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(|| App::new().route("/ws", web::get().to(ws::ws_handler)))
            .bind(&args.bind)?
            .run()
            .await
    })?;

    Ok(true)
}
