//! Binary entry point: parse the launch command, mount the application,
//! run the supervisor, and map errors to exit codes.

use std::process::ExitCode;

use clap::Parser;

use servisor::cli::Cli;
use servisor::{AppRequest, AppResponse, HandlerFn, ServeError, Supervisor};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = match cli.into_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("servisor: {err}");
            return ExitCode::FAILURE;
        }
    };

    // The hosted application mounts here. The built-in placeholder just
    // confirms the pool is serving; real deployments implement `Handler`
    // (or pass a closure) over their own application.
    let app = HandlerFn::arc(|_req: AppRequest| async {
        Ok::<_, ServeError>(AppResponse::text("servisor: pool is serving\n"))
    });

    let sup = match Supervisor::builder(cfg).with_handler(app).build() {
        Ok(sup) => sup,
        Err(err) => {
            eprintln!("servisor: {err}");
            return ExitCode::FAILURE;
        }
    };

    match sup.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_startup_fatal() => {
            eprintln!("servisor: {err}");
            ExitCode::FAILURE
        }
        Err(err) => {
            // Operational errors (drain overrun) still end in a completed
            // shutdown; exit clean per the launch contract.
            eprintln!("servisor: {err}");
            ExitCode::SUCCESS
        }
    }
}
