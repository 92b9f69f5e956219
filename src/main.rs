// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, wire up the executor, map the outcome
//   to an exit code.
// - Exit codes: 0 success, 2 argument/credential/network problems, 3
//   unrecoverable HTTP failures. clap itself exits 2 on bad flags.

use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::debug;

use mkrepo::api::{Executor, ReqwestTransport, CREDENTIAL_HOST, REPOSITORIES_URL};
use mkrepo::cli::{Cli, Command, CreateArgs};
use mkrepo::keychain::FileStore;
use mkrepo::ui::{self, WriterSink};

fn main() {
    // Logging is opt-in via RUST_LOG; the per-hop diagnostics dumps are a
    // separate, always-on surface.
    env_logger::init();
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Login => match ui::login(&FileStore::from_config_dir(), CREDENTIAL_HOST) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("mkrepo: {err:#}");
                2
            }
        },
        Command::Create(args) => create(&args),
    };
    if code != 0 {
        process::exit(code);
    }
}

fn create(args: &CreateArgs) -> i32 {
    let transport = match ReqwestTransport::new().context("Failed to set up HTTP transport") {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("mkrepo: {err:#}");
            return 2;
        }
    };
    let store = FileStore::from_config_dir();
    let mut executor = Executor::new(transport, store, WriterSink::stderr())
        .with_timeout(Duration::from_secs(args.timeout));

    let fields = args.form_fields();
    debug!("posting {} field(s) to {}", fields.len(), REPOSITORIES_URL);

    match executor.exec("POST", REPOSITORIES_URL, CREDENTIAL_HOST, &fields) {
        Ok(response) if response.status.is_success() => {
            println!("Created new repository.\n");
            ui::print_form_values(&fields);
            println!("\nDone");
            0
        }
        Ok(response) => {
            // Either the provider said no outright, or the hop budget ran
            // out while it was still redirecting or challenging.
            eprintln!("Request failed with status {}", response.status);
            3
        }
        Err(err) => {
            eprintln!("mkrepo: {err:#}");
            err.exit_code()
        }
    }
}
