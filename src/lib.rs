// Library root
// -----------
// The binary (`main.rs`) wires these modules into the `mkrepo` CLI.
//
// Module responsibilities:
// - `api`: the request engine - builds the signed form request and drives
//   it through the provider's redirect/re-auth behavior to a terminal
//   response.
// - `cli`: clap definitions for the `create` and `login` subcommands and
//   the mapping from flags to form fields.
// - `error`: error taxonomy shared by the builder and the executor.
// - `keychain`: per-hostname credential storage and lookup.
// - `ui`: operator output (field table, hop dumps) and the login prompt.
//
// Keeping the engine behind the library surface means the binary only
// decides exit codes; nothing below it terminates the process.
pub mod api;
pub mod cli;
pub mod error;
pub mod keychain;
pub mod ui;
