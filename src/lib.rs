// Library root
// -----------
// The binary (`main.rs`) is a thin dispatcher over these modules. One
// module per concern:
//
// - `cli`: clap surface for the four commands.
// - `config`: named service deployments and auth constants, handed to the
//   other components explicitly.
// - `state`: the session state file (load, merge, atomic save).
// - `email`: author email reconciliation and the Prompter seam.
// - `api`: HTTP boundary (flow service calls, Globus Auth login, the
//   token cache).
// - `flow`: the `run` command.
// - `status`: the `status` command.
// - `auth`: the `login` and `logout` commands.
// - `ui`: dialoguer prompts and the indicatif spinner.
// - `error`: failure taxonomy and exit codes.
//
// The split keeps the decision-heavy parts (email, state merging, status
// resolution, the logout probe) free of terminal and network handles, so
// the tests under tests/ can drive them through fakes.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod email;
pub mod error;
pub mod flow;
pub mod state;
pub mod status;
pub mod ui;
