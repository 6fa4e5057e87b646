/*!
appsody: build container images for stack-based projects with Docker or Buildah.

Modules:
- `cli` / `commands`: clap definitions and dispatch (`build`, `extract`, `inspect`, `version`).
- `config` / `project`: global config file and per-project `.appsody-config.yaml`.
- `docker` / `reference`: engine invocation, dry-run echo and image reference validation.
- `extract` / `builder`: stack + project extraction and the image build pipeline.
- `logging` / `color` / `errors`: user-facing output, color policy and the error type.
- `cmdtest`: sandboxed harness used by the functional tests.
*/

pub mod builder;
pub mod cli;
pub mod cmdtest;
pub mod color;
pub mod commands;
pub mod config;
pub mod docker;
pub mod errors;
pub mod extract;
pub mod lock;
pub mod logging;
pub mod project;
pub mod reference;
pub mod util;

pub use builder::BuildOptions;
pub use color::ColorMode;
pub use commands::run_cli;
pub use config::{buildah_path, container_runtime_path, RootCommandConfig};
pub use docker::run_docker_inspect;
pub use errors::{exit_code_for_error, AppsodyError, CmdError};
pub use logging::{init_tracing, LoggingConfig, SharedBuffer};
