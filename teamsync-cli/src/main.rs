//! teamsync: mirror directory group membership into Gitea teams.
//!
//! # Usage
//!
//! ```text
//! teamsync [--config <path>] [--loglevel <level>] [--dryrun <true|false>] [--once] [--json]
//! ```
//!
//! One run happens at startup. When the configuration carries a schedule
//! (`ReqTime` / `REP_TIME`) and `--once` is not given, the process then stays
//! up and runs on that schedule until ctrl-c.

mod commands;

use anyhow::Result;
use clap::Parser;

use commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(
    name = "teamsync",
    version,
    about = "Synchronize Gitea team membership from LDAP groups",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

fn main() -> Result<()> {
    Cli::parse().run.run()
}
