use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "zoe", about = "Zoe command-line client", version)]
pub struct Cli {
    /// Enable debug output.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Zoe master URL. Also read from ZOE_URL.
    #[arg(long, env = "ZOE_URL", global = true)]
    pub url: Option<String>,

    /// Username for authentication. Also read from ZOE_USER.
    #[arg(long, env = "ZOE_USER", global = true)]
    pub user: Option<String>,

    /// Password for authentication. Also read from ZOE_PASS.
    #[arg(long, env = "ZOE_PASS", global = true)]
    pub pass: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Query the API for supported versions.
    Info,

    /// Validate an application description.
    AppValidate {
        /// Path to an application description JSON file.
        jsonfile: PathBuf,
    },

    /// Start an execution.
    Start {
        /// Name of the execution.
        name: String,
        /// Path to an application description JSON file.
        jsonfile: PathBuf,
    },

    /// List all executions visible to the calling user.
    ExecLs,

    /// Get execution status.
    ExecGet {
        /// Execution id.
        id: i64,
    },

    /// Retrieve the application description of an execution.
    ExecAppGet {
        /// Execution id.
        id: i64,
    },

    /// Terminate a running execution.
    Terminate {
        /// Execution id.
        id: i64,
    },

    /// Delete an execution, terminating it first if necessary.
    ExecRm {
        /// Execution id.
        id: i64,
    },

    /// Stream the logs of a service.
    Logs {
        /// Service id.
        service_id: i64,
        /// Prefix each line with its timestamp.
        #[arg(short = 't', long)]
        timestamps: bool,
    },

    /// Print all available statistics.
    Stats,
}
