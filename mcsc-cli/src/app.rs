use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// mcsc - check Minecraft command files against a running server's grammar
#[derive(Debug, Parser)]
#[command(name = "mcsc", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Shared channel file (default: mcsc.pipe in the system temp directory).
    #[arg(long, global = true, env = "MCSC_PIPE", value_name = "PATH")]
    pub pipe: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check command files against the validator running inside the server.
    Check {
        /// Command files, relative to the current directory.
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<PathBuf>,

        /// Seconds to wait for the validator's answer; 0 waits forever.
        #[arg(long, default_value_t = 30, value_name = "SECS")]
        timeout: u64,
    },

    /// Insert the validator hook into a server entry class.
    Patch {
        /// The class file to patch.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Where to write the patched class.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Name of the method to patch.
        #[arg(long, default_value = "main")]
        method: String,

        /// Host root type the construction call must produce (repeatable).
        #[arg(long = "root", value_name = "TYPE")]
        roots: Vec<String>,

        /// Class declaring the hook.
        #[arg(long, default_value = "server.Main")]
        hook_owner: String,

        /// Name of the hook method.
        #[arg(long, default_value = "init")]
        hook_name: String,

        /// Descriptor of the hook method.
        #[arg(long, default_value = "(Ljava/lang/Object;)V")]
        hook_descriptor: String,
    },

    /// Disassemble the methods of a class file.
    Disasm {
        /// The class file to disassemble.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Only disassemble methods with this name.
        #[arg(long, value_name = "NAME")]
        method: Option<String>,
    },
}
