use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

const DEFAULT_URL: &str = "http://127.0.0.1:8642/rpc";

#[derive(Parser)]
#[command(name = "inv", about = "Inventory object store over JSON-RPC", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the JSON-RPC server
    Serve(ServeArgs),
    /// Send one call to a server
    Call(CallArgs),
    /// List the types a server knows
    Types(RemoteArgs),
    /// List the methods of a type
    Methods(MethodsArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Snapshot file backing the store
    #[arg(long)]
    pub data_file: Option<PathBuf>,
    #[arg(long)]
    pub workers: Option<usize>,
    #[arg(long)]
    pub enforce_acl: bool,
}

#[derive(Args)]
pub struct RemoteArgs {
    #[arg(long, default_value = DEFAULT_URL)]
    pub url: String,
}

#[derive(Args)]
pub struct CallArgs {
    /// Dotted method name, e.g. `object.repr.get`
    pub method: String,
    /// Params object as JSON
    #[arg(short, long)]
    pub params: Option<String>,
    #[arg(long, default_value = "1")]
    pub id: i64,
    /// Send without an id and expect no answer
    #[arg(long)]
    pub notify: bool,
    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Args)]
pub struct MethodsArgs {
    pub type_name: String,
    #[command(flatten)]
    pub remote: RemoteArgs,
}
