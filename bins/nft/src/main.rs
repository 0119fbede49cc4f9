//! nft command - nftables stateful object management.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use nftlink::netlink::NetlinkDialer;
use nftlink::nftables::Conn;
use output::{OutputFormat, OutputOptions};

#[derive(Parser)]
#[command(name = "nft", version, about = "nftables stateful object tool")]
struct Cli {
    /// Output JSON.
    #[arg(short = 'j', long)]
    json: bool,

    /// Pretty print JSON.
    #[arg(short = 'p', long)]
    pretty: bool,

    /// Operate inside the named network namespace.
    #[arg(short = 'n', long, value_name = "NAME")]
    netns: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage stateful objects (counters, quotas).
    #[command(visible_alias = "o", visible_alias = "object")]
    Obj(commands::obj::ObjCmd),
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let opts = OutputOptions {
        pretty: cli.pretty,
    };

    let dialer = match &cli.netns {
        Some(name) => NetlinkDialer::in_namespace(format!("/var/run/netns/{}", name)),
        None => NetlinkDialer::new(),
    };
    let mut conn = Conn::with_dialer(dialer);

    let result = match cli.command {
        Command::Obj(cmd) => cmd.run(&mut conn, format, &opts),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
