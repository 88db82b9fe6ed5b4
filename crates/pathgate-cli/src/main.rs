//! pathgate binary.
//!
//! Runs gateway operations on local paths from the shell. Privileged
//! fallback is available when the process runs as root.
//!
//! Usage:
//!   pathgate stat /sdcard/Download
//!   pathgate ls /data/app --mode privileged
//!   pathgate walk /sdcard/DCIM --json
//!   pathgate du /sdcard/Download
//!   pathgate rm -r /sdcard/tmp --config pathgate.toml

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use pathgate_io::{
    APathGateway, GatewayConfig, GatewayExt, GatewaySwitch, HostPeerConnector, LocalGateway, Mode,
    WalkErrorPolicy,
};
use pathgate_types::{APath, APathLookup, FileType, LocalPath};
use tracing_subscriber::{EnvFilter, fmt};

/// Filesystem access through pathgate gateways.
#[derive(Parser, Debug)]
#[command(name = "pathgate")]
#[command(about = "Inspect and modify files through pathgate gateways")]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Execution mode: automatic, unprivileged or privileged
    #[arg(long, global = true)]
    mode: Option<Mode>,

    /// Print lookups as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show metadata of a path
    Stat { path: PathBuf },
    /// List a directory
    Ls { path: PathBuf },
    /// List everything below a directory
    Walk {
        path: PathBuf,
        /// Keep going when a directory can't be listed
        #[arg(long)]
        skip_errors: bool,
    },
    /// Print the total size of a path and everything below it
    Du { path: PathBuf },
    /// Print a file to stdout
    Cat { path: PathBuf },
    /// Create a directory and missing parents
    Mkdir { path: PathBuf },
    /// Create an empty file if it doesn't exist
    Touch { path: PathBuf },
    /// Delete a file or empty directory
    Rm {
        path: PathBuf,
        /// Delete directories with their content
        #[arg(short, long)]
        recursive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.local.default_mode = mode;
    }

    let connector = HostPeerConnector::detect();
    let local = LocalGateway::with_connector(config.local, Arc::new(connector));
    let switch = GatewaySwitch::new().with_local(local);

    match args.command {
        Command::Stat { path } => {
            let lookup = switch.lookup(&to_apath(&path)?).await?;
            print_lookup(&lookup, args.json)?;
        }
        Command::Ls { path } => {
            for lookup in switch.lookup_files(&to_apath(&path)?).await? {
                print_lookup(&lookup, args.json)?;
            }
        }
        Command::Walk { path, skip_errors } => {
            let policy = if skip_errors {
                WalkErrorPolicy::Skip
            } else {
                WalkErrorPolicy::Abort
            };
            let mut entries = switch
                .walk(to_apath(&path)?)
                .with_on_error(policy)
                .into_stream();
            while let Some(lookup) = entries.next().await {
                print_lookup(&lookup?, args.json)?;
            }
        }
        Command::Du { path } => {
            let path = to_apath(&path)?;
            println!("{}\t{path}", switch.du(&path).await?);
        }
        Command::Cat { path } => {
            let mut reader = switch.read(&to_apath(&path)?).await?;
            tokio::io::copy(&mut reader, &mut tokio::io::stdout()).await?;
        }
        Command::Mkdir { path } => {
            let path = to_apath(&path)?;
            if !switch.create_dir(&path).await? {
                tracing::info!(%path, "directory already exists");
            }
        }
        Command::Touch { path } => {
            switch.create_file_if_necessary(&to_apath(&path)?).await?;
        }
        Command::Rm { path, recursive } => {
            let path = to_apath(&path)?;
            if recursive {
                switch.delete_all(&path, None).await?;
            } else {
                switch.delete(&path).await?;
            }
        }
    }
    Ok(())
}

fn to_apath(path: &Path) -> Result<APath> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("resolving {}", path.display()))?;
    Ok(LocalPath::new(absolute).into())
}

fn print_lookup(lookup: &APathLookup, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(lookup)?);
        return Ok(());
    }
    let kind = match lookup.file_type {
        FileType::Directory => 'd',
        FileType::File => '-',
        FileType::SymbolicLink => 'l',
        FileType::Unknown => '?',
    };
    let permissions = lookup
        .permissions
        .map(|p| p.to_string())
        .unwrap_or_else(|| "?????????".to_string());
    let owner = lookup
        .ownership
        .as_ref()
        .map(|o| {
            format!(
                "{} {}",
                o.user_name.clone().unwrap_or_else(|| o.user_id.to_string()),
                o.group_name.clone().unwrap_or_else(|| o.group_id.to_string())
            )
        })
        .unwrap_or_default();
    match &lookup.target {
        Some(target) => println!(
            "{kind}{permissions} {owner} {:>10} {} -> {target}",
            lookup.size, lookup.lookedup
        ),
        None => println!(
            "{kind}{permissions} {owner} {:>10} {}",
            lookup.size, lookup.lookedup
        ),
    }
    Ok(())
}
