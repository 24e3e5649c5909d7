use anyhow::{Context, Result};
use argh::FromArgs;
use autoruns::{AutorunType, Enumerator, ScanOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(FromArgs)]
/// List programs configured to start automatically at boot or logon.
struct Args {
    #[argh(switch)]
    /// print the records as a JSON array.
    json: bool,

    #[argh(switch)]
    /// do not compute MD5/SHA1/SHA256 of the images.
    no_hash: bool,

    #[argh(option, default = "PathBuf::from(\"/\")")]
    /// root of the filesystem to scan. Defaults to /.
    root: PathBuf,

    #[argh(option, long = "type")]
    /// only report entries of this type (run_key, service, systemd, cron, ...). May be repeated.
    types: Vec<AutorunType>,

    #[argh(switch, short = 'v')]
    /// log what is scanned and skipped.
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("AUTORUNS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("autoruns={default_level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    let options = ScanOptions {
        root: args.root,
        hash: !args.no_hash,
        types: args.types,
    };
    let records = Enumerator::with_options(options).run();

    let mut stdout = io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &records).context("failed to write JSON")?;
        writeln!(stdout)?;
    } else {
        for record in &records {
            writeln!(stdout, "{record}\n")?;
        }
    }
    Ok(())
}
