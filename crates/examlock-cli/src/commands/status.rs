use clap::Args;
use examlock_core::KvStore;

use super::{open_durable, CliResult};

#[derive(Args)]
pub struct StatusArgs {
    /// List the raw keys stored in the durable tier instead
    #[arg(long)]
    keys: bool,
}

pub fn run(args: StatusArgs) -> CliResult {
    let persistence = open_durable()?;
    if args.keys {
        let store = persistence.durable_tier();
        for key in store.keys()? {
            let value = store.get(&key)?.unwrap_or_default();
            println!("{key}\t{value}");
        }
        return Ok(());
    }
    let (_, durable) = persistence.load();
    println!("{}", serde_json::to_string_pretty(&durable)?);
    Ok(())
}
