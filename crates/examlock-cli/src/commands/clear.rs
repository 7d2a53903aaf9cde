use super::{open_durable, CliResult};

pub fn run() -> CliResult {
    let mut persistence = open_durable()?;
    persistence.clear_all()?;
    tracing::info!("durable penalty state wiped");
    println!("penalty state cleared");
    Ok(())
}
