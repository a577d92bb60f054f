// Protocol output goes to stdout; diagnostics go through `log` (RUST_LOG=debug).
use anyhow::Context;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    vinci::uci::run().context("uci shell failed")
}
