use clap::Parser;

use nestegg::cli::{Cli, run};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    run(Cli::parse())
}
