mod enhance;
mod gradient;
mod options;
mod progress;
mod tile;

use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use options::Cli;

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli {
        Cli::Enhance(enhance) => enhance.run(),
        Cli::Tile(tile) => tile.run(),
    }
}
