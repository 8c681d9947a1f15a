use anyhow::Result;
use clap::Parser;
use mget::Args;

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(mget::commands::run(args))
}
