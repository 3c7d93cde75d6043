mod commands;
mod export;
mod terminal;

use commands::{CommandLine, run};
use edgeprobe_common::config::Config;
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands: CommandLine = CommandLine::parse_args();

    logging::init_logging(commands.verbose, commands.quiet);
    print::banner(commands.quiet);
    commands.tips();

    let config: Config = commands.to_config();
    run::run(&config).await
}
