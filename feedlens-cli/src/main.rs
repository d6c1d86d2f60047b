use anyhow::Result;
use clap::Parser;
use feedlens_cli::cli::{self, AnalyzeArgs, Cli, Commands};
use feedlens_cli::mock_llm;
use feedlens_core::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init("warn", cli.json_logs);

    match cli.command {
        Commands::Analyze {
            file,
            text_column,
            timestamp_column,
            batch_size,
            dry_run,
            save,
            name,
            output,
        } => {
            let config = cli::load_config(cli.config.as_deref(), batch_size)?;
            let args = AnalyzeArgs {
                file,
                text_column,
                timestamp_column,
                dry_run,
                save,
                name,
                output,
            };
            cli::analyze_command(&config, args).await
        }
        Commands::History => {
            let config = cli::load_config(cli.config.as_deref(), None)?;
            cli::history_command(&config).await
        }
        Commands::Show { id } => {
            let config = cli::load_config(cli.config.as_deref(), None)?;
            cli::show_command(&config, &id).await
        }
        Commands::Compare { current, previous } => {
            let config = cli::load_config(cli.config.as_deref(), None)?;
            cli::compare_command(&config, &current, &previous).await
        }
        Commands::MockServer { port, scenario } => mock_llm::start_mock_server(port, scenario).await,
    }
}
