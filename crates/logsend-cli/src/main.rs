//! logsend CLI binary entrypoint.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use logsend_cli::cli::{Cli, Commands};
use logsend_cli::commands::{
    CollectCommand, EchoCommand, InspectCommand, PackCommand, open_async_input, open_input,
};
use logsend_cli::output::OutputFormat;
use logsend_core::{Sender, WriterSender};

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries forwarded messages and reports
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn stdout_sender() -> Arc<dyn Sender> {
    Arc::new(WriterSender::new("stdout", io::stdout()))
}

async fn run(cli: Cli) -> Result<(), logsend_cli::CliError> {
    let format = OutputFormat::new(cli.format);

    match cli.command {
        Commands::Collect(args) => {
            let input = open_async_input(args.input.as_deref()).await?;
            let cmd = CollectCommand::new(args);
            cmd.execute(input, stdout_sender(), &mut io::stderr(), &format)
                .await?;
        }
        Commands::Inspect(args) => {
            let cmd = InspectCommand::new(args);
            cmd.execute(&mut io::stdout().lock(), &format)?;
        }
        Commands::Pack(args) => {
            let input = open_input(args.input.as_deref())?;
            let cmd = PackCommand::new(args);
            cmd.execute(input, &mut io::stdout().lock(), &format)?;
        }
        Commands::Echo(args) => {
            let input = open_input(args.input.as_deref())?;
            let cmd = EchoCommand::new(args);
            cmd.execute(input, stdout_sender()).await?;
        }
    }

    Ok(())
}
