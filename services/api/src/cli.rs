use crate::demo::{run_audit, run_demo, run_rules, AuditRunArgs, DemoArgs, RulesArgs};
use crate::server;
use balance_audit::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Balance Audit",
    about = "Run SYSCOHADA trial balance consistency audits from the command line or over HTTP",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Audit trial balances stored as JSON files
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
    /// Audit a synthetic two-exercise balance, apply the proposed entries and re-audit
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Run every level over a trial balance and write the report
    Run(AuditRunArgs),
    /// List the controls of the catalog
    Rules(RulesArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Audit {
            command: AuditCommand::Run(args),
        } => run_audit(args),
        Command::Audit {
            command: AuditCommand::Rules(args),
        } => run_rules(args),
        Command::Demo(args) => run_demo(args),
    }
}
