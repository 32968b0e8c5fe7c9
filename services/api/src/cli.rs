use crate::demo::{run_demo, run_plan_preview, DemoArgs, PlanArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use placement_billing::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Placement Billing",
    about = "Run and demonstrate the deployment billing engine from the command line",
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
    /// Project a billing plan for a placement without touching any store
    Plan(PlanArgs),
    /// Walk a seeded placement through planning, billing, payment and compliance
    Demo(DemoArgs),
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
        Command::Plan(args) => run_plan_preview(args),
        Command::Demo(args) => run_demo(args),
    }
}
