use crate::demo::{run_demo, run_params_show, run_params_validate, run_recommend, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use hopelink::error::AppError;
use hopelink::matching::parameters::{FactorWeights, MatchingContext};
use hopelink::matching::UserRole;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "HopeLink Matching",
    about = "Run and explore the HopeLink donation matching engine from the command line",
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
    /// Print ranked recommendations for one user
    Recommend(RecommendArgs),
    /// Inspect or dry-run matching parameters
    Params {
        #[command(subcommand)]
        command: ParamsCommand,
    },
    /// Walk through recommendations, match creation, and volunteer pickup on demo data
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ParamsCommand {
    /// Show the active parameters for a matching context
    Show(ParamsShowArgs),
    /// Check a proposed weight set against the sum-to-one rule
    Validate(ParamsValidateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Directory of users/donations/requests/volunteers CSV files to load at startup
    #[arg(long)]
    pub(crate) seed_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct RecommendArgs {
    /// Seed directory to score against. Uses the built-in demo data when omitted.
    #[arg(long)]
    pub(crate) seed_dir: Option<PathBuf>,
    /// User to recommend for
    #[arg(long)]
    pub(crate) user: String,
    /// Role the user acts in (donor, recipient, volunteer)
    #[arg(long)]
    pub(crate) role: UserRole,
    /// Matches per group (1-50)
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    /// Emit the raw JSON payload instead of the text rendering
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ParamsShowArgs {
    /// DONOR_RECIPIENT or DONOR_RECIPIENT_VOLUNTEER
    #[arg(long, default_value = "DONOR_RECIPIENT")]
    pub(crate) context: MatchingContext,
}

#[derive(Args, Debug)]
pub(crate) struct ParamsValidateArgs {
    /// Weights as geo,item,urgency,reliability,delivery (e.g. 0.3,0.25,0.2,0.15,0.1)
    #[arg(long, value_parser = crate::infra::parse_weights)]
    pub(crate) weights: FactorWeights,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Recommend(args) => run_recommend(args),
        Command::Params {
            command: ParamsCommand::Show(args),
        } => run_params_show(args.context),
        Command::Params {
            command: ParamsCommand::Validate(args),
        } => run_params_validate(args.weights),
        Command::Demo(args) => run_demo(args),
    }
}
