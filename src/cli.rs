use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "ticket-dashboard")]
#[command(about = "Staff dashboard for Discord support tickets")]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    pub config: String,

    /// Run database migrations and exit
    #[arg(long, default_value_t = false)]
    pub migrate_only: bool,
}
