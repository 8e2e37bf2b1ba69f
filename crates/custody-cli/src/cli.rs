use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "custody",
    about = "Chain-of-custody ledger: register, anchor and verify supply events",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a custody event and wait for its anchor to settle
    Register(RegisterArgs),
    /// Show one event record
    Show(IdArgs),
    /// List event records
    List(ListArgs),
    /// Show the anchoring status of an event
    Status(IdArgs),
    /// Re-verify an event against the ledger and content store
    Verify(IdArgs),
    /// Verified view of a product's custody chain
    View(ProductArgs),
    /// Verified history of a product with totals
    History(ProductArgs),
    /// Check a product's chain for a missing manufacture event and backdated events
    Chain(ProductArgs),
    /// Check that the content store, metadata store and ledger are reachable
    Health,
    /// Run a complete register / anchor / verify / tamper walkthrough in memory
    Demo(DemoArgs),
    /// Print or check configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct RegisterArgs {
    /// manufacture, distribution, receipt or verification
    #[arg(short = 't', long = "type")]
    pub event_type: String,
    #[arg(short, long)]
    pub product: String,
    /// Event payload (JSON)
    #[arg(long)]
    pub payload: String,
    #[arg(short, long)]
    pub actor: String,
    /// Return immediately instead of waiting for the anchor
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Args)]
pub struct IdArgs {
    /// Event id
    pub id: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only events of this product
    #[arg(short, long)]
    pub product: Option<String>,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ProductArgs {
    pub product: String,
}

#[derive(Args)]
pub struct DemoArgs {
    #[arg(short, long, default_value = "LOT-2026-0001")]
    pub product: String,
    /// Anchor through a registry contract instead of direct transactions
    #[arg(long)]
    pub contract: bool,
    /// Skip the tampering step
    #[arg(long)]
    pub no_tamper: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration file
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_register() {
        let cli = Cli::try_parse_from([
            "custody", "register", "-t", "manufacture", "-p", "LOT-1", "--payload", "{}", "-a",
            "plant-7",
        ])
        .unwrap();
        if let Command::Register(args) = cli.command {
            assert_eq!(args.event_type, "manufacture");
            assert_eq!(args.product, "LOT-1");
            assert_eq!(args.actor, "plant-7");
            assert!(!args.no_wait);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn register_requires_actor() {
        assert!(Cli::try_parse_from(["custody", "register", "-t", "receipt", "-p", "LOT-1", "--payload", "{}"]).is_err());
    }

    #[test]
    fn parse_list_with_limit() {
        let cli = Cli::try_parse_from(["custody", "list", "-n", "5"]).unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.limit, Some(5));
            assert!(args.product.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["custody", "view", "LOT-1", "--format", "json", "-c", "custody.toml"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("custody.toml")));
        assert!(matches!(cli.command, Command::View(_)));
    }

    #[test]
    fn parse_demo_defaults() {
        let cli = Cli::try_parse_from(["custody", "demo", "--contract"]).unwrap();
        if let Command::Demo(args) = cli.command {
            assert_eq!(args.product, "LOT-2026-0001");
            assert!(args.contract);
            assert!(!args.no_tamper);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_config_without_action() {
        let cli = Cli::try_parse_from(["custody", "config"]).unwrap();
        if let Command::Config(args) = cli.command {
            assert!(args.action.is_none());
        } else { panic!("wrong command"); }
    }
}
