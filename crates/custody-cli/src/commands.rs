use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use custody_anchor::{Anchor, InMemoryChain};
use custody_content::InMemoryContentStore;
use custody_core::{
    ChainReport, CustodyConfig, CustodyService, HealthReport, Oracle, OracleView,
    VerifiedHistory,
};
use custody_meta::InMemoryMetadataStore;
use custody_types::{
    AnchorState, AnchorStatus, EventId, EventRecord, RegisterRequest, VerificationResult,
};
use serde::Serialize;
use tracing::debug;

use crate::cli::*;

const DEMO_CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
const LOCAL_CHAIN_ID: u64 = 1337;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Config(args) => cmd_config(&config, args),
        Command::Demo(args) => cmd_demo(&config, args, format).await,
        command => {
            let service = build_service(&config)?;
            let oracle = Oracle::new(service.clone(), &config.oracle);
            let outcome = match command {
                Command::Register(args) => cmd_register(&service, &config, args, format).await,
                Command::Show(args) => {
                    let record = service.get_by_id(&parse_id(&args.id)?).await?;
                    emit(format, &record, print_record)
                }
                Command::List(args) => cmd_list(&service, args, format).await,
                Command::Status(args) => {
                    let status = service.anchor_status(&parse_id(&args.id)?).await?;
                    emit(format, &status, print_status)
                }
                Command::Verify(args) => {
                    let result = service.verify_integrity(&parse_id(&args.id)?).await?;
                    emit(format, &result, print_verification)
                }
                Command::View(args) => {
                    let view = oracle.build_verified_view(&args.product).await?;
                    emit(format, &view, print_view)
                }
                Command::History(args) => {
                    let history = oracle.build_verified_history(&args.product).await?;
                    emit(format, &history, print_history)
                }
                Command::Chain(args) => {
                    let report = oracle.validate_chain_order(&args.product).await?;
                    emit(format, &report, print_chain)
                }
                Command::Health => {
                    let report = service.health().await;
                    emit(format, &report, print_health)?;
                    if !report.is_healthy() {
                        anyhow::bail!("one or more substrates are unreachable");
                    }
                    Ok(())
                }
                Command::Config(_) | Command::Demo(_) => Ok(()),
            };
            service.drain().await;
            outcome
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<CustodyConfig> {
    match &cli.config {
        Some(path) => CustodyConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(CustodyConfig::default()),
    }
}

/// The ledger is simulated in-process. With durable records its state is
/// snapshotted beside them, so later commands can verify earlier anchors.
fn build_service(config: &CustodyConfig) -> anyhow::Result<CustodyService> {
    let chain = local_chain(config)?;
    let service = CustodyService::from_config(config, chain)?;
    debug!(
        content = ?config.content.backend,
        metadata = ?config.metadata.backend,
        "service ready"
    );
    Ok(service)
}

fn local_chain(config: &CustodyConfig) -> anyhow::Result<Arc<InMemoryChain>> {
    let chain = match config.chain_snapshot_path() {
        Some(path) => InMemoryChain::open(&path, LOCAL_CHAIN_ID)
            .with_context(|| format!("opening ledger state {}", path.display()))?,
        None => InMemoryChain::new(LOCAL_CHAIN_ID),
    };
    Ok(Arc::new(chain))
}

fn parse_id(raw: &str) -> anyhow::Result<EventId> {
    raw.parse::<EventId>()
        .with_context(|| format!("invalid event id {raw:?}"))
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

async fn wait_settled(
    service: &CustodyService,
    id: &EventId,
    limit: Duration,
) -> anyhow::Result<EventRecord> {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let record = service.get_by_id(id).await?;
        if record.state != AnchorState::Pending || tokio::time::Instant::now() >= deadline {
            return Ok(record);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn settle_limit(config: &CustodyConfig) -> Duration {
    Duration::from_millis(config.ledger.confirm_timeout_ms) + Duration::from_secs(1)
}

async fn cmd_register(
    service: &CustodyService,
    config: &CustodyConfig,
    args: RegisterArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let request = RegisterRequest::new(args.event_type, args.product, args.payload, args.actor);
    let mut record = service.register(request).await?;
    if !args.no_wait {
        record = wait_settled(service, &record.id, settle_limit(config)).await?;
    }
    emit(format, &record, print_record)
}

async fn cmd_list(
    service: &CustodyService,
    args: ListArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut records = match &args.product {
        Some(product) => service.list_by_product(product).await?,
        None => service.list_all(args.limit).await?,
    };
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }
    emit(format, &records, |records| {
        if records.is_empty() {
            println!("No events.");
        }
        for r in records {
            println!(
                "{}  {:<12} {:<16} {}  {}",
                r.id.short_id().yellow(),
                r.event_type.to_string(),
                r.product_id,
                state_label(r.state),
                r.event_time.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
            );
        }
    })
}

fn cmd_config(config: &CustodyConfig, args: ConfigArgs) -> anyhow::Result<()> {
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => print!("{}", config.to_toml()?),
        ConfigAction::Check => {
            config.validate()?;
            let mode = if config.ledger.contract_address.is_some() {
                "contract"
            } else {
                "direct"
            };
            println!("{} Configuration valid (ledger mode: {})", "✓".green().bold(), mode.cyan());
        }
    }
    Ok(())
}

async fn cmd_demo(config: &CustodyConfig, args: DemoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let content = Arc::new(InMemoryContentStore::new());
    let meta = Arc::new(InMemoryMetadataStore::new());
    let chain = Arc::new(InMemoryChain::default());

    let mut ledger_config = config.ledger.clone();
    if args.contract && ledger_config.contract_address.is_none() {
        ledger_config.contract_address = Some(DEMO_CONTRACT.to_string());
    }
    let ledger = Arc::new(Anchor::from_config(&ledger_config, chain)?);
    let mode = ledger.mode();
    let service = CustodyService::new(content.clone(), meta, ledger, config.register_timeout());
    let oracle = Oracle::new(service.clone(), &config.oracle);
    let limit = settle_limit(config);

    if format == OutputFormat::Text {
        println!("{} ledger mode: {}", "==>".blue().bold(), mode.cyan());
    }

    let steps = [
        ("manufacture", "plant-berlin", r#"{"batch":"A17","units":1200,"tempC":4.1}"#),
        ("distribution", "carrier-42", r#"{"truck":"HH-CX-204","tempC":4.6}"#),
        ("receipt", "pharmacy-koeln", r#"{"received":1200,"damaged":0}"#),
    ];
    let mut records = Vec::new();
    for (event_type, actor, payload) in steps {
        let record = service
            .register(RegisterRequest::new(event_type, &args.product, payload, actor))
            .await?;
        records.push(wait_settled(&service, &record.id, limit).await?);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let view = oracle.build_verified_view(&args.product).await?;
    let report = oracle.validate_chain_order(&args.product).await?;
    if format == OutputFormat::Text {
        for record in &records {
            print_record(record);
        }
        print_view(&view);
        print_chain(&report);
    }

    let mut tampered = None;
    if !args.no_tamper {
        if let Some(target) = records.get(1) {
            content.replace_unchecked(
                &target.content_address,
                br#"{"truck":"HH-CX-204","tempC":-2.0}"#.to_vec(),
            );
            let result = service.verify_integrity(&target.id).await?;
            let after = oracle.build_verified_view(&args.product).await?;
            if format == OutputFormat::Text {
                println!(
                    "\n{} replaced the stored payload of {}",
                    "==>".red().bold(),
                    target.id.short_id().yellow()
                );
                print_verification(&result);
                print_view(&after);
            }
            tampered = Some((result, after));
        }
    }

    if format == OutputFormat::Json {
        #[derive(Serialize)]
        struct DemoOutput<'a> {
            mode: &'a str,
            records: &'a [EventRecord],
            view: &'a OracleView,
            chain: &'a ChainReport,
            #[serde(skip_serializing_if = "Option::is_none")]
            tampered: Option<&'a (VerificationResult, OracleView)>,
        }
        let out = DemoOutput {
            mode,
            records: &records,
            view: &view,
            chain: &report,
            tampered: tampered.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    service.drain().await;
    Ok(())
}

fn state_label(state: AnchorState) -> colored::ColoredString {
    match state {
        AnchorState::Pending => "pending".yellow(),
        AnchorState::Confirmed => "confirmed".green(),
        AnchorState::Failed => "failed".red(),
    }
}

fn check_mark(ok: bool) -> colored::ColoredString {
    if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn print_record(r: &EventRecord) {
    println!("\nEvent {} ({})", r.id.to_string().yellow().bold(), state_label(r.state));
    println!("  Type:        {}", r.event_type);
    println!("  Product:     {}", r.product_id.bold());
    println!("  Actor:       {}", r.actor);
    println!("  Time:        {}", r.event_time.to_rfc3339());
    println!("  Fingerprint: {}", r.fingerprint.to_hex().cyan());
    println!("  Content:     {}", r.content_address);
    println!("  Anchor ref:  {}", or_dash(r.anchor_ref()));
    println!("  Tx:          {}", or_dash(r.native_tx_ref()));
}

fn print_status(s: &AnchorStatus) {
    println!("Event {}: {}", s.id.to_string().yellow(), state_label(s.state));
    println!("  Anchor ref: {}", or_dash(&s.anchor_ref));
    println!("  Tx:         {}", or_dash(&s.native_tx_ref));
    println!("  Updated:    {}", s.updated_at.to_rfc3339());
}

fn print_verification(v: &VerificationResult) {
    println!("{} {} {}", check_mark(v.verified), v.id.short_id().yellow(), v.message);
    if !v.local_fingerprint.is_empty() {
        println!("  Local fingerprint:  {}", v.local_fingerprint.dimmed());
        println!("  Ledger fingerprint: {}", or_dash(&v.ledger_fingerprint).dimmed());
        println!("  Content match:      {}", check_mark(v.content_match));
    }
}

fn print_view(view: &OracleView) {
    let status = if view.chain_verified {
        "verified".green().bold()
    } else {
        "unverified".red().bold()
    };
    println!("\nProduct {}: {}", view.product_id.bold(), status);
    for e in &view.history {
        println!(
            "  {} {:<12} {}  {}",
            check_mark(e.verified),
            e.event_type.to_string(),
            e.id.short_id().yellow(),
            e.error.as_deref().unwrap_or("").dimmed()
        );
    }
    for (key, value) in &view.metadata {
        println!("  {}: {}", key.dimmed(), value);
    }
}

fn print_history(h: &VerifiedHistory) {
    println!(
        "Product {}: {} events, {} verified, {} unverified",
        h.product_id.bold(),
        h.total,
        h.verified.to_string().green(),
        h.unverified.to_string().red()
    );
    for e in &h.events {
        println!(
            "  {} {:<12} {}",
            check_mark(e.verified),
            e.event_type.to_string(),
            e.id.short_id().yellow()
        );
    }
}

fn print_chain(report: &ChainReport) {
    if report.is_valid() {
        println!(
            "{} Chain of {} ({} events) is well ordered",
            "✓".green().bold(),
            report.product_id.bold(),
            report.event_count
        );
        return;
    }
    println!(
        "{} Chain of {} has {} violation(s):",
        "✗".red().bold(),
        report.product_id.bold(),
        report.violations.len()
    );
    for v in &report.violations {
        println!("  - {}", v.description);
    }
}

fn print_health(report: &HealthReport) {
    for (name, health) in [
        ("content store", &report.content),
        ("metadata store", &report.metadata),
        ("ledger", &report.ledger),
    ] {
        println!(
            "{} {:<15} {}",
            check_mark(health.healthy),
            name,
            health.error.as_deref().unwrap_or("reachable")
        );
    }
}

#[cfg(test)]
mod tests {
    use custody_core::{ContentBackend, MetadataBackend};

    use super::*;

    fn durable_config(dir: &std::path::Path) -> CustodyConfig {
        let mut config = CustodyConfig::default();
        config.content.backend = ContentBackend::Fs;
        config.content.root = dir.join("content");
        config.metadata.backend = MetadataBackend::File;
        config.metadata.path = dir.join("records.json");
        config.ledger.poll_interval_ms = 5;
        config
    }

    #[tokio::test]
    async fn unawaited_register_is_anchored_before_exit() {
        let dir = tempfile::tempdir().unwrap();
        let config = durable_config(dir.path());

        let id = {
            let service = build_service(&config).unwrap();
            let record = service
                .register(RegisterRequest::new("manufacture", "LOT-1", "{}", "plant-7"))
                .await
                .unwrap();
            service.drain().await;
            record.id
        };

        let service = build_service(&config).unwrap();
        assert_eq!(
            service.get_by_id(&id).await.unwrap().state,
            AnchorState::Confirmed
        );
        let result = service.verify_integrity(&id).await.unwrap();
        assert!(result.verified, "{}", result.message);
    }

    #[test]
    fn memory_backends_use_a_transient_chain() {
        let chain = local_chain(&CustodyConfig::default()).unwrap();
        assert!(chain.snapshot_path().is_none());
    }

    #[test]
    fn file_backend_snapshots_the_chain_beside_records() {
        let dir = tempfile::tempdir().unwrap();
        let chain = local_chain(&durable_config(dir.path())).unwrap();
        assert_eq!(chain.snapshot_path(), Some(dir.path().join("chain.json").as_path()));
    }
}
