use anyhow::Context;
use clap::Parser;
use node_histogram::utils::error::ErrorSeverity;
use node_histogram::utils::{logger, validation::Validate};
use node_histogram::{
    AppenderConfig, CliConfig, EnrichError, EnricherFactory, HistogramEnricher, InMemorySampleSource,
    TomlConfig,
};
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_log {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    // 設定優先順序：檔案（或環境變數）< 命令列參數
    let toml = match &cli.config {
        Some(path) => TomlConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TomlConfig {
            appender: AppenderConfig::from_env().context("reading APPENDER_* variables")?,
            ..TomlConfig::default()
        },
    };
    let toml = TomlConfig {
        appender: cli.apply_overrides(toml.appender.clone()),
        ..toml
    };

    if let Err(e) = toml.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(exit_code(&e));
    }

    let range = cli.time_range().context("parsing --from/--to")?;
    let samples = InMemorySampleSource::from_json_file(&cli.samples)
        .with_context(|| format!("reading samples from {}", cli.samples.display()))?;
    let identities: HashSet<_> = samples.identities().cloned().collect();

    let factory = EnricherFactory::with_builder(&toml.appender, Arc::new(toml.histogram_builder()))
        .context("building enricher")?;
    let enricher = factory.create_for_samples(samples);

    tracing::info!("Enriching {} nodes over {}", identities.len(), range);
    let outcome = enricher.enrich(&identities, &range).await;
    let shutdown = factory.shutdown().await;
    tracing::debug!("Shutdown outcome: {:?}", shutdown);

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            tracing::info!("✅ Built {} histograms", result.len());
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Enrichment failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            if e.is_retryable() {
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            }
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(exit_code(&e));
        }
    }
}

fn exit_code(e: &EnrichError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}
