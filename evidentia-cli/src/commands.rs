//! CLI subcommand handlers.

use crate::{Commands, ConfigAction, HistoryAction, ProvidersAction};
use anyhow::Context;
use evidentia_core::config::{EvidentiaConfig, ResearchSettings};
use evidentia_core::dialectic::DialecticalCoordinator;
use evidentia_core::error::JobError;
use evidentia_core::evidence::{EvidenceAggregator, format_evidence};
use evidentia_core::external_job::{ExternalJobPoller, ExternalJobStatus, HttpJobClient};
use evidentia_core::http::ReqwestTransport;
use evidentia_core::pipeline::{
    HistoryStore, JsonFileHistoryStore, PhasePipeline, PipelineEvent,
};
use evidentia_core::providers::{ProviderRegistry, fallback_model_for};
use evidentia_core::types::ProviderId;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config: EvidentiaConfig,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Research {
            query,
            attach,
            provider,
            dialectic,
            enhance,
            no_evidence,
            json,
        } => {
            let options = ResearchOptions {
                attach,
                provider,
                dialectic,
                enhance,
                no_evidence,
                json,
                quiet,
            };
            handle_research(config, &query, options).await
        }
        Commands::Dialectic {
            prompt,
            primary,
            secondary,
        } => handle_dialectic(config, &prompt, primary, secondary, quiet).await,
        Commands::Search {
            query,
            limit,
            min,
            json,
        } => handle_search(config, &query, limit, min, json).await,
        Commands::Job {
            query,
            timeout_secs,
        } => handle_job(config, &query, timeout_secs, quiet).await,
        Commands::Providers { action } => handle_providers(action, config).await,
        Commands::Config { action } => handle_config(action, &config),
        Commands::History { action } => handle_history(action, &config),
    }
}

struct ResearchOptions {
    attach: Option<PathBuf>,
    provider: Option<ProviderId>,
    dialectic: Option<ProviderId>,
    enhance: bool,
    no_evidence: bool,
    json: bool,
    quiet: bool,
}

fn registry(config: &EvidentiaConfig) -> anyhow::Result<Arc<ProviderRegistry>> {
    Ok(Arc::new(
        ProviderRegistry::from_config(config).context("Failed to initialize providers")?,
    ))
}

/// Apply the command-line overrides to the configured research settings.
fn research_settings(
    configured: &ResearchSettings,
    options: &ResearchOptions,
) -> anyhow::Result<ResearchSettings> {
    let mut settings = configured.clone();
    if let Some(provider) = options.provider {
        settings.active_provider = provider;
    }
    if let Some(secondary) = options.dialectic {
        if secondary == settings.active_provider {
            anyhow::bail!("secondary_provider equals active_provider ('{secondary}')");
        }
        settings.secondary_provider = Some(secondary);
        settings.dialectical_mode = true;
    }
    settings.enhance_prompt |= options.enhance;
    Ok(settings)
}

async fn handle_research(
    config: EvidentiaConfig,
    query: &str,
    options: ResearchOptions,
) -> anyhow::Result<()> {
    if config.external_agent.enabled {
        tracing::info!("External agent enabled; routing research through it");
        return handle_job(config, query, None, options.quiet).await;
    }

    let settings = research_settings(&config.research, &options)?;

    let attachments = match &options.attach {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read attachment {}", path.display()))?,
        ),
        None => None,
    };

    let history: Arc<dyn HistoryStore> =
        Arc::new(JsonFileHistoryStore::new(settings.resolved_history_dir()));
    let (tx, rx) = mpsc::unbounded_channel();
    let mut pipeline = PhasePipeline::new(registry(&config)?, settings)
        .with_history(history)
        .with_events(tx);

    if !options.no_evidence {
        let sources = evidentia_sources::sources_from_config(&config.sources, &config.http)
            .context("Failed to initialize bibliographic sources")?;
        if !sources.is_empty() {
            pipeline = pipeline.with_evidence(Arc::new(EvidenceAggregator::new(
                sources,
                config.evidence.clone(),
            )));
        }
    }

    let printer = tokio::spawn(print_pipeline_events(rx, options.quiet));
    let outcome = pipeline.execute(query, attachments.as_deref()).await;
    drop(pipeline);
    let _ = printer.await;
    let run = outcome?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    }
    match (&run.report, run.failed_phase()) {
        (Some(report), _) => {
            if !options.json {
                println!("{report}");
            }
            Ok(())
        }
        (None, Some(phase)) => anyhow::bail!(
            "Phase '{}' failed: {}",
            phase.name,
            phase.output.as_deref().unwrap_or("unknown error")
        ),
        (None, None) => anyhow::bail!("Research run ended without a report"),
    }
}

async fn print_pipeline_events(mut rx: mpsc::UnboundedReceiver<PipelineEvent>, quiet: bool) {
    while let Some(event) = rx.recv().await {
        if quiet {
            continue;
        }
        match event {
            PipelineEvent::PromptEnhanced { prompt } => eprintln!("  Enhanced prompt: {prompt}"),
            PipelineEvent::EvidenceGathered { papers, queries } => {
                eprintln!("  Retrieved {papers} papers from {queries} queries")
            }
            PipelineEvent::PhaseStarted { index, phase } => {
                eprintln!("  [{}/5] {}...", index + 1, phase)
            }
            PipelineEvent::PhaseCompleted { output_chars, .. } => {
                eprintln!("        done ({output_chars} chars)")
            }
            PipelineEvent::PhaseFailed { error, .. } => eprintln!("        failed: {error}"),
            PipelineEvent::Finished { .. } => {}
        }
    }
}

async fn handle_dialectic(
    config: EvidentiaConfig,
    prompt: &str,
    primary: Option<ProviderId>,
    secondary: ProviderId,
    quiet: bool,
) -> anyhow::Result<()> {
    let primary = primary.unwrap_or(config.research.active_provider);
    let coordinator = DialecticalCoordinator::new(registry(&config)?);
    let result = coordinator.run(primary, Some(secondary), prompt, &[]).await?;

    if !quiet {
        for view in [&result.primary, &result.secondary] {
            eprintln!(
                "  {}: analysis {} chars, critique {} chars",
                view.provider.display_name(),
                view.analysis.chars().count(),
                view.critique.chars().count()
            );
        }
    }
    println!("{}", result.synthesis.content);
    Ok(())
}

async fn handle_search(
    config: EvidentiaConfig,
    query: &str,
    limit: Option<usize>,
    min: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let sources = evidentia_sources::sources_from_config(&config.sources, &config.http)
        .context("Failed to initialize bibliographic sources")?;
    if sources.is_empty() {
        anyhow::bail!("No bibliographic sources are enabled");
    }
    let aggregator = EvidenceAggregator::new(sources, config.evidence.clone());
    let set = aggregator
        .aggregate(
            query,
            limit.unwrap_or(config.evidence.limit_per_source),
            min.unwrap_or(config.evidence.min_results),
        )
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&set)?);
    } else if set.papers.is_empty() {
        println!("No papers found ({} queries tried).", set.queries.len());
    } else {
        println!("{}", format_evidence(&set.papers, set.papers.len()));
        println!(
            "\n{} of {} candidates kept after {} attempt(s).",
            set.papers.len(),
            set.candidates,
            set.attempts
        );
    }
    Ok(())
}

async fn handle_job(
    config: EvidentiaConfig,
    query: &str,
    timeout_secs: Option<u64>,
    quiet: bool,
) -> anyhow::Result<()> {
    let agent = &config.external_agent;
    let api_key = agent.resolve_api_key().ok_or(JobError::ConfigMissing)?;
    let transport = Arc::new(ReqwestTransport::new(&config.http)?);
    let client = Arc::new(HttpJobClient::new(
        transport,
        agent.base_url.clone(),
        agent.model.clone(),
    ));
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| agent.timeout());
    let poller = ExternalJobPoller::new(client, agent.poll_interval(), timeout);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_job_status(rx, quiet));
    let outcome = poller.run(&api_key, query, &cancel, Some(&tx)).await;
    drop(tx);
    let _ = printer.await;

    let outcome = outcome?;
    if !quiet {
        eprintln!(
            "  Job {} finished after {} polls ({:.1}s)",
            outcome.job_id,
            outcome.polls,
            outcome.elapsed.as_secs_f64()
        );
    }
    println!("{}", outcome.report);
    Ok(())
}

async fn print_job_status(mut rx: mpsc::UnboundedReceiver<ExternalJobStatus>, quiet: bool) {
    while let Some(status) = rx.recv().await {
        if quiet {
            continue;
        }
        match status.progress {
            Some(p) => eprintln!("  {} {:?} ({:.0}%)", status.job_id, status.status, p * 100.0),
            None => eprintln!("  {} {:?}", status.job_id, status.status),
        }
    }
}

async fn handle_providers(action: ProvidersAction, config: EvidentiaConfig) -> anyhow::Result<()> {
    match action {
        ProvidersAction::List => {
            for id in ProviderId::ALL {
                let provider = config.provider(id);
                let key = if provider.resolve_api_key(id).is_some() {
                    "key set"
                } else {
                    "no key"
                };
                let fallback = fallback_model_for(id, &provider).unwrap_or_else(|| "-".into());
                println!(
                    "  {:<11} {:<28} fallback {:<24} {}{}",
                    id.as_str(),
                    provider.model,
                    fallback,
                    key,
                    if provider.enabled { "" } else { " (disabled)" }
                );
            }
            Ok(())
        }
        ProvidersAction::Test { provider } => {
            let registry = registry(&config)?;
            let targets: Vec<ProviderId> = match provider {
                Some(id) => vec![id],
                None => ProviderId::ALL
                    .into_iter()
                    .filter(|id| {
                        let cfg = config.provider(*id);
                        cfg.enabled && cfg.resolve_api_key(*id).is_some()
                    })
                    .collect(),
            };
            if targets.is_empty() {
                println!("No enabled providers with API keys.");
                return Ok(());
            }
            let mut failures = 0;
            for id in targets {
                let ok = registry.test_connection(id).await;
                if !ok {
                    failures += 1;
                }
                println!("  {} {}", if ok { "ok  " } else { "FAIL" }, id.display_name());
            }
            if failures > 0 {
                anyhow::bail!("{failures} provider(s) failed the connection test");
            }
            Ok(())
        }
    }
}

fn handle_config(action: ConfigAction, config: &EvidentiaConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let mut value = serde_json::to_value(config)?;
            mask_secrets(&mut value);
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        ConfigAction::Validate => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration OK.");
            } else {
                for warning in &warnings {
                    println!("  warning: {warning}");
                }
            }
            Ok(())
        }
    }
}

/// Replace every non-empty `api_key` string with a fixed mask.
fn mask_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key == "api_key" && v.as_str().is_some_and(|s| !s.is_empty()) {
                    *v = Value::String("********".into());
                } else {
                    mask_secrets(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}

fn handle_history(action: HistoryAction, config: &EvidentiaConfig) -> anyhow::Result<()> {
    let store = JsonFileHistoryStore::new(config.research.resolved_history_dir());
    match action {
        HistoryAction::List => {
            let entries = store.list()?;
            if entries.is_empty() {
                println!("No research runs recorded in {}", store.dir().display());
            }
            for entry in entries {
                println!(
                    "  {}  {}  {} ({} chars)",
                    entry.id,
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.topic,
                    entry.report_chars
                );
            }
            Ok(())
        }
        HistoryAction::Show { id } => {
            let entry = store.load(&id)?;
            println!("# {}\n\n{}", entry.topic, entry.report);
            Ok(())
        }
    }
}
