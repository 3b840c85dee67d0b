//! # Email Enricher CLI
//!
//! Command-line interface for the Email Enricher library (`email_enricher_core`).
//! This binary parses arguments, sets up configuration, initializes the enricher,
//! processes leads (either a single domain or a JSON file), and handles output.

use email_enricher_core::{
    check_smtp_connectivity, enrich_leads_with_progress, enrich_single_lead, initialize_enricher,
    Config, ConfigBuilder, EmailEnricher, EnrichOptions, EnrichedLead, Lead, Strategy,
};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Finds and verifies business email addresses for domains.",
    long_about = "Email Enricher collects candidate addresses for a domain (site crawl, pattern generation, WHOIS, social pages, DNS TXT, search, web archive), filters out noise, and verifies them with an SMTP RCPT probe that detects catch-all servers. No email is ever sent."
)]
struct AppArgs {
    /// Path to the input JSON file: an array of leads with `website` and/or `domain`.
    #[arg(short, long, default_value = "leads.json", env = "EMAIL_ENRICHER_INPUT")]
    input: String,

    /// Path to the output JSON file where enriched leads will be saved.
    #[arg(short, long, default_value = "enriched.json", env = "EMAIL_ENRICHER_OUTPUT")]
    output: String,

    /// Domain or website URL to enrich (enables single-domain mode).
    #[arg(long, env = "EMAIL_ENRICHER_DOMAIN")]
    domain: Option<String>,

    /// Business name to attach to the single-domain lead.
    #[arg(long, env = "EMAIL_ENRICHER_NAME", requires = "domain")]
    name: Option<String>,

    /// Print the single-domain result to standard output instead of a file.
    #[arg(long, default_value = "false", env = "EMAIL_ENRICHER_STDOUT")]
    stdout: bool,

    /// Path to a configuration file (TOML format). CLI args override file settings.
    #[arg(long, env = "EMAIL_ENRICHER_CONFIG")]
    config_file: Option<String>,

    /// Comma-separated discovery methods, in attribution order
    /// (website, pattern, whois, social, dns, dork, archive).
    #[arg(short, long, value_delimiter = ',', env = "EMAIL_ENRICHER_METHODS")]
    methods: Option<Vec<Strategy>>,

    /// Extra mailbox prefixes for pattern generation (comma-separated).
    #[arg(long, value_delimiter = ',', env = "EMAIL_ENRICHER_CUSTOM_PREFIXES")]
    custom_prefixes: Option<Vec<String>>,

    /// Skip SMTP verification and use the first surviving candidate.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "EMAIL_ENRICHER_NO_VERIFY")]
    no_verify: bool,

    /// Also look for a named owner / executive on the website.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "EMAIL_ENRICHER_FIND_DECISION_MAKER")]
    find_decision_maker: bool,

    /// Do not accept catch-all acceptance as verification; keep looking for a confirmed mailbox.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "EMAIL_ENRICHER_STRICT_CATCH_ALL")]
    strict_catch_all: bool,

    /// Maximum number of domains processed concurrently.
    #[arg(short, long, env = "EMAIL_ENRICHER_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Sender address used in the SMTP MAIL FROM envelope.
    #[arg(long, env = "EMAIL_ENRICHER_SMTP_SENDER")]
    smtp_sender: Option<String>,

    /// Name announced in EHLO.
    #[arg(long, env = "EMAIL_ENRICHER_HELO_NAME")]
    helo_name: Option<String>,

    /// User agent string for HTTP requests.
    #[arg(long, env = "EMAIL_ENRICHER_USER_AGENT")]
    user_agent: Option<String>,

    /// Overall SMTP handshake budget in seconds (fractions allowed).
    #[arg(long, env = "EMAIL_ENRICHER_SMTP_TIMEOUT")]
    smtp_timeout: Option<f64>,

    /// HTTP request timeout in seconds (fractions allowed).
    #[arg(long, env = "EMAIL_ENRICHER_REQUEST_TIMEOUT")]
    request_timeout: Option<f64>,

    /// DNS resolution timeout in seconds (fractions allowed).
    #[arg(long, env = "EMAIL_ENRICHER_DNS_TIMEOUT")]
    dns_timeout: Option<f64>,

    /// Comma-separated list of DNS servers to use for lookups.
    #[arg(long, value_delimiter = ',', env = "EMAIL_ENRICHER_DNS_SERVERS")]
    dns_servers: Option<Vec<String>>,

    /// Skip the start-up port 25 connectivity check.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "EMAIL_ENRICHER_SKIP_CONNECTIVITY_CHECK")]
    skip_connectivity_check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!("Email Enricher CLI v{} starting...", env!("CARGO_PKG_VERSION"));

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let config = Arc::new(build_config(&args)?);
    tracing::debug!("Effective configuration loaded: {:?}", *config);

    let enricher = initialize_enricher(config.clone())
        .await
        .map(Arc::new)
        .map_err(|e| anyhow::anyhow!("Failed to initialize enricher: {}", e))?;

    let mut options = EnrichOptions::from_config(&config);
    options.custom_email_prefixes = args.custom_prefixes.clone();

    if options.verify_emails && !args.skip_connectivity_check {
        match check_smtp_connectivity(&config).await {
            Ok(_) => tracing::info!("SMTP connectivity test passed (outbound port 25 likely open)."),
            Err(e) => {
                tracing::error!("SMTP connectivity test failed: {}", e);
                tracing::warn!("SMTP verification (port 25) may fail or be unreliable.");
                tracing::warn!("Check firewall rules or ISP restrictions if SMTP checks are needed.");
            }
        }
    }

    let start_time = Instant::now();
    if args.domain.is_some() {
        process_single_domain(&enricher, &options, &args).await?;
    } else {
        process_file_mode(enricher, &options, &args, start_time).await?;
        tracing::info!(
            "Processing finished successfully. Total duration: {:.2?}",
            start_time.elapsed()
        );
    }

    Ok(())
}

fn build_config(args: &AppArgs) -> Result<Config> {
    let mut builder = ConfigBuilder::new();

    if let Some(ref path) = args.config_file {
        builder = builder.config_file(path);
    }
    if let Some(ref methods) = args.methods {
        builder = builder.methods(methods.clone());
    }
    if args.no_verify {
        builder = builder.verify_emails(false);
    }
    if args.find_decision_maker {
        builder = builder.find_decision_maker(true);
    }
    if args.strict_catch_all {
        builder = builder.accept_catch_all(false);
    }
    if let Some(c) = args.concurrency {
        builder = builder.max_concurrency(c);
    }
    if let Some(ref s) = args.smtp_sender {
        builder = builder.smtp_sender_email(s);
    }
    if let Some(ref h) = args.helo_name {
        builder = builder.smtp_helo_name(h);
    }
    if let Some(ref ua) = args.user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(t) = args.smtp_timeout {
        builder = builder.smtp_timeout(seconds(t, "--smtp-timeout")?);
    }
    if let Some(t) = args.request_timeout {
        builder = builder.request_timeout(seconds(t, "--request-timeout")?);
    }
    if let Some(t) = args.dns_timeout {
        builder = builder.dns_timeout(seconds(t, "--dns-timeout")?);
    }
    if let Some(ref servers) = args.dns_servers {
        if !servers.is_empty() {
            builder = builder.dns_servers(servers.clone());
        }
    }

    builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build configuration: {}", e))
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("Invalid value for {}: {}", flag, value))
}

async fn process_single_domain(
    enricher: &EmailEnricher,
    options: &EnrichOptions,
    args: &AppArgs,
) -> Result<()> {
    tracing::info!("Running in single-domain mode.");
    let start_time = Instant::now();
    let domain_input = args.domain.clone().unwrap_or_default();

    let lead = Lead {
        business_name: args.name.clone(),
        website: Some(domain_input.clone()),
        ..Lead::default()
    };
    tracing::info!("Enriching '{}' with methods {:?}", domain_input, options.methods);

    let result = enrich_single_lead(enricher, lead, options).await;

    if args.stdout {
        print_single_result(&result);
    } else {
        tracing::info!("Saving result to '{}'...", args.output);
        save_results(&[result], &args.output)?;
        tracing::info!("Result saved successfully to '{}'.", args.output);
    }
    tracing::info!("Single-domain mode finished. Duration: {:.2?}", start_time.elapsed());
    Ok(())
}

async fn process_file_mode(
    enricher: Arc<EmailEnricher>,
    options: &EnrichOptions,
    args: &AppArgs,
    start_time: Instant,
) -> Result<()> {
    tracing::info!(
        "Running in file mode. Input: '{}', Output: '{}'",
        args.input,
        args.output
    );
    let input_path = Path::new(&args.input);
    let output_path = Path::new(&args.output);

    if !input_path.is_file() {
        return Err(anyhow::anyhow!(
            "Input file not found or is not a file: {}",
            args.input
        ));
    }
    if let Some(parent_dir) = output_path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            tracing::debug!("Creating output directory: {}", parent_dir.display());
            std::fs::create_dir_all(parent_dir).with_context(|| {
                format!("Failed to create output directory '{}'", parent_dir.display())
            })?;
        }
    }

    let leads = load_leads(&args.input)?;
    let total_records = leads.len();
    if total_records == 0 {
        tracing::warn!("Input file '{}' contains no leads. Saving empty results file.", args.input);
        save_results(&[], &args.output)?;
        return Ok(());
    }
    tracing::info!(
        "Loaded {} leads. Starting enrichment (Concurrency: {})...",
        total_records,
        options.max_concurrency
    );

    let pb = ProgressBar::new(total_records as u64);
    pb.set_style(ProgressStyle::default_bar()
         .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | ETA: {eta} | {msg}")
         .context("Failed to set progress bar template")?
         .progress_chars("=> "));
    pb.set_message("Enriching leads...");

    let results = enrich_leads_with_progress(enricher, leads, options, |_, enriched| {
        if let Some(ref email) = enriched.email {
            pb.set_message(email.clone());
        }
        pb.inc(1);
    })
    .await;

    pb.finish_with_message(format!("Processed {} leads", results.len()));

    tracing::info!("Saving results to '{}'...", args.output);
    save_results(&results, &args.output)?;
    tracing::info!("Results saved successfully.");

    log_summary(&results, start_time.elapsed());
    Ok(())
}

fn load_leads(file_path: &str) -> Result<Vec<Lead>> {
    tracing::debug!("Opening input file: {}", file_path);
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open input file '{}'", file_path))?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse JSON from '{}'. Ensure it's an array of lead objects.",
            file_path
        )
    })
}

/// Writes the enriched leads as pretty-printed JSON, in input order.
fn save_results(results: &[EnrichedLead], file_path: &str) -> Result<()> {
    let file = File::create(file_path)
        .with_context(|| format!("Failed to create/truncate output file '{}'", file_path))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, results)
        .with_context(|| format!("Failed to serialize results to JSON for '{}'", file_path))?;
    Ok(())
}

fn log_summary(results: &[EnrichedLead], duration: Duration) {
    let total = results.len();
    let found = results.iter().filter(|r| r.email.is_some()).count();
    let verified = results.iter().filter(|r| r.email_verified).count();
    let catch_all = results.iter().filter(|r| r.email_verified && r.email_catch_all).count();
    let errors = results
        .iter()
        .filter(|r| r.email.is_none() && r.email_error.is_some())
        .count();
    let decision_makers = results.iter().filter(|r| r.decision_maker.is_some()).count();

    tracing::info!("-------------------- Enrichment Summary --------------------");
    tracing::info!("Leads Processed             : {}", total);
    tracing::info!("  - Emails Selected         : {}", found);
    tracing::info!("  - Verified                : {}", verified);
    tracing::info!("    (of which catch-all)    : {}", catch_all);
    tracing::info!("  - No Email / Errors       : {}", errors);
    tracing::info!("  - Decision Makers Found   : {}", decision_makers);
    tracing::info!("Total Time Taken            : {:.2?}", duration);
    if duration.as_secs_f64() > 0.01 && total > 0 {
        let rate = (total as f64) / duration.as_secs_f64();
        tracing::info!("Processing Rate             : {:.2} leads/sec", rate);
    }
    tracing::info!("----------------------------------------------------------");
}

/// Prints the single-domain result to standard output.
fn print_single_result(result: &EnrichedLead) {
    const BLUE: &str = "\x1b[34m";
    const GREEN: &str = "\x1b[32m";
    const YELLOW: &str = "\x1b[33m";
    const RED: &str = "\x1b[31m";
    const RESET: &str = "\x1b[0m";

    println!("\n{BLUE}===== Email Enricher Results ====={RESET}");
    println!("Business: {}", result.lead.business_name.as_deref().unwrap_or("N/A"));
    println!("Domain:   {}", result.lead.domain_input().unwrap_or("N/A"));

    match (&result.email, &result.email_error) {
        (Some(email), _) => {
            let status = match (result.email_verified, result.email_catch_all) {
                (true, false) => format!("{GREEN}VERIFIED{RESET}"),
                (true, true) => format!("{YELLOW}ACCEPTED (catch-all server){RESET}"),
                (false, _) => format!("{YELLOW}UNVERIFIED{RESET}"),
            };
            println!("\nStatus: {}", status);
            println!("Email:  {GREEN}{}{RESET}", email);
            if let Some(source) = result.email_source {
                println!("Source: {}", source);
            }
        }
        (None, Some(error)) => {
            println!("\n{RED}Status: NO EMAIL{RESET}");
            println!("Reason: {}", error);
        }
        (None, None) => println!("\n{YELLOW}Status: NO EMAIL FOUND{RESET}"),
    }

    if let Some(ref outcome) = result.email_verification {
        println!("Check:  {:?} / {}", outcome.status, outcome.reason);
    }

    if result.all_emails_found.len() > 1 {
        println!("\n{BLUE}All candidates:{RESET}");
        for email in &result.all_emails_found {
            println!("- {}", email);
        }
    }

    if let Some(ref dm) = result.decision_maker {
        println!("\n{BLUE}Decision maker:{RESET}");
        println!("{} ({})", dm.name, dm.title);
        if let Some(ref email) = dm.email {
            println!("Email: {} (verified: {})", email, dm.email_verified);
        }
    }

    println!("{BLUE}=================================={RESET}\n");
}
