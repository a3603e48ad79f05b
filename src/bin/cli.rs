//! farewatch CLI
//!
//! Flight searches, saved price watches and alert delivery from the
//! command line. Scheduling a `watch run` is left to cron or similar.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use fare_watch::{
    error::{AppError, Result},
    models::{Alert, Config, SearchQuery, SearchResult, Watch},
    notify::{Channel, NotifyChannels, Notifier, dispatch_alert},
    pipeline::{DoctorReport, ExitPolicy, PassHealth, WatchPassRunner, WatchSelector, run_doctor},
    provider::{HttpTransport, ReqwestTransport, build_deep_link, build_provider},
    storage::{LocalStorage, WatchStorage},
};
use serde::Serialize;

/// farewatch - airfare price watcher
#[derive(Parser, Debug)]
#[command(name = "farewatch", version, about = "Watch airfare prices and get alerted")]
struct Cli {
    /// Config file (default: <config_dir>/farewatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding watches.json
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Machine-readable JSON output
    #[arg(long, global = true, conflicts_with = "plain")]
    json: bool,

    /// Tab-separated output for scripts
    #[arg(long, global = true)]
    plain: bool,

    /// Enable verbose logging and per-watch diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Provider request timeout, e.g. 10s, 500ms, 2m
    #[arg(long, global = true, value_parser = parse_timeout)]
    timeout: Option<Duration>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search flights once
    Search(QueryArgs),

    /// Manage and run saved watches
    Watch {
        #[command(subcommand)]
        command: WatchCommand,
    },

    /// Check notification channels
    Notify {
        #[command(subcommand)]
        command: NotifyCommand,
    },

    /// Inspect or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Show or store provider credentials
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Check configuration, credentials and directories
    Doctor {
        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct QueryArgs {
    /// Departure airport or city code
    #[arg(long)]
    from: String,

    /// Arrival airport or city code
    #[arg(long)]
    to: String,

    /// Outbound date YYYY-MM-DD
    #[arg(long)]
    depart: String,

    /// Return date YYYY-MM-DD
    #[arg(long = "return")]
    return_date: Option<String>,

    #[arg(long, default_value = "economy")]
    cabin: String,

    #[arg(long, default_value_t = 1)]
    adults: u32,

    #[arg(long, default_value_t = 0)]
    children: u32,

    /// Nonstop only
    #[arg(long)]
    nonstop: bool,

    /// Maximum acceptable price, 0 for no limit
    #[arg(long, default_value_t = 0)]
    max_price: u32,

    #[arg(long, default_value = "USD")]
    currency: String,

    #[arg(long = "sort", default_value = "price")]
    sort_by: String,
}

impl QueryArgs {
    fn into_query(self) -> Result<SearchQuery> {
        let query = SearchQuery {
            from: self.from.trim().to_ascii_uppercase(),
            to: self.to.trim().to_ascii_uppercase(),
            depart: self.depart.trim().to_string(),
            return_date: self.return_date.unwrap_or_default().trim().to_string(),
            cabin: self.cabin,
            adults: self.adults,
            children: self.children,
            nonstop: self.nonstop,
            max_price: self.max_price,
            currency: self.currency,
            sort_by: self.sort_by,
        };
        query.validate().map_err(AppError::usage)?;
        Ok(query)
    }
}

#[derive(Subcommand, Debug)]
enum WatchCommand {
    /// Save a new watch
    Create {
        #[command(flatten)]
        query: QueryArgs,

        /// Display name (default: FROM-TO-DEPART)
        #[arg(long)]
        name: Option<String>,

        /// Alert when the lowest price is at or below this value
        #[arg(long, default_value_t = 0)]
        target_price: u32,

        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        notify_terminal: bool,

        #[arg(long)]
        notify_email: bool,

        #[arg(long)]
        notify_webhook: bool,

        /// Email recipient (default: configured notify_email)
        #[arg(long)]
        email_to: Option<String>,

        /// Webhook URL (default: configured webhook_url)
        #[arg(long)]
        webhook_url: Option<String>,

        /// Print the watch without saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// List watches, newest first
    List,

    Enable {
        #[arg(long)]
        id: String,
    },

    Disable {
        #[arg(long)]
        id: String,
    },

    /// Delete a watch
    Delete {
        #[arg(long)]
        id: String,

        /// Delete without confirmation
        #[arg(long)]
        force: bool,

        /// Confirmation token: the watch id again
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Run one evaluation pass
    Run {
        /// Every enabled watch
        #[arg(long, conflicts_with = "id")]
        all: bool,

        #[arg(long)]
        id: Option<String>,

        /// Fail when any search fails, not only when all of them do
        #[arg(long)]
        fail_on_provider_errors: bool,
    },

    /// Send a test alert through a watch's channels
    Test {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum NotifyCommand {
    /// Send a sample alert through one channel
    Test {
        #[arg(long, value_enum, default_value_t = ChannelArg::Terminal)]
        channel: ChannelArg,

        /// Email recipient (default: configured notify_email)
        #[arg(long)]
        to: Option<String>,

        /// Webhook URL (default: configured webhook_url)
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ChannelArg {
    Terminal,
    Email,
    Webhook,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Terminal => Channel::Terminal,
            ChannelArg::Email => Channel::Email,
            ChannelArg::Webhook => Channel::Webhook,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration with secrets masked
    Show,

    /// Check the configuration
    Validate,

    /// Set one value and save
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Report which credentials are configured
    Status,

    /// Save the provider and SerpApi key
    Login {
        /// serpapi or google-url
        #[arg(long)]
        provider: Option<String>,

        #[arg(long)]
        serpapi_key: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Human,
    Plain,
    Json,
}

/// Settings shared by every command.
struct Context {
    config_path: PathBuf,
    state_dir: Option<PathBuf>,
    output: Output,
    verbose: bool,
    timeout: Option<Duration>,
}

impl Context {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let config_path = match &cli.config {
            Some(path) => path.clone(),
            None => Config::default_path()
                .ok_or_else(|| AppError::config("could not determine config directory"))?,
        };
        let output = if cli.json {
            Output::Json
        } else if cli.plain {
            Output::Plain
        } else {
            Output::Human
        };
        Ok(Self {
            config_path,
            state_dir: cli.state_dir.clone(),
            output,
            verbose: cli.verbose,
            timeout: cli.timeout,
        })
    }

    fn load_config(&self) -> Result<Config> {
        Config::load(&self.config_path)
    }

    fn storage(&self) -> Result<LocalStorage> {
        Ok(LocalStorage::new(Config::state_dir(self.state_dir.as_deref())?))
    }

    fn transport(config: &Config) -> Result<Arc<dyn HttpTransport>> {
        Ok(Arc::new(ReqwestTransport::new(&config.provider.user_agent)?))
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Parse a duration like `500ms`, `10s`, `2m` or `1h`.
fn parse_timeout(raw: &str) -> std::result::Result<Duration, String> {
    let invalid = || format!("invalid --timeout value {raw:?} (use duration like 10s)");
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(3600)),
        _ => return Err(invalid()),
    };
    if duration.is_zero() {
        return Err(invalid());
    }
    Ok(duration)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            for hint in err.hints() {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = Context::from_cli(&cli)?;
    log::debug!("config file: {}", ctx.config_path.display());

    match cli.command {
        Command::Search(args) => search(&ctx, args).await,
        Command::Watch { command } => match command {
            WatchCommand::Create {
                query,
                name,
                target_price,
                notify_terminal,
                notify_email,
                notify_webhook,
                email_to,
                webhook_url,
                dry_run,
            } => {
                let config = ctx.load_config()?;
                let query = query.into_query()?;
                let now = Utc::now();
                let name = name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| Watch::default_name(&query));

                let mut watch = Watch::new(Watch::generate_id(now), name, query);
                watch.target_price = target_price;
                watch.notify_terminal = notify_terminal;
                watch.notify_email = notify_email;
                watch.notify_webhook = notify_webhook;
                watch.email_to = email_to.unwrap_or(config.notify.default_email);
                watch.webhook_url = webhook_url.unwrap_or(config.notify.webhook_url);
                watch.created_at = now;
                watch.updated_at = now;

                if dry_run {
                    return print_json(&watch);
                }
                let storage = ctx.storage()?;
                let mut store = storage.load().await?;
                store.watches.push(watch.clone());
                storage.save(&store).await?;
                log::info!("created watch {}", watch.id);

                match ctx.output {
                    Output::Plain => println!("watch_id={}", watch.id),
                    Output::Human | Output::Json => print_json(&watch)?,
                }
                Ok(())
            }
            WatchCommand::List => watch_list(&ctx).await,
            WatchCommand::Enable { id } => set_enabled(&ctx, &id, true).await,
            WatchCommand::Disable { id } => set_enabled(&ctx, &id, false).await,
            WatchCommand::Delete { id, force, confirm } => {
                if !force && confirm.as_deref() != Some(id.as_str()) {
                    return Err(AppError::usage(
                        "destructive action: pass --force or --confirm with the watch ID",
                    ));
                }
                let storage = ctx.storage()?;
                let mut store = storage.load().await?;
                let removed = store
                    .remove(&id)
                    .ok_or_else(|| AppError::WatchNotFound(id.clone()))?;
                storage.save(&store).await?;

                match ctx.output {
                    Output::Plain => println!("watch_id={}\tdeleted=true", removed.id),
                    Output::Json => print_json(&serde_json::json!({ "deleted": removed.id }))?,
                    Output::Human => println!("Deleted watch {}", removed.id),
                }
                Ok(())
            }
            WatchCommand::Run {
                all,
                id,
                fail_on_provider_errors,
            } => {
                let selector = match (all, id) {
                    (true, None) => WatchSelector::AllEnabled,
                    (false, Some(id)) if !id.trim().is_empty() => WatchSelector::Id(id),
                    _ => {
                        return Err(AppError::usage(
                            "watch run requires exactly one of --all or --id",
                        ));
                    }
                };
                watch_run(&ctx, selector, ExitPolicy::from_strict_flag(fail_on_provider_errors))
                    .await
            }
            WatchCommand::Test { id } => watch_test(&ctx, &id).await,
        },
        Command::Notify {
            command: NotifyCommand::Test { channel, to, url },
        } => notify_test(&ctx, channel.into(), to, url).await,
        Command::Config { command } => config_command(&ctx, command),
        Command::Auth { command } => auth_command(&ctx, command),
        Command::Doctor { strict } => doctor(&ctx, strict),
    }
}

async fn search(ctx: &Context, args: QueryArgs) -> Result<()> {
    let query = args.into_query()?;
    let config = ctx.load_config()?;
    let provider = build_provider(&config, ctx.timeout, Context::transport(&config)?)?;
    let result = provider.search(&query).await?;

    match ctx.output {
        Output::Json => print_json(&result),
        Output::Plain => {
            for f in &result.flights {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    f.price, f.currency, f.airline, f.depart_time, f.arrive_time
                );
            }
            println!("{}", result.url);
            Ok(())
        }
        Output::Human => {
            print_search_table(&result);
            Ok(())
        }
    }
}

fn print_search_table(result: &SearchResult) {
    if result.flights.is_empty() {
        println!("No priced flights returned. Open Google Flights:\n{}", result.url);
        return;
    }
    let top = result.flights.len().min(10);
    let q = &result.query;
    println!("Top {top} flight options for {} -> {} on {}", q.from, q.to, q.depart);
    for (i, f) in result.flights.iter().take(top).enumerate() {
        println!(
            "{:2}) {:4} {} | {} | stops:{} | {} -> {}",
            i + 1,
            f.price,
            f.currency,
            f.airline,
            f.stops,
            f.depart_time,
            f.arrive_time
        );
    }
    println!("Google Flights: {}", result.url);
}

async fn watch_list(ctx: &Context) -> Result<()> {
    let mut store = ctx.storage()?.load().await?;
    store
        .watches
        .sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if ctx.output == Output::Json {
        return print_json(&store.watches);
    }
    if store.watches.is_empty() {
        println!("No watches configured");
        return Ok(());
    }
    if ctx.output == Output::Plain {
        println!("id\tname\tenabled\ttarget_price\tfrom\tto\tdepart");
    }
    for w in &store.watches {
        match ctx.output {
            Output::Plain => println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                w.id, w.name, w.enabled, w.target_price, w.query.from, w.query.to, w.query.depart
            ),
            _ => println!(
                "{}\t{}\t{}->{}\t{}\ttarget={}\tenabled={}",
                w.id, w.name, w.query.from, w.query.to, w.query.depart, w.target_price, w.enabled
            ),
        }
    }
    Ok(())
}

async fn set_enabled(ctx: &Context, id: &str, enabled: bool) -> Result<()> {
    let storage = ctx.storage()?;
    let mut store = storage.load().await?;
    let watch = store
        .find_mut(id)
        .ok_or_else(|| AppError::WatchNotFound(id.to_string()))?;
    watch.enabled = enabled;
    watch.updated_at = Utc::now();
    let watch = watch.clone();
    storage.save(&store).await?;

    match ctx.output {
        Output::Plain => println!("watch_id={}\tenabled={}", watch.id, watch.enabled),
        Output::Human | Output::Json => print_json(&watch)?,
    }
    Ok(())
}

async fn watch_run(ctx: &Context, selector: WatchSelector, policy: ExitPolicy) -> Result<()> {
    let storage = ctx.storage()?;
    let mut store = storage.load().await?;
    let config = ctx.load_config()?;
    let transport = Context::transport(&config)?;
    let provider = build_provider(&config, ctx.timeout, Arc::clone(&transport))?;
    let notifier = Notifier::new(config.notify.clone(), transport);

    let mut stderr = std::io::stderr();
    let outcome = WatchPassRunner::new(provider.as_ref(), &notifier)
        .verbose(ctx.verbose)
        .diagnostics(&mut stderr)
        .run(&mut store.watches, &selector, Utc::now())
        .await;

    storage.save(&store).await?;

    let report = &outcome.report;
    if ctx.output == Output::Json {
        print_json(report)?;
    } else {
        println!("{}", report.summary_line());
    }

    if !outcome.notify_errors.is_empty() {
        return Err(AppError::NotifyFailures(outcome.notify_errors.join("; ")));
    }
    let health = report.health();
    if policy.is_fatal(health) {
        let message = match health {
            PassHealth::Outage { .. } => "all provider requests failed",
            _ => "provider failures occurred",
        };
        return Err(AppError::ProviderFailures(format!(
            "{message} ({}/{})",
            report.provider_failures, report.evaluated
        )));
    }

    if ctx.output != Output::Json {
        if report.triggered == 0 {
            println!("No alerts triggered");
        } else {
            println!("Triggered {} alert(s)", report.triggered);
        }
    }
    Ok(())
}

async fn watch_test(ctx: &Context, id: &str) -> Result<()> {
    let store = ctx.storage()?.load().await?;
    let watch = store
        .find(id)
        .ok_or_else(|| AppError::WatchNotFound(id.to_string()))?;
    let config = Config::load_or_default(&ctx.config_path);
    let notifier = Notifier::new(config.notify.clone(), Context::transport(&config)?);

    let alert = Alert {
        watch_id: watch.id.clone(),
        watch_name: watch.name.clone(),
        triggered_at: Utc::now(),
        reason: "manual test".to_string(),
        lowest_price: watch.target_price,
        currency: watch.query.currency_or_default().to_string(),
        url: build_deep_link(&watch.query),
    };
    dispatch_alert(&notifier, watch, &alert).await?;
    print_json(&alert)
}

async fn notify_test(
    ctx: &Context,
    channel: Channel,
    to: Option<String>,
    url: Option<String>,
) -> Result<()> {
    let config = ctx.load_config()?;
    let notifier = Notifier::new(config.notify.clone(), Context::transport(&config)?);
    let alert = Alert {
        watch_id: "test".to_string(),
        watch_name: "test-notification".to_string(),
        triggered_at: Utc::now(),
        reason: "notification test".to_string(),
        lowest_price: 499,
        currency: "USD".to_string(),
        url: "https://www.google.com/travel/flights".to_string(),
    };

    match channel {
        Channel::Terminal => notifier.send_terminal(&alert),
        Channel::Email => {
            notifier
                .send_email(to.as_deref().unwrap_or_default(), &alert)
                .await?
        }
        Channel::Webhook => {
            notifier
                .send_webhook(url.as_deref().unwrap_or_default(), &alert)
                .await?
        }
    }

    match ctx.output {
        Output::Plain => println!("ok=true\tchannel={channel}"),
        Output::Human | Output::Json => {
            print_json(&serde_json::json!({ "ok": true, "channel": channel }))?
        }
    }
    Ok(())
}

fn config_command(ctx: &Context, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let shown = ctx.load_config()?.redacted();
            match ctx.output {
                Output::Json => print_json(&shown)?,
                Output::Human | Output::Plain => print!("{}", toml::to_string_pretty(&shown)?),
            }
            Ok(())
        }
        ConfigCommand::Validate => {
            let config = ctx.load_config()?;
            config.validate()?;
            let kind = config.validate_provider()?;
            log::debug!("provider {kind:?} is usable");
            println!("config ok: {}", ctx.config_path.display());
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            let mut config = Config::read(&ctx.config_path)?;
            config.set(key.trim(), value.trim())?;
            config.save(&ctx.config_path)?;
            print_set(&ctx.config_path, &key, ctx.output);
            Ok(())
        }
    }
}

fn auth_command(ctx: &Context, command: AuthCommand) -> Result<()> {
    match command {
        AuthCommand::Status => {
            let status = ctx.load_config()?.auth_status();
            match ctx.output {
                Output::Plain => println!(
                    "provider={}\tserpapi_key={}\tsmtp_configured={}\twebhook_configured={}",
                    status.provider,
                    status.serpapi_key,
                    status.smtp_configured,
                    status.webhook_configured
                ),
                Output::Human | Output::Json => print_json(&status)?,
            }
            Ok(())
        }
        AuthCommand::Login {
            provider,
            serpapi_key,
        } => {
            if provider.is_none() && serpapi_key.is_none() {
                return Err(AppError::usage(
                    "auth login requires --provider and/or --serpapi-key",
                ));
            }
            let mut config = Config::read(&ctx.config_path)?;
            config.login(provider.as_deref(), serpapi_key.as_deref())?;
            config.save(&ctx.config_path)?;
            log::info!("saved credentials to {}", ctx.config_path.display());

            match ctx.output {
                Output::Plain => println!("ok=true\tprovider={}", config.provider.kind),
                Output::Human | Output::Json => print_json(
                    &serde_json::json!({ "ok": true, "provider": config.provider.kind }),
                )?,
            }
            Ok(())
        }
    }
}

fn doctor(ctx: &Context, strict: bool) -> Result<()> {
    let config = ctx.load_config()?;
    let config_dir = ctx
        .config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let report = run_doctor(&config, config_dir, Config::state_dir(ctx.state_dir.as_deref()));

    match ctx.output {
        Output::Json => print_json(&report)?,
        Output::Human | Output::Plain => print_doctor(&report),
    }
    doctor_verdict(&report, strict)
}

fn print_doctor(report: &DoctorReport) {
    for check in &report.checks {
        println!(
            "{}\t{}\t{}",
            check.status.to_string().to_uppercase(),
            check.name,
            check.message
        );
    }
    println!(
        "summary\tfailures={}\twarnings={}",
        report.failures, report.warnings
    );
}

/// Turn a doctor report into the command result.
fn doctor_verdict(report: &DoctorReport, strict: bool) -> Result<()> {
    if report.effective_failures(strict) == 0 {
        return Ok(());
    }
    if report.failures == 0 {
        return Err(AppError::ChecksFailed(format!(
            "doctor strict mode found {} warning(s)",
            report.warnings
        )));
    }
    Err(AppError::ChecksFailed(format!(
        "doctor found {} failing check(s)",
        report.failures
    )))
}

fn print_set(path: &Path, key: &str, output: Output) {
    match output {
        Output::Plain => println!("key={key}\tsaved=true"),
        Output::Json => println!(
            "{}",
            serde_json::json!({ "key": key, "saved": true, "path": path.display().to_string() })
        ),
        Output::Human => println!("Saved {key} to {}", path.display()),
    }
}
