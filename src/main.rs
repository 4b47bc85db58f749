use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use proxy_score::{
    config::{
        AppConfig, DEFAULT_CONCURRENCY, DEFAULT_CONFIG_FILE, DEFAULT_FRAUD_API_URL,
        DEFAULT_GEO_API_URL, DEFAULT_TEMPLATE, DEFAULT_TIMEOUT_SECS,
    },
    export::{
        filter, sort_rows, write_export, BoolFilter, Column, ExportError, ExportFormat, ExportMode,
        ExportSelection, FilterSpec,
    },
    proxy::{
        CheckerConfig, ProbeFailure, ProxyChecker, ProxyParser, ProxyRow, ProxyType,
        ResultAggregate,
    },
    tui::ProxyCheckerApp,
};
use std::path::PathBuf;
use std::time::Duration;

/// Checks proxies for quality and fraud risk with multi-threading support
#[derive(Parser)]
#[command(name = "proxy-score")]
#[command(about = "Checks proxies for quality and fraud risk with multi-threading support")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log verbosity (RUST_LOG takes precedence)
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxies against the geolocation and fraud services
    Check {
        /// Input file with one host:port:username:password per line
        input: PathBuf,
        /// Fraud service API key (defaults to the stored key)
        #[arg(long)]
        api_key: Option<String>,
        /// Store the API key in the config file
        #[arg(long)]
        save_api_key: bool,
        /// Config file holding the stored API key
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Number of concurrent probes
        #[arg(short = 'n', long, default_value_t = DEFAULT_CONCURRENCY)]
        threads: usize,
        /// Timeout in seconds for each request
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
        /// Geolocation endpoint, requested through each proxy
        #[arg(long, default_value = DEFAULT_GEO_API_URL)]
        geo_url: String,
        /// Fraud service base URL
        #[arg(long, default_value = DEFAULT_FRAUD_API_URL)]
        fraud_url: String,
        /// Proxy type (http, https, socks5)
        #[arg(short = 't', long, default_value = "http")]
        proxy_type: String,
        /// Save all results as JSON for a later `export`
        #[arg(long)]
        results: Option<PathBuf>,
        /// Show progress and results in the interactive TUI
        #[arg(long)]
        tui: bool,
        #[command(flatten)]
        export: ExportArgs,
    },
    /// Filter and export results saved with `check --results`
    Export {
        /// Results file written by `check --results`
        results: PathBuf,
        #[command(flatten)]
        export: ExportArgs,
    },
    /// Parse a proxy list and report malformed lines
    Parse {
        /// Input file containing proxies
        input: PathBuf,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// Keep proxies with a fraud score at or below this value
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
    max_fraud_score: u8,
    /// Required Proxy value (all, true, false)
    #[arg(long, default_value = "all")]
    proxy: BoolFilter,
    /// Required VPN value (all, true, false)
    #[arg(long, default_value = "all")]
    vpn: BoolFilter,
    /// Required Tor value (all, true, false)
    #[arg(long, default_value = "all")]
    tor: BoolFilter,
    /// Required Mobile value (all, true, false)
    #[arg(long, default_value = "all")]
    mobile: BoolFilter,
    /// Required Recent Abuse value (all, true, false)
    #[arg(long, default_value = "all")]
    recent_abuse: BoolFilter,
    /// Required Bot Status value (all, true, false)
    #[arg(long, default_value = "all")]
    bot_status: BoolFilter,
    /// Sort by this column, e.g. "Fraud Score"
    #[arg(long)]
    sort: Option<Column>,
    /// Sort in descending order
    #[arg(long)]
    desc: bool,
    /// Write the filtered proxies to this file
    #[arg(long)]
    export: Option<PathBuf>,
    /// Export format; inferred from the file extension when omitted
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    /// Comma separated columns for CSV export (default: all)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<Column>,
    /// Line template for text export
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    template: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Text,
}

impl ExportArgs {
    fn filter_spec(&self) -> FilterSpec {
        FilterSpec::new()
            .with_max_fraud_score(self.max_fraud_score)
            .with_bool(Column::Proxy, self.proxy)
            .with_bool(Column::Vpn, self.vpn)
            .with_bool(Column::Tor, self.tor)
            .with_bool(Column::Mobile, self.mobile)
            .with_bool(Column::RecentAbuse, self.recent_abuse)
            .with_bool(Column::BotStatus, self.bot_status)
    }

    /// Filter and sort the rows, print them, and export them when asked to
    fn apply(&self, aggregate: &ResultAggregate) -> Result<()> {
        let mut rows = filter(&aggregate.rows, &self.filter_spec());
        if let Some(column) = self.sort {
            sort_rows(&mut rows, column, self.desc);
        }

        println!(
            "Showing {} of {} checked proxies",
            rows.len(),
            aggregate.rows.len()
        );
        print_table(&rows);

        let Some(path) = &self.export else {
            return Ok(());
        };

        let format = match self.format {
            Some(FormatArg::Csv) => ExportFormat::Csv,
            Some(FormatArg::Text) => ExportFormat::Text,
            None => ExportFormat::from_path(path),
        };
        let mode = match format {
            ExportFormat::Csv => ExportMode::Tabular,
            ExportFormat::Text => ExportMode::Templated(self.template.clone()),
        };
        let columns = if self.columns.is_empty() {
            Column::ALL.to_vec()
        } else {
            self.columns.clone()
        };

        let selection = ExportSelection::new(rows, columns);
        match write_export(path, &selection, &mode) {
            Ok(count) => println!("Exported {} proxies to {:?}", count, path),
            Err(e @ (ExportError::EmptySelection | ExportError::NoColumns)) => {
                eprintln!("Nothing exported: {}", e)
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log lines would corrupt the TUI's alternate screen
    let level = match &cli.command {
        Commands::Check { tui: true, .. } => LevelFilter::Off,
        _ => cli.log_level.into(),
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Check {
            input,
            api_key,
            save_api_key,
            config,
            threads,
            timeout,
            geo_url,
            fraud_url,
            proxy_type,
            results,
            tui,
            export,
        } => {
            let ptype = parse_proxy_type(&proxy_type)?;
            let mut app_config = AppConfig::load(&config)?;
            let key = app_config.resolve_api_key(api_key.as_deref());
            if save_api_key {
                app_config.api_key = key.clone();
                app_config.save(&config)?;
            }
            if key.is_empty() {
                log::warn!("No fraud service API key given; fraud checks will likely be rejected");
            }

            let lines = ProxyParser::read_file(&input)?;
            println!("Loaded {} proxies from {:?}", lines.len(), input);
            println!("Checking with {} threads, timeout: {}s", threads, timeout);

            let checker_config = CheckerConfig::new()
                .with_concurrency(threads)
                .with_timeout(Duration::from_secs(timeout))
                .with_geo_url(geo_url)
                .with_fraud_url(fraud_url)
                .with_api_key(key)
                .with_proxy_type(ptype);
            let checker = ProxyChecker::with_config(checker_config)?;

            let aggregate = if tui {
                ProxyCheckerApp::new(lines, checker).run().await?
            } else {
                checker.run_batch(lines).await
            };

            println!(
                "Proxies Checked: {} | High Risk: {}",
                aggregate.summary.total, aggregate.summary.high_risk
            );
            print_failures(&aggregate.failures);

            if let Some(path) = results {
                aggregate.save(&path)?;
                println!("Saved results to {:?}", path);
            }

            export.apply(&aggregate)?;
        }
        Commands::Export { results, export } => {
            let aggregate = ResultAggregate::load(&results)?;
            export.apply(&aggregate)?;
        }
        Commands::Parse { input } => {
            let lines = ProxyParser::read_file(&input)?;
            let (credentials, errors) = ProxyParser::parse_all(&lines);

            println!(
                "Parsed {} proxies from {:?}, {} malformed",
                credentials.len(),
                input,
                errors.len()
            );
            for credential in &credentials {
                println!("{}", credential.to_full_string());
            }
            for error in &errors {
                eprintln!("{}", error);
            }
        }
    }

    Ok(())
}

fn parse_proxy_type(s: &str) -> Result<ProxyType> {
    match s.to_lowercase().as_str() {
        "http" => Ok(ProxyType::Http),
        "https" => Ok(ProxyType::Https),
        "socks5" => Ok(ProxyType::Socks5),
        _ => Err(anyhow!(
            "Invalid proxy type: {}. Use: http, https, socks5",
            s
        )),
    }
}

/// Print rows as an aligned plain-text table
fn print_table(rows: &[&ProxyRow]) {
    if rows.is_empty() {
        return;
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| Column::ALL.iter().map(|c| c.value(row)).collect())
        .collect();

    let widths: Vec<usize> = Column::ALL
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.name().len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{:<width$}", value, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", format_line(Column::ALL.iter().map(Column::name).collect()));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    );
    for row in &cells {
        println!("{}", format_line(row.iter().map(String::as_str).collect()));
    }
}

fn print_failures(failures: &[ProbeFailure]) {
    if failures.is_empty() {
        return;
    }
    eprintln!("Warning: {} proxies failed:", failures.len());
    for failure in failures {
        eprintln!("  {}", failure);
    }
}
