use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use env_logger::{Builder, Env};

use crate::api::{HttpEmployeeApi, HttpOptions};
use crate::cli::args::{CliArgs, Command, ViewArgs};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::domain::{ClientPageRequest, EmployeeFields, EmployeeId, EmployeeRecord, Filters};
use crate::output::{self, OutputFormat};
use crate::pagination::PageGeometry;
use crate::reconciler::{PageReconciler, ReconcilerOptions};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/";
pub const DEFAULT_SERVER_PAGE_SIZE: usize = 25;
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_CACHE_TTL_MS: u64 = 5000;

fn format_kv_line(label: &str, value: &str) {
    eprintln!(":: {:<12}: {}", label, value);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    List(ClientPageRequest),
    Browse(ClientPageRequest),
    Create(EmployeeFields),
    Update(EmployeeRecord),
    Delete(EmployeeId),
    InitConfig,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub api_url: String,
    pub server_page_size: NonZeroUsize,
    pub cache_ttl: Duration,
    pub timeout: usize,
    pub rate: u32,
    pub proxy: Option<String>,
    pub prefetch: bool,
    pub output_format: OutputFormat,
    pub no_color: bool,
    pub verbose: u8,
    pub config_path: Option<PathBuf>,
    pub action: Action,
}

fn positive(value: usize, what: &str) -> Result<NonZeroUsize, String> {
    NonZeroUsize::new(value).ok_or_else(|| format!("invalid {what}, expected positive integer"))
}

fn build_request(
    page: usize,
    view: ViewArgs,
    cfg: &ConfigFile,
) -> Result<ClientPageRequest, String> {
    let page_size = positive(
        view.page_size.or(cfg.page_size).unwrap_or(DEFAULT_PAGE_SIZE),
        "page-size",
    )?;
    if PageGeometry::client_window(page, page_size).is_none() {
        return Err(format!(
            "invalid page {page}, page {page} of {page_size} rows is past the addressable range"
        ));
    }
    Ok(ClientPageRequest::new(page, page_size)
        .sort(view.sort.unwrap_or_default(), view.order.unwrap_or_default())
        .filters(Filters::new(view.filter)))
}

/// Merges CLI flags over the environment over the config file over defaults.
///
/// `env_server_page_size` is the already-parsed `EMPDIR_SERVER_PAGE_SIZE`.
pub fn build_run_config(
    args: CliArgs,
    cfg: ConfigFile,
    env_server_page_size: Option<usize>,
    config_path: Option<PathBuf>,
) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let api_url = args
        .api_url
        .or_else(|| cfg.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let server_page_size = positive(
        args.server_page_size
            .or(env_server_page_size)
            .or(cfg.server_page_size)
            .unwrap_or(DEFAULT_SERVER_PAGE_SIZE),
        "server-page-size",
    )?;
    let cache_ttl_ms = args
        .cache_ttl_ms
        .or(cfg.cache_ttl_ms)
        .unwrap_or(DEFAULT_CACHE_TTL_MS);
    let timeout = positive(args.timeout.or(cfg.timeout).unwrap_or(10), "timeout")?.get();
    let rate = args.rate.or(cfg.rate).unwrap_or(0);
    let proxy = args
        .proxy
        .or_else(|| cfg.proxy.clone())
        .filter(|p| !p.trim().is_empty());
    let prefetch = !args.no_prefetch && cfg.prefetch.unwrap_or(true);
    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    let output_format_raw = args
        .output_format
        .or_else(|| cfg.output_format.clone())
        .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&output_format_raw)
        .ok_or_else(|| format!("invalid output format '{output_format_raw}', expected text or json"))?;

    let action = match args.command {
        Command::List { page, view } => Action::List(build_request(page, view, &cfg)?),
        Command::Browse { view } => Action::Browse(build_request(0, view, &cfg)?),
        Command::Create { employee } => Action::Create(employee.into()),
        Command::Update { id, employee } => Action::Update(EmployeeRecord {
            id,
            fields: employee.into(),
        }),
        Command::Delete { id } => Action::Delete(id),
        Command::InitConfig => Action::InitConfig,
    };

    Ok(RunConfig {
        api_url,
        server_page_size,
        cache_ttl: Duration::from_millis(cache_ttl_ms),
        timeout,
        rate,
        proxy,
        prefetch,
        output_format,
        no_color,
        verbose: args.verbose,
        config_path,
        action,
    })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // A second init (tests, embedding) is harmless.
    let _ = Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init();
}

fn emit(bytes: &[u8]) -> Result<(), String> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|_| stdout.flush())
        .map_err(|e| format!("failed to write output: {e}"))
}

fn print_run_header(run: &RunConfig) {
    format_kv_line("API", &run.api_url);
    format_kv_line("Server page", &run.server_page_size.to_string());
    format_kv_line("Cache TTL", &format!("{}ms", run.cache_ttl.as_millis()));
    format_kv_line("Prefetch", if run.prefetch { "on" } else { "off" });
    if run.rate > 0 {
        format_kv_line("Rate", &format!("{}/s", run.rate));
    }
    if let Some(proxy) = run.proxy.as_deref() {
        format_kv_line("Proxy", proxy);
    }
}

fn init_config(path: Option<PathBuf>) -> Result<(), String> {
    let path = path
        .or_else(config::default_config_path)
        .ok_or_else(|| "could not determine a config path, pass --config".to_string())?;
    let message = if config::ensure_default_config_file(&path)? {
        format!("wrote default config to {}\n", path.display())
    } else {
        format!("config already exists at {}\n", path.display())
    };
    emit(message.as_bytes())
}

pub async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    if run.action == Action::InitConfig {
        return init_config(run.config_path);
    }

    let api = HttpEmployeeApi::new(&HttpOptions {
        base_url: run.api_url.clone(),
        timeout_seconds: run.timeout,
        proxy: run.proxy.clone(),
        rate: run.rate,
        ..HttpOptions::default()
    })
    .map_err(|e| e.to_string())?;
    let reconciler = PageReconciler::new(
        api,
        ReconcilerOptions {
            server_page_size: run.server_page_size,
            cache_ttl: run.cache_ttl,
            prefetch: run.prefetch,
        },
    );
    if run.verbose > 0 {
        print_run_header(&run);
    }

    let format = run.output_format;
    match run.action {
        Action::List(request) => {
            let page = reconciler
                .fetch_client_page(&request)
                .await
                .map_err(|e| e.to_string())?;
            emit(&output::render_page(&page, format))?;
        }
        Action::Browse(request) => {
            let mut current = 0;
            loop {
                let page = reconciler
                    .fetch_client_page(&request.at_page(current))
                    .await
                    .map_err(|e| format!("client page {current}: {e}"))?;
                emit(&output::render_page(&page, format))?;
                if current >= page.last_page {
                    break;
                }
                current += 1;
            }
            log::info!("browsed {} client pages", current + 1);
        }
        Action::Create(fields) => {
            let record = reconciler.create(fields).await.map_err(|e| e.to_string())?;
            emit(&output::render_record(&record, format))?;
        }
        Action::Update(record) => {
            let record = reconciler.update(record).await.map_err(|e| e.to_string())?;
            emit(&output::render_record(&record, format))?;
        }
        Action::Delete(id) => {
            reconciler.delete(id.clone()).await.map_err(|e| e.to_string())?;
            if format == OutputFormat::Json {
                let body = serde_json::json!({ "deleted": id });
                emit(format!("{body}\n").as_bytes())?;
            } else {
                emit(format!("deleted employee {id}\n").as_bytes())?;
            }
        }
        Action::InitConfig => {}
    }

    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                print!("{e}");
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };
    init_logging(args.verbose);

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };
    let env_server_page_size = config::server_page_size_from_env()?;

    let run = build_run_config(args, cfg, env_server_page_size, user_config_path)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}
