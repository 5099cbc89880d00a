use std::env;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use app_window_engine::{AppEngine, EngineConfig, EngineError, HeadlessShell};

const DEMO_PAGE: &str = "data:text/html,<html lang=en><head><title>Demo</title><script>boot()</script></head><body class=demo><h1>App window</h1></body></html>";

#[derive(Debug, Clone)]
struct AppConfig {
    url: Option<String>,
    file: Option<String>,
    config_path: Option<String>,
    outline_lines: usize,
    log_level: Level,
}

impl AppConfig {
    fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--url" => {
                    if i + 1 < args.len() {
                        config.url = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--file" => {
                    if i + 1 < args.len() {
                        config.file = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--config" => {
                    if i + 1 < args.len() {
                        config.config_path = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--outline" => {
                    if let Some(n) = args.get(i + 1).and_then(|v| v.parse().ok()) {
                        config.outline_lines = n;
                        i += 1;
                    }
                }
                "--debug" => config.log_level = Level::DEBUG,
                "--trace" => config.log_level = Level::TRACE,
                _ => {}
            }
            i += 1;
        }

        config
    }

    fn target_url(&self) -> app_window_engine::Result<String> {
        if let Some(path) = &self.file {
            let absolute = std::fs::canonicalize(path)
                .map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
            return url::Url::from_file_path(&absolute)
                .map(|u| u.to_string())
                .map_err(|_| EngineError::Config(format!("{path} is not a valid file path")));
        }
        Ok(self.url.clone().unwrap_or_else(|| DEMO_PAGE.to_string()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url: None,
            file: None,
            config_path: None,
            outline_lines: 200,
            log_level: Level::INFO,
        }
    }
}

fn setup_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }
}

fn load_engine_config(path: Option<&str>) -> app_window_engine::Result<EngineConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
            EngineConfig::from_json_str(&json)
        }
        None => Ok(EngineConfig::default()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> app_window_engine::Result<()> {
    let app_config = AppConfig::from_args();
    setup_logging(app_config.log_level);

    let engine_config = load_engine_config(app_config.config_path.as_deref())?;
    let url = app_config.target_url()?;
    info!("Composing {}", url);

    let start = Instant::now();
    let engine = AppEngine::new(engine_config, Arc::new(HeadlessShell::new()))?;
    let window = match engine.create_window(&url).await {
        Ok(window) => window,
        Err(e) => {
            error!("Composition failed: {}", e);
            return Err(e);
        }
    };
    info!("Page composed in {:?}", start.elapsed());

    if let Some(report) = engine.registry().last_report() {
        for diagnostic in &report.diagnostics {
            println!("warning: {diagnostic}");
        }
        println!(
            "head: {} batches, {} failed, {} skipped",
            report.head.non_empty_batches(),
            report.head.failed,
            report.head.skipped
        );
        println!(
            "body: {} batches, {} failed, {} skipped",
            report.body.non_empty_batches(),
            report.body.failed,
            report.body.skipped
        );
    }

    for line in window.content().outline(app_config.outline_lines) {
        println!("{line}");
    }

    Ok(())
}
