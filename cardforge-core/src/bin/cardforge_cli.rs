//! CardForge CLI - Bridge interface for card rendering tools
//!
//! Commands: templates, frame, markup, layout, batch
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cardforge_core::{
    format_text, resolve_frame, strip_reminder_text, CancelToken, CardLayout, EngineConfig,
    FailurePolicy, PipelineError, PrintSpec, RenderPipeline, TemplateRegistry,
};

#[derive(Parser)]
#[command(name = "cardforge-cli")]
#[command(about = "CardForge CLI - Card frame and text layout engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to templates directory; built-in templates are used when empty
    #[arg(short, long, default_value = "templates")]
    templates_dir: PathBuf,

    /// Engine configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    Templates,

    /// Resolve frame slots for a card
    Frame {
        /// JSON payload (CardLayout)
        #[arg(short, long)]
        payload: String,
    },

    /// Substitute symbols and mark italics in rules text
    Markup {
        #[arg(short, long)]
        text: String,

        #[arg(short, long, default_value = "")]
        flavor: String,

        /// Remove reminder text first
        #[arg(long)]
        strip_reminder: bool,
    },

    /// Lay out one card
    Layout {
        /// Template ID
        #[arg(short, long)]
        template: String,

        /// JSON payload (CardLayout)
        #[arg(short, long)]
        payload: String,

        /// Override the template's resolution
        #[arg(long)]
        dpi: Option<u32>,
    },

    /// Lay out every card in a JSON array file
    Batch {
        #[arg(short, long)]
        template: String,

        #[arg(short, long)]
        cards: PathBuf,

        /// Stop at the first failing card
        #[arg(long)]
        abort_on_failure: bool,
    },
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

fn print_error(error: impl std::fmt::Display) {
    println!("{}", serde_json::json!({ "success": false, "error": error.to_string() }));
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cardforge_core=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(EngineConfig::load).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            print_error(format!("Failed to load config: {e}"));
            return ExitCode::FAILURE;
        }
    };

    let registry = match TemplateRegistry::load_from_dir(&cli.templates_dir) {
        Ok(r) if r.is_empty() => TemplateRegistry::builtin(),
        Ok(r) => r,
        Err(e) => {
            print_error(format!("Failed to load templates: {e}"));
            return ExitCode::FAILURE;
        }
    };
    info!(templates = registry.len(), "loaded templates");

    let pipeline = RenderPipeline::new(registry, config);

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = pipeline
                .list_templates()
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "id": t.id,
                        "name": t.name,
                        "version": t.template_version,
                        "dpi": t.dpi,
                        "capabilities": t.capabilities,
                        "deprecated": t.deprecated,
                    })
                })
                .collect();
            print_json(&templates);
            ExitCode::SUCCESS
        }

        Commands::Frame { payload } => {
            let card: CardLayout = match serde_json::from_str(&payload) {
                Ok(c) => c,
                Err(e) => {
                    print_error(format!("Invalid payload: {e}"));
                    return ExitCode::FAILURE;
                }
            };
            print_json(&resolve_frame(&card, &pipeline.config().frame));
            ExitCode::SUCCESS
        }

        Commands::Markup { text, flavor, strip_reminder } => {
            let text = if strip_reminder { strip_reminder_text(&text) } else { text };
            let extra = &pipeline.config().markup.extra_italics;
            let (runs, parsed) = format_text(&text, &flavor, extra, pipeline.symbols());
            print_json(&serde_json::json!({ "runs": runs, "parsed": parsed }));
            ExitCode::SUCCESS
        }

        Commands::Layout { template, payload, dpi } => {
            let card: CardLayout = match serde_json::from_str(&payload) {
                Ok(c) => c,
                Err(e) => {
                    print_error(format!("Invalid payload: {e}"));
                    return ExitCode::FAILURE;
                }
            };
            let user_print = match dpi.map(PrintSpec::from_user).transpose() {
                Ok(p) => p,
                Err(e) => {
                    print_error(e);
                    return ExitCode::FAILURE;
                }
            };

            match pipeline.render_headless(&card, &template, user_print, &CancelToken::new()) {
                Ok((plan, _)) => {
                    print_json(&serde_json::json!({ "success": true, "plan": plan }));
                    ExitCode::SUCCESS
                }
                Err(e @ PipelineError::ValidationFailed(_)) => {
                    print_error(e);
                    ExitCode::from(2)
                }
                Err(e) => {
                    print_error(e);
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Batch { template, cards, abort_on_failure } => {
            let cards: Vec<CardLayout> = match fs::read_to_string(&cards)
                .map_err(|e| e.to_string())
                .and_then(|c| serde_json::from_str(&c).map_err(|e| e.to_string()))
            {
                Ok(c) => c,
                Err(e) => {
                    print_error(format!("Invalid cards file: {e}"));
                    return ExitCode::FAILURE;
                }
            };
            let policy = if abort_on_failure { FailurePolicy::Abort } else { FailurePolicy::Skip };

            let report =
                pipeline.render_batch(&cards, &template, None, policy, &CancelToken::new());
            print_json(&report);
            if report.failures.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
    }
}
