use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use vault_core::config;
use vault_core::config::AppConfig;
use vault_core::expiration::SqliteExpirationStore;
use vault_core::limits::Plan;
use vault_core::models::{ProcessRequest, VaultScope};
use vault_core::processor::OcrProcessor;
use vault_core::setup;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Process {
            document_id,
            storage_key,
            file_name,
            mime_type,
            user_id,
            personal_vault_id,
            organization_id,
        } => {
            let scope = scope_from_args(personal_vault_id, organization_id)?;
            let processor = build_processor(&cfg).await?;
            let outcome = processor
                .process_document(&ProcessRequest {
                    document_id,
                    storage_key,
                    file_name,
                    mime_type,
                    scope,
                    user_id,
                })
                .await;
            print_json(&outcome)
        }
        Commands::Retry {
            document_id,
            user_id,
        } => {
            let processor = build_processor(&cfg).await?;
            let outcome = processor.retry_process(&document_id, &user_id).await;
            print_json(&outcome)
        }
        Commands::Preview {
            storage_key,
            file_name,
            mime_type,
        } => {
            let processor = build_processor(&cfg).await?;
            let preview = processor
                .preview_classification(&storage_key, &file_name, &mime_type)
                .await;
            print_json(&preview)
        }
        Commands::Sort {
            document_id,
            folder_id,
        } => {
            let processor = build_processor(&cfg).await?;
            let outcome = processor.manual_sort(&document_id, &folder_id).await;
            print_json(&outcome)
        }
        Commands::Usage { user_id } => {
            let processor = build_processor(&cfg).await?;
            let tracker = processor.usage();
            let Some(user) = tracker.load_user(&user_id).await? else {
                bail!("user {user_id} not found");
            };
            let limit = Plan::from_name(user.plan.as_deref()).ocr_pages_per_month();
            let used = tracker.current_usage(&user_id).await?;
            print_json(&serde_json::json!({
                "userId": user_id,
                "plan": user.plan.unwrap_or_else(|| "free".to_string()),
                "pagesUsed": used,
                "pagesLimit": limit,
            }))
        }
    }
}

async fn build_processor(cfg: &AppConfig) -> Result<OcrProcessor> {
    let pool = storage::connect(&cfg.database.path).await?;
    storage::migrate(&pool).await?;
    let registry = setup::build_registry(cfg);
    let expiration = Arc::new(SqliteExpirationStore::new(pool.clone()));
    Ok(OcrProcessor::new(
        pool,
        cfg.ocr.clone(),
        registry,
        expiration,
    ))
}

fn scope_from_args(
    personal_vault_id: Option<String>,
    organization_id: Option<String>,
) -> Result<VaultScope> {
    match (personal_vault_id, organization_id) {
        (Some(vault), None) => Ok(VaultScope::personal(vault)),
        (None, Some(org)) => Ok(VaultScope::organization(org)),
        _ => bail!("exactly one of --personal-vault-id or --organization-id is required"),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser)]
#[command(name = "vault-ocr")]
#[command(about = "OCR classification and auto-filing for vault documents", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full OCR pipeline for an uploaded document
    Process {
        #[arg(long)]
        document_id: String,
        #[arg(long)]
        storage_key: String,
        #[arg(long)]
        file_name: String,
        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,
        #[arg(long)]
        user_id: String,
        /// Personal vault to file into (mutually exclusive with --organization-id)
        #[arg(long)]
        personal_vault_id: Option<String>,
        /// Organization to file into
        #[arg(long)]
        organization_id: Option<String>,
    },
    /// Re-run processing for a stored document
    Retry {
        #[arg(long)]
        document_id: String,
        #[arg(long)]
        user_id: String,
    },
    /// Classify without persisting anything
    Preview {
        #[arg(long)]
        storage_key: String,
        #[arg(long)]
        file_name: String,
        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,
    },
    /// Move a document into a folder manually
    Sort {
        #[arg(long)]
        document_id: String,
        #[arg(long)]
        folder_id: String,
    },
    /// Show monthly OCR page usage for a user
    Usage {
        #[arg(long)]
        user_id: String,
    },
}
