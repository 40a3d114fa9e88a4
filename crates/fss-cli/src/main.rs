//! fss: command-line front end for the storage router.
//!
//! Backends come from the FSS_* environment variables; access policies from
//! the JSON file named by --policies or FSS_POLICIES_PATH.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fss_cli::{build_router, policies_from};
use fss_core::FssConfig;
use fss_service::init_telemetry;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Parser)]
#[command(name = "fss", about = "File storage router CLI")]
struct Cli {
    /// Policy definitions file (overrides FSS_POLICIES_PATH)
    #[arg(long, global = true)]
    policies: Option<PathBuf>,

    /// User the operation is performed as
    #[arg(long, global = true, default_value = "anonymous")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file and print its storage URL
    Put {
        /// Content type the file is stored under
        content_type: String,
        /// Path to the file to upload
        file: PathBuf,
        /// Resource the file belongs to
        #[arg(long, default_value = "")]
        resource: String,
        /// Filename to store under (defaults to the file's name)
        #[arg(long)]
        filename: Option<String>,
    },
    /// Copy a stored file to stdout or a local file
    Get {
        bucket: String,
        path: String,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the read URL of a storage URL
    Url {
        storage_url: String,
        /// Include the policy's thumbnail parameters
        #[arg(long)]
        thumbnail: bool,
    },
    /// Print read metadata for one or more storage URLs as JSON
    Meta {
        #[arg(required = true)]
        storage_urls: Vec<String>,
    },
    /// Print the upload limit for a content type as JSON
    Limit {
        content_type: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = FssConfig::from_env()?;
    init_telemetry(config.json_logs())
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    let policies = policies_from(&config, cli.policies.as_deref())?;
    tracing::info!(
        environment = %config.environment,
        policies = policies.len(),
        "Loaded storage policies"
    );
    let router = build_router(&config, policies).await?;
    let user = cli.user;

    match cli.command {
        Commands::Put {
            content_type,
            file,
            resource,
            filename,
        } => {
            let filename = match filename {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("File path has no filename")?,
            };
            let reader = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let storage_url = router
                .write(&content_type, &resource, &user, &filename, reader)
                .await?;
            tracing::info!(
                user = %user,
                source = %file.display(),
                storage_url = %storage_url,
                "Upload complete"
            );
            println!("{}", storage_url);
        }
        Commands::Get {
            bucket,
            path,
            output,
        } => {
            let found = match output {
                Some(output) => {
                    let mut file = tokio::fs::File::create(&output)
                        .await
                        .with_context(|| format!("Failed to create {}", output.display()))?;
                    let found = router.read(&user, &bucket, &path, &mut file).await?;
                    file.flush().await?;
                    if !found {
                        tokio::fs::remove_file(&output).await.ok();
                    }
                    found
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    let found = router.read(&user, &bucket, &path, &mut stdout).await?;
                    stdout.flush().await?;
                    found
                }
            };
            if !found {
                tracing::warn!(user = %user, bucket = %bucket, path = %path, "File not found");
                anyhow::bail!("No file stored at /{}/{}", bucket, path);
            }
            tracing::info!(user = %user, bucket = %bucket, path = %path, "Download complete");
        }
        Commands::Url {
            storage_url,
            thumbnail,
        } => match router.read_url(&user, &storage_url, thumbnail).await? {
            Some(url) => println!("{}", url),
            None => anyhow::bail!("Not a storage URL: {}", storage_url),
        },
        Commands::Meta { storage_urls } => {
            let metas = router.resolve_metas(&user, &storage_urls).await?;
            tracing::debug!(
                requested = storage_urls.len(),
                resolved = metas.iter().filter(|m| m.is_some()).count(),
                "Resolved file metadata"
            );
            print_json(&metas)?;
        }
        Commands::Limit { content_type } => {
            let limit = router.upload_limit(&content_type, &user)?;
            print_json(&limit)?;
        }
    }

    Ok(())
}
