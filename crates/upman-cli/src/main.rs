//! upman — command-line access to the configured file storage.
//!
//! Configuration comes from the environment (or a `.env` file): STORAGE_BACKEND,
//! STORAGE_PREFIX, S3_BUCKET, S3_REGION / AWS_REGION, S3_ENDPOINT, LOCAL_STORAGE_PATH,
//! LOCAL_STORAGE_BASE_URL.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use upman_cli::{init_tracing, parse_upload_job};
use upman_core::StorageConfig;
use upman_storage::{create_storage, UploadJob};

#[derive(Parser)]
#[command(name = "upman", about = "Upload, delete and find stored files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one file and print its public URL
    Save {
        /// Local file to upload
        source: std::path::PathBuf,
        /// Destination path inside the storage prefix
        destination: String,
    },
    /// Upload several files concurrently; fails if any upload fails
    BulkSave {
        /// Files as SOURCE=DESTINATION
        #[arg(required = true, value_parser = parse_upload_job)]
        files: Vec<UploadJob>,
    },
    /// Delete one file
    Delete {
        /// Path inside the storage prefix
        path: String,
    },
    /// Delete several files in a single request
    BulkDelete {
        /// Paths inside the storage prefix
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// List files in a namespace, optionally filtered by glob masks
    Find {
        /// Namespace (key prefix) to search
        #[arg(default_value = "")]
        namespace: String,
        /// Finder-style mask, e.g. "*.png" or "/media/**.jpg"; repeatable
        #[arg(long = "mask", short = 'm')]
        masks: Vec<String>,
    },
}

#[derive(Serialize)]
struct Saved<'a> {
    destination: &'a str,
    url: String,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = StorageConfig::from_env().context("invalid storage configuration")?;
    let storage = create_storage(&config)
        .await
        .context("failed to initialize storage backend")?;

    match cli.command {
        Commands::Save {
            source,
            destination,
        } => {
            let url = storage
                .save(&source, &destination)
                .await
                .with_context(|| format!("failed to save {}", source.display()))?;
            print_json(&Saved {
                destination: &destination,
                url,
            })?;
        }
        Commands::BulkSave { files } => {
            let urls = storage.bulk_save(&files).await.context("bulk save failed")?;
            let saved: Vec<Saved> = files
                .iter()
                .zip(urls)
                .map(|(job, url)| Saved {
                    destination: &job.destination,
                    url,
                })
                .collect();
            print_json(&saved)?;
        }
        Commands::Delete { path } => {
            storage
                .delete(&path)
                .await
                .with_context(|| format!("failed to delete {}", path))?;
        }
        Commands::BulkDelete { paths } => {
            let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
            storage
                .bulk_delete(&paths)
                .await
                .context("bulk delete failed")?;
        }
        Commands::Find { namespace, masks } => {
            let masks: Vec<&str> = masks.iter().map(String::as_str).collect();
            let found = storage
                .find(&namespace, &masks)
                .await
                .with_context(|| format!("failed to list {:?}", namespace))?;
            print_json(&found)?;
        }
    }

    Ok(())
}
