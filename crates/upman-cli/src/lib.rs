//! Shared helpers for the upman binary.

use std::path::PathBuf;

use anyhow::anyhow;
use upman_storage::UploadJob;

/// Parse a `SOURCE=DESTINATION` argument into an upload job.
///
/// The last `=` separates the two parts, so local paths may contain `=`.
pub fn parse_upload_job(arg: &str) -> Result<UploadJob, anyhow::Error> {
    let (source, destination) = arg
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("expected SOURCE=DESTINATION, got {:?}", arg))?;

    if source.is_empty() || destination.is_empty() {
        return Err(anyhow!("expected SOURCE=DESTINATION, got {:?}", arg));
    }

    Ok(UploadJob::new(PathBuf::from(source), destination))
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
