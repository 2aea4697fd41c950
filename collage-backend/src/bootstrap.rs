use std::path::Path;

use collage_backend::seed::{read_seed_file, seed_queue};
use collage_backend::Backend;

/// Enqueue the requests in `path` before the scheduler starts.
pub async fn seed_from_file(backend: &Backend, path: &Path) -> anyhow::Result<()> {
    let requests = read_seed_file(path)?;
    let total = requests.len();
    let summary = seed_queue(&backend.queue, requests).await;

    if summary.rejected > 0 {
        tracing::warn!(
            rejected = summary.rejected,
            total,
            "some seed requests were rejected"
        );
    }
    tracing::info!(
        path = %path.display(),
        accepted = summary.accepted,
        duplicates = summary.duplicates,
        "seeded job queue"
    );
    Ok(())
}
