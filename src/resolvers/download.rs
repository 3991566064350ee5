//! Shared streaming download
//!
//! Bytes flow through three consumers at once: a size counter enforcing the
//! cap, the digest hasher, and the file sink. No bytes are written past the
//! cap, and the destination file only survives a fully verified stream;
//! every failure path deletes it.

use std::path::Path;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use crate::core::digest::{Algorithm, StreamingHasher};
use crate::core::error::{Result, ShieldError};
use crate::core::http::download_client;
use crate::resolvers::types::DownloadOutcome;

/// Progress bar style for downloads
#[allow(clippy::expect_used)] // static template, validated by tests downstream
fn download_progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .expect("valid template")
        .progress_chars("█▓▒░")
}

/// Stream `url` into `dest`, hashing with `algo` and aborting once more
/// than `max_bytes` arrive. At most `max_redirects` redirects are followed.
pub async fn fetch_to_file(
    url: &str,
    dest: &Path,
    algo: Algorithm,
    max_bytes: u64,
    max_redirects: usize,
    show_progress: bool,
) -> Result<DownloadOutcome> {
    let result = stream_body(url, dest, algo, max_bytes, max_redirects, show_progress).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(dest).await;
    }
    result
}

async fn stream_body(
    url: &str,
    dest: &Path,
    algo: Algorithm,
    max_bytes: u64,
    max_redirects: usize,
    show_progress: bool,
) -> Result<DownloadOutcome> {
    let response = download_client(max_redirects).get(url).send().await?;
    if response.status().as_u16() == 404 {
        return Err(ShieldError::NotFound(format!("artifact at {url}")));
    }
    let response = response.error_for_status()?;

    let total = response.content_length().unwrap_or(0);
    let pb = if show_progress {
        let pb = ProgressBar::new(total);
        pb.set_style(download_progress_style());
        Some(pb)
    } else {
        None
    };

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;
    let mut hasher = StreamingHasher::new(algo);
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(item) = stream.next().await {
        let chunk = item.map_err(ShieldError::from)?;
        downloaded += chunk.len() as u64;
        if downloaded > max_bytes {
            if let Some(pb) = &pb {
                pb.finish_and_clear();
            }
            return Err(ShieldError::SizeLimit {
                actual: downloaded,
                limit: max_bytes,
            });
        }
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        if let Some(pb) = &pb {
            pb.set_position(downloaded);
        }
    }

    file.flush().await?;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    Ok(DownloadOutcome {
        digest: hasher.finalize(),
        bytes_written: downloaded,
        path: dest.to_path_buf(),
    })
}
