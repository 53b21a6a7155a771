use anyhow::{anyhow, Context, Result};
use futures_util::TryStreamExt;
use reqwest::{Client, RequestBuilder};
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Name a downloaded file after the last path segment of its url.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid download url: {url}"))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .ok_or(anyhow!("No file name in download url: {}", url))
}

pub async fn download_file(client: &Client, url: &str, output_dir: &Path) -> Result<PathBuf> {
    fetch_to_dir(client.get(url), url, output_dir).await
}

/// Stream the response for `request` into `output_dir`, named from `url`.
///
/// Bytes land in a `.partial` file that is renamed once the body is fully
/// written. An existing output file is left untouched and returned as is.
pub async fn fetch_to_dir(request: RequestBuilder, url: &str, output_dir: &Path) -> Result<PathBuf> {
    let dst = output_dir.join(file_name_from_url(url)?);
    if dst.exists() {
        info!("{} already exists, skipping download", dst.display());
        return Ok(dst);
    }

    if !output_dir.exists() {
        fs::create_dir_all(output_dir)?;
    }

    info!("Downloading {url}");
    let response = request
        .send()
        .await
        .with_context(|| format!("Request for {url} failed"))?
        .error_for_status()?;

    let partial = dst.with_file_name(format!(
        "{}.partial",
        dst.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    ));
    let mut partial_file = File::create(&partial)
        .with_context(|| format!("Unable to create {}", partial.display()))?;

    let mut body = response.bytes_stream();
    let mut byte_count = 0_u64;
    while let Some(bytes) = body.try_next().await? {
        partial_file.write_all(&bytes)?;
        byte_count += bytes.len() as u64;
    }
    partial_file.flush()?;
    drop(partial_file);

    fs::rename(&partial, &dst)?;
    debug!("Wrote {byte_count} bytes to {}", dst.display());

    Ok(dst)
}
