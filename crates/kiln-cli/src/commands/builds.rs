//! Build commands against the API server.

use anyhow::{Result, bail};
use kiln_core::LogEntry;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct BuildSummary {
    id: String,
    build_os: String,
    build_status: String,
    builder_name: Option<String>,
    created_date: String,
}

/// Turn an error response into an error carrying the server's message.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    debug!(%status, url = %response.url(), "API response");
    if status.is_success() {
        return Ok(response);
    }
    let body: Value = response.json().await.unwrap_or_default();
    match body["error"].as_str() {
        Some(message) => bail!("{} (code {}): {}", status, body["code"], message),
        None => bail!("{}", status),
    }
}

pub async fn request(api_url: &str, component: &str, branch: &str) -> Result<()> {
    let url = format!("{}/build/component/{}/branch/{}", api_url, component, branch);
    let response = check(reqwest::Client::new().post(url).send().await?).await?;
    let ids: Vec<String> = response.json().await?;
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

pub async fn list(api_url: &str, component: &str, branch: &str) -> Result<()> {
    let url = format!("{}/build/component/{}/branch/{}", api_url, component, branch);
    let response = check(reqwest::get(url).await?).await?;
    let builds: Vec<BuildSummary> = response.json().await?;

    if builds.is_empty() {
        println!("No builds");
        return Ok(());
    }
    for build in builds {
        println!(
            "{}  {:<12} {:<10} {:<24} {}",
            build.id,
            build.build_status,
            build.build_os,
            build.builder_name.as_deref().unwrap_or("-"),
            build.created_date
        );
    }
    Ok(())
}

pub async fn logs(api_url: &str, id: &str) -> Result<()> {
    let url = format!("{}/build/{}/logs", api_url, id);
    let response = check(reqwest::get(url).await?).await?;
    let entries: Vec<LogEntry> = response.json().await?;
    for entry in entries {
        println!("{} {}", entry.timestamp.to_rfc3339(), entry.line);
    }
    Ok(())
}

pub async fn delete(api_url: &str, id: &str) -> Result<()> {
    let url = format!("{}/build/{}", api_url, id);
    check(reqwest::Client::new().delete(url).send().await?).await?;
    println!("Deleted build {}", id);
    Ok(())
}

pub async fn release(api_url: &str, id: &str) -> Result<()> {
    let url = format!("{}/build/{}/release", api_url, id);
    check(reqwest::Client::new().post(url).send().await?).await?;
    println!("Released build {}", id);
    Ok(())
}
