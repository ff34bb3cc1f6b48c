//! CLI commands implementation

use anyhow::{anyhow, bail, Result};
use gpubroker_core::{Lease, Slot};
use reqwest::StatusCode;

/// API client for communicating with the daemon
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Show every GPU and who holds it
pub async fn status(client: &ApiClient) -> Result<()> {
    let response = client.client.get(client.url("/api/status")).send().await?;

    if response.status().is_success() {
        let slots: Vec<Slot> = response.json().await?;

        if slots.is_empty() {
            println!("No GPUs configured");
        } else {
            let free = slots.iter().filter(|s| s.available).count();
            println!("GPUs: {} total, {} available", slots.len(), free);
            println!();
            println!(
                "{:<4} {:<10} {:<20} {:<7} {:<25}",
                "ID", "STATE", "USER", "PORT", "SESSION START"
            );
            println!("{}", "-".repeat(70));
            for slot in &slots {
                println!("{}", format_slot_row(slot));
            }
        }
    } else {
        let status = response.status();
        let error = response.text().await?;
        bail!("Failed to get status ({}): {}", status, error.trim());
    }

    Ok(())
}

/// Claim a GPU for `user`
pub async fn claim(client: &ApiClient, user: String) -> Result<()> {
    let response = client
        .client
        .post(client.url("/api/claim"))
        .query(&[("user_id", &user)])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await?;
        return Err(claim_error(status, &body));
    }

    let lease: Lease = response.json().await?;
    println!("GPU {} assigned to '{}'", lease.gpu_id, lease.user_id);
    println!("  Port: {}", lease.port);
    println!("  PIN: {}", lease.pin);
    println!("  Started: {}", lease.started_at.to_rfc3339());

    Ok(())
}

/// Release the GPU held by `user`
pub async fn release(client: &ApiClient, user: String) -> Result<()> {
    let response = client
        .client
        .post(client.url("/api/release"))
        .query(&[("user_id", &user)])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await?;
        return Err(release_error(&user, status, &body));
    }

    println!("Released GPU held by '{}'", user);
    Ok(())
}

fn claim_error(status: StatusCode, body: &str) -> anyhow::Error {
    match status {
        StatusCode::SERVICE_UNAVAILABLE => anyhow!("No GPU available, try again later"),
        _ => anyhow!("Failed to claim GPU ({}): {}", status, body.trim()),
    }
}

fn release_error(user: &str, status: StatusCode, body: &str) -> anyhow::Error {
    match status {
        StatusCode::NOT_FOUND => anyhow!("'{}' holds no GPU", user),
        _ => anyhow!("Failed to release GPU ({}): {}", status, body.trim()),
    }
}

/// One line of the status table
fn format_slot_row(slot: &Slot) -> String {
    let state = if slot.available { "free" } else { "in use" };
    let user = slot.user_id.as_deref().unwrap_or("-");
    let started = slot
        .session_start
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<4} {:<10} {:<20} {:<7} {:<25}",
        slot.id, state, user, slot.port, started
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_api_client_url() {
        let client = ApiClient::new("http://localhost:8080/");
        assert_eq!(client.url("/api/status"), "http://localhost:8080/api/status");
    }

    #[test]
    fn test_claim_error_messages() {
        let err = claim_error(StatusCode::SERVICE_UNAVAILABLE, "no GPU available");
        assert_eq!(err.to_string(), "No GPU available, try again later");

        let err = claim_error(StatusCode::BAD_REQUEST, "user_id required\n");
        assert_eq!(
            err.to_string(),
            "Failed to claim GPU (400 Bad Request): user_id required"
        );
    }

    #[test]
    fn test_release_error_messages() {
        let err = release_error("alice", StatusCode::NOT_FOUND, "session not found");
        assert_eq!(err.to_string(), "'alice' holds no GPU");

        let err = release_error("alice", StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(err.to_string().starts_with("Failed to release GPU (500"));
    }

    #[test]
    fn test_format_free_slot() {
        let row = format_slot_row(&Slot::new(1, 47994));
        assert!(row.starts_with("1    free"));
        assert!(row.contains("47994"));
        assert!(row.ends_with('-'));
    }

    #[test]
    fn test_format_leased_slot() {
        let mut slot = Slot::new(0, 47984);
        slot.assign("alice", Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap());

        let row = format_slot_row(&slot);
        assert!(row.contains("in use"));
        assert!(row.contains("alice"));
        assert!(row.ends_with("2024-05-01 12:30:00 UTC"));
    }
}
