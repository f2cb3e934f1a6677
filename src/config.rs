use std::path::PathBuf;

use crate::validation::SponsorConfig;

/// Application-level constants
pub const APP_NAME: &str = "Epistax";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn default_log_filter() -> &'static str {
    "epistax_core=info"
}

/// Get the application data directory
/// ~/Epistax/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Epistax")
}

/// Get the local journal database path
pub fn journal_db_path() -> PathBuf {
    app_data_dir().join("journal.db")
}

/// Fetch the sponsor's validation configuration from the remote,
/// falling back to the supplied local config when the fetch fails or
/// no sponsor id is set. Sourced once at session start; callers may
/// refresh by calling again.
pub async fn fetch_sponsor_config(
    client: &reqwest::Client,
    base_url: &str,
    local: SponsorConfig,
) -> SponsorConfig {
    let Some(sponsor_id) = local.sponsor_id.clone() else {
        return local;
    };

    let url = format!(
        "{}/sponsors/{}/config",
        base_url.trim_end_matches('/'),
        sponsor_id
    );
    let response = match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(status = %response.status(), "sponsor config fetch rejected, using local defaults");
            return local;
        }
        Err(e) => {
            tracing::warn!(error = %e, "sponsor config fetch failed, using local defaults");
            return local;
        }
    };

    match response.json::<SponsorConfig>().await {
        Ok(mut remote) => {
            remote.sponsor_id = Some(sponsor_id);
            remote
        }
        Err(e) => {
            tracing::warn!(error = %e, "sponsor config unparsable, using local defaults");
            local
        }
    }
}
