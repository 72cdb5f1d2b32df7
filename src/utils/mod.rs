//! Utility functions and helpers.

pub mod http;
pub mod time;

use url::Url;

/// Parse an API base URL, making sure relative joins keep its path.
pub fn parse_base_url(base: &str) -> crate::error::Result<Url> {
    let mut url = Url::parse(base)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Resolve an API path against the base URL.
pub fn resolve_url(base: &Url, path: &str) -> String {
    base.join(path.trim_start_matches('/'))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}{}", base, path.trim_start_matches('/')))
}

/// Avatar URL for a user id.
pub fn avatar_url(base: &Url, user_id: u64) -> String {
    resolve_url(base, &format!("api/v1/users/{user_id}/avatar"))
}

/// Deep link that opens a clip on its channel page.
pub fn share_url(web_base: &str, channel_id: u64, shareable_id: &str) -> String {
    format!(
        "{}/{}?clip={}",
        web_base.trim_end_matches('/'),
        channel_id,
        shareable_id
    )
}
