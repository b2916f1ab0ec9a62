//! Endpoint paths of the secure updates server

/// REST namespace of the secure updates server
pub const API_NAMESPACE: &str = "wp-json/secure-updates-server/v1";

fn join(base_url: &str, path: &str) -> String {
    format!("{}/{}/{}", base_url.trim().trim_end_matches('/'), API_NAMESPACE, path)
}

/// `GET` reachability endpoint
pub fn connected(base_url: &str) -> String {
    join(base_url, "connected")
}

/// `GET` download endpoint for a slug (already normalized by the caller)
pub fn download(base_url: &str, slug: &str) -> String {
    join(base_url, &format!("download/{}", slug))
}

/// `POST` inventory endpoint
pub fn plugins(base_url: &str) -> String {
    join(base_url, "plugins")
}
