//! Utility functions and helpers.

pub mod http;

use url::Url;

use crate::error::Result;

/// Join a relative path onto a base URL, treating the base as a directory.
///
/// `http://host:3000/gateway` + `api/sendText` gives
/// `http://host:3000/gateway/api/sendText`.
pub fn join_url(base: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}
