// crates/clipdrop-media/src/fetch.rs
//
// HTTP GET for pasted URLs. The trait exists so tests (and an offline build)
// can swap the network out; the real implementation is a plain blocking ureq
// call, same as the editor's FFmpeg downloader.

use std::io::Read;
use clipdrop_core::error::{PasteError, Result};
use tracing::{debug, info};

/// Downloads larger than this are refused rather than pasted.
pub const MAX_DOWNLOAD_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetched {
    /// Raw `Content-Type` header, if the server sent one.
    pub content_type: Option<String>,
    pub bytes:        Vec<u8>,
}

pub trait Fetch: Send + Sync {
    fn get(&self, url: &str) -> Result<Fetched>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UreqFetch;

impl Fetch for UreqFetch {
    fn get(&self, url: &str) -> Result<Fetched> {
        let fail = |message: String| PasteError::Fetch { url: url.to_string(), message };

        info!(%url, "downloading");
        let resp = ureq::get(url)
            .call()
            .map_err(|e| fail(format!("HTTP request failed: {e}")))?;

        let content_type = resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body  = resp.into_body();
        let mut bytes = Vec::new();
        body.as_reader()
            .take(MAX_DOWNLOAD_BYTES + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| fail(format!("download read error: {e}")))?;
        if bytes.len() as u64 > MAX_DOWNLOAD_BYTES {
            return Err(fail(format!("response larger than {MAX_DOWNLOAD_BYTES} bytes")));
        }

        debug!(%url, bytes = bytes.len(), ?content_type, "download finished");
        Ok(Fetched { content_type, bytes })
    }
}
