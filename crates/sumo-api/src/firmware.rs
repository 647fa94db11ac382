// Firmware distribution HTTP client
//
// Two endpoints are involved: an index page that is scraped for the link
// to the newest MicroPython binary, and a plain file server hosting the
// SumoRobot application sources by name.

use bytes::Bytes;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::HttpConfig;

/// Raw HTTP client for the firmware distribution endpoints.
///
/// Holds no state between calls; every method is a single request.
#[derive(Debug, Clone)]
pub struct FirmwareClient {
    http: reqwest::Client,
    index_url: Url,
    source_base_url: Url,
}

impl FirmwareClient {
    /// Create a new client from an `HttpConfig`.
    ///
    /// `source_base_url` is treated as a directory: companion files are
    /// resolved by appending their name to it.
    pub fn new(index_url: Url, source_base_url: Url, config: &HttpConfig) -> Result<Self, Error> {
        let http = config.build_client()?;
        Ok(Self::with_client(http, index_url, source_base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, index_url: Url, source_base_url: Url) -> Self {
        Self {
            http,
            index_url,
            source_base_url: as_directory(source_base_url),
        }
    }

    /// The firmware index page URL.
    pub fn index_url(&self) -> &Url {
        &self.index_url
    }

    /// The base URL companion files are served from.
    pub fn source_base_url(&self) -> &Url {
        &self.source_base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Fetch the index page and resolve the binary link marked by `marker`.
    ///
    /// Relative links are resolved against the index page URL.
    pub async fn resolve_binary_url(&self, marker: &str) -> Result<Url, Error> {
        debug!(url = %self.index_url, marker, "resolving firmware binary link");
        let page = self.fetch_text(self.index_url.clone()).await?;

        let link = find_binary_link(&page, marker).map_err(|found| match found {
            Some(line) => Error::MalformedLink {
                marker: marker.to_owned(),
                line: line.trim().to_owned(),
            },
            None => Error::MarkerNotFound {
                marker: marker.to_owned(),
                url: self.index_url.to_string(),
            },
        })?;

        let url = self.index_url.join(link)?;
        debug!(%url, "resolved firmware binary");
        Ok(url)
    }

    /// Download an arbitrary URL into memory.
    pub async fn download(&self, url: Url) -> Result<Bytes, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url.clone()).send().await?;
        let resp = check_status(resp)?;
        let body = resp.bytes().await?;
        trace!(%url, len = body.len(), "download complete");
        Ok(body)
    }

    /// Download a companion source file by name.
    pub async fn download_source_file(&self, name: &str) -> Result<Bytes, Error> {
        let url = self.source_url(name)?;
        self.download(url).await
    }

    /// Build the URL of a companion source file.
    pub fn source_url(&self, name: &str) -> Result<Url, Error> {
        Ok(self.source_base_url.join(name.trim_start_matches('/'))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn fetch_text(&self, url: Url) -> Result<String, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        let resp = check_status(resp)?;
        Ok(resp.text().await?)
    }
}

/// Scan `page` line by line for the first line containing `marker` and
/// extract the text between its first pair of double quotes.
///
/// On failure returns the offending line if one carried the marker.
pub fn find_binary_link<'a>(page: &'a str, marker: &str) -> Result<&'a str, Option<&'a str>> {
    let line = page.lines().find(|l| l.contains(marker)).ok_or(None)?;
    let mut parts = line.split('"');
    let _ = parts.next();
    match (parts.next(), parts.next()) {
        (Some(link), Some(_)) if !link.is_empty() => Ok(link),
        _ => Err(Some(line)),
    }
}

fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(Error::Status {
            status: status.as_u16(),
            url: resp.url().to_string(),
        })
    }
}

fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<html>
<li><a href="resources/firmware/esp8266-20180511-v1.9.4.bin">esp8266</a></li>
<li><a href="resources/firmware/esp32-20180511-v1.9.4.bin">esp32</a></li>
<li><a href="resources/firmware/esp32-20180101-v1.9.3.bin">esp32 old</a></li>
</html>"#;

    #[test]
    fn finds_first_marked_link() {
        let link = find_binary_link(INDEX, "firmware/esp32").expect("link");
        assert_eq!(link, "resources/firmware/esp32-20180511-v1.9.4.bin");
    }

    #[test]
    fn missing_marker_reports_no_line() {
        assert_eq!(find_binary_link(INDEX, "firmware/rp2"), Err(None));
    }

    #[test]
    fn unquoted_line_is_malformed() {
        let page = "see firmware/esp32 somewhere\n";
        assert_eq!(
            find_binary_link(page, "firmware/esp32"),
            Err(Some("see firmware/esp32 somewhere"))
        );
    }

    #[test]
    fn source_base_gets_trailing_slash() {
        let client = FirmwareClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://example.com/download").expect("url"),
            Url::parse("https://example.com/sumo/master").expect("url"),
        );
        let url = client.source_url("hal.py").expect("url");
        assert_eq!(url.as_str(), "https://example.com/sumo/master/hal.py");
    }
}
