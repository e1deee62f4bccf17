//! Federal Register API client.
//!
//! Notice records come from `/documents.json` filtered by CFR title and
//! part; the full text is a separate XML download per document.

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::SyncError;

pub const DEFAULT_BASE_URL: &str = "https://www.federalregister.gov/api/v1";

/// Fields requested for each document.
pub const FIELDS: [&str; 17] = [
    "abstract",
    "action",
    "agency_names",
    "cfr_references",
    "citation",
    "comments_close_on",
    "dates",
    "docket_ids",
    "document_number",
    "effective_on",
    "end_page",
    "full_text_xml_url",
    "html_url",
    "publication_date",
    "regulation_id_numbers",
    "start_page",
    "volume",
];

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next_page_url: Option<String>,
}

pub struct FederalRegisterClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for FederalRegisterClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.to_string())
    }
}

impl FederalRegisterClient {
    /// `base_url` is the API root, e.g. `https://www.federalregister.gov/api/v1`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Search URL for final rules touching one CFR part, oldest first.
    pub fn documents_url(&self, cfr_title: u32, cfr_part: &str) -> Result<Url, SyncError> {
        let title = cfr_title.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("conditions[cfr][title]", title.as_str()),
            ("conditions[cfr][part]", cfr_part),
            ("conditions[type][]", "RULE"),
            ("order", "oldest"),
            ("per_page", "1000"),
        ];
        params.extend(FIELDS.iter().map(|f| ("fields[]", *f)));
        Url::parse_with_params(&format!("{}/documents.json", self.base_url), &params)
            .map_err(|e| SyncError::Url(e.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, SyncError> {
        debug!(url = %url, "GET");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Every final rule for a CFR part, following pagination.
    pub async fn fetch_notices(
        &self,
        cfr_title: u32,
        cfr_part: &str,
    ) -> Result<Vec<Value>, SyncError> {
        let mut url = Some(self.documents_url(cfr_title, cfr_part)?);
        let mut records = Vec::new();
        while let Some(next) = url.take() {
            let page: Page = self.get_json(next).await?;
            records.extend(page.results);
            url = page
                .next_page_url
                .map(|u| Url::parse(&u).map_err(|e| SyncError::Url(e.to_string())))
                .transpose()?;
        }
        info!(cfr_title, cfr_part, count = records.len(), "fetched notices");
        Ok(records)
    }

    /// One document's record.
    pub async fn fetch_notice(&self, document_number: &str) -> Result<Value, SyncError> {
        let params: Vec<(&str, &str)> = FIELDS.iter().map(|f| ("fields[]", *f)).collect();
        let url = Url::parse_with_params(
            &format!("{}/documents/{document_number}.json", self.base_url),
            &params,
        )
        .map_err(|e| SyncError::Url(e.to_string()))?;
        match self.get_json(url).await {
            Err(SyncError::Server { status: 404, .. }) => {
                Err(SyncError::MissingNotice(document_number.to_string()))
            }
            other => other,
        }
    }

    /// Full-text XML of a notice.
    pub async fn fetch_xml(&self, url: &str) -> Result<String, SyncError> {
        debug!(url = %url, "GET xml");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.text().await?)
    }

    /// Whether a HEAD request for `url` succeeds. Network failures count
    /// as absent.
    pub async fn head_ok(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "HEAD failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve canned responses, one per connection, in order. `{base}` in a
    /// body is replaced with the server's own address.
    async fn serve(responses: Vec<(u16, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let own = base.clone();
        tokio::spawn(async move {
            for (status, body) in responses {
                let body = body.replace("{base}", &own);
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf[read..]).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    read += n;
                }
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        base
    }

    #[test]
    fn search_url_carries_cfr_conditions() {
        let client = FederalRegisterClient::new("https://fr.example/api/v1/".into());
        let url = client.documents_url(12, "1005").unwrap();
        assert_eq!(url.path(), "/api/v1/documents.json");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("conditions[cfr][title]".into(), "12".into())));
        assert!(pairs.contains(&("conditions[cfr][part]".into(), "1005".into())));
        assert!(pairs.contains(&("conditions[type][]".into(), "RULE".into())));
        assert_eq!(pairs.iter().filter(|(k, _)| k == "fields[]").count(), FIELDS.len());
    }

    #[tokio::test]
    async fn follows_next_page() {
        let first = r#"{"results": [{"document_number": "2024-00001"}], "next_page_url": "{base}/documents.json?page=2"}"#;
        let second = r#"{"results": [{"document_number": "2024-00002"}]}"#;
        let base = serve(vec![(200, first.into()), (200, second.into())]).await;
        let client = FederalRegisterClient::new(base);

        let records = client.fetch_notices(12, "1005").await.unwrap();
        let docs: Vec<&str> = records
            .iter()
            .filter_map(|r| r["document_number"].as_str())
            .collect();
        assert_eq!(docs, vec!["2024-00001", "2024-00002"]);
    }

    #[tokio::test]
    async fn missing_notice_and_server_errors() {
        let base = serve(vec![(404, "{}".into()), (500, "boom".into())]).await;
        let client = FederalRegisterClient::new(base);
        assert!(matches!(
            client.fetch_notice("2024-99999").await,
            Err(SyncError::MissingNotice(doc)) if doc == "2024-99999"
        ));
        assert!(matches!(
            client.fetch_xml(&format!("{}/x.xml", client.base_url)).await,
            Err(SyncError::Server { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn fetches_xml_and_probes() {
        let base = serve(vec![(200, "<RULE/>".into()), (404, String::new())]).await;
        let client = FederalRegisterClient::new(base.clone());
        assert_eq!(client.fetch_xml(&format!("{base}/doc.xml")).await.unwrap(), "<RULE/>");
        assert!(!client.head_ok(&format!("{base}/thumb.gif")).await);
    }
}
