use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{AcquireError, Result};
use crate::http::{Fetched, HttpSettings, RateLimitedClient};
use crate::identifier::{Doi, Identifier, IdentifierKind};
use crate::sources::DocumentFetcher;

const KNOWN_MIRRORS: &[&str] = &[
    "https://sci-hub.se",
    "https://sci-hub.st",
    "https://sci-hub.ru",
    "https://sci-hub.ren",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SciHubPage {
    pub pdf_url: Option<String>,
    pub title: Option<String>,
}

pub struct SciHubFetcher {
    client: RateLimitedClient,
    working_mirror: Arc<RwLock<Option<String>>>,
    mirrors: Vec<String>,
}

impl SciHubFetcher {
    pub fn new(settings: &HttpSettings, mirrors: Vec<String>) -> Result<Self> {
        let mirrors = if mirrors.is_empty() {
            KNOWN_MIRRORS.iter().map(|m| (*m).to_string()).collect()
        } else {
            mirrors
        };
        Ok(Self {
            client: RateLimitedClient::new(settings)?,
            working_mirror: Arc::new(RwLock::new(None)),
            mirrors,
        })
    }

    pub fn from_config(config: &refharvest_core::AcquisitionConfig) -> Result<Self> {
        Self::new(&HttpSettings::from_config(config), config.mirrors.clone())
    }

    pub fn parse_scihub_page(&self, html: &str, mirror: &str) -> Result<SciHubPage> {
        let iframe_selector = parse_selector("iframe#pdf, iframe[src*='.pdf']")?;
        let embed_selector = parse_selector("embed[type='application/pdf'], embed[src*='.pdf']")?;
        let button_selector = parse_selector("button[onclick*='.pdf']")?;
        let citation_selector = parse_selector("#citation, #title, h1, title")?;

        let document = Html::parse_document(html);

        let pdf_url = document
            .select(&iframe_selector)
            .next()
            .and_then(|el| el.value().attr("src"))
            .or_else(|| {
                document
                    .select(&embed_selector)
                    .next()
                    .and_then(|el| el.value().attr("src"))
            })
            .or_else(|| {
                document
                    .select(&button_selector)
                    .next()
                    .and_then(|el| el.value().attr("onclick"))
                    .and_then(url_from_onclick)
            })
            .map(|src| normalize_scihub_url(src, mirror));

        let title = document
            .select(&citation_selector)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|s| !s.is_empty());

        Ok(SciHubPage { pdf_url, title })
    }

    async fn mirror_order(&self) -> Vec<String> {
        let active = self.working_mirror.read().await.clone();
        let mut order = Vec::new();
        if let Some(active) = active {
            order.push(active);
        }
        for mirror in &self.mirrors {
            if !order.contains(mirror) {
                order.push(mirror.clone());
            }
        }
        order
    }

    /// Ask each mirror in turn, remembering the first one that answers.
    async fn lookup(&self, identifier: &Identifier) -> Result<(Fetched, String)> {
        let doi = match identifier.kind {
            IdentifierKind::Doi => Some(Doi::parse(&identifier.value)?),
            IdentifierKind::Title => None,
        };

        let mut last_error: Option<AcquireError> = None;
        for mirror in self.mirror_order().await {
            let base = mirror.trim_end_matches('/');
            let response = match &doi {
                Some(doi) => self.client.get(&format!("{base}/{}", doi.normalized)).await,
                None => {
                    self.client
                        .post_form(&format!("{base}/"), &[("request", identifier.value.as_str())])
                        .await
                }
            };
            match response {
                Ok(fetched) => {
                    *self.working_mirror.write().await = Some(mirror.clone());
                    return Ok((fetched, mirror));
                }
                Err(err) => {
                    debug!("scihub mirror {mirror} failed for {identifier}: {err}");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AcquireError::NoMirror("scihub".to_string())))
    }
}

#[async_trait]
impl DocumentFetcher for SciHubFetcher {
    fn name(&self) -> &str {
        "scihub"
    }

    async fn fetch_document(&self, identifier: &Identifier, destination: &Path) -> Result<()> {
        let (fetched, mirror) = self.lookup(identifier).await?;

        let document = if fetched.is_pdf() {
            fetched
        } else {
            let page = self.parse_scihub_page(&fetched.text(), &mirror)?;
            let pdf_url = page
                .pdf_url
                .ok_or_else(|| AcquireError::DocumentNotFound(identifier.to_string()))?;
            let download = self.client.get(&pdf_url).await?;
            if !download.is_pdf() {
                warn!("scihub returned a non-PDF body for {identifier}");
                return Err(AcquireError::DocumentNotFound(identifier.to_string()));
            }
            download
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &document.bytes).await?;
        Ok(())
    }
}

fn parse_selector(input: &str) -> Result<Selector> {
    Selector::parse(input)
        .map_err(|e| AcquireError::Parse(format!("invalid selector {input}: {e}")))
}

/// `location.href='//host/file.pdf?download=true'` -> `//host/file.pdf?download=true`
fn url_from_onclick(onclick: &str) -> Option<&str> {
    let start = onclick.find(['\'', '"'])? + 1;
    let rest = &onclick[start..];
    let end = rest.find(['\'', '"'])?;
    Some(&rest[..end])
}

fn normalize_scihub_url(src: &str, mirror: &str) -> String {
    let src = src.split('#').next().unwrap_or(src);
    if src.starts_with("//") {
        return format!("https:{src}");
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return src.to_string();
    }
    if src.starts_with('/') {
        return format!("{}{}", mirror.trim_end_matches('/'), src);
    }
    format!("{}/{}", mirror.trim_end_matches('/'), src)
}

fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
