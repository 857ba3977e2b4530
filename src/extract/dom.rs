//! DOM extraction for banks with a scrapable card listing.
//!
//! Drives the browser fetcher through a configured selector set. Field
//! lookups degrade gracefully: a missing annual fee or benefit block
//! leaves the field empty, only a missing card name drops the card.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::browser::PageFetcher;
use crate::config::DomSelectors;
use crate::models::{Benefit, CardDetail, ExtractionSource, RawCardRecord, Requirement};

use super::{CardExtractor, ExtractError};

pub struct DomCardExtractor {
    bank_name: String,
    selectors: DomSelectors,
    /// Taken on close; the browser is released exactly once.
    fetcher: Option<PageFetcher>,
}

impl DomCardExtractor {
    pub fn new(bank_name: &str, selectors: DomSelectors, fetcher: PageFetcher) -> Self {
        Self {
            bank_name: bank_name.to_string(),
            selectors,
            fetcher: Some(fetcher),
        }
    }

    /// Card id from a detail link href: the last path segment without
    /// its extension, query string and fragment.
    fn card_id_from_href(href: &str) -> Option<String> {
        let path = href.split(['?', '#']).next()?;
        let segment = path.trim_end_matches('/').rsplit('/').next()?;
        let id = segment.split('.').next()?.trim();
        if id.is_empty() {
            return None;
        }
        Some(id.to_string())
    }

    fn detail_url(&self, card_id: &str) -> String {
        self.selectors.detail_url.replace("{card_id}", card_id)
    }
}

#[async_trait]
impl CardExtractor for DomCardExtractor {
    fn bank_name(&self) -> &str {
        &self.bank_name
    }

    async fn card_list(&mut self) -> Result<Vec<RawCardRecord>, ExtractError> {
        let Some(fetcher) = self.fetcher.as_mut() else {
            return Err(ExtractError::Unavailable("browser already closed".to_string()));
        };
        let result = fetcher
            .fetch(&self.selectors.list_url, Some(&self.selectors.card_item))
            .await
            .map_err(|e| ExtractError::Transport(e.to_string()))?;
        if !result.success {
            return Err(ExtractError::Unusable(format!(
                "card listing never appeared on {}",
                self.selectors.list_url
            )));
        }

        let timeout = fetcher.wait_timeout();
        let items = fetcher.find_all(&self.selectors.card_item, timeout).await;
        let mut records = Vec::new();
        for item in &items {
            let name = match fetcher.find_in(item, &self.selectors.card_name).await {
                Some(el) => PageFetcher::text(&el).await,
                None => String::new(),
            };
            if name.is_empty() {
                debug!("{}: card entry without a name, skipped", self.bank_name);
                continue;
            }

            let mut record = RawCardRecord::new(&self.bank_name, &name, ExtractionSource::Dom);
            if let Some(el) = fetcher.find_in(item, &self.selectors.card_type).await {
                let card_type = PageFetcher::text(&el).await;
                if !card_type.is_empty() {
                    record.card_type = Some(card_type);
                }
            }
            if let Some(link) = fetcher.find_in(item, &self.selectors.detail_link).await {
                let href = PageFetcher::attr(&link, "href").await;
                record.card_id = Self::card_id_from_href(&href);
            }
            records.push(record);
        }
        Ok(records)
    }

    async fn card_detail(&mut self, card_id: &str) -> Result<Option<CardDetail>, ExtractError> {
        let url = self.detail_url(card_id);
        let Some(fetcher) = self.fetcher.as_mut() else {
            return Err(ExtractError::Unavailable("browser already closed".to_string()));
        };
        let result = fetcher
            .fetch(&url, Some(&self.selectors.detail_root))
            .await
            .map_err(|e| ExtractError::Transport(e.to_string()))?;
        if !result.success {
            warn!("{}: detail content never appeared on {}", self.bank_name, url);
            return Ok(None);
        }

        let timeout = fetcher.wait_timeout();
        let Some(root) = fetcher.find(&self.selectors.detail_root, timeout).await else {
            return Ok(None);
        };

        let mut detail = CardDetail::default();
        if let Some(el) = fetcher.find_in(&root, &self.selectors.annual_fee).await {
            let fee = PageFetcher::text(&el).await;
            if !fee.is_empty() {
                detail.annual_fee = Some(fee);
            }
        }

        for item in fetcher.find_all_in(&root, &self.selectors.benefit_item).await {
            let title = match fetcher.find_in(&item, &self.selectors.benefit_title).await {
                Some(el) => PageFetcher::text(&el).await,
                None => String::new(),
            };
            let description = match fetcher.find_in(&item, &self.selectors.benefit_desc).await {
                Some(el) => PageFetcher::text(&el).await,
                None => String::new(),
            };
            if !title.is_empty() || !description.is_empty() {
                detail.benefits.push(Benefit::new(title, description));
            }
        }

        for item in fetcher
            .find_all_in(&root, &self.selectors.requirement_item)
            .await
        {
            let title = match fetcher
                .find_in(&item, &self.selectors.requirement_title)
                .await
            {
                Some(el) => PageFetcher::text(&el).await,
                None => String::new(),
            };
            let content = match fetcher
                .find_in(&item, &self.selectors.requirement_content)
                .await
            {
                Some(el) => PageFetcher::text(&el).await,
                None => String::new(),
            };
            if !title.is_empty() || !content.is_empty() {
                detail.requirements.push(Requirement::new(title, content));
            }
        }

        Ok(Some(detail))
    }

    async fn close(&mut self) {
        if let Some(fetcher) = self.fetcher.take() {
            fetcher.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_id_from_plain_href() {
        assert_eq!(
            DomCardExtractor::card_id_from_href("/ICBC/cards/aurum.htm").as_deref(),
            Some("aurum")
        );
    }

    #[test]
    fn card_id_strips_query_and_fragment() {
        assert_eq!(
            DomCardExtractor::card_id_from_href("/cards/gold.html?from=list#top").as_deref(),
            Some("gold")
        );
    }

    #[test]
    fn card_id_handles_trailing_slash_and_empty() {
        assert_eq!(
            DomCardExtractor::card_id_from_href("/cards/gold/").as_deref(),
            Some("gold")
        );
        assert_eq!(DomCardExtractor::card_id_from_href(""), None);
    }
}
