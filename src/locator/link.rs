//! Keyword-based credit-card link discovery on a bank homepage.
//!
//! Works on the rendered HTML rather than the live DOM so the lookup
//! strategies stay deterministic and testable. Strategies run in a
//! fixed priority order per keyword; the first visible hit wins.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Find a credit-card link for any of the keywords, resolved to an
/// absolute URL against the bank's base URL.
pub fn discover_card_link(html: &str, keywords: &[String], base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for keyword in keywords {
        if let Some(href) = find_link_for_keyword(&document, keyword) {
            if let Some(resolved) = resolve_href(base_url, &href) {
                return Some(resolved);
            }
        }
    }
    None
}

/// One keyword, all lookup strategies in priority order: anchor text,
/// anchor title attribute, text-node ancestor, image alt ancestor,
/// href substring.
fn find_link_for_keyword(document: &Html, keyword: &str) -> Option<String> {
    let anchors = Selector::parse("a").unwrap();
    let text_nodes = Selector::parse("div, span").unwrap();
    let images = Selector::parse("img").unwrap();

    // Anchor text containment.
    for anchor in document.select(&anchors) {
        if !is_displayed(anchor) {
            continue;
        }
        let text: String = anchor.text().collect();
        if text.contains(keyword) {
            if let Some(href) = usable_href(anchor) {
                return Some(href);
            }
        }
    }

    // Anchor title attribute.
    for anchor in document.select(&anchors) {
        if !is_displayed(anchor) {
            continue;
        }
        if anchor.value().attr("title").is_some_and(|t| t.contains(keyword)) {
            if let Some(href) = usable_href(anchor) {
                return Some(href);
            }
        }
    }

    // A div/span whose own text matches, wrapped somewhere in an anchor.
    for element in document.select(&text_nodes) {
        let own_text: String = element
            .children()
            .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
            .collect();
        if !own_text.contains(keyword) {
            continue;
        }
        if let Some(anchor) = ancestor_anchor(element) {
            if is_displayed(anchor) {
                if let Some(href) = usable_href(anchor) {
                    return Some(href);
                }
            }
        }
    }

    // An image whose alt text matches, wrapped in an anchor.
    for image in document.select(&images) {
        if !image.value().attr("alt").is_some_and(|a| a.contains(keyword)) {
            continue;
        }
        if let Some(anchor) = ancestor_anchor(image) {
            if is_displayed(anchor) {
                if let Some(href) = usable_href(anchor) {
                    return Some(href);
                }
            }
        }
    }

    // Href substring.
    for anchor in document.select(&anchors) {
        if !is_displayed(anchor) {
            continue;
        }
        if anchor.value().attr("href").is_some_and(|h| h.contains(keyword)) {
            if let Some(href) = usable_href(anchor) {
                return Some(href);
            }
        }
    }

    None
}

fn ancestor_anchor(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
}

/// Visibility approximation over static HTML: an element hidden by an
/// inline style, or inside one, is not a usable link.
fn is_displayed(element: ElementRef<'_>) -> bool {
    let mut current = Some(element);
    while let Some(el) = current {
        if let Some(style) = el.value().attr("style") {
            let style = style.replace(' ', "").to_lowercase();
            if style.contains("display:none") || style.contains("visibility:hidden") {
                return false;
            }
        }
        current = el.parent().and_then(ElementRef::wrap);
    }
    true
}

fn usable_href(anchor: ElementRef<'_>) -> Option<String> {
    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    Some(href.to_string())
}

/// Resolve a possibly-relative href against the bank's base URL.
pub fn resolve_href(base_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = Url::parse(base_url).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn anchor_text_match_wins() {
        let html = r#"<html><body>
            <a href="/other/信用卡-promo">promo</a>
            <a href="/cards/">信用卡中心</a>
        </body></html>"#;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(link.as_deref(), Some("https://bank.example/cards/"));
    }

    #[test]
    fn relative_href_resolves_against_base() {
        let html = r#"<a href="/cards/x">信用卡</a>"#;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(link.as_deref(), Some("https://bank.example/cards/x"));
    }

    #[test]
    fn absolute_href_is_kept() {
        let html = r#"<a href="https://creditcard.bank.example/">信用卡</a>"#;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(link.as_deref(), Some("https://creditcard.bank.example/"));
    }

    #[test]
    fn hidden_anchor_is_skipped() {
        let html = r#"<html><body>
            <a href="/hidden" style="display: none">信用卡</a>
            <a href="/visible">信用卡</a>
        </body></html>"#;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(link.as_deref(), Some("https://bank.example/visible"));
    }

    #[test]
    fn anchor_inside_hidden_container_is_skipped() {
        let html = r#"<html><body>
            <div style="display:none"><a href="/hidden">信用卡</a></div>
            <a href="/visible">信用卡</a>
        </body></html>"#;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(link.as_deref(), Some("https://bank.example/visible"));
    }

    #[test]
    fn title_attribute_match() {
        let html = r#"<a href="/cards/" title="信用卡中心">cards</a>"#;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(link.as_deref(), Some("https://bank.example/cards/"));
    }

    #[test]
    fn text_node_ancestor_match() {
        let html = r#"<a href="/cards/"><div><span>信用卡</span></div></a>"#;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(link.as_deref(), Some("https://bank.example/cards/"));
    }

    #[test]
    fn image_alt_ancestor_match() {
        let html = r#"<a href="/cards/"><img src="/c.png" alt="信用卡产品"></a>"#;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(link.as_deref(), Some("https://bank.example/cards/"));
    }

    #[test]
    fn href_substring_is_last_resort() {
        let html = r#"<a href="/xyk/信用卡/">apply here</a>"#;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(
            link.as_deref(),
            Some("https://bank.example/xyk/%E4%BF%A1%E7%94%A8%E5%8D%A1/")
        );
    }

    #[test]
    fn javascript_and_fragment_hrefs_are_unusable() {
        let html = r##"<html><body>
            <a href="javascript:void(0)">信用卡</a>
            <a href="#">信用卡</a>
        </body></html>"##;
        let link = discover_card_link(html, &keywords(&["信用卡"]), "https://bank.example/");
        assert_eq!(link, None);
    }
}
