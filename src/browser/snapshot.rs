//! Rendered-page snapshots
//!
//! Backends hand the crawler the page as HTML. This module turns that HTML into
//! owned [`HtmlElement`] handles so items can be read after the underlying
//! document is gone, and so handles can cross `.await` points.

use crate::browser::{BrowseError, ElementHandle};
use scraper::{ElementRef, Html, Selector};

/// Owned handle to one element of a rendered snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlElement {
    text: String,
    attributes: Vec<(String, String)>,
    inner_html: String,
}

impl HtmlElement {
    fn from_element(element: ElementRef<'_>) -> Self {
        Self {
            text: element.text().collect::<String>().trim().to_string(),
            attributes: element
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            inner_html: element.inner_html(),
        }
    }

    /// Builds a handle from an HTML fragment whose first element is the item
    ///
    /// Returns `None` if the fragment contains no element.
    pub fn parse(fragment: &str) -> Option<Self> {
        let html = Html::parse_fragment(fragment);
        let root = html.root_element();
        root.children()
            .find_map(ElementRef::wrap)
            .map(HtmlElement::from_element)
    }
}

impl ElementHandle for HtmlElement {
    fn text(&self) -> Result<String, BrowseError> {
        Ok(self.text.clone())
    }

    fn attribute(&self, name: &str) -> Result<Option<String>, BrowseError> {
        Ok(self
            .attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.clone()))
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Self>, BrowseError> {
        let selector = parse_selector(selector)?;
        let fragment = Html::parse_fragment(&self.inner_html);
        Ok(fragment
            .select(&selector)
            .map(HtmlElement::from_element)
            .collect())
    }
}

/// Selects every element matching `selector` from a full HTML document
///
/// # Example
///
/// ```
/// use tagpulse::browser::select_all;
/// use tagpulse::ElementHandle;
///
/// let html = r#"<html><body><article><div lang="en">hello</div></article></body></html>"#;
/// let items = select_all(html, "article").unwrap();
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].text().unwrap(), "hello");
/// ```
pub fn select_all(html: &str, selector: &str) -> Result<Vec<HtmlElement>, BrowseError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(HtmlElement::from_element)
        .collect())
}

fn parse_selector(selector: &str) -> Result<Selector, BrowseError> {
    Selector::parse(selector).map_err(|e| BrowseError::Selector(format!("{}: {:?}", selector, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <article data-id="1">
                <div dir="ltr"><span>alice</span></div>
                <div lang="en">  first post #rust  </div>
                <time datetime="2024-05-01T10:00:00Z">May 1</time>
            </article>
            <article data-id="2">
                <div lang="en">second</div>
            </article>
        </body></html>
    "#;

    #[test]
    fn test_select_all_in_document_order() {
        let items = select_all(PAGE, "article").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].attribute("data-id").unwrap().as_deref(), Some("1"));
        assert_eq!(items[1].attribute("data-id").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_text_is_trimmed() {
        let items = select_all(PAGE, "article").unwrap();
        let body = items[0].query("div[lang]").unwrap().unwrap();
        assert_eq!(body.text().unwrap(), "first post #rust");
    }

    #[test]
    fn test_nested_query() {
        let items = select_all(PAGE, "article").unwrap();
        let author = items[0].query(r#"div[dir="ltr"] span"#).unwrap().unwrap();
        assert_eq!(author.text().unwrap(), "alice");

        let time = items[0].query("time").unwrap().unwrap();
        assert_eq!(
            time.attribute("datetime").unwrap().as_deref(),
            Some("2024-05-01T10:00:00Z")
        );
    }

    #[test]
    fn test_missing_descendant_is_none() {
        let items = select_all(PAGE, "article").unwrap();
        assert!(items[1].query("time").unwrap().is_none());
        assert!(items[1].attribute("missing").unwrap().is_none());
    }

    #[test]
    fn test_invalid_selector_is_error() {
        assert!(matches!(
            select_all(PAGE, "div[[["),
            Err(BrowseError::Selector(_))
        ));
    }

    #[test]
    fn test_parse_fragment_element() {
        let element = HtmlElement::parse(r#"<article id="x"><div lang="en">hi</div></article>"#)
            .unwrap();
        assert_eq!(element.attribute("id").unwrap().as_deref(), Some("x"));
        assert_eq!(element.text().unwrap(), "hi");
        assert!(HtmlElement::parse("just text").is_none());
    }

    #[test]
    fn test_empty_document_has_no_items() {
        let items = select_all("<html><body></body></html>", "article").unwrap();
        assert!(items.is_empty());
    }
}
