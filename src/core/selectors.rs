use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Ordered list of CSS selectors, tried one after the other until one matches.
///
/// Pages of the analytics site change without notice, so every lookup goes
/// through a chain of known layouts instead of a single selector.
pub struct SelectorChain {
    selectors: Vec<(&'static str, Selector)>,
}

impl SelectorChain {
    pub fn new(patterns: &[&'static str]) -> Self {
        let selectors = patterns
            .iter()
            .filter_map(|pattern| match Selector::parse(pattern) {
                Ok(selector) => Some((*pattern, selector)),
                Err(e) => {
                    warn!("Ignoring invalid selector '{pattern}': {e:?}");
                    None
                }
            })
            .collect();
        SelectorChain { selectors }
    }

    /// All elements matched by the first selector matching anything in the document.
    pub fn select_in_document<'a>(&self, document: &'a Html) -> Option<Vec<ElementRef<'a>>> {
        self.select_all(document.root_element())
    }

    /// All descendants matched by the first selector matching anything under `element`.
    pub fn select_all<'a>(&self, element: ElementRef<'a>) -> Option<Vec<ElementRef<'a>>> {
        self.find_map_all(element, Some)
    }

    /// First `Some` produced by `extract` on all the matches of each selector, in order.
    /// Selectors matching nothing are skipped.
    pub fn find_map_all<'a, T>(
        &self,
        element: ElementRef<'a>,
        mut extract: impl FnMut(Vec<ElementRef<'a>>) -> Option<T>,
    ) -> Option<T> {
        self.selectors.iter().find_map(|(pattern, selector)| {
            let matched = element.select(selector).collect::<Vec<ElementRef<'a>>>();
            match matched.is_empty() {
                true => None,
                false => {
                    debug!("Found {} elements using selector: {pattern}", matched.len());
                    extract(matched)
                }
            }
        })
    }

    /// First `Some` produced by `extract` on the first match of each selector, in order.
    pub fn find_map<'a, T>(
        &self,
        element: ElementRef<'a>,
        mut extract: impl FnMut(ElementRef<'a>) -> Option<T>,
    ) -> Option<T> {
        self.selectors
            .iter()
            .filter_map(|(_, selector)| element.select(selector).next())
            .find_map(|matched| extract(matched))
    }

    /// First non-empty trimmed text.
    pub fn first_text(&self, element: ElementRef<'_>) -> Option<String> {
        self.find_map(element, |matched| Some(text_of(matched)).filter(|t| !t.is_empty()))
    }

    /// True if any selector matches under `element`.
    pub fn matches_any(&self, element: ElementRef<'_>) -> bool {
        self.find_map(element, |_| Some(())).is_some()
    }
}

/// Text content of an element and all its descendants, trimmed.
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <div class="b">first b</div>
            <div class="b">second b</div>
            <div class="c">   </div>
            <div class="d"> d <span>text</span> </div>
        </body></html>"#;

    #[test]
    fn first_matching_selector_wins() {
        let document = Html::parse_document(PAGE);
        let chain = SelectorChain::new(&[".a", ".b", ".d"]);

        let matched = chain.select_in_document(&document).unwrap();
        assert_eq!(matched.len(), 2);
        assert_eq!(text_of(matched[1]), "second b");
    }

    #[test]
    fn nothing_matches() {
        let document = Html::parse_document(PAGE);
        let chain = SelectorChain::new(&[".x", ".y"]);
        assert!(chain.select_in_document(&document).is_none());
        assert!(!chain.matches_any(document.root_element()));
    }

    #[test]
    fn first_text_skips_blank_elements() {
        let document = Html::parse_document(PAGE);
        let chain = SelectorChain::new(&[".c", ".d"]);
        assert_eq!(
            chain.first_text(document.root_element()),
            Some("d text".to_string())
        );
    }

    #[test]
    fn find_map_all_moves_on_when_extraction_fails() {
        let document = Html::parse_document(PAGE);
        let chain = SelectorChain::new(&[".c", ".b"]);

        let texts = chain.find_map_all(document.root_element(), |matched| {
            let texts = matched
                .into_iter()
                .map(text_of)
                .filter(|text| !text.is_empty())
                .collect::<Vec<String>>();
            (!texts.is_empty()).then_some(texts)
        });

        assert_eq!(texts, Some(vec!["first b".to_string(), "second b".to_string()]));
    }

    #[test]
    fn invalid_selectors_are_skipped() {
        let document = Html::parse_document(PAGE);
        let chain = SelectorChain::new(&["[[nope", ".b"]);
        assert_eq!(
            chain.first_text(document.root_element()),
            Some("first b".to_string())
        );
    }
}
