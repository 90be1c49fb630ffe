use scraper::Html;

/// Reduces an HTML description to its text, entities decoded and
/// whitespace collapsed.
pub fn clean_description_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds a site search string: include terms as-is, exclude terms prefixed
/// with `-`. Multi-word terms are quoted.
pub fn search_string_from_terms(include_terms: &[String], exclude_terms: &[String]) -> String {
    let quote = |term: &str| {
        if term.chars().any(char::is_whitespace) {
            format!("\"{}\"", term)
        } else {
            term.to_string()
        }
    };

    include_terms
        .iter()
        .map(|term| quote(term))
        .chain(exclude_terms.iter().map(|term| format!("-{}", quote(term))))
        .collect::<Vec<_>>()
        .join(" ")
}
