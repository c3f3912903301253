//! XML utility functions for navigating roxmltree documents.

use roxmltree::Node;

/// Find the first child element with the given tag name.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use lj_exporter::xml::find_child;
///
/// let xml = r#"<root><child1/><child2/></root>"#;
/// let doc = Document::parse(xml).unwrap();
/// let root = doc.root_element();
///
/// assert!(find_child(root, "child1").is_some());
/// assert!(find_child(root, "missing").is_none());
/// ```
pub fn find_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.has_tag_name(tag))
}

/// Find all child elements with the given tag name.
pub fn find_children<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.has_tag_name(tag))
}

/// Get the full text content of an element, concatenating plain text and
/// CDATA sections. HTML markup stored inside CDATA comes back verbatim.
#[must_use]
pub fn element_text(node: Node<'_, '_>) -> String {
    let mut text = String::new();
    for child in node.children() {
        if child.is_text() {
            if let Some(part) = child.text() {
                text.push_str(part);
            }
        }
    }
    text
}

/// Get the text content of a named child element.
///
/// Returns `None` when the child is absent; a present-but-empty child yields
/// `Some("")`, so callers can tell "missing" apart from "empty".
#[must_use]
pub fn child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    find_child(node, tag).map(element_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn test_find_child() {
        let xml = r#"<root><a/><b/><c/></root>"#;
        let doc = Document::parse(xml).unwrap();
        let root = doc.root_element();

        assert!(find_child(root, "a").is_some());
        assert!(find_child(root, "d").is_none());
    }

    #[test]
    fn test_find_children() {
        let xml = r#"<root><item>1</item><other/><item>2</item></root>"#;
        let doc = Document::parse(xml).unwrap();
        let items: Vec<_> = find_children(doc.root_element(), "item").collect();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_element_text_plain() {
        let xml = r#"<subject>Hello world</subject>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(element_text(doc.root_element()), "Hello world");
    }

    #[test]
    fn test_element_text_cdata_preserves_html() {
        let xml = r#"<event><![CDATA[<p>This is <b>bold</b>.</p>]]></event>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(element_text(doc.root_element()), "<p>This is <b>bold</b>.</p>");
    }

    #[test]
    fn test_element_text_mixed() {
        let xml = r#"<event>before <![CDATA[<i>inner</i>]]> after</event>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(element_text(doc.root_element()), "before <i>inner</i> after");
    }

    #[test]
    fn test_child_text_missing_vs_empty() {
        let xml = r#"<entry><subject></subject></entry>"#;
        let doc = Document::parse(xml).unwrap();
        let entry = doc.root_element();

        assert_eq!(child_text(entry, "subject"), Some(String::new()));
        assert_eq!(child_text(entry, "mood"), None);
    }
}
