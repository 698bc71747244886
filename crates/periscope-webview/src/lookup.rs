//! Element lookup by id, class, tag or visible text.

use periscope_common::SelectorKind;
use periscope_dom::{Document, NodeId, NodeKind};

/// The element a selector resolved to, for one handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub node: NodeId,
    /// How many elements matched; only the first is used.
    pub match_count: usize,
    pub diagnostic: String,
}

/// Resolve a selector to exactly one element.
///
/// `Err` carries the human-readable not-found diagnostic.
pub fn locate(doc: &Document, kind: SelectorKind, value: &str) -> Result<Located, String> {
    match kind {
        SelectorKind::Id => doc
            .get_element_by_id(value)
            .map(|node| Located {
                node,
                match_count: 1,
                diagnostic: format!("found element with id '{value}'"),
            })
            .ok_or_else(|| format!("no element found with id '{value}'")),
        SelectorKind::Class => first_of(doc.get_elements_by_class_name(value), "class", value),
        SelectorKind::Tag => first_of(doc.get_elements_by_tag_name(value), "tag", value),
        SelectorKind::Text => by_text(doc, value),
    }
}

fn first_of(matches: Vec<NodeId>, what: &str, value: &str) -> Result<Located, String> {
    let Some(&node) = matches.first() else {
        return Err(format!("no elements found with {what} '{value}' (0 matches)"));
    };
    let diagnostic = if matches.len() > 1 {
        format!(
            "found {} elements with {what} '{value}', using the first",
            matches.len()
        )
    } else {
        format!("found 1 element with {what} '{value}'")
    };
    Ok(Located {
        node,
        match_count: matches.len(),
        diagnostic,
    })
}

/// Strings an element is matched against by `text` selectors: its own
/// trimmed text, then its placeholder, title and aria-label.
fn text_keys(doc: &Document, node: NodeId) -> Vec<String> {
    let mut keys = vec![own_text(doc, node)];
    for attr in ["placeholder", "title", "aria-label"] {
        if let Some(v) = doc.attribute(node, attr) {
            keys.push(v.trim().to_string());
        }
    }
    keys
}

/// Text carried by the element's direct text children. Ancestors that only
/// contain text through descendants do not match.
fn own_text(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    for child in doc.children(node) {
        if let NodeKind::Text(t) = doc.kind(*child) {
            out.push_str(t);
        }
    }
    out.trim().to_string()
}

/// Exact match on any text key, or on the element's whole trimmed text
/// content including descendants.
fn exact_match(doc: &Document, node: NodeId, query: &str) -> bool {
    text_keys(doc, node).iter().any(|k| k == query) || doc.text_content(node).trim() == query
}

/// The deepest element under `node` that still matches exactly. Ancestors
/// share their descendants' text content; the innermost one is the target.
fn innermost_exact(doc: &Document, mut node: NodeId, query: &str) -> NodeId {
    while let Some(child) = doc
        .children(node)
        .iter()
        .copied()
        .find(|c| doc.tag_name(*c).is_some() && exact_match(doc, *c, query))
    {
        node = child;
    }
    node
}

fn searchable(doc: &Document) -> Vec<NodeId> {
    doc.all_elements()
        .into_iter()
        .filter(|n| !matches!(doc.tag_name(*n), Some("script" | "style" | "head")))
        .collect()
}

fn by_text(doc: &Document, query: &str) -> Result<Located, String> {
    let candidates = searchable(doc);

    let exact = candidates
        .iter()
        .copied()
        .find(|n| exact_match(doc, *n, query))
        .map(|n| innermost_exact(doc, n, query));
    if let Some(node) = exact {
        return Ok(Located {
            node,
            match_count: 1,
            diagnostic: format!("found element with exact text '{query}'"),
        });
    }

    let partial = candidates
        .iter()
        .copied()
        .find(|n| text_keys(doc, *n).iter().any(|k| !k.is_empty() && k.contains(query)));
    if let Some(node) = partial {
        return Ok(Located {
            node,
            match_count: 1,
            diagnostic: format!("found element containing text '{query}'"),
        });
    }

    Err(text_not_found(doc, &candidates, query))
}

fn text_not_found(doc: &Document, candidates: &[NodeId], query: &str) -> String {
    let needle = query.to_lowercase();
    let words: Vec<&str> = needle.split_whitespace().collect();
    let overlapping = candidates
        .iter()
        .filter(|n| {
            let text = own_text(doc, **n).to_lowercase();
            !text.is_empty() && words.iter().any(|w| text.contains(w))
        })
        .count();
    let placeholders: Vec<String> = candidates
        .iter()
        .filter_map(|n| doc.attribute(*n, "placeholder"))
        .filter(|p| {
            let p = p.to_lowercase();
            p.contains(&needle) || (!p.is_empty() && needle.contains(&p))
                || words.iter().any(|w| p.contains(w))
        })
        .map(|p| format!("'{p}'"))
        .collect();

    let mut msg = format!("no element found with text '{query}'");
    msg.push_str(&format!(
        "; {overlapping} element(s) with partially overlapping text"
    ));
    if !placeholders.is_empty() {
        msg.push_str(&format!("; similar placeholders: {}", placeholders.join(", ")));
    }
    msg
}
