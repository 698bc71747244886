//! Simulated typing into editable elements.
//!
//! The typing strategy is chosen by probing the target once:
//! - native `<input>` / `<textarea>`: per-key value updates
//! - plain `contentEditable`: text nodes inserted at the selection
//! - rich-text frameworks that keep their own model: `beforeinput` plus the
//!   `insertText` editing command
//!
//! Any failure along the way falls back to assigning the text directly.

use std::time::Duration;

use periscope_dom::{Document, DomEvent, NodeId};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// Editing capability of a target element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditorKind {
    NativeInput,
    GenericEditable,
    /// Lexical: the editor root carries `data-lexical-editor`.
    Lexical,
    /// Draft.js: the editor root wraps a `[data-contents]` element.
    Draft,
    /// Not editable; only the direct-assignment fallback applies.
    Other,
}

impl EditorKind {
    pub fn detect(doc: &Document, node: NodeId) -> Self {
        let Some(el) = doc.element(node) else {
            return Self::Other;
        };
        if el.is_form_control() {
            return Self::NativeInput;
        }
        if !doc.is_content_editable(node) {
            return Self::Other;
        }
        if el.has_attribute("data-lexical-editor") {
            return Self::Lexical;
        }
        let draft = doc
            .descendant_elements(node)
            .into_iter()
            .any(|d| doc.attribute(d, "data-contents").is_some());
        if draft {
            Self::Draft
        } else {
            Self::GenericEditable
        }
    }

    pub fn is_natively_editable(&self) -> bool {
        matches!(self, Self::NativeInput)
    }
}

/// What happened during one injection.
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    pub editor: EditorKind,
    pub used_fallback: bool,
}

/// Type `text` into `node`, one character every `delay`.
///
/// Listener exceptions during simulated typing switch to the fallback;
/// only a failing fallback is reported as an error.
pub async fn inject_text(
    doc: &mut Document,
    node: NodeId,
    text: &str,
    delay: Duration,
) -> Result<Injection, String> {
    let editor = EditorKind::detect(doc, node);
    doc.focus(node);

    let typed = match editor {
        EditorKind::NativeInput => type_native(doc, node, text, delay).await,
        EditorKind::GenericEditable => type_editable(doc, node, text, delay).await,
        EditorKind::Lexical | EditorKind::Draft => type_framework(doc, node, text, delay).await,
        EditorKind::Other => Err("element is not editable".to_string()),
    };

    match typed {
        Ok(()) => Ok(Injection {
            editor,
            used_fallback: false,
        }),
        Err(e) => {
            debug!(editor = ?editor, error = %e, "simulated typing failed, assigning directly");
            assign_directly(doc, node, text)?;
            Ok(Injection {
                editor,
                used_fallback: true,
            })
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

async fn type_native(
    doc: &mut Document,
    node: NodeId,
    text: &str,
    delay: Duration,
) -> Result<(), String> {
    let mut typed = String::new();
    for c in text.chars() {
        doc.dispatch_event(node, DomEvent::key("keydown", c))?;
        typed.push(c);
        doc.set_value(node, &typed);
        doc.dispatch_event(node, DomEvent::input(Some(c.to_string())))?;
        doc.dispatch_event(node, DomEvent::key("keyup", c))?;
        pause(delay).await;
    }
    if text.is_empty() {
        doc.set_value(node, "");
    }
    doc.dispatch_event(node, DomEvent::new("change"))?;

    // Controlled inputs may have reset the value mid-stream.
    if doc.value(node) != Some(text) {
        debug!("value diverged after typing, forcing final value");
        doc.set_value(node, text);
        doc.dispatch_event(node, DomEvent::input(None))?;
        doc.dispatch_event(node, DomEvent::new("change"))?;
    }
    Ok(())
}

async fn type_editable(
    doc: &mut Document,
    node: NodeId,
    text: &str,
    delay: Duration,
) -> Result<(), String> {
    for c in text.chars() {
        doc.dispatch_event(node, DomEvent::key("keydown", c))?;
        if !doc.insert_text_at_selection(&c.to_string()) {
            return Err("no editable selection".into());
        }
        doc.dispatch_event(node, DomEvent::input(Some(c.to_string())))?;
        doc.dispatch_event(node, DomEvent::key("keyup", c))?;
        pause(delay).await;
    }
    Ok(())
}

async fn type_framework(
    doc: &mut Document,
    node: NodeId,
    text: &str,
    delay: Duration,
) -> Result<(), String> {
    for c in text.chars() {
        doc.dispatch_event(node, DomEvent::key("keydown", c))?;
        doc.dispatch_event(node, DomEvent::before_input(c))?;
        if !doc.exec_command("insertText", &c.to_string()) {
            return Err("insertText command was rejected".into());
        }
        doc.dispatch_event(node, DomEvent::input(Some(c.to_string())))?;
        doc.dispatch_event(node, DomEvent::key("keyup", c))?;
        pause(delay).await;
    }
    Ok(())
}

fn assign_directly(doc: &mut Document, node: NodeId, text: &str) -> Result<(), String> {
    let is_control = doc.element(node).map(|el| el.is_form_control()).unwrap_or(false);
    if is_control {
        doc.set_value(node, text);
    } else {
        doc.set_text_content(node, text);
    }
    doc.dispatch_event(node, DomEvent::input(Some(text.to_string())))
}

/// Element summary reported after injection.
pub fn element_summary(doc: &Document, node: NodeId, editor: EditorKind) -> Value {
    let el = doc.element(node);
    json!({
        "tagName": el.map(|e| e.tag.to_uppercase()).unwrap_or_default(),
        "id": el.and_then(|e| e.id()).unwrap_or(""),
        "type": el
            .filter(|e| e.tag == "input")
            .map(|e| e.attribute("type").unwrap_or("text")),
        "isNativelyEditable": editor.is_natively_editable(),
        "isContentEditable": doc.is_content_editable(node),
        "editor": editor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(tag: &str, attrs: &[(&str, &str)]) -> (Document, NodeId) {
        let mut doc = Document::new(800.0, 600.0);
        let body = doc.body();
        let node = doc.append_element(body, tag, attrs);
        (doc, node)
    }

    #[test]
    fn detect_recognizes_editor_kinds() {
        let (doc, input) = doc_with("textarea", &[]);
        assert_eq!(EditorKind::detect(&doc, input), EditorKind::NativeInput);

        let (doc, plain) = doc_with("div", &[("contenteditable", "true")]);
        assert_eq!(EditorKind::detect(&doc, plain), EditorKind::GenericEditable);

        let (doc, lexical) = doc_with(
            "div",
            &[("contenteditable", "true"), ("data-lexical-editor", "true")],
        );
        assert_eq!(EditorKind::detect(&doc, lexical), EditorKind::Lexical);

        let (mut doc, draft) = doc_with("div", &[("contenteditable", "true")]);
        let inner = doc.append_element(draft, "div", &[]);
        doc.append_element(inner, "div", &[("data-contents", "true")]);
        assert_eq!(EditorKind::detect(&doc, draft), EditorKind::Draft);

        let (doc, span) = doc_with("span", &[]);
        assert_eq!(EditorKind::detect(&doc, span), EditorKind::Other);
    }

    #[tokio::test]
    async fn native_input_round_trips() {
        for text in ["", "héllo wörld ✓", "a, b; c! (d) \"e\" 'f'?"] {
            let (mut doc, input) = doc_with("input", &[]);
            let res = inject_text(&mut doc, input, text, Duration::ZERO).await.unwrap();
            assert_eq!(doc.value(input), Some(text));
            assert!(!res.used_fallback);
        }
    }

    #[tokio::test]
    async fn native_typing_dispatches_key_sequence() {
        let (mut doc, input) = doc_with("input", &[]);
        inject_text(&mut doc, input, "ab", Duration::ZERO).await.unwrap();
        assert_eq!(
            doc.events_for(input),
            vec!["keydown", "input", "keyup", "keydown", "input", "keyup", "change"]
        );
    }

    #[tokio::test]
    async fn value_reset_mid_stream_is_forced_back() {
        let (mut doc, input) = doc_with("input", &[]);
        let mut resets = 0;
        doc.add_event_listener(input, move |el, ev| {
            if ev.kind == "change" && resets == 0 {
                resets += 1;
                el.value = Some("reset".into());
            }
            Ok(())
        });
        inject_text(&mut doc, input, "xyz", Duration::ZERO).await.unwrap();
        assert_eq!(doc.value(input), Some("xyz"));
        let changes = doc.events_for(input).iter().filter(|k| **k == "change").count();
        assert_eq!(changes, 2);
    }

    #[tokio::test]
    async fn generic_editable_inserts_at_selection() {
        let (mut doc, editor) = doc_with("div", &[("contenteditable", "true")]);
        doc.append_text(editor, "Hi ");
        let res = inject_text(&mut doc, editor, "there", Duration::ZERO).await.unwrap();
        assert_eq!(res.editor, EditorKind::GenericEditable);
        assert_eq!(doc.text_content(editor), "Hi there");
        assert!(!doc.events_for(editor).contains(&"beforeinput"));
    }

    #[tokio::test]
    async fn framework_editor_gets_before_input() {
        let (mut doc, editor) = doc_with(
            "div",
            &[("contenteditable", "true"), ("data-lexical-editor", "true")],
        );
        inject_text(&mut doc, editor, "ok", Duration::ZERO).await.unwrap();
        assert_eq!(doc.text_content(editor), "ok");
        let events = doc.events_for(editor);
        assert_eq!(&events[..5], &["keydown", "beforeinput", "input", "keyup", "keydown"]);
    }

    #[tokio::test]
    async fn throwing_listener_falls_back_to_assignment() {
        let (mut doc, input) = doc_with("input", &[]);
        let mut calls = 0;
        doc.add_event_listener(input, move |_, ev| {
            calls += 1;
            if ev.kind == "keydown" && calls == 1 {
                return Err("TypeError: x is undefined".into());
            }
            Ok(())
        });
        let res = inject_text(&mut doc, input, "fallback", Duration::ZERO).await.unwrap();
        assert!(res.used_fallback);
        assert_eq!(doc.value(input), Some("fallback"));
    }

    #[tokio::test]
    async fn non_editable_element_gets_text_content() {
        let (mut doc, span) = doc_with("span", &[]);
        let res = inject_text(&mut doc, span, "label", Duration::ZERO).await.unwrap();
        assert_eq!(res.editor, EditorKind::Other);
        assert!(res.used_fallback);
        assert_eq!(doc.text_content(span), "label");
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied_per_character() {
        let (mut doc, input) = doc_with("input", &[]);
        let start = tokio::time::Instant::now();
        inject_text(&mut doc, input, "abc", Duration::from_millis(20)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn summary_reports_input_metadata() {
        let (doc, input) = doc_with("input", &[("id", "email"), ("type", "email")]);
        let summary = element_summary(&doc, input, EditorKind::NativeInput);
        assert_eq!(summary["tagName"], "INPUT");
        assert_eq!(summary["id"], "email");
        assert_eq!(summary["type"], "email");
        assert_eq!(summary["isNativelyEditable"], true);
        assert_eq!(summary["editor"], "native-input");
    }
}
