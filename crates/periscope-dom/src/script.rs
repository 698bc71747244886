//! Script evaluation against a page.
//!
//! [`ScriptEngine`] is the seam a host plugs its JavaScript evaluator into.
//! [`BoaEngine`] runs scripts in an embedded ECMAScript interpreter with a
//! page prelude: `document`, `location`, `window` metrics, `localStorage`
//! and `console.log`. Writes to `document.title` and `localStorage` are
//! copied back into the [`Document`] after the script finishes, even when it
//! throws.

use boa_engine::{Context, JsError, JsString, JsValue, NativeFunction, Source};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::document::Document;

pub trait ScriptEngine {
    /// Evaluate `script` against the page. `Err` carries the stringified
    /// exception, e.g. `ReferenceError: boom is not defined`.
    fn evaluate(&mut self, doc: &mut Document, script: &str) -> Result<Value, String>;
}

const PAGE_GLOBAL: &str = "__periscopePage";
const RESULT_GLOBAL: &str = "__periscopeResult";

/// Builds the page globals from the `__periscopePage` snapshot.
const PRELUDE: &str = r#"
var window = globalThis;
var innerWidth = __periscopePage.viewport.width;
var innerHeight = __periscopePage.viewport.height;
var devicePixelRatio = __periscopePage.viewport.devicePixelRatio;
var location = {
  href: __periscopePage.location,
  origin: __periscopePage.origin,
  toString() { return this.href; },
};
var document = (function (page) {
  function element(node) {
    if (!node) return null;
    return {
      id: node.id,
      tagName: node.tag,
      outerHTML: node.html,
      textContent: node.text,
      innerText: node.text,
    };
  }
  return {
    title: page.title,
    location: location,
    documentElement: element(page.root),
    body: element(page.body),
    getElementById(id) {
      const node = page.ids[String(id)];
      return node === undefined ? null : element(node);
    },
  };
})(__periscopePage);
var localStorage = (function (items) {
  const has = (k) => Object.prototype.hasOwnProperty.call(items, k);
  return {
    getItem(k) { k = String(k); return has(k) ? items[k] : null; },
    setItem(k, v) { items[String(k)] = String(v); },
    removeItem(k) { delete items[String(k)]; },
    clear() { for (const k of Object.keys(items)) delete items[k]; },
    key(i) { const keys = Object.keys(items); return i < keys.length ? keys[i] : null; },
    get length() { return Object.keys(items).length; },
    __items: items,
  };
})(__periscopePage.storage);
"#;

const SYNC_BACK: &str = r#"JSON.stringify({
  title: String(document.title),
  storage: localStorage.__items,
})"#;

/// Evaluates JavaScript with boa. Each call gets a fresh realm seeded from
/// the current page, so nothing a script defines outlives it except the
/// title and storage writes.
#[derive(Debug, Clone, Copy)]
pub struct BoaEngine {
    loop_iteration_limit: u64,
    recursion_limit: usize,
}

impl Default for BoaEngine {
    fn default() -> Self {
        Self {
            loop_iteration_limit: 1_000_000,
            recursion_limit: 512,
        }
    }
}

impl BoaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort scripts whose loops run more than `limit` iterations.
    pub fn with_loop_iteration_limit(mut self, limit: u64) -> Self {
        self.loop_iteration_limit = limit;
        self
    }

    fn context(&self, doc: &Document) -> Result<Context, String> {
        let mut ctx = Context::default();
        ctx.runtime_limits_mut()
            .set_loop_iteration_limit(self.loop_iteration_limit);
        ctx.runtime_limits_mut()
            .set_recursion_limit(self.recursion_limit);

        let console_log = NativeFunction::from_fn_ptr(|_, args, context| {
            let mut parts = Vec::with_capacity(args.len());
            for arg in args {
                parts.push(arg.to_string(context)?.to_std_string_escaped());
            }
            debug!(target: "periscope::console", "{}", parts.join(" "));
            Ok(JsValue::undefined())
        });
        ctx.register_global_callable("__periscopeLog".into(), 0, console_log)
            .map_err(|e| format!("failed to install console: {e}"))?;

        let snapshot = page_snapshot(doc).to_string();
        let setup = format!(
            "var {PAGE_GLOBAL} = {snapshot};\n{PRELUDE}\nvar console = {{ log: __periscopeLog, info: __periscopeLog, warn: __periscopeLog, error: __periscopeLog }};"
        );
        ctx.eval(Source::from_bytes(&setup))
            .map_err(|e| format!("failed to install page globals: {e}"))?;
        Ok(ctx)
    }
}

impl ScriptEngine for BoaEngine {
    fn evaluate(&mut self, doc: &mut Document, script: &str) -> Result<Value, String> {
        let mut ctx = self.context(doc)?;

        let mut outcome = ctx.eval(Source::from_bytes(script));
        // A bare top-level `return` is a syntax error in a script; run it as
        // a function body instead.
        let retry = match &outcome {
            Err(e) if script.contains("return") => {
                error_message(e, &mut ctx).starts_with("SyntaxError")
            }
            _ => false,
        };
        if retry {
            let wrapped = format!("(function () {{\n{script}\n}})()");
            outcome = ctx.eval(Source::from_bytes(&wrapped));
        }

        sync_back(&mut ctx, doc);
        match outcome {
            Ok(value) => Ok(to_json(value, &mut ctx)),
            Err(e) => Err(error_message(&e, &mut ctx)),
        }
    }
}

/// The page state scripts can read, as a JSON literal.
fn page_snapshot(doc: &Document) -> Value {
    let node = |id| {
        json!({
            "id": doc.attribute(id, "id").unwrap_or(""),
            "tag": doc.tag_name(id).unwrap_or("").to_ascii_uppercase(),
            "html": doc.outer_html(id),
            "text": doc.text_content(id),
        })
    };

    let mut ids = Map::new();
    for id in doc.all_elements() {
        if let Some(key) = doc.attribute(id, "id") {
            // First element wins, as with getElementById.
            if !ids.contains_key(key) {
                ids.insert(key.to_string(), node(id));
            }
        }
    }

    let storage: Map<String, Value> = doc
        .local_storage()
        .keys()
        .into_iter()
        .filter_map(|k| {
            let v = doc.local_storage().get(&k)?.to_string();
            Some((k, Value::String(v)))
        })
        .collect();

    let viewport = doc.viewport();
    json!({
        "title": doc.title(),
        "location": doc.location(),
        "origin": doc.origin(),
        "viewport": {
            "width": viewport.width,
            "height": viewport.height,
            "devicePixelRatio": viewport.device_pixel_ratio,
        },
        "root": node(doc.document_element()),
        "body": node(doc.body()),
        "ids": ids,
        "storage": storage,
    })
}

/// Copy title and storage writes made by the script back into `doc`.
fn sync_back(ctx: &mut Context, doc: &mut Document) {
    let state = match ctx.eval(Source::from_bytes(SYNC_BACK)) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "page state not readable after script");
            return;
        }
    };
    let Some(text) = state.as_string().map(JsString::to_std_string_escaped) else {
        return;
    };
    let Ok(state) = serde_json::from_str::<Value>(&text) else {
        return;
    };

    if let Some(title) = state.get("title").and_then(Value::as_str) {
        if title != doc.title() {
            doc.set_title(title);
        }
    }
    if let Some(items) = state.get("storage").and_then(Value::as_object) {
        let storage = doc.local_storage_mut();
        storage.clear();
        for (key, value) in items {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            storage.set(key.clone(), value);
        }
    }
}

fn to_json(value: JsValue, ctx: &mut Context) -> Value {
    match value {
        JsValue::Null | JsValue::Undefined => Value::Null,
        JsValue::Boolean(b) => json!(b),
        JsValue::Integer(i) => json!(i),
        JsValue::Rational(r) => json!(r),
        JsValue::String(s) => json!(s.to_std_string_escaped()),
        JsValue::Symbol(_) => json!("[Symbol]"),
        JsValue::BigInt(bi) => json!(bi.to_string()),
        JsValue::Object(_) => {
            let stored = ctx
                .global_object()
                .set(JsString::from(RESULT_GLOBAL), value, false, ctx);
            if stored.is_err() {
                return Value::Null;
            }
            let source = format!("JSON.stringify({RESULT_GLOBAL})");
            match ctx.eval(Source::from_bytes(&source)) {
                Ok(text) => text
                    .as_string()
                    .and_then(|s| serde_json::from_str(&s.to_std_string_escaped()).ok())
                    .unwrap_or(Value::Null),
                Err(e) => {
                    debug!(error = %e, "result is not serializable");
                    Value::Null
                }
            }
        }
    }
}

/// `Kind: message` for native errors; the thrown value otherwise.
fn error_message(err: &JsError, ctx: &mut Context) -> String {
    match err.try_native(ctx) {
        Ok(native) => native.to_string(),
        Err(_) => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Document {
        let mut doc = Document::new(1024.0, 768.0).with_location("https://app.test/inbox");
        doc.set_title("Inbox");
        doc.local_storage_mut().set("k", "v");
        let body = doc.body();
        let p = doc.append_element(body, "p", &[("id", "greeting")]);
        doc.append_text(p, "hi there");
        doc
    }

    fn eval(doc: &mut Document, script: &str) -> Result<Value, String> {
        BoaEngine::new().evaluate(doc, script)
    }

    #[test]
    fn reads_page_state() {
        let mut doc = page();
        assert_eq!(eval(&mut doc, "document.title"), Ok(json!("Inbox")));
        assert_eq!(eval(&mut doc, "location.href"), Ok(json!("https://app.test/inbox")));
        assert_eq!(eval(&mut doc, "localStorage.getItem('k')"), Ok(json!("v")));
        assert_eq!(eval(&mut doc, "localStorage.getItem('x')"), Ok(Value::Null));
        assert_eq!(
            eval(&mut doc, "window.innerWidth").unwrap().as_f64(),
            Some(1024.0)
        );
        assert_eq!(
            eval(&mut doc, "document.getElementById('greeting').textContent"),
            Ok(json!("hi there"))
        );
        assert_eq!(eval(&mut doc, "document.getElementById('nope')"), Ok(Value::Null));
    }

    #[test]
    fn runs_real_programs() {
        let mut doc = page();
        assert_eq!(eval(&mut doc, "1 + 1").unwrap().as_f64(), Some(2.0));
        assert_eq!(
            eval(&mut doc, "[1, 2, 3].map(n => n * 2).join(',')"),
            Ok(json!("2,4,6"))
        );
        assert_eq!(
            eval(&mut doc, "({ title: document.title, n: [1, 'a'] })"),
            Ok(json!({"title": "Inbox", "n": [1, "a"]}))
        );
        assert_eq!(
            eval(&mut doc, "const t = document.title;\nreturn t.toUpperCase();"),
            Ok(json!("INBOX"))
        );
    }

    #[test]
    fn exceptions_are_stringified() {
        let mut doc = page();
        let err = eval(&mut doc, "boom()").unwrap_err();
        assert!(err.starts_with("ReferenceError"), "{err}");
        let err = eval(&mut doc, "throw new TypeError('bad input')").unwrap_err();
        assert_eq!(err, "TypeError: bad input");
        assert!(eval(&mut doc, "let = ;").unwrap_err().starts_with("SyntaxError"));
    }

    #[test]
    fn runaway_loops_are_stopped() {
        let mut doc = page();
        let mut engine = BoaEngine::new().with_loop_iteration_limit(10_000);
        assert!(engine.evaluate(&mut doc, "while (true) {}").is_err());
    }

    #[test]
    fn writes_reach_the_document() {
        let mut doc = page();
        eval(&mut doc, "document.title = 'Renamed'; localStorage.setItem('n', 42); localStorage.removeItem('k');")
            .unwrap();
        assert_eq!(doc.title(), "Renamed");
        assert_eq!(doc.local_storage().get("n"), Some("42"));
        assert_eq!(doc.local_storage().get("k"), None);

        // Writes before a throw still land.
        let err = eval(&mut doc, "localStorage.clear(); boom();").unwrap_err();
        assert!(err.starts_with("ReferenceError"));
        assert_eq!(doc.local_storage().len(), 0);
    }

    #[test]
    fn definitions_do_not_leak_between_calls() {
        let mut doc = page();
        eval(&mut doc, "var leaked = 1;").unwrap();
        assert!(eval(&mut doc, "leaked").unwrap_err().starts_with("ReferenceError"));
    }

    #[test]
    fn document_evaluate_uses_engine() {
        let mut doc = Document::new(10.0, 10.0);
        let body = doc.body();
        doc.append_text(body, "hi");
        assert_eq!(
            doc.evaluate("document.documentElement.outerHTML"),
            Ok(json!("<html><body>hi</body></html>"))
        );
    }
}
