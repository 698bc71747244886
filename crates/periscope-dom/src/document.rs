//! The element tree and window state of one webview.

use std::collections::HashMap;

use image::RgbaImage;
use serde_json::Value;
use tracing::debug;

use crate::events::DomEvent;
use crate::frame::{FrameWindow, MessageHub};
use crate::geometry::Rect;
use crate::painter::{ImageLoadError, MarkupPainter, SvgLoader};
use crate::script::{BoaEngine, ScriptEngine};
use crate::serialize;
use crate::storage::LocalStorage;
use crate::style::ComputedStyle;

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An event listener. It may mutate the element it is attached to, and an
/// `Err` models an exception thrown out of the listener.
pub type Listener = Box<dyn FnMut(&mut ElementData, &DomEvent) -> Result<(), String> + Send>;

/// Element state: attributes, form value, layout box and resources.
#[derive(Clone, Default)]
pub struct ElementData {
    /// Lowercase tag name.
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    /// Live form value (`<input>`, `<textarea>`).
    pub value: Option<String>,
    /// Bounding client rect in viewport CSS pixels.
    pub rect: Rect,
    pub style: ComputedStyle,
    /// Decoded pixels of an `<img>` or a `<canvas>` backing store.
    pub bitmap: Option<RgbaImage>,
    /// `<img>` finished loading (`complete && naturalWidth > 0`).
    pub loaded: bool,
    /// Content window of an `<iframe>`.
    pub frame: Option<FrameWindow>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id").filter(|v| !v.is_empty())
    }

    pub fn class_list(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .unwrap_or("")
            .split_ascii_whitespace()
    }

    pub fn is_form_control(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea")
    }
}

pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Window metrics used for coordinate conversion and capture sizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
    pub screen_x: f64,
    pub screen_y: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
            screen_x: 0.0,
            screen_y: 0.0,
        }
    }
}

/// A loaded page: the DOM plus the `window` state handlers can reach.
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    viewport: Viewport,
    title: String,
    location: String,
    origin: String,
    storage: LocalStorage,
    focused: Option<NodeId>,
    listeners: HashMap<NodeId, Vec<Listener>>,
    event_log: Vec<(NodeId, DomEvent)>,
    hub: MessageHub,
    engine: Option<Box<dyn ScriptEngine + Send>>,
    svg_loader: Box<dyn SvgLoader + Send>,
}

impl Document {
    /// An empty `<html><body></body></html>` page at `about:blank`.
    pub fn new(width: f64, height: f64) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            viewport: Viewport::new(width, height),
            title: String::new(),
            location: "about:blank".into(),
            origin: "null".into(),
            storage: LocalStorage::default(),
            focused: None,
            listeners: HashMap::new(),
            event_log: Vec::new(),
            hub: MessageHub::new(),
            engine: Some(Box::new(BoaEngine::new())),
            svg_loader: Box::new(MarkupPainter::new("null")),
        };
        let root = doc.alloc(NodeKind::Element(ElementData::new("html")), None);
        let body = doc.alloc(NodeKind::Element(ElementData::new("body")), Some(root));
        doc.nodes[root.0].children.push(body);
        doc.root = root;
        doc.body = body;
        doc.set_rect(root, Rect::new(0.0, 0.0, width, height));
        doc.set_rect(body, Rect::new(0.0, 0.0, width, height));
        doc
    }

    /// Place the page at `url`; its origin scopes image loads and frames.
    pub fn with_location(mut self, url: &str) -> Self {
        self.location = url.to_string();
        self.origin = origin_of(url).unwrap_or("null").to_string();
        self.svg_loader = Box::new(MarkupPainter::new(&self.origin));
        self
    }

    pub fn with_script_engine(mut self, engine: impl ScriptEngine + Send + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    pub fn with_svg_loader(mut self, loader: impl SvgLoader + Send + 'static) -> Self {
        self.svg_loader = Box::new(loader);
        self
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        id
    }

    // =========================================================================
    // Tree construction
    // =========================================================================

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(ElementData::new(tag)), None)
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()), None)
    }

    /// Append `child` to `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Create an element under `parent` with the given attributes.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag);
        for (k, v) in attrs {
            self.set_attribute(id, k, v);
        }
        self.append_child(parent, id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.create_text(text);
        self.append_child(parent, id);
        id
    }

    pub fn remove_child(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != child);
        }
    }

    // =========================================================================
    // Node access
    // =========================================================================

    pub fn document_element(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attribute(name)
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.set_attribute(name, value);
            if name == "style" {
                el.style = ComputedStyle::parse_inline(value);
            }
        }
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        if let Some(el) = self.element_mut(id) {
            el.rect = rect;
        }
    }

    /// `getBoundingClientRect()`; text nodes and unknown ids have an empty box.
    pub fn rect(&self, id: NodeId) -> Rect {
        self.element(id).map(|el| el.rect).unwrap_or_default()
    }

    pub fn set_style(&mut self, id: NodeId, prop: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.style.set(prop, value);
        }
    }

    /// `getComputedStyle()`: declared style resolved against the layout box.
    /// Every element is laid out at its bounding rect.
    pub fn computed_style(&self, id: NodeId) -> ComputedStyle {
        let Some(el) = self.element(id) else {
            return ComputedStyle::new();
        };
        let mut style = el.style.clone();
        style.set("position", "absolute");
        style.set("left", format!("{}px", el.rect.x));
        style.set("top", format!("{}px", el.rect.y));
        style.set("width", format!("{}px", el.rect.width));
        style.set("height", format!("{}px", el.rect.height));
        if style.get("display").is_none() {
            style.set("display", "block");
        }
        style
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Every element under the document element, in document (pre-)order.
    pub fn all_elements(&self) -> Vec<NodeId> {
        self.descendant_elements(self.root)
    }

    /// Elements under `id`, excluding `id` itself, in document order.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if self.element(next).is_some() {
                out.push(next);
                stack.extend(self.nodes[next.0].children.iter().rev().copied());
            }
        }
        out
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.all_elements()
            .into_iter()
            .find(|n| self.element(*n).and_then(ElementData::id) == Some(id))
    }

    pub fn get_elements_by_class_name(&self, class: &str) -> Vec<NodeId> {
        self.all_elements()
            .into_iter()
            .filter(|n| {
                self.element(*n)
                    .map(|el| el.class_list().any(|c| c == class))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn get_elements_by_tag_name(&self, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.all_elements()
            .into_iter()
            .filter(|n| tag == "*" || self.tag_name(*n) == Some(tag.as_str()))
            .collect()
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element(_) => {
                for child in &self.nodes[id.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Replace all children with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let NodeKind::Text(t) = &mut self.nodes[id.0].kind {
            *t = text.to_string();
            return;
        }
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            self.append_text(id, text);
        }
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.element(id)?.value.as_deref()
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.value = Some(value.to_string());
        }
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        serialize::outer_html(self, id)
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn add_event_listener<F>(&mut self, id: NodeId, listener: F)
    where
        F: FnMut(&mut ElementData, &DomEvent) -> Result<(), String> + Send + 'static,
    {
        self.listeners.entry(id).or_default().push(Box::new(listener));
    }

    /// Dispatch `event` at `id`, running its listeners in registration order.
    /// The first listener error is returned after all listeners have run.
    pub fn dispatch_event(&mut self, id: NodeId, event: DomEvent) -> Result<(), String> {
        self.event_log.push((id, event.clone()));
        let Some(mut listeners) = self.listeners.remove(&id) else {
            return Ok(());
        };
        let mut first_err = None;
        if let Some(NodeKind::Element(el)) = self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            for listener in listeners.iter_mut() {
                if let Err(e) = listener(el, &event) {
                    debug!(node = id.0, kind = %event.kind, error = %e, "listener threw");
                    first_err.get_or_insert(e);
                }
            }
        }
        self.listeners.insert(id, listeners);
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Event types dispatched at `id`, oldest first.
    pub fn events_for(&self, id: NodeId) -> Vec<&str> {
        self.event_log
            .iter()
            .filter(|(n, _)| *n == id)
            .map(|(_, e)| e.kind.as_str())
            .collect()
    }

    pub fn event_log(&self) -> &[(NodeId, DomEvent)] {
        &self.event_log
    }

    // =========================================================================
    // Focus, selection and editing
    // =========================================================================

    pub fn focus(&mut self, id: NodeId) {
        self.focused = Some(id);
    }

    pub fn active_element(&self) -> NodeId {
        self.focused.unwrap_or(self.body)
    }

    /// `isContentEditable`: inherited from the nearest ancestor declaring
    /// `contenteditable`.
    pub fn is_content_editable(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if let Some(v) = self.attribute(n, "contenteditable") {
                return matches!(v, "" | "true" | "plaintext-only");
            }
            cur = self.parent(n);
        }
        false
    }

    /// Insert text at the end-collapsed selection of the focused element.
    /// Returns false when nothing editable has focus.
    pub fn insert_text_at_selection(&mut self, text: &str) -> bool {
        let Some(target) = self.focused else {
            return false;
        };
        if !self.is_content_editable(target) {
            return false;
        }
        match self.nodes[target.0].children.last().copied() {
            Some(last) if matches!(self.nodes[last.0].kind, NodeKind::Text(_)) => {
                if let NodeKind::Text(t) = &mut self.nodes[last.0].kind {
                    t.push_str(text);
                }
            }
            _ => {
                self.append_text(target, text);
            }
        }
        true
    }

    /// `document.execCommand`. Only `insertText` is supported.
    pub fn exec_command(&mut self, command: &str, value: &str) -> bool {
        match command {
            "insertText" => self.insert_text_at_selection(value),
            _ => false,
        }
    }

    // =========================================================================
    // Window state
    // =========================================================================

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether loading `url` from this page crosses origins. Relative and
    /// `data:` URLs are same-origin.
    pub fn is_cross_origin(&self, url: &str) -> bool {
        match origin_of(url) {
            Some(o) => o != self.origin,
            None => false,
        }
    }

    pub fn local_storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn local_storage_mut(&mut self) -> &mut LocalStorage {
        &mut self.storage
    }

    /// This window's `message` listener registry.
    pub fn message_hub(&self) -> &MessageHub {
        &self.hub
    }

    /// Content window of an iframe element.
    pub fn frame_window(&self, id: NodeId) -> Option<&FrameWindow> {
        self.element(id)?.frame.as_ref()
    }

    pub fn attach_frame(&mut self, id: NodeId, window: FrameWindow) {
        if let Some(el) = self.element_mut(id) {
            el.frame = Some(window);
        }
    }

    /// Give an `<img>` or `<canvas>` its pixels.
    pub fn set_bitmap(&mut self, id: NodeId, bitmap: RgbaImage) {
        if let Some(el) = self.element_mut(id) {
            el.loaded = bitmap.width() > 0 && bitmap.height() > 0;
            el.bitmap = Some(bitmap);
        }
    }

    /// Evaluate a script in the page. Exceptions come back stringified.
    pub fn evaluate(&mut self, script: &str) -> Result<Value, String> {
        let mut engine = self
            .engine
            .take()
            .ok_or_else(|| "script engine is busy".to_string())?;
        let result = engine.evaluate(self, script);
        self.engine = Some(engine);
        result
    }

    /// Load an SVG document as an image (`new Image()` with a data URL).
    pub fn load_svg_image(&self, svg: &str) -> Result<RgbaImage, ImageLoadError> {
        self.svg_loader.load(svg)
    }
}

/// `scheme://host[:port]` of an absolute http(s) URL.
pub fn origin_of(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let scheme_len = url.len() - rest.len();
    let host_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&url[..scheme_len + host_len])
}
