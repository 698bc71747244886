//! Computed style values.

use std::collections::BTreeMap;

use crate::geometry::Color;

/// Resolved CSS property values for one element, keyed by property name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    props: BTreeMap<String, String>,
}

impl ComputedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, prop: &str) -> Option<&str> {
        self.props.get(prop).map(String::as_str)
    }

    pub fn set(&mut self, prop: impl Into<String>, value: impl Into<String>) {
        self.props.insert(prop.into(), value.into());
    }

    /// Property value, or `""` when unset (as `getPropertyValue` does).
    pub fn property_value(&self, prop: &str) -> &str {
        self.get(prop).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn color(&self, prop: &str) -> Option<Color> {
        self.get(prop).and_then(Color::parse_css)
    }

    /// A `px` length as a number; unitless numbers are accepted too.
    pub fn px(&self, prop: &str) -> Option<f64> {
        parse_px(self.get(prop)?)
    }

    pub fn opacity(&self) -> f64 {
        self.get("opacity")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }

    /// Font size in px from `font-size`, defaulting to 16.
    pub fn font_size(&self) -> f64 {
        self.px("font-size").unwrap_or(16.0)
    }

    /// Serialize as an inline `style` attribute value.
    pub fn to_inline(&self) -> String {
        self.props
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse an inline `style` attribute value.
    pub fn parse_inline(style: &str) -> Self {
        let mut out = Self::new();
        for decl in style.split(';') {
            if let Some((k, v)) = decl.split_once(':') {
                let (k, v) = (k.trim(), v.trim());
                if !k.is_empty() {
                    out.set(k, v);
                }
            }
        }
        out
    }
}

pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    value
        .strip_suffix("px")
        .unwrap_or(value)
        .trim()
        .parse::<f64>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_round_trip() {
        let mut style = ComputedStyle::new();
        style.set("color", "rgb(1, 2, 3)");
        style.set("font-size", "12px");
        let inline = style.to_inline();
        assert_eq!(inline, "color: rgb(1, 2, 3); font-size: 12px;");
        assert_eq!(ComputedStyle::parse_inline(&inline), style);
    }

    #[test]
    fn numeric_accessors() {
        let style = ComputedStyle::parse_inline("font-size: 20px; opacity: 0.25; left: 7");
        assert_eq!(style.font_size(), 20.0);
        assert_eq!(style.opacity(), 0.25);
        assert_eq!(style.px("left"), Some(7.0));
        assert_eq!(style.px("top"), None);
        assert_eq!(ComputedStyle::new().font_size(), 16.0);
    }

    #[test]
    fn unset_property_value_is_empty() {
        assert_eq!(ComputedStyle::new().property_value("color"), "");
    }
}
