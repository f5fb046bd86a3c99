//! Free-form risk attributes on villages, households and individuals. Seed files may carry any
//! number of extra columns; each becomes an attribute the risk strategies can read.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Interprets a seed cell. Numbers win over flags, so `1` and `0` are numbers here; use
    /// [`AttributeValue::as_flag`] when a column is known to be boolean.
    pub fn parse_cell(raw: &str) -> Option<AttributeValue> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(number) = raw.parse::<f64>() {
            if number.is_finite() {
                return Some(AttributeValue::Number(number));
            }
        }
        match parse_flag(raw) {
            Some(flag) => Some(AttributeValue::Flag(flag)),
            None => Some(AttributeValue::Text(raw.to_string())),
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttributeValue::Flag(flag) => Some(*flag),
            AttributeValue::Number(number) => Some(*number != 0.0),
            AttributeValue::Text(text) => parse_flag(text),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(flag: bool) -> Self {
        AttributeValue::Flag(flag)
    }
}

impl From<f64> for AttributeValue {
    fn from(number: f64) -> Self {
        AttributeValue::Number(number)
    }
}

impl From<u32> for AttributeValue {
    fn from(number: u32) -> Self {
        AttributeValue::Number(f64::from(number))
    }
}

impl From<&str> for AttributeValue {
    fn from(text: &str) -> Self {
        AttributeValue::Text(text.to_string())
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Flag(flag) => write!(f, "{flag}"),
            AttributeValue::Number(number) => write!(f, "{number}"),
            AttributeValue::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Accepts yes/no, true/false, y/n and 1/0 in any case.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "y" | "1" => Some(true),
        "no" | "false" | "n" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    pub fn new() -> Self {
        Attributes::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(AttributeValue::as_number)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_text)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(AttributeValue::as_flag)
    }

    /// Copies every attribute of `other` this set does not already hold. Existing (authored)
    /// values are never replaced.
    pub fn fill_missing(&mut self, other: Attributes) {
        for (name, value) in other.0 {
            self.0.entry(name).or_insert(value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cells() {
        assert_eq!(
            AttributeValue::parse_cell(" 1.8 "),
            Some(AttributeValue::Number(1.8))
        );
        assert_eq!(
            AttributeValue::parse_cell("Yes"),
            Some(AttributeValue::Flag(true))
        );
        assert_eq!(
            AttributeValue::parse_cell("very_high"),
            Some(AttributeValue::Text("very_high".to_string()))
        );
        assert_eq!(AttributeValue::parse_cell("   "), None);
    }

    #[test]
    fn flags_read_through_numbers_and_text() {
        let mut attributes = Attributes::new();
        attributes.insert("control", 1.0);
        attributes.insert("uses_nets", "no");
        attributes.insert("name", "Malinao");
        assert_eq!(attributes.flag("control"), Some(true));
        assert_eq!(attributes.flag("uses_nets"), Some(false));
        assert_eq!(attributes.flag("name"), None);
        assert_eq!(attributes.flag("missing"), None);
    }

    #[test]
    fn fill_missing_keeps_existing_values() {
        let mut authored = Attributes::new();
        authored.insert("water_source", "well");
        let mut synthesized = Attributes::new();
        synthesized.insert("water_source", "river");
        synthesized.insert("pig_ownership", 2.0);

        authored.fill_missing(synthesized);
        assert_eq!(authored.text("water_source"), Some("well"));
        assert_eq!(authored.number("pig_ownership"), Some(2.0));
    }
}
