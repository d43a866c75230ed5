//! Common test utilities: a recording mock host and fixture schemas.
use ahash::AHashMap;
use kanshi::prelude::*;

/// Everything the engine pushed back through the host, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Render { path: Path, hidden: bool },
    Unset { path: Path },
    Options { path: Path, items: Vec<SourceItem> },
}

/// A host over a flat path-keyed model that records every effect.
#[derive(Default)]
pub struct MockHost {
    pub model: AHashMap<Path, Value>,
    pub events: Vec<Event>,
}

impl MockHost {
    #[allow(dead_code)]
    pub fn with_values(values: &[(&str, Value)]) -> MockHost {
        let mut host = MockHost::default();
        for (path, value) in values {
            host.model.insert(Path::parse(path), value.clone());
        }
        host
    }

    #[allow(dead_code)]
    pub fn set(&mut self, path: &str, value: Value) {
        self.model.insert(Path::parse(path), value);
    }

    #[allow(dead_code)]
    pub fn renders(&self) -> Vec<(String, bool)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Render { path, hidden } => Some((path.to_string(), *hidden)),
                _ => None,
            })
            .collect()
    }

    #[allow(dead_code)]
    pub fn unsets(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Unset { path } => Some(path.to_string()),
                _ => None,
            })
            .collect()
    }

    #[allow(dead_code)]
    pub fn options_applied(&self) -> Vec<(String, Vec<SourceItem>)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Options { path, items } => Some((path.to_string(), items.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Host for MockHost {
    fn get_value(&self, path: &Path) -> Value {
        self.model.get(path).cloned().unwrap_or(Value::Null)
    }

    fn unset_value(&mut self, path: &Path) {
        self.model.remove(path);
        self.events.push(Event::Unset { path: path.clone() });
    }

    fn render(&mut self, path: &Path, hidden: bool) {
        self.events.push(Event::Render {
            path: path.clone(),
            hidden,
        });
    }

    fn apply_options(&mut self, path: &Path, items: Vec<SourceItem>) {
        self.events.push(Event::Options {
            path: path.clone(),
            items,
        });
    }
}

/// `kind` select plus a `radius` that only exists for circles and is cleared
/// when hidden.
#[allow(dead_code)]
pub fn shape_schema() -> Schema {
    Schema::from_str(
        r#"{
            "kind": { "type": "select" },
            "radius": {
                "type": "number",
                "when": { "eq": { "kind": "circle" }, "otherwise": { "unset": true } }
            }
        }"#,
    )
    .expect("fixture schema is valid")
}

/// A list of line items where each row's `value` is only visible while that
/// row's `unit` is `"custom"`.
#[allow(dead_code)]
pub fn items_schema() -> Schema {
    Schema::from_str(
        r#"{
            "items": {
                "item": {
                    "properties": {
                        "unit": { "type": "select" },
                        "value": {
                            "type": "number",
                            "when": {
                                "eq": { "items/*/unit": "custom" },
                                "otherwise": { "unset": true }
                            }
                        }
                    }
                }
            }
        }"#,
    )
    .expect("fixture schema is valid")
}
