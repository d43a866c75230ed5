//! # Kanshi - Declarative Field Visibility & Dependency Propagation Engine
//!
//! **Kanshi** is a UI-framework-agnostic engine for dynamic forms: it decides
//! which fields are visible, clears values of fields that disappear, and keeps
//! dynamically sourced option lists fresh, all driven by a declarative schema.
//! The rendering layer stays entirely on the host's side of a small trait.
//!
//! ## Core Workflow
//!
//! 1.  **Load your schema**: a JSON tree of field definitions. Each field is a
//!     leaf input, an object of properties, a list, or an anonymous object,
//!     and may carry a `when` visibility expression.
//! 2.  **Implement [`inspector::Host`]** over your data model: a value reader,
//!     an unset accessor, and render/option callbacks.
//! 3.  **Build an [`inspector::Inspector`]** with the builder, registering any
//!     custom operators and dynamic option sources, then call `init()`.
//! 4.  **Report changes**: whenever a model value mutates, call
//!     `changed(path)`. The engine re-evaluates every dependent expression and
//!     pushes show/hide/unset effects back through the host.
//!
//! ## Quick Start
//!
//! ```rust
//! use kanshi::prelude::*;
//! use ahash::AHashMap;
//!
//! struct Form {
//!     model: AHashMap<Path, Value>,
//! }
//!
//! impl Host for Form {
//!     fn get_value(&self, path: &Path) -> Value {
//!         self.model.get(path).cloned().unwrap_or(Value::Null)
//!     }
//!     fn unset_value(&mut self, path: &Path) {
//!         self.model.remove(path);
//!     }
//!     fn render(&mut self, _path: &Path, _hidden: bool) {}
//!     fn apply_options(&mut self, _path: &Path, _items: Vec<SourceItem>) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = Schema::from_str(
//!         r#"{
//!             "kind": { "type": "select" },
//!             "radius": {
//!                 "type": "number",
//!                 "when": { "eq": { "kind": "circle" }, "otherwise": { "unset": true } }
//!             }
//!         }"#,
//!     )?;
//!
//!     let mut model = AHashMap::new();
//!     model.insert(Path::parse("kind"), Value::from("circle"));
//!     model.insert(Path::parse("radius"), Value::from(10));
//!
//!     let mut inspector = Inspector::builder(schema, Form { model }).build();
//!     inspector.init();
//!     assert!(inspector.is_visible("radius"));
//!
//!     // The host mutates its model, then reports the change.
//!     inspector
//!         .host_mut()
//!         .model
//!         .insert(Path::parse("kind"), Value::from("square"));
//!     inspector.changed("kind")?;
//!
//!     assert!(!inspector.is_visible("radius"));
//!     // otherwise.unset cleared the stale radius value
//!     assert!(inspector.host().model.get(&Path::parse("radius")).is_none());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod expr;
pub mod inspector;
pub mod path;
pub mod prelude;
pub mod registry;
pub mod schema;
pub mod source;
