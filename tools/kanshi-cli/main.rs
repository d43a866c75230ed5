use clap::Parser;
use kanshi::prelude::*;
use serde::Deserialize;
use serde_json::json;
use std::fs;

/// One scripted model mutation.
#[derive(Deserialize)]
struct Change {
    path: String,
    value: serde_json::Value,
}

/// A host over a plain JSON document that prints every effect the engine
/// applies, so a schema can be exercised from the command line.
struct JsonHost {
    model: serde_json::Value,
}

impl JsonHost {
    fn lookup<'a>(&'a self, path: &Path) -> Option<&'a serde_json::Value> {
        let mut current = &self.model;
        for segment in path.segments() {
            current = match segment {
                Segment::Named(name) => current.get(name.as_str())?,
                Segment::Index(index) => current.get(index)?,
                Segment::Wildcard => return None,
            };
        }
        Some(current)
    }

    fn set(&mut self, path: &Path, value: serde_json::Value) {
        let mut current = &mut self.model;
        let (last, parents) = match path.segments().split_last() {
            Some(split) => split,
            None => {
                self.model = value;
                return;
            }
        };
        for segment in parents {
            current = match segment {
                Segment::Named(name) => {
                    if !current.is_object() {
                        *current = json!({});
                    }
                    current
                        .as_object_mut()
                        .expect("just ensured object")
                        .entry(name.clone())
                        .or_insert(serde_json::Value::Null)
                }
                Segment::Index(index) => {
                    if !current.is_array() {
                        *current = json!([]);
                    }
                    let array = current.as_array_mut().expect("just ensured array");
                    if array.len() <= *index {
                        array.resize(index + 1, serde_json::Value::Null);
                    }
                    &mut array[*index]
                }
                Segment::Wildcard => return,
            };
        }
        match last {
            Segment::Named(name) => {
                if !current.is_object() {
                    *current = json!({});
                }
                current
                    .as_object_mut()
                    .expect("just ensured object")
                    .insert(name.clone(), value);
            }
            Segment::Index(index) => {
                if !current.is_array() {
                    *current = json!([]);
                }
                let array = current.as_array_mut().expect("just ensured array");
                if array.len() <= *index {
                    array.resize(index + 1, serde_json::Value::Null);
                }
                array[*index] = value;
            }
            Segment::Wildcard => {}
        }
    }
}

impl Host for JsonHost {
    fn get_value(&self, path: &Path) -> serde_json::Value {
        self.lookup(path).cloned().unwrap_or(serde_json::Value::Null)
    }

    fn unset_value(&mut self, path: &Path) {
        // Array elements are nulled in place so sibling indices keep their
        // positions; object properties and whole arrays go to null too.
        self.set(path, serde_json::Value::Null);
        println!("  [unset]   {}", path);
    }

    fn render(&mut self, path: &Path, hidden: bool) {
        println!(
            "  [render]  {} -> {}",
            path,
            if hidden { "hidden" } else { "visible" }
        );
    }

    fn apply_options(&mut self, path: &Path, items: Vec<SourceItem>) {
        let rendered: Vec<String> = items
            .iter()
            .map(|item| match &item.label {
                Some(label) => format!("{} ({})", item.value, label),
                None => item.value.to_string(),
            })
            .collect();
        println!("  [options] {} -> [{}]", path, rendered.join(", "));
    }
}

/// Exercise a kanshi schema against a model and a script of value changes
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the schema JSON file
    schema_path: String,
    /// Path to the initial model JSON file
    model_path: String,
    /// Optional path to a change script: a JSON array of {path, value}
    script_path: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let schema_json = fs::read_to_string(&cli.schema_path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read schema file '{}': {}", cli.schema_path, e))
    });
    let schema = Schema::from_str(&schema_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Schema is invalid: {}", e)));

    let model_json = fs::read_to_string(&cli.model_path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read model file '{}': {}", cli.model_path, e))
    });
    let model: serde_json::Value = serde_json::from_str(&model_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse model JSON: {}", e)));

    let changes: Vec<Change> = match &cli.script_path {
        Some(path) => {
            let script_json = fs::read_to_string(path).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to read script file '{}': {}", path, e))
            });
            serde_json::from_str(&script_json)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse script JSON: {}", e)))
        }
        None => Vec::new(),
    };

    let mut inspector = Inspector::builder(schema, JsonHost { model }).build();

    println!("Initial render:");
    report_fetches(inspector.init());

    for change in changes {
        println!("\nChange: {} = {}", change.path, change.value);
        let path = Path::parse(&change.path);
        inspector.host_mut().set(&path, change.value);
        match inspector.changed(path) {
            Ok(fetches) => report_fetches(fetches),
            Err(e) => exit_with_error(&format!("Change cascade failed: {}", e)),
        }
    }

    println!("\nFinal model: {}", inspector.host().model);
}

fn report_fetches(fetches: Vec<FetchRequest>) {
    for fetch in fetches {
        println!(
            "  [fetch]   {} awaits deferred resolution ({} dependencies)",
            fetch.path,
            fetch.context.dependencies.len()
        );
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
