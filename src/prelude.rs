//! Prelude module for convenient imports
//!
//! Re-exports the most commonly used types from the kanshi crate. Import this
//! module to get access to the core functionality without having to import
//! each type individually.

// Orchestration
pub use crate::inspector::{FieldState, Host, Inspector, InspectorBuilder};

// Paths
pub use crate::path::{Path, Segment};

// Expressions
pub use crate::expr::{
    CustomOperator, Expression, Operator, OperatorRegistry, Otherwise, Predicate, WhenClause,
    evaluate,
};

// Schema
pub use crate::schema::{FieldDef, FieldShape, Schema};

// Dependency registry
pub use crate::registry::{DependencyRegistry, Notification};

// Dynamic option sources
pub use crate::source::{
    FetchRequest, Resolution, SourceContext, SourceDefinition, SourceItem, SourceService,
};

// Error types
pub use crate::error::{EvalError, SchemaError, SourceError};

// Runtime values live in the host's model; the engine sees them as JSON.
pub use serde_json::Value;
