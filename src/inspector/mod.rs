//! The inspector: visibility state machine and change orchestration.
//!
//! A host form owns the data model and the rendering; the inspector owns the
//! rules. The host reports every value mutation through [`Inspector::changed`];
//! the inspector re-evaluates the affected `when` expressions, applies
//! show/hide transitions (with optional value unset) back through the [`Host`]
//! trait, and re-resolves dynamic option sources whose dependencies changed.

use crate::error::{EvalError, SourceError};
use crate::expr::{WhenClause, eval, eval::OperatorRegistry};
use crate::path::Path;
use crate::registry::DependencyRegistry;
use crate::schema::Schema;
use crate::source::{FetchRequest, RefreshOutcome, SourceDefinition, SourceItem, SourceService};
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use tracing::{debug, warn};

pub use crate::expr::eval::CustomOperator;

/// The function-call contract with the rendering layer. The inspector never
/// owns the data model; it reads and writes only through these accessors,
/// which must be safe to call synchronously from within an evaluation.
pub trait Host {
    /// Reads the current model value at a path. Absent values are `null`.
    fn get_value(&self, path: &Path) -> serde_json::Value;

    /// Clears the model value at a path. Unsetting inside an array must not
    /// remove elements; unsetting a whole array sets it to `null`.
    fn unset_value(&mut self, path: &Path);

    /// Redraws a field, revealed or hidden.
    fn render(&mut self, path: &Path, hidden: bool);

    /// Replaces a field's option list with freshly resolved items.
    fn apply_options(&mut self, path: &Path, items: Vec<SourceItem>);
}

/// Per-field visibility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Visible,
    Hidden,
}

/// What a matched registry entry should re-evaluate.
#[derive(Debug, Clone)]
enum Dependent {
    /// Index into the inspector's `when_fields` table.
    When { index: usize },
    /// A dynamic option source registered at this path.
    Source { path: Path },
}

/// Builder for [`Inspector`], the place to register custom operators and
/// dynamic option sources before the dependency graph is wired up.
pub struct InspectorBuilder<H: Host> {
    schema: Schema,
    host: H,
    operators: OperatorRegistry,
    sources: Vec<(Path, SourceDefinition)>,
}

impl<H: Host> InspectorBuilder<H> {
    pub fn new(schema: Schema, host: H) -> InspectorBuilder<H> {
        InspectorBuilder {
            schema,
            host,
            operators: OperatorRegistry::new(),
            sources: Vec::new(),
        }
    }

    /// Registers a custom comparison operator. A custom operator shadowing a
    /// built-in name takes precedence at evaluation time.
    pub fn with_custom_operator(mut self, operator: Box<dyn CustomOperator>) -> Self {
        self.operators.register(operator);
        self
    }

    /// Registers a dynamic option source for the field at `path`.
    pub fn with_source(mut self, path: impl Into<Path>, definition: SourceDefinition) -> Self {
        self.sources.push((path.into(), definition));
        self
    }

    pub fn build(self) -> Inspector<H> {
        let when_fields: Vec<(Path, WhenClause)> = self
            .schema
            .flatten()
            .into_iter()
            .filter_map(|(path, def)| def.when.clone().map(|clause| (path, clause)))
            .collect();

        let mut registry = DependencyRegistry::new();
        for (index, (_, clause)) in when_fields.iter().enumerate() {
            registry.subscribe(&clause.dependency_paths(), Dependent::When { index });
        }

        let mut sources = SourceService::new();
        for (path, definition) in self.sources {
            let tag = Dependent::Source { path: path.clone() };
            sources.add(path, definition, &mut registry, tag);
        }

        Inspector {
            host: self.host,
            schema: self.schema,
            operators: self.operators,
            registry,
            sources,
            when_fields,
            states: AHashMap::new(),
        }
    }
}

/// The dependency/visibility engine instance. All registries are owned here,
/// constructed at init and discarded at teardown; there is no static state.
pub struct Inspector<H: Host> {
    host: H,
    schema: Schema,
    operators: OperatorRegistry,
    registry: DependencyRegistry<Dependent>,
    sources: SourceService,
    /// Fields carrying a `when` clause, in definition order.
    when_fields: Vec<(Path, WhenClause)>,
    states: AHashMap<Path, FieldState>,
}

impl<H: Host> Inspector<H> {
    pub fn builder(schema: Schema, host: H) -> InspectorBuilder<H> {
        InspectorBuilder::new(schema, host)
    }

    /// First render: evaluates every `when` expression against the current
    /// model (fields without one default to visible), records the state,
    /// renders each conditional field, and performs the one-time source
    /// initialization. Returns deferred fetches for the host to complete.
    ///
    /// Fields addressed through a wildcard (list rows) are skipped: their
    /// template path has no model value to evaluate against, so each row's
    /// visibility is established by the first change touching it.
    pub fn init(&mut self) -> Vec<FetchRequest> {
        let mut initial = Vec::new();
        {
            let host = &self.host;
            for (path, clause) in &self.when_fields {
                if path.has_wildcard() {
                    continue;
                }
                let visible = eval::evaluate(&clause.expr, &|p| host.get_value(p), &self.operators);
                initial.push((path.clone(), visible));
            }
        }
        for (path, visible) in initial {
            let state = if visible {
                FieldState::Visible
            } else {
                FieldState::Hidden
            };
            self.states.insert(path.clone(), state);
            self.host.render(&path, !visible);
        }

        let outcomes = {
            let host = &self.host;
            self.sources.init_sources(&|p| host.get_value(p))
        };
        self.collect_outcomes(outcomes)
    }

    /// Current visibility of a field. Fields never constrained by a `when`
    /// clause are visible.
    pub fn is_visible(&self, path: impl Into<Path>) -> bool {
        self.states
            .get(&path.into())
            .is_none_or(|state| *state == FieldState::Visible)
    }

    /// Entry point for the host: the model value at `path` just changed.
    ///
    /// Every dependent whose watched path is a sub-path or super-path of the
    /// changed path is re-evaluated, in registration order. Unset side effects
    /// feed back into the same cascade iteratively (never recursively), with a
    /// per-cascade guard so a cycle of mutually dependent fields cannot loop
    /// forever. The work queue is local to the call: a fatal error discards
    /// the remainder of the cascade instead of leaking it into the next one.
    /// Returns deferred source fetches for the host to complete.
    pub fn changed(&mut self, path: impl Into<Path>) -> Result<Vec<FetchRequest>, EvalError> {
        let mut fetches = Vec::new();
        let mut seen: AHashSet<Path> = AHashSet::new();
        let mut queue: VecDeque<Path> = VecDeque::new();
        queue.push_back(path.into());

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                debug!(path = %current, "change already processed in this cascade");
                continue;
            }
            for notification in self.registry.notify_changed(&current) {
                match notification.tag {
                    Dependent::When { index } => {
                        self.apply_visibility(&notification.watched, &current, index, &mut queue)?;
                    }
                    Dependent::Source { path } => {
                        let outcome = {
                            let host = &self.host;
                            self.sources
                                .refresh(&path, Some(&current), &|p| host.get_value(p))
                        };
                        self.apply_outcome(&path, outcome, &mut fetches);
                    }
                }
            }
        }
        Ok(fetches)
    }

    /// Re-evaluates one dependent `when` clause against the changed path,
    /// substituting captured wildcard segments into the field path and every
    /// comparison path, and applies the transition if the state flipped.
    fn apply_visibility(
        &mut self,
        watched: &Path,
        changed: &Path,
        index: usize,
        queue: &mut VecDeque<Path>,
    ) -> Result<(), EvalError> {
        let (field, clause) = &self.when_fields[index];
        let captures = watched.captures_from(changed);
        let field_path = field.substitute(&captures);
        let expr = clause.expr.substitute(&captures);
        let unset_on_hide = clause.otherwise.unset;

        let visible = {
            let host = &self.host;
            eval::evaluate(&expr, &|p| host.get_value(p), &self.operators)
        };
        let next = if visible {
            FieldState::Visible
        } else {
            FieldState::Hidden
        };

        let previous = self
            .states
            .get(&field_path)
            .copied()
            .unwrap_or(FieldState::Visible);
        if previous == next {
            // No-op transitions must not re-render or re-write the model.
            return Ok(());
        }
        debug!(field = %field_path, ?previous, ?next, "visibility transition");
        self.states.insert(field_path.clone(), next);

        match next {
            FieldState::Hidden => {
                if unset_on_hide {
                    self.host.unset_value(&field_path);
                    // The cleared value is itself a model change.
                    queue.push_back(field_path.clone());
                }
                self.host.render(&field_path, true);
            }
            FieldState::Visible => {
                self.check_resync(&field_path)?;
                self.host.render(&field_path, false);
            }
        }
        Ok(())
    }

    /// On reveal, the displayed value is resynchronized from the (possibly
    /// previously unset) model. A field declaring a value pattern with neither
    /// a model value nor a default is a fatal configuration error.
    fn check_resync(&self, field_path: &Path) -> Result<(), EvalError> {
        let def = self.schema.definition_at(field_path);
        if def.value_pattern.is_some()
            && def.default_value.is_none()
            && self.host.get_value(field_path).is_null()
        {
            return Err(EvalError::MissingDefault {
                path: field_path.clone(),
            });
        }
        Ok(())
    }

    /// Manually re-resolves a single source, outside any change cascade.
    pub fn refresh_source(&mut self, path: impl Into<Path>) -> Vec<FetchRequest> {
        let path = path.into();
        let outcome = {
            let host = &self.host;
            self.sources.refresh(&path, None, &|p| host.get_value(p))
        };
        let mut fetches = Vec::new();
        self.apply_outcome(&path, outcome, &mut fetches);
        fetches
    }

    /// Unconditionally re-resolves every source ("reload all dynamic data").
    pub fn refresh_sources(&mut self) -> Vec<FetchRequest> {
        let outcomes = {
            let host = &self.host;
            self.sources.refresh_all(&|p| host.get_value(p))
        };
        self.collect_outcomes(outcomes)
    }

    /// Completes a deferred fetch. The result is applied only if this request
    /// is still the most recently issued one for its path and the inspector
    /// has not been cleared since; otherwise it is dropped. A failed fetch is
    /// logged and the previous option list retained. Returns whether the
    /// result was applied.
    pub fn fulfill(
        &mut self,
        request: &FetchRequest,
        result: Result<Vec<SourceItem>, SourceError>,
    ) -> bool {
        if !self.sources.is_current(request) {
            return false;
        }
        match result {
            Ok(items) => {
                self.host.apply_options(&request.path, items);
                true
            }
            Err(error) => {
                warn!(path = %request.path, %error, "deferred source fetch failed; keeping previous options");
                false
            }
        }
    }

    fn collect_outcomes(&mut self, outcomes: Vec<(Path, RefreshOutcome)>) -> Vec<FetchRequest> {
        let mut fetches = Vec::new();
        for (path, outcome) in outcomes {
            self.apply_outcome(&path, outcome, &mut fetches);
        }
        fetches
    }

    fn apply_outcome(
        &mut self,
        path: &Path,
        outcome: RefreshOutcome,
        fetches: &mut Vec<FetchRequest>,
    ) {
        match outcome {
            RefreshOutcome::Apply(items) => self.host.apply_options(path, items),
            RefreshOutcome::Pending(request) => fetches.push(request),
            RefreshOutcome::Retain => {}
        }
    }

    /// Tears down all registrations and state, called when the hosting form
    /// re-renders or is destroyed. Pending fetches are not aborted; their
    /// late fulfillments are ignored.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.sources.clear();
        self.states.clear();
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}
