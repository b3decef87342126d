//! Structured edits to the component IR
//!
//! A change request is answered with a list of [`Mutation`]s. Each one names
//! the component it edits, so scope confinement can be checked before
//! anything is applied.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use uiforge_codegen::NameAllocator;
use uiforge_core::component::{
    Arrangement, Container, HandlerSpec, PropSpec, StateSpec, StyleHint, StyleProperty,
};
use uiforge_core::schema::SchemaIssue;
use uiforge_core::ComponentSpec;

/// One edit to the IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Add a prop
    AddProp {
        /// Edited component
        component: String,
        /// New prop
        prop: PropSpec,
    },
    /// Remove a prop by name
    RemoveProp {
        /// Edited component
        component: String,
        /// Prop name
        name: String,
    },
    /// Replace the prop with the same name
    ModifyProp {
        /// Edited component
        component: String,
        /// Replacement
        prop: PropSpec,
    },
    /// Add a state variable
    AddState {
        /// Edited component
        component: String,
        /// New state variable
        state: StateSpec,
    },
    /// Remove a state variable by name
    RemoveState {
        /// Edited component
        component: String,
        /// State name
        name: String,
    },
    /// Replace the state variable with the same name
    ModifyState {
        /// Edited component
        component: String,
        /// Replacement
        state: StateSpec,
    },
    /// Add a handler
    AddHandler {
        /// Edited component
        component: String,
        /// New handler
        handler: HandlerSpec,
    },
    /// Remove a handler by name
    RemoveHandler {
        /// Edited component
        component: String,
        /// Handler name
        name: String,
    },
    /// Replace the handler with the same name
    ModifyHandler {
        /// Edited component
        component: String,
        /// Replacement
        handler: HandlerSpec,
    },
    /// Compose an existing component
    AddChild {
        /// Edited component
        component: String,
        /// Child name
        child: String,
    },
    /// Stop composing a child
    RemoveChild {
        /// Edited component
        component: String,
        /// Child name
        child: String,
    },
    /// Create a component and compose it under `parent`
    CreateComponent {
        /// Composing component
        parent: String,
        /// The new component
        spec: ComponentSpec,
    },
    /// Remove a component, and any of its descendants nothing else composes
    RemoveComponent {
        /// Component name
        name: String,
    },
    /// Set a style hint
    SetStyle {
        /// Edited component
        component: String,
        /// `root`, a handler or a member
        target: String,
        /// Styled property
        property: StyleProperty,
        /// Token id or literal
        value: String,
    },
    /// Drop a style hint
    ClearStyle {
        /// Edited component
        component: String,
        /// Hint target
        target: String,
        /// Hint property
        property: StyleProperty,
    },
    /// Change layout intent; absent fields stay as they are
    SetLayout {
        /// Edited component
        component: String,
        /// New arrangement
        #[serde(default)]
        arrangement: Option<Arrangement>,
        /// New container
        #[serde(default)]
        container: Option<Container>,
        /// New spacing step
        #[serde(default)]
        spacing: Option<String>,
    },
}

/// The provider's answer to a change request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MutationBatch {
    /// Proposed mutations, in application order
    #[serde(default)]
    pub mutations: Vec<Mutation>,
}

impl Mutation {
    /// Existing component this mutation edits
    pub fn component(&self) -> &str {
        match self {
            Mutation::AddProp { component, .. }
            | Mutation::RemoveProp { component, .. }
            | Mutation::ModifyProp { component, .. }
            | Mutation::AddState { component, .. }
            | Mutation::RemoveState { component, .. }
            | Mutation::ModifyState { component, .. }
            | Mutation::AddHandler { component, .. }
            | Mutation::RemoveHandler { component, .. }
            | Mutation::ModifyHandler { component, .. }
            | Mutation::AddChild { component, .. }
            | Mutation::RemoveChild { component, .. }
            | Mutation::SetStyle { component, .. }
            | Mutation::ClearStyle { component, .. }
            | Mutation::SetLayout { component, .. } => component,
            Mutation::CreateComponent { parent, .. } => parent,
            Mutation::RemoveComponent { name } => name,
        }
    }

    /// Apply to a working copy of the specs
    pub fn apply(&self, specs: &mut BTreeMap<String, ComponentSpec>) -> Result<(), SchemaIssue> {
        match self {
            Mutation::CreateComponent { parent, spec } => {
                if specs.contains_key(&spec.name) {
                    return Err(SchemaIssue::at(&spec.name, "name", "component already exists"));
                }
                let parent_spec = existing(specs, parent)?;
                if !parent_spec.children.contains(&spec.name) {
                    parent_spec.children.push(spec.name.clone());
                }
                specs.insert(spec.name.clone(), spec.clone());
                Ok(())
            }
            Mutation::RemoveComponent { name } => remove_component(specs, name),
            _ => {
                let spec = existing(specs, self.component())?;
                self.edit(spec)
            }
        }
    }

    fn edit(&self, spec: &mut ComponentSpec) -> Result<(), SchemaIssue> {
        let name = spec.name.clone();
        match self {
            Mutation::AddProp { prop, .. } => {
                insert_unique(&mut spec.props, prop.clone(), |p| &p.name, &name, "props")
            }
            Mutation::RemoveProp { name: member, .. } => {
                remove_named(&mut spec.props, member, |p| &p.name, &name, "props")
            }
            Mutation::ModifyProp { prop, .. } => {
                replace_named(&mut spec.props, prop.clone(), |p| &p.name, &name, "props")
            }
            Mutation::AddState { state, .. } => {
                insert_unique(&mut spec.state, state.clone(), |s| &s.name, &name, "state")
            }
            Mutation::RemoveState { name: member, .. } => {
                remove_named(&mut spec.state, member, |s| &s.name, &name, "state")
            }
            Mutation::ModifyState { state, .. } => {
                replace_named(&mut spec.state, state.clone(), |s| &s.name, &name, "state")
            }
            Mutation::AddHandler { handler, .. } => {
                insert_unique(&mut spec.handlers, handler.clone(), |h| &h.name, &name, "handlers")
            }
            Mutation::RemoveHandler { name: member, .. } => {
                remove_named(&mut spec.handlers, member, |h| &h.name, &name, "handlers")
            }
            Mutation::ModifyHandler { handler, .. } => {
                replace_named(&mut spec.handlers, handler.clone(), |h| &h.name, &name, "handlers")
            }
            Mutation::AddChild { child, .. } => {
                if spec.children.contains(child) {
                    return Err(SchemaIssue::at(&name, "children", format!("already composes '{}'", child)));
                }
                spec.children.push(child.clone());
                Ok(())
            }
            Mutation::RemoveChild { child, .. } => {
                let before = spec.children.len();
                spec.children.retain(|c| c != child);
                if spec.children.len() == before {
                    return Err(SchemaIssue::at(&name, "children", format!("does not compose '{}'", child)));
                }
                Ok(())
            }
            Mutation::SetStyle {
                target,
                property,
                value,
                ..
            } => {
                let styles = &mut spec.layout.styles;
                match styles
                    .iter_mut()
                    .find(|h| h.target == *target && h.property == *property)
                {
                    Some(hint) => hint.value = value.clone(),
                    None => styles.push(StyleHint {
                        target: target.clone(),
                        property: *property,
                        value: value.clone(),
                    }),
                }
                Ok(())
            }
            Mutation::ClearStyle {
                target, property, ..
            } => {
                spec.layout
                    .styles
                    .retain(|h| !(h.target == *target && h.property == *property));
                Ok(())
            }
            Mutation::SetLayout {
                arrangement,
                container,
                spacing,
                ..
            } => {
                if let Some(arrangement) = arrangement {
                    spec.layout.arrangement = *arrangement;
                }
                if let Some(container) = container {
                    spec.layout.container = *container;
                }
                if let Some(spacing) = spacing {
                    spec.layout.spacing = Some(spacing.clone());
                }
                Ok(())
            }
            Mutation::CreateComponent { .. } | Mutation::RemoveComponent { .. } => Ok(()),
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::AddProp { component, prop } => write!(f, "{}: add prop {}", component, prop.name),
            Mutation::RemoveProp { component, name } => write!(f, "{}: remove prop {}", component, name),
            Mutation::ModifyProp { component, prop } => write!(f, "{}: modify prop {}", component, prop.name),
            Mutation::AddState { component, state } => write!(f, "{}: add state {}", component, state.name),
            Mutation::RemoveState { component, name } => write!(f, "{}: remove state {}", component, name),
            Mutation::ModifyState { component, state } => write!(f, "{}: modify state {}", component, state.name),
            Mutation::AddHandler { component, handler } => write!(f, "{}: add handler {}", component, handler.name),
            Mutation::RemoveHandler { component, name } => write!(f, "{}: remove handler {}", component, name),
            Mutation::ModifyHandler { component, handler } => {
                write!(f, "{}: modify handler {}", component, handler.name)
            }
            Mutation::AddChild { component, child } => write!(f, "{}: compose {}", component, child),
            Mutation::RemoveChild { component, child } => write!(f, "{}: stop composing {}", component, child),
            Mutation::CreateComponent { parent, spec } => write!(f, "{}: create {}", parent, spec.name),
            Mutation::RemoveComponent { name } => write!(f, "remove component {}", name),
            Mutation::SetStyle {
                component,
                target,
                property,
                value,
            } => write!(f, "{}: {} {} = {}", component, target, property.css_name(), value),
            Mutation::ClearStyle {
                component,
                target,
                property,
            } => write!(f, "{}: clear {} {}", component, target, property.css_name()),
            Mutation::SetLayout { component, .. } => write!(f, "{}: set layout", component),
        }
    }
}

/// Give created components unique names and rewrite references to them.
///
/// Returns the final names of the created components.
pub fn allocate_names(mutations: &mut [Mutation], allocator: &mut NameAllocator) -> BTreeSet<String> {
    let mut renamed: BTreeMap<String, String> = BTreeMap::new();
    let mut created = BTreeSet::new();
    for mutation in mutations.iter_mut() {
        if let Mutation::CreateComponent { spec, .. } = mutation {
            let name = allocator.allocate(&spec.name);
            if name != spec.name {
                renamed.insert(spec.name.clone(), name.clone());
            }
            spec.name = name.clone();
            created.insert(name);
        }
    }
    if renamed.is_empty() {
        return created;
    }

    let rename = |name: &mut String| {
        if let Some(new) = renamed.get(name.as_str()) {
            *name = new.clone();
        }
    };
    for mutation in mutations.iter_mut() {
        match mutation {
            Mutation::AddChild { component, child } | Mutation::RemoveChild { component, child } => {
                rename(component);
                rename(child);
            }
            Mutation::CreateComponent { parent, spec } => {
                rename(parent);
                spec.children.iter_mut().for_each(rename);
            }
            Mutation::RemoveComponent { name } => rename(name),
            Mutation::AddProp { component, .. }
            | Mutation::RemoveProp { component, .. }
            | Mutation::ModifyProp { component, .. }
            | Mutation::AddState { component, .. }
            | Mutation::RemoveState { component, .. }
            | Mutation::ModifyState { component, .. }
            | Mutation::AddHandler { component, .. }
            | Mutation::RemoveHandler { component, .. }
            | Mutation::ModifyHandler { component, .. }
            | Mutation::SetStyle { component, .. }
            | Mutation::ClearStyle { component, .. }
            | Mutation::SetLayout { component, .. } => rename(component),
        }
    }
    created
}

fn existing<'a>(
    specs: &'a mut BTreeMap<String, ComponentSpec>,
    name: &str,
) -> Result<&'a mut ComponentSpec, SchemaIssue> {
    specs
        .get_mut(name)
        .ok_or_else(|| SchemaIssue::batch(format!("unknown component '{}'", name)))
}

fn insert_unique<T>(
    items: &mut Vec<T>,
    item: T,
    key: impl Fn(&T) -> &String,
    component: &str,
    attribute: &str,
) -> Result<(), SchemaIssue> {
    if items.iter().any(|i| key(i) == key(&item)) {
        return Err(SchemaIssue::at(
            component,
            format!("{}.{}", attribute, key(&item)),
            "already exists",
        ));
    }
    items.push(item);
    Ok(())
}

fn remove_named<T>(
    items: &mut Vec<T>,
    name: &str,
    key: impl Fn(&T) -> &String,
    component: &str,
    attribute: &str,
) -> Result<(), SchemaIssue> {
    let before = items.len();
    items.retain(|i| key(i) != name);
    if items.len() == before {
        return Err(SchemaIssue::at(component, format!("{}.{}", attribute, name), "does not exist"));
    }
    Ok(())
}

fn replace_named<T>(
    items: &mut [T],
    item: T,
    key: impl Fn(&T) -> &String,
    component: &str,
    attribute: &str,
) -> Result<(), SchemaIssue> {
    match items.iter_mut().find(|i| key(i) == key(&item)) {
        Some(slot) => {
            *slot = item;
            Ok(())
        }
        None => Err(SchemaIssue::at(
            component,
            format!("{}.{}", attribute, key(&item)),
            "does not exist",
        )),
    }
}

fn remove_component(specs: &mut BTreeMap<String, ComponentSpec>, name: &str) -> Result<(), SchemaIssue> {
    if !specs.contains_key(name) {
        return Err(SchemaIssue::batch(format!("unknown component '{}'", name)));
    }
    let composed = specs.values().any(|s| s.children.iter().any(|c| c == name));
    if !composed {
        return Err(SchemaIssue::at(name, "name", "the root component cannot be removed"));
    }

    let mut doomed = vec![name.to_string()];
    while let Some(next) = doomed.pop() {
        let Some(removed) = specs.remove(&next) else {
            continue;
        };
        for spec in specs.values_mut() {
            spec.children.retain(|c| *c != next);
        }
        for child in removed.children {
            let still_composed = specs.values().any(|s| s.children.contains(&child));
            if !still_composed {
                doomed.push(child);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uiforge_core::component::TypeRef;

    fn project() -> BTreeMap<String, ComponentSpec> {
        let mut app = ComponentSpec::new("App");
        app.children = vec!["Panel".into()];
        let mut panel = ComponentSpec::new("Panel");
        panel.children = vec!["Badge".into()];
        let badge = ComponentSpec::new("Badge");
        [app, panel, badge]
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect()
    }

    #[test]
    fn test_deserialize_mutation_batch() {
        let batch: MutationBatch = serde_json::from_value(json!({
            "mutations": [
                {"op": "set_style", "component": "Counter", "target": "increment", "property": "background", "value": "red"},
                {"op": "add_prop", "component": "Counter", "prop": {"name": "step", "type": "number", "required": false, "default": 1}},
                {"op": "set_layout", "component": "Counter", "container": "card"}
            ]
        }))
        .unwrap();
        assert_eq!(batch.mutations.len(), 3);
        assert_eq!(batch.mutations[0].to_string(), "Counter: increment background-color = red");
        assert!(matches!(
            &batch.mutations[2],
            Mutation::SetLayout { container: Some(Container::Card), arrangement: None, .. }
        ));
    }

    #[test]
    fn test_set_style_replaces_existing_hint() {
        let mut specs = project();
        for value in ["red", "danger-default"] {
            Mutation::SetStyle {
                component: "Badge".into(),
                target: "root".into(),
                property: StyleProperty::Background,
                value: value.into(),
            }
            .apply(&mut specs)
            .unwrap();
        }
        let styles = &specs["Badge"].layout.styles;
        assert_eq!(styles.len(), 1);
        assert_eq!(styles[0].value, "danger-default");
    }

    #[test]
    fn test_modify_unknown_prop_is_an_issue() {
        let mut specs = project();
        let err = Mutation::ModifyProp {
            component: "Badge".into(),
            prop: PropSpec {
                name: "tone".into(),
                ty: TypeRef::String,
                required: true,
                default: None,
            },
        }
        .apply(&mut specs)
        .unwrap_err();
        assert_eq!(err.to_string(), "Badge.props.tone: does not exist");
    }

    #[test]
    fn test_remove_component_takes_orphaned_descendants() {
        let mut specs = project();
        Mutation::RemoveComponent { name: "Panel".into() }
            .apply(&mut specs)
            .unwrap();
        assert_eq!(specs.keys().collect::<Vec<_>>(), vec!["App"]);
        assert!(specs["App"].children.is_empty());
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let mut specs = project();
        assert!(Mutation::RemoveComponent { name: "App".into() }.apply(&mut specs).is_err());
        assert_eq!(specs.len(), 3);
    }

    #[test]
    fn test_created_names_are_allocated_and_references_follow() {
        let mut mutations = vec![
            Mutation::CreateComponent {
                parent: "App".into(),
                spec: ComponentSpec::new("Badge"),
            },
            Mutation::SetStyle {
                component: "Badge".into(),
                target: "root".into(),
                property: StyleProperty::Color,
                value: "white".into(),
            },
        ];
        let mut allocator = NameAllocator::new(["App", "Panel", "Badge"]);
        let created = allocate_names(&mut mutations, &mut allocator);
        assert_eq!(created.into_iter().collect::<Vec<_>>(), vec!["Badge2"]);
        assert_eq!(mutations[1].component(), "Badge2");

        let mut specs = project();
        for m in &mutations {
            m.apply(&mut specs).unwrap();
        }
        assert_eq!(specs["App"].children, vec!["Panel", "Badge2"]);
    }
}
