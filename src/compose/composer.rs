//! Fragment composer: turns a scenario request into a document

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use super::anchor::{AnchorRule, Placement, PlacementTree};
use super::request::ScenarioRequest;
use super::ComposeError;
use crate::profile::FormatRules;
use crate::template::{self, Segment, Template, TemplateStore};

/// A rendered block and how it was placed
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub text: String,
    pub placement: Placement,
}

/// Ordered sequence of rendered blocks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComposedDocument {
    blocks: Vec<Block>,
}

impl ComposedDocument {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Blocks that came from request entries
    pub fn entry_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.placement != Placement::Skeleton)
    }

    /// Concatenated document text
    pub fn to_text(&self) -> String {
        self.blocks.iter().map(|b| b.text.as_str()).collect()
    }
}

impl fmt::Display for ComposedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            f.write_str(&block.text)?;
        }
        Ok(())
    }
}

/// An entry that passed validation
struct Checked<'a> {
    template: &'a Template,
    key: Option<String>,
    /// Referenced kind and name for `after` anchors
    after: Option<(String, String)>,
}

/// Composes scenario documents from a template store
pub struct Composer<'a> {
    store: &'a TemplateStore,
    rules: &'a FormatRules,
}

impl<'a> Composer<'a> {
    pub fn new(store: &'a TemplateStore, rules: &'a FormatRules) -> Self {
        Self { store, rules }
    }

    /// Validate the whole request, then render and place every entry.
    ///
    /// Nothing is rendered unless the request is valid.
    pub fn compose(&self, request: &ScenarioRequest) -> Result<ComposedDocument, ComposeError> {
        let base = self.check_base(request)?;
        let checked = self.check_entries(base, request)?;

        let skeleton = template::render_skeleton(base, &request.bindings, self.rules)
            .map_err(|source| ComposeError::Base {
                template: base.id.clone(),
                source,
            })?;

        let mut tree = PlacementTree::new(base.anchor_points().iter().cloned());
        let mut placed: HashMap<(String, String), usize> = HashMap::new();

        for (index, (entry, checked)) in request.entries.iter().zip(&checked).enumerate() {
            let template = checked.template;
            let mut text = template::render(template, &entry.bindings, self.rules)
                .map_err(|source| ComposeError::Render {
                    index,
                    template: template.id.clone(),
                    source,
                })?;
            if !text.ends_with('\n') {
                text.push('\n');
            }

            let node = match (&template.anchor, &checked.after) {
                (Some(AnchorRule::Section(section)), _) => tree.push_section(section, text),
                (_, Some((kind, key))) => {
                    let unresolved = || ComposeError::UnresolvedAnchor {
                        index,
                        template: template.id.clone(),
                        kind: kind.clone(),
                        key: key.clone(),
                    };
                    let target = *placed
                        .get(&(kind.clone(), key.clone()))
                        .ok_or_else(unresolved)?;
                    tree.push_after(target, kind, key, text)
                }
                _ => None,
            };
            let node = node.ok_or_else(|| ComposeError::UnknownSection {
                index,
                template: template.id.clone(),
                section: template.anchor.as_ref().map(|a| a.to_string()).unwrap_or_default(),
            })?;
            tracing::debug!(
                "Placed entry {} ({}) {}",
                index,
                template.id,
                template.anchor.as_ref().map(|a| a.to_string()).unwrap_or_default()
            );

            if let Some(key) = &checked.key {
                placed.insert((template.kind.clone(), key.clone()), node);
            }
        }

        let mut blocks = Vec::new();
        for segment in skeleton {
            match segment {
                Segment::Text(text) => blocks.push(Block {
                    text,
                    placement: Placement::Skeleton,
                }),
                Segment::Anchor(section) => {
                    let mut placed_blocks = Vec::new();
                    tree.drain_section(&section, &mut placed_blocks);
                    blocks.extend(
                        placed_blocks
                            .into_iter()
                            .map(|(text, placement)| Block { text, placement }),
                    );
                }
            }
        }

        tracing::info!(
            "Composed {} entries into {} blocks using base template {}",
            request.entries.len(),
            blocks.len(),
            base.id
        );
        Ok(ComposedDocument { blocks })
    }

    fn check_base(&self, request: &ScenarioRequest) -> Result<&'a Template, ComposeError> {
        let base = self
            .store
            .get(&request.base)
            .ok_or_else(|| ComposeError::UnknownBase {
                template: request.base.clone(),
            })?;
        if !base.is_base() {
            return Err(ComposeError::NotBase {
                template: base.id.clone(),
            });
        }
        template::check_bindings(base, &request.bindings).map_err(|source| ComposeError::Base {
            template: base.id.clone(),
            source,
        })?;
        Ok(base)
    }

    fn check_entries(
        &self,
        base: &Template,
        request: &ScenarioRequest,
    ) -> Result<Vec<Checked<'a>>, ComposeError> {
        // Names known per kind: what the base provides plus every keyed entry
        let mut known: BTreeMap<String, BTreeSet<String>> = base
            .provides
            .iter()
            .map(|(kind, names)| (kind.clone(), names.iter().cloned().collect()))
            .collect();
        let mut declared_at: HashMap<(String, String), usize> = HashMap::new();
        let mut checked = Vec::with_capacity(request.entries.len());

        for (index, entry) in request.entries.iter().enumerate() {
            let template = self
                .store
                .get(&entry.template)
                .ok_or_else(|| ComposeError::UnknownTemplate {
                    index,
                    template: entry.template.clone(),
                })?;
            if template.is_base() {
                return Err(ComposeError::BaseAsEntry {
                    index,
                    template: template.id.clone(),
                });
            }
            template::check_bindings(template, &entry.bindings).map_err(|source| {
                ComposeError::Entry {
                    index,
                    template: template.id.clone(),
                    source,
                }
            })?;

            if let Some(AnchorRule::Section(section)) = &template.anchor {
                if !base.anchor_points().contains(section) {
                    return Err(ComposeError::UnknownSection {
                        index,
                        template: template.id.clone(),
                        section: section.clone(),
                    });
                }
            }

            let key = match &template.key {
                Some(placeholder) => {
                    let key = single_name(entry.bindings.get(placeholder)).ok_or_else(|| {
                        ComposeError::InvalidKey {
                            index,
                            template: template.id.clone(),
                            placeholder: placeholder.clone(),
                        }
                    })?;
                    if !known.entry(template.kind.clone()).or_default().insert(key.clone()) {
                        return Err(ComposeError::DuplicateKey {
                            index,
                            kind: template.kind.clone(),
                            key,
                        });
                    }
                    declared_at.insert((template.kind.clone(), key.clone()), index);
                    Some(key)
                }
                None => None,
            };

            checked.push(Checked {
                template,
                key,
                after: None,
            });
        }

        // References may point forwards; `after` anchors may not
        let entries = request.entries.iter().zip(checked.iter_mut());
        for (index, (entry, checked)) in entries.enumerate() {
            let template = checked.template;
            for (placeholder, kind) in &template.references {
                let names = entry
                    .bindings
                    .get(placeholder)
                    .map(|v| v.names())
                    .unwrap_or_default();
                for name in names {
                    let exists = known.get(kind).is_some_and(|set| set.contains(&name));
                    if !exists {
                        return Err(ComposeError::UnknownReference {
                            index,
                            template: template.id.clone(),
                            placeholder: placeholder.clone(),
                            kind: kind.clone(),
                            name,
                        });
                    }
                }
            }

            if let Some(AnchorRule::After(placeholder)) = &template.anchor {
                let kind = template.references.get(placeholder).cloned().unwrap_or_default();
                let key = single_name(entry.bindings.get(placeholder)).unwrap_or_default();
                let earlier = declared_at
                    .get(&(kind.clone(), key.clone()))
                    .is_some_and(|&at| at < index);
                if !earlier {
                    return Err(ComposeError::UnresolvedAnchor {
                        index,
                        template: template.id.clone(),
                        kind,
                        key,
                    });
                }
                checked.after = Some((kind, key));
            }
        }

        tracing::debug!("Validated {} entries", checked.len());
        Ok(checked)
    }
}

fn single_name(value: Option<&template::Value>) -> Option<String> {
    let mut names = value?.names();
    if names.len() == 1 {
        names.pop()
    } else {
        None
    }
}

/// Compose a request with the given store and formatting rules
pub fn compose(
    store: &TemplateStore,
    rules: &FormatRules,
    request: &ScenarioRequest,
) -> Result<ComposedDocument, ComposeError> {
    Composer::new(store, rules).compose(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::EntryRequest;
    use crate::profile::Profile;
    use crate::template::PlaceholderClass;
    use pretty_assertions::assert_eq;

    fn store() -> TemplateStore {
        let mut store = TemplateStore::new();
        store
            .register(
                Template::parse("base", "base", "HEAD {title}\n{@bodies}\nMID\n{@platforms}\nTAIL\n")
                    .expect("parse")
                    .with_provides("body", ["Earth"]),
            )
            .expect("register base");
        store
            .register(
                Template::parse("sat", "platform", "SAT \"{name}\" AROUND \"{body}\"")
                    .expect("parse")
                    .with_key("name")
                    .with_class("name", PlaceholderClass::Name)
                    .with_reference("body", "body")
                    .with_anchor(AnchorRule::Section("platforms".into())),
            )
            .expect("register sat");
        store
            .register(
                Template::parse("body", "body", "BODY \"{name}\"\n")
                    .expect("parse")
                    .with_key("name")
                    .with_anchor(AnchorRule::Section("bodies".into())),
            )
            .expect("register body");
        store
            .register(
                Template::parse("tx", "transmitter", "TX \"{owner}\"\n")
                    .expect("parse")
                    .with_key("owner")
                    .with_reference("owner", "platform")
                    .with_anchor(AnchorRule::After("owner".into())),
            )
            .expect("register tx");
        store
            .register(
                Template::parse("misplaced", "view", "VIEW\n")
                    .expect("parse")
                    .with_anchor(AnchorRule::Section("views".into())),
            )
            .expect("register misplaced");
        store
    }

    fn compose_with(request: &ScenarioRequest) -> Result<ComposedDocument, ComposeError> {
        let profile = Profile::default();
        compose(&store(), &profile.format, request)
    }

    fn sat(name: &str, body: &str) -> EntryRequest {
        EntryRequest::new("sat").with("name", name).with("body", body)
    }

    #[test]
    fn test_compose_sections_and_after() {
        let request = ScenarioRequest::new("base")
            .with_binding("title", "demo")
            .with_entry(sat("A", "Earth"))
            .with_entry(sat("B", "Luna"))
            .with_entry(EntryRequest::new("tx").with("owner", "A"))
            .with_entry(EntryRequest::new("body").with("name", "Luna"));
        let doc = compose_with(&request).expect("Should compose");
        assert_eq!(
            doc.to_text(),
            "HEAD demo\nBODY \"Luna\"\nMID\nSAT \"A\" AROUND \"Earth\"\nTX \"A\"\nSAT \"B\" AROUND \"Luna\"\nTAIL\n"
        );
        let placements: Vec<_> = doc.entry_blocks().map(|b| b.placement.clone()).collect();
        assert_eq!(
            placements,
            vec![
                Placement::Section("bodies".into()),
                Placement::Section("platforms".into()),
                Placement::After {
                    kind: "platform".into(),
                    key: "A".into()
                },
                Placement::Section("platforms".into()),
            ]
        );
    }

    #[test]
    fn test_compose_is_deterministic() {
        let request = ScenarioRequest::new("base")
            .with_binding("title", "demo")
            .with_entry(sat("A", "Earth"))
            .with_entry(EntryRequest::new("tx").with("owner", "A"));
        let first = compose_with(&request).expect("Should compose");
        let second = compose_with(&request).expect("Should compose");
        assert_eq!(first.to_text(), second.to_text());
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let request = ScenarioRequest::new("base")
            .with_binding("title", "demo")
            .with_entry(sat("A", "Pluto"));
        let err = compose_with(&request).expect_err("Should fail");
        assert!(matches!(
            err,
            ComposeError::UnknownReference { index: 0, ref name, .. } if name == "Pluto"
        ));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let request = ScenarioRequest::new("base")
            .with_binding("title", "demo")
            .with_entry(sat("A", "Earth"))
            .with_entry(sat("A", "Earth"));
        let err = compose_with(&request).expect_err("Should fail");
        assert!(matches!(err, ComposeError::DuplicateKey { index: 1, .. }));
    }

    #[test]
    fn test_key_clashing_with_provided_entry_rejected() {
        let request = ScenarioRequest::new("base")
            .with_binding("title", "demo")
            .with_entry(EntryRequest::new("body").with("name", "Earth"));
        let err = compose_with(&request).expect_err("Should fail");
        assert!(matches!(err, ComposeError::DuplicateKey { index: 0, .. }));
    }

    #[test]
    fn test_after_anchor_must_follow_its_target() {
        let request = ScenarioRequest::new("base")
            .with_binding("title", "demo")
            .with_entry(EntryRequest::new("tx").with("owner", "A"))
            .with_entry(sat("A", "Earth"));
        let err = compose_with(&request).expect_err("Should fail");
        assert!(matches!(err, ComposeError::UnresolvedAnchor { index: 0, ref key, .. } if key == "A"));
    }

    #[test]
    fn test_missing_binding_reported_with_entry() {
        let request = ScenarioRequest::new("base")
            .with_binding("title", "demo")
            .with_entry(EntryRequest::new("sat").with("name", "A"));
        let err = compose_with(&request).expect_err("Should fail");
        match err {
            ComposeError::Entry { index, template, source } => {
                assert_eq!(index, 0);
                assert_eq!(template, "sat");
                assert!(matches!(
                    source,
                    template::TemplateError::MissingBinding { ref placeholder, .. } if placeholder == "body"
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_section_rejected() {
        let request = ScenarioRequest::new("base")
            .with_binding("title", "demo")
            .with_entry(EntryRequest::new("misplaced"));
        let err = compose_with(&request).expect_err("Should fail");
        assert!(matches!(err, ComposeError::UnknownSection { .. }));
    }

    #[test]
    fn test_base_checks() {
        let missing = ScenarioRequest::new("base");
        assert!(matches!(compose_with(&missing), Err(ComposeError::Base { .. })));
        let fragment = ScenarioRequest::new("sat");
        assert!(matches!(compose_with(&fragment), Err(ComposeError::NotBase { .. })));
        let unknown = ScenarioRequest::new("nope");
        assert!(matches!(compose_with(&unknown), Err(ComposeError::UnknownBase { .. })));
        let entry = ScenarioRequest::new("base")
            .with_binding("title", "demo")
            .with_entry(EntryRequest::new("base"));
        assert!(matches!(compose_with(&entry), Err(ComposeError::BaseAsEntry { .. })));
    }

    #[test]
    fn test_empty_sections_leave_no_gap() {
        let request = ScenarioRequest::new("base").with_binding("title", "demo");
        let doc = compose_with(&request).expect("Should compose");
        assert_eq!(doc.to_text(), "HEAD demo\nMID\nTAIL\n");
    }
}
