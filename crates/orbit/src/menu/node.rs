use super::behavior::{BehaviorTable, ClickBehavior, GestureKind, Modifiers, NodeBehaviors};
use derive_more::{AsRef, Deref, Display, From, Into};
use orbitctl::icon::IconName;
use serde::{Deserialize, Serialize};
use serde_with::DeserializeFromStr;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum::{Display as StrumDisplay, EnumString};

/// Metadata key holding the content identity of a branch (e.g. a folder path).
pub const META_CONTENT: &str = "content";
pub const META_PATH: &str = "path";
pub const META_RUNNING: &str = "running";

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    Deref,
    From,
    Into,
    AsRef,
)]
#[serde(transparent)]
pub struct NodeId(String);

orbitctl::impl_string_newtype!(NodeId);

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    Deref,
    From,
    Into,
    AsRef,
)]
#[serde(transparent)]
pub struct ProviderId(String);

orbitctl::impl_string_newtype!(ProviderId);

/// Identifies one instance of dynamic content, e.g. a folder path.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    Deref,
    From,
    Into,
    AsRef,
)]
#[serde(transparent)]
pub struct ContentId(String);

orbitctl::impl_string_newtype!(ContentId);

/// Names a ring configuration.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    Deref,
    From,
    Into,
    AsRef,
)]
#[serde(transparent)]
pub struct ConfigId(String);

orbitctl::impl_string_newtype!(ConfigId);

/// Node identity across providers. Two providers may emit the same `NodeId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub provider_id: ProviderId,
    pub node_id: NodeId,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    DeserializeFromStr,
    EnumString,
    StrumDisplay,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Leaf,
    Category,
    Folder,
}

#[derive(Debug, Clone, PartialEq, From)]
pub enum MetaValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Path(PathBuf),
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Path(p) => p.to_str(),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            Self::Text(s) => Some(Path::new(s)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum IconRef {
    #[default]
    None,
    Named(IconName),
    File(PathBuf),
}

/// One selectable or expandable unit of content.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub icon: IconRef,
    pub metadata: BTreeMap<String, MetaValue>,
    pub provider_id: ProviderId,
    pub children: Option<Vec<FunctionNode>>,
    pub needs_dynamic_loading: bool,
    pub preview: Option<PathBuf>,
    pub behaviors: NodeBehaviors,
}

impl FunctionNode {
    fn base(
        id: impl Into<String>,
        name: impl Into<String>,
        node_type: NodeType,
        provider_id: &ProviderId,
    ) -> Self {
        Self {
            id: NodeId::new(id),
            name: name.into(),
            node_type,
            icon: IconRef::None,
            metadata: BTreeMap::new(),
            provider_id: provider_id.clone(),
            children: None,
            needs_dynamic_loading: false,
            preview: None,
            behaviors: NodeBehaviors::default(),
        }
    }

    pub fn leaf(id: impl Into<String>, name: impl Into<String>, provider_id: &ProviderId) -> Self {
        Self::base(id, name, NodeType::Leaf, provider_id)
    }

    /// A branch that opens as a child ring on click or on crossing its outer edge.
    pub fn category(
        id: impl Into<String>,
        name: impl Into<String>,
        provider_id: &ProviderId,
    ) -> Self {
        let mut node = Self::base(id, name, NodeType::Category, provider_id);
        node.behaviors.on_left_click = BehaviorTable::always(ClickBehavior::Expand);
        node.behaviors.on_boundary_cross = BehaviorTable::always(ClickBehavior::Expand);
        node
    }

    /// A branch whose click drills down in place; crossing the edge still branches out.
    pub fn folder(id: impl Into<String>, name: impl Into<String>, provider_id: &ProviderId) -> Self {
        let mut node = Self::base(id, name, NodeType::Folder, provider_id);
        node.behaviors.on_left_click = BehaviorTable::always(ClickBehavior::NavigateInto);
        node.behaviors.on_boundary_cross = BehaviorTable::always(ClickBehavior::Expand);
        node
    }

    pub fn with_children(mut self, children: Vec<FunctionNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_dynamic_loading(mut self) -> Self {
        self.needs_dynamic_loading = true;
        self
    }

    pub fn with_icon(mut self, icon: IconRef) -> Self {
        self.icon = icon;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }

    pub fn with_preview(mut self, preview: PathBuf) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn on(mut self, gesture: GestureKind, modifiers: Modifiers, behavior: ClickBehavior) -> Self {
        self.behaviors.table_mut(gesture).insert(modifiers, behavior);
        self
    }

    pub fn key(&self) -> NodeKey {
        NodeKey {
            provider_id: self.provider_id.clone(),
            node_id: self.id.clone(),
        }
    }

    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    pub fn path(&self) -> Option<&Path> {
        self.meta(META_PATH).and_then(MetaValue::as_path)
    }

    /// Content identity of the ring or panel this node's children populate.
    pub fn content_id(&self) -> ContentId {
        self.meta(META_CONTENT)
            .or_else(|| self.meta(META_PATH))
            .and_then(MetaValue::as_text)
            .map(ContentId::new)
            .unwrap_or_else(|| ContentId::new(self.id.as_str()))
    }

    pub fn is_running(&self) -> bool {
        self.meta(META_RUNNING)
            .and_then(MetaValue::as_bool)
            .unwrap_or(false)
    }

    pub fn child_nodes(&self) -> &[FunctionNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn can_expand(&self) -> bool {
        self.needs_dynamic_loading || !self.child_nodes().is_empty()
    }

    /// Neither actionable nor expandable; every gesture on it resolves to `None`.
    pub fn is_inert(&self) -> bool {
        !self.can_expand() && !self.behaviors.has_actionable()
    }

    pub fn resolve(&self, gesture: GestureKind, modifiers: Modifiers) -> ClickBehavior {
        self.behaviors.resolve(gesture, modifiers)
    }
}
