//! Typed attribute schema.
//!
//! [`AttrKind`] lists the attributes the canonical format knows about and
//! which subtypes they are legal (and required) on. [`TypedAttr`] pairs a
//! kind with a parsed value type so callers read and write values through
//! [`get`] and [`set`], which reject attributes the element's current
//! subtype does not carry.

use std::fmt;
use std::str::FromStr;

use super::element::type_of;
use super::types::{BlockType, ContainerType, CoreType, InlineType, SpanType, SubType};
use super::{BB_NS, BB_PREFIX, UTD_NS, UTD_PREFIX};
use crate::dom::{Dom, NodeId, QName};
use crate::error::{Error, Result};

/// Known canonical attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    ListLevel,
    ItemLevel,
    Emphasis,
    Href,
    TableType,
    PrintPage,
    Src,
    OverrideStyle,
}

impl AttrKind {
    pub const ALL: &'static [AttrKind] = &[
        AttrKind::ListLevel,
        AttrKind::ItemLevel,
        AttrKind::Emphasis,
        AttrKind::Href,
        AttrKind::TableType,
        AttrKind::PrintPage,
        AttrKind::Src,
        AttrKind::OverrideStyle,
    ];

    pub fn namespace(self) -> &'static str {
        match self {
            AttrKind::OverrideStyle => UTD_NS,
            _ => BB_NS,
        }
    }

    pub fn local_name(self) -> &'static str {
        match self {
            AttrKind::ListLevel => "listLevel",
            AttrKind::ItemLevel => "itemLevel",
            AttrKind::Emphasis => "emphasis",
            AttrKind::Href => "href",
            AttrKind::TableType => "tableType",
            AttrKind::PrintPage => "printPage",
            AttrKind::Src => "src",
            AttrKind::OverrideStyle => "overrideStyle",
        }
    }

    pub fn qname(self) -> QName {
        let prefix = match self {
            AttrKind::OverrideStyle => UTD_PREFIX,
            _ => BB_PREFIX,
        };
        QName::prefixed(self.namespace(), prefix, self.local_name())
    }

    /// Look up the kind for a namespaced attribute name.
    pub fn from_name(ns: Option<&str>, local: &str) -> Option<Self> {
        AttrKind::ALL
            .iter()
            .copied()
            .find(|k| ns == Some(k.namespace()) && local == k.local_name())
    }

    pub fn is_legal_for(self, ty: SubType) -> bool {
        match self {
            AttrKind::ListLevel => ty == SubType::LIST,
            AttrKind::ItemLevel => ty == SubType::LIST_ITEM,
            AttrKind::Emphasis => ty == SubType::EMPHASIS,
            AttrKind::Href => ty == SubType::Inline(InlineType::Link),
            AttrKind::TableType => ty == SubType::Container(ContainerType::Table),
            AttrKind::PrintPage => ty == SubType::Block(BlockType::PageNum),
            AttrKind::Src => matches!(
                ty,
                SubType::Container(ContainerType::Image) | SubType::Span(SpanType::Image)
            ),
            AttrKind::OverrideStyle => matches!(ty.core(), CoreType::Container | CoreType::Block),
        }
    }

    pub fn is_required_for(self, ty: SubType) -> bool {
        match self {
            AttrKind::ListLevel | AttrKind::ItemLevel | AttrKind::Emphasis | AttrKind::PrintPage => {
                self.is_legal_for(ty)
            }
            _ => false,
        }
    }

    /// Value given to a required attribute on a freshly created element.
    pub fn default_value(self) -> &'static str {
        match self {
            AttrKind::ListLevel | AttrKind::ItemLevel => "0",
            _ => "",
        }
    }

    /// Check that a raw value parses for this kind.
    pub fn check_value(self, raw: &str) -> std::result::Result<(), String> {
        match self {
            AttrKind::ListLevel | AttrKind::ItemLevel => raw
                .parse::<u32>()
                .map(|_| ())
                .map_err(|_| format!("expected a non-negative integer, found '{raw}'")),
            AttrKind::Emphasis => raw.parse::<EmphasisSet>().map(|_| ()),
            AttrKind::TableType => raw.parse::<TableKind>().map(|_| ()),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qname().qualified())
    }
}

/// A kind of emphasis carried by `INLINE.EMPHASIS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmphasisType {
    Bold,
    Italic,
    Underline,
    Script,
    TransNote,
}

impl EmphasisType {
    pub const ALL: &'static [EmphasisType] = &[
        EmphasisType::Bold,
        EmphasisType::Italic,
        EmphasisType::Underline,
        EmphasisType::Script,
        EmphasisType::TransNote,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EmphasisType::Bold => "BOLD",
            EmphasisType::Italic => "ITALIC",
            EmphasisType::Underline => "UNDERLINE",
            EmphasisType::Script => "SCRIPT",
            EmphasisType::TransNote => "TRANS_NOTE",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Set of emphasis types, written space-separated in canonical order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EmphasisSet(u8);

impl EmphasisSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, emphasis: EmphasisType) {
        self.0 |= emphasis.bit();
    }

    pub fn contains(self, emphasis: EmphasisType) -> bool {
        self.0 & emphasis.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: EmphasisSet) -> EmphasisSet {
        EmphasisSet(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = EmphasisType> {
        EmphasisType::ALL
            .iter()
            .copied()
            .filter(move |e| self.contains(*e))
    }
}

impl FromIterator<EmphasisType> for EmphasisSet {
    fn from_iter<I: IntoIterator<Item = EmphasisType>>(iter: I) -> Self {
        let mut set = EmphasisSet::new();
        for e in iter {
            set.insert(e);
        }
        set
    }
}

impl FromStr for EmphasisSet {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut set = EmphasisSet::new();
        for token in s.split_ascii_whitespace() {
            let emphasis = EmphasisType::ALL
                .iter()
                .copied()
                .find(|e| e.name() == token)
                .ok_or_else(|| format!("unknown emphasis '{token}'"))?;
            set.insert(emphasis);
        }
        if set.is_empty() {
            return Err("emphasis set is empty".to_string());
        }
        Ok(set)
    }
}

impl fmt::Display for EmphasisSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(e.name())?;
        }
        Ok(())
    }
}

/// Table layout hint carried by `CONTAINER.TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Simple,
    Listed,
    Stairstep,
    Linear,
}

impl TableKind {
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Simple => "SIMPLE",
            TableKind::Listed => "LISTED",
            TableKind::Stairstep => "STAIRSTEP",
            TableKind::Linear => "LINEAR",
        }
    }
}

impl FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SIMPLE" => Ok(TableKind::Simple),
            "LISTED" => Ok(TableKind::Listed),
            "STAIRSTEP" => Ok(TableKind::Stairstep),
            "LINEAR" => Ok(TableKind::Linear),
            _ => Err(format!("unknown table type '{s}'")),
        }
    }
}

/// An attribute with a parsed value type.
pub trait TypedAttr {
    const KIND: AttrKind;
    type Value;

    fn parse(raw: &str) -> Option<Self::Value>;
    fn format(value: &Self::Value) -> String;
}

macro_rules! string_attr {
    ($name:ident, $kind:expr) => {
        pub struct $name;

        impl TypedAttr for $name {
            const KIND: AttrKind = $kind;
            type Value = String;

            fn parse(raw: &str) -> Option<String> {
                Some(raw.to_string())
            }

            fn format(value: &String) -> String {
                value.clone()
            }
        }
    };
}

macro_rules! level_attr {
    ($name:ident, $kind:expr) => {
        pub struct $name;

        impl TypedAttr for $name {
            const KIND: AttrKind = $kind;
            type Value = u32;

            fn parse(raw: &str) -> Option<u32> {
                raw.trim().parse().ok()
            }

            fn format(value: &u32) -> String {
                value.to_string()
            }
        }
    };
}

level_attr!(ListLevel, AttrKind::ListLevel);
level_attr!(ItemLevel, AttrKind::ItemLevel);
string_attr!(Href, AttrKind::Href);
string_attr!(PrintPage, AttrKind::PrintPage);
string_attr!(Src, AttrKind::Src);
string_attr!(OverrideStyle, AttrKind::OverrideStyle);

pub struct Emphasis;

impl TypedAttr for Emphasis {
    const KIND: AttrKind = AttrKind::Emphasis;
    type Value = EmphasisSet;

    fn parse(raw: &str) -> Option<EmphasisSet> {
        raw.parse().ok()
    }

    fn format(value: &EmphasisSet) -> String {
        value.to_string()
    }
}

pub struct TableType;

impl TypedAttr for TableType {
    const KIND: AttrKind = AttrKind::TableType;
    type Value = TableKind;

    fn parse(raw: &str) -> Option<TableKind> {
        raw.parse().ok()
    }

    fn format(value: &TableKind) -> String {
        value.name().to_string()
    }
}

fn check_legal(dom: &Dom, node: NodeId, kind: AttrKind) -> Result<()> {
    let Some(ty) = type_of(dom, node) else {
        return Err(Error::TypeMismatch {
            node: dom.describe(node),
            expected: format!("an element carrying {kind}"),
            actual: "untyped node".to_string(),
        });
    };
    if !kind.is_legal_for(ty) {
        return Err(Error::structural(
            dom.describe(node),
            format!("{kind} is not legal on {ty}"),
        ));
    }
    Ok(())
}

/// Read a typed attribute. `Ok(None)` when absent.
pub fn get<A: TypedAttr>(dom: &Dom, node: NodeId) -> Result<Option<A::Value>> {
    check_legal(dom, node, A::KIND)?;
    let Some(raw) = dom.attr(node, Some(A::KIND.namespace()), A::KIND.local_name()) else {
        return Ok(None);
    };
    A::parse(raw).map(Some).ok_or_else(|| {
        Error::structural(
            dom.describe(node),
            format!("invalid value '{raw}' for {}", A::KIND),
        )
    })
}

/// Write a typed attribute.
pub fn set<A: TypedAttr>(dom: &mut Dom, node: NodeId, value: &A::Value) -> Result<()> {
    check_legal(dom, node, A::KIND)?;
    dom.set_attr(node, A::KIND.qname(), A::format(value));
    Ok(())
}

/// Remove a typed attribute, returning whether it was present.
pub fn remove<A: TypedAttr>(dom: &mut Dom, node: NodeId) -> bool {
    dom.remove_attr(node, Some(A::KIND.namespace()), A::KIND.local_name())
        .is_some()
}
