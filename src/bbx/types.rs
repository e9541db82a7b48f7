//! Closed hierarchy of canonical element types.
//!
//! Every canonical element has a core type (its local name in the BBX
//! namespace) and a subtype (its `bb:type` attribute). [`SubType`] is the
//! tagged union of both; its `Display` form is `CORE.SUB`, e.g.
//! `BLOCK.LIST_ITEM`.

use std::fmt;
use std::str::FromStr;

/// Defines a subtype enum with its canonical names and a list of all variants.
macro_rules! subtypes {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

subtypes!(
    /// Core categories, coarsest first.
    CoreType {
        Section => "SECTION",
        Container => "CONTAINER",
        Block => "BLOCK",
        Span => "SPAN",
        Inline => "INLINE",
    }
);

subtypes!(SectionType {
    Root => "ROOT",
    Other => "OTHER",
});

subtypes!(ContainerType {
    Other => "OTHER",
    List => "LIST",
    Table => "TABLE",
    TableRow => "TABLE_ROW",
    Image => "IMAGE",
    Prose => "PROSE",
    Style => "STYLE",
});

subtypes!(BlockType {
    Default => "DEFAULT",
    ListItem => "LIST_ITEM",
    Style => "STYLE",
    TableCell => "TABLE_CELL",
    PageNum => "PAGE_NUM",
});

subtypes!(SpanType {
    Other => "OTHER",
    Image => "IMAGE",
    Definition => "DEFINITION",
    Footnote => "FOOTNOTE",
});

subtypes!(InlineType {
    Emphasis => "EMPHASIS",
    Link => "LINK",
    LineBreak => "LINE_BREAK",
    MathMl => "MATHML",
});

/// A fully resolved canonical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubType {
    Section(SectionType),
    Container(ContainerType),
    Block(BlockType),
    Span(SpanType),
    Inline(InlineType),
}

impl SubType {
    pub const ROOT: SubType = SubType::Section(SectionType::Root);
    pub const LIST: SubType = SubType::Container(ContainerType::List);
    pub const LIST_ITEM: SubType = SubType::Block(BlockType::ListItem);
    pub const BLOCK_DEFAULT: SubType = SubType::Block(BlockType::Default);
    pub const EMPHASIS: SubType = SubType::Inline(InlineType::Emphasis);

    pub fn core(self) -> CoreType {
        match self {
            SubType::Section(_) => CoreType::Section,
            SubType::Container(_) => CoreType::Container,
            SubType::Block(_) => CoreType::Block,
            SubType::Span(_) => CoreType::Span,
            SubType::Inline(_) => CoreType::Inline,
        }
    }

    /// The subtype part alone (the `bb:type` value).
    pub fn name(self) -> &'static str {
        match self {
            SubType::Section(t) => t.name(),
            SubType::Container(t) => t.name(),
            SubType::Block(t) => t.name(),
            SubType::Span(t) => t.name(),
            SubType::Inline(t) => t.name(),
        }
    }

    /// Resolve a core type and `bb:type` value.
    pub fn from_parts(core: CoreType, subtype: &str) -> Option<Self> {
        Some(match core {
            CoreType::Section => SubType::Section(SectionType::from_name(subtype)?),
            CoreType::Container => SubType::Container(ContainerType::from_name(subtype)?),
            CoreType::Block => SubType::Block(BlockType::from_name(subtype)?),
            CoreType::Span => SubType::Span(SpanType::from_name(subtype)?),
            CoreType::Inline => SubType::Inline(InlineType::from_name(subtype)?),
        })
    }

    /// All subtypes of a core type.
    pub fn all_of(core: CoreType) -> Vec<SubType> {
        match core {
            CoreType::Section => SectionType::ALL.iter().map(|&t| SubType::Section(t)).collect(),
            CoreType::Container => ContainerType::ALL
                .iter()
                .map(|&t| SubType::Container(t))
                .collect(),
            CoreType::Block => BlockType::ALL.iter().map(|&t| SubType::Block(t)).collect(),
            CoreType::Span => SpanType::ALL.iter().map(|&t| SubType::Span(t)).collect(),
            CoreType::Inline => InlineType::ALL.iter().map(|&t| SubType::Inline(t)).collect(),
        }
    }

    /// Every subtype in the hierarchy.
    pub fn all() -> Vec<SubType> {
        CoreType::ALL.iter().flat_map(|&c| SubType::all_of(c)).collect()
    }
}

impl fmt::Display for CoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for SubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.core(), self.name())
    }
}

impl FromStr for CoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CoreType::from_name(s).ok_or_else(|| format!("unknown core type '{s}'"))
    }
}

impl FromStr for SubType {
    type Err = String;

    /// Parse `CORE.SUB`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (core, sub) = s
            .split_once('.')
            .ok_or_else(|| format!("expected CORE.SUBTYPE, found '{s}'"))?;
        let core: CoreType = core.parse()?;
        SubType::from_parts(core, sub).ok_or_else(|| format!("unknown subtype '{s}'"))
    }
}

/// Whether `child` may appear directly under `parent`.
pub fn is_valid_child(parent: SubType, child: SubType) -> bool {
    use SubType::*;

    match parent {
        Section(_) => admitted_by_section(child),
        Container(ContainerType::List) => matches!(
            child,
            Block(BlockType::ListItem | BlockType::PageNum)
                | Container(ContainerType::List | ContainerType::Image)
        ),
        Container(ContainerType::Table) => matches!(
            child,
            Container(ContainerType::TableRow) | Block(BlockType::Default | BlockType::PageNum)
        ),
        Container(ContainerType::TableRow) => child == Block(BlockType::TableCell),
        Container(_) => child.core() != CoreType::Section && admitted_by_section(child),
        Block(_) | Span(_) => matches!(child, Span(_) | Inline(_)),
        Inline(InlineType::Emphasis | InlineType::Link) => matches!(child, Inline(_)),
        Inline(InlineType::LineBreak | InlineType::MathMl) => false,
    }
}

fn admitted_by_section(child: SubType) -> bool {
    use SubType::*;

    match child {
        Section(SectionType::Root) => false,
        Section(_) => true,
        Container(ContainerType::TableRow) => false,
        Container(_) => true,
        Block(BlockType::ListItem | BlockType::TableCell) => false,
        Block(_) => true,
        Span(_) | Inline(_) => false,
    }
}

/// Whether non-whitespace text may appear directly under this type.
pub fn allows_text(ty: SubType) -> bool {
    matches!(
        ty,
        SubType::Block(_)
            | SubType::Span(_)
            | SubType::Inline(InlineType::Emphasis | InlineType::Link)
    )
}

/// Whether an element of type `from` may be re-tagged as `to` in place.
pub fn can_transform(from: SubType, to: SubType) -> bool {
    use SubType::*;

    if from == to {
        return true;
    }
    if from == SubType::ROOT || to == SubType::ROOT {
        return false;
    }
    if from.core() == to.core() {
        return true;
    }
    matches!(
        (from, to),
        (
            Section(SectionType::Other),
            Container(ContainerType::Other | ContainerType::Style)
        ) | (
            Container(ContainerType::Other | ContainerType::Style),
            Section(SectionType::Other)
        ) | (Span(SpanType::Other), Inline(InlineType::Emphasis))
            | (Inline(InlineType::Emphasis), Span(SpanType::Other))
    )
}
