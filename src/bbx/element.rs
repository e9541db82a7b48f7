//! Type tests, construction and re-tagging of canonical elements.

use super::attrs::AttrKind;
use super::types::{can_transform, CoreType, SubType};
use super::{BBX_NS, BB_NS, BB_PREFIX, UTD_NS};
use crate::dom::{Dom, NodeId, QName};
use crate::error::{Error, Result};

/// Resolve the canonical type of a node.
///
/// `None` for text, comments, foreign elements, and BBX elements whose
/// local name or `bb:type` is not part of the hierarchy.
pub fn type_of(dom: &Dom, node: NodeId) -> Option<SubType> {
    let elem = dom.element(node)?;
    if elem.name.ns.as_deref() != Some(BBX_NS) {
        return None;
    }
    let core = CoreType::from_name(&elem.name.local)?;
    let subtype = elem.attr(Some(BB_NS), "type")?;
    SubType::from_parts(core, subtype)
}

pub fn core_of(dom: &Dom, node: NodeId) -> Option<CoreType> {
    type_of(dom, node).map(SubType::core)
}

pub fn is_a(dom: &Dom, node: NodeId, ty: SubType) -> bool {
    type_of(dom, node) == Some(ty)
}

pub fn is_core(dom: &Dom, node: NodeId, core: CoreType) -> bool {
    core_of(dom, node) == Some(core)
}

/// Fail with [`Error::TypeMismatch`] unless `node` is of type `ty`.
pub fn assert_is_a(dom: &Dom, node: NodeId, ty: SubType) -> Result<()> {
    match type_of(dom, node) {
        Some(actual) if actual == ty => Ok(()),
        actual => Err(Error::TypeMismatch {
            node: dom.describe(node),
            expected: ty.to_string(),
            actual: describe_type(dom, node, actual),
        }),
    }
}

fn describe_type(dom: &Dom, node: NodeId, ty: Option<SubType>) -> String {
    match (ty, dom.element_name(node)) {
        (Some(ty), _) => ty.to_string(),
        (None, Some(name)) => format!("untyped element <{}>", name.qualified()),
        (None, None) if dom.is_text(node) => "text".to_string(),
        (None, None) => "non-element node".to_string(),
    }
}

/// Build a detached element of type `ty` with its required attributes set
/// to their defaults.
pub fn create(dom: &mut Dom, ty: SubType) -> NodeId {
    let node = dom.create_element(QName::new(Some(BBX_NS), ty.core().name()));
    dom.set_attr(node, type_qname(), ty.name());
    for kind in AttrKind::ALL {
        if kind.is_required_for(ty) {
            dom.set_attr(node, kind.qname(), kind.default_value());
        }
    }
    node
}

/// Re-tag an element in place.
///
/// Children are kept. Known attributes that are illegal for `to` are
/// dropped; required attributes `to` needs are added with defaults.
pub fn transform(dom: &mut Dom, node: NodeId, to: SubType) -> Result<()> {
    let Some(from) = type_of(dom, node) else {
        return Err(Error::TypeMismatch {
            node: dom.describe(node),
            expected: "a canonical element".to_string(),
            actual: describe_type(dom, node, None),
        });
    };
    if !can_transform(from, to) {
        return Err(Error::IllegalTransform {
            node: dom.describe(node),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let Some(elem) = dom.element_mut(node) else {
        return Ok(());
    };
    elem.name = QName::new(Some(BBX_NS), to.core().name());
    elem.set_attr(type_qname(), to.name());
    elem.attrs.retain(|a| {
        match AttrKind::from_name(a.name.ns.as_deref(), &a.name.local) {
            Some(kind) => kind.is_legal_for(to),
            None => true,
        }
    });
    for kind in AttrKind::ALL {
        if kind.is_required_for(to) && elem.attr(Some(kind.namespace()), kind.local_name()).is_none()
        {
            elem.set_attr(kind.qname(), kind.default_value());
        }
    }
    Ok(())
}

/// Nearest strict ancestor of core type SECTION.
pub fn nearest_section(dom: &Dom, node: NodeId) -> Option<NodeId> {
    dom.ancestors(node)
        .find(|&a| is_core(dom, a, CoreType::Section))
}

/// True for names in namespaces the canonical format treats as opaque.
pub fn is_foreign(name: &QName) -> bool {
    matches!(name.ns.as_deref(), Some(UTD_NS) | Some(super::MATHML_NS))
}

pub(crate) fn type_qname() -> QName {
    QName::prefixed(BB_NS, BB_PREFIX, "type")
}
