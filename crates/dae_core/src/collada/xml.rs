//! Small helpers over `roxmltree` nodes.
//!
//! COLLADA files declare a default namespace; every lookup here matches on
//! the local tag name only.

use roxmltree::Node;

use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

/// Local tag name of an element.
pub fn tag<'a>(node: &Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Element children, skipping text and comments.
pub fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// First element child with the given tag.
pub fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.tag_name().name() == name)
}

/// All element children with the given tag.
pub fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

pub fn required_child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> ColladaResult<Node<'a, 'input>> {
    child(node, name).ok_or_else(|| ColladaError::MissingElement {
        parent: describe(&node),
        element: name,
    })
}

/// First descendant (excluding `node` itself) with the given tag.
pub fn descendant<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

pub fn attr<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name)
}

pub fn required_attr<'a>(node: &Node<'a, '_>, name: &'static str) -> ColladaResult<&'a str> {
    node.attribute(name)
        .ok_or_else(|| ColladaError::MissingAttribute {
            element: describe(node),
            attribute: name,
        })
}

/// Interned attribute value, if present.
pub fn name_attr(node: &Node<'_, '_>, name: &str) -> Option<Name> {
    node.attribute(name).map(Name::new)
}

pub fn required_name_attr(node: &Node<'_, '_>, name: &'static str) -> ColladaResult<Name> {
    required_attr(node, name).map(Name::new)
}

/// Parse a numeric attribute, falling back to `default` when absent.
pub fn parse_attr_or<T: std::str::FromStr>(
    node: &Node<'_, '_>,
    name: &str,
    default: T,
) -> ColladaResult<T> {
    match node.attribute(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ColladaError::InvalidNumber(value.to_string())),
        None => Ok(default),
    }
}

pub fn parse_required_attr<T: std::str::FromStr>(
    node: &Node<'_, '_>,
    name: &'static str,
) -> ColladaResult<T> {
    let value = required_attr(node, name)?;
    value
        .trim()
        .parse()
        .map_err(|_| ColladaError::InvalidNumber(value.to_string()))
}

/// Trimmed text content of an element (empty when it has none).
pub fn text<'a>(node: &Node<'a, '_>) -> &'a str {
    node.text().map(str::trim).unwrap_or("")
}

/// Strip the leading `#` of a local URL reference.
pub fn url_target(url: &str) -> ColladaResult<Name> {
    match url.strip_prefix('#') {
        Some(id) if !id.is_empty() => Ok(Name::new(id)),
        _ => Err(ColladaError::InvalidValue {
            element: "url".to_string(),
            value: url.to_string(),
        }),
    }
}

pub fn parse_f32(token: &str) -> ColladaResult<f32> {
    token
        .parse::<f32>()
        .map_err(|_| ColladaError::InvalidNumber(token.to_string()))
}

/// Whitespace-separated floats.
pub fn parse_floats(text: &str) -> ColladaResult<Vec<f32>> {
    text.split_whitespace().map(parse_f32).collect()
}

/// Whitespace-separated unsigned integers.
pub fn parse_u32s(text: &str) -> ColladaResult<Vec<u32>> {
    text.split_whitespace()
        .map(|t| {
            t.parse::<u32>()
                .map_err(|_| ColladaError::InvalidNumber(t.to_string()))
        })
        .collect()
}

/// Exactly `N` floats from an element's text.
pub fn parse_float_array<const N: usize>(node: &Node<'_, '_>) -> ColladaResult<[f32; N]> {
    let values = parse_floats(text(node))?;
    values.try_into().map_err(|v: Vec<f32>| ColladaError::InvalidValue {
        element: describe(node),
        value: format!("expected {} floats, found {}", N, v.len()),
    })
}

/// A single float child such as `<znear>0.1</znear>`.
pub fn child_f32(node: Node<'_, '_>, name: &str) -> ColladaResult<Option<f32>> {
    match child(node, name) {
        Some(c) => parse_f32(text(&c)).map(Some),
        None => Ok(None),
    }
}

/// `tag#id (line N)` for error messages.
pub fn describe(node: &Node<'_, '_>) -> String {
    let pos = node.document().text_pos_at(node.range().start);
    match node.attribute("id") {
        Some(id) => format!("{}#{} (line {})", tag(node), id, pos.row),
        None => format!("{} (line {})", tag(node), pos.row),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_default_namespace() {
        let xml = r#"<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema">
            <asset><up_axis> Z_UP </up_axis></asset>
        </COLLADA>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let asset = child(doc.root_element(), "asset").unwrap();
        let up = child(asset, "up_axis").unwrap();
        assert_eq!(text(&up), "Z_UP");
    }

    #[test]
    fn test_missing_child_reports_parent() {
        let doc = roxmltree::Document::parse(r#"<mesh id="m"/>"#).unwrap();
        let err = required_child(doc.root_element(), "vertices").unwrap_err();
        match err {
            ColladaError::MissingElement { parent, element } => {
                assert!(parent.starts_with("mesh#m"));
                assert_eq!(element, "vertices");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_url_target() {
        assert_eq!(url_target("#box").unwrap(), Name::new("box"));
        assert!(url_target("box").is_err());
        assert!(url_target("#").is_err());
    }

    #[test]
    fn test_parse_float_array_count() {
        let doc = roxmltree::Document::parse("<translate>1 2 3</translate>").unwrap();
        let values: [f32; 3] = parse_float_array(&doc.root_element()).unwrap();
        assert_eq!(values, [1.0, 2.0, 3.0]);
        assert!(parse_float_array::<4>(&doc.root_element()).is_err());
    }

    #[test]
    fn test_parse_u32s_rejects_negative() {
        assert_eq!(parse_u32s("0 1\n2").unwrap(), vec![0, 1, 2]);
        assert!(parse_u32s("0 -1").is_err());
    }
}
