use crate::core::dom::{parse_fragment, Document, DocumentError, FragmentNode, NodeId};

/// Makes `dest` carry exactly the attributes of `src`, in source order.
pub fn copy_attributes(document: &Document, src: NodeId, dest: NodeId) -> Result<(), DocumentError> {
    let source = document.attributes(src);
    for (name, _) in document.attributes(dest) {
        document.remove_attribute(dest, &name)?;
    }
    for (name, value) in source {
        document.set_attribute(dest, &name, &value)?;
    }
    Ok(())
}

/// Parses `attr_text` (the inside of a start tag after its name) and makes
/// `dest` carry exactly those attributes.
pub fn apply_attributes(document: &Document, attr_text: &str, dest: NodeId) -> Result<(), DocumentError> {
    let markup = format!("<a {attr_text}>");
    let synthetic = parse_fragment(&markup)
        .into_iter()
        .find(|node| matches!(node, FragmentNode::Element { .. }))
        .ok_or_else(|| DocumentError::Parse(format!("no attributes in {attr_text:?}")))?;
    let src = document.build_fragment_node(&synthetic);
    let copied = copy_attributes(document, src, dest);
    document.drop_subtree(src)?;
    copied
}
