//! Tree-based comment export decoder (roxmltree)

use roxmltree::{Document, Node};

use super::{
    CommentDecoder, CommentExportPage, apply_field, is_comment_field, open_comment, parse_max_id,
};
use crate::error::{JournalError, Result};

/// Parses the whole document into a tree, then walks it
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeDecoder;

impl CommentDecoder for TreeDecoder {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn decode(&self, document: &str) -> Result<CommentExportPage> {
        let doc = Document::parse(document)
            .map_err(|e| JournalError::decode(format!("invalid comment export: {}", e)))?;

        let mut page = CommentExportPage::default();
        for section in doc.root_element().children().filter(Node::is_element) {
            match section.tag_name().name() {
                "maxid" => page.max_id = Some(parse_max_id(&text_of(section))?),
                "comments" => {
                    for node in section.children().filter(|n| n.has_tag_name("comment")) {
                        let id = open_comment(&mut page, |key| node.attribute(key))?;
                        for field in node.children().filter(Node::is_element) {
                            let name = field.tag_name().name();
                            if is_comment_field(name) {
                                apply_field(page.comment_mut(id), name, &text_of(field))?;
                            }
                        }
                    }
                }
                "usermaps" => {
                    for node in section.children().filter(|n| n.has_tag_name("usermap")) {
                        page.add_usermap(node.attribute("id"), node.attribute("user"))?;
                    }
                }
                _ => {}
            }
        }
        Ok(page)
    }
}

/// Concatenated direct text (and CDATA) children of an element
fn text_of(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}
