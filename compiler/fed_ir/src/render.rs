//! Compact textual rendering of building-block trees.
//!
//! Used in every diagnostic. Forms:
//!
//! - `(x -> body)`, `(-> body)`
//! - `f(arg)`, `f()`
//! - `(let a=v,b=w in r)`
//! - `<a=x,y>`, `s[0]`, `s.name`
//! - `comp#1f2e3d4c` for compiled leaves, intrinsics by name

#![allow(clippy::format_push_string)] // Rendering favors clarity over allocation

use crate::stack::ensure_sufficient_stack;
use crate::{Arena, DataSource, LeafProgram, NodeId, NodeKind};

/// Longest rendering embedded in an error message.
const SHORT_LIMIT: usize = 160;

impl Arena {
    pub fn render(&self, id: NodeId) -> String {
        let mut buf = String::new();
        self.render_into(id, &mut buf);
        buf
    }

    /// Rendering truncated for error messages.
    pub fn render_short(&self, id: NodeId) -> String {
        let mut text = self.render(id);
        if text.len() > SHORT_LIMIT {
            let mut cut = SHORT_LIMIT;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            text.push_str("...");
        }
        text
    }

    fn render_into(&self, id: NodeId, buf: &mut String) {
        ensure_sufficient_stack(|| match self.kind(id) {
            NodeKind::Reference(name) => buf.push_str(self.name_str(*name)),
            NodeKind::Lambda { param, body } => {
                buf.push('(');
                if let Some(param) = param {
                    buf.push_str(self.name_str(param.name));
                    buf.push(' ');
                }
                buf.push_str("-> ");
                self.render_into(*body, buf);
                buf.push(')');
            }
            NodeKind::Call { function, arg } => {
                self.render_into(*function, buf);
                buf.push('(');
                if let Some(arg) = arg {
                    self.render_into(*arg, buf);
                }
                buf.push(')');
            }
            NodeKind::Block { locals, result } => {
                buf.push_str("(let ");
                for (i, &(name, value)) in locals.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    buf.push_str(self.name_str(name));
                    buf.push('=');
                    self.render_into(value, buf);
                }
                buf.push_str(" in ");
                self.render_into(*result, buf);
                buf.push(')');
            }
            NodeKind::Struct(elements) => {
                buf.push('<');
                for (i, &(name, element)) in elements.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    if let Some(name) = name {
                        buf.push_str(self.name_str(name));
                        buf.push('=');
                    }
                    self.render_into(element, buf);
                }
                buf.push('>');
            }
            NodeKind::Selection { source, index } => {
                self.render_into(*source, buf);
                let field_name = self
                    .types()
                    .struct_fields(self.ty(*source))
                    .and_then(|fields| fields.get(*index as usize))
                    .and_then(|f| f.name);
                match field_name {
                    Some(name) => {
                        buf.push('.');
                        buf.push_str(self.name_str(name));
                    }
                    None => buf.push_str(&format!("[{index}]")),
                }
            }
            NodeKind::Data(data) => match self.data_source(*data) {
                DataSource::Uri(uri) => buf.push_str(uri),
                DataSource::Inline(bytes) => buf.push_str(&format!("data<{}B>", bytes.len())),
            },
            NodeKind::Compiled(leaf) => {
                let prefix = match self.leaf(*leaf) {
                    LeafProgram::Opaque { .. } => "comp",
                    LeafProgram::Fused(_) => "fused",
                };
                let short = (self.content_hash(id) >> 32) as u32;
                buf.push_str(&format!("{prefix}#{short:08x}"));
            }
            NodeKind::Intrinsic(name) => buf.push_str(self.name_str(*name)),
        });
    }
}
