//! Compact type rendering for diagnostics.

use crate::{TypeId, TypeKind, TypePool};

impl TypePool {
    /// Render a type, e.g. `<a=int32,float32[2]>` or `{int32}@CLIENTS`.
    pub fn format(&self, ty: TypeId) -> String {
        let mut buf = String::new();
        self.format_into(ty, &mut buf);
        buf
    }

    pub fn format_into(&self, ty: TypeId, buf: &mut String) {
        match self.kind(ty) {
            TypeKind::Tensor { dtype, shape } => {
                buf.push_str(dtype.name());
                buf.push_str(&shape.to_string());
            }
            TypeKind::Struct(fields) => {
                buf.push('<');
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    if let Some(name) = field.name {
                        buf.push_str(self.name_str(name));
                        buf.push('=');
                    }
                    self.format_into(field.ty, buf);
                }
                buf.push('>');
            }
            TypeKind::Function { param, result } => {
                buf.push('(');
                if let Some(param) = param {
                    self.format_into(*param, buf);
                    buf.push(' ');
                }
                buf.push_str("-> ");
                self.format_into(*result, buf);
                buf.push(')');
            }
            TypeKind::Federated {
                member,
                placement,
                all_equal,
            } => {
                if *all_equal {
                    self.format_into(*member, buf);
                } else {
                    buf.push('{');
                    self.format_into(*member, buf);
                    buf.push('}');
                }
                buf.push('@');
                buf.push_str(placement.name());
            }
            TypeKind::Placement => buf.push_str("placement"),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use crate::{DType, Shape, TypePool};

    #[test]
    fn renders_every_kind() {
        let mut pool = TypePool::new();
        let i32_ = pool.scalar(DType::Int32);
        let f32_vec = pool.tensor(DType::Float32, Shape::Known(vec![Some(2), None]));
        let s = pool.structure([(Some("a"), i32_), (None, f32_vec)]);
        let f = pool.function(Some(i32_), f32_vec);
        let nullary = pool.function(None, i32_);
        let at_server = pool.at_server(i32_).unwrap();
        let at_clients = pool.at_clients(i32_, false).unwrap();

        assert_eq!(pool.format(s), "<a=int32,float32[2,?]>");
        assert_eq!(pool.format(f), "(int32 -> float32[2,?])");
        assert_eq!(pool.format(nullary), "(-> int32)");
        assert_eq!(pool.format(at_server), "int32@SERVER");
        assert_eq!(pool.format(at_clients), "{int32}@CLIENTS");
        assert_eq!(pool.format(crate::TypeId::UNIT), "<>");
    }
}
