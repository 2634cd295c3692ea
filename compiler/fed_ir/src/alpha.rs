//! Structural equality up to consistent renaming of bound names.
//!
//! Trees may live in different arenas. Types are compared by content hash,
//! names by string, leaf and data payloads by value.

use fed_types::{Name, TypeId};

use crate::stack::ensure_sufficient_stack;
use crate::{Arena, NodeId, NodeKind};

/// `true` iff the two trees are equal up to alpha-renaming.
pub fn alpha_eq(left: (&Arena, NodeId), right: (&Arena, NodeId)) -> bool {
    let cmp = Comparer {
        a: left.0,
        b: right.0,
    };
    let mut env = Vec::new();
    cmp.eq(left.1, right.1, &mut env)
}

struct Comparer<'a> {
    a: &'a Arena,
    b: &'a Arena,
}

impl Comparer<'_> {
    fn types_eq(&self, x: TypeId, y: TypeId) -> bool {
        self.a.types().content_hash(x) == self.b.types().content_hash(y)
    }

    fn names_eq(&self, x: Name, y: Name) -> bool {
        self.a.name_str(x) == self.b.name_str(y)
    }

    /// `env` holds binder pairs, innermost last.
    fn eq(&self, x: NodeId, y: NodeId, env: &mut Vec<(Name, Name)>) -> bool {
        if std::ptr::eq(self.a, self.b) && x == y && self.a.free_names(x).is_empty() {
            return true;
        }
        if !self.types_eq(self.a.ty(x), self.b.ty(y)) {
            return false;
        }
        ensure_sufficient_stack(|| match (self.a.kind(x), self.b.kind(y)) {
            (NodeKind::Reference(n), NodeKind::Reference(m)) => {
                let bound_a = env.iter().rposition(|&(p, _)| p == *n);
                let bound_b = env.iter().rposition(|&(_, q)| q == *m);
                match (bound_a, bound_b) {
                    (Some(i), Some(j)) => i == j,
                    (None, None) => self.names_eq(*n, *m),
                    _ => false,
                }
            }
            (
                NodeKind::Lambda {
                    param: pa,
                    body: ba,
                },
                NodeKind::Lambda {
                    param: pb,
                    body: bb,
                },
            ) => match (pa, pb) {
                (None, None) => self.eq(*ba, *bb, env),
                (Some(p), Some(q)) => {
                    if !self.types_eq(p.ty, q.ty) {
                        return false;
                    }
                    env.push((p.name, q.name));
                    let same = self.eq(*ba, *bb, env);
                    env.pop();
                    same
                }
                _ => false,
            },
            (
                NodeKind::Call {
                    function: fa,
                    arg: aa,
                },
                NodeKind::Call {
                    function: fb,
                    arg: ab,
                },
            ) => {
                self.eq(*fa, *fb, env)
                    && match (aa, ab) {
                        (None, None) => true,
                        (Some(x), Some(y)) => self.eq(*x, *y, env),
                        _ => false,
                    }
            }
            (
                NodeKind::Block {
                    locals: la,
                    result: ra,
                },
                NodeKind::Block {
                    locals: lb,
                    result: rb,
                },
            ) => {
                if la.len() != lb.len() {
                    return false;
                }
                let depth = env.len();
                let mut same = true;
                for (&(na, va), &(nb, vb)) in la.iter().zip(lb.iter()) {
                    if !self.eq(va, vb, env) {
                        same = false;
                        break;
                    }
                    env.push((na, nb));
                }
                same = same && self.eq(*ra, *rb, env);
                env.truncate(depth);
                same
            }
            (NodeKind::Struct(ea), NodeKind::Struct(eb)) => {
                ea.len() == eb.len()
                    && ea.iter().zip(eb.iter()).all(|(&(na, xa), &(nb, xb))| {
                        let names = match (na, nb) {
                            (None, None) => true,
                            (Some(p), Some(q)) => self.names_eq(p, q),
                            _ => false,
                        };
                        names && self.eq(xa, xb, env)
                    })
            }
            (
                NodeKind::Selection {
                    source: sa,
                    index: ia,
                },
                NodeKind::Selection {
                    source: sb,
                    index: ib,
                },
            ) => ia == ib && self.eq(*sa, *sb, env),
            (NodeKind::Data(da), NodeKind::Data(db)) => {
                self.a.data_source(*da) == self.b.data_source(*db)
            }
            (NodeKind::Compiled(la), NodeKind::Compiled(lb)) => self.a.leaf(*la) == self.b.leaf(*lb),
            (NodeKind::Intrinsic(n), NodeKind::Intrinsic(m)) => self.names_eq(*n, *m),
            _ => false,
        })
    }
}
