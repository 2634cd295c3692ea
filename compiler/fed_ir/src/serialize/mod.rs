//! Wire format for building-block trees.
//!
//! ```text
//! "FEDC" | version: u16 LE | bincode(WireTable)
//! ```
//!
//! The table stores types and nodes in postorder so every index refers to an
//! earlier entry. Decoding rebuilds the tree through the validating
//! constructors, so a decoded tree is well-typed or decoding fails.
//! Round-tripping yields an alpha-equivalent tree.


use fed_types::{DType, Field, Name, Placement, Shape, TypeError, TypeId, TypeKind, TypePool};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{Arena, DataSource, LeafProgram, NodeId, NodeKind, Param};

const MAGIC: &[u8; 4] = b"FEDC";

/// Current wire format version.
pub const WIRE_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("not a serialized computation (bad magic)")]
    BadMagic,
    #[error("unsupported wire format version {found} (supported: {WIRE_VERSION})")]
    UnsupportedVersion { found: u16 },
    #[error("input truncated")]
    Truncated,
    #[error("malformed table: {0}")]
    Codec(#[from] bincode::Error),
    #[error("{table} index {index} out of range")]
    DanglingIndex { table: &'static str, index: u32 },
    #[error("decoded tree is ill-typed: {0}")]
    IllTyped(#[from] TypeError),
}

#[derive(Serialize, Deserialize)]
struct WireTable {
    types: Vec<WireType>,
    names: Vec<String>,
    nodes: Vec<WireNode>,
    root: u32,
}

#[derive(Serialize, Deserialize)]
enum WireType {
    Tensor { dtype: DType, shape: Shape },
    Struct(Vec<(Option<u32>, u32)>),
    Function { param: Option<u32>, result: u32 },
    Federated { member: u32, placement: Placement, all_equal: bool },
    Placement,
}

#[derive(Serialize, Deserialize)]
struct WireNode {
    kind: WireKind,
    ty: u32,
}

#[derive(Serialize, Deserialize)]
enum WireKind {
    Reference(u32),
    Lambda { param: Option<(u32, u32)>, body: u32 },
    Call { function: u32, arg: Option<u32> },
    Block { locals: Vec<(u32, u32)>, result: u32 },
    Struct(Vec<(Option<u32>, u32)>),
    Selection { source: u32, index: u32 },
    Data(DataSource),
    Compiled(LeafProgram),
    Intrinsic(u32),
}

/// Serialize the tree at `root`.
pub fn encode(arena: &Arena, root: NodeId) -> Result<Vec<u8>, WireError> {
    let mut encoder = Encoder::new(arena);
    let table = encoder.table(root);
    let body = bincode::serialize(&table)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&WIRE_VERSION.to_le_bytes());
    out.extend_from_slice(&body);
    tracing::debug!(nodes = table.nodes.len(), bytes = out.len(), "encoded computation");
    Ok(out)
}

/// Deserialize a tree into `arena`, returning its root.
pub fn decode(arena: &mut Arena, bytes: &[u8]) -> Result<NodeId, WireError> {
    if bytes.len() < HEADER_LEN {
        return Err(if bytes.starts_with(&MAGIC[..bytes.len().min(MAGIC.len())]) {
            WireError::Truncated
        } else {
            WireError::BadMagic
        });
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(WireError::BadMagic);
    }
    let found = u16::from_le_bytes([bytes[4], bytes[5]]);
    if found != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion { found });
    }
    let table: WireTable = bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| {
        if matches!(*e, bincode::ErrorKind::Io(_)) {
            WireError::Truncated
        } else {
            WireError::Codec(e)
        }
    })?;
    Decoder::new(arena, &table)?.run()
}

// === Encoding ===

struct Encoder<'a> {
    arena: &'a Arena,
    types: Vec<WireType>,
    type_index: FxHashMap<TypeId, u32>,
    names: Vec<String>,
    name_index: FxHashMap<Name, u32>,
}

impl<'a> Encoder<'a> {
    fn new(arena: &'a Arena) -> Self {
        Self {
            arena,
            types: Vec::new(),
            type_index: FxHashMap::default(),
            names: Vec::new(),
            name_index: FxHashMap::default(),
        }
    }

    fn table(&mut self, root: NodeId) -> WireTable {
        let arena = self.arena;
        let order = arena.postorder(root);
        let mut node_index: FxHashMap<NodeId, u32> = FxHashMap::default();
        let mut nodes = Vec::with_capacity(order.len());
        for id in order {
            let idx = |n: NodeId| node_index.get(&n).copied().unwrap_or(u32::MAX);
            let kind = match arena.kind(id) {
                NodeKind::Reference(name) => WireKind::Reference(self.name(*name)),
                NodeKind::Lambda { param, body } => WireKind::Lambda {
                    param: param.map(|p| (self.name(p.name), self.ty(p.ty))),
                    body: idx(*body),
                },
                NodeKind::Call { function, arg } => WireKind::Call {
                    function: idx(*function),
                    arg: arg.map(idx),
                },
                NodeKind::Block { locals, result } => WireKind::Block {
                    locals: locals
                        .iter()
                        .map(|&(name, value)| (self.name(name), idx(value)))
                        .collect(),
                    result: idx(*result),
                },
                NodeKind::Struct(elements) => WireKind::Struct(
                    elements
                        .iter()
                        .map(|&(name, e)| (name.map(|n| self.name(n)), idx(e)))
                        .collect(),
                ),
                NodeKind::Selection { source, index } => WireKind::Selection {
                    source: idx(*source),
                    index: *index,
                },
                NodeKind::Data(data) => WireKind::Data(arena.data_source(*data).clone()),
                NodeKind::Compiled(leaf) => WireKind::Compiled(arena.leaf(*leaf).clone()),
                NodeKind::Intrinsic(name) => WireKind::Intrinsic(self.name(*name)),
            };
            let ty = self.ty(arena.ty(id));
            node_index.insert(id, index_of(nodes.len()));
            nodes.push(WireNode { kind, ty });
        }
        WireTable {
            types: std::mem::take(&mut self.types),
            names: std::mem::take(&mut self.names),
            root: index_of(nodes.len().saturating_sub(1)),
            nodes,
        }
    }

    fn name(&mut self, name: Name) -> u32 {
        if let Some(&i) = self.name_index.get(&name) {
            return i;
        }
        let i = index_of(self.names.len());
        self.names.push(self.arena.name_str(name).to_owned());
        self.name_index.insert(name, i);
        i
    }

    /// Index of `ty`, emitting its components first.
    fn ty(&mut self, ty: TypeId) -> u32 {
        if let Some(&i) = self.type_index.get(&ty) {
            return i;
        }
        let arena = self.arena;
        let wire = match arena.types().kind(ty).clone() {
            TypeKind::Tensor { dtype, shape } => WireType::Tensor { dtype, shape },
            TypeKind::Struct(fields) => WireType::Struct(
                fields
                    .iter()
                    .map(|f| (f.name.map(|n| self.name(n)), self.ty(f.ty)))
                    .collect(),
            ),
            TypeKind::Function { param, result } => WireType::Function {
                param: param.map(|p| self.ty(p)),
                result: self.ty(result),
            },
            TypeKind::Federated {
                member,
                placement,
                all_equal,
            } => WireType::Federated {
                member: self.ty(member),
                placement,
                all_equal,
            },
            TypeKind::Placement => WireType::Placement,
        };
        let i = index_of(self.types.len());
        self.types.push(wire);
        self.type_index.insert(ty, i);
        i
    }
}

fn index_of(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

// === Decoding ===

struct Decoder<'a> {
    arena: &'a mut Arena,
    table: &'a WireTable,
    types: Vec<TypeId>,
    names: Vec<Name>,
}

impl<'a> Decoder<'a> {
    fn new(arena: &'a mut Arena, table: &'a WireTable) -> Result<Self, WireError> {
        let names = table.names.iter().map(|s| arena.name(s)).collect();
        let mut decoder = Self {
            arena,
            table,
            types: Vec::with_capacity(table.types.len()),
            names,
        };
        for wire in &table.types {
            let ty = decoder.decode_type(wire)?;
            decoder.types.push(ty);
        }
        Ok(decoder)
    }

    fn run(mut self) -> Result<NodeId, WireError> {
        let table = self.table;
        let mut nodes: Vec<NodeId> = Vec::with_capacity(table.nodes.len());
        for wire in &table.nodes {
            let id = self.decode_node(wire, &nodes)?;
            nodes.push(id);
        }
        get(&nodes, table.root, "node")
    }

    fn ty(&self, index: u32) -> Result<TypeId, WireError> {
        get(&self.types, index, "type")
    }

    fn name(&self, index: u32) -> Result<Name, WireError> {
        get(&self.names, index, "name")
    }

    fn pool(&mut self) -> &mut TypePool {
        self.arena.types_mut()
    }

    fn decode_type(&mut self, wire: &WireType) -> Result<TypeId, WireError> {
        Ok(match wire {
            WireType::Tensor { dtype, shape } => self.pool().tensor(*dtype, shape.clone()),
            WireType::Struct(fields) => {
                let fields = fields
                    .iter()
                    .map(|&(name, ty)| -> Result<Field, WireError> {
                        Ok(Field {
                            name: name.map(|n| self.name(n)).transpose()?,
                            ty: self.ty(ty)?,
                        })
                    })
                    .collect::<Result<Vec<_>, WireError>>()?;
                self.pool().structure_of(fields)
            }
            WireType::Function { param, result } => {
                let param = param.map(|p| self.ty(p)).transpose()?;
                let result = self.ty(*result)?;
                self.pool().function(param, result)
            }
            WireType::Federated {
                member,
                placement,
                all_equal,
            } => {
                let member = self.ty(*member)?;
                self.pool().federated(member, *placement, *all_equal)?
            }
            WireType::Placement => TypeId::PLACEMENT,
        })
    }

    fn decode_node(&mut self, wire: &WireNode, nodes: &[NodeId]) -> Result<NodeId, WireError> {
        let node = |index: u32| get(nodes, index, "node");
        let ty = self.ty(wire.ty)?;
        let id = match &wire.kind {
            WireKind::Reference(name) => {
                let name = self.name(*name)?;
                self.arena.reference(name, ty)
            }
            WireKind::Lambda { param, body } => {
                let param = match *param {
                    Some((name, ty)) => Some(Param {
                        name: self.name(name)?,
                        ty: self.ty(ty)?,
                    }),
                    None => None,
                };
                self.arena.lambda(param, node(*body)?)?
            }
            WireKind::Call { function, arg } => {
                let arg = arg.map(node).transpose()?;
                self.arena.call(node(*function)?, arg)?
            }
            WireKind::Block { locals, result } => {
                let locals = locals
                    .iter()
                    .map(|&(name, value)| -> Result<_, WireError> {
                        Ok((self.name(name)?, node(value)?))
                    })
                    .collect::<Result<Vec<_>, WireError>>()?;
                self.arena.block(locals, node(*result)?)?
            }
            WireKind::Struct(elements) => {
                let elements = elements
                    .iter()
                    .map(|&(name, e)| -> Result<_, WireError> {
                        Ok((name.map(|n| self.name(n)).transpose()?, node(e)?))
                    })
                    .collect::<Result<Vec<_>, WireError>>()?;
                self.arena.structure(elements)?
            }
            WireKind::Selection { source, index } => {
                self.arena.select(node(*source)?, *index as usize)?
            }
            WireKind::Data(source) => self.arena.data(source.clone(), ty),
            WireKind::Compiled(program) => self.arena.compiled(program.clone(), ty)?,
            WireKind::Intrinsic(name) => {
                let name = self.name(*name)?;
                let name = self.arena.name_str(name).to_owned();
                self.arena.intrinsic(&name, ty)?
            }
        };

        // Derived types must agree with the declared ones.
        let derived = self.arena.ty(id);
        if !self.arena.types().is_identical(derived, ty) {
            let pool = self.arena.types();
            return Err(WireError::IllTyped(TypeError::Mismatch {
                context: format!("decoded {} node", wire.kind.tag()),
                expected: pool.format(ty),
                found: pool.format(derived),
            }));
        }
        Ok(id)
    }
}

impl WireKind {
    fn tag(&self) -> &'static str {
        match self {
            WireKind::Reference(_) => "reference",
            WireKind::Lambda { .. } => "lambda",
            WireKind::Call { .. } => "call",
            WireKind::Block { .. } => "block",
            WireKind::Struct(_) => "struct",
            WireKind::Selection { .. } => "selection",
            WireKind::Data(_) => "data",
            WireKind::Compiled(_) => "compiled",
            WireKind::Intrinsic(_) => "intrinsic",
        }
    }
}

fn get<T: Copy>(items: &[T], index: u32, table: &'static str) -> Result<T, WireError> {
    items
        .get(index as usize)
        .copied()
        .ok_or(WireError::DanglingIndex { table, index })
}
