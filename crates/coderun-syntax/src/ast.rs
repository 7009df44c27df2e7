//! Arena-backed syntax tree.
//!
//! Every node lives in a single `Vec<Node>` owned by the [`SyntaxTree`] and is
//! addressed by a [`NodeId`]. Children refer to each other by id only, so a
//! caller can rewrite any node in place (or splice in freshly [`add`]ed ones)
//! without fighting the borrow checker. Nothing is validated on mutation; the
//! compiler re-checks the structure before lowering.
//!
//! [`add`]: SyntaxTree::add

use crate::error::Span;
use smallvec::SmallVec;
use std::fmt;
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtE => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtE => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
            CompareOp::Is => "is",
            CompareOp::IsNot => "is not",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Statements
    Expr { value: NodeId },
    Assign { targets: Vec<NodeId>, value: NodeId },
    AugAssign { target: NodeId, op: BinaryOp, value: NodeId },
    FunctionDef { name: String, params: Vec<String>, body: Vec<NodeId> },
    Return { value: Option<NodeId> },
    If { test: NodeId, body: Vec<NodeId>, orelse: Vec<NodeId> },
    While { test: NodeId, body: Vec<NodeId> },
    For { target: NodeId, iter: NodeId, body: Vec<NodeId> },
    Global { names: Vec<String> },
    Pass,
    Break,
    Continue,

    // Expressions
    Name { id: String },
    Constant { value: Constant },
    BinOp { left: NodeId, op: BinaryOp, right: NodeId },
    UnaryOp { op: UnaryOp, operand: NodeId },
    BoolOp { op: BoolOp, values: Vec<NodeId> },
    Compare { left: NodeId, ops: Vec<CompareOp>, comparators: Vec<NodeId> },
    IfExp { test: NodeId, body: NodeId, orelse: NodeId },
    NamedExpr { target: String, value: NodeId },
    Call { func: NodeId, args: Vec<NodeId> },
    Attribute { value: NodeId, attr: String },
    Subscript { value: NodeId, index: NodeId },
    List { elts: Vec<NodeId> },
    Tuple { elts: Vec<NodeId> },
    Dict { keys: Vec<NodeId>, values: Vec<NodeId> },
}

impl NodeKind {
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Expr { .. }
                | NodeKind::Assign { .. }
                | NodeKind::AugAssign { .. }
                | NodeKind::FunctionDef { .. }
                | NodeKind::Return { .. }
                | NodeKind::If { .. }
                | NodeKind::While { .. }
                | NodeKind::For { .. }
                | NodeKind::Global { .. }
                | NodeKind::Pass
                | NodeKind::Break
                | NodeKind::Continue
        )
    }

    pub fn is_expression(&self) -> bool {
        !self.is_statement()
    }

    /// Statements that own an indented block.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            NodeKind::FunctionDef { .. }
                | NodeKind::If { .. }
                | NodeKind::While { .. }
                | NodeKind::For { .. }
        )
    }

    /// Direct children in source order, including the bodies of compound
    /// statements.
    pub fn children(&self) -> SmallVec<[NodeId; 4]> {
        let mut out = SmallVec::new();
        match self {
            NodeKind::Expr { value } => out.push(*value),
            NodeKind::Assign { targets, value } => {
                out.extend(targets.iter().copied());
                out.push(*value);
            }
            NodeKind::AugAssign { target, value, .. } => out.extend([*target, *value]),
            NodeKind::FunctionDef { body, .. } => out.extend(body.iter().copied()),
            NodeKind::Return { value } => out.extend(*value),
            NodeKind::If { test, body, orelse } => {
                out.push(*test);
                out.extend(body.iter().chain(orelse).copied());
            }
            NodeKind::While { test, body } => {
                out.push(*test);
                out.extend(body.iter().copied());
            }
            NodeKind::For { target, iter, body } => {
                out.extend([*target, *iter]);
                out.extend(body.iter().copied());
            }
            NodeKind::Global { .. }
            | NodeKind::Pass
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Name { .. }
            | NodeKind::Constant { .. } => {}
            NodeKind::BinOp { left, right, .. } => out.extend([*left, *right]),
            NodeKind::UnaryOp { operand, .. } => out.push(*operand),
            NodeKind::BoolOp { values, .. } => out.extend(values.iter().copied()),
            NodeKind::Compare { left, comparators, .. } => {
                out.push(*left);
                out.extend(comparators.iter().copied());
            }
            NodeKind::IfExp { test, body, orelse } => out.extend([*test, *body, *orelse]),
            NodeKind::NamedExpr { value, .. } => out.push(*value),
            NodeKind::Call { func, args } => {
                out.push(*func);
                out.extend(args.iter().copied());
            }
            NodeKind::Attribute { value, .. } => out.push(*value),
            NodeKind::Subscript { value, index } => out.extend([*value, *index]),
            NodeKind::List { elts } | NodeKind::Tuple { elts } => out.extend(elts.iter().copied()),
            NodeKind::Dict { keys, values } => {
                for (k, v) in keys.iter().zip(values) {
                    out.extend([*k, *v]);
                }
            }
        }
        out
    }

    /// Short human label, used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::Expr { .. } => "expression statement",
            NodeKind::Assign { .. } => "assignment",
            NodeKind::AugAssign { .. } => "augmented assignment",
            NodeKind::FunctionDef { .. } => "function definition",
            NodeKind::Return { .. } => "'return'",
            NodeKind::If { .. } => "'if' statement",
            NodeKind::While { .. } => "'while' loop",
            NodeKind::For { .. } => "'for' loop",
            NodeKind::Global { .. } => "'global' declaration",
            NodeKind::Pass => "'pass'",
            NodeKind::Break => "'break'",
            NodeKind::Continue => "'continue'",
            NodeKind::Name { .. } => "name",
            NodeKind::Constant { .. } => "literal",
            NodeKind::BinOp { .. } => "expression",
            NodeKind::UnaryOp { .. } => "expression",
            NodeKind::BoolOp { .. } => "expression",
            NodeKind::Compare { .. } => "comparison",
            NodeKind::IfExp { .. } => "conditional expression",
            NodeKind::NamedExpr { .. } => "named expression",
            NodeKind::Call { .. } => "function call",
            NodeKind::Attribute { .. } => "attribute",
            NodeKind::Subscript { .. } => "subscript",
            NodeKind::List { .. } => "list",
            NodeKind::Tuple { .. } => "tuple",
            NodeKind::Dict { .. } => "dict literal",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

/// Top-level shape of a tree; one variant per [`Mode`](crate::Mode).
#[derive(Debug, Clone, PartialEq)]
pub enum Root {
    Module { body: Vec<NodeId> },
    Expression { body: NodeId },
    Interactive { body: Vec<NodeId> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    root: Root,
}

impl SyntaxTree {
    pub fn new(root: Root) -> Self {
        Self {
            nodes: Vec::new(),
            root,
        }
    }

    pub(crate) fn with_nodes(nodes: Vec<Node>, root: Root) -> Self {
        Self { nodes, root }
    }

    /// Appends a node without source location and returns its id.
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        self.push(kind, Span::default())
    }

    pub fn push(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, span });
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Root {
        &mut self.root
    }

    /// Top-level node ids, in order. An expression root yields one id.
    pub fn body(&self) -> &[NodeId] {
        match &self.root {
            Root::Module { body } | Root::Interactive { body } => body,
            Root::Expression { body } => std::slice::from_ref(body),
        }
    }

    /// Mutable statement list; `None` for an expression root.
    pub fn body_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.root {
            Root::Module { body } | Root::Interactive { body } => Some(body),
            Root::Expression { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }
}

impl Index<NodeId> for SyntaxTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for SyntaxTree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_returns_sequential_ids() {
        let mut tree = SyntaxTree::new(Root::Module { body: Vec::new() });
        let a = tree.add(NodeKind::Pass);
        let b = tree.add(NodeKind::Break);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[b].kind, NodeKind::Break);
    }

    #[test]
    fn body_of_expression_root_is_single_id() {
        let mut tree = SyntaxTree::new(Root::Module { body: Vec::new() });
        let id = tree.add(NodeKind::Constant { value: Constant::Int(1) });
        *tree.root_mut() = Root::Expression { body: id };
        assert_eq!(tree.body(), &[id]);
        assert!(tree.body_mut().is_none());
    }

    #[test]
    fn get_out_of_range_is_none() {
        let tree = SyntaxTree::new(Root::Module { body: Vec::new() });
        assert!(tree.get(NodeId(3)).is_none());
    }

    #[test]
    fn children_follow_source_order() {
        let kind = NodeKind::If {
            test: NodeId(0),
            body: vec![NodeId(1), NodeId(2)],
            orelse: vec![NodeId(3)],
        };
        assert_eq!(kind.children().as_slice(), &[NodeId(0), NodeId(1), NodeId(2), NodeId(3)]);
        assert!(NodeKind::Pass.children().is_empty());
    }

    #[test]
    fn statement_and_expression_kinds_are_disjoint() {
        assert!(NodeKind::Pass.is_statement());
        assert!(!NodeKind::Pass.is_expression());
        let name = NodeKind::Name { id: "x".to_string() };
        assert!(name.is_expression());
        assert!(!name.is_compound());
    }
}
