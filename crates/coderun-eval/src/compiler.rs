//! Lowers a [`SyntaxTree`] to a [`CodeObject`].
//!
//! The tree may have been edited by the caller since it was parsed, so
//! nothing about its shape is taken for granted: every node id is resolved
//! through [`SyntaxTree::get`] and every node is checked to be of the right
//! category for its position. Violations are reported as [`SyntaxError`]s.

use crate::bytecode::{CodeObject, Constant, Instruction};
use coderun_syntax::ast::{self, BinaryOp, BoolOp, Node, NodeId, NodeKind, Root};
use coderun_syntax::{Mode, Span, SyntaxError, SyntaxTree};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

type CompileResult<T> = Result<T, SyntaxError>;

/// Deepest recursion the compiler follows. Left-leaning chains (`a + b + c`,
/// `x.y.z`, `f()()`) and `elif` chains are lowered in loops and do not count;
/// bracket nesting, unary operators and blocks do. Parsed source stays well
/// below the limit (see [`coderun_syntax::parser::MAX_NESTING`]), so in
/// practice it stops hand-built trees that nest too deeply or loop.
const MAX_NESTING: usize = 150;

/// Checks `tree` against the grammar of `mode` and lowers it.
pub fn compile(tree: &SyntaxTree, mode: Mode) -> CompileResult<CodeObject> {
    let body = validate_root(tree, mode)?;
    let mut unit = Unit::new(tree, "<module>", mode, false);

    match mode {
        Mode::Eval => {
            for &id in body {
                unit.compile_expr(id)?;
            }
            unit.emit(Instruction::ReturnValue);
        }
        Mode::Exec | Mode::Single => {
            unit.compile_body(body)?;
            unit.emit_const(Constant::None);
            unit.emit(Instruction::ReturnValue);
        }
    }

    Ok(unit.finish())
}

/// Root-level checks that depend on the mode.
fn validate_root(tree: &SyntaxTree, mode: Mode) -> CompileResult<&[NodeId]> {
    match (mode, tree.root()) {
        (Mode::Exec, Root::Module { body }) => Ok(body),
        (Mode::Eval, Root::Expression { body }) => {
            let node = resolve(tree, *body, None)?;
            if node.kind.is_statement() {
                return Err(SyntaxError::invalid(
                    format!("expected an expression, found {}", node.kind.describe()),
                    Some(node.span),
                ));
            }
            Ok(std::slice::from_ref(body))
        }
        (Mode::Single, Root::Interactive { body }) => {
            if body.len() > 1 {
                for &id in body {
                    if resolve(tree, id, None)?.kind.is_compound() {
                        let span = resolve(tree, body[1], None)?.span;
                        return Err(SyntaxError::MultipleStatements { span });
                    }
                }
            }
            Ok(body)
        }
        (mode, root) => {
            let found = match root {
                Root::Module { .. } => "module",
                Root::Expression { .. } => "expression",
                Root::Interactive { .. } => "interactive",
            };
            Err(SyntaxError::invalid(
                format!("cannot compile a {} tree in '{}' mode", found, mode),
                None,
            ))
        }
    }
}

fn resolve(tree: &SyntaxTree, id: NodeId, span: Option<Span>) -> CompileResult<&Node> {
    tree.get(id)
        .ok_or_else(|| SyntaxError::invalid(format!("dangling node reference {}", id), span))
}

struct LoopContext {
    continue_target: u32,
    breaks: Vec<usize>,
    is_for: bool,
}

/// Compilation state for one code object (the module or a function body).
struct Unit<'t> {
    tree: &'t SyntaxTree,
    code: CodeObject,
    name_index: FxHashMap<String, u32>,
    local_index: FxHashMap<String, u32>,
    is_function: bool,
    loops: Vec<LoopContext>,
    span: Span,
    depth: usize,
}

impl<'t> Unit<'t> {
    fn new(tree: &'t SyntaxTree, name: &str, mode: Mode, is_function: bool) -> Self {
        Self {
            tree,
            code: CodeObject::new(name, mode),
            name_index: FxHashMap::default(),
            local_index: FxHashMap::default(),
            is_function,
            loops: Vec::new(),
            span: Span::default(),
            depth: 0,
        }
    }

    fn finish(self) -> CodeObject {
        self.code
    }

    // ------------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------------

    fn emit(&mut self, instr: Instruction) -> usize {
        self.code.instructions.push(instr);
        self.code.spans.push(self.span);
        self.code.instructions.len() - 1
    }

    fn here(&self) -> u32 {
        self.code.instructions.len() as u32
    }

    /// Points the jump at `at` to the next instruction to be emitted.
    fn patch_here(&mut self, at: usize) {
        let target = self.here();
        self.code.instructions[at] = self.code.instructions[at].retarget(target);
    }

    fn add_const(&mut self, constant: Constant) -> u32 {
        if let Some(i) = self.code.constants.iter().position(|c| c.same_as(&constant)) {
            return i as u32;
        }
        self.code.constants.push(constant);
        (self.code.constants.len() - 1) as u32
    }

    fn emit_const(&mut self, constant: Constant) -> usize {
        let idx = self.add_const(constant);
        self.emit(Instruction::LoadConst(idx))
    }

    fn name_idx(&mut self, name: &str) -> u32 {
        if let Some(&i) = self.name_index.get(name) {
            return i;
        }
        let i = self.code.names.len() as u32;
        self.code.names.push(name.to_string());
        self.name_index.insert(name.to_string(), i);
        i
    }

    fn add_local(&mut self, name: &str) {
        if !self.local_index.contains_key(name) {
            let i = self.code.locals.len() as u32;
            self.code.locals.push(name.to_string());
            self.local_index.insert(name.to_string(), i);
        }
    }

    fn load_name(&mut self, name: &str) {
        match self.local_index.get(name) {
            Some(&slot) if self.is_function => self.emit(Instruction::LoadFast(slot)),
            _ => {
                let i = self.name_idx(name);
                self.emit(Instruction::LoadName(i))
            }
        };
    }

    fn store_name(&mut self, name: &str) {
        match self.local_index.get(name) {
            Some(&slot) if self.is_function => self.emit(Instruction::StoreFast(slot)),
            _ => {
                let i = self.name_idx(name);
                self.emit(Instruction::StoreName(i))
            }
        };
    }

    fn error(&self, detail: impl Into<String>) -> SyntaxError {
        SyntaxError::invalid(detail, Some(self.span))
    }

    fn node(&self, id: NodeId) -> CompileResult<&'t Node> {
        resolve(self.tree, id, Some(self.span))
    }

    fn enter(&mut self, span: Span) -> CompileResult<Span> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(SyntaxError::invalid("too many nested nodes", Some(span)));
        }
        Ok(std::mem::replace(&mut self.span, span))
    }

    fn leave(&mut self, saved: Span) {
        self.depth -= 1;
        self.span = saved;
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn compile_body(&mut self, body: &[NodeId]) -> CompileResult<()> {
        for &id in body {
            self.compile_stmt(id)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, id: NodeId) -> CompileResult<()> {
        let node = self.node(id)?;
        let saved = self.enter(node.span)?;
        let result = self.compile_stmt_kind(&node.kind);
        self.leave(saved);
        result
    }

    fn compile_stmt_kind(&mut self, kind: &'t NodeKind) -> CompileResult<()> {
        match kind {
            NodeKind::Expr { value } => {
                self.compile_expr(*value)?;
                self.emit(Instruction::Pop);
            }

            NodeKind::Assign { targets, value } => {
                if targets.is_empty() {
                    return Err(self.error("assignment without a target"));
                }
                self.compile_expr(*value)?;
                for (i, &target) in targets.iter().enumerate() {
                    if i + 1 < targets.len() {
                        self.emit(Instruction::DupTop);
                    }
                    self.compile_store(target)?;
                }
            }

            NodeKind::AugAssign { target, op, value } => {
                self.compile_aug_assign(*target, *op, *value)?;
            }

            NodeKind::FunctionDef { name, params, body } => {
                let code = self.compile_function(name, params, body)?;
                let idx = self.add_const(Constant::Code(Arc::new(code)));
                self.emit(Instruction::MakeFunction(idx));
                self.store_name(name);
            }

            NodeKind::Return { value } => {
                if !self.is_function {
                    return Err(self.error("'return' outside function"));
                }
                match value {
                    Some(value) => self.compile_expr(*value)?,
                    None => {
                        self.emit_const(Constant::None);
                    }
                }
                self.emit(Instruction::ReturnValue);
            }

            NodeKind::If { test, body, orelse } => self.compile_if(*test, body, orelse)?,

            NodeKind::While { test, body } => {
                let start = self.here();
                self.compile_expr(*test)?;
                let exit = self.emit(Instruction::PopJumpIfFalse(0));
                let breaks = self.compile_loop_body(body, start, false)?;
                self.emit(Instruction::Jump(start));
                self.patch_here(exit);
                for at in breaks {
                    self.patch_here(at);
                }
            }

            NodeKind::For { target, iter, body } => {
                self.compile_expr(*iter)?;
                self.emit(Instruction::GetIter);
                let start = self.here();
                let exit = self.emit(Instruction::ForIter(0));
                self.compile_store(*target)?;
                let breaks = self.compile_loop_body(body, start, true)?;
                self.emit(Instruction::Jump(start));
                self.patch_here(exit);
                for at in breaks {
                    self.patch_here(at);
                }
            }

            NodeKind::Global { .. } | NodeKind::Pass => {}

            NodeKind::Break => {
                let Some(is_for) = self.loops.last().map(|ctx| ctx.is_for) else {
                    return Err(self.error("'break' outside loop"));
                };
                if is_for {
                    self.emit(Instruction::PopIter);
                }
                let at = self.emit(Instruction::Jump(0));
                if let Some(ctx) = self.loops.last_mut() {
                    ctx.breaks.push(at);
                }
            }

            NodeKind::Continue => {
                let Some(target) = self.loops.last().map(|ctx| ctx.continue_target) else {
                    return Err(self.error("'continue' not properly in loop"));
                };
                self.emit(Instruction::Jump(target));
            }

            other => {
                return Err(self.error(format!("expected a statement, found {}", other.describe())));
            }
        }
        Ok(())
    }

    /// An `if` whose `orelse` is a lone `if` continues the chain in the same
    /// loop, so `elif` ladders do not recurse.
    fn compile_if(
        &mut self,
        mut test: NodeId,
        mut body: &'t [NodeId],
        mut orelse: &'t [NodeId],
    ) -> CompileResult<()> {
        let saved = self.span;
        let mut exits = Vec::new();
        let mut links = 0;

        loop {
            self.compile_expr(test)?;
            let to_else = self.emit(Instruction::PopJumpIfFalse(0));
            self.compile_body(body)?;
            if orelse.is_empty() {
                self.patch_here(to_else);
                break;
            }
            exits.push(self.emit(Instruction::Jump(0)));
            self.patch_here(to_else);

            let elif = match orelse {
                [only] => Some(self.node(*only)?),
                _ => None,
            };
            if let Some(elif) = elif
                && let NodeKind::If { test: t, body: b, orelse: o } = &elif.kind
            {
                links += 1;
                if links > self.tree.len() {
                    return Err(self.error("cyclic 'elif' chain"));
                }
                self.span = elif.span;
                test = *t;
                body = b.as_slice();
                orelse = o.as_slice();
                continue;
            }

            self.compile_body(orelse)?;
            break;
        }

        self.span = saved;
        for at in exits {
            self.patch_here(at);
        }
        Ok(())
    }

    /// Compiles a loop body and returns the `break` jumps to patch.
    fn compile_loop_body(
        &mut self,
        body: &[NodeId],
        continue_target: u32,
        is_for: bool,
    ) -> CompileResult<Vec<usize>> {
        self.loops.push(LoopContext {
            continue_target,
            breaks: Vec::new(),
            is_for,
        });
        let result = self.compile_body(body);
        let ctx = self.loops.pop();
        result?;
        Ok(ctx.map(|ctx| ctx.breaks).unwrap_or_default())
    }

    fn compile_store(&mut self, target: NodeId) -> CompileResult<()> {
        let node = self.node(target)?;
        let saved = self.enter(node.span)?;
        let result = self.compile_store_kind(node);
        self.leave(saved);
        result
    }

    fn compile_store_kind(&mut self, node: &'t Node) -> CompileResult<()> {
        match &node.kind {
            NodeKind::Name { id } => self.store_name(id),
            NodeKind::Subscript { value, index } => {
                self.compile_expr(*value)?;
                self.compile_expr(*index)?;
                self.emit(Instruction::StoreSubscript);
            }
            NodeKind::Attribute { value, attr } => {
                self.compile_expr(*value)?;
                let i = self.name_idx(attr);
                self.emit(Instruction::StoreAttr(i));
            }
            NodeKind::Tuple { elts } | NodeKind::List { elts } => {
                self.emit(Instruction::UnpackSequence(elts.len() as u32));
                for &elt in elts {
                    self.compile_store(elt)?;
                }
            }
            other => {
                return Err(SyntaxError::invalid(
                    format!("cannot assign to {}", other.describe()),
                    Some(node.span),
                ));
            }
        }
        Ok(())
    }

    fn compile_aug_assign(&mut self, target: NodeId, op: BinaryOp, value: NodeId) -> CompileResult<()> {
        let node = self.node(target)?;
        match &node.kind {
            NodeKind::Name { id } => {
                self.load_name(id);
                self.compile_expr(value)?;
                self.emit(Instruction::BinaryOp(op));
                self.store_name(id);
            }
            NodeKind::Subscript { value: container, index } => {
                self.compile_expr(*container)?;
                self.compile_expr(*index)?;
                self.emit(Instruction::DupTwo);
                self.emit(Instruction::LoadSubscript);
                self.compile_expr(value)?;
                self.emit(Instruction::BinaryOp(op));
                self.emit(Instruction::RotThree);
                self.emit(Instruction::StoreSubscript);
            }
            NodeKind::Attribute { value: object, attr } => {
                self.compile_expr(*object)?;
                self.emit(Instruction::DupTop);
                let i = self.name_idx(attr);
                self.emit(Instruction::LoadAttr(i));
                self.compile_expr(value)?;
                self.emit(Instruction::BinaryOp(op));
                self.emit(Instruction::RotTwo);
                self.emit(Instruction::StoreAttr(i));
            }
            other => {
                return Err(SyntaxError::invalid(
                    format!(
                        "'{}' is an illegal expression for augmented assignment",
                        other.describe()
                    ),
                    Some(node.span),
                ));
            }
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &'t [NodeId],
    ) -> CompileResult<CodeObject> {
        let mut unit = Unit::new(self.tree, name, self.code.mode, true);
        unit.span = self.span;
        unit.depth = self.depth;

        let mut assigned = Vec::new();
        let mut globals = FxHashSet::default();
        collect_scope(self.tree, body, &mut assigned, &mut globals);

        for param in params {
            if globals.contains(param.as_str()) {
                return Err(self.error(format!("name '{}' is parameter and global", param)));
            }
            unit.add_local(param);
        }
        unit.code.arg_count = params.len();
        for name in assigned {
            if !globals.contains(name) {
                unit.add_local(name);
            }
        }

        unit.compile_body(body)?;
        unit.emit_const(Constant::None);
        unit.emit(Instruction::ReturnValue);
        Ok(unit.finish())
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn compile_expr(&mut self, id: NodeId) -> CompileResult<()> {
        // Walk down the left operands first; only the innermost one and the
        // right-hand parts recurse.
        let mut spine: Vec<&'t Node> = Vec::new();
        let mut node = self.node(id)?;
        while let Some(left) = left_operand(&node.kind) {
            if spine.len() >= self.tree.len() {
                return Err(SyntaxError::invalid("cyclic node reference", Some(node.span)));
            }
            spine.push(node);
            node = self.node(left)?;
        }

        let saved = self.enter(node.span)?;
        let mut result = self.compile_expr_kind(&node.kind);
        for outer in spine.into_iter().rev() {
            if result.is_err() {
                break;
            }
            self.span = outer.span;
            result = self.compile_operation(&outer.kind);
        }
        self.leave(saved);
        result
    }

    /// Emits what follows the left operand of a chain link.
    fn compile_operation(&mut self, kind: &'t NodeKind) -> CompileResult<()> {
        match kind {
            NodeKind::BinOp { op, right, .. } => {
                self.compile_expr(*right)?;
                self.emit(Instruction::BinaryOp(*op));
            }
            NodeKind::Call { args, .. } => {
                for &arg in args {
                    self.compile_expr(arg)?;
                }
                self.emit(Instruction::Call(args.len() as u32));
            }
            NodeKind::Attribute { attr, .. } => {
                let i = self.name_idx(attr);
                self.emit(Instruction::LoadAttr(i));
            }
            NodeKind::Subscript { index, .. } => {
                self.compile_expr(*index)?;
                self.emit(Instruction::LoadSubscript);
            }
            other => {
                return Err(self.error(format!(
                    "expected an expression, found {}",
                    other.describe()
                )));
            }
        }
        Ok(())
    }

    fn compile_expr_kind(&mut self, kind: &'t NodeKind) -> CompileResult<()> {
        match kind {
            NodeKind::Constant { value } => {
                self.emit_const(lower_constant(value));
            }

            NodeKind::Name { id } => self.load_name(id),

            NodeKind::UnaryOp { op, operand } => {
                self.compile_expr(*operand)?;
                self.emit(Instruction::UnaryOp(*op));
            }

            NodeKind::BoolOp { op, values } => {
                if values.is_empty() {
                    return Err(self.error("boolean operation without operands"));
                }
                let mut jumps = Vec::with_capacity(values.len());
                for (i, &value) in values.iter().enumerate() {
                    self.compile_expr(value)?;
                    if i + 1 < values.len() {
                        let jump = match op {
                            BoolOp::And => Instruction::JumpIfFalseOrPop(0),
                            BoolOp::Or => Instruction::JumpIfTrueOrPop(0),
                        };
                        jumps.push(self.emit(jump));
                    }
                }
                for at in jumps {
                    self.patch_here(at);
                }
            }

            NodeKind::Compare { left, ops, comparators } => {
                if ops.is_empty() || ops.len() != comparators.len() {
                    return Err(self.error("malformed comparison"));
                }
                self.compile_expr(*left)?;

                // a < b < c keeps b on the stack for the next link and bails
                // out with the first false result.
                let mut cleanup = Vec::new();
                for (i, (&op, &right)) in ops.iter().zip(comparators).enumerate() {
                    self.compile_expr(right)?;
                    if i + 1 < ops.len() {
                        self.emit(Instruction::DupTop);
                        self.emit(Instruction::RotThree);
                        self.emit(Instruction::Compare(op));
                        cleanup.push(self.emit(Instruction::JumpIfFalseOrPop(0)));
                    } else {
                        self.emit(Instruction::Compare(op));
                    }
                }
                if !cleanup.is_empty() {
                    let to_end = self.emit(Instruction::Jump(0));
                    for at in cleanup {
                        self.patch_here(at);
                    }
                    self.emit(Instruction::RotTwo);
                    self.emit(Instruction::Pop);
                    self.patch_here(to_end);
                }
            }

            NodeKind::IfExp { test, body, orelse } => {
                self.compile_expr(*test)?;
                let to_else = self.emit(Instruction::PopJumpIfFalse(0));
                self.compile_expr(*body)?;
                let to_end = self.emit(Instruction::Jump(0));
                self.patch_here(to_else);
                self.compile_expr(*orelse)?;
                self.patch_here(to_end);
            }

            NodeKind::NamedExpr { target, value } => {
                self.compile_expr(*value)?;
                self.emit(Instruction::DupTop);
                self.store_name(target);
            }

            NodeKind::List { elts } => {
                for &elt in elts {
                    self.compile_expr(elt)?;
                }
                self.emit(Instruction::BuildList(elts.len() as u32));
            }

            NodeKind::Tuple { elts } => {
                for &elt in elts {
                    self.compile_expr(elt)?;
                }
                self.emit(Instruction::BuildTuple(elts.len() as u32));
            }

            NodeKind::Dict { keys, values } => {
                if keys.len() != values.len() {
                    return Err(self.error("dict literal with mismatched keys and values"));
                }
                for (&key, &value) in keys.iter().zip(values) {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit(Instruction::BuildDict(keys.len() as u32));
            }

            other => {
                return Err(self.error(format!(
                    "expected an expression, found {}",
                    other.describe()
                )));
            }
        }
        Ok(())
    }
}

/// The operand a chain link is built on: the left side of a binary
/// operation, the callee of a call, the object of an attribute or
/// subscript.
fn left_operand(kind: &NodeKind) -> Option<NodeId> {
    match kind {
        NodeKind::BinOp { left, .. } => Some(*left),
        NodeKind::Call { func, .. } => Some(*func),
        NodeKind::Attribute { value, .. } | NodeKind::Subscript { value, .. } => Some(*value),
        _ => None,
    }
}

fn lower_constant(value: &ast::Constant) -> Constant {
    match value {
        ast::Constant::None => Constant::None,
        ast::Constant::Bool(b) => Constant::Bool(*b),
        ast::Constant::Int(n) => Constant::Int(*n),
        ast::Constant::Float(f) => Constant::Float(*f),
        ast::Constant::Str(s) => Constant::Str(s.clone()),
    }
}

/// Names bound inside a function body (not counting nested function bodies)
/// and names declared `global` there.
fn collect_scope<'t>(
    tree: &'t SyntaxTree,
    body: &[NodeId],
    assigned: &mut Vec<&'t str>,
    globals: &mut FxHashSet<&'t str>,
) {
    let mut stack: Vec<NodeId> = body.iter().rev().copied().collect();
    let mut visited = FxHashSet::default();

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(node) = tree.get(id) else { continue };

        match &node.kind {
            NodeKind::FunctionDef { name, .. } => {
                assigned.push(name);
                continue;
            }
            NodeKind::Global { names } => {
                globals.extend(names.iter().map(String::as_str));
            }
            NodeKind::Assign { targets, .. } => {
                for &target in targets {
                    collect_targets(tree, target, assigned);
                }
            }
            NodeKind::AugAssign { target, .. } | NodeKind::For { target, .. } => {
                collect_targets(tree, *target, assigned);
            }
            NodeKind::NamedExpr { target, .. } => assigned.push(target),
            _ => {}
        }

        stack.extend(node.kind.children().into_iter().rev());
    }
}

fn collect_targets<'t>(tree: &'t SyntaxTree, id: NodeId, out: &mut Vec<&'t str>) {
    let mut pending = vec![id];
    let mut visited = FxHashSet::default();
    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        match tree.get(id).map(|node| &node.kind) {
            Some(NodeKind::Name { id }) => out.push(id),
            Some(NodeKind::Tuple { elts } | NodeKind::List { elts }) => {
                pending.extend(elts.iter().rev());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderun_syntax::{CompileFlags, parse};

    fn compile_source(source: &str, mode: Mode) -> CompileResult<CodeObject> {
        let tree = parse(source, mode, CompileFlags::NONE)?;
        compile(&tree, mode)
    }

    fn function_code(code: &CodeObject) -> &CodeObject {
        code.constants
            .iter()
            .find_map(|c| match c {
                Constant::Code(code) => Some(code.as_ref()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn module_ends_with_return_none() {
        let code = compile_source("x = 1", Mode::Exec).unwrap();
        assert_eq!(
            code.instructions,
            vec![
                Instruction::LoadConst(0),
                Instruction::StoreName(0),
                Instruction::LoadConst(1),
                Instruction::ReturnValue,
            ]
        );
        assert_eq!(code.constants, vec![Constant::Int(1), Constant::None]);
        assert_eq!(code.spans.len(), code.instructions.len());
    }

    #[test]
    fn constants_are_deduplicated() {
        let code = compile_source("a = 2\nb = 2\nc = 2.0", Mode::Exec).unwrap();
        assert_eq!(
            code.constants,
            vec![Constant::Int(2), Constant::Float(2.0), Constant::None]
        );
    }

    #[test]
    fn eval_mode_returns_expression() {
        let code = compile_source("x * 2", Mode::Eval).unwrap();
        assert_eq!(code.instructions.last(), Some(&Instruction::ReturnValue));
        assert!(!code.instructions.contains(&Instruction::Pop));
    }

    #[test]
    fn function_locals_use_fast_slots() {
        let code = compile_source(
            "def f(a):\n    b = a + g\n    global h\n    h = b\n    return b\n",
            Mode::Exec,
        )
        .unwrap();
        let func = function_code(&code);
        assert_eq!(func.arg_count, 1);
        assert_eq!(func.locals, vec!["a".to_string(), "b".to_string()]);
        assert!(func.instructions.contains(&Instruction::LoadFast(0)));
        assert!(func.names.contains(&"g".to_string()));
        assert!(func.names.contains(&"h".to_string()));
    }

    #[test]
    fn walrus_and_loop_targets_are_locals() {
        let code = compile_source(
            "def f(xs):\n    for i, x in xs:\n        if (y := x):\n            pass\n",
            Mode::Exec,
        )
        .unwrap();
        let func = function_code(&code);
        for name in ["i", "x", "y"] {
            assert!(func.locals.contains(&name.to_string()), "{} should be local", name);
        }
    }

    #[test]
    fn return_outside_function() {
        let err = compile_source("return 1", Mode::Exec).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax: 'return' outside function");
    }

    #[test]
    fn break_and_continue_outside_loop() {
        let err = compile_source("break", Mode::Exec).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax: 'break' outside loop");
        let err = compile_source("def f():\n    continue\n", Mode::Exec).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax: 'continue' not properly in loop");
    }

    #[test]
    fn parameter_declared_global() {
        let err = compile_source("def f(x):\n    global x\n", Mode::Exec).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax: name 'x' is parameter and global");
    }

    #[test]
    fn dangling_node_is_rejected() {
        let mut tree = parse("1", Mode::Exec, CompileFlags::NONE).unwrap();
        let bogus = {
            let mut other = parse("1\n2\n3\n4\n5", Mode::Exec, CompileFlags::NONE).unwrap();
            other.body_mut().unwrap().pop().unwrap()
        };
        tree.body_mut().unwrap().push(bogus);
        let err = compile(&tree, Mode::Exec).unwrap_err();
        assert!(err.to_string().contains("dangling node reference"));
    }

    #[test]
    fn expression_in_statement_position() {
        let mut tree = parse("1", Mode::Exec, CompileFlags::NONE).unwrap();
        let name = tree.add(NodeKind::Name { id: "x".to_string() });
        tree.body_mut().unwrap().push(name);
        let err = compile(&tree, Mode::Exec).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax: expected a statement, found name");
    }

    #[test]
    fn mode_mismatch() {
        let tree = parse("1", Mode::Exec, CompileFlags::NONE).unwrap();
        let err = compile(&tree, Mode::Eval).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax: cannot compile a module tree in 'eval' mode");
    }

    #[test]
    fn single_mode_rejects_injected_compound_statement() {
        let mut tree = parse("def f():\n  1", Mode::Single, CompileFlags::NONE).unwrap();
        let pass = tree.add(NodeKind::Pass);
        let stmt = tree.add(NodeKind::Expr { value: pass });
        tree.body_mut().unwrap().push(stmt);
        let err = compile(&tree, Mode::Single).unwrap_err();
        assert!(err.is_multiple_statements());
    }

    #[test]
    fn cyclic_tree_is_rejected() {
        let mut tree = parse("x", Mode::Exec, CompileFlags::NONE).unwrap();
        let stmt = tree.body()[0];
        let NodeKind::Expr { value } = tree[stmt].kind else {
            panic!("expected expression statement");
        };
        tree[value].kind = NodeKind::UnaryOp {
            op: ast::UnaryOp::Neg,
            operand: value,
        };
        let err = compile(&tree, Mode::Exec).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax: too many nested nodes");
    }

    #[test]
    fn left_operand_cycle_is_rejected() {
        let mut tree = parse("x + 1", Mode::Exec, CompileFlags::NONE).unwrap();
        let stmt = tree.body()[0];
        let NodeKind::Expr { value } = tree[stmt].kind else {
            panic!("expected expression statement");
        };
        if let NodeKind::BinOp { left, .. } = &mut tree[value].kind {
            *left = value;
        }
        let err = compile(&tree, Mode::Exec).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax: cyclic node reference");
    }

    #[test]
    fn long_chains_compile_without_nesting() {
        let sum = format!("1{}", " + 1".repeat(999));
        let code = compile_source(&sum, Mode::Eval).unwrap();
        let adds = code
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::BinaryOp(BinaryOp::Add)))
            .count();
        assert_eq!(adds, 999);

        let attrs = format!("x{}", ".y".repeat(2 * MAX_NESTING));
        assert!(compile_source(&attrs, Mode::Eval).is_ok());
        let calls = format!("f{}", "()".repeat(2 * MAX_NESTING));
        assert!(compile_source(&calls, Mode::Eval).is_ok());
    }

    #[test]
    fn long_elif_chain_compiles() {
        let mut source = String::from("if x == 0:\n    y = 0\n");
        for i in 1..500 {
            source.push_str(&format!("elif x == {}:\n    y = {}\n", i, i));
        }
        let code = compile_source(&source, Mode::Exec).unwrap();
        let tests = code
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::PopJumpIfFalse(_)))
            .count();
        assert_eq!(tests, 500);
    }
}
