//! Result surfacing: rewriting the last top-level statement so its value
//! lands in a reserved namespace entry.

use coderun_syntax::{ConfigurationError, NodeKind, SyntaxTree};
use std::fmt;
use std::str::FromStr;

/// Namespace key the surfaced value is stored under. Not a valid identifier,
/// so executed code can never read or clobber it.
pub const RESULT_NAME: &str = "<result>";

/// Which trailing statement, if any, produces the value of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnMode {
    /// The value of a trailing expression statement.
    #[default]
    LastExpr,
    /// Like `LastExpr`, and also the value assigned by a trailing
    /// assignment to plain names.
    LastExprOrAssign,
    /// Never surface a value.
    None,
}

impl ReturnMode {
    pub const NAMES: &'static [&'static str] = &["last_expr", "last_expr_or_assign", "none"];

    pub fn name(&self) -> &'static str {
        match self {
            ReturnMode::LastExpr => "last_expr",
            ReturnMode::LastExprOrAssign => "last_expr_or_assign",
            ReturnMode::None => "none",
        }
    }
}

impl FromStr for ReturnMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_expr" => Ok(ReturnMode::LastExpr),
            "last_expr_or_assign" => Ok(ReturnMode::LastExprOrAssign),
            "none" => Ok(ReturnMode::None),
            other => Err(ConfigurationError {
                option: "return_mode",
                value: other.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rewrites the last top-level statement of `tree` to also store its value
/// under [`RESULT_NAME`]. Returns whether a rewrite happened.
///
/// - `x + 1` becomes `<result> = x + 1`
/// - `a = b = v` becomes `a = b = <result> = v` (only under
///   [`ReturnMode::LastExprOrAssign`], and only when every target is a name)
/// - `n += v` becomes `n = <result> = n + v` (same condition)
///
/// Anything else is left alone.
pub fn capture_result(tree: &mut SyntaxTree, mode: ReturnMode) -> bool {
    if mode == ReturnMode::None {
        return false;
    }
    let Some(&last) = tree.body().last() else {
        return false;
    };
    let Some(node) = tree.get(last) else {
        return false;
    };

    let rewritten = match &node.kind {
        NodeKind::Expr { value } => {
            let value = *value;
            let target = result_target(tree);
            NodeKind::Assign {
                targets: vec![target],
                value,
            }
        }

        NodeKind::Assign { targets, value } if mode == ReturnMode::LastExprOrAssign => {
            let all_names = targets
                .iter()
                .all(|&t| matches!(tree.get(t).map(|n| &n.kind), Some(NodeKind::Name { .. })));
            if targets.is_empty() || !all_names {
                return false;
            }
            let (mut targets, value) = (targets.clone(), *value);
            targets.push(result_target(tree));
            NodeKind::Assign { targets, value }
        }

        NodeKind::AugAssign { target, op, value } if mode == ReturnMode::LastExprOrAssign => {
            let (target, op, value) = (*target, *op, *value);
            let Some(NodeKind::Name { id }) = tree.get(target).map(|n| n.kind.clone()) else {
                return false;
            };
            let span = tree[target].span;
            let current = tree.push(NodeKind::Name { id }, span);
            let combined = tree.push(
                NodeKind::BinOp {
                    left: current,
                    op,
                    right: value,
                },
                tree[last].span,
            );
            NodeKind::Assign {
                targets: vec![target, result_target(tree)],
                value: combined,
            }
        }

        _ => return false,
    };

    tree[last].kind = rewritten;
    true
}

fn result_target(tree: &mut SyntaxTree) -> coderun_syntax::NodeId {
    tree.add(NodeKind::Name {
        id: RESULT_NAME.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderun_syntax::{CompileFlags, Mode, parse};

    fn rewrite(source: &str, mode: ReturnMode) -> (SyntaxTree, bool) {
        let mut tree = parse(source, Mode::Exec, CompileFlags::NONE).unwrap();
        let changed = capture_result(&mut tree, mode);
        (tree, changed)
    }

    fn last_targets(tree: &SyntaxTree) -> Vec<String> {
        let last = *tree.body().last().unwrap();
        let NodeKind::Assign { targets, .. } = &tree[last].kind else {
            panic!("expected assignment, got {:?}", tree[last].kind);
        };
        targets
            .iter()
            .map(|&t| match &tree[t].kind {
                NodeKind::Name { id } => id.clone(),
                other => panic!("unexpected target {:?}", other),
            })
            .collect()
    }

    #[test]
    fn parses_names() {
        assert_eq!("last_expr".parse::<ReturnMode>().unwrap(), ReturnMode::LastExpr);
        assert_eq!(
            "last_expr_or_assign".parse::<ReturnMode>().unwrap(),
            ReturnMode::LastExprOrAssign
        );
        assert_eq!("none".parse::<ReturnMode>().unwrap(), ReturnMode::None);
        let err = "last".parse::<ReturnMode>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid return_mode 'last', expected one of: last_expr, last_expr_or_assign, none"
        );
    }

    #[test]
    fn trailing_expression_is_captured() {
        let (tree, changed) = rewrite("x = 1\nx + 1", ReturnMode::LastExpr);
        assert!(changed);
        assert_eq!(last_targets(&tree), vec![RESULT_NAME]);
    }

    #[test]
    fn assignment_needs_or_assign_mode() {
        let (_, changed) = rewrite("a = 1", ReturnMode::LastExpr);
        assert!(!changed);

        let (tree, changed) = rewrite("a = b = 1", ReturnMode::LastExprOrAssign);
        assert!(changed);
        assert_eq!(last_targets(&tree), vec!["a", "b", RESULT_NAME]);
    }

    #[test]
    fn augmented_assignment_becomes_plain_assignment() {
        let (tree, changed) = rewrite("n = 1\nn += 2", ReturnMode::LastExprOrAssign);
        assert!(changed);
        assert_eq!(last_targets(&tree), vec!["n", RESULT_NAME]);
        let last = *tree.body().last().unwrap();
        let NodeKind::Assign { value, .. } = &tree[last].kind else {
            unreachable!()
        };
        assert!(matches!(tree[*value].kind, NodeKind::BinOp { .. }));
    }

    #[test]
    fn complex_targets_are_not_captured() {
        for source in ["a[0] = 1", "a.b = 1", "a, b = 1, 2", "a[0] += 1"] {
            let (_, changed) = rewrite(source, ReturnMode::LastExprOrAssign);
            assert!(!changed, "{} should not be captured", source);
        }
    }

    #[test]
    fn none_mode_and_compound_statements() {
        assert!(!rewrite("1 + 1", ReturnMode::None).1);
        assert!(!rewrite("if True:\n    1\n", ReturnMode::LastExpr).1);
        assert!(!rewrite("", ReturnMode::LastExpr).1);
    }
}
