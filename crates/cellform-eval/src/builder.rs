//! Token tree -> AST construction.
//!
//! Operand tokens are classified by a precedence-indexed factory list; infix
//! and postfix operators are rebuilt as [`NodeKind::Call`] nodes over their
//! registered operator executors so evaluation has a single call path. Build
//! faults (malformed expressions) are reported as [`BuildError`]; semantic
//! problems like an unknown function name become error-valued nodes instead.

use once_cell::sync::Lazy;
use tracing::warn;

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};
use cellform_parse::{
    Associativity, GroupKind, Token, TokenGroup, TokenKind, TokenNode, TokenTree,
};

use crate::ast::{Ast, AstArena, AstNode, NodeFlags, NodeId, NodeKind, PrefixOp};
use crate::function::FnCaps;
use crate::reference::Reference;
use crate::registry::FunctionRegistry;

/// Structural fault while shaping the AST. Distinct from error values: a
/// formula that builds but misbehaves produces `#NAME?`/`#VALUE!` results,
/// not a `BuildError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("expression is empty")]
    Empty,
    #[error("operator '{0}' is missing an operand")]
    MissingOperand(String),
    #[error("operand without a joining operator")]
    DanglingOperand,
    #[error("array literals may only contain constants")]
    NonConstantArray,
}

/// Executor names the infix/postfix operators dispatch to.
fn operator_function_name(op: &str) -> Option<&'static str> {
    Some(match op {
        "+" => "PLUS",
        "-" => "MINUS",
        "*" => "MULTIPLY",
        "/" => "DIVIDE",
        "^" => "POWER",
        "&" => "CONCAT",
        "%" => "PERCENT",
        "=" => "EQ",
        "<>" => "NE",
        ">" => "GT",
        "<" => "LT",
        ">=" => "GE",
        "<=" => "LE",
        _ => return None,
    })
}

/// Build an [`Ast`] from a token tree, resolving call heads against
/// `registry`. Unknown names settle to `#NAME?` nodes here, at build time.
pub fn build_ast(tree: &TokenTree, registry: &FunctionRegistry) -> Result<Ast, BuildError> {
    let mut builder = Builder {
        arena: AstArena::default(),
        registry,
    };
    let root = builder.build_sequence(&tree.items)?;
    Ok(builder.arena.finish(root))
}

/// One operand-classification rule. Factories are consulted in ascending
/// `zindex` order; the first to produce a node wins.
trait NodeFactory: Send + Sync {
    fn zindex(&self) -> u8;
    fn create(&self, token: &Token, arena: &mut AstArena) -> Option<NodeId>;
}

struct ErrorLiteralFactory;

impl NodeFactory for ErrorLiteralFactory {
    fn zindex(&self) -> u8 {
        0
    }

    fn create(&self, token: &Token, arena: &mut AstArena) -> Option<NodeId> {
        if token.kind != TokenKind::ErrorLit {
            return None;
        }
        let kind = FormulaErrorKind::parse(&token.value)?;
        Some(arena.push(AstNode::new(NodeKind::Value(CellValue::Error(
            FormulaError::new(kind),
        )))))
    }
}

struct LiteralFactory;

impl NodeFactory for LiteralFactory {
    fn zindex(&self) -> u8 {
        1
    }

    fn create(&self, token: &Token, arena: &mut AstArena) -> Option<NodeId> {
        let value = match token.kind {
            TokenKind::Number => {
                // Integers keep exact representation; everything else is f64.
                if let Ok(i) = token.value.parse::<i64>() {
                    CellValue::Int(i)
                } else {
                    CellValue::Number(token.value.parse::<f64>().ok()?)
                }
            }
            TokenKind::Text => CellValue::Text(unquote(&token.value)),
            TokenKind::Logical => CellValue::Boolean(token.value.eq_ignore_ascii_case("TRUE")),
            _ => return None,
        };
        Some(arena.push(AstNode::new(NodeKind::Value(value))))
    }
}

struct ReferenceFactory;

impl NodeFactory for ReferenceFactory {
    fn zindex(&self) -> u8 {
        2
    }

    fn create(&self, token: &Token, arena: &mut AstArena) -> Option<NodeId> {
        if token.kind != TokenKind::Ident {
            return None;
        }
        // A leading '@' asks for implicit intersection of the resolved value.
        let (text, intersect) = match token.value.strip_prefix('@') {
            Some(rest) => (rest, true),
            None => (token.value.as_str(), false),
        };
        let reference = Reference::parse(text)?;
        let inner = arena.push(AstNode::new(NodeKind::Reference(reference)));
        if intersect {
            let mut node = AstNode::new(NodeKind::Prefix(PrefixOp::Intersect));
            node.children.push(inner);
            Some(arena.push(node))
        } else {
            Some(inner)
        }
    }
}

static FACTORIES: Lazy<Vec<Box<dyn NodeFactory>>> = Lazy::new(|| {
    let mut factories: Vec<Box<dyn NodeFactory>> = vec![
        Box::new(ReferenceFactory),
        Box::new(LiteralFactory),
        Box::new(ErrorLiteralFactory),
    ];
    factories.sort_by_key(|f| f.zindex());
    factories
});

/// Strip surrounding double quotes and collapse doubled quotes.
fn unquote(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    inner.replace("\"\"", "\"")
}

struct Builder<'r> {
    arena: AstArena,
    registry: &'r FunctionRegistry,
}

impl Builder<'_> {
    /// Shunting-yard over one sibling sequence.
    fn build_sequence(&mut self, seq: &[TokenNode]) -> Result<NodeId, BuildError> {
        let mut output: Vec<NodeId> = Vec::new();
        let mut ops: Vec<Token> = Vec::new();

        for node in seq {
            match node {
                TokenNode::Leaf(token) if token.is_operator() => match token.kind {
                    TokenKind::OpPrefix => ops.push(token.clone()),
                    TokenKind::OpInfix => {
                        let (prec, assoc) = token
                            .precedence()
                            .ok_or_else(|| BuildError::MissingOperand(token.value.clone()))?;
                        while let Some(top) = ops.last() {
                            let Some((top_prec, _)) = top.precedence() else {
                                break;
                            };
                            if top_prec > prec || (top_prec == prec && assoc == Associativity::Left)
                            {
                                let Some(top) = ops.pop() else { break };
                                self.apply_operator(&top, &mut output)?;
                            } else {
                                break;
                            }
                        }
                        ops.push(token.clone());
                    }
                    TokenKind::OpPostfix => {
                        // Only prefix operators bind tighter than postfix '%'.
                        while let Some(top) = ops.last() {
                            if top.kind != TokenKind::OpPrefix {
                                break;
                            }
                            let Some(top) = ops.pop() else { break };
                            self.apply_operator(&top, &mut output)?;
                        }
                        let operand = output
                            .pop()
                            .ok_or_else(|| BuildError::MissingOperand(token.value.clone()))?;
                        let wrapped = self.operator_node(&token.value, &[operand]);
                        output.push(wrapped);
                    }
                    _ => unreachable!("is_operator covers only op kinds"),
                },
                TokenNode::Leaf(token) => {
                    if output.len() > ops.iter().filter(|o| o.kind == TokenKind::OpInfix).count() {
                        return Err(BuildError::DanglingOperand);
                    }
                    output.push(self.build_operand(token));
                }
                TokenNode::Group(group) => {
                    if output.len() > ops.iter().filter(|o| o.kind == TokenKind::OpInfix).count() {
                        return Err(BuildError::DanglingOperand);
                    }
                    output.push(self.build_group(group)?);
                }
            }
        }

        while let Some(op) = ops.pop() {
            self.apply_operator(&op, &mut output)?;
        }

        match output.len() {
            0 => Err(BuildError::Empty),
            1 => Ok(output[0]),
            _ => Err(BuildError::DanglingOperand),
        }
    }

    fn apply_operator(&mut self, op: &Token, output: &mut Vec<NodeId>) -> Result<(), BuildError> {
        match op.kind {
            TokenKind::OpPrefix => {
                let operand = output
                    .pop()
                    .ok_or_else(|| BuildError::MissingOperand(op.value.clone()))?;
                if op.value == "+" {
                    // Unary plus is the identity; no node.
                    output.push(operand);
                } else {
                    let mut node = AstNode::new(NodeKind::Prefix(PrefixOp::Minus));
                    node.children.push(operand);
                    output.push(self.arena.push(node));
                }
            }
            _ => {
                let right = output
                    .pop()
                    .ok_or_else(|| BuildError::MissingOperand(op.value.clone()))?;
                let left = output
                    .pop()
                    .ok_or_else(|| BuildError::MissingOperand(op.value.clone()))?;
                let node = self.operator_node(&op.value, &[left, right]);
                output.push(node);
            }
        }
        Ok(())
    }

    /// Call node for an infix/postfix operator, via its registered executor.
    fn operator_node(&mut self, op: &str, children: &[NodeId]) -> NodeId {
        match operator_function_name(op) {
            Some(name) => self.function_node(name, children),
            None => self.name_error_node(op),
        }
    }

    /// Classify a non-operator leaf: error literal, literal, reference, or
    /// the `#NAME?` fallback for an identifier nothing claims.
    fn build_operand(&mut self, token: &Token) -> NodeId {
        for factory in FACTORIES.iter() {
            if let Some(id) = factory.create(token, &mut self.arena) {
                return id;
            }
        }
        self.name_error_node(&token.value)
    }

    fn build_group(&mut self, group: &TokenGroup) -> Result<NodeId, BuildError> {
        match group.kind {
            GroupKind::Paren => {
                let seq = group.args().first().ok_or(BuildError::Empty)?;
                self.build_sequence(seq)
            }
            GroupKind::Array => self.build_array(group),
            GroupKind::Call => self.build_call(group),
        }
    }

    /// Constant array literal: `{1,2;3,4}`.
    fn build_array(&mut self, group: &TokenGroup) -> Result<NodeId, BuildError> {
        let mut rows = Vec::with_capacity(group.rows.len());
        for row in &group.rows {
            let mut out_row = Vec::with_capacity(row.len());
            for element in row {
                out_row.push(array_constant(element)?);
            }
            rows.push(out_row);
        }
        Ok(self
            .arena
            .push(AstNode::new(NodeKind::Value(CellValue::Array(rows)))))
    }

    /// Function call. Prefix markers written on the head are peeled off and
    /// rebuilt as wrapper nodes: a leading `-` negates the call result (the
    /// outermost wrapper), a leading `@` intersects it.
    fn build_call(&mut self, group: &TokenGroup) -> Result<NodeId, BuildError> {
        let Some(head) = &group.head else {
            return Err(BuildError::Empty);
        };

        let mut name = head.value.as_str();
        let negate = if let Some(rest) = name.strip_prefix('-') {
            name = rest;
            true
        } else {
            false
        };
        let intersect = if let Some(rest) = name.strip_prefix('@') {
            name = rest;
            true
        } else {
            false
        };

        // Arguments are built even when the name will not resolve, so a
        // malformed argument still fails the build. Elided slots (`F(1,,2)`)
        // contribute no child node.
        let mut children = Vec::with_capacity(group.args().len());
        for arg in group.args() {
            if arg.is_empty() {
                continue;
            }
            children.push(self.build_sequence(arg)?);
        }

        let mut node = self.function_node(name, &children);
        if intersect {
            let mut wrapper = AstNode::new(NodeKind::Prefix(PrefixOp::Intersect));
            wrapper.children.push(node);
            node = self.arena.push(wrapper);
        }
        if negate {
            let mut wrapper = AstNode::new(NodeKind::Prefix(PrefixOp::Minus));
            wrapper.children.push(node);
            node = self.arena.push(wrapper);
        }
        Ok(node)
    }

    fn function_node(&mut self, name: &str, children: &[NodeId]) -> NodeId {
        match self.registry.get(name) {
            Some(func) => {
                let caps = func.caps();
                let mut node = AstNode::new(NodeKind::Call {
                    name: name.to_ascii_uppercase(),
                    func: func.clone(),
                });
                node.children.extend_from_slice(children);
                if caps.contains(FnCaps::ASYNC) {
                    node.flags |= NodeFlags::ASYNC;
                }
                if caps.contains(FnCaps::VOLATILE) {
                    node.flags |= NodeFlags::VOLATILE;
                }
                if caps.contains(FnCaps::ADDRESS) {
                    node.flags |= NodeFlags::ADDRESS;
                }
                self.arena.push(node)
            }
            None => self.name_error_node(name),
        }
    }

    fn name_error_node(&mut self, name: &str) -> NodeId {
        warn!(name, "no executor registered; node settles to #NAME?");
        self.arena
            .push(AstNode::new(NodeKind::Value(CellValue::Error(
                FormulaError::new(FormulaErrorKind::Name)
                    .with_message(format!("unknown name '{name}'")),
            ))))
    }
}

/// One array element: a single literal token, optionally sign-prefixed.
fn array_constant(seq: &[TokenNode]) -> Result<CellValue, BuildError> {
    let value = |token: &Token| -> Result<CellValue, BuildError> {
        match token.kind {
            TokenKind::Number => {
                if let Ok(i) = token.value.parse::<i64>() {
                    Ok(CellValue::Int(i))
                } else {
                    token
                        .value
                        .parse::<f64>()
                        .map(CellValue::Number)
                        .map_err(|_| BuildError::NonConstantArray)
                }
            }
            TokenKind::Text => Ok(CellValue::Text(unquote(&token.value))),
            TokenKind::Logical => Ok(CellValue::Boolean(token.value.eq_ignore_ascii_case("TRUE"))),
            TokenKind::ErrorLit => FormulaErrorKind::parse(&token.value)
                .map(|k| CellValue::Error(FormulaError::new(k)))
                .ok_or(BuildError::NonConstantArray),
            _ => Err(BuildError::NonConstantArray),
        }
    };

    match seq {
        [TokenNode::Leaf(t)] => value(t),
        [TokenNode::Leaf(sign), TokenNode::Leaf(t)]
            if sign.kind == TokenKind::OpPrefix && sign.value == "-" =>
        {
            match value(t)? {
                CellValue::Int(i) => Ok(CellValue::Int(-i)),
                CellValue::Number(n) => Ok(CellValue::Number(-n)),
                _ => Err(BuildError::NonConstantArray),
            }
        }
        _ => Err(BuildError::NonConstantArray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellform_parse::tokenize;

    fn build(formula: &str) -> Ast {
        let registry = FunctionRegistry::with_builtins();
        build_ast(&tokenize(formula).unwrap(), &registry).unwrap()
    }

    fn call_name(ast: &Ast, id: NodeId) -> &str {
        match &ast.node(id).kind {
            NodeKind::Call { name, .. } => name,
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn precedence_shapes_the_tree() {
        // 1+2*3 parses as PLUS(1, MULTIPLY(2, 3)).
        let ast = build("=1+2*3");
        let root = ast.root();
        assert_eq!(call_name(&ast, root), "PLUS");
        let children = &ast.node(root).children;
        assert!(matches!(
            ast.node(children[0]).kind,
            NodeKind::Value(CellValue::Int(1))
        ));
        assert_eq!(call_name(&ast, children[1]), "MULTIPLY");
    }

    #[test]
    fn unary_minus_binds_tighter_than_power() {
        // -2^2 parses as POWER(Minus(2), 2).
        let ast = build("=-2^2");
        let root = ast.root();
        assert_eq!(call_name(&ast, root), "POWER");
        let left = ast.node(root).children[0];
        assert!(matches!(
            ast.node(left).kind,
            NodeKind::Prefix(PrefixOp::Minus)
        ));
    }

    #[test]
    fn comparison_binds_loosest() {
        let ast = build("=1+2>2&\"x\"");
        assert_eq!(call_name(&ast, ast.root()), "GT");
    }

    #[test]
    fn percent_is_a_call() {
        let ast = build("=50%");
        assert_eq!(call_name(&ast, ast.root()), "PERCENT");
    }

    #[test]
    fn negated_percent_applies_minus_first() {
        // -2% is PERCENT(Minus(2)).
        let ast = build("=-2%");
        let root = ast.root();
        assert_eq!(call_name(&ast, root), "PERCENT");
        let inner = ast.node(root).children[0];
        assert!(matches!(
            ast.node(inner).kind,
            NodeKind::Prefix(PrefixOp::Minus)
        ));
    }

    #[test]
    fn unknown_function_becomes_name_error_node() {
        let ast = build("=FOO(1)");
        match &ast.node(ast.root()).kind {
            NodeKind::Value(CellValue::Error(e)) => {
                assert_eq!(e.kind, FormulaErrorKind::Name);
            }
            other => panic!("expected #NAME? node, got {other:?}"),
        }
    }

    #[test]
    fn unknown_bare_name_becomes_name_error_node() {
        let ast = build("=bogus_name");
        match &ast.node(ast.root()).kind {
            NodeKind::Value(CellValue::Error(e)) => {
                assert_eq!(e.kind, FormulaErrorKind::Name);
            }
            other => panic!("expected #NAME? node, got {other:?}"),
        }
    }

    #[test]
    fn negated_call_head_wraps_outermost() {
        let ast = build("=-SUM(1,2)");
        let root = ast.root();
        assert!(matches!(
            ast.node(root).kind,
            NodeKind::Prefix(PrefixOp::Minus)
        ));
        let inner = ast.node(root).children[0];
        assert_eq!(call_name(&ast, inner), "SUM");
    }

    #[test]
    fn at_prefixed_call_head_intersects_inside_negation() {
        let ast = build("=-@SUM(1)");
        let root = ast.root();
        assert!(matches!(
            ast.node(root).kind,
            NodeKind::Prefix(PrefixOp::Minus)
        ));
        let mid = ast.node(root).children[0];
        assert!(matches!(
            ast.node(mid).kind,
            NodeKind::Prefix(PrefixOp::Intersect)
        ));
        assert_eq!(call_name(&ast, ast.node(mid).children[0]), "SUM");
    }

    #[test]
    fn elided_argument_slots_produce_no_children() {
        let ast = build("=SUM(1,,2)");
        assert_eq!(ast.node(ast.root()).children.len(), 2);
    }

    #[test]
    fn array_literal_is_a_constant() {
        let ast = build("={1,2;3,-4}");
        match &ast.node(ast.root()).kind {
            NodeKind::Value(CellValue::Array(rows)) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1][1], CellValue::Int(-4));
            }
            other => panic!("expected array constant, got {other:?}"),
        }
    }

    #[test]
    fn non_constant_array_is_a_build_fault() {
        let registry = FunctionRegistry::with_builtins();
        let err = build_ast(&tokenize("={SUM(1)}").unwrap(), &registry).unwrap_err();
        assert_eq!(err, BuildError::NonConstantArray);
    }

    #[test]
    fn references_are_collected() {
        let ast = build("=SUM(A1:B2,Sheet2!C3)+D4");
        let refs = ast.references();
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn dangling_operand_is_a_build_fault() {
        let registry = FunctionRegistry::with_builtins();
        let err = build_ast(&tokenize("=1 2").unwrap(), &registry).unwrap_err();
        assert_eq!(err, BuildError::DanglingOperand);
    }

    #[test]
    fn trailing_operator_is_a_build_fault() {
        let registry = FunctionRegistry::with_builtins();
        let err = build_ast(&tokenize("=1+").unwrap(), &registry).unwrap_err();
        assert!(matches!(err, BuildError::MissingOperand(_)));
    }
}
