//! Integration tests for the tokenizer's tree output.

use cellform_parse::{GroupKind, TokenNode, tokenize};
use proptest::prelude::*;

#[test]
fn deeply_nested_calls() {
    let tree = tokenize("=IF(SUM(A1:A3)>10,MAX(1,MIN(2,3)),0)").unwrap();
    assert_eq!(tree.items.len(), 1);
    let TokenNode::Group(ifg) = &tree.items[0] else {
        panic!("expected a call group");
    };
    assert_eq!(ifg.kind, GroupKind::Call);
    assert_eq!(ifg.args().len(), 3);
    // First argument is SUM(...) > 10: a group followed by an operator and a number.
    assert_eq!(ifg.args()[0].len(), 3);
}

#[test]
fn render_canonicalises_whitespace() {
    let spaced = tokenize("= SUM( A1 , 2 ) + 3 ").unwrap();
    let tight = tokenize("=SUM(A1,2)+3").unwrap();
    assert_eq!(spaced.render(), tight.render());
    assert_eq!(tight.render(), "=SUM(A1,2)+3");
}

/// Strategy producing small arithmetic expressions with optional nesting.
fn arith_expr(depth: u32) -> BoxedStrategy<String> {
    let num = (0u32..1000).prop_map(|n| n.to_string());
    if depth == 0 {
        num.boxed()
    } else {
        let inner = arith_expr(depth - 1);
        prop_oneof![
            (0u32..1000).prop_map(|n| n.to_string()),
            (inner.clone(), prop::sample::select(vec!["+", "-", "*", "/", "^"]), inner.clone())
                .prop_map(|(a, op, b)| format!("{a}{op}{b}")),
            inner.prop_map(|e| format!("({e})")),
        ]
        .boxed()
    }
}

proptest! {
    /// Tokenizing is insensitive to whitespace added around token boundaries.
    #[test]
    fn whitespace_insensitive(expr in arith_expr(3), pad in 0usize..3) {
        let formula = format!("={expr}");
        let spaced: String = formula
            .chars()
            .flat_map(|c| {
                let mut out = String::new();
                out.push(c);
                if "+-*/^()".contains(c) {
                    out.push_str(&" ".repeat(pad));
                }
                out.chars().collect::<Vec<_>>()
            })
            .collect();

        let a = tokenize(&formula).unwrap();
        let b = tokenize(&spaced).unwrap();
        prop_assert_eq!(a.render(), b.render());
    }

    /// Rendering the tree and tokenizing again is a fixed point.
    #[test]
    fn render_is_fixed_point(expr in arith_expr(3)) {
        let tree = tokenize(&format!("={expr}")).unwrap();
        let again = tokenize(&tree.render()).unwrap();
        prop_assert_eq!(tree.render(), again.render());
    }
}
