use super::Visit;
use crate::expression::ast::{ExpressionNode, Node};

/// Recursively visit all [Node::Path]s
///
/// Paths nested in call arguments and in alternatives are visited too, in source order.
pub trait VisitPaths {
    fn visit_paths(&self, visitor: &mut dyn Visit<Node>);
}

impl VisitPaths for ExpressionNode {
    fn visit_paths(&self, visitor: &mut dyn Visit<Node>) {
        self.node.visit_paths(visitor);
    }
}

impl VisitPaths for Node {
    fn visit_paths(&self, visitor: &mut dyn Visit<Node>) {
        match self {
            Node::Path(_) => visitor.visit(self),
            Node::Call(call) => {
                for arg in &call.args {
                    arg.visit_paths(visitor);
                }
                if let Some(alternative) = &call.alternative {
                    alternative.visit_paths(visitor);
                }
            }
            Node::Variable(_) | Node::Identifier(_) | Node::String(_) | Node::Number(_) => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expression::parser::parse;
    use pretty_assertions::assert_eq;

    fn paths_of(input: &str) -> Vec<String> {
        let mut found = vec![];
        for expression in parse(input).unwrap() {
            expression.visit_paths(&mut |node: &Node| found.push(node.to_string()));
        }
        found
    }

    #[test]
    fn top_level_path() {
        assert_eq!(paths_of("${foo:bar}"), vec!["foo:bar"]);
    }

    #[test]
    fn paths_in_calls_and_alternatives() {
        assert_eq!(
            paths_of("${default(foo:bar, g(bar:$x)) || set_env(foo:qux, $y)}"),
            vec!["foo:bar", "bar:$x", "foo:qux"]
        );
    }

    #[test]
    fn variables_and_literals_are_skipped() {
        assert_eq!(paths_of(r#"${f($a, "b:c", 1)} ${name}"#), Vec::<String>::new());
    }
}
