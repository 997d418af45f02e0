//! Expression syntax tree
//!
//! Every `${...}` occurrence becomes one [ExpressionNode] which owns a tree of [Node]s. Nodes have
//! no parent links. The canonical text of a tree (its `Display`) is also what error messages
//! underline, see [ExpressionNode::highlight].

/// Root of a parsed `${...}`
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionNode {
    pub node: Node,
    /// Exact text of the expression in the parsed input, delimiters included
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Path(PathNode),
    Variable(VariableNode),
    Call(CallNode),
    Identifier(IdentifierNode),
    String(StringNode),
    Number(NumberNode),
}

/// `foo:bar:$baz`
///
/// Always at least two segments; each segment is a [Node::Identifier] or a [Node::Variable].
#[derive(Debug, Clone, PartialEq)]
pub struct PathNode {
    pub segments: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallNode {
    pub function: IdentifierNode,
    pub args: Vec<Node>,
    pub alternative: Option<Box<ExpressionNode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierNode {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringNode {
    pub value: String,
}

/// Numeric literal with every classification it satisfies
///
/// `42` is int, uint and float; `-1` is int and float; `1.5` is only float.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberNode {
    pub literal: String,
    pub int: Option<i64>,
    pub uint: Option<u64>,
    pub float: Option<f64>,
}

impl NumberNode {
    pub fn new(literal: impl Into<String>) -> Self {
        let literal = literal.into();
        let unsigned = literal.strip_prefix('+').unwrap_or(&literal);

        Self {
            int: unsigned.parse().ok(),
            uint: unsigned.parse().ok(),
            float: unsigned.parse().ok(),
            literal,
        }
    }

    pub fn is_int(&self) -> bool {
        self.int.is_some()
    }

    pub fn is_uint(&self) -> bool {
        self.uint.is_some()
    }

    pub fn is_float(&self) -> bool {
        self.float.is_some()
    }
}

impl ExpressionNode {
    pub fn new(node: Node, source: impl Into<String>) -> Self {
        Self {
            node,
            source: source.into(),
        }
    }

    /// Canonical text with the span of `target` underlined
    ///
    /// `target` is compared by identity, it has to be a node of this tree. Falls back to
    /// underlining the whole expression if it is not.
    pub fn highlight(&self, target: &Node) -> String {
        let mut renderer = Renderer::new(Some(target));
        renderer.expression(self);

        let span = renderer.span.unwrap_or(0..renderer.out.len());
        crate::error::underline(&renderer.out, span)
    }
}

impl std::fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut renderer = Renderer::new(None);
        renderer.expression(self);
        f.write_str(&renderer.out)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut renderer = Renderer::new(None);
        renderer.node(self);
        f.write_str(&renderer.out)
    }
}

/// Writes canonical text and records where `target` ended up
struct Renderer<'t> {
    out: String,
    target: Option<&'t Node>,
    span: Option<std::ops::Range<usize>>,
}

impl<'t> Renderer<'t> {
    fn new(target: Option<&'t Node>) -> Self {
        Self {
            out: String::new(),
            target,
            span: None,
        }
    }

    fn expression(&mut self, expression: &ExpressionNode) {
        self.out.push_str("${");
        self.node(&expression.node);
        self.out.push('}');
    }

    fn node(&mut self, node: &Node) {
        let start = self.out.len();

        match node {
            Node::Path(path) => {
                for (index, segment) in path.segments.iter().enumerate() {
                    if index > 0 {
                        self.out.push(':');
                    }
                    self.node(segment);
                }
            }
            Node::Variable(variable) => {
                self.out.push('$');
                self.out.push_str(&variable.name);
            }
            Node::Call(call) => self.call(call),
            Node::Identifier(identifier) => self.out.push_str(&identifier.name),
            Node::String(string) => {
                let quote = if string.value.contains('"') { '\'' } else { '"' };
                self.out.push(quote);
                self.out.push_str(&string.value);
                self.out.push(quote);
            }
            Node::Number(number) => self.out.push_str(&number.literal),
        }

        if self.span.is_none() && self.target.is_some_and(|target| std::ptr::eq(target, node)) {
            self.span = Some(start..self.out.len());
        }
    }

    fn call(&mut self, call: &CallNode) {
        self.out.push_str(&call.function.name);
        self.out.push('(');
        for (index, arg) in call.args.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.node(arg);
        }
        self.out.push(')');

        if let Some(alternative) = &call.alternative {
            self.out.push_str(" || ");
            self.node(&alternative.node);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Node {
        Node::Identifier(IdentifierNode { name: name.into() })
    }

    fn sample() -> ExpressionNode {
        let alternative = ExpressionNode::new(
            Node::Variable(VariableNode {
                name: "fallback".into(),
            }),
            "",
        );

        ExpressionNode::new(
            Node::Call(CallNode {
                function: IdentifierNode {
                    name: "fn".into(),
                },
                args: vec![
                    Node::Path(PathNode {
                        segments: vec![
                            ident("a"),
                            Node::Variable(VariableNode { name: "b".into() }),
                        ],
                    }),
                    Node::String(StringNode {
                        value: "say \"hi\"".into(),
                    }),
                    Node::Number(NumberNode::new("-1.5")),
                ],
                alternative: Some(Box::new(alternative)),
            }),
            "",
        )
    }

    #[test]
    fn canonical_text() {
        assert_eq!(
            sample().to_string(),
            r#"${fn(a:$b, 'say "hi"', -1.5) || $fallback}"#
        );
    }

    #[test]
    fn plain_strings_use_double_quotes() {
        let node = Node::String(StringNode {
            value: "it's".into(),
        });
        assert_eq!(node.to_string(), r#""it's""#);
        assert_eq!(ident("x").to_string(), "x");
    }

    #[test]
    fn highlight_argument() {
        let expr = sample();
        let Node::Call(call) = &expr.node else {
            unreachable!()
        };

        assert_eq!(
            expr.highlight(&call.args[0]),
            "  ${fn(a:$b, 'say \"hi\"', -1.5) || $fallback}\n       ^^^^"
        );
    }

    #[test]
    fn highlight_nested_alternative() {
        let expr = sample();
        let Node::Call(call) = &expr.node else {
            unreachable!()
        };
        let alternative = &call.alternative.as_ref().unwrap().node;

        let highlighted = expr.highlight(alternative);
        assert!(highlighted.ends_with(&format!("{}^^^^^^^^^", " ".repeat(34))));
    }

    #[test]
    fn highlight_foreign_node_marks_everything() {
        let expr = sample();
        let foreign = ident("a");

        let highlighted = expr.highlight(&foreign);
        let (text, marks) = highlighted.split_once('\n').unwrap();
        assert_eq!(text.trim().len(), marks.trim().len());
    }

    #[test]
    fn number_classification() {
        let n = NumberNode::new("42");
        assert!(n.is_int() && n.is_uint() && n.is_float());

        let n = NumberNode::new("-1");
        assert!(n.is_int() && !n.is_uint() && n.is_float());

        let n = NumberNode::new("+2.5");
        assert!(!n.is_int() && !n.is_uint() && n.is_float());
        assert_eq!(n.float, Some(2.5));

        let n = NumberNode::new("18446744073709551615");
        assert!(!n.is_int() && n.is_uint());
    }
}
