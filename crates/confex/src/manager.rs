//! Runs the expressions of a whole store in dependency order
//!
//! Every string value of a snapshot is parsed once; the expressions found are kept in a [Registry]
//! keyed by the value's path. Paths referenced by those expressions become edges of a
//! [DependencyGraph]: `foo.bar: "${bar:baz}"` gives `foo.bar -> bar.baz` if `bar.baz` holds an
//! expression itself. A referenced path also depends on registered paths below or above it, so
//! `${foo:bar}` waits for `foo.bar.baz`.
//!
//! Evaluating a vertex replaces the source text of each of its expressions with the result. An
//! expression that makes up the whole value replaces it with the typed result; otherwise the
//! result is formatted and spliced into the surrounding text.
use crate::error::{Error, Result};
use crate::expression::ast::{ExpressionNode, Node};
use crate::expression::eval::{execute, resolve_path, ValueProvider, Variables};
use crate::expression::functions::FunctionTable;
use crate::expression::parser::{parse, parse_single};
use crate::graph::DependencyGraph;
use crate::path::Path;
use crate::store::ValueTarget;
use crate::value::Value;
use crate::visit::VisitPaths;
use indexmap::{IndexMap, IndexSet};

/// Vertex id of the expression passed to [ExpressionManager::execute_input]
pub const INPUT_VERTEX: &str = "<input>";

/// path -> expressions in its value, in order of appearance
#[derive(derive_new::new, Debug, Clone, Default, PartialEq)]
pub struct Registry {
    #[new(default)]
    entries: IndexMap<String, Vec<ExpressionNode>>,
}

impl Registry {
    /// Parse every string value of `snapshot`
    ///
    /// Values without expressions are not recorded. A value that fails to parse aborts the build.
    pub fn build<'s, I>(snapshot: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'s String, &'s Value)>,
    {
        let mut registry = Registry::new();
        for (path, value) in snapshot {
            let Value::String(text) = value else {
                continue;
            };

            let expressions = parse(text).map_err(|e| {
                tracing::debug!(%path, error = %e, "value does not parse");
                e
            })?;
            if !expressions.is_empty() {
                tracing::trace!(%path, count = expressions.len(), "register expressions");
                registry.entries.insert(path.clone(), expressions);
            }
        }
        Ok(registry)
    }

    pub fn get(&self, path: &str) -> Option<&[ExpressionNode]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ExpressionNode])> {
        self.entries
            .iter()
            .map(|(path, expressions)| (path.as_str(), expressions.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered paths `expression` reads from
    fn dependencies(
        &self,
        expression: &ExpressionNode,
        variables: &Variables,
    ) -> Result<IndexSet<String>> {
        let mut candidates: Vec<Path> = vec![];
        let mut failure = None;

        expression.visit_paths(&mut |node: &Node| {
            let Node::Path(path) = node else {
                return;
            };
            if failure.is_some() {
                return;
            }
            match resolve_path(node, path, variables) {
                Ok(path) => candidates.push(path),
                Err(fault) => failure = Some(fault.into_error(expression)),
            }
        });

        if let Some(error) = failure {
            return Err(error);
        }

        let mut dependencies = IndexSet::new();
        for candidate in &candidates {
            for registered in self.paths() {
                let Ok(registered_path) = Path::parse(registered) else {
                    continue;
                };
                if candidate.contains(&registered_path) || registered_path.contains(candidate) {
                    dependencies.insert(registered.to_string());
                }
            }
        }
        Ok(dependencies)
    }
}

#[derive(Debug, Clone)]
pub struct ExpressionManager {
    registry: Registry,
    graph: DependencyGraph,
    variables: Variables,
    functions: FunctionTable,
}

impl ExpressionManager {
    /// Scan `snapshot` (path -> value) and build the dependency graph
    ///
    /// Fails on values that do not parse, on variable path segments that cannot be resolved and on
    /// dependency loops.
    pub fn new(
        snapshot: &IndexMap<String, Value>,
        variables: Variables,
        functions: FunctionTable,
    ) -> Result<Self> {
        let (registry, graph) = scan(snapshot, &variables)?;
        Ok(Self {
            registry,
            graph,
            variables,
            functions,
        })
    }

    /// Rebuild registry and graph from a new snapshot
    ///
    /// On error the previous state is kept.
    pub fn rescan(&mut self, snapshot: &IndexMap<String, Value>) -> Result<()> {
        let (registry, graph) = scan(snapshot, &self.variables)?;
        self.registry = registry;
        self.graph = graph;
        Ok(())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Registered paths that must be evaluated before `expression`
    pub fn dependencies(&self, expression: &ExpressionNode) -> Result<IndexSet<String>> {
        self.registry.dependencies(expression, &self.variables)
    }

    /// Evaluate `text`, which may contain at most one expression
    ///
    /// Registered values the expression depends on are resolved first and written back to
    /// `store`. Text without an expression is returned unchanged.
    #[tracing::instrument(level = "trace", skip_all, fields(input = text))]
    pub fn execute_input<S>(&self, text: &str, store: &mut S) -> Result<Value>
    where
        S: ValueProvider + ValueTarget,
    {
        let Some(expression) = parse_single(text)? else {
            return Ok(Value::String(text.to_string()));
        };

        let dependencies = self.dependencies(&expression)?;
        let mut graph = self.graph.clone();
        graph.add_edges(INPUT_VERTEX, dependencies.iter().map(String::as_str))?;

        let order = graph.subgraph(INPUT_VERTEX)?.topological_sort();
        tracing::debug!(?order, "evaluation order");
        for vertex in order.iter().filter(|vertex| *vertex != INPUT_VERTEX) {
            self.resolve_vertex(vertex, store)?;
        }

        self.substitute(
            Value::String(text.to_string()),
            std::slice::from_ref(&expression),
            &*store,
        )
    }

    /// Evaluate every registered expression and write the results to `store`
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn execute_all<S>(&self, store: &mut S) -> Result<()>
    where
        S: ValueProvider + ValueTarget,
    {
        for vertex in self.graph.topological_sort() {
            self.resolve_vertex(&vertex, store)?;
        }
        Ok(())
    }

    fn resolve_vertex<S>(&self, vertex: &str, store: &mut S) -> Result<()>
    where
        S: ValueProvider + ValueTarget,
    {
        let Some(expressions) = self.registry.get(vertex) else {
            return Ok(());
        };

        let path = Path::parse(vertex)?;
        let current = store.resolve(&path)?;
        let resolved = self.substitute(current.clone(), expressions, &*store)?;

        if resolved != current {
            tracing::debug!(%path, "substituted");
            store.assign(&path, resolved)?;
        }
        Ok(())
    }

    /// Replace the source of each expression in `value` with its result
    ///
    /// Expressions whose source no longer occurs are skipped and not evaluated.
    fn substitute(
        &self,
        mut value: Value,
        expressions: &[ExpressionNode],
        provider: &dyn ValueProvider,
    ) -> Result<Value> {
        for expression in expressions {
            let Value::String(text) = &value else {
                break;
            };
            if !text.contains(&expression.source) {
                continue;
            }

            let result = execute(expression, provider, &self.variables, &self.functions)?;
            value = splice(text, &expression.source, result);
        }
        Ok(value)
    }
}

fn scan(
    snapshot: &IndexMap<String, Value>,
    variables: &Variables,
) -> Result<(Registry, DependencyGraph)> {
    let registry = Registry::build(snapshot)?;

    let mut graph = DependencyGraph::new();
    for path in registry.paths() {
        graph.add_vertex(path);
    }
    for (path, expressions) in registry.iter() {
        let mut dependencies = IndexSet::new();
        for expression in expressions {
            dependencies.extend(registry.dependencies(expression, variables)?);
        }
        graph.add_edges(path, dependencies)?;
    }

    tracing::debug!(
        vertices = graph.len(),
        edges = graph.edge_count(),
        "dependency graph rebuilt"
    );
    Ok((registry, graph))
}

/// Put `result` in place of the first occurrence of `source` in `text`
///
/// When `source` is all of `text` the result keeps its type.
pub(crate) fn splice(text: &str, source: &str, result: Value) -> Value {
    if text == source {
        return result;
    }
    Value::String(text.replacen(source, &result.to_string(), 1))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expression::functions::ParamType;
    use crate::store::MapStore;
    use pretty_assertions::assert_eq;

    fn store(yaml: &str) -> MapStore {
        MapStore::from_yaml(yaml).unwrap()
    }

    fn manager(store: &MapStore) -> ExpressionManager {
        ExpressionManager::new(&store.snapshot(), Variables::new(), FunctionTable::new()).unwrap()
    }

    fn path(p: &str) -> Path {
        Path::parse(p).unwrap()
    }

    #[test]
    fn registry_skips_plain_values() {
        let store = store("a: plain\nb: 1\nc: 'x ${a:b} ${e:f}'");
        let registry = manager(&store).registry().clone();

        assert_eq!(registry.paths().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(registry.get("c").map(<[_]>::len), Some(2));
    }

    #[test]
    fn interpolates_referenced_values() {
        let mut store = store(
            r#"
john:
  name: "${john:first} ${john:last}"
  first: john
  last: doe
"#,
        );
        let manager = manager(&store);

        let result = manager.execute_input("${john:name}", &mut store).unwrap();
        assert_eq!(result, Value::from("john doe"));
        assert_eq!(
            store.resolve(&path("john.name")).unwrap(),
            Value::from("john doe")
        );
    }

    #[test]
    fn dependency_extraction() {
        let store = store(
            r#"
foo:
  bar: "${bar:baz}"
  qux: "${ohai:there}"
bar:
  baz: "${foo:qux}"
ohai:
  there: ohai
"#,
        );
        let manager = manager(&store);

        let expression = parse_single("${default(foo:bar, bar:baz) || set_env(foo:qux)}")
            .unwrap()
            .unwrap();
        let mut dependencies: Vec<String> =
            manager.dependencies(&expression).unwrap().into_iter().collect();
        dependencies.sort();

        assert_eq!(dependencies, vec!["bar.baz", "foo.bar", "foo.qux"]);
    }

    #[test]
    fn resolves_chains_in_order() {
        let mut store = store(
            r#"
foo:
  bar: "<${bar:baz}>"
  qux: "${ohai:there}"
bar:
  baz: "[${foo:qux}]"
ohai:
  there: ohai
"#,
        );
        let manager = manager(&store);
        assert_eq!(
            manager.graph().topological_sort(),
            vec!["foo.qux", "bar.baz", "foo.bar"]
        );

        let result = manager.execute_input("value: ${foo:bar}", &mut store).unwrap();
        assert_eq!(result, Value::from("value: <[ohai]>"));
    }

    #[test]
    fn parents_and_children_are_dependencies() {
        let mut store = store(
            r#"
svc:
  db:
    host: "${net:host}"
    port: 5432
net:
  host: example.org
"#,
        );
        let mut functions = FunctionTable::new();
        functions
            .register("keys", &[ParamType::Object], |args| {
                let keys: Vec<&str> = args[0].as_map()?.keys().map(String::as_str).collect();
                Ok(keys.join(",").into())
            })
            .unwrap();
        let manager =
            ExpressionManager::new(&store.snapshot(), Variables::new(), functions).unwrap();

        for input in ["${keys(svc:db)}", "${svc:db:host:inner}"] {
            let expression = parse_single(input).unwrap().unwrap();
            let dependencies: Vec<String> =
                manager.dependencies(&expression).unwrap().into_iter().collect();
            assert_eq!(dependencies, vec!["svc.db.host"], "{input}");
        }

        let result = manager.execute_input("${keys(svc:db)}", &mut store).unwrap();
        assert_eq!(result, Value::from("host,port"));
        assert_eq!(
            store.resolve(&path("svc.db.host")).unwrap(),
            Value::from("example.org")
        );
    }

    #[test]
    fn whole_value_keeps_type() {
        let mut store = store(
            r#"
server:
  port: 8080
copy:
  port: "${server:port}"
  url: "http://localhost:${server:port}/"
"#,
        );
        manager(&store).execute_all(&mut store).unwrap();

        assert_eq!(store.resolve(&path("copy.port")).unwrap(), Value::Integer(8080));
        assert_eq!(
            store.resolve(&path("copy.url")).unwrap(),
            Value::from("http://localhost:8080/")
        );
    }

    #[test]
    fn repeated_expressions_replace_in_order() {
        let mut store = store("a:\n  b: x\nc:\n  d: '${a:b}-${a:b}'");
        manager(&store).execute_all(&mut store).unwrap();

        assert_eq!(store.resolve(&path("c.d")).unwrap(), Value::from("x-x"));
    }

    #[test]
    fn variables_select_paths() {
        let mut store = store(
            r#"
db:
  prod:
    host: "db-${env}.internal"
app:
  host: "${db:$env:host}"
"#,
        );
        let variables: Variables = [("env".to_string(), Value::from("prod"))].into_iter().collect();
        let manager =
            ExpressionManager::new(&store.snapshot(), variables, FunctionTable::new()).unwrap();

        assert_eq!(manager.graph().topological_sort(), vec!["db.prod.host", "app.host"]);
        assert_eq!(
            manager.graph().dependencies_of("app.host").unwrap().collect::<Vec<_>>(),
            vec!["db.prod.host"]
        );

        let result = manager.execute_input("${app:host}", &mut store).unwrap();
        assert_eq!(result, Value::from("db-prod.internal"));
    }

    #[test]
    fn unresolvable_variable_segment() {
        let store = store("a:\n  b: '${db:$missing:host}'");
        let err = ExpressionManager::new(&store.snapshot(), Variables::new(), FunctionTable::new())
            .unwrap_err();

        assert!(matches!(err.root(), Error::UndefinedVariable { name } if name == "missing"));
    }

    #[test]
    fn loops_are_rejected() {
        let looping = store("a:\n  x: '${b:x}'\nb:\n  x: '${a:x}'");
        let err = ExpressionManager::new(&looping.snapshot(), Variables::new(), FunctionTable::new())
            .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { from, to } if from == "b.x" && to == "a.x"));

        let itself = store("a:\n  x: 'again ${a:x}'");
        let err = ExpressionManager::new(&itself.snapshot(), Variables::new(), FunctionTable::new())
            .unwrap_err();
        assert!(matches!(err, Error::SelfReferencingDependency { vertex } if vertex == "a.x"));
    }

    #[test]
    fn input_holds_at_most_one_expression() {
        let mut store = store("a:\n  x: '${a:y}'\n  y: plain");
        let manager = manager(&store);

        let err = manager.execute_input("${a:x} ${a:y}", &mut store).unwrap_err();
        assert!(matches!(err, Error::MultipleTopLevelExpressions { count: 2 }));

        assert_eq!(
            manager.execute_input("no expression", &mut store).unwrap(),
            Value::from("no expression")
        );
    }

    #[test]
    fn rescan_is_atomic() {
        let mut manager = manager(&store("a:\n  x: '${b:x}'\nb:\n  x: plain"));
        let before = manager.registry().clone();

        let err = manager
            .rescan(&store("a:\n  x: '${b:x}'\nb:\n  x: '${a:x}'").snapshot())
            .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
        assert_eq!(manager.registry(), &before);
        assert_eq!(manager.graph().len(), 1);

        manager
            .rescan(&store("a:\n  x: '${b:x}'\nb:\n  x: '${c:x}'\nc:\n  x: '${d:x}'").snapshot())
            .unwrap();
        assert_eq!(manager.graph().topological_sort(), vec!["c.x", "b.x", "a.x"]);
    }

    #[test]
    fn parse_errors_abort_the_scan() {
        let store = store("a:\n  x: 'broken ${a:'");
        let err = ExpressionManager::new(&store.snapshot(), Variables::new(), FunctionTable::new())
            .unwrap_err();
        assert!(matches!(err, Error::Lex { .. } | Error::Parse { .. }));
    }

    #[test]
    fn second_pass_is_a_noop() {
        let variable = "CONFEX_MANAGER_TEST_SECOND_PASS";
        std::env::set_var(variable, "one");
        let mut store = store(&format!("a:\n  x: '${{get_env(\"{variable}\")}}'\nb:\n  x: two"));
        let manager = manager(&store);

        manager.execute_all(&mut store).unwrap();
        let once = store.clone();
        std::env::set_var(variable, "changed");
        manager.execute_all(&mut store).unwrap();

        assert_eq!(store, once);
        assert_eq!(store.resolve(&path("a.x")).unwrap(), Value::from("one"));
    }

    #[test]
    fn splice_is_idempotent() {
        let resolved = splice("no expressions here", "${a:b}", "x".into());
        assert_eq!(resolved, Value::from("no expressions here"));

        let once = splice("${a:b} and ${a:b}", "${a:b}", "x".into());
        assert_eq!(once, Value::from("x and ${a:b}"));

        let list = splice("items: ${a:b}", "${a:b}", vec![1i64, 2].into());
        assert_eq!(list, Value::from("items: [1,2]"));

        let whole = splice("${a:b}", "${a:b}", Value::Boolean(true));
        assert_eq!(whole, Value::Boolean(true));
    }
}
