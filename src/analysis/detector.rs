//! Structural detection of string pools and their reader functions.
//!
//! The string-array layout stores every literal of a script in one array (the *pool*)
//! and replaces each literal with a call to a *reader* that indexes the pool, often
//! after rotating it, subtracting an offset, or decrypting the element with a key.
//!
//! Detection is purely structural and never relies on identifier names or brand
//! strings:
//!
//! - **Pools** are declarators whose initialiser is an array of at least
//!   `min_pool_size` string literals.
//! - **Providers** are function declarations that contain `return <pool>`, the
//!   wrapper newer layouts use to hide the pool inside a function.
//! - **Readers** are functions with at least one parameter whose body reads a pool
//!   reference with a computed index that depends on a parameter. A pool reference is
//!   the pool name itself, a call to a provider, or a local alias initialised from
//!   either. Parameter dependence is tracked through nested functions and local
//!   bindings, which covers decoders that replace themselves on first call.

use std::collections::HashSet;

use crate::js::{Node, NodeId, Program, Syntax};

/// An array literal consisting only of string literals.
#[derive(Debug, Clone, PartialEq)]
pub struct StringPool {
    /// Name of the binding holding the array.
    pub name: String,
    /// The literal values in declaration order.
    pub values: Vec<String>,
    /// The declarator that introduces the pool.
    pub declarator: NodeId,
}

/// A function that reads a string pool with a parameter-dependent index.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderCandidate {
    /// Name the function is bound to.
    pub name: String,
    /// Source text of each declared parameter.
    pub params: Vec<String>,
    /// The function node.
    pub function: NodeId,
    /// The body reads the `arguments` object.
    pub uses_arguments: bool,
}

impl DecoderCandidate {
    /// Number of declared parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// Everything the [`Detector`] found in one program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// String pools in tree order.
    pub pools: Vec<StringPool>,
    /// Names of functions that return a pool.
    pub providers: Vec<String>,
    /// Reader functions in tree order.
    pub decoders: Vec<DecoderCandidate>,
}

impl Detection {
    /// Returns `true` if at least one pool and one reader were found.
    #[must_use]
    pub fn is_match(&self) -> bool {
        !self.pools.is_empty() && !self.decoders.is_empty()
    }

    /// Names whose references pull a top-level statement into the prelude.
    #[must_use]
    pub fn tracked_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self
            .pools
            .iter()
            .map(|pool| &pool.name)
            .chain(self.providers.iter())
        {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Finds string pools, pool providers and reader functions in a [`Program`].
pub struct Detector<'a> {
    program: &'a Program,
    min_pool_size: usize,
}

impl<'a> Detector<'a> {
    /// Creates a detector.
    ///
    /// # Arguments
    ///
    /// * `program` - The parsed program to inspect.
    /// * `min_pool_size` - Minimum number of string literals for an array to count as
    ///   a pool.
    #[must_use]
    pub fn new(program: &'a Program, min_pool_size: usize) -> Self {
        Self {
            program,
            min_pool_size,
        }
    }

    /// Runs pool, provider and reader detection.
    #[must_use]
    pub fn detect(&self) -> Detection {
        let pools = self.find_pools();
        if pools.is_empty() {
            return Detection::default();
        }
        let pool_names: HashSet<&str> = pools.iter().map(|pool| pool.name.as_str()).collect();
        let providers = self.find_providers(&pool_names);
        let provider_names: HashSet<&str> = providers.iter().map(String::as_str).collect();
        let decoders = self.find_decoders(&pool_names, &provider_names);
        Detection {
            pools,
            providers,
            decoders,
        }
    }

    /// Finds every declarator initialised with an all-string array literal.
    #[must_use]
    pub fn find_pools(&self) -> Vec<StringPool> {
        let program = self.program;
        let mut pools = Vec::new();
        for id in program.pre_order(program.root()) {
            let Node::Declarator {
                target,
                init: Some(init),
            } = program.node(id)
            else {
                continue;
            };
            let Some(name) = program.node(*target).as_ident() else {
                continue;
            };
            let Node::Array { elements } = program.node(*init) else {
                continue;
            };
            if elements.len() < self.min_pool_size {
                continue;
            }
            let values: Option<Vec<String>> = elements
                .iter()
                .map(|element| match element.map(|e| program.node(e)) {
                    Some(Node::Str(value)) => Some(value.clone()),
                    _ => None,
                })
                .collect();
            if let Some(values) = values {
                pools.push(StringPool {
                    name: name.to_string(),
                    values,
                    declarator: id,
                });
            }
        }
        pools
    }

    /// Finds function declarations that contain `return <pool>`.
    fn find_providers(&self, pools: &HashSet<&str>) -> Vec<String> {
        let program = self.program;
        let mut providers: Vec<String> = Vec::new();
        for id in program.pre_order(program.root()) {
            let Node::Function(function) = program.node(id) else {
                continue;
            };
            if function.kind != crate::js::FunctionKind::Declaration {
                continue;
            }
            let Some(name) = function.name.and_then(|n| program.node(n).as_ident()) else {
                continue;
            };
            let returns_pool = program.pre_order(function.body).into_iter().any(|inner| {
                matches!(
                    program.node(inner),
                    Node::Return { arg: Some(arg) }
                        if program.node(*arg).as_ident().is_some_and(|n| pools.contains(n))
                )
            });
            if returns_pool && !providers.iter().any(|p| p == name) {
                providers.push(name.to_string());
            }
        }
        providers
    }

    fn find_decoders(
        &self,
        pools: &HashSet<&str>,
        providers: &HashSet<&str>,
    ) -> Vec<DecoderCandidate> {
        let program = self.program;
        let mut decoders = Vec::new();
        for id in program.pre_order(program.root()) {
            let (name, function_id) = match program.node(id) {
                Node::Function(function) if function.kind == crate::js::FunctionKind::Declaration => {
                    match function.name.and_then(|n| program.node(n).as_ident()) {
                        Some(name) => (name, id),
                        None => continue,
                    }
                }
                Node::Declarator {
                    target,
                    init: Some(init),
                } => match (program.node(*target).as_ident(), program.node(*init)) {
                    (Some(name), Node::Function(_)) => (name, *init),
                    _ => continue,
                },
                _ => continue,
            };
            let Some(function) = program.node(function_id).as_function() else {
                continue;
            };
            if function.params.is_empty() {
                continue;
            }
            if self.reads_pool_by_parameter(function_id, pools, providers) {
                decoders.push(DecoderCandidate {
                    name: name.to_string(),
                    params: function
                        .params
                        .iter()
                        .map(|param| program.text(*param).to_string())
                        .collect(),
                    function: function_id,
                    uses_arguments: program
                        .idents(function.body)
                        .any(|(_, ident)| ident == "arguments"),
                });
            }
        }
        decoders
    }

    /// Checks whether the function body indexes a pool reference with a tainted index.
    fn reads_pool_by_parameter(
        &self,
        function: NodeId,
        pools: &HashSet<&str>,
        providers: &HashSet<&str>,
    ) -> bool {
        let program = self.program;
        let nodes = program.pre_order(function);
        let tainted = self.tainted_names(&nodes);
        if tainted.is_empty() {
            return false;
        }
        let aliases = self.pool_aliases(&nodes, pools, providers);

        nodes.iter().any(|id| {
            let Node::Member {
                object,
                property,
                computed: true,
                ..
            } = program.node(*id)
            else {
                return false;
            };
            let is_pool = match program.node(*object) {
                Node::Ident(name) => pools.contains(name.as_str()) || aliases.contains(name),
                Node::Call { callee, .. } => program
                    .node(*callee)
                    .as_ident()
                    .is_some_and(|name| providers.contains(name)),
                _ => false,
            };
            is_pool
                && program
                    .idents(*property)
                    .any(|(_, name)| tainted.contains(name))
        })
    }

    /// Parameter names of the function and every nested function, closed over local
    /// bindings initialised or assigned from tainted expressions.
    fn tainted_names(&self, nodes: &[NodeId]) -> HashSet<String> {
        let program = self.program;
        let mut tainted = HashSet::new();
        for id in nodes {
            if let Node::Function(function) = program.node(*id) {
                for param in &function.params {
                    collect_binding_names(program, *param, &mut tainted);
                }
            }
        }

        let flows = local_flows(program, nodes);
        loop {
            let before = tainted.len();
            for (target, source) in &flows {
                if !tainted.contains(target)
                    && program.idents(*source).any(|(_, n)| tainted.contains(n))
                {
                    tainted.insert(target.clone());
                }
            }
            if tainted.len() == before {
                return tainted;
            }
        }
    }

    /// Local names bound to a pool or to the result of a provider call.
    fn pool_aliases(
        &self,
        nodes: &[NodeId],
        pools: &HashSet<&str>,
        providers: &HashSet<&str>,
    ) -> HashSet<String> {
        let program = self.program;
        let mut aliases: HashSet<String> = HashSet::new();
        let flows = local_flows(program, nodes);
        loop {
            let before = aliases.len();
            for (target, source) in &flows {
                let is_pool = match program.node(*source) {
                    Node::Ident(name) => pools.contains(name.as_str()) || aliases.contains(name),
                    Node::Call { callee, .. } => program
                        .node(*callee)
                        .as_ident()
                        .is_some_and(|name| providers.contains(name)),
                    _ => false,
                };
                if is_pool && !aliases.contains(target) {
                    aliases.insert(target.clone());
                }
            }
            if aliases.len() == before {
                return aliases;
            }
        }
    }
}

/// `(name, value)` pairs for `var name = value` and `name = value` inside `nodes`.
fn local_flows(program: &Program, nodes: &[NodeId]) -> Vec<(String, NodeId)> {
    let mut flows = Vec::new();
    for id in nodes {
        match program.node(*id) {
            Node::Declarator {
                target,
                init: Some(init),
            } => {
                if let Some(name) = program.node(*target).as_ident() {
                    flows.push((name.to_string(), *init));
                }
            }
            Node::Other {
                kind: Syntax::Assign,
                children,
            } if children.len() == 2 => {
                if let Some(name) = program.node(children[0]).as_ident() {
                    flows.push((name.to_string(), children[1]));
                }
            }
            _ => {}
        }
    }
    flows
}

/// Collects the names a binding pattern introduces.
///
/// Default values and computed keys inside the pattern are references, not bindings,
/// and are skipped.
pub(crate) fn collect_binding_names(program: &Program, pattern: NodeId, out: &mut HashSet<String>) {
    match program.node(pattern) {
        Node::Ident(name) => {
            out.insert(name.clone());
        }
        Node::Array { elements } => {
            for element in elements.iter().flatten() {
                collect_binding_names(program, *element, out);
            }
        }
        Node::Other {
            kind: Syntax::Assign | Syntax::Spread,
            children,
        } => {
            if let Some(target) = children.first() {
                collect_binding_names(program, *target, out);
            }
        }
        Node::Other {
            kind: Syntax::Object,
            children,
        } => {
            for property in children {
                if let Node::Other { kind, children } = program.node(*property) {
                    match (kind, children.as_slice()) {
                        // Shorthand, or rest element.
                        (Syntax::Property | Syntax::Spread, [single]) => {
                            collect_binding_names(program, *single, out);
                        }
                        (Syntax::Property, [_, value]) => {
                            collect_binding_names(program, *value, out);
                        }
                        _ => {}
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::parse;

    const SIMPLE: &str = r#"
        var pool = ['a', 'b', 'c', 'd', 'e', 'f'];
        function d(i) { return pool[i - 2]; }
        console.log(d(2));
    "#;

    #[test]
    fn test_simple_layout() -> crate::Result<()> {
        let program = parse(SIMPLE)?;
        let detection = Detector::new(&program, 6).detect();
        assert!(detection.is_match());
        assert_eq!(detection.pools.len(), 1);
        assert_eq!(detection.pools[0].name, "pool");
        assert_eq!(detection.pools[0].values, vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(detection.decoders.len(), 1);
        assert_eq!(detection.decoders[0].name, "d");
        assert_eq!(detection.decoders[0].params, vec!["i"]);
        assert!(!detection.decoders[0].uses_arguments);
        Ok(())
    }

    #[test]
    fn test_renaming_changes_nothing() -> crate::Result<()> {
        let renamed = SIMPLE.replace("pool", "_0x5a1e").replace("d(", "_0x2b3c(");
        let original = Detector::new(&parse(SIMPLE)?, 6).detect();
        let program = parse(&renamed)?;
        let detection = Detector::new(&program, 6).detect();
        assert_eq!(detection.pools.len(), original.pools.len());
        assert_eq!(detection.decoders.len(), original.decoders.len());
        assert_eq!(detection.decoders[0].name, "_0x2b3c");
        Ok(())
    }

    #[test]
    fn test_small_or_mixed_arrays_are_not_pools() -> crate::Result<()> {
        let program = parse(
            "var a = ['x', 'y']; var b = ['1', '2', '3', '4', '5', 6]; var c = ['1', , '3', '4', '5', '6', '7'];",
        )?;
        assert!(Detector::new(&program, 6).find_pools().is_empty());
        assert_eq!(Detector::new(&program, 2).find_pools().len(), 1);
        Ok(())
    }

    #[test]
    fn test_non_computed_access_is_not_a_read() -> crate::Result<()> {
        let program = parse(
            "var pool = ['a', 'b', 'c', 'd', 'e', 'f']; function f(i) { return pool.length + i; }",
        )?;
        let detection = Detector::new(&program, 6).detect();
        assert!(!detection.is_match());
        Ok(())
    }

    #[test]
    fn test_index_must_depend_on_parameter() -> crate::Result<()> {
        let program = parse(
            "var pool = ['a', 'b', 'c', 'd', 'e', 'f']; var k = 1; function f(i) { return pool[k]; }",
        )?;
        assert!(Detector::new(&program, 6).detect().decoders.is_empty());
        Ok(())
    }

    #[test]
    fn test_provider_alias_and_self_replacing_decoder() -> crate::Result<()> {
        let source = r#"
            function _0xp() {
                var list = ['aa', 'bb', 'cc', 'dd', 'ee', 'ff', 'gg'];
                _0xp = function () { return list; };
                return _0xp();
            }
            function _0xd(a, b) {
                var cached = _0xp();
                return _0xd = function (x, y) {
                    x = x - 0x100;
                    var item = cached[x];
                    return item;
                }, _0xd(a, b);
            }
        "#;
        let program = parse(source)?;
        let detection = Detector::new(&program, 6).detect();
        assert_eq!(detection.providers, vec!["_0xp"]);
        assert_eq!(detection.decoders.len(), 1);
        assert_eq!(detection.decoders[0].name, "_0xd");
        assert_eq!(detection.decoders[0].param_count(), 2);
        assert_eq!(detection.tracked_names(), vec!["list", "_0xp"]);
        Ok(())
    }

    #[test]
    fn test_taint_flows_through_locals() -> crate::Result<()> {
        let source = r#"
            var pool = ['a', 'b', 'c', 'd', 'e', 'f'];
            var reader = function (n) {
                var shifted = n - 1;
                var idx;
                idx = shifted * 1;
                if (arguments.length > 1) { idx = 0; }
                return pool[idx];
            };
        "#;
        let program = parse(source)?;
        let detection = Detector::new(&program, 6).detect();
        assert_eq!(detection.decoders.len(), 1);
        assert_eq!(detection.decoders[0].name, "reader");
        assert!(detection.decoders[0].uses_arguments);
        Ok(())
    }

    #[test]
    fn test_binding_names_of_patterns() -> crate::Result<()> {
        let program = parse("var [a, , {b, c: [d], e = f, [g]: h, ...i}, ...j] = x;")?;
        let Node::VarDecl { declarators, .. } = program.node(program.statements()[0]) else {
            panic!("expected declaration");
        };
        let Node::Declarator { target, .. } = program.node(declarators[0]) else {
            panic!("expected declarator");
        };
        let mut names = HashSet::new();
        collect_binding_names(&program, *target, &mut names);
        let mut names: Vec<_> = names.into_iter().collect();
        names.sort();
        assert_eq!(names, vec!["a", "b", "d", "e", "h", "i", "j"]);
        Ok(())
    }
}
