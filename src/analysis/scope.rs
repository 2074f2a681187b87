//! Binding-site index used to keep rewrites away from shadowed names.
//!
//! A call `d(3)` may only be replaced by the value of the top-level decoder `d` if the
//! identifier really resolves to it. The [`ScopeIndex`] records, per name, how often it
//! is defined at the top level and every nested scope (function, catch clause) that
//! rebinds it. The check is conservative: any rebinding in an enclosing scope makes the
//! site ineligible, regardless of declaration kind or hoisting order.

use std::collections::{HashMap, HashSet};

use crate::{
    analysis::detector::collect_binding_names,
    js::{FunctionKind, Node, NodeId, Program},
};

/// Where a name is bound.
#[derive(Debug, Default, Clone)]
struct Bindings {
    /// Definitions whose scope is the program itself.
    top_level: usize,
    /// Function or catch nodes that introduce their own binding of the name.
    scopes: Vec<NodeId>,
}

/// Index of every binding site in a program, keyed by name.
#[derive(Debug, Default)]
pub struct ScopeIndex {
    bindings: HashMap<String, Bindings>,
}

impl ScopeIndex {
    /// Builds the index for a program.
    ///
    /// # Arguments
    ///
    /// * `program` - The program to index.
    #[must_use]
    pub fn build(program: &Program) -> Self {
        let mut index = Self::default();
        let root = program.root();

        for id in program.pre_order(root) {
            match program.node(id) {
                Node::Declarator { target, .. } => {
                    let scope = enclosing_function(program, id).unwrap_or(root);
                    index.bind_pattern(program, *target, scope, root);
                }
                Node::Function(function) => {
                    for param in &function.params {
                        index.bind_pattern(program, *param, id, root);
                    }
                    if let Some(name) = function.name.and_then(|n| program.node(n).as_ident()) {
                        let scope = if function.kind == FunctionKind::Declaration {
                            enclosing_function(program, id).unwrap_or(root)
                        } else {
                            id
                        };
                        index.bind(name, scope, root);
                    }
                }
                Node::Class {
                    name: Some(name),
                    is_declaration,
                    ..
                } => {
                    if let Some(name) = program.node(*name).as_ident() {
                        let scope = if *is_declaration {
                            enclosing_function(program, id).unwrap_or(root)
                        } else {
                            id
                        };
                        index.bind(name, scope, root);
                    }
                }
                Node::Catch {
                    param: Some(param), ..
                } => index.bind_pattern(program, *param, id, root),
                _ => {}
            }
        }
        index
    }

    fn bind_pattern(&mut self, program: &Program, pattern: NodeId, scope: NodeId, root: NodeId) {
        let mut names = HashSet::new();
        collect_binding_names(program, pattern, &mut names);
        for name in names {
            self.bind(&name, scope, root);
        }
    }

    fn bind(&mut self, name: &str, scope: NodeId, root: NodeId) {
        let entry = self.bindings.entry(name.to_string()).or_default();
        if scope == root {
            entry.top_level += 1;
        } else {
            entry.scopes.push(scope);
        }
    }

    /// Number of top-level definitions of `name`.
    #[must_use]
    pub fn top_level_definitions(&self, name: &str) -> usize {
        self.bindings.get(name).map_or(0, |b| b.top_level)
    }

    /// Returns `true` if `name` at `site` may not refer to its single top-level
    /// definition.
    ///
    /// # Arguments
    ///
    /// * `program` - The indexed program.
    /// * `name` - The referenced name.
    /// * `site` - The referencing node.
    #[must_use]
    pub fn is_shadowed(&self, program: &Program, name: &str, site: NodeId) -> bool {
        let Some(bindings) = self.bindings.get(name) else {
            return false;
        };
        bindings.top_level > 1
            || bindings
                .scopes
                .iter()
                .any(|scope| program.is_within(site, *scope))
    }
}

fn enclosing_function(program: &Program, id: NodeId) -> Option<NodeId> {
    program
        .ancestors(id)
        .find(|ancestor| matches!(program.node(*ancestor), Node::Function(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::parse;

    fn calls<'p>(program: &'p Program, callee: &'p str) -> impl Iterator<Item = NodeId> + 'p {
        program.pre_order(program.root()).into_iter().filter(move |id| {
            matches!(program.node(*id), Node::Call { callee: c, .. } if program.node(*c).as_ident() == Some(callee))
        })
    }

    #[test]
    fn test_parameter_shadows_inside_function_only() -> crate::Result<()> {
        let program = parse("function d(i) {} function g(d) { return d(1); } d(2);")?;
        let index = ScopeIndex::build(&program);
        let shadowed: Vec<bool> = calls(&program, "d")
            .map(|site| index.is_shadowed(&program, "d", site))
            .collect();
        assert_eq!(shadowed, vec![true, false]);
        assert_eq!(index.top_level_definitions("d"), 1);
        Ok(())
    }

    #[test]
    fn test_local_declarations_and_catch() -> crate::Result<()> {
        let program = parse(
            "var d = function (i) {}; function g() { var { d } = o; d(1); } try {} catch (d) { d(2); } d(3);",
        )?;
        let index = ScopeIndex::build(&program);
        let shadowed: Vec<bool> = calls(&program, "d")
            .map(|site| index.is_shadowed(&program, "d", site))
            .collect();
        assert_eq!(shadowed, vec![true, true, false]);
        Ok(())
    }

    #[test]
    fn test_named_function_expression_binds_its_own_name() -> crate::Result<()> {
        let program = parse("function d(i) {} var h = function d() { return d(0); }; d(1);")?;
        let index = ScopeIndex::build(&program);
        let shadowed: Vec<bool> = calls(&program, "d")
            .map(|site| index.is_shadowed(&program, "d", site))
            .collect();
        assert_eq!(shadowed, vec![true, false]);
        Ok(())
    }

    #[test]
    fn test_duplicate_top_level_definitions() -> crate::Result<()> {
        let program = parse("function d(i) {} var d = 1; d(1);")?;
        let index = ScopeIndex::build(&program);
        assert_eq!(index.top_level_definitions("d"), 2);
        let site = calls(&program, "d").next().unwrap();
        assert!(index.is_shadowed(&program, "d", site));
        assert!(!index.is_shadowed(&program, "unknown", site));
        Ok(())
    }
}
