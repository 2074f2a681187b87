//! Lowering of oxc's syntax tree into the [`Program`] arena.
//!
//! oxc owns the grammar. This module walks its tree once and records every node the
//! analyses care about as an arena slot carrying oxc's byte span, so rewriting and
//! rendering keep working on the original text.
//!
//! Shapes follow a few conventions:
//!
//! - Binding patterns and assignment targets share the expression shapes: arrays,
//!   objects of [`Syntax::Property`], [`Syntax::Assign`] for defaults and
//!   [`Syntax::Spread`] for rest elements. A shorthand property has a single child.
//! - Directives become expression statements holding a [`Node::Str`].
//! - Optional chains are flattened into `optional` members and calls.
//! - A concise arrow body is the expression itself.
//!
//! TypeScript and JSX forms are rejected with [`Error::Syntax`].

use oxc_ast::ast as oxc;
use oxc_span::{GetSpan, Span as SourceSpan};

use crate::{
    js::{
        ast::{BinaryOp, Function, FunctionKind, Node, NodeId, Program, Span, Syntax, VarKind},
        parser::MAX_NESTING_DEPTH,
    },
    Error, Result,
};

/// Lowers a parsed oxc program over `source` into an arena [`Program`].
///
/// # Errors
///
/// Returns [`Error::Syntax`] for syntax outside plain JavaScript and
/// [`Error::RecursionLimit`] if the tree nests deeper than [`MAX_NESTING_DEPTH`].
pub(crate) fn lower(source: &str, program: &oxc::Program<'_>) -> Result<Program> {
    let mut lowerer = Lowerer::default();
    let mut body = lowerer.directives(&program.directives);
    for statement in program.body.iter() {
        body.push(lowerer.statement(statement)?);
    }
    let root = lowerer.alloc(Node::Program { body }, Span::new(0, source.len()));
    Ok(Program::from_parts(source.to_string(), lowerer.nodes, root))
}

fn range(span: SourceSpan) -> Span {
    Span::new(span.start as usize, span.end as usize)
}

fn unsupported(span: SourceSpan) -> Error {
    syntax_error!(
        span.start as usize,
        "unsupported syntax (TypeScript, JSX or another extension)"
    )
}

#[derive(Default)]
struct Lowerer {
    nodes: Vec<(Node, Span)>,
    depth: usize,
}

impl Lowerer {
    // ---- arena ----------------------------------------------------------------------

    fn alloc(&mut self, node: Node, span: Span) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push((node, span));
        id
    }

    fn other(&mut self, kind: Syntax, children: Vec<NodeId>, span: SourceSpan) -> NodeId {
        self.alloc(Node::Other { kind, children }, range(span))
    }

    fn leaf(&mut self, kind: Syntax, span: SourceSpan) -> NodeId {
        self.other(kind, Vec::new(), span)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(Error::RecursionLimit(MAX_NESTING_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ---- names ----------------------------------------------------------------------

    fn binding_ident(&mut self, ident: &oxc::BindingIdentifier<'_>) -> NodeId {
        self.alloc(Node::Ident(ident.name.to_string()), range(ident.span))
    }

    fn label(&mut self, label: &oxc::LabelIdentifier<'_>) -> NodeId {
        self.alloc(Node::Name(label.name.to_string()), range(label.span))
    }

    fn string_literal(&mut self, literal: &oxc::StringLiteral<'_>) -> NodeId {
        self.alloc(Node::Str(literal.value.to_string()), range(literal.span))
    }

    fn export_name(&mut self, name: &oxc::ModuleExportName<'_>) -> NodeId {
        let (text, span) = match name {
            oxc::ModuleExportName::IdentifierName(ident) => (ident.name.to_string(), ident.span),
            oxc::ModuleExportName::IdentifierReference(ident) => {
                (ident.name.to_string(), ident.span)
            }
            oxc::ModuleExportName::StringLiteral(literal) => {
                (literal.value.to_string(), literal.span)
            }
        };
        self.alloc(Node::Name(text), range(span))
    }

    fn property_key(&mut self, key: &oxc::PropertyKey<'_>) -> Result<NodeId> {
        match key {
            oxc::PropertyKey::StaticIdentifier(ident) => {
                Ok(self.alloc(Node::Name(ident.name.to_string()), range(ident.span)))
            }
            oxc::PropertyKey::PrivateIdentifier(ident) => {
                Ok(self.alloc(Node::Name(format!("#{}", ident.name)), range(ident.span)))
            }
            _ => match key.as_expression() {
                Some(expr) => self.expression(expr),
                None => Err(unsupported(key.span())),
            },
        }
    }

    // ---- statements -----------------------------------------------------------------

    fn directives(&mut self, directives: &[oxc::Directive<'_>]) -> Vec<NodeId> {
        directives
            .iter()
            .map(|directive| {
                let expr = self.string_literal(&directive.expression);
                self.alloc(Node::ExprStmt { expr }, range(directive.span))
            })
            .collect()
    }

    fn statement(&mut self, statement: &oxc::Statement<'_>) -> Result<NodeId> {
        self.enter()?;
        let result = self.statement_inner(statement);
        self.leave();
        result
    }

    fn statement_inner(&mut self, statement: &oxc::Statement<'_>) -> Result<NodeId> {
        let span = statement.span();
        let id = match statement {
            oxc::Statement::BlockStatement(block) => self.block(block)?,
            oxc::Statement::EmptyStatement(_) => self.alloc(Node::Empty, range(span)),
            oxc::Statement::ExpressionStatement(statement) => {
                let expr = self.expression(&statement.expression)?;
                self.alloc(Node::ExprStmt { expr }, range(span))
            }
            oxc::Statement::VariableDeclaration(declaration) => self.var_decl(declaration)?,
            oxc::Statement::FunctionDeclaration(function) => {
                self.function(function, FunctionKind::Declaration)?
            }
            oxc::Statement::ClassDeclaration(class) => self.class(class, true)?,
            oxc::Statement::ReturnStatement(statement) => {
                let arg = statement
                    .argument
                    .as_ref()
                    .map(|arg| self.expression(arg))
                    .transpose()?;
                self.alloc(Node::Return { arg }, range(span))
            }
            oxc::Statement::IfStatement(statement) => {
                let mut children = vec![
                    self.expression(&statement.test)?,
                    self.statement(&statement.consequent)?,
                ];
                if let Some(alternate) = &statement.alternate {
                    children.push(self.statement(alternate)?);
                }
                self.other(Syntax::If, children, span)
            }
            oxc::Statement::ForStatement(statement) => {
                let mut children = Vec::new();
                if let Some(init) = &statement.init {
                    children.push(self.for_init(init)?);
                }
                if let Some(test) = &statement.test {
                    children.push(self.expression(test)?);
                }
                if let Some(update) = &statement.update {
                    children.push(self.expression(update)?);
                }
                children.push(self.statement(&statement.body)?);
                self.other(Syntax::For, children, span)
            }
            oxc::Statement::ForInStatement(statement) => {
                let children = vec![
                    self.for_left(&statement.left)?,
                    self.expression(&statement.right)?,
                    self.statement(&statement.body)?,
                ];
                self.other(Syntax::ForIn, children, span)
            }
            oxc::Statement::ForOfStatement(statement) => {
                let children = vec![
                    self.for_left(&statement.left)?,
                    self.expression(&statement.right)?,
                    self.statement(&statement.body)?,
                ];
                self.other(Syntax::ForOf, children, span)
            }
            oxc::Statement::WhileStatement(statement) => {
                let children = vec![
                    self.expression(&statement.test)?,
                    self.statement(&statement.body)?,
                ];
                self.other(Syntax::While, children, span)
            }
            oxc::Statement::DoWhileStatement(statement) => {
                let children = vec![
                    self.statement(&statement.body)?,
                    self.expression(&statement.test)?,
                ];
                self.other(Syntax::DoWhile, children, span)
            }
            oxc::Statement::BreakStatement(statement) => {
                let children = statement.label.iter().map(|label| self.label(label)).collect();
                self.other(Syntax::Break, children, span)
            }
            oxc::Statement::ContinueStatement(statement) => {
                let children = statement.label.iter().map(|label| self.label(label)).collect();
                self.other(Syntax::Continue, children, span)
            }
            oxc::Statement::ThrowStatement(statement) => {
                let arg = self.expression(&statement.argument)?;
                self.other(Syntax::Throw, vec![arg], span)
            }
            oxc::Statement::TryStatement(statement) => self.try_statement(statement)?,
            oxc::Statement::SwitchStatement(statement) => {
                let mut children = vec![self.expression(&statement.discriminant)?];
                for case in statement.cases.iter() {
                    let mut case_children = Vec::with_capacity(case.consequent.len() + 1);
                    if let Some(test) = &case.test {
                        case_children.push(self.expression(test)?);
                    }
                    for inner in case.consequent.iter() {
                        case_children.push(self.statement(inner)?);
                    }
                    children.push(self.other(Syntax::SwitchCase, case_children, case.span));
                }
                self.other(Syntax::Switch, children, span)
            }
            oxc::Statement::LabeledStatement(statement) => {
                let label = self.label(&statement.label);
                let body = self.statement(&statement.body)?;
                self.other(Syntax::Labeled, vec![label, body], span)
            }
            oxc::Statement::WithStatement(statement) => {
                let children = vec![
                    self.expression(&statement.object)?,
                    self.statement(&statement.body)?,
                ];
                self.other(Syntax::With, children, span)
            }
            oxc::Statement::DebuggerStatement(_) => self.leaf(Syntax::Debugger, span),
            oxc::Statement::ImportDeclaration(import) => self.import(import)?,
            oxc::Statement::ExportNamedDeclaration(export) => self.export_named(export)?,
            oxc::Statement::ExportDefaultDeclaration(export) => {
                let child = match &export.declaration {
                    oxc::ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                        self.function(function, FunctionKind::Declaration)?
                    }
                    oxc::ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        self.class(class, true)?
                    }
                    declaration => match declaration.as_expression() {
                        Some(expr) => self.expression(expr)?,
                        None => return Err(unsupported(declaration.span())),
                    },
                };
                self.other(Syntax::Export, vec![child], span)
            }
            oxc::Statement::ExportAllDeclaration(export) => {
                let mut children = Vec::with_capacity(2);
                if let Some(exported) = &export.exported {
                    children.push(self.export_name(exported));
                }
                children.push(self.string_literal(&export.source));
                self.other(Syntax::Export, children, span)
            }
            _ => return Err(unsupported(span)),
        };
        Ok(id)
    }

    fn block(&mut self, block: &oxc::BlockStatement<'_>) -> Result<NodeId> {
        let mut body = Vec::with_capacity(block.body.len());
        for statement in block.body.iter() {
            body.push(self.statement(statement)?);
        }
        Ok(self.other(Syntax::Block, body, block.span))
    }

    fn var_decl(&mut self, declaration: &oxc::VariableDeclaration<'_>) -> Result<NodeId> {
        let kind = match declaration.kind {
            oxc::VariableDeclarationKind::Var => VarKind::Var,
            oxc::VariableDeclarationKind::Let => VarKind::Let,
            oxc::VariableDeclarationKind::Const => VarKind::Const,
            _ => return Err(unsupported(declaration.span)),
        };
        let mut declarators = Vec::with_capacity(declaration.declarations.len());
        for declarator in declaration.declarations.iter() {
            let target = self.pattern(&declarator.id)?;
            let init = declarator
                .init
                .as_ref()
                .map(|init| self.expression(init))
                .transpose()?;
            declarators.push(self.alloc(Node::Declarator { target, init }, range(declarator.span)));
        }
        Ok(self.alloc(Node::VarDecl { kind, declarators }, range(declaration.span)))
    }

    fn for_init(&mut self, init: &oxc::ForStatementInit<'_>) -> Result<NodeId> {
        match init {
            oxc::ForStatementInit::VariableDeclaration(declaration) => self.var_decl(declaration),
            _ => match init.as_expression() {
                Some(expr) => self.expression(expr),
                None => Err(unsupported(init.span())),
            },
        }
    }

    fn for_left(&mut self, left: &oxc::ForStatementLeft<'_>) -> Result<NodeId> {
        match left {
            oxc::ForStatementLeft::VariableDeclaration(declaration) => self.var_decl(declaration),
            _ => match left.as_assignment_target() {
                Some(target) => self.assignment_target(target),
                None => Err(unsupported(left.span())),
            },
        }
    }

    fn try_statement(&mut self, statement: &oxc::TryStatement<'_>) -> Result<NodeId> {
        let mut children = vec![self.block(&statement.block)?];
        if let Some(handler) = &statement.handler {
            let param = handler
                .param
                .as_ref()
                .map(|param| self.pattern(&param.pattern))
                .transpose()?;
            let body = self.block(&handler.body)?;
            children.push(self.alloc(Node::Catch { param, body }, range(handler.span)));
        }
        if let Some(finalizer) = &statement.finalizer {
            children.push(self.block(finalizer)?);
        }
        Ok(self.other(Syntax::Try, children, statement.span))
    }

    fn import(&mut self, import: &oxc::ImportDeclaration<'_>) -> Result<NodeId> {
        let mut children = Vec::new();
        if let Some(specifiers) = &import.specifiers {
            for specifier in specifiers.iter() {
                match specifier {
                    oxc::ImportDeclarationSpecifier::ImportSpecifier(specifier) => {
                        if specifier.imported.span() != specifier.local.span {
                            children.push(self.export_name(&specifier.imported));
                        }
                        children.push(self.binding_ident(&specifier.local));
                    }
                    oxc::ImportDeclarationSpecifier::ImportDefaultSpecifier(specifier) => {
                        children.push(self.binding_ident(&specifier.local));
                    }
                    oxc::ImportDeclarationSpecifier::ImportNamespaceSpecifier(specifier) => {
                        children.push(self.binding_ident(&specifier.local));
                    }
                }
            }
        }
        children.push(self.string_literal(&import.source));
        Ok(self.other(Syntax::Import, children, import.span))
    }

    /// `export { a as b }` keeps `a` as a reference unless it is re-exported `from`
    /// another module.
    fn export_named(&mut self, export: &oxc::ExportNamedDeclaration<'_>) -> Result<NodeId> {
        let mut children = Vec::new();
        if let Some(declaration) = &export.declaration {
            children.push(self.declaration(declaration)?);
        }
        for specifier in export.specifiers.iter() {
            let local = match &specifier.local {
                oxc::ModuleExportName::IdentifierReference(ident) => {
                    self.alloc(Node::Ident(ident.name.to_string()), range(ident.span))
                }
                other => self.export_name(other),
            };
            children.push(local);
            if specifier.exported.span() != specifier.local.span() {
                children.push(self.export_name(&specifier.exported));
            }
        }
        if let Some(source) = &export.source {
            children.push(self.string_literal(source));
        }
        Ok(self.other(Syntax::Export, children, export.span))
    }

    fn declaration(&mut self, declaration: &oxc::Declaration<'_>) -> Result<NodeId> {
        match declaration {
            oxc::Declaration::VariableDeclaration(declaration) => self.var_decl(declaration),
            oxc::Declaration::FunctionDeclaration(function) => {
                self.function(function, FunctionKind::Declaration)
            }
            oxc::Declaration::ClassDeclaration(class) => self.class(class, true),
            _ => Err(unsupported(declaration.span())),
        }
    }

    // ---- functions and classes ------------------------------------------------------

    fn function(&mut self, function: &oxc::Function<'_>, kind: FunctionKind) -> Result<NodeId> {
        let Some(body) = &function.body else {
            // Overload signatures and `declare function` only exist in TypeScript.
            return Err(unsupported(function.span));
        };
        let name = function.id.as_ref().map(|id| self.binding_ident(id));
        let params = self.params(&function.params)?;
        let body = self.function_body(body)?;
        Ok(self.alloc(
            Node::Function(Function {
                kind,
                name,
                params,
                body,
                is_async: function.r#async,
                is_generator: function.generator,
            }),
            range(function.span),
        ))
    }

    fn arrow(&mut self, arrow: &oxc::ArrowFunctionExpression<'_>) -> Result<NodeId> {
        let params = self.params(&arrow.params)?;
        let body = if arrow.expression {
            match arrow.body.statements.first() {
                Some(oxc::Statement::ExpressionStatement(statement)) => {
                    self.expression(&statement.expression)?
                }
                _ => return Err(unsupported(arrow.body.span)),
            }
        } else {
            self.function_body(&arrow.body)?
        };
        Ok(self.alloc(
            Node::Function(Function {
                kind: FunctionKind::Arrow,
                name: None,
                params,
                body,
                is_async: arrow.r#async,
                is_generator: false,
            }),
            range(arrow.span),
        ))
    }

    fn params(&mut self, params: &oxc::FormalParameters<'_>) -> Result<Vec<NodeId>> {
        let mut out = Vec::with_capacity(params.items.len() + 1);
        for param in params.items.iter() {
            out.push(self.pattern(&param.pattern)?);
        }
        if let Some(rest) = &params.rest {
            out.push(self.binding_rest(rest)?);
        }
        Ok(out)
    }

    fn function_body(&mut self, body: &oxc::FunctionBody<'_>) -> Result<NodeId> {
        let mut statements = self.directives(&body.directives);
        for statement in body.statements.iter() {
            statements.push(self.statement(statement)?);
        }
        Ok(self.other(Syntax::Block, statements, body.span))
    }

    fn class(&mut self, class: &oxc::Class<'_>, is_declaration: bool) -> Result<NodeId> {
        let name = class.id.as_ref().map(|id| self.binding_ident(id));
        let heritage = class
            .super_class
            .as_ref()
            .map(|heritage| self.expression(heritage))
            .transpose()?;
        let mut members = Vec::with_capacity(class.body.body.len());
        for element in class.body.body.iter() {
            members.push(self.class_element(element)?);
        }
        Ok(self.alloc(
            Node::Class {
                name,
                heritage,
                members,
                is_declaration,
            },
            range(class.span),
        ))
    }

    fn class_element(&mut self, element: &oxc::ClassElement<'_>) -> Result<NodeId> {
        let span = element.span();
        match element {
            oxc::ClassElement::StaticBlock(block) => {
                let mut body = Vec::with_capacity(block.body.len());
                for statement in block.body.iter() {
                    body.push(self.statement(statement)?);
                }
                let inner = self.other(Syntax::Block, body, span);
                Ok(self.other(Syntax::StaticBlock, vec![inner], span))
            }
            oxc::ClassElement::MethodDefinition(method) => {
                let key = self.property_key(&method.key)?;
                let value = self.function(&method.value, FunctionKind::Method)?;
                Ok(self.other(Syntax::ClassMember, vec![key, value], span))
            }
            oxc::ClassElement::PropertyDefinition(property) => {
                let mut children = vec![self.property_key(&property.key)?];
                if let Some(value) = &property.value {
                    children.push(self.expression(value)?);
                }
                Ok(self.other(Syntax::ClassMember, children, span))
            }
            oxc::ClassElement::AccessorProperty(property) => {
                let mut children = vec![self.property_key(&property.key)?];
                if let Some(value) = &property.value {
                    children.push(self.expression(value)?);
                }
                Ok(self.other(Syntax::ClassMember, children, span))
            }
            _ => Err(unsupported(span)),
        }
    }

    // ---- patterns -------------------------------------------------------------------

    fn pattern(&mut self, pattern: &oxc::BindingPattern<'_>) -> Result<NodeId> {
        self.enter()?;
        let result = self.pattern_inner(&pattern.kind);
        self.leave();
        result
    }

    fn pattern_inner(&mut self, kind: &oxc::BindingPatternKind<'_>) -> Result<NodeId> {
        let span = kind.span();
        match kind {
            oxc::BindingPatternKind::BindingIdentifier(ident) => Ok(self.binding_ident(ident)),
            oxc::BindingPatternKind::AssignmentPattern(assign) => {
                let target = self.pattern(&assign.left)?;
                let default = self.expression(&assign.right)?;
                Ok(self.other(Syntax::Assign, vec![target, default], span))
            }
            oxc::BindingPatternKind::ArrayPattern(array) => {
                let mut elements = Vec::with_capacity(array.elements.len() + 1);
                for element in array.elements.iter() {
                    elements.push(match element {
                        Some(element) => Some(self.pattern(element)?),
                        None => None,
                    });
                }
                if let Some(rest) = &array.rest {
                    elements.push(Some(self.binding_rest(rest)?));
                }
                Ok(self.alloc(Node::Array { elements }, range(span)))
            }
            oxc::BindingPatternKind::ObjectPattern(object) => {
                let mut properties = Vec::with_capacity(object.properties.len() + 1);
                for property in object.properties.iter() {
                    let children = if property.shorthand {
                        vec![self.pattern(&property.value)?]
                    } else {
                        let key = self.property_key(&property.key)?;
                        vec![key, self.pattern(&property.value)?]
                    };
                    properties.push(self.other(Syntax::Property, children, property.span));
                }
                if let Some(rest) = &object.rest {
                    properties.push(self.binding_rest(rest)?);
                }
                Ok(self.other(Syntax::Object, properties, span))
            }
        }
    }

    fn binding_rest(&mut self, rest: &oxc::BindingRestElement<'_>) -> Result<NodeId> {
        let target = self.pattern(&rest.argument)?;
        Ok(self.other(Syntax::Spread, vec![target], rest.span))
    }

    fn assignment_target(&mut self, target: &oxc::AssignmentTarget<'_>) -> Result<NodeId> {
        self.enter()?;
        let result = self.assignment_target_inner(target);
        self.leave();
        result
    }

    fn assignment_target_inner(&mut self, target: &oxc::AssignmentTarget<'_>) -> Result<NodeId> {
        match target {
            oxc::AssignmentTarget::ArrayAssignmentTarget(array) => {
                let mut elements = Vec::with_capacity(array.elements.len() + 1);
                for element in array.elements.iter() {
                    elements.push(match element {
                        Some(element) => Some(self.maybe_default(element)?),
                        None => None,
                    });
                }
                if let Some(rest) = &array.rest {
                    elements.push(Some(self.target_rest(rest)?));
                }
                Ok(self.alloc(Node::Array { elements }, range(array.span)))
            }
            oxc::AssignmentTarget::ObjectAssignmentTarget(object) => {
                let mut properties = Vec::with_capacity(object.properties.len() + 1);
                for property in object.properties.iter() {
                    properties.push(self.target_property(property)?);
                }
                if let Some(rest) = &object.rest {
                    properties.push(self.target_rest(rest)?);
                }
                Ok(self.other(Syntax::Object, properties, object.span))
            }
            _ => match target.as_simple_assignment_target() {
                Some(simple) => self.simple_target(simple),
                None => Err(unsupported(target.span())),
            },
        }
    }

    fn target_property(&mut self, property: &oxc::AssignmentTargetProperty<'_>) -> Result<NodeId> {
        match property {
            oxc::AssignmentTargetProperty::AssignmentTargetPropertyIdentifier(shorthand) => {
                let binding = &shorthand.binding;
                let mut value = self.alloc(Node::Ident(binding.name.to_string()), range(binding.span));
                if let Some(init) = &shorthand.init {
                    let default = self.expression(init)?;
                    value = self.other(Syntax::Assign, vec![value, default], shorthand.span);
                }
                Ok(self.other(Syntax::Property, vec![value], shorthand.span))
            }
            oxc::AssignmentTargetProperty::AssignmentTargetPropertyProperty(keyed) => {
                let key = self.property_key(&keyed.name)?;
                let value = self.maybe_default(&keyed.binding)?;
                Ok(self.other(Syntax::Property, vec![key, value], keyed.span))
            }
        }
    }

    fn maybe_default(&mut self, target: &oxc::AssignmentTargetMaybeDefault<'_>) -> Result<NodeId> {
        match target {
            oxc::AssignmentTargetMaybeDefault::AssignmentTargetWithDefault(with_default) => {
                let binding = self.assignment_target(&with_default.binding)?;
                let default = self.expression(&with_default.init)?;
                Ok(self.other(Syntax::Assign, vec![binding, default], with_default.span))
            }
            _ => match target.as_assignment_target() {
                Some(inner) => self.assignment_target(inner),
                None => Err(unsupported(target.span())),
            },
        }
    }

    fn target_rest(&mut self, rest: &oxc::AssignmentTargetRest<'_>) -> Result<NodeId> {
        let target = self.assignment_target(&rest.target)?;
        Ok(self.other(Syntax::Spread, vec![target], rest.span))
    }

    fn simple_target(&mut self, target: &oxc::SimpleAssignmentTarget<'_>) -> Result<NodeId> {
        match target {
            oxc::SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) => {
                Ok(self.alloc(Node::Ident(ident.name.to_string()), range(ident.span)))
            }
            _ => match target.as_member_expression() {
                Some(member) => self.member(member),
                None => Err(unsupported(target.span())),
            },
        }
    }

    // ---- expressions ----------------------------------------------------------------

    fn expression(&mut self, expr: &oxc::Expression<'_>) -> Result<NodeId> {
        self.enter()?;
        let result = self.expression_inner(expr);
        self.leave();
        result
    }

    fn expression_inner(&mut self, expr: &oxc::Expression<'_>) -> Result<NodeId> {
        let span = expr.span();
        let id = match expr {
            oxc::Expression::Identifier(ident) => {
                self.alloc(Node::Ident(ident.name.to_string()), range(span))
            }
            oxc::Expression::StringLiteral(literal) => self.string_literal(literal),
            oxc::Expression::NumericLiteral(literal) => {
                self.alloc(Node::Num(literal.value), range(span))
            }
            oxc::Expression::BooleanLiteral(literal) => {
                self.alloc(Node::Bool(literal.value), range(span))
            }
            oxc::Expression::NullLiteral(_) => self.leaf(Syntax::Null, span),
            oxc::Expression::BigIntLiteral(_) => self.leaf(Syntax::BigInt, span),
            oxc::Expression::RegExpLiteral(_) => self.leaf(Syntax::Regex, span),
            oxc::Expression::ThisExpression(_) => self.leaf(Syntax::This, span),
            oxc::Expression::Super(_) => self.leaf(Syntax::Super, span),
            oxc::Expression::MetaProperty(_) => self.leaf(Syntax::MetaProperty, span),
            oxc::Expression::TemplateLiteral(template) => self.template(template)?,
            oxc::Expression::TaggedTemplateExpression(tagged) => {
                let tag = self.expression(&tagged.tag)?;
                let template = self.template(&tagged.quasi)?;
                self.other(Syntax::TaggedTemplate, vec![tag, template], span)
            }
            oxc::Expression::ArrayExpression(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in array.elements.iter() {
                    elements.push(self.array_element(element)?);
                }
                self.alloc(Node::Array { elements }, range(span))
            }
            oxc::Expression::ObjectExpression(object) => {
                let mut properties = Vec::with_capacity(object.properties.len());
                for property in object.properties.iter() {
                    properties.push(match property {
                        oxc::ObjectPropertyKind::ObjectProperty(property) => {
                            self.object_property(property)?
                        }
                        oxc::ObjectPropertyKind::SpreadProperty(spread) => self.spread(spread)?,
                    });
                }
                self.other(Syntax::Object, properties, span)
            }
            oxc::Expression::FunctionExpression(function) => {
                self.function(function, FunctionKind::Expression)?
            }
            oxc::Expression::ArrowFunctionExpression(arrow) => self.arrow(arrow)?,
            oxc::Expression::ClassExpression(class) => self.class(class, false)?,
            oxc::Expression::ParenthesizedExpression(paren) => {
                let expr = self.expression(&paren.expression)?;
                self.alloc(Node::Paren { expr }, range(span))
            }
            oxc::Expression::SequenceExpression(sequence) => {
                let mut items = Vec::with_capacity(sequence.expressions.len());
                for item in sequence.expressions.iter() {
                    items.push(self.expression(item)?);
                }
                self.other(Syntax::Sequence, items, span)
            }
            oxc::Expression::UnaryExpression(unary) => {
                let op = unary
                    .operator
                    .as_str()
                    .parse()
                    .map_err(|_| unsupported(span))?;
                let arg = self.expression(&unary.argument)?;
                self.alloc(Node::Unary { op, arg }, range(span))
            }
            oxc::Expression::UpdateExpression(update) => {
                let arg = self.simple_target(&update.argument)?;
                self.other(Syntax::Update, vec![arg], span)
            }
            oxc::Expression::BinaryExpression(binary) => {
                let op = binary
                    .operator
                    .as_str()
                    .parse()
                    .map_err(|_| unsupported(span))?;
                let left = self.expression(&binary.left)?;
                let right = self.expression(&binary.right)?;
                self.alloc(Node::Binary { op, left, right }, range(span))
            }
            oxc::Expression::LogicalExpression(logical) => {
                let op = logical
                    .operator
                    .as_str()
                    .parse()
                    .map_err(|_| unsupported(span))?;
                let left = self.expression(&logical.left)?;
                let right = self.expression(&logical.right)?;
                self.alloc(Node::Binary { op, left, right }, range(span))
            }
            oxc::Expression::PrivateInExpression(private_in) => {
                let left = self.leaf(Syntax::PrivateName, private_in.left.span);
                let right = self.expression(&private_in.right)?;
                self.alloc(
                    Node::Binary {
                        op: BinaryOp::In,
                        left,
                        right,
                    },
                    range(span),
                )
            }
            oxc::Expression::AssignmentExpression(assign) => {
                let left = self.assignment_target(&assign.left)?;
                let right = self.expression(&assign.right)?;
                self.other(Syntax::Assign, vec![left, right], span)
            }
            oxc::Expression::ConditionalExpression(conditional) => {
                let children = vec![
                    self.expression(&conditional.test)?,
                    self.expression(&conditional.consequent)?,
                    self.expression(&conditional.alternate)?,
                ];
                self.other(Syntax::Conditional, children, span)
            }
            oxc::Expression::CallExpression(call) => self.call(call)?,
            oxc::Expression::NewExpression(new) => {
                let mut children = vec![self.expression(&new.callee)?];
                for argument in new.arguments.iter() {
                    children.push(self.argument(argument)?);
                }
                self.other(Syntax::New, children, span)
            }
            oxc::Expression::ImportExpression(import) => {
                // `import(x)` keeps the call shape: an `import` callee and one argument.
                let start = span.start as usize;
                let callee = self.alloc(
                    Node::Other {
                        kind: Syntax::Import,
                        children: Vec::new(),
                    },
                    Span::new(start, start + "import".len()),
                );
                let source = self.expression(&import.source)?;
                self.alloc(
                    Node::Call {
                        callee,
                        args: vec![source],
                        optional: false,
                    },
                    range(span),
                )
            }
            oxc::Expression::ChainExpression(chain) => self.chain_element(&chain.expression)?,
            oxc::Expression::ComputedMemberExpression(member) => self.computed_member(member)?,
            oxc::Expression::StaticMemberExpression(member) => self.static_member(member)?,
            oxc::Expression::PrivateFieldExpression(member) => self.private_field(member)?,
            oxc::Expression::YieldExpression(expr) => {
                let children = match &expr.argument {
                    Some(arg) => vec![self.expression(arg)?],
                    None => Vec::new(),
                };
                self.other(Syntax::Yield, children, span)
            }
            oxc::Expression::AwaitExpression(expr) => {
                let arg = self.expression(&expr.argument)?;
                self.other(Syntax::Await, vec![arg], span)
            }
            _ => return Err(unsupported(span)),
        };
        Ok(id)
    }

    fn template(&mut self, template: &oxc::TemplateLiteral<'_>) -> Result<NodeId> {
        let mut children = Vec::with_capacity(template.expressions.len());
        for expr in template.expressions.iter() {
            children.push(self.expression(expr)?);
        }
        Ok(self.other(Syntax::Template, children, template.span))
    }

    fn array_element(&mut self, element: &oxc::ArrayExpressionElement<'_>) -> Result<Option<NodeId>> {
        match element {
            oxc::ArrayExpressionElement::Elision(_) => Ok(None),
            oxc::ArrayExpressionElement::SpreadElement(spread) => Ok(Some(self.spread(spread)?)),
            _ => match element.as_expression() {
                Some(expr) => Ok(Some(self.expression(expr)?)),
                None => Err(unsupported(element.span())),
            },
        }
    }

    fn object_property(&mut self, property: &oxc::ObjectProperty<'_>) -> Result<NodeId> {
        if property.shorthand {
            let value = self.expression(&property.value)?;
            return Ok(self.other(Syntax::Property, vec![value], property.span));
        }
        let key = self.property_key(&property.key)?;
        let is_method = property.method || !matches!(property.kind, oxc::PropertyKind::Init);
        let value = match &property.value {
            oxc::Expression::FunctionExpression(function) if is_method => {
                self.function(function, FunctionKind::Method)?
            }
            value => self.expression(value)?,
        };
        Ok(self.other(Syntax::Property, vec![key, value], property.span))
    }

    fn spread(&mut self, spread: &oxc::SpreadElement<'_>) -> Result<NodeId> {
        let arg = self.expression(&spread.argument)?;
        Ok(self.other(Syntax::Spread, vec![arg], spread.span))
    }

    fn argument(&mut self, argument: &oxc::Argument<'_>) -> Result<NodeId> {
        match argument {
            oxc::Argument::SpreadElement(spread) => self.spread(spread),
            _ => match argument.as_expression() {
                Some(expr) => self.expression(expr),
                None => Err(unsupported(argument.span())),
            },
        }
    }

    fn call(&mut self, call: &oxc::CallExpression<'_>) -> Result<NodeId> {
        let callee = self.expression(&call.callee)?;
        let mut args = Vec::with_capacity(call.arguments.len());
        for argument in call.arguments.iter() {
            args.push(self.argument(argument)?);
        }
        Ok(self.alloc(
            Node::Call {
                callee,
                args,
                optional: call.optional,
            },
            range(call.span),
        ))
    }

    fn chain_element(&mut self, element: &oxc::ChainElement<'_>) -> Result<NodeId> {
        match element {
            oxc::ChainElement::CallExpression(call) => self.call(call),
            _ => match element.as_member_expression() {
                Some(member) => self.member(member),
                None => Err(unsupported(element.span())),
            },
        }
    }

    fn member(&mut self, member: &oxc::MemberExpression<'_>) -> Result<NodeId> {
        match member {
            oxc::MemberExpression::ComputedMemberExpression(member) => self.computed_member(member),
            oxc::MemberExpression::StaticMemberExpression(member) => self.static_member(member),
            oxc::MemberExpression::PrivateFieldExpression(member) => self.private_field(member),
        }
    }

    fn computed_member(&mut self, member: &oxc::ComputedMemberExpression<'_>) -> Result<NodeId> {
        let object = self.expression(&member.object)?;
        let property = self.expression(&member.expression)?;
        Ok(self.alloc(
            Node::Member {
                object,
                property,
                computed: true,
                optional: member.optional,
            },
            range(member.span),
        ))
    }

    fn static_member(&mut self, member: &oxc::StaticMemberExpression<'_>) -> Result<NodeId> {
        let object = self.expression(&member.object)?;
        let name = &member.property;
        let property = self.alloc(Node::Name(name.name.to_string()), range(name.span));
        Ok(self.alloc(
            Node::Member {
                object,
                property,
                computed: false,
                optional: member.optional,
            },
            range(member.span),
        ))
    }

    fn private_field(&mut self, member: &oxc::PrivateFieldExpression<'_>) -> Result<NodeId> {
        let object = self.expression(&member.object)?;
        let field = &member.field;
        let property = self.alloc(Node::Name(format!("#{}", field.name)), range(field.span));
        Ok(self.alloc(
            Node::Member {
                object,
                property,
                computed: false,
                optional: member.optional,
            },
            range(member.span),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::parse;

    fn first_expr(program: &Program) -> NodeId {
        match program.node(program.statements()[0]) {
            Node::ExprStmt { expr } => *expr,
            other => panic!("not an expression statement: {other:?}"),
        }
    }

    fn kind_of(program: &Program, id: NodeId) -> Option<Syntax> {
        match program.node(id) {
            Node::Other { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[test]
    fn test_directives_become_string_statements() -> crate::Result<()> {
        let program = parse("'use strict'; function f() { 'use asm'; return 1; }")?;
        let Node::ExprStmt { expr } = program.node(program.statements()[0]) else {
            panic!("expected directive statement");
        };
        assert_eq!(program.node(*expr), &Node::Str("use strict".into()));
        assert_eq!(program.text(program.statements()[0]), "'use strict';");

        let Node::Function(function) = program.node(program.statements()[1]) else {
            panic!("expected function");
        };
        let Node::Other { children, .. } = program.node(function.body) else {
            panic!("expected block body");
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(program.node(children[0]), Node::ExprStmt { .. }));
        Ok(())
    }

    #[test]
    fn test_binding_patterns_share_expression_shapes() -> crate::Result<()> {
        let program = parse("var { a, b: [c = 1, ...d], ...e } = o;")?;
        let Node::VarDecl { declarators, .. } = program.node(program.statements()[0]) else {
            panic!("expected declaration");
        };
        let Node::Declarator { target, .. } = program.node(declarators[0]) else {
            panic!("expected declarator");
        };
        let Node::Other { kind: Syntax::Object, children } = program.node(*target) else {
            panic!("expected object pattern");
        };
        assert_eq!(children.len(), 3);
        assert_eq!(kind_of(&program, children[2]), Some(Syntax::Spread));

        // `a` is shorthand: one child.
        let Node::Other { children: shorthand, .. } = program.node(children[0]) else {
            panic!("expected property");
        };
        assert_eq!(shorthand.len(), 1);
        assert_eq!(program.node(shorthand[0]).as_ident(), Some("a"));

        let Node::Other { children: keyed, .. } = program.node(children[1]) else {
            panic!("expected property");
        };
        assert_eq!(program.node(keyed[0]), &Node::Name("b".into()));
        let Node::Array { elements } = program.node(keyed[1]) else {
            panic!("expected array pattern");
        };
        let kinds: Vec<_> = elements
            .iter()
            .map(|element| element.and_then(|id| kind_of(&program, id)))
            .collect();
        assert_eq!(kinds, vec![Some(Syntax::Assign), Some(Syntax::Spread)]);
        Ok(())
    }

    #[test]
    fn test_assignment_targets_share_expression_shapes() -> crate::Result<()> {
        let program = parse("({ x = 2, y: z } = w);")?;
        let Node::Paren { expr } = program.node(first_expr(&program)) else {
            panic!("expected parenthesised assignment");
        };
        let Node::Other { kind: Syntax::Assign, children } = program.node(*expr) else {
            panic!("expected assignment");
        };
        let Node::Other { kind: Syntax::Object, children: properties } = program.node(children[0])
        else {
            panic!("expected object target");
        };
        let Node::Other { children: shorthand, .. } = program.node(properties[0]) else {
            panic!("expected property");
        };
        assert_eq!(kind_of(&program, shorthand[0]), Some(Syntax::Assign));
        let Node::Other { children: keyed, .. } = program.node(properties[1]) else {
            panic!("expected property");
        };
        assert_eq!(program.node(keyed[1]).as_ident(), Some("z"));
        Ok(())
    }

    #[test]
    fn test_optional_chain_is_flattened() -> crate::Result<()> {
        let program = parse("a?.b(c);")?;
        let Node::Call { callee, optional, .. } = program.node(first_expr(&program)) else {
            panic!("expected call");
        };
        assert!(!optional);
        assert!(matches!(
            program.node(*callee),
            Node::Member {
                optional: true,
                computed: false,
                ..
            }
        ));
        assert_eq!(program.text(first_expr(&program)), "a?.b(c)");
        Ok(())
    }

    #[test]
    fn test_dynamic_import_keeps_call_shape() -> crate::Result<()> {
        let program = parse("import('lazy');")?;
        let Node::Call { callee, args, .. } = program.node(first_expr(&program)) else {
            panic!("expected call");
        };
        assert_eq!(kind_of(&program, *callee), Some(Syntax::Import));
        assert_eq!(program.text(*callee), "import");
        assert_eq!(program.node(args[0]), &Node::Str("lazy".into()));
        Ok(())
    }

    #[test]
    fn test_export_specifiers() -> crate::Result<()> {
        let program = parse("export { a as b, c }; export { d } from 'm';")?;
        let Node::Other { children, .. } = program.node(program.statements()[0]) else {
            panic!("expected export");
        };
        let nodes: Vec<_> = children.iter().map(|id| program.node(*id).clone()).collect();
        assert_eq!(
            nodes,
            vec![
                Node::Ident("a".into()),
                Node::Name("b".into()),
                Node::Ident("c".into()),
            ]
        );
        let Node::Other { children, .. } = program.node(program.statements()[1]) else {
            panic!("expected export");
        };
        assert_eq!(program.node(children[0]), &Node::Name("d".into()));
        Ok(())
    }

    #[test]
    fn test_typescript_is_rejected() {
        assert!(matches!(
            parse("let x = y as number;"),
            Err(Error::Syntax { .. })
        ));
    }
}
