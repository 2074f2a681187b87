//! Arena-backed syntax tree for JavaScript sources.
//!
//! Every node lives in a flat slot vector owned by [`Program`] and is addressed by a
//! stable [`NodeId`]. Slots record the node's byte span in the original source and a
//! link to their parent, which lets analyses walk upwards (scope lookups, statement
//! membership) without holding references into the tree.
//!
//! The [`Node`] enum is closed: forms the deobfuscator reasons about get a dedicated
//! variant, everything else is carried by [`Node::Other`] with its children in source
//! order so traversals stay total.
//!
//! # Mutation
//!
//! Rewrites never restructure the tree. A node is replaced by writing a new leaf into
//! its slot with [`Program::replace`]; the slot keeps its span, so rendering can splice
//! the new text into the untouched original (see [`crate::js::render`]).

use std::fmt;

use strum::{AsRefStr, Display, EnumString};

/// Stable identifier of a node inside a [`Program`] arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a `NodeId` from a raw slot index.
    ///
    /// # Arguments
    ///
    /// * `index` - The 0-based slot index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    /// Returns the raw slot index of this node.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Half-open byte range `[start, end)` into the original source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length of the span in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the span covers no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Returns `true` if `other` lies entirely within this span.
    #[must_use]
    pub const fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Declaration keyword of a [`Node::VarDecl`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum VarKind {
    /// `var`
    #[strum(serialize = "var")]
    Var,
    /// `let`
    #[strum(serialize = "let")]
    Let,
    /// `const`
    #[strum(serialize = "const")]
    Const,
}

/// Binary and logical operators.
///
/// The strum serialisations are the operator tokens, so oxc's operator text converts
/// with `str::parse`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum BinaryOp {
    /// `+`
    #[strum(serialize = "+")]
    Add,
    /// `-`
    #[strum(serialize = "-")]
    Sub,
    /// `*`
    #[strum(serialize = "*")]
    Mul,
    /// `/`
    #[strum(serialize = "/")]
    Div,
    /// `%`
    #[strum(serialize = "%")]
    Rem,
    /// `**`
    #[strum(serialize = "**")]
    Exp,
    /// `<<`
    #[strum(serialize = "<<")]
    Shl,
    /// `>>`
    #[strum(serialize = ">>")]
    Shr,
    /// `>>>`
    #[strum(serialize = ">>>")]
    UShr,
    /// `&`
    #[strum(serialize = "&")]
    BitAnd,
    /// `|`
    #[strum(serialize = "|")]
    BitOr,
    /// `^`
    #[strum(serialize = "^")]
    BitXor,
    /// `==`
    #[strum(serialize = "==")]
    Eq,
    /// `!=`
    #[strum(serialize = "!=")]
    NotEq,
    /// `===`
    #[strum(serialize = "===")]
    StrictEq,
    /// `!==`
    #[strum(serialize = "!==")]
    StrictNotEq,
    /// `<`
    #[strum(serialize = "<")]
    Lt,
    /// `<=`
    #[strum(serialize = "<=")]
    LtEq,
    /// `>`
    #[strum(serialize = ">")]
    Gt,
    /// `>=`
    #[strum(serialize = ">=")]
    GtEq,
    /// `in`
    #[strum(serialize = "in")]
    In,
    /// `instanceof`
    #[strum(serialize = "instanceof")]
    InstanceOf,
    /// `&&`
    #[strum(serialize = "&&")]
    And,
    /// `||`
    #[strum(serialize = "||")]
    Or,
    /// `??`
    #[strum(serialize = "??")]
    Coalesce,
}

/// Prefix unary operators (`++`/`--` are carried as [`Syntax::Update`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum UnaryOp {
    /// `-`
    #[strum(serialize = "-")]
    Minus,
    /// `+`
    #[strum(serialize = "+")]
    Plus,
    /// `!`
    #[strum(serialize = "!")]
    Not,
    /// `~`
    #[strum(serialize = "~")]
    BitNot,
    /// `typeof`
    #[strum(serialize = "typeof")]
    TypeOf,
    /// `void`
    #[strum(serialize = "void")]
    Void,
    /// `delete`
    #[strum(serialize = "delete")]
    Delete,
}

/// Syntactic flavour of a [`Function`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum FunctionKind {
    /// `function name() {}` in statement position.
    Declaration,
    /// `function () {}` in expression position.
    Expression,
    /// `() => {}`
    Arrow,
    /// Object or class method, getter or setter.
    Method,
}

/// A function of any syntactic flavour.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    /// Declaration, expression, arrow or method.
    pub kind: FunctionKind,
    /// Binding identifier, if the function has one.
    pub name: Option<NodeId>,
    /// Parameter patterns in order (identifiers, patterns, defaults, rest).
    pub params: Vec<NodeId>,
    /// Function body: a block, or an expression for concise arrows.
    pub body: NodeId,
    /// `async` modifier.
    pub is_async: bool,
    /// `function*` / `*method`.
    pub is_generator: bool,
}

/// Syntactic forms that the analyses never look inside of specifically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum Syntax {
    /// `{ ... }` statement list, also function bodies.
    Block,
    /// `if` statement.
    If,
    /// C-style `for` loop.
    For,
    /// `for ... in` loop.
    ForIn,
    /// `for ... of` / `for await` loop.
    ForOf,
    /// `while` loop.
    While,
    /// `do ... while` loop.
    DoWhile,
    /// `break` with optional label.
    Break,
    /// `continue` with optional label.
    Continue,
    /// `throw` statement.
    Throw,
    /// `try` statement with handler and finaliser.
    Try,
    /// `switch` statement.
    Switch,
    /// `case` or `default` clause.
    SwitchCase,
    /// Labelled statement.
    Labeled,
    /// `debugger` statement.
    Debugger,
    /// `with` statement.
    With,
    /// Import declaration or dynamic `import` callee.
    Import,
    /// Export declaration.
    Export,
    /// `this`
    This,
    /// `super`
    Super,
    /// `null`
    Null,
    /// Regular expression literal.
    Regex,
    /// BigInt literal.
    BigInt,
    /// Template literal; children are the substitutions.
    Template,
    /// Tagged template: tag, then template.
    TaggedTemplate,
    /// Object literal or object pattern.
    Object,
    /// Object literal entry.
    Property,
    /// Class method, accessor or field.
    ClassMember,
    /// `static { ... }` class block.
    StaticBlock,
    /// `++` / `--` in prefix or postfix position.
    Update,
    /// Assignment with any assignment operator, also pattern defaults.
    Assign,
    /// `test ? a : b`
    Conditional,
    /// `new` expression: callee, then arguments.
    New,
    /// Comma expression.
    Sequence,
    /// `...expr` in arrays, calls, objects and rest patterns.
    Spread,
    /// `yield` / `yield*`
    Yield,
    /// `await` expression.
    Await,
    /// `new.target` / `import.meta`
    MetaProperty,
    /// `#name` in `#name in obj` tests.
    PrivateName,
}

/// A syntax tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Root of a parsed source file.
    Program {
        /// Top-level statements in order.
        body: Vec<NodeId>,
    },
    /// `var` / `let` / `const` declaration.
    VarDecl {
        /// Declaration keyword.
        kind: VarKind,
        /// [`Node::Declarator`] children.
        declarators: Vec<NodeId>,
    },
    /// One `target = init` entry of a declaration.
    Declarator {
        /// Binding pattern.
        target: NodeId,
        /// Initialiser expression.
        init: Option<NodeId>,
    },
    /// Function declaration, expression, arrow or method.
    Function(Function),
    /// Class declaration or expression.
    Class {
        /// Binding identifier.
        name: Option<NodeId>,
        /// `extends` expression.
        heritage: Option<NodeId>,
        /// Class body members.
        members: Vec<NodeId>,
        /// `true` in statement position.
        is_declaration: bool,
    },
    /// `catch (param) { body }` clause.
    Catch {
        /// Catch binding, absent for `catch {}`.
        param: Option<NodeId>,
        /// Handler block.
        body: NodeId,
    },
    /// Expression in statement position.
    ExprStmt {
        /// The expression.
        expr: NodeId,
    },
    /// `return` statement.
    Return {
        /// Returned expression.
        arg: Option<NodeId>,
    },
    /// Empty statement (`;`), also used as the replacement for removed statements.
    Empty,
    /// Identifier reference or binding.
    Ident(String),
    /// Property, label or specifier name that does not reference a binding.
    Name(String),
    /// String literal with its cooked value.
    Str(String),
    /// Numeric literal.
    Num(f64),
    /// `true` / `false`.
    Bool(bool),
    /// Array literal (also array destructuring patterns); `None` marks a hole.
    Array {
        /// Elements in order.
        elements: Vec<Option<NodeId>>,
    },
    /// `object.property` or `object[property]`.
    Member {
        /// Object expression.
        object: NodeId,
        /// Property: a [`Node::Name`] when not computed.
        property: NodeId,
        /// `[]` access.
        computed: bool,
        /// `?.` access.
        optional: bool,
    },
    /// `callee(args)`.
    Call {
        /// Callee expression.
        callee: NodeId,
        /// Arguments in order (spreads appear as [`Syntax::Spread`]).
        args: Vec<NodeId>,
        /// `?.()` call.
        optional: bool,
    },
    /// Prefix unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        arg: NodeId,
    },
    /// Binary or logical operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: NodeId,
        /// Right operand.
        right: NodeId,
    },
    /// Parenthesised expression.
    Paren {
        /// Inner expression.
        expr: NodeId,
    },
    /// Any other form, with children in source order.
    Other {
        /// Which form.
        kind: Syntax,
        /// Child nodes in source order.
        children: Vec<NodeId>,
    },
}

impl Node {
    /// Returns the direct children of this node in source order.
    #[must_use]
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Program { body } => body.clone(),
            Node::VarDecl { declarators, .. } => declarators.clone(),
            Node::Declarator { target, init } => {
                let mut out = vec![*target];
                out.extend(init.iter().copied());
                out
            }
            Node::Function(function) => {
                let mut out = Vec::with_capacity(function.params.len() + 2);
                out.extend(function.name.iter().copied());
                out.extend(function.params.iter().copied());
                out.push(function.body);
                out
            }
            Node::Class {
                name,
                heritage,
                members,
                ..
            } => {
                let mut out = Vec::with_capacity(members.len() + 2);
                out.extend(name.iter().copied());
                out.extend(heritage.iter().copied());
                out.extend(members.iter().copied());
                out
            }
            Node::Catch { param, body } => {
                let mut out = Vec::with_capacity(2);
                out.extend(param.iter().copied());
                out.push(*body);
                out
            }
            Node::ExprStmt { expr } | Node::Paren { expr } => vec![*expr],
            Node::Return { arg } => arg.iter().copied().collect(),
            Node::Array { elements } => elements.iter().flatten().copied().collect(),
            Node::Member {
                object, property, ..
            } => vec![*object, *property],
            Node::Call { callee, args, .. } => {
                let mut out = Vec::with_capacity(args.len() + 1);
                out.push(*callee);
                out.extend(args.iter().copied());
                out
            }
            Node::Unary { arg, .. } => vec![*arg],
            Node::Binary { left, right, .. } => vec![*left, *right],
            Node::Other { children, .. } => children.clone(),
            Node::Empty
            | Node::Ident(_)
            | Node::Name(_)
            | Node::Str(_)
            | Node::Num(_)
            | Node::Bool(_) => Vec::new(),
        }
    }

    /// Returns the identifier name if this is a [`Node::Ident`].
    #[must_use]
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Node::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the function payload if this is a [`Node::Function`].
    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Node::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Returns `true` for nodes that have no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Node::Empty | Node::Ident(_) | Node::Name(_) | Node::Str(_) | Node::Num(_) | Node::Bool(_)
        )
    }
}

/// One arena entry.
#[derive(Clone, Debug)]
pub(crate) struct Slot {
    pub(crate) node: Node,
    pub(crate) span: Span,
    pub(crate) parent: Option<NodeId>,
    pub(crate) replaced: bool,
}

/// A parsed source file: the original text plus the node arena.
///
/// Created by [`crate::js::parse`]. Owned by a single technique invocation.
#[derive(Clone, Debug)]
pub struct Program {
    source: String,
    slots: Vec<Slot>,
    root: NodeId,
}

impl Program {
    /// Assembles a program from lowered parser output and links parent pointers.
    pub(crate) fn from_parts(source: String, nodes: Vec<(Node, Span)>, root: NodeId) -> Self {
        let mut slots: Vec<Slot> = nodes
            .into_iter()
            .map(|(node, span)| Slot {
                node,
                span,
                parent: None,
                replaced: false,
            })
            .collect();

        for index in 0..slots.len() {
            for child in slots[index].node.children() {
                slots[child.index()].parent = Some(NodeId::new(index));
            }
        }

        Self {
            source,
            slots,
            root,
        }
    }

    /// The original source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The [`Node::Program`] root.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of arena slots (including unreachable ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the arena holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The top-level statements of the program.
    #[must_use]
    pub fn statements(&self) -> &[NodeId] {
        match &self.slots[self.root.index()].node {
            Node::Program { body } => body,
            _ => &[],
        }
    }

    /// Returns the node stored in a slot.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.slots[id.index()].node
    }

    /// Returns the source span of a node.
    #[must_use]
    pub fn span(&self, id: NodeId) -> Span {
        self.slots[id.index()].span
    }

    /// Returns the original source text of a node.
    #[must_use]
    pub fn text(&self, id: NodeId) -> &str {
        let span = self.span(id);
        &self.source[span.start..span.end]
    }

    /// Returns the parent of a node, `None` for the root.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.index()].parent
    }

    /// Iterates over the strict ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Returns `true` if `ancestor` is `id` or lies on its parent chain.
    #[must_use]
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|candidate| candidate == ancestor)
    }

    /// Returns the top-level statement that contains `id`.
    #[must_use]
    pub fn statement_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.parent(current)?;
            if parent == self.root {
                return Some(current);
            }
            current = parent;
        }
    }

    /// Replaces a node in place.
    ///
    /// The slot keeps its span and parent; its former children become unreachable.
    /// Only leaf nodes may be written, which keeps every reachable span consistent
    /// with the source text.
    ///
    /// # Arguments
    ///
    /// * `id` - The slot to overwrite.
    /// * `node` - The new leaf node.
    pub fn replace(&mut self, id: NodeId, node: Node) {
        debug_assert!(node.is_leaf(), "only leaf nodes can be written into a slot");
        let slot = &mut self.slots[id.index()];
        slot.node = node;
        slot.replaced = true;
    }

    /// Returns `true` if the node was written by [`Program::replace`].
    #[must_use]
    pub fn is_replaced(&self, id: NodeId) -> bool {
        self.slots[id.index()].replaced
    }

    /// Returns `true` if a strict ancestor of the node was replaced, which makes the
    /// node unreachable from the root.
    #[must_use]
    pub fn is_detached(&self, id: NodeId) -> bool {
        self.ancestors(id).any(|ancestor| self.is_replaced(ancestor))
    }

    /// Returns `true` if any slot was replaced.
    #[must_use]
    pub fn has_edits(&self) -> bool {
        self.slots.iter().any(|slot| slot.replaced)
    }

    /// Collects the subtree rooted at `start` in pre-order (parents before children).
    ///
    /// Children of replaced nodes are not visited.
    #[must_use]
    pub fn pre_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            out.push(id);
            if self.is_replaced(id) {
                continue;
            }
            let children = self.node(id).children();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Collects the subtree rooted at `start` in post-order (children before parents).
    ///
    /// Children of replaced nodes are not visited.
    #[must_use]
    pub fn post_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(start, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded || self.is_replaced(id) {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            let children = self.node(id).children();
            stack.extend(children.into_iter().rev().map(|child| (child, false)));
        }
        out
    }

    /// Iterates over identifier references in a subtree.
    ///
    /// Property names, labels and specifier names are [`Node::Name`] nodes and are
    /// therefore never reported.
    pub fn idents(&self, start: NodeId) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.pre_order(start)
            .into_iter()
            .filter_map(move |id| self.node(id).as_ident().map(|name| (id, name)))
    }

    /// Returns `true` if the subtree references any identifier in `names`.
    #[must_use]
    pub fn mentions<S: AsRef<str>>(&self, start: NodeId, names: &[S]) -> bool {
        self.idents(start)
            .any(|(_, name)| names.iter().any(|candidate| candidate.as_ref() == name))
    }
}
