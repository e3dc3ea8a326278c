//! Tree-walking executor.
//!
//! Every node carries a handler bound from its action at construction, so
//! dispatch is one indirection. Structural nodes (action `Nop`) branch on
//! kind inside the `Nop` handler: blocks, the pre-classified `If` and `For`
//! shapes, declarations. Values computed mid-evaluation travel through
//! `Flow`, never through node cells, so recursive calls cannot clobber an
//! outer evaluation of the same subtree.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use crate::ast::{Action, Kind, NodeId, Nodes};
use crate::sym::{PkgId, SymRef, SymbolTable, MAIN_PKG};
use crate::value::Value;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecError {
    #[error("undefined: {name}")]
    Undefined { name: String },
    #[error("cannot call non-function {name} (type {type_name})")]
    NotCallable { name: String, type_name: String },
    #[error("wrong number of arguments in call to {name}: have {found}, want {expected}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("assignment mismatch: {targets} variables but {values} values")]
    AssignMismatch { targets: usize, values: usize },
    #[error("invalid operation: operator {op} not defined on {type_name}")]
    InvalidOperation { op: &'static str, type_name: String },
    #[error("index out of range [{index}] with length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("non-bool value used as condition")]
    NonBoolCondition,
    #[error("cannot range over {type_name}")]
    NotRangeable { type_name: String },
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("return outside of function")]
    ReturnOutsideFunction,
    #[error("break or continue outside of loop")]
    MisplacedBranch,
}

/// Control-flow marker produced by every handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal(Value),
    Break,
    Continue,
    Return(Value),
}

/// Handler signature; one per action, bound at node construction.
pub type Builtin = fn(&mut Machine<'_>, NodeId) -> Result<Flow, ExecError>;

pub fn builtin(action: Action) -> Builtin {
    match action {
        Action::Nop => nop,
        Action::ArrayLit => array_lit,
        Action::Assign => assign,
        Action::AssignX => assign_x,
        Action::Add => add,
        Action::And => and,
        Action::Call => call,
        Action::Dec => dec,
        Action::Equal => equal,
        Action::Greater => greater,
        Action::GetIndex => get_index,
        Action::Inc => inc,
        Action::Lower => lower,
        Action::Println => println_line,
        Action::Range => range_over,
        Action::Return => return_values,
        Action::Sub => sub,
    }
}

struct Frame {
    vars: HashMap<String, Value>,
    pkg: PkgId,
}

/// Execution state for one submission: the shared arena, the committed
/// symbol table, session globals and the call stack.
pub struct Machine<'a> {
    nodes: &'a mut Nodes,
    table: &'a SymbolTable,
    globals: &'a mut HashMap<String, Value>,
    frames: Vec<Frame>,
    out: &'a mut Vec<String>,
}

impl<'a> Machine<'a> {
    pub fn new(
        nodes: &'a mut Nodes,
        table: &'a SymbolTable,
        globals: &'a mut HashMap<String, Value>,
        out: &'a mut Vec<String>,
    ) -> Self {
        Self {
            nodes,
            table,
            globals,
            frames: Vec::new(),
            out,
        }
    }

    /// Executes the statements of a lowered file, returning the value of the
    /// last expression statement, if any. Declarations are skipped: they took
    /// effect when the unit's definitions were committed.
    pub fn run_file(&mut self, root: NodeId) -> Result<Option<Value>, ExecError> {
        let children = self.nodes[root].child.clone();
        let mut last = None;
        for child in children {
            let kind = self.nodes[child].kind;
            if kind == Kind::FuncDecl {
                continue;
            }
            match self.exec(child)? {
                Flow::Normal(value) => {
                    if kind == Kind::ExprStmt {
                        last = Some(value);
                    }
                }
                Flow::Return(_) => return Err(ExecError::ReturnOutsideFunction),
                Flow::Break | Flow::Continue => return Err(ExecError::MisplacedBranch),
            }
        }
        Ok(last)
    }

    fn exec(&mut self, node: NodeId) -> Result<Flow, ExecError> {
        let run = self.nodes[node].run;
        run(self, node)
    }

    fn eval(&mut self, node: NodeId) -> Result<Value, ExecError> {
        match self.exec(node)? {
            Flow::Normal(value) => Ok(value),
            // Expressions never branch; anything else is an empty result.
            _ => Ok(Value::Nil),
        }
    }

    fn eval_args(&mut self, nodes: &[NodeId]) -> Result<Vec<Value>, ExecError> {
        let mut values = Vec::with_capacity(nodes.len());
        for &node in nodes {
            values.push(self.eval(node)?);
        }
        Ok(values)
    }

    fn current_pkg(&self) -> PkgId {
        self.frames.last().map(|frame| frame.pkg).unwrap_or(MAIN_PKG)
    }

    fn load(&self, name: &str) -> Option<Value> {
        if let Some(frame) = self.frames.last() {
            if let Some(value) = frame.vars.get(name) {
                return Some(value.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    fn store(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.vars.insert(name.to_string(), value);
        } else {
            self.globals.insert(name.to_string(), value);
        }
    }

    /// Invokes a function declaration: binds arguments to parameter names in
    /// a fresh frame tagged with the declaring package, runs the body, and
    /// unwraps the `Return`.
    pub fn call_function(
        &mut self,
        node: NodeId,
        pkg: PkgId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, ExecError> {
        let mut params = Vec::new();
        let mut body = None;
        for child in self.nodes[node].child.clone() {
            match self.nodes[child].kind {
                Kind::FuncType => self.collect_params(child, &mut params),
                Kind::BlockStmt => body = Some(child),
                _ => {}
            }
        }
        let body = body.ok_or_else(|| ExecError::NotCallable {
            name: name.to_string(),
            type_name: "declaration".to_string(),
        })?;

        if args.len() != params.len() {
            return Err(ExecError::ArityMismatch {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
            });
        }

        let vars = params.into_iter().zip(args).collect();
        self.frames.push(Frame { vars, pkg });
        let flow = self.exec(body);
        self.frames.pop();

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal(_) => Ok(Value::Nil),
            Flow::Break | Flow::Continue => Err(ExecError::MisplacedBranch),
        }
    }

    fn collect_params(&self, func_type: NodeId, params: &mut Vec<String>) {
        // First field list under FuncType holds the parameters; a field's
        // last child is its type, everything before it a name.
        let Some(&list) = self.nodes[func_type].child.first() else {
            return;
        };
        for &field in &self.nodes[list].child {
            let children = &self.nodes[field].child;
            if children.len() < 2 {
                continue;
            }
            for &name_node in &children[..children.len() - 1] {
                if let Some(name) = self.nodes[name_node].ident.clone() {
                    params.push(name);
                }
            }
        }
    }

    fn assign_to(&mut self, target: NodeId, value: Value) -> Result<(), ExecError> {
        match self.nodes[target].kind {
            Kind::Ident => {
                let name = self.nodes[target].ident.clone().unwrap_or_default();
                self.store(&name, value);
                Ok(())
            }
            Kind::IndexExpr => {
                let arr_node = self.nodes[target].child[0];
                let index_node = self.nodes[target].child[1];
                let arr = self.eval(arr_node)?;
                let index = self.eval(index_node)?;
                let Value::Arr(cells) = arr else {
                    return Err(ExecError::InvalidOperation {
                        op: "index",
                        type_name: arr.type_name().to_string(),
                    });
                };
                let Some(i) = index.as_int() else {
                    return Err(ExecError::InvalidOperation {
                        op: "index",
                        type_name: index.type_name().to_string(),
                    });
                };
                let len = cells.borrow().len();
                if i < 0 || i as usize >= len {
                    return Err(ExecError::IndexOutOfRange { index: i, len });
                }
                cells.borrow_mut()[i as usize] = value;
                Ok(())
            }
            _ => Err(ExecError::InvalidOperation {
                op: "assign",
                type_name: "expression".to_string(),
            }),
        }
    }

    fn ident_name(&self, node: NodeId) -> Result<String, ExecError> {
        match (self.nodes[node].kind, &self.nodes[node].ident) {
            (Kind::Ident, Some(name)) => Ok(name.clone()),
            _ => Err(ExecError::InvalidOperation {
                op: "assign",
                type_name: "expression".to_string(),
            }),
        }
    }

    fn condition(&mut self, node: NodeId) -> Result<bool, ExecError> {
        let value = self.eval(node)?;
        value.as_bool().ok_or(ExecError::NonBoolCondition)
    }
}

fn finish(m: &mut Machine<'_>, node: NodeId, value: Value) -> Result<Flow, ExecError> {
    m.nodes[node].val = Some(value.clone());
    Ok(Flow::Normal(value))
}

fn nop(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let kind = m.nodes[node].kind;
    match kind {
        Kind::File | Kind::BlockStmt => {
            for child in m.nodes[node].child.clone() {
                match m.exec(child)? {
                    Flow::Normal(_) => {}
                    flow => return Ok(flow),
                }
            }
            Ok(Flow::Normal(Value::Nil))
        }
        Kind::ExprStmt | Kind::ParenExpr => {
            let child = m.nodes[node].child[0];
            m.exec(child)
        }
        Kind::Ident => eval_ident(m, node),
        Kind::BasicLit => {
            let value = m.nodes[node].val.clone().unwrap_or(Value::Nil);
            Ok(Flow::Normal(value))
        }
        Kind::If0 | Kind::If1 | Kind::If2 | Kind::If3 => if_stmt(m, node, kind),
        Kind::For0 | Kind::For1 | Kind::For2 | Kind::For3 | Kind::For4 => for_stmt(m, node, kind),
        Kind::ForRangeStmt => {
            let head = m.nodes[node].child[0];
            m.exec(head)
        }
        Kind::Break => Ok(Flow::Break),
        Kind::Continue => Ok(Flow::Continue),
        Kind::Goto
        | Kind::Fallthrough
        | Kind::Undef
        | Kind::FuncDecl
        | Kind::FuncType
        | Kind::Field
        | Kind::FieldList
        | Kind::ArrayType => Ok(Flow::Normal(Value::Nil)),
        other => {
            warn!(kind = %other, "no evaluation rule for kind");
            Ok(Flow::Normal(Value::Nil))
        }
    }
}

fn eval_ident(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let name = m.nodes[node].ident.clone().unwrap_or_default();
    if let Some(value) = m.load(&name) {
        return Ok(Flow::Normal(value));
    }
    match name.as_str() {
        "true" => return Ok(Flow::Normal(Value::Bool(true))),
        "false" => return Ok(Flow::Normal(Value::Bool(false))),
        _ => {}
    }
    match m.table.resolve(m.current_pkg(), &name) {
        Some(SymRef::Func { node: decl, pkg }) => Ok(Flow::Normal(Value::Func { node: decl, pkg })),
        _ => Err(ExecError::Undefined { name }),
    }
}

fn if_stmt(m: &mut Machine<'_>, node: NodeId, kind: Kind) -> Result<Flow, ExecError> {
    let children = m.nodes[node].child.clone();
    let (init, cond, then, els) = match kind {
        Kind::If0 => (None, children[0], children[1], None),
        Kind::If1 => (None, children[0], children[1], Some(children[2])),
        Kind::If2 => (Some(children[0]), children[1], children[2], None),
        _ => (Some(children[0]), children[1], children[2], Some(children[3])),
    };
    if let Some(init) = init {
        match m.exec(init)? {
            Flow::Normal(_) => {}
            flow => return Ok(flow),
        }
    }
    if m.condition(cond)? {
        m.exec(then)
    } else if let Some(els) = els {
        m.exec(els)
    } else {
        Ok(Flow::Normal(Value::Nil))
    }
}

fn for_stmt(m: &mut Machine<'_>, node: NodeId, kind: Kind) -> Result<Flow, ExecError> {
    let children = m.nodes[node].child.clone();
    let Some(&body) = children.last() else {
        return Ok(Flow::Normal(Value::Nil));
    };
    let (init, cond, post) = match kind {
        // Condition-less loops run any leading clauses once, then spin.
        Kind::For0 => (children.get(..children.len() - 1), None, None),
        Kind::For1 => (None, Some(children[0]), None),
        Kind::For2 => (children.get(..1), Some(children[1]), None),
        Kind::For3 => (None, Some(children[0]), Some(children[1])),
        _ => (children.get(..1), Some(children[1]), Some(children[2])),
    };

    if let Some(init) = init {
        for &clause in init {
            match m.exec(clause)? {
                Flow::Normal(_) => {}
                flow => return Ok(flow),
            }
        }
    }
    loop {
        if let Some(cond) = cond {
            if !m.condition(cond)? {
                break;
            }
        }
        match m.exec(body)? {
            Flow::Break => break,
            Flow::Continue | Flow::Normal(_) => {}
            flow @ Flow::Return(_) => return Ok(flow),
        }
        if let Some(post) = post {
            match m.exec(post)? {
                Flow::Normal(_) => {}
                flow => return Ok(flow),
            }
        }
    }
    Ok(Flow::Normal(Value::Nil))
}

fn assign(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let children = m.nodes[node].child.clone();
    let half = children.len() / 2;
    // All right-hand values are computed before the first store.
    let mut values = Vec::with_capacity(half);
    for &rhs in &children[half..] {
        values.push(m.eval(rhs)?);
    }
    for (&lhs, value) in children[..half].iter().zip(values) {
        m.assign_to(lhs, value)?;
    }
    Ok(Flow::Normal(Value::Nil))
}

fn assign_x(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let children = m.nodes[node].child.clone();
    let targets = children.len() - 1;
    let value = m.eval(children[targets])?;
    let values = match value {
        Value::Tuple(values) => values,
        other => vec![other],
    };
    if values.len() != targets {
        return Err(ExecError::AssignMismatch {
            targets,
            values: values.len(),
        });
    }
    for (&lhs, value) in children[..targets].iter().zip(values) {
        m.assign_to(lhs, value)?;
    }
    Ok(Flow::Normal(Value::Nil))
}

fn binary_operands(m: &mut Machine<'_>, node: NodeId) -> Result<(Value, Value), ExecError> {
    let children = m.nodes[node].child.clone();
    let left = m.eval(children[0])?;
    let right = m.eval(children[1])?;
    Ok((left, right))
}

fn mixed(op: &'static str, left: &Value, right: &Value) -> ExecError {
    ExecError::InvalidOperation {
        op,
        type_name: format!("{} and {}", left.type_name(), right.type_name()),
    }
}

fn add(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let (left, right) = binary_operands(m, node)?;
    let value = match (&left, &right) {
        (Value::Int(l), Value::Int(r)) => Value::Int(l.wrapping_add(*r)),
        (Value::Str(l), Value::Str(r)) => Value::Str(format!("{l}{r}")),
        _ => return Err(mixed("+", &left, &right)),
    };
    finish(m, node, value)
}

fn sub(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let (left, right) = binary_operands(m, node)?;
    let value = match (&left, &right) {
        (Value::Int(l), Value::Int(r)) => Value::Int(l.wrapping_sub(*r)),
        _ => return Err(mixed("-", &left, &right)),
    };
    finish(m, node, value)
}

fn and(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let (left, right) = binary_operands(m, node)?;
    let value = match (&left, &right) {
        (Value::Int(l), Value::Int(r)) => Value::Int(l & r),
        _ => return Err(mixed("&", &left, &right)),
    };
    finish(m, node, value)
}

fn equal(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let (left, right) = binary_operands(m, node)?;
    let value = match (&left, &right) {
        (Value::Int(l), Value::Int(r)) => Value::Bool(l == r),
        (Value::Str(l), Value::Str(r)) => Value::Bool(l == r),
        (Value::Bool(l), Value::Bool(r)) => Value::Bool(l == r),
        _ => return Err(mixed("==", &left, &right)),
    };
    finish(m, node, value)
}

fn greater(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let (left, right) = binary_operands(m, node)?;
    let value = match (&left, &right) {
        (Value::Int(l), Value::Int(r)) => Value::Bool(l > r),
        _ => return Err(mixed(">", &left, &right)),
    };
    finish(m, node, value)
}

fn lower(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let (left, right) = binary_operands(m, node)?;
    let value = match (&left, &right) {
        (Value::Int(l), Value::Int(r)) => Value::Bool(l < r),
        _ => return Err(mixed("<", &left, &right)),
    };
    finish(m, node, value)
}

fn step(m: &mut Machine<'_>, node: NodeId, delta: i64) -> Result<Flow, ExecError> {
    let target = m.nodes[node].child[0];
    let name = m.ident_name(target)?;
    let current = m
        .load(&name)
        .ok_or_else(|| ExecError::Undefined { name: name.clone() })?;
    let Some(value) = current.as_int() else {
        return Err(ExecError::InvalidOperation {
            op: if delta > 0 { "++" } else { "--" },
            type_name: current.type_name().to_string(),
        });
    };
    m.store(&name, Value::Int(value.wrapping_add(delta)));
    Ok(Flow::Normal(Value::Nil))
}

fn inc(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    step(m, node, 1)
}

fn dec(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    step(m, node, -1)
}

fn get_index(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let children = m.nodes[node].child.clone();
    let target = m.eval(children[0])?;
    let index = m.eval(children[1])?;
    let Value::Arr(cells) = &target else {
        return Err(ExecError::InvalidOperation {
            op: "index",
            type_name: target.type_name().to_string(),
        });
    };
    let Some(i) = index.as_int() else {
        return Err(ExecError::InvalidOperation {
            op: "index",
            type_name: index.type_name().to_string(),
        });
    };
    let len = cells.borrow().len();
    if i < 0 || i as usize >= len {
        return Err(ExecError::IndexOutOfRange { index: i, len });
    }
    let value = cells.borrow()[i as usize].clone();
    finish(m, node, value)
}

fn array_lit(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    // First child is the literal's type.
    let children = m.nodes[node].child.clone();
    let mut values = Vec::with_capacity(children.len().saturating_sub(1));
    for &elem in &children[1..] {
        values.push(m.eval(elem)?);
    }
    finish(m, node, Value::arr(values))
}

fn call(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let children = m.nodes[node].child.clone();
    let callee = children[0];
    let name = match (m.nodes[callee].kind, m.nodes[callee].ident.clone()) {
        (Kind::Ident, Some(name)) => name,
        _ => {
            return Err(ExecError::NotCallable {
                name: "expression".to_string(),
                type_name: "expression".to_string(),
            });
        }
    };

    // A local binding holding a function handle shadows declarations.
    if let Some(bound) = m.load(&name) {
        return match bound {
            Value::Func { node: decl, pkg } => {
                let args = m.eval_args(&children[1..])?;
                let result = m.call_function(decl, pkg, &name, args)?;
                finish(m, node, result)
            }
            other => Err(ExecError::NotCallable {
                name,
                type_name: other.type_name().to_string(),
            }),
        };
    }

    match m.table.resolve(m.current_pkg(), &name) {
        Some(SymRef::Func { node: decl, pkg }) => {
            let args = m.eval_args(&children[1..])?;
            let result = m.call_function(decl, pkg, &name, args)?;
            finish(m, node, result)
        }
        Some(SymRef::Native(native)) => {
            let args = m.eval_args(&children[1..])?;
            let result = native(&args)?;
            finish(m, node, result)
        }
        None => Err(ExecError::Undefined { name }),
    }
}

fn return_values(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let children = m.nodes[node].child.clone();
    let value = match children.len() {
        0 => Value::Nil,
        1 => m.eval(children[0])?,
        _ => Value::Tuple(m.eval_args(&children)?),
    };
    Ok(Flow::Return(value))
}

fn range_over(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let children = m.nodes[node].child.clone();
    let Some(&body) = children.last() else {
        return Ok(Flow::Normal(Value::Nil));
    };
    let key = children[0];
    let (value_node, iterable_node) = if children.len() == 4 {
        (Some(children[1]), children[2])
    } else {
        (None, children[1])
    };

    let iterable = m.eval(iterable_node)?;
    let Value::Arr(cells) = &iterable else {
        return Err(ExecError::NotRangeable {
            type_name: iterable.type_name().to_string(),
        });
    };
    let key_name = m.ident_name(key)?;
    let value_name = match value_node {
        Some(node) => Some(m.ident_name(node)?),
        None => None,
    };

    // The iterable is evaluated once; the cursor runs over its length.
    let len = cells.borrow().len();
    for i in 0..len {
        m.store(&key_name, Value::Int(i as i64));
        if let Some(value_name) = &value_name {
            let element = cells.borrow()[i].clone();
            m.store(value_name, element);
        }
        match m.exec(body)? {
            Flow::Break => break,
            Flow::Continue | Flow::Normal(_) => {}
            flow @ Flow::Return(_) => return Ok(flow),
        }
    }
    Ok(Flow::Normal(Value::Nil))
}

fn println_line(m: &mut Machine<'_>, node: NodeId) -> Result<Flow, ExecError> {
    let children = m.nodes[node].child.clone();
    let args = m.eval_args(&children[1..])?;
    let line = args
        .iter()
        .map(Value::to_output)
        .collect::<Vec<_>>()
        .join(" ");
    m.out.push(line);
    Ok(Flow::Normal(Value::Nil))
}
