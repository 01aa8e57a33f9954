//! 字节码编译器
//!
//! 两遍：先为所有模块函数分配函数表下标（允许前向引用），再逐个编译函数体。
//! 名称解析在编译期完成，未定义的名称是编译错误而不是运行时错误。

use super::bytecode::{Chunk, ChunkError, Function, OpCode};
use super::stdlib::{ModuleRegistry, NativeModule};
use super::value::Value;
use crate::compiler::lexer::Coordinate;
use crate::compiler::parser::{
    BinaryOp, Expr, ExprKind, FunctionDecl, LogicalOp, Program, Stmt, StmtKind, UnaryOp,
};
use modkit_config::CompilerConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 单个函数的局部变量上限（槽位操作数为 u8）
pub const MAX_LOCALS: usize = 256;
/// 单元可导入的模块上限
pub const MAX_IMPORTS: usize = 256;

/// 顶层语句编译出的脚本函数名
pub const SCRIPT_NAME: &str = "<script>";

/// 编译选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub emit_warnings: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            emit_warnings: true,
        }
    }
}

impl From<&CompilerConfig> for CompileOptions {
    fn from(config: &CompilerConfig) -> Self {
        CompileOptions {
            emit_warnings: config.emit_warnings,
        }
    }
}

/// 编译错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {coordinate}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("unknown module '{0}'")]
    UnknownModule(String),

    #[error("module '{module}' has no member '{member}'")]
    UnknownMember { module: String, member: String },

    #[error("module '{0}' is declared more than once")]
    DuplicateModule(String),

    #[error("function '{0}' is declared more than once")]
    DuplicateFunction(String),

    #[error("variable '{0}' is already declared in this scope")]
    DuplicateVariable(String),

    #[error("cannot assign to '{0}'")]
    NotAssignable(String),

    #[error("'{0}' outside of a loop")]
    OutsideLoop(&'static str),

    #[error("too many {what} (limit {limit})")]
    TooMany { what: &'static str, limit: usize },

    #[error("{0}")]
    Chunk(#[from] ChunkError),
}

/// 编译警告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileWarning {
    pub message: String,
    pub coordinate: Coordinate,
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.coordinate)
    }
}

/// 用户模块：函数名 -> 函数表下标
#[derive(Debug, Clone)]
pub struct UnitModule {
    pub name: String,
    pub functions: BTreeMap<String, usize>,
}

/// 编译产物：函数表 + 导入表
#[derive(Debug, Clone)]
pub struct Unit {
    pub functions: Vec<Arc<Function>>,
    pub modules: Vec<UnitModule>,
    pub imports: Vec<Arc<NativeModule>>,
    pub script: Option<Arc<Function>>,
}

impl Unit {
    /// 按 (模块, 函数) 查找
    pub fn function(&self, module: &str, name: &str) -> Option<Arc<Function>> {
        let module = self.modules.iter().find(|m| m.name == module)?;
        let index = *module.functions.get(name)?;
        self.functions.get(index).cloned()
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn import_names(&self) -> Vec<&str> {
        self.imports.iter().map(|m| m.name()).collect()
    }

    /// 整个单元的反汇编
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for function in self.functions.iter().chain(self.script.iter()) {
            out.push_str(&function.chunk.disassemble(&function.name));
        }
        out
    }
}

/// 编译成功
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub unit: Unit,
    pub warnings: Vec<CompileWarning>,
}

/// 编译失败：所有错误与已产生的警告
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_errors(.errors))]
pub struct CompileFailure {
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CompileWarning>,
}

fn join_errors(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 编译整个程序
pub fn compile_program(
    program: &Program,
    registry: &ModuleRegistry,
    options: &CompileOptions,
) -> Result<CompileOutput, CompileFailure> {
    let mut state = UnitState::default();
    state.collect_imports(program, registry);
    state.collect_modules(program);

    let mut functions: Vec<Option<Arc<Function>>> = vec![None; state.function_count];
    for (module_index, module) in program.modules.iter().enumerate() {
        for decl in &module.functions {
            let Some(&index) = state.modules[module_index].functions.get(&decl.name) else {
                continue;
            };
            if functions[index].is_some() {
                continue;
            }
            let name = format!("{}.{}", module.name, decl.name);
            functions[index] = Some(Arc::new(state.compile_function(decl, name, Some(module_index))));
        }
    }

    let script = if program.statements.is_empty() {
        None
    } else {
        let decl = FunctionDecl {
            name: SCRIPT_NAME.to_string(),
            params: Vec::new(),
            body: program.statements.clone(),
            coordinate: program.statements[0].coordinate,
        };
        Some(Arc::new(state.compile_function(&decl, SCRIPT_NAME.to_string(), None)))
    };

    let warnings = if options.emit_warnings {
        state.warnings
    } else {
        Vec::new()
    };
    if !state.errors.is_empty() {
        tracing::debug!(target: "modkit::compiler", errors = state.errors.len(), "compilation failed");
        return Err(CompileFailure {
            errors: state.errors,
            warnings,
        });
    }

    let unit = Unit {
        functions: functions.into_iter().flatten().collect(),
        modules: state.modules,
        imports: state.imports,
        script,
    };
    tracing::debug!(
        target: "modkit::compiler",
        functions = unit.functions.len(),
        imports = unit.imports.len(),
        warnings = warnings.len(),
        "compiled unit"
    );
    tracing::trace!(target: "modkit::compiler", "\n{}", unit.disassemble());
    Ok(CompileOutput { unit, warnings })
}

/// 单元级状态
#[derive(Default)]
struct UnitState {
    imports: Vec<Arc<NativeModule>>,
    modules: Vec<UnitModule>,
    function_count: usize,
    errors: Vec<CompileError>,
    warnings: Vec<CompileWarning>,
}

impl UnitState {
    fn collect_imports(&mut self, program: &Program, registry: &ModuleRegistry) {
        for import in &program.imports {
            if self.imports.iter().any(|m| m.name() == import.name) {
                self.warn(format!("module '{}' is imported more than once", import.name), import.coordinate);
                continue;
            }
            match registry.get(&import.name) {
                Some(_) if self.imports.len() >= MAX_IMPORTS => self.error(
                    CompileErrorKind::TooMany {
                        what: "imports",
                        limit: MAX_IMPORTS,
                    },
                    import.coordinate,
                ),
                Some(module) => self.imports.push(Arc::clone(module)),
                None => self.error(CompileErrorKind::UnknownModule(import.name.clone()), import.coordinate),
            }
        }
    }

    fn collect_modules(&mut self, program: &Program) {
        for module in &program.modules {
            if self.modules.iter().any(|m| m.name == module.name) {
                self.error(CompileErrorKind::DuplicateModule(module.name.clone()), module.coordinate);
            }
            let mut functions = BTreeMap::new();
            for decl in &module.functions {
                if functions.contains_key(&decl.name) {
                    self.error(CompileErrorKind::DuplicateFunction(decl.name.clone()), decl.coordinate);
                    continue;
                }
                functions.insert(decl.name.clone(), self.function_count);
                self.function_count += 1;
            }
            self.modules.push(UnitModule {
                name: module.name.clone(),
                functions,
            });
        }
    }

    fn compile_function(&mut self, decl: &FunctionDecl, name: String, module: Option<usize>) -> Function {
        let mut compiler = FunctionCompiler::new(self, module);
        compiler.begin_scope();
        for param in &decl.params {
            compiler.declare(param, decl.coordinate, true);
        }
        compiler.statements(&decl.body);
        compiler.end_scope();

        let line = decl.body.last().map(|s| s.coordinate.line).unwrap_or(decl.coordinate.line);
        compiler.chunk.write_op(OpCode::LoadNull, line);
        compiler.chunk.write_op(OpCode::Return, line);

        Function {
            name,
            arity: decl.params.len(),
            local_count: compiler.slot_count,
            chunk: compiler.chunk,
        }
    }

    fn error(&mut self, kind: CompileErrorKind, coordinate: Coordinate) {
        self.errors.push(CompileError { kind, coordinate });
    }

    fn warn(&mut self, message: String, coordinate: Coordinate) {
        self.warnings.push(CompileWarning { message, coordinate });
    }
}

struct Local {
    name: String,
    slot: u8,
    used: bool,
    is_param: bool,
    coordinate: Coordinate,
}

struct LoopContext {
    start: usize,
    breaks: Vec<usize>,
}

/// 名称解析结果
enum Resolved {
    Local(u8),
    Function(usize),
    Module(u8),
    Prelude(u8),
}

/// 单个函数的编译器
struct FunctionCompiler<'a> {
    unit: &'a mut UnitState,
    module: Option<usize>,
    chunk: Chunk,
    scopes: Vec<Vec<Local>>,
    slot_count: usize,
    loops: Vec<LoopContext>,
}

impl<'a> FunctionCompiler<'a> {
    fn new(unit: &'a mut UnitState, module: Option<usize>) -> Self {
        FunctionCompiler {
            unit,
            module,
            chunk: Chunk::new(),
            scopes: Vec::new(),
            slot_count: 0,
            loops: Vec::new(),
        }
    }

    // ===== 作用域 =====

    fn begin_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn end_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        for local in scope {
            if !local.used && !local.is_param && !local.name.starts_with('_') {
                self.unit.warn(
                    format!("variable '{}' is never read", local.name),
                    local.coordinate,
                );
            }
        }
    }

    fn declare(&mut self, name: &str, coordinate: Coordinate, is_param: bool) -> Option<u8> {
        let duplicate = self
            .scopes
            .last()
            .map(|scope| scope.iter().any(|l| l.name == name))
            .unwrap_or(false);
        if duplicate {
            self.unit
                .error(CompileErrorKind::DuplicateVariable(name.to_string()), coordinate);
            return None;
        }
        if self.slot_count >= MAX_LOCALS {
            self.unit.error(
                CompileErrorKind::TooMany {
                    what: "local variables",
                    limit: MAX_LOCALS,
                },
                coordinate,
            );
            return None;
        }
        let slot = self.slot_count as u8;
        self.slot_count += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Local {
                name: name.to_string(),
                slot,
                used: false,
                is_param,
                coordinate,
            });
        }
        Some(slot)
    }

    fn find_local(&mut self, name: &str) -> Option<&mut Local> {
        self.scopes
            .iter_mut()
            .rev()
            .flat_map(|scope| scope.iter_mut().rev())
            .find(|local| local.name == name)
    }

    fn resolve(&mut self, name: &str, coordinate: Coordinate) -> Option<Resolved> {
        if let Some(local) = self.find_local(name) {
            local.used = true;
            return Some(Resolved::Local(local.slot));
        }
        if let Some(index) = self
            .module
            .and_then(|m| self.unit.modules[m].functions.get(name).copied())
        {
            return Some(Resolved::Function(index));
        }
        if let Some(index) = self.import_index(name) {
            return Some(Resolved::Module(index));
        }
        if let Some(std) = self.import_index("std") {
            if self.unit.imports[std as usize].contains(name) {
                return Some(Resolved::Prelude(std));
            }
        }
        self.unit
            .error(CompileErrorKind::UndefinedVariable(name.to_string()), coordinate);
        None
    }

    fn import_index(&self, name: &str) -> Option<u8> {
        self.unit
            .imports
            .iter()
            .position(|m| m.name() == name)
            .map(|i| i as u8)
    }

    fn user_module(&self, name: &str) -> Option<usize> {
        self.unit.modules.iter().position(|m| m.name == name)
    }

    // ===== 语句 =====

    fn statements(&mut self, statements: &[Stmt]) {
        let mut diverged = false;
        let mut reported = false;
        for stmt in statements {
            if diverged && !reported {
                self.unit.warn("unreachable code".to_string(), stmt.coordinate);
                reported = true;
            }
            self.statement(stmt);
            diverged |= stmt.diverges();
        }
    }

    fn block(&mut self, statements: &[Stmt]) {
        self.begin_scope();
        self.statements(statements);
        self.end_scope();
    }

    fn statement(&mut self, stmt: &Stmt) {
        let line = stmt.coordinate.line;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.expression(expr);
                self.chunk.write_op(OpCode::Pop, line);
            }
            StmtKind::Var { name, initializer } => {
                match initializer {
                    Some(expr) => self.expression(expr),
                    None => self.chunk.write_op(OpCode::LoadNull, line),
                }
                match self.declare(name, stmt.coordinate, false) {
                    Some(slot) => self.chunk.write_op_u8(OpCode::StoreLocal, slot, line),
                    None => self.chunk.write_op(OpCode::Pop, line),
                }
            }
            StmtKind::Assign { name, value } => {
                self.expression(value);
                match self.assignable(name, stmt.coordinate) {
                    Some(slot) => self.chunk.write_op_u8(OpCode::StoreLocal, slot, line),
                    None => self.chunk.write_op(OpCode::Pop, line),
                }
            }
            StmtKind::IndexAssign { name, index, value } => {
                let Some(slot) = self.assignable(name, stmt.coordinate) else {
                    return;
                };
                self.chunk.write_op_u8(OpCode::LoadLocal, slot, line);
                self.expression(index);
                self.expression(value);
                self.chunk.write_op(OpCode::IndexSet, line);
                self.chunk.write_op_u8(OpCode::StoreLocal, slot, line);
            }
            StmtKind::Block(body) | StmtKind::Unsafe(body) => self.block(body),
            StmtKind::If {
                branches,
                else_branch,
            } => self.if_statement(branches, else_branch.as_deref(), line),
            StmtKind::While { condition, body } => self.while_statement(condition, body, line),
            StmtKind::Break => {
                if self.loops.is_empty() {
                    self.unit
                        .error(CompileErrorKind::OutsideLoop("break"), stmt.coordinate);
                } else {
                    let jump = self.chunk.write_jump(OpCode::Jump, line);
                    if let Some(ctx) = self.loops.last_mut() {
                        ctx.breaks.push(jump);
                    }
                }
            }
            StmtKind::Continue => match self.loops.last().map(|ctx| ctx.start) {
                Some(start) => self.emit_loop(start, stmt.coordinate),
                None => self
                    .unit
                    .error(CompileErrorKind::OutsideLoop("continue"), stmt.coordinate),
            },
            StmtKind::Return(value) => {
                match value {
                    Some(expr) => self.expression(expr),
                    None => self.chunk.write_op(OpCode::LoadNull, line),
                }
                self.chunk.write_op(OpCode::Return, line);
            }
        }
    }

    /// 赋值目标必须是局部变量
    fn assignable(&mut self, name: &str, coordinate: Coordinate) -> Option<u8> {
        if let Some(local) = self.find_local(name) {
            return Some(local.slot);
        }
        let known = self
            .module
            .map(|m| self.unit.modules[m].functions.contains_key(name))
            .unwrap_or(false)
            || self.import_index(name).is_some();
        let kind = if known {
            CompileErrorKind::NotAssignable(name.to_string())
        } else {
            CompileErrorKind::UndefinedVariable(name.to_string())
        };
        self.unit.error(kind, coordinate);
        None
    }

    fn if_statement(&mut self, branches: &[(Expr, Vec<Stmt>)], else_branch: Option<&[Stmt]>, line: usize) {
        let mut end_jumps = Vec::new();
        for (condition, body) in branches {
            self.expression(condition);
            let next = self.chunk.write_jump(OpCode::JumpIfFalse, condition.line());
            self.block(body);
            end_jumps.push(self.chunk.write_jump(OpCode::Jump, line));
            self.patch(next, condition.coordinate);
        }
        if let Some(body) = else_branch {
            self.block(body);
        }
        for jump in end_jumps {
            self.patch(jump, Coordinate { line, column: 1 });
        }
    }

    fn while_statement(&mut self, condition: &Expr, body: &[Stmt], line: usize) {
        let start = self.chunk.current_offset();
        self.expression(condition);
        let exit = self.chunk.write_jump(OpCode::JumpIfFalse, line);

        self.loops.push(LoopContext {
            start,
            breaks: Vec::new(),
        });
        self.block(body);
        self.emit_loop(start, condition.coordinate);
        self.patch(exit, condition.coordinate);

        if let Some(ctx) = self.loops.pop() {
            for jump in ctx.breaks {
                self.patch(jump, condition.coordinate);
            }
        }
    }

    fn emit_loop(&mut self, start: usize, coordinate: Coordinate) {
        if let Err(err) = self.chunk.write_loop(start, coordinate.line) {
            self.unit.error(err.into(), coordinate);
        }
    }

    fn patch(&mut self, jump: usize, coordinate: Coordinate) {
        if let Err(err) = self.chunk.patch_jump(jump) {
            self.unit.error(err.into(), coordinate);
        }
    }

    // ===== 表达式 =====

    fn expression(&mut self, expr: &Expr) {
        let line = expr.line();
        match &expr.kind {
            ExprKind::LiteralInt(n) => self.constant(Value::Int(*n), expr.coordinate),
            ExprKind::LiteralFloat(f) => self.constant(Value::Float(*f), expr.coordinate),
            ExprKind::LiteralString(s) => self.constant(Value::str(s), expr.coordinate),
            ExprKind::LiteralTrue => self.chunk.write_op(OpCode::LoadTrue, line),
            ExprKind::LiteralFalse => self.chunk.write_op(OpCode::LoadFalse, line),
            ExprKind::LiteralNull => self.chunk.write_op(OpCode::LoadNull, line),
            ExprKind::LiteralList(elements) => {
                for element in elements {
                    self.expression(element);
                }
                // 解析阶段已限制元素个数
                self.chunk
                    .write_op_u16(OpCode::BuildList, elements.len() as u16, line);
            }
            ExprKind::Binary { left, op, right } => {
                self.expression(left);
                self.expression(right);
                self.chunk.write_op(binary_opcode(*op), line);
            }
            ExprKind::Logical { left, op, right } => {
                self.expression(left);
                self.chunk.write_op(OpCode::Dup, line);
                let jump_op = match op {
                    LogicalOp::And => OpCode::JumpIfFalse,
                    LogicalOp::Or => OpCode::JumpIfTrue,
                };
                let end = self.chunk.write_jump(jump_op, line);
                self.chunk.write_op(OpCode::Pop, line);
                self.expression(right);
                self.patch(end, expr.coordinate);
            }
            ExprKind::Unary { op, operand } => {
                self.expression(operand);
                let opcode = match op {
                    UnaryOp::Neg => OpCode::Neg,
                    UnaryOp::Not => OpCode::Not,
                };
                self.chunk.write_op(opcode, line);
            }
            ExprKind::Grouping(inner) => self.expression(inner),
            ExprKind::VarRef(name) => self.variable(name, expr.coordinate),
            ExprKind::FunctionCall { callee, arguments } => {
                self.expression(callee);
                for argument in arguments {
                    self.expression(argument);
                }
                self.chunk
                    .write_op_u8(OpCode::Call, arguments.len() as u8, line);
            }
            ExprKind::MemberAccess { object, member } => self.member(object, member, expr.coordinate),
            ExprKind::IndexAccess { object, index } => {
                self.expression(object);
                self.expression(index);
                self.chunk.write_op(OpCode::IndexGet, line);
            }
        }
    }

    fn constant(&mut self, value: Value, coordinate: Coordinate) {
        match self.chunk.add_constant(value) {
            Ok(index) => self
                .chunk
                .write_op_u16(OpCode::LoadConst, index, coordinate.line),
            Err(err) => self.unit.error(err.into(), coordinate),
        }
    }

    fn variable(&mut self, name: &str, coordinate: Coordinate) {
        let line = coordinate.line;
        match self.resolve(name, coordinate) {
            Some(Resolved::Local(slot)) => self.chunk.write_op_u8(OpCode::LoadLocal, slot, line),
            Some(Resolved::Function(index)) => {
                self.chunk.write_op_u16(OpCode::LoadFunction, index as u16, line)
            }
            Some(Resolved::Module(index)) => self.chunk.write_op_u8(OpCode::LoadModule, index, line),
            Some(Resolved::Prelude(std)) => {
                self.chunk.write_op_u8(OpCode::LoadModule, std, line);
                self.get_member(name, coordinate);
            }
            // 已记录错误，占位保持栈平衡
            None => self.chunk.write_op(OpCode::LoadNull, line),
        }
    }

    /// `a.b`：模块成员在编译期校验
    fn member(&mut self, object: &Expr, member: &str, coordinate: Coordinate) {
        if let ExprKind::VarRef(name) = &object.kind {
            let shadowed = self.find_local(name).is_some();
            if !shadowed {
                if let Some(module) = self.user_module(name) {
                    match self.unit.modules[module].functions.get(member).copied() {
                        Some(index) => self.chunk.write_op_u16(
                            OpCode::LoadFunction,
                            index as u16,
                            coordinate.line,
                        ),
                        None => {
                            self.unit.error(
                                CompileErrorKind::UnknownMember {
                                    module: name.clone(),
                                    member: member.to_string(),
                                },
                                coordinate,
                            );
                            self.chunk.write_op(OpCode::LoadNull, coordinate.line);
                        }
                    }
                    return;
                }
                if let Some(index) = self.import_index(name) {
                    if !self.unit.imports[index as usize].contains(member) {
                        self.unit.error(
                            CompileErrorKind::UnknownMember {
                                module: name.clone(),
                                member: member.to_string(),
                            },
                            coordinate,
                        );
                    }
                    self.chunk.write_op_u8(OpCode::LoadModule, index, coordinate.line);
                    self.get_member(member, coordinate);
                    return;
                }
            }
        }
        self.expression(object);
        self.get_member(member, coordinate);
    }

    fn get_member(&mut self, member: &str, coordinate: Coordinate) {
        match self.chunk.add_constant(Value::str(member)) {
            Ok(index) => self
                .chunk
                .write_op_u16(OpCode::GetMember, index, coordinate.line),
            Err(err) => self.unit.error(err.into(), coordinate),
        }
    }
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::Equal => OpCode::Equal,
        BinaryOp::NotEqual => OpCode::NotEqual,
        BinaryOp::Greater => OpCode::Greater,
        BinaryOp::GreaterEqual => OpCode::GreaterEqual,
        BinaryOp::Less => OpCode::Less,
        BinaryOp::LessEqual => OpCode::LessEqual,
    }
}
