//! 主执行循环

use super::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use super::{operators, ExecutionLimits, InterruptHandle, CHECK_INTERVAL};
use crate::runtime::bytecode::{Function, OpCode};
use crate::runtime::compiler::Unit;
use crate::runtime::value::Value;
use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// 调用帧
struct Frame {
    function: Arc<Function>,
    ip: usize,
    locals: Vec<Value>,
    /// 被调用者在操作数栈上的位置，返回时截断到这里
    stack_base: usize,
}

/// 单次执行的全部状态
pub(super) struct Execution<'a> {
    unit: &'a Unit,
    limits: &'a ExecutionLimits,
    interrupt: &'a InterruptHandle,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    executed: u64,
    started: Instant,
}

impl<'a> Execution<'a> {
    pub(super) fn new(unit: &'a Unit, limits: &'a ExecutionLimits, interrupt: &'a InterruptHandle) -> Self {
        Execution {
            unit,
            limits,
            interrupt,
            stack: Vec::with_capacity(64),
            frames: Vec::with_capacity(16),
            executed: 0,
            started: Instant::now(),
        }
    }

    pub(super) fn run(mut self, function: &Arc<Function>, args: Vec<Value>) -> RuntimeResult<Value> {
        if self.interrupt.is_interrupted() {
            return Err(RuntimeErrorKind::Interrupted.into());
        }
        self.push_frame(Arc::clone(function), args, 0)?;
        self.execute()
    }

    fn execute(&mut self) -> RuntimeResult<Value> {
        loop {
            self.executed += 1;
            if let Some(max) = self.limits.max_instructions {
                if self.executed > max {
                    return Err(self.error(RuntimeErrorKind::InstructionLimit(max)));
                }
            }
            if self.executed % CHECK_INTERVAL == 0 {
                self.check_budget()?;
            }

            let byte = self.read_u8()?;
            let op = OpCode::try_from(byte)
                .map_err(|b| self.error(RuntimeErrorKind::InvalidBytecode(format!("unknown opcode 0x{b:02x}"))))?;

            match op {
                OpCode::LoadConst => {
                    let index = self.read_u16()?;
                    let value = self.constant(index)?;
                    self.push(value)?;
                }
                OpCode::LoadNull => self.push(Value::Null)?,
                OpCode::LoadTrue => self.push(Value::Bool(true))?,
                OpCode::LoadFalse => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop()?;
                }
                OpCode::Dup => {
                    let top = self.peek(0)?.clone();
                    self.push(top)?;
                }

                OpCode::LoadLocal => {
                    let slot = self.read_u8()? as usize;
                    let value = self.frame()?.locals.get(slot).cloned();
                    let value = value.ok_or_else(|| self.invalid(format!("local slot {slot}")))?;
                    self.push(value)?;
                }
                OpCode::StoreLocal => {
                    let slot = self.read_u8()? as usize;
                    let value = self.pop()?;
                    if slot >= self.frame()?.locals.len() {
                        return Err(self.invalid(format!("local slot {slot}")));
                    }
                    self.frame_mut()?.locals[slot] = value;
                }
                OpCode::LoadModule => {
                    let index = self.read_u8()? as usize;
                    let module = self.unit.imports.get(index).cloned();
                    let module = module.ok_or_else(|| self.invalid(format!("import {index}")))?;
                    self.push(Value::Module(module))?;
                }
                OpCode::LoadFunction => {
                    let index = self.read_u16()? as usize;
                    let function = self.unit.functions.get(index).cloned();
                    let function = function.ok_or_else(|| self.invalid(format!("function {index}")))?;
                    self.push(Value::Function(function))?;
                }
                OpCode::GetMember => {
                    let index = self.read_u16()?;
                    let name = self.constant(index)?;
                    let object = self.pop()?;
                    let value = self.get_member(&object, &name)?;
                    self.push(value)?;
                }

                OpCode::Add => {
                    let max_len = self.limits.max_value_len;
                    self.binary(|a, b| operators::add(a, b, max_len))?
                }
                OpCode::Sub => self.binary(operators::sub)?,
                OpCode::Mul => self.binary(operators::mul)?,
                OpCode::Div => self.binary(operators::div)?,
                OpCode::Mod => self.binary(operators::rem)?,
                OpCode::Neg => {
                    let value = self.pop()?;
                    let result = operators::neg(&value).map_err(|kind| self.error(kind))?;
                    self.push(result)?;
                }

                OpCode::Equal => self.binary(|a, b| Ok(Value::Bool(a == b)))?,
                OpCode::NotEqual => self.binary(|a, b| Ok(Value::Bool(a != b)))?,
                OpCode::Greater => self.comparison(|o| o == Ordering::Greater)?,
                OpCode::GreaterEqual => self.comparison(|o| o != Ordering::Less)?,
                OpCode::Less => self.comparison(|o| o == Ordering::Less)?,
                OpCode::LessEqual => self.comparison(|o| o != Ordering::Greater)?,
                OpCode::Not => {
                    let value = self.pop()?;
                    self.push(Value::Bool(!value.is_truthy()))?;
                }

                OpCode::Jump => {
                    let offset = self.read_u16()? as usize;
                    self.frame_mut()?.ip += offset;
                }
                OpCode::JumpIfFalse | OpCode::JumpIfTrue => {
                    let offset = self.read_u16()? as usize;
                    let condition = self.pop()?.is_truthy();
                    if condition == (op == OpCode::JumpIfTrue) {
                        self.frame_mut()?.ip += offset;
                    }
                }
                OpCode::JumpBack => {
                    let offset = self.read_u16()? as usize;
                    if offset > self.frame()?.ip {
                        return Err(self.invalid("jump before start".to_string()));
                    }
                    self.frame_mut()?.ip -= offset;
                }

                OpCode::Call => {
                    let argc = self.read_u8()? as usize;
                    self.call_value(argc)?;
                }
                OpCode::Return => {
                    let result = self.pop()?;
                    let frame = self
                        .frames
                        .pop()
                        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::InvalidBytecode("no frame".into())))?;
                    self.stack.truncate(frame.stack_base);
                    if self.frames.is_empty() {
                        return Ok(result);
                    }
                    self.push(result)?;
                }

                OpCode::BuildList => {
                    let count = self.read_u16()? as usize;
                    let start = self
                        .stack
                        .len()
                        .checked_sub(count)
                        .ok_or_else(|| self.invalid("stack underflow".to_string()))?;
                    if count > self.limits.max_value_len {
                        return Err(self.error(RuntimeErrorKind::ValueTooLarge(self.limits.max_value_len)));
                    }
                    let items = self.stack.split_off(start);
                    self.push(Value::list(items))?;
                }
                OpCode::IndexGet => {
                    let index = self.pop()?;
                    let object = self.pop()?;
                    let value = operators::index_get(&object, &index).map_err(|kind| self.error(kind))?;
                    self.push(value)?;
                }
                OpCode::IndexSet => {
                    let value = self.pop()?;
                    let index = self.pop()?;
                    let object = self.pop()?;
                    let list = operators::index_set(&object, &index, value).map_err(|kind| self.error(kind))?;
                    self.push(list)?;
                }
            }
        }
    }

    // ===== 限制 =====

    fn check_budget(&self) -> RuntimeResult<()> {
        if self.interrupt.is_interrupted() {
            return Err(self.error(RuntimeErrorKind::Interrupted));
        }
        if let Some(timeout) = self.limits.timeout {
            if self.started.elapsed() >= timeout {
                return Err(self.error(RuntimeErrorKind::Timeout(timeout.as_millis() as u64)));
            }
        }
        Ok(())
    }

    // ===== 调用 =====

    fn push_frame(&mut self, function: Arc<Function>, args: Vec<Value>, stack_base: usize) -> RuntimeResult<()> {
        if self.frames.len() >= self.limits.max_call_depth {
            return Err(self.error(RuntimeErrorKind::CallDepthExceeded(self.limits.max_call_depth)));
        }
        let mut locals = args;
        locals.resize(function.local_count.max(function.arity), Value::Null);
        self.frames.push(Frame {
            function,
            ip: 0,
            locals,
            stack_base,
        });
        Ok(())
    }

    /// 栈布局：callee arg0 .. argN
    fn call_value(&mut self, argc: usize) -> RuntimeResult<()> {
        let callee_at = self
            .stack
            .len()
            .checked_sub(argc + 1)
            .ok_or_else(|| self.invalid("stack underflow".to_string()))?;
        let callee = self.stack[callee_at].clone();

        match callee {
            Value::Function(function) => {
                if argc != function.arity {
                    return Err(self.error(RuntimeErrorKind::ArityMismatch {
                        name: function.name.clone(),
                        expected: function.arity.to_string(),
                        found: argc,
                    }));
                }
                let args = self.stack.split_off(callee_at + 1);
                self.stack.truncate(callee_at);
                self.push_frame(function, args, callee_at)
            }
            Value::Native(native) => {
                if !native.arity.accepts(argc) {
                    return Err(self.error(RuntimeErrorKind::ArityMismatch {
                        name: native.name.clone(),
                        expected: native.arity.to_string(),
                        found: argc,
                    }));
                }
                let args = self.stack.split_off(callee_at + 1);
                self.stack.truncate(callee_at);
                let result = match catch_unwind(AssertUnwindSafe(|| native.call(&args))) {
                    Ok(Ok(value)) => value,
                    Ok(Err(message)) => {
                        return Err(self.error(RuntimeErrorKind::Native {
                            name: native.name.clone(),
                            message,
                        }))
                    }
                    Err(_) => {
                        tracing::warn!(target: "modkit::vm", native = %native.name, "native function panicked");
                        return Err(self.error(RuntimeErrorKind::NativePanic(native.name.clone())));
                    }
                };
                if result.size() > self.limits.max_value_len {
                    return Err(self.error(RuntimeErrorKind::ValueTooLarge(self.limits.max_value_len)));
                }
                self.push(result)
            }
            other => Err(self.error(RuntimeErrorKind::NotCallable(other.type_name()))),
        }
    }

    fn get_member(&self, object: &Value, name: &Value) -> RuntimeResult<Value> {
        let member = name
            .as_str()
            .ok_or_else(|| self.invalid("member name is not a string".to_string()))?;
        match object {
            Value::Module(module) => module.get(member).cloned().ok_or_else(|| {
                self.error(RuntimeErrorKind::UndefinedMember {
                    owner: module.name().to_string(),
                    member: member.to_string(),
                })
            }),
            other => Err(self.error(RuntimeErrorKind::UndefinedMember {
                owner: other.type_name().to_string(),
                member: member.to_string(),
            })),
        }
    }

    // ===== 运算 =====

    fn binary(
        &mut self,
        op: impl Fn(&Value, &Value) -> Result<Value, RuntimeErrorKind>,
    ) -> RuntimeResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = op(&a, &b).map_err(|kind| self.error(kind))?;
        self.push(result)
    }

    fn comparison(&mut self, test: impl Fn(Ordering) -> bool) -> RuntimeResult<()> {
        self.binary(|a, b| operators::compare(a, b).map(|o| Value::Bool(test(o))))
    }

    // ===== 栈与帧 =====

    fn push(&mut self, value: Value) -> RuntimeResult<()> {
        if self.stack.len() >= self.limits.max_stack {
            return Err(self.error(RuntimeErrorKind::StackOverflow));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> RuntimeResult<Value> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(self.invalid("stack underflow".to_string())),
        }
    }

    fn peek(&self, distance: usize) -> RuntimeResult<&Value> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .and_then(|i| self.stack.get(i))
            .ok_or_else(|| self.invalid("stack underflow".to_string()))
    }

    fn frame(&self) -> RuntimeResult<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::InvalidBytecode("no frame".into())))
    }

    fn frame_mut(&mut self) -> RuntimeResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::InvalidBytecode("no frame".into())))
    }

    fn read_u8(&mut self) -> RuntimeResult<u8> {
        let frame = self.frame_mut()?;
        let byte = frame.function.chunk.read_u8(frame.ip);
        frame.ip += 1;
        byte.ok_or_else(|| self.invalid("unexpected end of code".to_string()))
    }

    fn read_u16(&mut self) -> RuntimeResult<u16> {
        let frame = self.frame_mut()?;
        let value = frame.function.chunk.read_u16(frame.ip);
        frame.ip += 2;
        value.ok_or_else(|| self.invalid("unexpected end of code".to_string()))
    }

    fn constant(&self, index: u16) -> RuntimeResult<Value> {
        self.frame()?
            .function
            .chunk
            .constants
            .get(index as usize)
            .cloned()
            .ok_or_else(|| self.invalid(format!("constant {index}")))
    }

    // ===== 错误 =====

    fn invalid(&self, message: String) -> RuntimeError {
        self.error(RuntimeErrorKind::InvalidBytecode(message))
    }

    /// 附上当前函数与行号
    fn error(&self, kind: RuntimeErrorKind) -> RuntimeError {
        match self.frames.last() {
            Some(frame) => RuntimeError {
                kind,
                line: frame.function.chunk.line_at(frame.ip.saturating_sub(1)),
                function: frame.function.name.clone(),
            },
            None => RuntimeError::new(kind),
        }
    }
}
