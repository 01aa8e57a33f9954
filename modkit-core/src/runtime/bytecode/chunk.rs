//! 字节码块实现

use super::OpCode;
use crate::runtime::value::Value;
use std::fmt::Write;
use thiserror::Error;

/// 字节码生成错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("too many constants in one function")]
    TooManyConstants,

    #[error("jump distance too large")]
    JumpTooLarge,
}

/// 字节码块
#[derive(Clone, Debug, Default)]
pub struct Chunk {
    /// 指令字节码
    pub code: Vec<u8>,
    /// 常量池
    pub constants: Vec<Value>,
    /// 行号信息 (与 code 一一对应)
    pub lines: Vec<usize>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入单字节指令
    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.code.push(op as u8);
        self.lines.push(line);
    }

    /// 写入带 u8 操作数的指令
    pub fn write_op_u8(&mut self, op: OpCode, operand: u8, line: usize) {
        self.write_op(op, line);
        self.code.push(operand);
        self.lines.push(line);
    }

    /// 写入带 u16 操作数的指令
    pub fn write_op_u16(&mut self, op: OpCode, operand: u16, line: usize) {
        self.write_op(op, line);
        self.write_u16(operand, line);
    }

    fn write_u16(&mut self, value: u16, line: usize) {
        self.code.extend_from_slice(&value.to_le_bytes());
        self.lines.push(line);
        self.lines.push(line);
    }

    /// 写入跳转指令 (占位，稍后 patch)，返回操作数位置
    pub fn write_jump(&mut self, op: OpCode, line: usize) -> usize {
        self.write_op(op, line);
        let offset = self.code.len();
        self.write_u16(u16::MAX, line);
        offset
    }

    /// 修补跳转偏移量：从操作数之后跳到当前位置
    pub fn patch_jump(&mut self, offset: usize) -> Result<(), ChunkError> {
        let jump = self.code.len() - (offset + 2);
        let jump = u16::try_from(jump).map_err(|_| ChunkError::JumpTooLarge)?;
        self.code[offset..offset + 2].copy_from_slice(&jump.to_le_bytes());
        Ok(())
    }

    /// 写入循环跳转 (负向跳转)
    pub fn write_loop(&mut self, loop_start: usize, line: usize) -> Result<(), ChunkError> {
        self.write_op(OpCode::JumpBack, line);
        // +2 为 u16 操作数
        let offset = self.code.len() - loop_start + 2;
        let offset = u16::try_from(offset).map_err(|_| ChunkError::JumpTooLarge)?;
        self.write_u16(offset, line);
        Ok(())
    }

    /// 添加常量，相同的字符串/整数常量复用同一槽位
    pub fn add_constant(&mut self, value: Value) -> Result<u16, ChunkError> {
        let existing = self.constants.iter().position(|c| match (c, &value) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            _ => false,
        });
        if let Some(index) = existing {
            return Ok(index as u16);
        }
        let index = u16::try_from(self.constants.len()).map_err(|_| ChunkError::TooManyConstants)?;
        self.constants.push(value);
        Ok(index)
    }

    /// 获取当前代码位置 (用于计算跳转)
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn read_u8(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let bytes = self.code.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn line_at(&self, offset: usize) -> usize {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    /// 反汇编为文本 (调试用)
    pub fn disassemble(&self, name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {name} ==");
        for (i, constant) in self.constants.iter().enumerate() {
            let _ = writeln!(out, "  [{i:3}] {constant:?}");
        }

        let mut offset = 0;
        while offset < self.code.len() {
            let line_info = if offset > 0 && self.lines[offset] == self.lines[offset - 1] {
                "   | ".to_string()
            } else {
                format!("{:4} ", self.lines[offset])
            };
            let Ok(op) = OpCode::try_from(self.code[offset]) else {
                let _ = writeln!(out, "{offset:04} {line_info}<invalid {:#04x}>", self.code[offset]);
                offset += 1;
                continue;
            };
            let operand = match op.operand_size() {
                1 => self.read_u8(offset + 1).map(|v| format!(" {v}")),
                2 => self.read_u16(offset + 1).map(|v| format!(" {v}")),
                _ => None,
            };
            let _ = writeln!(
                out,
                "{offset:04} {line_info}{}{}",
                op.name(),
                operand.unwrap_or_default()
            );
            offset += 1 + op.operand_size();
        }
        out
    }
}

/// 编译后的函数
#[derive(Debug, Clone)]
pub struct Function {
    /// 完整名称（`module.function`）
    pub name: String,
    pub arity: usize,
    /// 局部变量槽位数（含参数）
    pub local_count: usize,
    pub chunk: Chunk,
}
