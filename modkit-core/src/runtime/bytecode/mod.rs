//! 字节码定义

pub mod chunk;

pub use chunk::{Chunk, ChunkError, Function};

/// 操作码定义
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    // ===== 常量加载 =====
    LoadConst = 0x00, // + u16 索引
    LoadNull,
    LoadTrue,
    LoadFalse,

    // ===== 栈操作 =====
    Pop = 0x10,
    Dup,

    // ===== 变量 =====
    LoadLocal = 0x20,  // + u8 槽位
    StoreLocal,        // + u8 槽位
    LoadModule,        // + u8 导入表下标
    LoadFunction,      // + u16 单元函数表下标
    GetMember,         // + u16 常量池中的成员名

    // ===== 算术运算 =====
    Add = 0x30,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,

    // ===== 比较与逻辑 =====
    Equal = 0x40,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Not,

    // ===== 控制流 =====
    Jump = 0x50,  // + u16 前向偏移
    JumpIfFalse,  // + u16 前向偏移，弹出条件
    JumpIfTrue,   // + u16 前向偏移，弹出条件
    JumpBack,     // + u16 后向偏移

    // ===== 函数 =====
    Call = 0x60, // + u8 参数个数
    Return,

    // ===== 列表 =====
    BuildList = 0x70, // + u16 元素个数
    IndexGet,
    IndexSet, // 栈: list index value -> new_list
}

impl OpCode {
    /// 获取操作码名称
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::LoadConst => "LOAD_CONST",
            OpCode::LoadNull => "LOAD_NULL",
            OpCode::LoadTrue => "LOAD_TRUE",
            OpCode::LoadFalse => "LOAD_FALSE",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::LoadLocal => "LOAD_LOCAL",
            OpCode::StoreLocal => "STORE_LOCAL",
            OpCode::LoadModule => "LOAD_MODULE",
            OpCode::LoadFunction => "LOAD_FUNCTION",
            OpCode::GetMember => "GET_MEMBER",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Neg => "NEG",
            OpCode::Equal => "EQUAL",
            OpCode::NotEqual => "NOT_EQUAL",
            OpCode::Greater => "GREATER",
            OpCode::GreaterEqual => "GREATER_EQUAL",
            OpCode::Less => "LESS",
            OpCode::LessEqual => "LESS_EQUAL",
            OpCode::Not => "NOT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::JumpBack => "JUMP_BACK",
            OpCode::Call => "CALL",
            OpCode::Return => "RETURN",
            OpCode::BuildList => "BUILD_LIST",
            OpCode::IndexGet => "INDEX_GET",
            OpCode::IndexSet => "INDEX_SET",
        }
    }

    /// 操作数大小 (bytes)
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::LoadLocal | OpCode::StoreLocal | OpCode::LoadModule | OpCode::Call => 1,
            OpCode::LoadConst
            | OpCode::LoadFunction
            | OpCode::GetMember
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue
            | OpCode::JumpBack
            | OpCode::BuildList => 2,
            _ => 0,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        const ALL: &[OpCode] = &[
            OpCode::LoadConst,
            OpCode::LoadNull,
            OpCode::LoadTrue,
            OpCode::LoadFalse,
            OpCode::Pop,
            OpCode::Dup,
            OpCode::LoadLocal,
            OpCode::StoreLocal,
            OpCode::LoadModule,
            OpCode::LoadFunction,
            OpCode::GetMember,
            OpCode::Add,
            OpCode::Sub,
            OpCode::Mul,
            OpCode::Div,
            OpCode::Mod,
            OpCode::Neg,
            OpCode::Equal,
            OpCode::NotEqual,
            OpCode::Greater,
            OpCode::GreaterEqual,
            OpCode::Less,
            OpCode::LessEqual,
            OpCode::Not,
            OpCode::Jump,
            OpCode::JumpIfFalse,
            OpCode::JumpIfTrue,
            OpCode::JumpBack,
            OpCode::Call,
            OpCode::Return,
            OpCode::BuildList,
            OpCode::IndexGet,
            OpCode::IndexSet,
        ];
        ALL.iter().copied().find(|op| *op as u8 == byte).ok_or(byte)
    }
}
