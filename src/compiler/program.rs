//! Generated programs
//!
//! A program is one linear list of instructions over a frame of registers,
//! fixed-size byte buffers and cursor slots. Control flow uses labels that
//! are resolved to instruction indexes when the program is finished.

use std::fmt;

use super::builtins::Builtin;
use super::layout::RowLayout;
use crate::backend::Isolation;
use crate::error::{Error, Result};
use crate::lang::BinaryOperator;

/// Register holding one runtime value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(pub usize);

/// Fixed-size staging buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// Cursor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId(pub usize);

/// Jump target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub usize);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Constant operand
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Double(n) => write!(f, "{:?}", n),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// One step of an assignment path below a variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathStep {
    Field(usize),
    Index(Reg),
}

/// Instruction set
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    // ========== Values ==========
    LoadConst { dst: Reg, value: Constant },
    Move { dst: Reg, src: Reg },
    Binary { op: BinaryOperator, dst: Reg, lhs: Reg, rhs: Reg },
    /// `dst = src != 0` for integers, identity for booleans
    ToBool { dst: Reg, src: Reg },
    MakeTuple { dst: Reg, fields: Vec<Reg> },
    MakeArray { dst: Reg, elements: Vec<Reg> },
    GetField { dst: Reg, src: Reg, index: usize },
    GetIndex { dst: Reg, array: Reg, index: Reg },
    /// Write `src` into `root` at the given path
    Store { root: Reg, path: Vec<PathStep>, src: Reg },
    Call { dst: Reg, function: Builtin, args: Vec<Reg> },

    // ========== Control Flow ==========
    Jump { target: Label },
    Branch { cond: Reg, then_target: Label, else_target: Label },
    Halt,

    // ========== Memory ==========
    /// Lay a tuple out into a buffer
    StoreRow { src: Reg, buffer: BufferId, layout: RowLayout },
    WriteBytes { buffer: BufferId, offset: usize, bytes: Vec<u8> },
    CopyBytes {
        src: BufferId,
        src_offset: usize,
        dst: BufferId,
        dst_offset: usize,
        len: usize,
    },
    /// Read an 8-byte integer from a buffer
    LoadInt { dst: Reg, buffer: BufferId, offset: usize },

    // ========== Storage ==========
    BeginTransaction { isolation: Isolation },
    PrecommitTransaction,
    Insert { key: BufferId, value: BufferId },
    OpenCursor { cursor: CursorId, from: Vec<u8>, to: Vec<u8> },
    CursorValid { dst: Reg, cursor: CursorId },
    CursorCopyKey { cursor: CursorId, buffer: BufferId },
    CursorCopyValue { cursor: CursorId, buffer: BufferId },
    CursorAdvance { cursor: CursorId },
    CursorDestroy { cursor: CursorId },

    // ========== Output ==========
    Emit { src: Reg, layout: RowLayout },
}

fn regs(list: &[Reg]) -> String {
    list.iter()
        .map(Reg::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::LoadConst { dst, value } => write!(f, "{} = const {}", dst, value),
            Instr::Move { dst, src } => write!(f, "{} = {}", dst, src),
            Instr::Binary { op, dst, lhs, rhs } => write!(f, "{} = {} {} {}", dst, lhs, op, rhs),
            Instr::ToBool { dst, src } => write!(f, "{} = bool {}", dst, src),
            Instr::MakeTuple { dst, fields } => write!(f, "{} = tuple {{{}}}", dst, regs(fields)),
            Instr::MakeArray { dst, elements } => write!(f, "{} = array [{}]", dst, regs(elements)),
            Instr::GetField { dst, src, index } => write!(f, "{} = {}.{}", dst, src, index),
            Instr::GetIndex { dst, array, index } => write!(f, "{} = {}[{}]", dst, array, index),
            Instr::Store { root, path, src } => {
                write!(f, "{}", root)?;
                for step in path {
                    match step {
                        PathStep::Field(i) => write!(f, ".{}", i)?,
                        PathStep::Index(r) => write!(f, "[{}]", r)?,
                    }
                }
                write!(f, " <- {}", src)
            }
            Instr::Call {
                dst,
                function,
                args,
            } => write!(f, "{} = call {}({})", dst, function, regs(args)),
            Instr::Jump { target } => write!(f, "jump {}", target),
            Instr::Branch {
                cond,
                then_target,
                else_target,
            } => write!(f, "branch {} ? {} : {}", cond, then_target, else_target),
            Instr::Halt => write!(f, "halt"),
            Instr::StoreRow {
                src,
                buffer,
                layout,
            } => write!(f, "store_row {} -> {} {}", src, buffer, layout),
            Instr::WriteBytes {
                buffer,
                offset,
                bytes,
            } => write!(
                f,
                "write {}+{} {:?}",
                buffer,
                offset,
                String::from_utf8_lossy(bytes)
            ),
            Instr::CopyBytes {
                src,
                src_offset,
                dst,
                dst_offset,
                len,
            } => write!(
                f,
                "copy {}+{} -> {}+{} ({} bytes)",
                src, src_offset, dst, dst_offset, len
            ),
            Instr::LoadInt {
                dst,
                buffer,
                offset,
            } => write!(f, "{} = load_int {}+{}", dst, buffer, offset),
            Instr::BeginTransaction { isolation } => write!(f, "begin_transaction {}", isolation),
            Instr::PrecommitTransaction => write!(f, "precommit_transaction"),
            Instr::Insert { key, value } => write!(f, "insert {} {}", key, value),
            Instr::OpenCursor { cursor, from, to } => write!(
                f,
                "{} = open_cursor [{:?}, {:?})",
                cursor,
                String::from_utf8_lossy(from),
                String::from_utf8_lossy(to)
            ),
            Instr::CursorValid { dst, cursor } => write!(f, "{} = valid {}", dst, cursor),
            Instr::CursorCopyKey { cursor, buffer } => write!(f, "copy_key {} -> {}", cursor, buffer),
            Instr::CursorCopyValue { cursor, buffer } => {
                write!(f, "copy_value {} -> {}", cursor, buffer)
            }
            Instr::CursorAdvance { cursor } => write!(f, "advance {}", cursor),
            Instr::CursorDestroy { cursor } => write!(f, "destroy {}", cursor),
            Instr::Emit { src, layout } => write!(f, "emit {} {}", src, layout),
        }
    }
}

/// Storage a program needs before it starts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub registers: usize,
    /// Size in bytes of each staging buffer
    pub buffers: Vec<usize>,
    pub cursors: usize,
}

/// A finished program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    instructions: Vec<Instr>,
    /// Instruction index of each label
    labels: Vec<usize>,
    frame: Frame,
}

impl Program {
    pub fn instructions(&self) -> &[Instr] {
        &self.instructions
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Instruction index a label points to
    pub fn target(&self, label: Label) -> Result<usize> {
        self.labels
            .get(label.0)
            .copied()
            .ok_or_else(|| Error::Internal(format!("unknown label {}", label)))
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "; registers={} buffers={:?} cursors={}",
            self.frame.registers, self.frame.buffers, self.frame.cursors
        )?;
        for (index, instr) in self.instructions.iter().enumerate() {
            for (label, _) in self.labels.iter().enumerate().filter(|(_, &at)| at == index) {
                writeln!(f, "L{}:", label)?;
            }
            writeln!(f, "  {:04}  {}", index, instr)?;
        }
        Ok(())
    }
}

/// Accumulates instructions and frame reservations during code generation
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    instructions: Vec<Instr>,
    labels: Vec<Option<usize>>,
    frame: Frame,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self) -> Reg {
        let reg = Reg(self.frame.registers);
        self.frame.registers += 1;
        reg
    }

    pub fn buffer(&mut self, size: usize) -> BufferId {
        self.frame.buffers.push(size);
        BufferId(self.frame.buffers.len() - 1)
    }

    pub fn cursor(&mut self) -> CursorId {
        let cursor = CursorId(self.frame.cursors);
        self.frame.cursors += 1;
        cursor
    }

    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Point a label at the next instruction
    pub fn bind(&mut self, label: Label) -> Result<()> {
        let slot = self
            .labels
            .get_mut(label.0)
            .ok_or_else(|| Error::Internal(format!("unknown label {}", label)))?;
        if slot.is_some() {
            return Err(Error::Internal(format!("label {} bound twice", label)));
        }
        *slot = Some(self.instructions.len());
        Ok(())
    }

    pub fn emit(&mut self, instr: Instr) {
        self.instructions.push(instr);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Resolve labels and produce the program; every label must be bound
    pub fn finish(self) -> Result<Program> {
        let labels = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, at)| at.ok_or_else(|| Error::Internal(format!("label L{} never bound", i))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Program {
            instructions: self.instructions,
            labels,
            frame: self.frame,
        })
    }
}
