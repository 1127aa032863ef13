//! Program executor
//!
//! Runs a generated [`Program`] against a [`Backend`]. Registers hold
//! [`Datum`]s, buffers are fixed-size byte arrays sized by the program's
//! frame, and cursor slots hold the backend's cursors while a scan runs.

use byteorder::ByteOrder;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::datum::Datum;
use crate::backend::Backend;
use crate::catalog::{Value, WireOrder, WORD_SIZE};
use crate::compiler::{
    Builtin, BufferId, Constant, CursorId, Instr, PathStep, Program, Reg, RowLayout,
};
use crate::error::{Error, Result};

/// Seed used when none is configured
pub const DEFAULT_SEED: u64 = 0x5EED;

/// One row handed to `emit`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmittedRow {
    /// Cells in layout order, nested tuples flattened
    pub values: Vec<Value>,
    /// The laid out row
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl EmittedRow {
    /// Integer cells of the row, `None` if any cell is not an integer
    pub fn ints(&self) -> Option<Vec<i64>> {
        self.values.iter().map(Value::as_i64).collect()
    }
}

/// Result of running a program
#[derive(Debug, Default, Serialize)]
pub struct Execution {
    /// Emitted rows, in emission order
    pub rows: Vec<EmittedRow>,
    /// Lines printed by `print_int` and `print_string`
    pub console: Vec<String>,
    /// Instructions executed
    pub steps: u64,
}

/// Seeded generator behind `rand`
#[derive(Debug, Clone)]
struct RandomSource(SmallRng);

impl RandomSource {
    fn new(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    /// Uniform in `[min, max)`; `min` when the range is empty
    fn range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.0.random_range(min..max)
    }
}

enum Flow {
    Next,
    Jump(usize),
    Halt,
}

/// Program interpreter
pub struct Executor<'b, B: Backend> {
    backend: &'b mut B,
    registers: Vec<Datum>,
    buffers: Vec<Vec<u8>>,
    cursors: Vec<Option<B::Cursor>>,
    rng: RandomSource,
    max_steps: Option<u64>,
    in_transaction: bool,
    output: Execution,
}

impl<'b, B: Backend> Executor<'b, B> {
    pub fn new(backend: &'b mut B) -> Self {
        Self {
            backend,
            registers: Vec::new(),
            buffers: Vec::new(),
            cursors: Vec::new(),
            rng: RandomSource::new(DEFAULT_SEED),
            max_steps: None,
            in_transaction: false,
            output: Execution::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = RandomSource::new(seed);
        self
    }

    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Run a program to completion
    pub fn run(mut self, program: &Program) -> Result<Execution> {
        let frame = program.frame();
        self.registers = vec![Datum::Unset; frame.registers];
        self.buffers = frame.buffers.iter().map(|&size| vec![0u8; size]).collect();
        self.cursors = (0..frame.cursors).map(|_| None).collect();

        let result = self.execute(program);
        self.release_cursors();

        match result {
            Ok(()) => {
                debug!(
                    steps = self.output.steps,
                    rows = self.output.rows.len(),
                    "program finished"
                );
                Ok(self.output)
            }
            Err(e) => {
                if self.in_transaction {
                    warn!(error = %e, "aborting transaction after failure");
                    if let Err(abort) = self.backend.abort_transaction() {
                        warn!(error = %abort, "transaction abort failed");
                    }
                }
                Err(e)
            }
        }
    }

    fn execute(&mut self, program: &Program) -> Result<()> {
        let instructions = program.instructions();
        let mut pc = 0;

        while let Some(instr) = instructions.get(pc) {
            self.output.steps += 1;
            if let Some(limit) = self.max_steps.filter(|&limit| self.output.steps > limit) {
                return Err(Error::StepLimitExceeded(limit));
            }

            match self.step(instr, program)? {
                Flow::Next => pc += 1,
                Flow::Jump(target) => pc = target,
                Flow::Halt => return Ok(()),
            }
        }

        Err(Error::Internal("program ran past its end".to_string()))
    }

    fn step(&mut self, instr: &Instr, program: &Program) -> Result<Flow> {
        match instr {
            // ========== Values ==========
            Instr::LoadConst { dst, value } => {
                let datum = match value {
                    Constant::Int(n) => Datum::Int(*n),
                    Constant::Double(n) => Datum::Double(*n),
                    Constant::Bool(b) => Datum::Bool(*b),
                    Constant::Str(s) => Datum::Str(s.clone()),
                };
                self.write(*dst, datum)?;
            }
            Instr::Move { dst, src } => {
                let value = self.read(*src)?.clone();
                self.write(*dst, value)?;
            }
            Instr::Binary { op, dst, lhs, rhs } => {
                let value = Datum::binary(*op, self.read(*lhs)?, self.read(*rhs)?)?;
                self.write(*dst, value)?;
            }
            Instr::ToBool { dst, src } => {
                let value = self.read(*src)?.truthy()?;
                self.write(*dst, Datum::Bool(value))?;
            }
            Instr::MakeTuple { dst, fields } => {
                let value = Datum::Tuple(self.read_all(fields)?);
                self.write(*dst, value)?;
            }
            Instr::MakeArray { dst, elements } => {
                let value = Datum::Array(self.read_all(elements)?);
                self.write(*dst, value)?;
            }
            Instr::GetField { dst, src, index } => {
                let value = match self.read(*src)? {
                    Datum::Tuple(fields) => fields.get(*index).cloned().ok_or_else(|| {
                        Error::Internal(format!("tuple has no member {}", index))
                    })?,
                    other => {
                        return Err(Error::Internal(format!(
                            "member access on {}",
                            other.type_name()
                        )))
                    }
                };
                self.write(*dst, value)?;
            }
            Instr::GetIndex { dst, array, index } => {
                let index = self.read(*index)?.as_int()?;
                let value = match self.read(*array)? {
                    Datum::Array(items) => element(items, index)?.clone(),
                    other => {
                        return Err(Error::Internal(format!(
                            "index access on {}",
                            other.type_name()
                        )))
                    }
                };
                self.write(*dst, value)?;
            }
            Instr::Store { root, path, src } => self.store(*root, path, *src)?,
            Instr::Call {
                dst,
                function,
                args,
            } => {
                let value = self.call(*function, args)?;
                self.write(*dst, value)?;
            }

            // ========== Control Flow ==========
            Instr::Jump { target } => return Ok(Flow::Jump(program.target(*target)?)),
            Instr::Branch {
                cond,
                then_target,
                else_target,
            } => {
                let target = if self.bool(*cond)? {
                    then_target
                } else {
                    else_target
                };
                return Ok(Flow::Jump(program.target(*target)?));
            }
            Instr::Halt => return Ok(Flow::Halt),

            // ========== Memory ==========
            Instr::StoreRow {
                src,
                buffer,
                layout,
            } => {
                let bytes = self.read(*src)?.encode_row(layout)?;
                self.write_bytes(*buffer, 0, &bytes)?;
            }
            Instr::WriteBytes {
                buffer,
                offset,
                bytes,
            } => self.write_bytes(*buffer, *offset, bytes)?,
            Instr::CopyBytes {
                src,
                src_offset,
                dst,
                dst_offset,
                len,
            } => {
                let bytes = slice(buffer(&self.buffers, *src)?, *src_offset, *len)?.to_vec();
                self.write_bytes(*dst, *dst_offset, &bytes)?;
            }
            Instr::LoadInt {
                dst,
                buffer: id,
                offset,
            } => {
                let word = slice(buffer(&self.buffers, *id)?, *offset, WORD_SIZE)?;
                let value = WireOrder::read_i64(word);
                self.write(*dst, Datum::Int(value))?;
            }

            // ========== Storage ==========
            Instr::BeginTransaction { isolation } => {
                trace!(%isolation, "begin_transaction");
                self.backend.begin_transaction(*isolation)?;
                self.in_transaction = true;
            }
            Instr::PrecommitTransaction => {
                trace!("precommit_transaction");
                self.backend.precommit_transaction()?;
                self.in_transaction = false;
            }
            Instr::Insert { key, value } => {
                let key = buffer(&self.buffers, *key)?;
                let value = buffer(&self.buffers, *value)?;
                trace!(key = %String::from_utf8_lossy(key), "insert");
                self.backend.insert(key, value)?;
            }
            Instr::OpenCursor { cursor, from, to } => {
                trace!(cursor = cursor.0, "open_cursor");
                let handle = self.backend.open_cursor(from, to)?;
                let slot = self.cursor_slot(*cursor)?;
                if let Some(stale) = slot.replace(handle) {
                    self.backend.cursor_destroy(stale);
                }
            }
            Instr::CursorValid { dst, cursor } => {
                let valid = self.backend.cursor_is_valid(self.cursor(*cursor)?);
                self.write(*dst, Datum::Bool(valid))?;
            }
            Instr::CursorCopyKey { cursor, buffer } => self.copy_from_cursor(*cursor, *buffer, true)?,
            Instr::CursorCopyValue { cursor, buffer } => {
                self.copy_from_cursor(*cursor, *buffer, false)?
            }
            Instr::CursorAdvance { cursor } => {
                let handle = self
                    .cursors
                    .get_mut(cursor.0)
                    .and_then(Option::as_mut)
                    .ok_or_else(|| closed_cursor(*cursor))?;
                self.backend.cursor_advance(handle)?;
            }
            Instr::CursorDestroy { cursor } => {
                trace!(cursor = cursor.0, "cursor_destroy");
                let handle = self.cursor_slot(*cursor)?.take();
                if let Some(handle) = handle {
                    self.backend.cursor_destroy(handle);
                }
            }

            // ========== Output ==========
            Instr::Emit { src, layout } => self.emit_row(*src, layout)?,
        }
        Ok(Flow::Next)
    }

    // ========== Registers ==========

    fn read(&self, reg: Reg) -> Result<&Datum> {
        match self.registers.get(reg.0) {
            Some(Datum::Unset) => Err(Error::Internal(format!(
                "register {} read before it was written",
                reg
            ))),
            Some(datum) => Ok(datum),
            None => Err(Error::Internal(format!("register {} out of frame", reg))),
        }
    }

    fn read_all(&self, regs: &[Reg]) -> Result<Vec<Datum>> {
        regs.iter().map(|r| self.read(*r).cloned()).collect()
    }

    fn bool(&self, reg: Reg) -> Result<bool> {
        match self.read(reg)? {
            Datum::Bool(b) => Ok(*b),
            other => Err(Error::Internal(format!(
                "branch on {} value",
                other.type_name()
            ))),
        }
    }

    fn write(&mut self, reg: Reg, value: Datum) -> Result<()> {
        let slot = self
            .registers
            .get_mut(reg.0)
            .ok_or_else(|| Error::Internal(format!("register {} out of frame", reg)))?;
        *slot = value;
        Ok(())
    }

    fn store(&mut self, root: Reg, path: &[PathStep], src: Reg) -> Result<()> {
        enum Step {
            Field(usize),
            Index(i64),
        }

        let value = self.read(src)?.clone();
        let steps = path
            .iter()
            .map(|step| match step {
                PathStep::Field(i) => Ok(Step::Field(*i)),
                PathStep::Index(r) => self.read(*r)?.as_int().map(Step::Index),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut slot = self
            .registers
            .get_mut(root.0)
            .ok_or_else(|| Error::Internal(format!("register {} out of frame", root)))?;
        for step in steps {
            slot = match (slot, step) {
                (Datum::Tuple(fields), Step::Field(i)) => fields
                    .get_mut(i)
                    .ok_or_else(|| Error::Internal(format!("tuple has no member {}", i)))?,
                (Datum::Array(items), Step::Index(i)) => element_mut(items, i)?,
                (other, _) => {
                    return Err(Error::Internal(format!(
                        "cannot assign into {} value",
                        other.type_name()
                    )))
                }
            };
        }
        *slot = value;
        Ok(())
    }

    fn call(&mut self, function: Builtin, args: &[Reg]) -> Result<Datum> {
        let args = self.read_all(args)?;
        match (function, args.as_slice()) {
            (Builtin::PrintInt, [Datum::Int(n)]) => {
                self.output.console.push(n.to_string());
                Ok(Datum::Int(0))
            }
            (Builtin::PrintString, [Datum::Str(s)]) => {
                self.output.console.push(s.clone());
                Ok(Datum::Int(0))
            }
            (Builtin::Rand, [Datum::Int(min), Datum::Int(max)]) => {
                Ok(Datum::Int(self.rng.range(*min, *max)))
            }
            (function, args) => Err(Error::Internal(format!(
                "{} called with {} arguments",
                function,
                args.len()
            ))),
        }
    }

    // ========== Buffers ==========

    fn write_bytes(&mut self, id: BufferId, offset: usize, bytes: &[u8]) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(id.0)
            .ok_or_else(|| Error::Internal(format!("buffer {} out of frame", id)))?;
        let available = buffer.len();
        let dst = buffer
            .get_mut(offset..offset + bytes.len())
            .ok_or(Error::BufferTooShort {
                needed: offset + bytes.len(),
                available,
            })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    // ========== Cursors ==========

    fn cursor_slot(&mut self, id: CursorId) -> Result<&mut Option<B::Cursor>> {
        self.cursors
            .get_mut(id.0)
            .ok_or_else(|| Error::Internal(format!("cursor {} out of frame", id)))
    }

    fn cursor(&self, id: CursorId) -> Result<&B::Cursor> {
        self.cursors
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| closed_cursor(id))
    }

    fn copy_from_cursor(&mut self, id: CursorId, buffer: BufferId, key: bool) -> Result<()> {
        let handle = self
            .cursors
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| closed_cursor(id))?;
        let out = self
            .buffers
            .get_mut(buffer.0)
            .ok_or_else(|| Error::Internal(format!("buffer {} out of frame", buffer)))?;

        let copied = if key {
            self.backend.cursor_copy_key(handle, out)?
        } else {
            self.backend.cursor_copy_value(handle, out)?
        };
        if copied != out.len() {
            return Err(Error::Truncated {
                needed: out.len(),
                available: copied,
            });
        }
        Ok(())
    }

    fn release_cursors(&mut self) {
        for slot in &mut self.cursors {
            if let Some(handle) = slot.take() {
                self.backend.cursor_destroy(handle);
            }
        }
    }

    // ========== Output ==========

    fn emit_row(&mut self, src: Reg, layout: &RowLayout) -> Result<()> {
        let raw = self.read(src)?.encode_row(layout)?;
        let values = layout.decode(&raw)?;
        trace!(cells = values.len(), "emit");
        self.output.rows.push(EmittedRow { values, raw });
        Ok(())
    }
}

fn buffer(buffers: &[Vec<u8>], id: BufferId) -> Result<&[u8]> {
    buffers
        .get(id.0)
        .map(Vec::as_slice)
        .ok_or_else(|| Error::Internal(format!("buffer {} out of frame", id)))
}

fn element(items: &[Datum], index: i64) -> Result<&Datum> {
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .ok_or(Error::IndexOutOfBounds {
            index,
            len: items.len(),
        })
}

fn element_mut(items: &mut [Datum], index: i64) -> Result<&mut Datum> {
    let len = items.len();
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get_mut(i))
        .ok_or(Error::IndexOutOfBounds { index, len })
}

fn slice(buffer: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    buffer.get(offset..offset + len).ok_or(Error::Truncated {
        needed: offset + len,
        available: buffer.len(),
    })
}

fn closed_cursor(id: CursorId) -> Error {
    Error::Internal(format!("cursor {} is not open", id))
}
