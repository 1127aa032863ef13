//! Code generation
//!
//! Lowers an analyzed program to a linear instruction list in two passes.
//! The first pass reserves storage: a register per variable binding, a row register
//! per `emit` and `insert`, staging buffers for `insert` and `scan` and a
//! cursor per `scan`, keyed by statement id. The second pass emits code.

use tracing::debug;

use super::context::{CompilerContext, LoopContext, Staging};
use super::layout::RowLayout;
use super::program::{Constant, Instr, PathStep, Program, Reg};
use crate::catalog::{AttrType, Schema, WORD_SIZE};
use crate::error::{Error, Result};
use crate::lang::{
    BinaryOperator, Block, Expr, ExprKind, JumpKind, Literal, NodeId, PrimaryType, Primary, Stmt,
    StmtKind, Type,
};

/// Generate the program for an analyzed block
pub fn generate(block: &Block, ctx: &mut CompilerContext) -> Result<Program> {
    for stmt in &block.statements {
        allocate(stmt, ctx)?;
    }

    let mut generator = Generator { ctx };
    generator.block(block)?;
    generator.ctx.program.emit(Instr::Halt);

    let program = std::mem::take(&mut generator.ctx.program).finish()?;
    debug!(
        instructions = program.len(),
        registers = program.frame().registers,
        buffers = program.frame().buffers.len(),
        cursors = program.frame().cursors,
        "code generation finished"
    );
    Ok(program)
}

// ========== Allocation ==========

fn allocate_block(block: &Block, ctx: &mut CompilerContext) -> Result<()> {
    for stmt in &block.statements {
        allocate(stmt, ctx)?;
    }
    Ok(())
}

fn allocate(stmt: &Stmt, ctx: &mut CompilerContext) -> Result<()> {
    match &stmt.kind {
        StmtKind::Block(block) | StmtKind::Transaction { body: block, .. } => {
            allocate_block(block, ctx)
        }
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                allocate(init, ctx)?;
            }
            allocate_block(body, ctx)
        }
        StmtKind::If {
            then_block,
            else_block,
            ..
        } => {
            allocate_block(then_block, ctx)?;
            if let Some(else_block) = else_block {
                allocate_block(else_block, ctx)?;
            }
            Ok(())
        }
        StmtKind::Let { .. } => {
            ctx.slot(stmt.id);
            Ok(())
        }
        StmtKind::Emit(_) => {
            let row = ctx.program.register();
            ctx.reserve(stmt.id, Staging::Emit { row });
            Ok(())
        }
        StmtKind::Insert { table, .. } => {
            let schema = table_schema(ctx, table)?;
            let (key_len, value_len) = fixed_lengths(&schema)?;
            let row = ctx.program.register();
            let tuple = ctx.program.buffer(schema.len() * WORD_SIZE);
            let key = ctx.program.buffer(key_len);
            let value = ctx.program.buffer(value_len);
            ctx.reserve(
                stmt.id,
                Staging::Insert {
                    row,
                    tuple,
                    key,
                    value,
                },
            );
            Ok(())
        }
        StmtKind::Scan { table, body, .. } => {
            let schema = table_schema(ctx, table)?;
            let (key_len, value_len) = fixed_lengths(&schema)?;
            ctx.slot(stmt.id);
            let key = ctx.program.buffer(key_len);
            let value = ctx.program.buffer(value_len);
            let cursor = ctx.program.cursor();
            let valid = ctx.program.register();
            ctx.reserve(
                stmt.id,
                Staging::Scan {
                    key,
                    value,
                    cursor,
                    valid,
                },
            );
            allocate_block(body, ctx)
        }
        StmtKind::Define { .. }
        | StmtKind::DefineTuple { .. }
        | StmtKind::Jump(_)
        | StmtKind::Expr(_) => Ok(()),
    }
}

fn table_schema(ctx: &CompilerContext, table: &str) -> Result<Schema> {
    ctx.table(table)
        .cloned()
        .ok_or_else(|| Error::UndefinedTable(table.to_string()))
}

/// Key and value lengths of a table whose rows can be staged as integers
fn fixed_lengths(schema: &Schema) -> Result<(usize, usize)> {
    for attr in schema.attributes() {
        let supported = matches!(attr.ty, AttrType::Integer | AttrType::Date);
        if !supported || attr.is_nullable() {
            let ty = if attr.is_nullable() {
                format!("nullable {}", attr.ty)
            } else {
                attr.ty.to_string()
            };
            return Err(Error::UnsupportedColumn {
                table: schema.name().to_string(),
                column: attr.name.clone(),
                ty,
            });
        }
    }

    let variable = |region: &str| Error::VariableLengthLayout {
        table: schema.name().to_string(),
        region: region.to_string(),
    };
    let key = schema.fixed_key_length().ok_or_else(|| variable("key"))?;
    let value = schema.fixed_value_length().ok_or_else(|| variable("value"))?;
    Ok((key, value))
}

// ========== Emission ==========

struct Generator<'a> {
    ctx: &'a mut CompilerContext,
}

impl Generator<'_> {
    fn emit(&mut self, instr: Instr) {
        self.ctx.program.emit(instr);
    }

    fn register(&mut self) -> Reg {
        self.ctx.program.register()
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.statements {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Block(block) => self.block(block),
            StmtKind::Transaction { isolation, body } => {
                self.emit(Instr::BeginTransaction {
                    isolation: *isolation,
                });
                self.block(body)?;
                self.emit(Instr::PrecommitTransaction);
                Ok(())
            }
            StmtKind::Define { .. } | StmtKind::DefineTuple { .. } => Ok(()),
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.for_loop(init.as_deref(), cond.as_ref(), step.as_ref(), body),
            StmtKind::Jump(kind) => {
                let target = self.ctx.current_loop()?;
                let target = match kind {
                    JumpKind::Break => target.exit,
                    JumpKind::Continue => target.step,
                };
                self.emit(Instr::Jump { target });
                Ok(())
            }
            StmtKind::Emit(value) => {
                let row = match self.ctx.staging(stmt.id)? {
                    Staging::Emit { row } => row,
                    other => return Err(mismatched_staging(stmt, other)),
                };
                let layout = RowLayout::from_type(resolved(value)?)?;
                let src = self.expr(value)?;
                self.emit(Instr::Move { dst: row, src });
                self.emit(Instr::Emit { src: row, layout });
                Ok(())
            }
            StmtKind::Insert { table, value } => self.insert(stmt, table, value),
            StmtKind::Scan { table, body, .. } => self.scan(stmt, table, body),
            StmtKind::Let { value, .. } => {
                let src = self.expr(value)?;
                let dst = self.ctx.existing_slot(stmt.id)?;
                self.emit(Instr::Move { dst, src });
                Ok(())
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let then_label = self.ctx.program.label();
                let else_label = self.ctx.program.label();
                let end = self.ctx.program.label();

                let cond = self.condition(cond)?;
                self.emit(Instr::Branch {
                    cond,
                    then_target: then_label,
                    else_target: else_label,
                });

                self.ctx.program.bind(then_label)?;
                self.block(then_block)?;
                self.emit(Instr::Jump { target: end });

                self.ctx.program.bind(else_label)?;
                if let Some(else_block) = else_block {
                    self.block(else_block)?;
                }
                self.ctx.program.bind(end)
            }
            StmtKind::Expr(expr) => self.expr(expr).map(|_| ()),
        }
    }

    fn for_loop(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Block,
    ) -> Result<()> {
        if let Some(init) = init {
            self.statement(init)?;
        }

        let check = self.ctx.program.label();
        let body_label = self.ctx.program.label();
        let step_label = self.ctx.program.label();
        let exit = self.ctx.program.label();

        self.ctx.program.bind(check)?;
        if let Some(cond) = cond {
            let cond = self.condition(cond)?;
            self.emit(Instr::Branch {
                cond,
                then_target: body_label,
                else_target: exit,
            });
        }

        self.ctx.program.bind(body_label)?;
        self.ctx.push_loop(LoopContext {
            step: step_label,
            exit,
        });
        let result = self.block(body);
        self.ctx.pop_loop();
        result?;

        self.ctx.program.bind(step_label)?;
        if let Some(step) = step {
            self.expr(step)?;
        }
        self.emit(Instr::Jump { target: check });
        self.ctx.program.bind(exit)
    }

    fn insert(&mut self, stmt: &Stmt, table: &str, value: &Expr) -> Result<()> {
        let (row, tuple, key, value_buf) = match self.ctx.staging(stmt.id)? {
            Staging::Insert {
                row,
                tuple,
                key,
                value,
            } => (row, tuple, key, value),
            other => return Err(mismatched_staging(stmt, other)),
        };
        let schema = table_schema(self.ctx, table)?;

        let row_type = resolved(value)?;
        let fields = row_type.as_tuple().map_or(0, |t| t.len());
        if fields != schema.len() {
            return Err(Error::TupleSizeMismatch {
                expected: schema.len(),
                found: fields,
            });
        }
        let layout = RowLayout::from_type(row_type)?;

        let src = self.expr(value)?;
        self.emit(Instr::Move { dst: row, src });
        self.emit(Instr::StoreRow {
            src: row,
            buffer: tuple,
            layout,
        });

        let prefix = schema.key_prefix();
        let mut key_offset = prefix.len();
        let mut value_offset = 0;
        self.emit(Instr::WriteBytes {
            buffer: key,
            offset: 0,
            bytes: prefix,
        });

        for (i, attr) in schema.attributes().iter().enumerate() {
            let (dst, offset) = if attr.is_key() {
                (key, &mut key_offset)
            } else {
                (value_buf, &mut value_offset)
            };
            self.emit(Instr::CopyBytes {
                src: tuple,
                src_offset: i * WORD_SIZE,
                dst,
                dst_offset: *offset,
                len: WORD_SIZE,
            });
            *offset += WORD_SIZE;
        }

        self.emit(Instr::Insert {
            key,
            value: value_buf,
        });
        Ok(())
    }

    fn scan(&mut self, stmt: &Stmt, table: &str, body: &Block) -> Result<()> {
        let (key, value, cursor, valid) = match self.ctx.staging(stmt.id)? {
            Staging::Scan {
                key,
                value,
                cursor,
                valid,
            } => (key, value, cursor, valid),
            other => return Err(mismatched_staging(stmt, other)),
        };
        let schema = table_schema(self.ctx, table)?;
        let slot = self.ctx.existing_slot(stmt.id)?;

        let (from, to) = schema.key_range();
        self.emit(Instr::OpenCursor { cursor, from, to });

        let check = self.ctx.program.label();
        let body_label = self.ctx.program.label();
        let advance = self.ctx.program.label();
        let exit = self.ctx.program.label();

        self.ctx.program.bind(check)?;
        self.emit(Instr::CursorValid { dst: valid, cursor });
        self.emit(Instr::Branch {
            cond: valid,
            then_target: body_label,
            else_target: exit,
        });

        self.ctx.program.bind(body_label)?;
        self.emit(Instr::CursorCopyKey {
            cursor,
            buffer: key,
        });
        self.emit(Instr::CursorCopyValue {
            cursor,
            buffer: value,
        });

        let mut key_offset = schema.key_prefix().len();
        let mut value_offset = 0;
        let mut fields = Vec::with_capacity(schema.len());
        for attr in schema.attributes() {
            let (buffer, offset) = if attr.is_key() {
                (key, &mut key_offset)
            } else {
                (value, &mut value_offset)
            };
            let dst = self.register();
            self.emit(Instr::LoadInt {
                dst,
                buffer,
                offset: *offset,
            });
            *offset += WORD_SIZE;
            fields.push(dst);
        }
        self.emit(Instr::MakeTuple { dst: slot, fields });

        self.ctx.push_loop(LoopContext {
            step: advance,
            exit,
        });
        let result = self.block(body);
        self.ctx.pop_loop();
        result?;

        self.ctx.program.bind(advance)?;
        self.emit(Instr::CursorAdvance { cursor });
        self.emit(Instr::Jump { target: check });

        self.ctx.program.bind(exit)?;
        self.emit(Instr::CursorDestroy { cursor });
        Ok(())
    }

    /// Evaluate a condition into a boolean register
    fn condition(&mut self, cond: &Expr) -> Result<Reg> {
        let value = self.expr(cond)?;
        if resolved(cond)?.is_primary(PrimaryType::Bool) {
            return Ok(value);
        }
        let dst = self.register();
        self.emit(Instr::ToBool { dst, src: value });
        Ok(dst)
    }

    fn expr(&mut self, expr: &Expr) -> Result<Reg> {
        match &expr.kind {
            ExprKind::Primary(Primary::Literal(literal)) => {
                let dst = self.register();
                let value = match literal {
                    Literal::Integer(n) => Constant::Int(*n),
                    Literal::Double(n) => Constant::Double(*n),
                    Literal::String(s) => Constant::Str(s.clone()),
                };
                self.emit(Instr::LoadConst { dst, value });
                Ok(dst)
            }
            ExprKind::Primary(Primary::Nested(inner)) => self.expr(inner),
            ExprKind::Binary { op, lhs, rhs } if op.is_logical() => {
                self.short_circuit(*op, lhs, rhs)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                let dst = self.register();
                self.emit(Instr::Binary {
                    op: *op,
                    dst,
                    lhs,
                    rhs,
                });
                Ok(dst)
            }
            ExprKind::PointerOf(target) => self.expr(target),
            ExprKind::RowLiteral(items) => {
                let fields = items
                    .iter()
                    .map(|item| self.expr(item))
                    .collect::<Result<Vec<_>>>()?;
                let dst = self.register();
                self.emit(Instr::MakeTuple { dst, fields });
                Ok(dst)
            }
            ExprKind::ArrayLiteral(items) => {
                let elements = items
                    .iter()
                    .map(|item| self.expr(item))
                    .collect::<Result<Vec<_>>>()?;
                let dst = self.register();
                self.emit(Instr::MakeArray { dst, elements });
                Ok(dst)
            }
            ExprKind::VariableReference { binding, .. } => {
                let src = self.ctx.existing_slot(bound(expr, *binding)?)?;
                let dst = self.register();
                self.emit(Instr::Move { dst, src });
                Ok(dst)
            }
            ExprKind::FunctionCall { callee, args } => {
                let function = match &callee.kind {
                    ExprKind::VariableReference { name, .. } => self.ctx.lookup_function(name),
                    _ => None,
                }
                .ok_or_else(|| Error::UndefinedFunction(callee.to_string()))?;
                let args = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>>>()?;
                let dst = self.register();
                self.emit(Instr::Call {
                    dst,
                    function,
                    args,
                });
                Ok(dst)
            }
            ExprKind::ArrayReference { parent, index } => {
                let array = self.expr(parent)?;
                let index = self.expr(index)?;
                let dst = self.register();
                self.emit(Instr::GetIndex { dst, array, index });
                Ok(dst)
            }
            ExprKind::MemberReference { parent, index, .. } => {
                let index = index.ok_or_else(|| {
                    Error::Internal(format!("member reference {} was not analyzed", expr))
                })?;
                let src = self.expr(parent)?;
                let dst = self.register();
                self.emit(Instr::GetField { dst, src, index });
                Ok(dst)
            }
            ExprKind::Assign { target, value } => {
                let src = self.expr(value)?;
                let (root, path) = self.lvalue(target)?;
                self.emit(Instr::Store { root, path, src });
                Ok(src)
            }
        }
    }

    /// `&&` and `||` evaluate their right side only when it decides the result
    fn short_circuit(&mut self, op: BinaryOperator, lhs: &Expr, rhs: &Expr) -> Result<Reg> {
        let dst = self.register();
        let rhs_label = self.ctx.program.label();
        let end = self.ctx.program.label();

        let left = self.expr(lhs)?;
        self.emit(Instr::ToBool { dst, src: left });
        let (then_target, else_target) = match op {
            BinaryOperator::And => (rhs_label, end),
            _ => (end, rhs_label),
        };
        self.emit(Instr::Branch {
            cond: dst,
            then_target,
            else_target,
        });

        self.ctx.program.bind(rhs_label)?;
        let right = self.expr(rhs)?;
        self.emit(Instr::ToBool { dst, src: right });
        self.ctx.program.bind(end)?;
        Ok(dst)
    }

    /// Root register and path of an assignment target
    fn lvalue(&mut self, target: &Expr) -> Result<(Reg, Vec<PathStep>)> {
        match &target.kind {
            ExprKind::VariableReference { binding, .. } => {
                Ok((self.ctx.existing_slot(bound(target, *binding)?)?, Vec::new()))
            }
            ExprKind::Primary(Primary::Nested(inner)) => self.lvalue(inner),
            ExprKind::MemberReference { parent, index, .. } => {
                let index = index.ok_or_else(|| {
                    Error::Internal(format!("member reference {} was not analyzed", target))
                })?;
                let (root, mut path) = self.lvalue(parent)?;
                path.push(PathStep::Field(index));
                Ok((root, path))
            }
            ExprKind::ArrayReference { parent, index } => {
                let (root, mut path) = self.lvalue(parent)?;
                let index = self.expr(index)?;
                path.push(PathStep::Index(index));
                Ok((root, path))
            }
            _ => Err(Error::NotAssignable(target.to_string())),
        }
    }
}

fn resolved(expr: &Expr) -> Result<&Type> {
    expr.resolved_type
        .as_ref()
        .ok_or_else(|| Error::Internal(format!("expression {} was not analyzed", expr)))
}

fn bound(expr: &Expr, binding: Option<NodeId>) -> Result<NodeId> {
    binding.ok_or_else(|| Error::Internal(format!("variable {} was not analyzed", expr)))
}

fn mismatched_staging(stmt: &Stmt, staging: Staging) -> Error {
    Error::Internal(format!(
        "statement {} at {} has mismatched storage {:?}",
        stmt.id, stmt.pos, staging
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Attribute, Catalog, MemoryCatalog};
    use crate::compiler::analyze;
    use crate::lang::parse_program;

    fn compile(source: &str) -> Result<Program> {
        compile_with(source, &MemoryCatalog::new())
    }

    fn compile_with(source: &str, catalog: &MemoryCatalog) -> Result<Program> {
        let mut block = parse_program(source)?;
        let mut ctx = CompilerContext::new();
        analyze(&mut block, &mut ctx, catalog)?;
        generate(&block, &mut ctx)
    }

    fn count(program: &Program, pred: impl Fn(&Instr) -> bool) -> usize {
        program.instructions().iter().filter(|i| pred(i)).count()
    }

    #[test]
    fn test_program_ends_with_halt() {
        let program = compile("let x = 1").unwrap();
        assert_eq!(program.instructions().last(), Some(&Instr::Halt));
    }

    #[test]
    fn test_transaction_brackets_body() {
        let program = compile("transaction snapshot { let x = 1 }").unwrap();
        let instrs = program.instructions();
        assert!(matches!(
            instrs.first(),
            Some(Instr::BeginTransaction {
                isolation: crate::backend::Isolation::Snapshot
            })
        ));
        assert_eq!(instrs[instrs.len() - 2], Instr::PrecommitTransaction);
    }

    #[test]
    fn test_short_circuit_branches() {
        let program = compile("let x = 0; x && (x = 1)").unwrap();
        assert_eq!(count(&program, |i| matches!(i, Instr::Branch { .. })), 1);
        assert_eq!(count(&program, |i| matches!(i, Instr::ToBool { .. })), 2);
    }

    #[test]
    fn test_insert_layout() {
        let program = compile("define<{int:a key, int:b}> t\ninsert t {1, 2}").unwrap();
        assert_eq!(program.frame().buffers, vec![16, 10, 8]);

        let copies: Vec<_> = program
            .instructions()
            .iter()
            .filter_map(|i| match i {
                Instr::CopyBytes {
                    src_offset,
                    dst_offset,
                    ..
                } => Some((*src_offset, *dst_offset)),
                _ => None,
            })
            .collect();
        assert_eq!(copies, vec![(0, 2), (8, 0)]);
        assert!(program
            .instructions()
            .iter()
            .any(|i| matches!(i, Instr::WriteBytes { bytes, .. } if bytes == b"t:")));
    }

    #[test]
    fn test_insert_size_mismatch() {
        assert!(matches!(
            compile("define<{int:a key, int:b}> t\ninsert t {1}"),
            Err(Error::TupleSizeMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_scan_requires_integer_columns() {
        assert!(matches!(
            compile("define<{int:a key, string:b}> t\nscan t, row { emit row }"),
            Err(Error::UnsupportedColumn { .. })
        ));
        assert!(matches!(
            compile("define<{int:a key, int:b nullable}> t\ninsert t {1, 2}"),
            Err(Error::UnsupportedColumn { .. })
        ));
    }

    #[test]
    fn test_scan_from_catalog_table() {
        let catalog = MemoryCatalog::new();
        catalog
            .store_schema(&Schema::new(
                "t",
                vec![
                    Attribute::new("a", AttrType::Integer).key(true),
                    Attribute::new("b", AttrType::Integer),
                ],
            ))
            .unwrap();

        let program = compile_with("scan t, row { emit row }", &catalog).unwrap();
        assert_eq!(program.frame().cursors, 1);
        assert_eq!(count(&program, |i| matches!(i, Instr::LoadInt { .. })), 2);
        assert!(program.instructions().iter().any(|i| matches!(
            i,
            Instr::OpenCursor { from, to, .. } if from == b"t:" && to == b"t;"
        )));
        assert_eq!(
            count(&program, |i| matches!(i, Instr::CursorDestroy { .. })),
            1
        );
    }

    #[test]
    fn test_break_targets_loop_exit() {
        let program = compile("for let i = 0; i < 3; i = i + 1 { break }").unwrap();
        let jumps: Vec<_> = program
            .instructions()
            .iter()
            .filter_map(|i| match i {
                Instr::Jump { target } => Some(program.target(*target).unwrap()),
                _ => None,
            })
            .collect();
        // break, then the back edge to the condition
        assert_eq!(jumps.len(), 2);
        assert_eq!(jumps[0], program.len() - 1);
    }

    #[test]
    fn test_rebinding_gets_new_register() {
        let program = compile("let x = 1; let x = \"a\"").unwrap();
        let targets: Vec<_> = program
            .instructions()
            .iter()
            .filter_map(|i| match i {
                Instr::Move { dst, .. } => Some(*dst),
                _ => None,
            })
            .collect();
        assert_eq!(targets.len(), 2);
        assert_ne!(targets[0], targets[1]);
    }

    #[test]
    fn test_emit_rejects_arrays() {
        assert!(matches!(
            compile("let a = [1]; emit {a}"),
            Err(Error::UnsupportedLayout(_))
        ));
    }
}
