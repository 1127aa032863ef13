//! Type analysis
//!
//! Walks the parsed program once, fills in the resolved type of every
//! expression and the member index of every member reference, and rejects
//! ill-typed programs before any code is generated.

use tracing::debug;

use super::context::CompilerContext;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::lang::{
    BinaryOperator, Block, Expr, ExprKind, Literal, PrimaryType, Primary, Stmt, StmtKind,
    TupleField, TupleType, Type, TypeExpr,
};

/// Analyze a parsed program in place
pub fn analyze(block: &mut Block, ctx: &mut CompilerContext, catalog: &dyn Catalog) -> Result<()> {
    let mut analyzer = Analyzer {
        ctx,
        catalog,
        loop_depth: 0,
        in_transaction: false,
    };
    analyzer.block(block)?;
    debug!(
        statements = block.len(),
        variables = analyzer.ctx.variables().count(),
        "analysis finished"
    );
    Ok(())
}

struct Analyzer<'a> {
    ctx: &'a mut CompilerContext,
    catalog: &'a dyn Catalog,
    /// Loops enclosing the current statement inside the current transaction
    loop_depth: usize,
    in_transaction: bool,
}

impl Analyzer<'_> {
    fn block(&mut self, block: &mut Block) -> Result<()> {
        for stmt in &mut block.statements {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn looped(&mut self, body: &mut Block) -> Result<()> {
        self.loop_depth += 1;
        let result = self.block(body);
        self.loop_depth -= 1;
        result
    }

    fn statement(&mut self, stmt: &mut Stmt) -> Result<()> {
        let id = stmt.id;
        match &mut stmt.kind {
            StmtKind::Block(block) => self.block(block),
            StmtKind::Transaction { body, .. } => {
                if self.in_transaction {
                    return Err(Error::NestedTransaction);
                }
                // Jumps may not leave the transaction
                let outer_depth = std::mem::replace(&mut self.loop_depth, 0);
                self.in_transaction = true;
                let result = self.block(body);
                self.in_transaction = false;
                self.loop_depth = outer_depth;
                result
            }
            StmtKind::Define { ty, name } => {
                let ty = self.resolve_type(ty)?;
                let schema = ty.to_schema(name)?;
                self.ctx.define_type(name.clone(), ty);
                self.ctx.define_table(schema);
                Ok(())
            }
            StmtKind::DefineTuple { name, ty } => {
                let ty = self.resolve_type(ty)?;
                self.ctx.define_type(name.clone(), ty);
                Ok(())
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.statement(init)?;
                }
                if let Some(cond) = cond {
                    self.condition(cond)?;
                }
                if let Some(step) = step {
                    self.expr(step)?;
                }
                self.looped(body)
            }
            StmtKind::Jump(kind) => {
                if self.loop_depth == 0 {
                    return Err(Error::JumpOutsideLoop(kind.to_string()));
                }
                Ok(())
            }
            StmtKind::Emit(value) => {
                let ty = self.expr(value)?;
                expect_tuple(&ty, "emitted")?;
                Ok(())
            }
            StmtKind::Insert { table, value } => {
                let row = Type::from_schema(&self.resolve_table(table)?)?;
                let ty = self.expr(value)?;
                let fields = expect_tuple(&ty, "inserted")?;
                // A size mismatch is reported by code generation
                if let Some(columns) = row.as_tuple().filter(|c| c.len() == fields.len()) {
                    for (field, column) in fields.fields.iter().zip(&columns.fields) {
                        if !field.ty.assignable_to(&column.ty) {
                            return Err(Error::TypeMismatch {
                                from: field.ty.to_string(),
                                to: format!("{}.{} ({})", table, column.name, column.ty),
                            });
                        }
                    }
                }
                Ok(())
            }
            StmtKind::Scan {
                table,
                binding,
                body,
            } => {
                let row = Type::from_schema(&self.resolve_table(table)?)?;
                self.ctx.bind_variable(binding.clone(), row, id);
                self.looped(body)
            }
            StmtKind::Let {
                name,
                value,
                declared,
            } => {
                let ty = self.expr(value)?;
                let ty = match declared {
                    Some(declared) => {
                        let declared = self.resolve_type(declared)?;
                        if !ty.assignable_to(&declared) {
                            return Err(Error::TypeMismatch {
                                from: ty.to_string(),
                                to: declared.to_string(),
                            });
                        }
                        declared
                    }
                    None => ty,
                };
                self.ctx.bind_variable(name.clone(), ty, id);
                Ok(())
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.condition(cond)?;
                self.block(then_block)?;
                if let Some(else_block) = else_block {
                    self.block(else_block)?;
                }
                Ok(())
            }
            StmtKind::Expr(expr) => self.expr(expr).map(|_| ()),
        }
    }

    fn condition(&mut self, cond: &mut Expr) -> Result<()> {
        let ty = self.expr(cond)?;
        if ty.is_primary(PrimaryType::Bool) || ty.is_primary(PrimaryType::Integer) {
            Ok(())
        } else {
            Err(Error::InvalidCondition(ty.to_string()))
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> Result<Type> {
        let ty = self.expr_kind(&mut expr.kind)?;
        expr.resolved_type = Some(ty.clone());
        Ok(ty)
    }

    fn expr_kind(&mut self, kind: &mut ExprKind) -> Result<Type> {
        match kind {
            ExprKind::Primary(Primary::Literal(literal)) => Ok(match literal {
                Literal::Integer(_) => Type::integer(),
                Literal::Double(_) => Type::double(),
                Literal::String(_) => Type::string(),
            }),
            ExprKind::Primary(Primary::Nested(inner)) => self.expr(inner),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                binary_result(*op, &lhs, &rhs)
            }
            ExprKind::PointerOf(target) => {
                if !target.is_lvalue() {
                    return Err(Error::NotAssignable(format!("&{}", target)));
                }
                self.expr(target)
            }
            ExprKind::RowLiteral(items) => {
                let fields = items
                    .iter_mut()
                    .map(|item| self.expr(item).map(TupleField::anonymous))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Type::Tuple(TupleType::new(fields)))
            }
            ExprKind::ArrayLiteral(items) => {
                let mut types = items
                    .iter_mut()
                    .map(|item| self.expr(item))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter();
                let first = types.next().ok_or(Error::EmptyArrayLiteral)?;
                if let Some(other) = types.find(|t| t != &first) {
                    return Err(Error::TypeMismatch {
                        from: other.to_string(),
                        to: first.to_string(),
                    });
                }
                Ok(Type::array(first))
            }
            ExprKind::VariableReference { name, binding } => {
                let variable = self
                    .ctx
                    .lookup_variable(name)
                    .ok_or_else(|| Error::UndefinedVariable(name.clone()))?;
                *binding = Some(variable.binding);
                Ok(variable.ty.clone())
            }
            ExprKind::FunctionCall { callee, args } => {
                let function = match &callee.kind {
                    ExprKind::VariableReference { name, .. } => self.ctx.lookup_function(name),
                    _ => None,
                }
                .ok_or_else(|| Error::UndefinedFunction(callee.to_string()))?;

                let types = args
                    .iter_mut()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>>>()?;
                function.check_arguments(&types)?;
                Ok(function.return_type())
            }
            ExprKind::ArrayReference { parent, index } => {
                let parent = self.expr(parent)?;
                let elem = match parent {
                    Type::Array(elem) => *elem,
                    other => return Err(Error::NotAnArray(other.to_string())),
                };
                let index = self.expr(index)?;
                if !index.is_primary(PrimaryType::Integer) {
                    return Err(Error::TypeMismatch {
                        from: index.to_string(),
                        to: Type::integer().to_string(),
                    });
                }
                Ok(elem)
            }
            ExprKind::MemberReference {
                parent,
                name,
                index,
            } => {
                let parent = self.expr(parent)?;
                let tuple = parent
                    .as_tuple()
                    .ok_or_else(|| Error::NotATuple(parent.to_string()))?;
                let position = tuple.index_of(name).ok_or_else(|| Error::MemberNotFound {
                    member: name.clone(),
                    ty: parent.to_string(),
                })?;
                *index = Some(position);
                Ok(tuple.fields[position].ty.clone())
            }
            ExprKind::Assign { target, value } => {
                if !target.is_lvalue() {
                    return Err(Error::NotAssignable(target.to_string()));
                }
                let target = self.expr(target)?;
                let value = self.expr(value)?;
                if !value.assignable_to(&target) {
                    return Err(Error::TypeMismatch {
                        from: value.to_string(),
                        to: target.to_string(),
                    });
                }
                Ok(value)
            }
        }
    }

    fn resolve_type(&self, ty: &TypeExpr) -> Result<Type> {
        match ty {
            TypeExpr::Named(name) => self
                .ctx
                .lookup_type(name)
                .cloned()
                .ok_or_else(|| Error::UndefinedType(name.clone())),
            TypeExpr::Array(elem) => Ok(Type::array(self.resolve_type(elem)?)),
            TypeExpr::Tuple(decls) => {
                let fields = decls
                    .iter()
                    .map(|decl| {
                        let ty = self
                            .ctx
                            .lookup_type(&decl.type_name)
                            .cloned()
                            .ok_or_else(|| Error::UndefinedType(decl.type_name.clone()))?;
                        Ok(TupleField {
                            name: decl.name.clone(),
                            ty,
                            props: decl.props,
                            size: decl.size,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Type::Tuple(TupleType::new(fields)))
            }
        }
    }

    /// Local definitions first, then the catalog
    fn resolve_table(&mut self, name: &str) -> Result<crate::catalog::Schema> {
        if let Some(schema) = self.ctx.table(name) {
            return Ok(schema.clone());
        }
        match self.catalog.load_schema(name) {
            Ok(schema) => {
                debug!(table = name, "table resolved from catalog");
                self.ctx.import_table(schema.clone());
                Ok(schema)
            }
            Err(Error::TableNotFound(_)) => Err(Error::UndefinedTable(name.to_string())),
            Err(e) => Err(e),
        }
    }
}

fn expect_tuple<'t>(ty: &'t Type, action: &str) -> Result<&'t TupleType> {
    ty.as_tuple().ok_or_else(|| Error::NotATupleValue {
        action: action.to_string(),
        ty: ty.to_string(),
    })
}

/// Result type of a binary operator
fn binary_result(op: BinaryOperator, lhs: &Type, rhs: &Type) -> Result<Type> {
    let unsupported = |ty: &Type| Error::UnsupportedOperator {
        op: op.to_string(),
        ty: ty.to_string(),
    };

    let (l, r) = match (lhs.primary(), rhs.primary()) {
        (Some(l), Some(r)) => (l, r),
        (None, _) => return Err(unsupported(lhs)),
        (_, None) => return Err(unsupported(rhs)),
    };
    if l != r {
        return Err(Error::OperandMismatch {
            op: op.to_string(),
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        });
    }

    match l {
        PrimaryType::Integer | PrimaryType::Double if op.is_arithmetic() => Ok(lhs.clone()),
        PrimaryType::Integer | PrimaryType::Double | PrimaryType::String
            if op.is_comparison() =>
        {
            Ok(Type::bool())
        }
        PrimaryType::Integer | PrimaryType::Bool if op.is_logical() => Ok(Type::bool()),
        PrimaryType::String if op == BinaryOperator::Add => Ok(Type::string()),
        PrimaryType::Bool if matches!(op, BinaryOperator::Eq | BinaryOperator::NotEq) => {
            Ok(Type::bool())
        }
        _ => Err(unsupported(lhs)),
    }
}
