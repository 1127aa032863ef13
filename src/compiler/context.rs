//! Compiler context
//!
//! One context lives for one compilation. Analysis fills the symbol tables
//! (named types, variables, tables); code generation reserves storage keyed
//! by statement id and accumulates instructions in the program builder.
//! Every `let` and every `scan` row binding gets its own register, so a later
//! binding of the same name never changes what earlier references read.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::builtins::Builtin;
use super::program::{BufferId, CursorId, Label, ProgramBuilder, Reg};
use crate::catalog::Schema;
use crate::error::{Error, Result};
use crate::lang::{NodeId, PrimaryType, Type};

/// Jump targets of the innermost loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopContext {
    /// Target of `continue`
    pub step: Label,
    /// Target of `break`
    pub exit: Label,
}

/// A bound variable
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub ty: Type,
    /// The `let` or `scan` statement that bound it
    pub binding: NodeId,
}

/// Storage reserved for one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staging {
    Emit {
        row: Reg,
    },
    Insert {
        row: Reg,
        tuple: BufferId,
        key: BufferId,
        value: BufferId,
    },
    Scan {
        key: BufferId,
        value: BufferId,
        cursor: CursorId,
        valid: Reg,
    },
}

/// State shared by analysis and code generation
#[derive(Debug)]
pub struct CompilerContext {
    types: IndexMap<String, Type>,
    variables: IndexMap<String, Variable>,
    /// Tables referenced by this compilation, local or from the catalog
    tables: IndexMap<String, Schema>,
    /// Tables defined by this compilation, in definition order
    defined: Vec<String>,

    /// Variable registers by binding statement
    slots: HashMap<NodeId, Reg>,
    staging: HashMap<NodeId, Staging>,
    loops: Vec<LoopContext>,
    pub(crate) program: ProgramBuilder,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerContext {
    pub fn new() -> Self {
        let types = [
            PrimaryType::Integer,
            PrimaryType::Double,
            PrimaryType::String,
            PrimaryType::Date,
            PrimaryType::Bool,
        ]
        .into_iter()
        .map(|p| (p.to_string(), Type::Primary(p)))
        .collect();

        Self {
            types,
            variables: IndexMap::new(),
            tables: IndexMap::new(),
            defined: Vec::new(),
            slots: HashMap::new(),
            staging: HashMap::new(),
            loops: Vec::new(),
            program: ProgramBuilder::new(),
        }
    }

    // ========== Symbols ==========

    pub fn lookup_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    pub fn define_type(&mut self, name: impl Into<String>, ty: Type) {
        self.types.insert(name.into(), ty);
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Bind a variable, replacing any earlier binding of the name
    pub fn bind_variable(&mut self, name: impl Into<String>, ty: Type, binding: NodeId) {
        self.variables.insert(name.into(), Variable { ty, binding });
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), &v.ty))
    }

    pub fn lookup_function(&self, name: &str) -> Option<Builtin> {
        Builtin::from_name(name)
    }

    // ========== Tables ==========

    pub fn table(&self, name: &str) -> Option<&Schema> {
        self.tables.get(name)
    }

    /// Register a table defined by this compilation
    pub fn define_table(&mut self, schema: Schema) {
        let name = schema.name().to_string();
        if !self.defined.contains(&name) {
            self.defined.push(name.clone());
        }
        self.tables.insert(name, schema);
    }

    /// Remember a table resolved from the catalog
    pub fn import_table(&mut self, schema: Schema) {
        self.tables.insert(schema.name().to_string(), schema);
    }

    /// Schemas defined by this compilation, in definition order
    pub fn defined_tables(&self) -> impl Iterator<Item = &Schema> {
        self.defined.iter().filter_map(|name| self.tables.get(name))
    }

    // ========== Storage ==========

    /// Register of the variable bound by a statement, reserved on first use
    pub fn slot(&mut self, binding: NodeId) -> Reg {
        if let Some(reg) = self.slots.get(&binding) {
            return *reg;
        }
        let reg = self.program.register();
        self.slots.insert(binding, reg);
        reg
    }

    pub fn existing_slot(&self, binding: NodeId) -> Result<Reg> {
        self.slots.get(&binding).copied().ok_or_else(|| {
            Error::Internal(format!("no register reserved for statement {}", binding))
        })
    }

    pub fn reserve(&mut self, id: NodeId, staging: Staging) {
        self.staging.insert(id, staging);
    }

    pub fn staging(&self, id: NodeId) -> Result<Staging> {
        self.staging
            .get(&id)
            .copied()
            .ok_or_else(|| Error::Internal(format!("no storage reserved for statement {}", id)))
    }

    // ========== Loops ==========

    pub fn push_loop(&mut self, ctx: LoopContext) {
        self.loops.push(ctx);
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    /// The innermost loop
    pub fn current_loop(&self) -> Result<LoopContext> {
        self.loops
            .last()
            .copied()
            .ok_or_else(|| Error::Internal("jump outside of a loop".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttrType, Attribute};

    #[test]
    fn test_seeded_symbols() {
        let ctx = CompilerContext::new();
        assert_eq!(ctx.lookup_type("int"), Some(&Type::integer()));
        assert_eq!(ctx.lookup_function("print_int"), Some(Builtin::PrintInt));
        assert!(ctx.lookup_variable("x").is_none());
    }

    #[test]
    fn test_slots_are_stable() {
        let mut ctx = CompilerContext::new();
        let x = ctx.slot(1);
        let y = ctx.slot(2);
        assert_ne!(x, y);
        assert_eq!(ctx.slot(1), x);
        assert_eq!(ctx.existing_slot(2).unwrap(), y);
        assert!(ctx.existing_slot(3).is_err());
    }

    #[test]
    fn test_rebinding_keeps_latest() {
        let mut ctx = CompilerContext::new();
        ctx.bind_variable("x", Type::integer(), 1);
        ctx.bind_variable("x", Type::string(), 4);
        let x = ctx.lookup_variable("x").unwrap();
        assert_eq!(x.ty, Type::string());
        assert_eq!(x.binding, 4);
        assert_eq!(ctx.variables().count(), 1);
    }

    #[test]
    fn test_defined_tables() {
        let mut ctx = CompilerContext::new();
        let t = Schema::new("t", vec![Attribute::new("a", AttrType::Integer)]);
        let u = Schema::new("u", vec![Attribute::new("a", AttrType::Integer)]);
        ctx.import_table(u);
        ctx.define_table(t.clone());
        ctx.define_table(t);

        let defined: Vec<_> = ctx.defined_tables().map(Schema::name).collect();
        assert_eq!(defined, vec!["t"]);
        assert!(ctx.table("u").is_some());
    }

    #[test]
    fn test_loop_stack() {
        let mut ctx = CompilerContext::new();
        assert!(ctx.current_loop().is_err());
        let outer = LoopContext {
            step: Label(0),
            exit: Label(1),
        };
        let inner = LoopContext {
            step: Label(2),
            exit: Label(3),
        };
        ctx.push_loop(outer);
        ctx.push_loop(inner);
        assert_eq!(ctx.current_loop().unwrap(), inner);
        ctx.pop_loop();
        assert_eq!(ctx.current_loop().unwrap(), outer);
    }
}
