//! Compiler driver
//!
//! Parse, analyze, generate, persist defined schemas, execute. Any failure
//! stops the pipeline and nothing emitted so far is returned.

use tracing::{debug, info};

use crate::backend::Backend;
use crate::catalog::{Catalog, Schema};
use crate::compiler::{analyze, generate, CompilerContext, Program};
use crate::config::DriverConfig;
use crate::error::Result;
use crate::executor::{EmittedRow, Execution, Executor};
use crate::lang::{parse_program, Block};

/// Output of compiling one program
#[derive(Debug)]
pub struct Compilation {
    /// The analyzed program
    pub ast: Block,
    pub program: Program,
    /// Tables defined by the program, in definition order
    pub defined: Vec<Schema>,
}

/// Compiles and runs programs with one configuration
#[derive(Debug, Clone, Default)]
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Compile a program, resolving tables it does not define from the catalog
    pub fn compile(&self, source: &str, catalog: &dyn Catalog) -> Result<Compilation> {
        let mut ast = parse_program(source)?;
        let mut ctx = CompilerContext::new();
        analyze(&mut ast, &mut ctx, catalog)?;
        let program = generate(&ast, &mut ctx)?;
        let defined = ctx.defined_tables().cloned().collect();

        Ok(Compilation {
            ast,
            program,
            defined,
        })
    }

    /// Compile and run a program
    pub fn run<B: Backend>(
        &self,
        source: &str,
        backend: &mut B,
        catalog: &dyn Catalog,
    ) -> Result<Execution> {
        let compilation = self.compile(source, catalog)?;

        if self.config.persist_schemas {
            for schema in &compilation.defined {
                catalog.store_schema(schema)?;
            }
        } else if !compilation.defined.is_empty() {
            info!(
                tables = compilation.defined.len(),
                "schema persistence disabled"
            );
        }

        self.execute(&compilation.program, backend)
    }

    /// Run an already compiled program
    pub fn execute<B: Backend>(&self, program: &Program, backend: &mut B) -> Result<Execution> {
        debug!(instructions = program.len(), "executing program");
        Executor::new(backend)
            .with_seed(self.config.rand_seed)
            .with_max_steps(self.config.max_steps)
            .run(program)
    }
}

/// Compile and run a program with the default configuration
pub fn compile_and_run<B: Backend>(
    source: &str,
    backend: &mut B,
    catalog: &dyn Catalog,
) -> Result<Vec<EmittedRow>> {
    Ok(Driver::default().run(source, backend, catalog)?.rows)
}
