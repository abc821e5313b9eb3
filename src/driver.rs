use inkwell::{
    context::Context,
    execution_engine::{FunctionLookupError, JitFunction},
    values::AnyValue,
    OptimizationLevel,
};

use crate::ast::ASTNode;
use crate::codegen::{Codegen, CodegenError};
use crate::parser::{ParseError, Parser};

type EntryFunc = unsafe extern "C" fn() -> i32;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error("failed to create execution engine: {0}")]
    Jit(String),
    #[error(transparent)]
    Lookup(#[from] FunctionLookupError),
    #[error("cannot evaluate: {0} is declared but never defined")]
    Unresolved(String),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Options {
    /// Print the IR of every generated function
    pub print_ir: bool,
    /// JIT-evaluate top-level expressions
    pub evaluate: bool,
}

/// Result of handling one top-level form.
#[derive(Debug, PartialEq, Clone)]
pub enum Outcome {
    Defined(String),
    Declared(String),
    /// A top-level expression; carries its value when evaluation is enabled
    Evaluated(Option<i32>),
}

pub struct Driver<'ctx> {
    pub codegen: Codegen<'ctx>,
    options: Options,
}

impl<'ctx> Driver<'ctx> {
    pub fn new(context: &'ctx Context, options: Options) -> Self {
        Driver {
            codegen: Codegen::new(context, "toyc"),
            options,
        }
    }

    /// Compile every top-level form in `source` into the module.
    ///
    /// Each form fails on its own: a parse error drops one token (see
    /// [`Parser::synchronize`]) and parsing resumes with whatever follows.
    pub fn run(&mut self, source: &str) -> Vec<Result<Outcome, DriverError>> {
        let mut parser = Parser::new(source);
        let mut results = Vec::new();

        loop {
            let result = match parser.parse_top_level() {
                Ok(None) => break,
                Ok(Some(node)) => self.handle(&node),
                Err(err) => {
                    parser.synchronize();
                    Err(err.into())
                }
            };

            match &result {
                Ok(outcome) => report(outcome),
                Err(err) => eprintln!("error: {}", err),
            }
            results.push(result);
        }

        results
    }

    pub fn handle(&mut self, node: &ASTNode) -> Result<Outcome, DriverError> {
        let function = self.codegen.compile_node(node)?;

        if self.options.print_ir {
            println!("{}", function.print_to_string().to_string());
        }

        match node {
            ASTNode::Extern(_) => Ok(Outcome::Declared(node.name().to_string())),
            ASTNode::Function(_) => Ok(Outcome::Defined(node.name().to_string())),
            ASTNode::Expression(_) => {
                let value = if self.options.evaluate {
                    self.evaluate(node.name()).map(Some)
                } else {
                    Ok(None)
                };
                // the wrapper never outlives its own evaluation
                self.codegen.remove_function(node.name());
                value.map(Outcome::Evaluated)
            }
        }
    }

    /// JIT-compile a copy of the current module and call the zero-argument
    /// function `name`.
    pub fn evaluate(&self, name: &str) -> Result<i32, DriverError> {
        // the JIT aborts the process on symbols it cannot resolve
        if let Some(callee) = self.codegen.undefined_callee() {
            return Err(DriverError::Unresolved(callee));
        }

        let module = self.codegen.module.clone();
        let ee = module
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| DriverError::Jit(e.to_string()))?;

        let entry: JitFunction<EntryFunc> = unsafe { ee.get_function(name) }?;

        Ok(unsafe { entry.call() })
    }
}

fn report(outcome: &Outcome) {
    match outcome {
        Outcome::Defined(name) => println!("Read function definition: {}", name),
        Outcome::Declared(name) => println!("Read extern: {}", name),
        Outcome::Evaluated(Some(value)) => println!("Evaluated to {}", value),
        Outcome::Evaluated(None) => println!("Read top-level expression"),
    }
}
