use std::collections::HashMap;

use inkwell::{
    builder::Builder,
    context::Context,
    module::{Linkage, Module},
    types::BasicMetadataTypeEnum,
    values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue, InstructionOpcode, IntValue},
    IntPredicate,
};

use crate::ast::{ASTNode, Expression, Function, Prototype};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CodegenError {
    #[error("unknown variable name {0}")]
    UnknownVariable(String),
    #[error("invalid binary operator {0}")]
    InvalidOperator(char),
    #[error("unknown function referenced {0}")]
    UnknownFunction(String),
    #[error("incorrect number of arguments passed to {callee}: expected {expected}, found {found}")]
    IncorrectArgumentCount {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("{name} was declared with {expected} parameters but defined with {found}")]
    SignatureMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("function {0} cannot be redefined")]
    Redefinition(String),
    #[error("call to {0} produced no value")]
    VoidCall(String),
    #[error("failed to verify function {0}")]
    InvalidFunction(String),
}

/// Parameter name to value, live only while one function body is generated.
pub type SymbolTable<'ctx> = HashMap<String, IntValue<'ctx>>;

pub struct Codegen<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub named_values: SymbolTable<'ctx>,
}

impl<'ctx> Codegen<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Codegen<'ctx> {
        let module = context.create_module(module_name);
        let builder = context.create_builder();

        Codegen {
            context,
            module,
            builder,
            named_values: HashMap::new(),
        }
    }

    fn compile_expr(&mut self, expr: &Expression) -> Result<IntValue<'ctx>, CodegenError> {
        match expr {
            Expression::Literal(value) => Ok(self
                .context
                .i32_type()
                .const_int(*value as i32 as u64, true)),
            Expression::Variable(name) => match self.named_values.get(name) {
                Some(var) => Ok(*var),
                None => Err(CodegenError::UnknownVariable(name.clone())),
            },
            Expression::Binary(op, left, right) => {
                let lhs = self.compile_expr(left)?;
                let rhs = self.compile_expr(right)?;

                match op {
                    '+' => Ok(self.builder.build_int_add(lhs, rhs, "addtmp")),
                    '-' => Ok(self.builder.build_int_sub(lhs, rhs, "subtmp")),
                    '*' => Ok(self.builder.build_int_mul(lhs, rhs, "multmp")),
                    '<' => {
                        let cmp =
                            self.builder
                                .build_int_compare(IntPredicate::ULT, lhs, rhs, "cmptmp");
                        Ok(self
                            .builder
                            .build_int_z_extend(cmp, self.context.i32_type(), "booltmp"))
                    }
                    _ => Err(CodegenError::InvalidOperator(*op)),
                }
            }
            Expression::Call(callee, args) => {
                let func = self
                    .module
                    .get_function(callee)
                    .ok_or_else(|| CodegenError::UnknownFunction(callee.clone()))?;

                let expected = func.count_params() as usize;
                if expected != args.len() {
                    return Err(CodegenError::IncorrectArgumentCount {
                        callee: callee.clone(),
                        expected,
                        found: args.len(),
                    });
                }

                let mut argsv: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
                for arg in args {
                    argsv.push(self.compile_expr(arg)?.into());
                }

                self.builder
                    .build_call(func, argsv.as_slice(), "calltmp")
                    .try_as_basic_value()
                    .left()
                    .map(|value| value.into_int_value())
                    .ok_or_else(|| CodegenError::VoidCall(callee.clone()))
            }
        }
    }

    /// Declare `proto` in the module, or hand back the existing declaration of
    /// the same name.
    pub fn compile_proto(&self, proto: &Prototype) -> Result<FunctionValue<'ctx>, CodegenError> {
        if let Some(existing) = self.module.get_function(&proto.name) {
            let expected = existing.count_params() as usize;
            if expected != proto.args.len() {
                return Err(CodegenError::SignatureMismatch {
                    name: proto.name.clone(),
                    expected,
                    found: proto.args.len(),
                });
            }
            return Ok(existing);
        }

        let args_types = std::iter::repeat(self.context.i32_type())
            .take(proto.args.len())
            .map(|i| i.into())
            .collect::<Vec<BasicMetadataTypeEnum>>();

        let fn_type = self.context.i32_type().fn_type(&args_types, false);
        let fn_val = self
            .module
            .add_function(&proto.name, fn_type, Some(Linkage::External));

        for (arg, name) in fn_val.get_param_iter().zip(&proto.args) {
            arg.into_int_value().set_name(name);
        }

        Ok(fn_val)
    }

    pub fn compile_fn(&mut self, function: &Function) -> Result<FunctionValue<'ctx>, CodegenError> {
        let Function {
            prototype: proto,
            body,
        } = function;

        let declared = match self.module.get_function(&proto.name) {
            Some(existing) if existing.count_basic_blocks() > 0 => {
                return Err(CodegenError::Redefinition(proto.name.clone()));
            }
            Some(_) => true,
            None => false,
        };
        let llvm_func = self.compile_proto(proto)?;

        let entry = self.context.append_basic_block(llvm_func, "entry");
        self.builder.position_at_end(entry);

        self.named_values.clear();
        self.named_values.reserve(proto.args.len());
        for (arg, name) in llvm_func.get_param_iter().zip(&proto.args) {
            let arg = arg.into_int_value();
            // an earlier extern may have named the parameters differently
            arg.set_name(name);
            self.named_values.insert(name.clone(), arg);
        }

        let result = self.compile_expr(body).and_then(|body| {
            self.builder.build_return(Some(&body));

            if llvm_func.verify(true) {
                Ok(llvm_func)
            } else {
                Err(CodegenError::InvalidFunction(proto.name.clone()))
            }
        });
        self.named_values.clear();

        if result.is_err() {
            // an earlier extern declaration keeps its callers; drop only the body
            unsafe {
                if declared {
                    let _ = entry.delete();
                } else {
                    llvm_func.delete();
                }
            }
        }

        result
    }

    pub fn compile_node(&mut self, node: &ASTNode) -> Result<FunctionValue<'ctx>, CodegenError> {
        match node {
            ASTNode::Extern(proto) => self.compile_proto(proto),
            ASTNode::Function(func) | ASTNode::Expression(func) => self.compile_fn(func),
        }
    }

    /// Name of the first function that is called somewhere in the module but
    /// has no body.
    pub fn undefined_callee(&self) -> Option<String> {
        for func in self.module.get_functions() {
            for block in func.get_basic_blocks() {
                let mut next = block.get_first_instruction();
                while let Some(instr) = next {
                    next = instr.get_next_instruction();
                    if instr.get_opcode() != InstructionOpcode::Call {
                        continue;
                    }

                    // the callee is the last operand of a call
                    let callee = instr
                        .get_num_operands()
                        .checked_sub(1)
                        .and_then(|i| instr.get_operand(i))
                        .and_then(|operand| operand.left());
                    if let Some(BasicValueEnum::PointerValue(ptr)) = callee {
                        let name = ptr.get_name().to_string_lossy().into_owned();
                        let undefined = self
                            .module
                            .get_function(&name)
                            .map_or(false, |f| f.count_basic_blocks() == 0);
                        if undefined {
                            return Some(name);
                        }
                    }
                }
            }
        }
        None
    }

    /// Drop `name` from the module if present; returns whether it was there.
    pub fn remove_function(&mut self, name: &str) -> bool {
        match self.module.get_function(name) {
            Some(func) => {
                unsafe {
                    func.delete();
                }
                true
            }
            None => false,
        }
    }

    pub fn print_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }
}
