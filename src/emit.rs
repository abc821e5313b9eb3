use std::path::Path;

use inkwell::{
    module::Module,
    targets::{
        CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
        TargetTriple,
    },
    OptimizationLevel,
};

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("failed to initialize native target: {0}")]
    Initialize(String),
    #[error("unknown target {triple}: {message}")]
    UnknownTarget { triple: String, message: String },
    #[error("could not create a target machine for {0}")]
    TargetMachine(String),
    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },
}

fn triple_name(triple: &TargetTriple) -> String {
    triple.as_str().to_string_lossy().into_owned()
}

/// Writes finished modules out as relocatable object files for the host.
pub struct ObjectEmitter {
    machine: TargetMachine,
}

impl ObjectEmitter {
    pub fn native() -> Result<Self, EmitError> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(EmitError::Initialize)?;

        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple).map_err(|e| EmitError::UnknownTarget {
            triple: triple_name(&triple),
            message: e.to_string(),
        })?;

        // PIC so the object links into position independent executables
        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                OptimizationLevel::Default,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| EmitError::TargetMachine(triple_name(&triple)))?;

        Ok(ObjectEmitter { machine })
    }

    pub fn triple(&self) -> String {
        triple_name(&self.machine.get_triple())
    }

    pub fn emit(&self, module: &Module, path: &Path) -> Result<(), EmitError> {
        module.set_triple(&self.machine.get_triple());
        module.set_data_layout(&self.machine.get_target_data().get_data_layout());

        self.machine
            .write_to_file(module, FileType::Object, path)
            .map_err(|e| EmitError::Write {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}
