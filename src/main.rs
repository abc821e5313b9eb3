mod ast;
mod codegen;
mod driver;
mod emit;
mod lexer;
mod parser;

use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use anyhow::Context as _;
use clap::{App, Arg};
use driver::{Driver, Options};
use emit::ObjectEmitter;
use inkwell::context::Context;

fn read_source(input: Option<&str>) -> anyhow::Result<String> {
    match input {
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {}", path)),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("failed to read standard input")?;
            Ok(source)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let matches = App::new("toyc")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("INPUT")
                .help("source file to compile, standard input if omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("FILE")
                .default_value("output.o")
                .help("where to write the object file"),
        )
        .arg(
            Arg::with_name("print-ir")
                .long("print-ir")
                .help("print the IR of each form and of the final module"),
        )
        .arg(
            Arg::with_name("eval")
                .long("eval")
                .help("JIT-evaluate top-level expressions"),
        )
        .arg(
            Arg::with_name("no-emit")
                .long("no-emit")
                .help("do not write an object file"),
        )
        .get_matches();

    let options = Options {
        print_ir: matches.is_present("print-ir"),
        evaluate: matches.is_present("eval"),
    };
    let source = read_source(matches.value_of("INPUT"))?;

    let context = Context::create();
    let mut driver = Driver::new(&context, options);
    let results = driver.run(&source);
    let failed = results.iter().filter(|result| result.is_err()).count();

    if options.print_ir {
        println!("IR:");
        println!("{}", driver.codegen.print_ir());
    }

    if !matches.is_present("no-emit") {
        let output = matches.value_of("output").unwrap_or("output.o");
        let emitter = ObjectEmitter::native()?;
        emitter.emit(&driver.codegen.module, Path::new(output))?;
        println!("Wrote {} for {}", output, emitter.triple());
    }

    if failed > 0 {
        anyhow::bail!("{} of {} forms failed to compile", failed, results.len());
    }

    Ok(())
}
