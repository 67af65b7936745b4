use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;

use jasm::assembler;
use jasm::logging::error;
use jasm::writer::{self, Format};

fn main() {
    let args: Vec<String> = env::args().collect();
    let (input_path, output_path, format) = match parse_args(&args) {
        Some(parsed) => parsed,
        None => {
            eprintln!("Usage: {} <input.jasm> <output> [--raw]", args[0]);
            std::process::exit(1);
        }
    };

    let payload = assembler::assemble_from_file(input_path).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(2);
    });

    let contents = writer::build(&payload, format);
    writer::write_to_file(output_path, &contents).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(3);
    });

    if format == Format::Elf {
        set_executable(output_path).unwrap_or_else(|e| {
            error(e.to_string());
            std::process::exit(3);
        });
    }
}

/// Setting the executable bit is left to the CLI, not the writer: the
/// writer's contract is to serialise bytes, nothing more.
fn set_executable(path: &str) -> std::io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)
}

fn parse_args(args: &[String]) -> Option<(&str, &str, Format)> {
    match args.len() {
        3 => Some((&args[1], &args[2], Format::Elf)),
        4 if args[3] == "--raw" => Some((&args[1], &args[2], Format::Raw)),
        _ => None,
    }
}
