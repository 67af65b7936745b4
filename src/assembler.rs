//! Converts jasm assembly source into a flat stream of x86-64 machine
//! code plus a trailing data section, in a two-pass manner.
//!
//! The first pass walks the source once, sizing every instruction (via
//! [`simulate`]) and every data directive (via [`data`]) so that every
//! label's final address is known without having encoded a single byte.
//! The second pass re-walks the already-sized instructions and emits their
//! real bytes (via [`encode`]), now that the symbol table is complete.
//!
//! A line whose first non-whitespace character is `#` is a whole-line
//! comment. Labels, instructions and directives may be indented arbitrarily. Labels
//! are case-sensitive; instructions are not. A label is defined by a line
//! ending in a colon:
//!
//! ```ignore
//! start:
//!     mov rax, 0
//! loop:
//!     add rax, 1
//!     cmp rax, 10
//!     jmplt loop
//!     call
//! ```
//!
//! The assembler supports six general-purpose registers (`rax`, `rcx`,
//! `rdx`, `rbx`, `rsi`, `rdi`), the instructions `mov`, `add`, `cmp`,
//! `call`, `jmp`, `jmplt`, `jmpgt`, `jmpeq`, and a `data <label> <value>`
//! directive for declaring string, buffer, file and raw-value data.

pub mod data;
pub mod directives;
pub mod encode;
pub mod simulate;
pub mod statement;
pub mod symbols;

use colored::Colorize;
use regex::Regex;
use std::fmt;
use std::fs;

use directives::parse_data_directive;
use statement::{Statement, TokenSpan};
use symbols::SymbolTable;

/// The virtual address the ELF loader maps the single `PT_LOAD` segment
/// to. Matches the original implementation's fixed load address.
pub const BASE_ADDR: u64 = 0x400000;

/// Size, in bytes, of the ELF64 header plus its single program header —
/// the offset the code section starts at within the mapped segment.
pub const HEADER_SIZE: u64 = 120;

/// One of the six general-purpose registers jasm understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsi,
    Rdi,
}

impl Register {
    /// The 3-bit encoding used in a ModR/M byte's `reg`/`r/m` fields.
    pub fn code(&self) -> u8 {
        match self {
            Register::Rax => 0,
            Register::Rcx => 1,
            Register::Rdx => 2,
            Register::Rbx => 3,
            Register::Rsi => 6,
            Register::Rdi => 7,
        }
    }

    pub fn parse(lexeme: &str) -> Option<Register> {
        match lexeme.to_ascii_lowercase().as_str() {
            "rax" => Some(Register::Rax),
            "rcx" => Some(Register::Rcx),
            "rdx" => Some(Register::Rdx),
            "rbx" => Some(Register::Rbx),
            "rsi" => Some(Register::Rsi),
            "rdi" => Some(Register::Rdi),
            _ => None,
        }
    }
}

/// Assemble a jasm source file into its final code + data bytes.
pub fn assemble_from_file(path: &str) -> Result<Vec<u8>, Error> {
    let source = fs::read_to_string(path).map_err(|_| Error::SourceIoError {
        path: path.to_string(),
    })?;
    assemble(&source)
}

/// Assemble jasm source text into its final code + data bytes, ready to be
/// wrapped by a [`crate::writer`].
pub fn assemble(source: &str) -> Result<Vec<u8>, Error> {
    let mut symbol_table = SymbolTable::new();
    let mut instructions: Vec<(Statement, usize)> = Vec::new();
    let mut data_directives: Vec<directives::DataDirective> = Vec::new();
    let mut code_offset: usize = 0;

    for (index, raw_line) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(label) = trimmed.strip_suffix(':') {
            let address = BASE_ADDR + HEADER_SIZE + code_offset as u64;
            symbol_table.insert(label.trim(), address)?;
            continue;
        }

        if let Some(rest) = strip_data_keyword(trimmed) {
            let directive = parse_data_directive(rest, line_number, line)?;
            data_directives.push(directive);
            continue;
        }

        match lex_line(line, line_number)? {
            Some(statement) => {
                let size = simulate::instruction_size(&statement)?;
                instructions.push((statement, code_offset));
                code_offset += size;
            }
            None => continue,
        }
    }

    let data_base = BASE_ADDR + HEADER_SIZE + code_offset as u64;
    let mut data_offset: usize = 0;
    let mut data_bytes = Vec::new();
    for directive in &data_directives {
        let address = data_base + data_offset as u64;
        symbol_table.insert(&directive.label, address)?;
        let bytes = data::resolve(directive)?;
        data_offset += bytes.len();
        data_bytes.extend(bytes);
    }

    let mut code_bytes = Vec::with_capacity(code_offset);
    for (statement, offset) in &instructions {
        let bytes = encode::encode_instruction(statement, &symbol_table, *offset)?;
        code_bytes.extend(bytes);
    }

    code_bytes.extend(data_bytes);
    Ok(code_bytes)
}

fn strip_data_keyword(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix("data")?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// Tokenize a single instruction line into a mnemonic plus its
/// comma/whitespace-separated arguments. Quoted substrings are kept as a
/// single token. Returns `Ok(None)` for a blank line.
pub(crate) fn lex_line(line: &str, line_number: usize) -> Result<Option<Statement>, Error> {
    let re = Regex::new(r#""[^"]*"|[^,\s]+"#).expect("static regex is valid");
    let mut lexemes = Vec::new();
    let mut spans = Vec::new();
    for mat in re.find_iter(line) {
        lexemes.push(mat.as_str());
        spans.push(TokenSpan::new(mat.start(), mat.end()));
    }

    if lexemes.is_empty() {
        return Ok(None);
    }

    Ok(Some(Statement::new(
        lexemes[0],
        spans[0],
        lexemes[1..].to_vec(),
        spans[1..].to_vec(),
        line_number,
        line,
    )))
}

/// An error that can occur during the assembly process.
#[derive(Debug)]
pub enum Error {
    /// An unknown instruction was encountered.
    UnknownInstruction {
        instruction: String,
        instruction_span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// An unknown register name was encountered where a register was
    /// expected.
    UnknownRegister {
        token: String,
        token_span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A label was referenced that was never defined.
    UnknownSymbol {
        name: String,
        token_span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A catch-all for malformed syntax (bad operand shape, unterminated
    /// string literal, malformed data directive).
    SyntaxError {
        message: String,
        line_number: usize,
        line: String,
        span: Option<TokenSpan>,
    },
    /// An invalid number of arguments was passed to an instruction.
    InvalidArgumentCount {
        instruction: String,
        n_arguments: usize,
        expected: Vec<usize>,
        extra_argument_spans: Vec<TokenSpan>,
        line_number: usize,
        line: String,
    },
    /// More labels were defined than the symbol table can hold.
    SymbolTableOverflow { name: String },
    /// A jump's target is further away than a 32-bit displacement can
    /// reach.
    JumpTooFar {
        instruction: String,
        line_number: usize,
        line: String,
        displacement: i64,
    },
    /// A source file could not be read.
    SourceIoError { path: String },
    /// A file referenced by a `data ... file <path>` directive could not
    /// be read.
    FileIoError { path: String, line_number: usize },
    /// The assembled output could not be written.
    OutputIoError { path: String },
}

impl std::error::Error for Error {}

fn underline_spans(line: &str, spans: Vec<&TokenSpan>) -> String {
    let mut underline = vec![' '; line.len()];
    for span in spans {
        for i in span.start()..span.end() {
            if i < underline.len() {
                underline[i] = '^';
            }
        }
    }
    underline.into_iter().collect()
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (message, line, line_number, underlined_spans) = match self {
            Error::UnknownInstruction { instruction, instruction_span, line_number, line } => (
                format!("unknown instruction \"{}\" at line {}", instruction, line_number),
                Some(line), Some(line_number), vec![instruction_span],
            ),
            Error::UnknownRegister { token, token_span, line_number, line } => (
                format!("unknown register \"{}\" at line {}", token, line_number),
                Some(line), Some(line_number), vec![token_span],
            ),
            Error::UnknownSymbol { name, token_span, line_number, line } => (
                format!("undefined label \"{}\" at line {}", name, line_number),
                Some(line), Some(line_number), vec![token_span],
            ),
            Error::SyntaxError { message, line_number, line, span } => (
                format!("{} at line {}", message, line_number),
                Some(line), Some(line_number), span.iter().collect(),
            ),
            Error::InvalidArgumentCount { instruction, line_number, n_arguments, expected, extra_argument_spans, line } => (
                format!(
                    "invalid argument count for instruction \"{}\" at line {}: found {}, expected {:?}",
                    instruction, line_number, n_arguments, expected
                ),
                Some(line), Some(line_number), extra_argument_spans.iter().collect(),
            ),
            Error::SymbolTableOverflow { name } => (
                format!("symbol table overflow while defining \"{}\": too many labels", name),
                None, None, vec![],
            ),
            Error::JumpTooFar { instruction, line_number, line, displacement } => (
                format!(
                    "\"{}\" at line {} is out of range: displacement {} does not fit in 32 bits",
                    instruction, line_number, displacement
                ),
                Some(line), Some(line_number), vec![],
            ),
            Error::SourceIoError { path } => (
                format!("failed to read source file {}", path),
                None, None, vec![],
            ),
            Error::FileIoError { path, line_number } => (
                format!("failed to read file \"{}\" referenced at line {}", path, line_number),
                None, None, vec![],
            ),
            Error::OutputIoError { path } => (
                format!("failed to write output file {}", path),
                None, None, vec![],
            ),
        };
        writeln!(f, "{}", message)?;
        if let (Some(line), Some(line_number)) = (line, line_number) {
            write!(f, "{}\t{}", line_number, line)?;
            if !underlined_spans.is_empty() {
                writeln!(f)?;
                write!(f, "\t{}", underline_spans(line, underlined_spans).green())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_one_and_pass_two_agree_on_instruction_sizes() {
        let source = "\
start:
    mov rax, 0
loop:
    add rax, 1
    cmp rax, 4294967296
    jmplt loop
    call
";
        let bytes = assemble(source).unwrap();
        // cmp's immediate is always encoded as 32 bits, so its size is 7
        // even though the literal itself needs 33 bits to represent.
        assert_eq!(bytes.len(), 7 + 3 + 7 + 6 + 2);
    }

    #[test]
    fn labels_and_data_addresses_resolve() {
        let source = "\
start:
    mov rax, msg
data msg \"hi\"
";
        let bytes = assemble(source).unwrap();
        assert_eq!(bytes.len(), 7 + 3);
    }

    #[test]
    fn undefined_label_errors() {
        let source = "jmp nowhere\n";
        assert!(matches!(assemble(source), Err(Error::UnknownSymbol { .. })));
    }

    #[test]
    fn duplicate_label_first_definition_wins() {
        let source = "\
start:
    mov rax, 1
start:
    mov rax, 2
jmp start
";
        // the jmp must resolve to the first `start`, at offset 0
        let bytes = assemble(source).unwrap();
        // mov(7) + mov(7) + jmp(5); jmp target = BASE_ADDR+HEADER_SIZE+0,
        // next_addr = BASE_ADDR+HEADER_SIZE+14+5, disp = -19
        let disp = i32::from_le_bytes(bytes[15..19].try_into().unwrap());
        assert_eq!(disp, -19);
    }
}
