//! Pass-one code-size prediction.
//!
//! Each function here predicts the number of bytes [`encode`] will emit for
//! the same instruction, without needing the symbol table — an
//! instruction's encoded length depends only on its operand *shapes*
//! (register, immediate, memory reference, bare symbol), never on whether a
//! referenced label actually exists yet. This is what lets a single linear
//! pass fix the code section's length before any label address is known.
//!
//! We do double work against [`encode`] here — re-deriving a size instead of
//! reusing a shared table — but the two must independently agree on every
//! instruction form; see `instruction_size`'s doc and the crate-level
//! invariant tests in `assembler.rs`.

use crate::assembler::statement::Statement;
use crate::assembler::{Error, Register};

/// Predict the number of bytes a statement's instruction will encode to.
/// Returns `Ok(0)` for nothing (this module is only ever called on
/// statement lines, never on labels/comments/data directives, which are
/// sized elsewhere).
pub fn instruction_size(statement: &Statement) -> Result<usize, Error> {
    match statement.instruction().to_ascii_lowercase().as_str() {
        "mov" => mov_size(statement),
        "call" => {
            statement.assert_n_arguments(0)?;
            Ok(2)
        }
        "jmp" => {
            statement.assert_n_arguments(1)?;
            Ok(5)
        }
        "jmplt" | "jmpgt" | "jmpeq" => {
            statement.assert_n_arguments(1)?;
            Ok(6)
        }
        "cmp" | "add" => reg_immediate_or_reg_size(statement),
        _ => Err(statement.unknown_instruction()),
    }
}

fn mov_size(statement: &Statement) -> Result<usize, Error> {
    statement.assert_n_arguments(2)?;
    if statement.is_memory_ref(0) {
        // store: mov [label], reg
        Ok(7)
    } else if statement.is_memory_ref(1) {
        // load: mov reg, [label]
        Ok(7)
    } else if statement.is_numeric(1) {
        // immediate: mov reg, imm
        let value = statement.parse_number(1)?;
        if value <= 0xFFFF_FFFF {
            Ok(7)
        } else {
            Ok(10)
        }
    } else if statement.argument(1).ok().and_then(Register::parse).is_some() {
        // register-to-register mov is not a legal form; reject it here too,
        // so the simulator and encode.rs agree on every rejected shape.
        Err(statement.invalid_argument(1))
    } else {
        // symbol address: mov reg, label
        Ok(7)
    }
}

fn reg_immediate_or_reg_size(statement: &Statement) -> Result<usize, Error> {
    statement.assert_n_arguments(2)?;
    if statement.is_numeric(1) {
        Ok(7)
    } else {
        Ok(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lex_line;

    fn size_of(line: &str) -> usize {
        let statement = lex_line(line, 1).unwrap().unwrap();
        instruction_size(&statement).unwrap()
    }

    #[test]
    fn mov_immediate_32_bit_is_seven_bytes() {
        assert_eq!(size_of("mov rax, 4294967295"), 7);
    }

    #[test]
    fn mov_immediate_64_bit_is_ten_bytes() {
        assert_eq!(size_of("mov rax, 4294967296"), 10);
    }

    #[test]
    fn mov_memory_forms_are_seven_bytes() {
        assert_eq!(size_of("mov rax, [counter]"), 7);
        assert_eq!(size_of("mov [counter], rax"), 7);
        assert_eq!(size_of("mov rax, counter"), 7);
    }

    #[test]
    fn call_is_two_bytes() {
        assert_eq!(size_of("call"), 2);
    }

    #[test]
    fn jmp_is_five_jmpeq_is_six() {
        assert_eq!(size_of("jmp done"), 5);
        assert_eq!(size_of("jmpeq done"), 6);
        assert_eq!(size_of("jmplt done"), 6);
        assert_eq!(size_of("jmpgt done"), 6);
    }

    #[test]
    fn cmp_and_add_register_forms_are_three_bytes() {
        assert_eq!(size_of("cmp rax, rbx"), 3);
        assert_eq!(size_of("add rax, rbx"), 3);
    }

    #[test]
    fn cmp_and_add_immediate_forms_are_seven_bytes() {
        assert_eq!(size_of("cmp rax, 0"), 7);
        assert_eq!(size_of("add rax, 1"), 7);
    }

    #[test]
    fn unknown_instruction_errors() {
        assert!(matches!(
            instruction_size(&lex_line("nop", 1).unwrap().unwrap()),
            Err(Error::UnknownInstruction { .. })
        ));
    }

    #[test]
    fn mov_register_to_register_errors() {
        assert!(matches!(
            instruction_size(&lex_line("mov rax, rbx", 1).unwrap().unwrap()),
            Err(Error::SyntaxError { .. })
        ));
    }
}
