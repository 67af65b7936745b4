//! [Statement] struct and its utilities: a lexed instruction or data
//! directive line, plus the operand parsers shared by the simulator and
//! the encoder so that the two always agree on an instruction's shape.

use crate::assembler::symbols::SymbolTable;
use crate::assembler::{Error, Register};

/// A span of text in the source line. Used to underline errors.
#[derive(Debug, Clone, Copy)]
pub struct TokenSpan {
    start: usize,
    end: usize,
}

impl TokenSpan {
    pub fn new(start: usize, end: usize) -> TokenSpan {
        TokenSpan { start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }
}

/// An instruction or data directive, lexed into a mnemonic and its
/// comma/whitespace-separated arguments. Quoted string literals are kept
/// as a single argument.
#[derive(Debug, Clone)]
pub struct Statement<'a> {
    instruction: &'a str,
    instruction_span: TokenSpan,
    arguments: Vec<&'a str>,
    argument_spans: Vec<TokenSpan>,
    line_number: usize,
    line: &'a str,
}

impl<'a> Statement<'a> {
    pub fn new(
        instruction: &'a str,
        instruction_span: TokenSpan,
        arguments: Vec<&'a str>,
        argument_spans: Vec<TokenSpan>,
        line_number: usize,
        line: &'a str,
    ) -> Statement<'a> {
        Statement {
            instruction,
            instruction_span,
            arguments,
            argument_spans,
            line_number,
            line,
        }
    }

    pub fn instruction(&self) -> &str {
        self.instruction
    }

    pub fn instruction_span(&self) -> TokenSpan {
        self.instruction_span
    }

    pub fn n_arguments(&self) -> usize {
        self.arguments.len()
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn line(&self) -> String {
        self.line.to_string()
    }

    /// Get the raw argument token at the given index.
    pub fn argument(&self, argument_index: usize) -> Result<&str, Error> {
        self.arguments
            .get(argument_index)
            .copied()
            .ok_or_else(|| self.invalid_argument_count(self.arguments.len(), &[argument_index + 1]))
    }

    fn argument_span(&self, argument_index: usize) -> TokenSpan {
        self.argument_spans
            .get(argument_index)
            .copied()
            .unwrap_or(self.instruction_span)
    }

    /// Parse a decimal, `0x`-hex or `0b`-binary literal from the argument
    /// at the given index. A leading `-` is accepted on a decimal literal
    /// and produces the two's-complement `u64` bit pattern, matching the
    /// original implementation's `strtoull` behavior.
    pub fn parse_number(&self, argument_index: usize) -> Result<u64, Error> {
        let lexeme = self.argument(argument_index)?;
        let parsed = if lexeme.starts_with("0x") || lexeme.starts_with("0X") {
            u64::from_str_radix(&lexeme[2..], 16)
        } else if lexeme.starts_with("0b") || lexeme.starts_with("0B") {
            u64::from_str_radix(&lexeme[2..], 2)
        } else if lexeme.starts_with('-') {
            return lexeme
                .parse::<i64>()
                .map(|v| v as u64)
                .map_err(|_| self.invalid_argument(argument_index));
        } else {
            lexeme.parse::<u64>()
        };
        parsed.map_err(|_| self.invalid_argument(argument_index))
    }

    /// Parse one of the six named registers from the argument at the
    /// given index.
    pub fn parse_register(&self, argument_index: usize) -> Result<Register, Error> {
        let lexeme = self.argument(argument_index)?;
        Register::parse(lexeme).ok_or_else(|| Error::UnknownRegister {
            token: lexeme.to_string(),
            token_span: self.argument_span(argument_index),
            line_number: self.line_number,
            line: self.line(),
        })
    }

    /// Parse a `[label]` memory reference from the argument at the given
    /// index, returning the label name.
    pub fn parse_memory_ref(&self, argument_index: usize) -> Result<&str, Error> {
        let lexeme = self.argument(argument_index)?;
        if lexeme.len() >= 2 && lexeme.starts_with('[') && lexeme.ends_with(']') {
            Ok(&lexeme[1..lexeme.len() - 1])
        } else {
            Err(self.invalid_argument(argument_index))
        }
    }

    /// True if the argument at the given index has the shape of a memory
    /// reference (`[...]`).
    pub fn is_memory_ref(&self, argument_index: usize) -> bool {
        self.parse_memory_ref(argument_index).is_ok()
    }

    /// True if the argument at the given index has the shape of a numeric
    /// literal.
    pub fn is_numeric(&self, argument_index: usize) -> bool {
        match self.arguments.get(argument_index) {
            None => false,
            Some(lexeme) => is_numeric_lexeme(lexeme),
        }
    }

    /// Parse a bare label identifier (as opposed to a numeric literal or
    /// memory reference) from the argument at the given index.
    pub fn parse_symbol_name(&self, argument_index: usize) -> Result<&str, Error> {
        self.argument(argument_index)
    }

    /// Resolve the label at the given argument index against the symbol
    /// table, yielding its absolute virtual address.
    pub fn resolve_label(
        &self,
        argument_index: usize,
        symbol_table: &SymbolTable,
    ) -> Result<u64, Error> {
        let name = self.argument(argument_index)?;
        symbol_table.lookup(name).ok_or_else(|| Error::UnknownSymbol {
            name: name.to_string(),
            token_span: self.argument_span(argument_index),
            line_number: self.line_number,
            line: self.line(),
        })
    }

    /// Assert the statement has exactly `n` arguments.
    pub fn assert_n_arguments(&self, n: usize) -> Result<(), Error> {
        if self.arguments.len() != n {
            return Err(self.invalid_argument_count(self.arguments.len(), &[n]));
        }
        Ok(())
    }

    pub fn invalid_argument(&self, argument_index: usize) -> Error {
        let argument = self
            .arguments
            .get(argument_index)
            .map(|s| s.to_string())
            .unwrap_or_default();
        Error::SyntaxError {
            message: format!("invalid argument \"{argument}\""),
            line_number: self.line_number,
            line: self.line(),
            span: Some(self.argument_span(argument_index)),
        }
    }

    pub fn invalid_argument_count(&self, n_arguments: usize, expected: &[usize]) -> Error {
        let max_expected = *expected.iter().max().unwrap_or(&0);
        let extra_argument_spans = self
            .argument_spans
            .get(max_expected..)
            .unwrap_or(&[])
            .to_vec();

        Error::InvalidArgumentCount {
            instruction: self.instruction.to_string(),
            n_arguments,
            expected: expected.to_vec(),
            extra_argument_spans,
            line_number: self.line_number,
            line: self.line(),
        }
    }

    pub fn unknown_instruction(&self) -> Error {
        Error::UnknownInstruction {
            instruction: self.instruction.to_string(),
            instruction_span: self.instruction_span,
            line_number: self.line_number,
            line: self.line(),
        }
    }
}

pub(crate) fn is_numeric_lexeme(lexeme: &str) -> bool {
    matches!(lexeme.chars().next(), Some(c) if c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lex_line;

    #[test]
    fn negative_decimal_yields_twos_complement() {
        let statement = lex_line("mov rax, -1", 1).unwrap().unwrap();
        assert_eq!(statement.parse_number(1).unwrap(), u64::MAX);
    }

    #[test]
    fn negative_lexeme_is_still_numeric() {
        let statement = lex_line("cmp rax, -5", 1).unwrap().unwrap();
        assert!(statement.is_numeric(1));
        assert_eq!(statement.parse_number(1).unwrap(), (-5i64) as u64);
    }
}
