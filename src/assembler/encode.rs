//! Pass-two instruction encoder: emits the exact little-endian x86-64 byte
//! sequence for a single statement, now that every label has a resolved
//! address.

use crate::assembler::statement::Statement;
use crate::assembler::symbols::SymbolTable;
use crate::assembler::{Error, Register, BASE_ADDR, HEADER_SIZE};

/// Encode one statement's instruction at the given code-section byte
/// offset, returning exactly as many bytes as [`super::simulate::instruction_size`]
/// predicted for the same statement.
pub fn encode_instruction(
    statement: &Statement,
    symbol_table: &SymbolTable,
    code_offset: usize,
) -> Result<Vec<u8>, Error> {
    match statement.instruction().to_ascii_lowercase().as_str() {
        "mov" => encode_mov(statement, symbol_table, code_offset),
        "call" => {
            statement.assert_n_arguments(0)?;
            Ok(vec![0x0F, 0x05])
        }
        "jmp" => encode_jump(statement, symbol_table, code_offset, 0xE9, None),
        "jmplt" => encode_jump(statement, symbol_table, code_offset, 0x0F, Some(0x8C)),
        "jmpgt" => encode_jump(statement, symbol_table, code_offset, 0x0F, Some(0x8F)),
        "jmpeq" => encode_jump(statement, symbol_table, code_offset, 0x0F, Some(0x84)),
        "cmp" => encode_reg_op(statement, 0x39, 0xF8),
        "add" => encode_reg_op(statement, 0x01, 0xC0),
        _ => Err(statement.unknown_instruction()),
    }
}

fn instruction_address(code_offset: usize) -> u64 {
    BASE_ADDR + HEADER_SIZE + code_offset as u64
}

fn encode_mov(
    statement: &Statement,
    symbol_table: &SymbolTable,
    code_offset: usize,
) -> Result<Vec<u8>, Error> {
    statement.assert_n_arguments(2)?;
    let instr_start = instruction_address(code_offset);

    if statement.is_memory_ref(0) {
        // mov [label], reg  -- store
        let label = statement.parse_memory_ref(0)?.to_string();
        let reg = statement.parse_register(1)?;
        let target = resolve(statement, symbol_table, &label)?;
        let mut bytes = vec![0x48, 0x89, (reg.code() << 3) | 0x05];
        push_disp32(&mut bytes, target, instr_start + 7);
        Ok(bytes)
    } else if statement.is_memory_ref(1) {
        // mov reg, [label]  -- load
        let reg = statement.parse_register(0)?;
        let label = statement.parse_memory_ref(1)?.to_string();
        let target = resolve(statement, symbol_table, &label)?;
        let mut bytes = vec![0x48, 0x8B, (reg.code() << 3) | 0x05];
        push_disp32(&mut bytes, target, instr_start + 7);
        Ok(bytes)
    } else if statement.is_numeric(1) {
        // mov reg, imm
        let reg = statement.parse_register(0)?;
        let value = statement.parse_number(1)?;
        if value <= 0xFFFF_FFFF {
            let mut bytes = vec![0x48, 0xC7, 0xC0 | reg.code()];
            bytes.extend_from_slice(&(value as u32).to_le_bytes());
            Ok(bytes)
        } else {
            let mut bytes = vec![0x48, 0xB8 + reg.code()];
            bytes.extend_from_slice(&value.to_le_bytes());
            Ok(bytes)
        }
    } else if statement.argument(1).ok().and_then(Register::parse).is_some() {
        // register-to-register mov is not a legal form; without this check
        // a label that happens to share a register's name (e.g. `rbx:`)
        // would silently fall through to the LEA branch below.
        Err(statement.invalid_argument(1))
    } else {
        // mov reg, label  -- lea (symbol address)
        let reg = statement.parse_register(0)?;
        let label = statement.parse_symbol_name(1)?.to_string();
        let target = resolve(statement, symbol_table, &label)?;
        let mut bytes = vec![0x48, 0x8D, (reg.code() << 3) | 0x05];
        push_disp32(&mut bytes, target, instr_start + 7);
        Ok(bytes)
    }
}

fn resolve(statement: &Statement, symbol_table: &SymbolTable, name: &str) -> Result<u64, Error> {
    symbol_table.lookup(name).ok_or_else(|| Error::UnknownSymbol {
        name: name.to_string(),
        token_span: statement.instruction_span(),
        line_number: statement.line_number(),
        line: statement.line(),
    })
}

fn push_disp32(bytes: &mut Vec<u8>, target: u64, next_instruction_addr: u64) {
    let disp = target as i64 - next_instruction_addr as i64;
    bytes.extend_from_slice(&(disp as i32).to_le_bytes());
}

fn encode_jump(
    statement: &Statement,
    symbol_table: &SymbolTable,
    code_offset: usize,
    opcode: u8,
    opcode2: Option<u8>,
) -> Result<Vec<u8>, Error> {
    statement.assert_n_arguments(1)?;
    let size = if opcode2.is_some() { 6 } else { 5 };
    let instr_start = instruction_address(code_offset);
    let target = statement.resolve_label(0, symbol_table)?;
    let next_addr = instr_start + size as u64;
    let disp = target as i64 - next_addr as i64;
    if disp < i32::MIN as i64 || disp > i32::MAX as i64 {
        return Err(Error::JumpTooFar {
            instruction: statement.instruction().to_string(),
            line_number: statement.line_number(),
            line: statement.line(),
            displacement: disp,
        });
    }

    let mut bytes = Vec::with_capacity(size);
    bytes.push(opcode);
    if let Some(op2) = opcode2 {
        bytes.push(op2);
    }
    bytes.extend_from_slice(&(disp as i32).to_le_bytes());
    Ok(bytes)
}

fn encode_reg_op(statement: &Statement, reg_reg_opcode: u8, imm_modrm_base: u8) -> Result<Vec<u8>, Error> {
    statement.assert_n_arguments(2)?;
    let dst = statement.parse_register(0)?;

    if statement.is_numeric(1) {
        let value = statement.parse_number(1)?;
        let mut bytes = vec![0x48, 0x81, imm_modrm_base | dst.code()];
        // cmp/add immediates are always encoded as 32 bits; a value that
        // doesn't fit truncates to its low 32 bits rather than erroring,
        // matching the original implementation.
        bytes.extend_from_slice(&(value as u32).to_le_bytes());
        Ok(bytes)
    } else {
        let src = statement.parse_register(1)?;
        Ok(vec![0x48, reg_reg_opcode, 0xC0 | (src.code() << 3) | dst.code()])
    }
}
