//! The symbol table: a flat, append-only sequence of labels and their
//! resolved virtual addresses.
//!
//! Lookup is a first-match linear scan, so a repeated label name never
//! overwrites an earlier one — the first definition always wins. This
//! mirrors the original jasm implementation's fixed `Symbol symbols[100]`
//! array scanned front-to-back, rather than a `HashMap` (which would let
//! the *last* definition win on insert).

use crate::assembler::Error;

/// Upper bound on the number of labels a single source file may define.
/// The specification only requires this to be at least 100; 100 is also
/// exactly what the original implementation used.
pub const CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable { symbols: Vec::new() }
    }

    /// Append a new symbol. Does not check for duplicates: if `name` was
    /// already inserted, `lookup` will keep returning the earlier value.
    pub fn insert(&mut self, name: &str, value: u64) -> Result<(), Error> {
        if self.symbols.len() >= CAPACITY {
            return Err(Error::SymbolTableOverflow { name: name.to_string() });
        }
        self.symbols.push(Symbol { name: name.to_string(), value });
        Ok(())
    }

    /// Return the address of the first symbol inserted under `name`.
    pub fn lookup(&self, name: &str) -> Option<u64> {
        self.symbols.iter().find(|s| s.name == name).map(|s| s.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insertion_wins_on_lookup() {
        let mut table = SymbolTable::new();
        table.insert("loop", 0x1000).unwrap();
        table.insert("loop", 0x2000).unwrap();
        assert_eq!(table.lookup("loop"), Some(0x1000));
    }

    #[test]
    fn unknown_symbol_is_none() {
        let table = SymbolTable::new();
        assert_eq!(table.lookup("nope"), None);
    }

    #[test]
    fn overflow_past_capacity_errors() {
        let mut table = SymbolTable::new();
        for i in 0..CAPACITY {
            table.insert(&format!("l{i}"), i as u64).unwrap();
        }
        assert!(matches!(
            table.insert("one_too_many", 0),
            Err(Error::SymbolTableOverflow { .. })
        ));
    }
}
