//! The symbol table: label name to assembled address, with the eight
//! register names reserved against redefinition as labels.

use crate::error::AssembleError;
use comet2::registers::gr_index;
use std::collections::HashMap;

fn is_reserved(name: &str) -> bool {
    gr_index(name).is_some()
}

#[derive(Default)]
pub struct SymbolTable {
    addresses: HashMap<String, u16>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Binds `name` to `address`. Fails if `name` is one of `GR0`..`GR7`
    /// or already defined.
    pub fn define(&mut self, line: u32, name: &str, address: u16) -> Result<(), AssembleError> {
        if is_reserved(name) {
            return Err(AssembleError::ReservedName { line, name: name.to_string() });
        }
        if self.addresses.contains_key(name) {
            return Err(AssembleError::DuplicateLabel { line, label: name.to_string() });
        }
        self.addresses.insert(name.to_string(), address);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<u16> {
        self.addresses.get(name).copied()
    }

    /// Consumes the table, handing back the full name-to-address map, for
    /// callers that want to report every resolved label (e.g. `--labels`).
    pub fn into_labels(self) -> HashMap<String, u16> {
        self.addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reserved_register_names() {
        let mut table = SymbolTable::new();
        assert!(table.define(1, "GR3", 0).is_err());
    }

    #[test]
    fn rejects_duplicate_labels() {
        let mut table = SymbolTable::new();
        table.define(1, "LOOP", 4).unwrap();
        assert!(table.define(2, "LOOP", 8).is_err());
    }

    #[test]
    fn resolves_a_defined_label() {
        let mut table = SymbolTable::new();
        table.define(1, "LOOP", 4).unwrap();
        assert_eq!(table.resolve("LOOP"), Some(4));
        assert_eq!(table.resolve("NOPE"), None);
    }
}
