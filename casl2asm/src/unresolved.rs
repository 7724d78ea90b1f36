//! The unresolved-reference table: label name to the cells awaiting its
//! resolved address, patched once the whole source has been scanned.

use crate::error::AssembleError;
use crate::symtab::SymbolTable;
use std::collections::HashMap;

#[derive(Default)]
pub struct UnresolvedTable {
    sites: HashMap<String, Vec<u16>>,
}

impl UnresolvedTable {
    pub fn new() -> UnresolvedTable {
        UnresolvedTable::default()
    }

    pub fn add(&mut self, name: &str, cell_address: u16) {
        self.sites.entry(name.to_string()).or_default().push(cell_address);
    }

    /// Patches every recorded cell with its label's resolved address.
    /// Fails on the first name with no definition in `symtab`.
    pub fn resolve_all(&self, symtab: &SymbolTable, memory: &mut [u16]) -> Result<(), AssembleError> {
        for (name, cells) in &self.sites {
            let address = symtab
                .resolve(name)
                .ok_or_else(|| AssembleError::UndefinedLabel { label: name.clone() })?;
            for &cell in cells {
                memory[cell as usize] = address;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_every_recorded_site() {
        let mut table = UnresolvedTable::new();
        table.add("LOOP", 2);
        table.add("LOOP", 5);

        let mut symtab = SymbolTable::new();
        symtab.define(1, "LOOP", 9).unwrap();

        let mut memory = vec![0u16; 8];
        table.resolve_all(&symtab, &mut memory).unwrap();
        assert_eq!(memory[2], 9);
        assert_eq!(memory[5], 9);
    }

    #[test]
    fn reports_an_undefined_label() {
        let table_with_site = {
            let mut t = UnresolvedTable::new();
            t.add("GHOST", 0);
            t
        };
        let symtab = SymbolTable::new();
        let mut memory = vec![0u16; 1];
        assert!(table_with_site.resolve_all(&symtab, &mut memory).is_err());
    }
}
