use std::collections::HashMap;

use string_cache::DefaultAtom;

/// Where a label was defined and whether anything refers to it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Symbol {
  pub address    : usize,
  pub line       : usize,
  pub referenced : bool,
}

/**
  The assembler's symbol table maps label names to the address of the instruction that
  follows the label. It lives only for the duration of one assembly: filled in during the
  first pass, read during the second, and dropped afterwards. Label names are interned.

*/
#[derive(Default)]
pub struct SymbolTable {
  table: HashMap<DefaultAtom, Symbol>,
}

impl SymbolTable {

  pub fn new() -> SymbolTable {
    SymbolTable {
      table: HashMap::new()
    }
  }

  /// Records a label. On a second definition, returns the line of the first one.
  pub fn define(&mut self, name: &str, address: usize, line: usize) -> Result<(), usize> {
    let name = DefaultAtom::from(name);
    if let Some(existing) = self.table.get(&name) {
      return Err(existing.line);
    }
    self.table.insert(name, Symbol { address, line, referenced: false });
    Ok(())
  }

  /// The address of a label, marking it as referenced.
  pub fn resolve(&mut self, name: &str) -> Option<usize> {
    let symbol = self.table.get_mut(&DefaultAtom::from(name))?;
    symbol.referenced = true;
    Some(symbol.address)
  }

  pub fn get(&self, name: &str) -> Option<Symbol> {
    self.table.get(&DefaultAtom::from(name)).cloned()
  }

  /// Labels nothing refers to, ordered by the line they were defined on.
  pub fn unreferenced(&self) -> Vec<(DefaultAtom, Symbol)> {
    let mut unused =
      self.table
          .iter()
          .filter(|(_, symbol)| !symbol.referenced)
          .map(|(name, symbol)| (name.clone(), *symbol))
          .collect::<Vec<(DefaultAtom, Symbol)>>();
    unused.sort_by_key(|(_, symbol)| symbol.line);
    unused
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn second_definition_reports_the_first() {
    let mut symbols = SymbolTable::new();
    assert_eq!(symbols.define("loop", 3, 7), Ok(()));
    assert_eq!(symbols.define("loop", 9, 12), Err(7));
    assert_eq!(symbols.get("loop").map(|s| s.address), Some(3));
  }

  #[test]
  fn resolving_marks_labels_as_used() {
    let mut symbols = SymbolTable::new();
    symbols.define("start", 0, 1).ok();
    symbols.define("unused", 2, 4).ok();

    assert_eq!(symbols.resolve("start"), Some(0));
    assert_eq!(symbols.resolve("missing"), None);

    let unused = symbols.unreferenced();
    assert_eq!(unused.len(), 1);
    assert_eq!(&*unused[0].0, "unused");
  }
}
