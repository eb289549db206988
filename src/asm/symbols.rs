use std::collections::{BTreeMap, HashMap, HashSet};

use crate::asm::expr::{EvalContext, Expr};
use crate::asm::operand::working_register;
use crate::error::{Error, Result};
use crate::instructions::is_reserved_word;
use crate::scanner::{is_ident_part, is_ident_start};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolValue {
    Known(u16),
    /// `EQU` whose expression still refers to something undefined; `here`
    /// is the location counter of the defining line.
    Pending { expr: Expr, here: u16 },
}

/// Label name must look like an identifier and not like a keyword.
pub fn check_label_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let ok = chars.next().is_some_and(is_ident_start) && chars.all(is_ident_part);
    if !ok {
        return Err(Error::InvalidLabel(name.to_string()));
    }
    // R16 and friends would still parse as a (bad) working register
    if is_reserved_word(name) || !matches!(working_register(name), Ok(None)) {
        return Err(Error::ReservedWord(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    map: HashMap<String, SymbolValue>,
    /// Defined so far in the running pass (for IFDEF)
    seen: HashSet<String>,
    ignore_case: bool,
}

impl SymbolTable {
    pub fn new(ignore_case: bool) -> Self {
        Self { ignore_case, ..Self::default() }
    }

    pub fn key(&self, name: &str) -> String {
        if self.ignore_case { name.to_ascii_uppercase() } else { name.to_string() }
    }

    pub fn define(&mut self, name: &str, value: SymbolValue) -> Result<()> {
        check_label_name(name)?;
        let key = self.key(name);
        if self.map.contains_key(&key) {
            return Err(Error::DuplicateLabel(name.to_string()));
        }
        self.seen.insert(key.clone());
        self.map.insert(key, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SymbolValue> {
        self.map.get(&self.key(name))
    }

    pub fn start_pass(&mut self) {
        self.seen.clear();
    }

    pub fn mark_seen(&mut self, name: &str) {
        let key = self.key(name);
        self.seen.insert(key);
    }

    pub fn seen(&self, name: &str) -> bool {
        self.seen.contains(&self.key(name))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Settle forward-referencing `EQU`s by repeated evaluation until no
    /// more progress is made. Returns how many are still open.
    pub fn resolve_pending(&mut self) -> usize {
        loop {
            let mut progress = false;
            let pending: Vec<(String, Expr, u16)> = self
                .map
                .iter()
                .filter_map(|(k, v)| match v {
                    SymbolValue::Pending { expr, here } => Some((k.clone(), expr.clone(), *here)),
                    SymbolValue::Known(_) => None,
                })
                .collect();
            if pending.is_empty() {
                return 0;
            }
            for (key, expr, here) in &pending {
                let scope = Scope { table: self, here: *here, strict: false };
                if let Ok(Some(v)) = expr.eval(&scope) {
                    self.map.insert(key.clone(), SymbolValue::Known(v));
                    progress = true;
                }
            }
            if !progress {
                return pending.len();
            }
        }
    }

    pub fn known(&self) -> BTreeMap<String, u16> {
        self.map
            .iter()
            .filter_map(|(k, v)| match v {
                SymbolValue::Known(n) => Some((k.clone(), *n)),
                SymbolValue::Pending { .. } => None,
            })
            .collect()
    }
}

/// Evaluation view of the table. Strict scopes (pass 2) turn anything
/// unresolved into an error.
pub struct Scope<'a> {
    pub table: &'a SymbolTable,
    pub here: u16,
    pub strict: bool,
}

impl EvalContext for Scope<'_> {
    fn symbol(&self, name: &str) -> Result<Option<u16>> {
        match self.table.get(name) {
            Some(SymbolValue::Known(v)) => Ok(Some(*v)),
            _ if self.strict => Err(Error::UndefinedLabel(name.to_string())),
            _ => Ok(None),
        }
    }

    fn here(&self) -> u16 {
        self.here
    }
}
