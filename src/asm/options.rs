use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Restrictions for a code block that gets inlined into a BASIC program
/// line, where some bytes would end the line or the statement early.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRules {
    #[serde(default)]
    pub allow_nul_cr: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsmOptions {
    /// Target variant; `None` downgrades register checks to generic warnings
    pub cpu: Option<String>,
    /// Assume %80..%EF exists when no CPU is given
    pub regs_80_to_ef: bool,
    pub labels_ignore_case: bool,
    pub warn_non_ascii: bool,
    pub predefined_labels: BTreeMap<String, u16>,
    pub embed: Option<EmbedRules>,
}

impl AsmOptions {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Options(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let o = AsmOptions::from_json(r#"{"cpu":"U883","predefined_labels":{"PRINT":8192}}"#).unwrap();
        assert_eq!(o.cpu.as_deref(), Some("U883"));
        assert_eq!(o.predefined_labels.get("PRINT"), Some(&0x2000));
        assert!(!o.labels_ignore_case);
        assert_eq!(o.embed, None);

        let o = AsmOptions::from_json(r#"{"embed":{}}"#).unwrap();
        assert_eq!(o.embed, Some(EmbedRules { allow_nul_cr: false }));
        assert!(matches!(AsmOptions::from_json("{"), Err(Error::Options(_))));
    }
}
