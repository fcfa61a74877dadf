//! Compilation phases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed, strictly ordered stages of compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompilePhase {
    Initialization = 1,
    Parsing = 2,
    Conversion = 3,
    SemanticAnalysis = 4,
    Canonicalization = 5,
    InstructionSelection = 6,
    ClassGeneration = 7,
    Output = 8,
    Finalization = 9,
}

impl CompilePhase {
    pub const ALL: [CompilePhase; 9] = [
        CompilePhase::Initialization,
        CompilePhase::Parsing,
        CompilePhase::Conversion,
        CompilePhase::SemanticAnalysis,
        CompilePhase::Canonicalization,
        CompilePhase::InstructionSelection,
        CompilePhase::ClassGeneration,
        CompilePhase::Output,
        CompilePhase::Finalization,
    ];

    pub const fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<CompilePhase> {
        Self::ALL.iter().copied().find(|p| p.number() == n)
    }

    /// Phases that own an AST and therefore get a dispatcher.
    pub fn transformable() -> impl Iterator<Item = CompilePhase> {
        Self::ALL
            .into_iter()
            .filter(|p| *p >= CompilePhase::SemanticAnalysis)
    }

    pub const fn name(self) -> &'static str {
        match self {
            CompilePhase::Initialization => "INITIALIZATION",
            CompilePhase::Parsing => "PARSING",
            CompilePhase::Conversion => "CONVERSION",
            CompilePhase::SemanticAnalysis => "SEMANTIC_ANALYSIS",
            CompilePhase::Canonicalization => "CANONICALIZATION",
            CompilePhase::InstructionSelection => "INSTRUCTION_SELECTION",
            CompilePhase::ClassGeneration => "CLASS_GENERATION",
            CompilePhase::Output => "OUTPUT",
            CompilePhase::Finalization => "FINALIZATION",
        }
    }
}

impl fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompilePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_uppercase();
        if let Ok(n) = wanted.parse::<u8>() {
            return CompilePhase::from_number(n).ok_or_else(|| format!("no phase numbered {}", n));
        }
        CompilePhase::ALL
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| format!("unknown compile phase '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_numbered_in_order() {
        let numbers: Vec<u8> = CompilePhase::ALL.iter().map(|p| p.number()).collect();
        assert_eq!(numbers, (1..=9).collect::<Vec<u8>>());
        assert_eq!(CompilePhase::transformable().count(), 6);
    }

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("semantic-analysis".parse(), Ok(CompilePhase::SemanticAnalysis));
        assert_eq!("5".parse(), Ok(CompilePhase::Canonicalization));
        assert!("late".parse::<CompilePhase>().is_err());
    }
}
