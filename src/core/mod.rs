mod config;
mod engine;
mod optimizer;
mod types;
mod withholding;

pub use config::{
    ConfigError, DecoteTable, DecoteThreshold, StandardDeduction, SurtaxBand, SurtaxTable,
    TaxBracket, TaxYearConfig,
};
pub use engine::compute_tax;
pub use types::{
    BracketSlice, CappingOutcome, DecoteOutcome, DeclarantInputs, OptimizerSuggestion,
    RetirementCapWarnings, SimulationResult, Situation, TaxInputs, WithholdingRates,
};
