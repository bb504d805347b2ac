use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Situation {
    Single,
    Married,
    Widowed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeclarantInputs {
    pub gross_salary: f64,
    /// Declared actual professional expenses; 0 selects the standard deduction.
    pub professional_expenses: f64,
    /// Gross salary is already the net taxable amount; no deduction applies.
    pub treat_gross_as_taxable: bool,
    pub retirement_contribution: f64,
    pub retirement_ceiling: f64,
}

#[derive(Debug, Clone)]
pub struct TaxInputs {
    pub situation: Situation,
    pub dependents: u32,
    pub declarant1: DeclarantInputs,
    pub declarant2: DeclarantInputs,
    pub common_charges: f64,
    pub tax_credits: f64,
}

impl TaxInputs {
    /// Second declarant, only for married households. Any other situation
    /// leaves `declarant2` inert.
    pub fn second_declarant(&self) -> Option<&DeclarantInputs> {
        match self.situation {
            Situation::Married => Some(&self.declarant2),
            Situation::Single | Situation::Widowed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSlice {
    pub rate_label: String,
    pub rate: f64,
    /// Part of the per-part quotient taxed at `rate`.
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CappingOutcome {
    pub was_capped: bool,
    pub base_parts: f64,
    pub ceiling: f64,
    pub advantage_granted: f64,
    pub reference_tax_base: f64,
    pub widow_relief: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoteOutcome {
    pub amount_applied: f64,
    pub tax_before_decote: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithholdingRates {
    pub household: f64,
    pub declarant1: f64,
    pub declarant2: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementCapWarnings {
    pub declarant1_exceeded: bool,
    pub declarant2_exceeded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerSuggestion {
    pub amount_to_invest: f64,
    pub estimated_saving: f64,
    pub target_rate: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub situation: Situation,
    pub gross_income: f64,
    pub taxable_income: f64,
    pub reference_income: f64,
    pub fiscal_parts: f64,
    pub quotient: f64,
    pub gross_tax_before_relief: f64,
    pub tax_before_credits: f64,
    pub final_tax: f64,
    pub surtax: f64,
    pub total_tax: f64,
    pub marginal_rate: f64,
    pub withholding_rates: WithholdingRates,
    pub bracket_breakdown: Vec<BracketSlice>,
    pub capping: CappingOutcome,
    pub decote: DecoteOutcome,
    pub retirement_cap_warnings: RetirementCapWarnings,
    pub optimizer_suggestion: OptimizerSuggestion,
    pub narrative_trace: Vec<String>,
}
