use tracing::debug;

use super::config::{
    DecoteTable, StandardDeduction, SurtaxBand, SurtaxTable, TaxBracket, TaxYearConfig,
};
use super::optimizer::suggest_contribution;
use super::types::{
    BracketSlice, CappingOutcome, DecoteOutcome, DeclarantInputs, RetirementCapWarnings,
    SimulationResult, Situation, TaxInputs,
};
use super::withholding::allocate_withholding;

#[derive(Debug, Clone, Copy)]
pub(crate) struct DeclarantIncome {
    pub gross: f64,
    pub deduction: f64,
    pub retirement_deduction: f64,
    pub ceiling_exceeded: bool,
}

impl DeclarantIncome {
    /// Salary net of deductions, before any household-level flooring.
    fn net(self) -> f64 {
        self.gross - self.deduction - self.retirement_deduction
    }

    pub fn individual_taxable(self) -> f64 {
        self.net().max(0.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BracketTax {
    pub tax: f64,
    pub parts: f64,
    pub quotient: f64,
    pub marginal_rate: f64,
    pub marginal_index: Option<usize>,
    pub slices: Vec<BracketSlice>,
}

#[derive(Debug, Clone, Copy)]
struct CappingStep {
    retained_tax: f64,
    was_capped: bool,
    ceiling: f64,
    advantage_granted: f64,
}

pub fn compute_tax(inputs: &TaxInputs, config: &TaxYearConfig) -> SimulationResult {
    let mut trace = Vec::new();

    let first = resolve_declarant(&inputs.declarant1, &config.standard_deduction);
    let second = inputs
        .second_declarant()
        .map(|declarant| resolve_declarant(declarant, &config.standard_deduction));

    let gross_income = first.gross + second.map_or(0.0, |d| d.gross);
    let taxable_income = (first.net() + second.map_or(0.0, |d| d.net())
        - inputs.common_charges.max(0.0))
    .max(0.0);
    let reference_income = gross_income * config.reference_income_rate;

    trace.push(format!("Gross salaries: {gross_income:.0}"));
    trace.push(format!(
        "Professional deductions: {:.0}",
        first.deduction + second.map_or(0.0, |d| d.deduction)
    ));
    let retirement_total =
        first.retirement_deduction + second.map_or(0.0, |d| d.retirement_deduction);
    if retirement_total > 0.0 {
        trace.push(format!("Retirement savings deducted: {retirement_total:.0}"));
    }
    if inputs.common_charges > 0.0 {
        trace.push(format!("Deductible charges: {:.0}", inputs.common_charges));
    }
    trace.push(format!("Taxable income: {taxable_income:.0}"));

    let parts = fiscal_parts(inputs.situation, inputs.dependents);
    let base_parts = capping_base_parts(inputs.situation);
    trace.push(format!("Fiscal parts: {parts}"));

    let actual = bracket_tax(taxable_income, parts, &config.brackets);
    let base = bracket_tax(taxable_income, base_parts, &config.brackets);
    trace.push(format!(
        "Gross tax at {parts} parts (quotient {:.0}): {:.0}",
        actual.quotient, actual.tax
    ));

    let capping = resolve_capping(
        &actual,
        &base,
        parts,
        base_parts,
        config.quotient_cap_per_half_part,
    );
    if capping.was_capped {
        debug!(
            actual_tax = actual.tax,
            base_tax = base.tax,
            ceiling = capping.ceiling,
            "quotient-familial advantage capped"
        );
        trace.push(format!(
            "Tax at {base_parts} reference parts: {:.0}; advantage capped at {:.0}, tax raised to {:.0}",
            base.tax, capping.ceiling, capping.retained_tax
        ));
    }

    let widow_relief = widow_relief(
        inputs.situation,
        &capping,
        actual.tax,
        config.widow_relief_cap,
    );
    if widow_relief > 0.0 {
        debug!(widow_relief, "widowed complementary relief granted");
        trace.push(format!("Widowed complementary relief: -{widow_relief:.0}"));
    }
    let tax_before_decote = (capping.retained_tax - widow_relief).max(0.0);

    let decote = decote_for(inputs.situation, tax_before_decote, &config.decote);
    if decote > 0.0 {
        debug!(tax_before_decote, decote, "low-income relief applied");
        trace.push(format!("Low-income relief (decote): -{decote:.0}"));
    }
    let tax_before_credits = (tax_before_decote - decote).max(0.0);

    if inputs.tax_credits > 0.0 {
        trace.push(format!("Declared tax credits: -{:.0}", inputs.tax_credits));
    }
    let final_tax = apply_credits(
        tax_before_credits,
        inputs.tax_credits,
        config.recovery_threshold,
    );
    if final_tax == 0.0 && tax_before_credits - inputs.tax_credits.max(0.0) > 0.0 {
        trace.push(format!(
            "Tax below the recovery threshold of {:.0}: waived",
            config.recovery_threshold
        ));
    }
    trace.push(format!("Income tax: {final_tax:.0}"));

    let surtax = surtax_for(inputs.situation, reference_income, &config.surtax);
    if surtax > 0.0 {
        debug!(reference_income, surtax, "high-income surtax due");
        trace.push(format!(
            "High-income surtax on reference income {reference_income:.0}: +{surtax:.0}"
        ));
    }
    let total_tax = final_tax + surtax;
    trace.push(format!("Total tax: {total_tax:.0}"));

    let withholding_rates = allocate_withholding(
        inputs.situation,
        &first,
        second.as_ref(),
        tax_before_credits,
        parts,
        config,
    );

    // A capped household is reported on its reference basis so the breakdown
    // and marginal rate agree with the retained tax.
    let reported = if capping.was_capped { base } else { actual };
    let optimizer_suggestion = suggest_contribution(&reported, &config.brackets);

    SimulationResult {
        situation: inputs.situation,
        gross_income,
        taxable_income,
        reference_income,
        fiscal_parts: parts,
        quotient: reported.quotient,
        gross_tax_before_relief: capping.retained_tax,
        tax_before_credits,
        final_tax,
        surtax,
        total_tax,
        marginal_rate: reported.marginal_rate,
        withholding_rates,
        bracket_breakdown: reported.slices,
        capping: CappingOutcome {
            was_capped: capping.was_capped,
            base_parts,
            ceiling: capping.ceiling,
            advantage_granted: capping.advantage_granted,
            reference_tax_base: capping.retained_tax,
            widow_relief,
        },
        decote: DecoteOutcome {
            amount_applied: decote,
            tax_before_decote,
        },
        retirement_cap_warnings: RetirementCapWarnings {
            declarant1_exceeded: first.ceiling_exceeded,
            declarant2_exceeded: second.is_some_and(|d| d.ceiling_exceeded),
        },
        optimizer_suggestion,
        narrative_trace: trace,
    }
}

fn resolve_declarant(
    declarant: &DeclarantInputs,
    deduction: &StandardDeduction,
) -> DeclarantIncome {
    let gross = declarant.gross_salary.max(0.0);
    let (retirement_deduction, ceiling_exceeded) = cap_retirement_contribution(
        declarant.retirement_contribution,
        declarant.retirement_ceiling,
    );
    DeclarantIncome {
        gross,
        deduction: professional_deduction(
            gross,
            declarant.professional_expenses,
            declarant.treat_gross_as_taxable,
            deduction,
        ),
        retirement_deduction,
        ceiling_exceeded,
    }
}

/// Never exceeds the salary it applies to, so a small second salary cannot
/// push the household total below what the first earner alone declares.
pub(crate) fn professional_deduction(
    salary: f64,
    declared_expenses: f64,
    treat_gross_as_taxable: bool,
    standard: &StandardDeduction,
) -> f64 {
    if treat_gross_as_taxable || salary <= 0.0 {
        return 0.0;
    }
    let flat = (salary * standard.rate)
        .min(standard.ceiling)
        .max(standard.floor);
    flat.max(declared_expenses.max(0.0)).min(salary)
}

fn cap_retirement_contribution(contribution: f64, ceiling: f64) -> (f64, bool) {
    let contribution = contribution.max(0.0);
    let ceiling = ceiling.max(0.0);
    (contribution.min(ceiling), contribution > ceiling)
}

pub(crate) fn fiscal_parts(situation: Situation, dependents: u32) -> f64 {
    let base = match situation {
        Situation::Married => 2.0,
        Situation::Widowed if dependents > 0 => 2.0,
        Situation::Widowed | Situation::Single => 1.0,
    };
    let dependent_parts = match dependents {
        0 => 0.0,
        1 => 0.5,
        n => 1.0 + f64::from(n - 2),
    };
    base + dependent_parts
}

/// Reference part count for the quotient-familial ceiling. Widowed households
/// fall back to one part even when dependents lifted their own base to two.
pub(crate) fn capping_base_parts(situation: Situation) -> f64 {
    match situation {
        Situation::Married => 2.0,
        Situation::Single | Situation::Widowed => 1.0,
    }
}

pub(crate) fn bracket_tax(income: f64, parts: f64, brackets: &[TaxBracket]) -> BracketTax {
    let parts = parts.max(1.0);
    let quotient = income.max(0.0) / parts;

    let mut per_part_tax = 0.0;
    let mut previous_limit = 0.0;
    let mut marginal_rate = 0.0;
    let mut marginal_index = None;
    let mut slices = Vec::new();

    for (index, bracket) in brackets.iter().enumerate() {
        let limit = bracket.limit();
        let amount = (quotient.min(limit) - previous_limit).max(0.0);
        if amount > 0.0 {
            per_part_tax += amount * bracket.rate;
            slices.push(BracketSlice {
                rate_label: bracket.label(),
                rate: bracket.rate,
                amount,
            });
            if bracket.rate > 0.0 {
                marginal_rate = bracket.rate;
                marginal_index = Some(index);
            }
        }
        if quotient <= limit {
            break;
        }
        previous_limit = limit;
    }

    if slices.is_empty() {
        slices.push(BracketSlice {
            rate_label: "0%".to_string(),
            rate: 0.0,
            amount: 0.0,
        });
    }

    BracketTax {
        tax: (per_part_tax * parts).floor(),
        parts,
        quotient,
        marginal_rate,
        marginal_index,
        slices,
    }
}

fn resolve_capping(
    actual: &BracketTax,
    base: &BracketTax,
    parts: f64,
    base_parts: f64,
    cap_per_half_part: f64,
) -> CappingStep {
    if parts <= base_parts {
        return CappingStep {
            retained_tax: actual.tax,
            was_capped: false,
            ceiling: 0.0,
            advantage_granted: 0.0,
        };
    }

    let ceiling = (parts - base_parts) * 2.0 * cap_per_half_part;
    let reference_floor = (base.tax - ceiling).max(0.0);
    let (retained_tax, was_capped) = if actual.tax < reference_floor {
        (reference_floor, true)
    } else {
        (actual.tax, false)
    };

    CappingStep {
        retained_tax,
        was_capped,
        ceiling,
        advantage_granted: (base.tax - retained_tax).max(0.0),
    }
}

fn widow_relief(
    situation: Situation,
    capping: &CappingStep,
    uncapped_tax: f64,
    relief_cap: f64,
) -> f64 {
    if situation != Situation::Widowed || !capping.was_capped {
        return 0.0;
    }
    (capping.retained_tax - uncapped_tax)
        .min(relief_cap)
        .max(0.0)
        .floor()
}

pub(crate) fn decote_for(situation: Situation, tax: f64, table: &DecoteTable) -> f64 {
    let limits = match situation {
        Situation::Married => &table.couple,
        Situation::Single | Situation::Widowed => &table.single,
    };
    if tax <= 0.0 || tax >= limits.threshold {
        return 0.0;
    }
    (limits.max_relief - table.rate * tax).max(0.0).min(tax)
}

fn apply_credits(tax_before_credits: f64, credits: f64, recovery_threshold: f64) -> f64 {
    let net = (tax_before_credits - credits.max(0.0)).max(0.0).round();
    if net < recovery_threshold { 0.0 } else { net }
}

fn surtax_for(situation: Situation, reference_income: f64, table: &SurtaxTable) -> f64 {
    let bands: &[SurtaxBand] = match situation {
        Situation::Married => &table.couple,
        Situation::Single | Situation::Widowed => &table.single,
    };
    bands
        .iter()
        .filter(|band| reference_income > band.lower_bound)
        .map(|band| {
            let upper = band.upper_bound.unwrap_or(f64::INFINITY);
            (reference_income.min(upper) - band.lower_bound) * band.rate
        })
        .sum::<f64>()
        .round()
}
