use super::config::TaxBracket;
use super::engine::BracketTax;
use super::types::OptimizerSuggestion;

/// Contribution that brings the quotient down to the top of the bracket just
/// below the marginal one, and the tax it would save at the marginal rate.
///
/// `basis` must be the computation the marginal rate was read from, so the
/// per-part gap is scaled by the same part count.
pub(crate) fn suggest_contribution(
    basis: &BracketTax,
    brackets: &[TaxBracket],
) -> OptimizerSuggestion {
    let Some(index) = basis.marginal_index else {
        return no_suggestion("No income is taxed above the zero-rate bracket.");
    };
    let Some(lower) = index.checked_sub(1).and_then(|i| brackets.get(i)) else {
        return no_suggestion("Already in the lowest taxed bracket.");
    };
    if lower.rate <= 0.0 {
        return no_suggestion("Already in the lowest taxed bracket.");
    }

    let gap_per_part = (basis.quotient - lower.limit()).max(0.0);
    // Rounded up so the contribution clears the bracket limit.
    let amount_to_invest = (gap_per_part * basis.parts).ceil();
    let estimated_saving = (amount_to_invest * basis.marginal_rate).round();

    OptimizerSuggestion {
        amount_to_invest,
        estimated_saving,
        target_rate: lower.rate,
        explanation: format!(
            "Deducting {amount_to_invest:.0} of retirement savings moves the marginal rate from {} to {} and saves about {estimated_saving:.0}.",
            rate_label(basis.marginal_rate),
            lower.label(),
        ),
    }
}

fn rate_label(rate: f64) -> String {
    TaxBracket {
        upper_bound: None,
        rate,
    }
    .label()
}

fn no_suggestion(explanation: &str) -> OptimizerSuggestion {
    OptimizerSuggestion {
        amount_to_invest: 0.0,
        estimated_saving: 0.0,
        target_rate: 0.0,
        explanation: explanation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaxYearConfig;
    use crate::core::engine::bracket_tax;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn thirty_percent_bracket_suggests_drop_to_eleven() {
        let brackets = TaxYearConfig::year_2025().brackets;
        let basis = bracket_tax(40_001.0, 1.0, &brackets);
        let suggestion = suggest_contribution(&basis, &brackets);

        assert_approx(suggestion.amount_to_invest, 10_686.0);
        assert_approx(suggestion.estimated_saving, 3_206.0);
        assert_approx(suggestion.target_rate, 0.11);
        assert!(suggestion.explanation.contains("from 30% to 11%"));
    }

    #[test]
    fn gap_is_scaled_by_basis_parts() {
        let brackets = TaxYearConfig::year_2025().brackets;
        let basis = bracket_tax(90_000.0, 2.5, &brackets);
        let suggestion = suggest_contribution(&basis, &brackets);

        // Quotient 36 000, 6 685 above the 29 315 limit on each of 2.5 parts.
        assert_approx(suggestion.amount_to_invest, 16_713.0);
        assert_approx(suggestion.target_rate, 0.11);
    }

    #[test]
    fn lowest_taxed_bracket_has_no_suggestion() {
        let brackets = TaxYearConfig::year_2025().brackets;
        let basis = bracket_tax(20_000.0, 1.0, &brackets);
        let suggestion = suggest_contribution(&basis, &brackets);

        assert_approx(suggestion.amount_to_invest, 0.0);
        assert_approx(suggestion.estimated_saving, 0.0);
        assert!(suggestion.explanation.contains("lowest taxed bracket"));
    }

    #[test]
    fn untaxed_income_has_no_suggestion() {
        let brackets = TaxYearConfig::year_2025().brackets;
        let basis = bracket_tax(5_000.0, 1.0, &brackets);
        let suggestion = suggest_contribution(&basis, &brackets);
        assert_approx(suggestion.amount_to_invest, 0.0);
    }
}
