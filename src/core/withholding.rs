use super::config::TaxYearConfig;
use super::engine::{DeclarantIncome, bracket_tax, decote_for};
use super::types::{Situation, WithholdingRates};

/// Splits the household rate between the two earners of a married couple.
///
/// The lower earner is charged the tax their own taxable income would bear at
/// the household's part count and décote rule; the higher earner absorbs the
/// rest. Equal salaries leave declarant 1 in the lower-earner role.
pub(crate) fn allocate_withholding(
    situation: Situation,
    first: &DeclarantIncome,
    second: Option<&DeclarantIncome>,
    household_tax: f64,
    parts: f64,
    config: &TaxYearConfig,
) -> WithholdingRates {
    let total_gross = first.gross + second.map_or(0.0, |d| d.gross);
    let household = if total_gross > 0.0 {
        household_tax / total_gross
    } else {
        0.0
    };

    let Some(second) = second else {
        return WithholdingRates {
            household,
            declarant1: household,
            declarant2: 0.0,
        };
    };
    if first.gross <= 0.0 || second.gross <= 0.0 {
        return WithholdingRates {
            household,
            declarant1: household,
            declarant2: household,
        };
    }

    let second_is_lower = second.gross < first.gross;
    let (lower, higher) = if second_is_lower {
        (second, first)
    } else {
        (first, second)
    };

    let theoretical = bracket_tax(lower.individual_taxable(), parts, &config.brackets).tax;
    let lower_share = (theoretical - decote_for(situation, theoretical, &config.decote)).max(0.0);
    let higher_share = (household_tax - lower_share).max(0.0);

    let lower_rate = lower_share / lower.gross;
    let higher_rate = higher_share / higher.gross;

    if second_is_lower {
        WithholdingRates {
            household,
            declarant1: higher_rate,
            declarant2: lower_rate,
        }
    } else {
        WithholdingRates {
            household,
            declarant1: lower_rate,
            declarant2: higher_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn earner(gross: f64) -> DeclarantIncome {
        DeclarantIncome {
            gross,
            deduction: (gross * 0.1).clamp(504.0, 14_426.0),
            retirement_deduction: 0.0,
            ceiling_exceeded: false,
        }
    }

    #[test]
    fn single_household_shares_rate_with_first_declarant() {
        let config = TaxYearConfig::year_2025();
        let rates = allocate_withholding(
            Situation::Single,
            &earner(50_000.0),
            None,
            5_000.0,
            1.0,
            &config,
        );
        assert_approx(rates.household, 0.1);
        assert_approx(rates.declarant1, 0.1);
        assert_approx(rates.declarant2, 0.0);
    }

    #[test]
    fn mono_income_couple_uses_household_rate_for_both() {
        let config = TaxYearConfig::year_2025();
        let rates = allocate_withholding(
            Situation::Married,
            &earner(60_000.0),
            Some(&earner(0.0)),
            3_000.0,
            2.0,
            &config,
        );
        assert_approx(rates.declarant1, 0.05);
        assert_approx(rates.declarant2, 0.05);
    }

    #[test]
    fn lower_earner_is_charged_individual_tax_at_household_parts() {
        let config = TaxYearConfig::year_2025();
        // 54 000 taxable at 2 parts: quotient 27 000, 1 705.33 per part, 3 410 in total.
        let lower = earner(60_000.0);
        let higher = earner(100_000.0);
        let rates = allocate_withholding(
            Situation::Married,
            &higher,
            Some(&lower),
            20_000.0,
            2.0,
            &config,
        );
        assert_approx(rates.declarant2, 3_410.0 / 60_000.0);
        assert_approx(rates.declarant1, (20_000.0 - 3_410.0) / 100_000.0);
        assert_approx(rates.household, 20_000.0 / 160_000.0);
    }

    #[test]
    fn equal_salaries_put_first_declarant_in_lower_role() {
        let config = TaxYearConfig::year_2025();
        let rates = allocate_withholding(
            Situation::Married,
            &earner(60_000.0),
            Some(&earner(60_000.0)),
            10_000.0,
            2.0,
            &config,
        );
        assert_approx(rates.declarant1, 3_410.0 / 60_000.0);
        assert_approx(rates.declarant2, (10_000.0 - 3_410.0) / 60_000.0);
    }

    #[test]
    fn higher_share_is_floored_at_zero() {
        let config = TaxYearConfig::year_2025();
        let rates = allocate_withholding(
            Situation::Married,
            &earner(60_000.0),
            Some(&earner(70_000.0)),
            1_000.0,
            2.0,
            &config,
        );
        assert_approx(rates.declarant2, 0.0);
    }
}
