use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

const MONEY_SCALE: u32 = 2;

/// Rounds a monetary amount to cents, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// HT / tax / TTC of one priced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    pub total_ht: Decimal,
    pub total_tax: Decimal,
    pub total_ttc: Decimal,
}

impl LineTotals {
    /// `HT = qty x price`, `tax = HT x rate / 100`, `TTC = HT + tax`, each rounded to cents.
    pub fn compute(quantity: Decimal, unit_price: Decimal, tax_rate: Decimal) -> Self {
        let total_ht = round_money(quantity * unit_price);
        let total_tax = round_money(total_ht * tax_rate / Decimal::ONE_HUNDRED);
        Self {
            total_ht,
            total_tax,
            total_ttc: total_ht + total_tax,
        }
    }
}

/// Document totals; always the sum of the line totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub total_ht: Decimal,
    pub total_tax: Decimal,
    pub total_ttc: Decimal,
}

impl DocumentTotals {
    pub fn add(&mut self, line: &LineTotals) {
        self.total_ht += line.total_ht;
        self.total_tax += line.total_tax;
        self.total_ttc += line.total_ttc;
    }
}

impl<'a> FromIterator<&'a LineTotals> for DocumentTotals {
    fn from_iter<I: IntoIterator<Item = &'a LineTotals>>(iter: I) -> Self {
        let mut totals = DocumentTotals::default();
        for line in iter {
            totals.add(line);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(10), dec!(12.50), dec!(20), dec!(125.00), dec!(25.00), dec!(150.00))]
    #[case(dec!(3), dec!(0.333), dec!(0), dec!(1.00), dec!(0), dec!(1.00))]
    #[case(dec!(1), dec!(0.05), dec!(10), dec!(0.05), dec!(0.01), dec!(0.06))]
    #[case(dec!(7), dec!(19.99), dec!(5.5), dec!(139.93), dec!(7.70), dec!(147.63))]
    fn line_totals_round_to_cents(
        #[case] quantity: Decimal,
        #[case] price: Decimal,
        #[case] rate: Decimal,
        #[case] ht: Decimal,
        #[case] tax: Decimal,
        #[case] ttc: Decimal,
    ) {
        let totals = LineTotals::compute(quantity, price, rate);
        assert_eq!(totals.total_ht, ht);
        assert_eq!(totals.total_tax, tax);
        assert_eq!(totals.total_ttc, ttc);
    }

    #[test]
    fn document_totals_sum_lines() {
        let lines = [
            LineTotals::compute(dec!(10), dec!(12.50), dec!(20)),
            LineTotals::compute(dec!(2), dec!(99.99), dec!(0)),
        ];
        let totals: DocumentTotals = lines.iter().collect();
        assert_eq!(totals.total_ht, dec!(324.98));
        assert_eq!(totals.total_tax, dec!(25.00));
        assert_eq!(totals.total_ttc, totals.total_ht + totals.total_tax);
    }
}
