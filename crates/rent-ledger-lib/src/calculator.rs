use crate::data_structures::{Bill, BillCalculation, MonthSummary};
use crate::rates::{Rates, ROOM_RENT};

pub struct BillCalculator;

impl BillCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Derives the month's charges for one room. Missing rates fall back to
    /// the defaults; a meter that went backwards counts as zero usage.
    pub fn calculate(&self, bill: &Bill) -> BillCalculation {
        let rates = Rates::for_bill(bill);
        let occupants = bill.occupants as f64;

        let electricity_usage = (bill.electricity_new - bill.electricity_old).max(0.0);
        let electricity_cost = electricity_usage * rates.electricity_rate();
        let water_cost = occupants * rates.water_rate();
        let room_rent = occupants * ROOM_RENT;

        // Rent and water are a fixed charge per head; only electricity is shared.
        let per_person = if bill.occupants == 0 {
            0.0
        } else {
            (ROOM_RENT + rates.water_rate()) + electricity_cost / occupants
        };

        BillCalculation::new(
            electricity_usage,
            electricity_cost,
            water_cost,
            room_rent,
            per_person,
        )
    }

    pub fn summarize_month(&self, bills: &[Bill]) -> MonthSummary {
        let mut summary = MonthSummary {
            rooms: bills.len(),
            ..MonthSummary::default()
        };

        for bill in bills {
            let calculation = self.calculate(bill);

            if bill.occupants > 0 {
                summary.occupied_rooms += 1;
            }
            summary.occupants += bill.occupants;
            summary.electricity_usage += calculation.electricity_usage();
            summary.total_revenue += calculation.total_bill();

            if bill.is_paid {
                summary.paid_rooms += 1;
                summary.collected += calculation.total_bill();
            } else {
                summary.outstanding += calculation.total_bill();
            }
        }

        summary
    }
}

impl Default for BillCalculator {
    fn default() -> Self {
        Self::new()
    }
}
