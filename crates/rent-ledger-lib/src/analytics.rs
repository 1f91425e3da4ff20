use crate::calculator::BillCalculator;
use crate::data_structures::{Bill, MonthKey, ROOM_IDS};
use crate::error::StoreResult;
use crate::store::BillStore;
use serde::{Deserialize, Serialize};

/// Which months around the selected one the trend view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsWindow {
    /// Three months before through two months after.
    #[default]
    Centered,
    /// The six months ending at the selected one.
    Trailing,
}

impl AnalyticsWindow {
    pub fn months(&self, center: MonthKey) -> Vec<MonthKey> {
        let range = match self {
            AnalyticsWindow::Centered => -3..=2,
            AnalyticsWindow::Trailing => -5..=0,
        };
        range.map(|offset| center.offset(offset)).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomTrend {
    pub room_id: i64,
    pub usage: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthAnalytics {
    pub month: MonthKey,
    pub rooms: Vec<RoomTrend>,
    pub total_revenue: f64,
    pub total_usage: f64,
}

impl MonthAnalytics {
    pub fn room(&self, room_id: i64) -> Option<&RoomTrend> {
        self.rooms.iter().find(|room| room.room_id == room_id)
    }
}

/// Groups `bills` into one entry per month in `months`, one trend per
/// known room. Rooms or months without a row count as zero.
pub fn build_analytics(months: &[MonthKey], bills: &[Bill]) -> Vec<MonthAnalytics> {
    let calculator = BillCalculator::new();

    months
        .iter()
        .map(|&month| {
            let rooms: Vec<RoomTrend> = ROOM_IDS
                .iter()
                .map(|&room_id| {
                    let mut trend = RoomTrend {
                        room_id,
                        usage: 0.0,
                        revenue: 0.0,
                    };
                    for bill in bills
                        .iter()
                        .filter(|b| b.month_key == month && b.room_id == room_id)
                    {
                        let calculation = calculator.calculate(bill);
                        trend.usage += calculation.electricity_usage();
                        trend.revenue += calculation.total_bill();
                    }
                    trend
                })
                .collect();

            MonthAnalytics {
                month,
                total_revenue: rooms.iter().map(|r| r.revenue).sum(),
                total_usage: rooms.iter().map(|r| r.usage).sum(),
                rooms,
            }
        })
        .collect()
}

pub async fn fetch_analytics<S>(
    store: &S,
    center: MonthKey,
    window: AnalyticsWindow,
) -> StoreResult<Vec<MonthAnalytics>>
where
    S: BillStore + ?Sized,
{
    let months = window.months(center);
    let bills = store.select_months(&months).await?;
    tracing::debug!(
        "Loaded {} bills for analytics {}..{}",
        bills.len(),
        months[0],
        months[months.len() - 1]
    );
    Ok(build_analytics(&months, &bills))
}
