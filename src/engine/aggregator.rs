use crate::domain::{Affiliate, AffiliateId, CommissionEntry, CommissionStatus, Decimal};
use serde::Serialize;
use std::collections::BTreeMap;

/// Dashboard totals over a set of commission entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionStats {
    pub total_commissions: Decimal,
    pub paid_commissions: Decimal,
    pub pending_commissions: Decimal,
    pub approved_commissions: Decimal,
    pub total_revenue: Decimal,
    pub active_affiliate_count: usize,
    /// Mean upfront rate across the affiliates passed in, 2 dp.
    pub avg_commission_rate: Decimal,
    pub entry_count: usize,
}

/// Per-affiliate rollup used by the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateCommissionSummary {
    pub affiliate_id: AffiliateId,
    pub affiliate_name: Option<String>,
    pub entry_count: usize,
    pub total_commission: Decimal,
    pub paid_commission: Decimal,
    pub total_revenue: Decimal,
}

/// Stateless rollups. Output depends only on the input sequence.
pub struct CommissionAggregator;

impl CommissionAggregator {
    pub fn stats(entries: &[CommissionEntry], affiliates: &[Affiliate]) -> CommissionStats {
        let sum_status = |status: CommissionStatus| -> Decimal {
            entries
                .iter()
                .filter(|e| e.status == status)
                .map(|e| e.commission_amount)
                .sum()
        };

        CommissionStats {
            total_commissions: entries.iter().map(|e| e.commission_amount).sum(),
            paid_commissions: sum_status(CommissionStatus::Paid),
            pending_commissions: sum_status(CommissionStatus::Pending),
            approved_commissions: sum_status(CommissionStatus::Approved),
            total_revenue: entries.iter().map(|e| e.order_total).sum(),
            active_affiliate_count: affiliates.iter().filter(|a| a.is_active()).count(),
            avg_commission_rate: mean_upfront_rate(affiliates),
            entry_count: entries.len(),
        }
    }

    /// Totals per affiliate, highest total commission first.
    ///
    /// Cancelled entries are left out. Ties are broken by affiliate id.
    pub fn by_affiliate(entries: &[CommissionEntry]) -> Vec<AffiliateCommissionSummary> {
        let mut grouped: BTreeMap<&AffiliateId, AffiliateCommissionSummary> = BTreeMap::new();

        for entry in entries
            .iter()
            .filter(|e| e.status != CommissionStatus::Cancelled)
        {
            let summary = grouped
                .entry(&entry.affiliate_id)
                .or_insert_with(|| AffiliateCommissionSummary {
                    affiliate_id: entry.affiliate_id.clone(),
                    affiliate_name: entry.affiliate_name.clone(),
                    entry_count: 0,
                    total_commission: Decimal::zero(),
                    paid_commission: Decimal::zero(),
                    total_revenue: Decimal::zero(),
                });
            summary.entry_count += 1;
            summary.total_commission = summary.total_commission + entry.commission_amount;
            summary.total_revenue = summary.total_revenue + entry.order_total;
            if entry.status == CommissionStatus::Paid {
                summary.paid_commission = summary.paid_commission + entry.commission_amount;
            }
        }

        let mut ranked: Vec<AffiliateCommissionSummary> = grouped.into_values().collect();
        ranked.sort_by(|a, b| {
            b.total_commission
                .cmp(&a.total_commission)
                .then_with(|| a.affiliate_id.cmp(&b.affiliate_id))
        });
        ranked
    }
}

fn mean_upfront_rate(affiliates: &[Affiliate]) -> Decimal {
    if affiliates.is_empty() {
        return Decimal::zero();
    }
    let total: Decimal = affiliates.iter().map(|a| a.upfront_rate).sum();
    let mean = total / Decimal::from_i64(affiliates.len() as i64);
    mean.round_dp(2)
}
