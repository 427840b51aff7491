//! Budget aggregation over a trip's priced activities and recorded payments.
//!
//! Nothing here is persisted; the report is rebuilt from the live rows on
//! every request.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::currency::{format_money, ExchangeRates, RateSource, DEFAULT_CURRENCY};
use crate::kinds::{ActivityType, PaymentStatus};
use crate::models::{CarRental, Hotel, Payment, Restaurant, TouristSite, Transportation};

pub trait PricedActivity {
    fn activity_type(&self) -> ActivityType;
    fn activity_id(&self) -> Uuid;
    fn label(&self) -> String;
    fn price_cents(&self) -> Option<i64>;
    fn currency(&self) -> Option<&str>;
    fn payment_status(&self) -> Option<&str>;
}

macro_rules! priced_activity {
    ($model:ty, $kind:expr, |$row:ident| $label:expr) => {
        impl PricedActivity for $model {
            fn activity_type(&self) -> ActivityType {
                $kind
            }

            fn activity_id(&self) -> Uuid {
                self.id
            }

            fn label(&self) -> String {
                let $row = self;
                $label
            }

            fn price_cents(&self) -> Option<i64> {
                self.price_cents
            }

            fn currency(&self) -> Option<&str> {
                self.currency.as_deref()
            }

            fn payment_status(&self) -> Option<&str> {
                self.payment_status.as_deref()
            }
        }
    };
}

priced_activity!(Hotel, ActivityType::Hotel, |row| row.name.clone());
priced_activity!(Transportation, ActivityType::Transportation, |row| format!(
    "{} → {}",
    row.origin, row.destination
));
priced_activity!(CarRental, ActivityType::CarRental, |row| row.company.clone());
priced_activity!(Restaurant, ActivityType::Restaurant, |row| row.name.clone());
priced_activity!(TouristSite, ActivityType::TouristSite, |row| row.name.clone());

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetItem {
    pub activity_type: ActivityType,
    pub activity_id: Uuid,
    pub label: String,
    pub price_cents: i64,
    pub currency: String,
    pub declared_status: Option<PaymentStatus>,
}

impl BudgetItem {
    /// Activities without both a price and a currency are left out of the
    /// budget.
    pub fn from_activity<A: PricedActivity + ?Sized>(activity: &A) -> Option<Self> {
        Some(Self {
            activity_type: activity.activity_type(),
            activity_id: activity.activity_id(),
            label: activity.label(),
            price_cents: activity.price_cents()?,
            currency: activity.currency()?.to_string(),
            declared_status: activity.payment_status().and_then(PaymentStatus::parse),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEntry {
    pub activity_type: ActivityType,
    pub activity_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
}

impl PaymentEntry {
    pub fn from_payment(payment: &Payment) -> Option<Self> {
        Some(Self {
            activity_type: ActivityType::parse(&payment.activity_type)?,
            activity_id: payment.activity_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetLine {
    pub activity_type: ActivityType,
    pub activity_id: Uuid,
    pub label: String,
    pub currency: String,
    pub price_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub status: PaymentStatus,
    pub payment_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
}

impl Totals {
    /// Sums saturate at `i64::MAX` instead of wrapping.
    fn add(&mut self, total: i64, paid: i64, remaining: i64) {
        self.total_cents = self.total_cents.saturating_add(total);
        self.paid_cents = self.paid_cents.saturating_add(paid);
        self.remaining_cents = self.remaining_cents.saturating_add(remaining);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrencyTotals {
    pub currency: String,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityTypeTotals {
    pub activity_type: ActivityType,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertedTotals {
    pub currency: String,
    #[serde(flatten)]
    pub totals: Totals,
    pub formatted_total: String,
    pub formatted_paid: String,
    pub formatted_remaining: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetReport {
    pub currency: String,
    pub rates_source: RateSource,
    pub lines: Vec<BudgetLine>,
    pub by_currency: Vec<CurrencyTotals>,
    pub by_activity_type: Vec<ActivityTypeTotals>,
    pub totals: ConvertedTotals,
    pub unconverted_currencies: Vec<String>,
}

/// Most frequent currency among the items, ties broken alphabetically.
pub fn default_currency(items: &[BudgetItem]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item.currency.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .fold(None::<(&str, usize)>, |best, (code, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((code, count)),
        })
        .map(|(code, _)| code.to_string())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// Status derived from what has been paid. An activity priced at zero owes
/// nothing and counts as paid.
fn derive_status(price_cents: i64, paid_cents: i64) -> PaymentStatus {
    if paid_cents >= price_cents {
        PaymentStatus::Paid
    } else if paid_cents > 0 {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

pub fn build_report(
    mut items: Vec<BudgetItem>,
    payments: &[PaymentEntry],
    rates: &ExchangeRates,
    target_currency: &str,
) -> BudgetReport {
    items.sort_by(|a, b| {
        a.activity_type
            .cmp(&b.activity_type)
            .then_with(|| a.label.cmp(&b.label))
    });

    let mut payments_by_activity: HashMap<(ActivityType, Uuid), Vec<&PaymentEntry>> =
        HashMap::new();
    for payment in payments {
        payments_by_activity
            .entry((payment.activity_type, payment.activity_id))
            .or_default()
            .push(payment);
    }

    let mut unconverted: BTreeSet<String> = BTreeSet::new();
    let mut by_currency: BTreeMap<String, Totals> = BTreeMap::new();
    let mut by_type: BTreeMap<ActivityType, Totals> = BTreeMap::new();
    let mut converted = Totals::default();
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        let matched = payments_by_activity
            .get(&(item.activity_type, item.activity_id))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut paid: i64 = 0;
        for payment in matched {
            match rates.convert(payment.amount_cents, &payment.currency, &item.currency) {
                Some(amount) => paid = paid.saturating_add(amount),
                None => {
                    unconverted.insert(payment.currency.clone());
                }
            }
        }
        if matched.is_empty() && item.declared_status == Some(PaymentStatus::Paid) {
            paid = item.price_cents;
        }

        let remaining = item.price_cents.saturating_sub(paid).max(0);
        let status = derive_status(item.price_cents, paid);

        by_currency
            .entry(item.currency.clone())
            .or_default()
            .add(item.price_cents, paid, remaining);

        let to_target = |amount| rates.convert(amount, &item.currency, target_currency);
        match (
            to_target(item.price_cents),
            to_target(paid),
            to_target(remaining),
        ) {
            (Some(total), Some(paid), Some(remaining)) => {
                converted.add(total, paid, remaining);
                by_type
                    .entry(item.activity_type)
                    .or_default()
                    .add(total, paid, remaining);
            }
            _ => {
                unconverted.insert(item.currency.clone());
            }
        }

        lines.push(BudgetLine {
            activity_type: item.activity_type,
            activity_id: item.activity_id,
            label: item.label,
            currency: item.currency,
            price_cents: item.price_cents,
            paid_cents: paid,
            remaining_cents: remaining,
            status,
            payment_count: matched.len(),
        });
    }

    BudgetReport {
        currency: target_currency.to_string(),
        rates_source: rates.source,
        lines,
        by_currency: by_currency
            .into_iter()
            .map(|(currency, totals)| CurrencyTotals { currency, totals })
            .collect(),
        by_activity_type: by_type
            .into_iter()
            .map(|(activity_type, totals)| ActivityTypeTotals {
                activity_type,
                totals,
            })
            .collect(),
        totals: ConvertedTotals {
            currency: target_currency.to_string(),
            formatted_total: format_money(converted.total_cents, target_currency),
            formatted_paid: format_money(converted.paid_cents, target_currency),
            formatted_remaining: format_money(converted.remaining_cents, target_currency),
            totals: converted,
        },
        unconverted_currencies: unconverted.into_iter().collect(),
    }
}
