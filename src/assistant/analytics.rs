use super::temporal::{Intent, Period};
use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

/// At most this many month segments are computed for a breakdown, whatever
/// the period length, to bound store traffic.
const MAX_MONTH_SEGMENTS: usize = 12;
const TOP_CODES: usize = 8;

// ─── Consumed store interfaces (read-only, owned by the caller) ─────────────

/// Query scope handed to the order store.
///
/// The restriction to non-draft, paid orders is part of the interface rather
/// than an implicit implementation contract: every analytics query carries
/// these flags and implementations must honor them.
#[derive(Debug, Clone)]
pub struct OrderScope {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub exclude_drafts: bool,
    pub paid_only: bool,
}

impl OrderScope {
    pub fn paid(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            exclude_drafts: true,
            paid_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct SalesTotals {
    pub orders: u64,
    pub items: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductSales {
    pub product_id: u64,
    pub quantity: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CodeUsage {
    pub code: String,
    pub uses: u64,
}

/// Aggregate queries over the order/discount store.
pub trait OrderStore: Send + Sync {
    fn sales_totals(&self, scope: &OrderScope) -> anyhow::Result<SalesTotals>;
    /// Per-product quantity/revenue aggregates within the scope.
    fn product_sales(&self, scope: &OrderScope) -> anyhow::Result<Vec<ProductSales>>;
    /// Per-discount-code usage counts within the scope.
    fn code_usage(&self, scope: &OrderScope) -> anyhow::Result<Vec<CodeUsage>>;
}

/// Read access to product name translations (locale → name).
pub trait ProductNameStore: Send + Sync {
    fn translations(&self, product_id: u64) -> anyhow::Result<HashMap<String, String>>;
}

// ─── Reports ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopProduct {
    pub product_id: u64,
    pub name: String,
    pub quantity: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopSellerReport {
    pub best_seller: Option<TopProduct>,
    pub totals: SalesTotals,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthSegment {
    /// Calendar month key, `YYYY-MM`.
    pub month: String,
    pub orders: u64,
    pub revenue: f64,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AverageOrderReport {
    pub orders: u64,
    pub revenue: f64,
    pub average: f64,
    pub monthly: Vec<MonthSegment>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PromoCodeReport {
    pub top_codes: Vec<CodeUsage>,
    pub total_uses: u64,
    /// Lookup result for a code quoted in the question, when one was found.
    pub requested_code: Option<CodeUsage>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverviewReport {
    pub top_seller: TopSellerReport,
    pub average_order: AverageOrderReport,
    pub promo_codes: PromoCodeReport,
}

/// Intent-shaped analytics report, serialized into the assistant prompt.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyticsReport {
    TopSellingProduct(TopSellerReport),
    AverageOrderValue(AverageOrderReport),
    PromoCodeUsage(PromoCodeReport),
    Overview(OverviewReport),
}

// ─── Assembler ──────────────────────────────────────────────────────────────

/// A code the merchant quoted after the word "code", e.g. `code "ETE2024"`.
static QUOTED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)code[^"'«»]{0,40}["'«]\s*([A-Za-z0-9_-]{2,64})\s*["'»]"#)
        .expect("valid quoted-code regex")
});

pub struct AnalyticsAssembler<'a> {
    orders: &'a dyn OrderStore,
    products: &'a dyn ProductNameStore,
    locale: &'a str,
}

impl<'a> AnalyticsAssembler<'a> {
    pub fn new(
        orders: &'a dyn OrderStore,
        products: &'a dyn ProductNameStore,
        locale: &'a str,
    ) -> Self {
        Self {
            orders,
            products,
            locale,
        }
    }

    /// Assemble the report matching `(intent, period)`. The raw question is
    /// only consulted for the quoted promo-code lookup.
    pub fn assemble(
        &self,
        intent: Intent,
        period: &Period,
        question: &str,
    ) -> anyhow::Result<AnalyticsReport> {
        Ok(match intent {
            Intent::TopSellingProduct => {
                AnalyticsReport::TopSellingProduct(self.top_seller(period)?)
            }
            Intent::AverageOrderValue => {
                AnalyticsReport::AverageOrderValue(self.average_order(period)?)
            }
            Intent::PromoCodeUsage => {
                AnalyticsReport::PromoCodeUsage(self.promo_codes(period, question)?)
            }
            Intent::Overview => AnalyticsReport::Overview(OverviewReport {
                top_seller: self.top_seller(period)?,
                average_order: self.average_order(period)?,
                promo_codes: self.promo_codes(period, question)?,
            }),
        })
    }

    fn scope(period: &Period) -> OrderScope {
        OrderScope::paid(period.start, period.end)
    }

    fn top_seller(&self, period: &Period) -> anyhow::Result<TopSellerReport> {
        let scope = Self::scope(period);
        let mut sales = self.orders.product_sales(&scope)?;
        // Best seller by quantity, ties broken by revenue, descending.
        sales.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then(b.revenue.total_cmp(&a.revenue))
        });

        let best_seller = match sales.first() {
            Some(top) => Some(TopProduct {
                product_id: top.product_id,
                name: self.product_name(top.product_id),
                quantity: top.quantity,
                revenue: top.revenue,
            }),
            None => None,
        };

        Ok(TopSellerReport {
            best_seller,
            totals: self.orders.sales_totals(&scope)?,
        })
    }

    fn average_order(&self, period: &Period) -> anyhow::Result<AverageOrderReport> {
        let totals = self.orders.sales_totals(&Self::scope(period))?;
        let average = if totals.orders == 0 {
            0.0
        } else {
            totals.revenue / totals.orders as f64
        };

        let mut monthly = Vec::new();
        let mut cursor =
            NaiveDate::from_ymd_opt(period.start.year(), period.start.month(), 1)
                .expect("month start exists");
        while monthly.len() < MAX_MONTH_SEGMENTS {
            let month_start = cursor.and_time(NaiveTime::MIN);
            if month_start > period.end {
                break;
            }
            let month_end = (cursor + Months::new(1) - Days::new(1))
                .and_hms_opt(23, 59, 59)
                .expect("valid end of day");

            // Each segment is clipped to the period and computed independently.
            let start = month_start.max(period.start);
            let end = month_end.min(period.end);
            let segment = self.orders.sales_totals(&OrderScope::paid(start, end))?;
            monthly.push(MonthSegment {
                month: cursor.format("%Y-%m").to_string(),
                orders: segment.orders,
                revenue: segment.revenue,
                average: if segment.orders == 0 {
                    0.0
                } else {
                    segment.revenue / segment.orders as f64
                },
            });
            cursor = cursor + Months::new(1);
        }

        Ok(AverageOrderReport {
            orders: totals.orders,
            revenue: totals.revenue,
            average,
            monthly,
        })
    }

    fn promo_codes(&self, period: &Period, question: &str) -> anyhow::Result<PromoCodeReport> {
        let mut usage = self.orders.code_usage(&Self::scope(period))?;
        usage.sort_by(|a, b| b.uses.cmp(&a.uses).then(a.code.cmp(&b.code)));

        let total_uses = usage.iter().map(|u| u.uses).sum();
        let requested_code = extract_quoted_code(question).map(|code| {
            usage
                .iter()
                .find(|u| u.code.eq_ignore_ascii_case(&code))
                .cloned()
                .unwrap_or(CodeUsage { code, uses: 0 })
        });
        usage.truncate(TOP_CODES);

        Ok(PromoCodeReport {
            top_codes: usage,
            total_uses,
            requested_code,
        })
    }

    fn product_name(&self, product_id: u64) -> String {
        resolve_product_name(self.products, self.locale, product_id)
    }
}

/// Fallback chain: active locale → fr → en → any translation → literal
/// placeholder.
pub fn resolve_product_name(
    store: &dyn ProductNameStore,
    active_locale: &str,
    product_id: u64,
) -> String {
    let translations = store.translations(product_id).unwrap_or_default();

    for locale in [active_locale, "fr", "en"] {
        if let Some(name) = translations.get(locale).filter(|n| !n.trim().is_empty()) {
            return name.clone();
        }
    }
    let mut locales: Vec<&String> = translations.keys().collect();
    locales.sort();
    for locale in locales {
        if let Some(name) = translations.get(locale).filter(|n| !n.trim().is_empty()) {
            return name.clone();
        }
    }
    format!("Produit #{product_id}")
}

fn extract_quoted_code(question: &str) -> Option<String> {
    QUOTED_CODE
        .captures(question)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
