use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use strum::Display;

/// Classified category of an analytical free-text question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    Overview,
    TopSellingProduct,
    AverageOrderValue,
    PromoCodeUsage,
}

/// Resolved inclusive date range backing an analytics query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Human-readable label embedding the literal ISO start/end dates.
    pub label: String,
}

impl Period {
    fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        // The rules below construct start ≤ end by design; clamp anyway so
        // the invariant survives any future rule mistake.
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        let label = format!(
            "du {} au {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
        Self { start, end, label }
    }
}

// ─── Lexicons (immutable data, queried by normalized token) ─────────────────

/// Diacritic fold table for French text. Data, not branching logic.
static DIACRITICS: &[(char, &str)] = &[
    ('à', "a"),
    ('â', "a"),
    ('ä', "a"),
    ('é', "e"),
    ('è', "e"),
    ('ê', "e"),
    ('ë', "e"),
    ('î', "i"),
    ('ï', "i"),
    ('ô', "o"),
    ('ö', "o"),
    ('ù', "u"),
    ('û', "u"),
    ('ü', "u"),
    ('ç', "c"),
    ('œ', "oe"),
    ('æ', "ae"),
];

/// Month lexicon: French full/abbreviated names plus English aliases.
static MONTHS: &[(&str, u32)] = &[
    ("janvier", 1),
    ("janv", 1),
    ("january", 1),
    ("jan", 1),
    ("fevrier", 2),
    ("fev", 2),
    ("february", 2),
    ("feb", 2),
    ("mars", 3),
    ("march", 3),
    ("mar", 3),
    ("avril", 4),
    ("avr", 4),
    ("april", 4),
    ("apr", 4),
    ("mai", 5),
    ("may", 5),
    ("juin", 6),
    ("june", 6),
    ("jun", 6),
    ("juillet", 7),
    ("juil", 7),
    ("july", 7),
    ("jul", 7),
    ("aout", 8),
    ("august", 8),
    ("aug", 8),
    ("septembre", 9),
    ("sept", 9),
    ("september", 9),
    ("sep", 9),
    ("octobre", 10),
    ("oct", 10),
    ("october", 10),
    ("novembre", 11),
    ("nov", 11),
    ("november", 11),
    ("decembre", 12),
    ("dec", 12),
    ("december", 12),
];

/// French number words accepted in "N derniers jours/mois" (1–12).
static NUMBER_WORDS: &[(&str, u32)] = &[
    ("un", 1),
    ("une", 1),
    ("deux", 2),
    ("trois", 3),
    ("quatre", 4),
    ("cinq", 5),
    ("six", 6),
    ("sept", 7),
    ("huit", 8),
    ("neuf", 9),
    ("dix", 10),
    ("onze", 11),
    ("douze", 12),
];

const LAST_N_PATTERN: &str =
    r"\b(\d{1,3}|un|une|deux|trois|quatre|cinq|six|sept|huit|neuf|dix|onze|douze)\s+derniers?\s+";

static LAST_N_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("{LAST_N_PATTERN}jours?\\b")).expect("valid regex"));
static LAST_N_MONTHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("{LAST_N_PATTERN}mois\\b")).expect("valid regex"));

/// Lowercase and fold diacritics so "Février" and "fevrier" compare equal.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        match DIACRITICS.iter().find(|(accented, _)| *accented == ch) {
            Some((_, folded)) => out.push_str(folded),
            None => out.push(ch),
        }
    }
    out
}

// ─── Intent classification ──────────────────────────────────────────────────

/// First match wins, in this priority: average basket, best seller,
/// promo code, overview.
pub fn classify_intent(question: &str) -> Intent {
    let text = normalize(question);
    let contains_any =
        |phrases: &[&str]| phrases.iter().any(|phrase| text.contains(phrase));

    if contains_any(&["panier moyen", "average order", "average basket"]) {
        Intent::AverageOrderValue
    } else if contains_any(&[
        "plus vendu",
        "meilleure vente",
        "meilleures ventes",
        "top produit",
        "best seller",
        "best-seller",
    ]) {
        Intent::TopSellingProduct
    } else if contains_any(&["code promo", "codes promo", "code de reduction", "coupon"]) {
        Intent::PromoCodeUsage
    } else {
        Intent::Overview
    }
}

// ─── Period resolution ──────────────────────────────────────────────────────

/// Resolve the calendar period a question refers to.
///
/// Rules are checked in priority order against the normalized text:
/// explicit month name (± year), "N derniers jours", "N derniers mois",
/// "mois dernier", "ce mois", "cette année", then an intent-specific default.
pub fn resolve_period(question: &str, intent: Intent, now: NaiveDateTime) -> Period {
    let text = normalize(question);

    if let Some(period) = named_month_period(&text, now) {
        return period;
    }
    if let Some(n) = captured_count(&LAST_N_DAYS, &text) {
        return Period::new(now - Days::new(u64::from(n)), now);
    }
    if let Some(n) = captured_count(&LAST_N_MONTHS, &text) {
        return Period::new(months_before(now, n), now);
    }
    if text.contains("mois dernier") {
        let previous = months_before(now, 1);
        return month_period(previous.year(), previous.month());
    }
    if text.contains("ce mois") || text.contains("mois en cours") {
        return Period::new(month_start(now.year(), now.month()), now);
    }
    if text.contains("cette annee") || text.contains("annee en cours") {
        let year_start = NaiveDate::from_ymd_opt(now.year(), 1, 1)
            .expect("january 1st exists")
            .and_time(NaiveTime::MIN);
        return Period::new(year_start, now);
    }

    match intent {
        Intent::Overview => Period::new(month_start(now.year(), now.month()), now),
        Intent::AverageOrderValue => Period::new(months_before(now, 2), now),
        Intent::PromoCodeUsage => Period::new(months_before(now, 3), now),
        Intent::TopSellingProduct => Period::new(month_start(now.year(), now.month()), now),
    }
}

/// Classify the intent and resolve the period in one pass, against an
/// explicit clock for determinism.
pub fn resolve(question: &str, now: NaiveDateTime) -> (Intent, Period) {
    let intent = classify_intent(question);
    let period = resolve_period(question, intent, now);
    (intent, period)
}

/// Same, against the real clock.
pub fn resolve_now(question: &str) -> (Intent, Period) {
    resolve(question, Utc::now().naive_utc())
}

fn captured_count(pattern: &Regex, text: &str) -> Option<u32> {
    let token = pattern.captures(text)?.get(1)?.as_str();
    if let Ok(n) = token.parse::<u32>() {
        return (n > 0).then_some(n);
    }
    NUMBER_WORDS
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, n)| *n)
}

/// Explicit month name, optionally followed by a 4-digit year.
///
/// Without a year: current year, unless the named month is strictly after the
/// current month, in which case the previous year (a named month equal to the
/// current month is "not future"). "sept" doubles as the number word in
/// "sept derniers jours", so a month token directly followed by "dernier…"
/// is left to the later rules.
fn named_month_period(text: &str, now: NaiveDateTime) -> Option<Period> {
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        let Some((_, month)) = MONTHS.iter().find(|(name, _)| name == token) else {
            continue;
        };
        let next = tokens.get(i + 1).copied();
        if next.is_some_and(|t| t.starts_with("dernier")) {
            continue;
        }

        let year = match next.and_then(parse_year) {
            Some(year) => year,
            None if *month > now.month() => now.year() - 1,
            None => now.year(),
        };
        return Some(month_period(year, *month));
    }
    None
}

fn parse_year(token: &str) -> Option<i32> {
    if token.len() != 4 {
        return None;
    }
    token.parse::<i32>().ok().filter(|y| (1970..=2100).contains(y))
}

fn month_start(year: i32, month: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, 1)
        .expect("month start exists")
        .and_time(NaiveTime::MIN)
}

fn month_period(year: i32, month: u32) -> Period {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("month start exists");
    let last = first + Months::new(1) - Days::new(1);
    Period::new(
        first.and_time(NaiveTime::MIN),
        last.and_hms_opt(23, 59, 59).expect("valid end of day"),
    )
}

fn months_before(now: NaiveDateTime, n: u32) -> NaiveDateTime {
    now.checked_sub_months(Months::new(n)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn intent_priority_order() {
        assert_eq!(
            classify_intent("Quel est le panier moyen ?"),
            Intent::AverageOrderValue
        );
        assert_eq!(
            classify_intent("Quel produit est le plus vendu ?"),
            Intent::TopSellingProduct
        );
        assert_eq!(
            classify_intent("Combien de fois le code promo a servi ?"),
            Intent::PromoCodeUsage
        );
        assert_eq!(classify_intent("Comment vont les ventes ?"), Intent::Overview);
        // Average basket outranks best seller when both appear.
        assert_eq!(
            classify_intent("panier moyen du produit le plus vendu"),
            Intent::AverageOrderValue
        );
    }

    #[test]
    fn diacritics_and_case_are_ignored() {
        let (_, upper) = resolve("Chiffres de Février", at(2024, 6, 15));
        let (_, lower) = resolve("chiffres de fevrier", at(2024, 6, 15));
        assert_eq!(upper.start, date(2024, 2, 1, 0, 0, 0));
        assert_eq!(upper, lower);
    }

    #[test]
    fn explicit_month_and_year() {
        let (intent, period) = resolve("Quel est le panier moyen en mai 2024 ?", at(2025, 1, 10));
        assert_eq!(intent, Intent::AverageOrderValue);
        assert_eq!(period.start, date(2024, 5, 1, 0, 0, 0));
        assert_eq!(period.end, date(2024, 5, 31, 23, 59, 59));
        assert_eq!(period.label, "du 2024-05-01 au 2024-05-31");
    }

    #[test]
    fn month_after_current_without_year_means_previous_year() {
        let (_, period) = resolve("ventes de juillet", at(2024, 3, 15));
        assert_eq!(period.start.year(), 2023);
        assert_eq!(period.start.month(), 7);
    }

    #[test]
    fn month_before_current_without_year_means_current_year() {
        let (_, period) = resolve("ventes de janvier", at(2024, 3, 15));
        assert_eq!(period.start.year(), 2024);
    }

    #[test]
    fn month_equal_to_current_is_not_future() {
        let (_, period) = resolve("ventes de mars", at(2024, 3, 15));
        assert_eq!(period.start.year(), 2024);
        assert_eq!(period.start.month(), 3);
    }

    #[test]
    fn february_month_end_is_correct() {
        let (_, period) = resolve("fevrier 2024", at(2024, 6, 1));
        assert_eq!(period.end, date(2024, 2, 29, 23, 59, 59));
    }

    #[test]
    fn last_n_days_digits_and_words() {
        let now = at(2024, 6, 15);
        let (_, digits) = resolve("ventes des 7 derniers jours", now);
        assert_eq!(digits.start, now - Days::new(7));
        assert_eq!(digits.end, now);

        let (_, words) = resolve("ventes des sept derniers jours", now);
        assert_eq!(words, digits);
    }

    #[test]
    fn last_n_months_words() {
        let now = at(2024, 6, 15);
        let (_, period) = resolve("chiffre d'affaires des trois derniers mois", now);
        assert_eq!(period.start, at(2024, 3, 15));
        assert_eq!(period.end, now);
    }

    #[test]
    fn previous_full_month() {
        let (_, period) = resolve("les ventes du mois dernier", at(2024, 3, 15));
        assert_eq!(period.start, date(2024, 2, 1, 0, 0, 0));
        assert_eq!(period.end, date(2024, 2, 29, 23, 59, 59));
    }

    #[test]
    fn current_month_and_current_year_run_to_now() {
        let now = at(2024, 3, 15);
        let (_, month) = resolve("les ventes de ce mois", now);
        assert_eq!(month.start, date(2024, 3, 1, 0, 0, 0));
        assert_eq!(month.end, now);

        let (_, year) = resolve("bilan de cette annee", now);
        assert_eq!(year.start, date(2024, 1, 1, 0, 0, 0));
        assert_eq!(year.end, now);
    }

    #[test]
    fn intent_specific_fallbacks() {
        let now = at(2024, 6, 15);
        let (_, overview) = resolve("comment va la boutique ?", now);
        assert_eq!(overview.start, date(2024, 6, 1, 0, 0, 0));

        let (_, aov) = resolve("quel est le panier moyen ?", now);
        assert_eq!(aov.start, at(2024, 4, 15));

        let (_, promo) = resolve("utilisation des codes promo ?", now);
        assert_eq!(promo.start, at(2024, 3, 15));
    }

    #[test]
    fn start_is_never_after_end() {
        let now = at(2024, 3, 15);
        let questions = [
            "mai 2024",
            "juillet",
            "mars",
            "decembre 2019",
            "5 derniers jours",
            "douze derniers mois",
            "mois dernier",
            "ce mois",
            "cette annee",
            "panier moyen",
            "codes promo",
            "rien de temporel ici",
        ];
        for question in questions {
            let (_, period) = resolve(question, now);
            assert!(
                period.start <= period.end,
                "start > end for {question:?}: {period:?}"
            );
        }
    }

    #[test]
    fn labels_embed_iso_dates() {
        let (_, period) = resolve("mois dernier", at(2024, 3, 15));
        assert_eq!(period.label, "du 2024-02-01 au 2024-02-29");
    }
}
