//! Property-based tests for field extraction

use super::*;
use chrono::NaiveDate;
use proptest::prelude::*;

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2100, 1u32..=12, 1u32..=31)
        .prop_filter_map("valid calendar date", |(y, m, d)| {
            NaiveDate::from_ymd_opt(y, m, d)
        })
}

fn arb_separator() -> impl Strategy<Value = char> {
    prop_oneof![Just('-'), Just('/'), Just('.')]
}

proptest! {
    #[test]
    fn prop_day_month_year_matches_iso(
        date in arb_date(),
        anchor in arb_date(),
        sep in arb_separator(),
    ) {
        let dmy = date.format("%d-%m-%Y").to_string().replace('-', &sep.to_string());
        let iso = date.format("%Y-%m-%d").to_string();

        let from_dmy = extract_date(&dmy, anchor).value.map(|m| m.day());
        let from_iso = extract_date(&iso, anchor).value.map(|m| m.day());

        prop_assert_eq!(from_dmy, Some(date));
        prop_assert_eq!(from_iso, Some(date));
    }

    #[test]
    fn prop_resolution_ignores_case(date in arb_date(), anchor in arb_date()) {
        let text = date.format("%d %B %Y").to_string();
        let lower = extract_date(&text.to_lowercase(), anchor).value;
        let upper = extract_date(&text.to_uppercase(), anchor).value;
        prop_assert_eq!(lower, upper);
        prop_assert_eq!(lower.map(|m| m.day()), Some(date));
    }

    #[test]
    fn prop_ranges_are_never_inverted(a in arb_date(), b in arb_date(), anchor in arb_date()) {
        let text = format!(
            "from {} to {}",
            a.format("%d-%m-%Y"),
            b.format("%d-%m-%Y")
        );
        let found = extract_date(&text, anchor).value.unwrap();
        prop_assert!(found.range.start <= found.range.end);
        prop_assert_eq!(found.reversed, a > b);
    }

    #[test]
    fn prop_relative_periods_contain_nothing_after_their_end(anchor in arb_date()) {
        for phrase in ["last week", "last month", "last quarter", "last year"] {
            let found = extract_date(phrase, anchor).value.unwrap();
            prop_assert!(found.range.end < anchor, "{} should end before the anchor", phrase);
            prop_assert!(found.range.start <= found.range.end);
        }
    }

    #[test]
    fn prop_grouped_amounts_parse(rupees in 1u64..10_000_000, paise in 0u32..100) {
        let grouped = {
            let digits = rupees.to_string();
            let mut out = String::new();
            for (i, c) in digits.chars().enumerate() {
                if i > 0 && (digits.len() - i) % 3 == 0 {
                    out.push(',');
                }
                out.push(c);
            }
            out
        };
        let text = format!("paid ₹{grouped}.{paise:02} for stock");
        let expected = Decimal::from(rupees) + Decimal::new(i64::from(paise), 2);
        prop_assert_eq!(extract_amount(&text).value, Some(expected));
    }
}
