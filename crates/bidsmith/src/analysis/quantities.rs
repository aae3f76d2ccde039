use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::strategy::QuantityPatternSet;
use crate::domain::Unit;

const NUMBER: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?";
const UNIT_CODES: &str = r"SQFT|SF|LF|CY|EA|TON|GAL|LB";

/// A value/unit pair found on one line, already converted to a recognised unit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LineQuantity {
    pub value: f64,
    pub unit: Unit,
    /// The unit was written as a standard abbreviation rather than spelled out or converted.
    pub canonical: bool,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BidRow {
    pub item_number: String,
    pub item_code: Option<String>,
    pub description: String,
}

#[derive(Debug, Default)]
pub(crate) struct LineScan {
    pub quantities: Vec<LineQuantity>,
    /// Set when the whole line is a bid-schedule row; its quantity is `quantities[0]`.
    pub bid_row: Option<BidRow>,
}

struct UnitPattern {
    unit: Unit,
    convert: fn(f64) -> f64,
    regex: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static quantity pattern compiles")
}

fn prose_patterns() -> &'static [UnitPattern] {
    static PATTERNS: OnceLock<Vec<UnitPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table: [(Unit, fn(f64) -> f64, &str); 12] = [
            (Unit::Sqft, |v| v, r"SQ\.?\s?FT|SQFT|SF|SQUARE\s+F(?:EE|OO)T"),
            (Unit::Sqft, |v| v * 9.0, r"SQ\.?\s?YDS?|SQYDS?|SY|SQUARE\s+YARDS?"),
            (Unit::Sqft, |v| v * 10.7639, r"SQ\.?\s?M|SQM|SQUARE\s+MET(?:ER|RE)S?"),
            (Unit::Lf, |v| v, r"LF|LIN\.?\s?FT|LINEAR\s+F(?:EE|OO)T|LINEAR\s+FT"),
            (Unit::Lf, |v| v * 3.0, r"LY|LINEAR\s+YARDS?"),
            (Unit::Lf, |v| v * 3.28084, r"LM|LINEAR\s+MET(?:ER|RE)S?"),
            (Unit::Cy, |v| v, r"CY|CU\.?\s?YDS?|CUBIC\s+YARDS?"),
            (Unit::Cy, |v| v / 27.0, r"CF|CU\.?\s?FT|CUBIC\s+F(?:EE|OO)T"),
            (Unit::Ea, |v| v, r"EACH|EA|PCS?|PIECES?|UNITS?"),
            (Unit::Ton, |v| v, r"TONS?|TN"),
            (Unit::Gal, |v| v, r"GALLONS?|GALS?"),
            (Unit::Lb, |v| v, r"LBS?|POUNDS?"),
        ];

        table
            .into_iter()
            .map(|(unit, convert, units)| UnitPattern {
                unit,
                convert,
                regex: compile(&format!(r"(?i)\b({NUMBER})\s*({units})\b")),
            })
            .collect()
    })
}

fn unit_first_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(&format!(r"(?i)\b({UNIT_CODES})\s+({NUMBER})\s*$")))
}

fn bid_row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        compile(&format!(
            r"(?i)^\s*(\d{{1,4}})\s+(?:(\d{{5,7}})\s+)?(.+?)\s+({UNIT_CODES})\s+({NUMBER})\s*$"
        ))
    })
}

fn callout_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"(?i)\((\d{1,5})\)\s*[A-Z]"))
}

/// Parses a numeric capture; rejects anything that is not a finite, non-negative value.
pub(crate) fn parse_value(raw: &str) -> Option<f64> {
    let value: f64 = raw.replace(',', "").parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

pub(crate) fn scan_line(line: &str, patterns: QuantityPatternSet) -> LineScan {
    if patterns == QuantityPatternSet::BidSchedule {
        if let Some(scan) = scan_bid_row(line) {
            return scan;
        }
    }

    let mut quantities: Vec<LineQuantity> = Vec::new();
    let mut push = |found: LineQuantity| {
        if !quantities.iter().any(|existing| existing.offset == found.offset) {
            quantities.push(found);
        }
    };

    for pattern in prose_patterns() {
        for captures in pattern.regex.captures_iter(line) {
            if let Some(found) = from_captures(line, &captures, 1, 2, pattern.unit, pattern.convert) {
                push(found);
            }
        }
    }

    match patterns {
        QuantityPatternSet::BidSchedule => {
            if let Some(captures) = unit_first_pattern().captures(line) {
                if let Some(unit) = Unit::parse(&captures[1]) {
                    if let Some(found) = from_captures(line, &captures, 2, 1, unit, |v| v) {
                        push(found);
                    }
                }
            }
        }
        QuantityPatternSet::PlanCallout => {
            for captures in callout_pattern().captures_iter(line) {
                let Some(number) = captures.get(1) else {
                    continue;
                };
                if let Some(value) = parse_value(number.as_str()) {
                    push(LineQuantity {
                        value,
                        unit: Unit::Ea,
                        canonical: false,
                        offset: number.start(),
                    });
                }
            }
        }
        QuantityPatternSet::Standard => {}
    }

    quantities.sort_by_key(|found| found.offset);
    LineScan {
        quantities,
        bid_row: None,
    }
}

fn scan_bid_row(line: &str) -> Option<LineScan> {
    let captures = bid_row_pattern().captures(line)?;
    let unit = Unit::parse(&captures[4])?;
    let quantity = from_captures(line, &captures, 5, 4, unit, |v| v)?;

    let description = captures[3].trim().to_string();
    Some(LineScan {
        quantities: vec![quantity],
        bid_row: Some(BidRow {
            item_number: captures[1].to_string(),
            item_code: captures.get(2).map(|code| code.as_str().to_string()),
            description,
        }),
    })
}

fn from_captures(
    line: &str,
    captures: &Captures<'_>,
    value_group: usize,
    unit_group: usize,
    unit: Unit,
    convert: fn(f64) -> f64,
) -> Option<LineQuantity> {
    let number = captures.get(value_group)?;
    if is_negated(line, number.start()) {
        return None;
    }
    let unit_text = captures.get(unit_group)?.as_str();
    let value = convert(parse_value(number.as_str())?);
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    Some(LineQuantity {
        value,
        unit,
        canonical: Unit::parse(unit_text) == Some(unit),
        offset: number.start(),
    })
}

/// A `-` directly before the number is a minus sign unless it joins the number to a
/// preceding word or mark, as in `S4-50`.
fn is_negated(line: &str, start: usize) -> bool {
    let mut before = line[..start].chars().rev();
    match before.next() {
        Some('-') => !before.next().is_some_and(char::is_alphanumeric),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(line: &str, patterns: QuantityPatternSet) -> Vec<(f64, Unit)> {
        scan_line(line, patterns)
            .quantities
            .into_iter()
            .map(|found| (found.value, found.unit))
            .collect()
    }

    #[test]
    fn recognises_each_unit_family() {
        let found = values(
            "Provide 1,250 SQ FT forms, 300 LF rail, 12.5 CY concrete, 100 EA balusters, 4 TONS steel, 55 GAL sealer, 800 LBS rebar",
            QuantityPatternSet::Standard,
        );
        assert_eq!(
            found,
            vec![
                (1250.0, Unit::Sqft),
                (300.0, Unit::Lf),
                (12.5, Unit::Cy),
                (100.0, Unit::Ea),
                (4.0, Unit::Ton),
                (55.0, Unit::Gal),
                (800.0, Unit::Lb),
            ]
        );
    }

    #[test]
    fn converts_alternate_units() {
        let found = values("20 SQ YD and 54 CUBIC FEET", QuantityPatternSet::Standard);
        assert_eq!(found, vec![(180.0, Unit::Sqft), (2.0, Unit::Cy)]);
    }

    #[test]
    fn flags_canonical_abbreviations() {
        let scan = scan_line("100 EA and 40 PIECES", QuantityPatternSet::Standard);
        assert!(scan.quantities[0].canonical);
        assert!(!scan.quantities[1].canonical);
    }

    #[test]
    fn ignores_numbers_without_recognised_units() {
        assert!(values("Sheet 12 of 40, detail 7", QuantityPatternSet::Standard).is_empty());
        assert!(values("100 BUSHELS", QuantityPatternSet::Standard).is_empty());
    }

    #[test]
    fn parses_bid_schedule_rows() {
        let scan = scan_line(
            "  12  0512345  BALUSTER  EA  1,100",
            QuantityPatternSet::BidSchedule,
        );
        let row = scan.bid_row.expect("bid row recognised");
        assert_eq!(row.item_number, "12");
        assert_eq!(row.item_code.as_deref(), Some("0512345"));
        assert_eq!(row.description, "BALUSTER");
        assert_eq!(scan.quantities.len(), 1);
        assert_eq!(scan.quantities[0].value, 1100.0);
        assert_eq!(scan.quantities[0].unit, Unit::Ea);
    }

    #[test]
    fn bid_rows_only_apply_to_bid_schedules() {
        let scan = scan_line("12 BALUSTER EA 100", QuantityPatternSet::Standard);
        assert!(scan.bid_row.is_none());
        assert!(scan.quantities.is_empty());
    }

    #[test]
    fn unit_first_columns_in_bid_schedules() {
        let found = values("TYPE 86H RAIL   LF   640", QuantityPatternSet::BidSchedule);
        assert_eq!(found, vec![(640.0, Unit::Lf)]);
    }

    #[test]
    fn plan_callouts_count_as_each() {
        let found = values("(24) BALUSTERS AT 8 IN O.C.", QuantityPatternSet::PlanCallout);
        assert_eq!(found, vec![(24.0, Unit::Ea)]);
    }

    #[test]
    fn signed_quantities_are_rejected() {
        assert!(values("-50 LF", QuantityPatternSet::Standard).is_empty());
        assert!(values("Adjust rail by -50 LF.", QuantityPatternSet::Standard).is_empty());
        assert!(values("Deduct (-12 EA) balusters", QuantityPatternSet::Standard).is_empty());
        assert_eq!(
            values("Credit -50 LF, add 20 LF", QuantityPatternSet::Standard),
            vec![(20.0, Unit::Lf)]
        );
    }

    #[test]
    fn hyphen_separators_still_yield_quantities() {
        assert_eq!(
            values("Detail S4-50 LF of rail", QuantityPatternSet::Standard),
            vec![(50.0, Unit::Lf)]
        );
        assert_eq!(
            values("Type-12 EA anchors", QuantityPatternSet::Standard),
            vec![(12.0, Unit::Ea)]
        );
    }

    #[test]
    fn parse_value_rejects_non_finite_and_negative() {
        assert_eq!(parse_value("1,000.5"), Some(1000.5));
        assert_eq!(parse_value("-3"), None);
        assert_eq!(parse_value("abc"), None);
    }
}
