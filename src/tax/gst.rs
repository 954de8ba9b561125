//! GST on invoices
//!
//! Tax is only charged when the business has its own GSTIN. Its first two
//! digits give the state the business supplies from; a supply to any other
//! state is interstate and carries IGST, otherwise the tax splits evenly into
//! CGST and SGST.

use crate::db::InvoiceTax;
use rust_decimal::Decimal;

/// HSN/SAC used when nothing in the description points elsewhere
pub const DEFAULT_HSN_SAC: &str = "9983";

/// Supplying state assumed when the business GSTIN carries an unknown code
const DEFAULT_SELLER_STATE: &str = "07";

/// Notified rates, in percent
const RATE_SLABS: &[Decimal] = &[
    Decimal::ZERO,
    Decimal::from_parts(25, 0, 0, false, 2),
    Decimal::from_parts(3, 0, 0, false, 0),
    Decimal::from_parts(5, 0, 0, false, 0),
    Decimal::from_parts(12, 0, 0, false, 0),
    Decimal::from_parts(18, 0, 0, false, 0),
    Decimal::from_parts(28, 0, 0, false, 0),
];

pub fn default_rate() -> Decimal {
    Decimal::from(18)
}

pub fn is_rate_slab(rate: Decimal) -> bool {
    RATE_SLABS.contains(&rate)
}

// ============================================================================
// States
// ============================================================================

/// A state or union territory as numbered in GSTINs
#[derive(Debug, PartialEq, Eq)]
pub struct GstState {
    pub code: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

const fn state(code: &'static str, name: &'static str, aliases: &'static [&'static str]) -> GstState {
    GstState {
        code,
        name,
        aliases,
    }
}

pub static STATES: &[GstState] = &[
    state("01", "Jammu and Kashmir", &["j&k", "jammu & kashmir"]),
    state("02", "Himachal Pradesh", &["hp"]),
    state("03", "Punjab", &[]),
    state("04", "Chandigarh", &[]),
    state("05", "Uttarakhand", &[]),
    state("06", "Haryana", &[]),
    state("07", "Delhi", &["new delhi", "ncr"]),
    state("08", "Rajasthan", &[]),
    state("09", "Uttar Pradesh", &["up"]),
    state("10", "Bihar", &[]),
    state("11", "Sikkim", &[]),
    state("12", "Arunachal Pradesh", &[]),
    state("13", "Nagaland", &[]),
    state("14", "Manipur", &[]),
    state("15", "Mizoram", &[]),
    state("16", "Tripura", &[]),
    state("17", "Meghalaya", &[]),
    state("18", "Assam", &[]),
    state("19", "West Bengal", &["wb", "bengal"]),
    state("20", "Jharkhand", &[]),
    state("21", "Odisha", &["orissa"]),
    state("22", "Chhattisgarh", &[]),
    state("23", "Madhya Pradesh", &["mp"]),
    state("24", "Gujarat", &[]),
    state("27", "Maharashtra", &[]),
    state("29", "Karnataka", &[]),
    state("30", "Goa", &[]),
    state("32", "Kerala", &[]),
    state("33", "Tamil Nadu", &["tn"]),
    state("34", "Puducherry", &["pondicherry"]),
    state("36", "Telangana", &[]),
    state("37", "Andhra Pradesh", &["ap"]),
];

pub fn state_for_code(code: &str) -> Option<&'static GstState> {
    STATES.iter().find(|s| s.code == code)
}

/// The registering state encoded in a GSTIN's first two digits
pub fn state_for_gstin(gstin: &str) -> Option<&'static GstState> {
    gstin.get(..2).and_then(state_for_code)
}

/// Look a state up by name, common short form or two-digit code
pub fn state_named(text: &str) -> Option<&'static GstState> {
    let wanted = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if wanted.is_empty() {
        return None;
    }
    STATES.iter().find(|s| {
        s.code == wanted
            || s.name.eq_ignore_ascii_case(&wanted)
            || s.aliases.iter().any(|a| a.eq_ignore_ascii_case(&wanted))
    })
}

// ============================================================================
// HSN / SAC
// ============================================================================

/// Codes the assistant can name, with what they cover
pub static HSN_SAC_CODES: &[(&str, &str)] = &[
    ("9983", "IT services (software development, web design and similar)"),
    ("9982", "Legal and accounting services"),
    ("9981", "Research and development services"),
    ("9971", "Financial and related services"),
    ("9963", "Accommodation, food and beverage services"),
    ("9964", "Passenger transport services"),
    ("9973", "Leasing or rental services"),
    ("9987", "Maintenance, repair and installation services"),
    ("9997", "Other services"),
    ("8471", "Computers and peripherals"),
    ("8517", "Mobile phones and communication equipment"),
    ("8523", "Software on physical media"),
    ("9403", "Office furniture"),
    ("4820", "Office stationery and supplies"),
    ("8443", "Printers and printing equipment"),
];

/// Keywords that place a supply under a code. Earlier classes win.
pub struct SupplyClass {
    pub code: &'static str,
    pub keywords: &'static [&'static str],
}

pub static SUPPLY_CLASSES: &[SupplyClass] = &[
    SupplyClass {
        code: "9983",
        keywords: &["software", "it", "tech", "website", "web", "app", "programming", "saas"],
    },
    SupplyClass {
        code: "9982",
        keywords: &["accounting", "legal", "tax", "lawyer", "ca", "audit", "bookkeeping"],
    },
    SupplyClass {
        code: "9963",
        keywords: &["restaurant", "food", "catering", "hotel", "meals"],
    },
    SupplyClass {
        code: "9964",
        keywords: &["transport", "travel", "taxi", "freight", "cab"],
    },
    SupplyClass {
        code: "8471",
        keywords: &["computer", "computers", "laptop", "laptops", "hardware"],
    },
    SupplyClass {
        code: "8517",
        keywords: &["phone", "phones", "mobile", "smartphone"],
    },
    SupplyClass {
        code: "9403",
        keywords: &["furniture", "desk", "chair", "chairs"],
    },
    SupplyClass {
        code: "4820",
        keywords: &["stationery", "notebooks", "paper"],
    },
    SupplyClass {
        code: "8443",
        keywords: &["printer", "printers", "printing"],
    },
    SupplyClass {
        code: "9973",
        keywords: &["rent", "rental", "lease", "leasing"],
    },
    SupplyClass {
        code: "9987",
        keywords: &["repair", "maintenance", "installation", "servicing"],
    },
    SupplyClass {
        code: "9981",
        keywords: &["research"],
    },
    SupplyClass {
        code: "9971",
        keywords: &["financial", "banking", "insurance"],
    },
];

pub fn describe_code(code: &str) -> Option<&'static str> {
    HSN_SAC_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, description)| *description)
}

/// The supply class whose keywords appear as whole words in `text`
pub fn classify_supply(text: &str) -> Option<&'static SupplyClass> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    SUPPLY_CLASSES
        .iter()
        .find(|class| class.keywords.iter().any(|k| words.iter().any(|w| w.as_str() == *k)))
}

// ============================================================================
// Computation
// ============================================================================

/// What an invoice needs to work out its tax
#[derive(Debug, Clone, Copy)]
pub struct TaxInput<'a> {
    /// Taxable value
    pub amount: Decimal,
    pub description: &'a str,
    /// The business's own GSTIN
    pub seller_gstin: Option<&'a str>,
    pub recipient_gstin: Option<&'a str>,
    /// A state name as given on the invoice
    pub place_of_supply: Option<&'a str>,
    pub rate: Option<Decimal>,
    pub hsn_sac: Option<&'a str>,
}

/// Tax for one invoice. The place of supply is the one given, else the
/// recipient's GSTIN state, else the seller's own state.
pub fn invoice_tax(input: &TaxInput<'_>) -> InvoiceTax {
    let hsn_sac = input.hsn_sac.map_or_else(
        || {
            classify_supply(input.description)
                .map_or(DEFAULT_HSN_SAC, |class| class.code)
                .to_string()
        },
        ToString::to_string,
    );
    let named_place = input.place_of_supply.and_then(state_named);

    let Some(seller) = input.seller_gstin else {
        return InvoiceTax {
            hsn_sac,
            place_of_supply: named_place.map(|s| s.name.to_string()),
            ..InvoiceTax::default()
        };
    };

    let seller_state =
        state_for_gstin(seller).or_else(|| state_for_code(DEFAULT_SELLER_STATE));
    let place = named_place
        .or_else(|| input.recipient_gstin.and_then(state_for_gstin))
        .or(seller_state);
    let interstate = match (place, seller_state) {
        (Some(place), Some(home)) => place.code != home.code,
        _ => false,
    };

    let rate = input.rate.unwrap_or_else(default_rate);
    let gst = (input.amount.saturating_mul(rate) / Decimal::ONE_HUNDRED).round_dp(2);
    let (cgst, sgst, igst) = if interstate {
        (Decimal::ZERO, Decimal::ZERO, gst)
    } else {
        let central = (gst / Decimal::TWO).round_dp(2);
        (central, gst - central, Decimal::ZERO)
    };

    InvoiceTax {
        seller_gstin: Some(seller.to_string()),
        hsn_sac,
        place_of_supply: place.map(|s| s.name.to_string()),
        interstate,
        rate,
        cgst,
        sgst,
        igst,
    }
}
