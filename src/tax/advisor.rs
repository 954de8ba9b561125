//! Tax and GST answers
//!
//! A fixed knowledge base for Indian small-business tax questions. A question
//! is sorted into one topic by keyword, first match wins, and each topic has a
//! Markdown answer. Filing dates are worked out from the turn date.

use super::gst::{classify_supply, describe_code, HSN_SAC_CODES};
use crate::reply::{format_date, user_text};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::fmt::Write;
use std::sync::LazyLock;

const DISCLAIMER: &str = "_General guidance only. Confirm with your tax professional before filing._";

/// What a tax question is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Tds,
    Rates,
    Codes,
    Deadlines,
    Registration,
    Composition,
    InvoiceRules,
    InterState,
    InputCredit,
    Returns,
    Updates,
    General,
}

static TOPIC_RULES: LazyLock<Vec<(Topic, Regex)>> = LazyLock::new(|| {
    [
        (Topic::Tds, r"\btds\b|tax deducted|deduction rate"),
        (Topic::Rates, r"gst rates?|tax rates?|\bslabs?\b|what.*\brates?\b"),
        (Topic::Codes, r"\bhsn\b|\bsac\b"),
        (Topic::Deadlines, r"deadline|due date|\bfil(?:e|ing)\b.*\bdate|when.*\bfile|\blast date\b"),
        (Topic::Registration, r"regist|threshold"),
        (Topic::Composition, r"composition|composite scheme"),
        (Topic::InvoiceRules, r"invoice|\bbill\b|requirements"),
        (Topic::InterState, r"\b[ics]gst\b|inter-?state|intra-?state"),
        (Topic::InputCredit, r"input tax credit|input credit|\bitc\b|claim.*\btax"),
        (Topic::Returns, r"return type|\bgstr|which return"),
        (Topic::Updates, r"update|news|recent change|latest"),
    ]
    .into_iter()
    .map(|(topic, pattern)| (topic, Regex::new(&format!("(?i){pattern}")).unwrap()))
    .collect()
});

static RATE_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:rates?|gst|tax)\s+(?:for|on|of)\s+(?:an?\s+|the\s+)?(.+)").unwrap()
});

static CODE_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:code|hsn|sac)\s+(?:for|of)\s+(?:an?\s+|the\s+)?(.+)").unwrap()
});

static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4,8})\b").unwrap());

static TDS_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btds\s+(?:for|on|of)\s+(.+)").unwrap());

static RETURN_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bgstr\s*-?\s*(1|3b|9c|9)\b").unwrap());

pub fn topic(text: &str) -> Topic {
    TOPIC_RULES
        .iter()
        .find(|(_, regex)| regex.is_match(text))
        .map_or(Topic::General, |(topic, _)| *topic)
}

/// Answer a tax question as Markdown
pub fn advise(text: &str, today: NaiveDate) -> String {
    let body = match topic(text) {
        Topic::Tds => tds(text),
        Topic::Rates => rates(text),
        Topic::Codes => codes(text),
        Topic::Deadlines => deadlines(text, today),
        Topic::Registration => registration(),
        Topic::Composition => COMPOSITION.to_string(),
        Topic::InvoiceRules => INVOICE_RULES.to_string(),
        Topic::InterState => INTER_STATE.to_string(),
        Topic::InputCredit => INPUT_CREDIT.to_string(),
        Topic::Returns => RETURNS.to_string(),
        Topic::Updates => updates(),
        Topic::General => GENERAL.to_string(),
    };
    format!("{body}\n\n{DISCLAIMER}")
}

/// The text after "rate for", "tds on" and similar, trimmed
fn item<'a>(regex: &Regex, text: &'a str) -> Option<&'a str> {
    let item = regex
        .captures(text)?
        .get(1)?
        .as_str()
        .trim_end_matches(['?', '.', '!'])
        .trim();
    (!item.is_empty()).then_some(item)
}

// ============================================================================
// Rates
// ============================================================================

/// Rate notes per HSN/SAC code
static RATE_NOTES: &[(&str, &str)] = &[
    ("9983", "IT and software services are taxed at **18%**."),
    ("9982", "Accounting, legal and tax advisory services are taxed at **18%**."),
    (
        "9963",
        "Restaurants without AC: **5%** (no input tax credit).\n\
         Restaurants with AC or a liquor licence: **18%**.\n\
         Outdoor catering: **18%**.",
    ),
    (
        "9964",
        "Public transport: **exempt**.\n\
         Economy air travel: **5%**. Business class: **12%**.\n\
         Goods transport by road: **5%**.",
    ),
    ("8471", "Computers, laptops and peripherals are taxed at **18%**."),
    ("8517", "Mobile phones and accessories are taxed at **18%**."),
    ("9403", "Office furniture is taxed at **18%**."),
    ("4820", "Stationery is taxed at **12%** to **18%** depending on the item."),
    ("8443", "Printers and printing equipment are taxed at **18%**."),
    ("9973", "Leasing and rental services are taxed at **18%**."),
    ("9987", "Repair, maintenance and installation services are taxed at **18%**."),
    ("9981", "Research and development services are taxed at **18%**."),
    ("9971", "Financial services are taxed at **18%**."),
];

const RATE_STRUCTURE: &str = "**GST rate slabs**\n\n\
- **0%**: essential food, healthcare, education\n\
- **5%**: basic necessities, transport, economy hotels\n\
- **12%**: processed food, business class air travel\n\
- **18%**: most services, including IT, telecom, financial and AC restaurants\n\
- **28%**: luxury goods, cinema tickets, high-end cars, tobacco";

fn rates(text: &str) -> String {
    let Some(item) = item(&RATE_ITEM_RE, text) else {
        return format!("{RATE_STRUCTURE}\n\nAsk about a specific item for its rate, e.g. `gst rate for laptops`.");
    };

    let note = classify_supply(item).and_then(|class| {
        RATE_NOTES
            .iter()
            .find(|(code, _)| *code == class.code)
            .map(|(code, note)| (*code, *note))
    });
    match note {
        Some((code, note)) => format!("**GST rate for {}**\n\n{note}\n\nHSN/SAC: {code}", user_text(item)),
        None => format!(
            "{RATE_STRUCTURE}\n\nI don't have a specific rate for \"{}\". \
             Tell me its category or HSN/SAC code.",
            user_text(item)
        ),
    }
}

// ============================================================================
// HSN / SAC codes
// ============================================================================

fn codes(text: &str) -> String {
    if let Some(code) = CODE_RE.captures(text).and_then(|caps| caps.get(1)) {
        let code = code.as_str();
        return match describe_code(code) {
            Some(description) => format!("**HSN/SAC {code}**: {description}"),
            None => format!(
                "{code} isn't one of the codes I know. Check the official HSN/SAC directory on the GST portal."
            ),
        };
    }

    if let Some(item) = item(&CODE_ITEM_RE, text) {
        return match classify_supply(item) {
            Some(class) => format!(
                "**HSN/SAC for {}**: **{}** ({})",
                user_text(item),
                class.code,
                describe_code(class.code).unwrap_or("see the GST portal")
            ),
            None => format!(
                "I don't have a code for \"{}\". Codes are 4 to 8 digits; check the official \
                 HSN/SAC directory or ask your tax professional.",
                user_text(item)
            ),
        };
    }

    let mut out = String::from(
        "**HSN and SAC codes**\n\n\
         HSN codes classify goods and SAC codes classify services. Every GST invoice needs one.\n\n\
         - Turnover up to ₹1.5 crore: 4 digits\n\
         - ₹1.5 crore to ₹5 crore: 6 digits\n\
         - Above ₹5 crore: 8 digits\n\n\
         **Common codes**\n\n",
    );
    for (code, description) in HSN_SAC_CODES.iter().take(6) {
        let _ = writeln!(out, "- {code}: {description}");
    }
    out
}

// ============================================================================
// Deadlines
// ============================================================================

/// The next `due_day` of a month on or after `today`
fn next_monthly_due(today: NaiveDate, due_day: u32) -> Option<NaiveDate> {
    if today.day() <= due_day {
        return today.with_day(due_day);
    }
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, due_day)
}

/// "April 2025": the month a monthly return due on `due` covers
fn return_period(due: NaiveDate) -> String {
    due.checked_sub_months(chrono::Months::new(1))
        .map_or_else(String::new, |d| d.format("%B %Y").to_string())
}

/// Year in which the last completed financial year (April to March) ended
fn last_fy_end(today: NaiveDate) -> i32 {
    if today.month() >= 4 {
        today.year()
    } else {
        today.year() - 1
    }
}

fn next_tds_return(today: NaiveDate) -> Option<NaiveDate> {
    let year = today.year();
    [(year, 1), (year, 5), (year, 7), (year, 10), (year + 1, 1)]
        .into_iter()
        .filter_map(|(y, m)| NaiveDate::from_ymd_opt(y, m, 31))
        .find(|due| *due >= today)
}

fn monthly_line(name: &str, today: NaiveDate, due_day: u32) -> String {
    match next_monthly_due(today, due_day) {
        Some(due) => format!(
            "- {name}: {due_day}th of the next month. Next due **{}** (for {})",
            format_date(due),
            return_period(due)
        ),
        None => format!("- {name}: {due_day}th of the next month"),
    }
}

fn deadlines(text: &str, today: NaiveDate) -> String {
    let fy_end = last_fy_end(today);
    let fy = format!("FY {}-{:02}", fy_end - 1, fy_end.rem_euclid(100));
    let annual = NaiveDate::from_ymd_opt(fy_end, 12, 31).map_or_else(String::new, format_date);

    if let Some(name) = RETURN_NAME_RE.captures(text).and_then(|caps| caps.get(1)) {
        let name = name.as_str().to_ascii_uppercase();
        let line = match name.as_str() {
            "1" => monthly_line("GSTR-1", today, 11),
            "3B" => monthly_line("GSTR-3B", today, 20),
            _ => format!("- GSTR-{name} for {fy}: **{annual}**"),
        };
        return format!(
            "**GSTR-{name} due date**\n\n{line}\n\n\
             Late filing costs ₹50 a day (₹20 for nil returns) plus 18% a year interest on unpaid tax."
        );
    }

    let mut out = format!("**Filing calendar as of {}**\n\n**Monthly GST returns**\n\n", format_date(today));
    let _ = writeln!(out, "{}", monthly_line("GSTR-1", today, 11));
    let _ = writeln!(out, "{}", monthly_line("GSTR-3B", today, 20));
    out.push_str(
        "\n**Quarterly GST returns (QRMP scheme)**\n\n\
         - GSTR-1: 13th of the month after the quarter\n\
         - GSTR-3B: 22nd or 24th of the month after the quarter, depending on your state\n",
    );
    let _ = write!(
        out,
        "\n**Annual returns for {fy}**\n\n\
         - GSTR-9 and GSTR-9C: {annual}\n\
         - Income tax return, no audit: 31 Jul {fy_end}\n\
         - Income tax return, audited business: 31 Oct {fy_end}\n"
    );
    out.push_str("\n**TDS returns**\n\n- Quarterly: 31 Jul, 31 Oct, 31 Jan, 31 May");
    if let Some(due) = next_tds_return(today) {
        let _ = write!(out, ". Next due **{}**", format_date(due));
    }
    out
}

// ============================================================================
// TDS
// ============================================================================

/// Keywords, payment type and rate
static TDS_RATES: &[(&[&str], &str, &str)] = &[
    (&["salary", "salaries", "wages"], "Salary", "as per the employee's income tax slab"),
    (&["professional", "consultant", "consulting", "fees"], "Professional services", "10%"),
    (&["equipment", "machinery", "plant"], "Rent of equipment", "2%"),
    (&["rent", "building", "office", "land"], "Rent of land or building", "10%"),
    (&["contract", "contractor", "contractors"], "Contract payments", "2%"),
    (&["commission", "brokerage"], "Commission or brokerage", "5%"),
    (&["interest"], "Interest (other than on securities)", "10%"),
];

fn tds(text: &str) -> String {
    if let Some(item) = item(&TDS_ITEM_RE, text) {
        let lower = item.to_lowercase();
        let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).collect();
        let found = TDS_RATES
            .iter()
            .find(|(keywords, _, _)| keywords.iter().any(|k| words.contains(k)));
        if let Some((_, kind, rate)) = found {
            return format!(
                "**TDS on {}**: {kind} attract TDS at **{rate}**.\n\n\
                 - Deduct when you pay or credit the amount, whichever is earlier\n\
                 - Deposit by the 7th of the next month\n\
                 - File quarterly returns and issue TDS certificates\n\n\
                 Payments below the yearly threshold may be exempt.",
                user_text(item)
            );
        }
    }

    let mut out = String::from("**Common TDS rates**\n\n");
    for (_, kind, rate) in TDS_RATES {
        let _ = writeln!(out, "- {kind}: {rate}");
    }
    out.push_str(
        "\n**What you need to do**\n\n\
         1. Register for a TAN\n\
         2. Deduct at the applicable rate when paying\n\
         3. Deposit by the 7th of the next month\n\
         4. File quarterly returns (Forms 24Q, 26Q, 27Q)\n\
         5. Issue certificates (Form 16, 16A)",
    );
    out
}

// ============================================================================
// Registration
// ============================================================================

fn registration() -> String {
    "**GST registration thresholds**\n\n\
     - Most states: ₹20 lakh annual turnover (₹40 lakh for goods only)\n\
     - Special category states: ₹10 lakh annual turnover\n\
     - E-commerce operators and sellers on them: no threshold, registration is mandatory\n\
     - Interstate supply of goods: no threshold, registration is mandatory\n\n\
     Special category states: Manipur, Mizoram, Nagaland, Tripura, Meghalaya, Arunachal \
     Pradesh, Sikkim, Uttarakhand, Himachal Pradesh, Jammu and Kashmir.\n\n\
     Register on the GST portal with your PAN, address proof, bank details and identity proof."
        .to_string()
}

// ============================================================================
// Fixed answers
// ============================================================================

const COMPOSITION: &str = "**GST composition scheme**\n\n\
- For businesses with turnover up to ₹1.5 crore (₹75 lakh in special category states)\n\
- Flat tax: 1% for traders and manufacturers, 5% for restaurants, 6% for other services\n\
- Quarterly payment, one annual return\n\
- No input tax credit, no tax invoices (issue a bill of supply) and no interstate sales\n\n\
Opt in with Form GST CMP-02 on the GST portal.";

const INVOICE_RULES: &str = "**What a GST invoice must show**\n\n\
1. Your name, address and GSTIN\n\
2. A serial number, unique within the financial year\n\
3. Date of issue\n\
4. Recipient's name, address and GSTIN if registered\n\
5. HSN or SAC code\n\
6. Description, quantity and value of the goods or services\n\
7. Taxable value and the CGST, SGST or IGST rate and amount\n\
8. Place of supply\n\
9. Your signature or an authorised signatory's\n\n\
Invoices I create show the taxable value, tax split, HSN/SAC and place of supply \
once your GSTIN is configured.";

const INTER_STATE: &str = "**IGST or CGST + SGST?**\n\n\
- **Interstate** supply (seller and place of supply in different states): **IGST** at the full rate, \
collected by the Centre\n\
- **Intrastate** supply (same state): **CGST** and **SGST** at half the rate each\n\n\
At 18%, that is 18% IGST, or 9% CGST plus 9% SGST.";

const INPUT_CREDIT: &str = "**Input tax credit (ITC)**\n\n\
- Claim credit for GST paid on business purchases against the GST you collect\n\
- You need a valid tax invoice from a registered supplier\n\
- The supplier must have filed GSTR-1 so the invoice shows in your GSTR-2B\n\
- Blocked for personal use and some items such as certain motor vehicles\n\
- Claim by 30 November after the end of the financial year, or the annual return if filed earlier";

const RETURNS: &str = "**GST return types**\n\n\
1. **GSTR-1**: outward supplies, monthly or quarterly\n\
2. **GSTR-3B**: summary return with tax payment, monthly or quarterly\n\
3. **GSTR-4**: annual return for composition taxpayers\n\
4. **GSTR-7**: for TDS deductors\n\
5. **GSTR-8**: for e-commerce operators\n\
6. **GSTR-9**: annual return for regular taxpayers\n\
7. **GSTR-9C**: reconciliation statement, turnover above ₹5 crore";

/// (when, headline, detail)
static UPDATES: &[(&str, &str, &str)] = &[
    (
        "March 2025",
        "HSN digits",
        "Six-digit HSN codes are required above ₹1.5 crore turnover and eight digits above ₹5 crore.",
    ),
    (
        "February 2025",
        "E-invoicing",
        "E-invoicing applies to businesses with turnover above ₹5 crore.",
    ),
    (
        "January 2025",
        "GSTR-3B auto-population",
        "GSTR-3B is pre-filled from GSTR-1, and the pre-filled liability is locked from the next period.",
    ),
];

fn updates() -> String {
    let mut out = String::from("**Recent GST changes**\n\n");
    for (when, headline, detail) in UPDATES {
        let _ = writeln!(out, "- **{when}, {headline}**: {detail}");
    }
    out.push_str("\nCheck the GST portal and CBIC notifications for the latest position.");
    out
}

const GENERAL: &str = "I can help with Indian tax questions. Try asking about:\n\n\
- GST rates, e.g. `gst rate for laptops`\n\
- HSN/SAC codes, e.g. `hsn code for software`\n\
- Filing deadlines, e.g. `gstr-3b due date`\n\
- TDS rates, e.g. `tds on rent`\n\
- GST registration thresholds\n\
- Input tax credit\n\
- IGST versus CGST and SGST\n\
- The composition scheme\n\
- What a GST invoice must show\n\
- Recent GST changes";
