//! Name and domain normalisation, fuzzy matching.

use similar::TextDiff;

/// Legal-form words stripped from the end of company names.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "llc",
    "ltd",
    "limited",
    "corp",
    "corporation",
    "company",
    "co",
    "gmbh",
    "sa",
    "srl",
    "bv",
    "plc",
    "pty",
];

/// Country-code TLDs mapped to ISO 3166 alpha-2 hints.
const CC_TLDS: &[(&str, &str)] = &[
    ("uk", "GB"),
    ("de", "DE"),
    ("fr", "FR"),
    ("es", "ES"),
    ("it", "IT"),
    ("nl", "NL"),
    ("be", "BE"),
    ("at", "AT"),
    ("ch", "CH"),
    ("ie", "IE"),
    ("se", "SE"),
    ("no", "NO"),
    ("dk", "DK"),
    ("fi", "FI"),
    ("pl", "PL"),
    ("pt", "PT"),
    ("ca", "CA"),
    ("mx", "MX"),
    ("br", "BR"),
    ("ar", "AR"),
    ("cl", "CL"),
    ("pe", "PE"),
    ("au", "AU"),
    ("nz", "NZ"),
    ("jp", "JP"),
    ("kr", "KR"),
    ("sg", "SG"),
    ("my", "MY"),
    ("ph", "PH"),
    ("th", "TH"),
    ("vn", "VN"),
    ("id", "ID"),
    ("in", "IN"),
];

/// Canonical bare domain: lowercase, no scheme, `www.`, port, path or
/// trailing dot. Returns `None` for values that cannot be a domain.
pub fn normalize_domain(input: &str) -> Option<String> {
    let mut rest = input.trim().to_ascii_lowercase();
    if let Some(idx) = rest.find("://") {
        rest = rest[idx + 3..].to_owned();
    }
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('@')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);

    let valid = host.contains('.')
        && !host.starts_with('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && host.split('.').all(|label| !label.is_empty());
    valid.then(|| host.to_owned())
}

/// Normalised company name for name-based grouping: lowercase, punctuation
/// replaced by spaces, trailing legal suffixes removed.
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    while words.len() > 1 && words.last().is_some_and(|w| LEGAL_SUFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}

/// Lowercase alphanumerics only, e.g. `"Funko Pop!"` → `"funkopop"`.
pub fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Human-readable name from a domain's first label: `"toy-haven.com"` →
/// `"Toy Haven"`.
pub fn infer_name_from_domain(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or(domain);
    label
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Character-level similarity ratio in `[0, 1]` of two normalised names.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    f64::from(TextDiff::from_chars(a.as_str(), b.as_str()).ratio())
}

/// Country hint from a country-code TLD (`funko.co.uk` → `GB`).
pub fn country_from_domain(domain: &str) -> Option<String> {
    let tld = domain.rsplit('.').next()?;
    CC_TLDS
        .iter()
        .find(|(cc, _)| *cc == tld)
        .map(|(_, iso)| (*iso).to_owned())
}

/// Sales region (`Americas`, `EMEA`, `APAC`) for an ISO 3166 alpha-2 code.
pub fn region_from_country(country: &str) -> Option<&'static str> {
    let region = match country.trim().to_ascii_uppercase().as_str() {
        "US" | "CA" | "MX" | "GT" | "BZ" | "SV" | "HN" | "NI" | "CR" | "PA" | "BR" | "AR"
        | "CL" | "CO" | "PE" | "VE" => "Americas",
        "GB" | "IE" | "FR" | "DE" | "ES" | "IT" | "NL" | "BE" | "CH" | "AT" | "PT" | "SE"
        | "NO" | "DK" | "FI" | "PL" | "CZ" | "GR" | "RU" => "EMEA",
        "JP" | "CN" | "KR" | "IN" | "AU" | "NZ" | "SG" | "MY" | "PH" | "TH" | "VN" | "ID" => {
            "APAC"
        }
        _ => return None,
    };
    Some(region)
}
