//! Closed vocabularies for tag-like tokens.
//!
//! A token that looks like a currency code, region code or payment tag but is
//! not listed here is rejected rather than folded into the description.

use crate::types::PaymentMethod;

const CURRENCIES: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN", "BAM", "BBD", "BDT",
    "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BRL", "BSD", "BTN", "BWP", "BYN", "BZD", "CAD",
    "CDF", "CHF", "CLP", "CNY", "COP", "CRC", "CUP", "CVE", "CZK", "DJF", "DKK", "DOP", "DZD",
    "EGP", "ERN", "ETB", "EUR", "FJD", "FKP", "GBP", "GEL", "GHS", "GIP", "GMD", "GNF", "GTQ",
    "GYD", "HKD", "HNL", "HTG", "HUF", "IDR", "ILS", "INR", "IQD", "IRR", "ISK", "JMD", "JOD",
    "JPY", "KES", "KGS", "KHR", "KMF", "KPW", "KRW", "KWD", "KYD", "KZT", "LAK", "LBP", "LKR",
    "LRD", "LSL", "LYD", "MAD", "MDL", "MGA", "MKD", "MMK", "MNT", "MOP", "MRU", "MUR", "MVR",
    "MWK", "MXN", "MYR", "MZN", "NAD", "NGN", "NIO", "NOK", "NPR", "NZD", "OMR", "PAB", "PEN",
    "PGK", "PHP", "PKR", "PLN", "PYG", "QAR", "RON", "RSD", "RUB", "RWF", "SAR", "SBD", "SCR",
    "SDG", "SEK", "SGD", "SHP", "SLE", "SOS", "SRD", "SSP", "STN", "SVC", "SYP", "SZL", "THB",
    "TJS", "TMT", "TND", "TOP", "TRY", "TTD", "TWD", "TZS", "UAH", "UGX", "USD", "UYU", "UZS",
    "VES", "VND", "VUV", "WST", "XAF", "XCD", "XOF", "XPF", "YER", "ZAR", "ZMW", "ZWL",
];

const REGIONS: &[&str] = &[
    "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT", "AU", "AW", "AX",
    "AZ", "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN", "BO", "BQ",
    "BR", "BS", "BT", "BV", "BW", "BY", "BZ", "CA", "CC", "CD", "CF", "CG", "CH", "CI", "CK",
    "CL", "CM", "CN", "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ", "DE", "DJ", "DK", "DM",
    "DO", "DZ", "EC", "EE", "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK", "FM", "FO", "FR",
    "GA", "GB", "GD", "GE", "GF", "GG", "GH", "GI", "GL", "GM", "GN", "GP", "GQ", "GR", "GS",
    "GT", "GU", "GW", "GY", "HK", "HM", "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN",
    "IO", "IQ", "IR", "IS", "IT", "JE", "JM", "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN",
    "KP", "KR", "KW", "KY", "KZ", "LA", "LB", "LC", "LI", "LK", "LR", "LS", "LT", "LU", "LV",
    "LY", "MA", "MC", "MD", "ME", "MF", "MG", "MH", "MK", "ML", "MM", "MN", "MO", "MP", "MQ",
    "MR", "MS", "MT", "MU", "MV", "MW", "MX", "MY", "MZ", "NA", "NC", "NE", "NF", "NG", "NI",
    "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG", "PH", "PK", "PL", "PM",
    "PN", "PR", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW", "SA", "SB", "SC",
    "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR", "SS", "ST", "SV",
    "SX", "SY", "SZ", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO", "TR",
    "TT", "TV", "TW", "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE", "VG", "VI",
    "VN", "VU", "WF", "WS", "YE", "YT", "ZA", "ZM", "ZW",
];

/// Canonical ISO 4217 code for a printed currency token. `RMB` maps to `CNY`.
pub fn currency_code(token: &str) -> Option<&'static str> {
    if token == "RMB" {
        return Some("CNY");
    }
    CURRENCIES.iter().copied().find(|c| *c == token)
}

pub fn is_region_code(token: &str) -> bool {
    REGIONS.contains(&token)
}

/// Shape test only: two uppercase ASCII letters.
pub fn looks_like_region(token: &str) -> bool {
    token.len() == 2 && token.bytes().all(|b| b.is_ascii_uppercase())
}

/// Shape test only: three uppercase ASCII letters.
pub fn looks_like_currency(token: &str) -> bool {
    token.len() == 3 && token.bytes().all(|b| b.is_ascii_uppercase())
}

/// Resolve a payment tag continuation line. `None` means unrecognized.
pub fn payment_method(tag: &str) -> Option<PaymentMethod> {
    let compact: String = tag
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    if let Some(device) = compact.strip_prefix("APPLEPAY-MOBILE:") {
        if device.len() == 4 && device.bytes().all(|b| b.is_ascii_digit()) {
            return Some(PaymentMethod::ApplePay);
        }
        return None;
    }
    if compact == "UNIONPAYQR" {
        return Some(PaymentMethod::UnionpayQr);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_aliases() {
        assert_eq!(currency_code("USD"), Some("USD"));
        assert_eq!(currency_code("RMB"), Some("CNY"));
        assert_eq!(currency_code("XYZ"), None);
    }

    #[test]
    fn test_regions() {
        assert!(is_region_code("HK"));
        assert!(is_region_code("JP"));
        assert!(!is_region_code("UK"));
        assert!(looks_like_region("UK"));
    }

    #[test]
    fn test_payment_tags() {
        assert_eq!(
            payment_method("APPLE PAY-MOBILE:4321"),
            Some(PaymentMethod::ApplePay)
        );
        assert_eq!(payment_method("UNIONPAY QR"), Some(PaymentMethod::UnionpayQr));
        assert_eq!(payment_method("GOOGLE PAY-MOBILE:4321"), None);
        assert_eq!(payment_method("APPLE PAY-MOBILE:43"), None);
    }
}
