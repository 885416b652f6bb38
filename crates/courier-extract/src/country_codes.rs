//! Static international calling-code table for display metadata.
//!
//! Lookup is longest-prefix-first so "216" (Tunisia) wins over "2" and
//! "21" would never shadow it. The table only feeds broadcast formatting;
//! allocation countries come from inventory files, not from here.

use std::sync::LazyLock;

const UNKNOWN_COUNTRY: (&str, &str) = ("Unknown", "\u{1F30D}");

const COUNTRY_CODES: &[(&str, &str, &str)] = &[
    ("1", "USA/Canada", "\u{1F1FA}\u{1F1F8}"),
    ("7", "Russia", "\u{1F1F7}\u{1F1FA}"),
    ("20", "Egypt", "\u{1F1EA}\u{1F1EC}"),
    ("27", "South Africa", "\u{1F1FF}\u{1F1E6}"),
    ("30", "Greece", "\u{1F1EC}\u{1F1F7}"),
    ("31", "Netherlands", "\u{1F1F3}\u{1F1F1}"),
    ("32", "Belgium", "\u{1F1E7}\u{1F1EA}"),
    ("33", "France", "\u{1F1EB}\u{1F1F7}"),
    ("34", "Spain", "\u{1F1EA}\u{1F1F8}"),
    ("39", "Italy", "\u{1F1EE}\u{1F1F9}"),
    ("40", "Romania", "\u{1F1F7}\u{1F1F4}"),
    ("41", "Switzerland", "\u{1F1E8}\u{1F1ED}"),
    ("43", "Austria", "\u{1F1E6}\u{1F1F9}"),
    ("44", "United Kingdom", "\u{1F1EC}\u{1F1E7}"),
    ("45", "Denmark", "\u{1F1E9}\u{1F1F0}"),
    ("46", "Sweden", "\u{1F1F8}\u{1F1EA}"),
    ("47", "Norway", "\u{1F1F3}\u{1F1F4}"),
    ("48", "Poland", "\u{1F1F5}\u{1F1F1}"),
    ("49", "Germany", "\u{1F1E9}\u{1F1EA}"),
    ("51", "Peru", "\u{1F1F5}\u{1F1EA}"),
    ("52", "Mexico", "\u{1F1F2}\u{1F1FD}"),
    ("54", "Argentina", "\u{1F1E6}\u{1F1F7}"),
    ("55", "Brazil", "\u{1F1E7}\u{1F1F7}"),
    ("56", "Chile", "\u{1F1E8}\u{1F1F1}"),
    ("57", "Colombia", "\u{1F1E8}\u{1F1F4}"),
    ("58", "Venezuela", "\u{1F1FB}\u{1F1EA}"),
    ("60", "Malaysia", "\u{1F1F2}\u{1F1FE}"),
    ("61", "Australia", "\u{1F1E6}\u{1F1FA}"),
    ("62", "Indonesia", "\u{1F1EE}\u{1F1E9}"),
    ("63", "Philippines", "\u{1F1F5}\u{1F1ED}"),
    ("64", "New Zealand", "\u{1F1F3}\u{1F1FF}"),
    ("65", "Singapore", "\u{1F1F8}\u{1F1EC}"),
    ("66", "Thailand", "\u{1F1F9}\u{1F1ED}"),
    ("81", "Japan", "\u{1F1EF}\u{1F1F5}"),
    ("82", "South Korea", "\u{1F1F0}\u{1F1F7}"),
    ("84", "Vietnam", "\u{1F1FB}\u{1F1F3}"),
    ("86", "China", "\u{1F1E8}\u{1F1F3}"),
    ("90", "Turkey", "\u{1F1F9}\u{1F1F7}"),
    ("91", "India", "\u{1F1EE}\u{1F1F3}"),
    ("92", "Pakistan", "\u{1F1F5}\u{1F1F0}"),
    ("94", "Sri Lanka", "\u{1F1F1}\u{1F1F0}"),
    ("95", "Myanmar", "\u{1F1F2}\u{1F1F2}"),
    ("98", "Iran", "\u{1F1EE}\u{1F1F7}"),
    ("212", "Morocco", "\u{1F1F2}\u{1F1E6}"),
    ("213", "Algeria", "\u{1F1E9}\u{1F1FF}"),
    ("216", "Tunisia", "\u{1F1F9}\u{1F1F3}"),
    ("218", "Libya", "\u{1F1F1}\u{1F1FE}"),
    ("220", "Gambia", "\u{1F1EC}\u{1F1F2}"),
    ("221", "Senegal", "\u{1F1F8}\u{1F1F3}"),
    ("222", "Mauritania", "\u{1F1F2}\u{1F1F7}"),
    ("223", "Mali", "\u{1F1F2}\u{1F1F1}"),
    ("224", "Guinea", "\u{1F1EC}\u{1F1F3}"),
    ("225", "Ivory Coast", "\u{1F1E8}\u{1F1EE}"),
    ("226", "Burkina Faso", "\u{1F1E7}\u{1F1EB}"),
    ("227", "Niger", "\u{1F1F3}\u{1F1EA}"),
    ("228", "Togo", "\u{1F1F9}\u{1F1EC}"),
    ("229", "Benin", "\u{1F1E7}\u{1F1EF}"),
    ("230", "Mauritius", "\u{1F1F2}\u{1F1FA}"),
    ("231", "Liberia", "\u{1F1F1}\u{1F1F7}"),
    ("232", "Sierra Leone", "\u{1F1F8}\u{1F1F1}"),
    ("233", "Ghana", "\u{1F1EC}\u{1F1ED}"),
    ("234", "Nigeria", "\u{1F1F3}\u{1F1EC}"),
    ("235", "Chad", "\u{1F1F9}\u{1F1E9}"),
    ("237", "Cameroon", "\u{1F1E8}\u{1F1F2}"),
    ("241", "Gabon", "\u{1F1EC}\u{1F1E6}"),
    ("242", "Republic of Congo", "\u{1F1E8}\u{1F1EC}"),
    ("243", "Democratic Republic of Congo", "\u{1F1E8}\u{1F1E9}"),
    ("244", "Angola", "\u{1F1E6}\u{1F1F4}"),
    ("249", "Sudan", "\u{1F1F8}\u{1F1E9}"),
    ("250", "Rwanda", "\u{1F1F7}\u{1F1FC}"),
    ("251", "Ethiopia", "\u{1F1EA}\u{1F1F9}"),
    ("252", "Somalia", "\u{1F1F8}\u{1F1F4}"),
    ("254", "Kenya", "\u{1F1F0}\u{1F1EA}"),
    ("255", "Tanzania", "\u{1F1F9}\u{1F1FF}"),
    ("256", "Uganda", "\u{1F1FA}\u{1F1EC}"),
    ("257", "Burundi", "\u{1F1E7}\u{1F1EE}"),
    ("258", "Mozambique", "\u{1F1F2}\u{1F1FF}"),
    ("260", "Zambia", "\u{1F1FF}\u{1F1F2}"),
    ("261", "Madagascar", "\u{1F1F2}\u{1F1EC}"),
    ("263", "Zimbabwe", "\u{1F1FF}\u{1F1FC}"),
    ("264", "Namibia", "\u{1F1F3}\u{1F1E6}"),
    ("265", "Malawi", "\u{1F1F2}\u{1F1FC}"),
    ("267", "Botswana", "\u{1F1E7}\u{1F1FC}"),
    ("351", "Portugal", "\u{1F1F5}\u{1F1F9}"),
    ("352", "Luxembourg", "\u{1F1F1}\u{1F1FA}"),
    ("353", "Ireland", "\u{1F1EE}\u{1F1EA}"),
    ("354", "Iceland", "\u{1F1EE}\u{1F1F8}"),
    ("355", "Albania", "\u{1F1E6}\u{1F1F1}"),
    ("356", "Malta", "\u{1F1F2}\u{1F1F9}"),
    ("357", "Cyprus", "\u{1F1E8}\u{1F1FE}"),
    ("358", "Finland", "\u{1F1EB}\u{1F1EE}"),
    ("359", "Bulgaria", "\u{1F1E7}\u{1F1EC}"),
    ("370", "Lithuania", "\u{1F1F1}\u{1F1F9}"),
    ("371", "Latvia", "\u{1F1F1}\u{1F1FB}"),
    ("372", "Estonia", "\u{1F1EA}\u{1F1EA}"),
    ("373", "Moldova", "\u{1F1F2}\u{1F1E9}"),
    ("374", "Armenia", "\u{1F1E6}\u{1F1F2}"),
    ("375", "Belarus", "\u{1F1E7}\u{1F1FE}"),
    ("380", "Ukraine", "\u{1F1FA}\u{1F1E6}"),
    ("381", "Serbia", "\u{1F1F7}\u{1F1F8}"),
    ("385", "Croatia", "\u{1F1ED}\u{1F1F7}"),
    ("386", "Slovenia", "\u{1F1F8}\u{1F1EE}"),
    ("420", "Czech Republic", "\u{1F1E8}\u{1F1FF}"),
    ("421", "Slovakia", "\u{1F1F8}\u{1F1F0}"),
    ("501", "Belize", "\u{1F1E7}\u{1F1FF}"),
    ("502", "Guatemala", "\u{1F1EC}\u{1F1F9}"),
    ("503", "El Salvador", "\u{1F1F8}\u{1F1FB}"),
    ("504", "Honduras", "\u{1F1ED}\u{1F1F3}"),
    ("505", "Nicaragua", "\u{1F1F3}\u{1F1EE}"),
    ("506", "Costa Rica", "\u{1F1E8}\u{1F1F7}"),
    ("507", "Panama", "\u{1F1F5}\u{1F1E6}"),
    ("509", "Haiti", "\u{1F1ED}\u{1F1F9}"),
    ("962", "Jordan", "\u{1F1EF}\u{1F1F4}"),
];

static CODES_LONGEST_FIRST: LazyLock<Vec<(&'static str, &'static str, &'static str)>> =
    LazyLock::new(|| {
        let mut codes = COUNTRY_CODES.to_vec();
        codes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        codes
    });

/// Resolves display country name and flag for a dialable number.
pub fn country_for_number(number: &str) -> (&'static str, &'static str) {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    for (code, name, flag) in CODES_LONGEST_FIRST.iter() {
        if digits.starts_with(code) {
            return (name, flag);
        }
    }
    UNKNOWN_COUNTRY
}
