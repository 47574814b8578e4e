//! Payload cleaning helpers shared by message constructors.

/// Literal boolean payloads of the convention.
pub const PAYLOAD_BOOL_TRUE: &str = "true";
pub const PAYLOAD_BOOL_FALSE: &str = "false";

/// Sentinel payload marking an attribute as intentionally unset.
pub const VALUE_NOT_SET: &str = "none";

/// Strips a name payload down to the characters allowed in entity names.
pub fn clean_name(payload: &str) -> String {
    payload
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | '_' | ' ' | '-'))
        .collect()
}

/// Strips a value payload down to the characters allowed in attribute
/// values. Units keep their degree/percent style symbols.
pub fn clean_payload(payload: &str) -> String {
    payload
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric()
                || matches!(
                    c,
                    '.' | ':' | ',' | ' ' | '-' | '_' | '/' | '"' | '°' | '%' | 'µ' | '³'
                )
        })
        .collect()
}

/// Splits a comma-separated list payload: lowercased, trimmed, empty
/// items dropped, duplicates removed preserving first occurrence.
pub fn parse_list(payload: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();

    for item in payload.to_lowercase().split(',') {
        let item = item.trim();

        if item.is_empty() {
            continue;
        }

        if !items.iter().any(|seen| seen == item) {
            items.push(item.to_owned());
        }
    }

    items
}

/// Whether the payload is the unset sentinel (or blank).
pub fn is_not_set(payload: &str) -> bool {
    payload.is_empty() || payload == VALUE_NOT_SET
}
