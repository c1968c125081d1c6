// 🔢 CNPJ identifiers
// Normalized form: digits only, left-padded with zeros to 14 characters.

use std::collections::HashSet;

pub const CNPJ_LEN: usize = 14;

/// Strip everything that is not a digit and left-pad to 14 digits.
///
/// Malformed identifiers are not rejected: "12.345.678/0001-95" and
/// "12345678000195" normalize to the same value, and garbage becomes all zeros.
/// Inputs with more than 14 digits are kept whole.
pub fn clean_cnpj(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{:0>width$}", digits, width = CNPJ_LEN)
}

/// Normalize, drop blanks and duplicates, keep first-seen order.
pub fn unique_cnpjs<I, S>(raw_ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw_ids
        .into_iter()
        .filter(|raw| !raw.as_ref().trim().is_empty())
        .map(|raw| clean_cnpj(raw.as_ref()))
        .filter(|cnpj| seen.insert(cnpj.clone()))
        .collect()
}
