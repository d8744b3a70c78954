//! DNS record name derivation.
//!
//! Record names are a pure function of the instance's identity and the
//! deployment's root domain; feature flags play no part here.

/// Build one DNS record name:
/// `<key>.<group>.<network>.<deployment>.<domain>`.
///
/// `key` is either the instance index or its uuid and is passed through
/// untouched; the other labels are canonicalized.
pub fn dns_record_name(
    key: &str,
    instance_group: &str,
    network: &str,
    deployment: &str,
    root_domain: &str,
) -> String {
    format!(
        "{}.{}.{}.{}.{}",
        key,
        canonicalize(instance_group),
        canonicalize(network),
        canonicalize(deployment),
        root_domain,
    )
}

/// Lowercase a name label and map underscores to dashes; anything else
/// outside `[a-z0-9-]` is dropped.
pub fn canonicalize(label: &str) -> String {
    label
        .chars()
        .filter_map(|c| match c {
            '_' => Some('-'),
            c if c.is_ascii_alphanumeric() || c == '-' => Some(c.to_ascii_lowercase()),
            _ => None,
        })
        .collect()
}
