const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * 1024 * 1024;

pub fn mb_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(MIB)
}

/// Whole gigabytes for display, rounded up the way the management console shows it.
pub fn display_gb(bytes: u64) -> u64 {
    bytes / GIB + 1
}

/// Drop repeated names, keeping the first occurrence and the original order.
pub fn dedupe_names(names: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}
