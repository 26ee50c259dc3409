//! Utility functions and helpers

/// Group a passcode for display: "482913" -> "482 913"
pub fn format_otp(otp: &str) -> String {
    let chars: Vec<char> = otp.trim().chars().collect();
    if chars.len() < 4 {
        return chars.into_iter().collect();
    }

    let mid = chars.len() / 2;
    let (head, tail) = chars.split_at(mid);
    format!(
        "{} {}",
        head.iter().collect::<String>(),
        tail.iter().collect::<String>()
    )
}

/// Shorten an address for logging, e.g. 0x1234…abcd
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[address.len() - 4..])
}
