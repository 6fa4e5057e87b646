use std::time::{Duration, SystemTime};

/// Short, mostly-unique id from time and pid, used to name throwaway containers.
pub fn create_short_id() -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let pid = std::process::id() as u128;
    let mix = now.as_nanos() ^ (pid << 20);
    // base36 of the low 40 bits
    let mut v = (mix & 0xff_ffff_ffff) as u64;
    let alphabet = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut s = String::new();
    if v == 0 {
        s.push('0');
    }
    while v > 0 {
        s.push(alphabet[(v % 36) as usize] as char);
        v /= 36;
    }
    s.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_is_lowercase_base36() {
        let id = create_short_id();
        assert!(!id.is_empty() && id.len() <= 8);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }
}
