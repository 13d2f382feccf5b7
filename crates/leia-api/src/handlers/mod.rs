//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod chat;
pub mod health;
pub mod info;
pub mod pergunta;

/// API version reported in every response
pub const API_VERSION: &str = "1.0";

/// Local time as `%Y-%m-%d %H:%M:%S`
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[13..14], ":");
    }
}
