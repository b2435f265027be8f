//! Parsing of device command output

use std::collections::BTreeMap;
use std::sync::LazyLock;

use devlink_core::ProductInfo;
use regex::Regex;

/// Matches one `getprop` line: `[ro.product.model]: [Pixel 7]`
static GETPROP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[([^\]]+)\]:\s*\[(.*)\]\s*$").expect("Invalid getprop line regex")
});

/// Binary names we are willing to interpolate into a shell command
static BINARY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._+-]+$").expect("Invalid binary name regex"));

/// Parse the first token of a liveness command's output as a number
pub fn parse_reading(output: &str) -> Option<f64> {
    output
        .split_whitespace()
        .next()
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

/// A reading counts as a liveness signal when it is a finite positive number
pub fn is_live_reading(reading: Option<f64>) -> bool {
    reading.is_some_and(|value| value.is_finite() && value > 0.0)
}

/// Parse `getprop` output into a key/value map
pub fn parse_getprop(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| GETPROP_LINE.captures(line.trim()))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Build product metadata from `getprop` output
pub fn parse_product_info(output: &str) -> ProductInfo {
    let props = parse_getprop(output);
    let get = |key: &str| {
        props
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
    };

    ProductInfo {
        device: get("ro.product.device"),
        model: get("ro.product.model"),
        manufacturer: get("ro.product.manufacturer"),
        release: get("ro.build.version.release"),
    }
}

pub fn is_valid_binary_name(name: &str) -> bool {
    BINARY_NAME.is_match(name)
}

/// Shell command printing `yes` or `no` depending on whether `name` is on PATH
pub fn binary_check_command(name: &str) -> String {
    format!(
        "command -v {} >/dev/null 2>&1 && echo yes || echo no",
        name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const GETPROP: &str = "\
[ro.build.version.release]: [4.4.2]
[ro.product.device]: [wm150]
[ro.product.manufacturer]: [DJI]
[ro.product.model]: [FPV Goggles]
[ro.empty]: []
garbage line
";

    #[test]
    fn test_parse_reading() {
        assert_eq!(parse_reading("42\n"), Some(42.0));
        assert_eq!(parse_reading("  38.5 C"), Some(38.5));
        assert_eq!(parse_reading("0"), Some(0.0));
        assert_eq!(parse_reading(""), None);
        assert_eq!(parse_reading("cat: no such file"), None);
        assert_eq!(parse_reading("NaN"), None);
    }

    #[test]
    fn test_is_live_reading() {
        assert!(is_live_reading(Some(42.0)));
        assert!(is_live_reading(Some(0.5)));
        assert!(!is_live_reading(Some(0.0)));
        assert!(!is_live_reading(Some(-3.0)));
        assert!(!is_live_reading(None));
    }

    #[test]
    fn test_parse_getprop() {
        let props = parse_getprop(GETPROP);
        assert_eq!(props.get("ro.product.device").map(String::as_str), Some("wm150"));
        assert_eq!(props.get("ro.empty").map(String::as_str), Some(""));
        assert_eq!(props.len(), 5);
    }

    #[test]
    fn test_parse_product_info() {
        let info = parse_product_info(GETPROP);
        assert_eq!(info.device.as_deref(), Some("wm150"));
        assert_eq!(info.model.as_deref(), Some("FPV Goggles"));
        assert_eq!(info.manufacturer.as_deref(), Some("DJI"));
        assert_eq!(info.release.as_deref(), Some("4.4.2"));
    }

    #[test]
    fn test_binary_name_validation() {
        assert!(is_valid_binary_name("busybox"));
        assert!(is_valid_binary_name("opkg"));
        assert!(!is_valid_binary_name("rm -rf /"));
        assert!(!is_valid_binary_name("a;b"));
        assert!(!is_valid_binary_name(""));
    }

    #[test]
    fn test_binary_check_command() {
        assert_eq!(
            binary_check_command("opkg"),
            "command -v opkg >/dev/null 2>&1 && echo yes || echo no"
        );
    }
}
