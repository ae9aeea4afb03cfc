//! Id generation and placeholder metadata for uploads

use rand::seq::SliceRandom;
use rand::Rng;

use super::model::ICON_LIST;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const GENERATED_ID_LEN: usize = 8;
const MAX_ID_LEN: usize = 64;

/// Random 8-character lowercase alphanumeric id.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Generate an id not rejected by `taken`.
pub fn generate_unique_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = generate_id();
        if !taken(&id) {
            return id;
        }
    }
}

/// Ids double as file names, so only a narrow slug alphabet is accepted.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

pub fn placeholder_title() -> String {
    const PREFIXES: &[&str] = &["智能", "自动化", "高效", "创新", "专业"];
    const SUFFIXES: &[&str] = &["分析工具", "处理系统", "管理器", "辅助工具", "控制台"];

    let mut rng = rand::thread_rng();
    format!(
        "{}{}",
        PREFIXES.choose(&mut rng).unwrap_or(&PREFIXES[0]),
        SUFFIXES.choose(&mut rng).unwrap_or(&SUFFIXES[0])
    )
}

pub fn placeholder_description() -> String {
    const FEATURES: &[&str] = &["高效", "智能", "便捷", "专业", "创新"];
    const FUNCTIONS: &[&str] = &["数据分析", "流程管理", "自动化处理", "性能优化", "系统控制"];
    const BENEFITS: &[&str] = &["提高效率", "节省时间", "优化性能", "降低成本", "提升体验"];

    let mut rng = rand::thread_rng();
    format!(
        "这是一个{}的{}工具，能够{}。",
        FEATURES.choose(&mut rng).unwrap_or(&FEATURES[0]),
        FUNCTIONS.choose(&mut rng).unwrap_or(&FUNCTIONS[0]),
        BENEFITS.choose(&mut rng).unwrap_or(&BENEFITS[0])
    )
}

pub fn random_icon() -> String {
    ICON_LIST
        .choose(&mut rand::thread_rng())
        .unwrap_or(&ICON_LIST[0])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_shape() {
        for _ in 0..100 {
            let id = generate_id();
            assert_eq!(id.len(), 8);
            assert!(is_valid_id(&id));
            assert!(!id.bytes().any(|b| b.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_unique_id_skips_taken() {
        let first = generate_id();
        let calls = std::cell::Cell::new(0);
        let id = generate_unique_id(|candidate| {
            calls.set(calls.get() + 1);
            calls.get() == 1 || candidate == first
        });
        assert_ne!(id, first);
        assert!(calls.get() >= 2);
    }

    #[test]
    fn test_id_validation() {
        assert!(is_valid_id("abc12345"));
        assert!(is_valid_id("my-app_2"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc"));
        assert!(!is_valid_id("Upper"));
        assert!(!is_valid_id("with space"));
        assert!(!is_valid_id(&"a".repeat(65)));
    }

    #[test]
    fn test_placeholders_not_empty() {
        assert!(!placeholder_title().is_empty());
        let description = placeholder_description();
        assert!(description.starts_with("这是一个"));
        assert!(description.ends_with('。'));
        assert!(ICON_LIST.contains(&random_icon().as_str()));
    }
}
