//! 基本型の識別子表
//!
//! 順方向・逆方向の両方で共有する。基本型は型テーブルに出力されず、
//! 型環境が起動時にこの表から `Reserved` レコードを用意する。

/// (識別子, 綴り) の組
const FUNDAMENTAL_TYPES: &[(&str, &str)] = &[
    ("void", "void"),
    ("char", "char"),
    ("short", "short"),
    ("int", "int"),
    ("long", "long"),
    ("unsigned", "unsigned"),
    ("float", "float"),
    ("double", "double"),
    ("wchar_t", "wchar_t"),
    ("char16_t", "char16_t"),
    ("char32_t", "char32_t"),
    ("bool", "bool"),
    ("signed_char", "signed char"),
    ("long_long", "long long"),
    ("unsigned_char", "unsigned char"),
    ("unsigned_short", "unsigned short"),
    ("unsigned_int", "unsigned int"),
    ("unsigned_long", "unsigned long"),
    ("unsigned_long_long", "unsigned long long"),
    ("long_double", "long double"),
    ("__int128", "__int128"),
    ("unsigned___int128", "unsigned __int128"),
];

/// 基本型表を走査
pub fn iter() -> impl Iterator<Item = (&'static str, &'static str)> {
    FUNDAMENTAL_TYPES.iter().copied()
}

/// 綴りから識別子を作る（英数字以外は `_` に置換）
pub fn ident_for_spelling(spelling: &str) -> String {
    spelling
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// 識別子が基本型か
pub fn is_fundamental(ident: &str) -> bool {
    FUNDAMENTAL_TYPES.iter().any(|(id, _)| *id == ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_for_spelling() {
        assert_eq!(ident_for_spelling("unsigned long long"), "unsigned_long_long");
        assert_eq!(ident_for_spelling("int"), "int");
    }

    #[test]
    fn test_every_ident_matches_its_spelling() {
        for (ident, spelling) in iter() {
            assert_eq!(ident_for_spelling(spelling), ident);
        }
    }

    #[test]
    fn test_lookup() {
        assert!(is_fundamental("long_double"));
        assert!(is_fundamental("unsigned_char"));
        assert!(!is_fundamental("Pointer0"));
    }
}
