pub mod constants;

use unicode_segmentation::UnicodeSegmentation;

/// 等宽网格下的显示宽度（字素簇计数，不做比例字形度量）
pub fn display_width(text: &str) -> usize {
    text.graphemes(true).count()
}

/// 剥离内联标记字符，得到纯文本（$变量替换与统计用）
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' | '_' | '+' => {}
            '~' if chars.peek() == Some(&'~') => {
                chars.next();
            }
            '[' if chars.peek() == Some(&'[') => {
                chars.next();
            }
            ']' if chars.peek() == Some(&']') => {
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out.trim().to_string()
}
