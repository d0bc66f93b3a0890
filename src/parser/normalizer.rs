/// 文本规范化：统一换行符、智能引号、制表符与长短破折号
///
/// 后续各阶段都假定输入只含 \n 换行与 ASCII 引号。
pub fn normalize(script: &str) -> String {
    let mut out = String::with_capacity(script.len());
    let mut chars = script.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\t' => out.push_str("    "),
            '\u{2014}' => out.push_str("--"), // em dash
            '\u{2013}' => out.push('-'),      // en dash
            '\u{00A0}' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_line_endings_and_quotes() {
        let src = "a\r\nb\rc\n\u{201C}hi\u{201D} \u{2018}x\u{2019}\t\u{2014}";
        assert_eq!(normalize(src), "a\nb\nc\n\"hi\" 'x'    --");
    }
}
