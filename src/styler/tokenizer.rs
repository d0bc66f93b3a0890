use crate::models::line::RangeChannel;

/// 内联标记种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Italic,
    Bold,
    BoldItalic,
    Underline,
    Strikeout,
    Highlight,
}

impl MarkerKind {
    /// 区间类通道（以偏移对记录），其余是零宽开关通道
    pub fn range_channel(self) -> Option<RangeChannel> {
        match self {
            MarkerKind::Underline => Some(RangeChannel::Underline),
            MarkerKind::Strikeout => Some(RangeChannel::Strikeout),
            MarkerKind::Highlight => Some(RangeChannel::Highlight),
            _ => None,
        }
    }
}

/// 原始 token：分词器输出，配平前
#[derive(Debug, Clone, PartialEq)]
pub enum RawToken {
    /// 连续普通文字（含转义产物）
    Word(String),
    /// 空白宽度
    Space(usize),
    /// 强制换行
    Newline,
    /// 样式标记；literal 是回退字面
    Marker {
        kind: MarkerKind,
        literal: String,
        can_open: bool,
        can_close: bool,
    },
    /// 注解开口 [[（宽度 ≥2）
    NoteOpen { literal: String },
    /// 注解闭口 ]]
    NoteClose { literal: String },
    /// $变量（标题页字段替换）
    Variable { name: String, literal: String },
    /// #计数器[:重置]
    Counter {
        name: String,
        reset: Option<String>,
        literal: String,
    },
}

// 名字限 ASCII，紧跟的 CJK 正文不会被卷进名字里
fn counter_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// 对节点原始文本做左到右分词
///
/// 开/关资格在这里由相邻空白决定：前无空白可关，后无空白可开；
/// 两侧都是空白的标记永远无效，由配平阶段回退为字面。
pub fn tokenize(text: &str) -> Vec<RawToken> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut toks: Vec<RawToken> = Vec::new();
    let mut i = 0usize;

    while i < len {
        let c = chars[i];
        match c {
            '\n' => {
                toks.push(RawToken::Newline);
                i += 1;
            }
            _ if c.is_whitespace() => {
                let start = i;
                while i < len && chars[i].is_whitespace() && chars[i] != '\n' {
                    i += 1;
                }
                toks.push(RawToken::Space(i - start));
            }
            '\\' => {
                // 转义串长 n：成对部分输出 n/2 个反斜杠；
                // 奇数多出的一个转义下一字符，强制其为字面
                let start = i;
                while i < len && chars[i] == '\\' {
                    i += 1;
                }
                let n = i - start;
                let mut lit = "\\".repeat(n / 2);
                if n % 2 == 1 {
                    if i < len && chars[i] != '\n' {
                        lit.push(chars[i]);
                        i += 1;
                    } else {
                        lit.push('\\');
                    }
                }
                push_word(&mut toks, lit);
            }
            '*' | '_' | '+' | '~' => {
                let start = i;
                while i < len && chars[i] == c {
                    i += 1;
                }
                let n = i - start;
                let kind = match c {
                    '*' => Some(match n {
                        1 => MarkerKind::Italic,
                        2 => MarkerKind::Bold,
                        _ => MarkerKind::BoldItalic,
                    }),
                    '_' if n == 1 => Some(MarkerKind::Underline),
                    '+' if n == 1 => Some(MarkerKind::Highlight),
                    '~' if n == 2 => Some(MarkerKind::Strikeout),
                    _ => None,
                };
                let literal: String = std::iter::repeat(c).take(n).collect();
                match kind {
                    Some(kind) => {
                        let can_close = start > 0 && !chars[start - 1].is_whitespace();
                        let can_open = i < len && !chars[i].is_whitespace();
                        toks.push(RawToken::Marker { kind, literal, can_open, can_close });
                    }
                    None => push_word(&mut toks, literal),
                }
            }
            '[' | ']' => {
                let start = i;
                while i < len && chars[i] == c {
                    i += 1;
                }
                let n = i - start;
                let literal: String = std::iter::repeat(c).take(n).collect();
                if n >= 2 {
                    if c == '[' {
                        toks.push(RawToken::NoteOpen { literal });
                    } else {
                        toks.push(RawToken::NoteClose { literal });
                    }
                } else {
                    push_word(&mut toks, literal);
                }
            }
            '$' => {
                let start = i + 1;
                let mut j = start;
                while j < len && counter_name_char(chars[j]) {
                    j += 1;
                }
                if j > start {
                    let name: String = chars[start..j].iter().collect();
                    toks.push(RawToken::Variable { literal: format!("${}", name), name });
                    i = j;
                } else {
                    push_word(&mut toks, "$".to_string());
                    i += 1;
                }
            }
            '#' => {
                let start = i + 1;
                let mut j = start;
                while j < len && counter_name_char(chars[j]) {
                    j += 1;
                }
                if j > start {
                    let name: String = chars[start..j].iter().collect();
                    let mut reset = None;
                    let mut end = j;
                    if end < len && chars[end] == ':' {
                        let rstart = end + 1;
                        let mut k = rstart;
                        while k < len && counter_name_char(chars[k]) {
                            k += 1;
                        }
                        if k > rstart {
                            reset = Some(chars[rstart..k].iter().collect::<String>());
                            end = k;
                        }
                    }
                    let literal: String = chars[i..end].iter().collect();
                    toks.push(RawToken::Counter { name, reset, literal });
                    i = end;
                } else {
                    push_word(&mut toks, "#".to_string());
                    i += 1;
                }
            }
            _ => {
                let start = i;
                while i < len {
                    let c = chars[i];
                    if c.is_whitespace() || matches!(c, '\\' | '*' | '_' | '+' | '~' | '[' | ']' | '$' | '#') {
                        break;
                    }
                    i += 1;
                }
                push_word(&mut toks, chars[start..i].iter().collect());
            }
        }
    }
    toks
}

/// 相邻字面合并，避免碎词
pub(crate) fn push_word(toks: &mut Vec<RawToken>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(RawToken::Word(prev)) = toks.last_mut() {
        prev.push_str(&text);
        return;
    }
    toks.push(RawToken::Word(text));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_eligibility_from_whitespace() {
        let toks = tokenize("*词* 与 *另");
        match &toks[0] {
            RawToken::Marker { kind, can_open, can_close, .. } => {
                assert_eq!(*kind, MarkerKind::Italic);
                assert!(*can_open);
                assert!(!*can_close); // 行首无前导字符
            }
            t => panic!("意外 token: {:?}", t),
        }
        match &toks[2] {
            RawToken::Marker { can_open, can_close, .. } => {
                assert!(!*can_open); // 后随空白
                assert!(*can_close);
            }
            t => panic!("意外 token: {:?}", t),
        }
    }

    #[test]
    fn escape_runs() {
        // 偶数串：全字面，输出 n/2 个反斜杠
        assert_eq!(tokenize(r"\\"), vec![RawToken::Word("\\".to_string())]);
        // 单个转义：下一字符强制字面
        assert_eq!(tokenize(r"\*x"), vec![RawToken::Word("*x".to_string())]);
        // 奇数 n>1：成对部分 + 一次真转义
        assert_eq!(tokenize(r"\\\*"), vec![RawToken::Word("\\*".to_string())]);
    }

    #[test]
    fn literal_fallback_for_long_runs() {
        assert_eq!(tokenize("__"), vec![RawToken::Word("__".to_string())]);
        assert_eq!(tokenize("++"), vec![RawToken::Word("++".to_string())]);
        assert_eq!(tokenize("~"), vec![RawToken::Word("~".to_string())]);
        assert!(matches!(
            tokenize("a~~b")[1],
            RawToken::Marker { kind: MarkerKind::Strikeout, .. }
        ));
    }

    #[test]
    fn counter_with_reset() {
        let toks = tokenize("#fig:B");
        assert_eq!(
            toks[0],
            RawToken::Counter {
                name: "fig".to_string(),
                reset: Some("B".to_string()),
                literal: "#fig:B".to_string(),
            }
        );
    }

    #[test]
    fn variable_token() {
        let toks = tokenize("$title 之后");
        assert_eq!(
            toks[0],
            RawToken::Variable { name: "title".to_string(), literal: "$title".to_string() }
        );
    }
}
