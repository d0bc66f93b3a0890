use crate::models::{canonical_key, Document};
use crate::utils::constants::LINE_REGEX;

/// 识别的标题页键（规范形式）；大小写/空白/标点不敏感
const TITLE_KEYS: &[&str] = &[
    "title",
    "credit",
    "author",
    "authors",
    "source",
    "notes",
    "draftdate",
    "date",
    "contact",
    "contactinfo",
    "copyright",
    "revision",
    "watermark",
    "header",
    "footer",
];

fn is_title_key(canon: &str) -> bool {
    TITLE_KEYS.contains(&canon)
}

/// 标题页解析：消费正文开头的 `key: value` 块（含缩进续行）
///
/// 返回正文起始行下标。块由首个空行或非键非续行内容终止；
/// 首个非空行的键不在识别词表内时视为没有标题页。
pub fn parse_title_page(lines: &[&str], doc: &mut Document) -> usize {
    let mut i = 0usize;

    // 跳过起始空行
    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    let start = i;

    // 首行必须是识别键，否则整体按正文处理
    let first_key = match LINE_REGEX["title_page"].captures(lines.get(i).copied().unwrap_or("")) {
        Some(cap) => canonical_key(cap.get(1).map(|m| m.as_str()).unwrap_or("")),
        None => return 0,
    };
    if !is_title_key(&first_key) {
        return 0;
    }

    let mut last_key: Option<String> = None;
    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            // 空行终止标题页块
            i += 1;
            break;
        }
        if let Some(cap) = LINE_REGEX["title_page"].captures(line) {
            let key = canonical_key(cap.get(1).map(|m| m.as_str()).unwrap_or(""));
            let value = cap.get(2).map(|m| m.as_str().trim()).unwrap_or("").to_string();
            doc.title.insert(key.clone(), value);
            last_key = Some(key);
            i += 1;
            continue;
        }
        if LINE_REGEX["title_continuation"].is_match(line) {
            if let Some(key) = &last_key {
                let entry = doc.title.entry(key.clone()).or_default();
                if !entry.is_empty() {
                    entry.push('\n');
                }
                entry.push_str(line.trim());
            }
            i += 1;
            continue;
        }
        // 非键非续行：标题页到此为止，该行归正文
        break;
    }

    // 页眉页脚键直接落到文档模板上
    if let Some(h) = doc.title.get("header") {
        doc.header = h.clone();
    }
    if let Some(f) = doc.title.get("footer") {
        doc.footer = f.clone();
    }

    if i == start {
        0
    } else {
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<&str> {
        src.split('\n').collect()
    }

    #[test]
    fn consumes_leading_block_with_continuation() {
        let src = "Title: 黑色爱情诗\nDraft Date: 2026-08-01\nContact:\n    someone@example.com\n    备用联系人\n\nINT. ROOM - DAY";
        let ls = lines(src);
        let mut doc = Document::new();
        let body = parse_title_page(&ls, &mut doc);
        assert_eq!(doc.title_field("title"), Some("黑色爱情诗"));
        assert_eq!(doc.title_field("DRAFT DATE"), Some("2026-08-01"));
        assert_eq!(doc.title_field("contact"), Some("someone@example.com\n备用联系人"));
        assert_eq!(ls[body], "INT. ROOM - DAY");
    }

    #[test]
    fn body_without_title_page_untouched() {
        let src = "INT. ROOM - DAY\n\n正文。";
        let ls = lines(src);
        let mut doc = Document::new();
        assert_eq!(parse_title_page(&ls, &mut doc), 0);
        assert!(doc.title.is_empty());
    }
}
