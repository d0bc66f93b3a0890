use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::models::Conf;
use crate::utils::constants::PREPROCESS_REGEX;

/// 预处理器持有的命名自增计数器（series/chapter/panel/figure）
///
/// 由本次调用显式拥有，以可变借用贯穿递归包含；不用全局状态，
/// 重复运行与测试相互隔离。
#[derive(Debug, Default)]
pub struct SeriesCounters {
    values: HashMap<String, i64>,
}

impl SeriesCounters {
    /// 识别的计数器指令名
    pub fn is_known(name: &str) -> bool {
        matches!(name, "series" | "chapter" | "panel" | "figure")
    }

    /// 取当前值（可带显式重置），然后自增
    fn take(&mut self, name: &str, reset: Option<&str>) -> i64 {
        let entry = self.values.entry(name.to_string()).or_insert(1);
        if let Some(r) = reset {
            if let Ok(v) = r.trim().parse::<i64>() {
                *entry = v;
            }
        }
        let v = *entry;
        *entry += 1;
        v
    }
}

/// 预处理结果
#[derive(Debug)]
pub struct PreprocessOutput {
    /// 展开指令、剥离注释后的正文
    pub text: String,
    /// 收集到的 boneyard 内容（性别表可能内嵌其中）
    pub boneyards: Vec<String>,
}

/// 预处理：剥离 boneyard、展开 {{include:}} / {{timestamp}} / 计数器指令
///
/// `base_dir` 是包含文件解析的基准目录。
pub fn preprocess(
    script: &str,
    base_dir: &Path,
    conf: &Conf,
    counters: &mut SeriesCounters,
) -> PreprocessOutput {
    let mut boneyards = Vec::new();
    let mut text = expand(script, base_dir, conf, counters, &mut boneyards, 0);
    if !conf.print_notes {
        text = PREPROCESS_REGEX["note"].replace_all(&text, "").to_string();
    }
    PreprocessOutput { text, boneyards }
}

fn expand(
    script: &str,
    base_dir: &Path,
    conf: &Conf,
    counters: &mut SeriesCounters,
    boneyards: &mut Vec<String>,
    depth: usize,
) -> String {
    let stripped = strip_boneyards(script, boneyards);
    expand_directives(&stripped, base_dir, conf, counters, boneyards, depth)
}

/// 剥离 /* ... */ 注释块并收集其内容；未闭合的块按字面保留
fn strip_boneyards(text: &str, boneyards: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        match rest.find("/*") {
            None => {
                out.push_str(rest);
                return out;
            }
            Some(open) => {
                out.push_str(&rest[..open]);
                let after = &rest[open + 2..];
                match after.find("*/") {
                    None => {
                        // 未闭合：按字面保留，继续扫描后续文本
                        out.push_str(&rest[open..]);
                        return out;
                    }
                    Some(close) => {
                        boneyards.push(after[..close].to_string());
                        rest = &after[close + 2..];
                    }
                }
            }
        }
    }
}

fn expand_directives(
    text: &str,
    base_dir: &Path,
    conf: &Conf,
    counters: &mut SeriesCounters,
    boneyards: &mut Vec<String>,
    depth: usize,
) -> String {
    let re = &PREPROCESS_REGEX["directive"];
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0usize;

    for cap in re.captures_iter(text) {
        let whole = cap.get(0).unwrap();
        out.push_str(&text[last_end..whole.start()]);
        last_end = whole.end();

        let keyword = cap.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        let value = cap.get(2).map(|m| m.as_str().trim());

        match keyword.as_str() {
            "include" => {
                match expand_include(value, base_dir, conf, counters, boneyards, depth) {
                    Some(included) => out.push_str(&included),
                    None => out.push_str(whole.as_str()),
                }
            }
            "timestamp" => {
                let fmt = value.filter(|v| !v.is_empty()).unwrap_or("%-d %b %Y");
                out.push_str(&Local::now().format(fmt).to_string());
            }
            k if SeriesCounters::is_known(k) => {
                let v = counters.take(k, value.filter(|v| !v.is_empty()));
                out.push_str(&v.to_string());
            }
            // 页眉页脚留给行分类器消费
            _ => out.push_str(whole.as_str()),
        }
    }
    out.push_str(&text[last_end..]);
    out
}

/// 包含文件展开；读不到或超过深度上限时返回 None，调用方保留字面指令
fn expand_include(
    value: Option<&str>,
    base_dir: &Path,
    conf: &Conf,
    counters: &mut SeriesCounters,
    boneyards: &mut Vec<String>,
    depth: usize,
) -> Option<String> {
    let rel = value.filter(|v| !v.is_empty())?;
    if depth >= conf.include_depth_limit {
        log::warn!("{{{{include}}}} 超过深度上限 {}，按字面保留: {}", conf.include_depth_limit, rel);
        return None;
    }
    let path: PathBuf = base_dir.join(rel);
    match fs::read_to_string(&path) {
        Ok(content) => {
            let next_base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| base_dir.to_path_buf());
            Some(expand(&content, &next_base, conf, counters, boneyards, depth + 1))
        }
        Err(e) => {
            log::warn!("{{{{include}}}} 目标不可读，按字面保留: {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boneyard_stripped_and_collected() {
        let mut b = Vec::new();
        let out = strip_boneyards("a /* 注释 */ b", &mut b);
        assert_eq!(out, "a  b");
        assert_eq!(b, vec![" 注释 ".to_string()]);
    }

    #[test]
    fn unterminated_boneyard_left_literal() {
        let mut b = Vec::new();
        let out = strip_boneyards("a /* 没闭合", &mut b);
        assert_eq!(out, "a /* 没闭合");
        assert!(b.is_empty());
    }

    #[test]
    fn series_counters_increment_and_reset() {
        let mut counters = SeriesCounters::default();
        let conf = Conf::default();
        let out = preprocess(
            "第{{chapter}}章 {{chapter}} {{chapter: 9}} {{chapter}}",
            Path::new("."),
            &conf,
            &mut counters,
        );
        assert_eq!(out.text, "第1章 2 9 10");
    }

    #[test]
    fn missing_include_left_literal() {
        let mut counters = SeriesCounters::default();
        let conf = Conf::default();
        let out = preprocess("{{include: 不存在的文件.fountain}}", Path::new("."), &conf, &mut counters);
        assert_eq!(out.text, "{{include: 不存在的文件.fountain}}");
    }

    #[test]
    fn notes_stripped_when_disabled() {
        let mut counters = SeriesCounters::default();
        let mut conf = Conf::default();
        conf.print_notes = false;
        let out = preprocess("前 [[备注]] 后", Path::new("."), &conf, &mut counters);
        assert_eq!(out.text, "前  后");
    }
}
