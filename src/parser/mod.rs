pub mod normalizer;
pub mod preprocessor;
pub mod title_page;
pub mod gender;
pub mod classifier;

pub use normalizer::normalize;
pub use preprocessor::{preprocess, PreprocessOutput, SeriesCounters};
pub use title_page::parse_title_page;
pub use gender::parse_gender_tables;
pub use classifier::classify;

use std::path::Path;

use crate::models::{Conf, Document};

/// 完整解析管线：规范化 → 预处理 → 标题页 → 行分类
///
/// `base_dir` 用于 {{include:}} 的相对路径解析。
/// 产出的 Document 尚未排版，节点没有页码坐标。
pub fn parse_document(script: &str, base_dir: &Path, conf: &Conf) -> Document {
    let mut doc = Document::new();
    let normalized = normalize(script);

    let mut counters = SeriesCounters::default();
    let pre = preprocess(&normalized, base_dir, conf, &mut counters);

    let lines: Vec<&str> = pre.text.split('\n').collect();
    let body_start = parse_title_page(&lines, &mut doc);
    let body = lines[body_start..].join("\n");

    // 先合并性别表，分类时按名字/别名命中同一条目；
    // 其后遇到的未知角色自动归入 unknown 组
    parse_gender_tables(&pre.boneyards, &mut doc.characters);
    classify(&body, conf, &mut doc);

    doc
}
