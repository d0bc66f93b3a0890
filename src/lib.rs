pub mod models;
pub mod utils;
pub mod parser;
pub mod styler;
pub mod layout;

pub use models::{
    Conf,
    Counter,
    Document,
    Leaf,
    Line,
    Node,
    NodeType,
    PageInfo,
    SceneNumbering,
    Template,
    TypeRule,
};

pub use parser::parse_document;
pub use styler::style_document;
pub use layout::{paginate, PaginateError};

use std::path::Path;

/// 解析剧本文本为未排版的文档模型
///
/// # Arguments
///
/// * `script` - 剧本源文本
/// * `base_dir` - {{include:}} 相对路径的解析基准目录
/// * `conf` - 配置对象
pub fn parse(script: &str, base_dir: &Path, conf: &Conf) -> Document {
    parser::parse_document(script, base_dir, conf)
}

/// 完整管线：解析、换行、分页
///
/// 返回的文档每个节点都带页码与坐标，pages 是逐页的页眉页脚表。
pub fn layout(
    script: &str,
    base_dir: &Path,
    conf: &Conf,
    template: &Template,
) -> Result<Document, PaginateError> {
    let mut template = template.clone();
    template.apply_conf(conf);
    let mut doc = parse(script, base_dir, conf);
    styler::style_document(&mut doc, &template);
    layout::paginate(&mut doc, &template, conf)?;
    Ok(doc)
}
