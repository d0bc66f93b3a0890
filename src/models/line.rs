use serde::{Deserialize, Serialize};

/// 样式开关通道（零宽叶子用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleChannel {
    Bold,
    Italic,
    BoldItalic,
    Note,
}

/// 区间通道（以 [start,end) 偏移对记录的三类样式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeChannel {
    Underline,
    Strikeout,
    Highlight,
}

/// 叶子：换行输出的最小样式单位
///
/// 只有 Text 叶子携带文字；Toggle 叶子零宽，包夹它作用到的文本叶子。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leaf {
    Text(String),
    Toggle { channel: ToggleChannel, opening: bool },
}

/// 字符偏移区间 [start, end)，相对于所在行
pub type StyleRange = (usize, usize);

/// 换行后的一行定宽输出
///
/// 三张区间表都只在本行长度以内；跨行的样式在上一行收口、
/// 在续行偏移 0 处重开，各自记一条区间。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// 本行渲染长度（等宽格子数）
    pub length: usize,
    /// 叶子序列
    pub leaves: Vec<Leaf>,
    /// 下划线区间
    pub underline: Vec<StyleRange>,
    /// 删除线区间
    pub strikeout: Vec<StyleRange>,
    /// 高亮区间
    pub highlight: Vec<StyleRange>,
}

impl Line {
    /// 拼接所有文本叶子（调试与测试用）
    pub fn text(&self) -> String {
        let mut out = String::new();
        for leaf in &self.leaves {
            if let Leaf::Text(t) = leaf {
                out.push_str(t);
            }
        }
        out
    }
}
