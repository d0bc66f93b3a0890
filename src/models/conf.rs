use serde::{Deserialize, Serialize};

/// 场景编号模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneNumbering {
    /// 由分页器顺序生成
    Generate,
    /// 保留源文声明的编号
    Preserve,
    /// 不输出编号
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conf {
    /// 是否保留注解 [[...]]（关闭时预处理阶段直接剥离）
    pub print_notes: bool,
    /// 是否打印概要
    pub print_synopsis: bool,
    /// 是否打印章节
    pub print_sections: bool,
    /// 是否启用双栏对白
    pub use_dual_dialogue: bool,
    /// 场景编号模式
    pub scene_numbering: SceneNumbering,
    /// 修订目标标签集合（命中则打星）
    pub revision_tags: Vec<String>,
    /// 仅输出含星标节点的页
    pub only_starred_pages: bool,
    /// 拆页提示文本
    pub text_more: String,
    /// 角色接续提示后缀
    pub text_contd: String,
    /// {{include:}} 递归深度上限
    pub include_depth_limit: usize,
}

impl Default for Conf {
    fn default() -> Self {
        Conf {
            print_notes: true,
            print_synopsis: true,
            print_sections: true,
            use_dual_dialogue: true,
            scene_numbering: SceneNumbering::Generate,
            revision_tags: Vec::new(),
            only_starred_pages: false,
            text_more: "(MORE)".to_string(),
            text_contd: "(CONT'D)".to_string(),
            include_depth_limit: 16,
        }
    }
}
