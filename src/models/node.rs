use serde::{Deserialize, Serialize};
use crate::models::line::Line;

/// 节点类型（扁平枚举，按布局归类排序）
///
/// 双栏/章节变体是显式命名的成员，禁止用数字偏移换算，
/// 这样 match 的穷尽检查能兜住漏掉的分支。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Whitespace,
    PageBreak,
    Header,
    Footer,
    Action,
    Scene,
    Character,
    DualCharacter,
    Parenthetical,
    DualParenthetical,
    Dialogue,
    DualDialogue,
    Lyric,
    DualLyric,
    Transition,
    Synopsis,
    Centered,
    Section,
    Section2,
    Section3,
}

impl NodeType {
    /// 对应的双栏变体（无双栏形态的类型原样返回）
    pub fn dual_of(self) -> NodeType {
        match self {
            NodeType::Character => NodeType::DualCharacter,
            NodeType::Parenthetical => NodeType::DualParenthetical,
            NodeType::Dialogue => NodeType::DualDialogue,
            NodeType::Lyric => NodeType::DualLyric,
            other => other,
        }
    }

    /// 指定深度（1-3）的章节类型
    pub fn section_for(depth: usize) -> NodeType {
        match depth {
            0 | 1 => NodeType::Section,
            2 => NodeType::Section2,
            _ => NodeType::Section3,
        }
    }

    /// 是否属于"角色块"序列（角色/插入语/对白/歌词，含双栏变体）
    pub fn is_character_train(self) -> bool {
        matches!(
            self,
            NodeType::Character
                | NodeType::DualCharacter
                | NodeType::Parenthetical
                | NodeType::DualParenthetical
                | NodeType::Dialogue
                | NodeType::DualDialogue
                | NodeType::Lyric
                | NodeType::DualLyric
        )
    }

    /// 是否为双栏变体
    pub fn is_dual(self) -> bool {
        matches!(
            self,
            NodeType::DualCharacter
                | NodeType::DualParenthetical
                | NodeType::DualDialogue
                | NodeType::DualLyric
        )
    }

    /// 是否为角色名节点
    pub fn is_character(self) -> bool {
        matches!(self, NodeType::Character | NodeType::DualCharacter)
    }

    /// 是否为对白类内容（拆页时需要 (MORE)/(CONT'D) 接续提示）
    pub fn is_dialogue_like(self) -> bool {
        matches!(
            self,
            NodeType::Dialogue | NodeType::DualDialogue | NodeType::Lyric | NodeType::DualLyric
        )
    }

    /// 是否为章节标题
    pub fn is_section(self) -> bool {
        matches!(self, NodeType::Section | NodeType::Section2 | NodeType::Section3)
    }

    /// 是否参与排版输出（空白/分页/页眉页脚只改变排版状态，不落页面）
    pub fn is_printable(self) -> bool {
        !matches!(
            self,
            NodeType::Whitespace | NodeType::PageBreak | NodeType::Header | NodeType::Footer
        )
    }
}

/// 水平对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Justification {
    Left,
    Center,
    Right,
}

impl Default for Justification {
    fn default() -> Self {
        Justification::Left
    }
}

/// 节点：剧本中一个段落等价单位
///
/// 分类器按源文顺序创建；分类修正通过后 `node_type` 不再变化。
/// 换行器补写 `lines`，分页器补写页码与坐标；跨页拆分时会
/// 生成共享同一逻辑内容的两个节点，类型与层级保持不变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// 节点类型
    pub node_type: NodeType,
    /// 原始文本（换行前）
    pub text: String,
    /// 层级：0 = 无；双对白配对 1/2；章节深度 1-3；空白行数
    pub level: usize,
    /// 修订标签（星标修订过滤用，由外部差异比对方写入）
    pub revision_tag: Option<String>,
    /// 场景编号
    pub scene_number: Option<String>,
    /// 换行后的行（排版时填写）
    pub lines: Vec<Line>,
    /// 所在页码（1 起），0 表示尚未排版
    pub page: usize,
    /// 水平坐标（pt）
    pub pos_x: f32,
    /// 垂直坐标（pt）
    pub pos_y: f32,
    /// 行高（pt）
    pub line_height: f32,
    /// 对齐方式
    pub justification: Justification,
    /// 命中修订目标标签
    pub starred: bool,
    /// 渲染方应跳过该节点
    pub skipped: bool,
}

impl Node {
    pub fn new(node_type: NodeType, text: impl Into<String>) -> Self {
        Node {
            node_type,
            text: text.into(),
            level: 0,
            revision_tag: None,
            scene_number: None,
            lines: Vec::new(),
            page: 0,
            pos_x: 0.0,
            pos_y: 0.0,
            line_height: 0.0,
            justification: Justification::Left,
            starred: false,
            skipped: false,
        }
    }

    /// 换行后的总行数
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}
