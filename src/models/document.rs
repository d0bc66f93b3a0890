use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::models::node::Node;

/// 标题页键的规范形式：小写、去空白、去标点
///
/// "Draft Date"、"draft_date:"、"DRAFT  DATE" 归并为同一个键。
pub fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// 角色：规范名、别名、性别归类与累计对白行数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    /// 规范大小写的名字（首次出现的写法）
    pub name: String,
    /// 其他称呼
    pub aliases: Vec<String>,
    /// 性别归类，用户提供，缺省 "unknown"
    pub gender: String,
    /// 累计对白行数
    pub line_count: usize,
}

impl Character {
    pub fn new(name: impl Into<String>, gender: impl Into<String>) -> Self {
        Character {
            name: name.into(),
            aliases: Vec::new(),
            gender: gender.into(),
            line_count: 0,
        }
    }
}

/// 角色仓库：单一所有权的 arena，外加"名字/别名 → 下标"的索引表
///
/// 所有别名都指向同一个 arena 条目，不存在多个指针共享同一角色。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterRegistry {
    /// 角色本体
    pub characters: Vec<Character>,
    /// 小写名字/别名 → characters 下标
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按名字或别名查找（大小写不敏感）
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(&name.trim().to_lowercase()).copied()
    }

    /// 新建角色条目并登记索引
    pub fn insert(&mut self, name: &str, gender: &str) -> usize {
        let idx = self.characters.len();
        self.characters.push(Character::new(name.trim(), gender));
        self.index.insert(name.trim().to_lowercase(), idx);
        idx
    }

    /// 给已有条目追加别名
    pub fn add_alias(&mut self, idx: usize, alias: &str) {
        let alias = alias.trim();
        if alias.is_empty() || self.lookup(alias).is_some() {
            return;
        }
        self.characters[idx].aliases.push(alias.to_string());
        self.index.insert(alias.to_lowercase(), idx);
    }

    /// 查找角色，不存在时自动归入 "unknown" 组
    pub fn ensure(&mut self, name: &str) -> usize {
        match self.lookup(name) {
            Some(idx) => idx,
            None => self.insert(name, "unknown"),
        }
    }

    /// 给某角色累计一行对白
    pub fn record_line(&mut self, name: &str) {
        let idx = self.ensure(name);
        self.characters[idx].line_count += 1;
    }

    pub fn get(&self, idx: usize) -> Option<&Character> {
        self.characters.get(idx)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

/// 计数器：数字或字母（A..Z、AA..）模式的累进值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    /// 当前值（1 起）
    pub value: i64,
    /// 字母模式
    pub alpha: bool,
}

impl Default for Counter {
    fn default() -> Self {
        Counter { value: 1, alpha: false }
    }
}

impl Counter {
    /// 按显式重置值初始化；能整体按字母解析则进入字母模式
    pub fn from_reset(reset: &str) -> Self {
        let mut c = Counter::default();
        c.reset_from(reset);
        c
    }

    /// 显式重置；字母串转字母模式，数字串转数字模式，其余忽略
    pub fn reset_from(&mut self, reset: &str) {
        let reset = reset.trim();
        if reset.is_empty() {
            return;
        }
        if let Some(v) = parse_alpha(reset) {
            self.alpha = true;
            self.value = v;
        } else if let Ok(v) = reset.parse::<i64>() {
            self.alpha = false;
            self.value = v;
        }
    }

    /// 当前值的显示文本
    pub fn render(&self) -> String {
        if self.alpha {
            render_alpha(self.value)
        } else {
            self.value.to_string()
        }
    }

    /// 自增一步
    pub fn bump(&mut self) {
        self.value += 1;
    }
}

/// 字母计数值解析：A=1 … Z=26, AA=27（双射 26 进制）
fn parse_alpha(s: &str) -> Option<i64> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut v: i64 = 0;
    for c in s.chars() {
        v = v * 26 + (c.to_ascii_uppercase() as i64 - 'A' as i64 + 1);
    }
    Some(v)
}

/// 字母计数值渲染，1 以下按 "A" 兜底
fn render_alpha(mut n: i64) -> String {
    if n < 1 {
        return "A".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        n -= 1;
        buf.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// 单页信息（页眉页脚已做 %p/%title 替换）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageInfo {
    /// 页码（1 起）
    pub number: usize,
    /// 本页页眉
    pub header: String,
    /// 本页页脚
    pub footer: String,
    /// 本页含星标节点
    pub starred: bool,
    /// 仅打印星标页时被整页跳过
    pub skipped: bool,
}

/// 文档：一次解析/排版管线的全部产物
///
/// 分类器写节点与角色，分页器写页码坐标与分页表；
/// 排版完成后交给渲染方只读。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// 标题页字段（键已规范化）
    pub title: HashMap<String, String>,
    /// 角色仓库
    pub characters: CharacterRegistry,
    /// 节点序列（源文顺序，排版后按页码稳定排序）
    pub nodes: Vec<Node>,
    /// 命名计数器表（正文 #name 计数器）
    pub counters: HashMap<String, Counter>,
    /// 页眉模板（%p → 页码，%title → 标题）
    pub header: String,
    /// 页脚模板
    pub footer: String,
    /// 排版后的分页表
    pub pages: Vec<PageInfo>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按规范键读取标题页字段
    pub fn title_field(&self, key: &str) -> Option<&str> {
        self.title.get(&canonical_key(key)).map(String::as_str)
    }
}
