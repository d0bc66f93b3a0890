use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::node::{Justification, NodeType};
use crate::models::conf::Conf;

/// 模板表达式错误
#[derive(Error, Debug, PartialEq)]
pub enum ExprError {
    #[error("括号不匹配: {0}")]
    Unbalanced(String),

    #[error("非法表达式: {0}")]
    Invalid(String),
}

/// 极简算术表达式求值（+ - * / 与括号），供模板几何字段使用
pub fn eval_expr(src: &str) -> Result<f64, ExprError> {
    let chars: Vec<char> = src.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pos = 0usize;
    let v = parse_sum(&chars, &mut pos, src)?;
    if pos != chars.len() {
        if chars[pos] == ')' {
            return Err(ExprError::Unbalanced(src.to_string()));
        }
        return Err(ExprError::Invalid(src.to_string()));
    }
    Ok(v)
}

/// 解析几何字段：括号不匹配等错误时告警并回退为 0
pub fn resolve_dim(src: &str) -> f32 {
    match eval_expr(src) {
        Ok(v) => v as f32,
        Err(e) => {
            log::warn!("模板表达式求值失败，按 0 处理: {}", e);
            0.0
        }
    }
}

fn parse_sum(chars: &[char], pos: &mut usize, src: &str) -> Result<f64, ExprError> {
    let mut acc = parse_product(chars, pos, src)?;
    while *pos < chars.len() {
        match chars[*pos] {
            '+' => {
                *pos += 1;
                acc += parse_product(chars, pos, src)?;
            }
            '-' => {
                *pos += 1;
                acc -= parse_product(chars, pos, src)?;
            }
            _ => break,
        }
    }
    Ok(acc)
}

fn parse_product(chars: &[char], pos: &mut usize, src: &str) -> Result<f64, ExprError> {
    let mut acc = parse_atom(chars, pos, src)?;
    while *pos < chars.len() {
        match chars[*pos] {
            '*' => {
                *pos += 1;
                acc *= parse_atom(chars, pos, src)?;
            }
            '/' => {
                *pos += 1;
                let d = parse_atom(chars, pos, src)?;
                acc = if d == 0.0 { 0.0 } else { acc / d };
            }
            _ => break,
        }
    }
    Ok(acc)
}

fn parse_atom(chars: &[char], pos: &mut usize, src: &str) -> Result<f64, ExprError> {
    if *pos >= chars.len() {
        return Err(ExprError::Invalid(src.to_string()));
    }
    match chars[*pos] {
        '(' => {
            *pos += 1;
            let v = parse_sum(chars, pos, src)?;
            if *pos >= chars.len() || chars[*pos] != ')' {
                return Err(ExprError::Unbalanced(src.to_string()));
            }
            *pos += 1;
            Ok(v)
        }
        '-' => {
            *pos += 1;
            Ok(-parse_atom(chars, pos, src)?)
        }
        c if c.is_ascii_digit() || c == '.' => {
            let start = *pos;
            while *pos < chars.len() && (chars[*pos].is_ascii_digit() || chars[*pos] == '.') {
                *pos += 1;
            }
            let s: String = chars[start..*pos].iter().collect();
            s.parse::<f64>().map_err(|_| ExprError::Invalid(src.to_string()))
        }
        _ => Err(ExprError::Invalid(src.to_string())),
    }
}

/// 强制大小写
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Casing {
    Upper,
    Lower,
}

/// 强制样式位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleBits {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

/// 单个节点类型的布局规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRule {
    /// 渲染时整体跳过该类型
    pub skip: bool,
    /// 强制大小写
    pub casing: Option<Casing>,
    /// 强制样式位
    pub style: StyleBits,
    /// 对齐方式
    pub justify: Justification,
    /// 相对正文左边距的水平偏移（pt）
    pub margin: f32,
    /// 最大换行宽度（等宽字符数）
    pub width: usize,
    /// 块上方附加高度（行数）
    pub space_above: f32,
    /// 行高覆盖（pt），None 用全局行高
    pub line_height: Option<f32>,
    /// 页底最小剩余行数（防孤行标题）
    pub trail_height: f32,
    /// 首行段落缩进（字符数）
    pub indent: usize,
}

impl Default for TypeRule {
    fn default() -> Self {
        TypeRule {
            skip: false,
            casing: None,
            style: StyleBits::default(),
            justify: Justification::Left,
            margin: 0.0,
            width: 60,
            space_above: 1.0,
            line_height: None,
            trail_height: 0.0,
            indent: 0,
        }
    }
}

/// 布局模板：全局页面几何 + 每类型规则
///
/// 单位统一为 pt；宽度类字段按等宽字符数表达。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// 纸张宽度（pt）
    pub page_width: f32,
    /// 纸张高度（pt）
    pub page_height: f32,
    /// 上边距（pt）
    pub margin_top: f32,
    /// 下边距（pt）
    pub margin_bottom: f32,
    /// 左边距（pt）
    pub margin_left: f32,
    /// 右边距（pt）
    pub margin_right: f32,
    /// 等宽字符宽度（pt）
    pub char_width: f32,
    /// 全局行高（pt）
    pub line_height: f32,
    /// 双栏对白的列宽（字符数）
    pub dual_width: usize,
    /// 双栏右列的水平偏移（pt）
    pub dual_offset: f32,
    /// 每类型规则
    rules: Vec<(NodeType, TypeRule)>,
}

impl Template {
    /// 行业标准剧本模板：US Letter，10 cpi / 6 lpi 等宽网格
    pub fn screenplay() -> Self {
        let cw = resolve_dim("72 / 10"); // 7.2pt，每英寸 10 字符
        let lh = resolve_dim("72 / 6"); // 12pt，每英寸 6 行
        let mut rules: Vec<(NodeType, TypeRule)> = Vec::new();

        fn rule(rules: &mut Vec<(NodeType, TypeRule)>, t: NodeType, r: TypeRule) {
            rules.push((t, r));
        }

        rule(&mut rules, NodeType::Action, TypeRule { width: 60, ..TypeRule::default() });
        rule(
            &mut rules,
            NodeType::Scene,
            TypeRule {
                casing: Some(Casing::Upper),
                style: StyleBits { bold: true, ..StyleBits::default() },
                width: 60,
                space_above: 2.0,
                trail_height: 3.0,
                ..TypeRule::default()
            },
        );
        rule(
            &mut rules,
            NodeType::Character,
            TypeRule {
                casing: Some(Casing::Upper),
                margin: 158.4, // 左边距内 2.2 英寸
                width: 38,
                trail_height: 3.0,
                ..TypeRule::default()
            },
        );
        rule(
            &mut rules,
            NodeType::Parenthetical,
            TypeRule {
                margin: 115.2,
                width: 25,
                space_above: 0.0,
                trail_height: 1.0,
                ..TypeRule::default()
            },
        );
        rule(
            &mut rules,
            NodeType::Dialogue,
            TypeRule { margin: 72.0, width: 35, space_above: 0.0, ..TypeRule::default() },
        );
        rule(
            &mut rules,
            NodeType::Lyric,
            TypeRule {
                margin: 72.0,
                width: 35,
                space_above: 0.0,
                style: StyleBits { italic: true, ..StyleBits::default() },
                ..TypeRule::default()
            },
        );
        rule(
            &mut rules,
            NodeType::Transition,
            TypeRule {
                casing: Some(Casing::Upper),
                justify: Justification::Right,
                width: 60,
                ..TypeRule::default()
            },
        );
        rule(
            &mut rules,
            NodeType::Centered,
            TypeRule { justify: Justification::Center, width: 60, ..TypeRule::default() },
        );
        rule(
            &mut rules,
            NodeType::Synopsis,
            TypeRule {
                style: StyleBits { italic: true, ..StyleBits::default() },
                width: 60,
                ..TypeRule::default()
            },
        );
        rule(
            &mut rules,
            NodeType::Section,
            TypeRule {
                style: StyleBits { bold: true, ..StyleBits::default() },
                width: 60,
                space_above: 2.0,
                trail_height: 3.0,
                ..TypeRule::default()
            },
        );
        rule(
            &mut rules,
            NodeType::Section2,
            TypeRule {
                style: StyleBits { bold: true, ..StyleBits::default() },
                width: 60,
                space_above: 2.0,
                trail_height: 3.0,
                ..TypeRule::default()
            },
        );
        rule(
            &mut rules,
            NodeType::Section3,
            TypeRule {
                style: StyleBits { bold: true, ..StyleBits::default() },
                width: 60,
                space_above: 2.0,
                trail_height: 3.0,
                ..TypeRule::default()
            },
        );

        // 双栏变体沿用基础类型的规则，列宽在分页时收窄
        for (dual, base) in [
            (NodeType::DualCharacter, NodeType::Character),
            (NodeType::DualParenthetical, NodeType::Parenthetical),
            (NodeType::DualDialogue, NodeType::Dialogue),
            (NodeType::DualLyric, NodeType::Lyric),
        ] {
            let r = rules_clone_of(&rules, base);
            rules.push((dual, r));
        }

        Template {
            page_width: 612.0,
            page_height: 792.0,
            margin_top: 72.0,
            margin_bottom: 72.0,
            margin_left: 108.0, // 1.5 英寸装订边
            margin_right: 72.0,
            char_width: cw,
            line_height: lh,
            dual_width: 28,
            dual_offset: 216.0,
            rules,
        }
    }

    /// 按类型取规则；未显式配置的类型用缺省规则
    pub fn rule(&self, t: NodeType) -> TypeRule {
        self.rules
            .iter()
            .find(|(rt, _)| *rt == t)
            .map(|(_, r)| r.clone())
            .unwrap_or_default()
    }

    /// 覆写某类型的规则
    pub fn set_rule(&mut self, t: NodeType, r: TypeRule) {
        if let Some(slot) = self.rules.iter_mut().find(|(rt, _)| *rt == t) {
            slot.1 = r;
        } else {
            self.rules.push((t, r));
        }
    }

    /// 把配置开关落到 skip 位上（概要/章节开关）
    pub fn apply_conf(&mut self, conf: &Conf) {
        if !conf.print_synopsis {
            let mut r = self.rule(NodeType::Synopsis);
            r.skip = true;
            self.set_rule(NodeType::Synopsis, r);
        }
        if !conf.print_sections {
            for t in [NodeType::Section, NodeType::Section2, NodeType::Section3] {
                let mut r = self.rule(t);
                r.skip = true;
                self.set_rule(t, r);
            }
        }
    }

    /// 正文可用高度（pt）
    pub fn body_height(&self) -> f32 {
        self.page_height - self.margin_top - self.margin_bottom
    }
}

impl Default for Template {
    fn default() -> Self {
        Template::screenplay()
    }
}

fn rules_clone_of(rules: &[(NodeType, TypeRule)], t: NodeType) -> TypeRule {
    rules
        .iter()
        .find(|(rt, _)| *rt == t)
        .map(|(_, r)| r.clone())
        .unwrap_or_default()
}
