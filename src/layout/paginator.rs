use thiserror::Error;

use crate::models::line::{Leaf, Line};
use crate::models::node::{Node, NodeType};
use crate::models::template::{Template, TypeRule};
use crate::models::{Conf, Counter, Document, PageInfo, SceneNumbering};
use crate::utils::display_width;

/// 分页阶段的硬错误
#[derive(Error, Debug, PartialEq)]
pub enum PaginateError {
    /// 仅星标页模式下过滤结果为空，没有可渲染内容
    #[error("仅星标页过滤后没有任何页命中")]
    NothingStarred,
}

/// 给每个节点分配页码与坐标，生成分页表
///
/// 消费分类与换行的产物。双栏对白整对延后换页，不做栏内拆分；
/// 普通块跨页时按最后一条放得下的行拆开，对白类在拆点合成
/// (MORE) 与 "角色名 (CONT'D)" 提示。结束时按页码稳定排序，
/// 把双栏缓冲期间乱序追加的节点归位。
pub fn paginate(doc: &mut Document, template: &Template, conf: &Conf) -> Result<(), PaginateError> {
    let title = doc.title_field("title").unwrap_or("").to_string();
    let nodes = std::mem::take(&mut doc.nodes);

    let mut p = Paginator {
        template,
        conf,
        title,
        header: doc.header.clone(),
        footer: doc.footer.clone(),
        page: 1,
        y: 0.0,
        first_on_page: true,
        scene_counter: Counter::default(),
        last_character: None,
        pages: Vec::new(),
        out: Vec::new(),
    };
    p.run(nodes);

    let Paginator { mut pages, mut out, .. } = p;

    if conf.only_starred_pages {
        if !pages.iter().any(|pg| pg.starred) {
            return Err(PaginateError::NothingStarred);
        }
        for pg in pages.iter_mut() {
            if !pg.starred {
                pg.skipped = true;
            }
        }
        for node in out.iter_mut() {
            let starred_page = pages
                .iter()
                .find(|pg| pg.number == node.page)
                .map(|pg| pg.starred)
                .unwrap_or(false);
            if !starred_page {
                node.skipped = true;
            }
        }
    }

    // 双栏缓冲会把右栏节点晚于后续内容追加；稳定排序按页归位，
    // 页内相对顺序不动
    out.sort_by_key(|n| n.page);

    doc.nodes = out;
    doc.pages = pages;
    Ok(())
}

struct Paginator<'a> {
    template: &'a Template,
    conf: &'a Conf,
    title: String,
    header: String,
    footer: String,
    page: usize,
    /// 距上边距的累计垂直偏移（pt）
    y: f32,
    first_on_page: bool,
    scene_counter: Counter,
    last_character: Option<String>,
    pages: Vec<PageInfo>,
    out: Vec<Node>,
}

impl<'a> Paginator<'a> {
    fn run(&mut self, nodes: Vec<Node>) {
        let mut i = 0usize;
        while i < nodes.len() {
            let mut node = nodes[i].clone();
            self.mark_star(&mut node);

            match node.node_type {
                NodeType::Header => {
                    self.header = node.text.clone();
                    node.skipped = true;
                    node.page = self.page;
                    self.out.push(node);
                }
                NodeType::Footer => {
                    self.footer = node.text.clone();
                    node.skipped = true;
                    node.page = self.page;
                    self.out.push(node);
                }
                NodeType::PageBreak => {
                    self.new_page();
                    node.page = self.page;
                    self.out.push(node);
                }
                NodeType::Whitespace => {
                    // 页首空白不占高度
                    if !self.first_on_page {
                        self.y += node.level as f32 * self.template.line_height;
                    }
                    node.page = self.page;
                    self.out.push(node);
                }
                NodeType::Scene => {
                    self.assign_scene_number(&mut node);
                    let rule = self.template.rule(node.node_type);
                    self.place_block(node, &rule);
                }
                NodeType::Character if node.level == 1 && self.conf.use_dual_dialogue => {
                    if let Some(consumed) = self.try_dual_pair(&nodes, i) {
                        i = consumed;
                        continue;
                    }
                    // 没等到右半栏，按普通角色块排
                    let rule = self.template.rule(node.node_type);
                    self.note_character(&node);
                    self.place_block(node, &rule);
                }
                t => {
                    let rule = self.template.rule(t);
                    if t.is_character() {
                        self.note_character(&node);
                    }
                    self.place_block(node, &rule);
                }
            }
            i += 1;
        }

        // 空文档也至少有一页的分页表
        if !self.pages.is_empty() || !self.out.is_empty() {
            self.page_info();
        }
    }

    fn mark_star(&self, node: &mut Node) {
        if let Some(tag) = &node.revision_tag {
            if self.conf.revision_tags.iter().any(|t| t == tag) {
                node.starred = true;
            }
        }
    }

    fn note_character(&mut self, node: &Node) {
        self.last_character = Some(node.text.trim().to_string());
    }

    fn assign_scene_number(&mut self, node: &mut Node) {
        match self.conf.scene_numbering {
            SceneNumbering::Generate => {
                node.scene_number = Some(self.scene_counter.render());
                self.scene_counter.bump();
            }
            SceneNumbering::Preserve => {}
            SceneNumbering::Remove => node.scene_number = None,
        }
    }

    fn remaining(&self) -> f32 {
        self.template.body_height() - self.y
    }

    fn new_page(&mut self) {
        // 先保证旧页在分页表里占位
        self.page_info();
        self.page += 1;
        self.y = 0.0;
        self.first_on_page = true;
    }

    /// 当前页的分页表条目（懒建，页眉页脚在建页时定格）
    fn page_info(&mut self) -> &mut PageInfo {
        while self.pages.len() < self.page {
            let number = self.pages.len() + 1;
            self.pages.push(PageInfo {
                number,
                header: self.fill_template(&self.header, number),
                footer: self.fill_template(&self.footer, number),
                starred: false,
                skipped: false,
            });
        }
        let idx = self.page - 1;
        &mut self.pages[idx]
    }

    fn fill_template(&self, tpl: &str, page: usize) -> String {
        tpl.replace("%p", &page.to_string()).replace("%title", &self.title)
    }

    /// 普通块：孤行保护、跨页拆分与落位
    fn place_block(&mut self, node: Node, rule: &TypeRule) {
        if rule.skip {
            let mut node = node;
            node.skipped = true;
            node.page = self.page;
            self.out.push(node);
            return;
        }

        let lh = rule.line_height.unwrap_or(self.template.line_height);
        if !self.first_on_page {
            self.y += rule.space_above * lh;
        }

        // 孤行保护：页底剩余空间不够"本块 + 尾随保留行"时先换页
        let total = node.lines.len().max(1);
        if rule.trail_height > 0.0 && self.remaining() < (total as f32 + rule.trail_height) * lh {
            self.new_page();
        }

        let mut node = node;
        loop {
            let lines = node.lines.len().max(1);
            let fit_lines = (self.remaining() / lh).floor().max(0.0) as usize;
            if fit_lines >= lines {
                self.settle(&mut node, rule, lh);
                self.out.push(node);
                return;
            }

            let dialogue = node.node_type.is_dialogue_like();
            // 对白拆点要给 (MORE) 留一行
            let keep = if dialogue { fit_lines.saturating_sub(1) } else { fit_lines };

            if keep == 0 || node.lines.len() <= 1 {
                if self.first_on_page {
                    // 整页都盛不下的单块：硬放，交给渲染方截断
                    self.settle(&mut node, rule, lh);
                    self.out.push(node);
                    return;
                }
                self.new_page();
                continue;
            }

            // 拆页：前半留在本页，后半原类型原层级续排
            let mut rest = node.clone();
            rest.lines = node.lines.split_off(keep);
            self.settle(&mut node, rule, lh);
            let node_type = node.node_type;
            self.out.push(node);

            if dialogue {
                self.push_more_cue();
            }
            self.new_page();
            if dialogue {
                self.push_contd_cue(node_type);
            }
            node = rest;
        }
    }

    /// 写入坐标并推进垂直偏移
    fn settle(&mut self, node: &mut Node, rule: &TypeRule, lh: f32) {
        node.page = self.page;
        node.pos_x = self.template.margin_left + rule.margin;
        node.pos_y = self.template.margin_top + self.y;
        node.line_height = lh;
        node.justification = rule.justify;
        self.y += node.lines.len().max(1) as f32 * lh;
        self.first_on_page = false;
        if node.starred {
            self.page_info().starred = true;
        } else {
            self.page_info();
        }
    }

    /// 拆点处的 (MORE) 提示
    fn push_more_cue(&mut self) {
        let rule = self.template.rule(NodeType::Parenthetical);
        let lh = rule.line_height.unwrap_or(self.template.line_height);
        let mut cue = synthesized(NodeType::Parenthetical, self.conf.text_more.clone());
        self.settle(&mut cue, &rule, lh);
        self.out.push(cue);
    }

    /// 续页顶部重复角色提示；原名已带后缀时不再追加
    fn push_contd_cue(&mut self, split_type: NodeType) {
        let name = match &self.last_character {
            Some(n) => n.clone(),
            None => return,
        };
        let char_type = if split_type.is_dual() { NodeType::DualCharacter } else { NodeType::Character };
        let text = if name.to_uppercase().ends_with(&self.conf.text_contd.to_uppercase()) {
            name
        } else {
            format!("{} {}", name, self.conf.text_contd)
        };
        let rule = self.template.rule(char_type);
        let lh = rule.line_height.unwrap_or(self.template.line_height);
        let mut cue = synthesized(char_type, text.to_uppercase());
        self.settle(&mut cue, &rule, lh);
        self.out.push(cue);
    }

    /// 双栏配对：左栏 Character(level 1) + 其后续块，右栏 DualCharacter
    /// 起始的双栏块。配对成立时整体排版并返回消费到的下标。
    fn try_dual_pair(&mut self, nodes: &[Node], start: usize) -> Option<usize> {
        let mut left_end = start + 1;
        while left_end < nodes.len()
            && nodes[left_end].node_type.is_character_train()
            && !nodes[left_end].node_type.is_dual()
            && !nodes[left_end].node_type.is_character()
        {
            left_end += 1;
        }
        // 两栏之间的空行被整对吸收
        let mut gap_end = left_end;
        while gap_end < nodes.len() && nodes[gap_end].node_type == NodeType::Whitespace {
            gap_end += 1;
        }
        if gap_end >= nodes.len() || nodes[gap_end].node_type != NodeType::DualCharacter {
            return None;
        }
        let mut right_end = gap_end + 1;
        while right_end < nodes.len()
            && nodes[right_end].node_type.is_character_train()
            && nodes[right_end].node_type.is_dual()
            && !nodes[right_end].node_type.is_character()
        {
            right_end += 1;
        }

        let left: Vec<Node> = nodes[start..left_end].to_vec();
        let right: Vec<Node> = nodes[gap_end..right_end].to_vec();
        self.place_dual_pair(left, right, &nodes[left_end..gap_end]);
        Some(right_end)
    }

    /// 两栏同起点排版；换页以整对为单位延后，栏内不拆
    fn place_dual_pair(&mut self, left: Vec<Node>, right: Vec<Node>, gap: &[Node]) {
        let lh = self.template.line_height;
        if !self.first_on_page {
            let rule = self.template.rule(NodeType::Character);
            self.y += rule.space_above * lh;
        }

        let left_h = column_height(&left, self.template);
        let right_h = column_height(&right, self.template);
        let pair_h = left_h.max(right_h);
        if self.remaining() < pair_h && !self.first_on_page {
            self.new_page();
        }

        let saved = self.y;
        self.place_column(left, self.template.margin_left, saved);
        self.place_column(right, self.template.margin_left + self.template.dual_offset, saved);

        for ws in gap {
            let mut ws = ws.clone();
            ws.page = self.page;
            self.out.push(ws);
        }

        self.y = saved + pair_h;
        self.first_on_page = false;
        self.page_info();
    }

    fn place_column(&mut self, nodes: Vec<Node>, x: f32, saved: f32) {
        let mut acc = 0.0f32;
        for mut node in nodes {
            self.mark_star(&mut node);
            if node.node_type.is_character() {
                self.note_character(&node);
            }
            let rule = self.template.rule(node.node_type);
            let lh = rule.line_height.unwrap_or(self.template.line_height);
            node.page = self.page;
            node.pos_x = x;
            node.pos_y = self.template.margin_top + saved + acc;
            node.line_height = lh;
            node.justification = rule.justify;
            acc += node.lines.len().max(1) as f32 * lh;
            if node.starred {
                self.page_info().starred = true;
            }
            self.out.push(node);
        }
    }
}

fn column_height(nodes: &[Node], template: &Template) -> f32 {
    nodes
        .iter()
        .map(|n| {
            let rule = template.rule(n.node_type);
            let lh = rule.line_height.unwrap_or(template.line_height);
            n.lines.len().max(1) as f32 * lh
        })
        .sum()
}

/// 分页器自造的提示节点（已换行的单行内容）
fn synthesized(node_type: NodeType, text: String) -> Node {
    let mut node = Node::new(node_type, text.clone());
    node.lines = vec![Line {
        length: display_width(&text),
        leaves: vec![Leaf::Text(text)],
        ..Line::default()
    }];
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Justification;

    fn doc_with(nodes: Vec<Node>) -> Document {
        let mut doc = Document::new();
        doc.nodes = nodes;
        doc
    }

    fn filled(node_type: NodeType, text: &str, line_count: usize) -> Node {
        let mut node = Node::new(node_type, text);
        node.lines = (0..line_count)
            .map(|i| Line {
                length: 4,
                leaves: vec![Leaf::Text(format!("第{}行", i))],
                ..Line::default()
            })
            .collect();
        node
    }

    #[test]
    fn page_break_starts_new_page() {
        let template = Template::screenplay();
        let conf = Conf::default();
        let mut doc = doc_with(vec![
            filled(NodeType::Action, "one", 1),
            Node::new(NodeType::PageBreak, ""),
            filled(NodeType::Action, "two", 1),
        ]);
        paginate(&mut doc, &template, &conf).unwrap();
        assert_eq!(doc.nodes[0].page, 1);
        assert_eq!(doc.nodes[2].page, 2);
        assert_eq!(doc.pages.len(), 2);
    }

    #[test]
    fn split_conserves_lines_and_type() {
        let template = Template::screenplay();
        let conf = Conf::default();
        // 正文高 648pt / 行高 12pt = 每页 54 行
        let mut doc = doc_with(vec![
            filled(NodeType::Character, "顾清", 1),
            filled(NodeType::Dialogue, "长对白", 100),
        ]);
        paginate(&mut doc, &template, &conf).unwrap();

        let dialogue: Vec<&Node> =
            doc.nodes.iter().filter(|n| n.node_type == NodeType::Dialogue && n.text == "长对白").collect();
        assert!(dialogue.len() >= 2, "长块应被拆页");
        let total: usize = dialogue.iter().map(|n| n.lines.len()).sum();
        assert_eq!(total, 100, "拆分前后行数守恒");
        for part in &dialogue {
            assert_eq!(part.level, 0);
        }

        // 拆点合成 (MORE)，续页顶部合成 CONT'D 角色提示
        assert!(doc
            .nodes
            .iter()
            .any(|n| n.node_type == NodeType::Parenthetical && n.text == "(MORE)"));
        assert!(doc
            .nodes
            .iter()
            .any(|n| n.node_type == NodeType::Character && n.text.ends_with("(CONT'D)")));
    }

    #[test]
    fn contd_suffix_not_doubled() {
        let template = Template::screenplay();
        let conf = Conf::default();
        let mut doc = doc_with(vec![
            filled(NodeType::Character, "顾清 (CONT'D)", 1),
            filled(NodeType::Dialogue, "长对白", 120),
        ]);
        paginate(&mut doc, &template, &conf).unwrap();
        let cues: Vec<&Node> = doc
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Character && n.lines.len() == 1 && n.text.contains("CONT'D"))
            .collect();
        assert!(!cues.is_empty());
        for cue in cues {
            assert!(!cue.text.contains("(CONT'D) (CONT'D)"), "后缀不应重复: {}", cue.text);
        }
    }

    #[test]
    fn dual_pair_shares_start_and_advances_by_taller() {
        let template = Template::screenplay();
        let conf = Conf::default();
        let mut left_char = filled(NodeType::Character, "甲", 1);
        left_char.level = 1;
        let mut right_char = filled(NodeType::DualCharacter, "乙", 1);
        right_char.level = 2;
        let mut doc = doc_with(vec![
            left_char,
            filled(NodeType::Dialogue, "左栏", 2),
            Node::new(NodeType::Whitespace, ""),
            right_char,
            filled(NodeType::DualDialogue, "右栏", 5),
            filled(NodeType::Action, "后续", 1),
        ]);
        paginate(&mut doc, &template, &conf).unwrap();

        let left = doc.nodes.iter().find(|n| n.text == "甲").unwrap();
        let right = doc.nodes.iter().find(|n| n.text == "乙").unwrap();
        assert_eq!(left.pos_y, right.pos_y, "两栏同一起点");
        assert!(right.pos_x > left.pos_x, "右栏水平偏移");

        // 后续节点从 saved + max(左高, 右高) 继续；右栏 6 行更高
        let lh = template.line_height;
        let after = doc.nodes.iter().find(|n| n.text == "后续").unwrap();
        let expected = left.pos_y + 6.0 * lh + lh; // 双栏高度 + 动作块自身的 space_above
        assert!((after.pos_y - expected).abs() < 0.01, "{} != {}", after.pos_y, expected);
    }

    #[test]
    fn scene_numbering_modes() {
        let template = Template::screenplay();
        let mut scene = filled(NodeType::Scene, "INT. 房间 - 日", 1);
        scene.scene_number = Some("12".to_string());

        let mut conf = Conf::default();
        conf.scene_numbering = SceneNumbering::Generate;
        let mut doc = doc_with(vec![scene.clone()]);
        paginate(&mut doc, &template, &conf).unwrap();
        assert_eq!(doc.nodes[0].scene_number.as_deref(), Some("1"));

        conf.scene_numbering = SceneNumbering::Preserve;
        let mut doc = doc_with(vec![scene.clone()]);
        paginate(&mut doc, &template, &conf).unwrap();
        assert_eq!(doc.nodes[0].scene_number.as_deref(), Some("12"));

        conf.scene_numbering = SceneNumbering::Remove;
        let mut doc = doc_with(vec![scene]);
        paginate(&mut doc, &template, &conf).unwrap();
        assert_eq!(doc.nodes[0].scene_number, None);
    }

    #[test]
    fn only_starred_with_no_match_is_hard_error() {
        let template = Template::screenplay();
        let mut conf = Conf::default();
        conf.only_starred_pages = true;
        conf.revision_tags = vec!["v2".to_string()];
        let mut doc = doc_with(vec![filled(NodeType::Action, "未修订", 1)]);
        assert_eq!(
            paginate(&mut doc, &template, &conf),
            Err(PaginateError::NothingStarred)
        );
    }

    #[test]
    fn starred_pages_filter_marks_others_skipped() {
        let template = Template::screenplay();
        let mut conf = Conf::default();
        conf.only_starred_pages = true;
        conf.revision_tags = vec!["v2".to_string()];

        let mut starred = filled(NodeType::Action, "改过的", 1);
        starred.revision_tag = Some("v2".to_string());
        let mut doc = doc_with(vec![
            filled(NodeType::Action, "老内容", 1),
            Node::new(NodeType::PageBreak, ""),
            starred,
        ]);
        paginate(&mut doc, &template, &conf).unwrap();
        assert!(doc.pages[0].skipped);
        assert!(!doc.pages[1].skipped);
        assert!(doc.pages[1].starred);
        let old = doc.nodes.iter().find(|n| n.text == "老内容").unwrap();
        assert!(old.skipped);
    }

    #[test]
    fn header_updates_apply_to_later_pages() {
        let template = Template::screenplay();
        let conf = Conf::default();
        let mut doc = doc_with(vec![
            filled(NodeType::Action, "第一页", 1),
            Node::new(NodeType::Header, "第 %p 页"),
            Node::new(NodeType::PageBreak, ""),
            filled(NodeType::Action, "第二页", 1),
        ]);
        paginate(&mut doc, &template, &conf).unwrap();
        assert_eq!(doc.pages[0].header, "");
        assert_eq!(doc.pages[1].header, "第 2 页");
    }

    #[test]
    fn top_of_page_whitespace_suppressed() {
        let template = Template::screenplay();
        let conf = Conf::default();
        let mut ws = Node::new(NodeType::Whitespace, "");
        ws.level = 3;
        let mut doc = doc_with(vec![ws, filled(NodeType::Action, "正文", 1)]);
        paginate(&mut doc, &template, &conf).unwrap();
        let body = doc.nodes.iter().find(|n| n.text == "正文").unwrap();
        assert_eq!(body.pos_y, template.margin_top);
        assert_eq!(body.justification, Justification::Left);
    }

    #[test]
    fn skip_rule_keeps_node_out_of_flow() {
        let mut template = Template::screenplay();
        let mut conf = Conf::default();
        conf.print_synopsis = false;
        template.apply_conf(&conf);
        let mut doc = doc_with(vec![
            filled(NodeType::Synopsis, "= 概要", 1),
            filled(NodeType::Action, "正文", 1),
        ]);
        paginate(&mut doc, &template, &conf).unwrap();
        assert!(doc.nodes[0].skipped);
        assert_eq!(doc.nodes[1].pos_y, template.margin_top);
    }
}
