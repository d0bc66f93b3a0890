use crate::models::{Conf, Document, Node, NodeType};
use crate::utils::constants::LINE_REGEX;

/// 行分类器：把预处理后的正文逐行分类成节点序列
///
/// 两阶段管线：先做临时分类（含双对白配对），再跑一次只降级的
/// 修正通道；修正通道之后节点类型不再变化。
pub fn classify(body: &str, conf: &Conf, doc: &mut Document) {
    let mut nodes: Vec<Node> = Vec::new();
    // 与 nodes 对齐：该节点的上一源文行是否为空（角色块边界）
    let mut after_blank: Vec<bool> = Vec::new();
    let mut blank_run = 0usize;
    let mut train_dual = false;
    let mut boundary = true;

    for raw in body.split('\n') {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            blank_run += 1;
            // 任何空行都终止角色块；单个空行只作分段，连续空行
            // 折叠成一个 whitespace 节点，level = 空行数 - 1
            boundary = true;
            train_dual = false;
            if blank_run >= 2 {
                match nodes.last_mut() {
                    Some(last) if last.node_type == NodeType::Whitespace => last.level += 1,
                    _ => {
                        let mut n = Node::new(NodeType::Whitespace, "");
                        n.level = 1;
                        nodes.push(n);
                        after_blank.push(true);
                    }
                }
            }
            continue;
        }
        blank_run = 0;
        classify_line(trimmed, conf, &mut nodes, &mut train_dual, boundary);
        // 页眉页脚之外的指令行不产生节点
        while after_blank.len() < nodes.len() {
            after_blank.push(boundary);
        }
        boundary = false;
    }

    correction_pass(&mut nodes, &after_blank);
    collect_characters(&nodes, doc);
    doc.nodes = nodes;
}

/// 按优先级对单行分类
///
/// `boundary` 为真表示本行与上一节点之间隔着空行：插入语与对白
/// 延续都要求与角色块直接相邻，跨空行一律落回 action。
fn classify_line(
    line: &str,
    conf: &Conf,
    nodes: &mut Vec<Node>,
    train_dual: &mut bool,
    boundary: bool,
) {
    // 单个非空字符：永远是 action，短路其余判定
    if line.chars().count() == 1 {
        push(nodes, train_dual, Node::new(NodeType::Action, line));
        return;
    }

    // ! 强制 action
    if let Some(rest) = line.strip_prefix('!') {
        push(nodes, train_dual, Node::new(NodeType::Action, rest.trim_start()));
        return;
    }

    // @ 强制角色
    if let Some(rest) = line.strip_prefix('@') {
        let (text, dual_mark) = strip_caret(rest.trim());
        push_character(nodes, &text, dual_mark, conf, train_dual);
        return;
    }

    // ~ 恰好一个是歌词标记；两个以上不是（落到后面的判定）
    if line.starts_with('~') && !line.starts_with("~~") {
        let t = if *train_dual && prior_is_train(nodes) {
            NodeType::DualLyric
        } else {
            NodeType::Lyric
        };
        push(nodes, train_dual, Node::new(t, line[1..].trim_start()));
        return;
    }

    // === 分页符；单个 = 是概要
    if line.starts_with("===") {
        push(nodes, train_dual, Node::new(NodeType::PageBreak, ""));
        return;
    }
    if line.starts_with('=') && !line.starts_with("==") {
        push(nodes, train_dual, Node::new(NodeType::Synopsis, line[1..].trim()));
        return;
    }

    // # 章节标题，1-3 个标记，超过按 3 截断
    if line.starts_with('#') {
        let count = line.chars().take_while(|&c| c == '#').count();
        let depth = count.min(3);
        let mut node = Node::new(NodeType::section_for(depth), line[count..].trim());
        node.level = depth;
        push(nodes, train_dual, node);
        return;
    }

    // 插入语：仅紧跟角色块内容时生效，否则落回 action
    if !boundary && line.starts_with('(') && line.ends_with(')') {
        if let Some(prev) = nodes.last() {
            if prev.node_type.is_character_train() {
                let t = if prev.node_type.is_dual() {
                    NodeType::DualParenthetical
                } else {
                    NodeType::Parenthetical
                };
                push(nodes, train_dual, Node::new(t, line));
                return;
            }
        }
    }

    // > 转场；> ... < 居中
    if let Some(rest) = line.strip_prefix('>') {
        if let Some(mid) = rest.strip_suffix('<') {
            push(nodes, train_dual, Node::new(NodeType::Centered, mid.trim()));
        } else {
            push(nodes, train_dual, Node::new(NodeType::Transition, rest.trim()));
        }
        return;
    }

    // . 强制场景（.. 开头不算）
    if line.starts_with('.') && !line.starts_with("..") {
        let mut text = line[1..].trim().to_string();
        let number = extract_scene_number(&mut text);
        let mut node = Node::new(NodeType::Scene, text);
        node.scene_number = number;
        push(nodes, train_dual, node);
        return;
    }

    // 整行 {{keyword: value}} 指令：页眉页脚成节点，其余丢弃
    if let Some(cap) = LINE_REGEX["directive"].captures(line) {
        let keyword = cap.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        let value = cap.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        match keyword.as_str() {
            "header" => push(nodes, train_dual, Node::new(NodeType::Header, value)),
            "footer" => push(nodes, train_dual, Node::new(NodeType::Footer, value)),
            _ => {}
        }
        return;
    }

    // 场景前缀词表
    if LINE_REGEX["scene_heading"].is_match(line) {
        let mut text = line.to_string();
        let number = extract_scene_number(&mut text);
        let mut node = Node::new(NodeType::Scene, text);
        node.scene_number = number;
        push(nodes, train_dual, node);
        return;
    }

    // 全大写且以 TO: 结尾是转场
    if is_transition(line) {
        push(nodes, train_dual, Node::new(NodeType::Transition, line));
        return;
    }

    // 角色行启发式
    if let Some((text, dual_mark)) = character_heuristic(line) {
        push_character(nodes, &text, dual_mark, conf, train_dual);
        return;
    }

    // 角色块直接延续即对白，隔空行不算
    if !boundary && prior_is_train(nodes) {
        let t = if *train_dual { NodeType::DualDialogue } else { NodeType::Dialogue };
        push(nodes, train_dual, Node::new(t, line));
        return;
    }

    push(nodes, train_dual, Node::new(NodeType::Action, line));
}

/// 入列并维护"当前角色块是否双栏"标记
fn push(nodes: &mut Vec<Node>, train_dual: &mut bool, node: Node) {
    match node.node_type {
        t if t.is_character() => *train_dual = t == NodeType::DualCharacter,
        t if t.is_character_train() => {}
        _ => *train_dual = false,
    }
    nodes.push(node);
}

fn prior_is_train(nodes: &[Node]) -> bool {
    nodes.last().map_or(false, |n| n.node_type.is_character_train())
}

fn push_character(
    nodes: &mut Vec<Node>,
    text: &str,
    dual_mark: bool,
    conf: &Conf,
    train_dual: &mut bool,
) {
    let mut node = Node::new(NodeType::Character, text);
    if dual_mark && conf.use_dual_dialogue {
        node.level = resolve_dual_level(nodes);
        if node.level == 2 {
            node.node_type = NodeType::DualCharacter;
        }
    }
    push(nodes, train_dual, node);
}

/// 双对白配对：新角色带 ^ 标记（候选 level 1）时向前扫描
///
/// 穿过空白与角色块内容找到上一个角色节点：level 0 则把它提升为
/// 左列（1），新节点成为右列（2）；level 1 表示已有配对，新节点降为
/// 0；遇到其他内容则取消配对。扫描到头时保留标记 level 1。
fn resolve_dual_level(nodes: &mut [Node]) -> usize {
    for prev in nodes.iter_mut().rev() {
        match prev.node_type {
            NodeType::Whitespace => continue,
            t if t.is_character() => {
                return match prev.level {
                    0 if t == NodeType::Character => {
                        prev.level = 1;
                        2
                    }
                    _ => 0,
                };
            }
            t if t.is_character_train() => continue,
            _ => return 0,
        }
    }
    1
}

/// 去掉行尾的双对白标记 ^
fn strip_caret(line: &str) -> (String, bool) {
    let trimmed = line.trim_end();
    match trimmed.strip_suffix('^') {
        Some(rest) => (rest.trim_end().to_string(), true),
        None => (trimmed.to_string(), false),
    }
}

/// 提取并去掉行尾的 #编号# 场景号
fn extract_scene_number(text: &mut String) -> Option<String> {
    let cap = LINE_REGEX["scene_number"].captures(text)?;
    let number = cap.get(1).map(|m| m.as_str().to_string());
    let start = cap.get(0).unwrap().start();
    text.truncate(start);
    while text.ends_with(' ') || text.ends_with('\t') {
        text.pop();
    }
    number
}

/// 转场后缀判定：全大写且以 TO: 结尾
fn is_transition(line: &str) -> bool {
    line.ends_with("TO:") && !line.chars().any(|c| c.is_lowercase())
}

/// 角色行启发式
///
/// 去掉前导样式标记后：首字母必须是大写字母、括号后缀外不得有
/// 小写字母、至少一个括号外字母。无大小写的文字（中文等）不满足
/// 首字母条件，整段中文正文不会误判成角色行；中文角色行用 @ 强制。
fn character_heuristic(line: &str) -> Option<(String, bool)> {
    let (text, dual) = strip_caret(line);
    let stripped = text
        .trim_start_matches(|c| matches!(c, '*' | '_' | '+' | '~'))
        .trim();
    let mut depth = 0usize;
    let mut has_letter = false;
    for c in stripped.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if c.is_alphabetic() => {
                if depth == 0 {
                    if !has_letter {
                        // 首字母必须是大写字母
                        if !c.is_uppercase() {
                            return None;
                        }
                    } else if c.is_lowercase() {
                        return None;
                    }
                    has_letter = true;
                }
            }
            _ => {}
        }
    }
    if !has_letter {
        return None;
    }
    Some((text, dual))
}

/// 修正通道：一次性全量遍历，只降级，不改变节点身份
///
/// `after_blank` 与 nodes 对齐，空行边界处不延续角色块。
fn correction_pass(nodes: &mut Vec<Node>, after_blank: &[bool]) {
    for i in 0..nodes.len() {
        if !nodes[i].node_type.is_character() {
            continue;
        }

        // 紧邻（无空行）的前一个节点也是角色：第二个塌缩成对白
        if i > 0 && !after_blank[i] && nodes[i - 1].node_type.is_character() {
            nodes[i].node_type = if nodes[i].node_type == NodeType::DualCharacter {
                NodeType::DualDialogue
            } else {
                NodeType::Dialogue
            };
            nodes[i].level = 0;
            continue;
        }

        // 下一个节点必须紧邻且是角色块内容，否则角色行降级为 action
        let keeps = nodes
            .get(i + 1)
            .map_or(false, |n| !after_blank[i + 1] && n.node_type.is_character_train());
        if !keeps {
            nodes[i].node_type = NodeType::Action;
            nodes[i].level = 0;
        }
    }
}

/// 分类定稿后登记角色与对白行数
fn collect_characters(nodes: &[Node], doc: &mut Document) {
    let mut last_character: Option<String> = None;
    for node in nodes {
        if node.node_type.is_character() {
            let name = strip_extension(&node.text);
            if !name.is_empty() {
                doc.characters.ensure(&name);
                last_character = Some(name);
            }
        } else if node.node_type.is_dialogue_like() {
            if let Some(name) = &last_character {
                doc.characters.record_line(name);
            }
        }
    }
}

/// 去掉角色名后缀扩展，如 "JANE (V.O.)" → "JANE"
fn strip_extension(name: &str) -> String {
    match name.find('(') {
        Some(pos) => name[..pos].trim().to_string(),
        None => name.trim().to_string(),
    }
}
