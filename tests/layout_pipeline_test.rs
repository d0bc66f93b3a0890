use fountain_layout::models::ToggleChannel;
use fountain_layout::{layout, Conf, Leaf, NodeType, SceneNumbering, Template};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[test]
fn test_chinese_script_layout() {
    // 读取中文测试文件
    let script_path = Path::new("tests/test_data/夜航船.fountain");
    let script = fs::read_to_string(script_path).expect("无法读取测试文件");

    let conf = Conf::default();
    let template = Template::default();
    let doc = layout(&script, script_path.parent().unwrap(), &conf, &template).expect("排版失败");

    // 打印详细结果
    println!("=== 排版结果 ===");
    println!("页数: {}", doc.pages.len());
    for node in &doc.nodes {
        println!(
            "- 第{}页 {:?} (level {}): {}",
            node.page, node.node_type, node.level, node.text
        );
    }

    // 标题页
    assert_eq!(doc.title_field("title"), Some("夜航船"));
    assert_eq!(doc.title_field("author"), Some("陆沉"));

    // 性别表：别名指向同一条目，未声明角色不出现
    let gu = doc.characters.lookup("小顾").expect("别名应可查到");
    assert_eq!(doc.characters.get(gu).unwrap().gender, "female");
    assert_eq!(doc.characters.get(gu).unwrap().name, "顾清");
    let jiang = doc.characters.lookup("江川").expect("角色应已登记");
    assert_eq!(doc.characters.get(jiang).unwrap().gender, "male");

    // 对白行数统计：顾清两句对白，江川一句对白一句歌词
    assert_eq!(doc.characters.get(gu).unwrap().line_count, 2);
    assert_eq!(doc.characters.get(jiang).unwrap().line_count, 2);

    // 场景：词表命中 + 强制 . + 分页后的第三场，编号顺序生成
    let scenes: Vec<_> = doc.nodes.iter().filter(|n| n.node_type == NodeType::Scene).collect();
    assert_eq!(scenes.len(), 3);
    assert_eq!(scenes[0].text, "INT. 咖啡馆 - 日");
    assert_eq!(scenes[0].scene_number.as_deref(), Some("1"));
    assert_eq!(scenes[1].text, "天台 - 夜");
    assert_eq!(scenes[2].scene_number.as_deref(), Some("3"));

    // 双栏：左右两列同一起始纵坐标，右列水平偏移
    let left = doc
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::Character && n.text == "江川")
        .expect("左列角色");
    let right = doc
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::DualCharacter)
        .expect("右列角色");
    assert_eq!(left.level, 1);
    assert_eq!(right.level, 2);
    assert_eq!(right.text, "顾清");
    assert_eq!(left.pos_y, right.pos_y, "双栏两列起点应相同");
    assert!(right.pos_x > left.pos_x);

    // 转场与居中
    assert!(doc
        .nodes
        .iter()
        .any(|n| n.node_type == NodeType::Transition && n.text == "切至:"));
    assert!(doc
        .nodes
        .iter()
        .any(|n| n.node_type == NodeType::Centered && n.text == "夜航船"));

    // 歌词
    assert!(doc
        .nodes
        .iter()
        .any(|n| n.node_type == NodeType::Lyric && n.text == "我们说好的，不见不散。"));

    // 章节与概要
    assert!(doc.nodes.iter().any(|n| n.node_type == NodeType::Section && n.text == "第一幕"));
    assert!(doc.nodes.iter().any(|n| n.node_type == NodeType::Synopsis));

    // === 分页符：最后一场落在第二页
    assert_eq!(doc.pages.len(), 2);
    assert_eq!(scenes[2].page, 2);

    // 页眉 %p 替换
    assert_eq!(doc.pages[0].header, "夜航船 - 第 1 页");
    assert_eq!(doc.pages[1].header, "夜航船 - 第 2 页");

    // 正文 #shot 计数器逐次递增
    let counted = doc
        .nodes
        .iter()
        .find(|n| n.text.contains("#shot"))
        .expect("计数器所在动作段");
    let rendered: String = counted.lines.iter().map(|l| l.text()).collect();
    assert!(rendered.contains("第1个镜头"), "实际: {}", rendered);
    assert!(rendered.contains("第2个"), "实际: {}", rendered);

    // 注解保留为零宽 note 开关
    let has_note = doc.nodes.iter().flat_map(|n| &n.lines).flat_map(|l| &l.leaves).any(|leaf| {
        matches!(leaf, Leaf::Toggle { channel: ToggleChannel::Note, .. })
    });
    assert!(has_note, "[[...]] 应进入 note 通道");
}

#[test]
fn test_scene_numbering_preserve_keeps_declared() {
    let script = "INT. 咖啡馆 - 日 #3#\n\n一段动作。\n";
    let mut conf = Conf::default();
    conf.scene_numbering = SceneNumbering::Preserve;
    let doc = layout(script, Path::new("."), &conf, &Template::default()).unwrap();
    let scene = doc.nodes.iter().find(|n| n.node_type == NodeType::Scene).unwrap();
    assert_eq!(scene.scene_number.as_deref(), Some("3"));
}

#[test]
fn test_style_balance_closure_across_document() {
    // 含故意失配的标记：每个节点内各通道开关都必须成对
    let script = "\
INT. 房间 - 日

这里有*斜体*、**粗体**、***粗斜***和一个永远关不上的 *悬空标记。

@顾清
_下划线跨 词_ 以及 ~~删除~~ 和 +高亮+。
";
    let doc = layout(script, Path::new("."), &Conf::default(), &Template::default()).unwrap();

    for node in &doc.nodes {
        let mut counts: HashMap<ToggleChannel, i64> = HashMap::new();
        for line in &node.lines {
            for leaf in &line.leaves {
                if let Leaf::Toggle { channel, opening } = leaf {
                    *counts.entry(*channel).or_default() += if *opening { 1 } else { -1 };
                }
            }
        }
        for (ch, n) in counts {
            assert_eq!(n, 0, "{:?} 通道在节点内失配: {}", ch, node.text);
        }
        // 区间永不越过行长
        for line in &node.lines {
            for (s, e) in line.underline.iter().chain(&line.strikeout).chain(&line.highlight) {
                assert!(s < e && *e <= line.length, "区间越界: ({}, {}) / {}", s, e, line.length);
            }
        }
    }
}

#[test]
fn test_long_dialogue_splits_with_continuation_cues() {
    let body = "对白内容。".repeat(500);
    let script = format!("INT. 房间 - 日\n\n@顾清\n{}\n", body);
    let doc = layout(&script, Path::new("."), &Conf::default(), &Template::default()).unwrap();

    let parts: Vec<_> = doc
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Dialogue && n.text.starts_with("对白内容。"))
        .collect();
    assert!(parts.len() >= 2, "长对白应跨页拆分");

    // 拆分守恒：字素总量不变
    let total: usize = parts.iter().flat_map(|n| &n.lines).map(|l| l.length).sum();
    assert_eq!(total, 2500);

    // 拆点 (MORE)，续页角色提示 (CONT'D)
    assert!(doc
        .nodes
        .iter()
        .any(|n| n.node_type == NodeType::Parenthetical && n.text == "(MORE)"));
    let contd = doc
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::Character && n.text.contains("CONT'D"))
        .expect("续页角色提示");
    assert!(contd.page >= 2);

    // 续块与首块同类型同层级
    for part in &parts {
        assert_eq!(part.level, 0);
    }
}

#[test]
fn test_page_counter_increments_per_occurrence() {
    let script = "这是第#page页。\n\n这是第#page页。\n";
    let doc = layout(script, Path::new("."), &Conf::default(), &Template::default()).unwrap();
    let rendered: Vec<String> = doc
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Action)
        .map(|n| n.lines.iter().map(|l| l.text()).collect())
        .collect();
    assert_eq!(rendered, vec!["这是第1页。", "这是第2页。"]);
}

#[test]
fn test_whitespace_collapse_levels() {
    let script = "第一段。\n\n\n\n第二段。\n";
    let doc = layout(script, Path::new("."), &Conf::default(), &Template::default()).unwrap();
    let ws: Vec<_> = doc.nodes.iter().filter(|n| n.node_type == NodeType::Whitespace).collect();
    assert_eq!(ws.len(), 1, "连续空行折叠成一个节点");
    assert_eq!(ws[0].level, 2, "3 个空行 → level 2");
}
