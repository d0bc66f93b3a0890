pub mod tokenizer;
pub mod wrapper;

pub use tokenizer::{tokenize, MarkerKind, RawToken};
pub use wrapper::{resolve_styles, style_tokens, wrap, wrap_tokens, StyleContext, StyledToken};

use crate::models::template::{Casing, StyleBits, Template};
use crate::models::{Document, Leaf, Line, ToggleChannel};

/// 给文档所有可打印节点做替换与换行
///
/// 宽度取类型规则的 width，双栏变体改用模板列宽；大小写规则
/// 在换行前施加到原始文本上，强制样式位在换行后逐行包夹。
/// 计数器按节点顺序推进。
pub fn style_document(doc: &mut Document, template: &Template) {
    let Document { nodes, counters, title, .. } = doc;
    let mut ctx = StyleContext { counters, title };

    for node in nodes.iter_mut() {
        if !node.node_type.is_printable() {
            continue;
        }
        let rule = template.rule(node.node_type);
        let text = match rule.casing {
            Some(Casing::Upper) => node.text.to_uppercase(),
            Some(Casing::Lower) => node.text.to_lowercase(),
            None => node.text.clone(),
        };
        let width = if node.node_type.is_dual() { template.dual_width } else { rule.width };
        node.justification = rule.justify;
        node.lines = wrap(&text, width, rule.indent, &mut ctx);
        if rule.style != StyleBits::default() {
            for line in &mut node.lines {
                force_styles(line, rule.style);
            }
        }
    }
}

/// 把类型规则的强制样式位落到单行上
///
/// 粗体/斜体各加一对零宽开关包住整行，下划线记一条全行区间；
/// 逐行成对，跨页拆分后每行仍自洽。
fn force_styles(line: &mut Line, style: StyleBits) {
    if line.length == 0 {
        return;
    }
    let mut channels = Vec::new();
    if style.bold {
        channels.push(ToggleChannel::Bold);
    }
    if style.italic {
        channels.push(ToggleChannel::Italic);
    }
    for (i, ch) in channels.iter().enumerate() {
        line.leaves.insert(i, Leaf::Toggle { channel: *ch, opening: true });
    }
    for ch in channels.iter().rev() {
        line.leaves.push(Leaf::Toggle { channel: *ch, opening: false });
    }
    if style.underline {
        line.underline.insert(0, (0, line.length));
    }
}
