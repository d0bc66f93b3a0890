use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

use crate::models::line::{Leaf, Line, RangeChannel, ToggleChannel};
use crate::models::{canonical_key, Counter};
use crate::utils::{display_width, strip_markup};

use super::tokenizer::{push_word, tokenize, MarkerKind, RawToken};

/// 配平后的 token：标记已判定为开/关事件或回退为字面
#[derive(Debug, Clone, PartialEq)]
pub enum StyledToken {
    Word(String),
    Space(usize),
    Newline,
    /// 零宽样式开关（粗体/斜体/粗斜体/注解）
    Toggle { channel: ToggleChannel, opening: bool },
    /// 区间样式边界（下划线/删除线/高亮）
    Range { channel: RangeChannel, opening: bool },
}

/// 替换阶段的环境：正文计数器表 + 标题页字段
pub struct StyleContext<'a> {
    pub counters: &'a mut HashMap<String, Counter>,
    pub title: &'a HashMap<String, String>,
}

/// 分词 + 替换 + 配平
pub fn style_tokens(text: &str, ctx: &mut StyleContext) -> Vec<StyledToken> {
    balance(substitute(tokenize(text), ctx))
}

/// 分词 + 配平，不做 $变量/#计数器替换（测试与调试用）
pub fn resolve_styles(text: &str) -> Vec<StyledToken> {
    balance(tokenize(text))
}

/// $变量与 #计数器落成字面词
///
/// 替换值按纯文本插入，不再参与标记配平；未知变量保持字面。
fn substitute(tokens: Vec<RawToken>, ctx: &mut StyleContext) -> Vec<RawToken> {
    let mut out: Vec<RawToken> = Vec::with_capacity(tokens.len());
    for tok in tokens {
        match tok {
            RawToken::Variable { name, literal } => {
                match ctx.title.get(&canonical_key(&name)) {
                    Some(value) => {
                        let flat = strip_markup(value).replace('\n', " ");
                        push_word(&mut out, flat);
                    }
                    None => push_word(&mut out, literal),
                }
            }
            RawToken::Counter { name, reset, .. } => {
                let counter = ctx.counters.entry(name).or_insert_with(Counter::default);
                if let Some(r) = &reset {
                    counter.reset_from(r);
                }
                let text = counter.render();
                counter.bump();
                push_word(&mut out, text);
            }
            other => out.push(other),
        }
    }
    out
}

fn toggle(channel: ToggleChannel, opening: bool) -> StyledToken {
    StyledToken::Toggle { channel, opening }
}

/// 某标记位置是否以"三星同开两通道"的形态开启
fn opened_as_pair(events: &[Vec<StyledToken>], idx: usize) -> bool {
    matches!(
        events[idx].as_slice(),
        [StyledToken::Toggle { channel: ToggleChannel::BoldItalic, opening: true }]
    )
}

/// 三星开启被单通道关闭时，把开启事件拆成两个独立开关
fn split_bold_italic(events: &mut [Vec<StyledToken>], idx: usize) {
    if opened_as_pair(events, idx) {
        events[idx] = vec![
            toggle(ToggleChannel::Bold, true),
            toggle(ToggleChannel::Italic, true),
        ];
    }
}

/// 逐通道配平至不动点
///
/// 每轮从左到右扫描：开着的通道遇到可关标记即关闭，关着的遇到
/// 可开标记即开启，两者都不行就回退字面。扫描结束仍悬空的开启
/// 标记回退字面后整体重扫，因为它的消失会改变后续判定。每轮至少
/// 回退一个标记，必然终止。
fn balance(tokens: Vec<RawToken>) -> Vec<StyledToken> {
    let mut literal = vec![false; tokens.len()];
    loop {
        let mut events: Vec<Vec<StyledToken>> = vec![Vec::new(); tokens.len()];
        let mut bold_open: Option<usize> = None;
        let mut italic_open: Option<usize> = None;
        let mut range_open: [Option<usize>; 3] = [None; 3];
        let mut note_open: Option<usize> = None;

        for (i, tok) in tokens.iter().enumerate() {
            if literal[i] {
                continue;
            }
            match tok {
                RawToken::Marker { kind: MarkerKind::Italic, can_open, can_close, .. } => {
                    match italic_open {
                        Some(op) if *can_close => {
                            split_bold_italic(&mut events, op);
                            events[i].push(toggle(ToggleChannel::Italic, false));
                            italic_open = None;
                        }
                        None if *can_open => {
                            events[i].push(toggle(ToggleChannel::Italic, true));
                            italic_open = Some(i);
                        }
                        _ => literal[i] = true,
                    }
                }
                RawToken::Marker { kind: MarkerKind::Bold, can_open, can_close, .. } => {
                    match bold_open {
                        Some(op) if *can_close => {
                            split_bold_italic(&mut events, op);
                            events[i].push(toggle(ToggleChannel::Bold, false));
                            bold_open = None;
                        }
                        None if *can_open => {
                            events[i].push(toggle(ToggleChannel::Bold, true));
                            bold_open = Some(i);
                        }
                        _ => literal[i] = true,
                    }
                }
                RawToken::Marker { kind: MarkerKind::BoldItalic, can_open, can_close, .. } => {
                    match (bold_open, italic_open) {
                        (Some(bo), Some(io)) if *can_close => {
                            if bo == io && opened_as_pair(&events, bo) {
                                events[i].push(toggle(ToggleChannel::BoldItalic, false));
                            } else {
                                events[i].push(toggle(ToggleChannel::Italic, false));
                                events[i].push(toggle(ToggleChannel::Bold, false));
                            }
                            bold_open = None;
                            italic_open = None;
                        }
                        (None, None) if *can_open => {
                            events[i].push(toggle(ToggleChannel::BoldItalic, true));
                            bold_open = Some(i);
                            italic_open = Some(i);
                        }
                        // 两通道状态不一致时无法成对，回退字面
                        _ => literal[i] = true,
                    }
                }
                RawToken::Marker { kind, can_open, can_close, .. } => {
                    if let Some(ch) = kind.range_channel() {
                        let s = range_slot(ch);
                        match range_open[s] {
                            Some(_) if *can_close => {
                                events[i].push(StyledToken::Range { channel: ch, opening: false });
                                range_open[s] = None;
                            }
                            None if *can_open => {
                                events[i].push(StyledToken::Range { channel: ch, opening: true });
                                range_open[s] = Some(i);
                            }
                            _ => literal[i] = true,
                        }
                    }
                }
                RawToken::NoteOpen { .. } => match note_open {
                    None => {
                        events[i].push(toggle(ToggleChannel::Note, true));
                        note_open = Some(i);
                    }
                    Some(_) => literal[i] = true,
                },
                RawToken::NoteClose { .. } => match note_open {
                    Some(_) => {
                        events[i].push(toggle(ToggleChannel::Note, false));
                        note_open = None;
                    }
                    None => literal[i] = true,
                },
                _ => {}
            }
        }

        // 悬空开启回退字面，整段失配作废后重扫
        let mut rescan = false;
        for idx in [bold_open, italic_open, range_open[0], range_open[1], range_open[2], note_open]
            .into_iter()
            .flatten()
        {
            if !literal[idx] {
                literal[idx] = true;
                rescan = true;
            }
        }
        if rescan {
            continue;
        }
        return emit(tokens, &literal, events);
    }
}

fn range_slot(ch: RangeChannel) -> usize {
    match ch {
        RangeChannel::Underline => 0,
        RangeChannel::Strikeout => 1,
        RangeChannel::Highlight => 2,
    }
}

fn emit(tokens: Vec<RawToken>, literal: &[bool], mut events: Vec<Vec<StyledToken>>) -> Vec<StyledToken> {
    let mut out: Vec<StyledToken> = Vec::with_capacity(tokens.len());
    for (i, tok) in tokens.into_iter().enumerate() {
        if literal[i] {
            match tok {
                RawToken::Marker { literal: lit, .. }
                | RawToken::NoteOpen { literal: lit }
                | RawToken::NoteClose { literal: lit } => push_styled_word(&mut out, lit),
                // 其余 token 不会被回退
                _ => {}
            }
            continue;
        }
        match tok {
            RawToken::Word(w) => push_styled_word(&mut out, w),
            RawToken::Space(n) => out.push(StyledToken::Space(n)),
            RawToken::Newline => out.push(StyledToken::Newline),
            RawToken::Marker { .. } | RawToken::NoteOpen { .. } | RawToken::NoteClose { .. } => {
                out.append(&mut events[i]);
            }
            // 未经替换阶段的残留按字面输出
            RawToken::Variable { literal: lit, .. } | RawToken::Counter { literal: lit, .. } => {
                push_styled_word(&mut out, lit);
            }
        }
    }
    out
}

fn push_styled_word(out: &mut Vec<StyledToken>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(StyledToken::Word(prev)) = out.last_mut() {
        prev.push_str(&text);
        return;
    }
    out.push(StyledToken::Word(text));
}

/// 分词、替换、配平后贪心换行
///
/// `width` 是字素格预算；`indent` 只挤占首行。跨行的区间样式在
/// 折行处收口、续行偏移 0 处重开。
pub fn wrap(text: &str, width: usize, indent: usize, ctx: &mut StyleContext) -> Vec<Line> {
    let styled = style_tokens(text, ctx);
    wrap_tokens(&styled, width, indent)
}

/// 对已配平的 token 序列贪心换行
pub fn wrap_tokens(tokens: &[StyledToken], width: usize, indent: usize) -> Vec<Line> {
    let mut w = Wrapper::new(width.max(1), indent);
    for tok in tokens {
        match tok {
            StyledToken::Word(t) => w.push_text(t),
            StyledToken::Space(n) => w.push_space(*n),
            StyledToken::Newline => w.push_newline(),
            StyledToken::Toggle { channel, opening } => w.push_toggle(*channel, *opening),
            StyledToken::Range { channel, opening } => w.push_range(range_slot(*channel), *opening),
        }
    }
    w.finish()
}

/// 词簇内的一个片段（簇 = 不可断开的连续非空白单元）
#[derive(Debug)]
enum Piece {
    Text(String),
    Toggle(ToggleChannel, bool),
    Range(usize, bool),
}

#[derive(Default)]
struct LineBuilder {
    length: usize,
    leaves: Vec<Leaf>,
    ranges: [Vec<(usize, usize)>; 3],
    range_start: [Option<usize>; 3],
}

impl LineBuilder {
    fn reopened(open: &[bool; 3]) -> Self {
        let mut b = LineBuilder::default();
        for (slot, is_open) in open.iter().enumerate() {
            if *is_open {
                b.range_start[slot] = Some(0);
            }
        }
        b
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.length += display_width(text);
        if let Some(Leaf::Text(prev)) = self.leaves.last_mut() {
            prev.push_str(text);
            return;
        }
        self.leaves.push(Leaf::Text(text.to_string()));
    }

    fn open_range(&mut self, slot: usize) {
        self.range_start[slot] = Some(self.length);
    }

    fn close_range(&mut self, slot: usize) {
        if let Some(start) = self.range_start[slot].take() {
            if start < self.length {
                self.ranges[slot].push((start, self.length));
            }
        }
    }

    fn seal(mut self) -> Line {
        for slot in 0..3 {
            self.close_range(slot);
        }
        let [underline, strikeout, highlight] = self.ranges;
        Line { length: self.length, leaves: self.leaves, underline, strikeout, highlight }
    }

    fn is_blank(&self) -> bool {
        self.length == 0 && self.leaves.is_empty()
    }
}

struct Wrapper {
    width: usize,
    indent: usize,
    out: Vec<Line>,
    cur: LineBuilder,
    open: [bool; 3],
    pending_space: usize,
    cluster: Vec<Piece>,
    cluster_width: usize,
}

impl Wrapper {
    fn new(width: usize, indent: usize) -> Self {
        Wrapper {
            width,
            indent,
            out: Vec::new(),
            cur: LineBuilder::default(),
            open: [false; 3],
            pending_space: 0,
            cluster: Vec::new(),
            cluster_width: 0,
        }
    }

    /// 当前行的可用宽度（缩进只挤占首行）
    fn budget(&self) -> usize {
        if self.out.is_empty() {
            self.width.saturating_sub(self.indent).max(1)
        } else {
            self.width
        }
    }

    fn push_text(&mut self, text: &str) {
        self.cluster_width += display_width(text);
        if let Some(Piece::Text(prev)) = self.cluster.last_mut() {
            prev.push_str(text);
            return;
        }
        self.cluster.push(Piece::Text(text.to_string()));
    }

    fn push_toggle(&mut self, channel: ToggleChannel, opening: bool) {
        self.cluster.push(Piece::Toggle(channel, opening));
    }

    fn push_range(&mut self, slot: usize, opening: bool) {
        self.cluster.push(Piece::Range(slot, opening));
    }

    fn push_space(&mut self, n: usize) {
        self.flush_cluster();
        self.pending_space += n;
    }

    fn push_newline(&mut self) {
        self.flush_cluster();
        self.pending_space = 0;
        self.break_line();
    }

    fn break_line(&mut self) {
        let sealed = std::mem::replace(&mut self.cur, LineBuilder::reopened(&self.open));
        self.out.push(sealed.seal());
    }

    /// 把攒下的词簇落进当前行，放不下就折行；超宽词簇逐字素硬切
    fn flush_cluster(&mut self) {
        if self.cluster.is_empty() {
            return;
        }
        let pieces = std::mem::take(&mut self.cluster);
        let cw = self.cluster_width;
        self.cluster_width = 0;

        if self.cur.length > 0 {
            if self.cur.length + self.pending_space + cw > self.budget() {
                self.break_line();
            } else {
                let sp = " ".repeat(self.pending_space);
                self.cur.push_text(&sp);
            }
        }
        // 折行后的行首空白丢弃
        self.pending_space = 0;

        for piece in pieces {
            match piece {
                Piece::Text(t) => {
                    for g in t.graphemes(true) {
                        if self.cur.length >= self.budget() {
                            self.break_line();
                        }
                        self.cur.push_text(g);
                    }
                }
                Piece::Toggle(channel, opening) => {
                    self.cur.leaves.push(Leaf::Toggle { channel, opening });
                }
                Piece::Range(slot, true) => {
                    self.open[slot] = true;
                    self.cur.open_range(slot);
                }
                Piece::Range(slot, false) => {
                    self.open[slot] = false;
                    self.cur.close_range(slot);
                }
            }
        }
    }

    fn finish(mut self) -> Vec<Line> {
        self.flush_cluster();
        if self.out.is_empty() || !self.cur.is_blank() {
            let sealed = std::mem::take(&mut self.cur);
            self.out.push(sealed.seal());
        }
        self.out
    }
}
