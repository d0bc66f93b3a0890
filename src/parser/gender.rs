use crate::models::CharacterRegistry;

/// 解析 boneyard 中内嵌的性别表并合并进角色仓库
///
/// 语法：
/// ```text
/// [gender.female]
/// 顾清 | 小顾
/// [gender.male]
/// JOHN
/// ```
///
/// 表头畸形（`[gender.x` 缺闭括号，或带 `[` 表头缺 `gender.` 前缀）时
/// 中止该表的归类，整段按不存在处理。
pub fn parse_gender_tables(boneyards: &[String], registry: &mut CharacterRegistry) {
    for block in boneyards {
        let trimmed = block.trim_start();
        if !trimmed.starts_with("[gender.") {
            continue;
        }
        if !apply_table(block, registry) {
            log::warn!("性别表表头畸形，整表按不存在处理");
        }
    }
}

/// 逐行归类；返回 false 表示遇到畸形表头而中止
fn apply_table(block: &str, registry: &mut CharacterRegistry) -> bool {
    // 先完整校验所有表头，畸形即整表作废
    let mut entries: Vec<(String, Vec<String>)> = Vec::new(); // (组名, 行)
    let mut group: Option<String> = None;
    for raw in block.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') {
            let inner = match line.find(']') {
                Some(pos) => &line[1..pos],
                None => return false, // 缺闭括号
            };
            let name = match inner.strip_prefix("gender.") {
                Some(n) if !n.trim().is_empty() => n.trim().to_string(),
                _ => return false, // 缺 gender. 前缀
            };
            group = Some(name);
            continue;
        }
        if let Some(g) = &group {
            entries.push((g.clone(), vec![line.to_string()]));
        }
    }

    for (gender, lines) in entries {
        for line in lines {
            merge_line(&line, &gender, registry);
        }
    }
    true
}

/// `姓名 | 别名 | 别名` 一行合并进仓库（名与别名均大小写不敏感查找）
fn merge_line(line: &str, gender: &str, registry: &mut CharacterRegistry) {
    let mut parts = line.split('|').map(str::trim).filter(|p| !p.is_empty());
    let name = match parts.next() {
        Some(n) => n,
        None => return,
    };
    let idx = match registry.lookup(name) {
        Some(idx) => idx,
        None => registry.insert(name, gender),
    };
    registry.characters[idx].gender = gender.to_string();
    for alias in parts {
        registry.add_alias(idx, alias);
    }
}
