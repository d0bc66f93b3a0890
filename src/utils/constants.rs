use std::collections::HashMap;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // 行级分类正则
    pub static ref LINE_REGEX: HashMap<&'static str, Regex> = {
        let mut map = HashMap::new();
        // 场景前缀：INT/EXT/EST 等后跟点号或空白
        map.insert(
            "scene_heading",
            Regex::new(r"(?i)^(INT\.?/EXT|INT/EXT|I\.?[/-]E|INT|EXT|EST)[\. ]").unwrap(),
        );
        // 行尾场景编号 #...#
        map.insert("scene_number", Regex::new(r"[ \t]*#([^\s#]+)#[ \t]*$").unwrap());
        // 整行 {{keyword: value}} 指令
        map.insert(
            "directive",
            Regex::new(r"(?i)^\{\{\s*([a-z_][a-z0-9_]*)\s*(?::\s*(.*?))?\s*\}\}$").unwrap(),
        );
        // 标题页 key: value 行（键不含冒号，值可为空）
        map.insert(
            "title_page",
            Regex::new(r"^[ \t]*([A-Za-z][A-Za-z0-9 _\-\.]*?)[ \t]*:[ \t]*(.*)$").unwrap(),
        );
        // 标题页续行：行首至少 3 个空格
        map.insert("title_continuation", Regex::new(r"^ {3,}\S").unwrap());
        map
    };

    // 预处理阶段正则
    pub static ref PREPROCESS_REGEX: HashMap<&'static str, Regex> = {
        let mut map = HashMap::new();
        // {{keyword[: value]}} 指令（单行内）
        map.insert(
            "directive",
            Regex::new(r"(?i)\{\{\s*([a-z_][a-z0-9_]*)\s*(?::\s*([^}]*?))?\s*\}\}").unwrap(),
        );
        // 跨行注解 [[ ... ]]
        map.insert("note", Regex::new(r"(?s)\[\[.*?\]\]").unwrap());
        map
    };
}
