use fountain_layout::{layout, Conf, Template};
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: {} <fountain_file> [--json]", args[0]);
        return;
    }

    let file_path = &args[1];
    let as_json = args.iter().any(|a| a == "--json");

    let content = match fs::read_to_string(file_path) {
        Ok(content) => content,
        Err(e) => {
            println!("读取文件失败: {}", e);
            return;
        }
    };

    let base_dir = Path::new(file_path).parent().unwrap_or_else(|| Path::new("."));
    let conf = Conf::default();
    let template = Template::default();

    match layout(&content, base_dir, &conf, &template) {
        Ok(doc) => {
            if as_json {
                match serde_json::to_string_pretty(&doc) {
                    Ok(json) => println!("{}", json),
                    Err(e) => println!("序列化失败: {}", e),
                }
                return;
            }
            println!("排版完成！");
            println!("页数: {}", doc.pages.len());
            println!("节点数量: {}", doc.nodes.len());
            println!("角色数量: {}", doc.characters.len());
            if let Some(title) = doc.title_field("title") {
                println!("标题: {}", title);
            }
        }
        Err(e) => {
            println!("排版失败: {}", e);
        }
    }
}
