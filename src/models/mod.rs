pub mod node;
pub mod line;
pub mod document;
pub mod conf;
pub mod template;

pub use node::{Node, NodeType, Justification};
pub use line::{Line, Leaf, ToggleChannel, RangeChannel, StyleRange};
pub use document::{Document, Character, CharacterRegistry, Counter, PageInfo, canonical_key};
pub use conf::{Conf, SceneNumbering};
pub use template::{Template, TypeRule, Casing, StyleBits, ExprError, eval_expr, resolve_dim};
