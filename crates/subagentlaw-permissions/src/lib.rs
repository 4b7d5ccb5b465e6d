//! The permission arbiter: the layered decision pipeline a tool call passes
//! through before it's allowed, denied, or escalated to a prompt.

pub mod arbiter;
pub mod matcher;
pub mod skill_scope;

pub use arbiter::{Arbiter, Decision};
pub use skill_scope::SkillScope;
