//! 变更通知消息类型定义
//!
//! 远程存储通过订阅通道推送这些消息，编辑器据此触发重新拉取。

pub mod payload;
pub use payload::*;
