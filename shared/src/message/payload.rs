//! 变更通知载荷

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ItemId, OwnerId};

/// 资源类型: 条目集合
pub const RESOURCE_ITEMS: &str = "items";

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// 新增或更新条目
    Upserted,
    /// 删除条目
    Deleted,
    /// 整体顺序变更
    Reordered,
    /// 未知变更 (轮询检测到差异时使用)
    Changed,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Upserted => write!(f, "upserted"),
            ChangeAction::Deleted => write!(f, "deleted"),
            ChangeAction::Reordered => write!(f, "reordered"),
            ChangeAction::Changed => write!(f, "changed"),
        }
    }
}

/// 变更通知 (远程存储 -> 编辑器)
///
/// 通知只说明"有变化"，不携带权威数据；收到后由编辑器重新拉取完整集合。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// 集合所属者
    pub owner_id: OwnerId,
    /// 资源类型 (例如: "items")
    pub resource: String,
    /// 变更类型
    pub action: ChangeAction,
    /// 相关条目 ID (整体变更时为 None)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    /// 单调递增版本号
    pub version: u64,
}

impl ChangeNotification {
    pub fn new(owner_id: OwnerId, action: ChangeAction, version: u64) -> Self {
        Self {
            owner_id,
            resource: RESOURCE_ITEMS.to_string(),
            action,
            id: None,
            version,
        }
    }

    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = Some(id);
        self
    }

    /// 是否属于指定所属者
    pub fn concerns(&self, owner: &OwnerId) -> bool {
        &self.owner_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_serialize() {
        let n = ChangeNotification::new(OwnerId::new("club"), ChangeAction::Reordered, 7);
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["owner_id"], "club");
        assert_eq!(json["resource"], "items");
        assert_eq!(json["action"], "reordered");
        assert_eq!(json["version"], 7);
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_notification_concerns_owner() {
        let n = ChangeNotification::new(OwnerId::new("club"), ChangeAction::Deleted, 1)
            .with_id(ItemId::new("x"));
        assert!(n.concerns(&OwnerId::new("club")));
        assert!(!n.concerns(&OwnerId::new("other")));
        assert_eq!(n.id, Some(ItemId::new("x")));
    }
}
