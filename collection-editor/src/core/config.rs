use std::time::Duration;

use shared::error::{AppError, AppResult};

/// 编辑器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量 (或 `.env` 文件) 覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | EDITOR_DEBOUNCE_MS | 400 | 顺序写入的静默期(毫秒) |
/// | EDITOR_HISTORY_LIMIT | 100 | 撤销栈最大深度 |
/// | EDITOR_EVENT_CAPACITY | 256 | 事件广播通道容量 |
/// | EDITOR_COMMAND_CAPACITY | 64 | 命令通道容量 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (未设置) | 日志目录，设置后写入按天滚动的文件 |
///
/// # 示例
///
/// ```ignore
/// EDITOR_DEBOUNCE_MS=250 LOG_LEVEL=debug cargo run
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// 静默期：最后一次顺序变更后等待多久才写入
    pub debounce_ms: u64,
    /// 撤销栈最大深度
    pub history_limit: usize,
    /// 事件广播通道容量
    pub event_capacity: usize,
    /// 命令通道容量
    pub command_capacity: usize,
    /// 日志级别
    pub log_level: String,
    /// 日志目录
    pub log_dir: Option<String>,
}

impl EditorConfig {
    /// 从环境变量加载配置
    ///
    /// 先读取 `.env` (如果存在)，未设置的项使用默认值
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            debounce_ms: lookup("EDITOR_DEBOUNCE_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.debounce_ms),
            history_limit: lookup("EDITOR_HISTORY_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.history_limit),
            event_capacity: lookup("EDITOR_EVENT_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.event_capacity),
            command_capacity: lookup("EDITOR_COMMAND_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.command_capacity),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: lookup("LOG_DIR").filter(|dir| !dir.is_empty()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(debounce_ms: u64, history_limit: usize) -> Self {
        Self::default()
            .with_debounce_ms(debounce_ms)
            .with_history_limit(history_limit)
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    pub fn with_command_capacity(mut self, command_capacity: usize) -> Self {
        self.command_capacity = command_capacity;
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<String>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    /// 静默期
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> AppResult<()> {
        if self.history_limit == 0 {
            return Err(AppError::config("EDITOR_HISTORY_LIMIT must be at least 1"));
        }
        if self.event_capacity == 0 {
            return Err(AppError::config("EDITOR_EVENT_CAPACITY must be at least 1"));
        }
        if self.command_capacity == 0 {
            return Err(AppError::config("EDITOR_COMMAND_CAPACITY must be at least 1"));
        }
        Ok(())
    }

    /// 按 `log_level` / `log_dir` 初始化日志，已初始化时返回 `false`
    pub fn init_logging(&self) -> bool {
        crate::utils::logger::init_logger_with_file(
            Some(&self.log_level),
            false,
            self.log_dir.as_deref(),
        )
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 400,
            history_limit: 100,
            event_capacity: 256,
            command_capacity: 64,
            log_level: "info".into(),
            log_dir: None,
        }
    }
}
