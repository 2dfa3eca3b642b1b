//! 表单会话
//!
//! 封装“我正在填写哪个职位的表单，已经填过什么”这一信息

use crate::models::FormOutcome;
use crate::surface::ElementRef;
use std::collections::HashSet;
use std::fmt::Display;

/// 单个职位的表单会话
#[derive(Debug, Clone)]
pub struct FormSession {
    /// 职位ID
    pub item_id: String,

    /// 当前的表单步骤容器
    pub step: Option<ElementRef>,

    /// 本次会话已经填写过的字段键
    pub filled: HashSet<String>,

    /// 点击申请按钮前卡片上是否有申请入口（验证时使用）
    pub had_affordance: bool,

    /// 最终结果
    pub outcome: Option<FormOutcome>,

    /// 已经执行的轮次
    pub iterations: u32,
}

impl FormSession {
    pub fn new(item_id: impl Into<String>, had_affordance: bool) -> Self {
        Self {
            item_id: item_id.into(),
            step: None,
            filled: HashSet::new(),
            had_affordance,
            outcome: None,
            iterations: 0,
        }
    }
}

impl Display for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[职位 {} 第{}轮 已填{}项]",
            self.item_id,
            self.iterations,
            self.filled.len()
        )
    }
}
