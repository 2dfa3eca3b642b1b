//! 页面操作抽象（Page Surface）
//!
//! ## 职责
//!
//! 引擎通过 `PageSurface` 查找、点击、读写页面元素，不关心元素是怎么定位的。
//! `Criteria` 对引擎是不透明的选择器描述，具体的 CSS 表由 `SelectorSet` 提供。
//!
//! - 生产实现：`infrastructure::CdpSurface`（通过 CDP 执行 JS）
//! - 测试实现：`fake::FakeSurface`（可编排的内存 DOM）

pub mod selectors;

#[cfg(test)]
pub mod fake;

pub use selectors::SelectorSet;

use crate::error::SurfaceResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 卡片上的职位ID标记
pub const ITEM_TAG_ATTR: &str = "data-auto-apply-id";
/// 卡片上的处理状态标记
pub const STATUS_ATTR: &str = "data-auto-apply-status";
/// 点击申请按钮前记录“曾经有申请入口”
pub const HAD_AFFORDANCE_ATTR: &str = "data-auto-apply-had-apply";

/// `wait_for_any` 的默认轮询间隔
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// 页面元素引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 元素查找条件
///
/// - `css`：逗号分隔的选择器列表
/// - `text_any`：元素文本（小写）包含其中任意一个即匹配，为空时不限制
/// - `within`：只在该元素的后代中查找
/// - `enabled_only`：忽略禁用的元素
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criteria {
    pub css: String,
    #[serde(default)]
    pub text_any: Vec<String>,
    #[serde(default)]
    pub within: Option<ElementRef>,
    #[serde(default)]
    pub enabled_only: bool,
}

impl Criteria {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            css: selector.into(),
            ..Default::default()
        }
    }

    pub fn with_text<I, T>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.text_any = texts
            .into_iter()
            .map(|t| t.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn within(mut self, scope: &ElementRef) -> Self {
        self.within = Some(scope.clone());
        self
    }

    pub fn enabled(mut self) -> Self {
        self.enabled_only = true;
        self
    }

    /// 文本条件判断（已小写的文本）
    pub fn text_matches(&self, lowered_text: &str) -> bool {
        self.text_any.is_empty() || self.text_any.iter().any(|t| lowered_text.contains(t))
    }
}

/// 表单控件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Tel,
    Url,
    Number,
    Email,
    Select,
    Textarea,
    Radio,
    Checkbox,
    Other,
}

/// 表单控件快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub element: ElementRef,
    pub kind: FieldKind,
    /// 小写后的标签文本（aria-label / placeholder / name / id / label 文本拼接）
    pub label: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub required: bool,
    /// 单选框分组名
    #[serde(default)]
    pub group: Option<String>,
    /// 单选框自身的选项文本
    #[serde(default)]
    pub option_label: String,
    /// 下拉框的选项文本
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub checked: bool,
}

impl FormField {
    /// 已填字段集合使用的键：单选框按分组，其余按元素
    pub fn key(&self) -> String {
        match (&self.kind, &self.group) {
            (FieldKind::Radio, Some(group)) => format!("radio:{}", group),
            _ => self.element.0.clone(),
        }
    }

    /// 当前是否为空（单选框分组需要在分组层面判断）
    pub fn is_empty(&self) -> bool {
        match self.kind {
            FieldKind::Radio | FieldKind::Checkbox => !self.checked,
            FieldKind::Select => {
                let value = self.value.trim().to_lowercase();
                value.is_empty() || value.starts_with("select")
            }
            _ => self.value.trim().is_empty(),
        }
    }
}

/// 页面操作接口
#[async_trait]
pub trait PageSurface: Send + Sync {
    /// 查找所有匹配的元素（文档顺序）
    async fn find_all(&self, criteria: &Criteria) -> SurfaceResult<Vec<ElementRef>>;

    /// 查找第一个匹配的元素
    async fn find_first(&self, criteria: &Criteria) -> SurfaceResult<Option<ElementRef>> {
        Ok(self.find_all(criteria).await?.into_iter().next())
    }

    async fn click(&self, element: &ElementRef) -> SurfaceResult<()>;

    /// 设置输入值并触发 input / change 事件
    async fn set_value(&self, element: &ElementRef, value: &str) -> SurfaceResult<()>;

    /// 元素（含后代）的文本
    async fn text_of(&self, element: &ElementRef) -> SurfaceResult<String>;

    async fn attr(&self, element: &ElementRef, name: &str) -> SurfaceResult<Option<String>>;

    /// 写入属性，`None` 表示删除
    async fn set_attr(
        &self,
        element: &ElementRef,
        name: &str,
        value: Option<&str>,
    ) -> SurfaceResult<()>;

    async fn is_disabled(&self, element: &ElementRef) -> SurfaceResult<bool>;

    async fn scroll_into_view(&self, element: &ElementRef) -> SurfaceResult<()>;

    /// 把可滚动容器滚到底部（触发懒加载）
    async fn scroll_to_end(&self, container: &ElementRef) -> SurfaceResult<()>;

    /// 容器内所有表单控件的快照
    async fn form_fields(&self, container: &ElementRef) -> SurfaceResult<Vec<FormField>>;

    /// 按选项文本选择下拉框
    async fn select_option(&self, element: &ElementRef, option: &str) -> SurfaceResult<()>;

    async fn navigate(&self, url: &str) -> SurfaceResult<()>;

    async fn current_url(&self) -> SurfaceResult<String>;

    /// 清除页面上所有带该属性的标记
    async fn clear_marks(&self, _attribute: &str) -> SurfaceResult<()> {
        Ok(())
    }

    /// 轮询等待任意一个条件出现，超时返回 `None`
    async fn wait_for_any(
        &self,
        criteria: &[Criteria],
        timeout: Duration,
    ) -> SurfaceResult<Option<ElementRef>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            for c in criteria {
                if let Some(found) = self.find_first(c).await? {
                    return Ok(Some(found));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

/// 读取文本，元素失效时返回空串
pub async fn text_or_empty<S: PageSurface + ?Sized>(surface: &S, element: &ElementRef) -> String {
    match surface.text_of(element).await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("读取元素 {} 文本失败: {}", element, e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criteria_text_is_lowercased() {
        let criteria = Criteria::css("button").with_text(["Submit Application"]);
        assert!(criteria.text_matches("please submit application now"));
        assert!(!criteria.text_matches("next"));
        assert!(Criteria::css("button").text_matches("anything"));
    }

    #[test]
    fn test_select_placeholder_counts_as_empty() {
        let field = FormField {
            element: ElementRef::new("n3"),
            kind: FieldKind::Select,
            label: "work authorization".into(),
            value: "Select an option".into(),
            required: true,
            group: None,
            option_label: String::new(),
            options: vec!["Yes".into(), "No".into()],
            checked: false,
        };
        assert!(field.is_empty());
        assert_eq!(field.key(), "n3");
    }
}
