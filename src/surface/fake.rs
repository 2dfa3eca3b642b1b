//! 内存中的可编排页面，用于单元测试
//!
//! 每个节点带一组“选择器片段”，`Criteria.css` 中任意一个逗号分隔的片段
//! 出现在节点的集合里即视为匹配。点击可以挂接处理函数来模拟页面变化。

use crate::error::{SurfaceError, SurfaceResult};
use crate::surface::{Criteria, ElementRef, FieldKind, FormField, PageSurface};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

type ClickHandler = Box<dyn FnMut(&mut FakeDom) + Send>;

/// 节点上的表单控件描述
#[derive(Debug, Clone)]
pub struct FakeField {
    pub kind: FieldKind,
    pub label: String,
    pub required: bool,
    pub group: Option<String>,
    pub option_label: String,
    pub options: Vec<String>,
}

impl FakeField {
    pub fn new(kind: FieldKind, label: &str) -> Self {
        Self {
            kind,
            label: label.to_string(),
            required: false,
            group: None,
            option_label: String::new(),
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn radio(group: &str, label: &str, option: &str) -> Self {
        Self {
            group: Some(group.to_string()),
            option_label: option.to_string(),
            ..Self::new(FieldKind::Radio, label)
        }
    }

    pub fn select(label: &str, options: &[&str]) -> Self {
        Self {
            options: options.iter().map(|s| s.to_string()).collect(),
            ..Self::new(FieldKind::Select, label)
        }
    }
}

#[derive(Default)]
struct FakeNode {
    selectors: HashSet<String>,
    text: String,
    attrs: HashMap<String, String>,
    parent: Option<usize>,
    removed: bool,
    disabled: bool,
    field: Option<FakeField>,
    value: String,
    checked: bool,
}

/// 页面状态
#[derive(Default)]
pub struct FakeDom {
    nodes: Vec<FakeNode>,
    url: String,
    handlers: HashMap<usize, ClickHandler>,
    /// 点击记录（节点下标）
    pub clicks: Vec<usize>,
    /// 导航记录
    pub navigations: Vec<String>,
    /// `set_attr` 记录：(节点, 属性, 值)
    pub attr_log: Vec<(ElementRef, String, Option<String>)>,
    /// `scroll_to_end` 记录
    pub scrolled_to_end: Vec<ElementRef>,
}

fn index_of(element: &ElementRef) -> Option<usize> {
    element.0.strip_prefix('n').and_then(|n| n.parse().ok())
}

fn to_ref(index: usize) -> ElementRef {
    ElementRef(format!("n{}", index))
}

impl FakeDom {
    pub fn add(&mut self, parent: Option<&ElementRef>, selectors: &[&str], text: &str) -> ElementRef {
        self.nodes.push(FakeNode {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            text: text.to_string(),
            parent: parent.and_then(index_of),
            ..Default::default()
        });
        to_ref(self.nodes.len() - 1)
    }

    pub fn add_field(
        &mut self,
        parent: Option<&ElementRef>,
        selectors: &[&str],
        field: FakeField,
    ) -> ElementRef {
        let element = self.add(parent, selectors, "");
        if let Some(node) = index_of(&element).and_then(|i| self.nodes.get_mut(i)) {
            node.field = Some(field);
        }
        element
    }

    /// 挂接点击处理函数（可以在另一个处理函数里调用）
    pub fn on_click(&mut self, element: &ElementRef, handler: impl FnMut(&mut FakeDom) + Send + 'static) {
        if let Some(index) = index_of(element) {
            self.handlers.insert(index, Box::new(handler));
        }
    }

    pub fn remove(&mut self, element: &ElementRef) {
        if let Some(node) = self.node_mut(element) {
            node.removed = true;
        }
    }

    pub fn set_text(&mut self, element: &ElementRef, text: &str) {
        if let Some(node) = self.node_mut(element) {
            node.text = text.to_string();
        }
    }

    pub fn set_attribute(&mut self, element: &ElementRef, name: &str, value: &str) {
        if let Some(node) = self.node_mut(element) {
            node.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn set_disabled(&mut self, element: &ElementRef, disabled: bool) {
        if let Some(node) = self.node_mut(element) {
            node.disabled = disabled;
        }
    }

    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    pub fn value(&self, element: &ElementRef) -> String {
        index_of(element)
            .and_then(|i| self.nodes.get(i))
            .map(|n| n.value.clone())
            .unwrap_or_default()
    }

    pub fn is_checked(&self, element: &ElementRef) -> bool {
        index_of(element)
            .and_then(|i| self.nodes.get(i))
            .map(|n| n.checked)
            .unwrap_or(false)
    }

    pub fn attribute(&self, element: &ElementRef, name: &str) -> Option<String> {
        index_of(element)
            .and_then(|i| self.nodes.get(i))
            .and_then(|n| n.attrs.get(name).cloned())
    }

    pub fn click_count(&self, element: &ElementRef) -> usize {
        let Some(index) = index_of(element) else {
            return 0;
        };
        self.clicks.iter().filter(|&&i| i == index).count()
    }

    pub fn is_alive(&self, element: &ElementRef) -> bool {
        index_of(element).map(|i| self.alive(i)).unwrap_or(false)
    }

    fn node_mut(&mut self, element: &ElementRef) -> Option<&mut FakeNode> {
        index_of(element).and_then(|i| self.nodes.get_mut(i))
    }

    fn alive(&self, index: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            match self.nodes.get(i) {
                Some(node) if !node.removed => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    fn live(&self, element: &ElementRef) -> SurfaceResult<usize> {
        match index_of(element) {
            Some(i) if i < self.nodes.len() && self.alive(i) => Ok(i),
            _ => Err(SurfaceError::StaleElement(element.0.clone())),
        }
    }

    fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        let mut current = self.nodes[index].parent;
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = self.nodes[i].parent;
        }
        false
    }

    fn subtree_text(&self, index: usize) -> String {
        let mut parts = vec![self.nodes[index].text.clone()];
        for child in 0..self.nodes.len() {
            if self.nodes[child].parent == Some(index) && !self.nodes[child].removed {
                parts.push(self.subtree_text(child));
            }
        }
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn matches(&self, index: usize, criteria: &Criteria) -> bool {
        let node = &self.nodes[index];
        if !self.alive(index) {
            return false;
        }
        let css_ok = criteria.css.trim().is_empty()
            || criteria
                .css
                .split(',')
                .map(str::trim)
                .any(|part| node.selectors.contains(part));
        if !css_ok {
            return false;
        }
        if criteria.enabled_only && node.disabled {
            return false;
        }
        if let Some(scope) = &criteria.within {
            match index_of(scope) {
                Some(s) if s < self.nodes.len() && self.is_descendant(index, s) => {}
                _ => return false,
            }
        }
        criteria.text_matches(&self.subtree_text(index).to_lowercase())
    }

    fn click_node(&mut self, index: usize) {
        self.clicks.push(index);
        let (kind, group) = match &self.nodes[index].field {
            Some(field) => (Some(field.kind), field.group.clone()),
            None => (None, None),
        };
        match kind {
            Some(FieldKind::Radio) => {
                for node in self.nodes.iter_mut() {
                    let same_group = matches!(&node.field, Some(f) if f.kind == FieldKind::Radio && f.group == group);
                    if same_group {
                        node.checked = false;
                    }
                }
                self.nodes[index].checked = true;
            }
            Some(FieldKind::Checkbox) => {
                let node = &mut self.nodes[index];
                node.checked = !node.checked;
            }
            _ => {}
        }
        if let Some(mut handler) = self.handlers.remove(&index) {
            handler(self);
            self.handlers.entry(index).or_insert(handler);
        }
    }
}

/// 测试用页面
#[derive(Default)]
pub struct FakeSurface {
    dom: Mutex<FakeDom>,
}

impl FakeSurface {
    pub fn new(url: &str) -> Self {
        let surface = Self::default();
        surface.with(|dom| dom.set_url(url));
        surface
    }

    /// 直接操作页面状态
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeDom) -> R) -> R {
        let mut dom = self.dom.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut dom)
    }

    pub fn add(&self, parent: Option<&ElementRef>, selectors: &[&str], text: &str) -> ElementRef {
        self.with(|dom| dom.add(parent, selectors, text))
    }

    pub fn add_field(
        &self,
        parent: Option<&ElementRef>,
        selectors: &[&str],
        field: FakeField,
    ) -> ElementRef {
        self.with(|dom| dom.add_field(parent, selectors, field))
    }

    pub fn on_click(&self, element: &ElementRef, handler: impl FnMut(&mut FakeDom) + Send + 'static) {
        self.with(|dom| dom.on_click(element, handler));
    }
}

#[async_trait]
impl PageSurface for FakeSurface {
    async fn find_all(&self, criteria: &Criteria) -> SurfaceResult<Vec<ElementRef>> {
        Ok(self.with(|dom| {
            (0..dom.nodes.len())
                .filter(|&i| dom.matches(i, criteria))
                .map(to_ref)
                .collect()
        }))
    }

    async fn click(&self, element: &ElementRef) -> SurfaceResult<()> {
        self.with(|dom| {
            let index = dom.live(element)?;
            dom.click_node(index);
            Ok(())
        })
    }

    async fn set_value(&self, element: &ElementRef, value: &str) -> SurfaceResult<()> {
        self.with(|dom| {
            let index = dom.live(element)?;
            dom.nodes[index].value = value.to_string();
            Ok(())
        })
    }

    async fn text_of(&self, element: &ElementRef) -> SurfaceResult<String> {
        self.with(|dom| {
            let index = dom.live(element)?;
            Ok(dom.subtree_text(index))
        })
    }

    async fn attr(&self, element: &ElementRef, name: &str) -> SurfaceResult<Option<String>> {
        self.with(|dom| {
            let index = dom.live(element)?;
            Ok(dom.nodes[index].attrs.get(name).cloned())
        })
    }

    async fn set_attr(
        &self,
        element: &ElementRef,
        name: &str,
        value: Option<&str>,
    ) -> SurfaceResult<()> {
        self.with(|dom| {
            let index = dom.live(element)?;
            match value {
                Some(v) => {
                    dom.nodes[index].attrs.insert(name.to_string(), v.to_string());
                }
                None => {
                    dom.nodes[index].attrs.remove(name);
                }
            }
            dom.attr_log
                .push((element.clone(), name.to_string(), value.map(str::to_string)));
            Ok(())
        })
    }

    async fn is_disabled(&self, element: &ElementRef) -> SurfaceResult<bool> {
        self.with(|dom| {
            let index = dom.live(element)?;
            Ok(dom.nodes[index].disabled)
        })
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> SurfaceResult<()> {
        self.with(|dom| dom.live(element).map(|_| ()))
    }

    async fn scroll_to_end(&self, container: &ElementRef) -> SurfaceResult<()> {
        self.with(|dom| {
            dom.live(container)?;
            dom.scrolled_to_end.push(container.clone());
            Ok(())
        })
    }

    async fn form_fields(&self, container: &ElementRef) -> SurfaceResult<Vec<FormField>> {
        self.with(|dom| {
            let scope = dom.live(container)?;
            Ok((0..dom.nodes.len())
                .filter(|&i| dom.alive(i) && dom.is_descendant(i, scope))
                .filter_map(|i| {
                    let node = &dom.nodes[i];
                    node.field.as_ref().map(|field| FormField {
                        element: to_ref(i),
                        kind: field.kind,
                        label: field.label.to_lowercase(),
                        value: node.value.clone(),
                        required: field.required,
                        group: field.group.clone(),
                        option_label: field.option_label.clone(),
                        options: field.options.clone(),
                        checked: node.checked,
                    })
                })
                .collect())
        })
    }

    async fn select_option(&self, element: &ElementRef, option: &str) -> SurfaceResult<()> {
        self.set_value(element, option).await
    }

    async fn navigate(&self, url: &str) -> SurfaceResult<()> {
        self.with(|dom| {
            dom.url = url.to_string();
            dom.navigations.push(url.to_string());
        });
        Ok(())
    }

    async fn current_url(&self) -> SurfaceResult<String> {
        Ok(self.with(|dom| dom.url.clone()))
    }

    async fn clear_marks(&self, attribute: &str) -> SurfaceResult<()> {
        self.with(|dom| {
            for node in dom.nodes.iter_mut() {
                node.attrs.remove(attribute);
            }
        });
        Ok(())
    }
}
