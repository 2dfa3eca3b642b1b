//! CDP 页面操作 - 基础设施层
//!
//! `PageSurface` 的生产实现。所有查找、点击、读写都通过 `JsExecutor` 在页面里执行，
//! 页面中注入一个 `window.__aaSurface` 辅助对象：
//!
//! - 找到的元素被打上 `data-aa-ref="nN"` 属性，`ElementRef` 就是这个值
//! - 每次调用都返回 `{ ok, value }` / `{ ok: false, stale }`，元素已从页面消失时报告失效
//! - 页面跳转后辅助对象丢失，下一次调用时自动重新注入

use crate::error::{SurfaceError, SurfaceResult};
use crate::infrastructure::JsExecutor;
use crate::surface::{Criteria, ElementRef, FormField, PageSurface};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

/// 注入页面的辅助脚本
const BOOTSTRAP: &str = r#"
if (!window.__aaSurface) {
    const REF = 'data-aa-ref';
    let counter = 0;

    const refOf = (el) => {
        let id = el.getAttribute(REF);
        if (!id) {
            counter += 1;
            id = 'n' + counter + '-' + Date.now().toString(36);
            el.setAttribute(REF, id);
        }
        return id;
    };
    const byRef = (id) => document.querySelector('[' + REF + '="' + CSS.escape(id) + '"]');
    const textOf = (el) => ((el.innerText || el.textContent || '') + '').trim();
    const isDisabled = (el) => !!el.disabled || el.getAttribute('aria-disabled') === 'true';

    const labelOf = (el) => {
        const parts = [
            el.getAttribute('aria-label'),
            el.getAttribute('placeholder'),
            el.getAttribute('name'),
            el.id,
        ];
        if (el.id) {
            const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
            if (label) parts.push(textOf(label));
        }
        const wrapping = el.closest('label');
        if (wrapping) parts.push(textOf(wrapping));
        const fieldset = el.closest('fieldset');
        if (fieldset) {
            const legend = fieldset.querySelector('legend');
            if (legend) parts.push(textOf(legend));
        }
        const group = el.closest('.fb-dash-form-element, .jobs-easy-apply-form-element, [data-test-form-element]');
        if (group) {
            const title = group.querySelector('label, legend, .fb-dash-form-element__label');
            if (title) parts.push(textOf(title));
        }
        return parts.filter((p) => p && String(p).trim()).join(' ').toLowerCase();
    };

    const kindOf = (el) => {
        const tag = el.tagName.toLowerCase();
        if (tag === 'select') return 'select';
        if (tag === 'textarea') return 'textarea';
        const type = (el.getAttribute('type') || 'text').toLowerCase();
        if (['text', 'tel', 'url', 'number', 'email', 'radio', 'checkbox'].includes(type)) return type;
        if (type === 'search') return 'text';
        return 'other';
    };

    const setNativeValue = (el, value) => {
        const proto = el.tagName.toLowerCase() === 'textarea'
            ? HTMLTextAreaElement.prototype
            : el.tagName.toLowerCase() === 'select'
                ? HTMLSelectElement.prototype
                : HTMLInputElement.prototype;
        const setter = Object.getOwnPropertyDescriptor(proto, 'value');
        if (setter && setter.set) {
            setter.set.call(el, value);
        } else {
            el.value = value;
        }
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
    };

    const withElement = (id, fn) => {
        const el = byRef(id);
        if (!el) return { ok: false, stale: id };
        return { ok: true, value: fn(el) };
    };

    window.__aaSurface = {
        find(criteria) {
            let scope = document;
            if (criteria.within) {
                scope = byRef(criteria.within);
                if (!scope) return { ok: false, stale: criteria.within };
            }
            let found = [];
            try {
                found = Array.from(scope.querySelectorAll(criteria.css || '*'));
            } catch (e) {
                found = [];
            }
            const texts = criteria.textAny || [];
            const matched = found.filter((el) => {
                if (criteria.enabledOnly && isDisabled(el)) return false;
                if (!texts.length) return true;
                const text = textOf(el).toLowerCase();
                return texts.some((t) => text.includes(t));
            });
            return { ok: true, value: matched.map(refOf) };
        },
        click(id) {
            return withElement(id, (el) => { el.click(); return true; });
        },
        setValue(id, value) {
            return withElement(id, (el) => { el.focus(); setNativeValue(el, value); return true; });
        },
        text(id) {
            return withElement(id, textOf);
        },
        attr(id, name) {
            return withElement(id, (el) => el.getAttribute(name));
        },
        setAttr(id, name, value) {
            return withElement(id, (el) => {
                if (value === null) el.removeAttribute(name); else el.setAttribute(name, value);
                return true;
            });
        },
        disabled(id) {
            return withElement(id, isDisabled);
        },
        scroll(id) {
            return withElement(id, (el) => { el.scrollIntoView({ block: 'center' }); return true; });
        },
        scrollEnd(id) {
            return withElement(id, (el) => { el.scrollTop = el.scrollHeight; return true; });
        },
        fields(id) {
            return withElement(id, (container) => {
                const controls = Array.from(container.querySelectorAll('input, select, textarea'));
                return controls
                    .filter((el) => !['hidden', 'submit', 'button', 'file'].includes((el.getAttribute('type') || '').toLowerCase()))
                    .map((el) => {
                        const kind = kindOf(el);
                        let optionLabel = '';
                        if (kind === 'radio' || kind === 'checkbox') {
                            const own = el.id ? document.querySelector('label[for="' + CSS.escape(el.id) + '"]') : null;
                            optionLabel = own ? textOf(own) : (el.value || '');
                        }
                        const options = kind === 'select'
                            ? Array.from(el.options).map((o) => (o.text || '').trim())
                            : [];
                        const value = kind === 'select'
                            ? ((el.options[el.selectedIndex] || {}).text || '').trim()
                            : (el.value || '');
                        return {
                            element: refOf(el),
                            kind,
                            label: labelOf(el),
                            value: kind === 'radio' || kind === 'checkbox' ? '' : value,
                            required: !!el.required || el.getAttribute('aria-required') === 'true',
                            group: kind === 'radio' ? (el.getAttribute('name') || null) : null,
                            optionLabel,
                            options,
                            checked: !!el.checked,
                        };
                    });
            });
        },
        select(id, option) {
            return withElement(id, (el) => {
                const wanted = option.trim().toLowerCase();
                const match = Array.from(el.options).find((o) => (o.text || '').trim().toLowerCase() === wanted)
                    || Array.from(el.options).find((o) => (o.text || '').toLowerCase().includes(wanted));
                if (!match) return false;
                setNativeValue(el, match.value);
                return true;
            });
        },
        clearMarks(name) {
            document.querySelectorAll('[' + CSS.escape(name) + ']').forEach((el) => el.removeAttribute(name));
            return { ok: true, value: true };
        },
    };
}
"#;

/// 页面返回的统一应答
#[derive(Debug, Deserialize)]
struct Reply {
    ok: bool,
    #[serde(default)]
    value: JsonValue,
    #[serde(default)]
    stale: Option<String>,
}

/// 基于 CDP 的页面操作
#[derive(Clone)]
pub struct CdpSurface {
    executor: JsExecutor,
}

impl CdpSurface {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &JsExecutor {
        &self.executor
    }

    /// 调用辅助对象上的一个方法
    async fn call<T: DeserializeOwned>(&self, method: &str, args: &[JsonValue]) -> SurfaceResult<T> {
        let args = args
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let js_code = format!(
            "(() => {{ {} return window.__aaSurface.{}({}); }})()",
            BOOTSTRAP, method, args
        );
        let reply: Reply = self.executor.eval_as(js_code).await?;
        if !reply.ok {
            let stale = reply.stale.unwrap_or_default();
            debug!("元素已失效: {} ({})", stale, method);
            return Err(SurfaceError::StaleElement(stale));
        }
        Ok(serde_json::from_value(reply.value)?)
    }
}

#[async_trait]
impl PageSurface for CdpSurface {
    async fn find_all(&self, criteria: &Criteria) -> SurfaceResult<Vec<ElementRef>> {
        self.call("find", &[serde_json::to_value(criteria)?]).await
    }

    async fn click(&self, element: &ElementRef) -> SurfaceResult<()> {
        self.call::<bool>("click", &[json!(element)]).await.map(|_| ())
    }

    async fn set_value(&self, element: &ElementRef, value: &str) -> SurfaceResult<()> {
        self.call::<bool>("setValue", &[json!(element), json!(value)])
            .await
            .map(|_| ())
    }

    async fn text_of(&self, element: &ElementRef) -> SurfaceResult<String> {
        self.call("text", &[json!(element)]).await
    }

    async fn attr(&self, element: &ElementRef, name: &str) -> SurfaceResult<Option<String>> {
        self.call("attr", &[json!(element), json!(name)]).await
    }

    async fn set_attr(
        &self,
        element: &ElementRef,
        name: &str,
        value: Option<&str>,
    ) -> SurfaceResult<()> {
        self.call::<bool>("setAttr", &[json!(element), json!(name), json!(value)])
            .await
            .map(|_| ())
    }

    async fn is_disabled(&self, element: &ElementRef) -> SurfaceResult<bool> {
        self.call("disabled", &[json!(element)]).await
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> SurfaceResult<()> {
        self.call::<bool>("scroll", &[json!(element)]).await.map(|_| ())
    }

    async fn scroll_to_end(&self, container: &ElementRef) -> SurfaceResult<()> {
        self.call::<bool>("scrollEnd", &[json!(container)])
            .await
            .map(|_| ())
    }

    async fn form_fields(&self, container: &ElementRef) -> SurfaceResult<Vec<FormField>> {
        self.call("fields", &[json!(container)]).await
    }

    async fn select_option(&self, element: &ElementRef, option: &str) -> SurfaceResult<()> {
        let selected: bool = self
            .call("select", &[json!(element), json!(option)])
            .await?;
        if !selected {
            debug!("下拉框 {} 中没有选项 '{}'", element, option);
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> SurfaceResult<()> {
        self.executor.goto(url).await
    }

    async fn current_url(&self) -> SurfaceResult<String> {
        self.executor.url().await
    }

    async fn clear_marks(&self, attribute: &str) -> SurfaceResult<()> {
        self.call::<bool>("clearMarks", &[json!(attribute)])
            .await
            .map(|_| ())
    }
}
