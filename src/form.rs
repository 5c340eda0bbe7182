//! 插件配置表单 / 页面的组件树 (Vuetify 组件描述)

use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormElement {
    pub component: &'static str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<FormElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl FormElement {
    fn new(component: &'static str) -> Self {
        Self {
            component,
            props: Map::new(),
            content: Vec::new(),
            text: None,
        }
    }

    fn props(mut self, props: Value) -> Self {
        if let Value::Object(map) = props {
            self.props = map;
        }
        self
    }

    fn content(mut self, content: Vec<FormElement>) -> Self {
        self.content = content;
        self
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// 递归收集所有绑定的 model 名
    pub fn models(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_models(&mut out);
        out
    }

    fn collect_models(&self, out: &mut Vec<String>) {
        if let Some(Value::String(model)) = self.props.get("model") {
            out.push(model.clone());
        }
        for child in &self.content {
            child.collect_models(out);
        }
    }
}

pub fn form(content: Vec<FormElement>) -> FormElement {
    FormElement::new("VForm").content(content)
}

pub fn row(content: Vec<FormElement>) -> FormElement {
    FormElement::new("VRow").content(content)
}

/// 列，md 为中屏占用的栅格数
pub fn col(md: Option<u8>, child: FormElement) -> FormElement {
    let props = match md {
        Some(md) => json!({"cols": 12, "md": md}),
        None => json!({"cols": 12}),
    };
    FormElement::new("VCol").props(props).content(vec![child])
}

pub fn switch(model: &str, label: &str) -> FormElement {
    FormElement::new("VSwitch").props(json!({"model": model, "label": label}))
}

pub fn text_field(model: &str, label: &str) -> FormElement {
    FormElement::new("VTextField").props(json!({
        "model": model,
        "label": label,
        "clearable": true,
    }))
}

pub fn alert(text: &str) -> FormElement {
    FormElement::new("VAlert").props(json!({
        "type": "info",
        "variant": "tonal",
        "text": text,
    }))
}

/// 新窗口打开的链接按钮
pub fn link_button(href: &str, text: &str) -> FormElement {
    FormElement::new("VBtn")
        .props(json!({
            "href": href,
            "target": "_blank",
            "rel": "noopener",
            "color": "primary",
        }))
        .text(text)
}

/// 只有一个"启用插件"开关，可选再追加一列
pub fn enable_form(extra: Option<FormElement>) -> FormElement {
    let mut cols = vec![col(Some(4), switch("enabled", "启用插件"))];
    if let Some(extra) = extra {
        cols.push(col(Some(8), extra));
    }
    form(vec![row(cols)])
}
