//! Form field extraction for ASP.NET postbacks.
//!
//! Web Forms validates each POST against the hidden state it rendered into
//! the previous page (`__VIEWSTATE`, `__EVENTVALIDATION`, ...). The values are
//! opaque: they are collected here exactly as rendered and echoed back
//! unchanged, with only the caller's explicit edits applied on top.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

/// Name of the ASP.NET view-state field.
pub const VIEW_STATE_FIELD: &str = "__VIEWSTATE";

static FIELD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("input, select, textarea").unwrap_or_else(|_| unreachable!())
});

static OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").unwrap_or_else(|_| unreachable!()));

/// The name → value mapping a page expects to receive back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(BTreeMap<String, String>);

impl FormFields {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Sets (or adds) a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First field name containing `needle`, ignoring ASCII case.
    #[must_use]
    pub fn find_name_containing(&self, needle: &str) -> Option<&str> {
        let needle = needle.to_ascii_lowercase();
        self.0
            .keys()
            .find(|name| name.to_ascii_lowercase().contains(&needle))
            .map(String::as_str)
    }

    /// Whether the page rendered a view-state token.
    #[must_use]
    pub fn has_view_state(&self) -> bool {
        self.contains(VIEW_STATE_FIELD)
    }

    /// Iterates `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// The underlying map, for form encoding.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Parses `html` and collects every named form control.
#[must_use]
pub fn extract_fields(html: &str) -> FormFields {
    extract_from_document(&Html::parse_document(html))
}

/// Collects every named `input`, `select` and `textarea` in `document`.
///
/// Unchecked checkboxes and radio buttons are skipped, as a browser would
/// not submit them. Submit buttons are kept; callers remove the ones that
/// must not fire. When a name repeats, the first occurrence wins.
#[must_use]
pub fn extract_from_document(document: &Html) -> FormFields {
    let mut fields = FormFields::new();

    for element in document.select(&FIELD_SELECTOR) {
        let Some(name) = element.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };

        let value = match element.value().name() {
            "select" => select_value(element),
            "textarea" => element.text().collect::<String>(),
            _ => {
                let input_type = element.attr("type").unwrap_or("text").to_ascii_lowercase();
                if (input_type == "checkbox" || input_type == "radio")
                    && element.attr("checked").is_none()
                {
                    continue;
                }
                element.attr("value").unwrap_or_default().to_owned()
            }
        };

        fields.0.entry(name.to_owned()).or_insert(value);
    }

    if !fields.is_empty() && !fields.has_view_state() {
        log::debug!(
            "Form has {} fields but no {VIEW_STATE_FIELD}; the server may reject the postback",
            fields.len()
        );
    }

    fields
}

/// Value a `<select>` submits: the selected option, else the first.
fn select_value(select: ElementRef<'_>) -> String {
    let mut options = select.select(&OPTION_SELECTOR);
    let first = options.next();
    let chosen = first
        .into_iter()
        .chain(options)
        .find(|o| o.attr("selected").is_some())
        .or(first);

    chosen.map(option_value).unwrap_or_default()
}

/// An option's `value` attribute, or its text when the attribute is absent.
pub(crate) fn option_value(option: ElementRef<'_>) -> String {
    option.attr("value").map_or_else(
        || option.text().collect::<String>().trim().to_owned(),
        str::to_owned,
    )
}
