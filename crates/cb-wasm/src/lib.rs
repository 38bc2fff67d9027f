//! WebAssembly bindings for the content blocker converter

use wasm_bindgen::prelude::*;

use cb_compiler::{allowlist_rule, convert, inverted_allowlist_rule, ConvertOptions};
use cb_core::{pattern_to_regex, validate_regex, HostVersion};

fn parse_version(host_version: &str) -> Result<HostVersion, String> {
    if host_version.trim().is_empty() {
        return Ok(HostVersion::default());
    }
    host_version.parse().map_err(|e| format!("{}", e))
}

/// Split every list text into lines, in list order.
fn collect_lines<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    texts.into_iter().flat_map(str::lines).collect()
}

fn set(target: &js_sys::Object, key: &str, value: &JsValue) {
    let _ = js_sys::Reflect::set(target, &key.into(), value);
}

/// Convert an array of filter list texts into one host ruleset.
#[wasm_bindgen]
pub fn convert_rules(
    list_texts: JsValue,
    host_version: &str,
    advanced_blocking: bool,
    max_json_size: Option<u32>,
) -> Result<JsValue, JsValue> {
    let version = parse_version(host_version).map_err(|e| JsValue::from_str(&e))?;

    let list_array = js_sys::Array::from(&list_texts);
    let mut texts = Vec::with_capacity(list_array.length() as usize);
    for value in list_array.iter() {
        let text = value
            .as_string()
            .ok_or_else(|| JsValue::from_str("List text must be a string"))?;
        texts.push(text);
    }

    let lines = collect_lines(texts.iter().map(String::as_str));
    let options = ConvertOptions::new(version)
        .with_advanced_blocking(advanced_blocking)
        .with_max_json_size(max_json_size.map(|size| size as usize));
    let result = convert(&lines, &options, None, None);

    if result.errors_count > 0 {
        web_sys::console::warn_1(&JsValue::from_str(&format!(
            "{} rules failed to convert",
            result.errors_count
        )));
    }

    let js_result = js_sys::Object::new();
    set(&js_result, "json", &JsValue::from_str(&result.json));
    set(&js_result, "sourceLinesCount", &JsValue::from(result.source_lines_count as u32));
    set(&js_result, "sourceRulesCount", &JsValue::from(result.source_rules_count as u32));
    set(&js_result, "compatibleRulesCount", &JsValue::from(result.compatible_rules_count as u32));
    set(&js_result, "entriesCount", &JsValue::from(result.entries_count as u32));
    set(&js_result, "extendedRulesCount", &JsValue::from(result.extended_rules_count as u32));
    set(&js_result, "discardedCount", &JsValue::from(result.discarded_count as u32));
    set(&js_result, "errorsCount", &JsValue::from(result.errors_count as u32));
    if let Some(text) = &result.extended_text {
        set(&js_result, "extendedText", &JsValue::from_str(text));
    }

    Ok(js_result.into())
}

/// Regex the host would use for a basic filter pattern.
#[wasm_bindgen]
pub fn pattern_to_url_filter(pattern: &str) -> Result<String, JsValue> {
    pattern_to_regex(pattern).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// `None` when `source` is inside the host regex dialect, the reason otherwise.
#[wasm_bindgen]
pub fn check_url_filter(source: &str) -> Option<String> {
    validate_regex(source).err().map(|e| e.to_string())
}

#[wasm_bindgen]
pub fn rules_limit(host_version: &str) -> Result<u32, JsValue> {
    let version = parse_version(host_version).map_err(|e| JsValue::from_str(&e))?;
    Ok(version.rules_limit() as u32)
}

#[wasm_bindgen]
pub fn allowlist_rule_js(domain: &str) -> String {
    allowlist_rule(domain)
}

#[wasm_bindgen]
pub fn inverted_allowlist_rule_js(domains: Vec<String>) -> Option<String> {
    inverted_allowlist_rule(domains.as_slice())
}
