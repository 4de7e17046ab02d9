//! Locator strategies for the portal's export UI.
//!
//! The export chain has no stable API: the DOM varies slightly per dataset
//! page, so every protocol step tries an ordered list of alternatives, first
//! match wins, exhaustion is a step-named failure. Each strategy compiles to
//! one JavaScript probe that finds a matching element, tags it with a marker
//! attribute, and reports whether it matched; subsequent actions (hover,
//! click) address the element through that marker.

const MARK_ATTR: &str = "data-ine-mark";

/// One way of finding a target element.
#[derive(Clone, Copy, Debug)]
pub enum Locator {
    /// A plain CSS selector.
    Css(&'static str),
    /// An anchor whose text content contains the given fragment.
    AnchorText(&'static str),
    /// A button/submit input whose `value` attribute contains any of the
    /// given fragments (tolerant of language variants and partial matches).
    InputValueContains(&'static [&'static str]),
}

impl Locator {
    /// JavaScript that resolves this locator inside `frame` (or the top
    /// document), optionally requiring visibility, and tags the first match.
    /// Evaluates to `true` when a match was tagged.
    pub fn find_js(&self, mark: &str, frame: Option<&str>, require_visible: bool) -> String {
        let candidates = match self {
            Locator::Css(selector) => format!(
                "Array.from(root.querySelectorAll({}))",
                js_string(selector)
            ),
            Locator::AnchorText(text) => format!(
                "Array.from(root.querySelectorAll('a')).filter(a => (a.textContent || '').includes({}))",
                js_string(text)
            ),
            Locator::InputValueContains(fragments) => format!(
                "Array.from(root.querySelectorAll('input[type=\"button\"], input[type=\"submit\"]'))\
                 .filter(i => {{ const v = i.getAttribute('value') || ''; return {}.some(n => v.includes(n)); }})",
                js_string_array(fragments)
            ),
        };

        let visibility = if require_visible {
            "candidates.find(el => el.offsetParent !== null)"
        } else {
            "candidates[0]"
        };

        format!(
            r#"(() => {{
                {root}
                if (!root) return false;
                const candidates = {candidates};
                const el = {visibility};
                if (!el) return false;
                el.setAttribute('{attr}', {mark});
                return true;
            }})()"#,
            root = root_js(frame),
            candidates = candidates,
            visibility = visibility,
            attr = MARK_ATTR,
            mark = js_string(mark),
        )
    }
}

/// JavaScript that clicks a previously tagged element. Evaluates to `true`
/// when the element was still present.
pub fn click_js(mark: &str, frame: Option<&str>) -> String {
    format!(
        r#"(() => {{
            {root}
            if (!root) return false;
            const el = root.querySelector('[{attr}="{mark}"]');
            if (!el) return false;
            el.click();
            return true;
        }})()"#,
        root = root_js(frame),
        attr = MARK_ATTR,
        mark = mark,
    )
}

/// JavaScript that hovers a previously tagged element by dispatching the
/// mouse events the portal's menubar listens for.
pub fn hover_js(mark: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector('[{attr}="{mark}"]');
            if (!el) return false;
            el.dispatchEvent(new MouseEvent('mouseenter', {{ bubbles: true }}));
            el.dispatchEvent(new MouseEvent('mouseover', {{ bubbles: true }}));
            return true;
        }})()"#,
        attr = MARK_ATTR,
        mark = mark,
    )
}

/// JavaScript predicate: the modal iframe is attached with a live document.
pub fn frame_attached_js(frame_selector: &str) -> String {
    format!(
        "(() => {{ const f = document.querySelector({}); \
         return !!(f && f.contentDocument && f.contentDocument.body); }})()",
        js_string(frame_selector)
    )
}

fn root_js(frame: Option<&str>) -> String {
    match frame {
        Some(selector) => format!(
            "const frame = document.querySelector({}); \
             const root = frame && frame.contentDocument ? frame.contentDocument : null;",
            js_string(selector)
        ),
        None => "const root = document;".to_string(),
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).expect("strings always serialize")
}

fn js_string_array(values: &[&str]) -> String {
    serde_json::to_string(values).expect("string arrays always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_probe_embeds_the_quoted_selector() {
        let js = Locator::Css("input[value=\"Descargar\"]").find_js("btn", None, false);
        assert!(js.contains(r#""input[value=\"Descargar\"]""#));
        assert!(js.contains("data-ine-mark"));
    }

    #[test]
    fn anchor_text_probe_filters_by_text_content() {
        let js = Locator::AnchorText("Exportar").find_js("menu", None, false);
        assert!(js.contains("textContent"));
        assert!(js.contains("\"Exportar\""));
    }

    #[test]
    fn input_value_probe_carries_all_fragments() {
        let js = Locator::InputValueContains(&["Descargar", "Download", "escargar"]).find_js(
            "btn",
            Some("iframe#DialogFrame"),
            false,
        );
        assert!(js.contains(r#"["Descargar","Download","escargar"]"#));
        assert!(js.contains("iframe#DialogFrame"));
    }

    #[test]
    fn visible_only_probes_check_offset_parent() {
        let js = Locator::Css("li a").find_js("csv", None, true);
        assert!(js.contains("offsetParent"));
        let js = Locator::Css("li a").find_js("csv", None, false);
        assert!(!js.contains("offsetParent"));
    }

    #[test]
    fn click_addresses_the_marker_inside_the_frame() {
        let js = click_js("btn", Some("iframe#DialogFrame"));
        assert!(js.contains("contentDocument"));
        assert!(js.contains("el.click()"));
    }
}
