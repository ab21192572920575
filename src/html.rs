// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Low-level HTML string helpers.
//! Naive and tailored to the portal's markup. Tag and attribute
//! names match case-insensitively; ASCII lowercasing keeps byte offsets of the
//! lowered copy aligned with the input.

/// Fast ASCII-only lowercasing for tag/attribute matching.
pub fn to_lowercase_fast(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

fn is_name_boundary(b: Option<&u8>) -> bool {
    matches!(b, None | Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/'))
}

/// Byte offset of the next `<tag` (exact tag name) at or after `from`.
fn find_open(lc: &str, tag: &str, from: usize) -> Option<usize> {
    let pat = format!("<{}", tag);
    let mut at = from;
    while let Some(rel) = lc.get(at..)?.find(&pat) {
        let idx = at + rel;
        if is_name_boundary(lc.as_bytes().get(idx + pat.len())) {
            return Some(idx);
        }
        at = idx + pat.len();
    }
    None
}

/// Given the offset of an opening `<tag`, returns the end offset (exclusive) of
/// its matching closing tag, honouring nesting of the same tag name.
fn matching_end(lc: &str, tag: &str, start: usize) -> Option<usize> {
    let close = format!("</{}", tag);
    let mut depth = 0usize;
    let mut at = start;
    loop {
        let next_open = find_open(lc, tag, at);
        let next_close = lc.get(at..)?.find(&close).map(|rel| at + rel)?;
        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                at = o + tag.len() + 1;
            }
            _ => {
                depth = depth.checked_sub(1)?;
                let end = lc[next_close..].find('>')? + next_close + 1;
                if depth == 0 {
                    return Some(end);
                }
                at = end;
            }
        }
    }
}

/// All complete `<tag ...>...</tag>` blocks in `s`, outermost first, nested
/// blocks of the same tag are not reported separately.
pub fn blocks<'a>(s: &'a str, tag: &str) -> Vec<&'a str> {
    let lc = to_lowercase_fast(s);
    let tag = to_lowercase_fast(tag);
    let mut out = Vec::new();
    let mut at = 0;
    while let Some(start) = find_open(&lc, &tag, at) {
        match matching_end(&lc, &tag, start) {
            Some(end) => {
                out.push(&s[start..end]);
                at = end;
            }
            None => break,
        }
    }
    out
}

/// Every `<tag ...>` with its nested blocks included, in document order.
/// Unlike [`blocks`], nested occurrences are reported too.
pub fn all_blocks<'a>(s: &'a str, tag: &str) -> Vec<&'a str> {
    let lc = to_lowercase_fast(s);
    let tag = to_lowercase_fast(tag);
    let mut out = Vec::new();
    let mut at = 0;
    while let Some(start) = find_open(&lc, &tag, at) {
        if let Some(end) = matching_end(&lc, &tag, start) {
            out.push(&s[start..end]);
        }
        at = start + tag.len() + 1;
    }
    out
}

/// Opening tags (`<input ...>`) of void elements, in document order.
pub fn open_tags<'a>(s: &'a str, tag: &str) -> Vec<&'a str> {
    let lc = to_lowercase_fast(s);
    let tag = to_lowercase_fast(tag);
    let mut out = Vec::new();
    let mut at = 0;
    while let Some(start) = find_open(&lc, &tag, at) {
        let Some(rel_end) = s[start..].find('>') else {
            break;
        };
        out.push(&s[start..start + rel_end + 1]);
        at = start + rel_end + 1;
    }
    out
}

/// The first `<tag>` block whose opening tag carries `attr` containing `value`
/// as a whitespace-separated token (class) or whole value (id, name).
pub fn find_block<'a>(s: &'a str, tag: &str, attr_name: &str, value: &str) -> Option<&'a str> {
    all_blocks(s, tag).into_iter().find(|b| {
        attr(b, attr_name)
            .map(|v| v == value || v.split_whitespace().any(|t| t == value))
            .unwrap_or(false)
    })
}

/// Value of an attribute on the opening tag of `block`, entity-decoded.
pub fn attr(block: &str, name: &str) -> Option<String> {
    let open_end = block.find('>')?;
    let open = &block[..open_end];
    let lc = to_lowercase_fast(open);
    let name = to_lowercase_fast(name);
    let bytes = lc.as_bytes();
    let mut at = 0;
    while let Some(rel) = lc.get(at..)?.find(&name) {
        let idx = at + rel;
        at = idx + name.len();
        let before_ok = idx > 0 && bytes[idx - 1].is_ascii_whitespace();
        let rest = lc[at..].trim_start();
        if !before_ok || !rest.starts_with('=') {
            continue;
        }
        let value_start = open.len() - rest.len() + 1;
        let raw = open[value_start..].trim_start();
        let value = match raw.chars().next()? {
            q @ ('"' | '\'') => {
                let inner = &raw[1..];
                &inner[..inner.find(q)?]
            }
            _ => raw
                .split(|c: char| c.is_whitespace() || c == '>')
                .next()
                .unwrap_or(""),
        };
        return Some(normalize_entities(value));
    }
    None
}

/// Given a complete tag block like `<td ...>INNER</td>`,
/// return the INNER text without the wrapping tags (still may contain nested tags).
pub fn inner_after_open_tag(block: &str) -> &str {
    if let Some(open_end) = block.find('>') {
        if let Some(close_start) = block.rfind('<') {
            if close_start > open_end {
                return &block[open_end + 1..close_start];
            }
        }
    }
    ""
}

/// Visible text of a block: tags stripped, entities decoded, whitespace collapsed.
pub fn text(block: &str) -> String {
    normalize_ws(&normalize_entities(&strip_tags(inner_after_open_tag(block))))
}

/// Remove all HTML tags `<...>` from the string.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Minimal HTML entity decoding for the entities the portal emits.
pub fn normalize_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse sequences of whitespace into a single space and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<DIV id="outer" class="row main">
        <div class="col-7"><h2>Ana&nbsp;Anić</h2><div><p>a</p></div></div>
        <div class='col-5'><A HREF="/x?a=1&amp;b=2">link</A></div>
    </DIV>"#;

    #[test]
    fn nested_blocks_are_balanced() {
        let outer = blocks(DOC, "div");
        assert_eq!(outer.len(), 1);
        assert!(outer[0].ends_with("</DIV>"));
        let col7 = find_block(DOC, "div", "class", "col-7").unwrap();
        assert!(col7.contains("<p>a</p>"));
        assert!(col7.ends_with("</div></div>"));
        assert_eq!(all_blocks(DOC, "div").len(), 4);
    }

    #[test]
    fn attributes_and_text() {
        let a = blocks(DOC, "a")[0];
        assert_eq!(attr(a, "href").as_deref(), Some("/x?a=1&b=2"));
        assert_eq!(text(blocks(DOC, "h2")[0]), "Ana Anić");
        assert!(find_block(DOC, "div", "class", "main").is_some());
        assert!(find_block(DOC, "div", "id", "missing").is_none());
    }

    #[test]
    fn tag_prefixes_do_not_match_longer_names() {
        let s = "<track src=x></track><tr><td>1</td></tr>";
        assert_eq!(blocks(s, "tr"), vec!["<tr><td>1</td></tr>"]);
    }

    #[test]
    fn void_tags_and_unquoted_attributes() {
        let s = r#"<form name=f><input type=hidden name="AuthState" value="xyz"><input name=username></form>"#;
        let inputs = open_tags(s, "input");
        assert_eq!(inputs.len(), 2);
        assert_eq!(attr(inputs[0], "name").as_deref(), Some("AuthState"));
        assert_eq!(attr(inputs[0], "type").as_deref(), Some("hidden"));
        assert_eq!(attr(inputs[1], "value"), None);
        assert_eq!(attr(blocks(s, "form")[0], "name").as_deref(), Some("f"));
    }
}
