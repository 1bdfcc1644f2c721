//! 标记文本提取：把渲染好的 HTML 片段还原为纯文本
//!
//! 纯函数、无共享状态：从左到右扫描，丢弃标签与注释，跳过 script/style 内容，
//! 其余文本节点去首尾空白后按文档顺序返回。`<` 后面不是标签起始字符时按普通文本处理。

/// 按文档顺序返回所有非空文本节点（已去首尾空白、已解码常见实体）
pub fn text_nodes(markup: &str) -> Vec<String> {
    // to_ascii_lowercase 不改变字节布局，下标可与原串共用
    let lower = markup.to_ascii_lowercase();
    let mut nodes = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < markup.len() {
        let rest = &markup[i..];

        if rest.starts_with("<!--") {
            flush(&mut text, &mut nodes);
            i = match rest[4..].find("-->") {
                Some(end) => i + 4 + end + 3,
                None => markup.len(),
            };
            continue;
        }

        if is_tag_start(rest) {
            if let Some(end) = rest.find('>') {
                flush(&mut text, &mut nodes);
                let tag = &rest[1..end];
                i += end + 1;
                if let Some(name) = raw_text_element(tag) {
                    let close = format!("</{}", name);
                    i = match lower[i..].find(&close) {
                        Some(pos) => {
                            let at = i + pos;
                            match markup[at..].find('>') {
                                Some(gt) => at + gt + 1,
                                None => markup.len(),
                            }
                        }
                        None => markup.len(),
                    };
                }
                continue;
            }
        }

        match rest.chars().next() {
            Some(ch) => {
                text.push(ch);
                i += ch.len_utf8();
            }
            None => break,
        }
    }
    flush(&mut text, &mut nodes);
    nodes
}

/// 提取纯文本，文本节点之间用 separator 连接
pub fn strip_markup(markup: &str, separator: &str) -> String {
    text_nodes(markup).join(separator)
}

/// 内容是否像标记（同时包含 `<` 与 `>`）
pub fn looks_like_markup(s: &str) -> bool {
    s.contains('<') && s.contains('>')
}

fn is_tag_start(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('<')
        && chars
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
}

/// script / style 的开始标签返回元素名（其内容不是文本节点）
fn raw_text_element(tag: &str) -> Option<&'static str> {
    if tag.starts_with('/') || tag.ends_with('/') {
        return None;
    }
    let name: String = tag
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match name.as_str() {
        "script" => Some("script"),
        "style" => Some("style"),
        _ => None,
    }
}

fn flush(text: &mut String, nodes: &mut Vec<String>) {
    if text.is_empty() {
        return;
    }
    let decoded = decode_entities(text);
    let trimmed = decoded.trim();
    if !trimmed.is_empty() {
        nodes.push(trimmed.to_string());
    }
    text.clear();
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        match after.find(';').filter(|&semi| semi <= 10) {
            Some(semi) => match decode_entity(&after[1..semi]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &after[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = &after[1..];
                }
            },
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
