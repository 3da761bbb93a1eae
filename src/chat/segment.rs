/// Inline styling unit derived from one line of message text.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Span {
    Plain(String),
    Link { text: String, href: String },
    Bold(Vec<Span>),
}

const LINK_PREFIXES: [&str; 3] = ["http://", "https://", "www."];

/// Split one line into plain, link, and bold spans.
///
/// Bold pairs are matched first and non-greedily. The inside of a pair is
/// link-scanned only, so `**` markers inside an already-bold run stay
/// literal. An opener with no closer falls through as plain text.
pub(crate) fn segment_line(line: &str) -> Vec<Span> {
    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    let mut spans = Vec::new();
    let mut buf = String::new();
    let mut i = 0;

    while i < len {
        if i + 1 < len && chars[i] == '*' && chars[i + 1] == '*' {
            let start = i + 2;
            let mut close = None;
            // Closer must leave at least one character inside the pair.
            for j in (start + 1)..len.saturating_sub(1) {
                if chars[j] == '*' && chars[j + 1] == '*' {
                    close = Some(j);
                    break;
                }
            }
            if let Some(close) = close {
                if !buf.is_empty() {
                    spans.extend(scan_links(&buf));
                    buf.clear();
                }
                let inner: String = chars[start..close].iter().collect();
                spans.push(Span::Bold(scan_links(&inner)));
                i = close + 2;
            } else {
                buf.push_str("**");
                i += 2;
            }
            continue;
        }

        buf.push(chars[i]);
        i += 1;
    }

    if !buf.is_empty() {
        spans.extend(scan_links(&buf));
    }
    spans
}

/// Link-only scan, also used directly for user text so nothing else is ever
/// interpreted as markup there.
pub(crate) fn scan_links(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut plain_start = 0;
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        let prefix = LINK_PREFIXES.iter().find(|p| rest.starts_with(*p));
        let advance = rest.chars().next().map_or(1, char::len_utf8);
        let Some(prefix) = prefix else {
            i += advance;
            continue;
        };

        let run = link_run_len(rest);
        if run <= prefix.len() {
            // A bare scheme with no body is not a link.
            i += advance;
            continue;
        }

        if plain_start < i {
            spans.push(Span::Plain(text[plain_start..i].to_string()));
        }
        let matched = &rest[..run];
        let href = if matched.starts_with("http") {
            matched.to_string()
        } else {
            format!("https://{matched}")
        };
        spans.push(Span::Link {
            text: matched.to_string(),
            href,
        });
        i += run;
        plain_start = i;
    }

    if plain_start < text.len() {
        spans.push(Span::Plain(text[plain_start..].to_string()));
    }
    spans
}

/// Byte length of the longest run of non-whitespace, non-`)` characters.
fn link_run_len(rest: &str) -> usize {
    rest.char_indices()
        .find(|(_, ch)| ch.is_whitespace() || *ch == ')')
        .map(|(idx, _)| idx)
        .unwrap_or(rest.len())
}
