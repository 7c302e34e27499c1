//! Markdown fence unwrapping for model replies.
//!
//! Grammar: an opening marker is three backticks followed by an optional info
//! string (`json`, `json5`, ...) running to the end of the line. The block ends
//! at the next three backticks. Only the first complete block is returned; a
//! reply with several blocks is treated as over-production and the rest is
//! ignored.

const MARKER: &str = "```";

/// A located fenced block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fence<'a> {
    pub info: &'a str,
    pub body: &'a str,
}

/// Find the first complete fenced block in `text`.
pub fn first_block(text: &str) -> Option<Fence<'_>> {
    let open = text.find(MARKER)?;
    let after_marker = open + MARKER.len();
    let rest = &text[after_marker..];

    // Info string runs to the end of the line. On a one-line fence
    // ("```json [...]```") it is a leading word directly before the payload.
    let (info, body_start) = match rest.find('\n') {
        Some(nl) if !rest[..nl].contains(MARKER) => (rest[..nl].trim(), after_marker + nl + 1),
        _ => {
            let (info, skip) = inline_info(rest);
            (info, after_marker + skip)
        }
    };

    let close_rel = text[body_start..].find(MARKER)?;
    let body_end = body_start + close_rel;

    Some(Fence {
        info,
        body: &text[body_start..body_end],
    })
}

/// Leading info word of a one-line fence and the byte length to skip.
///
/// A word counts only when it starts with a letter and is followed by
/// whitespace, `[` or `{`; `true` in "```true```" is payload, not info.
fn inline_info(rest: &str) -> (&str, usize) {
    let word_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    let word = &rest[..word_len];
    let starts_with_letter = word.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let payload_follows = rest[word_len..]
        .chars()
        .next()
        .is_some_and(|c| c.is_whitespace() || c == '[' || c == '{');

    if starts_with_letter && payload_follows {
        (word, word_len)
    } else {
        ("", 0)
    }
}

/// Return the payload the parser should see.
///
/// With a complete block, that is the block's trimmed interior. Without one,
/// a dangling opening or closing marker is stripped. Text with no markers is
/// returned trimmed, so unwrapping is idempotent.
pub fn unwrap(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(fence) = first_block(trimmed) {
        return fence.body.trim();
    }

    let mut candidate = trimmed;
    if let Some(rest) = candidate.strip_prefix(MARKER) {
        candidate = match rest.find('\n') {
            Some(nl) if looks_like_info(&rest[..nl]) => &rest[nl + 1..],
            _ => &rest[inline_info(rest).1..],
        };
    }
    if let Some(rest) = candidate.strip_suffix(MARKER) {
        candidate = rest;
    }
    candidate.trim()
}

fn looks_like_info(line: &str) -> bool {
    let line = line.trim();
    line.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tagged_block() {
        let text = "Here you go:\n```json\n[{\"index\": 0}]\n```\nThanks";
        assert_eq!(unwrap(text), "[{\"index\": 0}]");
        assert_eq!(first_block(text).unwrap().info, "json");
    }

    #[test]
    fn extracts_untagged_block() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(unwrap(text), "{\"a\": 1}");
    }

    #[test]
    fn single_line_fence() {
        assert_eq!(unwrap("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn single_line_tagged_fence() {
        assert_eq!(unwrap("```json [{\"index\": 0}]```"), "[{\"index\": 0}]");
        assert_eq!(unwrap("```json{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(unwrap("```JSON5 [1]```"), "[1]");
        assert_eq!(first_block("```json [1]```").unwrap().info, "json");
        // A bare literal is payload, not an info word.
        assert_eq!(unwrap("```true```"), "true");
        assert_eq!(unwrap("```json [1]"), "[1]");
    }

    #[test]
    fn first_of_several_blocks_wins() {
        let text = "```json\n[1]\n```\nand also\n```json\n[2]\n```";
        assert_eq!(unwrap(text), "[1]");
    }

    #[test]
    fn unfenced_text_is_unchanged() {
        let text = "[{\"index\": 0, \"core_summary\": \"x\"}]";
        assert_eq!(unwrap(text), text);
        assert_eq!(unwrap(unwrap(text)), unwrap(text));
    }

    #[test]
    fn unwrap_is_idempotent_on_fenced_input() {
        let text = "```json\n  {\"a\": [1, 2]}  \n```";
        let once = unwrap(text);
        assert_eq!(unwrap(once), once);
    }

    #[test]
    fn dangling_markers_are_stripped() {
        assert_eq!(unwrap("```json\n[1, 2]"), "[1, 2]");
        assert_eq!(unwrap("[1, 2]\n```"), "[1, 2]");
    }
}
