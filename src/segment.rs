//! Outbound message segmentation
//!
//! Chat platforms cap the size of a single text message. [`segment`] splits an
//! agent response into chunks that fit, breaking at newlines or spaces where it
//! can and keeping fenced code blocks renderable on both sides of a boundary.

/// LINE text message size limit, in characters
pub const LINE_MAX_MESSAGE_CHARS: usize = 5000;

/// Code fence delimiter
pub const FENCE: &str = "```";

/// Appended to a chunk that would otherwise leave a code block open
const CLOSING_FENCE: &str = "\n```";

/// Prepended to the remainder so the interrupted code block continues
const REOPENING_FENCE: &str = "```\n";

/// Newline/space breaks closer to the start than this share of the limit are ignored
const MIN_BREAK_PERCENT: usize = 30;

/// Smallest limit at which code fences are closed and reopened across chunks
pub const MIN_FENCE_REPAIR_LIMIT: usize = 32;

/// Split `text` into chunks of at most `limit` characters
///
/// Breaks prefer the last newline at or before `limit`, then the last space,
/// then a hard cut at exactly `limit`. A newline or space is only used when it
/// lies at or past 30% of `limit`. Whitespace at the start of each following
/// chunk is dropped.
///
/// When a chunk holds an odd number of ```` ``` ```` markers, the chunk is closed
/// with a fence and the next chunk reopens it. The split is then recomputed
/// against a limit reduced by the closing fence so the repaired chunk still fits.
/// A hard cut never splits a fence marker. Limits below
/// [`MIN_FENCE_REPAIR_LIMIT`] leave no room for the added fences, so chunks are
/// cut without repair.
///
/// Empty input yields a single empty chunk. A `limit` of zero disables splitting.
///
/// ```
/// use kodegen_chat_bridge::segment::segment;
///
/// assert_eq!(segment("short text", 5000), vec!["short text"]);
///
/// let chunks = segment(&"a".repeat(6000), 5000);
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[1], "a".repeat(1000));
/// ```
#[must_use]
pub fn segment(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || char_len(text) <= limit {
        return vec![text.to_string()];
    }

    let repair_allowed = limit >= MIN_FENCE_REPAIR_LIMIT;
    let closing_len = char_len(CLOSING_FENCE);

    let mut chunks = Vec::new();
    let mut remaining = text.to_string();

    loop {
        if char_len(&remaining) <= limit {
            chunks.push(remaining);
            break;
        }

        let mut split_at = find_split(&remaining, limit);
        if repair_allowed && has_open_fence(&remaining[..split_at]) {
            split_at = find_split(&remaining, limit - closing_len);
        }

        let mut chunk = remaining[..split_at].to_string();
        let reopen = repair_allowed && has_open_fence(&chunk);
        if reopen {
            chunk.push_str(CLOSING_FENCE);
        }

        let rest = remaining[split_at..].trim_start();
        let next = if reopen {
            format!("{REOPENING_FENCE}{rest}")
        } else {
            rest.to_string()
        };

        chunks.push(chunk);
        if next.is_empty() {
            break;
        }
        remaining = next;
    }

    chunks
}

/// Whether `text` leaves a fenced code block unterminated
#[must_use]
pub fn has_open_fence(text: &str) -> bool {
    text.matches(FENCE).count() % 2 == 1
}

/// Byte offset at which to cut `text` so the head holds at most `limit` characters
fn find_split(text: &str, limit: usize) -> usize {
    let hard_cut = char_offset(text, limit);
    // A separator sitting right at `limit` still yields a head of `limit` chars.
    let window = &text[..char_offset(text, limit + 1)];
    let min_break = char_offset(text, limit * MIN_BREAK_PERCENT / 100);

    let usable = |separator: char| {
        window
            .rfind(separator)
            .filter(|&pos| pos > 0 && pos >= min_break)
    };

    usable('\n')
        .or_else(|| usable(' '))
        .unwrap_or_else(|| outside_fence_marker(text, hard_cut))
}

/// Move `cut` back to the start of a backtick run it would split
fn outside_fence_marker(text: &str, cut: usize) -> usize {
    let bytes = text.as_bytes();
    let before = bytes[..cut].iter().rev().take_while(|&&b| b == b'`').count();
    let after = bytes[cut..].iter().take_while(|&&b| b == b'`').count();

    if before == 0 || after == 0 || before + after < FENCE.len() || before == cut {
        return cut;
    }
    cut - before
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the `n`th character, or the end of `text`
fn char_offset(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map_or(text.len(), |(offset, _)| offset)
}
